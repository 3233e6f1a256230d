//! Device-scoped sessions keyed both by session id and by auth token id.
//!
//! The database row is the source of truth; the two cache keys are
//! write-through projections and every failure against them is logged and
//! treated as a miss. `update_last_access` coalesces writes through an
//! in-process debounce map, which is itself only a cache of the last
//! observed touch instant; losing an entry merely causes one extra write.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use bastion_core::contracts::Cache;
use bastion_core::models::{
  AuthTokenId, CreateSession, ListDirection, Session, SessionId, SessionListParams, SessionPage,
  SessionPatch, UserId,
};
use bastion_core::pagination::Cursor;
use bastion_core::CoreError;

use super::infrastructure::cache::{cache_del, cache_get_json, cache_set_json};

const SESSION_CACHE_TTL_SECS: u64 = 1800;
const TOUCH_MAP_HIGH_WATER: usize = 10_000;

fn id_key(id: &SessionId) -> String {
  format!("session:id:{}", id)
}

fn token_key(token_id: &AuthTokenId) -> String {
  format!("session:token:{}", token_id)
}

#[async_trait]
pub trait SessionStore: Send + Sync {
  async fn create(
    &self,
    body: CreateSession,
    token_id: &AuthTokenId,
  ) -> Result<Session, CoreError>;

  async fn get_by_id(&self, id: &SessionId) -> Result<Option<Session>, CoreError>;

  async fn get_by_token_id(&self, token_id: &AuthTokenId) -> Result<Option<Session>, CoreError>;

  async fn update(&self, id: &SessionId, patch: SessionPatch) -> Result<Session, CoreError>;

  /// Coalesced, best-effort write; never fails the caller
  async fn update_last_access(&self, token_id: &AuthTokenId);

  async fn deactivate_by_user_id(&self, user_id: &UserId) -> Result<(), CoreError>;

  async fn deactivate_by_token_id(&self, token_id: &AuthTokenId) -> Result<(), CoreError>;

  async fn delete(&self, id: &SessionId) -> Result<(), CoreError>;

  /// Idempotent; safe to run concurrently with everything else
  async fn cleanup_expired(&self) -> Result<u64, CoreError>;

  async fn list(&self, params: SessionListParams) -> Result<SessionPage, CoreError>;

  async fn count_active_for_user(&self, user_id: &UserId) -> Result<i64, CoreError>;
}

pub struct PgSessionStore {
  pool: PgPool,
  cache: Option<Arc<dyn Cache>>,
  touch_seen: DashMap<AuthTokenId, Instant>,
  ttl_secs: i64,
  touch_interval_secs: i64,
  max_list_limit: i64,
}

impl PgSessionStore {
  pub fn new(
    pool: PgPool,
    cache: Option<Arc<dyn Cache>>,
    ttl_secs: i64,
    touch_interval_secs: i64,
    max_list_limit: i64,
  ) -> Self {
    Self {
      pool,
      cache,
      touch_seen: DashMap::new(),
      ttl_secs,
      touch_interval_secs,
      max_list_limit,
    }
  }

  fn clamp_limit(&self, requested: Option<i64>) -> i64 {
    requested
      .unwrap_or(self.max_list_limit)
      .clamp(1, self.max_list_limit)
  }

  async fn cache_session(&self, session: &Session) {
    if let Some(cache) = &self.cache {
      cache_set_json(
        cache.as_ref(),
        &id_key(&session.id),
        session,
        SESSION_CACHE_TTL_SECS,
      )
      .await;
      cache_set_json(
        cache.as_ref(),
        &token_key(&session.token_id),
        session,
        SESSION_CACHE_TTL_SECS,
      )
      .await;
    }
  }

  async fn evict(&self, id: &SessionId, token_id: &AuthTokenId) {
    if let Some(cache) = &self.cache {
      cache_del(cache.as_ref(), &id_key(id)).await;
      cache_del(cache.as_ref(), &token_key(token_id)).await;
    }
  }

  async fn fetch_by_id(&self, id: &SessionId) -> Result<Option<Session>, CoreError> {
    let session = sqlx::query_as::<_, Session>(
      r#"
      SELECT id, user_id, token_id, device_info, ip_address, user_agent, location,
             login_method, is_active, last_access_at, expires_at, created_at, updated_at
      FROM sessions
      WHERE id = $1
      "#,
    )
    .bind(id)
    .fetch_optional(&self.pool)
    .await?;

    Ok(session)
  }
}

#[async_trait]
impl SessionStore for PgSessionStore {
  async fn create(
    &self,
    body: CreateSession,
    token_id: &AuthTokenId,
  ) -> Result<Session, CoreError> {
    let id = SessionId::generate();
    let now = Utc::now();
    let expires_at = now + Duration::seconds(self.ttl_secs);

    let session = sqlx::query_as::<_, Session>(
      r#"
      INSERT INTO sessions
        (id, user_id, token_id, device_info, ip_address, user_agent, location,
         login_method, is_active, last_access_at, expires_at)
      VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9, $10)
      RETURNING id, user_id, token_id, device_info, ip_address, user_agent, location,
                login_method, is_active, last_access_at, expires_at, created_at, updated_at
      "#,
    )
    .bind(&id)
    .bind(&body.user_id)
    .bind(token_id)
    .bind(&body.device_info)
    .bind(&body.ip_address)
    .bind(&body.user_agent)
    .bind(&body.location)
    .bind(&body.login_method)
    .bind(now)
    .bind(expires_at)
    .fetch_one(&self.pool)
    .await?;

    self.cache_session(&session).await;
    Ok(session)
  }

  async fn get_by_id(&self, id: &SessionId) -> Result<Option<Session>, CoreError> {
    if let Some(cache) = &self.cache {
      if let Some(session) = cache_get_json::<Session>(cache.as_ref(), &id_key(id)).await {
        return Ok(Some(session));
      }
    }

    let session = self.fetch_by_id(id).await?;
    if let Some(session) = &session {
      self.cache_session(session).await;
    }
    Ok(session)
  }

  async fn get_by_token_id(&self, token_id: &AuthTokenId) -> Result<Option<Session>, CoreError> {
    if let Some(cache) = &self.cache {
      if let Some(session) = cache_get_json::<Session>(cache.as_ref(), &token_key(token_id)).await
      {
        return Ok(Some(session));
      }
    }

    let session = sqlx::query_as::<_, Session>(
      r#"
      SELECT id, user_id, token_id, device_info, ip_address, user_agent, location,
             login_method, is_active, last_access_at, expires_at, created_at, updated_at
      FROM sessions
      WHERE token_id = $1
      "#,
    )
    .bind(token_id)
    .fetch_optional(&self.pool)
    .await?;

    if let Some(session) = &session {
      self.cache_session(session).await;
    }
    Ok(session)
  }

  async fn update(&self, id: &SessionId, patch: SessionPatch) -> Result<Session, CoreError> {
    if patch.is_empty() {
      return self
        .fetch_by_id(id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("session {} not found", id)));
    }

    let session = sqlx::query_as::<_, Session>(
      r#"
      UPDATE sessions
      SET last_access_at = COALESCE($2, last_access_at),
          location = COALESCE($3, location),
          is_active = COALESCE($4, is_active),
          device_info = COALESCE($5, device_info),
          updated_at = NOW()
      WHERE id = $1
      RETURNING id, user_id, token_id, device_info, ip_address, user_agent, location,
                login_method, is_active, last_access_at, expires_at, created_at, updated_at
      "#,
    )
    .bind(id)
    .bind(patch.last_access_at)
    .bind(&patch.location)
    .bind(patch.is_active)
    .bind(&patch.device_info)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| CoreError::NotFound(format!("session {} not found", id)))?;

    self.evict(&session.id, &session.token_id).await;
    Ok(session)
  }

  async fn update_last_access(&self, token_id: &AuthTokenId) {
    // Debounce: skip the write while the previous touch is recent enough
    if let Some(seen) = self.touch_seen.get(token_id) {
      if seen.elapsed().as_secs() < self.touch_interval_secs as u64 {
        return;
      }
    }
    // The map only caches last touch instants; drop cold entries before it
    // accumulates every token id ever seen
    if self.touch_seen.len() > TOUCH_MAP_HIGH_WATER {
      let horizon = (self.touch_interval_secs as u64).saturating_mul(2);
      self
        .touch_seen
        .retain(|_, seen| seen.elapsed().as_secs() < horizon);
    }
    self.touch_seen.insert(token_id.clone(), Instant::now());

    let result = sqlx::query_as::<_, (SessionId,)>(
      r#"
      UPDATE sessions
      SET last_access_at = NOW(), updated_at = NOW()
      WHERE token_id = $1 AND is_active = TRUE
      RETURNING id
      "#,
    )
    .bind(token_id)
    .fetch_optional(&self.pool)
    .await;

    match result {
      Ok(Some((id,))) => self.evict(&id, token_id).await,
      Ok(None) => {}
      Err(e) => warn!("last-access update failed for token {}: {}", token_id, e),
    }
  }

  async fn deactivate_by_user_id(&self, user_id: &UserId) -> Result<(), CoreError> {
    let rows = sqlx::query_as::<_, (SessionId, AuthTokenId)>(
      r#"
      UPDATE sessions
      SET is_active = FALSE, updated_at = NOW()
      WHERE user_id = $1 AND is_active = TRUE
      RETURNING id, token_id
      "#,
    )
    .bind(user_id)
    .fetch_all(&self.pool)
    .await?;

    for (id, token_id) in &rows {
      self.evict(id, token_id).await;
    }
    Ok(())
  }

  async fn deactivate_by_token_id(&self, token_id: &AuthTokenId) -> Result<(), CoreError> {
    let row = sqlx::query_as::<_, (SessionId,)>(
      r#"
      UPDATE sessions
      SET is_active = FALSE, updated_at = NOW()
      WHERE token_id = $1 AND is_active = TRUE
      RETURNING id
      "#,
    )
    .bind(token_id)
    .fetch_optional(&self.pool)
    .await?;

    if let Some((id,)) = row {
      self.evict(&id, token_id).await;
    }
    Ok(())
  }

  async fn delete(&self, id: &SessionId) -> Result<(), CoreError> {
    let row = sqlx::query_as::<_, (AuthTokenId,)>(
      r#"
      DELETE FROM sessions
      WHERE id = $1
      RETURNING token_id
      "#,
    )
    .bind(id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| CoreError::NotFound(format!("session {} not found", id)))?;

    self.evict(id, &row.0).await;
    Ok(())
  }

  async fn cleanup_expired(&self) -> Result<u64, CoreError> {
    let result = sqlx::query(
      r#"
      DELETE FROM sessions
      WHERE expires_at IS NOT NULL AND expires_at < NOW()
      "#,
    )
    .execute(&self.pool)
    .await?;

    Ok(result.rows_affected())
  }

  async fn list(&self, params: SessionListParams) -> Result<SessionPage, CoreError> {
    let limit = self.clamp_limit(params.limit);
    let direction = params.direction.unwrap_or_default();
    let cursor = params.cursor.as_deref().map(Cursor::decode).transpose()?;

    // Keyset pagination over (created_at, id); the id breaks timestamp ties.
    // Forward walks newer-first strictly below the cursor, backward walks
    // older-first strictly above it.
    let order = match direction {
      ListDirection::Forward => "ORDER BY created_at DESC, id DESC",
      ListDirection::Backward => "ORDER BY created_at ASC, id ASC",
    };
    let comparison = match direction {
      ListDirection::Forward => "(created_at, id) < ($2, $3)",
      ListDirection::Backward => "(created_at, id) > ($2, $3)",
    };

    let mut sql = String::from(
      "SELECT id, user_id, token_id, device_info, ip_address, user_agent, location, \
       login_method, is_active, last_access_at, expires_at, created_at, updated_at \
       FROM sessions WHERE ($1::text IS NULL OR user_id = $1)",
    );
    if cursor.is_some() {
      sql.push_str(" AND ");
      sql.push_str(comparison);
    }
    sql.push(' ');
    sql.push_str(order);
    sql.push_str(" LIMIT ");
    sql.push_str(&(limit + 1).to_string());

    let mut query = sqlx::query_as::<_, Session>(&sql).bind(params.user_id.as_ref());
    if let Some(cursor) = &cursor {
      query = query.bind(cursor.created_at()).bind(cursor.id.clone());
    }

    let mut items = query.fetch_all(&self.pool).await?;
    let has_more = items.len() as i64 > limit;
    items.truncate(limit as usize);

    let next_cursor = if has_more {
      items
        .last()
        .map(|s| Cursor::new(s.created_at, s.id.as_str()).encode())
    } else {
      None
    };

    Ok(SessionPage {
      items,
      next_cursor,
      has_more,
    })
  }

  async fn count_active_for_user(&self, user_id: &UserId) -> Result<i64, CoreError> {
    let count: (i64,) = sqlx::query_as(
      r#"
      SELECT COUNT(*)
      FROM sessions
      WHERE user_id = $1 AND is_active = TRUE
        AND (expires_at IS NULL OR expires_at > NOW())
      "#,
    )
    .bind(user_id)
    .fetch_one(&self.pool)
    .await?;

    Ok(count.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cache_keys_are_disjoint_per_index() {
    let sid = SessionId::from("s-1");
    let tid = AuthTokenId::from("t-1");
    assert_eq!(id_key(&sid), "session:id:s-1");
    assert_eq!(token_key(&tid), "session:token:t-1");
    assert_ne!(id_key(&sid), token_key(&AuthTokenId::from("s-1")));
  }
}
