//! Session management: cursor-paged listing, inspection, revocation.
//! Users operate on their own sessions; admins may target any user.

use axum::{
  extract::{Extension, Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use bastion_core::models::{
  AuthUser, ListDirection, Session, SessionId, SessionListParams, SessionPage, UserId,
};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SessionListQuery {
  pub cursor: Option<String>,
  pub direction: Option<ListDirection>,
  pub limit: Option<i64>,
  /// Admin-only: list another user's sessions
  pub user_id: Option<String>,
}

#[utoipa::path(
  get,
  path = "/api/v1/sessions",
  responses((status = 200, description = "One page of sessions", body = SessionPage)),
  tag = "sessions"
)]
pub async fn list_sessions_handler(
  State(state): State<AppState>,
  Extension(user): Extension<AuthUser>,
  Query(query): Query<SessionListQuery>,
) -> Result<Json<SessionPage>, AppError> {
  let target = match query.user_id {
    Some(other) if user.is_admin => UserId::from(other),
    Some(other) if other == user.id.0 => user.id.clone(),
    Some(_) => {
      return Err(AppError::Forbidden(
        "cannot list another user's sessions".to_string(),
      ))
    }
    None => user.id.clone(),
  };

  let page = state
    .sessions
    .list(SessionListParams {
      user_id: Some(target),
      cursor: query.cursor,
      direction: query.direction,
      limit: query.limit,
    })
    .await?;

  Ok(Json(page))
}

#[utoipa::path(
  get,
  path = "/api/v1/sessions/{id}",
  params(("id" = String, Path, description = "Session id")),
  responses(
    (status = 200, body = Session),
    (status = 404, description = "Unknown session or not yours")
  ),
  tag = "sessions"
)]
pub async fn get_session_handler(
  State(state): State<AppState>,
  Extension(user): Extension<AuthUser>,
  Path(id): Path<String>,
) -> Result<Json<Session>, AppError> {
  let session = load_owned_session(&state, &user, &SessionId::from(id)).await?;
  Ok(Json(session))
}

#[utoipa::path(
  delete,
  path = "/api/v1/sessions/{id}",
  params(("id" = String, Path, description = "Session id")),
  responses(
    (status = 204, description = "Session deleted"),
    (status = 404, description = "Unknown session or not yours")
  ),
  tag = "sessions"
)]
pub async fn delete_session_handler(
  State(state): State<AppState>,
  Extension(user): Extension<AuthUser>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
  let session = load_owned_session(&state, &user, &SessionId::from(id)).await?;

  // Deleting a session also retires its token family
  state.auth_tokens.disable(&session.token_id).await?;
  state.sessions.delete(&session.id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
  post,
  path = "/api/v1/sessions/deactivate-all",
  responses((status = 204, description = "Every session and token family revoked")),
  tag = "sessions"
)]
pub async fn deactivate_all_handler(
  State(state): State<AppState>,
  Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
  state.auth.logout_all(&user.id).await?;
  Ok(StatusCode::NO_CONTENT)
}

async fn load_owned_session(
  state: &AppState,
  user: &AuthUser,
  id: &SessionId,
) -> Result<Session, AppError> {
  let session = state
    .sessions
    .get_by_id(id)
    .await?
    .ok_or_else(|| AppError::NotFound("session not found".to_string()))?;

  // Non-admins only ever see their own sessions; a foreign id reads as absent
  if session.user_id != user.id && !user.is_admin {
    return Err(AppError::NotFound("session not found".to_string()));
  }
  Ok(session)
}
