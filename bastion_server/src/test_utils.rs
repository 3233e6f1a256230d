//! In-memory fakes for the collaborator contracts and stores, letting the
//! orchestration layer be exercised without Postgres or redis.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bastion_core::contracts::{
  AccessCollaborator, CreateProfileRecord, CreateUserRecord, EventBus, EventHandler,
  MailTransport, PasswordVerdict, SpaceCollaborator, UserCollaborator, UserSelector,
};
use bastion_core::models::{
  AuthToken, AuthTokenId, CodeAuth, CodeAuthId, CreateSession, ListDirection, PermissionRule,
  Role, RoleId, Session, SessionId, SessionListParams, SessionPage, SessionPatch, Space, SpaceId,
  SpaceMembership, User, UserId, UserProfile,
};
use bastion_core::secrets::SecretBox;
use bastion_core::{CoreError, TokenConfigProvider, TokenManager};

use crate::config::FrontendConfig;
use crate::services::auth::AuthService;
use crate::services::auth_tokens::AuthTokenStore;
use crate::services::code_auth::CodeAuthStore;
use crate::services::mfa::{MfaService, MfaStore};
use crate::services::permissions::PermissionResolver;
use crate::services::scopes::ScopeResolver;
use crate::services::sessions::SessionStore;

// ---- token manager over the repository fixtures ----

struct FixtureKeys {
  sk: String,
  pk: String,
}

impl TokenConfigProvider for FixtureKeys {
  fn get_encoding_key_pem(&self) -> &str {
    &self.sk
  }
  fn get_decoding_key_pem(&self) -> &str {
    &self.pk
  }
}

pub fn test_token_manager() -> TokenManager {
  let base = env!("CARGO_MANIFEST_DIR");
  let keys = FixtureKeys {
    sk: std::fs::read_to_string(format!("{}/../fixtures/encoding.pem", base)).unwrap(),
    pk: std::fs::read_to_string(format!("{}/../fixtures/decoding.pem", base)).unwrap(),
  };
  TokenManager::from_config(&keys).unwrap()
}

// ---- users ----

#[derive(Default)]
pub struct MemoryUsers {
  pub users: Mutex<Vec<User>>,
  pub profiles: Mutex<HashMap<UserId, UserProfile>>,
  pub passwords: Mutex<HashMap<UserId, Option<String>>>,
}

impl MemoryUsers {
  pub fn add_user(&self, username: &str, email: &str, password: Option<&str>) -> User {
    let user = User {
      id: UserId::generate(),
      username: username.to_string(),
      email: email.to_string(),
      phone: None,
      status: 0,
      is_certified: true,
      created_at: Utc::now(),
    };
    self.users.lock().unwrap().push(user.clone());
    self
      .passwords
      .lock()
      .unwrap()
      .insert(user.id.clone(), password.map(String::from));
    user
  }

  pub fn set_status(&self, id: &UserId, status: i32) {
    let mut users = self.users.lock().unwrap();
    if let Some(user) = users.iter_mut().find(|u| &u.id == id) {
      user.status = status;
    }
  }
}

#[async_trait]
impl UserCollaborator for MemoryUsers {
  async fn find_user(&self, selector: &UserSelector) -> Result<Option<User>, CoreError> {
    let users = self.users.lock().unwrap();
    Ok(
      users
        .iter()
        .find(|u| match selector {
          UserSelector::Username(v) => &u.username == v,
          UserSelector::Email(v) => &u.email == v,
          UserSelector::Phone(v) => u.phone.as_deref() == Some(v),
        })
        .cloned(),
    )
  }

  async fn get_by_id(&self, id: &UserId) -> Result<Option<User>, CoreError> {
    Ok(self.users.lock().unwrap().iter().find(|u| &u.id == id).cloned())
  }

  async fn get_profile(&self, id: &UserId) -> Result<Option<UserProfile>, CoreError> {
    Ok(self.profiles.lock().unwrap().get(id).cloned())
  }

  async fn count_users(&self) -> Result<i64, CoreError> {
    Ok(self.users.lock().unwrap().len() as i64)
  }

  async fn create_user_with_profile(
    &self,
    user: CreateUserRecord,
    profile: CreateProfileRecord,
  ) -> Result<User, CoreError> {
    let created = User {
      id: UserId::generate(),
      username: user.username,
      email: user.email,
      phone: user.phone,
      status: 0,
      is_certified: true,
      created_at: Utc::now(),
    };
    self.users.lock().unwrap().push(created.clone());
    self.profiles.lock().unwrap().insert(
      created.id.clone(),
      UserProfile {
        user_id: created.id.clone(),
        display_name: profile.display_name,
        short_bio: profile.short_bio,
        links: None,
      },
    );
    Ok(created)
  }

  async fn verify_password(
    &self,
    id: &UserId,
    password: &str,
  ) -> Result<PasswordVerdict, CoreError> {
    let passwords = self.passwords.lock().unwrap();
    match passwords.get(id) {
      None => Err(CoreError::NotFound("user not found".to_string())),
      Some(None) => Ok(PasswordVerdict::NeedsPasswordSet),
      Some(Some(stored)) if stored == password => Ok(PasswordVerdict::Valid),
      Some(Some(_)) => Ok(PasswordVerdict::Invalid(
        "invalid username or password".to_string(),
      )),
    }
  }

  async fn update_password(
    &self,
    id: &UserId,
    _old_password: Option<&str>,
    new_password: &str,
  ) -> Result<(), CoreError> {
    self
      .passwords
      .lock()
      .unwrap()
      .insert(id.clone(), Some(new_password.to_string()));
    Ok(())
  }
}

// ---- spaces ----

#[derive(Default)]
pub struct MemorySpaces {
  pub spaces: Mutex<HashMap<SpaceId, Space>>,
  pub memberships: Mutex<Vec<SpaceMembership>>,
  pub scoped_roles: Mutex<HashMap<(SpaceId, UserId), Vec<RoleId>>>,
}

#[async_trait]
impl SpaceCollaborator for MemorySpaces {
  async fn create_space(&self, name: &str, slug: &str) -> Result<Space, CoreError> {
    let mut spaces = self.spaces.lock().unwrap();
    if let Some(existing) = spaces.values().find(|s| s.slug == slug) {
      return Ok(existing.clone());
    }
    let space = Space {
      id: SpaceId::generate(),
      name: name.to_string(),
      slug: slug.to_string(),
    };
    spaces.insert(space.id.clone(), space.clone());
    Ok(space)
  }

  async fn get_space(&self, id: &SpaceId) -> Result<Option<Space>, CoreError> {
    Ok(self.spaces.lock().unwrap().get(id).cloned())
  }

  async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<SpaceMembership>, CoreError> {
    Ok(
      self
        .memberships
        .lock()
        .unwrap()
        .iter()
        .filter(|m| &m.user_id == user_id)
        .cloned()
        .collect(),
    )
  }

  async fn get_default_by_user(
    &self,
    user_id: &UserId,
  ) -> Result<Option<SpaceMembership>, CoreError> {
    Ok(
      self
        .memberships
        .lock()
        .unwrap()
        .iter()
        .find(|m| &m.user_id == user_id && m.is_default)
        .cloned(),
    )
  }

  async fn add_user_to_space(
    &self,
    space_id: &SpaceId,
    user_id: &UserId,
    is_default: bool,
  ) -> Result<(), CoreError> {
    let mut memberships = self.memberships.lock().unwrap();
    if is_default {
      for m in memberships.iter_mut().filter(|m| &m.user_id == user_id) {
        m.is_default = false;
      }
    }
    memberships.push(SpaceMembership {
      space_id: space_id.clone(),
      user_id: user_id.clone(),
      is_default,
    });
    Ok(())
  }

  async fn add_role_to_user_in_space(
    &self,
    space_id: &SpaceId,
    user_id: &UserId,
    role_id: &RoleId,
  ) -> Result<(), CoreError> {
    self
      .scoped_roles
      .lock()
      .unwrap()
      .entry((space_id.clone(), user_id.clone()))
      .or_default()
      .push(role_id.clone());
    Ok(())
  }

  async fn get_user_roles_in_space(
    &self,
    space_id: &SpaceId,
    user_id: &UserId,
  ) -> Result<Vec<RoleId>, CoreError> {
    Ok(
      self
        .scoped_roles
        .lock()
        .unwrap()
        .get(&(space_id.clone(), user_id.clone()))
        .cloned()
        .unwrap_or_default(),
    )
  }
}

// ---- access ----

#[derive(Default)]
pub struct MemoryAccess {
  pub user_roles: Mutex<HashMap<UserId, Vec<Role>>>,
  pub roles: Mutex<HashMap<RoleId, Role>>,
  pub role_permissions: Mutex<HashMap<RoleId, Vec<PermissionRule>>>,
}

impl MemoryAccess {
  pub fn add_role(&self, slug: &str, rules: Vec<PermissionRule>) -> Role {
    let role = Role {
      id: RoleId::generate(),
      slug: slug.to_string(),
      name: slug.to_string(),
    };
    self
      .roles
      .lock()
      .unwrap()
      .insert(role.id.clone(), role.clone());
    self
      .role_permissions
      .lock()
      .unwrap()
      .insert(role.id.clone(), rules);
    role
  }

  pub fn assign(&self, user: &UserId, role: &Role) {
    self
      .user_roles
      .lock()
      .unwrap()
      .entry(user.clone())
      .or_default()
      .push(role.clone());
  }
}

#[async_trait]
impl AccessCollaborator for MemoryAccess {
  async fn get_user_roles(&self, user_id: &UserId) -> Result<Vec<Role>, CoreError> {
    Ok(
      self
        .user_roles
        .lock()
        .unwrap()
        .get(user_id)
        .cloned()
        .unwrap_or_default(),
    )
  }

  async fn get_roles_by_ids(&self, ids: &[RoleId]) -> Result<Vec<Role>, CoreError> {
    let roles = self.roles.lock().unwrap();
    Ok(ids.iter().filter_map(|id| roles.get(id).cloned()).collect())
  }

  async fn find_role(&self, slug: &str) -> Result<Option<Role>, CoreError> {
    Ok(
      self
        .roles
        .lock()
        .unwrap()
        .values()
        .find(|r| r.slug == slug)
        .cloned(),
    )
  }

  async fn create_super_admin_role(&self) -> Result<Role, CoreError> {
    if let Some(existing) = self.find_role("super-admin").await? {
      return Ok(existing);
    }
    Ok(self.add_role(
      "super-admin",
      vec![PermissionRule {
        action: "*".to_string(),
        subject: "*".to_string(),
      }],
    ))
  }

  async fn get_role_permissions(&self, role_id: &RoleId) -> Result<Vec<PermissionRule>, CoreError> {
    Ok(
      self
        .role_permissions
        .lock()
        .unwrap()
        .get(role_id)
        .cloned()
        .unwrap_or_default(),
    )
  }

  async fn add_role_to_user(&self, user_id: &UserId, role_id: &RoleId) -> Result<(), CoreError> {
    let role = self
      .roles
      .lock()
      .unwrap()
      .get(role_id)
      .cloned()
      .ok_or_else(|| CoreError::NotFound("role not found".to_string()))?;
    self.assign(user_id, &role);
    Ok(())
  }
}

// ---- stores ----

#[derive(Default)]
pub struct MemoryAuthTokens {
  pub tokens: Mutex<HashMap<AuthTokenId, AuthToken>>,
}

#[async_trait]
impl AuthTokenStore for MemoryAuthTokens {
  async fn create(&self, user_id: &UserId) -> Result<AuthToken, CoreError> {
    let token = AuthToken {
      id: AuthTokenId::generate(),
      user_id: user_id.clone(),
      disabled: false,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    };
    self
      .tokens
      .lock()
      .unwrap()
      .insert(token.id.clone(), token.clone());
    Ok(token)
  }

  async fn get(&self, id: &AuthTokenId) -> Result<Option<AuthToken>, CoreError> {
    Ok(self.tokens.lock().unwrap().get(id).cloned())
  }

  async fn disable(&self, id: &AuthTokenId) -> Result<(), CoreError> {
    if let Some(token) = self.tokens.lock().unwrap().get_mut(id) {
      token.disabled = true;
      token.updated_at = Utc::now();
    }
    Ok(())
  }

  async fn disable_all_for_user(&self, user_id: &UserId) -> Result<(), CoreError> {
    for token in self.tokens.lock().unwrap().values_mut() {
      if &token.user_id == user_id {
        token.disabled = true;
      }
    }
    Ok(())
  }
}

#[derive(Default)]
pub struct MemorySessions {
  pub sessions: Mutex<Vec<Session>>,
}

#[async_trait]
impl SessionStore for MemorySessions {
  async fn create(
    &self,
    body: CreateSession,
    token_id: &AuthTokenId,
  ) -> Result<Session, CoreError> {
    let now = Utc::now();
    let session = Session {
      id: SessionId::generate(),
      user_id: body.user_id,
      token_id: token_id.clone(),
      device_info: body.device_info,
      ip_address: body.ip_address,
      user_agent: body.user_agent,
      location: body.location,
      login_method: body.login_method,
      is_active: true,
      last_access_at: Some(now),
      expires_at: Some(now + Duration::days(7)),
      created_at: now,
      updated_at: now,
    };
    self.sessions.lock().unwrap().push(session.clone());
    Ok(session)
  }

  async fn get_by_id(&self, id: &SessionId) -> Result<Option<Session>, CoreError> {
    Ok(
      self
        .sessions
        .lock()
        .unwrap()
        .iter()
        .find(|s| &s.id == id)
        .cloned(),
    )
  }

  async fn get_by_token_id(&self, token_id: &AuthTokenId) -> Result<Option<Session>, CoreError> {
    Ok(
      self
        .sessions
        .lock()
        .unwrap()
        .iter()
        .find(|s| &s.token_id == token_id)
        .cloned(),
    )
  }

  async fn update(&self, id: &SessionId, patch: SessionPatch) -> Result<Session, CoreError> {
    let mut sessions = self.sessions.lock().unwrap();
    let session = sessions
      .iter_mut()
      .find(|s| &s.id == id)
      .ok_or_else(|| CoreError::NotFound("session not found".to_string()))?;

    if let Some(at) = patch.last_access_at {
      session.last_access_at = Some(at);
    }
    if let Some(location) = patch.location {
      session.location = Some(location);
    }
    if let Some(active) = patch.is_active {
      session.is_active = active;
    }
    if let Some(device) = patch.device_info {
      session.device_info = Some(device);
    }
    session.updated_at = Utc::now();
    Ok(session.clone())
  }

  async fn update_last_access(&self, token_id: &AuthTokenId) {
    let mut sessions = self.sessions.lock().unwrap();
    if let Some(session) = sessions.iter_mut().find(|s| &s.token_id == token_id) {
      session.last_access_at = Some(Utc::now());
    }
  }

  async fn deactivate_by_user_id(&self, user_id: &UserId) -> Result<(), CoreError> {
    for session in self.sessions.lock().unwrap().iter_mut() {
      if &session.user_id == user_id {
        session.is_active = false;
      }
    }
    Ok(())
  }

  async fn deactivate_by_token_id(&self, token_id: &AuthTokenId) -> Result<(), CoreError> {
    for session in self.sessions.lock().unwrap().iter_mut() {
      if &session.token_id == token_id {
        session.is_active = false;
      }
    }
    Ok(())
  }

  async fn delete(&self, id: &SessionId) -> Result<(), CoreError> {
    let mut sessions = self.sessions.lock().unwrap();
    let before = sessions.len();
    sessions.retain(|s| &s.id != id);
    if sessions.len() == before {
      return Err(CoreError::NotFound("session not found".to_string()));
    }
    Ok(())
  }

  async fn cleanup_expired(&self) -> Result<u64, CoreError> {
    let now = Utc::now();
    let mut sessions = self.sessions.lock().unwrap();
    let before = sessions.len();
    sessions.retain(|s| s.expires_at.map_or(true, |exp| exp >= now));
    Ok((before - sessions.len()) as u64)
  }

  async fn list(&self, params: SessionListParams) -> Result<SessionPage, CoreError> {
    let mut items: Vec<Session> = self
      .sessions
      .lock()
      .unwrap()
      .iter()
      .filter(|s| params.user_id.as_ref().map_or(true, |u| &s.user_id == u))
      .cloned()
      .collect();

    let direction = params.direction.unwrap_or_default();
    match direction {
      ListDirection::Forward => {
        items.sort_by(|a, b| (b.created_at, &b.id.0).cmp(&(a.created_at, &a.id.0)))
      }
      ListDirection::Backward => {
        items.sort_by(|a, b| (a.created_at, &a.id.0).cmp(&(b.created_at, &b.id.0)))
      }
    }

    if let Some(cursor) = params.cursor.as_deref() {
      let cursor = bastion_core::Cursor::decode(cursor)?;
      items.retain(|s| {
        let key = (s.created_at.timestamp_micros(), s.id.0.as_str());
        let pivot = (cursor.created_at_micros, cursor.id.as_str());
        match direction {
          ListDirection::Forward => key < pivot,
          ListDirection::Backward => key > pivot,
        }
      });
    }

    let limit = params.limit.unwrap_or(100).clamp(1, 100) as usize;
    let has_more = items.len() > limit;
    items.truncate(limit);
    let next_cursor = if has_more {
      items
        .last()
        .map(|s| bastion_core::Cursor::new(s.created_at, s.id.as_str()).encode())
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
    Ok(
      self
        .sessions
        .lock()
        .unwrap()
        .iter()
        .filter(|s| &s.user_id == user_id && s.is_active)
        .count() as i64,
    )
  }
}

#[derive(Default)]
pub struct MemoryCodeAuths {
  pub codes: Mutex<Vec<CodeAuth>>,
}

#[async_trait]
impl CodeAuthStore for MemoryCodeAuths {
  async fn create(&self, email: &str, code: &str) -> Result<CodeAuth, CoreError> {
    let record = CodeAuth {
      id: CodeAuthId::generate(),
      email: email.to_string(),
      code: code.to_string(),
      logged: false,
      created_at: Utc::now(),
    };
    self.codes.lock().unwrap().push(record.clone());
    Ok(record)
  }

  async fn find_by_code(&self, code: &str) -> Result<Option<CodeAuth>, CoreError> {
    Ok(
      self
        .codes
        .lock()
        .unwrap()
        .iter()
        .rev()
        .find(|c| c.code == code)
        .cloned(),
    )
  }

  async fn get(&self, id: &CodeAuthId) -> Result<Option<CodeAuth>, CoreError> {
    Ok(
      self
        .codes
        .lock()
        .unwrap()
        .iter()
        .find(|c| &c.id == id)
        .cloned(),
    )
  }

  async fn consume(&self, id: &CodeAuthId) -> Result<(), CoreError> {
    let mut codes = self.codes.lock().unwrap();
    let record = codes
      .iter_mut()
      .find(|c| &c.id == id && !c.logged)
      .ok_or_else(|| CoreError::Expired("code already used".to_string()))?;
    record.logged = true;
    Ok(())
  }
}

// ---- event bus and mail recorders ----

#[derive(Default)]
pub struct RecordingBus {
  pub published: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingBus {
  pub fn names(&self) -> Vec<String> {
    self
      .published
      .lock()
      .unwrap()
      .iter()
      .map(|(name, _)| name.clone())
      .collect()
  }
}

#[async_trait]
impl EventBus for RecordingBus {
  async fn publish(&self, name: &str, payload: serde_json::Value) -> Result<(), CoreError> {
    self
      .published
      .lock()
      .unwrap()
      .push((name.to_string(), payload));
    Ok(())
  }

  fn subscribe(&self, _name: &str, _handler: EventHandler) {}
}

#[derive(Default)]
pub struct RecordingMail {
  pub sent: Mutex<Vec<(String, String, serde_json::Value)>>,
}

#[async_trait]
impl MailTransport for RecordingMail {
  async fn send_templated(
    &self,
    to: &str,
    template: &str,
    variables: serde_json::Value,
  ) -> Result<(), CoreError> {
    self
      .sent
      .lock()
      .unwrap()
      .push((to.to_string(), template.to_string(), variables));
    Ok(())
  }
}

// ---- assembled fixture ----

pub struct TestHarness {
  pub users: Arc<MemoryUsers>,
  pub spaces: Arc<MemorySpaces>,
  pub access: Arc<MemoryAccess>,
  pub auth_tokens: Arc<MemoryAuthTokens>,
  pub sessions: Arc<MemorySessions>,
  pub code_auths: Arc<MemoryCodeAuths>,
  pub bus: Arc<RecordingBus>,
  pub mail: Arc<RecordingMail>,
  pub mfa: Arc<MfaService>,
  pub mfa_store: Arc<crate::services::mfa::tests::MemoryMfaStore>,
  pub token_manager: TokenManager,
  pub auth: AuthService,
}

pub fn harness() -> TestHarness {
  use base64::engine::general_purpose::STANDARD as B64;
  use base64::Engine;

  let users = Arc::new(MemoryUsers::default());
  let spaces = Arc::new(MemorySpaces::default());
  let access = Arc::new(MemoryAccess::default());
  let auth_tokens = Arc::new(MemoryAuthTokens::default());
  let sessions = Arc::new(MemorySessions::default());
  let code_auths = Arc::new(MemoryCodeAuths::default());
  let bus = Arc::new(RecordingBus::default());
  let mail = Arc::new(RecordingMail::default());
  let mfa_store = Arc::new(crate::services::mfa::tests::MemoryMfaStore::default());
  let secrets = SecretBox::from_base64_key(&B64.encode([42u8; 32])).unwrap();
  let mfa_store_dyn: Arc<dyn MfaStore> = mfa_store.clone();
  let mfa = Arc::new(MfaService::new(mfa_store_dyn, secrets, "bastion"));
  let token_manager = test_token_manager();

  let spaces_dyn: Arc<dyn SpaceCollaborator> = spaces.clone();
  let scope_resolver = Arc::new(ScopeResolver::new(spaces_dyn, None));
  let access_dyn: Arc<dyn AccessCollaborator> = access.clone();
  let permission_resolver = Arc::new(PermissionResolver::new(access_dyn));

  let auth = AuthService::new(
    users.clone(),
    spaces.clone(),
    access.clone(),
    auth_tokens.clone(),
    sessions.clone(),
    code_auths.clone(),
    None,
    mfa.clone(),
    scope_resolver,
    permission_resolver,
    token_manager.clone(),
    mail.clone(),
    bus.clone(),
    FrontendConfig {
      sign_in_url: "https://app.example.com/signin".to_string(),
      sign_up_url: "https://app.example.com/signup".to_string(),
    },
  );

  TestHarness {
    users,
    spaces,
    access,
    auth_tokens,
    sessions,
    code_auths,
    bus,
    mail,
    mfa,
    mfa_store,
    token_manager,
    auth,
  }
}
