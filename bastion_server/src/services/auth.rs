//! The authentication orchestrator: login, the MFA exchange, email-code
//! flows, registration with scope bootstrap, refresh, logout and the
//! account projection. Token and session issuance always travel together:
//! a fresh AuthToken record backs every access/refresh pair and one active
//! session is bound to it.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;

use bastion_core::contracts::{
  mail_templates, names, AccessCollaborator, EventBus, LoginEvent, MailTransport,
  PasswordChangedEvent, PasswordVerdict, SpaceCollaborator, UserCollaborator, UserCreatedEvent,
  UserSelector,
};
use bastion_core::jwt::AccessTokenPayload;
use bastion_core::models::{
  AuthContext, AuthResponse, AuthUser, CaptchaId, LoginPayload, MfaVerifyPayload, RegisterPayload,
  Session, Space, SpaceId, TokenType, UpdatePasswordPayload, User, UserId, UserProfile,
};
use bastion_core::{CoreError, TokenManager};

use super::auth_tokens::AuthTokenStore;
use super::captcha::CaptchaStore;
use super::code_auth::{generate_code, CodeAuthStore};
use super::mfa::{MfaFactor, MfaService};
use super::permissions::PermissionResolver;
use super::scopes::{ScopeContext, ScopeResolver};
use super::sessions::SessionStore;
use crate::config::FrontendConfig;

pub const LOGIN_METHOD_PASSWORD: &str = "password";
pub const LOGIN_METHOD_PASSWORD_MFA: &str = "password+mfa";
pub const LOGIN_METHOD_EMAIL_CODE: &str = "email-code";
pub const LOGIN_METHOD_REGISTER: &str = "register";
pub const LOGIN_METHOD_REFRESH: &str = "refresh";

/// Everything `GET /account` reports
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MeResponse {
  pub user: User,
  pub profile: Option<UserProfile>,
  pub spaces: Vec<Space>,
  pub space_id: Option<SpaceId>,
  pub roles: Vec<String>,
  pub permissions: Vec<String>,
  pub is_admin: bool,
}

pub struct AuthService {
  users: Arc<dyn UserCollaborator>,
  spaces: Arc<dyn SpaceCollaborator>,
  access: Arc<dyn AccessCollaborator>,
  auth_tokens: Arc<dyn AuthTokenStore>,
  sessions: Arc<dyn SessionStore>,
  code_auths: Arc<dyn CodeAuthStore>,
  captcha: Option<Arc<CaptchaStore>>,
  mfa: Arc<MfaService>,
  scope_resolver: Arc<ScopeResolver>,
  permission_resolver: Arc<PermissionResolver>,
  token_manager: TokenManager,
  mail: Arc<dyn MailTransport>,
  events: Arc<dyn EventBus>,
  frontend: FrontendConfig,
}

impl AuthService {
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    users: Arc<dyn UserCollaborator>,
    spaces: Arc<dyn SpaceCollaborator>,
    access: Arc<dyn AccessCollaborator>,
    auth_tokens: Arc<dyn AuthTokenStore>,
    sessions: Arc<dyn SessionStore>,
    code_auths: Arc<dyn CodeAuthStore>,
    captcha: Option<Arc<CaptchaStore>>,
    mfa: Arc<MfaService>,
    scope_resolver: Arc<ScopeResolver>,
    permission_resolver: Arc<PermissionResolver>,
    token_manager: TokenManager,
    mail: Arc<dyn MailTransport>,
    events: Arc<dyn EventBus>,
    frontend: FrontendConfig,
  ) -> Self {
    Self {
      users,
      spaces,
      access,
      auth_tokens,
      sessions,
      code_auths,
      captcha,
      mfa,
      scope_resolver,
      permission_resolver,
      token_manager,
      mail,
      events,
      frontend,
    }
  }

  // ---- login ----

  pub async fn login(
    &self,
    payload: LoginPayload,
    ctx: &AuthContext,
  ) -> Result<AuthResponse, CoreError> {
    if let Some(captcha_id) = &payload.captcha_id {
      let store = self.captcha.as_ref().ok_or_else(|| {
        CoreError::InvalidRequest("captcha is not enabled on this deployment".to_string())
      })?;
      let answer = payload.captcha_answer.as_deref().unwrap_or_default();
      store
        .verify(&CaptchaId::from(captcha_id.as_str()), answer)
        .await?;
    }

    let user = self
      .users
      .find_user(&UserSelector::Username(payload.username.clone()))
      .await?
      .ok_or_else(|| CoreError::Unauthorized("invalid username or password".to_string()))?;
    ensure_active(&user)?;

    match self.users.verify_password(&user.id, &payload.password).await? {
      PasswordVerdict::Valid => {}
      PasswordVerdict::Invalid(msg) => return Err(CoreError::Unauthorized(msg)),
      PasswordVerdict::NeedsPasswordSet => {
        if user.email.is_empty() {
          return Err(CoreError::Unauthorized(
            "invalid username or password".to_string(),
          ));
        }
        self.send_code_mail(&user.email, true).await?;
        return Ok(AuthResponse {
          registered: Some(true),
          ..Default::default()
        });
      }
    }

    if self.mfa.is_enabled(&user.id).await? {
      let mfa_token = self.token_manager.generate_mfa_token(
        user.id.clone(),
        ctx.ip_address.clone(),
        ctx.user_agent.clone(),
      )?;
      return Ok(AuthResponse::mfa_challenge(mfa_token));
    }

    let (response, session) = self
      .issue_tokens(&user, LOGIN_METHOD_PASSWORD, ctx)
      .await?;
    self
      .publish_login(&user, &session, LOGIN_METHOD_PASSWORD, ctx)
      .await;
    Ok(response)
  }

  pub async fn mfa_verify(
    &self,
    payload: MfaVerifyPayload,
    ctx: &AuthContext,
  ) -> Result<AuthResponse, CoreError> {
    let claims = self.token_manager.verify_mfa_token(&payload.mfa_token)?;

    // The challenge is bound to the network context it was issued in
    if !claims.matches_context(ctx.ip_address.as_deref(), ctx.user_agent.as_deref()) {
      return Err(CoreError::Unauthorized(
        "mfa challenge does not match this client".to_string(),
      ));
    }

    let factor = MfaFactor::from_parts(payload.code, payload.recovery_code)?;
    self.mfa.verify(&claims.user_id, &factor).await?;

    let user = self
      .users
      .get_by_id(&claims.user_id)
      .await?
      .ok_or_else(|| CoreError::Unauthorized("user no longer exists".to_string()))?;
    ensure_active(&user)?;

    let (response, session) = self
      .issue_tokens(&user, LOGIN_METHOD_PASSWORD_MFA, ctx)
      .await?;
    self
      .publish_login(&user, &session, LOGIN_METHOD_PASSWORD_MFA, ctx)
      .await;
    Ok(response)
  }

  // ---- email code flows ----

  /// `POST /authorize/send`: mail a single-use code. The response only says
  /// whether the address already belongs to an account.
  pub async fn send_login_code(&self, email: &str) -> Result<AuthResponse, CoreError> {
    let registered = self
      .users
      .find_user(&UserSelector::Email(email.to_string()))
      .await?
      .is_some();

    self.send_code_mail(email, registered).await?;

    Ok(AuthResponse {
      registered: Some(registered),
      ..Default::default()
    })
  }

  /// `GET /authorize/{code}`: exchange a mailed code. Known accounts get a
  /// full authentication; fresh addresses get a register token to continue
  /// with.
  pub async fn exchange_code(
    &self,
    code: &str,
    ctx: &AuthContext,
  ) -> Result<AuthResponse, CoreError> {
    let record = self
      .code_auths
      .find_by_code(code)
      .await?
      .ok_or_else(|| CoreError::NotFound("code not found".to_string()))?;

    if record.logged {
      return Err(CoreError::Expired("code already used".to_string()));
    }
    if record.is_expired(Utc::now()) {
      return Err(CoreError::Expired("code expired".to_string()));
    }

    match self
      .users
      .find_user(&UserSelector::Email(record.email.clone()))
      .await?
    {
      Some(user) => {
        ensure_active(&user)?;
        self.code_auths.consume(&record.id).await?;

        let (response, session) = self
          .issue_tokens(&user, LOGIN_METHOD_EMAIL_CODE, ctx)
          .await?;
        self
          .publish_login(&user, &session, LOGIN_METHOD_EMAIL_CODE, ctx)
          .await;
        Ok(response)
      }
      None => {
        // The code is consumed later, by the register call carrying it
        let register_token = self
          .token_manager
          .generate_register_token(&record.email, record.id.clone())?;

        Ok(AuthResponse {
          access_token: Some(register_token),
          token_type: Some(TokenType::Register),
          ..Default::default()
        })
      }
    }
  }

  // ---- register ----

  pub async fn register(
    &self,
    payload: RegisterPayload,
    ctx: &AuthContext,
  ) -> Result<AuthResponse, CoreError> {
    let claims = self
      .token_manager
      .verify_register_token(&payload.register_token)?;

    // A replayed register token dies here, before anything else runs
    let code = self
      .code_auths
      .get(&claims.code_id)
      .await?
      .ok_or_else(|| CoreError::NotFound("register code not found".to_string()))?;
    if code.logged {
      return Err(CoreError::Expired("code already used".to_string()));
    }
    if code.is_expired(Utc::now()) {
      return Err(CoreError::Expired("code expired".to_string()));
    }

    self
      .ensure_no_collision(&payload.username, &claims.email, payload.phone.as_deref())
      .await?;

    // Exactly-once: the conditional update makes concurrent replays lose
    self.code_auths.consume(&code.id).await?;

    let is_first_user = self.users.count_users().await? == 0;

    let display_name = payload
      .display_name
      .clone()
      .unwrap_or_else(|| payload.username.clone());
    let user = self
      .users
      .create_user_with_profile(
        bastion_core::contracts::CreateUserRecord {
          username: payload.username.clone(),
          email: claims.email.clone(),
          phone: payload.phone.clone(),
        },
        bastion_core::contracts::CreateProfileRecord {
          display_name,
          short_bio: None,
        },
      )
      .await?;

    let mut bootstrap_space = None;
    if let Some(space_name) = payload.space.as_deref().filter(|s| !s.trim().is_empty()) {
      bootstrap_space = self.bootstrap_scope(&user, space_name).await;
    } else if is_first_user {
      bootstrap_space = self.bootstrap_scope(&user, "Default").await;
    }
    self.scope_resolver.invalidate(&user.id).await;

    let (response, _session) = self.issue_tokens(&user, LOGIN_METHOD_REGISTER, ctx).await?;

    let event = UserCreatedEvent {
      user_id: user.id.clone(),
      username: user.username.clone(),
      email: user.email.clone(),
      space_id: bootstrap_space,
      timestamp: Utc::now(),
    };
    self.publish(names::USER_CREATED, &event).await;

    Ok(response)
  }

  /// Create the scope, make sure super-admin exists, attach the user both
  /// globally and inside the scope. Failures past scope creation are logged
  /// and left in place; the flow is idempotent by slug and convergeable by
  /// re-running.
  async fn bootstrap_scope(&self, user: &User, space_name: &str) -> Option<SpaceId> {
    let slug = slugify(space_name);
    let space = match self.spaces.create_space(space_name, &slug).await {
      Ok(space) => space,
      Err(e) => {
        warn!("scope bootstrap: space creation failed: {}", e);
        return None;
      }
    };

    let role = match self.access.find_role("super-admin").await {
      Ok(Some(role)) => Some(role),
      Ok(None) => match self.access.create_super_admin_role().await {
        Ok(role) => Some(role),
        Err(e) => {
          warn!("scope bootstrap: super-admin creation failed: {}", e);
          None
        }
      },
      Err(e) => {
        warn!("scope bootstrap: role lookup failed: {}", e);
        None
      }
    };

    if let Err(e) = self.spaces.add_user_to_space(&space.id, &user.id, true).await {
      warn!("scope bootstrap: membership failed: {}", e);
    }
    if let Some(role) = role {
      if let Err(e) = self.access.add_role_to_user(&user.id, &role.id).await {
        warn!("scope bootstrap: global role assignment failed: {}", e);
      }
      if let Err(e) = self
        .spaces
        .add_role_to_user_in_space(&space.id, &user.id, &role.id)
        .await
      {
        warn!("scope bootstrap: scoped role assignment failed: {}", e);
      }
    }

    Some(space.id)
  }

  // ---- refresh ----

  /// Mints a fresh AuthToken, pair and session. The previous AuthToken is
  /// left live until its refresh token expires or it is explicitly disabled.
  pub async fn refresh(
    &self,
    refresh_token: &str,
    ctx: &AuthContext,
  ) -> Result<AuthResponse, CoreError> {
    let claims = self.token_manager.verify_refresh_token(refresh_token)?;

    let record = self
      .auth_tokens
      .get(&claims.jti)
      .await?
      .ok_or_else(|| CoreError::Unauthorized("refresh token revoked".to_string()))?;
    if record.disabled {
      return Err(CoreError::Unauthorized("refresh token revoked".to_string()));
    }

    let user = self
      .users
      .get_by_id(&claims.user_id)
      .await?
      .ok_or_else(|| CoreError::Unauthorized("user no longer exists".to_string()))?;
    ensure_active(&user)?;

    let (response, _session) = self.issue_tokens(&user, LOGIN_METHOD_REFRESH, ctx).await?;
    Ok(response)
  }

  // ---- logout / password / me ----

  pub async fn logout(&self, token_id: &bastion_core::AuthTokenId) -> Result<(), CoreError> {
    self.auth_tokens.disable(token_id).await?;
    self.sessions.deactivate_by_token_id(token_id).await?;
    Ok(())
  }

  pub async fn logout_all(&self, user_id: &UserId) -> Result<(), CoreError> {
    self.auth_tokens.disable_all_for_user(user_id).await?;
    self.sessions.deactivate_by_user_id(user_id).await?;
    Ok(())
  }

  pub async fn update_password(
    &self,
    user_id: &UserId,
    payload: UpdatePasswordPayload,
  ) -> Result<(), CoreError> {
    self
      .users
      .update_password(user_id, payload.old_password.as_deref(), &payload.new_password)
      .await?;

    let event = PasswordChangedEvent {
      user_id: user_id.clone(),
      timestamp: Utc::now(),
    };
    self.publish(names::USER_PASSWORD_CHANGED, &event).await;
    Ok(())
  }

  pub async fn me(
    &self,
    user_id: &UserId,
    requested_scope: Option<&SpaceId>,
  ) -> Result<MeResponse, CoreError> {
    let user = self
      .users
      .get_by_id(user_id)
      .await?
      .ok_or_else(|| CoreError::NotFound("user not found".to_string()))?;
    let profile = self.users.get_profile(user_id).await?;

    let scope = self.scope_resolver.resolve(user_id, requested_scope).await?;
    let perms = self.permission_resolver.resolve(user_id, &scope).await?;

    let mut spaces = Vec::with_capacity(scope.space_ids.len());
    for space_id in &scope.space_ids {
      if let Some(space) = self.spaces.get_space(space_id).await? {
        spaces.push(space);
      }
    }

    Ok(MeResponse {
      user,
      profile,
      spaces,
      space_id: scope.space_id,
      roles: perms.role_slugs,
      permissions: perms.permission_codes.into_iter().collect(),
      is_admin: perms.is_admin,
    })
  }

  pub async fn user_spaces(&self, user_id: &UserId) -> Result<Vec<Space>, CoreError> {
    let memberships = self.scope_resolver.memberships(user_id).await?;
    let mut spaces = Vec::with_capacity(memberships.len());
    for membership in &memberships {
      if let Some(space) = self.spaces.get_space(&membership.space_id).await? {
        spaces.push(space);
      }
    }
    Ok(spaces)
  }

  /// Rebuild an [`AuthUser`] from a live session, for cookie-based requests
  pub async fn auth_user_from_session(&self, session: &Session) -> Result<AuthUser, CoreError> {
    let user = self
      .users
      .get_by_id(&session.user_id)
      .await?
      .ok_or_else(|| CoreError::Unauthorized("user no longer exists".to_string()))?;
    ensure_active(&user)?;

    let scope = self.scope_resolver.resolve(&user.id, None).await?;
    let perms = self.permission_resolver.resolve(&user.id, &scope).await?;

    Ok(AuthUser {
      id: user.id,
      username: user.username,
      email: user.email,
      is_admin: perms.is_admin,
      space_id: scope.space_id,
      space_ids: scope.space_ids,
      roles: perms.role_slugs,
      permissions: perms.permission_codes.into_iter().collect(),
      status: user.status,
      is_certified: user.is_certified,
    })
  }

  // ---- internals ----

  async fn ensure_no_collision(
    &self,
    username: &str,
    email: &str,
    phone: Option<&str>,
  ) -> Result<(), CoreError> {
    let mut selectors = vec![
      ("username", UserSelector::Username(username.to_string())),
      ("email", UserSelector::Email(email.to_string())),
    ];
    if let Some(phone) = phone {
      selectors.push(("phone", UserSelector::Phone(phone.to_string())));
    }

    for (field, selector) in selectors {
      if self.users.find_user(&selector).await?.is_some() {
        return Err(CoreError::AlreadyExists {
          field: field.to_string(),
        });
      }
    }
    Ok(())
  }

  async fn send_code_mail(&self, email: &str, registered: bool) -> Result<(), CoreError> {
    let code = generate_code();
    self.code_auths.create(email, &code).await?;

    let (template, url) = if registered {
      (mail_templates::LOGIN_CODE, &self.frontend.sign_in_url)
    } else {
      (mail_templates::REGISTER_CODE, &self.frontend.sign_up_url)
    };

    let vars = serde_json::json!({
      "sign_in_url": self.frontend.sign_in_url,
      "sign_up_url": self.frontend.sign_up_url,
      "url": url,
      "code": code,
    });
    self.mail.send_templated(email, template, vars).await
  }

  /// Resolve scope and permissions, mint the pair against a fresh AuthToken
  /// and bind a session to it.
  async fn issue_tokens(
    &self,
    user: &User,
    login_method: &str,
    ctx: &AuthContext,
  ) -> Result<(AuthResponse, Session), CoreError> {
    let scope = self.scope_resolver.resolve(&user.id, None).await?;
    let perms = self.permission_resolver.resolve(&user.id, &scope).await?;

    let auth_token = self.auth_tokens.create(&user.id).await?;

    let payload = AccessTokenPayload {
      user_id: user.id.clone(),
      username: user.username.clone(),
      email: user.email.clone(),
      is_admin: perms.is_admin,
      space_id: scope.space_id.clone(),
      space_ids: scope.space_ids.clone(),
      roles: perms.role_slugs.clone(),
      permissions: perms.permission_codes.iter().cloned().collect(),
      user_status: user.status,
      is_certified: user.is_certified,
    };

    let access_token = self
      .token_manager
      .generate_access_token(auth_token.id.clone(), payload)?;
    let refresh_token = self
      .token_manager
      .generate_refresh_token(auth_token.id.clone(), user.id.clone())?;

    let session = self
      .sessions
      .create(
        bastion_core::models::CreateSession {
          user_id: user.id.clone(),
          device_info: ctx.device_info.clone(),
          ip_address: ctx.ip_address.clone(),
          user_agent: ctx.user_agent.clone(),
          location: None,
          login_method: Some(login_method.to_string()),
        },
        &auth_token.id,
      )
      .await?;

    let response = AuthResponse {
      access_token: Some(access_token),
      refresh_token: Some(refresh_token),
      session_id: Some(session.id.clone()),
      token_type: Some(TokenType::Bearer),
      expires_in: Some(self.token_manager.access_token_ttl()),
      space_ids: Some(scope.space_ids),
      default_space: scope.default_space,
      ..Default::default()
    };

    Ok((response, session))
  }

  async fn publish_login(
    &self,
    user: &User,
    session: &Session,
    login_method: &str,
    ctx: &AuthContext,
  ) {
    let (browser, os, mobile) = parse_user_agent(ctx.user_agent.as_deref());
    let event = LoginEvent {
      user_id: user.id.clone(),
      username: user.username.clone(),
      ip_address: ctx.ip_address.clone(),
      user_agent: ctx.user_agent.clone(),
      browser,
      os,
      mobile,
      referer: ctx.referer.clone(),
      session_id: session.id.clone(),
      login_method: login_method.to_string(),
      timestamp: Utc::now(),
    };
    self.publish(names::USER_LOGIN, &event).await;
  }

  /// Events are emitted after the authoritative work committed; a failing
  /// bus never fails the flow.
  async fn publish<T: Serialize>(&self, name: &str, event: &T) {
    let Ok(payload) = serde_json::to_value(event) else {
      return;
    };
    if let Err(e) = self.events.publish(name, payload).await {
      warn!("failed to publish {} event: {}", name, e);
    }
  }
}

fn ensure_active(user: &User) -> Result<(), CoreError> {
  if user.is_disabled() {
    return Err(CoreError::Unauthorized("account is disabled".to_string()));
  }
  Ok(())
}

fn slugify(name: &str) -> String {
  let mut slug = String::with_capacity(name.len());
  let mut last_dash = true;
  for c in name.chars() {
    if c.is_ascii_alphanumeric() {
      slug.push(c.to_ascii_lowercase());
      last_dash = false;
    } else if !last_dash {
      slug.push('-');
      last_dash = true;
    }
  }
  slug.trim_end_matches('-').to_string()
}

/// Coarse user-agent classification carried in login events
fn parse_user_agent(ua: Option<&str>) -> (Option<String>, Option<String>, bool) {
  let Some(ua) = ua else {
    return (None, None, false);
  };

  let browser = if ua.contains("Edg/") {
    Some("Edge")
  } else if ua.contains("OPR/") || ua.contains("Opera") {
    Some("Opera")
  } else if ua.contains("Chrome/") {
    Some("Chrome")
  } else if ua.contains("Safari/") && ua.contains("Version/") {
    Some("Safari")
  } else if ua.contains("Firefox/") {
    Some("Firefox")
  } else if ua.contains("curl/") {
    Some("curl")
  } else {
    None
  };

  let os = if ua.contains("Windows") {
    Some("Windows")
  } else if ua.contains("Android") {
    Some("Android")
  } else if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iOS") {
    Some("iOS")
  } else if ua.contains("Mac OS X") || ua.contains("Macintosh") {
    Some("macOS")
  } else if ua.contains("Linux") {
    Some("Linux")
  } else {
    None
  };

  let mobile = ua.contains("Mobile") || ua.contains("Android") || ua.contains("iPhone");

  (
    browser.map(String::from),
    os.map(String::from),
    mobile,
  )
}
