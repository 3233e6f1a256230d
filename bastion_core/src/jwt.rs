//! Signed token codec: access, refresh, register and MFA-challenge tokens.
//!
//! All four kinds share the Ed25519 key pair and issuer; they differ in the
//! `sub` claim and payload. The `jti` of an access/refresh pair is the id of
//! the auth token record it was minted against, so revocation is a single
//! flag flip on that record.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, TokenError};
use crate::models::{AuthTokenId, CodeAuthId, SpaceId, UserId};

pub const SUBJECT_ACCESS: &str = "access";
pub const SUBJECT_REFRESH: &str = "refresh";
pub const SUBJECT_REGISTER: &str = "email-register";
pub const SUBJECT_MFA: &str = "mfa";

const JWT_LEEWAY: u64 = 30;

pub const ACCESS_TOKEN_EXPIRATION: i64 = 2 * 60 * 60; // 2 hours
pub const REFRESH_TOKEN_EXPIRATION: i64 = 7 * 24 * 60 * 60; // 7 days
pub const REGISTER_TOKEN_EXPIRATION: i64 = 15 * 60; // 15 minutes
pub const MFA_TOKEN_EXPIRATION: i64 = 5 * 60; // 5 minutes

/// Source of key material and token policy for [`TokenManager`]
pub trait TokenConfigProvider {
  fn get_encoding_key_pem(&self) -> &str;
  fn get_decoding_key_pem(&self) -> &str;
  fn get_jwt_leeway(&self) -> u64 {
    JWT_LEEWAY
  }
  fn get_jwt_issuer(&self) -> &str {
    "bastion"
  }
  fn access_token_ttl(&self) -> i64 {
    ACCESS_TOKEN_EXPIRATION
  }
  fn refresh_token_ttl(&self) -> i64 {
    REFRESH_TOKEN_EXPIRATION
  }
  fn register_token_ttl(&self) -> i64 {
    REGISTER_TOKEN_EXPIRATION
  }
  fn mfa_token_ttl(&self) -> i64 {
    MFA_TOKEN_EXPIRATION
  }
}

/// The authorization context baked into an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenPayload {
  pub user_id: UserId,
  pub username: String,
  pub email: String,
  pub is_admin: bool,
  pub space_id: Option<SpaceId>,
  pub space_ids: Vec<SpaceId>,
  pub roles: Vec<String>,
  pub permissions: Vec<String>,
  pub user_status: i32,
  pub is_certified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
  pub jti: AuthTokenId,
  pub sub: String,
  pub iss: String,
  pub iat: i64,
  pub exp: i64,
  pub user: AccessTokenPayload,
}

impl From<AccessClaims> for crate::models::AuthUser {
  fn from(claims: AccessClaims) -> Self {
    let user = claims.user;
    Self {
      id: user.user_id,
      username: user.username,
      email: user.email,
      is_admin: user.is_admin,
      space_id: user.space_id,
      space_ids: user.space_ids,
      roles: user.roles,
      permissions: user.permissions,
      status: user.user_status,
      is_certified: user.is_certified,
    }
  }
}

impl AccessClaims {
  /// True once the token's age exceeds `fraction` of its lifetime
  pub fn is_stale(&self, fraction: f64) -> bool {
    let now = Utc::now().timestamp();
    let age = now.saturating_sub(self.iat);
    let ttl = self.exp.saturating_sub(self.iat);
    (age as f64) > (ttl as f64) * fraction
  }

  /// Remaining validity as of now
  pub fn remaining(&self) -> Duration {
    Duration::seconds(self.exp - Utc::now().timestamp())
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
  pub jti: AuthTokenId,
  pub sub: String,
  pub iss: String,
  pub iat: i64,
  pub exp: i64,
  pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterClaims {
  pub jti: String,
  pub sub: String,
  pub iss: String,
  pub iat: i64,
  pub exp: i64,
  pub email: String,
  pub code_id: CodeAuthId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaClaims {
  pub jti: String,
  pub sub: String,
  pub iss: String,
  pub iat: i64,
  pub exp: i64,
  pub user_id: UserId,
  pub ip: Option<String>,
  pub user_agent: Option<String>,
  pub ts: i64,
}

impl MfaClaims {
  /// The challenge is bound to the network context it was issued in
  pub fn matches_context(&self, ip: Option<&str>, user_agent: Option<&str>) -> bool {
    let ip_ok = match (self.ip.as_deref(), ip) {
      (Some(bound), observed) => observed == Some(bound),
      (None, _) => true,
    };
    let ua_ok = match (self.user_agent.as_deref(), user_agent) {
      (Some(bound), observed) => observed == Some(bound),
      (None, _) => true,
    };
    ip_ok && ua_ok
  }
}

/// Verify-only half of the codec. The realtime server carries only the
/// public key and builds one of these directly.
#[derive(Clone)]
pub struct AccessTokenVerifier {
  decoding_key: DecodingKey,
  validation: Validation,
}

impl AccessTokenVerifier {
  pub fn new(pk_pem: &str, issuer: &str, leeway: u64) -> Result<Self, CoreError> {
    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.leeway = leeway;
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&["exp", "iss"]);

    Ok(Self {
      decoding_key: DecodingKey::from_ed_pem(pk_pem.as_bytes())?,
      validation,
    })
  }

  fn decode_claims<T: DeserializeOwned>(&self, token: &str) -> Result<T, CoreError> {
    let data = decode::<T>(token, &self.decoding_key, &self.validation)?;
    Ok(data.claims)
  }

  pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, CoreError> {
    let claims: AccessClaims = self.decode_claims(token)?;
    expect_subject(&claims.sub, SUBJECT_ACCESS)?;
    Ok(claims)
  }
}

fn expect_subject(sub: &str, expected: &str) -> Result<(), CoreError> {
  if sub != expected {
    return Err(CoreError::InvalidToken(TokenError::SubjectMismatch(
      sub.to_string(),
    )));
  }
  Ok(())
}

/// Full codec: encodes and verifies all four token kinds
#[derive(Clone)]
pub struct TokenManager {
  encoding_key: EncodingKey,
  verifier: AccessTokenVerifier,
  issuer: String,
  access_ttl: i64,
  refresh_ttl: i64,
  register_ttl: i64,
  mfa_ttl: i64,
}

impl TokenManager {
  pub fn from_config(config: &impl TokenConfigProvider) -> Result<Self, CoreError> {
    let issuer = config.get_jwt_issuer().to_string();
    Ok(Self {
      encoding_key: EncodingKey::from_ed_pem(config.get_encoding_key_pem().as_bytes())?,
      verifier: AccessTokenVerifier::new(
        config.get_decoding_key_pem(),
        &issuer,
        config.get_jwt_leeway(),
      )?,
      issuer,
      access_ttl: config.access_token_ttl(),
      refresh_ttl: config.refresh_token_ttl(),
      register_ttl: config.register_token_ttl(),
      mfa_ttl: config.mfa_token_ttl(),
    })
  }

  pub fn access_token_ttl(&self) -> i64 {
    self.access_ttl
  }

  fn encode_claims<T: Serialize>(&self, claims: &T) -> Result<String, CoreError> {
    let header = Header::new(Algorithm::EdDSA);
    Ok(encode(&header, claims, &self.encoding_key)?)
  }

  pub fn generate_access_token(
    &self,
    jti: AuthTokenId,
    payload: AccessTokenPayload,
  ) -> Result<String, CoreError> {
    let now = Utc::now().timestamp();
    self.encode_claims(&AccessClaims {
      jti,
      sub: SUBJECT_ACCESS.to_string(),
      iss: self.issuer.clone(),
      iat: now,
      exp: now + self.access_ttl,
      user: payload,
    })
  }

  pub fn generate_refresh_token(
    &self,
    jti: AuthTokenId,
    user_id: UserId,
  ) -> Result<String, CoreError> {
    let now = Utc::now().timestamp();
    self.encode_claims(&RefreshClaims {
      jti,
      sub: SUBJECT_REFRESH.to_string(),
      iss: self.issuer.clone(),
      iat: now,
      exp: now + self.refresh_ttl,
      user_id,
    })
  }

  pub fn generate_register_token(
    &self,
    email: &str,
    code_id: CodeAuthId,
  ) -> Result<String, CoreError> {
    let now = Utc::now().timestamp();
    self.encode_claims(&RegisterClaims {
      jti: Uuid::new_v4().to_string(),
      sub: SUBJECT_REGISTER.to_string(),
      iss: self.issuer.clone(),
      iat: now,
      exp: now + self.register_ttl,
      email: email.to_string(),
      code_id,
    })
  }

  pub fn generate_mfa_token(
    &self,
    user_id: UserId,
    ip: Option<String>,
    user_agent: Option<String>,
  ) -> Result<String, CoreError> {
    let now = Utc::now().timestamp();
    self.encode_claims(&MfaClaims {
      jti: Uuid::new_v4().to_string(),
      sub: SUBJECT_MFA.to_string(),
      iss: self.issuer.clone(),
      iat: now,
      exp: now + self.mfa_ttl,
      user_id,
      ip,
      user_agent,
      ts: now,
    })
  }

  pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, CoreError> {
    self.verifier.verify_access_token(token)
  }

  pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, CoreError> {
    let claims: RefreshClaims = self.verifier.decode_claims(token)?;
    expect_subject(&claims.sub, SUBJECT_REFRESH)?;
    Ok(claims)
  }

  pub fn verify_register_token(&self, token: &str) -> Result<RegisterClaims, CoreError> {
    let claims: RegisterClaims = self.verifier.decode_claims(token)?;
    expect_subject(&claims.sub, SUBJECT_REGISTER)?;
    Ok(claims)
  }

  pub fn verify_mfa_token(&self, token: &str) -> Result<MfaClaims, CoreError> {
    let claims: MfaClaims = self.verifier.decode_claims(token)?;
    expect_subject(&claims.sub, SUBJECT_MFA)?;
    Ok(claims)
  }

  /// Re-issue an access token when its remaining lifetime has dropped below
  /// `threshold`, preserving `jti` and payload. Returns `None` while the
  /// original is still fresh enough.
  pub fn refresh_if_needed(
    &self,
    token: &str,
    threshold: Duration,
  ) -> Result<Option<String>, CoreError> {
    let claims = self.verify_access_token(token)?;
    if claims.remaining() >= threshold {
      return Ok(None);
    }
    let renewed = self.generate_access_token(claims.jti, claims.user)?;
    Ok(Some(renewed))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use anyhow::Result;

  pub(crate) struct TestKeys {
    sk: String,
    pk: String,
  }

  impl TokenConfigProvider for TestKeys {
    fn get_encoding_key_pem(&self) -> &str {
      &self.sk
    }
    fn get_decoding_key_pem(&self) -> &str {
      &self.pk
    }
  }

  pub(crate) fn test_manager() -> TokenManager {
    let base = env!("CARGO_MANIFEST_DIR");
    let keys = TestKeys {
      sk: std::fs::read_to_string(format!("{}/../fixtures/encoding.pem", base)).unwrap(),
      pk: std::fs::read_to_string(format!("{}/../fixtures/decoding.pem", base)).unwrap(),
    };
    TokenManager::from_config(&keys).unwrap()
  }

  fn sample_payload() -> AccessTokenPayload {
    AccessTokenPayload {
      user_id: UserId::from("u-1"),
      username: "alice".into(),
      email: "alice@example.com".into(),
      is_admin: false,
      space_id: Some(SpaceId::from("s1")),
      space_ids: vec![SpaceId::from("s1")],
      roles: vec!["member".into()],
      permissions: vec!["read:users".into()],
      user_status: 0,
      is_certified: true,
    }
  }

  #[test]
  fn access_token_round_trip() -> Result<()> {
    let tm = test_manager();
    let jti = AuthTokenId::generate();
    let token = tm.generate_access_token(jti.clone(), sample_payload())?;

    let claims = tm.verify_access_token(&token)?;
    assert_eq!(claims.jti, jti);
    assert_eq!(claims.sub, SUBJECT_ACCESS);
    assert_eq!(claims.user, sample_payload());
    Ok(())
  }

  #[test]
  fn refresh_token_round_trip() -> Result<()> {
    let tm = test_manager();
    let jti = AuthTokenId::generate();
    let token = tm.generate_refresh_token(jti.clone(), UserId::from("u-1"))?;

    let claims = tm.verify_refresh_token(&token)?;
    assert_eq!(claims.jti, jti);
    assert_eq!(claims.user_id, UserId::from("u-1"));
    Ok(())
  }

  #[test]
  fn subject_mismatch_is_rejected() -> Result<()> {
    let tm = test_manager();
    let refresh = tm.generate_refresh_token(AuthTokenId::generate(), UserId::from("u-1"))?;

    let err = tm.verify_access_token(&refresh).unwrap_err();
    assert!(matches!(
      err,
      CoreError::InvalidToken(TokenError::SubjectMismatch(_))
    ));
    Ok(())
  }

  #[test]
  fn garbage_token_is_invalid() {
    let tm = test_manager();
    let err = tm.verify_access_token("not.a.token").unwrap_err();
    assert!(matches!(err, CoreError::InvalidToken(TokenError::Invalid)));
  }

  #[test]
  fn register_token_carries_email_and_code_id() -> Result<()> {
    let tm = test_manager();
    let code_id = CodeAuthId::generate();
    let token = tm.generate_register_token("bob@x.io", code_id.clone())?;

    let claims = tm.verify_register_token(&token)?;
    assert_eq!(claims.email, "bob@x.io");
    assert_eq!(claims.code_id, code_id);
    assert_eq!(claims.sub, SUBJECT_REGISTER);
    Ok(())
  }

  #[test]
  fn mfa_token_binds_network_context() -> Result<()> {
    let tm = test_manager();
    let token = tm.generate_mfa_token(
      UserId::from("u-1"),
      Some("10.0.0.1".into()),
      Some("curl/8".into()),
    )?;

    let claims = tm.verify_mfa_token(&token)?;
    assert!(claims.matches_context(Some("10.0.0.1"), Some("curl/8")));
    assert!(!claims.matches_context(Some("10.0.0.2"), Some("curl/8")));
    assert!(!claims.matches_context(Some("10.0.0.1"), Some("other")));
    Ok(())
  }

  #[test]
  fn fresh_token_is_not_renewed() -> Result<()> {
    let tm = test_manager();
    let token = tm.generate_access_token(AuthTokenId::generate(), sample_payload())?;

    // Renewal threshold far below the full 2 h lifetime
    assert!(tm.refresh_if_needed(&token, Duration::minutes(5))?.is_none());
    Ok(())
  }

  #[test]
  fn near_expiry_token_is_renewed_with_same_jti() -> Result<()> {
    let tm = test_manager();
    let jti = AuthTokenId::generate();
    let token = tm.generate_access_token(jti.clone(), sample_payload())?;

    // Threshold above the full lifetime forces a renewal
    let renewed = tm
      .refresh_if_needed(&token, Duration::seconds(ACCESS_TOKEN_EXPIRATION + 60))?
      .expect("token should be renewed");
    let claims = tm.verify_access_token(&renewed)?;
    assert_eq!(claims.jti, jti);
    assert_eq!(claims.user, sample_payload());
    Ok(())
  }

  #[test]
  fn staleness_tracks_token_age() {
    let now = Utc::now().timestamp();
    let claims = AccessClaims {
      jti: AuthTokenId::generate(),
      sub: SUBJECT_ACCESS.into(),
      iss: "bastion".into(),
      iat: now - 3600,
      exp: now + 3600,
      user: sample_payload(),
    };
    // 1 h into a 2 h lifetime
    assert!(claims.is_stale(0.25));
    assert!(!claims.is_stale(0.75));
  }
}
