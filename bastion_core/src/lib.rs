//! Shared domain layer for the bastion identity platform: models, error
//! taxonomy, the token codec, MFA primitives and the collaborator contracts
//! the server crates are wired against.

pub mod contracts;
pub mod error;
pub mod jwt;
pub mod mfa;
pub mod middlewares;
pub mod models;
pub mod pagination;
pub mod secrets;

pub use error::{ClaimsFieldError, CoreError, ErrorMapper, TokenError};
pub use jwt::{
  AccessClaims, AccessTokenPayload, AccessTokenVerifier, MfaClaims, RefreshClaims, RegisterClaims,
  TokenConfigProvider, TokenManager, ACCESS_TOKEN_EXPIRATION, REFRESH_TOKEN_EXPIRATION,
};
pub use middlewares::TokenVerifier;
pub use models::{
  AuthResponse, AuthToken, AuthTokenId, AuthUser, CaptchaId, CodeAuth, CodeAuthId, Role, RoleId,
  Session, SessionId, Space, SpaceId, TokenType, User, UserId, UserMfa,
};
pub use pagination::Cursor;
