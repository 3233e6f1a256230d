pub mod auth;
pub mod auth_tokens;
pub mod captcha;
pub mod code_auth;
pub mod collaborators;
pub mod infrastructure;
pub mod mfa;
pub mod permissions;
pub mod policy;
pub mod scopes;
pub mod sessions;
