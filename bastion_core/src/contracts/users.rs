use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::{User, UserId, UserProfile};

/// How to look a user up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserSelector {
  Username(String),
  Email(String),
  Phone(String),
}

/// Outcome of a password check against the user collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordVerdict {
  Valid,
  Invalid(String),
  /// The account exists but has never had a password set (email-only signup)
  NeedsPasswordSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRecord {
  pub username: String,
  pub email: String,
  pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProfileRecord {
  pub display_name: String,
  pub short_bio: Option<String>,
}

/// User storage and credential verification, owned by the user module
#[async_trait]
pub trait UserCollaborator: Send + Sync {
  async fn find_user(&self, selector: &UserSelector) -> Result<Option<User>, CoreError>;

  async fn get_by_id(&self, id: &UserId) -> Result<Option<User>, CoreError>;

  async fn get_profile(&self, id: &UserId) -> Result<Option<UserProfile>, CoreError>;

  async fn count_users(&self) -> Result<i64, CoreError>;

  /// Creates the user and its profile atomically
  async fn create_user_with_profile(
    &self,
    user: CreateUserRecord,
    profile: CreateProfileRecord,
  ) -> Result<User, CoreError>;

  async fn verify_password(
    &self,
    id: &UserId,
    password: &str,
  ) -> Result<PasswordVerdict, CoreError>;

  async fn update_password(
    &self,
    id: &UserId,
    old_password: Option<&str>,
    new_password: &str,
  ) -> Result<(), CoreError>;
}
