use serde::{Deserialize, Serialize};

/// A login account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier (UUIDv4, no dashes).
    pub id: String,

    /// Unique login name.
    pub username: String,

    /// Argon2id PHC string. Never the plain password.
    pub password_hash: String,

    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Whether the account may log in.
    #[serde(default = "default_true")]
    pub active: bool,

    /// RFC 3339 creation timestamp.
    pub created_at: String,

    /// RFC 3339 last update timestamp.
    pub updated_at: String,
}

/// Input for creating a new user.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Portal profile wrapping exactly one [`User`].
///
/// Every User gets one on creation. Communities, groups and permissions all
/// reference the SystersUser id rather than the login account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystersUser {
    /// Unique identifier (UUIDv4, no dashes).
    pub id: String,

    /// The wrapped login account.
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blog_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage_url: Option<String>,

    /// RFC 3339 creation timestamp.
    pub created_at: String,

    /// RFC 3339 last update timestamp.
    pub updated_at: String,
}

fn default_true() -> bool {
    true
}
