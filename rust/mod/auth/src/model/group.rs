use serde::{Deserialize, Serialize};

/// A named role container.
///
/// Names are unique. Members are SystersUser ids; permissions attach either
/// model-wide or to a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Unique identifier (UUIDv4, no dashes).
    pub id: String,

    /// Unique display name.
    pub name: String,

    /// RFC 3339 creation timestamp.
    pub created_at: String,

    /// RFC 3339 last update timestamp.
    pub updated_at: String,
}

/// A membership record linking a SystersUser to a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMember {
    pub group_id: String,
    pub systers_user_id: String,
    /// RFC 3339 timestamp when the membership was added.
    pub added_at: String,
}
