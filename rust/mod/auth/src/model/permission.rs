use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A permission catalog entry.
///
/// `model` names the record type the codename applies to, e.g. `"community"`
/// for `change_community`. Object-level grants are only accepted on records
/// of that model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub codename: String,
    pub model: String,
    pub name: String,
}

/// Reference to a single record: `"{model}:{id}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub model: String,
    pub id: String,
}

impl ObjectRef {
    pub fn new(model: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.model, self.id)
    }
}

/// A grant of one codename to one group on one record.
///
/// ID is derived from hash(group + codename + object) so re-assigning the same
/// triple is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectPermission {
    /// Deterministic id, see [`grant_id`].
    pub id: String,
    pub group_id: String,
    pub codename: String,
    /// `"{model}:{id}"` of the record.
    pub object_ref: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

/// Compute the deterministic grant id: hex(sha256(group:codename:object)), first 32 chars.
pub fn grant_id(group_id: &str, codename: &str, object_ref: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(group_id.as_bytes());
    hasher.update(b":");
    hasher.update(codename.as_bytes());
    hasher.update(b":");
    hasher.update(object_ref.as_bytes());
    let result = hasher.finalize();
    result[..16].iter().map(|b| format!("{:02x}", b)).collect()
}
