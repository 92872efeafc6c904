use serde::{Deserialize, Serialize};

/// Hooks the service runs around persistence. Default impls are no-ops.
pub trait Lifecycle {
    /// Called before the record is written (insert or update).
    fn before_save(&mut self, _now: &str) {}

    /// Called after the record is inserted or read back from the store.
    fn after_load(&mut self) {}
}

/// A named sub-organisation of the portal.
///
/// `original_name` and `original_community_admin` are not persisted. They
/// hold the values seen when this instance was created or loaded, so a save
/// can tell a rename or an admin transfer apart from other edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Community {
    /// Unique identifier (UUIDv4, no dashes).
    pub id: String,

    /// Unique display name. Group names are derived from it.
    pub name: String,

    /// Unique URL slug.
    pub slug: String,

    /// Position in listings (ascending).
    pub order: i64,

    /// SystersUser id of the administrator.
    pub community_admin: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mailing_list: Option<String>,

    /// Parent community id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_community: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub googleplus: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,

    /// RFC 3339 creation timestamp.
    pub created_at: String,

    /// RFC 3339 last update timestamp.
    pub updated_at: String,

    #[serde(skip)]
    pub original_name: String,

    #[serde(skip)]
    pub original_community_admin: String,
}

impl Community {
    /// The name differs from the one seen at load time.
    pub fn has_changed_name(&self) -> bool {
        self.name != self.original_name
    }

    /// The admin differs from the one seen at load time.
    pub fn has_changed_community_admin(&self) -> bool {
        self.community_admin != self.original_community_admin
    }
}

impl Lifecycle for Community {
    fn before_save(&mut self, now: &str) {
        self.updated_at = now.to_string();
    }

    fn after_load(&mut self) {
        self.original_name = self.name.clone();
        self.original_community_admin = self.community_admin.clone();
    }
}

/// Input for creating a new community.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCommunity {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub order: i64,
    /// SystersUser id of the administrator.
    pub community_admin: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mailing_list: Option<String>,
    #[serde(default)]
    pub parent_community: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub facebook: Option<String>,
    #[serde(default)]
    pub googleplus: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
}

/// Whether `slug` is non-empty and made of `[a-z0-9-]` only.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Derive a slug from a display name: lower-case, runs of other
/// characters collapsed to a single `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
