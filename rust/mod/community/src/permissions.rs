//! Group templates and the per-template permission table.
//!
//! Each community gets one group per template, named by substituting the
//! community name for `{0}`. Codenames registered against the `community`
//! model are granted on the community row; every other codename is granted
//! on the group model-wide.

use auth::AuthService;

use crate::service::CommunityError;

/// Model name of the community record, used in object references.
pub const COMMUNITY_MODEL: &str = "community";

pub const COMMUNITY_ADMIN: &str = "community_admin";
pub const CONTENT_MANAGER: &str = "content_manager";
pub const USER_CONTENT_MANAGER: &str = "user_content_manager";
pub const COMMUNITY_MEMBER: &str = "community_member";

/// Template key → group name template, in provisioning order.
pub const GROUP_TEMPLATES: &[(&str, &str)] = &[
    (COMMUNITY_ADMIN, "{0}: Community Admin"),
    (CONTENT_MANAGER, "{0}: Content Manager"),
    (USER_CONTENT_MANAGER, "{0}: User and Content Manager"),
    (COMMUNITY_MEMBER, "{0}: Community Member"),
];

const CONTENT_PERMISSIONS: &[&str] = &[
    "add_community_news",
    "change_community_news",
    "delete_community_news",
    "add_community_resource",
    "change_community_resource",
    "delete_community_resource",
    "add_community_page",
    "change_community_page",
    "delete_community_page",
    "approve_community_comment",
    "delete_community_comment",
    "add_tag",
    "change_tag",
    "delete_tag",
    "add_resourcetype",
    "change_resourcetype",
    "delete_resourcetype",
];

const USER_PERMISSIONS: &[&str] = &[
    "add_community_systersuser",
    "change_community_systersuser",
    "delete_community_systersuser",
    "approve_community_joinrequest",
];

const ADMIN_ONLY_PERMISSIONS: &[&str] = &["change_community"];

const MEMBER_PERMISSIONS: &[&str] = &["view_community_resources"];

/// Catalog entries: (codename, model, display name).
pub const PERMISSION_CATALOG: &[(&str, &str, &str)] = &[
    ("add_community_news", COMMUNITY_MODEL, "Add community news"),
    ("change_community_news", COMMUNITY_MODEL, "Change community news"),
    ("delete_community_news", COMMUNITY_MODEL, "Delete community news"),
    ("add_community_resource", COMMUNITY_MODEL, "Add community resource"),
    ("change_community_resource", COMMUNITY_MODEL, "Change community resource"),
    ("delete_community_resource", COMMUNITY_MODEL, "Delete community resource"),
    ("add_community_page", COMMUNITY_MODEL, "Add community page"),
    ("change_community_page", COMMUNITY_MODEL, "Change community page"),
    ("delete_community_page", COMMUNITY_MODEL, "Delete community page"),
    ("approve_community_comment", COMMUNITY_MODEL, "Approve community comment"),
    ("delete_community_comment", COMMUNITY_MODEL, "Delete community comment"),
    ("add_community_systersuser", COMMUNITY_MODEL, "Add community members"),
    ("change_community_systersuser", COMMUNITY_MODEL, "Change community members"),
    ("delete_community_systersuser", COMMUNITY_MODEL, "Remove community members"),
    ("approve_community_joinrequest", COMMUNITY_MODEL, "Approve community join requests"),
    ("change_community", COMMUNITY_MODEL, "Can change community"),
    ("view_community_resources", COMMUNITY_MODEL, "View community resources"),
    ("add_tag", "tag", "Can add tag"),
    ("change_tag", "tag", "Can change tag"),
    ("delete_tag", "tag", "Can delete tag"),
    ("add_resourcetype", "resourcetype", "Can add resource type"),
    ("change_resourcetype", "resourcetype", "Can change resource type"),
    ("delete_resourcetype", "resourcetype", "Can delete resource type"),
];

/// Format a group template with the community name.
pub fn group_name(template: &str, community_name: &str) -> String {
    template.replace("{0}", community_name)
}

/// Template for a key, if the key exists.
pub fn template_for(key: &str) -> Option<&'static str> {
    GROUP_TEMPLATES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, t)| *t)
}

/// Codenames granted to the group of a template key.
pub fn group_permissions(key: &str) -> Vec<&'static str> {
    let parts: &[&[&str]] = match key {
        COMMUNITY_ADMIN => &[CONTENT_PERMISSIONS, USER_PERMISSIONS, ADMIN_ONLY_PERMISSIONS],
        CONTENT_MANAGER => &[CONTENT_PERMISSIONS],
        USER_CONTENT_MANAGER => &[CONTENT_PERMISSIONS, USER_PERMISSIONS],
        COMMUNITY_MEMBER => &[MEMBER_PERMISSIONS],
        _ => &[],
    };
    parts.iter().flat_map(|p| p.iter().copied()).collect()
}

/// Model a codename is registered against.
pub fn permission_model(codename: &str) -> Option<&'static str> {
    PERMISSION_CATALOG
        .iter()
        .find(|(c, _, _)| *c == codename)
        .map(|(_, m, _)| *m)
}

/// Seed the auth permission catalog with every codename used above.
pub fn register_community_permissions(auth: &AuthService) -> Result<(), CommunityError> {
    for (codename, model, name) in PERMISSION_CATALOG {
        auth.register_permission(codename, model, name)?;
    }
    Ok(())
}
