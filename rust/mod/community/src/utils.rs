//! Group provisioning and teardown for a community.

use auth::AuthService;
use auth::model::{Group, ObjectRef};
use tracing::{debug, info};

use crate::model::Community;
use crate::permissions::{
    COMMUNITY_ADMIN, COMMUNITY_MODEL, GROUP_TEMPLATES, group_name, group_permissions,
    permission_model, template_for,
};
use crate::service::CommunityError;

/// Object reference of a community row, the target of object-level grants.
pub fn community_object(community: &Community) -> ObjectRef {
    ObjectRef::new(COMMUNITY_MODEL, community.id.clone())
}

/// Get or create one group per template for `community_name`.
///
/// Returns the groups in template order. Groups that already exist are
/// reused, so calling this twice creates nothing new.
pub fn create_groups(auth: &AuthService, community_name: &str) -> Result<Vec<Group>, CommunityError> {
    let mut groups = Vec::with_capacity(GROUP_TEMPLATES.len());
    let mut created = 0;
    for (_, template) in GROUP_TEMPLATES {
        let (group, is_new) = auth.get_or_create_group(&group_name(template, community_name))?;
        if is_new {
            created += 1;
        }
        groups.push(group);
    }
    info!("provisioned groups for {:?}: {} new", community_name, created);
    Ok(groups)
}

/// Attach each template's permissions to its group.
///
/// Codenames of the community model are granted on this community's row.
/// Others are granted to the group model-wide. Re-running is a no-op.
pub fn assign_permissions(
    auth: &AuthService,
    community: &Community,
    groups: &[Group],
) -> Result<(), CommunityError> {
    let object = community_object(community);
    for (key, template) in GROUP_TEMPLATES {
        let name = group_name(template, &community.name);
        let group = groups
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| CommunityError::NotFound(format!("group '{}'", name)))?;

        for codename in group_permissions(key) {
            match permission_model(codename) {
                Some(COMMUNITY_MODEL) => {
                    auth.assign_object_perm(codename, &group.id, &object)?;
                }
                Some(_) => auth.add_group_permission(&group.id, codename)?,
                None => {
                    return Err(CommunityError::Internal(format!(
                        "permission '{}' is not cataloged",
                        codename
                    )));
                }
            }
        }
        debug!("assigned {} permissions to {:?}", key, name);
    }
    Ok(())
}

/// Delete every group whose name starts with `community_name`.
///
/// The match is a literal prefix, so a community named "Foo" also removes
/// groups of "Foobar". Returns how many groups were deleted.
pub fn remove_groups(auth: &AuthService, community_name: &str) -> Result<usize, CommunityError> {
    let removed = auth.delete_groups_with_prefix(community_name)?;
    info!("removed {} groups for {:?}", removed, community_name);
    Ok(removed)
}

/// Fail with `Conflict` if renaming the groups of `old_name` to `new_name`
/// would land on a group name that is already taken.
///
/// Only templates whose `old_name` group exists are checked.
pub fn check_rename(auth: &AuthService, old_name: &str, new_name: &str) -> Result<(), CommunityError> {
    if old_name == new_name {
        return Ok(());
    }
    for (_, template) in GROUP_TEMPLATES {
        let from = group_name(template, old_name);
        let to = group_name(template, new_name);
        if auth.find_group_by_name(&from)?.is_some() && auth.find_group_by_name(&to)?.is_some() {
            return Err(CommunityError::Conflict(format!(
                "group '{}' already exists, cannot rename '{}'",
                to, from
            )));
        }
    }
    Ok(())
}

/// Rename each template group of `old_name` to the same template formatted
/// with `new_name`.
///
/// Every target name is checked before anything is renamed, so a collision
/// leaves all groups untouched. Missing `old_name` groups are skipped, which
/// makes a repeated save of the same rename a no-op.
pub fn rename_groups(
    auth: &AuthService,
    old_name: &str,
    new_name: &str,
) -> Result<usize, CommunityError> {
    check_rename(auth, old_name, new_name)?;

    let mut renamed = 0;
    for (_, template) in GROUP_TEMPLATES {
        let from = group_name(template, old_name);
        let Some(group) = auth.find_group_by_name(&from)? else {
            debug!("group {:?} missing, not renamed", from);
            continue;
        };
        auth.rename_group(&group.id, &group_name(template, new_name))?;
        renamed += 1;
    }
    info!("renamed {} groups from {:?} to {:?}", renamed, old_name, new_name);
    Ok(renamed)
}

/// Persisted groups whose name starts with `community_name`, in creation order.
pub fn community_groups(auth: &AuthService, community_name: &str) -> Result<Vec<Group>, CommunityError> {
    Ok(auth.list_groups_with_prefix(community_name)?)
}

/// The Community Admin group of `community_name`.
pub fn community_admin_group(
    auth: &AuthService,
    community_name: &str,
) -> Result<Group, CommunityError> {
    let template = template_for(COMMUNITY_ADMIN)
        .ok_or_else(|| CommunityError::Internal("no admin template".into()))?;
    Ok(auth.get_group_by_name(&group_name(template, community_name))?)
}
