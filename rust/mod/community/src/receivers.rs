//! Default receivers that keep a community's groups in step with the record.

use tracing::{debug, info};

use crate::model::Community;
use crate::service::{CommunityError, CommunityService};
use crate::signals::{Signal, SignalEvent, Signals};
use crate::utils;

/// Dispatch uid of [`manage_community_groups`].
pub const CREATE_GROUPS_UID: &str = "create_groups";

/// Dispatch uid of [`remove_community_groups`].
pub const REMOVE_GROUPS_UID: &str = "remove_groups";

/// Dispatch uid of [`check_group_names`].
pub const CHECK_GROUP_NAMES_UID: &str = "check_group_names";

/// Connect the group-management receivers under their fixed uids.
pub fn connect_default_receivers(signals: &Signals) {
    signals.connect(Signal::PreSave, CHECK_GROUP_NAMES_UID, check_group_names);
    signals.connect(Signal::PostSave, CREATE_GROUPS_UID, manage_community_groups);
    signals.connect(Signal::PostDelete, REMOVE_GROUPS_UID, remove_community_groups);
}

/// Pre-save: refuse a rename whose group names are already taken.
pub fn check_group_names(
    svc: &CommunityService,
    event: &SignalEvent<'_>,
) -> Result<(), CommunityError> {
    let SignalEvent::PreSave { community } = event else {
        return Ok(());
    };
    if community.has_changed_name() {
        utils::check_rename(&svc.auth, &community.original_name, &community.name)?;
    }
    Ok(())
}

/// Post-save: provision groups for a new community, or follow a rename and
/// an admin transfer on an existing one.
pub fn manage_community_groups(
    svc: &CommunityService,
    event: &SignalEvent<'_>,
) -> Result<(), CommunityError> {
    let SignalEvent::PostSave { community, created } = event else {
        return Ok(());
    };

    if *created {
        let groups = utils::create_groups(&svc.auth, &community.name)?;
        utils::assign_permissions(&svc.auth, community, &groups)?;
        let admin_group = utils::community_admin_group(&svc.auth, &community.name)?;
        svc.auth.join_group(&admin_group.id, &community.community_admin)?;
        svc.add_member(&community.id, &community.community_admin)?;
        info!("community {:?} provisioned", community.name);
        return Ok(());
    }

    if community.has_changed_name() {
        utils::rename_groups(&svc.auth, &community.original_name, &community.name)?;
    }
    if community.has_changed_community_admin() {
        transfer_admin(svc, community)?;
    }
    Ok(())
}

/// Post-delete: drop every group prefixed with the community name.
pub fn remove_community_groups(
    svc: &CommunityService,
    event: &SignalEvent<'_>,
) -> Result<(), CommunityError> {
    let SignalEvent::PostDelete { community } = event else {
        return Ok(());
    };
    utils::remove_groups(&svc.auth, &community.name)?;
    Ok(())
}

fn transfer_admin(svc: &CommunityService, community: &Community) -> Result<(), CommunityError> {
    let admin_group = utils::community_admin_group(&svc.auth, &community.name)?;
    svc.auth
        .leave_group(&admin_group.id, &community.original_community_admin)?;
    svc.auth.join_group(&admin_group.id, &community.community_admin)?;
    svc.add_member(&community.id, &community.community_admin)?;
    debug!(
        "admin of {:?} moved from {} to {}",
        community.name, community.original_community_admin, community.community_admin
    );
    Ok(())
}
