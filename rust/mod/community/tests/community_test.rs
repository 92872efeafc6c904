//! Provisioning flow tests against an in-memory store.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use auth::{AuthError, AuthService};
use auth::model::CreateUser;
use community::permissions::{GROUP_TEMPLATES, group_name, group_permissions};
use community::receivers::{CREATE_GROUPS_UID, REMOVE_GROUPS_UID};
use community::utils::{
    assign_permissions, community_admin_group, community_groups, community_object, create_groups,
    remove_groups, rename_groups,
};
use community::{Community, CommunityError, CommunityService, CreateCommunity, Signal, SignalEvent};
use portal_sql::SqliteStore;

fn service() -> Arc<CommunityService> {
    let sql = Arc::new(SqliteStore::open_in_memory().unwrap());
    let auth = AuthService::new(sql).unwrap();
    CommunityService::new(auth).unwrap()
}

/// Service with the post-save provisioning receiver disconnected.
fn detached_service() -> Arc<CommunityService> {
    let svc = service();
    assert!(svc.signals().disconnect(Signal::PostSave, CREATE_GROUPS_UID));
    svc
}

fn systers_user(svc: &CommunityService, username: &str, password: &str) -> String {
    let user = svc
        .auth()
        .create_user(CreateUser {
            username: username.into(),
            password: password.into(),
            email: None,
        })
        .unwrap();
    svc.auth().get_systers_user_by_user(&user.id).unwrap().id
}

fn create_community(svc: &CommunityService, name: &str, slug: &str, admin: &str) -> Community {
    svc.create_community(CreateCommunity {
        name: name.into(),
        slug: slug.into(),
        order: 1,
        community_admin: admin.into(),
        ..Default::default()
    })
    .unwrap()
}

fn group_names(svc: &CommunityService, prefix: &str) -> Vec<String> {
    community_groups(svc.auth(), prefix)
        .unwrap()
        .into_iter()
        .map(|g| g.name)
        .collect()
}

#[test]
fn test_create_groups() {
    let svc = detached_service();
    let name = "Foo";
    let groups = create_groups(svc.auth(), name).unwrap();

    let expected: Vec<String> = GROUP_TEMPLATES
        .iter()
        .map(|(_, template)| group_name(template, name))
        .collect();
    let names: Vec<String> = groups.iter().map(|g| g.name.clone()).collect();
    assert_eq!(names, expected);

    let persisted = community_groups(svc.auth(), name).unwrap();
    assert_eq!(persisted, groups);
}

#[test]
fn test_create_groups_is_idempotent() {
    let svc = detached_service();
    let first = create_groups(svc.auth(), "Foo").unwrap();
    let second = create_groups(svc.auth(), "Foo").unwrap();
    assert_eq!(first, second);
    assert_eq!(community_groups(svc.auth(), "Foo").unwrap().len(), GROUP_TEMPLATES.len());
}

#[test]
fn test_assign_permissions() {
    let svc = detached_service();
    let admin = systers_user(&svc, "foo", "foobar");
    let community = create_community(&svc, "Foo", "foo", &admin);
    let groups = create_groups(svc.auth(), &community.name).unwrap();
    assign_permissions(svc.auth(), &community, &groups).unwrap();

    let object = community_object(&community);
    for (key, template) in GROUP_TEMPLATES {
        let group = svc
            .auth()
            .get_group_by_name(&group_name(template, &community.name))
            .unwrap();
        let mut perms: Vec<String> = svc.auth().group_permissions(&group.id).unwrap();
        perms.extend(svc.auth().get_perms(&group.id, &object).unwrap());

        let held: BTreeSet<String> = perms.into_iter().collect();
        let expected: BTreeSet<String> =
            group_permissions(key).into_iter().map(str::to_string).collect();
        assert_eq!(held, expected, "permissions of {key}");
    }

    // running it again grants nothing new
    assign_permissions(svc.auth(), &community, &groups).unwrap();
    let admin_group = &groups[0];
    assert_eq!(
        svc.auth().get_perms(&admin_group.id, &object).unwrap().len()
            + svc.auth().group_permissions(&admin_group.id).unwrap().len(),
        group_permissions("community_admin").len()
    );
}

#[test]
fn test_assign_permissions_missing_group() {
    let svc = detached_service();
    let admin = systers_user(&svc, "foo", "foobar");
    let community = create_community(&svc, "Foo", "foo", &admin);
    let mut groups = create_groups(svc.auth(), &community.name).unwrap();
    groups.pop();

    let err = assign_permissions(svc.auth(), &community, &groups).unwrap_err();
    assert!(matches!(err, CommunityError::NotFound(_)));
}

#[test]
fn test_original_values() {
    let svc = detached_service();
    let foo = systers_user(&svc, "foo", "foobar");
    let name = "Foo";
    let mut community = create_community(&svc, name, "foo", &foo);
    assert_eq!(community.original_name, name);
    assert_eq!(community.community_admin, foo);

    community.name = "Bar".into();
    let bar = systers_user(&svc, "bar", "barfoo");
    community.community_admin = bar;
    svc.save_community(&mut community).unwrap();

    assert_eq!(community.original_name, name);
    assert_eq!(community.original_community_admin, foo);
}

#[test]
fn test_remove_groups() {
    let svc = detached_service();
    let name = "Foo";
    create_groups(svc.auth(), name).unwrap();
    let removed = remove_groups(svc.auth(), name).unwrap();
    assert_eq!(removed, GROUP_TEMPLATES.len());
    assert!(community_groups(svc.auth(), name).unwrap().is_empty());
}

#[test]
fn test_remove_groups_is_a_literal_prefix() {
    let svc = detached_service();
    create_groups(svc.auth(), "Foo").unwrap();
    create_groups(svc.auth(), "Foobar").unwrap();
    create_groups(svc.auth(), "100%").unwrap();
    create_groups(svc.auth(), "100x").unwrap();

    assert_eq!(remove_groups(svc.auth(), "Foo").unwrap(), 2 * GROUP_TEMPLATES.len());
    assert!(group_names(&svc, "Foobar").is_empty());

    assert_eq!(remove_groups(svc.auth(), "100%").unwrap(), GROUP_TEMPLATES.len());
    assert_eq!(group_names(&svc, "100x").len(), GROUP_TEMPLATES.len());
}

#[test]
fn test_create_provisions_groups() {
    let svc = service();
    let admin = systers_user(&svc, "foo", "foobar");
    let community = create_community(&svc, "Foo", "foo", &admin);

    assert_eq!(group_names(&svc, "Foo").len(), GROUP_TEMPLATES.len());

    let admin_group = community_admin_group(svc.auth(), "Foo").unwrap();
    assert!(svc.auth().is_group_member(&admin_group.id, &admin).unwrap());
    assert!(svc.is_member(&community.id, &admin).unwrap());

    let object = community_object(&community);
    assert!(
        svc.auth()
            .user_has_perm(&admin, "change_community", Some(&object))
            .unwrap()
    );
    assert!(svc.auth().user_has_perm(&admin, "add_tag", None).unwrap());
    assert!(!svc.auth().user_has_perm(&admin, "change_community", None).unwrap());
}

#[test]
fn test_rename_follows_groups() {
    let svc = service();
    let admin = systers_user(&svc, "foo", "foobar");
    let community = create_community(&svc, "Foo", "foo", &admin);
    let before = community_groups(svc.auth(), "Foo").unwrap();

    let renamed = svc
        .update_community(&community.id, serde_json::json!({"name": "Bar"}))
        .unwrap();
    assert_eq!(renamed.name, "Bar");

    assert!(group_names(&svc, "Foo").is_empty());
    let after = community_groups(svc.auth(), "Bar").unwrap();
    let expected: Vec<String> = GROUP_TEMPLATES
        .iter()
        .map(|(_, template)| group_name(template, "Bar"))
        .collect();
    assert_eq!(after.iter().map(|g| g.name.clone()).collect::<Vec<_>>(), expected);
    // same rows, so grants and memberships carry over
    assert_eq!(
        after.iter().map(|g| &g.id).collect::<Vec<_>>(),
        before.iter().map(|g| &g.id).collect::<Vec<_>>()
    );
    assert!(svc.auth().is_group_member(&after[0].id, &admin).unwrap());
}

#[test]
fn test_admin_transfer_moves_membership() {
    let svc = service();
    let foo = systers_user(&svc, "foo", "foobar");
    let bar = systers_user(&svc, "bar", "barfoo");
    let community = create_community(&svc, "Foo", "foo", &foo);

    svc.update_community(&community.id, serde_json::json!({"community_admin": bar}))
        .unwrap();

    let admin_group = community_admin_group(svc.auth(), "Foo").unwrap();
    assert!(!svc.auth().is_group_member(&admin_group.id, &foo).unwrap());
    assert!(svc.auth().is_group_member(&admin_group.id, &bar).unwrap());
    assert!(svc.is_member(&community.id, &bar).unwrap());
    // the previous admin stays a plain member
    assert!(svc.is_member(&community.id, &foo).unwrap());
}

#[test]
fn test_delete_removes_groups() {
    let svc = service();
    let admin = systers_user(&svc, "foo", "foobar");
    let community = create_community(&svc, "Foo", "foo", &admin);

    svc.delete_community(&community.id).unwrap();

    assert!(group_names(&svc, "Foo").is_empty());
    assert!(svc.auth().list_user_groups(&admin).unwrap().is_empty());
    let object = community_object(&community);
    assert!(
        !svc.auth()
            .user_has_perm(&admin, "change_community", Some(&object))
            .unwrap()
    );
}

#[test]
fn test_delete_without_receiver_keeps_groups() {
    let svc = service();
    assert!(svc.signals().disconnect(Signal::PostDelete, REMOVE_GROUPS_UID));
    let admin = systers_user(&svc, "foo", "foobar");
    let community = create_community(&svc, "Foo", "foo", &admin);

    svc.delete_community(&community.id).unwrap();
    assert_eq!(group_names(&svc, "Foo").len(), GROUP_TEMPLATES.len());
}

#[test]
fn test_connect_replaces_same_uid() {
    let svc = detached_service();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let calls = Arc::clone(&calls);
        svc.signals().connect(Signal::PostSave, "counter", move |_, event| {
            if let SignalEvent::PostSave { created: true, .. } = event {
                calls.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        });
    }

    let admin = systers_user(&svc, "foo", "foobar");
    create_community(&svc, "Foo", "foo", &admin);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(svc.signals().disconnect(Signal::PostSave, "counter"));
    assert!(!svc.signals().disconnect(Signal::PostSave, "counter"));
    assert!(!svc.signals().is_connected(Signal::PostSave, "counter"));
}

#[test]
fn test_receiver_error_is_returned() {
    let svc = detached_service();
    svc.signals().connect(Signal::PostSave, "reject", |_, _| {
        Err(CommunityError::Validation("rejected".into()))
    });

    let admin = systers_user(&svc, "foo", "foobar");
    let err = svc
        .create_community(CreateCommunity {
            name: "Foo".into(),
            slug: "foo".into(),
            community_admin: admin,
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, CommunityError::Validation(_)));
    // the row was written before the receivers ran
    assert_eq!(svc.get_community_by_slug("foo").unwrap().name, "Foo");
}

#[test]
fn test_rename_onto_taken_group_names_fails() {
    let svc = service();
    let admin = systers_user(&svc, "foo", "foobar");
    let community = create_community(&svc, "Foo", "foo", &admin);
    let taken = create_groups(svc.auth(), "Bar").unwrap();

    let err = svc
        .update_community(&community.id, serde_json::json!({"name": "Bar"}))
        .unwrap_err();
    assert!(matches!(err, CommunityError::Conflict(_)), "unexpected error: {err}");

    // nothing was written or renamed
    assert_eq!(svc.get_community(&community.id).unwrap().name, "Foo");
    assert_eq!(group_names(&svc, "Foo").len(), GROUP_TEMPLATES.len());
    assert_eq!(community_groups(svc.auth(), "Bar").unwrap(), taken);
    let admin_group = community_admin_group(svc.auth(), "Foo").unwrap();
    assert!(svc.auth().is_group_member(&admin_group.id, &admin).unwrap());

    svc.delete_community(&community.id).unwrap();
    assert!(group_names(&svc, "Foo").is_empty());
    assert_eq!(community_groups(svc.auth(), "Bar").unwrap(), taken);
}

#[test]
fn test_rename_groups_checks_every_target_first() {
    let svc = detached_service();
    create_groups(svc.auth(), "Foo").unwrap();
    svc.auth().create_group("Bar: Community Member").unwrap();

    let err = rename_groups(svc.auth(), "Foo", "Bar").unwrap_err();
    assert!(matches!(err, CommunityError::Conflict(_)));
    assert_eq!(group_names(&svc, "Foo").len(), GROUP_TEMPLATES.len());
    assert_eq!(group_names(&svc, "Bar"), vec!["Bar: Community Member"]);
}

#[test]
fn test_repeated_rename_save_is_a_noop() {
    let svc = service();
    let admin = systers_user(&svc, "foo", "foobar");
    let mut community = create_community(&svc, "Foo", "foo", &admin);

    community.name = "Bar".into();
    svc.save_community(&mut community).unwrap();
    // originals still say "Foo", so the rename runs again
    svc.save_community(&mut community).unwrap();

    assert!(group_names(&svc, "Foo").is_empty());
    assert_eq!(group_names(&svc, "Bar").len(), GROUP_TEMPLATES.len());
}

#[test]
fn test_delete_admin_user() {
    let svc = service();
    let admin = systers_user(&svc, "foo", "foobar");
    let member = systers_user(&svc, "bar", "barfoo");
    let community = create_community(&svc, "Foo", "foo", &admin);
    svc.add_member(&community.id, &member).unwrap();
    let user_id = svc.auth().get_systers_user(&admin).unwrap().user_id;

    // the auth layer refuses while the community still points at the profile
    let err = svc.auth().delete_user(&user_id).unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)), "unexpected error: {err}");
    assert!(svc.get_community(&community.id).is_ok());

    let removed = svc.delete_user(&user_id).unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id, community.id);

    assert!(matches!(
        svc.get_community(&community.id),
        Err(CommunityError::NotFound(_))
    ));
    assert!(group_names(&svc, "Foo").is_empty());
    assert!(svc.auth().get_user(&user_id).is_err());
    assert!(svc.auth().get_systers_user(&admin).is_err());
    // other members keep their accounts
    assert!(svc.auth().get_systers_user(&member).is_ok());
}

#[test]
fn test_delete_plain_member_user() {
    let svc = service();
    let admin = systers_user(&svc, "foo", "foobar");
    let member = systers_user(&svc, "bar", "barfoo");
    let community = create_community(&svc, "Foo", "foo", &admin);
    svc.add_member(&community.id, &member).unwrap();
    let user_id = svc.auth().get_systers_user(&member).unwrap().user_id;

    assert!(svc.delete_user(&user_id).unwrap().is_empty());
    assert!(!svc.is_member(&community.id, &member).unwrap());
    assert_eq!(svc.list_members(&community.id).unwrap(), vec![admin]);
}
