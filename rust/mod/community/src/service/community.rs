use portal_core::{ListParams, ListResult, merge_patch, new_id, now_rfc3339};
use portal_sql::Value;
use tracing::{debug, info};

use crate::model::{Community, CreateCommunity, Lifecycle, is_valid_slug};
use crate::permissions::{GROUP_TEMPLATES, group_name};
use crate::service::{CommunityError, CommunityService, decode_data};
use crate::signals::SignalEvent;
use crate::utils;

impl CommunityService {
    /// Create a community and fire `PostSave { created: true }`.
    ///
    /// The returned instance has its original fields set to the inserted
    /// values.
    pub fn create_community(&self, input: CreateCommunity) -> Result<Community, CommunityError> {
        let now = now_rfc3339();
        let mut community = Community {
            id: new_id(),
            name: input.name.trim().to_string(),
            slug: input.slug,
            order: input.order,
            community_admin: input.community_admin,
            email: input.email,
            mailing_list: input.mailing_list,
            parent_community: input.parent_community,
            website: input.website,
            facebook: input.facebook,
            googleplus: input.googleplus,
            twitter: input.twitter,
            created_at: now.clone(),
            updated_at: now.clone(),
            original_name: String::new(),
            original_community_admin: String::new(),
        };
        self.validate(&community)?;
        community.before_save(&now);

        let indexes = Self::indexes(&community);
        self.insert_record("communities", &community.id, &community, &indexes)?;
        community.after_load();
        info!("created community {} ({})", community.name, community.slug);

        self.signals.send(
            self,
            &SignalEvent::PostSave {
                community: &community,
                created: true,
            },
        )?;
        Ok(community)
    }

    /// Get a community by id. Original fields reflect the stored values.
    pub fn get_community(&self, id: &str) -> Result<Community, CommunityError> {
        self.load_by("id", id)?
            .ok_or_else(|| CommunityError::NotFound(format!("community {}", id)))
    }

    /// Get a community by slug.
    pub fn get_community_by_slug(&self, slug: &str) -> Result<Community, CommunityError> {
        self.load_by("slug", slug)?
            .ok_or_else(|| CommunityError::NotFound(format!("community '{}'", slug)))
    }

    /// Get a community by exact name.
    pub fn get_community_by_name(&self, name: &str) -> Result<Community, CommunityError> {
        self.load_by("name", name)?
            .ok_or_else(|| CommunityError::NotFound(format!("community '{}'", name)))
    }

    /// List communities ordered by `order`, then name.
    pub fn list_communities(
        &self,
        params: &ListParams,
    ) -> Result<ListResult<Community>, CommunityError> {
        let total = self
            .sql
            .query_one("SELECT COUNT(*) AS cnt FROM communities", &[])?
            .and_then(|r| r.get_i64("cnt"))
            .unwrap_or(0) as usize;

        let rows = self.sql.query(
            "SELECT data FROM communities ORDER BY sort_order, name LIMIT ?1 OFFSET ?2",
            &[
                Value::Integer(params.limit as i64),
                Value::Integer(params.offset as i64),
            ],
        )?;
        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut community: Community = decode_data(row)?;
            community.after_load();
            items.push(community);
        }
        Ok(ListResult { items, total })
    }

    /// Persist the live fields and fire `PostSave { created: false }`.
    ///
    /// The original fields are left untouched, so receivers can compare them
    /// against the new values.
    pub fn save_community(&self, community: &mut Community) -> Result<(), CommunityError> {
        self.validate(community)?;
        self.signals.send(
            self,
            &SignalEvent::PreSave {
                community: &*community,
            },
        )?;
        let now = now_rfc3339();
        community.before_save(&now);

        let indexes = Self::indexes(community);
        self.update_record("communities", &community.id, community, &indexes)?;
        debug!("saved community {}", community.id);

        self.signals.send(
            self,
            &SignalEvent::PostSave {
                community: &*community,
                created: false,
            },
        )
    }

    /// Apply a JSON merge-patch to a stored community and save it.
    ///
    /// `id`, `created_at` and `updated_at` cannot be patched.
    pub fn update_community(
        &self,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<Community, CommunityError> {
        let current = self.get_community(id)?;

        let mut base = serde_json::to_value(&current)
            .map_err(|e| CommunityError::Internal(e.to_string()))?;
        merge_patch(&mut base, &patch);
        base["id"] = serde_json::json!(current.id);
        base["created_at"] = serde_json::json!(current.created_at);
        base["updated_at"] = serde_json::json!(current.updated_at);

        let mut updated: Community = serde_json::from_value(base)
            .map_err(|e| CommunityError::Validation(format!("invalid patch: {}", e)))?;
        updated.original_name = current.original_name;
        updated.original_community_admin = current.original_community_admin;

        self.save_community(&mut updated)?;
        Ok(updated)
    }

    /// Delete a community and fire `PostDelete`.
    ///
    /// Object-level grants on the row are dropped; children lose their parent.
    pub fn delete_community(&self, id: &str) -> Result<Community, CommunityError> {
        let community = self.get_community(id)?;

        let children = self.sql.query(
            "SELECT data FROM communities WHERE parent_id = ?1",
            &[Value::Text(id.to_string())],
        )?;
        for row in &children {
            let mut child: Community = decode_data(row)?;
            child.parent_community = None;
            let indexes = Self::indexes(&child);
            self.update_record("communities", &child.id, &child, &indexes)?;
        }

        let affected = self.sql.exec(
            "DELETE FROM communities WHERE id = ?1",
            &[Value::Text(id.to_string())],
        )?;
        if affected == 0 {
            return Err(CommunityError::NotFound(format!("community {}", id)));
        }
        self.auth
            .clear_object_perms(&utils::community_object(&community))?;
        info!("deleted community {} ({})", community.name, community.slug);

        self.signals.send(
            self,
            &SignalEvent::PostDelete {
                community: &community,
            },
        )?;
        Ok(community)
    }

    // ── Members ──

    /// Add a SystersUser to a community. Adding twice is a no-op.
    pub fn add_member(&self, community_id: &str, systers_user_id: &str) -> Result<(), CommunityError> {
        let _community = self.get_community(community_id)?;
        let _profile = self.auth.get_systers_user(systers_user_id)?;
        self.sql.exec(
            "INSERT OR IGNORE INTO community_members (community_id, systers_user_id, joined_at) \
             VALUES (?1, ?2, ?3)",
            &[
                Value::Text(community_id.to_string()),
                Value::Text(systers_user_id.to_string()),
                Value::Text(now_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Remove a SystersUser from a community and from all of its groups.
    /// Returns false if they were not a member.
    pub fn remove_member(
        &self,
        community_id: &str,
        systers_user_id: &str,
    ) -> Result<bool, CommunityError> {
        let community = self.get_community(community_id)?;
        let affected = self.sql.exec(
            "DELETE FROM community_members WHERE community_id = ?1 AND systers_user_id = ?2",
            &[
                Value::Text(community_id.to_string()),
                Value::Text(systers_user_id.to_string()),
            ],
        )?;
        for (_, template) in GROUP_TEMPLATES {
            if let Some(group) = self.auth.find_group_by_name(&group_name(template, &community.name))? {
                self.auth.leave_group(&group.id, systers_user_id)?;
            }
        }
        Ok(affected > 0)
    }

    /// Whether a SystersUser is a member of a community.
    pub fn is_member(&self, community_id: &str, systers_user_id: &str) -> Result<bool, CommunityError> {
        let row = self.sql.query_one(
            "SELECT 1 AS hit FROM community_members WHERE community_id = ?1 AND systers_user_id = ?2",
            &[
                Value::Text(community_id.to_string()),
                Value::Text(systers_user_id.to_string()),
            ],
        )?;
        Ok(row.is_some())
    }

    /// SystersUser ids of the members, in join order.
    pub fn list_members(&self, community_id: &str) -> Result<Vec<String>, CommunityError> {
        let rows = self.sql.query(
            "SELECT systers_user_id FROM community_members WHERE community_id = ?1 ORDER BY rowid",
            &[Value::Text(community_id.to_string())],
        )?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get_str("systers_user_id").map(str::to_string))
            .collect())
    }

    // ── Users ──

    /// Delete a user together with every community their profile
    /// administers. Each community goes through [`Self::delete_community`],
    /// so its groups are torn down as well.
    pub fn delete_user(&self, user_id: &str) -> Result<Vec<Community>, CommunityError> {
        let profile = self.auth.get_systers_user_by_user(user_id)?;
        let rows = self.sql.query(
            "SELECT id FROM communities WHERE community_admin = ?1 ORDER BY rowid",
            &[Value::Text(profile.id.clone())],
        )?;

        let mut removed = Vec::with_capacity(rows.len());
        for id in rows.iter().filter_map(|r| r.get_str("id")) {
            removed.push(self.delete_community(id)?);
        }
        self.auth.delete_user(user_id)?;
        info!("deleted user {} and {} communities", user_id, removed.len());
        Ok(removed)
    }

    // ── Internals ──

    fn load_by(&self, column: &str, value: &str) -> Result<Option<Community>, CommunityError> {
        let mut community: Option<Community> = self.find_record("communities", column, value)?;
        if let Some(c) = community.as_mut() {
            c.after_load();
        }
        Ok(community)
    }

    fn validate(&self, community: &Community) -> Result<(), CommunityError> {
        if community.name.trim().is_empty() {
            return Err(CommunityError::Validation("community name cannot be empty".into()));
        }
        if !is_valid_slug(&community.slug) {
            return Err(CommunityError::Validation(format!(
                "invalid slug '{}': use lower-case letters, digits and '-'",
                community.slug
            )));
        }
        self.auth
            .get_systers_user(&community.community_admin)
            .map_err(|_| {
                CommunityError::Validation(format!(
                    "community admin {} does not exist",
                    community.community_admin
                ))
            })?;
        if let Some(parent_id) = &community.parent_community {
            if *parent_id == community.id {
                return Err(CommunityError::Validation(
                    "a community cannot be its own parent".into(),
                ));
            }
            self.load_by("id", parent_id)?.ok_or_else(|| {
                CommunityError::Validation(format!("parent community {} does not exist", parent_id))
            })?;
        }
        Ok(())
    }

    fn indexes(community: &Community) -> Vec<(&'static str, Value)> {
        vec![
            ("name", Value::Text(community.name.clone())),
            ("slug", Value::Text(community.slug.clone())),
            ("sort_order", Value::Integer(community.order)),
            ("community_admin", Value::Text(community.community_admin.clone())),
            ("parent_id", Value::opt_text(community.parent_community.as_deref())),
            ("created_at", Value::Text(community.created_at.clone())),
            ("updated_at", Value::Text(community.updated_at.clone())),
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use auth::AuthService;
    use auth::model::CreateUser;
    use portal_sql::SqliteStore;

    use super::*;
    use crate::signals::Signal;

    fn test_service() -> Arc<CommunityService> {
        let sql = Arc::new(SqliteStore::open_in_memory().unwrap());
        let auth = AuthService::new(sql).unwrap();
        let svc = CommunityService::new(auth).unwrap();
        svc.signals().disconnect(Signal::PostSave, "create_groups");
        svc.signals().disconnect(Signal::PostDelete, "remove_groups");
        svc
    }

    fn profile(svc: &CommunityService, username: &str) -> String {
        let user = svc
            .auth()
            .create_user(CreateUser {
                username: username.into(),
                password: "foobar".into(),
                email: None,
            })
            .unwrap();
        svc.auth().get_systers_user_by_user(&user.id).unwrap().id
    }

    fn input(name: &str, slug: &str, admin: &str) -> CreateCommunity {
        CreateCommunity {
            name: name.into(),
            slug: slug.into(),
            order: 1,
            community_admin: admin.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_community_crud() {
        let svc = test_service();
        let admin = profile(&svc, "foo");

        let created = svc.create_community(input("Foo", "foo", &admin)).unwrap();
        let fetched = svc.get_community(&created.id).unwrap();
        assert_eq!(fetched, created);
        assert_eq!(svc.get_community_by_slug("foo").unwrap().id, created.id);
        assert_eq!(svc.get_community_by_name("Foo").unwrap().id, created.id);

        let updated = svc
            .update_community(&created.id, serde_json::json!({"website": "https://foo.org"}))
            .unwrap();
        assert_eq!(updated.website.as_deref(), Some("https://foo.org"));
        assert_eq!(
            svc.get_community(&created.id).unwrap().website.as_deref(),
            Some("https://foo.org")
        );

        svc.delete_community(&created.id).unwrap();
        assert!(matches!(
            svc.get_community(&created.id),
            Err(CommunityError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_slug_and_name() {
        let svc = test_service();
        let admin = profile(&svc, "foo");
        svc.create_community(input("Foo", "foo", &admin)).unwrap();

        let err = svc.create_community(input("Other", "foo", &admin)).unwrap_err();
        assert!(matches!(err, CommunityError::Conflict(_)));
        let err = svc.create_community(input("Foo", "other", &admin)).unwrap_err();
        assert!(matches!(err, CommunityError::Conflict(_)));
    }

    #[test]
    fn test_validation() {
        let svc = test_service();
        let admin = profile(&svc, "foo");

        let err = svc.create_community(input("", "foo", &admin)).unwrap_err();
        assert!(matches!(err, CommunityError::Validation(_)));
        let err = svc.create_community(input("Foo", "Foo Bar", &admin)).unwrap_err();
        assert!(matches!(err, CommunityError::Validation(_)));
        let err = svc.create_community(input("Foo", "foo", "missing")).unwrap_err();
        assert!(matches!(err, CommunityError::Validation(_)));

        let mut child = input("Child", "child", &admin);
        child.parent_community = Some("missing".into());
        assert!(matches!(
            svc.create_community(child),
            Err(CommunityError::Validation(_))
        ));
    }

    #[test]
    fn test_list_order() {
        let svc = test_service();
        let admin = profile(&svc, "foo");
        let mut b = input("Beta", "beta", &admin);
        b.order = 2;
        let mut a = input("Alpha", "alpha", &admin);
        a.order = 2;
        let mut z = input("Zeta", "zeta", &admin);
        z.order = 1;
        for c in [b, a, z] {
            svc.create_community(c).unwrap();
        }

        let list = svc.list_communities(&ListParams::default()).unwrap();
        assert_eq!(list.total, 3);
        let names: Vec<_> = list.items.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Beta"]);

        let page = svc
            .list_communities(&ListParams { limit: 1, offset: 1 })
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Alpha");
        assert_eq!(page.total, 3);
    }

    #[test]
    fn test_originals_refresh_on_load() {
        let svc = test_service();
        let foo = profile(&svc, "foo");
        let bar = profile(&svc, "bar");

        let mut community = svc.create_community(input("Foo", "foo", &foo)).unwrap();
        community.name = "Bar".into();
        community.community_admin = bar.clone();
        svc.save_community(&mut community).unwrap();
        assert_eq!(community.original_name, "Foo");
        assert_eq!(community.original_community_admin, foo);

        let reloaded = svc.get_community(&community.id).unwrap();
        assert_eq!(reloaded.original_name, "Bar");
        assert_eq!(reloaded.original_community_admin, bar);
        assert!(!reloaded.has_changed_name());
    }

    #[test]
    fn test_members() {
        let svc = test_service();
        let foo = profile(&svc, "foo");
        let bar = profile(&svc, "bar");
        let community = svc.create_community(input("Foo", "foo", &foo)).unwrap();

        svc.add_member(&community.id, &bar).unwrap();
        svc.add_member(&community.id, &bar).unwrap();
        assert!(svc.is_member(&community.id, &bar).unwrap());
        assert_eq!(svc.list_members(&community.id).unwrap(), vec![bar.clone()]);

        assert!(svc.remove_member(&community.id, &bar).unwrap());
        assert!(!svc.is_member(&community.id, &bar).unwrap());
        assert!(!svc.remove_member(&community.id, &bar).unwrap());
    }

    #[test]
    fn test_delete_orphans_children() {
        let svc = test_service();
        let admin = profile(&svc, "foo");
        let parent = svc.create_community(input("Parent", "parent", &admin)).unwrap();
        let mut child = input("Child", "child", &admin);
        child.parent_community = Some(parent.id.clone());
        let child = svc.create_community(child).unwrap();

        svc.delete_community(&parent.id).unwrap();
        let child = svc.get_community(&child.id).unwrap();
        assert_eq!(child.parent_community, None);
    }
}
