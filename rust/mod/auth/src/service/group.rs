use portal_core::{new_id, now_rfc3339};
use portal_sql::Value;
use tracing::debug;

use crate::model::{Group, GroupMember};
use crate::service::{AuthError, AuthService, decode_data};

impl AuthService {
    /// Create a new group. Names are unique.
    pub fn create_group(&self, name: &str) -> Result<Group, AuthError> {
        if name.trim().is_empty() {
            return Err(AuthError::Validation("group name cannot be empty".into()));
        }

        let now = now_rfc3339();
        let group = Group {
            id: new_id(),
            name: name.to_string(),
            created_at: now.clone(),
            updated_at: now.clone(),
        };

        self.insert_record(
            "groups",
            &group.id,
            &group,
            &[
                ("name", Value::Text(group.name.clone())),
                ("created_at", Value::Text(now.clone())),
                ("updated_at", Value::Text(now)),
            ],
        )
        .map_err(|e| match e {
            AuthError::Conflict(_) => {
                AuthError::Conflict(format!("group '{}' already exists", group.name))
            }
            other => other,
        })?;

        debug!("created group {}", group.name);
        Ok(group)
    }

    /// Get the group with this name, creating it if missing.
    ///
    /// The flag is true when the group was created by this call.
    pub fn get_or_create_group(&self, name: &str) -> Result<(Group, bool), AuthError> {
        if let Some(group) = self.find_group_by_name(name)? {
            return Ok((group, false));
        }
        Ok((self.create_group(name)?, true))
    }

    /// Get a group by id.
    pub fn get_group(&self, id: &str) -> Result<Group, AuthError> {
        self.get_record("groups", id)
    }

    /// Find a group by exact name.
    pub fn find_group_by_name(&self, name: &str) -> Result<Option<Group>, AuthError> {
        self.find_record("groups", "name", name)
    }

    /// Get a group by exact name.
    pub fn get_group_by_name(&self, name: &str) -> Result<Group, AuthError> {
        self.find_group_by_name(name)?
            .ok_or_else(|| AuthError::NotFound(format!("group '{}'", name)))
    }

    /// Groups whose name starts with `prefix`, in creation order.
    ///
    /// The prefix is matched literally; `%` and `_` carry no special meaning.
    pub fn list_groups_with_prefix(&self, prefix: &str) -> Result<Vec<Group>, AuthError> {
        let rows = self.sql.query(
            "SELECT data FROM groups WHERE substr(name, 1, length(?1)) = ?1 ORDER BY rowid",
            &[Value::Text(prefix.to_string())],
        )?;
        rows.iter().map(decode_data::<Group>).collect()
    }

    /// Rename a group.
    pub fn rename_group(&self, id: &str, new_name: &str) -> Result<Group, AuthError> {
        if new_name.trim().is_empty() {
            return Err(AuthError::Validation("group name cannot be empty".into()));
        }
        let mut group = self.get_group(id)?;
        let now = now_rfc3339();
        group.name = new_name.to_string();
        group.updated_at = now.clone();

        self.update_record(
            "groups",
            id,
            &group,
            &[
                ("name", Value::Text(group.name.clone())),
                ("updated_at", Value::Text(now)),
            ],
        )?;
        Ok(group)
    }

    /// Delete a group. Memberships and grants cascade.
    pub fn delete_group(&self, id: &str) -> Result<(), AuthError> {
        self.delete_record("groups", id)
    }

    /// Delete every group whose name starts with `prefix`. Returns how many went.
    pub fn delete_groups_with_prefix(&self, prefix: &str) -> Result<usize, AuthError> {
        let removed = self.sql.exec(
            "DELETE FROM groups WHERE substr(name, 1, length(?1)) = ?1",
            &[Value::Text(prefix.to_string())],
        )?;
        debug!("deleted {} groups with prefix {:?}", removed, prefix);
        Ok(removed as usize)
    }

    // ── Group Members ──

    /// Add a SystersUser to a group. Joining twice is a no-op.
    pub fn join_group(&self, group_id: &str, systers_user_id: &str) -> Result<(), AuthError> {
        let _group = self.get_group(group_id)?;
        let _profile = self.get_systers_user(systers_user_id)?;

        self.sql.exec(
            "INSERT OR IGNORE INTO group_members (group_id, systers_user_id, added_at) VALUES (?1, ?2, ?3)",
            &[
                Value::Text(group_id.to_string()),
                Value::Text(systers_user_id.to_string()),
                Value::Text(now_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Remove a SystersUser from a group. Returns false if they were not a member.
    pub fn leave_group(&self, group_id: &str, systers_user_id: &str) -> Result<bool, AuthError> {
        let affected = self.sql.exec(
            "DELETE FROM group_members WHERE group_id = ?1 AND systers_user_id = ?2",
            &[
                Value::Text(group_id.to_string()),
                Value::Text(systers_user_id.to_string()),
            ],
        )?;
        Ok(affected > 0)
    }

    /// Whether a SystersUser belongs to a group.
    pub fn is_group_member(&self, group_id: &str, systers_user_id: &str) -> Result<bool, AuthError> {
        let row = self.sql.query_one(
            "SELECT 1 AS hit FROM group_members WHERE group_id = ?1 AND systers_user_id = ?2",
            &[
                Value::Text(group_id.to_string()),
                Value::Text(systers_user_id.to_string()),
            ],
        )?;
        Ok(row.is_some())
    }

    /// List members of a group.
    pub fn list_group_members(&self, group_id: &str) -> Result<Vec<GroupMember>, AuthError> {
        let _group = self.get_group(group_id)?;

        let rows = self.sql.query(
            "SELECT group_id, systers_user_id, added_at FROM group_members WHERE group_id = ?1 ORDER BY rowid",
            &[Value::Text(group_id.to_string())],
        )?;

        Ok(rows
            .iter()
            .map(|row| GroupMember {
                group_id: row.get_str("group_id").unwrap_or_default().to_string(),
                systers_user_id: row.get_str("systers_user_id").unwrap_or_default().to_string(),
                added_at: row.get_str("added_at").unwrap_or_default().to_string(),
            })
            .collect())
    }

    /// All groups a SystersUser belongs to, ordered by name.
    pub fn list_user_groups(&self, systers_user_id: &str) -> Result<Vec<Group>, AuthError> {
        let rows = self.sql.query(
            "SELECT g.data FROM groups g JOIN group_members m ON m.group_id = g.id \
             WHERE m.systers_user_id = ?1 ORDER BY g.name",
            &[Value::Text(systers_user_id.to_string())],
        )?;
        rows.iter().map(decode_data::<Group>).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CreateUser;
    use crate::service::test_support::test_service;

    fn profile(svc: &AuthService, username: &str) -> String {
        let user = svc
            .create_user(CreateUser {
                username: username.to_string(),
                password: "pw".to_string(),
                email: None,
            })
            .unwrap();
        svc.get_systers_user_by_user(&user.id).unwrap().id
    }

    #[test]
    fn test_group_crud() {
        let svc = test_service();

        let group = svc.create_group("Foo: Community Admin").unwrap();
        assert_eq!(svc.get_group(&group.id).unwrap(), group);
        assert_eq!(svc.get_group_by_name("Foo: Community Admin").unwrap().id, group.id);

        let renamed = svc.rename_group(&group.id, "Bar: Community Admin").unwrap();
        assert_eq!(renamed.name, "Bar: Community Admin");
        assert!(svc.find_group_by_name("Foo: Community Admin").unwrap().is_none());

        svc.delete_group(&group.id).unwrap();
        assert!(matches!(svc.get_group(&group.id), Err(AuthError::NotFound(_))));
    }

    #[test]
    fn test_duplicate_group_name() {
        let svc = test_service();
        svc.create_group("Foo").unwrap();
        assert!(matches!(svc.create_group("Foo"), Err(AuthError::Conflict(_))));
    }

    #[test]
    fn test_get_or_create_group() {
        let svc = test_service();
        let (first, created) = svc.get_or_create_group("Foo").unwrap();
        assert!(created);
        let (second, created) = svc.get_or_create_group("Foo").unwrap();
        assert!(!created);
        assert_eq!(first, second);
    }

    #[test]
    fn test_prefix_listing_is_literal() {
        let svc = test_service();
        svc.create_group("Foo: Admin").unwrap();
        svc.create_group("Foo: Member").unwrap();
        svc.create_group("F%o: Admin").unwrap();
        svc.create_group("Bar: Admin").unwrap();

        let names: Vec<String> = svc
            .list_groups_with_prefix("Foo")
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["Foo: Admin", "Foo: Member"]);

        assert_eq!(svc.list_groups_with_prefix("F%").unwrap().len(), 1);
    }

    #[test]
    fn test_delete_groups_with_prefix() {
        let svc = test_service();
        svc.create_group("Foo: Admin").unwrap();
        svc.create_group("Foo: Member").unwrap();
        svc.create_group("Bar: Admin").unwrap();

        assert_eq!(svc.delete_groups_with_prefix("Foo").unwrap(), 2);
        assert!(svc.list_groups_with_prefix("Foo").unwrap().is_empty());
        assert_eq!(svc.list_groups_with_prefix("Bar").unwrap().len(), 1);
    }

    #[test]
    fn test_group_members() {
        let svc = test_service();
        let group = svc.create_group("Team").unwrap();
        let alice = profile(&svc, "alice");

        svc.join_group(&group.id, &alice).unwrap();
        svc.join_group(&group.id, &alice).unwrap();
        assert!(svc.is_group_member(&group.id, &alice).unwrap());
        assert_eq!(svc.list_group_members(&group.id).unwrap().len(), 1);

        let groups = svc.list_user_groups(&alice).unwrap();
        assert_eq!(groups, vec![group.clone()]);

        assert!(svc.leave_group(&group.id, &alice).unwrap());
        assert!(!svc.leave_group(&group.id, &alice).unwrap());
        assert!(!svc.is_group_member(&group.id, &alice).unwrap());
    }

    #[test]
    fn test_join_unknown_group() {
        let svc = test_service();
        let alice = profile(&svc, "alice");
        assert!(matches!(svc.join_group("nope", &alice), Err(AuthError::NotFound(_))));
    }

    #[test]
    fn test_delete_group_cascades_members() {
        let svc = test_service();
        let group = svc.create_group("Team").unwrap();
        let alice = profile(&svc, "alice");
        svc.join_group(&group.id, &alice).unwrap();

        svc.delete_group(&group.id).unwrap();
        assert!(svc.list_user_groups(&alice).unwrap().is_empty());
    }
}
