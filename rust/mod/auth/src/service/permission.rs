use portal_core::now_rfc3339;
use portal_sql::Value;
use tracing::debug;

use crate::model::{ObjectPermission, ObjectRef, Permission, grant_id};
use crate::service::{AuthError, AuthService};

impl AuthService {
    // ── Catalog ──

    /// Register a permission codename for a model.
    ///
    /// Re-registering the same codename for the same model refreshes its
    /// display name; registering it under another model is a conflict.
    pub fn register_permission(
        &self,
        codename: &str,
        model: &str,
        name: &str,
    ) -> Result<Permission, AuthError> {
        if codename.is_empty() || model.is_empty() {
            return Err(AuthError::Validation(
                "permission codename and model cannot be empty".into(),
            ));
        }
        if let Some(existing) = self.find_permission(codename)? {
            if existing.model != model {
                return Err(AuthError::Conflict(format!(
                    "permission '{}' is already registered for model '{}'",
                    codename, existing.model
                )));
            }
        }

        self.sql.exec(
            "INSERT INTO permissions (codename, model, name) VALUES (?1, ?2, ?3) \
             ON CONFLICT(codename) DO UPDATE SET name = excluded.name",
            &[codename.into(), model.into(), name.into()],
        )?;

        Ok(Permission {
            codename: codename.to_string(),
            model: model.to_string(),
            name: name.to_string(),
        })
    }

    /// Look up a catalog entry.
    pub fn find_permission(&self, codename: &str) -> Result<Option<Permission>, AuthError> {
        let row = self.sql.query_one(
            "SELECT codename, model, name FROM permissions WHERE codename = ?1",
            &[codename.into()],
        )?;
        Ok(row.map(|r| Permission {
            codename: r.get_str("codename").unwrap_or_default().to_string(),
            model: r.get_str("model").unwrap_or_default().to_string(),
            name: r.get_str("name").unwrap_or_default().to_string(),
        }))
    }

    /// Get a catalog entry or fail with NotFound.
    pub fn get_permission(&self, codename: &str) -> Result<Permission, AuthError> {
        self.find_permission(codename)?
            .ok_or_else(|| AuthError::NotFound(format!("permission '{}'", codename)))
    }

    // ── Model-level grants ──

    /// Grant a codename to a group for every record of its model.
    pub fn add_group_permission(&self, group_id: &str, codename: &str) -> Result<(), AuthError> {
        let _group = self.get_group(group_id)?;
        let _permission = self.get_permission(codename)?;

        self.sql.exec(
            "INSERT OR IGNORE INTO group_permissions (group_id, codename) VALUES (?1, ?2)",
            &[group_id.into(), codename.into()],
        )?;
        Ok(())
    }

    /// Model-level codenames held by a group, sorted.
    pub fn group_permissions(&self, group_id: &str) -> Result<Vec<String>, AuthError> {
        let rows = self.sql.query(
            "SELECT codename FROM group_permissions WHERE group_id = ?1 ORDER BY codename",
            &[group_id.into()],
        )?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get_str("codename").map(str::to_string))
            .collect())
    }

    // ── Object-level grants ──

    /// Grant a codename to a group on a single record.
    ///
    /// The codename's catalog model must match the record's model.
    /// Same (group, codename, object) triple → existing grant is returned.
    pub fn assign_object_perm(
        &self,
        codename: &str,
        group_id: &str,
        object: &ObjectRef,
    ) -> Result<ObjectPermission, AuthError> {
        let _group = self.get_group(group_id)?;
        let permission = self.get_permission(codename)?;
        if permission.model != object.model {
            return Err(AuthError::Validation(format!(
                "permission '{}' applies to model '{}', not '{}'",
                codename, permission.model, object.model
            )));
        }

        let object_ref = object.to_string();
        let grant = ObjectPermission {
            id: grant_id(group_id, codename, &object_ref),
            group_id: group_id.to_string(),
            codename: codename.to_string(),
            object_ref,
            created_at: now_rfc3339(),
        };

        self.sql.exec(
            "INSERT OR IGNORE INTO object_permissions (id, group_id, codename, object_ref, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            &[
                Value::Text(grant.id.clone()),
                Value::Text(grant.group_id.clone()),
                Value::Text(grant.codename.clone()),
                Value::Text(grant.object_ref.clone()),
                Value::Text(grant.created_at.clone()),
            ],
        )?;
        debug!("granted {} on {} to group {}", codename, grant.object_ref, group_id);
        Ok(grant)
    }

    /// Object-level codenames a group holds on one record, sorted.
    pub fn get_perms(&self, group_id: &str, object: &ObjectRef) -> Result<Vec<String>, AuthError> {
        let rows = self.sql.query(
            "SELECT codename FROM object_permissions WHERE group_id = ?1 AND object_ref = ?2 \
             ORDER BY codename",
            &[group_id.into(), Value::Text(object.to_string())],
        )?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get_str("codename").map(str::to_string))
            .collect())
    }

    /// Drop every object-level grant on a record, for all groups.
    pub fn clear_object_perms(&self, object: &ObjectRef) -> Result<usize, AuthError> {
        let affected = self.sql.exec(
            "DELETE FROM object_permissions WHERE object_ref = ?1",
            &[Value::Text(object.to_string())],
        )?;
        Ok(affected as usize)
    }

    // ── Checks ──

    /// Whether a SystersUser holds `codename` through any of their groups.
    ///
    /// A model-level grant always matches. With `object`, an object-level
    /// grant on exactly that record matches too.
    pub fn user_has_perm(
        &self,
        systers_user_id: &str,
        codename: &str,
        object: Option<&ObjectRef>,
    ) -> Result<bool, AuthError> {
        let model_level = self.sql.query_one(
            "SELECT 1 AS hit FROM group_permissions p \
             JOIN group_members m ON m.group_id = p.group_id \
             WHERE m.systers_user_id = ?1 AND p.codename = ?2 LIMIT 1",
            &[systers_user_id.into(), codename.into()],
        )?;
        if model_level.is_some() {
            return Ok(true);
        }

        let Some(object) = object else {
            return Ok(false);
        };
        let object_level = self.sql.query_one(
            "SELECT 1 AS hit FROM object_permissions o \
             JOIN group_members m ON m.group_id = o.group_id \
             WHERE m.systers_user_id = ?1 AND o.codename = ?2 AND o.object_ref = ?3 LIMIT 1",
            &[
                systers_user_id.into(),
                codename.into(),
                Value::Text(object.to_string()),
            ],
        )?;
        Ok(object_level.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CreateUser;
    use crate::service::test_support::test_service;

    fn seeded() -> std::sync::Arc<AuthService> {
        let svc = test_service();
        svc.register_permission("change_community", "community", "Can change community")
            .unwrap();
        svc.register_permission("add_tag", "tag", "Can add tag").unwrap();
        svc
    }

    #[test]
    fn test_register_permission() {
        let svc = seeded();
        let perm = svc.get_permission("change_community").unwrap();
        assert_eq!(perm.model, "community");

        // Same model: name refresh.
        svc.register_permission("change_community", "community", "Edit community")
            .unwrap();
        assert_eq!(svc.get_permission("change_community").unwrap().name, "Edit community");

        // Other model: conflict.
        let err = svc
            .register_permission("change_community", "tag", "x")
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }

    #[test]
    fn test_model_level_grants() {
        let svc = seeded();
        let group = svc.create_group("Editors").unwrap();

        svc.add_group_permission(&group.id, "add_tag").unwrap();
        svc.add_group_permission(&group.id, "add_tag").unwrap();
        assert_eq!(svc.group_permissions(&group.id).unwrap(), vec!["add_tag"]);

        assert!(matches!(
            svc.add_group_permission(&group.id, "unknown"),
            Err(AuthError::NotFound(_))
        ));

        // Grants go with the group.
        svc.delete_group(&group.id).unwrap();
        assert!(svc.group_permissions(&group.id).unwrap().is_empty());
    }

    #[test]
    fn test_object_level_grants() {
        let svc = seeded();
        let group = svc.create_group("Admins").unwrap();
        let foo = ObjectRef::new("community", "c1");
        let bar = ObjectRef::new("community", "c2");

        let first = svc.assign_object_perm("change_community", &group.id, &foo).unwrap();
        let again = svc.assign_object_perm("change_community", &group.id, &foo).unwrap();
        assert_eq!(first.id, again.id);

        assert_eq!(svc.get_perms(&group.id, &foo).unwrap(), vec!["change_community"]);
        assert!(svc.get_perms(&group.id, &bar).unwrap().is_empty());
        // Object grants never show up as model-level grants.
        assert!(svc.group_permissions(&group.id).unwrap().is_empty());

        assert_eq!(svc.clear_object_perms(&foo).unwrap(), 1);
        assert!(svc.get_perms(&group.id, &foo).unwrap().is_empty());
    }

    #[test]
    fn test_object_grant_model_mismatch() {
        let svc = seeded();
        let group = svc.create_group("Admins").unwrap();
        let err = svc
            .assign_object_perm("add_tag", &group.id, &ObjectRef::new("community", "c1"))
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[test]
    fn test_user_has_perm() {
        let svc = seeded();
        let user = svc
            .create_user(CreateUser {
                username: "alice".into(),
                password: "pw".into(),
                email: None,
            })
            .unwrap();
        let alice = svc.get_systers_user_by_user(&user.id).unwrap().id;
        let group = svc.create_group("Admins").unwrap();
        let foo = ObjectRef::new("community", "c1");
        let bar = ObjectRef::new("community", "c2");

        svc.assign_object_perm("change_community", &group.id, &foo).unwrap();
        svc.add_group_permission(&group.id, "add_tag").unwrap();

        // Not a member yet.
        assert!(!svc.user_has_perm(&alice, "change_community", Some(&foo)).unwrap());

        svc.join_group(&group.id, &alice).unwrap();
        assert!(svc.user_has_perm(&alice, "change_community", Some(&foo)).unwrap());
        assert!(!svc.user_has_perm(&alice, "change_community", Some(&bar)).unwrap());
        assert!(!svc.user_has_perm(&alice, "change_community", None).unwrap());
        assert!(svc.user_has_perm(&alice, "add_tag", None).unwrap());
        assert!(svc.user_has_perm(&alice, "add_tag", Some(&bar)).unwrap());
    }

    #[test]
    fn test_delete_group_cascades_grants() {
        let svc = seeded();
        let group = svc.create_group("Admins").unwrap();
        let foo = ObjectRef::new("community", "c1");
        svc.assign_object_perm("change_community", &group.id, &foo).unwrap();

        svc.delete_group(&group.id).unwrap();
        assert!(svc.get_perms(&group.id, &foo).unwrap().is_empty());
        assert_eq!(svc.clear_object_perms(&foo).unwrap(), 0);
    }
}
