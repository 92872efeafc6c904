use portal_core::{new_id, now_rfc3339};
use portal_sql::Value;
use tracing::debug;

use crate::model::{CreateUser, SystersUser, User};
use crate::service::{AuthError, AuthService, decode_data};

// ── Password helpers ──

/// Hash a plain password with argon2id.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    use argon2::Argon2;
    use password_hash::rand_core::OsRng;
    use password_hash::{PasswordHasher, SaltString};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Internal(e.to_string()))
}

impl AuthService {
    /// Create a login account together with its SystersUser profile.
    pub fn create_user(&self, input: CreateUser) -> Result<User, AuthError> {
        let username = input.username.trim();
        if username.is_empty() {
            return Err(AuthError::Validation("username cannot be empty".into()));
        }
        if input.password.is_empty() {
            return Err(AuthError::Validation("password cannot be empty".into()));
        }

        let now = now_rfc3339();
        let user = User {
            id: new_id(),
            username: username.to_string(),
            password_hash: hash_password(&input.password)?,
            email: input.email,
            active: true,
            created_at: now.clone(),
            updated_at: now.clone(),
        };

        self.insert_record(
            "users",
            &user.id,
            &user,
            &[
                ("username", Value::Text(user.username.clone())),
                ("created_at", Value::Text(now.clone())),
                ("updated_at", Value::Text(now.clone())),
            ],
        )
        .map_err(|e| match e {
            AuthError::Conflict(_) => {
                AuthError::Conflict(format!("username '{}' already taken", user.username))
            }
            other => other,
        })?;

        let profile = SystersUser {
            id: new_id(),
            user_id: user.id.clone(),
            country: None,
            blog_url: None,
            homepage_url: None,
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        self.insert_record(
            "systers_users",
            &profile.id,
            &profile,
            &[
                ("user_id", Value::Text(user.id.clone())),
                ("created_at", Value::Text(now.clone())),
                ("updated_at", Value::Text(now)),
            ],
        )?;

        debug!("created user {} with profile {}", user.username, profile.id);
        Ok(user)
    }

    /// Get a user by id.
    pub fn get_user(&self, id: &str) -> Result<User, AuthError> {
        self.get_record("users", id)
    }

    /// Get a user by username.
    pub fn get_user_by_username(&self, username: &str) -> Result<User, AuthError> {
        self.find_record("users", "username", username)?
            .ok_or_else(|| AuthError::NotFound(format!("user '{}'", username)))
    }

    /// Delete a user. Its profile and memberships cascade.
    ///
    /// Fails with `Validation` while the profile is still referenced by a
    /// record that does not cascade, such as an administered community.
    pub fn delete_user(&self, id: &str) -> Result<(), AuthError> {
        let affected = self
            .sql
            .exec("DELETE FROM users WHERE id = ?1", &[Value::Text(id.to_string())])
            .map_err(|e| {
                if e.is_foreign_key() {
                    AuthError::Validation(format!("user {} is still referenced", id))
                } else {
                    e.into()
                }
            })?;
        if affected == 0 {
            return Err(AuthError::NotFound(format!("users/{}", id)));
        }
        debug!("deleted user {}", id);
        Ok(())
    }

    // ── SystersUser ──

    /// Get a SystersUser by id.
    pub fn get_systers_user(&self, id: &str) -> Result<SystersUser, AuthError> {
        self.get_record("systers_users", id)
    }

    /// Get the SystersUser wrapping a login account.
    pub fn get_systers_user_by_user(&self, user_id: &str) -> Result<SystersUser, AuthError> {
        self.find_record("systers_users", "user_id", user_id)?
            .ok_or_else(|| AuthError::NotFound(format!("systers_users for user {}", user_id)))
    }

    /// Get the SystersUser of the account with this username.
    pub fn get_systers_user_by_username(&self, username: &str) -> Result<SystersUser, AuthError> {
        let user = self.get_user_by_username(username)?;
        self.get_systers_user_by_user(&user.id)
    }

    /// Resolve a SystersUser id to the wrapped account's username.
    pub fn systers_user_username(&self, systers_user_id: &str) -> Result<String, AuthError> {
        let profile = self.get_systers_user(systers_user_id)?;
        Ok(self.get_user(&profile.user_id)?.username)
    }

    /// All SystersUser profiles, oldest first.
    pub fn list_systers_users(&self) -> Result<Vec<SystersUser>, AuthError> {
        let rows = self
            .sql
            .query("SELECT data FROM systers_users ORDER BY rowid", &[])?;
        rows.iter().map(decode_data::<SystersUser>).collect()
    }
}
