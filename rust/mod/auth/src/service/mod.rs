pub mod group;
pub mod permission;
pub mod schema;
pub mod user;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use portal_sql::{SQLError, SQLStore, Value};

/// Auth service error type.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl From<SQLError> for AuthError {
    fn from(e: SQLError) -> Self {
        if e.is_constraint() {
            AuthError::Conflict(e.to_string())
        } else {
            AuthError::Storage(e.to_string())
        }
    }
}

impl From<AuthError> for portal_core::ServiceError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::NotFound(m) => portal_core::ServiceError::NotFound(m),
            AuthError::Conflict(m) => portal_core::ServiceError::Conflict(m),
            AuthError::Validation(m) => portal_core::ServiceError::Validation(m),
            AuthError::Storage(m) => portal_core::ServiceError::Storage(m),
            AuthError::Internal(m) => portal_core::ServiceError::Internal(m),
        }
    }
}

/// The Auth service. Owns the users, groups and permission tables.
pub struct AuthService {
    pub(crate) sql: Arc<dyn SQLStore>,
}

impl AuthService {
    /// Create a new AuthService, initializing the DB schema.
    pub fn new(sql: Arc<dyn SQLStore>) -> Result<Arc<Self>, AuthError> {
        schema::init_schema(sql.as_ref())?;
        Ok(Arc::new(Self { sql }))
    }

    /// The backing store, shared with modules that reference auth tables.
    pub fn sql(&self) -> &Arc<dyn SQLStore> {
        &self.sql
    }

    // ── Generic CRUD helpers ──

    /// Insert a record as JSON into a table with indexed columns.
    pub(crate) fn insert_record<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(), AuthError> {
        let json =
            serde_json::to_string(record).map_err(|e| AuthError::Internal(e.to_string()))?;

        let mut cols = vec!["id", "data"];
        let mut placeholders = vec!["?1".to_string(), "?2".to_string()];
        let mut params = vec![Value::Text(id.to_string()), Value::Text(json)];

        for (i, (col, val)) in indexes.iter().enumerate() {
            cols.push(col);
            placeholders.push(format!("?{}", i + 3));
            params.push(val.clone());
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            cols.join(", "),
            placeholders.join(", "),
        );

        self.sql.exec(&sql, &params)?;
        Ok(())
    }

    /// Get a record by id, deserializing the JSON `data` column.
    pub(crate) fn get_record<T: DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
    ) -> Result<T, AuthError> {
        self.find_record(table, "id", id)?
            .ok_or_else(|| AuthError::NotFound(format!("{}/{}", table, id)))
    }

    /// Find a record by a unique indexed column.
    pub(crate) fn find_record<T: DeserializeOwned>(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<Option<T>, AuthError> {
        let sql = format!("SELECT data FROM {} WHERE {} = ?1", table, column);
        match self.sql.query_one(&sql, &[Value::Text(value.to_string())])? {
            Some(row) => decode_data(&row).map(Some),
            None => Ok(None),
        }
    }

    /// Update a record's JSON data and indexed columns.
    pub(crate) fn update_record<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(), AuthError> {
        let json =
            serde_json::to_string(record).map_err(|e| AuthError::Internal(e.to_string()))?;

        let mut sets = vec!["data = ?1".to_string()];
        let mut params: Vec<Value> = vec![Value::Text(json)];

        for (i, (col, val)) in indexes.iter().enumerate() {
            sets.push(format!("{} = ?{}", col, i + 2));
            params.push(val.clone());
        }

        let id_idx = params.len() + 1;
        params.push(Value::Text(id.to_string()));

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table,
            sets.join(", "),
            id_idx,
        );

        if self.sql.exec(&sql, &params)? == 0 {
            return Err(AuthError::NotFound(format!("{}/{}", table, id)));
        }
        Ok(())
    }

    /// Delete a record by id.
    pub(crate) fn delete_record(&self, table: &str, id: &str) -> Result<(), AuthError> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", table);
        if self.sql.exec(&sql, &[Value::Text(id.to_string())])? == 0 {
            return Err(AuthError::NotFound(format!("{}/{}", table, id)));
        }
        Ok(())
    }
}

/// Deserialize the JSON `data` column of a row.
pub(crate) fn decode_data<T: DeserializeOwned>(row: &portal_sql::Row) -> Result<T, AuthError> {
    let data = row
        .get_str("data")
        .ok_or_else(|| AuthError::Internal("missing data column".into()))?;
    serde_json::from_str(data).map_err(|e| AuthError::Internal(e.to_string()))
}
