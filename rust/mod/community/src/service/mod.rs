pub mod community;
pub mod schema;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use auth::{AuthError, AuthService};
use portal_sql::{SQLError, SQLStore, Value};

use crate::permissions;
use crate::receivers;
use crate::signals::Signals;

/// Community service error type.
#[derive(Debug, Error)]
pub enum CommunityError {
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

impl From<SQLError> for CommunityError {
    fn from(e: SQLError) -> Self {
        if e.is_constraint() {
            CommunityError::Conflict(e.to_string())
        } else {
            CommunityError::Storage(e.to_string())
        }
    }
}

impl From<AuthError> for CommunityError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::NotFound(m) => CommunityError::NotFound(m),
            AuthError::Conflict(m) => CommunityError::Conflict(m),
            AuthError::Validation(m) => CommunityError::Validation(m),
            AuthError::Storage(m) => CommunityError::Storage(m),
            AuthError::Internal(m) => CommunityError::Internal(m),
        }
    }
}

impl From<CommunityError> for portal_core::ServiceError {
    fn from(e: CommunityError) -> Self {
        match e {
            CommunityError::NotFound(m) => portal_core::ServiceError::NotFound(m),
            CommunityError::Conflict(m) => portal_core::ServiceError::Conflict(m),
            CommunityError::Validation(m) => portal_core::ServiceError::Validation(m),
            CommunityError::Storage(m) => portal_core::ServiceError::Storage(m),
            CommunityError::Internal(m) => portal_core::ServiceError::Internal(m),
        }
    }
}

/// The Community service. Shares the auth store and owns the signal registry.
pub struct CommunityService {
    pub(crate) sql: Arc<dyn SQLStore>,
    pub(crate) auth: Arc<AuthService>,
    pub(crate) signals: Signals,
}

impl CommunityService {
    /// Create a CommunityService on top of an initialised AuthService.
    ///
    /// Initialises the community tables, seeds the permission catalog and
    /// connects the default group-management receivers.
    pub fn new(auth: Arc<AuthService>) -> Result<Arc<Self>, CommunityError> {
        let sql = Arc::clone(auth.sql());
        schema::init_schema(sql.as_ref())?;
        permissions::register_community_permissions(&auth)?;

        let signals = Signals::new();
        receivers::connect_default_receivers(&signals);

        Ok(Arc::new(Self { sql, auth, signals }))
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    // ── Record helpers ──

    pub(crate) fn insert_record<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(), CommunityError> {
        let json = serde_json::to_string(record)
            .map_err(|e| CommunityError::Internal(e.to_string()))?;

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

    pub(crate) fn update_record<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(), CommunityError> {
        let json = serde_json::to_string(record)
            .map_err(|e| CommunityError::Internal(e.to_string()))?;

        let mut sets = vec!["data = ?1".to_string()];
        let mut params = vec![Value::Text(json)];
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
            return Err(CommunityError::NotFound(format!("{}/{}", table, id)));
        }
        Ok(())
    }

    pub(crate) fn find_record<T: DeserializeOwned>(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<Option<T>, CommunityError> {
        let sql = format!("SELECT data FROM {} WHERE {} = ?1", table, column);
        match self.sql.query_one(&sql, &[Value::Text(value.to_string())])? {
            Some(row) => decode_data(&row).map(Some),
            None => Ok(None),
        }
    }
}

pub(crate) fn decode_data<T: DeserializeOwned>(row: &portal_sql::Row) -> Result<T, CommunityError> {
    let data = row
        .get_str("data")
        .ok_or_else(|| CommunityError::Internal("missing data column".into()))?;
    serde_json::from_str(data).map_err(|e| CommunityError::Internal(e.to_string()))
}
