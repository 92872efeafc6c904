use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable, machine-readable identifiers. Callers match on these,
// never on the human-readable message string.

/// Stable error code constants.
///
/// The CLI prints `{"code": "NOT_FOUND", "message": "..."}` in JSON mode.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const INTERNAL: &str = "INTERNAL";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
}

// ── ServiceError ────────────────────────────────────────────────────

/// Unified service error type used across all modules.
///
/// Module errors (`AuthError`, `CommunityError`) convert into this at the
/// crate boundary so the binary deals with a single taxonomy.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate key / record already exists.
    #[error("{0}")]
    Conflict(String),

    /// Input data is invalid.
    #[error("{0}")]
    Validation(String),

    /// Storage backend failure.
    #[error("{0}")]
    Storage(String),

    /// Unexpected internal error.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => error_code::NOT_FOUND,
            ServiceError::Conflict(_) => error_code::ALREADY_EXISTS,
            ServiceError::Validation(_) => error_code::VALIDATION_FAILED,
            ServiceError::Storage(_) => error_code::STORAGE_ERROR,
            ServiceError::Internal(_) => error_code::INTERNAL,
        }
    }

    /// JSON body with the stable code and the message.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_mapping() {
        assert_eq!(ServiceError::NotFound("x".into()).error_code(), "NOT_FOUND");
        assert_eq!(ServiceError::Conflict("x".into()).error_code(), "ALREADY_EXISTS");
        assert_eq!(ServiceError::Validation("x".into()).error_code(), "VALIDATION_FAILED");
        assert_eq!(ServiceError::Storage("x".into()).error_code(), "STORAGE_ERROR");
        assert_eq!(ServiceError::Internal("x".into()).error_code(), "INTERNAL");
    }

    #[test]
    fn json_body_format() {
        let err = ServiceError::NotFound("community 'foo' not found".into());
        assert_eq!(
            err.to_json(),
            serde_json::json!({"code": "NOT_FOUND", "message": "community 'foo' not found"})
        );
    }

    #[test]
    fn error_display_is_just_message() {
        assert_eq!(ServiceError::NotFound("group 123".into()).to_string(), "group 123");
        assert_eq!(ServiceError::Conflict("dup slug".into()).to_string(), "dup slug");
        assert_eq!(ServiceError::Validation("bad input".into()).to_string(), "bad input");
    }
}
