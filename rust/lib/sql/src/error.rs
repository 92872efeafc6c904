use thiserror::Error;

#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    /// A UNIQUE / NOT NULL / CHECK constraint rejected the statement.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A row is still referenced (or the referenced row is missing).
    #[error("foreign key violation: {0}")]
    ForeignKey(String),

    #[error("connection error: {0}")]
    Connection(String),
}

impl SQLError {
    pub fn is_constraint(&self) -> bool {
        matches!(self, SQLError::Constraint(_) | SQLError::ForeignKey(_))
    }

    pub fn is_foreign_key(&self) -> bool {
        matches!(self, SQLError::ForeignKey(_))
    }
}
