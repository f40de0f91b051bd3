use thiserror::Error;

/// Core error type shared across clinplan crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The table has no columns, so no schema can be inferred.
    #[error("empty schema: table has no columns")]
    EmptySchema,
    /// The table violates structural invariants.
    #[error("invalid table: {0}")]
    InvalidTable(String),
}

/// Convenience alias for results returned by clinplan crates.
pub type Result<T> = std::result::Result<T, Error>;
