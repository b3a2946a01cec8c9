use thiserror::Error;

/// Errors raised while a pipeline or request is being constructed.
///
/// These are never produced by a generation attempt; an attempt can only be
/// rejected (see [`crate::contract::Rejection`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Unsupported SQL dialect: {name}")]
    UnsupportedDialect { name: String },
    #[error("Request text must not be empty")]
    EmptyRequest,
    #[error("Table {table} is declared more than once")]
    DuplicateTable { table: String },
    #[error("Table {table} has no columns")]
    EmptyTable { table: String },
    #[error("Table names must not be empty")]
    UnnamedTable,
    #[error("At least one statement verb must be allowed")]
    NoAllowedVerbs,
}
