//! Error types for the elena-load pipeline.
//!
//! One enum per layer, wrapped by the top-level [`LoadError`]:
//!
//! - [`SourceError`] - the input file cannot be opened or read (fatal)
//! - [`SchemaError`] - invalid table definition or configuration (fatal)
//! - [`QueryError`] - a record cannot be rendered as a query (per record)
//! - [`EngineError`] - the engine could not be launched (fatal for the
//!   create step, reported for a row)
//!
//! A non-zero exit status from the engine is *not* an error: it travels in
//! [`crate::engine::InvocationResult`] and the driver decides what it means.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Source Errors
// =============================================================================

/// Errors while reading the delimited input.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The input could not be opened.
    #[error("Cannot open input '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading failed part-way through the input.
    #[error("Failed to read input at line {line}: {message}")]
    Read { line: u64, message: String },

    /// The input has no header row.
    #[error("Input has no header row")]
    NoHeaders,

    /// The configured delimiter is not a single ASCII character.
    #[error("Delimiter must be a single ASCII character, got '{0}'")]
    InvalidDelimiter(char),
}

impl SourceError {
    pub(crate) fn from_csv(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        match err.into_kind() {
            csv::ErrorKind::Io(io) => SourceError::Read {
                line,
                message: io.to_string(),
            },
            other => SourceError::Read {
                line,
                message: format!("{:?}", other),
            },
        }
    }
}

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors in a table definition.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema has no columns.
    #[error("Schema has no columns")]
    Empty,

    /// Two columns share a name.
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    /// More than one column is marked `@id`.
    #[error("Columns '{first}' and '{second}' are both marked @id")]
    MultipleIdentity { first: String, second: String },

    /// A table or column name is not a valid DSL word.
    #[error("Invalid identifier '{0}': use letters, digits and '_', not starting with a digit")]
    InvalidIdentifier(String),

    /// A table or column name collides with a DSL keyword.
    #[error("'{0}' is a reserved word in the query language")]
    ReservedWord(String),

    /// A column type token could not be parsed.
    #[error("Invalid column type '{0}': expected int, bool or char(N)")]
    InvalidType(String),

    /// The configuration file did not match the definition schema.
    #[error("Invalid table definition: {}", .0.join("; "))]
    Invalid(Vec<String>),

    /// The configuration file could not be read.
    #[error("Cannot read table definition '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON.
    #[error("Table definition JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Query Errors
// =============================================================================

/// Errors rendering a single record as a query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The record lacks a column the schema requires.
    #[error("Missing field: {column}")]
    MissingField { column: String },

    /// A text value contains a double quote, which string literals cannot hold.
    #[error("Value for '{column}' contains a double quote and cannot be quoted: {value}")]
    UnrepresentableValue { column: String, value: String },

    /// A text value is empty; the engine reads `""` as no token at all.
    #[error("Empty value for '{column}': the engine cannot parse an empty string literal")]
    EmptyValue { column: String },
}

// =============================================================================
// Engine Errors
// =============================================================================

/// Errors launching the engine (or writing to a script sink).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine binary could not be found or started.
    #[error("Failed to launch engine '{binary}': {source}")]
    Launch {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// The query script could not be written.
    #[error("Failed to write query script '{path}': {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Load Errors (top-level)
// =============================================================================

/// Fatal errors that abort a load.
///
/// Everything that only affects one record is reported in
/// [`crate::driver::LoadSummary`] instead.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The input could not be read.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// The table definition is invalid.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The create-table query could not be launched.
    #[error("Cannot create table: {0}")]
    CreateTable(#[source] EngineError),

    /// The engine sink could not be finalised.
    #[error("Engine error: {0}")]
    Engine(#[source] EngineError),

    /// The run report could not be written.
    #[error("Cannot write report '{path}': {message}")]
    Report { path: PathBuf, message: String },

    /// Rendered queries could not be written to standard output.
    #[error("Cannot write output: {0}")]
    Output(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for query rendering.
pub type QueryResult<T> = Result<T, QueryError>;

/// Result type for engine invocations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type for a whole load.
pub type LoadResult<T> = Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let source_err = SourceError::NoHeaders;
        let load_err: LoadError = source_err.into();
        assert!(load_err.to_string().contains("header"));

        let schema_err = SchemaError::DuplicateColumn("codigo".into());
        let load_err: LoadError = schema_err.into();
        assert!(load_err.to_string().contains("codigo"));
    }

    #[test]
    fn test_query_error_format() {
        let err = QueryError::MissingField {
            column: "correo".into(),
        };
        assert_eq!(err.to_string(), "Missing field: correo");

        let err = QueryError::UnrepresentableValue {
            column: "nombre".into(),
            value: "Ana \"La\" Li".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("nombre"));
        assert!(msg.contains("double quote"));

        let err = QueryError::EmptyValue {
            column: "correo".into(),
        };
        assert!(err.to_string().starts_with("Empty value for 'correo'"));
    }

    #[test]
    fn test_invalid_definition_joins_messages() {
        let err = SchemaError::Invalid(vec!["first".into(), "second".into()]);
        assert_eq!(err.to_string(), "Invalid table definition: first; second");
    }
}
