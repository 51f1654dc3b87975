//! # elena-load - CSV bulk loader for ElenaDB
//!
//! Reads a delimited text file of records, turns each row into an insert
//! query in Elena's DSL and runs the `elena` CLI once per query, after a
//! single create-table query.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Source    │────▶│     DSL     │────▶│   Engine    │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │  (queries)  │     │ (elena CLI) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                                ▲                                    │
//!                                └──────────── Driver ◀───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use elena_load::{load_csv, EngineInvoker, LoadOptions, SourceOptions, TableDefinition};
//!
//! let summary = load_csv(
//!     "fisi_2020.csv",
//!     "demo.db",
//!     TableDefinition::canonical(),
//!     EngineInvoker::from_env(),
//!     &SourceOptions::default(),
//!     LoadOptions::default(),
//! )?;
//! println!("{}", summary.line());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`models`] - Schema, columns and records
//! - [`config`] - Target table definitions
//! - [`source`] - CSV reading with encoding and delimiter detection
//! - [`dsl`] - Query rendering and value coercion
//! - [`engine`] - Running queries through the engine CLI
//! - [`driver`] - The load state machine and its summary
//! - [`logging`] - Tracing subscriber setup

// Core modules
pub mod error;
pub mod models;
pub mod config;

// Input
pub mod source;

// Queries
pub mod dsl;

// Execution
pub mod engine;
pub mod driver;

pub mod logging;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    EngineError, EngineResult, LoadError, LoadResult, QueryError, QueryResult, SchemaError,
    SchemaResult, SourceError, SourceResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{CoercedValue, Column, ColumnType, Constraint, Record, Schema, RESERVED_WORDS};
pub use config::{validate_definition, TableDefinition, DEFAULT_TABLE};

// =============================================================================
// Re-exports - Source
// =============================================================================

pub use source::{detect_delimiter, detect_encoding, RecordSource, SourceInfo, SourceOptions};

// =============================================================================
// Re-exports - DSL
// =============================================================================

pub use dsl::{build_create_table, build_insert, coerce, Query, QueryBuilder, BOOL_TRUE_SENTINEL};

// =============================================================================
// Re-exports - Engine
// =============================================================================

pub use engine::{Engine, EngineInvoker, InvocationResult, ScriptEngine, ENGINE_BIN_ENV};

// =============================================================================
// Re-exports - Driver
// =============================================================================

pub use driver::{
    load_csv, load_source, FailureKind, LoadDriver, LoadOptions, LoadReport, LoadState, LoadSummary,
    RecordFailure,
};
