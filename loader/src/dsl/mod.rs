//! Elena query language rendering.
//!
//! - `coerce`: raw CSV text to typed values
//! - `builder`: create-table and insert queries
//!
//! ## Usage Flow
//!
//! ```text
//! Record → coerce (per column) → builder::build_insert → Query → engine
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use elena_load::dsl::{build_create_table, build_insert};
//! use elena_load::models::{Record, Schema};
//!
//! let schema = Schema::canonical();
//! let create = build_create_table(&schema, "estudiantes");
//! let insert = build_insert(&schema, &record, "estudiantes")?;
//! ```

pub mod builder;
pub mod coerce;

use std::fmt;

pub use builder::{build_create_table, build_insert, QueryBuilder};
pub use coerce::{coerce, BOOL_TRUE_SENTINEL};

/// A complete statement in the engine's query language.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query(String);

impl Query {
    pub(crate) fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
