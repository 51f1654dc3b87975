//! Domain models for the loader.
//!
//! - [`Column`] - a named, typed column with optional constraints
//! - [`ColumnType`] - `int`, `bool` or `char(N)`
//! - [`Constraint`] - `@id` or `@unique`
//! - [`Schema`] - the ordered, validated column list of a table
//! - [`Record`] - one input row, column name to raw text
//! - [`CoercedValue`] - a raw field converted to its column's type

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Words the engine's parser treats as keywords; they cannot name a table or column.
pub const RESERVED_WORDS: &[&str] = &["int", "float", "bool", "char", "fkey", "de", "pe"];

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"));

/// Check that `name` can be used as a table or column name.
pub fn validate_identifier(name: &str) -> Result<(), SchemaError> {
    if !IDENTIFIER.is_match(name) {
        return Err(SchemaError::InvalidIdentifier(name.to_string()));
    }
    if RESERVED_WORDS.contains(&name) {
        return Err(SchemaError::ReservedWord(name.to_string()));
    }
    Ok(())
}

// =============================================================================
// Column Type
// =============================================================================

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColumnType {
    /// 64-bit integer (`int`).
    Int,
    /// Fixed-width character field (`char(N)`).
    FixedString(usize),
    /// Boolean (`bool`).
    Bool,
}

impl ColumnType {
    /// The type token used in a create-table query.
    pub fn token(&self) -> String {
        match self {
            ColumnType::Int => "int".to_string(),
            ColumnType::FixedString(n) => format!("char({})", n),
            ColumnType::Bool => "bool".to_string(),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

impl FromStr for ColumnType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "int" => Ok(ColumnType::Int),
            "bool" => Ok(ColumnType::Bool),
            other => other
                .strip_prefix("char(")
                .and_then(|rest| rest.strip_suffix(')'))
                .and_then(|n| n.trim().parse::<usize>().ok())
                .filter(|n| *n > 0)
                .map(ColumnType::FixedString)
                .ok_or_else(|| SchemaError::InvalidType(s.to_string())),
        }
    }
}

impl TryFrom<String> for ColumnType {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColumnType> for String {
    fn from(value: ColumnType) -> Self {
        value.token()
    }
}

// =============================================================================
// Constraint
// =============================================================================

/// Column constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Constraint {
    /// Row identifier (`@id`).
    #[serde(rename = "id")]
    Identity,
    /// Unique value (`@unique`).
    #[serde(rename = "unique")]
    Unique,
}

impl Constraint {
    /// Annotation written after the column type.
    pub fn marker(&self) -> &'static str {
        match self {
            Constraint::Identity => "@id",
            Constraint::Unique => "@unique",
        }
    }
}

// =============================================================================
// Column
// =============================================================================

/// A column of the target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub constraints: BTreeSet<Constraint>,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            constraints: BTreeSet::new(),
        }
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Int)
    }

    pub fn char(name: impl Into<String>, width: usize) -> Self {
        Self::new(name, ColumnType::FixedString(width))
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Bool)
    }

    /// Mark this column as the row identifier.
    pub fn identity(mut self) -> Self {
        self.constraints.insert(Constraint::Identity);
        self
    }

    /// Mark this column as unique.
    pub fn unique(mut self) -> Self {
        self.constraints.insert(Constraint::Unique);
        self
    }

    pub fn is_identity(&self) -> bool {
        self.constraints.contains(&Constraint::Identity)
    }

    pub fn is_unique(&self) -> bool {
        self.constraints.contains(&Constraint::Unique)
    }
}

// =============================================================================
// Schema
// =============================================================================

/// Ordered column list of a table.
///
/// Column names are unique, valid DSL words, and at most one column is the
/// identity. Build with [`Schema::new`], which checks all of this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Result<Self, SchemaError> {
        if columns.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut seen = HashSet::new();
        let mut identity: Option<&str> = None;
        for column in &columns {
            validate_identifier(&column.name)?;
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateColumn(column.name.clone()));
            }
            if column.is_identity() {
                if let Some(first) = identity {
                    return Err(SchemaError::MultipleIdentity {
                        first: first.to_string(),
                        second: column.name.clone(),
                    });
                }
                identity = Some(column.name.as_str());
            }
        }

        Ok(Self { columns })
    }

    /// The `estudiantes` schema the loader ships with.
    pub fn canonical() -> Self {
        Self {
            columns: vec![
                Column::int("id").identity(),
                Column::char("codigo", 8).unique(),
                Column::char("nombre", 255),
                Column::char("tipo_documento", 24),
                Column::char("documento", 13),
                Column::int("creditos"),
                Column::char("correo", 255),
                Column::bool("es_tercio"),
            ],
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The identity column, if the schema declares one.
    pub fn identity(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_identity())
    }

    /// Columns that are filled from input records (everything but the identity).
    pub fn data_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.is_identity())
    }

    /// Column used to name a record in reports: the first unique data column.
    pub fn key_column(&self) -> Option<&Column> {
        self.data_columns().find(|c| c.is_unique())
    }
}

// =============================================================================
// Record
// =============================================================================

/// One input row: column name to raw text, in header order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    line: u64,
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new(line: u64, fields: Vec<(String, String)>) -> Self {
        Self { line, fields }
    }

    /// Source line this record was read from (0 when not read from a file).
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }
}

/// Fixture helpers.
#[cfg(test)]
impl Record {
    /// Build a record from string pairs (line number 0).
    pub(crate) fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            line: 0,
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub(crate) fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub(crate) fn len(&self) -> usize {
        self.fields.len()
    }

    /// Copy of this record without `column`.
    pub(crate) fn without(&self, column: &str) -> Self {
        Self {
            line: self.line,
            fields: self
                .fields
                .iter()
                .filter(|(name, _)| name != column)
                .cloned()
                .collect(),
        }
    }

    /// Copy of this record with `column` set to `value`.
    pub(crate) fn with(&self, column: &str, value: impl Into<String>) -> Self {
        let mut record = self.without(column);
        record.fields.push((column.to_string(), value.into()));
        record
    }
}

// =============================================================================
// Coerced Value
// =============================================================================

/// A raw field converted to its column's semantic type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoercedValue {
    Integer(i64),
    Text(String),
    Boolean(bool),
}
