//! Target table configuration.
//!
//! A [`TableDefinition`] is a table name plus its [`Schema`]. The loader ships
//! with the `estudiantes` definition; any other table is described in a JSON
//! file:
//!
//! ```json
//! {
//!   "table": "cursos",
//!   "columns": [
//!     { "name": "codigo", "type": "char(6)", "constraints": ["unique"] },
//!     { "name": "creditos", "type": "int" },
//!     { "name": "electivo", "type": "bool" }
//!   ]
//! }
//! ```
//!
//! Files are checked against the embedded `schemas/table-definition.json`
//! (JSON Schema Draft 7) before they are deserialized, then the column list
//! goes through [`Schema::new`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SchemaError, SchemaResult};
use crate::models::{validate_identifier, Column, Schema};

/// Table the loader targets when no definition file is given.
pub const DEFAULT_TABLE: &str = "estudiantes";

const DEFINITION_SCHEMA: &str = include_str!("../../schemas/table-definition.json");

/// A target table: name and schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDefinition {
    #[serde(rename = "table")]
    pub name: String,
    #[serde(rename = "columns")]
    pub schema: Schema,
}

#[derive(Deserialize)]
struct RawDefinition {
    table: String,
    columns: Vec<Column>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>, schema: Schema) -> SchemaResult<Self> {
        let name = name.into();
        validate_identifier(&name)?;
        Ok(Self { name, schema })
    }

    /// The built-in `estudiantes` table.
    pub fn canonical() -> Self {
        Self {
            name: DEFAULT_TABLE.to_string(),
            schema: Schema::canonical(),
        }
    }

    /// Same schema, different table name.
    pub fn renamed(self, name: impl Into<String>) -> SchemaResult<Self> {
        Self::new(name, self.schema)
    }

    /// Parse and validate a JSON definition.
    pub fn from_json_str(text: &str) -> SchemaResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        validate_definition(&value).map_err(SchemaError::Invalid)?;

        let raw: RawDefinition = serde_json::from_value(value)?;
        Self::new(raw.table, Schema::new(raw.columns)?)
    }

    /// Read a JSON definition from `path`.
    pub fn load(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Pretty JSON in the same format [`TableDefinition::load`] reads.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Check a definition against the embedded JSON Schema.
///
/// Returns every violation, not only the first.
pub fn validate_definition(data: &Value) -> Result<(), Vec<String>> {
    let schema: Value = serde_json::from_str(DEFINITION_SCHEMA)
        .map_err(|e| vec![format!("Embedded definition schema is invalid: {}", e)])?;
    let validator = jsonschema::draft7::new(&schema)
        .map_err(|e| vec![format!("Embedded definition schema is invalid: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnType;
    use serde_json::json;

    const CURSOS: &str = r#"{
        "table": "cursos",
        "columns": [
            { "name": "codigo", "type": "char(6)", "constraints": ["unique"] },
            { "name": "creditos", "type": "int" },
            { "name": "electivo", "type": "bool" }
        ]
    }"#;

    #[test]
    fn test_embedded_schema_parses() {
        let schema: Value = serde_json::from_str(DEFINITION_SCHEMA).unwrap();
        assert!(jsonschema::draft7::new(&schema).is_ok());
    }

    #[test]
    fn test_from_json() {
        let def = TableDefinition::from_json_str(CURSOS).unwrap();
        assert_eq!(def.name, "cursos");
        assert_eq!(def.schema.len(), 3);
        assert_eq!(def.schema.columns()[0].column_type, ColumnType::FixedString(6));
        assert!(def.schema.columns()[0].is_unique());
        assert!(def.schema.identity().is_none());
    }

    #[test]
    fn test_canonical_round_trips_through_json() {
        let json = TableDefinition::canonical().to_json().unwrap();
        assert!(json.contains("\"type\": \"char(8)\""));
        assert_eq!(
            TableDefinition::from_json_str(&json).unwrap(),
            TableDefinition::canonical()
        );
    }

    #[test]
    fn test_bad_type_rejected_by_schema() {
        let text = r#"{ "table": "t", "columns": [{ "name": "a", "type": "varchar" }] }"#;
        match TableDefinition::from_json_str(text) {
            Err(SchemaError::Invalid(errors)) => {
                assert!(errors.iter().any(|e| e.contains("varchar")));
            }
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_all_violations_reported() {
        let data = json!({ "table": "1bad", "columns": [], "extra": true });
        let errors = validate_definition(&data).unwrap_err();
        assert!(errors.len() >= 3);
    }

    #[test]
    fn test_reserved_word_rejected_after_schema() {
        let text = r#"{ "table": "pe", "columns": [{ "name": "a", "type": "int" }] }"#;
        assert!(matches!(
            TableDefinition::from_json_str(text),
            Err(SchemaError::ReservedWord(w)) if w == "pe"
        ));
    }

    #[test]
    fn test_two_identities_rejected() {
        let text = r#"{ "table": "t", "columns": [
            { "name": "a", "type": "int", "constraints": ["id"] },
            { "name": "b", "type": "int", "constraints": ["id"] }
        ] }"#;
        assert!(matches!(
            TableDefinition::from_json_str(text),
            Err(SchemaError::MultipleIdentity { .. })
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            TableDefinition::from_json_str("{ not json"),
            Err(SchemaError::Json(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursos.json");
        std::fs::write(&path, CURSOS).unwrap();
        assert_eq!(TableDefinition::load(&path).unwrap().name, "cursos");

        let missing = TableDefinition::load(dir.path().join("nope.json"));
        assert!(matches!(missing, Err(SchemaError::Io { .. })));
    }

    #[test]
    fn test_renamed() {
        let def = TableDefinition::canonical().renamed("alumnos").unwrap();
        assert_eq!(def.name, "alumnos");
        assert!(TableDefinition::canonical().renamed("de").is_err());
    }
}
