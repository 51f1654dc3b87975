//! Query builder for `creame tabla` and `mete` statements.
//!
//! Grammar accepted by the engine:
//!
//! ```text
//! creame tabla <name> { <col> <type> [@id|@unique], ... } pe
//! mete { <col>: <value>, ... } en <name> pe
//! ```
//!
//! Every field clause of a create-table statement ends with a comma, the last
//! one included. Text values are double-quoted, integers bare, booleans
//! `true`/`false`.

use crate::error::{QueryError, QueryResult};
use crate::models::{CoercedValue, Column, ColumnType, Record, Schema};

use super::coerce::coerce;
use super::Query;

/// Name given to the identity column appended to schemas that lack one.
pub const DEFAULT_IDENTITY_NAME: &str = "id";

/// Renders queries for one table.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'a> {
    schema: &'a Schema,
    table: &'a str,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(schema: &'a Schema, table: &'a str) -> Self {
        Self { schema, table }
    }

    /// Render the create-table statement.
    pub fn create_table(&self) -> Query {
        let mut clauses: Vec<String> = self.schema.columns().iter().map(field_clause).collect();

        if self.schema.identity().is_none() {
            let id = Column::int(generated_identity_name(self.schema)).identity();
            clauses.push(field_clause(&id));
        }

        Query::new(format!(
            "creame tabla {} {{ {} }} pe",
            self.table,
            clauses.join(" ")
        ))
    }

    /// Render the insert statement for one record.
    pub fn insert(&self, record: &Record) -> QueryResult<Query> {
        let mut pairs = Vec::with_capacity(self.schema.len());

        for column in self.schema.data_columns() {
            let raw = record.get(&column.name).ok_or_else(|| QueryError::MissingField {
                column: column.name.clone(),
            })?;
            let value = render_value(column, coerce(column, raw))?;
            pairs.push(format!("{}: {}", column.name, value));
        }

        Ok(Query::new(format!(
            "mete {{ {} }} en {} pe",
            pairs.join(", "),
            self.table
        )))
    }

}

/// Render the create-table statement for `schema` as table `table`.
pub fn build_create_table(schema: &Schema, table: &str) -> Query {
    QueryBuilder::new(schema, table).create_table()
}

/// Render the insert statement for `record` into table `table`.
pub fn build_insert(schema: &Schema, record: &Record, table: &str) -> QueryResult<Query> {
    QueryBuilder::new(schema, table).insert(record)
}

/// `<name> <type> [markers],`
fn field_clause(column: &Column) -> String {
    let mut clause = format!("{} {}", column.name, column.column_type.token());
    for constraint in &column.constraints {
        clause.push(' ');
        clause.push_str(constraint.marker());
    }
    clause.push(',');
    clause
}

fn render_value(column: &Column, value: CoercedValue) -> QueryResult<String> {
    match value {
        CoercedValue::Integer(n) => Ok(n.to_string()),
        CoercedValue::Boolean(b) => Ok(b.to_string()),
        CoercedValue::Text(text) => {
            // String literals have no escape: any '"' ends the literal,
            // and `""` produces no token.
            if text.is_empty() {
                return Err(QueryError::EmptyValue {
                    column: column.name.clone(),
                });
            }
            if text.contains('"') {
                return Err(QueryError::UnrepresentableValue {
                    column: column.name.clone(),
                    value: text,
                });
            }
            debug_assert!(matches!(column.column_type, ColumnType::FixedString(_)));
            Ok(format!("\"{}\"", text))
        }
    }
}

fn generated_identity_name(schema: &Schema) -> String {
    let taken = |name: &str| schema.columns().iter().any(|c| c.name == name);
    if !taken(DEFAULT_IDENTITY_NAME) {
        return DEFAULT_IDENTITY_NAME.to_string();
    }
    (1..)
        .map(|i| format!("{}_{}", DEFAULT_IDENTITY_NAME, i))
        .find(|name| !taken(name))
        .unwrap_or_else(|| DEFAULT_IDENTITY_NAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ana() -> Record {
        Record::from_pairs([
            ("codigo", "20190001"),
            ("nombre", "Ana Li"),
            ("tipo_documento", "DNI"),
            ("documento", "12345678"),
            ("creditos", "20"),
            ("correo", "a@x.com"),
            ("es_tercio", "SI"),
        ])
    }

    #[test]
    fn test_create_table_canonical() {
        let query = build_create_table(&Schema::canonical(), "estudiantes");
        assert_eq!(
            query.as_str(),
            "creame tabla estudiantes { id int @id, codigo char(8) @unique, nombre char(255), \
             tipo_documento char(24), documento char(13), creditos int, correo char(255), \
             es_tercio bool, } pe"
        );
    }

    #[test]
    fn test_create_table_one_clause_per_column() {
        let schema = Schema::canonical();
        let query = build_create_table(&schema, "estudiantes");
        assert_eq!(query.as_str().matches(',').count(), schema.len());
        assert_eq!(query.as_str().matches("@id").count(), 1);
        assert_eq!(query.as_str().matches("@unique").count(), 1);

        // Clauses appear in schema order.
        let positions: Vec<usize> = schema
            .columns()
            .iter()
            .map(|c| query.as_str().find(&format!(" {} ", c.name)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_create_table_appends_identity() {
        let schema = Schema::new(vec![Column::char("nombre", 10), Column::int("edad")]).unwrap();
        let query = build_create_table(&schema, "personas");
        assert_eq!(
            query.as_str(),
            "creame tabla personas { nombre char(10), edad int, id int @id, } pe"
        );
    }

    #[test]
    fn test_create_table_identity_name_collision() {
        let schema = Schema::new(vec![Column::char("id", 10)]).unwrap();
        let query = build_create_table(&schema, "t");
        assert_eq!(query.as_str(), "creame tabla t { id char(10), id_1 int @id, } pe");
    }

    #[test]
    fn test_create_table_both_markers() {
        let schema = Schema::new(vec![Column::int("k").identity().unique()]).unwrap();
        let query = build_create_table(&schema, "t");
        assert_eq!(query.as_str(), "creame tabla t { k int @id @unique, } pe");
    }

    #[test]
    fn test_insert_scenario_valid_row() {
        let query = build_insert(&Schema::canonical(), &ana(), "estudiantes").unwrap();
        assert_eq!(
            query.as_str(),
            "mete { codigo: \"20190001\", nombre: \"Ana Li\", tipo_documento: \"DNI\", \
             documento: \"12345678\", creditos: 20, correo: \"a@x.com\", es_tercio: true } \
             en estudiantes pe"
        );
    }

    #[test]
    fn test_insert_scenario_fallbacks() {
        let record = ana().with("creditos", "abc").with("es_tercio", "NO");
        let query = build_insert(&Schema::canonical(), &record, "estudiantes").unwrap();
        assert!(query.as_str().contains("creditos: 0,"));
        assert!(query.as_str().contains("es_tercio: false }"));
    }

    #[test]
    fn test_insert_follows_schema_order_not_record_order() {
        let mut pairs: Vec<(String, String)> = ana().fields().to_vec();
        pairs.reverse();
        let reversed = Record::new(3, pairs);
        let a = build_insert(&Schema::canonical(), &ana(), "estudiantes").unwrap();
        let b = build_insert(&Schema::canonical(), &reversed, "estudiantes").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_insert_is_deterministic() {
        let schema = Schema::canonical();
        let first = build_insert(&schema, &ana(), "estudiantes").unwrap();
        let second = build_insert(&schema, &ana(), "estudiantes").unwrap();
        assert_eq!(first.as_str().as_bytes(), second.as_str().as_bytes());
    }

    #[test]
    fn test_insert_missing_field() {
        let record = ana().without("correo");
        let err = build_insert(&Schema::canonical(), &record, "estudiantes").unwrap_err();
        assert_eq!(
            err,
            QueryError::MissingField {
                column: "correo".into()
            }
        );
    }

    #[test]
    fn test_insert_ignores_extra_and_identity_fields() {
        let record = ana().with("id", "99").with("extra", "x");
        let query = build_insert(&Schema::canonical(), &record, "estudiantes").unwrap();
        assert!(!query.as_str().contains("id: "));
        assert!(!query.as_str().contains("extra"));
    }

    #[test]
    fn test_insert_rejects_embedded_quote() {
        let record = ana().with("nombre", "Ana \"La\" Li");
        let err = build_insert(&Schema::canonical(), &record, "estudiantes").unwrap_err();
        assert!(matches!(err, QueryError::UnrepresentableValue { column, .. } if column == "nombre"));
    }

    #[test]
    fn test_insert_rejects_empty_text() {
        let record = ana().with("correo", "");
        let err = build_insert(&Schema::canonical(), &record, "estudiantes").unwrap_err();
        assert_eq!(
            err,
            QueryError::EmptyValue {
                column: "correo".into()
            }
        );
    }

    #[test]
    fn test_empty_int_and_bool_still_render() {
        let record = ana().with("creditos", "").with("es_tercio", "");
        let query = build_insert(&Schema::canonical(), &record, "estudiantes").unwrap();
        assert!(query.as_str().contains("creditos: 0,"));
        assert!(query.as_str().contains("es_tercio: false }"));
    }
}
