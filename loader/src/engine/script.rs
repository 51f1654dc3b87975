//! Query script sink: append each query to a file instead of running it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::dsl::Query;
use crate::error::{EngineError, EngineResult};

use super::{Engine, InvocationResult};

/// Writes one query per line.
///
/// Every invocation succeeds except for a query holding a line break, which is
/// reported as failed and not written.
pub struct ScriptEngine<W: Write = BufWriter<File>> {
    writer: W,
    path: PathBuf,
    written: usize,
}

impl ScriptEngine {
    /// Create (or truncate) the script at `path`.
    pub fn create(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| EngineError::Script {
            path: path.clone(),
            source,
        })?;
        Ok(Self::from_writer(BufWriter::new(file), path))
    }
}

impl<W: Write> ScriptEngine<W> {
    /// Write to any sink; `label` names it in errors.
    pub fn from_writer(writer: W, label: impl Into<PathBuf>) -> Self {
        Self {
            writer,
            path: label.into(),
            written: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.writer
    }

    fn error(&self, source: std::io::Error) -> EngineError {
        EngineError::Script {
            path: self.path.clone(),
            source,
        }
    }
}

impl<W: Write> Engine for ScriptEngine<W> {
    fn invoke(&mut self, _database: &str, query: &Query) -> EngineResult<InvocationResult> {
        if query.as_str().contains(['\n', '\r']) {
            return Ok(InvocationResult {
                errors: "query contains a line break and cannot be written as one script line"
                    .to_string(),
                ..InvocationResult::exited(1, "")
            });
        }
        writeln!(self.writer, "{}", query).map_err(|e| self.error(e))?;
        self.written += 1;
        Ok(InvocationResult::ok(""))
    }

    fn finish(&mut self) -> EngineResult<()> {
        self.writer.flush().map_err(|e| self.error(e))?;
        debug!(path = %self.path.display(), queries = self.written, "query script written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::build_create_table;
    use crate::models::Schema;

    #[test]
    fn test_writes_one_query_per_line() {
        let mut engine = ScriptEngine::from_writer(Vec::new(), "memory");
        let create = build_create_table(&Schema::canonical(), "estudiantes");
        engine.invoke("demo.db", &create).unwrap();
        engine.invoke("demo.db", &create).unwrap();
        engine.finish().unwrap();

        let text = String::from_utf8(engine.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("creame tabla estudiantes {"));
    }

    #[test]
    fn test_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("load.elena");
        let mut engine = ScriptEngine::create(&path).unwrap();
        engine
            .invoke("demo.db", &build_create_table(&Schema::canonical(), "t"))
            .unwrap();
        engine.finish().unwrap();
        drop(engine);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("} pe\n"));
    }

    #[test]
    fn test_multiline_query_not_written() {
        let schema = Schema::canonical();
        let record = crate::models::Record::from_pairs([
            ("codigo", "20190001"),
            ("nombre", "Ana\nLi"),
            ("tipo_documento", "DNI"),
            ("documento", "12345678"),
            ("creditos", "20"),
            ("correo", "a@x.com"),
            ("es_tercio", "SI"),
        ]);
        let insert = crate::dsl::build_insert(&schema, &record, "estudiantes").unwrap();

        let mut engine = ScriptEngine::from_writer(Vec::new(), "memory");
        let result = engine.invoke("demo.db", &insert).unwrap();
        engine.finish().unwrap();

        assert!(!result.succeeded());
        assert!(result.failure_reason().contains("line break"));
        assert!(engine.into_inner().is_empty());
    }

    #[test]
    fn test_unwritable_path_is_script_error() {
        let result = ScriptEngine::create("/nonexistent-dir/load.elena");
        assert!(matches!(result, Err(EngineError::Script { .. })));
    }
}
