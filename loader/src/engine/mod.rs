//! Engine invocation.
//!
//! The engine is an external CLI called as `<binary> <database> <query>`.
//! [`EngineInvoker`] launches it once per query, blocks until it exits and
//! captures what it printed. [`ScriptEngine`] writes the queries to a file
//! instead, for dry runs and offline batches.
//!
//! A launch failure is an [`EngineError`]; a non-zero exit status is not. It
//! comes back in [`InvocationResult`] and the caller decides what it means.

mod script;

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

use crate::dsl::Query;
use crate::error::{EngineError, EngineResult};

pub use script::ScriptEngine;

/// Environment variable naming the engine binary.
pub const ENGINE_BIN_ENV: &str = "ELENA_BIN";

/// Binary used when nothing else is configured.
pub const DEFAULT_ENGINE_BIN: &str = "elena";

/// Something that can execute one query against a database.
pub trait Engine {
    /// Execute `query` against `database`, blocking until it completes.
    fn invoke(&mut self, database: &str, query: &Query) -> EngineResult<InvocationResult>;

    /// Called once after the last query.
    fn finish(&mut self) -> EngineResult<()> {
        Ok(())
    }
}

impl<E: Engine + ?Sized> Engine for &mut E {
    fn invoke(&mut self, database: &str, query: &Query) -> EngineResult<InvocationResult> {
        (**self).invoke(database, query)
    }

    fn finish(&mut self) -> EngineResult<()> {
        (**self).finish()
    }
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn invoke(&mut self, database: &str, query: &Query) -> EngineResult<InvocationResult> {
        (**self).invoke(database, query)
    }

    fn finish(&mut self) -> EngineResult<()> {
        (**self).finish()
    }
}

// =============================================================================
// Invocation Result
// =============================================================================

/// Outcome of one query execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    /// Exit code, `None` if the process was killed by a signal
    pub exit_code: Option<i32>,
    /// Captured standard output
    pub output: String,
    /// Captured standard error
    pub errors: String,
    /// The output contained the configured failure marker
    pub flagged: bool,
}

impl InvocationResult {
    /// A clean run with the given output.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            output: output.into(),
            errors: String::new(),
            flagged: false,
        }
    }

    /// A run that exited with `code`.
    pub fn exited(code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::ok(output)
        }
    }

    /// Exit status zero and no failure marker.
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0) && !self.flagged
    }

    /// Human-readable reason for a failed run.
    pub fn failure_reason(&self) -> String {
        let status = match self.exit_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        let detail = [self.errors.trim(), self.output.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .and_then(|s| s.lines().last())
            .unwrap_or("");

        match (self.flagged, detail.is_empty()) {
            (true, true) => format!("engine reported an error ({})", status),
            (true, false) => format!("engine reported an error ({}): {}", status, detail),
            (false, true) => status,
            (false, false) => format!("{}: {}", status, detail),
        }
    }
}

// =============================================================================
// Process Engine
// =============================================================================

/// Runs the engine binary as a child process, once per query.
#[derive(Debug, Clone)]
pub struct EngineInvoker {
    binary: PathBuf,
    failure_marker: Option<String>,
}

impl EngineInvoker {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            failure_marker: None,
        }
    }

    /// Binary from `ELENA_BIN`, else `elena` on the `PATH`.
    pub fn from_env() -> Self {
        let binary = std::env::var(ENGINE_BIN_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENGINE_BIN.to_string());
        Self::new(binary)
    }

    /// Treat runs whose standard output or standard error contains `marker`
    /// as failed.
    ///
    /// The engine prints query errors and may still exit with status 0.
    pub fn with_failure_marker(mut self, marker: impl Into<String>) -> Self {
        let marker = marker.into();
        self.failure_marker = (!marker.is_empty()).then_some(marker);
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run one query and wait for the engine to exit.
    pub fn run(&self, database: &str, query: &Query) -> EngineResult<InvocationResult> {
        let output = Command::new(&self.binary)
            .arg(database)
            .arg(query.as_str())
            .output()
            .map_err(|source| EngineError::Launch {
                binary: self.binary.display().to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let flagged = self
            .failure_marker
            .as_deref()
            .is_some_and(|marker| stdout.contains(marker) || stderr.contains(marker));

        Ok(InvocationResult {
            exit_code: output.status.code(),
            output: stdout,
            errors: stderr,
            flagged,
        })
    }
}

impl Engine for EngineInvoker {
    fn invoke(&mut self, database: &str, query: &Query) -> EngineResult<InvocationResult> {
        self.run(database, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(text: &str) -> Query {
        Query::new(text.to_string())
    }

    #[test]
    fn test_result_classification() {
        assert!(InvocationResult::ok("").succeeded());
        assert!(!InvocationResult::exited(1, "").succeeded());

        let mut flagged = InvocationResult::ok("Error: duplicate key");
        flagged.flagged = true;
        assert!(!flagged.succeeded());
        assert!(flagged.failure_reason().contains("duplicate key"));
    }

    #[test]
    fn test_failure_reason_prefers_stderr() {
        let mut result = InvocationResult::exited(2, "some output");
        result.errors = "boom\n".into();
        assert_eq!(result.failure_reason(), "exit status 2: boom");
        assert_eq!(InvocationResult::exited(3, "").failure_reason(), "exit status 3");
    }

    #[test]
    fn test_missing_binary_is_launch_error() {
        let invoker = EngineInvoker::new("/nonexistent/elena-binary");
        let err = invoker.run("demo.db", &query("dame todo de t pe")).unwrap_err();
        assert!(matches!(err, EngineError::Launch { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_passes_database_and_query_as_arguments() {
        let mut invoker = EngineInvoker::new("echo");
        let result = invoker
            .invoke("demo.db", &query("mete { a: 1 } en t pe"))
            .unwrap();
        assert!(result.succeeded());
        assert_eq!(result.output, "demo.db mete { a: 1 } en t pe\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_reported_not_raised() {
        let invoker = EngineInvoker::new("false");
        let result = invoker.run("demo.db", &query("x")).unwrap();
        assert_eq!(result.exit_code, Some(1));
        assert!(!result.succeeded());
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_marker_flags_zero_exit() {
        let invoker = EngineInvoker::new("echo").with_failure_marker("Error:");
        let result = invoker.run("Error:", &query("x")).unwrap();
        assert_eq!(result.exit_code, Some(0));
        assert!(result.flagged);
        assert!(!result.succeeded());

        let clean = invoker.run("demo.db", &query("x")).unwrap();
        assert!(clean.succeeded());
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_marker_matches_stderr() {
        // Invoked as `sh -c <query>`, so the query text runs as the script.
        let invoker = EngineInvoker::new("sh").with_failure_marker("Error:");
        let result = invoker
            .run("-c", &query("echo 'Error: no such table' >&2"))
            .unwrap();
        assert_eq!(result.exit_code, Some(0));
        assert!(result.flagged);
        assert!(result.failure_reason().contains("no such table"));
    }

    #[test]
    fn test_empty_marker_disabled() {
        let invoker = EngineInvoker::new("elena").with_failure_marker("");
        assert!(invoker.failure_marker.is_none());
    }
}
