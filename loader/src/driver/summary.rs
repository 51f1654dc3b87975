//! Load summary and the JSON run report.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{LoadError, QueryError};

/// Why a record did not load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The record lacks a schema column.
    MissingField,
    /// A text value cannot be written as a string literal (a `"`, or empty).
    UnrepresentableValue,
    /// The engine could not be started for this record.
    EngineLaunch,
    /// The engine ran and reported failure.
    EngineExecution,
}

impl FailureKind {
    /// Rejected before reaching the engine.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::MissingField | Self::UnrepresentableValue)
    }
}

impl From<&QueryError> for FailureKind {
    fn from(err: &QueryError) -> Self {
        match err {
            QueryError::MissingField { .. } => Self::MissingField,
            QueryError::UnrepresentableValue { .. } | QueryError::EmptyValue { .. } => {
                Self::UnrepresentableValue
            }
        }
    }
}

/// One record that did not load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFailure {
    /// Source line (0 when unknown)
    pub line: u64,
    /// Value of the record's key column, when it has one
    pub key: Option<String>,
    pub kind: FailureKind,
    pub message: String,
}

impl RecordFailure {
    /// `codigo=20190001` or `line 12`, whichever identifies the record.
    pub fn label(&self) -> String {
        match &self.key {
            Some(key) => key.clone(),
            None => format!("line {}", self.line),
        }
    }
}

/// Counts for one load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    /// Records read from the source
    pub total: usize,
    /// Records the engine accepted
    pub succeeded: usize,
    /// Records rejected before reaching the engine
    pub rejected: usize,
    /// Records whose invocation could not be launched
    pub launch_failures: usize,
    /// Records the engine ran and reported as failed
    pub execution_failures: usize,
    /// The create-table step ran and succeeded
    pub table_created: bool,
    /// First failures, in input order (capped)
    pub failures: Vec<RecordFailure>,
    /// Failures beyond the cap that were counted but not kept
    pub failures_omitted: usize,
}

impl LoadSummary {
    /// All records that did not load.
    pub fn failed(&self) -> usize {
        self.rejected + self.launch_failures + self.execution_failures
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }

    pub(crate) fn record_failure(&mut self, failure: RecordFailure, cap: usize) {
        match failure.kind {
            kind if kind.is_rejection() => self.rejected += 1,
            FailureKind::EngineLaunch => self.launch_failures += 1,
            _ => self.execution_failures += 1,
        }
        if self.failures.len() < cap {
            self.failures.push(failure);
        } else {
            self.failures_omitted += 1;
        }
    }

    /// One-line summary.
    pub fn line(&self) -> String {
        format!(
            "{} records: {} loaded, {} failed ({} rejected, {} launch, {} engine)",
            self.total,
            self.succeeded,
            self.failed(),
            self.rejected,
            self.launch_failures,
            self.execution_failures
        )
    }
}

/// Summary plus run metadata, written as JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub database: String,
    pub table: String,
    pub input: Option<PathBuf>,
    pub summary: LoadSummary,
}

impl LoadReport {
    pub fn new(
        database: impl Into<String>,
        table: impl Into<String>,
        input: Option<PathBuf>,
        started_at: DateTime<Utc>,
        summary: LoadSummary,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: started_at.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
            database: database.into(),
            table: table.into(),
            input,
            summary,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), LoadError> {
        let report_error = |message: String| LoadError::Report {
            path: path.to_path_buf(),
            message,
        };
        let json = self.to_json().map_err(|e| report_error(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| report_error(e.to_string()))
    }
}
