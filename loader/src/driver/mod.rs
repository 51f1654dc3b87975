//! Load driver: create the table once, then insert one record at a time.
//!
//! ```text
//! SchemaPending ──create table──▶ LoadingRecords ──source exhausted──▶ Done
//! ```
//!
//! Failing to *launch* the create-table query aborts the run. Everything else
//! that goes wrong for a single record is counted in the [`LoadSummary`],
//! logged with the record's key, and the driver moves on.
//!
//! # Example
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

mod summary;

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::TableDefinition;
use crate::dsl::QueryBuilder;
use crate::engine::Engine;
use crate::error::{LoadError, LoadResult, SourceResult};
use crate::logging::{log_info, log_success, log_warning};
use crate::models::Record;
use crate::source::{RecordSource, SourceOptions};

pub use summary::{FailureKind, LoadReport, LoadSummary, RecordFailure};

/// Failure details kept in a summary by default.
pub const DEFAULT_MAX_FAILURES_KEPT: usize = 50;

/// Records between progress messages.
const PROGRESS_EVERY: usize = 1000;

/// Where the driver is in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    SchemaPending,
    LoadingRecords,
    Done,
}

/// Options for one load.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Run the create-table step
    pub create_table: bool,

    /// Stop after this many records
    pub limit: Option<usize>,

    /// Failure details kept in the summary (counts are always exact)
    pub max_failures_kept: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            create_table: true,
            limit: None,
            max_failures_kept: DEFAULT_MAX_FAILURES_KEPT,
        }
    }
}

/// Drives one table load through an [`Engine`].
pub struct LoadDriver<E> {
    engine: E,
    database: String,
    target: TableDefinition,
    options: LoadOptions,
    state: LoadState,
}

impl<E: Engine> LoadDriver<E> {
    pub fn new(engine: E, database: impl Into<String>, target: TableDefinition) -> Self {
        Self {
            engine,
            database: database.into(),
            target,
            options: LoadOptions::default(),
            state: LoadState::SchemaPending,
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Run the whole load over `records`.
    ///
    /// Records are pulled one at a time; each insert query is built just
    /// before it is sent. A source error aborts the run.
    pub fn run<I>(&mut self, records: I) -> LoadResult<LoadSummary>
    where
        I: IntoIterator<Item = SourceResult<Record>>,
    {
        let mut summary = LoadSummary {
            table_created: self.create_table()?,
            ..Default::default()
        };

        self.state = LoadState::LoadingRecords;
        log_info(format!(
            "📥 Loading records into '{}' ({})...",
            self.target.name, self.database
        ));

        let limit = self.options.limit.unwrap_or(usize::MAX);
        for item in records.into_iter().take(limit) {
            let record = item?;
            summary.total += 1;
            self.load_record(&record, &mut summary);

            if summary.total % PROGRESS_EVERY == 0 {
                info!(
                    total = summary.total,
                    failed = summary.failed(),
                    "progress"
                );
            }
        }

        self.engine.finish().map_err(LoadError::Engine)?;
        self.state = LoadState::Done;

        if summary.is_clean() {
            log_success(format!("All {} records loaded", summary.total));
        } else {
            log_warning(summary.line());
        }
        Ok(summary)
    }

    /// Create step. `Ok(false)` when skipped or when the engine reported failure.
    fn create_table(&mut self) -> LoadResult<bool> {
        if !self.options.create_table {
            log_info(format!("Skipping create step for '{}'", self.target.name));
            return Ok(false);
        }

        log_info(format!("🧱 Creating table '{}'...", self.target.name));
        let query = QueryBuilder::new(&self.target.schema, &self.target.name).create_table();
        debug!(query = %query, "create table");

        let result = self
            .engine
            .invoke(&self.database, &query)
            .map_err(LoadError::CreateTable)?;
        trace!(output = %result.output.trim_end(), "engine output");

        if result.succeeded() {
            log_success(format!("Table '{}' created", self.target.name));
            Ok(true)
        } else {
            log_warning(format!(
                "Create table failed ({}); continuing, the table may already exist",
                result.failure_reason()
            ));
            Ok(false)
        }
    }

    fn load_record(&mut self, record: &Record, summary: &mut LoadSummary) {
        let cap = self.options.max_failures_kept;
        let key = self.record_key(record);

        let query = match QueryBuilder::new(&self.target.schema, &self.target.name).insert(record) {
            Ok(query) => query,
            Err(err) => {
                let kind = FailureKind::from(&err);
                report_failure(summary, cap, record, key, kind, err.to_string());
                return;
            }
        };
        debug!(line = record.line(), query = %query, "insert");

        match self.engine.invoke(&self.database, &query) {
            Ok(result) if result.succeeded() => {
                trace!(line = record.line(), output = %result.output.trim_end(), "engine output");
                summary.succeeded += 1;
            }
            Ok(result) => {
                let reason = result.failure_reason();
                report_failure(summary, cap, record, key, FailureKind::EngineExecution, reason);
            }
            Err(err) => {
                report_failure(summary, cap, record, key, FailureKind::EngineLaunch, err.to_string());
            }
        }
    }

    /// `name=value` of the record's key column, if the schema has one and the record fills it.
    fn record_key(&self, record: &Record) -> Option<String> {
        let column = self.target.schema.key_column()?;
        record
            .get(&column.name)
            .filter(|value| !value.is_empty())
            .map(|value| format!("{}={}", column.name, value))
    }
}

fn report_failure(
    summary: &mut LoadSummary,
    cap: usize,
    record: &Record,
    key: Option<String>,
    kind: FailureKind,
    message: String,
) {
    let failure = RecordFailure {
        line: record.line(),
        key,
        kind,
        message,
    };
    warn!(
        record = %failure.label(),
        kind = ?failure.kind,
        "record not loaded: {}",
        failure.message
    );
    summary.record_failure(failure, cap);
}

/// Open `input` and load it into `target` through `engine`.
pub fn load_csv<E: Engine>(
    input: impl AsRef<Path>,
    database: &str,
    target: TableDefinition,
    engine: E,
    source_options: &SourceOptions,
    options: LoadOptions,
) -> LoadResult<LoadSummary> {
    log_info(format!("📖 Reading {}", input.as_ref().display()));
    let source = RecordSource::open(input.as_ref(), source_options)?;
    log_success(format!(
        "Encoding: {}, delimiter: '{}'",
        source.info().encoding,
        format_delimiter(source.info().delimiter)
    ));
    load_source(source, database, target, engine, options)
}

/// Load an already opened source into `target` through `engine`.
pub fn load_source<E: Engine>(
    source: RecordSource,
    database: &str,
    target: TableDefinition,
    engine: E,
    options: LoadOptions,
) -> LoadResult<LoadSummary> {
    let missing = source.missing_columns(&target.schema);
    if !missing.is_empty() {
        log_warning(format!(
            "Header row lacks schema columns: {} (those rows will be rejected)",
            missing.join(", ")
        ));
    }

    LoadDriver::new(engine, database, target)
        .with_options(options)
        .run(source)
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}
