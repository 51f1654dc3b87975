//! elena-load CLI - Bulk load CSV files into ElenaDB
//!
//! # Commands
//!
//! ```bash
//! elena-load load demo.db fisi_2020.csv             # Create the table, insert every row
//! elena-load load demo.db data.csv --schema t.json  # Load into a configured table
//! elena-load load demo.db data.csv --script q.elena # Write queries to a file instead
//! elena-load render data.csv                        # Print the queries, run nothing
//! elena-load schema                                 # Show the active table definition
//! ```
//!
//! The engine binary is taken from `--engine`, else `ELENA_BIN` (a `.env`
//! file is read), else `elena` on the `PATH`.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use elena_load::driver::format_delimiter;
use elena_load::logging::{init_logging, log_error, log_info, log_success, log_warning, LogConfig, LogFormat};
use elena_load::{
    load_source, Engine, EngineInvoker, LoadError, LoadOptions, LoadReport, QueryBuilder,
    RecordSource, SourceOptions, TableDefinition,
};

/// Exit status when `--strict` is set and some records did not load.
const EXIT_PARTIAL: u8 = 2;

#[derive(Parser)]
#[command(name = "elena-load")]
#[command(about = "Bulk load CSV files into ElenaDB, one query per row", long_about = None)]
#[command(version)]
struct Cli {
    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the table, then insert every record
    Load {
        /// Database file passed to the engine
        database: String,

        /// Input CSV file ("-" for stdin)
        input: PathBuf,

        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        source: SourceArgs,

        /// Engine binary (default: $ELENA_BIN, else "elena")
        #[arg(short, long)]
        engine: Option<PathBuf>,

        /// Treat engine output containing this text as a failure
        #[arg(long)]
        failure_marker: Option<String>,

        /// Append queries to this file instead of running the engine
        #[arg(long, conflicts_with_all = ["engine", "failure_marker"])]
        script: Option<PathBuf>,

        /// Skip the create-table step
        #[arg(long)]
        no_create: bool,

        /// Stop after this many records
        #[arg(short, long)]
        limit: Option<usize>,

        /// Failure details kept in the summary
        #[arg(long, default_value_t = elena_load::driver::DEFAULT_MAX_FAILURES_KEPT)]
        max_failures: usize,

        /// Write a JSON run report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Exit with status 2 if any record did not load
        #[arg(long)]
        strict: bool,
    },

    /// Print the create query and every insert query without running them
    Render {
        /// Input CSV file ("-" for stdin)
        input: PathBuf,

        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        source: SourceArgs,

        /// Omit the create-table query
        #[arg(long)]
        no_create: bool,
    },

    /// Show the table definition as JSON and its create-table query
    Schema {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Table definition file (JSON); default is the built-in estudiantes table
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// Override the table name
    #[arg(short, long)]
    table: Option<String>,
}

impl TargetArgs {
    fn resolve(&self) -> Result<TableDefinition, LoadError> {
        let definition = match &self.schema {
            Some(path) => TableDefinition::load(path)?,
            None => TableDefinition::canonical(),
        };
        Ok(match &self.table {
            Some(name) => definition.renamed(name)?,
            None => definition,
        })
    }
}

#[derive(Args)]
struct SourceArgs {
    /// CSV delimiter (auto-detect if not specified)
    #[arg(short, long)]
    delimiter: Option<char>,

    /// Input encoding label, e.g. utf-8, iso-8859-1 (auto-detect if not specified)
    #[arg(long)]
    encoding: Option<String>,
}

impl SourceArgs {
    fn options(&self) -> SourceOptions {
        SourceOptions {
            delimiter: self.delimiter,
            encoding: self.encoding.clone(),
        }
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = if cli.quiet {
        LogConfig::quiet()
    } else {
        LogConfig::from_verbosity(cli.verbose)
    };
    init_logging(&config.with_format(cli.log_format));

    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            log_error(error_chain(&err));
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<ExitCode, LoadError> {
    match command {
        Commands::Load {
            database,
            input,
            target,
            source,
            engine,
            failure_marker,
            script,
            no_create,
            limit,
            max_failures,
            report,
            strict,
        } => {
            let started_at = Utc::now();
            let target = target.resolve()?;
            let table = target.name.clone();
            let records = open_source(&input, &source.options())?;

            let engine: Box<dyn Engine> = match script {
                Some(path) => {
                    log_info(format!("📝 Writing queries to {}", path.display()));
                    Box::new(elena_load::ScriptEngine::create(&path).map_err(LoadError::Engine)?)
                }
                None => {
                    let invoker = match engine {
                        Some(binary) => EngineInvoker::new(binary),
                        None => EngineInvoker::from_env(),
                    };
                    let invoker = match failure_marker {
                        Some(marker) => invoker.with_failure_marker(marker),
                        None => invoker,
                    };
                    log_info(format!("🚀 Engine: {}", invoker.binary().display()));
                    Box::new(invoker)
                }
            };

            let options = LoadOptions {
                create_table: !no_create,
                limit,
                max_failures_kept: max_failures,
            };
            let summary = load_source(records, &database, target, engine, options)?;

            log_info(format!("📊 {}", summary.line()));
            if summary.failures_omitted > 0 {
                log_warning(format!(
                    "{} failures beyond the first {} were not itemised",
                    summary.failures_omitted,
                    summary.failures.len()
                ));
            }

            if let Some(path) = report {
                let input = (input != Path::new("-")).then(|| input.clone());
                LoadReport::new(&database, table, input, started_at, summary.clone())
                    .write_to(&path)?;
                log_success(format!("Report written to {}", path.display()));
            }

            if strict && !summary.is_clean() {
                return Ok(ExitCode::from(EXIT_PARTIAL));
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Render {
            input,
            target,
            source,
            no_create,
        } => {
            let target = target.resolve()?;
            let records = open_source(&input, &source.options())?;
            let builder = QueryBuilder::new(&target.schema, &target.name);

            let stdout = io::stdout();
            let mut out = io::BufWriter::new(stdout.lock());

            if !no_create {
                writeln!(out, "{}", builder.create_table())?;
            }
            let mut skipped = 0usize;
            for record in records {
                let record = record?;
                match builder.insert(&record) {
                    Ok(query) => writeln!(out, "{}", query)?,
                    Err(err) => {
                        skipped += 1;
                        log_warning(format!("line {}: {}", record.line(), err));
                    }
                }
            }
            out.flush()?;

            if skipped > 0 {
                log_warning(format!("{} records skipped", skipped));
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Schema { target } => {
            let target = target.resolve()?;
            let json = target
                .to_json()
                .map_err(|e| LoadError::Schema(e.into()))?;
            println!("{}", json);
            println!();
            println!("{}", QueryBuilder::new(&target.schema, &target.name).create_table());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Open a file, or stdin for "-".
fn open_source(input: &Path, options: &SourceOptions) -> Result<RecordSource, LoadError> {
    let source = if input == Path::new("-") {
        log_info("📖 Reading stdin");
        RecordSource::from_reader(io::stdin(), options)?
    } else {
        log_info(format!("📖 Reading {}", input.display()));
        RecordSource::open(input, options)?
    };
    log_success(format!(
        "{} columns, encoding {}, delimiter '{}'",
        source.headers().len(),
        source.info().encoding,
        format_delimiter(source.info().delimiter)
    ));
    Ok(source)
}

/// The error and its causes on one line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        cause = inner.source();
    }
    message
}
