//! Logging through `tracing` and `tracing-subscriber`.
//!
//! Everything goes to stderr so that `render` output on stdout stays clean.
//!
//! # Log Levels
//!
//! - `error`: fatal errors
//! - `warn`: records that did not load, a failed create step
//! - `info`: load progress and the final summary
//! - `debug`: every query sent to the engine
//! - `trace`: engine output
//!
//! The `log_*` helpers emit progress messages with a status prefix, for
//! the human-facing steps of a load.

use std::io::{self, IsTerminal};

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Status of a progress message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Info => "",
            LogLevel::Success => "✓ ",
            LogLevel::Warning => "⚠️  ",
            LogLevel::Error => "❌ ",
        }
    }
}

/// Emit a progress message at the level matching `level`.
pub fn log(level: LogLevel, message: impl AsRef<str>) {
    let message = message.as_ref();
    let prefix = level.prefix();
    match level {
        LogLevel::Info | LogLevel::Success => tracing::info!("{}{}", prefix, message),
        LogLevel::Warning => tracing::warn!("{}{}", prefix, message),
        LogLevel::Error => tracing::error!("{}{}", prefix, message),
    }
}

pub fn log_info(msg: impl AsRef<str>) {
    log(LogLevel::Info, msg);
}

pub fn log_success(msg: impl AsRef<str>) {
    log(LogLevel::Success, msg);
}

pub fn log_warning(msg: impl AsRef<str>) {
    log(LogLevel::Warning, msg);
}

pub fn log_error(msg: impl AsRef<str>) {
    log(LogLevel::Error, msg);
}

// =============================================================================
// Subscriber
// =============================================================================

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable, colored.
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// JSON lines, with timestamps.
    Json,
}

/// Subscriber configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Color escapes in pretty and compact output (on when stderr is a terminal)
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::default(),
            with_ansi: io::stderr().is_terminal(),
        }
    }
}

impl LogConfig {
    /// 0 = info, 1 (`-v`) = debug, 2+ (`-vv`) = trace.
    #[must_use]
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            ..Default::default()
        }
    }

    /// Only warnings and errors.
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            level: Level::WARN,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

type FilteredRegistry = Layered<EnvFilter, Registry>;

/// Install the global subscriber, writing to stderr.
///
/// Call once at startup. Panics if a global subscriber is already set.
pub fn init_logging(config: &LogConfig) {
    let filter = build_env_filter(config.level);
    tracing_subscriber::registry()
        .with(filter)
        .with(format_layer(config, io::stderr))
        .init();
}

/// Event formatter for `config.format`. Pretty and compact output omit the time.
fn format_layer<W>(config: &LogConfig, writer: W) -> Box<dyn Layer<FilteredRegistry> + Send + Sync>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_target(false);
    match config.format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Compact => layer
            .compact()
            .without_time()
            .with_ansi(config.with_ansi)
            .boxed(),
        LogFormat::Pretty => layer.without_time().with_ansi(config.with_ansi).boxed(),
    }
}

/// `RUST_LOG` wins over the configured level.
fn build_env_filter(level: Level) -> EnvFilter {
    let level = level.as_str().to_lowercase();
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,elena_load={level}", level = level)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(LogConfig::from_verbosity(0).level, Level::INFO);
        assert_eq!(LogConfig::from_verbosity(1).level, Level::DEBUG);
        assert_eq!(LogConfig::from_verbosity(5).level, Level::TRACE);
        assert_eq!(LogConfig::quiet().level, Level::WARN);
    }

    #[test]
    fn test_with_format() {
        let config = LogConfig::from_verbosity(1).with_format(LogFormat::Json);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, Level::DEBUG);
    }

    #[test]
    fn test_json_layer_writes_events() {
        use std::sync::{Arc, Mutex};

        #[derive(Clone, Default)]
        struct Buffer(Arc<Mutex<Vec<u8>>>);

        impl io::Write for Buffer {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let buffer = Buffer::default();
        let sink = buffer.clone();
        let config = LogConfig::default().with_format(LogFormat::Json);
        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new("info"))
            .with(format_layer(&config, move || sink.clone()));

        tracing::subscriber::with_default(subscriber, || log_success("table created"));

        let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let event: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(event["level"], "INFO");
        assert_eq!(event["fields"]["message"], "✓ table created");
    }

    #[test]
    fn test_helpers_without_subscriber() {
        log_info("info");
        log_success("done");
        log_warning("careful");
        log_error("broken");
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(LogLevel::Success.prefix(), "✓ ");
        assert_eq!(LogLevel::Info.prefix(), "");
    }
}
