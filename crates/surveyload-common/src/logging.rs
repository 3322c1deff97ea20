//! Tracing subscriber setup shared by Surveyload binaries
//!
//! Console output goes to stderr so progress bars and summaries on stdout stay
//! readable. File output rolls daily under `log_dir`. Both sinks share one
//! filter: the configured minimum level, `RUST_LOG`, and any extra directives.
//!
//! Library code only emits events with structured fields, for example
//! `info!(table = %name, rows, "Materialized table")`.
//!
//! # Example
//!
//! ```no_run
//! use surveyload_common::logging::{init_logging, LogConfig, LogLevel};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::builder().level(LogLevel::Debug).build().merge_env()?;
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("Ready");
//!     Ok(())
//! }
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::error::{CommonError, Result};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// `--verbose` shows debug events, otherwise only warnings and errors
    pub fn for_verbosity(verbose: bool) -> Self {
        if verbose {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        }
    }

    fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        parse_word(
            "log level",
            s,
            &[
                ("trace", LogLevel::Trace),
                ("debug", LogLevel::Debug),
                ("info", LogLevel::Info),
                ("warn", LogLevel::Warn),
                ("warning", LogLevel::Warn),
                ("error", LogLevel::Error),
            ],
        )
    }
}

/// Log sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

impl LogOutput {
    pub fn writes_console(self) -> bool {
        self != LogOutput::File
    }

    pub fn writes_file(self) -> bool {
        self != LogOutput::Console
    }
}

impl FromStr for LogOutput {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        parse_word(
            "log output",
            s,
            &[
                ("console", LogOutput::Console),
                ("stderr", LogOutput::Console),
                ("file", LogOutput::File),
                ("both", LogOutput::Both),
            ],
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        parse_word("log format", s, &[("text", LogFormat::Text), ("json", LogFormat::Json)])
    }
}

fn parse_word<T: Copy>(kind: &'static str, raw: &str, words: &[(&str, T)]) -> Result<T> {
    let wanted = raw.trim();
    words
        .iter()
        .find(|(word, _)| word.eq_ignore_ascii_case(wanted))
        .map(|(_, value)| *value)
        .ok_or_else(|| CommonError::invalid_value(kind, raw))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,
    pub output: LogOutput,
    pub format: LogFormat,
    /// Rolling files land here as `<file_prefix>.<date>`
    pub log_dir: PathBuf,
    pub file_prefix: String,
    /// Comma-separated directives, e.g. `sqlx=warn,surveyload::store=trace`
    pub directives: Option<String>,
    pub with_location: bool,
    pub with_targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            output: LogOutput::default(),
            format: LogFormat::default(),
            log_dir: PathBuf::from("logs"),
            file_prefix: "surveyload".to_string(),
            directives: None,
            with_location: false,
            with_targets: true,
        }
    }
}

impl LogConfig {
    /// Defaults overridden by `LOG_*` variables
    pub fn from_env() -> Result<Self> {
        Self::default().merge_env()
    }

    /// Apply whichever of these are set:
    ///
    /// | variable | values |
    /// |----------|--------|
    /// | `LOG_LEVEL` | trace, debug, info, warn, error |
    /// | `LOG_OUTPUT` | console, file, both |
    /// | `LOG_FORMAT` | text, json |
    /// | `LOG_DIR` | directory for rolling files |
    /// | `LOG_FILE_PREFIX` | file name prefix |
    /// | `LOG_FILTER` | extra filter directives |
    /// | `LOG_INCLUDE_LOCATION` | true / false |
    /// | `LOG_INCLUDE_TARGETS` | true / false |
    ///
    /// An unparseable level, output or format is an error; flags that do not
    /// parse as booleans keep their current value.
    pub fn merge_env(mut self) -> Result<Self> {
        if let Some(level) = env_var("LOG_LEVEL") {
            self.level = level.parse()?;
        }
        if let Some(output) = env_var("LOG_OUTPUT") {
            self.output = output.parse()?;
        }
        if let Some(format) = env_var("LOG_FORMAT") {
            self.format = format.parse()?;
        }
        if let Some(dir) = env_var("LOG_DIR") {
            self.log_dir = dir.into();
        }
        if let Some(prefix) = env_var("LOG_FILE_PREFIX") {
            self.file_prefix = prefix;
        }
        self.directives = env_var("LOG_FILTER").or(self.directives);
        self.with_location = env_flag("LOG_INCLUDE_LOCATION").unwrap_or(self.with_location);
        self.with_targets = env_flag("LOG_INCLUDE_TARGETS").unwrap_or(self.with_targets);
        Ok(self)
    }

    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }

    fn env_filter(&self) -> anyhow::Result<EnvFilter> {
        let mut filter = EnvFilter::builder()
            .with_default_directive(self.level.filter().into())
            .from_env_lossy();

        let extra = self.directives.as_deref().unwrap_or_default();
        for directive in extra.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            let parsed = directive
                .parse()
                .with_context(|| format!("Invalid log filter directive '{}'", directive))?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn env_flag(name: &str) -> Option<bool> {
    env_var(name).and_then(|value| value.trim().parse().ok())
}

#[derive(Debug, Default)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    /// Directory and file prefix for rolling log files
    pub fn files(mut self, dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        self.config.log_dir = dir.into();
        self.config.file_prefix = prefix.into();
        self
    }

    pub fn directives(mut self, directives: impl Into<String>) -> Self {
        self.config.directives = Some(directives.into());
        self
    }

    pub fn build(self) -> LogConfig {
        self.config
    }
}

/// Holds the background file writer; dropping it flushes pending lines
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file_writer: Option<WorkerGuard>,
}

/// Install the global subscriber; fails if one is already installed
pub fn init_logging(config: &LogConfig) -> anyhow::Result<LoggingGuard> {
    let filter = config.env_filter()?;
    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);
    let mut file_writer = None;

    if config.output.writes_console() {
        layers.push(fmt_layer(config, std::io::stderr, true));
    }

    if config.output.writes_file() {
        std::fs::create_dir_all(&config.log_dir).with_context(|| {
            format!("Failed to create log directory {}", config.log_dir.display())
        })?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, &config.file_prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt_layer(config, writer, false));
        file_writer = Some(guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("A tracing subscriber is already installed")?;

    Ok(LoggingGuard {
        _file_writer: file_writer,
    })
}

fn fmt_layer<W>(config: &LogConfig, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(config.with_targets)
        .with_file(config.with_location)
        .with_line_number(config.with_location)
        // Closing spans carry the duration of instrumented pipeline stages
        .with_span_events(FmtSpan::CLOSE);

    match config.format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}
