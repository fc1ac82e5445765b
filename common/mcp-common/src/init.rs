//! Tracing initialization for MCP servers
//!
//! Installs one console layer and, when a log directory is configured, a
//! rolling file layer. Servers speaking MCP over stdio must log to stderr
//! because stdout carries protocol frames; HTTP servers log to stdout.
//!
//! Set `LOG_FORMAT=json` for structured JSON console output. The file layer
//! always writes plain text.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Base name of the log file inside the log directory
pub const LOG_FILE_NAME: &str = "server.log";

/// Where console log lines are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleTarget {
    Stdout,
    Stderr,
}

/// Logging options for [`init_tracing`]
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Console stream for log output
    pub console: ConsoleTarget,
    /// Directory for the rolling log file; `None` disables file logging
    pub log_dir: Option<PathBuf>,
    /// Number of rotated log files to keep
    pub max_files: usize,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            console: ConsoleTarget::Stderr,
            log_dir: None,
            max_files: 5,
        }
    }
}

impl LogOptions {
    /// Console logging only, on the given stream
    pub fn console(target: ConsoleTarget) -> Self {
        Self {
            console: target,
            ..Default::default()
        }
    }

    /// Also write logs to `<dir>/server.log`
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn json_requested() -> bool {
    std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn console_layer(target: ConsoleTarget, json: bool) -> BoxedLayer {
    match (target, json) {
        (ConsoleTarget::Stdout, true) => fmt::layer().json().with_writer(std::io::stdout).boxed(),
        (ConsoleTarget::Stdout, false) => fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(false)
            .boxed(),
        (ConsoleTarget::Stderr, true) => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        (ConsoleTarget::Stderr, false) => fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .boxed(),
    }
}

/// Initialize tracing/logging for an MCP server
///
/// The filter comes from `RUST_LOG` with a default of `info` for
/// `crate_name`. Returns the file writer's guard when file logging is
/// enabled; keep it alive for the lifetime of the process or buffered lines
/// are lost on exit.
///
/// # Example
///
/// ```rust,ignore
/// let options = LogOptions::console(ConsoleTarget::Stdout).with_log_dir("logs");
/// let _guard = mcp_common::init_tracing("pg_mcp", options)?;
/// ```
pub fn init_tracing(crate_name: &str, options: LogOptions) -> anyhow::Result<Option<WorkerGuard>> {
    let directive = format!("{}=info", crate_name);
    let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);

    let mut layers: Vec<BoxedLayer> = vec![console_layer(options.console, json_requested())];

    let guard = match &options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_FILE_NAME)
                .max_log_files(options.max_files)
                .build(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(fmt::layer().with_writer(writer).with_ansi(false).boxed());
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;

    Ok(guard)
}
