//! Logging initialization for logward-daemon.
//!
//! Configures `tracing-subscriber` based on the `[general]` section of
//! `LogwardConfig`. Supports JSON structured logging and human-readable
//! pretty format, writing to stderr or a file under `log_dir`.
//!
//! Level, format, and destination are held behind reload handles so the
//! reload orchestrator can retarget them mid-process: lines logged after
//! [`LoggingHandle::apply`] go to the new destination, while the old
//! destination keeps only the lines written before the switch.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, reload};

use logward_core::config::GeneralConfig;

const LOG_FILE_NAME: &str = "logward.log";

type FilteredRegistry = Layered<reload::Layer<EnvFilter, Registry>, Registry>;
type DynFmtLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// Current log destination. Swapped atomically on reload.
enum LogTarget {
    Stderr,
    File(Arc<File>),
}

/// A `MakeWriter` whose destination can be swapped at runtime.
#[derive(Clone)]
pub struct SharedLogWriter {
    target: Arc<RwLock<LogTarget>>,
}

impl SharedLogWriter {
    fn new(general: &GeneralConfig) -> Result<Self> {
        let writer = Self {
            target: Arc::new(RwLock::new(LogTarget::Stderr)),
        };
        writer.retarget(general)?;
        Ok(writer)
    }

    /// Point subsequent log lines at the destination the config names.
    fn retarget(&self, general: &GeneralConfig) -> Result<()> {
        let target = match &general.log_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create log directory {dir}"))?;
                let path = Path::new(dir).join(LOG_FILE_NAME);
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("failed to open log file {}", path.display()))?;
                LogTarget::File(Arc::new(file))
            }
            None => LogTarget::Stderr,
        };
        *self
            .target
            .write()
            .unwrap_or_else(PoisonError::into_inner) = target;
        Ok(())
    }
}

/// Writer handed out per log line.
pub enum LogWriter {
    Stderr(io::Stderr),
    File(Arc<File>),
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stderr(stderr) => stderr.write(buf),
            Self::File(file) => (&**file).write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stderr(stderr) => stderr.flush(),
            Self::File(file) => (&**file).flush(),
        }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedLogWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        match &*self.target.read().unwrap_or_else(PoisonError::into_inner) {
            LogTarget::Stderr => LogWriter::Stderr(io::stderr()),
            LogTarget::File(file) => LogWriter::File(Arc::clone(file)),
        }
    }
}

/// Handles for retargeting the installed subscriber on reload.
pub struct LoggingHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    fmt: reload::Handle<DynFmtLayer, FilteredRegistry>,
    writer: SharedLogWriter,
}

impl LoggingHandle {
    /// Re-apply logging settings from a freshly reloaded configuration.
    ///
    /// The destination is swapped before the format layer so the first
    /// line of the new generation already lands in the new target.
    pub fn apply(&self, general: &GeneralConfig) -> Result<()> {
        self.filter
            .reload(EnvFilter::new(&general.log_level))
            .context("failed to reload log filter")?;
        self.writer.retarget(general)?;
        self.fmt
            .reload(build_fmt_layer(&general.log_format, self.writer.clone())?)
            .context("failed to reload log format layer")?;
        Ok(())
    }
}

fn build_fmt_layer(format: &str, writer: SharedLogWriter) -> Result<DynFmtLayer> {
    match format {
        "json" => Ok(Box::new(
            tracing_subscriber::fmt::layer().json().with_writer(writer),
        )),
        "pretty" => Ok(Box::new(
            tracing_subscriber::fmt::layer().pretty().with_writer(writer),
        )),
        other => Err(anyhow::anyhow!(
            "unknown log format '{other}', expected 'json' or 'pretty'"
        )),
    }
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
pub fn init(general: &GeneralConfig) -> Result<LoggingHandle> {
    let writer = SharedLogWriter::new(general)?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&general.log_level));
    let (filter_layer, filter_handle) = reload::Layer::new(env_filter);

    let fmt_layer = build_fmt_layer(&general.log_format, writer.clone())?;
    let (fmt_layer, fmt_handle) = reload::Layer::new(fmt_layer);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))?;

    Ok(LoggingHandle {
        filter: filter_handle,
        fmt: fmt_handle,
        writer,
    })
}
