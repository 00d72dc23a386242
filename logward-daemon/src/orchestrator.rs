//! Pipeline orchestration -- generation assembly and the reload state machine.
//!
//! The [`Orchestrator`] is the central coordinator of `logward-daemon`.
//! It loads configuration, builds one *pipeline generation* at a time
//! (event bus, supervision root, data source tasks, correlation stage,
//! API server), runs the signal loop, and drives reloads.
//!
//! # Reload State Machine
//!
//! ```text
//! Running --SIGHUP--> Draining --> Reconfiguring --> Starting --> Running
//! ```
//!
//! - **Draining**: kill the acquisition supervision root, wait for every
//!   source task, then wait for the correlation stage and the API server,
//!   logging a distinct marker as each stage stops.
//! - **Reconfiguring**: re-read `logward.toml` and re-apply logging
//!   settings (level, format, destination).
//! - **Starting**: allocate generation N+1 and rebuild everything; a
//!   single "reload is finished" marker is logged only after every stage
//!   is confirmed running.
//!
//! At most one Draining/Reconfiguring/Starting sequence executes at a
//! time: the signal listener queues at most one pending reload and the
//! run loop processes requests serially. A reload that cannot produce a
//! valid pipeline is fatal -- the error propagates out of [`Orchestrator::run`]
//! and the process exits nonzero.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use logward_acquisition::datasource::{AcquisitionMode, MetricsLevel};
use logward_acquisition::error::task_error;
use logward_acquisition::loader;
use logward_core::config::LogwardConfig;
use logward_core::metrics as m;
use logward_core::bus;
use logward_core::supervision::Supervisor;

use crate::api::ApiServer;
use crate::logging::LoggingHandle;
use crate::stage::CorrelationStage;

/// Reload state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    /// Steady state between reloads.
    Running,
    /// Stopping the active generation.
    Draining,
    /// Re-reading configuration.
    Reconfiguring,
    /// Building the next generation.
    Starting,
}

impl fmt::Display for ReloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Reconfiguring => write!(f, "reconfiguring"),
            Self::Starting => write!(f, "starting"),
        }
    }
}

/// One complete build of the pipeline, replaced wholesale on reload.
struct Generation {
    number: u64,
    root: Supervisor,
    stage: CorrelationStage,
    api: Option<ApiServer>,
}

/// The main daemon orchestrator.
pub struct Orchestrator {
    config_path: PathBuf,
    config: LogwardConfig,
    logging: Option<LoggingHandle>,
    state: ReloadState,
    generation_counter: u64,
    current: Option<Generation>,
    last_generation_events: Option<u64>,
}

impl Orchestrator {
    /// Load configuration from disk and build the orchestrator.
    pub async fn build(config_path: impl Into<PathBuf>) -> Result<Self> {
        let config_path = config_path.into();
        let config = LogwardConfig::load(&config_path)
            .await
            .with_context(|| format!("failed to load {}", config_path.display()))?;
        Ok(Self::from_config(config_path, config))
    }

    /// Build from an already-loaded configuration.
    ///
    /// Reloads still re-read `config_path` from scratch.
    pub fn from_config(config_path: impl Into<PathBuf>, config: LogwardConfig) -> Self {
        Self {
            config_path: config_path.into(),
            config,
            logging: None,
            state: ReloadState::Running,
            generation_counter: 0,
            current: None,
            last_generation_events: None,
        }
    }

    /// Attach the logging reload handle so reloads can retarget log output.
    pub fn with_logging(mut self, logging: LoggingHandle) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Current reload state.
    pub fn state(&self) -> ReloadState {
        self.state
    }

    /// Number of the active (or next, before first start) generation.
    pub fn generation(&self) -> u64 {
        self.generation_counter
    }

    /// Loaded configuration.
    pub fn config(&self) -> &LogwardConfig {
        &self.config
    }

    /// Events accepted by the active generation's correlation stage.
    pub fn events_processed(&self) -> u64 {
        self.current.as_ref().map_or(0, |g| g.stage.processed())
    }

    /// Total events accepted by the most recently drained generation.
    pub fn last_generation_events(&self) -> Option<u64> {
        self.last_generation_events
    }

    /// Address of the active generation's API listener, if enabled.
    pub fn api_addr(&self) -> Option<std::net::SocketAddr> {
        self.current
            .as_ref()
            .and_then(|g| g.api.as_ref())
            .map(ApiServer::local_addr)
    }

    /// Build and start the current generation.
    pub async fn start_pipeline(&mut self) -> Result<()> {
        let generation = start_generation(&self.config, self.generation_counter).await?;
        metrics::gauge!(m::DAEMON_PIPELINE_GENERATION).set(generation.number as f64);
        self.current = Some(generation);
        Ok(())
    }

    /// Run the full reload sequence: Draining -> Reconfiguring -> Starting.
    ///
    /// On success the machine is back in `Running` with generation N+1
    /// active. On failure the error is returned and the caller decides the
    /// process fate (fatal at the top level, mirroring startup strictness).
    pub async fn reload(&mut self) -> Result<()> {
        tracing::info!(
            generation = self.generation_counter,
            "reload requested, draining pipeline"
        );

        self.state = ReloadState::Draining;
        self.drain_current().await;

        self.state = ReloadState::Reconfiguring;
        let config = LogwardConfig::load(&self.config_path)
            .await
            .with_context(|| format!("failed to reload {}", self.config_path.display()))?;
        self.config = config;
        if let Some(logging) = &self.logging {
            logging
                .apply(&self.config.general)
                .context("failed to re-apply logging configuration")?;
        }

        self.state = ReloadState::Starting;
        self.generation_counter += 1;
        self.start_pipeline()
            .await
            .context("failed to start reloaded pipeline")?;

        metrics::counter!(m::DAEMON_RELOADS_TOTAL).increment(1);
        self.state = ReloadState::Running;
        tracing::info!(generation = self.generation_counter, "reload is finished");
        Ok(())
    }

    /// Drain and discard the active generation (final shutdown).
    pub async fn shutdown(&mut self) {
        self.drain_current().await;
    }

    async fn drain_current(&mut self) {
        let Some(generation) = self.current.take() else {
            return;
        };
        let Generation {
            number,
            root,
            stage,
            api,
        } = generation;

        tracing::info!(generation = number, "shutdown of acquisition requested");
        root.kill();
        match root.wait().await {
            Ok(()) => tracing::info!(generation = number, "acquisition pipeline stopped"),
            Err(e) => tracing::warn!(
                generation = number,
                error = %e,
                "acquisition pipeline stopped with error"
            ),
        }

        let drain_timeout = Duration::from_secs(self.config.correlation.drain_timeout_secs);
        let processed = stage.stop(drain_timeout).await;
        self.last_generation_events = Some(processed);
        tracing::info!(generation = number, processed, "correlation stage stopped");

        if let Some(api) = api {
            api.stop().await;
            tracing::info!(generation = number, "api server stopped");
        }
    }

    /// Start the pipeline and run until SIGTERM/SIGINT; SIGHUP reloads.
    pub async fn run(&mut self) -> Result<()> {
        self.start_pipeline().await?;

        let (reload_tx, mut reload_rx) = mpsc::channel::<()>(1);
        spawn_reload_listener(reload_tx)?;

        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {e}"))?;
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {e}"))?;

        tracing::info!("entering main event loop");
        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!(signal = "SIGTERM", "shutdown signal received");
                    break;
                }
                _ = sigint.recv() => {
                    tracing::info!(signal = "SIGINT", "shutdown signal received");
                    break;
                }
                Some(()) = reload_rx.recv() => {
                    // Requests are processed serially here, so two phases
                    // can never interleave; a second signal waits in the
                    // capacity-1 queue until this reload completes.
                    self.reload().await?;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }
}

/// Forward SIGHUP into the reload queue.
///
/// The queue holds at most one pending request; further signals received
/// while one is queued are dropped with a warning, never interleaved.
fn spawn_reload_listener(reload_tx: mpsc::Sender<()>) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sighup = signal(SignalKind::hangup())
        .map_err(|e| anyhow::anyhow!("failed to install SIGHUP handler: {e}"))?;

    tokio::spawn(async move {
        while sighup.recv().await.is_some() {
            if reload_tx.try_send(()).is_err() {
                tracing::warn!("a reload is already pending, ignoring extra reload signal");
            }
        }
    });
    Ok(())
}

/// Build one complete pipeline generation and start every stage.
async fn start_generation(config: &LogwardConfig, number: u64) -> Result<Generation> {
    let report = loader::load(&config.acquisition, MetricsLevel::Aggregated).await?;
    for warning in &report.warnings {
        tracing::warn!(warning = %warning, "acquisition warning");
    }

    let root = Supervisor::root_for_generation("acquisition", number);
    let (bus_tx, bus_rx) = bus::channel(config.acquisition.bus_capacity, number);

    let source_count = report.sources.len();
    for configured in report.sources {
        let node = root.isolated_child(format!("datasource/{}", configured.source_type));
        let bus = bus_tx.clone();
        let task_node = node.clone();
        let source_type = configured.source_type.clone();
        tracing::debug!(
            generation = number,
            source_type = %source_type,
            path = %configured.path.display(),
            position = configured.position,
            "starting data source"
        );
        let mut source = configured.source;
        node.spawn(async move {
            let result = match source.mode() {
                AcquisitionMode::Cat => source.oneshot_acquisition(bus, task_node).await,
                AcquisitionMode::Tail => source.streaming_acquisition(bus, task_node).await,
            };
            result.map_err(|e| task_error(&source_type, e))
        });
    }
    // The orchestrator keeps no sender: once every source task has
    // terminated, the stage's drain loop observes the closed bus.
    drop(bus_tx);

    let stage = CorrelationStage::start(bus_rx);

    let api = if config.api.enabled {
        Some(ApiServer::start(&config.api.bind, number).await?)
    } else {
        None
    };

    tracing::info!(generation = number, sources = source_count, "pipeline started");
    Ok(Generation {
        number,
        root,
        stage,
        api,
    })
}
