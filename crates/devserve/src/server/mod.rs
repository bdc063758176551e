//! Dev server lifecycle.
//!
//! [`DevServer::run`] is the whole startup chain as one sequential future:
//!
//! ```text
//! Idle → Resolving → Starting → Listening → ShuttingDown → Stopped
//!            └──────────── no port ──────────────────────────┘
//! ```
//!
//! Resolving picks the port and validates proxy rules. Starting composes the
//! URLs, wires the compiler to the terminal and the browser, and plans the
//! pipeline. Listening binds, starts the compiler and serves until the
//! shutdown future resolves; the listener is then dropped, which frees the
//! port, and the compiler is stopped.

mod error_overlay;
pub mod pipeline;
pub mod ssr;
pub mod stages;
pub mod state;

pub use pipeline::PipelineContext;
pub use ssr::SsrRenderer;
pub use stages::{Hook, Hooks, StageOutcome};
pub use state::{
    BuildStatus, BundleCache, CompiledAsset, DevEvent, DevServerState, SharedAssets, SharedState,
};

use crate::browser::BrowserOpener;
use crate::compiler::{BundlerCompiler, CompileEvent, CompilerAdapter};
use crate::config::{Protocol, ServerConfiguration};
use crate::error::{ConfigError, DevServerError, Result};
use crate::features::{select_plan, Feature};
use crate::port::{choose_port, Prompt};
use crate::proxy::{resolve_proxy, ProxyForwarder};
use crate::ui;
use crate::urls::{prepare_urls, LanLookup};
use crate::watcher::{self, FileWatcher};
use std::fmt;
use std::future::{Future, IntoFuture};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Server-sent events stream for live reload.
pub const LIVE_RELOAD_PATH: &str = "/__devserve_sse__";

/// Script that connects a page to [`LIVE_RELOAD_PATH`].
pub const RELOAD_SCRIPT_PATH: &str = "/__devserve_reload__.js";

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Resolving,
    Starting,
    Listening,
    ShuttingDown,
    Stopped,
}

impl Phase {
    fn can_become(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Idle, Resolving)
                | (Resolving, Starting)
                | (Resolving, Stopped)
                | (Starting, Listening)
                | (Listening, ShuttingDown)
                | (ShuttingDown, Stopped)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How a session that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Served until shutdown was requested
    Stopped,
    /// The port was busy and no alternative was accepted; nothing was started
    NoPortAvailable,
}

/// Everything the lifecycle drives but does not own the policy of.
pub struct Collaborators {
    pub compiler: Box<dyn BundlerCompiler>,
    pub prompt: Box<dyn Prompt + Send>,
    pub lan: Box<dyn LanLookup>,
    pub browser: Box<dyn BrowserOpener>,
    pub hooks: Hooks,
    /// Receives the compiler status lines
    pub status_sink: Box<dyn Write + Send>,
    /// Clear the terminal between reports
    pub interactive: bool,
}

/// One dev server session.
pub struct DevServer {
    config: ServerConfiguration,
    collaborators: Collaborators,
    phase: watch::Sender<Phase>,
}

impl DevServer {
    pub fn new(config: ServerConfiguration, collaborators: Collaborators) -> Self {
        let (phase, _) = watch::channel(Phase::Idle);
        Self {
            config,
            collaborators,
            phase,
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Follow phase changes, e.g. to wait until the server is listening.
    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    fn transition(&self, next: Phase) -> Result<()> {
        let current = self.phase();
        if !current.can_become(next) {
            return Err(DevServerError::Server(format!(
                "illegal lifecycle transition {} -> {}",
                current, next
            )));
        }
        tracing::debug!(from = %current, to = %next, "Lifecycle transition");
        self.phase.send_replace(next);
        Ok(())
    }

    /// Run the session until `shutdown` resolves.
    ///
    /// Any error ends the session; the caller maps it to an exit code.
    pub async fn run(mut self, shutdown: impl Future<Output = ()> + Send) -> Result<Outcome> {
        self.transition(Phase::Resolving)?;

        let host = self.config.host.clone();
        let prompt = self.collaborators.prompt.as_mut();
        let Some(port) = choose_port(&host, self.config.port, prompt)? else {
            self.transition(Phase::Stopped)?;
            return Ok(Outcome::NoPortAvailable);
        };

        let rules = resolve_proxy(self.config.proxy.as_ref(), &self.config.static_asset_root())?;

        self.transition(Phase::Starting)?;

        if self.config.protocol == Protocol::Https {
            tracing::warn!(
                "HTTPS=true: URLs are announced as https, TLS must be terminated in front of the dev server"
            );
        }

        let endpoints = prepare_urls(
            self.config.protocol,
            &host,
            port,
            self.collaborators.lan.as_ref(),
        );
        let addr = resolve_addr(&host, port).await?;
        let forwarder = ProxyForwarder::new()?;

        let compiler = &self.collaborators.compiler;
        let state: SharedState = Arc::new(DevServerState::new(compiler.assets()));

        let sink = std::mem::replace(
            &mut self.collaborators.status_sink,
            Box::new(std::io::sink()),
        );
        let adapter = CompilerAdapter::new(self.config.app_name.clone(), endpoints.clone(), sink)
            .with_color(ui::colors_enabled())
            .with_clear_console(self.collaborators.interactive);

        let mut tasks: Vec<JoinHandle<()>> = vec![
            tokio::spawn(adapter.run(compiler.subscribe())),
            tokio::spawn(track_builds(state.clone(), compiler.subscribe())),
        ];

        let mut hooks = self.collaborators.hooks.clone();
        if self.config.server_side_render {
            hooks.after.push(Arc::new(SsrRenderer::new()));
        }

        let flags = self.config.feature_flags(hooks.has_before(), hooks.has_after());
        let plan = select_plan(&flags);
        tracing::info!(plan = %plan, "Middleware plan");
        if flags.server_side_render {
            for violation in plan.ordering_violations() {
                tracing::warn!(%violation, "Middleware plan ordering");
            }
        }

        let content_base = self.config.content_base.dir().map(|d| d.to_path_buf());

        let _content_watcher = if plan.contains(Feature::WatchContentBase) {
            content_base
                .clone()
                .and_then(|dir| watch_content_base(dir, state.clone(), &mut tasks))
        } else {
            None
        };

        let ctx = Arc::new(PipelineContext {
            plan,
            state: state.clone(),
            headers: pipeline::header_map(&self.config.headers),
            proxy: rules,
            forwarder,
            content_base,
            hooks,
        });
        let router = pipeline::build_router(ctx);

        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                abort_all(&tasks);
                return Err(DevServerError::Bind { addr, source });
            }
        };

        self.transition(Phase::Listening)?;

        if self.collaborators.interactive {
            ui::clear_console();
        }
        ui::info("Starting the development server...");

        if let Err(e) = self.collaborators.compiler.start().await {
            abort_all(&tasks);
            return Err(e);
        }

        if self.config.open {
            if let Err(e) = self.collaborators.browser.open(&endpoints.browser_url) {
                tracing::warn!(url = %endpoints.browser_url, error = %e, "Failed to open browser");
            }
        }

        let served = tokio::select! {
            result = axum::serve(listener, router).into_future() => Some(result),
            _ = shutdown => None,
        };

        self.transition(Phase::ShuttingDown)?;
        ui::info("Shutting down development server...");

        self.collaborators.compiler.stop().await;
        abort_all(&tasks);

        self.transition(Phase::Stopped)?;

        match served {
            Some(Err(e)) => Err(DevServerError::Server(e.to_string())),
            Some(Ok(())) => Err(DevServerError::Server(
                "server stopped unexpectedly".to_string(),
            )),
            None => {
                ui::success("Development server stopped");
                Ok(Outcome::Stopped)
            }
        }
    }
}

fn abort_all(tasks: &[JoinHandle<()>]) {
    for task in tasks {
        task.abort();
    }
}

async fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr> {
    let bind_host = if host.is_empty() { "0.0.0.0" } else { host };
    let bind_host = bind_host.trim_start_matches('[').trim_end_matches(']');

    tokio::net::lookup_host((bind_host, port))
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| {
            ConfigError::InvalidValue {
                field: "host".to_string(),
                value: host.to_string(),
                hint: "HOST must resolve to a local address".to_string(),
            }
            .into()
        })
}

/// Mirror compile events into the shared state and out to browsers.
async fn track_builds(state: SharedState, mut events: broadcast::Receiver<CompileEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let dev_event = match event {
            CompileEvent::Started => {
                state.start_build();
                DevEvent::BuildStarted
            }
            CompileEvent::Done(stats) => {
                state.complete_build(stats.duration_ms);
                DevEvent::BuildCompleted {
                    duration_ms: stats.duration_ms,
                }
            }
            CompileEvent::Failed(errors) => {
                let error = errors.join("\n\n");
                state.fail_build(error.clone());
                DevEvent::BuildFailed { error }
            }
        };

        state.broadcast(&dev_event).await;
    }
}

/// Reload browsers when the content base changes.
fn watch_content_base(
    dir: std::path::PathBuf,
    state: SharedState,
    tasks: &mut Vec<JoinHandle<()>>,
) -> Option<FileWatcher> {
    let (watcher, mut changes) = match FileWatcher::new(dir, vec![], 100) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::debug!(error = %e, "Content base not watched");
            return None;
        }
    };

    let root = watcher.root().to_path_buf();
    tasks.push(tokio::spawn(async move {
        while let Some(batch) = watcher::next_batch(&mut changes, Duration::from_millis(50)).await
        {
            for change in batch {
                let path = change
                    .path()
                    .strip_prefix(&root)
                    .unwrap_or(change.path())
                    .to_string_lossy()
                    .into_owned();
                state.broadcast(&DevEvent::ContentChanged { path }).await;
            }
        }
    }));

    Some(watcher)
}

/// Resolves on SIGINT or SIGTERM (Ctrl+C elsewhere).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
