// Supervisor
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// Loads the log registry, starts one watcher per log plus the fan-out,
// heartbeat and HTTP tasks, and tears everything down from a single
// cancellation token.

use crate::api::{ApiServer, AppState};
use crate::config::Config;
use crate::ct_logs::client::{CtClient, LogApi};
use crate::ct_logs::sources::{filter_denylisted, LogDescriptor, LogRegistry};
use crate::ct_logs::stats::StatsTracker;
use crate::ct_logs::watcher::PerLogWatcher;
use crate::error::CertstreamError;
use crate::stream::{event_bus, run_fanout, run_heartbeats, RecentHistory, SubscriberRegistry};
use crate::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Waits for SIGINT, SIGTERM or SIGQUIT
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for Ctrl-C
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Process lifecycle owner
pub struct Supervisor {
    config: Config,
    api: Arc<dyn LogApi>,
    shutdown: CancellationToken,
}

impl Supervisor {
    /// Supervisor talking to real logs over HTTP
    pub fn new(config: Config) -> Result<Self> {
        let client = CtClient::new(config.watcher.request_timeout())?
            .with_max_attempts(config.watcher.max_attempts);
        Ok(Self::with_log_api(config, Arc::new(client)))
    }

    /// Supervisor with a custom log client
    pub fn with_log_api(config: Config, api: Arc<dyn LogApi>) -> Self {
        Self {
            config,
            api,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelling this token stops every task
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Fetch the registry and drop denylisted logs. Failure is fatal.
    pub async fn load_logs(&self) -> Result<Vec<LogDescriptor>> {
        let registry = LogRegistry::new(&self.config.registry.url, self.config.watcher.request_timeout())?;
        let logs = registry.fetch().await?;
        let total = logs.len();

        let logs = filter_denylisted(logs, &self.config.registry.denylist);
        info!(
            "Watching {} of {} registry logs ({} denylisted)",
            logs.len(),
            total,
            total - logs.len()
        );
        if logs.is_empty() {
            warn!("No logs left to watch; only heartbeats will be sent");
        }

        Ok(logs)
    }

    /// Run until the shutdown token fires or the HTTP server fails
    pub async fn run(self, listener: TcpListener) -> Result<()> {
        let logs = self.load_logs().await?;
        let shutdown = self.shutdown.clone();
        let stream = &self.config.stream;

        let (publisher, receiver) = event_bus(stream.bus_capacity);
        let registry = SubscriberRegistry::new(stream.subscriber_queue_capacity, shutdown.clone());
        let history = RecentHistory::new(stream.history_capacity);
        let stats = StatsTracker::new();

        let mut watchers = JoinSet::new();
        let settings = self.config.watcher.settings();
        for log in logs {
            let watcher = PerLogWatcher::new(
                log,
                self.api.clone(),
                settings.clone(),
                publisher.clone(),
                stats.clone(),
            );
            watchers.spawn(watcher.run(shutdown.child_token()));
        }
        // Only watchers hold publishers, so the fan-out ends once they do
        drop(publisher);

        let fanout = tokio::spawn(run_fanout(
            receiver,
            registry.clone(),
            history.clone(),
            shutdown.child_token(),
        ));
        let heartbeats = tokio::spawn(run_heartbeats(
            registry.clone(),
            stream.heartbeat_interval(),
            shutdown.child_token(),
        ));

        let state = Arc::new(AppState::new(
            registry.clone(),
            history,
            stats,
            shutdown.clone(),
        ));
        let server = ApiServer::new(self.config.server.clone(), state);
        let mut server = tokio::spawn(server.serve(listener, shutdown.clone()));

        let server_result = tokio::select! {
            _ = shutdown.cancelled() => None,
            result = &mut server => Some(result),
        };

        info!("Shutting down");
        shutdown.cancel();
        registry.close_all().await;

        while let Some(joined) = watchers.join_next().await {
            if let Err(e) = joined {
                error!("Watcher task failed: {}", e);
            }
        }

        let forwarded = fanout.await?;
        let beats = heartbeats.await?;
        info!("Forwarded {} events, sent {} heartbeats", forwarded, beats);

        let server_result = match server_result {
            Some(result) => result,
            None => server.await,
        };

        match server_result {
            Ok(result) => result,
            Err(e) => Err(CertstreamError::from(e)),
        }
    }
}
