//! Lifeline - resilient RPC client with offline fallback
//!
//! Keeps an application usable while its backend is unreachable, flaky, or
//! returning malformed responses. Reads are served from a static fallback
//! registry, writes are simulated, and a connectivity monitor decides which
//! mode is active.

pub mod client;
pub mod config;
pub mod error;
pub mod io;
pub mod monitor;
pub mod notifier;
pub mod operation;
pub mod policy;
pub mod probe;
pub mod registry;
pub mod status;
pub mod transport;

pub use client::{MutationOptions, QueryResult, ResilientClient};
pub use config::{load_config, Config};
pub use error::{LifelineError, Result};
pub use monitor::{ConnectivityMonitor, ConnectivityState, ConnectivityStatus, Health};
pub use operation::{Operation, OperationKey};
pub use registry::FallbackRegistry;
pub use transport::{Envelope, FallbackTransport, RpcClient};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::io::{HttpClient, ReqwestHttpClient};
use crate::notifier::{LogNotifier, Notifier};
use crate::policy::FallbackPolicy;
use crate::probe::{HttpProbe, Probe};

/// Assembles the RPC layer from configuration, with optional injected parts
pub struct LifelineBuilder {
    config: Config,
    http: Option<Arc<dyn HttpClient>>,
    probe: Option<Arc<dyn Probe>>,
    registry: Option<FallbackRegistry>,
    notifier: Option<Arc<dyn Notifier>>,
    cancel: Option<CancellationToken>,
}

impl LifelineBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            http: None,
            probe: None,
            registry: None,
            notifier: None,
            cancel: None,
        }
    }

    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_registry(mut self, registry: FallbackRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> Result<Lifeline> {
        let config = self.config;
        config.validate()?;

        let http: Arc<dyn HttpClient> = match self.http {
            Some(http) => http,
            None => Arc::new(ReqwestHttpClient::with_timeout(Duration::from_secs(
                config.backend.request_timeout_seconds,
            ))?),
        };

        let registry = match (self.registry, &config.fallback.fixtures_path) {
            (Some(registry), _) => registry,
            (None, Some(path)) => FallbackRegistry::from_file(path)?,
            (None, None) => FallbackRegistry::builtin()?,
        };
        let registry = Arc::new(registry);
        tracing::debug!("Fallback registry holds {} fixtures", registry.len());

        let probe: Arc<dyn Probe> = match self.probe {
            Some(probe) => probe,
            None => Arc::new(HttpProbe::new(&config.backend, Arc::clone(&http))),
        };
        let monitor = Arc::new(ConnectivityMonitor::new(probe, &config.connectivity));

        let transport = Arc::new(
            FallbackTransport::new(
                Arc::clone(&http),
                Arc::clone(&registry),
                FallbackPolicy::from(&config.fallback),
            )
            .with_monitor(Arc::clone(&monitor)),
        );
        let rpc = Arc::new(RpcClient::new(config.backend.base_url.clone(), transport));

        let notifier = self.notifier.unwrap_or_else(|| Arc::new(LogNotifier));
        let client = ResilientClient::new(Arc::clone(&monitor), registry, notifier);

        Ok(Lifeline {
            config,
            monitor,
            client,
            rpc,
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

/// The assembled RPC layer and its lifecycle
#[derive(Debug)]
pub struct Lifeline {
    config: Config,
    monitor: Arc<ConnectivityMonitor>,
    client: ResilientClient,
    rpc: Arc<RpcClient>,
    cancel: CancellationToken,
}

impl Lifeline {
    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    pub fn rpc(&self) -> &Arc<RpcClient> {
        &self.rpc
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start probing and serve the status surface until cancelled
    pub async fn start(self) -> Result<()> {
        self.monitor.start();

        let cancel_for_signal = self.cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                    cancel_for_signal.cancel();
                }
                Err(e) => tracing::warn!("Failed to listen for ctrl-c: {}", e),
            }
        });

        if self.config.status.enabled {
            let status_port = self.config.status.port;
            let router = status::build_router(Arc::clone(&self.monitor));
            let cancel_for_status = self.cancel.clone();
            let addr = SocketAddr::from(([0, 0, 0, 0], status_port));

            let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
                LifelineError::Config(format!(
                    "Failed to bind status server to port {}: {}",
                    status_port, e
                ))
            })?;
            tracing::info!("Status surface listening on http://{}", addr);

            tokio::spawn(async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        cancel_for_status.cancelled().await;
                    })
                    .await
                    .ok();
                tracing::debug!("Status surface stopped");
            });
        }

        tracing::info!("Lifeline started against {}", self.config.backend.base_url);

        self.cancel.cancelled().await;

        self.monitor.stop();
        tracing::info!("Lifeline stopped");
        Ok(())
    }
}
