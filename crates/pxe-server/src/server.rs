//! Main PXE server implementation.
//!
//! Runs the DHCP, TFTP and (optionally) HTTP services as one task group.
//! Shutdown fans out to every service; the first service to fail for a
//! real reason also shuts the others down, and all failures are reported
//! together once every task has finished.

use crate::config::ServerConfig;
use crate::dhcp::DhcpServer;
use crate::error::{PxeError, ServiceFailure};
use crate::http::HttpServer;
use crate::tftp::TftpServer;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};

/// A long-running listener managed by [`PxeServer`].
#[async_trait]
pub trait Service: Send + Sync {
    /// Short name used in logs and failure reports.
    fn name(&self) -> &'static str;

    /// Runs until `shutdown` is called (`Ok`) or the listener fails.
    async fn start(&self) -> Result<(), PxeError>;

    /// Idempotent; may be called before, during or after `start`.
    fn shutdown(&self);
}

#[async_trait]
impl Service for DhcpServer {
    fn name(&self) -> &'static str {
        "dhcp"
    }

    async fn start(&self) -> Result<(), PxeError> {
        DhcpServer::start(self).await
    }

    fn shutdown(&self) {
        DhcpServer::shutdown(self);
    }
}

#[async_trait]
impl Service for TftpServer {
    fn name(&self) -> &'static str {
        "tftp"
    }

    async fn start(&self) -> Result<(), PxeError> {
        TftpServer::start(self).await
    }

    fn shutdown(&self) {
        TftpServer::shutdown(self);
    }
}

#[async_trait]
impl Service for HttpServer {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn start(&self) -> Result<(), PxeError> {
        HttpServer::start(self).await
    }

    fn shutdown(&self) {
        HttpServer::shutdown(self);
    }
}

/// Main PXE boot server.
pub struct PxeServer {
    services: Vec<Arc<dyn Service>>,
}

impl PxeServer {
    /// Validates `config` and builds the enabled services.
    pub fn new(config: ServerConfig) -> Result<Self, PxeError> {
        config.validate()?;

        let mut services: Vec<Arc<dyn Service>> = vec![
            Arc::new(DhcpServer::new(Arc::new(config.dhcp))),
            Arc::new(TftpServer::new(&config.tftp)),
        ];
        if config.http.enabled {
            services.push(Arc::new(HttpServer::new(&config.http)));
        } else {
            info!("HTTP server disabled");
        }

        Ok(Self { services })
    }

    /// Creates a server around services built elsewhere, skipping
    /// configuration validation.
    pub fn with_services(services: Vec<Arc<dyn Service>>) -> Self {
        Self { services }
    }

    /// Names of the managed services, in start order.
    pub fn service_names(&self) -> Vec<&'static str> {
        self.services.iter().map(|s| s.name()).collect()
    }

    /// Starts every service and waits for all of them to stop.
    ///
    /// Returns `Ok` only if every service stopped because of a shutdown.
    pub async fn start(&self) -> Result<(), PxeError> {
        info!(services = ?self.service_names(), "Starting PXE boot server");

        let mut tasks = JoinSet::new();
        for service in &self.services {
            let service = Arc::clone(service);
            tasks.spawn(async move { (service.name(), service.start().await) });
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            // A panicking task loses its name along with its output
            let (service, result) = match joined {
                Ok(finished) => finished,
                Err(e) => ("task", Err(PxeError::Task(e))),
            };

            match result {
                Ok(()) => info!(service, "Service stopped"),
                Err(error) => {
                    error!(service, error = %error, "Service failed");
                    if failures.is_empty() {
                        self.shutdown();
                    }
                    failures.push(ServiceFailure { service, error });
                }
            }
        }

        if failures.is_empty() {
            info!("PXE boot server stopped");
            Ok(())
        } else {
            Err(PxeError::Services(failures))
        }
    }

    /// Asks every service to stop. Idempotent.
    pub fn shutdown(&self) {
        info!("Shutting down PXE boot server");
        for service in &self.services {
            service.shutdown();
        }
    }
}
