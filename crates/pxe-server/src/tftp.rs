//! Read-only TFTP server.
//!
//! The wire protocol (option negotiation, lockstep DATA/ACK, resends) is
//! handled by `async-tftp`. This module supplies the [`Handler`] that maps
//! each read request through the [`VirtualFileRouter`] and refuses writes.

use crate::config::TftpConfig;
use crate::error::{PxeError, RouteError};
use crate::router::{BootFile, VirtualFileRouter};
use crate::shutdown::Closing;
use async_tftp::packet;
use async_tftp::server::{Handler, TftpServerBuilder};
use futures::io::{AsyncRead, Sink};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A bound `async-tftp` listener serving boot files.
pub type BootFileListener = async_tftp::server::TftpServer<BootFileHandler>;

/// TFTP server for PXE bootloaders, kernels and the pxelinux menu.
pub struct TftpServer {
    listen: SocketAddr,
    router: Arc<VirtualFileRouter>,
    closing: Closing,
}

impl TftpServer {
    /// Creates a new TFTP server instance from its listen address, routes
    /// and menu. Nothing is bound until `start` or `bind`.
    pub fn new(config: &TftpConfig) -> Self {
        Self {
            listen: config.listen,
            router: Arc::new(VirtualFileRouter::new(
                config.routes.clone(),
                &config.menu,
            )),
            closing: Closing::new(),
        }
    }

    /// Binds the configured address and serves until `shutdown`.
    pub async fn start(&self) -> Result<(), PxeError> {
        let listener = self.bind(self.listen).await?;
        self.serve(listener).await
    }

    /// Binds a listener on `addr` without serving it yet.
    pub async fn bind(&self, addr: SocketAddr) -> Result<BootFileListener, PxeError> {
        let handler = BootFileHandler {
            router: Arc::clone(&self.router),
        };
        TftpServerBuilder::with_handler(handler)
            .bind(addr)
            .build()
            .await
            .map_err(|e| match e {
                async_tftp::Error::Io(source) => PxeError::Bind {
                    service: "tftp",
                    addr,
                    source,
                },
                other => PxeError::Tftp(other),
            })
    }

    /// Serves an already bound listener until `shutdown`. Transfers still
    /// running at that point are dropped.
    pub async fn serve(&self, listener: BootFileListener) -> Result<(), PxeError> {
        match listener.listen_addr() {
            Ok(addr) => info!(addr = %addr, "Starting TFTP server"),
            Err(_) => info!(addr = %self.listen, "Starting TFTP server"),
        }

        let result = tokio::select! {
            _ = self.closing.closed() => Ok(()),
            served = listener.serve() => served.map_err(PxeError::Tftp),
        };

        info!("TFTP server stopped");
        result
    }

    /// Stops accepting requests. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.closing.close() {
            debug!("TFTP server closing");
        }
    }
}

/// Answers read requests from the router; write requests are refused.
#[derive(Debug, Clone)]
pub struct BootFileHandler {
    router: Arc<VirtualFileRouter>,
}

impl Handler for BootFileHandler {
    type Reader = Box<dyn AsyncRead + Send + Unpin>;
    type Writer = Sink;

    async fn read_req_open(
        &mut self,
        client: &SocketAddr,
        path: &Path,
    ) -> Result<(Self::Reader, Option<u64>), packet::Error> {
        let filename = path.to_string_lossy();
        info!("GET {filename} from {client}");

        match self.router.open(&filename).await {
            Ok(BootFile { reader, size }) => Ok((reader, Some(size))),
            Err(e) => {
                warn!(client = %client, filename = %filename, error = %e, "Unable to serve TFTP request");
                Err(tftp_error(&e))
            }
        }
    }

    async fn write_req_open(
        &mut self,
        client: &SocketAddr,
        path: &Path,
        _size: Option<u64>,
    ) -> Result<Self::Writer, packet::Error> {
        warn!(client = %client, filename = %path.display(), "Refusing TFTP write request");
        Err(packet::Error::PermissionDenied)
    }
}

/// TFTP error packet for a routing failure.
fn tftp_error(err: &RouteError) -> packet::Error {
    match err {
        RouteError::NotFound(_) => packet::Error::FileNotFound,
        RouteError::Forbidden(_) => packet::Error::PermissionDenied,
        RouteError::Io { .. } => packet::Error::Msg(err.to_string()),
    }
}
