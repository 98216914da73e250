//! PXE server errors
//!
//! `PxeError` covers failures that end a service (bind errors, fatal I/O,
//! invalid configuration). The per-request taxonomies (`ClassificationError`,
//! `AddressError`, `RouteError`) never stop a listener; the services log
//! them and drop or answer the request.

use std::net::SocketAddr;
use thiserror::Error;

/// Failures that end a service or keep the server from starting.
#[derive(Debug, Error)]
pub enum PxeError {
    #[error("{service}: failed to bind to {addr}: {source}")]
    Bind {
        service: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("TFTP error: {0}")]
    Tftp(#[from] async_tftp::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("service task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{} service(s) failed: {}", .0.len(), format_failures(.0))]
    Services(Vec<ServiceFailure>),
}

/// A service that exited with a real (non-shutdown) error.
#[derive(Debug)]
pub struct ServiceFailure {
    pub service: &'static str,
    pub error: PxeError,
}

fn format_failures(failures: &[ServiceFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.service, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Why a DHCP request could not be classified.
///
/// `VendorClassAbsent` is the common case for ordinary DHCP clients sharing
/// the broadcast domain and is dropped quietly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("vendor-class identifier not presented")]
    VendorClassAbsent,

    #[error("unknown vendor class {raw:?}")]
    UnknownVendorClass { raw: String },

    #[error("unable to decode option {option} ({}): {reason}", String::from_utf8_lossy(.raw))]
    DecodeFailure {
        option: u8,
        reason: String,
        raw: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("no usable IPv4 address on {interface}: {detail}")]
    NoAddressFound { interface: String, detail: String },

    /// More than one interface could be the one PXE clients reach.
    #[error("several interfaces could answer PXE clients ({}); set an interface", .candidates.join(", "))]
    Ambiguous { candidates: Vec<String> },
}

/// Failure to map a requested boot path onto content.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The path tried to leave its configured prefix.
    #[error("forbidden path: {0}")]
    Forbidden(String),

    #[error("unable to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
