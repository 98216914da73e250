//! PXE Boot Server
//!
//! Network-boot orchestrator for legacy BIOS machines, built on `dhcproto`,
//! `async-tftp`, `tokio` and `axum`.
//!
//! This server provides:
//! - A DHCP responder that answers PXE firmware with the boot server address
//!   and a boot file chosen from the client's vendor and user class
//! - A read-only TFTP server whose paths map onto a virtual file table
//!   (generated pxelinux menu, kernel images, bootloaders, iPXE ROM)
//! - An HTTP server for the iPXE boot script and images
//!
//! # Boot flow
//!
//! 1. The BIOS PXE ROM broadcasts a DISCOVER with vendor class
//!    `PXEClient:Arch:00000:...` and receives a TFTP bootloader path.
//! 2. The bootloader (iPXE) sends a new DISCOVER with user class `iPXE` and
//!    receives `http://<server>/<script>`.
//! 3. iPXE fetches the script and everything after it over HTTP.
//!
//! Other firmware classes are recognised but not answered.

pub mod address;
pub mod classify;
pub mod config;
pub mod decision;
pub mod dhcp;
pub mod error;
pub mod http;
pub mod reply;
pub mod router;
pub mod server;
pub mod shutdown;
pub mod tftp;

pub use config::ServerConfig;
pub use error::*;
pub use server::*;
