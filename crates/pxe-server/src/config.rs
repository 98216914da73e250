//! Server configuration.
//!
//! Loaded once at startup (defaults, optionally a YAML file, then CLI
//! overrides applied by the binary) and shared read-only afterwards.

use crate::error::PxeError;
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// Longest boot filename that fits the legacy BOOTP `file` field (128 bytes
/// including the terminating NUL).
pub const MAX_BOOT_FILENAME_LEN: usize = 127;

/// Complete configuration of the boot server.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub dhcp: DhcpConfig,
    pub tftp: TftpConfig,
    pub http: HttpConfig,
}

/// DHCP listener and boot file selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DhcpConfig {
    pub listen: SocketAddr,

    /// Interface the DHCP socket is bound to and whose address is
    /// advertised. `None` picks the first non-loopback IPv4 interface.
    pub interface: Option<String>,

    /// Bootloader handed to plain BIOS PXE ROMs over TFTP.
    pub pxe_boot_file: String,

    /// Script path (relative to the HTTP root) handed to chainloaded iPXE.
    pub ipxe_boot_file: String,

    /// Client address placed in `yiaddr`. This is a single static address,
    /// not a lease pool; leave unset when another DHCP server assigns
    /// addresses.
    pub offer_address: Option<Ipv4Addr>,
}

impl Default for DhcpConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 67)),
            interface: None,
            pxe_boot_file: "pxelinux/pxelinux.0".to_string(),
            ipxe_boot_file: "boot.ipxe".to_string(),
            offer_address: None,
        }
    }
}

/// TFTP listener and the virtual path table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TftpConfig {
    pub listen: SocketAddr,
    pub routes: RouteConfig,
    pub menu: PxeMenu,
}

impl Default for TftpConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 69)),
            routes: RouteConfig::default(),
            menu: PxeMenu::default(),
        }
    }
}

/// Virtual paths and the directories they map onto.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouteConfig {
    /// Exact path answered with the generated pxelinux menu.
    pub pxe_config_path: String,
    /// Request prefix for kernel and initrd images.
    pub kernel_prefix: String,
    /// Request prefix for pxelinux bootloader images.
    pub pxe_prefix: String,
    /// Exact path answered with the iPXE ROM.
    pub ipxe_rom_name: String,

    pub kernel_path_prefix: PathBuf,
    pub pxe_path_prefix: PathBuf,
    /// Local iPXE ROM (undionly.kpxe). The ROM route is disabled when unset.
    pub ipxe_rom_path: Option<PathBuf>,
    /// Flat tree used when no other route matches.
    pub root_dir: Option<PathBuf>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            pxe_config_path: "pxelinux/pxelinux.cfg/default".to_string(),
            kernel_prefix: "pxelinux/boot/".to_string(),
            pxe_prefix: "pxelinux/".to_string(),
            ipxe_rom_name: "undionly.kpxe".to_string(),
            kernel_path_prefix: PathBuf::from("/boot"),
            pxe_path_prefix: PathBuf::from("/usr/lib/syslinux/bios"),
            ipxe_rom_path: None,
            root_dir: Some(PathBuf::from("./tftpboot")),
        }
    }
}

/// Entry written into the generated pxelinux menu. Paths are relative to
/// the pxelinux directory, so they land on the kernel route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PxeMenu {
    pub kernel: String,
    pub initrd: String,
    pub cmdline: String,
}

impl Default for PxeMenu {
    fn default() -> Self {
        Self {
            kernel: "boot/vmlinuz".to_string(),
            initrd: "boot/initrd.img".to_string(),
            cmdline: "console=ttyS0".to_string(),
        }
    }
}

/// Static HTTP file service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpConfig {
    pub enabled: bool,
    pub listen: SocketAddr,
    pub root_dir: PathBuf,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 80)),
            root_dir: PathBuf::from("./httpboot"),
        }
    }
}

impl ServerConfig {
    /// Parses a YAML document. Missing keys keep their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, PxeError> {
        serde_yaml::from_str(yaml).map_err(|e| PxeError::Configuration(e.to_string()))
    }

    /// Reads and parses a YAML configuration file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, PxeError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PxeError::Configuration(format!("unable to read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&raw)
    }

    /// Pins DHCP to a named interface and advertises its address.
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.dhcp.interface = Some(interface.into());
        self
    }

    /// Sets the TFTP bootloader path handed to BIOS PXE ROMs.
    pub fn with_pxe_boot_file(mut self, file: impl Into<String>) -> Self {
        self.dhcp.pxe_boot_file = file.into();
        self
    }

    /// Sets the script iPXE fetches over HTTP.
    pub fn with_ipxe_boot_file(mut self, file: impl Into<String>) -> Self {
        self.dhcp.ipxe_boot_file = file.into();
        self
    }

    /// Sets the single client address placed in `yiaddr`.
    pub fn with_offer_address(mut self, addr: Ipv4Addr) -> Self {
        self.dhcp.offer_address = Some(addr);
        self
    }

    /// Enables or disables the HTTP service.
    pub fn with_http_enabled(mut self, enabled: bool) -> Self {
        self.http.enabled = enabled;
        self
    }

    /// Checks the values the services rely on at request time.
    pub fn validate(&self) -> Result<(), PxeError> {
        let dhcp = &self.dhcp;
        if dhcp.pxe_boot_file.is_empty() {
            return Err(PxeError::Configuration("PXE boot file must not be empty".to_string()));
        }
        if dhcp.pxe_boot_file.len() > MAX_BOOT_FILENAME_LEN {
            return Err(PxeError::Configuration(format!(
                "PXE boot file {:?} exceeds {MAX_BOOT_FILENAME_LEN} bytes",
                dhcp.pxe_boot_file
            )));
        }
        if dhcp.ipxe_boot_file.trim_start_matches('/').is_empty() {
            return Err(PxeError::Configuration("iPXE boot file must not be empty".to_string()));
        }

        let routes = &self.tftp.routes;
        for (name, value) in [
            ("pxeConfigPath", &routes.pxe_config_path),
            ("kernelPrefix", &routes.kernel_prefix),
            ("pxePrefix", &routes.pxe_prefix),
            ("ipxeRomName", &routes.ipxe_rom_name),
        ] {
            if value.is_empty() {
                return Err(PxeError::Configuration(format!("route {name} must not be empty")));
            }
        }

        Ok(())
    }
}
