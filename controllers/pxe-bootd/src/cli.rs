//! Command line flags.
//!
//! Every flag is optional and has an environment fallback. Flags override
//! the YAML file given with `--config`, which in turn overrides the
//! built-in defaults.

use clap::Parser;
use pxe_server::{PxeError, ServerConfig};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pxe-bootd", version, about = "PXE/iPXE network boot server")]
pub struct Cli {
    /// YAML configuration file
    #[arg(long, env = "PXE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Interface to answer DHCP on and advertise the address of
    #[arg(long, short = 'i', env = "PXE_INTERFACE")]
    pub interface: Option<String>,

    #[arg(long, env = "PXE_DHCP_LISTEN")]
    pub dhcp_listen: Option<SocketAddr>,

    #[arg(long, env = "PXE_TFTP_LISTEN")]
    pub tftp_listen: Option<SocketAddr>,

    #[arg(long, env = "PXE_HTTP_LISTEN")]
    pub http_listen: Option<SocketAddr>,

    /// Bootloader handed to BIOS PXE ROMs over TFTP
    #[arg(long, env = "PXE_BOOT_FILE")]
    pub pxe_boot_file: Option<String>,

    /// Script handed to iPXE, relative to the HTTP root
    #[arg(long, env = "PXE_IPXE_BOOT_FILE")]
    pub ipxe_boot_file: Option<String>,

    /// Client address placed in replies (single static address)
    #[arg(long, env = "PXE_OFFER_ADDRESS")]
    pub offer_address: Option<Ipv4Addr>,

    /// Directory holding kernel and initrd images
    #[arg(long, env = "PXE_KERNEL_PATH_PREFIX")]
    pub kernel_path_prefix: Option<PathBuf>,

    /// Directory holding pxelinux bootloader files
    #[arg(long, env = "PXE_PATH_PREFIX")]
    pub pxe_path_prefix: Option<PathBuf>,

    /// iPXE ROM served as undionly.kpxe
    #[arg(long, env = "PXE_IPXE_ROM_PATH")]
    pub ipxe_for_pxe_path: Option<PathBuf>,

    /// Fallback TFTP directory for paths no other route matches
    #[arg(long, env = "PXE_TFTP_ROOT")]
    pub tftp_root: Option<PathBuf>,

    /// Directory served over HTTP
    #[arg(long, env = "PXE_HTTP_DIR")]
    pub http_dir: Option<PathBuf>,

    #[arg(long, env = "PXE_DISABLE_HTTP")]
    pub disable_http: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Cli {
    /// Builds the server configuration from the file (if any) and flags.
    pub fn to_config(&self) -> Result<ServerConfig, PxeError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_yaml_file(path)?,
            None => ServerConfig::default(),
        };

        if let Some(interface) = &self.interface {
            config = config.with_interface(interface.clone());
        }
        if let Some(file) = &self.pxe_boot_file {
            config = config.with_pxe_boot_file(file.clone());
        }
        if let Some(file) = &self.ipxe_boot_file {
            config = config.with_ipxe_boot_file(file.clone());
        }
        if let Some(addr) = self.offer_address {
            config = config.with_offer_address(addr);
        }
        if self.disable_http {
            config = config.with_http_enabled(false);
        }

        if let Some(addr) = self.dhcp_listen {
            config.dhcp.listen = addr;
        }
        if let Some(addr) = self.tftp_listen {
            config.tftp.listen = addr;
        }
        if let Some(addr) = self.http_listen {
            config.http.listen = addr;
        }

        let routes = &mut config.tftp.routes;
        if let Some(dir) = &self.kernel_path_prefix {
            routes.kernel_path_prefix.clone_from(dir);
        }
        if let Some(dir) = &self.pxe_path_prefix {
            routes.pxe_path_prefix.clone_from(dir);
        }
        if let Some(rom) = &self.ipxe_for_pxe_path {
            routes.ipxe_rom_path = Some(rom.clone());
        }
        if let Some(dir) = &self.tftp_root {
            routes.root_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.http_dir {
            config.http.root_dir.clone_from(dir);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("pxe-bootd").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_without_flags() {
        let config = parse(&[]).to_config().unwrap();
        assert_eq!(config.dhcp.pxe_boot_file, "pxelinux/pxelinux.0");
        assert!(config.http.enabled);
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = parse(&[
            "--interface",
            "eth1",
            "--tftp-listen",
            "10.0.0.1:69",
            "--ipxe-for-pxe-path",
            "/srv/ipxe/undionly.kpxe",
            "--kernel-path-prefix",
            "/srv/kernels",
            "--offer-address",
            "10.0.0.50",
            "--disable-http",
        ]);
        let config = cli.to_config().unwrap();

        assert_eq!(config.dhcp.interface.as_deref(), Some("eth1"));
        assert_eq!(config.tftp.listen, "10.0.0.1:69".parse().unwrap());
        assert_eq!(
            config.tftp.routes.ipxe_rom_path,
            Some(PathBuf::from("/srv/ipxe/undionly.kpxe"))
        );
        assert_eq!(config.tftp.routes.kernel_path_prefix, PathBuf::from("/srv/kernels"));
        assert_eq!(config.dhcp.offer_address, Some(Ipv4Addr::new(10, 0, 0, 50)));
        assert!(!config.http.enabled);
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dhcp:\n  pxeBootFile: lpxelinux.0\n  ipxeBootFile: menu.ipxe").unwrap();
        let path = file.path().to_str().unwrap();

        let config = parse(&["--config", path, "--ipxe-boot-file", "boot.ipxe"])
            .to_config()
            .unwrap();
        assert_eq!(config.dhcp.pxe_boot_file, "lpxelinux.0");
        assert_eq!(config.dhcp.ipxe_boot_file, "boot.ipxe");
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        let result = Cli::try_parse_from(["pxe-bootd", "--offer-address", "not-an-ip"]);
        assert!(result.is_err());
    }
}
