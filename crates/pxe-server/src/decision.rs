//! Boot decision: which file a classified client fetches, and how.

use crate::classify::{ClientArchitecture, ClientClassification};
use crate::config::DhcpConfig;
use std::net::Ipv4Addr;

/// How the client fetches its next boot stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// `filename` is a path on the TFTP server.
    Tftp,
    /// `filename` is an absolute HTTP URL.
    Http,
}

/// Outcome of the boot policy for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootDecision {
    Boot {
        transport: Transport,
        filename: String,
    },
    /// No boot file is offered for this class; the request is not answered.
    Unsupported(ClientArchitecture),
}

impl BootDecision {
    /// Whether a reply should be sent at all.
    pub fn applies(&self) -> bool {
        matches!(self, BootDecision::Boot { .. })
    }

    /// Boot filename or URL, when the decision applies.
    pub fn filename(&self) -> Option<&str> {
        match self {
            BootDecision::Boot { filename, .. } => Some(filename),
            BootDecision::Unsupported(_) => None,
        }
    }
}

/// Chooses the boot artifact for a classified client.
///
/// Legacy BIOS PXE ROMs get the TFTP bootloader; once that bootloader is
/// iPXE (User Class `iPXE`), the client is pointed at the HTTP boot script
/// on `server_ip`. Every other class is unsupported.
pub fn decide(
    classification: &ClientClassification,
    config: &DhcpConfig,
    server_ip: Ipv4Addr,
) -> BootDecision {
    match classification.architecture {
        ClientArchitecture::BiosPxe if classification.uses_ipxe_firmware => BootDecision::Boot {
            transport: Transport::Http,
            filename: format!(
                "http://{server_ip}/{}",
                config.ipxe_boot_file.trim_start_matches('/')
            ),
        },
        ClientArchitecture::BiosPxe => BootDecision::Boot {
            transport: Transport::Tftp,
            filename: config.pxe_boot_file.clone(),
        },
        other => BootDecision::Unsupported(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification(architecture: ClientArchitecture, ipxe: bool) -> ClientClassification {
        ClientClassification {
            architecture,
            uses_ipxe_firmware: ipxe,
        }
    }

    #[test]
    fn test_bios_pxe_gets_tftp_bootloader() {
        let decision = decide(
            &classification(ClientArchitecture::BiosPxe, false),
            &DhcpConfig::default(),
            Ipv4Addr::new(10, 0, 0, 1),
        );
        assert_eq!(
            decision,
            BootDecision::Boot {
                transport: Transport::Tftp,
                filename: "pxelinux/pxelinux.0".to_string(),
            }
        );
        assert!(decision.applies());
    }

    #[test]
    fn test_ipxe_gets_http_script_url() {
        let decision = decide(
            &classification(ClientArchitecture::BiosPxe, true),
            &DhcpConfig::default(),
            Ipv4Addr::new(10, 0, 0, 1),
        );
        assert_eq!(
            decision,
            BootDecision::Boot {
                transport: Transport::Http,
                filename: "http://10.0.0.1/boot.ipxe".to_string(),
            }
        );
    }

    #[test]
    fn test_configured_files_are_used() {
        let config = DhcpConfig {
            pxe_boot_file: "lpxelinux.0".to_string(),
            ipxe_boot_file: "/scripts/menu.ipxe".to_string(),
            ..DhcpConfig::default()
        };
        let server_ip = Ipv4Addr::new(192, 168, 10, 2);

        let tftp = decide(&classification(ClientArchitecture::BiosPxe, false), &config, server_ip);
        assert_eq!(tftp.filename(), Some("lpxelinux.0"));

        let http = decide(&classification(ClientArchitecture::BiosPxe, true), &config, server_ip);
        assert_eq!(http.filename(), Some("http://192.168.10.2/scripts/menu.ipxe"));
    }

    #[test]
    fn test_other_architectures_do_not_apply() {
        for arch in [
            ClientArchitecture::X86Pxe,
            ClientArchitecture::X64Pxe,
            ClientArchitecture::X86Http,
            ClientArchitecture::X64Http,
        ] {
            for ipxe in [false, true] {
                let decision =
                    decide(&classification(arch, ipxe), &DhcpConfig::default(), Ipv4Addr::LOCALHOST);
                assert_eq!(decision, BootDecision::Unsupported(arch));
                assert!(!decision.applies());
                assert_eq!(decision.filename(), None);
            }
        }
    }
}
