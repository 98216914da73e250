//! Client classification from DHCP options.
//!
//! PXE firmware identifies itself in the Vendor Class Identifier (option
//! 60) as `PXEClient:Arch:xxxxx:...` or `HTTPClient:Arch:xxxxx:...`, where
//! the architecture number comes from RFC 4578. A chainloaded iPXE also
//! sets the User Class (option 77) to `iPXE`.

use crate::error::ClassificationError;
use dhcproto::v4::{DhcpOption, DhcpOptions, OptionCode};
use std::fmt;

/// Vendor Class Identifier option code.
pub const OPT_VENDOR_CLASS: u8 = 60;

/// Client architecture and firmware family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientArchitecture {
    /// Legacy BIOS PXE ROM (arch 0)
    BiosPxe,
    /// EFI IA32 PXE (arch 6)
    X86Pxe,
    /// EFI x86-64 PXE (arch 7)
    X64Pxe,
    /// EFI IA32 HTTP boot (arch 15)
    X86Http,
    /// EFI x86-64 HTTP boot (arch 16)
    X64Http,
}

/// Vendor class prefixes, checked in order.
const VENDOR_CLASS_PREFIXES: [(&str, ClientArchitecture); 5] = [
    ("PXEClient:Arch:00000:", ClientArchitecture::BiosPxe),
    ("PXEClient:Arch:00006:", ClientArchitecture::X86Pxe),
    ("PXEClient:Arch:00007:", ClientArchitecture::X64Pxe),
    ("HTTPClient:Arch:00015:", ClientArchitecture::X86Http),
    ("HTTPClient:Arch:00016:", ClientArchitecture::X64Http),
];

impl ClientArchitecture {
    /// Maps a vendor class string to its architecture.
    pub fn from_vendor_class(vendor_class: &str) -> Option<Self> {
        VENDOR_CLASS_PREFIXES
            .iter()
            .find(|(prefix, _)| vendor_class.starts_with(prefix))
            .map(|(_, arch)| *arch)
    }
}

impl fmt::Display for ClientArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientArchitecture::BiosPxe => "PXEClient (BIOS)",
            ClientArchitecture::X86Pxe => "PXEClient (x86)",
            ClientArchitecture::X64Pxe => "PXEClient (x64)",
            ClientArchitecture::X86Http => "HTTPClient (x86)",
            ClientArchitecture::X64Http => "HTTPClient (x64)",
        };
        f.write_str(name)
    }
}

/// What a single request says about the booting client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientClassification {
    pub architecture: ClientArchitecture,
    pub uses_ipxe_firmware: bool,
}

/// Classifies a request from its options alone.
pub fn classify(opts: &DhcpOptions) -> Result<ClientClassification, ClassificationError> {
    let vendor_class = match opts.get(OptionCode::ClassIdentifier) {
        Some(DhcpOption::ClassIdentifier(raw)) => raw,
        Some(_) => {
            return Err(ClassificationError::DecodeFailure {
                option: OPT_VENDOR_CLASS,
                reason: "unexpected option payload".to_string(),
                raw: Vec::new(),
            });
        }
        None => return Err(ClassificationError::VendorClassAbsent),
    };

    let vendor_class =
        std::str::from_utf8(vendor_class).map_err(|e| ClassificationError::DecodeFailure {
            option: OPT_VENDOR_CLASS,
            reason: e.to_string(),
            raw: vendor_class.clone(),
        })?;

    let architecture = ClientArchitecture::from_vendor_class(vendor_class).ok_or_else(|| {
        ClassificationError::UnknownVendorClass {
            raw: vendor_class.to_string(),
        }
    })?;

    Ok(ClientClassification {
        architecture,
        uses_ipxe_firmware: is_ipxe(opts),
    })
}

/// True when the User Class is exactly `iPXE`. Anything else, including a
/// missing or undecodable option, counts as plain PXE firmware.
fn is_ipxe(opts: &DhcpOptions) -> bool {
    match opts.get(OptionCode::UserClass) {
        Some(DhcpOption::UserClass(raw)) => std::str::from_utf8(raw) == Ok("iPXE"),
        _ => false,
    }
}
