//! DHCP boot responder.
//!
//! Answers DISCOVER and REQUEST packets from PXE firmware with an OFFER or
//! ACK naming the boot server and boot file. Packets from ordinary DHCP
//! clients, unsupported firmware and unhandled message types are dropped
//! without a reply, so the responder can share a broadcast domain with the
//! network's real DHCP server.

use crate::address::{self, ArrivalHint, InterfaceAddr};
use crate::classify::{self, ClientClassification};
use crate::config::DhcpConfig;
use crate::decision::{self, BootDecision};
use crate::error::{AddressError, ClassificationError, PxeError};
use crate::reply;
use crate::shutdown::Closing;
use dhcproto::v4::Message;
use dhcproto::{Decodable, Encodable};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

/// Large enough for any DHCP packet that fits an Ethernet frame.
const RECV_BUFFER_SIZE: usize = 1500;

/// DHCP server for PXE boot.
pub struct DhcpServer {
    config: Arc<DhcpConfig>,
    closing: Closing,
}

impl DhcpServer {
    /// Creates a new DHCP server instance. Nothing is bound until `start`.
    pub fn new(config: Arc<DhcpConfig>) -> Self {
        Self {
            config,
            closing: Closing::new(),
        }
    }

    /// Receives and answers requests until `shutdown` is called.
    ///
    /// Returns `Ok(())` after a shutdown, or the error that ended the loop.
    ///
    /// Refuses to start when no interface is configured and several could
    /// be the one PXE clients reach.
    pub async fn start(&self) -> Result<(), PxeError> {
        if let Err(e @ AddressError::Ambiguous { .. }) =
            address::interface_addr(self.config.interface.as_deref(), self.hint(Ipv4Addr::UNSPECIFIED))
        {
            return Err(PxeError::Configuration(e.to_string()));
        }

        let socket = self.bind()?;
        info!(addr = %self.config.listen, "Starting DHCP server");

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        loop {
            let (len, src) = tokio::select! {
                _ = self.closing.closed() => break,
                result = socket.recv_from(&mut buf) => match result {
                    Ok(received) => received,
                    Err(_) if self.closing.is_closing() => break,
                    Err(e) => return Err(PxeError::Io(e)),
                },
            };

            self.process(&socket, &buf[..len], src).await;
        }

        info!("DHCP server stopped");
        Ok(())
    }

    /// Stops the receive loop. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.closing.close() {
            debug!("DHCP server closing");
        }
    }

    fn bind(&self) -> Result<UdpSocket, PxeError> {
        let addr = self.config.listen;
        let bind_err = |source| PxeError::Bind {
            service: "dhcp",
            addr,
            source,
        };

        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
            .map_err(bind_err)?;
        socket.set_reuse_address(true).map_err(bind_err)?;
        socket.set_broadcast(true).map_err(bind_err)?;

        #[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
        if let Some(interface) = &self.config.interface {
            // Needs CAP_NET_RAW; without it replies still go out, just not pinned
            if let Err(e) = socket.bind_device(Some(interface.as_bytes())) {
                warn!(interface = %interface, error = %e, "Unable to bind DHCP socket to interface");
            }
        }

        socket.bind(&addr.into()).map_err(bind_err)?;
        socket.set_nonblocking(true).map_err(bind_err)?;

        let std_socket: std::net::UdpSocket = socket.into();
        UdpSocket::from_std(std_socket).map_err(bind_err)
    }

    async fn process(&self, socket: &UdpSocket, data: &[u8], src: SocketAddr) {
        let Some((response, dest)) = self.respond(data, src) else {
            return;
        };

        match socket.send_to(&response, dest).await {
            Ok(_) => debug!(dest = %dest, bytes = response.len(), "Sent DHCP reply"),
            Err(e) => error!(dest = %dest, error = %e, "Unable to send DHCP packet"),
        }
    }

    /// Turns one received datagram into an encoded reply and the address
    /// to send it to.
    fn respond(&self, data: &[u8], src: SocketAddr) -> Option<(Vec<u8>, SocketAddr)> {
        let request = match Message::from_bytes(data) {
            Ok(request) => request,
            Err(e) => {
                debug!(src = %src, error = %e, "Unable to parse DHCP packet");
                return None;
            }
        };

        let hint = self.hint(request.giaddr());
        let iface = match address::interface_addr(self.config.interface.as_deref(), hint) {
            Ok(iface) => iface,
            Err(e) => {
                error!(error = %e, "Unable to determine the server address");
                return None;
            }
        };

        let response = self.handle(&request, iface)?;
        let dest = reply::reply_destination(&request);
        match response.to_vec() {
            Ok(encoded) => {
                info!(
                    msg_type = ?reply::message_type(&response),
                    mac = %format_mac(response.chaddr()),
                    dest = %dest,
                    "Replying to DHCP request"
                );
                Some((encoded, dest))
            }
            Err(e) => {
                error!(error = %e, "Unable to encode DHCP reply");
                None
            }
        }
    }

    fn hint(&self, relay: Ipv4Addr) -> ArrivalHint {
        let listen = match self.config.listen.ip() {
            IpAddr::V4(ip) => ip,
            IpAddr::V6(_) => Ipv4Addr::UNSPECIFIED,
        };
        ArrivalHint { listen, relay }
    }

    /// Decides the reply for one request, given the address this server
    /// advertises. `None` means the request is dropped.
    pub fn handle(&self, request: &Message, iface: InterfaceAddr) -> Option<Message> {
        let request_type = reply::message_type(request);
        let mac = format_mac(request.chaddr());
        info!(msg_type = ?request_type, mac = %mac, "Received DHCP request");

        let classification = match classify::classify(request.opts()) {
            Ok(classification) => classification,
            Err(ClassificationError::VendorClassAbsent) => {
                warn!(mac = %mac, "Vendor-Class not presented");
                return None;
            }
            Err(ClassificationError::UnknownVendorClass { raw }) => {
                warn!(mac = %mac, vendor_class = %raw, "Unsupported Vendor-Class");
                return None;
            }
            Err(ClassificationError::DecodeFailure { option, reason, raw }) => {
                warn!(
                    mac = %mac,
                    option,
                    raw = %String::from_utf8_lossy(&raw),
                    reason = %reason,
                    "Unable to get Vendor-Class identifier"
                );
                return None;
            }
        };

        let filename = match self.decide(&classification, iface) {
            BootDecision::Boot { filename, .. } => filename,
            BootDecision::Unsupported(arch) => {
                warn!(mac = %mac, arch = %arch, "Unsupported client architecture");
                return None;
            }
        };

        let Some(reply_type) = request_type.and_then(reply::reply_type) else {
            warn!(mac = %mac, msg_type = ?request_type, "Message type not supported");
            return None;
        };

        Some(reply::build_reply(
            request,
            reply_type,
            iface,
            &filename,
            self.config.offer_address,
        ))
    }

    fn decide(&self, classification: &ClientClassification, iface: InterfaceAddr) -> BootDecision {
        let decision = decision::decide(classification, &self.config, iface.ip);
        debug!(arch = %classification.architecture, ipxe = classification.uses_ipxe_firmware, decision = ?decision, "Boot decision");
        decision
    }
}

fn format_mac(chaddr: &[u8]) -> String {
    chaddr
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}
