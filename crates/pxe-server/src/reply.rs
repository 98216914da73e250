//! DHCP reply construction.

use crate::address::InterfaceAddr;
use crate::config::MAX_BOOT_FILENAME_LEN;
use dhcproto::v4::{DhcpOption, Message, MessageType, Opcode, OptionCode};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Port relay agents listen on.
pub const DHCP_SERVER_PORT: u16 = 67;
/// Port clients listen on.
pub const DHCP_CLIENT_PORT: u16 = 68;

/// Message type answered for a request type, or `None` when the request
/// type is not handled (RELEASE, INFORM, DECLINE, ...).
pub fn reply_type(request_type: MessageType) -> Option<MessageType> {
    match request_type {
        MessageType::Discover => Some(MessageType::Offer),
        MessageType::Request => Some(MessageType::Ack),
        _ => None,
    }
}

/// Message type carried in option 53, if any.
pub fn message_type(request: &Message) -> Option<MessageType> {
    match request.opts().get(OptionCode::MessageType) {
        Some(DhcpOption::MessageType(t)) => Some(*t),
        _ => None,
    }
}

/// Builds the OFFER/ACK for `request`, advertising `iface` as the boot
/// server and `filename` as the boot file.
pub fn build_reply(
    request: &Message,
    reply_type: MessageType,
    iface: InterfaceAddr,
    filename: &str,
    offer: Option<Ipv4Addr>,
) -> Message {
    let mut reply = Message::default();

    reply.set_opcode(Opcode::BootReply);
    reply.set_xid(request.xid());
    reply.set_flags(request.flags());
    reply.set_chaddr(request.chaddr());
    reply.set_ciaddr(request.ciaddr());
    reply.set_giaddr(request.giaddr());
    reply.set_yiaddr(offer.unwrap_or(Ipv4Addr::UNSPECIFIED));
    reply.set_siaddr(iface.ip);

    // Some ROMs only read the legacy header field, others only option 67
    if filename.len() <= MAX_BOOT_FILENAME_LEN {
        reply.set_fname_str(filename);
    }

    let opts = reply.opts_mut();
    opts.insert(DhcpOption::MessageType(reply_type));
    opts.insert(DhcpOption::SubnetMask(iface.mask));
    opts.insert(DhcpOption::ServerIdentifier(iface.ip));
    opts.insert(DhcpOption::BootfileName(filename.as_bytes().to_vec()));

    reply
}

/// Where the reply for `request` is sent: the relay agent when one
/// forwarded it, the client's own address when it already has one,
/// broadcast otherwise.
pub fn reply_destination(request: &Message) -> SocketAddr {
    let giaddr = request.giaddr();
    if !giaddr.is_unspecified() {
        return SocketAddrV4::new(giaddr, DHCP_SERVER_PORT).into();
    }
    let ciaddr = request.ciaddr();
    if !ciaddr.is_unspecified() {
        return SocketAddrV4::new(ciaddr, DHCP_CLIENT_PORT).into();
    }
    SocketAddrV4::new(Ipv4Addr::BROADCAST, DHCP_CLIENT_PORT).into()
}
