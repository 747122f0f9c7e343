//! Liveness probing
//!
//! A cheap reachability check runs before any protocol traffic is sent to an
//! address. The reference probe is a raw-socket ICMP echo, which needs
//! elevated privilege; when the socket cannot be created the scanner falls
//! back to a TCP connect probe against the device web ports. The probe is a
//! cost-control policy only: a host may drop probes and still speak the
//! protocol, in which case the operator disables probing with timeout 0.

use crate::error::ScanError;
use async_trait::async_trait;
use pnet::packet::icmp::{IcmpCode, IcmpPacket, IcmpTypes, MutableIcmpPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::{MutablePacket, Packet};
use rand::Rng;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Ports the TCP fallback probe knocks on, in order
const PROBE_PORTS: [u16; 2] = [443, 80];

/// Reachability probe with a bounded timeout
#[async_trait]
pub trait Probe: Send + Sync {
    /// Round-trip time when the host answered within `wait`, `None` otherwise
    async fn probe(&self, target: Ipv4Addr, wait: Duration) -> Option<Duration>;
}

/// Raw-socket ICMP echo probe
pub struct IcmpProbe {
    socket: Socket,
    identifier: u16,
}

impl IcmpProbe {
    pub fn new() -> crate::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                ScanError::PermissionError("raw ICMP socket requires elevated privilege".to_string())
            } else {
                ScanError::NetworkError(e.to_string())
            }
        })?;
        socket
            .set_nonblocking(true)
            .map_err(|e| ScanError::NetworkError(e.to_string()))?;

        Ok(Self {
            socket,
            identifier: rand::thread_rng().gen::<u16>(),
        })
    }

    fn send_echo(&self, target: Ipv4Addr) -> std::io::Result<u16> {
        let mut buffer = [0u8; 64];
        let mut packet = MutableIcmpPacket::new(&mut buffer).expect("buffer fits ICMP header");

        packet.set_icmp_type(IcmpTypes::EchoRequest);
        packet.set_icmp_code(IcmpCode(0));
        packet.set_checksum(0);

        let sequence = rand::thread_rng().gen::<u16>();
        let payload = packet.payload_mut();
        payload[0..2].copy_from_slice(&self.identifier.to_be_bytes());
        payload[2..4].copy_from_slice(&sequence.to_be_bytes());

        let checksum = icmp_checksum(&packet.to_immutable());
        packet.set_checksum(checksum);

        let dest = socket2::SockAddr::from(SocketAddr::new(IpAddr::V4(target), 0));
        self.socket.send_to(&buffer, &dest)?;
        Ok(sequence)
    }

    async fn wait_for_reply(&self, target: Ipv4Addr, sequence: u16) -> std::io::Result<Duration> {
        let start = Instant::now();
        let mut buffer = vec![std::mem::MaybeUninit::new(0u8); 1024];

        loop {
            match self.socket.recv_from(&mut buffer) {
                Ok((received, _)) => {
                    // IP header (20) + ICMP header (8)
                    if received >= 28 {
                        let bytes: Vec<u8> = buffer[..received]
                            .iter()
                            .map(|b| unsafe { b.assume_init() })
                            .collect();
                        if is_matching_reply(&bytes, target, self.identifier, sequence) {
                            return Ok(start.elapsed());
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl Probe for IcmpProbe {
    async fn probe(&self, target: Ipv4Addr, wait: Duration) -> Option<Duration> {
        let sequence = match self.send_echo(target) {
            Ok(sequence) => sequence,
            Err(e) => {
                log::debug!("IcmpProbe::send_echo to {} failed: {}", target, e);
                return None;
            }
        };
        match timeout(wait, self.wait_for_reply(target, sequence)).await {
            Ok(Ok(rtt)) => Some(rtt),
            Ok(Err(_)) | Err(_) => None,
        }
    }
}

/// Accept only the reply to our own echo: source must be the probed target
/// and the identifier/sequence must match what `send_echo` put on the wire.
/// The raw socket sees every ICMP packet delivered to the host, including
/// late replies from previously probed addresses.
fn is_matching_reply(bytes: &[u8], target: Ipv4Addr, identifier: u16, sequence: u16) -> bool {
    let Some(ip_packet) = Ipv4Packet::new(bytes) else {
        return false;
    };
    if ip_packet.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return false;
    }
    if ip_packet.get_source() != target {
        return false;
    }
    let offset = (ip_packet.get_header_length() as usize) * 4;
    if bytes.len() < offset + 8 {
        return false;
    }
    let Some(icmp) = IcmpPacket::new(&bytes[offset..]) else {
        return false;
    };
    if icmp.get_icmp_type() != IcmpTypes::EchoReply {
        return false;
    }
    let payload = icmp.payload();
    payload.len() >= 4
        && u16::from_be_bytes([payload[0], payload[1]]) == identifier
        && u16::from_be_bytes([payload[2], payload[3]]) == sequence
}

fn icmp_checksum(packet: &IcmpPacket) -> u16 {
    let mut sum = 0u32;
    for chunk in packet.packet().chunks(2) {
        if chunk.len() == 2 {
            sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
        } else {
            sum += (chunk[0] as u32) << 8;
        }
    }
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !sum as u16
}

/// TCP connect probe against the device web ports
///
/// A refused connection still proves the host is up; only a timeout or an
/// unreachable error counts as silence.
#[derive(Debug, Clone, Default)]
pub struct TcpProbe;

#[async_trait]
impl Probe for TcpProbe {
    async fn probe(&self, target: Ipv4Addr, wait: Duration) -> Option<Duration> {
        for port in PROBE_PORTS {
            let start = Instant::now();
            let addr = SocketAddr::new(IpAddr::V4(target), port);
            match timeout(wait, tokio::net::TcpStream::connect(addr)).await {
                Ok(Ok(_)) => return Some(start.elapsed()),
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                    return Some(start.elapsed());
                }
                Ok(Err(_)) | Err(_) => continue,
            }
        }
        None
    }
}

/// Probe selected at startup: ICMP when the raw socket is available,
/// TCP connect otherwise
pub enum SystemProbe {
    Icmp(IcmpProbe),
    Tcp(TcpProbe),
}

impl SystemProbe {
    /// Try the raw-socket probe first, fall back to TCP connect
    pub fn detect() -> Self {
        match IcmpProbe::new() {
            Ok(probe) => SystemProbe::Icmp(probe),
            Err(e) => {
                log::warn!("ICMP probe unavailable ({}), falling back to TCP connect probe", e);
                SystemProbe::Tcp(TcpProbe)
            }
        }
    }

    /// TCP connect probe without attempting the raw socket
    pub fn tcp() -> Self {
        SystemProbe::Tcp(TcpProbe)
    }
}

#[async_trait]
impl Probe for SystemProbe {
    async fn probe(&self, target: Ipv4Addr, wait: Duration) -> Option<Duration> {
        match self {
            SystemProbe::Icmp(probe) => probe.probe(target, wait).await,
            SystemProbe::Tcp(probe) => probe.probe(target, wait).await,
        }
    }
}
