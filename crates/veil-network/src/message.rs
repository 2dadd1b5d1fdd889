//! Network packets and the peer record.
//!
//! Every packet serializes as a leading varint type tag followed by the
//! protocol version, then the packet fields:
//!
//! | Tag  | Packet       |
//! |------|--------------|
//! | 1000 | Handshake    |
//! | 1100 | Keepalive    |
//! | 1200 | PeerExchange |
//! | 2000 | Data         |

use crate::error::NetworkError;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};
use veil_types::{config, read_vec, write_vec, Reader, Serializable, TypesResult, Writer};
use veil_crypto::Hash;

/// Wire tag of the handshake packet.
pub const NETWORK_HANDSHAKE: u64 = 1_000;
/// Wire tag of the keepalive packet.
pub const NETWORK_KEEPALIVE: u64 = 1_100;
/// Wire tag of the peer exchange packet.
pub const NETWORK_PEER_EXCHANGE: u64 = 1_200;
/// Wire tag of the data packet.
pub const NETWORK_DATA: u64 = 2_000;

/// Seconds since the epoch.
pub(crate) fn unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// A known peer. Addresses are normalized to the v4-in-v6 form so every
/// peer serializes to the same fixed-width address bytes regardless of
/// the address family it was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkPeer {
    /// Peer address in v4-in-v6 representation.
    pub address: Ipv6Addr,
    /// The peer's self-generated identifier.
    pub peer_id: Hash,
    /// The peer's P2P port.
    pub port: u16,
    /// The network the peer participates in.
    pub network_id: Hash,
    /// Seconds-since-epoch the peer was last heard from.
    pub last_seen: u64,
}

impl NetworkPeer {
    /// Create a peer record stamped with the current time.
    pub fn new(address: IpAddr, peer_id: Hash, port: u16, network_id: Hash) -> Self {
        NetworkPeer {
            address: normalize_address(address),
            peer_id,
            port,
            network_id,
            last_seen: unix_time(),
        }
    }

    /// The peer's address as a connectable string, preferring the v4
    /// form when the address is v4-mapped.
    pub fn address_string(&self) -> String {
        match self.address.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => self.address.to_string(),
        }
    }
}

impl Serializable for NetworkPeer {
    fn serialize(&self, writer: &mut Writer) {
        writer.bytes(&self.address.octets());
        writer.key(&self.peer_id);
        writer.varint(u64::from(self.port));
        writer.key(&self.network_id);
        writer.varint(self.last_seen);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        let octets: [u8; 16] = reader
            .take(16)?
            .try_into()
            .expect("take returned exactly 16 bytes");
        Ok(NetworkPeer {
            address: Ipv6Addr::from(octets),
            peer_id: reader.key()?,
            port: reader.varint()? as u16,
            network_id: reader.key()?,
            last_seen: reader.varint()?,
        })
    }
}

/// Normalize any address to the v4-in-v6 representation.
pub fn normalize_address(address: IpAddr) -> Ipv6Addr {
    match address {
        IpAddr::V4(v4) => v4.to_ipv6_mapped(),
        IpAddr::V6(v6) => v6,
    }
}

/// Normalize a socket address and derive the connection identity hash
/// used to key outgoing connections.
pub fn normalize_socket_addr(address: &SocketAddr) -> (Ipv6Addr, u16, Hash) {
    let normalized = normalize_address(address.ip());
    let id = veil_crypto::sha3(format!("{}:{}", normalized, address.port()));
    (normalized, address.port(), id)
}

/// The connection handshake: identity, reachability, network, and an
/// initial peer sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakePacket {
    /// Protocol version of the sender.
    pub version: u64,
    /// The sender's peer id.
    pub peer_id: Hash,
    /// The port the sender accepts connections on.
    pub peer_port: u16,
    /// The network the sender participates in.
    pub network_id: Hash,
    /// A sample of peers the sender knows.
    pub peers: Vec<NetworkPeer>,
}

impl HandshakePacket {
    /// Create a handshake for the local node.
    pub fn new(peer_id: Hash, peer_port: u16, network_id: Hash) -> Self {
        HandshakePacket {
            version: config::p2p::VERSION,
            peer_id,
            peer_port,
            network_id,
            peers: Vec::new(),
        }
    }
}

impl Serializable for HandshakePacket {
    fn serialize(&self, writer: &mut Writer) {
        writer.varint(NETWORK_HANDSHAKE);
        writer.varint(self.version);
        writer.key(&self.peer_id);
        writer.varint(u64::from(self.peer_port));
        writer.key(&self.network_id);
        write_vec(writer, &self.peers);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        let _tag = reader.varint()?;
        Ok(HandshakePacket {
            version: reader.varint()?,
            peer_id: reader.key()?,
            peer_port: reader.varint()? as u16,
            network_id: reader.key()?,
            peers: read_vec(reader)?,
        })
    }
}

/// The liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlivePacket {
    /// Protocol version of the sender.
    pub version: u64,
    /// The sender's peer id.
    pub peer_id: Hash,
}

impl KeepAlivePacket {
    /// Create a keepalive for the local node.
    pub fn new(peer_id: Hash) -> Self {
        KeepAlivePacket {
            version: config::p2p::VERSION,
            peer_id,
        }
    }
}

impl Serializable for KeepAlivePacket {
    fn serialize(&self, writer: &mut Writer) {
        writer.varint(NETWORK_KEEPALIVE);
        writer.varint(self.version);
        writer.key(&self.peer_id);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        let _tag = reader.varint()?;
        Ok(KeepAlivePacket {
            version: reader.varint()?,
            peer_id: reader.key()?,
        })
    }
}

/// The periodic peer sample exchange. Same layout as the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerExchangePacket {
    /// Protocol version of the sender.
    pub version: u64,
    /// The sender's peer id.
    pub peer_id: Hash,
    /// The port the sender accepts connections on.
    pub peer_port: u16,
    /// The network the sender participates in.
    pub network_id: Hash,
    /// A sample of peers the sender knows.
    pub peers: Vec<NetworkPeer>,
}

impl PeerExchangePacket {
    /// Create a peer exchange for the local node.
    pub fn new(peer_id: Hash, peer_port: u16, network_id: Hash) -> Self {
        PeerExchangePacket {
            version: config::p2p::VERSION,
            peer_id,
            peer_port,
            network_id,
            peers: Vec::new(),
        }
    }
}

impl Serializable for PeerExchangePacket {
    fn serialize(&self, writer: &mut Writer) {
        writer.varint(NETWORK_PEER_EXCHANGE);
        writer.varint(self.version);
        writer.key(&self.peer_id);
        writer.varint(u64::from(self.peer_port));
        writer.key(&self.network_id);
        write_vec(writer, &self.peers);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        let _tag = reader.varint()?;
        Ok(PeerExchangePacket {
            version: reader.varint()?,
            peer_id: reader.key()?,
            peer_port: reader.varint()? as u16,
            network_id: reader.key()?,
            peers: read_vec(reader)?,
        })
    }
}

/// An opaque data payload carrying domain packets (blocks,
/// transactions, queries) for the network named by `network_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    /// Protocol version of the sender.
    pub version: u64,
    /// The network the payload belongs to.
    pub network_id: Hash,
    /// The opaque payload.
    pub payload: Vec<u8>,
}

impl DataPacket {
    /// Create a data packet for the given network.
    pub fn new(network_id: Hash, payload: Vec<u8>) -> Self {
        DataPacket {
            version: config::p2p::VERSION,
            network_id,
            payload,
        }
    }
}

impl Serializable for DataPacket {
    fn serialize(&self, writer: &mut Writer) {
        writer.varint(NETWORK_DATA);
        writer.varint(self.version);
        writer.key(&self.network_id);
        writer.byte_block(&self.payload);
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        let _tag = reader.varint()?;
        Ok(DataPacket {
            version: reader.varint()?,
            network_id: reader.key()?,
            payload: reader.byte_block()?,
        })
    }
}

/// Any network packet, dispatched on the leading type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Handshake(HandshakePacket),
    KeepAlive(KeepAlivePacket),
    PeerExchange(PeerExchangePacket),
    Data(DataPacket),
}

impl Packet {
    /// The wire tag of the variant.
    pub fn tag(&self) -> u64 {
        match self {
            Packet::Handshake(_) => NETWORK_HANDSHAKE,
            Packet::KeepAlive(_) => NETWORK_KEEPALIVE,
            Packet::PeerExchange(_) => NETWORK_PEER_EXCHANGE,
            Packet::Data(_) => NETWORK_DATA,
        }
    }

    /// The protocol version the packet carries.
    pub fn version(&self) -> u64 {
        match self {
            Packet::Handshake(packet) => packet.version,
            Packet::KeepAlive(packet) => packet.version,
            Packet::PeerExchange(packet) => packet.version,
            Packet::Data(packet) => packet.version,
        }
    }

    /// Parse a packet from payload bytes, dispatching on the peeked
    /// type tag.
    pub fn parse(payload: &[u8]) -> Result<Packet, NetworkError> {
        let reader = Reader::new(payload);

        match reader.peek_varint()? {
            NETWORK_HANDSHAKE => Ok(Packet::Handshake(HandshakePacket::from_bytes(payload)?)),
            NETWORK_KEEPALIVE => Ok(Packet::KeepAlive(KeepAlivePacket::from_bytes(payload)?)),
            NETWORK_PEER_EXCHANGE => Ok(Packet::PeerExchange(PeerExchangePacket::from_bytes(
                payload,
            )?)),
            NETWORK_DATA => Ok(Packet::Data(DataPacket::from_bytes(payload)?)),
            other => Err(NetworkError::UnknownPacketType(other)),
        }
    }
}

impl Serializable for Packet {
    fn serialize(&self, writer: &mut Writer) {
        match self {
            Packet::Handshake(packet) => packet.serialize(writer),
            Packet::KeepAlive(packet) => packet.serialize(writer),
            Packet::PeerExchange(packet) => packet.serialize(writer),
            Packet::Data(packet) => packet.serialize(writer),
        }
    }

    fn deserialize(reader: &mut Reader<'_>) -> TypesResult<Self> {
        match reader.peek_varint()? {
            NETWORK_HANDSHAKE => Ok(Packet::Handshake(HandshakePacket::deserialize(reader)?)),
            NETWORK_KEEPALIVE => Ok(Packet::KeepAlive(KeepAlivePacket::deserialize(reader)?)),
            NETWORK_PEER_EXCHANGE => {
                Ok(Packet::PeerExchange(PeerExchangePacket::deserialize(reader)?))
            }
            NETWORK_DATA => Ok(Packet::Data(DataPacket::deserialize(reader)?)),
            other => Err(veil_types::TypesError::UnknownTag(other)),
        }
    }
}
