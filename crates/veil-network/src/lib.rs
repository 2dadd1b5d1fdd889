//! # veil-network
//!
//! The authenticated, encrypted P2P overlay for the Veil blockchain:
//! - Typed packets (handshake, keepalive, peer exchange, data) over a
//!   canonical envelope format
//! - A router (server) socket and one dealer (client) socket per
//!   outgoing peer, both speaking length-prefixed AES-256-GCM frames
//!   keyed by an ephemeral-static exchange against the configured
//!   server key
//! - A persistent peer database with pruning and shuffled sampling
//! - The node: handshake state machine, connection manager, keepalive,
//!   and peer exchange timers

mod envelope;
mod error;
mod message;
mod node;
mod peer_database;
mod transport;

pub use envelope::Envelope;
pub use error::{NetworkError, NetworkResult};
pub use message::{
    DataPacket, HandshakePacket, KeepAlivePacket, NetworkPeer, Packet, PeerExchangePacket,
};
pub use node::{DataMessage, Node};
pub use peer_database::PeerDatabase;
pub use transport::{derive_server_keypair, Client, Server};
