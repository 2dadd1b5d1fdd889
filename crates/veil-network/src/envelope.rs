//! The message envelope passed between sockets and the node.
//!
//! On the wire the router socket frames messages as
//! `[peer identity, payload]` and the dealer socket as `[payload]`; the
//! envelope carries the transport metadata alongside the payload inside
//! the process.

use veil_crypto::Hash;

/// A routed message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// Transport identity of the sender, as observed by the receiving
    /// socket.
    pub from: Hash,
    /// Transport identity of the addressee; zero for broadcasts.
    pub to: Hash,
    /// Optional correlation subject.
    pub subject: Hash,
    /// Remote address the message arrived from, as a printable string.
    pub peer_address: String,
    /// The serialized packet.
    pub payload: Vec<u8>,
}

impl Envelope {
    /// An envelope carrying a payload with no addressee.
    pub fn new(payload: Vec<u8>) -> Self {
        Envelope {
            payload,
            ..Default::default()
        }
    }

    /// An envelope addressed to a specific transport identity.
    pub fn to(to: Hash, payload: Vec<u8>) -> Self {
        Envelope {
            to,
            payload,
            ..Default::default()
        }
    }
}
