//! Compile-time network configuration.
//!
//! Everything a node needs to agree on with its peers lives here: ports,
//! the network identifier, consensus amounts, transaction limits, the fee
//! schedule, proof-of-work parameters, and the genesis material.

use once_cell::sync::Lazy;
use veil_crypto::{hash_to_point, Hash, PublicKey, SecretKey};

/// Project name used in user-facing output.
pub const PROJECT_NAME: &str = "Veil";

/// How long worker loops sleep between polling intervals, in
/// milliseconds.
pub const THREAD_POLLING_INTERVAL: u64 = 10;

/// How long outbound connection attempts may take before failing, in
/// milliseconds.
pub const DEFAULT_CONNECTION_TIMEOUT: u64 = 2_000;

/// Public wallet address prefix.
pub const PUBLIC_ADDRESS_PREFIX: u64 = 0x2c_8f5b;

/// A bootstrap seed node entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedNode {
    /// Host address.
    pub host: &'static str,
    /// P2P port.
    pub port: u16,
}

/// P2P network parameters.
pub mod p2p {
    use super::{Hash, SeedNode};

    /// Current P2P protocol version.
    pub const VERSION: u64 = 1;

    /// Minimum P2P protocol version we will talk to.
    pub const MINIMUM_VERSION: u64 = 1;

    /// How often a keepalive packet is broadcast, in milliseconds.
    pub const KEEPALIVE_INTERVAL: u64 = 30_000;

    /// How often a peer exchange packet is broadcast, in milliseconds.
    pub const PEER_EXCHANGE_INTERVAL: u64 = 120_000;

    /// How often the outgoing connection count is topped up, in
    /// milliseconds.
    pub const CONNECTION_MANAGER_INTERVAL: u64 = 30_000;

    /// Maximum number of peers accepted in a handshake or peer exchange
    /// packet; larger packets are a protocol violation.
    pub const MAXIMUM_PEERS_EXCHANGED: usize = 250;

    /// Peers unseen for longer than this many seconds are pruned.
    pub const PEER_PRUNE_TIME: u64 = 86_400;

    /// Default P2P bind port.
    pub const DEFAULT_BIND_PORT: u16 = 12_897;

    /// Bootstrap seed nodes tried when the peer database is empty.
    pub const SEED_NODES: [SeedNode; 3] = [
        SeedNode {
            host: "203.0.113.41",
            port: DEFAULT_BIND_PORT,
        },
        SeedNode {
            host: "203.0.113.87",
            port: DEFAULT_BIND_PORT,
        },
        SeedNode {
            host: "203.0.113.120",
            port: DEFAULT_BIND_PORT,
        },
    ];

    /// The network id we find interesting. Nodes filter peers and drop
    /// data packets that carry any other id.
    pub const NETWORK_ID: Hash = Hash(*b"   The Veil Project Developers  ");

    /// Outgoing connection count the connection manager maintains.
    pub const DEFAULT_CONNECTION_COUNT: usize = SEED_NODES.len() + 8;

    /// Server-side transport secret all clients derive the server public
    /// key from.
    pub const SERVER_SECRET_KEY: &str = "x8LWc!uMe0+qT}4dkZnGB.yf#b[VhK&3sHrgJ$vE";
}

/// Service ports for the surrounding applications.
pub mod api {
    /// Node API bind port.
    pub const DEFAULT_NODE_BIND_PORT: u16 = 12_898;

    /// Wallet API bind port.
    pub const DEFAULT_WALLET_BIND_PORT: u16 = 18_070;

    /// Event notifier bind port.
    pub const DEFAULT_NOTIFIER_BIND_PORT: u16 = 12_899;
}

/// Consensus parameters for the delegated proof-of-stake election.
pub mod consensus {
    use super::{hash_to_point, Lazy, PublicKey};

    /// Amount required to propose a candidate node, in atomic units.
    pub const REQUIRED_CANDIDACY_AMOUNT: u64 = 100_000;

    /// Minimum amount required to stake (vote) for a candidate, in
    /// atomic units.
    pub const MINIMUM_STAKE_AMOUNT: u64 = 100;

    /// Target number of producers and validators elected per round.
    pub const ELECTOR_TARGET_COUNT: usize = 10;

    /// Minimum percentage of a round's validators that must co-sign a
    /// block for it to commit.
    pub const VALIDATOR_THRESHOLD: usize = 60;

    /// Permanent candidates injected into every election so the network
    /// can always produce blocks. At least three are required.
    ///
    /// TODO: replace with the launch candidate keys.
    pub static PERMANENT_CANDIDATES: Lazy<Vec<PublicKey>> = Lazy::new(|| {
        [
            "veil.permanent.candidate.1",
            "veil.permanent.candidate.2",
            "veil.permanent.candidate.3",
        ]
        .iter()
        .map(|tag| PublicKey::from_point(&hash_to_point(tag.as_bytes())))
        .collect()
    });
}

/// Staking record schema versions.
pub mod staking {
    /// Candidate record schema version.
    pub const CANDIDATE_RECORD_VERSION: u64 = 1;

    /// Stake record schema version.
    pub const STAKE_RECORD_VERSION: u64 = 1;
}

/// Transaction construction limits, fees, and proof-of-work parameters.
pub mod transaction {
    /// Number of ring participants required when signing an input.
    /// Must be a power of two.
    pub const RING_SIZE: usize = 512;

    /// Maximum number of inputs permitted in a single transaction.
    pub const MAXIMUM_INPUTS: usize = 8;

    /// Minimum number of outputs required in a single transaction.
    pub const MINIMUM_OUTPUTS: usize = 2;

    /// Maximum number of outputs permitted in a single transaction.
    pub const MAXIMUM_OUTPUTS: usize = 8;

    /// Maximum size of the extra field of a normal transaction.
    pub const MAXIMUM_EXTRA_SIZE: usize = 1_024;

    /// Genesis transaction material.
    pub mod genesis {
        use super::super::{hash_to_point, Lazy, PublicKey, SecretKey};

        /// Genesis block creation timestamp, seconds since the epoch.
        pub const TIMESTAMP: u64 = 1_633_492_800;

        /// Total amount of the genesis transaction in atomic units.
        pub const AMOUNT: u64 = 125_506_560;

        /// Amount of each genesis output. The genesis transaction mints
        /// `RING_SIZE * 2` equal outputs so full mixing is possible from
        /// the first user transaction.
        pub const OUTPUT_AMOUNT: u64 = AMOUNT / (super::RING_SIZE as u64 * 2);

        /// The genesis transaction secret key.
        ///
        /// TODO: replace with the launch key.
        pub static TX_SECRET_KEY: Lazy<SecretKey> = Lazy::new(|| {
            SecretKey::from_hex("069a225e30af016280a14136ae94af095c269243e56d429496ba70c4f3d9440a")
                .expect("static genesis key is valid hex")
        });

        /// Public spend key of the genesis destination wallet.
        pub static DESTINATION_SPEND_KEY: Lazy<PublicKey> = Lazy::new(|| {
            PublicKey::from_point(&hash_to_point(b"veil.genesis.destination.spend"))
        });

        /// Public view key of the genesis destination wallet.
        pub static DESTINATION_VIEW_KEY: Lazy<PublicKey> = Lazy::new(|| {
            PublicKey::from_point(&hash_to_point(b"veil.genesis.destination.view"))
        });

        /// Encoded public wallet address the genesis transaction pays to.
        /// Derived on first use so the encoded form always matches the
        /// configured keys.
        pub static DESTINATION_WALLET: Lazy<String> = Lazy::new(|| {
            veil_crypto::encode_address(
                super::super::PUBLIC_ADDRESS_PREFIX,
                &DESTINATION_SPEND_KEY,
                &DESTINATION_VIEW_KEY,
            )
        });
    }

    /// The network fee schedule.
    pub mod fees {
        /// Minimum network transaction fee required for all transactions.
        pub const MINIMUM_FEE: u64 = 1;

        /// Size of each fee chunk, in bytes.
        pub const CHUNK_SIZE: u64 = 32;

        /// Transactions up to this size pass with the minimum fee.
        pub const BASE_CHUNK_SIZE: u64 = CHUNK_SIZE * 10;

        /// Fee added for each chunk over the base chunk size.
        pub const CHUNK_FEE: u64 = 1;

        /// Minimum count of leading zero bits required on the
        /// transaction proof-of-work hash.
        pub const MINIMUM_POW_ZEROS: u32 = 1;

        /// Maximum count of leading zero bits considered for the
        /// proof-of-work fee discount.
        pub const MAXIMUM_POW_ZEROS: u32 = 16;

        /// Multiplier applied per additional proof-of-work zero when
        /// discounting the fee.
        pub const POW_ZERO_DISCOUNT_MULTIPLIER: f64 = 2.0;
    }

    /// Argon2id parameters for transaction proof-of-work mining.
    pub mod pow {
        /// Iteration count.
        pub const ITERATIONS: u32 = 2_048;

        /// Memory cost in kibibytes.
        pub const MEMORY_KIB: u32 = 1_024;

        /// Lane count.
        pub const THREADS: u32 = 1;
    }
}
