//! # veil-storage
//!
//! LMDB-backed typed storage for the Veil blockchain.
//!
//! This crate provides:
//! - A store façade over the embedded environment: named databases,
//!   read/write transactions, set-range lookups, and transparent
//!   grow-and-retry handling when the memory map fills up
//! - The blockchain storage engine: typed CRUD for blocks,
//!   transactions, outputs, and key images, random ring-member
//!   sampling, and rewind
//!
//! Both the store environment and the blockchain engine are keyed
//! singletons: opening the same path twice yields aliasing handles.
//!
//! ## Named databases
//!
//! - `blocks`: block hash → serialized block
//! - `block_indexes`: big-endian block index → block hash
//! - `block_timestamps`: big-endian timestamp → block hash
//! - `transactions`: tx hash → tx serialization ∥ containing block hash
//! - `key_images`: key image → (empty), the double-spend set
//! - `transaction_outputs`: output hash → unlock block ∥ output

mod blockchain;
mod error;
mod store;

pub use blockchain::BlockchainStorage;
pub use error::{StorageError, StorageResult};
pub use store::Store;
