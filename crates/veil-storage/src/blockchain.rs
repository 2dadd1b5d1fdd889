//! The blockchain storage engine.
//!
//! Wraps six named databases and exposes typed CRUD for blocks,
//! transactions, outputs, and the key-image double-spend set, plus the
//! random output sampling that ring selection is built on. All
//! multi-step writes commit atomically inside one store transaction and
//! retry transparently on capacity conditions.

use crate::error::{StorageError, StorageResult};
use crate::store::Store;
use heed::types::Bytes;
use heed::{Database, RwTxn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rand::RngCore;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};
use veil_crypto::{Hash, KeyImage};
use veil_types::{Block, Reader, Serializable, Transaction, TransactionOutput, TypesError, Writer};

/// Bound on sampling attempts per requested output, guarding against a
/// store where too few outputs are actually spendable.
const SAMPLE_ATTEMPT_FACTOR: usize = 4_096;

static INSTANCES: Lazy<Mutex<HashMap<Hash, Weak<BlockchainStorage>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// The typed blockchain storage engine. A keyed singleton per database
/// path.
pub struct BlockchainStorage {
    id: Hash,
    store: Arc<Store>,
    blocks: Database<Bytes, Bytes>,
    block_indexes: Database<Bytes, Bytes>,
    block_timestamps: Database<Bytes, Bytes>,
    transactions: Database<Bytes, Bytes>,
    key_images: Database<Bytes, Bytes>,
    transaction_outputs: Database<Bytes, Bytes>,
}

impl BlockchainStorage {
    /// Open (or alias) the engine for the given database path.
    pub fn instance(path: impl AsRef<Path>) -> StorageResult<Arc<Self>> {
        let id = veil_crypto::sha3(path.as_ref().to_string_lossy().as_bytes());

        let mut instances = INSTANCES.lock();

        if let Some(existing) = instances.get(&id).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let store = Store::instance(path)?;

        debug!(path = %store.path().display(), "Opening blockchain storage");

        let engine = Arc::new(BlockchainStorage {
            id,
            blocks: store.open_database("blocks")?,
            block_indexes: store.open_database("block_indexes")?,
            block_timestamps: store.open_database("block_timestamps")?,
            transactions: store.open_database("transactions")?,
            key_images: store.open_database("key_images")?,
            transaction_outputs: store.open_database("transaction_outputs")?,
            store,
        });

        instances.insert(id, Arc::downgrade(&engine));

        Ok(engine)
    }

    /// Whether a block with the given hash exists.
    pub fn block_exists(&self, block_hash: &Hash) -> StorageResult<bool> {
        let rtxn = self.store.read_txn()?;
        Ok(self.blocks.get(&rtxn, block_hash.as_bytes())?.is_some())
    }

    /// Whether a block at the given index exists.
    pub fn block_index_exists(&self, block_index: u64) -> StorageResult<bool> {
        let rtxn = self.store.read_txn()?;
        Ok(self
            .block_indexes
            .get(&rtxn, &block_index.to_be_bytes())?
            .is_some())
    }

    /// Number of blocks stored.
    pub fn block_count(&self) -> StorageResult<u64> {
        let rtxn = self.store.read_txn()?;
        Ok(self.blocks.len(&rtxn)?)
    }

    /// The hash of the block at the given index.
    pub fn block_hash(&self, block_index: u64) -> StorageResult<Hash> {
        let rtxn = self.store.read_txn()?;
        let value = self
            .block_indexes
            .get(&rtxn, &block_index.to_be_bytes())?
            .ok_or(StorageError::BlockNotFound)?;
        Ok(Hash::from_bytes(value).map_err(StorageError::Types)?)
    }

    /// The index of the block with the given hash.
    pub fn block_index(&self, block_hash: &Hash) -> StorageResult<u64> {
        Ok(self.get_block(block_hash)?.0.block_index)
    }

    /// The index of the highest stored block.
    pub fn top_block_index(&self) -> StorageResult<u64> {
        let rtxn = self.store.read_txn()?;
        let (key, _) = self
            .block_indexes
            .last(&rtxn)?
            .ok_or(StorageError::Empty)?;
        let bytes: [u8; 8] = key
            .try_into()
            .map_err(|_| StorageError::Types(TypesError::UnexpectedEof(0)))?;
        Ok(u64::from_be_bytes(bytes))
    }

    /// Fetch a block and all transactions it references, fully resolved.
    pub fn get_block(&self, block_hash: &Hash) -> StorageResult<(Block, Vec<Transaction>)> {
        let block = {
            let rtxn = self.store.read_txn()?;
            let value = self
                .blocks
                .get(&rtxn, block_hash.as_bytes())?
                .ok_or(StorageError::BlockNotFound)?;
            Block::from_bytes(value)?
        };

        let mut transactions = Vec::with_capacity(block.transactions.len());
        for txn_hash in &block.transactions {
            let (transaction, _) = self
                .get_transaction(txn_hash)
                .map_err(|_| StorageError::TransactionNotFound)?;
            transactions.push(transaction);
        }

        Ok((block, transactions))
    }

    /// Fetch a block by index.
    pub fn get_block_by_index(&self, block_index: u64) -> StorageResult<(Block, Vec<Transaction>)> {
        let block_hash = self.block_hash(block_index)?;
        self.get_block(&block_hash)
    }

    /// The next block whose timestamp is greater than or equal to the
    /// given timestamp. Returns the matched timestamp and block hash.
    pub fn get_block_by_timestamp(&self, timestamp: u64) -> StorageResult<(u64, Hash)> {
        let rtxn = self.store.read_txn()?;

        let (key, value) = self
            .block_timestamps
            .get_greater_than_or_equal_to(&rtxn, &timestamp.to_be_bytes())?
            .ok_or(StorageError::BlockNotFound)?;

        let bytes: [u8; 8] = key
            .try_into()
            .map_err(|_| StorageError::Types(TypesError::UnexpectedEof(0)))?;

        Ok((
            u64::from_be_bytes(bytes),
            Hash::from_bytes(value).map_err(StorageError::Types)?,
        ))
    }

    /// Whether a transaction with the given hash exists.
    pub fn transaction_exists(&self, txn_hash: &Hash) -> StorageResult<bool> {
        let rtxn = self.store.read_txn()?;
        Ok(self.transactions.get(&rtxn, txn_hash.as_bytes())?.is_some())
    }

    /// Fetch a transaction and the hash of the block containing it.
    ///
    /// The stored value is the transaction serialization with the
    /// containing block hash appended as a 32-byte suffix. The leading
    /// type tag is peeked (not consumed) to dispatch to the right
    /// variant; unknown tags surface as corruption.
    pub fn get_transaction(&self, txn_hash: &Hash) -> StorageResult<(Transaction, Hash)> {
        let rtxn = self.store.read_txn()?;

        let value = self
            .transactions
            .get(&rtxn, txn_hash.as_bytes())?
            .ok_or(StorageError::TransactionNotFound)?;

        if value.len() < 32 {
            return Err(StorageError::Types(TypesError::UnexpectedEof(value.len())));
        }

        let (txn_bytes, block_hash_bytes) = value.split_at(value.len() - 32);
        let block_hash = Hash::from_bytes(block_hash_bytes).map_err(StorageError::Types)?;

        let mut reader = Reader::new(txn_bytes);
        match Transaction::deserialize(&mut reader) {
            Ok(transaction) => Ok((transaction, block_hash)),
            Err(TypesError::UnknownTransactionType(tag)) => {
                Err(StorageError::UnknownTransactionType(tag))
            }
            Err(error) => Err(StorageError::Types(error)),
        }
    }

    /// Fetch a transaction output and its unlock block.
    pub fn get_transaction_output(
        &self,
        output_hash: &Hash,
    ) -> StorageResult<(TransactionOutput, u64)> {
        let rtxn = self.store.read_txn()?;

        let value = self
            .transaction_outputs
            .get(&rtxn, output_hash.as_bytes())?
            .ok_or_else(|| {
                StorageError::TransactionOutputNotFound(output_hash.to_string())
            })?;

        let mut reader = Reader::new(value);
        let unlock_block = reader.varint()?;
        let output = TransactionOutput::deserialize(&mut reader)?;

        Ok((output, unlock_block))
    }

    /// Batch form of [`Self::get_transaction_output`]; any missing
    /// output fails the whole request.
    pub fn get_transaction_outputs(
        &self,
        output_hashes: &[Hash],
    ) -> StorageResult<Vec<(TransactionOutput, u64)>> {
        output_hashes
            .iter()
            .map(|output_hash| self.get_transaction_output(output_hash))
            .collect()
    }

    /// Whether an output with the given hash exists.
    pub fn output_exists(&self, output_hash: &Hash) -> StorageResult<bool> {
        let rtxn = self.store.read_txn()?;
        Ok(self
            .transaction_outputs
            .get(&rtxn, output_hash.as_bytes())?
            .is_some())
    }

    /// Number of outputs stored.
    pub fn output_count(&self) -> StorageResult<u64> {
        let rtxn = self.store.read_txn()?;
        Ok(self.transaction_outputs.len(&rtxn)?)
    }

    /// Whether a key image is already spent.
    pub fn key_image_exists(&self, key_image: &KeyImage) -> StorageResult<bool> {
        let rtxn = self.store.read_txn()?;
        Ok(self.key_images.get(&rtxn, key_image.as_bytes())?.is_some())
    }

    /// Whether any of the key images is already spent.
    pub fn any_key_image_exists(&self, key_images: &[KeyImage]) -> StorageResult<bool> {
        let rtxn = self.store.read_txn()?;

        for key_image in key_images {
            if self.key_images.get(&rtxn, key_image.as_bytes())?.is_some() {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Number of key images stored.
    pub fn key_image_count(&self) -> StorageResult<u64> {
        let rtxn = self.store.read_txn()?;
        Ok(self.key_images.len(&rtxn)?)
    }

    /// Sample `count` distinct spendable outputs for ring selection,
    /// using the thread RNG.
    ///
    /// Output hashes are SHA3 and hence close to uniform in key space,
    /// so positioning a cursor at a random key samples outputs with
    /// probability proportional to the preceding gap, which is
    /// acceptable for decoy selection.
    pub fn get_random_outputs(
        &self,
        current_block: u64,
        count: usize,
    ) -> StorageResult<Vec<TransactionOutput>> {
        self.get_random_outputs_with(current_block, count, &mut rand::thread_rng())
    }

    /// Sample with a caller-provided RNG. For a fixed draw sequence the
    /// result is deterministic.
    pub fn get_random_outputs_with(
        &self,
        current_block: u64,
        count: usize,
        rng: &mut impl RngCore,
    ) -> StorageResult<Vec<TransactionOutput>> {
        if (self.output_count()? as usize) < count {
            return Err(StorageError::TransactionOutputNotFound(
                "Not enough transaction outputs to complete request".into(),
            ));
        }

        let rtxn = self.store.read_txn()?;

        let mut results: Vec<TransactionOutput> = Vec::with_capacity(count);
        let mut attempts = 0usize;

        while results.len() < count {
            attempts += 1;
            if attempts > count.saturating_mul(SAMPLE_ATTEMPT_FACTOR) {
                return Err(StorageError::TransactionOutputNotFound(
                    "Not enough spendable transaction outputs to complete request".into(),
                ));
            }

            let mut random_key = [0u8; 32];
            rng.fill_bytes(&mut random_key);

            // Cursor to the smallest key at or after the random draw; a
            // miss past the last key just redraws.
            let Some((key, value)) = self
                .transaction_outputs
                .get_greater_than_or_equal_to(&rtxn, &random_key)?
            else {
                continue;
            };

            let mut reader = Reader::new(value);
            let Ok(unlock_block) = reader.varint() else {
                continue;
            };
            let Ok(output) = TransactionOutput::deserialize(&mut reader) else {
                continue;
            };

            // Locked outputs and values that do not hash back to their
            // key (corruption) are skipped, never fatal.
            if unlock_block > current_block || output.hash().as_bytes() != key {
                continue;
            }

            if !results.contains(&output) {
                results.push(output);
            }
        }

        results.sort();

        Ok(results)
    }

    /// Write a block and its transactions atomically.
    ///
    /// Before any write, the ordering hash of the block's transaction
    /// set must equal the ordering hash of the provided transactions so
    /// the global indexes agree across nodes.
    pub fn put_block(&self, block: &Block, transactions: &[Transaction]) -> StorageResult<()> {
        if transactions.len() != block.transactions.len() {
            return Err(StorageError::BlockTxnMismatch);
        }

        {
            let mut block_hashes = Writer::new();
            for txn_hash in &block.transactions {
                block_hashes.key(txn_hash);
            }

            let mut provided_hashes = Writer::new();
            for transaction in transactions {
                provided_hashes.key(&transaction.hash());
            }

            if block_hashes.hash() != provided_hashes.hash() {
                return Err(StorageError::BlockTxnOrder);
            }
        }

        let _writer = self.store.lock_writer();

        let block_hash = block.hash();
        let block_bytes = block.to_bytes();
        let reward_tx = block.reward_tx.to_transaction();

        self.store.with_capacity_retry(|| {
            let mut wtxn = self.store.write_txn()?;

            self.put_transaction(&mut wtxn, &reward_tx, &block_hash)?;

            for transaction in transactions {
                self.put_transaction(&mut wtxn, transaction, &block_hash)?;
            }

            self.blocks
                .put(&mut wtxn, block_hash.as_bytes(), &block_bytes)?;

            self.block_indexes.put(
                &mut wtxn,
                &block.block_index.to_be_bytes(),
                block_hash.as_bytes(),
            )?;

            self.block_timestamps.put(
                &mut wtxn,
                &block.timestamp.to_be_bytes(),
                block_hash.as_bytes(),
            )?;

            wtxn.commit()?;
            Ok(())
        })?;

        trace!(block = %block_hash, index = block.block_index, "Stored block");

        Ok(())
    }

    fn put_transaction(
        &self,
        wtxn: &mut RwTxn<'_>,
        transaction: &Transaction,
        block_hash: &Hash,
    ) -> StorageResult<()> {
        let txn_hash = transaction.hash();

        // The containing block hash rides as a 32-byte suffix of the
        // transaction value.
        let mut value = transaction.to_bytes();
        value.extend_from_slice(block_hash.as_bytes());

        self.transactions
            .put(wtxn, txn_hash.as_bytes(), &value)?;

        for key_image in transaction.key_images() {
            self.key_images.put(wtxn, key_image.as_bytes(), &[])?;
        }

        let unlock_block = transaction.unlock_block();
        for output in transaction.outputs() {
            let mut value = Writer::new();
            value.varint(unlock_block);
            output.serialize(&mut value);

            self.transaction_outputs
                .put(wtxn, output.hash().as_bytes(), value.as_bytes())?;
        }

        Ok(())
    }

    /// Delete the block at the given index together with its
    /// transactions, outputs, and key images.
    pub fn del_block(&self, block_index: u64) -> StorageResult<()> {
        let (block, transactions) = self.get_block_by_index(block_index)?;
        let block_hash = block.hash();
        let reward_tx = block.reward_tx.to_transaction();

        let _writer = self.store.lock_writer();

        self.store.with_capacity_retry(|| {
            let mut wtxn = self.store.write_txn()?;

            self.del_transaction(&mut wtxn, &reward_tx)?;

            for transaction in &transactions {
                self.del_transaction(&mut wtxn, transaction)?;
            }

            self.block_timestamps
                .delete(&mut wtxn, &block.timestamp.to_be_bytes())?;
            self.block_indexes
                .delete(&mut wtxn, &block.block_index.to_be_bytes())?;
            self.blocks.delete(&mut wtxn, block_hash.as_bytes())?;

            wtxn.commit()?;
            Ok(())
        })?;

        trace!(block = %block_hash, index = block_index, "Deleted block");

        Ok(())
    }

    fn del_transaction(
        &self,
        wtxn: &mut RwTxn<'_>,
        transaction: &Transaction,
    ) -> StorageResult<()> {
        for key_image in transaction.key_images() {
            self.key_images.delete(wtxn, key_image.as_bytes())?;
        }

        for output in transaction.outputs() {
            self.transaction_outputs
                .delete(wtxn, output.hash().as_bytes())?;
        }

        self.transactions
            .delete(wtxn, transaction.hash().as_bytes())?;

        Ok(())
    }

    /// Rewind the chain to the given index: every higher block is
    /// deleted in descending order, inverting the writes of
    /// [`Self::put_block`].
    pub fn rewind(&self, block_index: u64) -> StorageResult<()> {
        if !self.block_index_exists(block_index)? {
            return Err(StorageError::BlockNotFound);
        }

        let top = self.top_block_index()?;

        for index in ((block_index + 1)..=top).rev() {
            self.del_block(index)?;
        }

        Ok(())
    }
}

impl Drop for BlockchainStorage {
    fn drop(&mut self) {
        INSTANCES.lock().remove(&self.id);
    }
}
