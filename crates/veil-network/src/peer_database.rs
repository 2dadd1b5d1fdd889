//! The persistent peer database.
//!
//! Backed by two named databases in the shared store environment:
//! `peerlist` holds the known peers keyed by peer id, and `local` holds
//! the node's own peer id, generated on first run and stable across
//! restarts.

use crate::error::{NetworkError, NetworkResult};
use crate::message::{unix_time, NetworkPeer};
use heed::types::Bytes;
use heed::Database;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::path::Path;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};
use veil_crypto::{random_hash, Hash};
use veil_storage::Store;
use veil_types::{config, Serializable};

/// Key under which the node's own peer id is stored in `local`.
static PEER_ID_IDENTIFIER: Lazy<Hash> =
    Lazy::new(|| veil_crypto::sha3(b"veil.peer.database.local.peer.id"));

static INSTANCES: Lazy<Mutex<std::collections::HashMap<Hash, Weak<PeerDatabase>>>> =
    Lazy::new(|| Mutex::new(std::collections::HashMap::new()));

/// The persistent set of known peers. A keyed singleton per database
/// path.
pub struct PeerDatabase {
    id: Hash,
    store: Arc<Store>,
    peers: Database<Bytes, Bytes>,
    peer_id: Hash,
}

impl PeerDatabase {
    /// Open (or alias) the peer database at the given path.
    pub fn instance(path: impl AsRef<Path>) -> NetworkResult<Arc<Self>> {
        let id = veil_crypto::sha3(path.as_ref().to_string_lossy().as_bytes());

        let mut instances = INSTANCES.lock();

        if let Some(existing) = instances.get(&id).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let store = Store::instance(path)?;
        let peers = store.open_database("peerlist")?;
        let local = store.open_database("local")?;

        // Reuse the peer id generated on a previous run, or mint one.
        let peer_id = {
            let rtxn = store.read_txn()?;
            match local.get(&rtxn, PEER_ID_IDENTIFIER.as_bytes())? {
                Some(value) => Hash::from_bytes(value).map_err(veil_storage::StorageError::Types)?,
                None => {
                    drop(rtxn);
                    let peer_id = random_hash();
                    debug!(%peer_id, "Generated new peer id");

                    let mut wtxn = store.write_txn().map_err(NetworkError::Storage)?;
                    local
                        .put(&mut wtxn, PEER_ID_IDENTIFIER.as_bytes(), peer_id.as_bytes())
                        .map_err(veil_storage::StorageError::Store)?;
                    wtxn.commit().map_err(veil_storage::StorageError::Store)?;
                    peer_id
                }
            }
        };

        let database = Arc::new(PeerDatabase {
            id,
            store,
            peers,
            peer_id,
        });

        instances.insert(id, Arc::downgrade(&database));

        Ok(database)
    }

    /// The node's own peer id.
    pub fn peer_id(&self) -> Hash {
        self.peer_id
    }

    /// Number of known peers.
    pub fn count(&self) -> NetworkResult<u64> {
        let rtxn = self.store.read_txn()?;
        Ok(self.peers.len(&rtxn).map_err(veil_storage::StorageError::Store)?)
    }

    /// Whether a peer is known.
    pub fn exists(&self, peer_id: &Hash) -> NetworkResult<bool> {
        let rtxn = self.store.read_txn()?;
        Ok(self
            .peers
            .get(&rtxn, peer_id.as_bytes())
            .map_err(veil_storage::StorageError::Store)?
            .is_some())
    }

    /// Fetch a peer record.
    pub fn get(&self, peer_id: &Hash) -> NetworkResult<NetworkPeer> {
        let rtxn = self.store.read_txn()?;
        let value = self
            .peers
            .get(&rtxn, peer_id.as_bytes())
            .map_err(veil_storage::StorageError::Store)?
            .ok_or_else(|| NetworkError::PeerListAdd("Peer not found".into()))?;
        Ok(NetworkPeer::from_bytes(value).map_err(veil_storage::StorageError::Types)?)
    }

    /// Add (or refresh) a peer. Our own id and entries already past the
    /// prune horizon are rejected.
    pub fn add(&self, peer: &NetworkPeer) -> NetworkResult<()> {
        if peer.peer_id == self.peer_id {
            return Err(NetworkError::PeerListAdd(
                "Refusing to add self to the peer database".into(),
            ));
        }

        let prune_horizon = unix_time().saturating_sub(config::p2p::PEER_PRUNE_TIME);
        if peer.last_seen < prune_horizon {
            return Err(NetworkError::PeerListAdd(
                "Peer last seen too far in the past".into(),
            ));
        }

        trace!(peer = %peer.peer_id, "Adding peer entry");

        self.store.with_capacity_retry(|| {
            let mut wtxn = self.store.write_txn()?;
            self.peers
                .put(&mut wtxn, peer.peer_id.as_bytes(), &peer.to_bytes())?;
            wtxn.commit()?;
            Ok(())
        })?;

        Ok(())
    }

    /// Delete a peer.
    pub fn del(&self, peer_id: &Hash) -> NetworkResult<()> {
        trace!(peer = %peer_id, "Deleting peer entry");

        self.store.with_capacity_retry(|| {
            let mut wtxn = self.store.write_txn()?;
            self.peers.delete(&mut wtxn, peer_id.as_bytes())?;
            wtxn.commit()?;
            Ok(())
        })?;

        Ok(())
    }

    /// Refresh a peer's last-seen time to now. Never decreases it.
    pub fn touch(&self, peer_id: &Hash) -> NetworkResult<()> {
        let mut peer = self.get(peer_id)?;
        peer.last_seen = peer.last_seen.max(unix_time());
        self.add(&peer)
    }

    /// A shuffled sample of known peers, optionally filtered by network
    /// id. `count == 0` returns the whole (shuffled) set.
    pub fn peers(&self, count: usize, network_id: Option<&Hash>) -> NetworkResult<Vec<NetworkPeer>> {
        let mut peers = {
            let rtxn = self.store.read_txn()?;
            let mut peers = Vec::new();
            for entry in self.peers.iter(&rtxn).map_err(veil_storage::StorageError::Store)? {
                let (_, value) = entry.map_err(veil_storage::StorageError::Store)?;
                let peer =
                    NetworkPeer::from_bytes(value).map_err(veil_storage::StorageError::Types)?;

                if let Some(network_id) = network_id {
                    if peer.network_id != *network_id {
                        continue;
                    }
                }

                peers.push(peer);
            }
            peers
        };

        peers.shuffle(&mut rand::thread_rng());

        if count != 0 && peers.len() > count {
            peers.truncate(count);
        }

        Ok(peers)
    }

    /// Delete every peer whose last-seen time is past the prune
    /// horizon.
    pub fn prune(&self) -> NetworkResult<()> {
        let prune_horizon = unix_time().saturating_sub(config::p2p::PEER_PRUNE_TIME);

        let stale: Vec<Hash> = self
            .peers(0, None)?
            .into_iter()
            .filter(|peer| peer.last_seen < prune_horizon)
            .map(|peer| peer.peer_id)
            .collect();

        if !stale.is_empty() {
            trace!(count = stale.len(), "Pruning stale peers");
        }

        for peer_id in stale {
            self.del(&peer_id)?;
        }

        Ok(())
    }
}

impl Drop for PeerDatabase {
    fn drop(&mut self) {
        INSTANCES.lock().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tempfile::TempDir;

    fn sample_peer(network_id: Hash) -> NetworkPeer {
        NetworkPeer::new(
            IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9)),
            random_hash(),
            config::p2p::DEFAULT_BIND_PORT,
            network_id,
        )
    }

    #[test]
    fn test_peer_id_is_stable_across_reopens() {
        let dir = TempDir::new().unwrap();

        let first = {
            let database = PeerDatabase::instance(dir.path()).unwrap();
            database.peer_id()
        };

        let database = PeerDatabase::instance(dir.path()).unwrap();
        assert_eq!(database.peer_id(), first);
    }

    #[test]
    fn test_add_get_and_count() {
        let dir = TempDir::new().unwrap();
        let database = PeerDatabase::instance(dir.path()).unwrap();

        let peer = sample_peer(config::p2p::NETWORK_ID);
        database.add(&peer).unwrap();

        assert!(database.exists(&peer.peer_id).unwrap());
        assert_eq!(database.count().unwrap(), 1);
        assert_eq!(database.get(&peer.peer_id).unwrap(), peer);
    }

    #[test]
    fn test_add_rejects_self() {
        let dir = TempDir::new().unwrap();
        let database = PeerDatabase::instance(dir.path()).unwrap();

        let mut peer = sample_peer(config::p2p::NETWORK_ID);
        peer.peer_id = database.peer_id();

        assert!(matches!(
            database.add(&peer),
            Err(NetworkError::PeerListAdd(_))
        ));
    }

    #[test]
    fn test_add_rejects_stale_entries() {
        let dir = TempDir::new().unwrap();
        let database = PeerDatabase::instance(dir.path()).unwrap();

        let mut peer = sample_peer(config::p2p::NETWORK_ID);
        peer.last_seen = 1;

        assert!(matches!(
            database.add(&peer),
            Err(NetworkError::PeerListAdd(_))
        ));
    }

    #[test]
    fn test_touch_never_decreases_last_seen() {
        let dir = TempDir::new().unwrap();
        let database = PeerDatabase::instance(dir.path()).unwrap();

        let mut peer = sample_peer(config::p2p::NETWORK_ID);
        // A last-seen from the near future stays put when touched.
        peer.last_seen = unix_time() + 1_000;
        database.add(&peer).unwrap();

        database.touch(&peer.peer_id).unwrap();
        database.touch(&peer.peer_id).unwrap();

        assert_eq!(
            database.get(&peer.peer_id).unwrap().last_seen,
            peer.last_seen
        );

        // An old-but-valid last-seen advances to now.
        let mut old = sample_peer(config::p2p::NETWORK_ID);
        old.last_seen = unix_time() - 100;
        database.add(&old).unwrap();
        database.touch(&old.peer_id).unwrap();
        assert!(database.get(&old.peer_id).unwrap().last_seen >= unix_time() - 1);
    }

    #[test]
    fn test_peers_filters_by_network_id() {
        let dir = TempDir::new().unwrap();
        let database = PeerDatabase::instance(dir.path()).unwrap();

        let ours = sample_peer(config::p2p::NETWORK_ID);
        let theirs = sample_peer(random_hash());
        database.add(&ours).unwrap();
        database.add(&theirs).unwrap();

        let all = database.peers(0, None).unwrap();
        assert_eq!(all.len(), 2);

        let filtered = database
            .peers(0, Some(&config::p2p::NETWORK_ID))
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].peer_id, ours.peer_id);
    }

    #[test]
    fn test_peers_respects_count() {
        let dir = TempDir::new().unwrap();
        let database = PeerDatabase::instance(dir.path()).unwrap();

        for _ in 0..8 {
            database.add(&sample_peer(config::p2p::NETWORK_ID)).unwrap();
        }

        assert_eq!(database.peers(3, None).unwrap().len(), 3);
        assert_eq!(database.peers(0, None).unwrap().len(), 8);
    }

    #[test]
    fn test_prune_removes_stale_peers() {
        let dir = TempDir::new().unwrap();
        let database = PeerDatabase::instance(dir.path()).unwrap();

        let fresh = sample_peer(config::p2p::NETWORK_ID);
        database.add(&fresh).unwrap();

        // Sneak a stale peer in under the add-time check by aging it
        // after the fact.
        let mut stale = sample_peer(config::p2p::NETWORK_ID);
        database.add(&stale).unwrap();
        stale.last_seen = 1;
        database
            .store
            .with_capacity_retry(|| {
                let mut wtxn = database.store.write_txn()?;
                database
                    .peers
                    .put(&mut wtxn, stale.peer_id.as_bytes(), &stale.to_bytes())?;
                wtxn.commit()?;
                Ok(())
            })
            .unwrap();

        database.prune().unwrap();

        assert!(database.exists(&fresh.peer_id).unwrap());
        assert!(!database.exists(&stale.peer_id).unwrap());
    }
}
