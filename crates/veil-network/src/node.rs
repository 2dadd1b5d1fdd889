//! The P2P node.
//!
//! Owns the router (server) socket, one dealer (client) per outgoing
//! peer, the peer database, and four worker tasks:
//!
//! - the **poller** drains every socket and dispatches packets;
//! - the **connection manager** prunes dead clients and tops the
//!   outgoing connection count back up from the peer database;
//! - the **keepalive** timer broadcasts liveness probes;
//! - the **peer exchange** timer broadcasts peer samples.
//!
//! Server-side connections follow the handshake state machine: a valid
//! handshake moves a connection to the handshaked state; a second
//! handshake, or data before any handshake, is a protocol violation
//! and drops the connection. Seed-mode nodes exist only to spread
//! peers and never accept data packets.

use crate::envelope::Envelope;
use crate::error::{NetworkError, NetworkResult};
use crate::message::{
    normalize_address, DataPacket, HandshakePacket, KeepAlivePacket, NetworkPeer, Packet,
    PeerExchangePacket,
};
use crate::peer_database::PeerDatabase;
use crate::transport::{Client, InboundMessage, Server};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use veil_crypto::Hash;
use veil_types::{config, Serializable};

/// A data packet delivered to the application layer.
#[derive(Debug, Clone)]
pub struct DataMessage {
    /// Transport identity of the sender.
    pub from: Hash,
    /// The data packet.
    pub packet: DataPacket,
    /// Whether the packet arrived on the server socket.
    pub received_by_server: bool,
}

/// The P2P node.
pub struct Node {
    peer_db: Arc<PeerDatabase>,
    server: Arc<Server>,
    /// Outgoing connections keyed by the hash of the normalized
    /// `host:port` they dialed.
    clients: Arc<DashMap<Hash, Arc<Client>>>,
    /// Server-side transport identities that completed a handshake.
    completed_handshakes: DashMap<Hash, ()>,
    /// Data packets awaiting the application layer.
    messages: Mutex<VecDeque<DataMessage>>,
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
    inbound_rx: Mutex<Option<mpsc::UnboundedReceiver<InboundMessage>>>,
    network_id: Hash,
    seed_mode: bool,
    shutdown: CancellationToken,
    running: AtomicBool,
}

impl Node {
    /// Create a node over the peer database at `path`, binding the
    /// server to `bind_port`. Seed-mode nodes exchange peers across all
    /// networks and ignore data packets.
    pub fn new(
        path: impl AsRef<Path>,
        bind_port: u16,
        seed_mode: bool,
        network_id: Hash,
    ) -> NetworkResult<Arc<Node>> {
        let peer_db = PeerDatabase::instance(path)?;
        peer_db.prune()?;

        let shutdown = CancellationToken::new();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let server = Arc::new(Server::new(bind_port, inbound_tx.clone(), shutdown.clone()));

        Ok(Arc::new(Node {
            peer_db,
            server,
            clients: Arc::new(DashMap::new()),
            completed_handshakes: DashMap::new(),
            messages: Mutex::new(VecDeque::new()),
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
            network_id,
            seed_mode,
            shutdown,
            running: AtomicBool::new(false),
        }))
    }

    /// The node's persistent peer id.
    pub fn peer_id(&self) -> Hash {
        self.peer_db.peer_id()
    }

    /// The peer database handle.
    pub fn peers(&self) -> Arc<PeerDatabase> {
        Arc::clone(&self.peer_db)
    }

    /// The port the server socket listens on.
    pub fn port(&self) -> u16 {
        self.server.port()
    }

    /// Whether the node has been started and not stopped.
    pub fn running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Number of incoming (server-side) connections.
    pub fn incoming_connections(&self) -> usize {
        self.server.connections()
    }

    /// Number of outgoing (client-side) connections.
    pub fn outgoing_connections(&self) -> usize {
        self.clients.len()
    }

    /// Addresses of the outgoing connections.
    pub fn outgoing_connected(&self) -> Vec<String> {
        self.clients
            .iter()
            .map(|entry| entry.value().address().to_string())
            .collect()
    }

    /// Pop the next data packet delivered to the application layer.
    pub fn pop_message(&self) -> Option<DataMessage> {
        self.messages.lock().pop_front()
    }

    /// Bind the server, connect to the seed nodes, and start the worker
    /// tasks. Fails when the server cannot bind, or when this is not a
    /// seed-mode node, no seed node answered, and the peer database is
    /// empty.
    pub async fn start(self: &Arc<Self>, seed_nodes: &[String]) -> NetworkResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.server.bind().await?;

        // The poller drains every socket into the packet handlers.
        {
            let node = Arc::clone(self);
            let mut inbound_rx = self
                .inbound_rx
                .lock()
                .take()
                .expect("the inbound receiver is taken once, at start");
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = node.shutdown.cancelled() => break,
                        message = inbound_rx.recv() => {
                            let Some((envelope, is_server)) = message else { break };
                            node.handle_incoming_message(envelope, is_server);
                        }
                    }
                }
            });
        }

        // Attempt the compiled-in seed nodes plus any extras, in
        // parallel so unreachable seeds cost one timeout, not one each.
        let mut attempts = Vec::new();
        for seed in config::p2p::SEED_NODES.iter() {
            attempts.push((seed.host.to_string(), seed.port));
        }
        for seed in seed_nodes {
            attempts.push(split_host_port(seed, config::p2p::DEFAULT_BIND_PORT));
        }

        let results = futures::future::join_all(
            attempts
                .iter()
                .map(|(host, port)| self.connect(host.clone(), *port)),
        )
        .await;

        let connected_to_seed = results.iter().any(|result| {
            matches!(result, Ok(()) | Err(NetworkError::DuplicateConnect))
        });

        if !self.seed_mode && !connected_to_seed && self.peer_db.count()? == 0 {
            self.stop();
            return Err(NetworkError::SeedConnect(
                "Could not connect to any seed nodes".into(),
            ));
        }

        self.spawn_connection_manager();
        self.spawn_keepalive();
        self.spawn_peer_exchange();

        info!(port = self.port(), seed_mode = self.seed_mode, "P2P node started");

        Ok(())
    }

    /// Signal every worker task to stop and drop the sockets.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            debug!("P2P node shutting down");
        }
        self.shutdown.cancel();
        self.clients.clear();
    }

    /// Open an outgoing connection and send our handshake.
    pub async fn connect(&self, host: String, port: u16) -> NetworkResult<()> {
        let connection_id = connection_id(&host, port);

        if self.clients.contains_key(&connection_id) {
            return Err(NetworkError::DuplicateConnect);
        }

        trace!(%host, port, "Attempting outgoing connection");

        let client = Client::connect(
            &host,
            port,
            self.inbound_tx.clone(),
            self.shutdown.child_token(),
        )
        .await?;

        client.send(self.build_handshake()?.to_bytes())?;

        self.clients.insert(connection_id, Arc::new(client));

        Ok(())
    }

    fn build_handshake(&self) -> NetworkResult<HandshakePacket> {
        let mut packet = HandshakePacket::new(self.peer_id(), self.port(), self.network_id);
        packet.peers = self.build_peer_list()?;
        Ok(packet)
    }

    fn build_peer_list(&self) -> NetworkResult<Vec<NetworkPeer>> {
        let mut peers = self.peer_db.peers(0, None)?;
        peers.truncate(config::p2p::MAXIMUM_PEERS_EXCHANGED);
        Ok(peers)
    }

    /// Send a data packet over every outgoing connection.
    pub fn send(&self, packet: &DataPacket) {
        self.broadcast_clients(&packet.to_bytes());
    }

    /// Reply to a server-side peer by transport identity.
    pub fn reply(&self, to: Hash, packet: &DataPacket) -> NetworkResult<()> {
        self.server.send(&Envelope::to(to, packet.to_bytes()))
    }

    fn broadcast_clients(&self, payload: &[u8]) {
        for entry in self.clients.iter() {
            // Send failures surface through the connection manager's
            // liveness pass.
            let _ = entry.value().send(payload.to_vec());
        }
    }

    fn handle_incoming_message(&self, envelope: Envelope, is_server: bool) {
        match Packet::parse(&envelope.payload) {
            Ok(Packet::Handshake(packet)) => {
                self.handle_handshake(&envelope, packet, is_server);
            }
            Ok(Packet::KeepAlive(packet)) => {
                self.handle_keepalive(&envelope, packet, is_server);
            }
            Ok(Packet::PeerExchange(packet)) => {
                self.handle_peer_exchange(&envelope, packet, is_server);
            }
            Ok(Packet::Data(packet)) => {
                self.handle_data(&envelope, packet, is_server);
            }
            Err(error) => {
                trace!(from = %envelope.from, %error, "Could not handle incoming message");
                if is_server {
                    self.drop_peer(&envelope.from);
                }
            }
        }
    }

    /// Disconnect a server-side peer after a protocol violation.
    fn drop_peer(&self, identity: &Hash) {
        self.completed_handshakes.remove(identity);
        self.server.disconnect(identity);
    }

    fn version_acceptable(&self, envelope: &Envelope, version: u64) -> bool {
        if version < config::p2p::MINIMUM_VERSION {
            trace!(
                from = %envelope.from,
                version,
                "Peer is running the wrong version of the P2P stack"
            );
            return false;
        }
        true
    }

    /// Record the packet source and every exchanged peer in the peer
    /// database.
    fn absorb_peers(
        &self,
        envelope: &Envelope,
        peer_id: Hash,
        peer_port: u16,
        network_id: Hash,
        peers: &[NetworkPeer],
    ) {
        if let Ok(address) = envelope.peer_address.parse::<SocketAddr>() {
            let source = NetworkPeer {
                address: normalize_address(address.ip()),
                peer_id,
                port: peer_port,
                network_id,
                last_seen: crate::message::unix_time(),
            };

            if let Err(error) = self.peer_db.add(&source) {
                trace!(peer = %peer_id, %error, "Could not add handshake source");
            }
        }

        for peer in peers {
            if peer.peer_id == peer_id {
                continue;
            }

            if let Err(error) = self.peer_db.add(peer) {
                trace!(peer = %peer.peer_id, %error, "Could not add exchanged peer");
            }
        }
    }

    fn handle_handshake(&self, envelope: &Envelope, packet: HandshakePacket, is_server: bool) {
        // A second handshake on a handshaked connection is a protocol
        // violation.
        if is_server && self.completed_handshakes.contains_key(&envelope.from) {
            trace!(from = %envelope.from, "Handshake already completed, protocol violation");
            self.drop_peer(&envelope.from);
            return;
        }

        // We do not talk to ourselves.
        if packet.peer_id == self.peer_id() {
            return;
        }

        if !self.version_acceptable(envelope, packet.version) {
            if is_server {
                self.drop_peer(&envelope.from);
            }
            return;
        }

        if packet.peers.len() > config::p2p::MAXIMUM_PEERS_EXCHANGED {
            trace!(
                from = %envelope.from,
                count = packet.peers.len(),
                "Handshake exceeds the maximum number of peers"
            );
            if is_server {
                self.drop_peer(&envelope.from);
            }
            return;
        }

        self.absorb_peers(
            envelope,
            packet.peer_id,
            packet.peer_port,
            packet.network_id,
            &packet.peers,
        );

        if is_server {
            match self.build_handshake() {
                Ok(reply) => {
                    let envelope = Envelope::to(envelope.from, reply.to_bytes());
                    if let Err(error) = self.server.send(&envelope) {
                        trace!(%error, "Could not reply to handshake");
                        return;
                    }
                }
                Err(error) => {
                    trace!(%error, "Could not build handshake reply");
                    return;
                }
            }

            self.completed_handshakes.insert(envelope.from, ());
        }
    }

    fn handle_keepalive(&self, envelope: &Envelope, packet: KeepAlivePacket, is_server: bool) {
        if !is_server {
            let _ = self.peer_db.touch(&packet.peer_id);
            return;
        }

        if !self.completed_handshakes.contains_key(&envelope.from) {
            trace!(from = %envelope.from, "Keepalive before handshake, protocol violation");
            self.drop_peer(&envelope.from);
            return;
        }

        if packet.peer_id == self.peer_id() {
            return;
        }

        if !self.version_acceptable(envelope, packet.version) {
            return;
        }

        let reply = KeepAlivePacket::new(self.peer_id());
        let _ = self
            .server
            .send(&Envelope::to(envelope.from, reply.to_bytes()));

        let _ = self.peer_db.touch(&packet.peer_id);
    }

    fn handle_peer_exchange(
        &self,
        envelope: &Envelope,
        packet: PeerExchangePacket,
        is_server: bool,
    ) {
        if is_server && !self.completed_handshakes.contains_key(&envelope.from) {
            trace!(from = %envelope.from, "Peer exchange before handshake, protocol violation");
            self.drop_peer(&envelope.from);
            return;
        }

        if packet.peer_id == self.peer_id() {
            return;
        }

        if !self.version_acceptable(envelope, packet.version) {
            return;
        }

        if packet.peers.len() > config::p2p::MAXIMUM_PEERS_EXCHANGED {
            trace!(
                from = %envelope.from,
                count = packet.peers.len(),
                "Peer exchange exceeds the maximum number of peers"
            );
            if is_server {
                self.drop_peer(&envelope.from);
            }
            return;
        }

        self.absorb_peers(
            envelope,
            packet.peer_id,
            packet.peer_port,
            packet.network_id,
            &packet.peers,
        );

        if is_server {
            if let Ok(peers) = self.build_peer_list() {
                let mut reply =
                    PeerExchangePacket::new(self.peer_id(), self.port(), self.network_id);
                reply.peers = peers;
                let _ = self
                    .server
                    .send(&Envelope::to(envelope.from, reply.to_bytes()));
            }
        }
    }

    fn handle_data(&self, envelope: &Envelope, packet: DataPacket, is_server: bool) {
        // Seed-mode nodes exist only to spread peers.
        if self.seed_mode {
            return;
        }

        // Data for another network is dropped.
        if packet.network_id != self.network_id {
            return;
        }

        if is_server && !self.completed_handshakes.contains_key(&envelope.from) {
            trace!(from = %envelope.from, "Data before handshake, protocol violation");
            self.drop_peer(&envelope.from);
            return;
        }

        if !self.version_acceptable(envelope, packet.version) {
            return;
        }

        self.messages.lock().push_back(DataMessage {
            from: envelope.from,
            packet,
            received_by_server: is_server,
        });
    }

    fn spawn_connection_manager(self: &Arc<Self>) {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(
                config::p2p::CONNECTION_MANAGER_INTERVAL,
            ));

            loop {
                tokio::select! {
                    _ = node.shutdown.cancelled() => break,
                    _ = interval.tick() => node.manage_connections().await,
                }
            }
        });
    }

    async fn manage_connections(&self) {
        // Drop clients whose sockets have gone away.
        let dead: Vec<Hash> = self
            .clients
            .iter()
            .filter(|entry| !entry.value().is_connected())
            .map(|entry| *entry.key())
            .collect();

        for connection_id in dead {
            trace!("Pruning disconnected client");
            self.clients.remove(&connection_id);
        }

        let current = self.clients.len();
        if current >= config::p2p::DEFAULT_CONNECTION_COUNT {
            return;
        }
        let wanted = config::p2p::DEFAULT_CONNECTION_COUNT - current;

        // Seed-mode nodes reach across every network to learn as many
        // peers as possible; everyone else stays on their own network.
        let network_filter = if self.seed_mode {
            None
        } else {
            Some(self.network_id)
        };

        let candidates = match self.peer_db.peers(wanted, network_filter.as_ref()) {
            Ok(candidates) => candidates,
            Err(error) => {
                trace!(%error, "Could not sample peers for connection manager");
                return;
            }
        };

        for peer in candidates {
            if peer.peer_id == self.peer_id() {
                continue;
            }

            let result = self.connect(peer.address_string(), peer.port).await;
            match result {
                Ok(()) | Err(NetworkError::DuplicateConnect) => {}
                Err(error) => {
                    trace!(peer = %peer.peer_id, %error, "Error connecting to peer");
                }
            }
        }
    }

    fn spawn_keepalive(self: &Arc<Self>) {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(config::p2p::KEEPALIVE_INTERVAL));
            // The first tick fires immediately; keepalives wait a full
            // interval first.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = node.shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let packet = KeepAlivePacket::new(node.peer_id());
                        let payload = packet.to_bytes();
                        node.broadcast_clients(&payload);
                        // Poke the connected clients through the server
                        // socket as well.
                        node.server.broadcast(&payload);
                    }
                }
            }
        });
    }

    fn spawn_peer_exchange(self: &Arc<Self>) {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(config::p2p::PEER_EXCHANGE_INTERVAL));
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = node.shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let mut packet = PeerExchangePacket::new(
                            node.peer_id(),
                            node.port(),
                            node.network_id,
                        );
                        packet.peers = node.build_peer_list().unwrap_or_default();
                        node.broadcast_clients(&packet.to_bytes());
                    }
                }
            }
        });
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// The hash keying an outgoing connection to `host:port`.
fn connection_id(host: &str, port: u16) -> Hash {
    let normalized = match host.parse::<std::net::IpAddr>() {
        Ok(address) => normalize_address(address).to_string(),
        Err(_) => host.to_string(),
    };
    veil_crypto::sha3(format!("{}:{}", normalized, port))
}

/// Split a `host[:port]` seed argument, falling back to the default
/// port.
fn split_host_port(seed: &str, default_port: u16) -> (String, u16) {
    match seed.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(port) => (host.to_string(), port),
            Err(_) => (seed.to_string(), default_port),
        },
        None => (seed.to_string(), default_port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;
    use veil_types::Writer;

    async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(
                config::THREAD_POLLING_INTERVAL,
            ))
            .await;
        }
        false
    }

    /// A bare transport client that speaks raw payloads, for driving
    /// the server-side state machine directly.
    async fn raw_client(
        port: u16,
    ) -> (
        Client,
        mpsc::UnboundedReceiver<InboundMessage>,
        CancellationToken,
    ) {
        let shutdown = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Client::connect("127.0.0.1", port, tx, shutdown.clone())
            .await
            .unwrap();
        (client, rx, shutdown)
    }

    #[tokio::test]
    async fn test_nodes_handshake_and_learn_peers() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();

        let node_a = Node::new(dir_a.path(), 0, true, config::p2p::NETWORK_ID).unwrap();
        node_a.start(&[]).await.unwrap();

        let node_b = Node::new(dir_b.path(), 0, false, config::p2p::NETWORK_ID).unwrap();
        node_b
            .start(&[format!("127.0.0.1:{}", node_a.port())])
            .await
            .unwrap();

        // The server side learns b, and the handshake reply teaches b
        // about a.
        let db_a = node_a.peers();
        let db_b = node_b.peers();
        let id_a = node_a.peer_id();
        let id_b = node_b.peer_id();

        assert!(wait_for(|| db_a.exists(&id_b).unwrap_or(false)).await);
        assert!(wait_for(|| db_b.exists(&id_a).unwrap_or(false)).await);

        node_b.stop();
        node_a.stop();
    }

    #[tokio::test]
    async fn test_handshake_version_reject() {
        let dir = TempDir::new().unwrap();
        let node = Node::new(dir.path(), 0, true, config::p2p::NETWORK_ID).unwrap();
        node.start(&[]).await.unwrap();

        let (client, mut rx, _shutdown) = raw_client(node.port()).await;

        let mut handshake = HandshakePacket::new(
            veil_crypto::random_hash(),
            4_000,
            config::p2p::NETWORK_ID,
        );
        handshake.version = config::p2p::MINIMUM_VERSION - 1;
        let peer_id = handshake.peer_id;

        client.send(handshake.to_bytes()).unwrap();

        // No reply is emitted and the peer is not added.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(rx.try_recv().is_err());
        assert!(!node.peers().exists(&peer_id).unwrap());

        node.stop();
    }

    #[tokio::test]
    async fn test_valid_handshake_gets_reply_and_double_handshake_drops() {
        let dir = TempDir::new().unwrap();
        let node = Node::new(dir.path(), 0, true, config::p2p::NETWORK_ID).unwrap();
        node.start(&[]).await.unwrap();

        let (client, mut rx, _shutdown) = raw_client(node.port()).await;

        let handshake = HandshakePacket::new(
            veil_crypto::random_hash(),
            4_000,
            config::p2p::NETWORK_ID,
        );
        client.send(handshake.to_bytes()).unwrap();

        // The server answers with its own handshake.
        let (reply, _) = rx.recv().await.unwrap();
        match Packet::parse(&reply.payload).unwrap() {
            Packet::Handshake(packet) => assert_eq!(packet.peer_id, node.peer_id()),
            other => panic!("expected a handshake reply, got {:?}", other),
        }
        assert!(node.peers().exists(&handshake.peer_id).unwrap());

        // A second handshake is a protocol violation: the connection is
        // unregistered server-side.
        client.send(handshake.to_bytes()).unwrap();
        assert!(wait_for(|| node.incoming_connections() == 0).await);

        node.stop();
    }

    #[tokio::test]
    async fn test_data_before_handshake_drops() {
        let dir = TempDir::new().unwrap();
        // Not a seed node, so data packets are processed at all.
        let node = Node::new(dir.path(), 0, false, config::p2p::NETWORK_ID).unwrap();
        // Pre-seed the peer database so startup does not demand a seed
        // connection.
        node.peers()
            .add(&NetworkPeer::new(
                "203.0.113.50".parse().unwrap(),
                veil_crypto::random_hash(),
                config::p2p::DEFAULT_BIND_PORT,
                config::p2p::NETWORK_ID,
            ))
            .unwrap();
        node.start(&[]).await.unwrap();

        let (client, _rx, _shutdown) = raw_client(node.port()).await;
        assert!(wait_for(|| node.incoming_connections() == 1).await);

        let data = DataPacket::new(config::p2p::NETWORK_ID, b"premature".to_vec());
        client.send(data.to_bytes()).unwrap();

        assert!(wait_for(|| node.incoming_connections() == 0).await);
        assert!(node.pop_message().is_none());

        node.stop();
    }

    #[tokio::test]
    async fn test_seed_mode_ignores_data() {
        let dir = TempDir::new().unwrap();
        let node = Node::new(dir.path(), 0, true, config::p2p::NETWORK_ID).unwrap();
        node.start(&[]).await.unwrap();

        let (client, mut rx, _shutdown) = raw_client(node.port()).await;

        let handshake = HandshakePacket::new(
            veil_crypto::random_hash(),
            4_000,
            config::p2p::NETWORK_ID,
        );
        client.send(handshake.to_bytes()).unwrap();
        rx.recv().await.unwrap();

        let data = DataPacket::new(config::p2p::NETWORK_ID, b"ignored".to_vec());
        client.send(data.to_bytes()).unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(node.pop_message().is_none());

        node.stop();
    }

    #[tokio::test]
    async fn test_data_for_other_network_is_dropped() {
        let dir = TempDir::new().unwrap();
        let node = Node::new(dir.path(), 0, false, config::p2p::NETWORK_ID).unwrap();
        node.peers()
            .add(&NetworkPeer::new(
                "203.0.113.51".parse().unwrap(),
                veil_crypto::random_hash(),
                config::p2p::DEFAULT_BIND_PORT,
                config::p2p::NETWORK_ID,
            ))
            .unwrap();
        node.start(&[]).await.unwrap();

        let (client, mut rx, _shutdown) = raw_client(node.port()).await;

        let handshake = HandshakePacket::new(
            veil_crypto::random_hash(),
            4_000,
            config::p2p::NETWORK_ID,
        );
        client.send(handshake.to_bytes()).unwrap();
        rx.recv().await.unwrap();

        // Wrong network id: dropped without a state transition.
        let foreign = DataPacket::new(veil_crypto::random_hash(), b"foreign".to_vec());
        client.send(foreign.to_bytes()).unwrap();

        // Right network id: delivered.
        let domestic = DataPacket::new(config::p2p::NETWORK_ID, b"domestic".to_vec());
        client.send(domestic.to_bytes()).unwrap();

        assert!(wait_for(|| node.pop_message().is_some()).await);
        assert!(node.pop_message().is_none());

        node.stop();
    }

    #[tokio::test]
    async fn test_malformed_payload_drops_connection() {
        let dir = TempDir::new().unwrap();
        let node = Node::new(dir.path(), 0, true, config::p2p::NETWORK_ID).unwrap();
        node.start(&[]).await.unwrap();

        let (client, _rx, _shutdown) = raw_client(node.port()).await;
        assert!(wait_for(|| node.incoming_connections() == 1).await);

        let mut writer = Writer::new();
        writer.varint(9_999);
        client.send(writer.into_bytes()).unwrap();

        assert!(wait_for(|| node.incoming_connections() == 0).await);

        node.stop();
    }
}
