//! The secure transport: a router (server) socket and dealer (client)
//! sockets over TCP.
//!
//! Every connection is encrypted and authenticated against the
//! configured server key: the server's keypair is derived from the
//! configured secret, clients derive the matching public key and
//! generate a fresh ephemeral keypair per connection. The client's
//! ephemeral public key travels in the clear as the first frame; both
//! sides then derive directional AES-256-GCM keys from the
//! ephemeral-static exchange and every subsequent length-prefixed frame
//! is sealed with a counter nonce.
//!
//! A connection's transport identity is the SHA3 of the public key it
//! presented: clients are identified by their ephemeral key, the server
//! by its static key.

use crate::envelope::Envelope;
use crate::error::{NetworkError, NetworkResult};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use bytes::Bytes;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use std::net::Ipv6Addr;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use veil_crypto::{
    derive_keypair_from_seed, generate_key_derivation, generate_keypair, sha3, Hash, PublicKey,
    SecretKey,
};
use veil_types::config;

/// A message delivered by a socket: the envelope plus whether it
/// arrived on the server socket.
pub type InboundMessage = (Envelope, bool);

/// The server keypair derived from the configured transport secret.
pub fn derive_server_keypair() -> (PublicKey, SecretKey) {
    derive_keypair_from_seed(config::p2p::SERVER_SECRET_KEY)
}

fn directional_key(shared: &PublicKey, client_ephemeral: &PublicKey, direction: &[u8]) -> Hash {
    let mut data = b"veil transport".to_vec();
    data.extend_from_slice(direction);
    data.extend_from_slice(shared.as_bytes());
    data.extend_from_slice(client_ephemeral.as_bytes());
    sha3(&data)
}

/// One direction of a sealed channel.
struct Crypter {
    cipher: Aes256Gcm,
    counter: u64,
}

impl Crypter {
    fn new(key: &Hash) -> Self {
        Crypter {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes())),
            counter: 0,
        }
    }

    fn next_nonce(&mut self) -> [u8; 12] {
        let mut nonce = [0u8; 12];
        nonce[..8].copy_from_slice(&self.counter.to_le_bytes());
        self.counter += 1;
        nonce
    }

    fn seal(&mut self, plaintext: &[u8]) -> NetworkResult<Vec<u8>> {
        let nonce = self.next_nonce();
        self.cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| NetworkError::Encryption)
    }

    fn open(&mut self, ciphertext: &[u8]) -> NetworkResult<Vec<u8>> {
        let nonce = self.next_nonce();
        self.cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext)
            .map_err(|_| NetworkError::Encryption)
    }
}

/// Directional channel keys for one connection.
fn channel_keys(shared: &PublicKey, client_ephemeral: &PublicKey) -> (Crypter, Crypter) {
    let client_to_server = directional_key(shared, client_ephemeral, b"c2s");
    let server_to_client = directional_key(shared, client_ephemeral, b"s2c");
    (
        Crypter::new(&client_to_server),
        Crypter::new(&server_to_client),
    )
}

/// The router socket: accepts encrypted connections, tags inbound
/// messages with the presenting peer's transport identity, and replies
/// by identity.
pub struct Server {
    port: u16,
    bound_port: AtomicU16,
    identity: Hash,
    secret_key: SecretKey,
    connections: Arc<DashMap<Hash, mpsc::UnboundedSender<Vec<u8>>>>,
    messages: mpsc::UnboundedSender<InboundMessage>,
    shutdown: CancellationToken,
}

impl Server {
    /// Create a server for the given bind port. Nothing listens until
    /// [`Self::bind`].
    pub fn new(
        port: u16,
        messages: mpsc::UnboundedSender<InboundMessage>,
        shutdown: CancellationToken,
    ) -> Self {
        let (_, secret_key) = derive_server_keypair();

        Server {
            port,
            bound_port: AtomicU16::new(0),
            // A fresh routing identity per socket instance; the static
            // keypair is shared by every node and only secures the
            // channel.
            identity: veil_crypto::random_hash(),
            secret_key,
            connections: Arc::new(DashMap::new()),
            messages,
            shutdown,
        }
    }

    /// Drop a connected client by transport identity.
    pub fn disconnect(&self, identity: &Hash) {
        self.connections.remove(identity);
    }

    /// The server's transport identity.
    pub fn identity(&self) -> Hash {
        self.identity
    }

    /// The port the server is listening on.
    pub fn port(&self) -> u16 {
        let bound = self.bound_port.load(Ordering::Relaxed);
        if bound != 0 {
            bound
        } else {
            self.port
        }
    }

    /// Number of connected clients.
    pub fn connections(&self) -> usize {
        self.connections.len()
    }

    /// Transport identities of the connected clients.
    pub fn connected(&self) -> Vec<Hash> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    /// Bind the listener and start accepting connections.
    pub async fn bind(self: &Arc<Self>) -> NetworkResult<u16> {
        let listener = TcpListener::bind((Ipv6Addr::UNSPECIFIED, self.port))
            .await
            .map_err(NetworkError::Bind)?;

        let port = listener.local_addr().map_err(NetworkError::Bind)?.port();
        self.bound_port.store(port, Ordering::Relaxed);

        debug!(port, "Server socket listening");

        let server = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = server.shutdown.cancelled() => break,
                    accepted = listener.accept() => {
                        let Ok((stream, address)) = accepted else { continue };
                        let server = Arc::clone(&server);
                        tokio::spawn(async move {
                            if let Err(error) = server.handle_connection(stream, address.to_string()).await {
                                trace!(%address, %error, "Server connection ended");
                            }
                        });
                    }
                }
            }
        });

        Ok(port)
    }

    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        peer_address: String,
    ) -> NetworkResult<()> {
        let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

        // The first frame is the client's ephemeral public key.
        let first = framed
            .next()
            .await
            .ok_or(NetworkError::Encryption)??;
        let client_ephemeral = PublicKey::from_slice(&first)?;
        if !client_ephemeral.check_subgroup() {
            return Err(NetworkError::Crypto(veil_crypto::CryptoError::InvalidPoint));
        }

        let shared = generate_key_derivation(&client_ephemeral, &self.secret_key)?;
        let (mut inbound_crypter, mut outbound_crypter) =
            channel_keys(&shared, &client_ephemeral);

        let client_identity = sha3(client_ephemeral.as_bytes());
        trace!(peer = %client_identity, address = %peer_address, "Client connected");

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        self.connections.insert(client_identity, outbound_tx);

        let (mut sink, mut source) = framed.split();

        // Outgoing loop: drain the queue, seal, send. A send failure
        // unregisters the peer identity.
        let connections = Arc::clone(&self.connections);
        let writer_shutdown = self.shutdown.clone();
        let writer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_shutdown.cancelled() => break,
                    payload = outbound_rx.recv() => {
                        let Some(payload) = payload else { break };
                        let Ok(sealed) = outbound_crypter.seal(&payload) else { break };
                        if sink.send(Bytes::from(sealed)).await.is_err() {
                            connections.remove(&client_identity);
                            break;
                        }
                    }
                }
            }
        });

        // Incoming loop: open frames and push envelopes to the node.
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                frame = source.next() => {
                    let Some(Ok(frame)) = frame else { break };
                    let Ok(payload) = inbound_crypter.open(&frame) else {
                        trace!(peer = %client_identity, "Dropping undecryptable frame");
                        break;
                    };

                    let envelope = Envelope {
                        from: client_identity,
                        to: self.identity,
                        subject: Hash::ZERO,
                        peer_address: peer_address.clone(),
                        payload,
                    };

                    if self.messages.send((envelope, true)).is_err() {
                        break;
                    }
                }
            }
        }

        self.connections.remove(&client_identity);
        writer.abort();
        trace!(peer = %client_identity, "Client disconnected");

        Ok(())
    }

    /// Send an envelope to the client it addresses.
    pub fn send(&self, envelope: &Envelope) -> NetworkResult<()> {
        let Some(connection) = self.connections.get(&envelope.to) else {
            return Err(NetworkError::PeerNotConnected);
        };

        if connection.send(envelope.payload.clone()).is_err() {
            drop(connection);
            self.connections.remove(&envelope.to);
            return Err(NetworkError::PeerNotConnected);
        }

        Ok(())
    }

    /// Send a payload to every connected client.
    pub fn broadcast(&self, payload: &[u8]) {
        let mut dead = Vec::new();

        for entry in self.connections.iter() {
            if entry.value().send(payload.to_vec()).is_err() {
                dead.push(*entry.key());
            }
        }

        for identity in dead {
            self.connections.remove(&identity);
        }
    }
}

/// A dealer socket: one outgoing encrypted connection.
pub struct Client {
    identity: Hash,
    server_identity: Hash,
    address: String,
    outgoing: mpsc::UnboundedSender<Vec<u8>>,
    connected: Arc<AtomicBool>,
}

impl Client {
    /// Connect to a peer, bounded by the configured connection timeout.
    pub async fn connect(
        host: &str,
        port: u16,
        messages: mpsc::UnboundedSender<InboundMessage>,
        shutdown: CancellationToken,
    ) -> NetworkResult<Client> {
        let address = format!("{}:{}", host, port);

        let connect = TcpStream::connect(address.clone());
        let stream = tokio::time::timeout(
            Duration::from_millis(config::DEFAULT_CONNECTION_TIMEOUT),
            connect,
        )
        .await
        .map_err(|_| NetworkError::Timeout)?
        .map_err(NetworkError::Connect)?;

        let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

        let (ephemeral_public, ephemeral_secret) = generate_keypair();
        framed
            .send(Bytes::copy_from_slice(ephemeral_public.as_bytes()))
            .await
            .map_err(NetworkError::Connect)?;

        let (server_public, _) = derive_server_keypair();
        let shared = generate_key_derivation(&server_public, &ephemeral_secret)?;
        let (mut outbound_crypter, mut inbound_crypter) =
            channel_keys(&shared, &ephemeral_public);

        let identity = sha3(ephemeral_public.as_bytes());
        // The remote socket is identified by where we dialed it.
        let server_identity = sha3(address.as_bytes());

        let connected = Arc::new(AtomicBool::new(true));
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Vec<u8>>();

        let (mut sink, mut source) = framed.split();

        // Outgoing loop.
        let writer_connected = Arc::clone(&connected);
        let writer_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_shutdown.cancelled() => break,
                    payload = outgoing_rx.recv() => {
                        let Some(payload) = payload else { break };
                        let Ok(sealed) = outbound_crypter.seal(&payload) else { break };
                        if sink.send(Bytes::from(sealed)).await.is_err() {
                            break;
                        }
                    }
                }
            }
            writer_connected.store(false, Ordering::Relaxed);
        });

        // Incoming loop.
        let reader_connected = Arc::clone(&connected);
        let reader_address = address.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    frame = source.next() => {
                        let Some(Ok(frame)) = frame else { break };
                        let Ok(payload) = inbound_crypter.open(&frame) else { break };

                        let envelope = Envelope {
                            from: server_identity,
                            to: identity,
                            subject: Hash::ZERO,
                            peer_address: reader_address.clone(),
                            payload,
                        };

                        if messages.send((envelope, false)).is_err() {
                            break;
                        }
                    }
                }
            }
            reader_connected.store(false, Ordering::Relaxed);
        });

        debug!(%address, "Client connected");

        Ok(Client {
            identity,
            server_identity,
            address,
            outgoing: outgoing_tx,
            connected,
        })
    }

    /// The client's own transport identity.
    pub fn identity(&self) -> Hash {
        self.identity
    }

    /// The transport identity of the server side.
    pub fn server_identity(&self) -> Hash {
        self.server_identity
    }

    /// The address the client dialed.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the connection is still alive.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Queue a payload for sending.
    pub fn send(&self, payload: Vec<u8>) -> NetworkResult<()> {
        self.outgoing
            .send(payload)
            .map_err(|_| NetworkError::PeerNotConnected)
    }
}
