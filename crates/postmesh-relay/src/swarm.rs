//! libp2p-gossipsub implementation of the relay driver.
//!
//! [`SwarmDriver::start`] builds the swarm (persisted peer identity,
//! optional private-swarm key, TCP transport, gossipsub behaviour),
//! dials the bootstrap peers, and spawns the event-loop task that owns
//! the swarm. Every later operation reaches the loop through a command
//! channel, so the swarm itself never crosses a thread boundary.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use libp2p::gossipsub::{self, IdentTopic, TopicHash};
use libp2p::identity;
use libp2p::pnet::PreSharedKey;
use libp2p::swarm::{NetworkBehaviour, SwarmEvent};
use libp2p::{Multiaddr, Swarm};
use tokio::sync::{mpsc, oneshot};

use postmesh_types::PostmeshError;

use crate::driver::{BroadcastHandler, RelayDriver};
use crate::options::RelayOptions;
use crate::transport::build_transport;

/// Local alias for the crate result type. Avoids importing
/// `postmesh_types::Result` into this module, which would shadow
/// `std::result::Result` that the `#[derive(NetworkBehaviour)]` macro
/// relies on in its generated code.
type PmResult<T> = std::result::Result<T, PostmeshError>;

/// Maximum allowed gossip message size (64 KiB).
pub const MAX_GOSSIP_SIZE: usize = 65_536;

/// Command channel depth between the driver handle and the event loop.
const COMMAND_CHANNEL_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// Behaviour
// ---------------------------------------------------------------------------

/// Network behaviour of the relay: gossipsub only.
///
/// Peer discovery beyond bootstrap dialing happens over the discovery
/// topics, not through a DHT.
#[derive(NetworkBehaviour)]
struct RelayBehaviour {
    gossip: gossipsub::Behaviour,
}

/// Builds a configured gossipsub behaviour with message signing.
fn build_gossip_behaviour(keypair: &identity::Keypair) -> PmResult<gossipsub::Behaviour> {
    let config = gossipsub::ConfigBuilder::default()
        .max_transmit_size(MAX_GOSSIP_SIZE)
        .build()
        .map_err(|e| PostmeshError::NetworkError {
            reason: format!("failed to build gossipsub config: {e}"),
        })?;

    gossipsub::Behaviour::new(
        gossipsub::MessageAuthenticity::Signed(keypair.clone()),
        config,
    )
    .map_err(|e| PostmeshError::NetworkError {
        reason: format!("failed to create gossipsub behaviour: {e}"),
    })
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

enum DriverCommand {
    Subscribe {
        topic: String,
        handler: BroadcastHandler,
        reply: oneshot::Sender<PmResult<()>>,
    },
    Publish {
        topic: String,
        payload: Vec<u8>,
        reply: oneshot::Sender<PmResult<Option<String>>>,
    },
    Peers {
        reply: oneshot::Sender<Vec<String>>,
    },
    Subscribers {
        topic: String,
        reply: oneshot::Sender<Vec<String>>,
    },
    Topics {
        reply: oneshot::Sender<Vec<String>>,
    },
}

// ---------------------------------------------------------------------------
// SwarmDriver
// ---------------------------------------------------------------------------

/// Handle to the libp2p event loop.
pub struct SwarmDriver {
    commands: Mutex<Option<mpsc::Sender<DriverCommand>>>,
}

impl SwarmDriver {
    /// Creates an unstarted driver.
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(None),
        }
    }

    fn sender(&self) -> PmResult<mpsc::Sender<DriverCommand>> {
        self.commands
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .ok_or_else(|| PostmeshError::NetworkError {
                reason: "relay driver is not started".into(),
            })
    }

    async fn request<T>(
        &self,
        command: DriverCommand,
        receiver: oneshot::Receiver<T>,
    ) -> PmResult<T> {
        self.sender()?
            .send(command)
            .await
            .map_err(|_| driver_stopped())?;
        receiver.await.map_err(|_| driver_stopped())
    }
}

impl Default for SwarmDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn driver_stopped() -> PostmeshError {
    PostmeshError::NetworkError {
        reason: "relay driver stopped".into(),
    }
}

#[async_trait]
impl RelayDriver for SwarmDriver {
    async fn start(&self, options: &RelayOptions) -> PmResult<()> {
        {
            let guard = self.commands.lock().map_err(|_| driver_stopped())?;
            if guard.is_some() {
                return Err(PostmeshError::NetworkError {
                    reason: "relay driver already started".into(),
                });
            }
        }

        // Fail on unparseable addresses before any socket is opened.
        let bootstrap = parse_addresses(&options.bootstrap_addresses, "bootstrap")?;
        let announce = parse_addresses(&options.announce_addresses, "announce")?;

        let keypair = load_or_create_keypair(options.peer_id_file.as_deref())?;
        let psk = load_swarm_key(options.swarm_key_file.as_deref())?;
        if psk.is_some() {
            tracing::info!("private swarm key loaded, joining protected network");
        }

        let mut swarm = libp2p::SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_other_transport(|key| {
                build_transport(key, psk)
                    .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
            })
            .map_err(|e| PostmeshError::NetworkError {
                reason: format!("failed to configure transport: {e}"),
            })?
            .with_behaviour(|key| {
                build_gossip_behaviour(key)
                    .map(|gossip| RelayBehaviour { gossip })
                    .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
            })
            .map_err(|e| PostmeshError::NetworkError {
                reason: format!("failed to build network behaviour: {e}"),
            })?
            .with_swarm_config(|cfg| {
                cfg.with_idle_connection_timeout(Duration::from_secs(60))
            })
            .build();

        let listen_addr: Multiaddr = format!("/ip4/0.0.0.0/tcp/{}", options.port)
            .parse()
            .map_err(|e| PostmeshError::ConfigError {
                reason: format!("invalid listen port {}: {e}", options.port),
            })?;
        swarm
            .listen_on(listen_addr)
            .map_err(|e| PostmeshError::NetworkError {
                reason: format!("failed to start listening: {e}"),
            })?;

        for addr in announce {
            swarm.add_external_address(addr);
        }

        // Discovery topics carry presence only; no handler is attached.
        for topic in &options.discovery_topics {
            swarm
                .behaviour_mut()
                .gossip
                .subscribe(&IdentTopic::new(topic.as_str()))
                .map_err(|e| PostmeshError::NetworkError {
                    reason: format!("failed to join discovery topic '{topic}': {e}"),
                })?;
        }

        // Dial failures are tolerated: the network may come up later and
        // redial on the remaining peers still joins the mesh.
        for addr in bootstrap {
            if let Err(e) = swarm.dial(addr.clone()) {
                tracing::warn!(%addr, %e, "bootstrap dial failed");
            }
        }

        tracing::info!(
            peer_id = %swarm.local_peer_id(),
            port = options.port,
            bootstrap_count = options.bootstrap_addresses.len(),
            "relay driver starting"
        );

        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_DEPTH);
        tokio::spawn(run_event_loop(swarm, rx));

        let mut guard = self.commands.lock().map_err(|_| driver_stopped())?;
        *guard = Some(tx);
        Ok(())
    }

    async fn subscribe(&self, topic: &str, handler: BroadcastHandler) -> PmResult<()> {
        let (reply, rx) = oneshot::channel();
        self.request(
            DriverCommand::Subscribe {
                topic: topic.to_string(),
                handler,
                reply,
            },
            rx,
        )
        .await?
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> PmResult<Option<String>> {
        let (reply, rx) = oneshot::channel();
        self.request(
            DriverCommand::Publish {
                topic: topic.to_string(),
                payload,
                reply,
            },
            rx,
        )
        .await?
    }

    async fn peers(&self) -> PmResult<Vec<String>> {
        let (reply, rx) = oneshot::channel();
        self.request(DriverCommand::Peers { reply }, rx).await
    }

    async fn subscribers(&self, topic: &str) -> PmResult<Vec<String>> {
        let (reply, rx) = oneshot::channel();
        self.request(
            DriverCommand::Subscribers {
                topic: topic.to_string(),
                reply,
            },
            rx,
        )
        .await
    }

    async fn topics(&self) -> PmResult<Vec<String>> {
        let (reply, rx) = oneshot::channel();
        self.request(DriverCommand::Topics { reply }, rx).await
    }
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

async fn run_event_loop(
    mut swarm: Swarm<RelayBehaviour>,
    mut commands: mpsc::Receiver<DriverCommand>,
) {
    let mut handlers: HashMap<TopicHash, BroadcastHandler> = HashMap::new();

    loop {
        tokio::select! {
            event = swarm.select_next_some() => {
                handle_swarm_event(&mut swarm, &handlers, event);
            }
            command = commands.recv() => {
                match command {
                    Some(command) => {
                        handle_command(&mut swarm, &mut handlers, command);
                    }
                    // All handles dropped: the driver is done.
                    None => break,
                }
            }
        }
    }

    tracing::debug!("relay driver event loop stopped");
}

fn handle_swarm_event(
    swarm: &mut Swarm<RelayBehaviour>,
    handlers: &HashMap<TopicHash, BroadcastHandler>,
    event: SwarmEvent<RelayBehaviourEvent>,
) {
    match event {
        SwarmEvent::Behaviour(RelayBehaviourEvent::Gossip(gossipsub::Event::Message {
            message,
            ..
        })) => {
            if let Some(handler) = handlers.get(&message.topic) {
                handler(message.data);
            }
        }
        SwarmEvent::Behaviour(RelayBehaviourEvent::Gossip(gossipsub::Event::Subscribed {
            peer_id,
            topic,
        })) => {
            tracing::debug!(%peer_id, %topic, "peer subscribed");
        }
        SwarmEvent::NewListenAddr { address, .. } => {
            tracing::info!(%address, peer_id = %swarm.local_peer_id(), "relay listening");
        }
        SwarmEvent::ConnectionEstablished { peer_id, .. } => {
            tracing::debug!(%peer_id, "connection established");
        }
        SwarmEvent::ConnectionClosed { peer_id, cause, .. } => {
            tracing::debug!(%peer_id, ?cause, "connection closed");
        }
        _ => {}
    }
}

fn handle_command(
    swarm: &mut Swarm<RelayBehaviour>,
    handlers: &mut HashMap<TopicHash, BroadcastHandler>,
    command: DriverCommand,
) {
    match command {
        DriverCommand::Subscribe {
            topic,
            handler,
            reply,
        } => {
            let ident = IdentTopic::new(topic.as_str());
            let result = swarm
                .behaviour_mut()
                .gossip
                .subscribe(&ident)
                .map(|_| {
                    handlers.insert(ident.hash(), handler);
                })
                .map_err(|e| PostmeshError::NetworkError {
                    reason: format!("failed to subscribe to topic '{topic}': {e}"),
                });
            let _ = reply.send(result);
        }
        DriverCommand::Publish {
            topic,
            payload,
            reply,
        } => {
            let result = match swarm
                .behaviour_mut()
                .gossip
                .publish(IdentTopic::new(topic.as_str()), payload)
            {
                Ok(message_id) => Ok(Some(message_id.to_string())),
                // No mesh peers yet: the publish had nowhere to go, which
                // is an empty result rather than a transport failure.
                Err(gossipsub::PublishError::InsufficientPeers) => Ok(None),
                Err(e) => Err(PostmeshError::NetworkError {
                    reason: format!("failed to publish to topic '{topic}': {e}"),
                }),
            };
            let _ = reply.send(result);
        }
        DriverCommand::Peers { reply } => {
            let peers = swarm
                .connected_peers()
                .map(|peer| peer.to_string())
                .collect();
            let _ = reply.send(peers);
        }
        DriverCommand::Subscribers { topic, reply } => {
            let hash = IdentTopic::new(topic.as_str()).hash();
            let subscribers = swarm
                .behaviour()
                .gossip
                .all_peers()
                .filter(|(_, topics)| topics.contains(&&hash))
                .map(|(peer, _)| peer.to_string())
                .collect();
            let _ = reply.send(subscribers);
        }
        DriverCommand::Topics { reply } => {
            let topics = swarm
                .behaviour()
                .gossip
                .topics()
                .map(|hash| hash.as_str().to_string())
                .collect();
            let _ = reply.send(topics);
        }
    }
}

// ---------------------------------------------------------------------------
// Identity & swarm key files
// ---------------------------------------------------------------------------

/// Loads the persisted peer identity, creating and persisting a fresh
/// one when the file does not exist yet. No path means an ephemeral
/// identity.
fn load_or_create_keypair(path: Option<&Path>) -> PmResult<identity::Keypair> {
    let path = match path {
        Some(path) => path,
        None => return Ok(identity::Keypair::generate_ed25519()),
    };

    if path.exists() {
        let bytes = std::fs::read(path).map_err(|e| PostmeshError::ConfigError {
            reason: format!("failed to read peer id file '{}': {e}", path.display()),
        })?;
        return identity::Keypair::from_protobuf_encoding(&bytes).map_err(|e| {
            PostmeshError::ConfigError {
                reason: format!("invalid peer id file '{}': {e}", path.display()),
            }
        });
    }

    let keypair = identity::Keypair::generate_ed25519();
    let bytes = keypair
        .to_protobuf_encoding()
        .map_err(|e| PostmeshError::ConfigError {
            reason: format!("failed to encode peer identity: {e}"),
        })?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PostmeshError::ConfigError {
            reason: format!("failed to create '{}': {e}", parent.display()),
        })?;
    }
    std::fs::write(path, bytes).map_err(|e| PostmeshError::ConfigError {
        reason: format!("failed to write peer id file '{}': {e}", path.display()),
    })?;
    tracing::info!(path = %path.display(), "generated new peer identity");
    Ok(keypair)
}

/// Loads the pre-shared swarm key, if configured.
fn load_swarm_key(path: Option<&Path>) -> PmResult<Option<PreSharedKey>> {
    let path = match path {
        Some(path) => path,
        None => return Ok(None),
    };
    let text = std::fs::read_to_string(path).map_err(|e| PostmeshError::ConfigError {
        reason: format!("failed to read swarm key file '{}': {e}", path.display()),
    })?;
    text.parse::<PreSharedKey>()
        .map(Some)
        .map_err(|e| PostmeshError::ConfigError {
            reason: format!("invalid swarm key file '{}': {e}", path.display()),
        })
}

fn parse_addresses(addresses: &[String], label: &str) -> PmResult<Vec<Multiaddr>> {
    addresses
        .iter()
        .map(|addr| {
            addr.parse::<Multiaddr>()
                .map_err(|e| PostmeshError::ConfigError {
                    reason: format!("invalid {label} address '{addr}': {e}"),
                })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gossip_behaviour_builds() {
        let keypair = identity::Keypair::generate_ed25519();
        assert!(build_gossip_behaviour(&keypair).is_ok());
    }

    #[test]
    fn keypair_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".relay.peerId");

        let first = load_or_create_keypair(Some(&path)).unwrap();
        assert!(path.exists());

        let second = load_or_create_keypair(Some(&path)).unwrap();
        assert_eq!(
            first.public().to_peer_id(),
            second.public().to_peer_id(),
        );
    }

    #[test]
    fn missing_swarm_key_path_is_open_network() {
        assert!(load_swarm_key(None).unwrap().is_none());
    }

    #[test]
    fn garbage_swarm_key_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".swarmKey");
        std::fs::write(&path, "not a swarm key").unwrap();

        let err = load_swarm_key(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("invalid swarm key file"));
    }

    #[test]
    fn unparseable_bootstrap_address_is_config_error() {
        let err = parse_addresses(&["nonsense".into()], "bootstrap").unwrap_err();
        assert!(err.to_string().contains("invalid bootstrap address"));
    }

    #[tokio::test]
    async fn queries_before_start_fail() {
        let driver = SwarmDriver::new();
        assert!(driver.peers().await.is_err());
        assert!(driver.publish("sync-topic", vec![1]).await.is_err());
    }
}
