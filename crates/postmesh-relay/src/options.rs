//! Relay startup options.

use std::path::PathBuf;

// ---------------------------------------------------------------------------
// RelayOptions
// ---------------------------------------------------------------------------

/// Immutable configuration consumed once at relay startup.
///
/// `bootstrap_addresses` is the single hard precondition for joining
/// the network: [`crate::GossipRelay::start`] rejects before any driver
/// call when it is empty. Everything else may be absent or empty.
#[derive(Clone, Debug, Default)]
pub struct RelayOptions {
    /// Path to the persisted peer identity; generated when missing.
    pub peer_id_file: Option<PathBuf>,
    /// Path to the private-swarm pre-shared key; open network when absent.
    pub swarm_key_file: Option<PathBuf>,
    /// Listen port for the peer transport.
    pub port: u16,
    /// Peer multiaddresses used to join the network. Required non-empty.
    pub bootstrap_addresses: Vec<String>,
    /// Addresses advertised to peers.
    pub announce_addresses: Vec<String>,
    /// Additional pubsub topics joined for peer discovery.
    pub discovery_topics: Vec<String>,
}

impl RelayOptions {
    /// Default peer transport port.
    pub const DEFAULT_PORT: u16 = 9000;

    /// Starts a builder with the default port and everything else empty.
    pub fn builder() -> RelayOptionsBuilder {
        RelayOptionsBuilder::default()
    }
}

// ---------------------------------------------------------------------------
// RelayOptionsBuilder
// ---------------------------------------------------------------------------

/// Chained builder for [`RelayOptions`].
#[derive(Clone, Debug)]
pub struct RelayOptionsBuilder {
    options: RelayOptions,
}

impl Default for RelayOptionsBuilder {
    fn default() -> Self {
        Self {
            options: RelayOptions {
                port: RelayOptions::DEFAULT_PORT,
                ..RelayOptions::default()
            },
        }
    }
}

impl RelayOptionsBuilder {
    /// Sets the peer identity file path.
    pub fn peer_id_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.peer_id_file = Some(path.into());
        self
    }

    /// Sets the swarm key file path.
    pub fn swarm_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.swarm_key_file = Some(path.into());
        self
    }

    /// Sets the peer transport listen port.
    pub fn port(mut self, port: u16) -> Self {
        self.options.port = port;
        self
    }

    /// Sets the bootstrap peer addresses.
    pub fn bootstrap_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.bootstrap_addresses = addresses.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the announced addresses.
    pub fn announce_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.announce_addresses = addresses.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the pubsub peer-discovery topics.
    pub fn discovery_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.discovery_topics = topics.into_iter().map(Into::into).collect();
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> RelayOptions {
        self.options
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chain_produces_expected_options() {
        let options = RelayOptions::builder()
            .peer_id_file("./peers/.relay1.peerId")
            .swarm_key_file("./peers/.swarmKey")
            .port(9011)
            .bootstrap_addresses(["/ip4/1.2.3.4/tcp/9000/p2p/12D3KooWExample"])
            .announce_addresses(Vec::<String>::new())
            .discovery_topics(["peer-discovery"])
            .build();

        assert_eq!(options.port, 9011);
        assert_eq!(options.bootstrap_addresses.len(), 1);
        assert!(options.announce_addresses.is_empty());
        assert_eq!(options.discovery_topics, vec!["peer-discovery"]);
        assert!(options.peer_id_file.is_some());
    }

    #[test]
    fn builder_defaults_are_empty_with_default_port() {
        let options = RelayOptions::builder().build();
        assert_eq!(options.port, RelayOptions::DEFAULT_PORT);
        assert!(options.bootstrap_addresses.is_empty());
        assert!(options.swarm_key_file.is_none());
    }
}
