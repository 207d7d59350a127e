//! Gossip-relay layer of the Postmesh node.
//!
//! [`GossipRelay`] owns the relay lifecycle: configuration, startup,
//! the single topic subscription, publishing, and the background
//! [`monitor::NetworkMonitor`] that reports topology changes. All
//! network I/O happens behind the narrow [`RelayDriver`] interface;
//! [`swarm::SwarmDriver`] is the libp2p-gossipsub implementation.

pub mod driver;
pub mod monitor;
pub mod options;
pub mod relay;
pub mod swarm;
mod transport;

pub use driver::{BroadcastHandler, RelayDriver};
pub use monitor::{NetworkMonitor, NetworkSnapshot};
pub use options::{RelayOptions, RelayOptionsBuilder};
pub use relay::{BroadcastCallback, GossipRelay, RelayState};
pub use swarm::SwarmDriver;
