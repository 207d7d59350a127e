//! The narrow relay-driver interface.
//!
//! The lifecycle manager is the only owner of the driver; no other
//! component calls these primitives directly. The interface mirrors
//! exactly what the relay needs: start, one subscription per topic,
//! publish, and the three topology queries the monitor polls.

use std::sync::Arc;

use async_trait::async_trait;

use postmesh_types::Result;

use crate::options::RelayOptions;

/// Handler invoked by the driver for every inbound message on a
/// subscribed topic. Must return quickly; long work belongs in a
/// spawned task.
pub type BroadcastHandler = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

/// External gossip-network driver.
#[async_trait]
pub trait RelayDriver: Send + Sync {
    /// Materializes the transport and joins the network.
    async fn start(&self, options: &RelayOptions) -> Result<()>;

    /// Subscribes to a topic, delivering every inbound message to
    /// `handler`.
    async fn subscribe(&self, topic: &str, handler: BroadcastHandler) -> Result<()>;

    /// Publishes an opaque payload on a topic.
    ///
    /// Returns the driver-assigned message id, or `None` when the
    /// driver accepted the publish without producing a result.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<Option<String>>;

    /// Currently connected peers, in the driver's string form.
    async fn peers(&self) -> Result<Vec<String>>;

    /// Peers subscribed to a topic.
    async fn subscribers(&self, topic: &str) -> Result<Vec<String>>;

    /// Topics known to the driver.
    async fn topics(&self) -> Result<Vec<String>>;
}
