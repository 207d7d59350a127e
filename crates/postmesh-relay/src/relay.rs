//! Relay lifecycle manager.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::watch;

use postmesh_types::{PostmeshError, Result};

use crate::driver::{BroadcastHandler, RelayDriver};
use crate::monitor::NetworkMonitor;
use crate::options::RelayOptions;

/// Application callback for inbound gossip payloads.
///
/// Invoked fire-and-forget: the relay spawns the returned future, so a
/// slow callback never blocks delivery of subsequent messages.
pub type BroadcastCallback = Arc<dyn Fn(Vec<u8>) -> BoxFuture<'static, ()> + Send + Sync>;

// ---------------------------------------------------------------------------
// RelayState
// ---------------------------------------------------------------------------

/// Lifecycle states of the relay.
///
/// Transitions run forward only; there is no way back to
/// `Unconfigured` — restarting requires a new instance. `Failed` is
/// reachable from any state on fatal error and is terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelayState {
    Unconfigured,
    Configuring,
    Started,
    Subscribed,
    Publishing,
    Failed,
}

// ---------------------------------------------------------------------------
// GossipRelay
// ---------------------------------------------------------------------------

/// Owns the relay configuration, the single topic subscription, publish
/// access, and the network-state monitor.
///
/// The driver instance is owned exclusively by this manager; no other
/// component calls its primitives directly.
pub struct GossipRelay {
    sub_topic: String,
    driver: Arc<dyn RelayDriver>,
    monitor_period: Duration,
    state: Mutex<RelayState>,
    monitor: Mutex<Option<NetworkMonitor>>,
    monitor_reports: Mutex<Option<Arc<AtomicU64>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl GossipRelay {
    /// Creates an unstarted relay bound to one topic.
    ///
    /// # Errors
    ///
    /// `PostmeshError::ConfigError` when the topic is empty — the
    /// constructor precondition, not deferred to [`Self::start`].
    pub fn new(topic: impl Into<String>, driver: Arc<dyn RelayDriver>) -> Result<Self> {
        let sub_topic = topic.into();
        if sub_topic.trim().is_empty() {
            return Err(PostmeshError::ConfigError {
                reason: "invalid topic".into(),
            });
        }
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            sub_topic,
            driver,
            monitor_period: NetworkMonitor::DEFAULT_PERIOD,
            state: Mutex::new(RelayState::Unconfigured),
            monitor: Mutex::new(None),
            monitor_reports: Mutex::new(None),
            shutdown_tx,
        })
    }

    /// Overrides the monitor polling period. Takes effect on the next
    /// [`Self::start`].
    pub fn with_monitor_period(mut self, period: Duration) -> Self {
        self.monitor_period = period;
        self
    }

    /// The subscribed topic.
    pub fn sub_topic(&self) -> &str {
        &self.sub_topic
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RelayState {
        self.state.lock().map(|s| *s).unwrap_or(RelayState::Failed)
    }

    /// Number of network-state reports emitted so far.
    pub fn report_count(&self) -> u64 {
        self.monitor_reports
            .lock()
            .ok()
            .and_then(|guard| {
                guard
                    .as_ref()
                    .map(|reports| reports.load(Ordering::SeqCst))
            })
            .unwrap_or(0)
    }

    fn set_state(&self, next: RelayState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    fn fail<T>(&self, err: PostmeshError) -> Result<T> {
        self.set_state(RelayState::Failed);
        Err(err)
    }

    /// Joins the network and subscribes to the relay topic.
    ///
    /// Rejects before any driver call when `bootstrap_addresses` is
    /// empty — the single hard precondition for joining the network.
    /// Resolves once the subscription is confirmed; the monitor's first
    /// tick is not awaited.
    pub async fn start(
        &self,
        options: &RelayOptions,
        on_broadcast: Option<BroadcastCallback>,
    ) -> Result<()> {
        {
            let mut state = self.state.lock().map_err(|_| PostmeshError::NetworkError {
                reason: "relay state lock poisoned".into(),
            })?;
            if *state != RelayState::Unconfigured {
                return Err(PostmeshError::NetworkError {
                    reason: format!("relay already started (state {:?})", *state),
                });
            }
            *state = RelayState::Configuring;
        }

        if options.bootstrap_addresses.is_empty() {
            return self.fail(PostmeshError::ConfigError {
                reason: "invalid p2p bootstrappers: address list is empty".into(),
            });
        }

        if let Err(e) = self.driver.start(options).await {
            return self.fail(e);
        }
        self.set_state(RelayState::Started);

        let handler = broadcast_handler(on_broadcast);
        if let Err(e) = self.driver.subscribe(&self.sub_topic, handler).await {
            return self.fail(e);
        }
        self.set_state(RelayState::Subscribed);

        let monitor = NetworkMonitor::spawn(
            self.driver.clone(),
            self.sub_topic.clone(),
            self.monitor_period,
            self.shutdown_tx.subscribe(),
        );
        if let Ok(mut guard) = self.monitor_reports.lock() {
            *guard = Some(monitor.counter());
        }
        if let Ok(mut guard) = self.monitor.lock() {
            *guard = Some(monitor);
        }

        tracing::info!(topic = %self.sub_topic, "relay subscribed");
        Ok(())
    }

    /// Publishes a message on the relay topic.
    ///
    /// Rejects a JSON-null payload without touching the driver and
    /// returns the driver's publish result unmodified otherwise.
    pub async fn publish(&self, message: &Value) -> Result<Option<String>> {
        if message.is_null() {
            return Err(PostmeshError::InvalidMessage {
                reason: "invalid publish payload".into(),
            });
        }

        {
            let mut state = self.state.lock().map_err(|_| PostmeshError::NetworkError {
                reason: "relay state lock poisoned".into(),
            })?;
            match *state {
                RelayState::Subscribed | RelayState::Publishing => {
                    *state = RelayState::Publishing;
                }
                other => {
                    return Err(PostmeshError::NetworkError {
                        reason: format!("relay is not subscribed (state {other:?})"),
                    });
                }
            }
        }

        let payload = serde_json::to_vec(message).map_err(|e| PostmeshError::InvalidMessage {
            reason: format!("unencodable publish payload: {e}"),
        })?;

        // Publish failures propagate but are not fatal to the relay.
        let result = self.driver.publish(&self.sub_topic, payload).await;
        self.set_state(RelayState::Subscribed);

        if let Ok(outcome) = &result {
            tracing::debug!(topic = %self.sub_topic, ?outcome, "publish completed");
        }
        result
    }

    /// Stops the network-state monitor deterministically.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let monitor = self.monitor.lock().ok().and_then(|mut guard| guard.take());
        if let Some(monitor) = monitor {
            monitor.join().await;
        }
    }
}

/// Wraps the optional application callback into the driver handler.
fn broadcast_handler(callback: Option<BroadcastCallback>) -> BroadcastHandler {
    Arc::new(move |data: Vec<u8>| {
        tracing::debug!(bytes = data.len(), "received a subscribed message");
        if let Some(callback) = &callback {
            // Fire-and-forget: delivery of the next message must not
            // wait on callback latency.
            tokio::spawn(callback(data));
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
