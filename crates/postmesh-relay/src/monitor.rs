//! Network-state polling and change reporting.
//!
//! The monitor queries the driver on a fixed interval and reports the
//! observed topology only when it differs from the last retained
//! snapshot. Peers and subscribers are compared by trimmed,
//! case-insensitive string form to absorb representation differences in
//! the underlying transport; topics are compared exactly. The
//! asymmetry is intentional here — topic names are caller-chosen exact
//! strings — but the original system it mirrors may not have meant it;
//! see DESIGN.md.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use postmesh_types::Result;

use crate::driver::RelayDriver;

// ---------------------------------------------------------------------------
// NetworkSnapshot
// ---------------------------------------------------------------------------

/// A point-in-time observation of relay state.
///
/// Never mutated in place: each tick builds a fresh snapshot that either
/// replaces the retained one wholesale or is discarded.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NetworkSnapshot {
    /// Connected peers.
    pub peers: Vec<String>,
    /// Peers subscribed to the relay topic.
    pub subscribers: Vec<String>,
    /// Topics known to the driver.
    pub topics: Vec<String>,
}

/// Element-wise equality under trimming and case folding.
pub(crate) fn normalized_eq(a: &[String], b: &[String]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.trim().eq_ignore_ascii_case(y.trim()))
}

/// Whether `next` differs from the retained snapshot.
///
/// No prior snapshot always counts as changed, so the first tick
/// reports. Peers and subscribers use the normalized comparison;
/// topics use exact structural equality.
pub(crate) fn snapshot_changed(prev: Option<&NetworkSnapshot>, next: &NetworkSnapshot) -> bool {
    let prev = match prev {
        Some(prev) => prev,
        None => return true,
    };
    !normalized_eq(&prev.peers, &next.peers)
        || !normalized_eq(&prev.subscribers, &next.subscribers)
        || prev.topics != next.topics
}

// ---------------------------------------------------------------------------
// NetworkMonitor
// ---------------------------------------------------------------------------

/// Cancellable background task polling the driver for topology changes.
pub struct NetworkMonitor {
    handle: JoinHandle<()>,
    reports: Arc<AtomicU64>,
}

impl NetworkMonitor {
    /// Default polling period.
    pub const DEFAULT_PERIOD: Duration = Duration::from_millis(1000);

    /// Spawns the polling task. It runs until the shutdown channel
    /// fires or its sender is dropped.
    pub fn spawn(
        driver: Arc<dyn RelayDriver>,
        topic: String,
        period: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let reports = Arc::new(AtomicU64::new(0));
        let handle = tokio::spawn(run_monitor(
            driver,
            topic,
            period,
            shutdown,
            reports.clone(),
        ));
        Self { handle, reports }
    }

    /// Number of reports emitted so far.
    ///
    /// Useful for monitoring and tests.
    pub fn report_count(&self) -> u64 {
        self.reports.load(Ordering::SeqCst)
    }

    /// Shared handle to the report counter; stays readable after the
    /// monitor itself is joined.
    pub(crate) fn counter(&self) -> Arc<AtomicU64> {
        self.reports.clone()
    }

    /// Waits for the polling task to finish after shutdown was signalled.
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

async fn run_monitor(
    driver: Arc<dyn RelayDriver>,
    topic: String,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    reports: Arc<AtomicU64>,
) {
    let mut ticker = tokio::time::interval(period);
    // A slow tick must never stack concurrent executions.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut retained: Option<NetworkSnapshot> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match observe(driver.as_ref(), &topic).await {
                    Ok(next) => {
                        if snapshot_changed(retained.as_ref(), &next) {
                            reports.fetch_add(1, Ordering::SeqCst);
                            tracing::info!(
                                peer_count = next.peers.len(),
                                subscriber_count = next.subscribers.len(),
                                topic_count = next.topics.len(),
                                peers = ?next.peers,
                                subscribers = ?next.subscribers,
                                topics = ?next.topics,
                                "relay network state changed"
                            );
                            retained = Some(next);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(%e, "network state query failed");
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::debug!("network monitor stopped");
}

async fn observe(driver: &dyn RelayDriver, topic: &str) -> Result<NetworkSnapshot> {
    Ok(NetworkSnapshot {
        peers: driver.peers().await?,
        subscribers: driver.subscribers(topic).await?,
        topics: driver.topics().await?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_observation_counts_as_changed() {
        let next = NetworkSnapshot::default();
        assert!(snapshot_changed(None, &next));
    }

    #[test]
    fn case_and_whitespace_variation_is_not_a_change() {
        let prev = NetworkSnapshot {
            peers: strings(&["12D3KooWAbC"]),
            subscribers: strings(&[" 12d3koowabc "]),
            topics: strings(&["sync-topic"]),
        };
        let next = NetworkSnapshot {
            peers: strings(&[" 12d3KOOWabc "]),
            subscribers: strings(&["12D3KooWAbC"]),
            topics: strings(&["sync-topic"]),
        };
        assert!(!snapshot_changed(Some(&prev), &next));
    }

    #[test]
    fn new_peer_is_a_change() {
        let prev = NetworkSnapshot {
            peers: strings(&["peer-a"]),
            ..NetworkSnapshot::default()
        };
        let next = NetworkSnapshot {
            peers: strings(&["peer-a", "peer-b"]),
            ..NetworkSnapshot::default()
        };
        assert!(snapshot_changed(Some(&prev), &next));
    }

    #[test]
    fn topics_are_compared_exactly() {
        let prev = NetworkSnapshot {
            topics: strings(&["Sync-Topic"]),
            ..NetworkSnapshot::default()
        };
        let next = NetworkSnapshot {
            topics: strings(&["sync-topic"]),
            ..NetworkSnapshot::default()
        };
        // The same case variation that peers absorb is a change for topics.
        assert!(snapshot_changed(Some(&prev), &next));
    }

    #[test]
    fn identical_snapshots_are_quiescent() {
        let snapshot = NetworkSnapshot {
            peers: strings(&["peer-a"]),
            subscribers: strings(&["peer-a"]),
            topics: strings(&["sync-topic"]),
        };
        assert!(!snapshot_changed(Some(&snapshot), &snapshot.clone()));
    }
}
