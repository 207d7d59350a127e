//! Fixed-window request admission control.
//!
//! Two independent limiter scopes: a global scope over all traffic and
//! a tighter scope for the search route. Buckets are keyed by
//! `(request key, scope)`; idle buckets are swept periodically to
//! reclaim memory.
//!
//! Thread-safe via `std::sync::Mutex` — no external crate required.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Scopes & config
// ---------------------------------------------------------------------------

/// Limiter scope of a request.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RouteClass {
    /// Applied to all traffic.
    Global,
    /// Applied to search queries on top of the global scope.
    Search,
}

/// Admission limits. Each scope counts within the same window length.
#[derive(Clone, Copy, Debug)]
pub struct AdmissionConfig {
    /// Requests per window per key, global scope.
    pub global_limit: u32,
    /// Requests per window per key, search scope.
    pub search_limit: u32,
    /// Fixed window length.
    pub window: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            global_limit: 300,
            search_limit: 15,
            window: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Outcome of an admission check.
///
/// Rejection is a defined, expected outcome with its own response
/// contract — not an error in the dispatch taxonomy.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Admission {
    Allowed,
    Rejected {
        /// Fixed machine-readable status.
        status: u16,
        /// Scope-distinguishing human-readable message.
        message: String,
        /// Seconds until the window resets.
        retry_after_secs: u64,
    },
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Per-key counter with a window start timestamp.
struct RateLimitBucket {
    window_start: Instant,
    count: u32,
}

struct AdmissionInner {
    buckets: HashMap<(String, RouteClass), RateLimitBucket>,
    last_sweep: Instant,
}

/// Fixed-window request-rate limiter over all entry points.
pub struct AdmissionController {
    config: AdmissionConfig,
    inner: Mutex<AdmissionInner>,
}

impl AdmissionController {
    /// Creates a controller with the given limits.
    pub fn new(config: AdmissionConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(AdmissionInner {
                buckets: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Checks one request against one scope and counts it.
    ///
    /// Mutates only the bucket for the matched key; runs before any
    /// dispatch work and knows nothing about message contents.
    pub fn admit(&self, key: &str, class: RouteClass) -> Admission {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            // A poisoned limiter fails closed.
            Err(_) => {
                return Admission::Rejected {
                    status: 429,
                    message: rejection_message(class),
                    retry_after_secs: self.config.window.as_secs(),
                }
            }
        };

        let now = Instant::now();
        self.maybe_sweep(&mut inner, now);

        let limit = match class {
            RouteClass::Global => self.config.global_limit,
            RouteClass::Search => self.config.search_limit,
        };
        let window = self.config.window;

        let bucket = inner
            .buckets
            .entry((key.to_string(), class))
            .or_insert(RateLimitBucket {
                window_start: now,
                count: 0,
            });

        // Window rollover resets the counter.
        if now.duration_since(bucket.window_start) >= window {
            bucket.window_start = now;
            bucket.count = 0;
        }

        bucket.count += 1;
        if bucket.count > limit {
            let elapsed = now.duration_since(bucket.window_start);
            return Admission::Rejected {
                status: 429,
                message: rejection_message(class),
                retry_after_secs: window.saturating_sub(elapsed).as_secs().max(1),
            };
        }

        Admission::Allowed
    }

    /// Removes buckets whose window elapsed, so inactive keys do not
    /// accumulate.
    fn maybe_sweep(&self, inner: &mut AdmissionInner, now: Instant) {
        let window = self.config.window;
        if now.duration_since(inner.last_sweep) < window {
            return;
        }
        inner.last_sweep = now;
        inner
            .buckets
            .retain(|_, bucket| now.duration_since(bucket.window_start) < window);
    }

    /// Number of currently tracked buckets.
    ///
    /// Useful for monitoring and tests.
    pub fn tracked_buckets(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.buckets.len())
            .unwrap_or(0)
    }
}

fn rejection_message(class: RouteClass) -> String {
    match class {
        RouteClass::Global => "Too many requests, please try again later!".to_string(),
        RouteClass::Search => {
            "Too many requests, please try again later!(searching)".to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_limit_rejects_request_301() {
        let controller = AdmissionController::new(AdmissionConfig::default());

        for _ in 0..300 {
            assert_eq!(controller.admit("10.0.0.1", RouteClass::Global), Admission::Allowed);
        }

        match controller.admit("10.0.0.1", RouteClass::Global) {
            Admission::Rejected { status, message, .. } => {
                assert_eq!(status, 429);
                assert!(message.contains("Too many requests"));
                assert!(!message.contains("searching"));
            }
            Admission::Allowed => panic!("request 301 must be rejected"),
        }
    }

    #[test]
    fn keys_do_not_interact() {
        let controller = AdmissionController::new(AdmissionConfig {
            global_limit: 2,
            ..AdmissionConfig::default()
        });

        assert_eq!(controller.admit("a", RouteClass::Global), Admission::Allowed);
        assert_eq!(controller.admit("a", RouteClass::Global), Admission::Allowed);
        assert_ne!(controller.admit("a", RouteClass::Global), Admission::Allowed);

        // A different key still has its full budget.
        assert_eq!(controller.admit("b", RouteClass::Global), Admission::Allowed);
    }

    #[test]
    fn scopes_are_independent() {
        let controller = AdmissionController::new(AdmissionConfig::default());

        // Exhaust the search scope.
        for _ in 0..15 {
            assert_eq!(controller.admit("ip", RouteClass::Search), Admission::Allowed);
        }
        match controller.admit("ip", RouteClass::Search) {
            Admission::Rejected { message, .. } => {
                assert!(message.contains("(searching)"));
            }
            Admission::Allowed => panic!("search request 16 must be rejected"),
        }

        // The global scope never saw those increments.
        for _ in 0..300 {
            assert_eq!(controller.admit("ip", RouteClass::Global), Admission::Allowed);
        }
    }

    #[test]
    fn window_rollover_resets_the_counter() {
        let controller = AdmissionController::new(AdmissionConfig {
            global_limit: 2,
            search_limit: 1,
            window: Duration::from_millis(40),
        });

        assert_eq!(controller.admit("ip", RouteClass::Global), Admission::Allowed);
        assert_eq!(controller.admit("ip", RouteClass::Global), Admission::Allowed);
        assert_ne!(controller.admit("ip", RouteClass::Global), Admission::Allowed);

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(controller.admit("ip", RouteClass::Global), Admission::Allowed);
    }

    #[test]
    fn idle_buckets_are_reclaimed() {
        let controller = AdmissionController::new(AdmissionConfig {
            global_limit: 10,
            search_limit: 10,
            window: Duration::from_millis(30),
        });

        controller.admit("gone", RouteClass::Global);
        assert_eq!(controller.tracked_buckets(), 1);

        std::thread::sleep(Duration::from_millis(60));
        // The next admission triggers the sweep.
        controller.admit("fresh", RouteClass::Global);
        assert_eq!(controller.tracked_buckets(), 1);
    }
}
