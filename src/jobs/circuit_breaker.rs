use crate::clock::Clock;
use crate::server::metrics;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure_at: Option<DateTime<Utc>>,
    is_open: bool,
}

/// Point-in-time view of one shop's breaker, for status endpoints.
#[derive(Debug, Clone)]
pub struct BreakerSnapshot {
    pub failure_count: u32,
    pub is_open: bool,
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// Per-shop circuit breakers over consecutive job failures.
///
/// A breaker opens after `threshold` consecutive failures and half-closes
/// lazily: the first `is_open` query after the reset window has passed since
/// the last failure resets the breaker and lets submissions through again.
/// Failures recorded while open, such as a long job settling late, re-arm
/// the window.
pub struct CircuitBreakerRegistry {
    states: Mutex<HashMap<String, BreakerState>>,
    threshold: u32,
    reset_window: Duration,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerRegistry {
    pub fn new(threshold: u32, reset_window_secs: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            threshold,
            reset_window: Duration::seconds(reset_window_secs),
            clock,
        }
    }

    /// Whether submissions for the shop should be refused right now.
    pub fn is_open(&self, shop_id: &str) -> bool {
        let mut states = self.states.lock().unwrap();
        let Some(state) = states.get_mut(shop_id) else {
            return false;
        };
        if !state.is_open {
            return false;
        }
        let window_elapsed = match state.last_failure_at {
            Some(at) => self.clock.now() - at >= self.reset_window,
            None => true,
        };
        if window_elapsed {
            info!(
                "Circuit breaker for shop {} half-closed after reset window",
                shop_id
            );
            *state = BreakerState::default();
            return false;
        }
        true
    }

    /// Record how a finished job went. A success fully closes the breaker;
    /// a failure counts toward the threshold and re-arms the reset window.
    pub fn record_outcome(&self, shop_id: &str, success: bool) {
        let mut states = self.states.lock().unwrap();
        let state = states.entry(shop_id.to_string()).or_default();

        if success {
            if state.failure_count > 0 || state.is_open {
                info!("Circuit breaker for shop {} closed after success", shop_id);
            }
            *state = BreakerState::default();
            return;
        }

        state.failure_count += 1;
        state.last_failure_at = Some(self.clock.now());
        if !state.is_open && state.failure_count >= self.threshold {
            state.is_open = true;
            warn!(
                "Circuit breaker for shop {} opened after {} consecutive failures",
                shop_id, state.failure_count
            );
            metrics::record_breaker_trip();
        }
    }

    pub fn snapshot(&self, shop_id: &str) -> Option<BreakerSnapshot> {
        let states = self.states.lock().unwrap();
        states.get(shop_id).map(|state| BreakerSnapshot {
            failure_count: state.failure_count,
            is_open: state.is_open,
            last_failure_at: state.last_failure_at,
        })
    }
}
