// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::Labels;

const SHARD_COUNT: usize = 16;

/// How long an idle entry survives before eviction.
const DEFAULT_IDLE_TIMEOUT_MS: i64 = 10 * 60 * 1_000;

/// How many observations between eviction sweeps of a shard.
const SWEEP_INTERVAL: u64 = 1_024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WindowKey {
    name: Box<str>,
    labels: Labels,
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    value: f64,
    timestamp: i64,
    last_access: i64,
}

/// Result of feeding one observation into the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowObservation {
    /// No previous observation for this key; nothing to compute yet.
    First,
    /// The observation is at or before the retained timestamp. It is
    /// discarded and the diagnostic counter incremented.
    OutOfOrder,
    /// The previous observation is older than the lookback window, so the
    /// key re-primed with the current observation.
    Expired,
    /// A usable pair of observations.
    Pair { prev_value: f64, prev_timestamp: i64 },
}

/// Process-wide cache of the last observation per `(metricName, labels)`
/// key, backing `rate`, `increase`, and `irate`. Updates are atomic per key
/// (one lock per shard); idle entries are evicted after a configured idle
/// interval.
pub struct CounterWindow {
    shards: Vec<Mutex<HashMap<WindowKey, WindowEntry>>>,
    idle_timeout_ms: i64,
    observations: AtomicU64,
    out_of_order_drops: AtomicU64,
}

impl CounterWindow {
    pub fn new() -> CounterWindow {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT_MS)
    }

    pub fn with_idle_timeout(idle_timeout_ms: i64) -> CounterWindow {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
            idle_timeout_ms,
            observations: AtomicU64::new(0),
            out_of_order_drops: AtomicU64::new(0),
        }
    }

    /// Feed one observation and return what was previously retained. The
    /// retained entry is replaced unless the observation is out of order.
    pub fn observe(
        &self,
        name: &str,
        labels: &Labels,
        value: f64,
        timestamp: i64,
        window_ms: i64,
    ) -> WindowObservation {
        let key = WindowKey {
            name: name.into(),
            labels: labels.clone(),
        };

        let shard = &self.shards[Self::shard_index(&key)];
        let mut entries = shard.lock();

        let result = match entries.get(&key) {
            None => {
                entries.insert(
                    key,
                    WindowEntry {
                        value,
                        timestamp,
                        last_access: timestamp,
                    },
                );
                WindowObservation::First
            }
            Some(previous) if timestamp <= previous.timestamp => {
                self.out_of_order_drops.fetch_add(1, Ordering::Relaxed);
                WindowObservation::OutOfOrder
            }
            Some(previous) if window_ms > 0 && timestamp - previous.timestamp > window_ms => {
                entries.insert(
                    key,
                    WindowEntry {
                        value,
                        timestamp,
                        last_access: timestamp,
                    },
                );
                WindowObservation::Expired
            }
            Some(previous) => {
                let observation = WindowObservation::Pair {
                    prev_value: previous.value,
                    prev_timestamp: previous.timestamp,
                };
                entries.insert(
                    key,
                    WindowEntry {
                        value,
                        timestamp,
                        last_access: timestamp,
                    },
                );
                observation
            }
        };

        drop(entries);

        if self.observations.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == 0 {
            self.sweep(timestamp);
        }

        result
    }

    /// Evict entries idle for longer than the idle timeout, measured against
    /// the given clock value.
    pub fn sweep(&self, now: i64) {
        let idle_cutoff = now - self.idle_timeout_ms;
        for shard in &self.shards {
            shard.lock().retain(|_, entry| entry.last_access >= idle_cutoff);
        }
    }

    pub fn get_out_of_order_drops(&self) -> u64 {
        self.out_of_order_drops.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    fn shard_index(key: &WindowKey) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % SHARD_COUNT
    }
}

impl Default for CounterWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// The window shared by every expression in the process. Tests that need
/// isolation suffix the metric name with a free-form discriminator instead
/// of replacing the window.
pub fn global_counter_window() -> &'static CounterWindow {
    static WINDOW: Lazy<CounterWindow> = Lazy::new(CounterWindow::new);
    &WINDOW
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::test_support::labels;

    #[test]
    fn test_first_then_pair() {
        let window = CounterWindow::new();
        let tags = labels(&[("host", "a")]);

        assert_eq!(
            WindowObservation::First,
            window.observe("m", &tags, 10.0, 0, 60_000)
        );
        assert_eq!(
            WindowObservation::Pair {
                prev_value: 10.0,
                prev_timestamp: 0
            },
            window.observe("m", &tags, 15.0, 30_000, 60_000)
        );
    }

    #[test]
    fn test_out_of_order_is_dropped_and_counted() {
        let window = CounterWindow::new();
        let tags = labels(&[("host", "a")]);

        window.observe("m", &tags, 10.0, 1_000, 60_000);
        assert_eq!(
            WindowObservation::OutOfOrder,
            window.observe("m", &tags, 11.0, 500, 60_000)
        );
        assert_eq!(1, window.get_out_of_order_drops());

        // The retained observation is unchanged.
        assert_eq!(
            WindowObservation::Pair {
                prev_value: 10.0,
                prev_timestamp: 1_000
            },
            window.observe("m", &tags, 12.0, 2_000, 60_000)
        );
    }

    #[test]
    fn test_lookback_expiry_reprimes() {
        let window = CounterWindow::new();
        let tags = labels(&[("host", "a")]);

        window.observe("m", &tags, 10.0, 0, 60_000);
        assert_eq!(
            WindowObservation::Expired,
            window.observe("m", &tags, 50.0, 120_000, 60_000)
        );
        assert_eq!(
            WindowObservation::Pair {
                prev_value: 50.0,
                prev_timestamp: 120_000
            },
            window.observe("m", &tags, 60.0, 150_000, 60_000)
        );
    }

    #[test]
    fn test_idle_entries_are_evicted_on_sweep() {
        let window = CounterWindow::with_idle_timeout(1_000);

        window.observe("stale", &labels(&[("host", "a")]), 1.0, 0, 0);
        assert_eq!(1, window.len());

        // Sweeps run every SWEEP_INTERVAL observations; drive one key far
        // past the idle timeout until a sweep lands on its shard.
        for i in 0..=SWEEP_INTERVAL {
            window.observe(
                "fresh",
                &labels(&[("host", "b")]),
                i as f64,
                1_000_000 + i as i64,
                0,
            );
        }

        assert_eq!(1, window.len());
    }
}
