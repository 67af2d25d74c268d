//! Per-channel receive statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use studio_ipc::{Channel, ChannelStats};

#[derive(Default)]
struct ChannelCounters {
    messages: AtomicU64,
    decode_failures: AtomicU64,
    reconnects: AtomicU64,
    failures: AtomicU64,
    last_message: RwLock<Option<Instant>>,
}

/// Collects counters for every streaming channel.
#[derive(Default)]
pub struct StatsCollector {
    channels: [ChannelCounters; 4],
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a payload received on `channel`.
    pub fn record_message(&self, channel: Channel) {
        let counters = self.counters(channel);
        counters.messages.fetch_add(1, Ordering::Relaxed);
        *counters.last_message.write() = Some(Instant::now());
    }

    /// Record a payload that could not be decoded.
    pub fn record_decode_failure(&self, channel: Channel) {
        self.counters(channel)
            .decode_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self, channel: Channel) {
        self.counters(channel)
            .reconnects
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, channel: Channel) {
        self.counters(channel).failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counters, one entry per channel in startup order.
    pub fn snapshot(&self) -> Vec<ChannelStats> {
        let now = Instant::now();
        Channel::ALL
            .into_iter()
            .map(|channel| {
                let counters = self.counters(channel);
                ChannelStats {
                    channel,
                    messages: counters.messages.load(Ordering::Relaxed),
                    decode_failures: counters.decode_failures.load(Ordering::Relaxed),
                    reconnects: counters.reconnects.load(Ordering::Relaxed),
                    failures: counters.failures.load(Ordering::Relaxed),
                    last_message_age_ms: counters
                        .last_message
                        .read()
                        .map(|at| now.duration_since(at).as_millis() as u64),
                }
            })
            .collect()
    }

    /// Zero every counter. Called when a new session opens.
    pub fn reset(&self) {
        for counters in &self.channels {
            counters.messages.store(0, Ordering::Relaxed);
            counters.decode_failures.store(0, Ordering::Relaxed);
            counters.reconnects.store(0, Ordering::Relaxed);
            counters.failures.store(0, Ordering::Relaxed);
            *counters.last_message.write() = None;
        }
    }

    fn counters(&self, channel: Channel) -> &ChannelCounters {
        &self.channels[channel as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_per_channel() {
        let stats = StatsCollector::new();
        stats.record_message(Channel::Meters);
        stats.record_message(Channel::Meters);
        stats.record_decode_failure(Channel::Devices);
        stats.record_reconnect(Channel::Server);

        let snapshot = stats.snapshot();

        assert_eq!(snapshot.len(), 4);
        let meters = &snapshot[Channel::Meters as usize];
        assert_eq!(meters.channel, Channel::Meters);
        assert_eq!(meters.messages, 2);
        assert!(meters.last_message_age_ms.is_some());
        assert_eq!(snapshot[Channel::Devices as usize].decode_failures, 1);
        assert_eq!(snapshot[Channel::Server as usize].reconnects, 1);
        assert_eq!(snapshot[Channel::Subscriptions as usize].messages, 0);
        assert_eq!(snapshot[Channel::Subscriptions as usize].last_message_age_ms, None);
    }

    #[test]
    fn test_reset() {
        let stats = StatsCollector::new();
        stats.record_message(Channel::Server);
        stats.record_failure(Channel::Server);

        stats.reset();

        assert!(stats
            .snapshot()
            .iter()
            .all(|s| s.messages == 0 && s.failures == 0 && s.last_message_age_ms.is_none()));
    }
}
