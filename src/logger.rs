//! Filtered pub/sub event bus with a bounded ring buffer.
//!
//! Every noteworthy engine action (link change, dropped frame, DHCP
//! transition, CLI error) is published here as a structured event.
//! Subscribers register a filter and are invoked synchronously from the
//! publishing thread of control; the ring buffer retains the most recent
//! events for after-the-fact inspection. Each event is also mirrored to
//! `tracing` at the same level so normal console logging keeps working.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::config;

/// Severity of a bus event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One structured event on the bus.
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    /// Virtual-clock timestamp at publication.
    pub timestamp_ms: u64,
    pub level: LogLevel,
    /// Identity of the publishing equipment (name or id string).
    pub source: String,
    /// Dotted namespace, e.g. `port.link-down` or `dhcp.client.bound`.
    pub event: String,
    pub message: String,
    /// Optional key-value payload.
    pub data: Vec<(String, String)>,
}

/// Subscriber-side filter. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Exact source match.
    pub source: Option<String>,
    /// Event namespace prefix, e.g. `dhcp.` matches `dhcp.client.bound`.
    pub event_prefix: Option<String>,
    /// Minimum severity.
    pub min_level: Option<LogLevel>,
}

impl EventFilter {
    pub fn matches(&self, event: &LogEvent) -> bool {
        if let Some(src) = &self.source {
            if *src != event.source {
                return false;
            }
        }
        if let Some(prefix) = &self.event_prefix {
            if !event.event.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(min) = self.min_level {
            if event.level < min {
                return false;
            }
        }
        true
    }
}

type Sink = Box<dyn Fn(&LogEvent) + Send + Sync>;

struct Subscriber {
    filter: EventFilter,
    sink: Sink,
}

/// The process-wide observability bus, threaded into every equipment at
/// construction (no hidden singleton).
pub struct EventBus {
    subscribers: DashMap<u64, Subscriber>,
    next_token: AtomicU64,
    ring: Mutex<VecDeque<LogEvent>>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(config::LOG_RING_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            next_token: AtomicU64::new(1),
            ring: Mutex::new(VecDeque::new()),
            capacity: capacity.max(2),
        }
    }

    /// Register a subscriber. Returns an unsubscribe token.
    pub fn subscribe<F>(&self, filter: EventFilter, sink: F) -> u64
    where
        F: Fn(&LogEvent) + Send + Sync + 'static,
    {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(
            token,
            Subscriber {
                filter,
                sink: Box::new(sink),
            },
        );
        token
    }

    /// Drop a subscriber by token. Returns whether it existed.
    pub fn unsubscribe(&self, token: u64) -> bool {
        self.subscribers.remove(&token).is_some()
    }

    /// Publish an event: retain it in the ring, mirror it to `tracing`, and
    /// invoke every matching subscriber synchronously.
    pub fn publish(&self, event: LogEvent) {
        match event.level {
            LogLevel::Debug => {
                tracing::debug!(source = %event.source, event = %event.event, "{}", event.message)
            }
            LogLevel::Info => {
                tracing::info!(source = %event.source, event = %event.event, "{}", event.message)
            }
            LogLevel::Warn => {
                tracing::warn!(source = %event.source, event = %event.event, "{}", event.message)
            }
            LogLevel::Error => {
                tracing::error!(source = %event.source, event = %event.event, "{}", event.message)
            }
        }

        {
            let mut ring = self.ring.lock().unwrap();
            if ring.len() >= self.capacity {
                // Halve by discarding the oldest half.
                let drop = ring.len() / 2;
                ring.drain(..drop);
            }
            ring.push_back(event.clone());
        }

        for entry in self.subscribers.iter() {
            if entry.filter.matches(&event) {
                (entry.sink)(&event);
            }
        }
    }

    /// Most recent `n` events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<LogEvent> {
        let ring = self.ring.lock().unwrap();
        let skip = ring.len().saturating_sub(n);
        ring.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ring.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn event(level: LogLevel, source: &str, name: &str) -> LogEvent {
        LogEvent {
            timestamp_ms: 0,
            level,
            source: source.into(),
            event: name.into(),
            message: format!("{name} happened"),
            data: Vec::new(),
        }
    }

    #[test]
    fn test_subscriber_receives_matching_events() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = Arc::clone(&seen);
        bus.subscribe(EventFilter::default(), move |_| {
            seen2.fetch_add(1, Ordering::Relaxed);
        });

        bus.publish(event(LogLevel::Info, "sw1", "port.link-up"));
        bus.publish(event(LogLevel::Warn, "sw1", "switch.mac-move"));
        assert_eq!(seen.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_source_filter_is_exact() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = Arc::clone(&seen);
        bus.subscribe(
            EventFilter {
                source: Some("sw1".into()),
                ..Default::default()
            },
            move |_| {
                seen2.fetch_add(1, Ordering::Relaxed);
            },
        );

        bus.publish(event(LogLevel::Info, "sw1", "a"));
        bus.publish(event(LogLevel::Info, "sw10", "a"));
        assert_eq!(seen.load(Ordering::Relaxed), 1, "sw10 must not match sw1");
    }

    #[test]
    fn test_event_prefix_filter() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = Arc::clone(&seen);
        bus.subscribe(
            EventFilter {
                event_prefix: Some("dhcp.".into()),
                ..Default::default()
            },
            move |_| {
                seen2.fetch_add(1, Ordering::Relaxed);
            },
        );

        bus.publish(event(LogLevel::Info, "h1", "dhcp.client.bound"));
        bus.publish(event(LogLevel::Info, "h1", "port.link-up"));
        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_min_level_filter() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = Arc::clone(&seen);
        bus.subscribe(
            EventFilter {
                min_level: Some(LogLevel::Warn),
                ..Default::default()
            },
            move |_| {
                seen2.fetch_add(1, Ordering::Relaxed);
            },
        );

        bus.publish(event(LogLevel::Debug, "x", "a"));
        bus.publish(event(LogLevel::Info, "x", "b"));
        bus.publish(event(LogLevel::Warn, "x", "c"));
        bus.publish(event(LogLevel::Error, "x", "d"));
        assert_eq!(seen.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = Arc::clone(&seen);
        let token = bus.subscribe(EventFilter::default(), move |_| {
            seen2.fetch_add(1, Ordering::Relaxed);
        });

        bus.publish(event(LogLevel::Info, "x", "a"));
        assert!(bus.unsubscribe(token));
        bus.publish(event(LogLevel::Info, "x", "b"));
        assert_eq!(seen.load(Ordering::Relaxed), 1);
        assert!(!bus.unsubscribe(token), "token is single-use");
    }

    #[test]
    fn test_ring_halves_on_overflow() {
        let bus = EventBus::with_capacity(8);
        for i in 0..9 {
            bus.publish(event(LogLevel::Info, "x", &format!("e{i}")));
        }
        // At the 9th publish the ring held 8, halved to 4, then appended.
        assert_eq!(bus.len(), 5);
        let recent = bus.recent(100);
        assert_eq!(recent.last().unwrap().event, "e8", "newest survives");
        assert_eq!(recent.first().unwrap().event, "e4", "oldest half discarded");
    }

    #[test]
    fn test_recent_returns_newest_in_order() {
        let bus = EventBus::new();
        for i in 0..5 {
            bus.publish(event(LogLevel::Info, "x", &format!("e{i}")));
        }
        let last_two: Vec<String> = bus.recent(2).into_iter().map(|e| e.event).collect();
        assert_eq!(last_two, vec!["e3".to_string(), "e4".to_string()]);
    }
}
