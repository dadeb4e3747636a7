//! Topic event log
//!
//! Each topic is an independent append-only stream behind its own lock.
//! Timestamps are strictly increasing per topic so that `since`-based
//! polling never skips or repeats an event.

use blackroad_core::{
    expiry_from_ttl, new_entity_id, AgentId, Clock, EntityId, Event, EventSink, PlatformConfig,
    PlatformError, PlatformResult, StorageError, TimestampMs, ValidationError, Value,
};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

static TOPIC_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._:/-]+$").expect("Invalid topic regex"));

/// Reject empty, over-long or oddly spelled topic names.
pub fn validate_topic(topic: &str, max_len: usize) -> PlatformResult<()> {
    let reason = if topic.is_empty() {
        "topic must not be empty"
    } else if topic.len() > max_len {
        "topic exceeds max_topic_length"
    } else if !TOPIC_PATTERN.is_match(topic) {
        "topic may only contain letters, digits and . _ : / -"
    } else {
        return Ok(());
    };
    Err(ValidationError::InvalidTopic {
        topic: topic.to_string(),
        reason: reason.to_string(),
    }
    .into())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub published: bool,
    pub event_id: EntityId,
    pub topic: String,
    pub timestamp: TimestampMs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub topic: String,
    pub events: Vec<Event>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicList {
    pub topics: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Default)]
struct TopicLog {
    /// Ascending by timestamp.
    events: Vec<Event>,
    last_timestamp: TimestampMs,
}

impl TopicLog {
    fn next_timestamp(&mut self, now: TimestampMs) -> TimestampMs {
        let ts = now.max(self.last_timestamp + 1);
        self.last_timestamp = ts;
        ts
    }

    fn has_live(&self, now: TimestampMs) -> bool {
        self.events.iter().any(|e| e.is_live(now))
    }
}

fn poisoned<T>(_: T) -> PlatformError {
    PlatformError::Storage(StorageError::LockPoisoned)
}

/// Append-only publish/subscribe log. Holds no per-subscriber state.
#[derive(Debug)]
pub struct EventLog {
    topics: DashMap<String, Arc<RwLock<TopicLog>>>,
    clock: Arc<dyn Clock>,
    config: PlatformConfig,
}

impl EventLog {
    pub fn new(clock: Arc<dyn Clock>, config: PlatformConfig) -> Self {
        Self {
            topics: DashMap::new(),
            clock,
            config,
        }
    }

    fn log(&self, topic: &str) -> Option<Arc<RwLock<TopicLog>>> {
        self.topics.get(topic).map(|l| Arc::clone(l.value()))
    }

    pub fn publish(
        &self,
        source_agent: &AgentId,
        topic: &str,
        event_type: &str,
        payload: Value,
        ttl_secs: Option<i64>,
    ) -> PlatformResult<PublishOutcome> {
        validate_topic(topic, self.config.max_topic_length)?;
        if event_type.trim().is_empty() {
            return Err(PlatformError::missing_field("type"));
        }

        let log = Arc::clone(&self.topics.entry(topic.to_string()).or_default());
        let mut log = log.write().map_err(poisoned)?;
        let timestamp = log.next_timestamp(self.clock.now_ms());
        let event = Event {
            id: new_entity_id(),
            topic: topic.to_string(),
            event_type: event_type.to_string(),
            payload,
            source_agent: source_agent.clone(),
            timestamp,
            expires_at: expiry_from_ttl(timestamp, ttl_secs),
        };
        let event_id = event.id;
        log.events.push(event);
        drop(log);

        tracing::debug!(topic, event_type, event_id = %event_id, timestamp, "event published");
        Ok(PublishOutcome {
            published: true,
            event_id,
            topic: topic.to_string(),
            timestamp,
        })
    }

    /// Live events strictly after `since`, ascending, at most `limit`.
    /// An unknown topic yields an empty page.
    pub fn subscribe(
        &self,
        topic: &str,
        since: Option<TimestampMs>,
        limit: Option<usize>,
    ) -> PlatformResult<Subscription> {
        validate_topic(topic, self.config.max_topic_length)?;
        let limit = self
            .config
            .page_limit(limit, self.config.default_subscribe_limit);
        let now = self.clock.now_ms();

        let events = match self.log(topic) {
            Some(log) => {
                let log = log.read().map_err(poisoned)?;
                let start = since.map_or(0, |since| {
                    log.events.partition_point(|e| e.timestamp <= since)
                });
                log.events[start..]
                    .iter()
                    .filter(|e| e.is_live(now))
                    .take(limit)
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        };

        tracing::debug!(topic, since, count = events.len(), "events polled");
        Ok(Subscription {
            topic: topic.to_string(),
            count: events.len(),
            events,
        })
    }

    /// Topics with at least one live event, sorted by name.
    pub fn get_topics(&self) -> PlatformResult<TopicList> {
        let now = self.clock.now_ms();
        let logs: Vec<(String, Arc<RwLock<TopicLog>>)> = self
            .topics
            .iter()
            .map(|l| (l.key().clone(), Arc::clone(l.value())))
            .collect();

        let mut topics = Vec::new();
        for (topic, log) in logs {
            if log.read().map_err(poisoned)?.has_live(now) {
                topics.push(topic);
            }
        }
        topics.sort();
        Ok(TopicList {
            count: topics.len(),
            topics,
        })
    }

    /// Drop expired events. Returns how many were removed.
    pub fn sweep_expired(&self) -> PlatformResult<usize> {
        let now = self.clock.now_ms();
        let logs: Vec<Arc<RwLock<TopicLog>>> =
            self.topics.iter().map(|l| Arc::clone(l.value())).collect();

        let mut removed = 0;
        for log in logs {
            let mut log = log.write().map_err(poisoned)?;
            let before = log.events.len();
            log.events.retain(|e| e.is_live(now));
            removed += before - log.events.len();
        }
        if removed > 0 {
            tracing::info!(removed, "expired events swept");
        }
        Ok(removed)
    }
}

impl EventSink for EventLog {
    fn emit(
        &self,
        topic: &str,
        event_type: &str,
        payload: Value,
        source_agent: &AgentId,
    ) -> PlatformResult<EntityId> {
        self.publish(source_agent, topic, event_type, payload, None)
            .map(|outcome| outcome.event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blackroad_core::{ErrorKind, ManualClock};

    fn log_at(start: i64) -> (EventLog, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        (EventLog::new(clock.clone(), PlatformConfig::default()), clock)
    }

    fn agent() -> AgentId {
        AgentId::new("agent-1")
    }

    #[test]
    fn test_subscribe_since_is_exclusive_and_ascending() {
        let (log, clock) = log_at(0);
        for ts in 1..=3 {
            clock.set(ts);
            log.publish(&agent(), "t", "tick", Value::from(ts), None).unwrap();
        }

        let page = log.subscribe("t", Some(1), None).unwrap();
        let stamps: Vec<_> = page.events.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![2, 3]);
        assert_eq!(page.count, 2);
        assert_eq!(page.topic, "t");
    }

    #[test]
    fn test_timestamps_strictly_increase_per_topic() {
        let (log, _clock) = log_at(100);
        let a = log.publish(&agent(), "t", "x", Value::Null, None).unwrap();
        let b = log.publish(&agent(), "t", "x", Value::Null, None).unwrap();
        let other = log.publish(&agent(), "u", "x", Value::Null, None).unwrap();
        assert_eq!(a.timestamp, 100);
        assert_eq!(b.timestamp, 101);
        assert_eq!(other.timestamp, 100);

        let page = log.subscribe("t", Some(a.timestamp), None).unwrap();
        assert_eq!(page.events.len(), 1);
        assert_eq!(page.events[0].id, b.event_id);
    }

    #[test]
    fn test_limit_and_cursor_pagination() {
        let (log, clock) = log_at(0);
        for i in 0..5 {
            clock.advance(10);
            log.publish(&agent(), "t", "x", Value::from(i as i64), None).unwrap();
        }
        let first = log.subscribe("t", None, Some(2)).unwrap();
        assert_eq!(first.count, 2);
        let cursor = first.events.last().map(|e| e.timestamp);
        let second = log.subscribe("t", cursor, Some(10)).unwrap();
        assert_eq!(second.count, 3);
        assert!(log.subscribe("t", None, Some(0)).unwrap().events.is_empty());
    }

    #[test]
    fn test_unknown_topic_is_empty() {
        let (log, _clock) = log_at(0);
        let page = log.subscribe("nobody.home", None, None).unwrap();
        assert!(page.events.is_empty());
    }

    #[test]
    fn test_topic_validation() {
        let (log, _clock) = log_at(0);
        let long = "x".repeat(257);
        for bad in ["", "has space", "emoji🙂", long.as_str()] {
            let err = log.publish(&agent(), bad, "x", Value::Null, None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert!(log
            .publish(&agent(), "agents/alpha:inbox-1.v2_x", "x", Value::Null, None)
            .is_ok());
        assert!(log.publish(&agent(), "t", " ", Value::Null, None).is_err());
    }

    #[test]
    fn test_ttl_expiry_hides_and_sweeps() {
        let (log, clock) = log_at(1_000);
        log.publish(&agent(), "short", "x", Value::Null, Some(1)).unwrap();
        log.publish(&agent(), "long", "x", Value::Null, None).unwrap();
        assert_eq!(log.get_topics().unwrap().topics, vec!["long", "short"]);

        clock.advance(1_000);
        assert!(log.subscribe("short", None, None).unwrap().events.is_empty());
        let topics = log.get_topics().unwrap();
        assert_eq!(topics.topics, vec!["long"]);
        assert_eq!(topics.count, 1);

        assert_eq!(log.sweep_expired().unwrap(), 1);
        assert_eq!(log.sweep_expired().unwrap(), 0);
    }

    #[test]
    fn test_event_sink_publishes() {
        let (log, _clock) = log_at(5);
        let sink: &dyn EventSink = &log;
        let id = sink
            .emit("reasoning.quarantine", "quarantine_opened", Value::Null, &agent())
            .unwrap();
        let page = log.subscribe("reasoning.quarantine", None, None).unwrap();
        assert_eq!(page.events[0].id, id);
        assert_eq!(page.events[0].event_type, "quarantine_opened");
        assert_eq!(page.events[0].source_agent, agent());
    }

    #[test]
    fn test_concurrent_publish_keeps_order_and_count() {
        let (log, _clock) = log_at(0);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..25 {
                        log.publish(&agent(), "busy", "x", Value::Null, None).unwrap();
                    }
                });
            }
        });
        let page = log.subscribe("busy", None, None).unwrap();
        assert_eq!(page.count, 100);
        assert!(page.events.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }
}
