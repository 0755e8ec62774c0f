use crate::model::Status;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

/// Topic carrying per-widget status notifications from the host.
pub const WIDGET_UPDATE_TOPIC: &str = "pipeline.client.notification";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusUpdate {
    pub widget_ref: String,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: JsonValue,
    #[serde(default)]
    pub host_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFilter {
    pub topic: String,
    pub host_id: String,
}

impl TopicFilter {
    pub fn widget_updates(host_id: impl Into<String>) -> Self {
        Self {
            topic: WIDGET_UPDATE_TOPIC.to_string(),
            host_id: host_id.into(),
        }
    }

    fn matches(&self, topic: &str, host_id: &str) -> bool {
        self.topic == topic && self.host_id == host_id
    }
}

struct Subscriber {
    id: u64,
    filter: TopicFilter,
    tx: Sender<StatusUpdate>,
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

/// In-process fan-out of host notifications. Publishing may happen on any
/// thread; each subscription is drained by its owner on the UI tick.
#[derive(Default)]
pub struct EventHub {
    inner: Mutex<HubInner>,
}

impl EventHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(self: &Arc<Self>, filter: TopicFilter) -> Subscription {
        let (tx, rx) = mpsc::channel();
        let mut id = 0;
        if let Ok(mut inner) = self.inner.lock() {
            id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push(Subscriber { id, filter, tx });
        }
        Subscription {
            id,
            hub: Arc::downgrade(self),
            rx,
        }
    }

    /// Deliver `update` to every live subscriber whose filter matches.
    /// Returns the number of deliveries.
    pub fn publish(&self, topic: &str, update: StatusUpdate) -> usize {
        let Ok(mut inner) = self.inner.lock() else {
            return 0;
        };
        let mut delivered = 0;
        inner.subscribers.retain(|s| {
            if !s.filter.matches(topic, &update.host_id) {
                return true;
            }
            match s.tx.send(update.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        if delivered == 0 {
            debug!(topic, widget_ref = %update.widget_ref, "notification had no subscriber");
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().map(|i| i.subscribers.len()).unwrap_or(0)
    }

    fn unsubscribe(&self, id: u64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.subscribers.retain(|s| s.id != id);
        }
    }
}

/// Live subscription; unsubscribes when dropped.
pub struct Subscription {
    id: u64,
    hub: Weak<EventHub>,
    rx: Receiver<StatusUpdate>,
}

impl Subscription {
    pub fn drain(&self) -> Vec<StatusUpdate> {
        let mut out = Vec::new();
        while let Ok(u) = self.rx.try_recv() {
            out.push(u);
        }
        out
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(widget_ref: &str, host_id: &str) -> StatusUpdate {
        StatusUpdate {
            widget_ref: widget_ref.into(),
            status: Some(Status::Running),
            message: None,
            result: JsonValue::Null,
            host_id: host_id.into(),
        }
    }

    #[test]
    fn delivery_is_scoped_by_host_id_and_ordered() {
        let hub = EventHub::new();
        let sub = hub.subscribe(TopicFilter::widget_updates("h1"));
        hub.publish(WIDGET_UPDATE_TOPIC, update("a", "h1"));
        hub.publish(WIDGET_UPDATE_TOPIC, update("b", "h2"));
        hub.publish("other.topic", update("c", "h1"));
        hub.publish(WIDGET_UPDATE_TOPIC, update("d", "h1"));
        let got: Vec<String> = sub.drain().into_iter().map(|u| u.widget_ref).collect();
        assert_eq!(got, vec!["a".to_string(), "d".to_string()]);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let hub = EventHub::new();
        let sub = hub.subscribe(TopicFilter::widget_updates("h1"));
        assert_eq!(hub.subscriber_count(), 1);
        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.publish(WIDGET_UPDATE_TOPIC, update("a", "h1")), 0);
    }
}
