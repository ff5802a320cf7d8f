use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Fresh per publish, surfaced to clients as `message-id`.
    pub id: String,
    pub topic: String,
    pub payload: String,
}

pub struct Broker {
    topics: DashMap<String, broadcast::Sender<Arc<Envelope>>>,
    buffer_size: usize,
}

impl Broker {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            topics: DashMap::new(),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Returns how many subscribers the envelope was handed to.
    pub fn publish(&self, topic: &str, payload: String) -> usize {
        let Some(tx) = self.topics.get(topic).map(|t| t.clone()) else {
            tracing::trace!(topic, "No subscribers, dropping");
            return 0;
        };

        let envelope = Arc::new(Envelope {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.to_string(),
            payload,
        });
        // send() only fails when every receiver is gone
        tx.send(envelope).unwrap_or(0)
    }

    /// The receiver is created under the entry lock so a concurrent
    /// [`prune`](Self::prune) cannot drop the topic in between.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Arc<Envelope>> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer_size).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|t| t.receiver_count())
            .unwrap_or(0)
    }

    pub fn prune(&self, topic: &str) {
        self.topics.remove_if(topic, |_, tx| tx.receiver_count() == 0);
    }
}
