mod forward;

use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::broker::Broker;
use crate::error::{ChatError, ChatResult};
use crate::ws::frame::Frame;

pub type ClientId = u64;

pub struct Subscription {
    pub room_id: String,
    pub topic: String,
    forwarder: JoinHandle<()>,
}

pub struct ConnectedClient {
    pub user_id: Option<String>,
    pub tx: mpsc::UnboundedSender<String>,
    pub subscriptions: HashMap<String, Subscription>,
}

pub struct GatewayState {
    next_id: RwLock<u64>,
    pub clients: RwLock<HashMap<ClientId, ConnectedClient>>,
}

impl Default for GatewayState {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayState {
    pub fn new() -> Self {
        Self {
            next_id: RwLock::new(1),
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub async fn next_client_id(&self) -> ClientId {
        let mut id = self.next_id.write().await;
        let current = *id;
        *id += 1;
        current
    }

    pub async fn register(&self, client_id: ClientId, tx: mpsc::UnboundedSender<String>) {
        let client = ConnectedClient {
            user_id: None,
            tx,
            subscriptions: HashMap::new(),
        };
        self.clients.write().await.insert(client_id, client);
    }

    pub async fn identify(&self, client_id: ClientId, user_id: &str) {
        if let Some(client) = self.clients.write().await.get_mut(&client_id) {
            client.user_id = Some(user_id.to_string());
        }
    }

    /// Drop the client and stop all of its forwarders.
    pub async fn unregister(&self, client_id: ClientId, broker: &Broker) -> Option<ConnectedClient> {
        let client = self.clients.write().await.remove(&client_id)?;
        for subscription in client.subscriptions.values() {
            subscription.forwarder.abort();
            broker.prune(&subscription.topic);
        }
        Some(client)
    }

    pub async fn add_subscription(
        &self,
        client_id: ClientId,
        subscription_id: &str,
        destination: &str,
        room_id: &str,
        topic: &str,
        broker: &Broker,
    ) -> ChatResult<()> {
        let mut clients = self.clients.write().await;
        let client = clients
            .get_mut(&client_id)
            .ok_or_else(|| ChatError::not_found("Connection is gone"))?;

        if client.subscriptions.contains_key(subscription_id) {
            return Err(ChatError::invalid(format!(
                "Subscription id {subscription_id} is already in use"
            )));
        }

        let forwarder = forward::spawn(
            broker.subscribe(topic),
            client.tx.clone(),
            destination.to_string(),
            subscription_id.to_string(),
        );
        client.subscriptions.insert(
            subscription_id.to_string(),
            Subscription {
                room_id: room_id.to_string(),
                topic: topic.to_string(),
                forwarder,
            },
        );
        Ok(())
    }

    pub async fn remove_subscription(
        &self,
        client_id: ClientId,
        subscription_id: &str,
        broker: &Broker,
    ) -> Option<Subscription> {
        let subscription = self
            .clients
            .write()
            .await
            .get_mut(&client_id)?
            .subscriptions
            .remove(subscription_id)?;
        subscription.forwarder.abort();
        broker.prune(&subscription.topic);
        Some(subscription)
    }

    pub async fn send_to(&self, client_id: ClientId, frame: &Frame) {
        let clients = self.clients.read().await;
        if let Some(client) = clients.get(&client_id) {
            let _ = client.tx.send(frame.encode());
        }
    }

    pub async fn is_user_connected(&self, user_id: &str) -> bool {
        self.clients
            .read()
            .await
            .values()
            .any(|c| c.user_id.as_deref() == Some(user_id))
    }
}
