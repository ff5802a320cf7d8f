pub mod broker;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod ws;

use config::Config;
use std::sync::Arc;

use broker::Broker;
use chat::notify::{Notifier, PushSender};
use chat::router::DeliveryRouter;
use chat::{MembershipStore, MessageStore, PresenceTracker};

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub gateway: Arc<ws::gateway::GatewayState>,
    pub broker: Arc<Broker>,
    pub presence: Arc<PresenceTracker>,
    pub memberships: MembershipStore,
    pub messages: MessageStore,
    pub notifier: Notifier,
    pub router: DeliveryRouter,
}

impl AppState {
    pub fn new(db: sqlx::SqlitePool, config: Config, push: Arc<dyn PushSender>) -> Self {
        let broker = Arc::new(Broker::new(config.broker_buffer_size));
        let presence = Arc::new(PresenceTracker::new());
        let messages = MessageStore::new(db.clone());
        let notifier = Notifier::new(db.clone(), presence.clone(), push, &config.push_icon_url);
        let router = DeliveryRouter::new(
            messages.clone(),
            broker.clone(),
            presence.clone(),
            notifier.clone(),
        );

        Self {
            memberships: MembershipStore::new(db.clone()),
            gateway: Arc::new(ws::gateway::GatewayState::new()),
            db,
            config,
            broker,
            presence,
            messages,
            notifier,
            router,
        }
    }
}
