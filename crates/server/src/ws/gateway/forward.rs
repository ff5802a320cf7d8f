use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::broker::Envelope;
use crate::ws::frame::Frame;

pub(super) fn spawn(
    mut rx: broadcast::Receiver<Arc<Envelope>>,
    tx: mpsc::UnboundedSender<String>,
    destination: String,
    subscription_id: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let envelope = match rx.recv().await {
                Ok(envelope) => envelope,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(%destination, %subscription_id, skipped, "Subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let frame = Frame::new("MESSAGE")
                .header("destination", destination.as_str())
                .header("subscription", subscription_id.as_str())
                .header("message-id", envelope.id.as_str())
                .header("content-type", "application/json")
                .body(envelope.payload.as_str());

            if tx.send(frame.encode()).is_err() {
                break;
            }
        }
    })
}
