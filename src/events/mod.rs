use async_trait::async_trait;
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes after a commit. Delivery failures are logged and dropped.
    pub async fn send_or_log(&self, event: Event) {
        let kind = event.kind();
        if let Err(e) = self.send(event).await {
            counter!("cafe_events.dropped", 1);
            warn!(event = kind, error = %e, "Event could not be published");
        }
    }
}

/// Facts published once the transaction that produced them has committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderPlaced {
        order_id: Uuid,
        store_id: Uuid,
        order_number: String,
        total: Decimal,
        payment_status: String,
    },
    /// A sale took the product's stock to zero and flipped it unavailable.
    StockDepleted { product_id: Uuid, store_id: Uuid },
    PricesRecalculated {
        store_id: Uuid,
        material_id: Option<Uuid>,
        product_ids: Vec<Uuid>,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::OrderPlaced { .. } => "order_placed",
            Event::StockDepleted { .. } => "stock_depleted",
            Event::PricesRecalculated { .. } => "prices_recalculated",
        }
    }
}

// Handlers run outside any transaction; they only observe committed state.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: &Event) -> Result<(), String>;
}

/// Drains the channel, logging each event and fanning it out to the handlers.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, handlers: Vec<Arc<dyn EventHandler>>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        counter!("cafe_events.received", 1, "kind" => event.kind());

        match &event {
            Event::OrderPlaced {
                order_id,
                order_number,
                total,
                payment_status,
                ..
            } => {
                info!(
                    %order_id,
                    order_number = %order_number,
                    %total,
                    payment_status = %payment_status,
                    "Order placed"
                );
            }
            Event::StockDepleted {
                product_id,
                store_id,
            } => {
                info!(%product_id, %store_id, "Product sold out and marked unavailable");
            }
            Event::PricesRecalculated {
                store_id,
                material_id,
                product_ids,
            } => {
                debug!(
                    %store_id,
                    material_id = ?material_id,
                    affected = product_ids.len(),
                    "Suggested prices recalculated"
                );
            }
        }

        for handler in &handlers {
            if let Err(e) = handler.handle_event(&event).await {
                error!(event = event.kind(), error = %e, "Event handler failed");
            }
        }
    }

    info!("Event channel closed; stopping event processing loop");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<&'static str>>);

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle_event(&self, event: &Event) -> Result<(), String> {
            self.0.lock().unwrap().push(event.kind());
            Ok(())
        }
    }

    #[tokio::test]
    async fn events_reach_registered_handlers() {
        let (tx, rx) = mpsc::channel(8);
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let sender = EventSender::new(tx);

        sender
            .send_or_log(Event::StockDepleted {
                product_id: Uuid::new_v4(),
                store_id: Uuid::new_v4(),
            })
            .await;
        drop(sender);

        process_events(rx, vec![recorder.clone()]).await;
        assert_eq!(*recorder.0.lock().unwrap(), vec!["stock_depleted"]);
    }

    #[tokio::test]
    async fn closed_channel_does_not_fail_the_publisher() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        sender
            .send_or_log(Event::PricesRecalculated {
                store_id: Uuid::new_v4(),
                material_id: None,
                product_ids: vec![],
            })
            .await;
        assert!(sender
            .send(Event::StockDepleted {
                product_id: Uuid::nil(),
                store_id: Uuid::nil(),
            })
            .await
            .is_err());
    }
}
