use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::stock_movement::MovementKind;

/// Domain events emitted after a ledger transaction commits. Consumers
/// (notification fan-out, reporting) are out-of-scope systems; the movement
/// log remains the source of truth regardless of delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    MovementRecorded {
        movement_id: Uuid,
        tenant_id: Uuid,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        kind: MovementKind,
        quantity_delta: i64,
    },
    StockTransferred {
        movement_id: Uuid,
        tenant_id: Uuid,
        product_id: Uuid,
        location_from: String,
        location_to: String,
        quantity: i64,
    },
    StockTakeOpened {
        session_id: Uuid,
        tenant_id: Uuid,
        location: String,
        item_count: usize,
    },
    StockTakeCompleted {
        session_id: Uuid,
        tenant_id: Uuid,
        corrections: usize,
    },
    StockTakeCancelled {
        session_id: Uuid,
        tenant_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously. A full or closed channel surfaces as
    /// an error string; callers decide whether delivery failure matters.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel, logging each event. Runs until every sender
/// has been dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::MovementRecorded {
                movement_id,
                kind,
                quantity_delta,
                ..
            } => {
                info!(
                    movement_id = %movement_id,
                    kind = %kind,
                    quantity_delta = %quantity_delta,
                    "stock movement recorded"
                );
            }
            Event::StockTransferred {
                movement_id,
                location_from,
                location_to,
                quantity,
                ..
            } => {
                info!(
                    movement_id = %movement_id,
                    from = %location_from,
                    to = %location_to,
                    quantity = %quantity,
                    "stock transferred"
                );
            }
            Event::StockTakeOpened {
                session_id,
                location,
                item_count,
                ..
            } => {
                info!(
                    session_id = %session_id,
                    location = %location,
                    items = %item_count,
                    "stock take opened"
                );
            }
            Event::StockTakeCompleted {
                session_id,
                corrections,
                ..
            } => {
                info!(
                    session_id = %session_id,
                    corrections = %corrections,
                    "stock take completed"
                );
            }
            Event::StockTakeCancelled { session_id, .. } => {
                info!(session_id = %session_id, "stock take cancelled");
            }
        }
    }
    warn!("Event channel closed; event processor exiting");
}
