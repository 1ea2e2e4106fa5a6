use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Change notifications emitted by the inventory store after each mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreEvent {
    ItemCreated { item_id: String },
    ItemUpdated { item_id: String },
    ItemDeleted { item_id: String },
    InventoryImported {
        items: usize,
        settings_replaced: bool,
    },
    /// The in-memory state changed but could not be written to disk.
    SaveFailed { message: String },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<StoreEvent>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<StoreEvent>) -> Self {
        Self { sender }
    }

    /// Convenience constructor returning the sender together with its receiver.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StoreEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: StoreEvent) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_events_in_order() {
        let (sender, mut rx) = EventSender::channel(4);
        sender
            .send(StoreEvent::ItemCreated {
                item_id: "NGP0001".into(),
            })
            .await
            .unwrap();
        sender
            .send(StoreEvent::ItemDeleted {
                item_id: "NGP0001".into(),
            })
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await,
            Some(StoreEvent::ItemCreated {
                item_id: "NGP0001".into()
            })
        );
        assert!(matches!(rx.recv().await, Some(StoreEvent::ItemDeleted { .. })));
    }

    #[tokio::test]
    async fn send_fails_once_receiver_is_gone() {
        let (sender, rx) = EventSender::channel(1);
        drop(rx);
        let result = sender
            .send(StoreEvent::SaveFailed {
                message: "x".into(),
            })
            .await;
        assert!(result.is_err());
    }
}
