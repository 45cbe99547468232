//! Fan-out of events to registered clients.

use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;

use crate::protocol::Event;
use crate::registry::{ClientHandle, ClientRegistry, Outbound};

/// Why a single enqueue failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("client {0} is not registered")]
    UnknownClient(String),

    #[error("connection to client {0} is closed")]
    Closed(String),

    #[error("outbound queue of client {0} is full")]
    QueueFull(String),
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone)]
pub struct Relay {
    registry: ClientRegistry,
}

impl Relay {
    pub fn new(registry: ClientRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Enqueue `event` for every registered client except `exclude`.
    ///
    /// Clients whose queue is closed or full are unregistered on the spot;
    /// delivery to the remaining clients carries on.
    pub async fn broadcast(&self, event: &Event, exclude: Option<&str>) -> BroadcastReport {
        let Some(json) = encode(event) else {
            return BroadcastReport::default();
        };

        let mut report = BroadcastReport::default();
        for client in self.registry.snapshot().await {
            if Some(client.id().as_str()) == exclude {
                continue;
            }
            match self.deliver(&client, Arc::clone(&json)).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(event = event.kind(), "dropping client: {}", e);
                    report.dropped += 1;
                }
            }
        }

        tracing::debug!(
            event = event.kind(),
            delivered = report.delivered,
            dropped = report.dropped,
            "broadcast event"
        );
        report
    }

    /// Enqueue `event` for a single client, with the same eviction policy as
    /// [`Relay::broadcast`].
    pub async fn send_to(&self, id: &str, event: &Event) -> Result<(), SendError> {
        let client = self
            .registry
            .get(id)
            .await
            .ok_or_else(|| SendError::UnknownClient(id.to_string()))?;
        let Some(json) = encode(event) else {
            return Ok(());
        };
        self.deliver(&client, json).await
    }

    async fn deliver(&self, client: &ClientHandle, json: Outbound) -> Result<(), SendError> {
        match client.try_send(json) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.registry.unregister(client.id()).await;
                Err(match err {
                    TrySendError::Full(_) => SendError::QueueFull(client.id().clone()),
                    TrySendError::Closed(_) => SendError::Closed(client.id().clone()),
                })
            }
        }
    }
}

fn encode(event: &Event) -> Option<Outbound> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            tracing::error!(event = event.kind(), "failed to serialize event: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClientInfo, Transport};
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    async fn connect(
        registry: &ClientRegistry,
        capacity: usize,
    ) -> (ClientHandle, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        let client = ClientHandle::new(ClientInfo::new(Transport::Native, None), tx);
        registry.register(client.clone()).await;
        (client, rx)
    }

    fn parse(msg: &Outbound) -> Value {
        serde_json::from_str(msg).unwrap()
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_client() {
        let registry = ClientRegistry::new();
        let relay = Relay::new(registry.clone());
        let mut receivers = Vec::new();
        for _ in 0..3 {
            receivers.push(connect(&registry, 8).await.1);
        }

        let report = relay
            .broadcast(&Event::NewStep(json!({"action": "click"})), None)
            .await;
        assert_eq!(report, BroadcastReport { delivered: 3, dropped: 0 });

        for rx in &mut receivers {
            let msg = rx.recv().await.unwrap();
            assert_eq!(
                parse(&msg),
                json!({"type": "newStep", "data": {"action": "click"}})
            );
        }
    }

    #[tokio::test]
    async fn test_failed_send_unregisters_only_that_client() {
        let registry = ClientRegistry::new();
        let relay = Relay::new(registry.clone());
        let (_a, mut rx_a) = connect(&registry, 8).await;
        let (b, rx_b) = connect(&registry, 8).await;
        let (_c, mut rx_c) = connect(&registry, 8).await;
        drop(rx_b);

        let report = relay.broadcast(&Event::Pong, None).await;
        assert_eq!(report, BroadcastReport { delivered: 2, dropped: 1 });
        assert_eq!(registry.len().await, 2);
        assert!(registry.get(b.id()).await.is_none());

        assert!(rx_a.recv().await.is_some());
        assert!(rx_c.recv().await.is_some());

        // Subsequent broadcasts no longer touch the evicted client
        let report = relay.broadcast(&Event::Pong, None).await;
        assert_eq!(report, BroadcastReport { delivered: 2, dropped: 0 });
    }

    #[tokio::test]
    async fn test_full_queue_evicts_slow_client() {
        let registry = ClientRegistry::new();
        let relay = Relay::new(registry.clone());
        let (slow, _rx_slow) = connect(&registry, 1).await;
        let (_fast, mut rx_fast) = connect(&registry, 8).await;

        relay.broadcast(&Event::NewStep(json!(1)), None).await;
        let report = relay.broadcast(&Event::NewStep(json!(2)), None).await;

        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert!(registry.get(slow.id()).await.is_none());
        assert_eq!(parse(&rx_fast.recv().await.unwrap())["data"], json!(1));
        assert_eq!(parse(&rx_fast.recv().await.unwrap())["data"], json!(2));
    }

    #[tokio::test]
    async fn test_exclude_skips_sender() {
        let registry = ClientRegistry::new();
        let relay = Relay::new(registry.clone());
        let (a, mut rx_a) = connect(&registry, 8).await;
        let (_b, mut rx_b) = connect(&registry, 8).await;

        let report = relay.broadcast(&Event::Pong, Some(a.id())).await;
        assert_eq!(report.delivered, 1);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_order_is_preserved_per_client() {
        let registry = ClientRegistry::new();
        let relay = Relay::new(registry.clone());
        let (_a, mut rx_a) = connect(&registry, 64).await;
        let (_b, mut rx_b) = connect(&registry, 64).await;

        for i in 0..20 {
            relay.broadcast(&Event::NewStep(json!(i)), None).await;
        }

        for rx in [&mut rx_a, &mut rx_b] {
            for i in 0..20 {
                assert_eq!(parse(&rx.recv().await.unwrap())["data"], json!(i));
            }
        }
    }

    #[tokio::test]
    async fn test_broadcast_with_no_clients() {
        let relay = Relay::new(ClientRegistry::new());
        let report = relay.broadcast(&Event::Pong, None).await;
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_send_to_single_client() {
        let registry = ClientRegistry::new();
        let relay = Relay::new(registry.clone());
        let (a, mut rx_a) = connect(&registry, 8).await;
        let (_b, mut rx_b) = connect(&registry, 8).await;

        relay.send_to(a.id(), &Event::Pong).await.unwrap();
        assert_eq!(parse(&rx_a.recv().await.unwrap()), json!({"type": "pong"}));
        assert!(rx_b.try_recv().is_err());

        let err = relay.send_to("nobody", &Event::Pong).await.unwrap_err();
        assert_eq!(err, SendError::UnknownClient("nobody".to_string()));
    }

    #[tokio::test]
    async fn test_send_to_closed_client_unregisters() {
        let registry = ClientRegistry::new();
        let relay = Relay::new(registry.clone());
        let (a, rx_a) = connect(&registry, 8).await;
        drop(rx_a);

        let err = relay.send_to(a.id(), &Event::Pong).await.unwrap_err();
        assert_eq!(err, SendError::Closed(a.id().clone()));
        assert!(registry.is_empty().await);
    }
}
