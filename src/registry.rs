//! Registry of connected real-time clients.
//!
//! The registry only tracks membership. Each entry carries the sending half of
//! the client's outbound queue; dropping the entry closes the queue, which in
//! turn ends the connection task that drains it.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::types::{ClientId, ClientInfo};

/// Serialized event text queued for one client
pub type Outbound = Arc<str>;

/// A registered client: its metadata plus the queue feeding its socket writer
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub info: ClientInfo,
    tx: mpsc::Sender<Outbound>,
}

impl ClientHandle {
    pub fn new(info: ClientInfo, tx: mpsc::Sender<Outbound>) -> Self {
        Self { info, tx }
    }

    pub fn id(&self) -> &ClientId {
        &self.info.id
    }

    /// Non-blocking enqueue; a full or closed queue is a failed send.
    pub fn try_send(&self, msg: Outbound) -> Result<(), mpsc::error::TrySendError<Outbound>> {
        self.tx.try_send(msg)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<RwLock<HashMap<ClientId, ClientHandle>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client. Registering an id that is already present keeps the
    /// existing entry and returns false.
    pub async fn register(&self, client: ClientHandle) -> bool {
        let mut clients = self.clients.write().await;
        if clients.contains_key(client.id()) {
            return false;
        }
        tracing::debug!(client_id = %client.id(), addr = ?client.info.addr, "client registered");
        clients.insert(client.id().clone(), client);
        true
    }

    /// Remove a client if present. Returns whether anything was removed.
    pub async fn unregister(&self, id: &str) -> bool {
        let removed = self.clients.write().await.remove(id).is_some();
        if removed {
            tracing::debug!(client_id = %id, "client unregistered");
        }
        removed
    }

    /// Point-in-time copy of the client set, safe to iterate without the lock
    pub async fn snapshot(&self) -> Vec<ClientHandle> {
        self.clients.read().await.values().cloned().collect()
    }

    pub async fn get(&self, id: &str) -> Option<ClientHandle> {
        self.clients.read().await.get(id).cloned()
    }

    pub async fn clients(&self) -> Vec<ClientInfo> {
        self.clients
            .read()
            .await
            .values()
            .map(|c| c.info.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transport;
    use std::collections::HashSet;

    fn make_client() -> (ClientHandle, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(8);
        (
            ClientHandle::new(ClientInfo::new(Transport::Native, None), tx),
            rx,
        )
    }

    #[tokio::test]
    async fn test_register_and_unregister() {
        let registry = ClientRegistry::new();
        let (a, _rx_a) = make_client();
        let (b, _rx_b) = make_client();

        assert!(registry.register(a.clone()).await);
        assert!(registry.register(b.clone()).await);
        assert_eq!(registry.len().await, 2);

        assert!(registry.unregister(a.id()).await);
        assert_eq!(registry.len().await, 1);
        assert!(registry.get(a.id()).await.is_none());
        assert!(registry.get(b.id()).await.is_some());
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let registry = ClientRegistry::new();
        let (a, _rx) = make_client();

        assert!(registry.register(a.clone()).await);
        assert!(!registry.register(a.clone()).await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_unregister_absent_is_noop() {
        let registry = ClientRegistry::new();
        assert!(!registry.unregister("missing").await);

        let (a, _rx) = make_client();
        registry.register(a.clone()).await;
        assert!(registry.unregister(a.id()).await);
        assert!(!registry.unregister(a.id()).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_matches_membership_after_mixed_sequence() {
        let registry = ClientRegistry::new();
        let clients: Vec<_> = (0..6).map(|_| make_client()).collect();

        for (client, _) in &clients {
            registry.register(client.clone()).await;
        }
        registry.unregister(clients[1].0.id()).await;
        registry.unregister(clients[4].0.id()).await;
        registry.register(clients[1].0.clone()).await;
        registry.register(clients[2].0.clone()).await;
        registry.unregister(clients[4].0.id()).await;

        let snapshot: Vec<_> = registry.snapshot().await;
        let ids: HashSet<_> = snapshot.iter().map(|c| c.id().clone()).collect();
        assert_eq!(ids.len(), snapshot.len(), "snapshot must not contain duplicates");

        let expected: HashSet<_> = [0, 1, 2, 3, 5]
            .iter()
            .map(|&i| clients[i].0.id().clone())
            .collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_clients_lists_metadata() {
        let registry = ClientRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let addr = "10.0.0.7:50122".parse().unwrap();
        let info = ClientInfo::new(Transport::Channel, Some(addr));
        registry.register(ClientHandle::new(info.clone(), tx)).await;

        assert_eq!(registry.clients().await, vec![info]);
    }

    #[tokio::test]
    async fn test_snapshot_is_unaffected_by_later_changes() {
        let registry = ClientRegistry::new();
        let (a, _rx_a) = make_client();
        let (b, _rx_b) = make_client();
        registry.register(a.clone()).await;

        let snapshot = registry.snapshot().await;
        registry.register(b).await;
        registry.unregister(a.id()).await;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), a.id());
    }
}
