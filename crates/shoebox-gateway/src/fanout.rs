use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use shoebox_types::events::GatewayEvent;

/// Process-local registry of live WebSocket connections.
///
/// Keyed by connection handle, not user: a connection exists (and receives
/// nothing) before it identifies, and one user may hold several connections
/// across tabs/devices. For multi-instance deployments this registry would
/// need a shared broker behind it; a single process is the unit here.
#[derive(Clone)]
pub struct Fanout {
    inner: Arc<FanoutInner>,
}

struct FanoutInner {
    connections: RwLock<HashMap<Uuid, ConnectionEntry>>,
}

struct ConnectionEntry {
    /// Bound after the IDENTIFY handshake; unidentified connections are
    /// never delivery targets.
    user_id: Option<Uuid>,
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

impl Fanout {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FanoutInner {
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Accept a connection. Returns (conn_id, receiver); the connection loop
    /// drains the receiver into the socket.
    pub async fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .connections
            .write()
            .await
            .insert(conn_id, ConnectionEntry { user_id: None, tx });
        (conn_id, rx)
    }

    /// Bind a connection to a user. Returns false if the connection is gone.
    pub async fn identify(&self, conn_id: Uuid, user_id: Uuid) -> bool {
        let mut connections = self.inner.connections.write().await;
        match connections.get_mut(&conn_id) {
            Some(entry) => {
                entry.user_id = Some(user_id);
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, conn_id: Uuid) {
        self.inner.connections.write().await.remove(&conn_id);
    }

    /// Deliver an event to every identified connection bound to a user in
    /// `user_ids`. A connection whose channel is closed is treated as dead
    /// and dropped from the registry; one dead connection never aborts the
    /// pass for the rest.
    pub async fn broadcast_to(&self, user_ids: &[Uuid], event: GatewayEvent) {
        let dead: Vec<Uuid> = {
            let connections = self.inner.connections.read().await;
            connections
                .iter()
                .filter_map(|(conn_id, entry)| {
                    let bound = entry.user_id?;
                    if !user_ids.contains(&bound) {
                        return None;
                    }
                    match entry.tx.send(event.clone()) {
                        Ok(()) => None,
                        Err(_) => Some(*conn_id),
                    }
                })
                .collect()
        };

        if !dead.is_empty() {
            let mut connections = self.inner.connections.write().await;
            for conn_id in dead {
                connections.remove(&conn_id);
            }
        }
    }

    /// Send to one connection, e.g. the Ready ack after IDENTIFY.
    pub async fn send_to_connection(&self, conn_id: Uuid, event: GatewayEvent) {
        let connections = self.inner.connections.read().await;
        if let Some(entry) = connections.get(&conn_id) {
            let _ = entry.tx.send(event);
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }
}

impl Default for Fanout {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unidentified_connection_receives_nothing() {
        let fanout = Fanout::new();
        let user = Uuid::new_v4();
        let (_conn, mut rx) = fanout.register().await;

        fanout.broadcast_to(&[user], GatewayEvent::NewMessage).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_reaches_only_targeted_users() {
        let fanout = Fanout::new();
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let u3 = Uuid::new_v4();

        let (c1, mut rx1) = fanout.register().await;
        let (c2, mut rx2) = fanout.register().await;
        let (c3, mut rx3) = fanout.register().await;
        fanout.identify(c1, u1).await;
        fanout.identify(c2, u2).await;
        fanout.identify(c3, u3).await;

        fanout.broadcast_to(&[u1, u2], GatewayEvent::NewMessage).await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_connection_is_removed_on_failed_send() {
        let fanout = Fanout::new();
        let user = Uuid::new_v4();

        let (conn, rx) = fanout.register().await;
        fanout.identify(conn, user).await;
        drop(rx); // simulate transport death

        fanout.broadcast_to(&[user], GatewayEvent::NewMessage).await;
        assert_eq!(fanout.connection_count().await, 0);
    }

    #[tokio::test]
    async fn identify_after_remove_fails() {
        let fanout = Fanout::new();
        let (conn, _rx) = fanout.register().await;
        fanout.remove(conn).await;
        assert!(!fanout.identify(conn, Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn one_user_many_connections_all_receive() {
        let fanout = Fanout::new();
        let user = Uuid::new_v4();

        let (c1, mut rx1) = fanout.register().await;
        let (c2, mut rx2) = fanout.register().await;
        fanout.identify(c1, user).await;
        fanout.identify(c2, user).await;

        fanout.broadcast_to(&[user], GatewayEvent::NewMessage).await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }
}
