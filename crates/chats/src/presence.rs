//! Registry of live chat connections.
//!
//! Every mutation is followed by a broadcast of the full presence list while
//! the registry lock is still held, so all observers see snapshots in the same
//! order the mutations happened. Sends never block: a connection whose
//! outbound buffer is full or closed simply misses that frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use relaychat_auth::Identity;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::{PresenceEntry, ServerFrame};

/// The registry's view of one socket: who it belongs to and how to reach it.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    connection_id: Uuid,
    identity: Identity,
    outbound: mpsc::Sender<ServerFrame>,
    alive: Arc<AtomicBool>,
    busy: Arc<AtomicBool>,
    evicted: Arc<Notify>,
}

impl ConnectionHandle {
    pub fn new(identity: Identity, outbound: mpsc::Sender<ServerFrame>) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            identity,
            outbound,
            alive: Arc::new(AtomicBool::new(true)),
            busy: Arc::new(AtomicBool::new(false)),
            evicted: Arc::new(Notify::new()),
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Record that the peer showed a sign of life.
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Release);
    }

    /// Returns whether the peer was heard from since the last call, and resets the flag.
    /// A connection that is still working on one of its own frames counts as alive.
    pub fn take_alive(&self) -> bool {
        let heard = self.alive.swap(false, Ordering::AcqRel);
        heard || self.busy.load(Ordering::Acquire)
    }

    /// Mark the connection as busy handling an inbound frame until the guard drops.
    pub fn busy(&self) -> BusyGuard<'_> {
        self.busy.store(true, Ordering::Release);
        BusyGuard { handle: self }
    }

    /// Resolves once the registry has replaced this connection with a newer one.
    pub async fn evicted(&self) {
        self.evicted.notified().await;
    }

    pub fn send(&self, frame: ServerFrame) -> bool {
        match self.outbound.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    user = %self.identity.id,
                    connection = %self.connection_id,
                    "outbound buffer full, dropping frame"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(
                    user = %self.identity.id,
                    connection = %self.connection_id,
                    "outbound channel closed, dropping frame"
                );
                false
            }
        }
    }

    fn evict(&self) {
        self.evicted.notify_one();
    }
}

/// Returned by [`ConnectionHandle::busy`].
#[must_use]
pub struct BusyGuard<'a> {
    handle: &'a ConnectionHandle,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.handle.busy.store(false, Ordering::Release);
        self.handle.mark_alive();
    }
}

#[derive(Debug, Clone, Default)]
pub struct PresenceRegistry {
    connections: Arc<Mutex<Vec<ConnectionHandle>>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and broadcast the new presence list.
    ///
    /// An identity holds at most one connection: a previous connection for the
    /// same identity is removed and told to close, and is returned.
    pub async fn add(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let mut connections = self.connections.lock().await;

        let replaced = connections
            .iter()
            .position(|existing| existing.identity.id == handle.identity.id)
            .map(|index| connections.remove(index));

        if let Some(previous) = &replaced {
            info!(
                user = %previous.identity.id,
                replaced = %previous.connection_id,
                connection = %handle.connection_id,
                "replacing existing connection for identity"
            );
            previous.evict();
        }

        info!(
            user = %handle.identity.id,
            connection = %handle.connection_id,
            "connection registered"
        );
        connections.push(handle);
        broadcast(&connections);

        replaced
    }

    /// Remove a connection if it is still registered.
    ///
    /// Keyed by connection id as well as identity so that late cleanup of a
    /// replaced connection leaves its successor alone. Returns whether anything
    /// was removed; only then is presence re-broadcast.
    pub async fn remove(&self, identity_id: &str, connection_id: Uuid) -> bool {
        let mut connections = self.connections.lock().await;

        let Some(index) = connections.iter().position(|existing| {
            existing.connection_id == connection_id && existing.identity.id == identity_id
        }) else {
            debug!(user = identity_id, connection = %connection_id, "connection already removed");
            return false;
        };

        connections.remove(index);
        info!(user = identity_id, connection = %connection_id, "connection removed");
        broadcast(&connections);
        true
    }

    /// Send a frame to every live connection of one identity.
    pub async fn deliver(&self, identity_id: &str, frame: ServerFrame) -> usize {
        let connections = self.connections.lock().await;
        connections
            .iter()
            .filter(|connection| connection.identity.id == identity_id)
            .filter(|connection| connection.send(frame.clone()))
            .count()
    }

    /// Presence entries in registration order.
    pub async fn snapshot(&self) -> Vec<PresenceEntry> {
        let connections = self.connections.lock().await;
        entries(&connections)
    }

    pub async fn is_online(&self, identity_id: &str) -> bool {
        let connections = self.connections.lock().await;
        connections
            .iter()
            .any(|connection| connection.identity.id == identity_id)
    }

    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.lock().await.is_empty()
    }
}

fn entries(connections: &[ConnectionHandle]) -> Vec<PresenceEntry> {
    connections
        .iter()
        .map(|connection| PresenceEntry::from(&connection.identity))
        .collect()
}

fn broadcast(connections: &[ConnectionHandle]) {
    let frame = ServerFrame::Presence {
        online: entries(connections),
    };
    for connection in connections {
        connection.send(frame.clone());
    }
}
