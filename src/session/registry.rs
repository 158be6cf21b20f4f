//! # Session Registry
//!
//! In-memory table of live connections and the interview each one is attached
//! to. Every coordinator owns one.
//!
//! ## Delivery model:
//! Each connection is represented by a [`ConnectionHandle`] wrapping the sending
//! half of a bounded channel. The transport drains the receiving half. Delivery
//! never waits: a full buffer drops the event for that connection and a closed
//! channel is skipped. Events sent to one connection arrive in issue order.

use super::events::ServerEvent;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Sending side of one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    sender: mpsc::Sender<Arc<str>>,
}

impl ConnectionHandle {
    /// Create a handle plus the receiver the transport should drain.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                id: Uuid::new_v4(),
                sender,
            },
            receiver,
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    fn deliver(&self, interview_id: &str, payload: &Arc<str>, kind: &'static str) -> bool {
        match self.sender.try_send(Arc::clone(payload)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    interview_id,
                    connection_id = %self.id,
                    event = kind,
                    "Send buffer full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(
                    interview_id,
                    connection_id = %self.id,
                    event = kind,
                    "Connection already closed, skipping event"
                );
                false
            }
        }
    }
}

struct SessionEntry {
    handle: ConnectionHandle,
    interview_id: String,
}

/// Connection-to-interview pairings for live sessions.
#[derive(Default)]
pub struct SessionRegistry {
    entries: RwLock<HashMap<Uuid, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `handle` belongs to `interview_id`. Re-attaching an existing
    /// connection replaces its pairing.
    pub fn attach(&self, handle: ConnectionHandle, interview_id: &str) {
        let connection_id = handle.id();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            connection_id,
            SessionEntry {
                handle,
                interview_id: interview_id.to_string(),
            },
        );
        debug!(interview_id, connection_id = %connection_id, total = entries.len(), "Connection attached");
    }

    /// Remove a pairing. Returns whether anything was removed; calling it again
    /// or for an unknown connection is a no-op.
    pub fn detach(&self, connection_id: Uuid) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.remove(&connection_id) {
            Some(entry) => {
                debug!(
                    interview_id = %entry.interview_id,
                    connection_id = %connection_id,
                    total = entries.len(),
                    "Connection detached"
                );
                true
            }
            None => false,
        }
    }

    /// The interview a connection is paired with, if any.
    pub fn interview_for(&self, connection_id: Uuid) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&connection_id)
            .map(|entry| entry.interview_id.clone())
    }

    /// Deliver `event` to every open connection attached to `interview_id`.
    /// Returns how many connections accepted it.
    pub fn broadcast(&self, interview_id: &str, event: &ServerEvent) -> usize {
        let Some(payload) = encode(event) else {
            return 0;
        };

        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .values()
            .filter(|entry| entry.interview_id == interview_id && entry.handle.is_open())
            .filter(|entry| entry.handle.deliver(interview_id, &payload, event.kind()))
            .count()
    }

    /// Deliver `event` to one connection only.
    pub fn send_to(&self, connection_id: Uuid, event: &ServerEvent) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = entries.get(&connection_id) else {
            debug!(connection_id = %connection_id, event = event.kind(), "No such connection");
            return false;
        };
        let Some(payload) = encode(event) else {
            return false;
        };
        entry.handle.deliver(&entry.interview_id, &payload, event.kind())
    }

    pub fn connection_count(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn connections_for(&self, interview_id: &str) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|entry| entry.interview_id == interview_id)
            .count()
    }
}

fn encode(event: &ServerEvent) -> Option<Arc<str>> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Arc::from(json)),
        Err(err) => {
            error!(event = event.kind(), "Failed to serialize event: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MessageRole;

    fn drain(receiver: &mut mpsc::Receiver<Arc<str>>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(payload) = receiver.try_recv() {
            out.push(payload.to_string());
        }
        out
    }

    #[test]
    fn test_broadcast_is_scoped_to_interview() {
        let registry = SessionRegistry::new();
        let (first, mut first_rx) = ConnectionHandle::channel(8);
        let (second, mut second_rx) = ConnectionHandle::channel(8);
        let (other, mut other_rx) = ConnectionHandle::channel(8);
        registry.attach(first, "i-1");
        registry.attach(second, "i-1");
        registry.attach(other, "i-2");

        let delivered = registry.broadcast("i-1", &ServerEvent::processing("i-1", "m-1", MessageRole::User));
        assert_eq!(delivered, 2);
        assert_eq!(drain(&mut first_rx).len(), 1);
        assert_eq!(drain(&mut second_rx).len(), 1);
        assert!(drain(&mut other_rx).is_empty());
        assert_eq!(registry.connections_for("i-1"), 2);
    }

    #[test]
    fn test_detach_is_idempotent() {
        let registry = SessionRegistry::new();
        let (handle, _rx) = ConnectionHandle::channel(4);
        let id = handle.id();
        registry.attach(handle, "i-1");

        assert!(registry.detach(id));
        assert_eq!(registry.connection_count(), 0);
        assert!(!registry.detach(id));
        assert!(!registry.detach(Uuid::new_v4()));
        assert_eq!(registry.connection_count(), 0);
        assert!(registry.interview_for(id).is_none());
    }

    #[test]
    fn test_full_or_closed_connection_does_not_block_others() {
        let registry = SessionRegistry::new();
        let (slow, _slow_rx) = ConnectionHandle::channel(1);
        let (closed, closed_rx) = ConnectionHandle::channel(4);
        let (healthy, mut healthy_rx) = ConnectionHandle::channel(4);
        registry.attach(slow, "i-1");
        registry.attach(closed, "i-1");
        registry.attach(healthy, "i-1");
        drop(closed_rx);

        assert_eq!(registry.broadcast("i-1", &ServerEvent::error("first")), 2);
        // The slow reader's single slot is now taken.
        assert_eq!(registry.broadcast("i-1", &ServerEvent::error("second")), 1);

        let received = drain(&mut healthy_rx);
        assert_eq!(received.len(), 2);
        assert!(received[0].contains("first"));
        assert!(received[1].contains("second"));
    }

    #[test]
    fn test_send_to_targets_one_connection() {
        let registry = SessionRegistry::new();
        let (target, mut target_rx) = ConnectionHandle::channel(4);
        let (bystander, mut bystander_rx) = ConnectionHandle::channel(4);
        let target_id = target.id();
        registry.attach(target, "i-1");
        registry.attach(bystander, "i-1");

        assert!(registry.send_to(target_id, &ServerEvent::error("only you")));
        assert!(!registry.send_to(Uuid::new_v4(), &ServerEvent::error("nobody")));
        assert_eq!(drain(&mut target_rx).len(), 1);
        assert!(drain(&mut bystander_rx).is_empty());
        assert_eq!(registry.interview_for(target_id).as_deref(), Some("i-1"));
    }
}
