use crate::state::VideoState;
use log::debug;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

pub(crate) type Tx = mpsc::UnboundedSender<String>;

#[derive(Debug, Error)]
pub(crate) enum ClaimError {
    #[error("room already has a connected host")]
    HostConnected,
    #[error("room is closed")]
    Closed,
}

enum HostLink {
    Connected,
    AwaitingReconnect(oneshot::Sender<()>),
    Closed,
}

pub(crate) struct Room {
    inner: RwLock<Inner>,
}

struct Inner {
    video: VideoState,
    subscribers: HashMap<Uuid, Tx>,
    host: HostLink,
}

impl Room {
    pub(crate) fn new() -> Self {
        Room {
            inner: RwLock::new(Inner {
                video: VideoState::new(),
                subscribers: HashMap::new(),
                host: HostLink::Connected,
            }),
        }
    }

    // The closure is the only write path to the video state; no reference
    // to it ever escapes the lock.
    pub(crate) fn update_video_state(&self, update: impl FnOnce(&mut VideoState)) {
        update(&mut self.inner.write().unwrap().video);
    }

    pub(crate) fn predicted(&self) -> VideoState {
        self.inner.read().unwrap().video.predicted()
    }

    pub(crate) fn current_path(&self) -> String {
        self.inner.read().unwrap().video.path.clone()
    }

    // Snapshot and registration share one critical section, so a viewer can
    // never observe a broadcast for an update missing from its snapshot.
    // A closed room admits nobody.
    pub(crate) fn join(&self, tx: Tx) -> Option<(Uuid, VideoState, bool)> {
        let mut inner = self.inner.write().unwrap();
        if let HostLink::Closed = inner.host {
            return None;
        }
        let id = Uuid::new_v4();
        inner.subscribers.insert(id, tx);
        let snapshot = inner.video.predicted();
        let host_connected = matches!(inner.host, HostLink::Connected);
        Some((id, snapshot, host_connected))
    }

    pub(crate) fn leave(&self, id: &Uuid) {
        self.inner.write().unwrap().subscribers.remove(id);
    }

    pub(crate) fn broadcast(&self, message: &str) {
        let inner = self.inner.read().unwrap();
        for (id, tx) in inner.subscribers.iter() {
            if tx.send(message.to_owned()).is_err() {
                debug!("Dropped message for viewer {}", id);
            }
        }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.inner.read().unwrap().subscribers.len()
    }

    pub(crate) fn is_host_connected(&self) -> bool {
        matches!(self.inner.read().unwrap().host, HostLink::Connected)
    }

    // Arms a fresh signal for this grace period; the receiver resolves once
    // a reconnecting host claims the room.
    pub(crate) fn host_disconnected(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.inner.write().unwrap().host = HostLink::AwaitingReconnect(tx);
        rx
    }

    pub(crate) fn claim_host(&self) -> Result<(), ClaimError> {
        let mut inner = self.inner.write().unwrap();
        match std::mem::replace(&mut inner.host, HostLink::Connected) {
            HostLink::AwaitingReconnect(signal) => {
                let _ = signal.send(());
                Ok(())
            }
            HostLink::Connected => Err(ClaimError::HostConnected),
            HostLink::Closed => {
                inner.host = HostLink::Closed;
                Err(ClaimError::Closed)
            }
        }
    }

    // The expiry side of the race: destruction only proceeds if no
    // reconnection was accepted first.
    pub(crate) fn expire_if_waiting(&self) -> bool {
        let mut inner = self.inner.write().unwrap();
        match inner.host {
            HostLink::AwaitingReconnect(_) => {
                inner.host = HostLink::Closed;
                inner.subscribers.clear();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn close(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.host = HostLink::Closed;
        inner.subscribers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn join_snapshot_reflects_prior_updates() {
        let room = Room::new();
        room.update_video_state(|v| {
            v.update_path("video1");
            v.update_time(0.0);
            v.rewind(Duration::from_secs(5));
        });

        let (tx, _rx) = mpsc::unbounded_channel();
        let (_, snapshot, host_connected) = room.join(tx).unwrap();
        assert_eq!(snapshot.path, "video1");
        assert!((snapshot.time - 5.0).abs() < 0.25);
        assert!(host_connected);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber_in_order() {
        let room = Room::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        room.join(tx_a).unwrap();
        room.join(tx_b).unwrap();

        room.broadcast("first");
        room.broadcast("second");

        assert_eq!(rx_a.recv().await.unwrap(), "first");
        assert_eq!(rx_a.recv().await.unwrap(), "second");
        assert_eq!(rx_b.recv().await.unwrap(), "first");
        assert_eq!(rx_b.recv().await.unwrap(), "second");
    }

    #[tokio::test]
    async fn dead_subscriber_does_not_stop_delivery() {
        let room = Room::new();
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        room.join(tx_a).unwrap();
        room.join(tx_b).unwrap();

        drop(rx_a);
        room.broadcast("still here");

        assert_eq!(rx_b.recv().await.unwrap(), "still here");
    }

    #[tokio::test]
    async fn leave_is_idempotent() {
        let room = Room::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (id, _, _) = room.join(tx).unwrap();

        room.leave(&id);
        room.leave(&id);
        assert_eq!(room.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn close_signals_end_of_stream() {
        let room = Room::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        room.join(tx).unwrap();

        room.close();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn join_is_refused_after_close() {
        let room = Room::new();
        room.close();

        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(room.join(tx).is_none());
    }

    #[tokio::test]
    async fn claim_while_connected_is_rejected() {
        let room = Room::new();
        assert!(matches!(room.claim_host(), Err(ClaimError::HostConnected)));
        assert!(room.is_host_connected());
    }

    #[tokio::test]
    async fn disconnect_then_claim_signals_the_waiter() {
        let room = Room::new();
        let pending = room.host_disconnected();
        assert!(!room.is_host_connected());

        room.claim_host().unwrap();
        assert!(room.is_host_connected());
        assert!(pending.await.is_ok());
    }

    #[tokio::test]
    async fn expire_only_fires_while_still_waiting() {
        let room = Room::new();
        let _pending = room.host_disconnected();
        room.claim_host().unwrap();
        assert!(!room.expire_if_waiting());

        let _pending = room.host_disconnected();
        let (tx, _rx) = mpsc::unbounded_channel();
        room.join(tx).unwrap();
        assert!(room.expire_if_waiting());
        assert_eq!(room.subscriber_count(), 0);
        assert!(matches!(room.claim_host(), Err(ClaimError::Closed)));
    }
}
