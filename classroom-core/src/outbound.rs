//! Local delivery: bridges the KV-backed room lattice (component K) to the
//! actual transport of whichever sessions happen to be connected to this
//! instance.
//!
//! [`rooms::RoomLattice`] only knows about membership and a pub/sub channel
//! per room name; it has no notion of "this instance's websocket write
//! half". [`OutboundRegistry`] is that missing piece: `classroom-server`
//! registers a sender the moment a connection is accepted and deregisters it
//! on disconnect, and [`RoomForwarders`] keeps exactly one background task
//! per room subscribed on this instance for as long as at least one locally
//! connected session is a member, relaying every published [`Frame`] to this
//! instance's local senders only (spec §9 "Cross-instance fan-out": "the
//! room lattice is implemented by forwarding every emit through the KV
//! store's pub/sub so that membership lookups are local per instance but
//! messages reach all instances' members").

use std::collections::HashMap;
use std::sync::Arc;

use classroom_protocol::Frame;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::rooms::RoomLattice;

/// A process-local registry of connected sessions' outbound channels, keyed
/// by `sid`. `classroom-server`'s connection task owns the receiving half;
/// everything else in this crate only ever calls [`OutboundRegistry::send`].
#[derive(Default)]
pub struct OutboundRegistry {
    senders: RwLock<HashMap<String, mpsc::UnboundedSender<Frame>>>,
}

impl OutboundRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `sid`'s outbound channel, replacing any prior one at the same sid.
    pub fn register(&self, sid: impl Into<String>, sender: mpsc::UnboundedSender<Frame>) {
        self.senders.write().insert(sid.into(), sender);
    }

    /// Removes `sid`'s outbound channel, e.g. on disconnect.
    pub fn unregister(&self, sid: &str) {
        self.senders.write().remove(sid);
    }

    /// Delivers `frame` to `sid` if it is connected to this instance. A
    /// closed or absent channel is silently dropped — the session is either
    /// already gone or connected to a different instance, in which case the
    /// room-lattice pub/sub fan-out is responsible for delivery there.
    pub fn send(&self, sid: &str, frame: Frame) {
        if let Some(sender) = self.senders.read().get(sid) {
            let _ = sender.send(frame);
        }
    }

    /// `true` iff `sid` is connected to this instance.
    pub fn is_local(&self, sid: &str) -> bool {
        self.senders.read().contains_key(sid)
    }
}

struct ForwarderHandle {
    local_members: u32,
    task: tokio::task::JoinHandle<()>,
}

/// Keeps one background subscriber task alive per room name, for as long as
/// at least one session on this instance is a member of it.
pub struct RoomForwarders {
    rooms: Arc<RoomLattice>,
    outbound: Arc<OutboundRegistry>,
    handles: RwLock<HashMap<String, ForwarderHandle>>,
}

impl RoomForwarders {
    /// Builds a forwarder registry over the shared room lattice and outbound registry.
    pub fn new(rooms: Arc<RoomLattice>, outbound: Arc<OutboundRegistry>) -> Self {
        Self {
            rooms,
            outbound,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a local member of `room_name`, spawning its forwarder task
    /// if this is the first local member.
    pub async fn join(&self, room_name: &str) {
        let mut handles = self.handles.write();
        if let Some(handle) = handles.get_mut(room_name) {
            handle.local_members += 1;
            return;
        }
        let rooms = self.rooms.clone();
        let outbound = self.outbound.clone();
        let name = room_name.to_string();
        let task = tokio::spawn(async move {
            let mut subscription = match rooms.subscribe(&name).await {
                Ok(subscription) => subscription,
                Err(err) => {
                    tracing::warn!(error = %err, room = %name, "failed to subscribe to room channel");
                    return;
                }
            };
            while let Some(message) = subscription.next().await {
                let Ok(envelope) = serde_json::from_slice::<RoomEnvelope>(&message.payload) else {
                    tracing::warn!(room = %name, "dropping malformed room envelope");
                    continue;
                };
                for sid in &envelope.recipients {
                    outbound.send(sid, envelope.frame.clone());
                }
            }
        });
        handles.insert(room_name.to_string(), ForwarderHandle { local_members: 1, task });
    }

    /// Deregisters a local member of `room_name`, tearing down its forwarder
    /// task once no local members remain.
    pub fn leave(&self, room_name: &str) {
        let mut handles = self.handles.write();
        let Some(handle) = handles.get_mut(room_name) else {
            return;
        };
        handle.local_members = handle.local_members.saturating_sub(1);
        if handle.local_members == 0 {
            if let Some(handle) = handles.remove(room_name) {
                handle.task.abort();
            }
        }
    }
}

/// The payload published on a room's pub/sub channel: the frame plus the
/// exact recipient sids, so instances with no local member do trivial work
/// and instances with some-but-not-all members don't over-deliver.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RoomEnvelope {
    /// The frame to deliver.
    pub frame: Frame,
    /// Every sid (across all instances) that should receive it.
    pub recipients: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_to_unregistered_sid_is_a_silent_no_op() {
        let registry = OutboundRegistry::new();
        registry.send("nobody", Frame::new("PING", serde_json::json!({})));
    }

    #[tokio::test]
    async fn register_then_send_delivers_to_the_channel() {
        let registry = OutboundRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register("sid-1", tx);
        assert!(registry.is_local("sid-1"));
        registry.send("sid-1", Frame::new("PING", serde_json::json!({})));
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.event, "PING");
    }

    #[tokio::test]
    async fn unregister_stops_delivery() {
        let registry = OutboundRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register("sid-1", tx);
        registry.unregister("sid-1");
        drop(rx);
        assert!(!registry.is_local("sid-1"));
        registry.send("sid-1", Frame::new("PING", serde_json::json!({})));
    }
}
