//! Shared scaffolding for integration tests: a fully in-memory [`AppContext`]
//! plus small helpers for driving a session through the dispatcher and
//! observing what it emits.

use std::sync::Arc;
use std::time::Duration;

use classroom_core::context::AppContext;
use classroom_core::dispatcher::{Credential, Dispatcher};
use classroom_core::testutil::{test_config, FakeTokenVerifier, InMemoryKv, InMemoryMetadataStore, InMemoryObjectStore};
use classroom_protocol::Frame;
use tokio::sync::mpsc;

/// One test's whole backend: a dispatcher over an in-memory context, plus
/// the concrete metadata store so fixtures can be seeded directly.
pub struct Harness {
    pub ctx: Arc<AppContext>,
    pub metadata: Arc<InMemoryMetadataStore>,
    dispatcher: Dispatcher,
}

impl Harness {
    pub fn new() -> Self {
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let ctx = Arc::new(AppContext::new(
            test_config(),
            Arc::new(InMemoryKv::new()),
            Arc::new(InMemoryKv::new()),
            Arc::new(InMemoryObjectStore::new()),
            metadata.clone(),
            Arc::new(FakeTokenVerifier::new()),
        ));
        let dispatcher = Dispatcher::new(ctx.clone());
        Self { ctx, metadata, dispatcher }
    }

    /// Authenticates `sid` as `user_id` and registers its outbound channel,
    /// returning the receiving half so a test can assert on what it's sent.
    pub async fn connect_user(&self, sid: &str, user_id: i64) -> mpsc::UnboundedReceiver<Frame> {
        let token = FakeTokenVerifier::token_for(user_id);
        self.dispatcher.connect(sid, Credential::Bearer(token)).await.expect("connect should succeed");
        self.register(sid)
    }

    /// Authenticates `sid` as the monitor, the same way.
    pub async fn connect_monitor(&self, sid: &str) -> mpsc::UnboundedReceiver<Frame> {
        let key = self.ctx.config.monitor_key.clone();
        self.dispatcher.connect(sid, Credential::MonitorKey(key)).await.expect("connect should succeed");
        self.register(sid)
    }

    fn register(&self, sid: &str) -> mpsc::UnboundedReceiver<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.ctx.outbound.register(sid.to_string(), tx);
        rx
    }

    /// Sends one frame through the dispatcher, exactly as the transport layer would.
    pub async fn send(&self, sid: &str, event: &str, data: serde_json::Value) {
        self.dispatcher.handle_frame(sid, Frame::new(event, data)).await;
    }

    /// Sends an `INIT_LESSON` for `course_id`/`lesson_id` and waits for its response.
    pub async fn init_lesson(&self, sid: &str, rx: &mut mpsc::UnboundedReceiver<Frame>, course_id: i64, lesson_id: i64) -> Frame {
        self.send(sid, "INIT_LESSON", serde_json::json!({"courseId": course_id, "lessonId": lesson_id})).await;
        let response = recv_event(rx, "INIT_LESSON").await;
        settle().await;
        response
    }

    pub async fn disconnect(&self, sid: &str) {
        self.dispatcher.disconnect(sid).await;
    }
}

/// Drains `rx` until it sees `event`, or panics after a short timeout. Room
/// fan-out and the caller's own direct reply can interleave, so tests filter
/// by name rather than assuming strict ordering.
pub async fn recv_event(rx: &mut mpsc::UnboundedReceiver<Frame>, event: &str) -> Frame {
    loop {
        let next = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
        match next {
            Ok(Some(frame)) if frame.event == event => return frame,
            Ok(Some(_)) => continue,
            Ok(None) => panic!("channel closed waiting for {event}"),
            Err(_) => panic!("timed out waiting for {event}"),
        }
    }
}

/// Asserts that no more frames arrive within a short window (used to check a
/// revoked/excluded party does *not* hear about something).
pub async fn assert_no_event(rx: &mut mpsc::UnboundedReceiver<Frame>, event: &str) {
    let outcome = tokio::time::timeout(Duration::from_millis(100), async {
        loop {
            match rx.recv().await {
                Some(frame) if frame.event == event => return Some(frame),
                Some(_) => continue,
                None => return None,
            }
        }
    })
    .await;
    if let Ok(Some(frame)) = outcome {
        panic!("unexpectedly received {event}: {frame:?}");
    }
}

/// Gives background room-forwarder tasks (spawned by `join_room`) a chance
/// to finish subscribing before a test publishes into the room.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
}
