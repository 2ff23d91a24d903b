//! `TIME_SYNC`, `TIME_SYNC_ACK` (spec §4.O): a three-message exchange that
//! estimates a session's clock offset from the server's clock.
//!
//! Leg 1 (`TIME_SYNC{clientSentAt}`) is answered synchronously with leg 2
//! (`TIME_SYNC_ACK` carrying the server's receive/send timestamps, no
//! `clientReceivedAt`). Leg 3 is the client echoing that same event name
//! back with `clientReceivedAt` filled in, which this module resolves into
//! an offset estimate and stores on the session — neither leg needs a
//! lesson binding (spec descriptor table: `needs_in_lesson: false`), since
//! a client may want to sync its clock before `INIT_LESSON`.

use std::sync::Arc;

use classroom_protocol::events::names::TIME_SYNC_ACK;
use classroom_protocol::events::timesync::{TimeSync, TimeSyncAck};
use classroom_protocol::Frame;

use crate::context::AppContext;
use crate::dispatcher::Emitter;
use crate::error::Result;

/// `TIME_SYNC{clientSentAt}`: the first leg. Replies immediately with the
/// second leg, timestamping both the server's receive and send instants.
pub fn time_sync(frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let req: TimeSync = frame.parse()?;
    let server_received_at = chrono::Utc::now().timestamp_millis();
    let server_sent_at = chrono::Utc::now().timestamp_millis();
    emitter.to_caller(
        TIME_SYNC_ACK,
        TimeSyncAck {
            client_sent_at: req.client_sent_at,
            server_received_at,
            server_sent_at,
            client_received_at: None,
        },
    );
    Ok(())
}

/// `TIME_SYNC_ACK` echoed back by the client with `clientReceivedAt` filled
/// in: the third and final leg. Estimates the offset with the standard
/// two-sample NTP-style average and stores it on the session for
/// [`crate::outbound`] (or any handler) to annotate timestamps with.
pub fn time_sync_ack(ctx: &Arc<AppContext>, sid: &str, frame: &Frame) -> Result<()> {
    let req: TimeSyncAck = frame.parse()?;
    let Some(client_received_at) = req.client_received_at else {
        // A client should only ever send the third leg with this field set;
        // treat an incomplete echo as a no-op rather than erroring the session.
        return Ok(());
    };
    let offset = ((req.server_received_at - req.client_sent_at) + (req.server_sent_at - client_received_at)) / 2;
    ctx.sessions.mutate(sid, |s| s.time_diff_ms = Some(offset));
    Ok(())
}
