//! `WS_MONITOR_SUBSCRIBE` (spec §4.O): an admin session opts into the
//! mirrored feed for one lesson's rooms.

use std::sync::Arc;

use classroom_protocol::events::names::WS_MONITOR_SUBSCRIBE;
use classroom_protocol::events::observability::WsMonitorSubscribe;
use classroom_protocol::Frame;

use crate::context::AppContext;
use crate::dispatcher::Emitter;
use crate::error::Result;
use crate::rooms::{RoomName, RoomType};
use crate::session::Session;

use super::join_room;

/// `WS_MONITOR_SUBSCRIBE{courseId,lessonId}`: joins the caller into
/// `admin:monitor:{courseId}:{lessonId}`, the room every other handler's
/// `Emitter::to_room` mirrors its fan-out into. Gated on `needs_admin` by
/// the descriptor table, so only an `X-API-KEY`-authenticated session ever
/// reaches here.
pub async fn ws_monitor_subscribe(ctx: &Arc<AppContext>, sid: &str, _session: &Session, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let req: WsMonitorSubscribe = frame.parse()?;
    let room = RoomName::ws_monitor(req.course_id, req.lesson_id);
    join_room(ctx, sid, RoomType::WsMonitor, &room, None).await?;
    emitter.to_caller(WS_MONITOR_SUBSCRIBE, serde_json::json!({}));
    Ok(())
}
