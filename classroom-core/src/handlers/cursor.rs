//! `CURSOR_LAST`, `CURSOR_MOVE` (spec §4.G "lastCursor" / §4.M).

use std::sync::Arc;

use classroom_protocol::events::cursor::{CursorLast, CursorLastResponse, CursorMove, CursorMoveBroadcast};
use classroom_protocol::events::names::{CURSOR_LAST, CURSOR_MOVE};
use classroom_protocol::events::permissions::Permission;
use classroom_protocol::Frame;

use crate::context::AppContext;
use crate::dispatcher::Emitter;
use crate::error::Result;
use crate::keys::encode_filename;
use crate::rooms::RoomName;
use crate::session::Session;

use super::{lesson_scope, require_project_access};

/// `CURSOR_LAST{ownerId,file}`: the viewer's own last recorded cursor
/// position into `ownerId`'s file, or `None` if nothing was ever recorded.
pub async fn cursor_last(ctx: &Arc<AppContext>, session: &Session, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let req: CursorLast = frame.parse()?;
    require_project_access(ctx, session, req.owner_id, Permission::READ).await?;
    let viewer_id = super::participant_id(session)?;
    let lesson = lesson_scope(session)?;
    let encoded_name = encode_filename(&req.file);
    let stored = ctx.files.last_cursor(lesson, viewer_id, req.owner_id, &encoded_name).await?;
    let cursor = stored.and_then(|bytes| serde_json::from_slice(&bytes).ok());
    emitter.to_caller(CURSOR_LAST, CursorLastResponse { cursor });
    Ok(())
}

/// `CURSOR_MOVE{fileInfo,timestamp,event?}`: requires `READ`; persists the
/// viewer's position into `ownerId`'s file unless `event == "open"` (spec
/// §4.M: "When `event=="open"` the cursor is not persisted"), and always
/// broadcasts the move to `SUBS_PTC(ownerId)`.
pub async fn cursor_move(ctx: &Arc<AppContext>, session: &Session, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let req: CursorMove = frame.parse()?;
    require_project_access(ctx, session, req.file_info.owner_id, Permission::READ).await?;
    let viewer_id = super::participant_id(session)?;
    let lesson = lesson_scope(session)?;
    let encoded_name = encode_filename(&req.file_info.file);

    if !req.is_transient_open() {
        let value = serde_json::to_vec(&req.file_info.cursor)?;
        ctx.files
            .set_last_cursor(lesson, viewer_id, req.file_info.owner_id, &encoded_name, &value)
            .await?;
    }

    let room = RoomName::subs_ptc(super::course_id(session)?, super::lesson_id(session)?, req.file_info.owner_id);
    emitter
        .to_room(
            &room,
            CURSOR_MOVE,
            CursorMoveBroadcast { sender_id: viewer_id, file_info: req.file_info, timestamp: req.timestamp },
        )
        .await
}
