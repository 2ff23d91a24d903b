//! `DIR_INFO`, `FILE_READ`, `FILE_CREATE`, `FILE_UPDATE`, `FILE_DELETE`,
//! `FILE_MOD`, `FILE_SAVE` (spec §4.G / §4.M).

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use classroom_protocol::events::files::{
    DirInfo, DirInfoResponse, EntryType, FileContent, FileCreate, FileDelete, FileEventBroadcast, FileMod, FileModBroadcast, FileRead,
    FileSave, FileUpdate,
};
use classroom_protocol::events::names::{DIR_INFO, FILE_CREATE, FILE_DELETE, FILE_MOD, FILE_READ, FILE_SAVE, FILE_UPDATE};
use classroom_protocol::events::permissions::Permission;
use classroom_protocol::{ErrorKind, Frame};

use crate::context::AppContext;
use crate::dispatcher::Emitter;
use crate::error::{ClassroomError, Result};
use crate::filestore::{FileOwner, Listing};
use crate::keys::{encode_filename, reject_nul_byte};
use crate::rooms::RoomName;
use crate::session::Session;

use super::{lesson_scope, object_scope, require_project_access};

async fn list_with_rehydrate(ctx: &Arc<AppContext>, lesson: crate::keys::LessonScope, object_scope: crate::keys::ObjectScope, owner_id: i64) -> Result<Vec<crate::filestore::ListedFile>> {
    match ctx.files.list(lesson, FileOwner::Participant(owner_id)).await? {
        Listing::Ready(files) => Ok(files),
        Listing::Cold => {
            ctx.files.rehydrate_participant(lesson, object_scope, owner_id).await?;
            match ctx.files.list(lesson, FileOwner::Participant(owner_id)).await? {
                Listing::Ready(files) => Ok(files),
                Listing::Cold => Err(ErrorKind::ProjectFileMissing.into()),
            }
        }
    }
}

/// `DIR_INFO{targetId}`: lists a project's files, rehydrating from the
/// object-store backup if the hot tier has gone cold. Returns the encoded
/// member names as stored (spec §8 E2E scenario 1: "returns the two encoded
/// names"), directory marks included — callers decode with
/// `classroom_core::keys::decode_filename`.
pub async fn dir_info(ctx: &Arc<AppContext>, session: &Session, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let req: DirInfo = frame.parse()?;
    require_project_access(ctx, session, req.target_id, Permission::READ).await?;
    let files = list_with_rehydrate(ctx, lesson_scope(session)?, object_scope(session)?, req.target_id).await?;
    emitter.to_caller(DIR_INFO, DirInfoResponse { files: files.into_iter().map(|f| f.name).collect() });
    Ok(())
}

/// `FILE_READ{ownerId,file}`: returns base64-encoded content, rehydrating
/// once on a cold miss before giving up.
pub async fn file_read(ctx: &Arc<AppContext>, session: &Session, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let req: FileRead = frame.parse()?;
    require_project_access(ctx, session, req.owner_id, Permission::READ).await?;
    let lesson = lesson_scope(session)?;
    let encoded_name = encode_filename(&req.file);
    let content = match ctx.files.get_content(lesson, FileOwner::Participant(req.owner_id), &encoded_name).await {
        Err(ClassroomError::Protocol(ErrorKind::FileNotFound)) => {
            ctx.files.rehydrate_participant(lesson, object_scope(session)?, req.owner_id).await?;
            ctx.files.get_content(lesson, FileOwner::Participant(req.owner_id), &encoded_name).await?
        }
        other => other?,
    };
    emitter.to_caller(FILE_READ, FileContent { content: BASE64.encode(content) });
    Ok(())
}

/// `FILE_CREATE{ownerId,type,name,content?}`: creates a file or directory.
/// Fanned out to `SUBS_PTC(ownerId)` only — the caller is a member of that
/// room whenever they own the project or already subscribe to it.
pub async fn file_create(ctx: &Arc<AppContext>, session: &Session, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let req: FileCreate = frame.parse()?;
    require_project_access(ctx, session, req.owner_id, Permission::READ | Permission::WRITE).await?;
    reject_nul_byte(&req.name)?;
    let lesson = lesson_scope(session)?;
    let owner = FileOwner::Participant(req.owner_id);
    match req.entry_type {
        EntryType::Directory => {
            ctx.files.create_directory(lesson, owner, &req.name).await?;
        }
        EntryType::File => {
            let content = req.content.as_deref().unwrap_or("");
            let encoded_name = encode_filename(&req.name);
            ctx.files.create(lesson, owner, &encoded_name, content.as_bytes(), true).await?;
        }
    }
    let actor_id = super::participant_id(session)?;
    let room = RoomName::subs_ptc(super::course_id(session)?, super::lesson_id(session)?, req.owner_id);
    emitter
        .to_room(&room, FILE_CREATE, FileEventBroadcast { actor_id, owner_id: req.owner_id, name: req.name, rename: None })
        .await
}

/// `FILE_UPDATE{ownerId,type,name,rename}`: renames a file or directory,
/// rewriting any code references anchored under the old path (spec §8 E2E
/// scenario 5).
pub async fn file_update(ctx: &Arc<AppContext>, session: &Session, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let req: FileUpdate = frame.parse()?;
    require_project_access(ctx, session, req.owner_id, Permission::READ | Permission::WRITE).await?;
    reject_nul_byte(&req.rename)?;
    let lesson = lesson_scope(session)?;
    let owner = FileOwner::Participant(req.owner_id);
    let lesson_id = super::lesson_id(session)?;
    let project = ctx.metadata.find_project(lesson_id, req.owner_id).await?.ok_or(ErrorKind::ProjectNotFound)?;

    match req.entry_type {
        EntryType::Directory => {
            ctx.files.rename_directory(lesson, owner, &req.name, &req.rename).await?;
            ctx.metadata.rewrite_code_reference_paths(project.id, &req.name, &req.rename).await?;
        }
        EntryType::File => {
            let old_encoded = encode_filename(&req.name);
            let new_encoded = encode_filename(&req.rename);
            ctx.files.rename(lesson, owner, &old_encoded, &new_encoded).await?;
            ctx.metadata.rewrite_code_reference_paths(project.id, &req.name, &req.rename).await?;
        }
    }

    let actor_id = super::participant_id(session)?;
    let room = RoomName::subs_ptc(super::course_id(session)?, lesson_id, req.owner_id);
    emitter
        .to_room(
            &room,
            FILE_UPDATE,
            FileEventBroadcast { actor_id, owner_id: req.owner_id, name: req.name, rename: Some(req.rename) },
        )
        .await
}

/// `FILE_DELETE{ownerId,type,name}`: deletes a file or directory, soft-deleting
/// any code references anchored under it.
pub async fn file_delete(ctx: &Arc<AppContext>, session: &Session, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let req: FileDelete = frame.parse()?;
    require_project_access(ctx, session, req.owner_id, Permission::READ | Permission::WRITE).await?;
    let lesson = lesson_scope(session)?;
    let owner = FileOwner::Participant(req.owner_id);
    let lesson_id = super::lesson_id(session)?;
    let project = ctx.metadata.find_project(lesson_id, req.owner_id).await?.ok_or(ErrorKind::ProjectNotFound)?;

    match req.entry_type {
        EntryType::Directory => {
            ctx.files.delete_directory(lesson, owner, &req.name).await?;
        }
        EntryType::File => {
            let encoded_name = encode_filename(&req.name);
            ctx.files.delete(lesson, owner, &encoded_name).await?;
        }
    }
    ctx.metadata.mark_code_references_deleted(project.id, &req.name).await?;

    let actor_id = super::participant_id(session)?;
    let room = RoomName::subs_ptc(super::course_id(session)?, lesson_id, req.owner_id);
    emitter
        .to_room(&room, FILE_DELETE, FileEventBroadcast { actor_id, owner_id: req.owner_id, name: req.name, rename: None })
        .await
}

/// `FILE_MOD{ownerId,file,cursor,change,timestamp}`: a transient live-edit
/// delta, never persisted — only relayed to the project's subscribers (spec
/// §9 Open Question: FILE_MOD/FILE_SAVE merge semantics are left to clients).
pub async fn file_mod(ctx: &Arc<AppContext>, session: &Session, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let req: FileMod = frame.parse()?;
    require_project_access(ctx, session, req.owner_id, Permission::READ | Permission::WRITE).await?;
    let sender_id = super::participant_id(session)?;
    let room = RoomName::subs_ptc(super::course_id(session)?, super::lesson_id(session)?, req.owner_id);
    emitter
        .to_room(
            &room,
            FILE_MOD,
            FileModBroadcast { sender_id, owner_id: req.owner_id, file: req.file, cursor: req.cursor, change: req.change, timestamp: req.timestamp },
        )
        .await
}

/// `FILE_SAVE{ownerId,file,content}`: persists full file content, enforcing
/// the per-project size cap and hot/cold placement (spec §8 E2E scenario 4
/// "size cap").
pub async fn file_save(ctx: &Arc<AppContext>, session: &Session, frame: &Frame, emitter: &Emitter<'_>) -> Result<()> {
    let req: FileSave = frame.parse()?;
    require_project_access(ctx, session, req.owner_id, Permission::READ | Permission::WRITE).await?;
    let lesson = lesson_scope(session)?;
    let encoded_name = encode_filename(&req.file);
    ctx.files
        .save(lesson, object_scope(session)?, req.owner_id, &encoded_name, req.content.as_bytes())
        .await?;

    let actor_id = super::participant_id(session)?;
    let room = RoomName::subs_ptc(super::course_id(session)?, super::lesson_id(session)?, req.owner_id);
    emitter
        .to_room(&room, FILE_SAVE, FileEventBroadcast { actor_id, owner_id: req.owner_id, name: req.file, rename: None })
        .await
}
