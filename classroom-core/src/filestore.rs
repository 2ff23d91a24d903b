//! Component G — the two-tier project file store.
//!
//! Every project's file list is a sorted set scored by byte length (spec §3
//! Invariant 1); content under [`crate::config::Config::hot_limit_bytes`]
//! lives inline in the hot tier, larger content is hoisted into the object
//! store under a content-hash key and the hot tier holds only a reference
//! string. Directory presence is a sentinel member in the same sorted set
//! (spec §3 Invariant 4), so a listing and a directory check are both plain
//! KV reads.

use std::sync::Arc;

use classroom_protocol::ErrorKind;

use crate::error::{ClassroomError, Result};
use crate::keys::{content_hash, decode_filename, encode_filename, reject_nul_byte, sanitize_archive_path, LessonScope, ObjectScope};
use crate::kv::KvStore;
use crate::objectstore::ObjectStore;

/// Stored in place of a truly empty value, since the hot tier rejects
/// zero-length strings (spec SPEC_FULL §7 "Empty-file sentinel"). The
/// file-list score still records the real (possibly zero) length.
const EMPTY_CONTENT_SENTINEL: &[u8] = b" ";

/// Marker suffix appended to a directory path to record its presence as a
/// file-list member (spec §3 Invariant 4): `{dir}/\0dir`. The leading NUL
/// byte can never appear in a user-supplied name (the create path rejects
/// it via [`reject_nul_byte`]), so the encoded marker can never alias an
/// encoded user filename.
const DIR_MARK_SUFFIX: &str = "\0dir";

const BULK_REF_PREFIX: &str = "objref:";

pub(crate) fn bulk_reference(object_key: &str) -> String {
    format!("{BULK_REF_PREFIX}{object_key}")
}

pub(crate) fn parse_bulk_reference(raw: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(raw).ok()?;
    text.strip_prefix(BULK_REF_PREFIX).map(str::to_owned)
}

/// Which file list and content-key family an operation targets: a
/// participant's live project, or the lesson-wide template cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOwner {
    /// A participant's own project.
    Participant(i64),
    /// The lesson's shared template cache.
    Template,
}

/// One entry returned by [`FileStore::list`].
#[derive(Debug, Clone, PartialEq)]
pub struct ListedFile {
    /// Encoded filename (or directory marker member).
    pub name: String,
    /// Byte length at last write.
    pub size: u64,
}

/// The outcome of a listing attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    /// Every member's content key was present; the listing is authoritative.
    Ready(Vec<ListedFile>),
    /// At least one member's content was missing. The caller must rehydrate
    /// (see [`FileStore::rehydrate_participant`]) and list again.
    Cold,
}

/// Two-tier content store for lesson templates and participant projects
/// (component G).
pub struct FileStore {
    kv: Arc<dyn KvStore>,
    objects: Arc<dyn ObjectStore>,
    hot_limit_bytes: u64,
    project_size_limit_bytes: u64,
}

impl FileStore {
    /// Builds a file store bound to the configured hot/cold placement
    /// threshold and per-project size cap.
    pub fn new(
        kv: Arc<dyn KvStore>,
        objects: Arc<dyn ObjectStore>,
        hot_limit_bytes: u64,
        project_size_limit_bytes: u64,
    ) -> Self {
        Self {
            kv,
            objects,
            hot_limit_bytes,
            project_size_limit_bytes,
        }
    }

    fn list_key(&self, lesson: LessonScope, owner: FileOwner) -> String {
        match owner {
            FileOwner::Template => lesson.template_file_list(),
            FileOwner::Participant(id) => lesson.participant_file_list(id),
        }
    }

    /// Both the template and participant families hash the *encoded
    /// filename* into the content key, matching spec §4.E's literal
    /// `template:files:{md5(encFilename)}` / `{ptcId}:files:{md5(encFilename)}`.
    fn content_key(&self, lesson: LessonScope, owner: FileOwner, encoded_name: &str) -> String {
        let hash = content_hash(encoded_name.as_bytes());
        match owner {
            FileOwner::Template => lesson.template_file_content(&hash),
            FileOwner::Participant(id) => lesson.participant_file_content(id, &hash),
        }
    }

    fn dir_mark_member(decoded_dir: &str) -> String {
        encode_filename(&format!("{decoded_dir}/{DIR_MARK_SUFFIX}"))
    }

    fn ancestor_dirs(decoded_path: &str) -> Vec<String> {
        let parts: Vec<&str> = decoded_path.split('/').collect();
        (1..parts.len()).map(|i| parts[..i].join("/")).collect()
    }

    /// Every prefix of `decoded_dir`, including itself, in root-to-leaf order.
    fn dir_chain(decoded_dir: &str) -> Vec<String> {
        let parts: Vec<&str> = decoded_dir.split('/').collect();
        (1..=parts.len()).map(|i| parts[..i].join("/")).collect()
    }

    async fn ensure_dir_marked(&self, lesson: LessonScope, owner: FileOwner, list_key: &str, decoded_dir: &str) -> Result<()> {
        let marker = Self::dir_mark_member(decoded_dir);
        if self.kv.zscore(list_key, &marker).await?.is_some() {
            return Ok(());
        }
        let content_key = self.content_key(lesson, owner, &marker);
        self.kv.set(&content_key, EMPTY_CONTENT_SENTINEL).await?;
        self.kv.zadd(list_key, &marker, 0.0).await?;
        Ok(())
    }

    async fn mark_dirs(&self, lesson: LessonScope, owner: FileOwner, encoded_name: &str) -> Result<()> {
        let decoded = decode_filename(encoded_name);
        let list_key = self.list_key(lesson, owner);
        for dir in Self::ancestor_dirs(&decoded) {
            self.ensure_dir_marked(lesson, owner, &list_key, &dir).await?;
        }
        Ok(())
    }

    /// Creates a directory entry (and every ancestor directory) without any
    /// file content. Fails with [`ErrorKind::FileExists`] if `decoded_dir` is
    /// already marked (spec §6 `FILE_CREATE{type:"directory"}`).
    pub async fn create_directory(&self, lesson: LessonScope, owner: FileOwner, decoded_dir: &str) -> Result<()> {
        reject_nul_byte(decoded_dir)?;
        let list_key = self.list_key(lesson, owner);
        let marker = Self::dir_mark_member(decoded_dir);
        if self.kv.zscore(&list_key, &marker).await?.is_some() {
            return Err(ErrorKind::FileExists.into());
        }
        for dir in Self::dir_chain(decoded_dir) {
            self.ensure_dir_marked(lesson, owner, &list_key, &dir).await?;
        }
        Ok(())
    }

    /// Lists a project's (or template's) files. Returns [`Listing::Cold`] if
    /// any file-list member's content is missing, signaling the caller to
    /// rehydrate (spec §4.G "list" contract).
    pub async fn list(&self, lesson: LessonScope, owner: FileOwner) -> Result<Listing> {
        let list_key = self.list_key(lesson, owner);
        let members = self.kv.zscan(&list_key).await?;
        let mut out = Vec::with_capacity(members.len());
        for member in &members {
            let content_key = self.content_key(lesson, owner, &member.member);
            if self.kv.strlen(&content_key).await? == 0 {
                return Ok(Listing::Cold);
            }
            out.push(ListedFile {
                name: member.member.clone(),
                size: member.score as u64,
            });
        }
        Ok(Listing::Ready(out))
    }

    /// `true` iff `decoded_dir` has been marked present under `owner`.
    pub async fn has_directory(&self, lesson: LessonScope, owner: FileOwner, decoded_dir: &str) -> Result<bool> {
        let list_key = self.list_key(lesson, owner);
        let marker = Self::dir_mark_member(decoded_dir);
        Ok(self.kv.zscore(&list_key, &marker).await?.is_some())
    }

    /// Creates a new file. Fails with [`ErrorKind::FileExists`] if the
    /// encoded name is already present.
    pub async fn create(
        &self,
        lesson: LessonScope,
        owner: FileOwner,
        encoded_name: &str,
        content: &[u8],
        mark_dirs: bool,
    ) -> Result<()> {
        reject_nul_byte(&decode_filename(encoded_name))?;
        let list_key = self.list_key(lesson, owner);
        if self.kv.zscore(&list_key, encoded_name).await?.is_some() {
            return Err(ErrorKind::FileExists.into());
        }
        let content_key = self.content_key(lesson, owner, encoded_name);
        let stored: &[u8] = if content.is_empty() { EMPTY_CONTENT_SENTINEL } else { content };
        self.kv.set(&content_key, stored).await?;
        self.kv.zadd(&list_key, encoded_name, content.len() as f64).await?;
        if let FileOwner::Participant(id) = owner {
            self.kv
                .incrby(&lesson.participant_size(id), content.len() as i64)
                .await?;
        }
        if mark_dirs {
            self.mark_dirs(lesson, owner, encoded_name).await?;
        }
        Ok(())
    }

    /// Renames a single file. Fails with [`ErrorKind::FileNotFound`] if
    /// `old_encoded` is absent, or [`ErrorKind::FileExists`] if `new_encoded`
    /// is already taken — including the race where a concurrent writer
    /// claims `new_encoded` between the file-list update and the
    /// rename-if-absent on the content key, in which case the file-list
    /// mutation is reverted (spec §4.G "Race on rename").
    pub async fn rename(
        &self,
        lesson: LessonScope,
        owner: FileOwner,
        old_encoded: &str,
        new_encoded: &str,
    ) -> Result<()> {
        reject_nul_byte(&decode_filename(new_encoded))?;
        let list_key = self.list_key(lesson, owner);
        if self.kv.zscore(&list_key, new_encoded).await?.is_some() {
            return Err(ErrorKind::FileExists.into());
        }
        let score = self
            .kv
            .zscore(&list_key, old_encoded)
            .await?
            .ok_or(ErrorKind::FileNotFound)?;

        self.kv.zadd(&list_key, new_encoded, score).await?;
        self.kv.zrem(&list_key, old_encoded).await?;

        let old_content_key = self.content_key(lesson, owner, old_encoded);
        let new_content_key = self.content_key(lesson, owner, new_encoded);
        if !self.kv.rename_nx(&old_content_key, &new_content_key).await? {
            self.kv.zrem(&list_key, new_encoded).await?;
            self.kv.zadd(&list_key, old_encoded, score).await?;
            return Err(ErrorKind::FileExists.into());
        }
        Ok(())
    }

    /// Renames every entry under `old_dir` to live under `new_dir`,
    /// including the directory's own mark (which is itself a member whose
    /// decoded form starts with `{old_dir}/`, so the sweep below picks it up
    /// too). Base64 is not prefix-preserving, so unlike a plain percent
    /// encoding this must decode every member before filtering rather than
    /// scanning the sorted set by encoded prefix.
    pub async fn rename_directory(
        &self,
        lesson: LessonScope,
        owner: FileOwner,
        old_dir: &str,
        new_dir: &str,
    ) -> Result<()> {
        reject_nul_byte(new_dir)?;
        let list_key = self.list_key(lesson, owner);
        let decoded_prefix = format!("{old_dir}/");
        let members = self.kv.zscan(&list_key).await?;
        for member in members {
            let decoded = decode_filename(&member.member);
            let Some(suffix) = decoded.strip_prefix(&decoded_prefix) else {
                continue;
            };
            let new_decoded = format!("{new_dir}/{suffix}");
            let new_encoded = encode_filename(&new_decoded);
            self.kv.zadd(&list_key, &new_encoded, member.score).await?;
            self.kv.zrem(&list_key, &member.member).await?;
            let old_content_key = self.content_key(lesson, owner, &member.member);
            let new_content_key = self.content_key(lesson, owner, &new_encoded);
            self.kv.rename_nx(&old_content_key, &new_content_key).await?;
        }
        Ok(())
    }

    /// Deletes a single file, including its cold-tier object if it held a
    /// bulk reference.
    pub async fn delete(&self, lesson: LessonScope, owner: FileOwner, encoded_name: &str) -> Result<()> {
        let list_key = self.list_key(lesson, owner);
        let score = self
            .kv
            .zscore(&list_key, encoded_name)
            .await?
            .ok_or(ErrorKind::FileNotFound)?;
        let content_key = self.content_key(lesson, owner, encoded_name);
        if let Some(raw) = self.kv.get(&content_key).await? {
            if let Some(object_key) = parse_bulk_reference(&raw) {
                self.objects.delete(&object_key).await?;
            }
        }
        self.kv.delete(&content_key).await?;
        self.kv.zrem(&list_key, encoded_name).await?;
        if let FileOwner::Participant(id) = owner {
            self.kv
                .incrby(&lesson.participant_size(id), -(score as i64))
                .await?;
        }
        Ok(())
    }

    /// Deletes every entry at or under `decoded_dir`, including its own mark.
    pub async fn delete_directory(&self, lesson: LessonScope, owner: FileOwner, decoded_dir: &str) -> Result<()> {
        let list_key = self.list_key(lesson, owner);
        let decoded_prefix = format!("{decoded_dir}/");
        let members = self.kv.zscan(&list_key).await?;
        for member in members {
            if !decode_filename(&member.member).starts_with(&decoded_prefix) {
                continue;
            }
            self.delete(lesson, owner, &member.member).await?;
        }
        let marker = Self::dir_mark_member(decoded_dir);
        if self.kv.zscore(&list_key, &marker).await?.is_some() {
            self.delete(lesson, owner, &marker).await?;
        }
        Ok(())
    }

    /// Reads the current total (`current_total + delta` would exceed the cap
    /// check lives in [`FileStore::save`]) byte count for a participant.
    async fn read_total(&self, lesson: LessonScope, participant_id: i64) -> Result<i64> {
        match self.kv.get(&lesson.participant_size(participant_id)).await? {
            Some(bytes) => Ok(std::str::from_utf8(&bytes)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0)),
            None => Ok(0),
        }
    }

    /// Upserts a participant file's content, enforcing the per-project size
    /// cap and hot/cold placement (spec §4.G "save").
    pub async fn save(
        &self,
        lesson: LessonScope,
        object_scope: ObjectScope,
        participant_id: i64,
        encoded_name: &str,
        content: &[u8],
    ) -> Result<()> {
        reject_nul_byte(&decode_filename(encoded_name))?;
        let list_key = lesson.participant_file_list(participant_id);
        let prev_score = self.kv.zscore(&list_key, encoded_name).await?.unwrap_or(0.0) as i64;
        let new_len = content.len() as i64;
        let delta = new_len - prev_score;

        let current_total = self.read_total(lesson, participant_id).await?;
        if current_total + delta > self.project_size_limit_bytes as i64 {
            return Err(ErrorKind::TotalSizeExceeded.into());
        }

        let content_key = self.content_key(lesson, FileOwner::Participant(participant_id), encoded_name);
        if content.len() as u64 > self.hot_limit_bytes {
            let hash = content_hash(content);
            let object_key = object_scope.bulk_file(&hash);
            self.objects.put(&object_key, content.to_vec()).await?;
            self.kv.set(&content_key, bulk_reference(&object_key).as_bytes()).await?;
        } else {
            let stored: &[u8] = if content.is_empty() { EMPTY_CONTENT_SENTINEL } else { content };
            self.kv.set(&content_key, stored).await?;
        }

        self.kv.zadd(&list_key, encoded_name, new_len as f64).await?;
        if delta != 0 {
            self.kv.incrby(&lesson.participant_size(participant_id), delta).await?;
        }
        self.mark_dirs(lesson, FileOwner::Participant(participant_id), encoded_name)
            .await?;
        Ok(())
    }

    /// Reads a file's content, resolving a bulk reference through the object
    /// store and unwrapping the empty-content sentinel.
    pub async fn get_content(
        &self,
        lesson: LessonScope,
        owner: FileOwner,
        encoded_name: &str,
    ) -> Result<Vec<u8>> {
        let content_key = self.content_key(lesson, owner, encoded_name);
        let raw = self.kv.get(&content_key).await?.ok_or(ErrorKind::FileNotFound)?;
        if let Some(object_key) = parse_bulk_reference(&raw) {
            return self
                .objects
                .get(&object_key)
                .await?
                .ok_or_else(|| ErrorKind::ProjectFileMissing.into());
        }
        if raw == EMPTY_CONTENT_SENTINEL {
            return Ok(Vec::new());
        }
        Ok(raw)
    }

    /// Rehydrates a participant's project from its object-store backup
    /// archive after the hot tier has evicted it (empty file-list on a
    /// project known to have been created). Fails with
    /// [`ErrorKind::ProjectFileMissing`] if no backup archive exists.
    pub async fn rehydrate_participant(
        &self,
        lesson: LessonScope,
        object_scope: ObjectScope,
        participant_id: i64,
    ) -> Result<()> {
        let archive_key = object_scope.participant_project(participant_id);
        let zip_bytes = self
            .objects
            .get(&archive_key)
            .await?
            .ok_or(ErrorKind::ProjectFileMissing)?;
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes))
            .map_err(|e| ClassroomError::InvalidArchive(e.to_string()))?;
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| ClassroomError::InvalidArchive(e.to_string()))?;
            if entry.is_dir() {
                continue;
            }
            let name = sanitize_archive_path(entry.name()).map_err(ClassroomError::InvalidArchive)?;
            let mut content = Vec::with_capacity(entry.size() as usize);
            std::io::Read::read_to_end(&mut entry, &mut content)
                .map_err(|e| ClassroomError::InvalidArchive(e.to_string()))?;
            let encoded = encode_filename(&name);
            self.save(lesson, object_scope, participant_id, &encoded, &content).await?;
        }
        Ok(())
    }

    /// Reads a viewer's last recorded cursor position into `owner`'s file
    /// `decoded_file`, if any (spec §4.G "lastCursor").
    pub async fn last_cursor(
        &self,
        lesson: LessonScope,
        viewer_id: i64,
        owner_id: i64,
        encoded_file: &str,
    ) -> Result<Option<Vec<u8>>> {
        let field = format!("{owner_id}.{encoded_file}");
        self.kv.hget(&lesson.participant_prev_cursor(viewer_id), &field).await
    }

    /// Persists a viewer's cursor position into `owner`'s file `decoded_file`.
    pub async fn set_last_cursor(
        &self,
        lesson: LessonScope,
        viewer_id: i64,
        owner_id: i64,
        encoded_file: &str,
        value: &[u8],
    ) -> Result<()> {
        let field = format!("{owner_id}.{encoded_file}");
        self.kv.hset(&lesson.participant_prev_cursor(viewer_id), &field, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestor_dirs_excludes_the_file_itself() {
        assert_eq!(
            FileStore::ancestor_dirs("a/b/c.py"),
            vec!["a".to_string(), "a/b".to_string()]
        );
        assert!(FileStore::ancestor_dirs("c.py").is_empty());
    }

    #[test]
    fn bulk_reference_round_trips() {
        let reference = bulk_reference("course/1/2/bulk/abcdef");
        let parsed = parse_bulk_reference(reference.as_bytes()).unwrap();
        assert_eq!(parsed, "course/1/2/bulk/abcdef");
    }

    #[test]
    fn plain_content_is_not_mistaken_for_a_bulk_reference() {
        assert!(parse_bulk_reference(b"fn main() {}").is_none());
    }

    #[test]
    fn dir_mark_member_uses_a_nul_prefixed_suffix_that_never_aliases_a_user_filename() {
        let marker = FileStore::dir_mark_member("src/utils");
        assert_eq!(decode_filename(&marker), "src/utils/\0dir");
        // No legitimate user filename can collide: the create path rejects NUL bytes.
        assert!(reject_nul_byte(" dir").is_ok());
        assert!(reject_nul_byte("\0dir").is_err());
    }
}
