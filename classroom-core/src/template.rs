//! Component H — lesson template rehydration into a new participant project.
//!
//! A lesson's template archive is extracted into a shared `template:files`
//! cache at most once (by whichever participant enters first); every
//! subsequent participant copies from that cache rather than re-extracting
//! the ZIP. Because oversized entries are hoisted into the object store under
//! a content-hash key (see `classroom-core::keys::ObjectScope::bulk_file`),
//! copying such an entry into a participant's project costs one KV write of
//! the reference string, not a duplicate upload.

use std::io::Read;
use std::sync::Arc;

use classroom_protocol::ErrorKind;
use zip::ZipArchive;

use crate::error::{ClassroomError, Result};
use crate::filestore::bulk_reference;
use crate::keys::{content_hash, encode_filename, sanitize_archive_path, LessonScope, ObjectScope};
use crate::kv::KvStore;
use crate::objectstore::ObjectStore;

/// Stored in place of a truly empty value; mirrors `filestore`'s sentinel.
const EMPTY_CONTENT_SENTINEL: &[u8] = b" ";

/// Rehydrates a lesson's template archive into a participant's project
/// (component H).
pub struct TemplateApplier {
    kv: Arc<dyn KvStore>,
    objects: Arc<dyn ObjectStore>,
    hot_limit_bytes: u64,
    project_size_limit_bytes: u64,
}

impl TemplateApplier {
    /// Builds an applier bound to the same hot/cold threshold and size cap
    /// as the [`crate::filestore::FileStore`] it feeds.
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

    /// Applies `lesson`'s template into `participant_id`'s project. A no-op
    /// if the lesson carries no template archive key. Callers are
    /// responsible for guarding this with `Project::template_applied` so it
    /// only ever runs once per project (spec §3 Lifecycles).
    pub async fn apply(
        &self,
        lesson: LessonScope,
        object_scope: ObjectScope,
        template_archive_key: Option<&str>,
        participant_id: i64,
    ) -> Result<()> {
        let Some(archive_key) = template_archive_key else {
            return Ok(());
        };
        self.ensure_template_cached(lesson, object_scope, archive_key).await?;
        self.copy_into_participant(lesson, participant_id).await
    }

    async fn ensure_template_cached(
        &self,
        lesson: LessonScope,
        object_scope: ObjectScope,
        archive_key: &str,
    ) -> Result<()> {
        if !self.kv.zscan(&lesson.template_file_list()).await?.is_empty() {
            return Ok(());
        }
        let zip_bytes = self
            .objects
            .get(archive_key)
            .await?
            .ok_or(ErrorKind::ProjectFileMissing)?;
        self.extract_into_template(lesson, object_scope, &zip_bytes).await
    }

    async fn extract_into_template(
        &self,
        lesson: LessonScope,
        object_scope: ObjectScope,
        zip_bytes: &[u8],
    ) -> Result<()> {
        let mut archive = ZipArchive::new(std::io::Cursor::new(zip_bytes))
            .map_err(|e| ClassroomError::InvalidArchive(e.to_string()))?;
        let mut total: u64 = 0;
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| ClassroomError::InvalidArchive(e.to_string()))?;
            if entry.is_dir() {
                continue;
            }
            let name = sanitize_archive_path(entry.name()).map_err(ClassroomError::InvalidArchive)?;
            let mut content = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut content)
                .map_err(|e| ClassroomError::InvalidArchive(e.to_string()))?;
            total += content.len() as u64;
            if total > self.project_size_limit_bytes {
                return Err(ClassroomError::InvalidArchive(
                    "template archive exceeds the project size limit".to_string(),
                ));
            }

            let encoded = encode_filename(&name);
            let content_key = lesson.template_file_content(&content_hash(encoded.as_bytes()));
            if content.len() as u64 > self.hot_limit_bytes {
                let hash = content_hash(&content);
                let object_key = object_scope.bulk_file(&hash);
                self.objects.put(&object_key, content.clone()).await?;
                self.kv.set(&content_key, bulk_reference(&object_key).as_bytes()).await?;
            } else {
                let stored: &[u8] = if content.is_empty() { EMPTY_CONTENT_SENTINEL } else { &content };
                self.kv.set(&content_key, stored).await?;
            }
            self.kv
                .zadd(&lesson.template_file_list(), &encoded, content.len() as f64)
                .await?;
        }
        Ok(())
    }

    async fn copy_into_participant(&self, lesson: LessonScope, participant_id: i64) -> Result<()> {
        let template_members = self.kv.zscan(&lesson.template_file_list()).await?;
        let mut total: i64 = 0;
        for member in &template_members {
            let template_content_key = lesson.template_file_content(&content_hash(member.member.as_bytes()));
            let raw = self
                .kv
                .get(&template_content_key)
                .await?
                .ok_or(ErrorKind::ProjectFileMissing)?;
            let participant_content_key =
                lesson.participant_file_content(participant_id, &content_hash(member.member.as_bytes()));
            self.kv.set(&participant_content_key, &raw).await?;
            self.kv
                .zadd(&lesson.participant_file_list(participant_id), &member.member, member.score)
                .await?;
            total += member.score as i64;
        }
        if total > 0 {
            self.kv
                .incrby(&lesson.participant_size(participant_id), total)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_absolute_paths() {
        assert!(sanitize_archive_path("/etc/passwd").is_err());
    }

    #[test]
    fn rejects_parent_traversal() {
        assert!(sanitize_archive_path("../../etc/passwd").is_err());
        assert!(sanitize_archive_path("a/../../b").is_err());
    }

    #[test]
    fn accepts_ordinary_relative_paths() {
        assert_eq!(sanitize_archive_path("src/main.py").unwrap(), "src/main.py");
    }
}
