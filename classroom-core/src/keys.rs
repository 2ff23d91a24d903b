//! Component E — deterministic key derivation.
//!
//! Every key is scoped under a `course_id:lesson_id` (or `/course/{c}/{l}`
//! for the object store) prefix, matching the upstream system's
//! `RedisKey`/`S3Key` templates. Keeping the scheme in one place means the
//! hot tier, the cold tier, and the rename path (which must address the
//! *same* logical key across both) never drift apart.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use classroom_protocol::ErrorKind;
use md5::{Digest, Md5};

use crate::error::Result;

/// Namespaces a course+lesson scope for hot-tier (Redis) keys.
#[derive(Debug, Clone, Copy)]
pub struct LessonScope {
    course_id: i64,
    lesson_id: i64,
}

impl LessonScope {
    /// Scopes keys to one course/lesson pair.
    pub fn new(course_id: i64, lesson_id: i64) -> Self {
        Self {
            course_id,
            lesson_id,
        }
    }

    fn prefix(&self) -> String {
        format!("crs:{}:{}:", self.course_id, self.lesson_id)
    }

    /// `ZSET` of the lesson template's filenames, scored by byte length.
    pub fn template_file_list(&self) -> String {
        format!("{}template:files", self.prefix())
    }

    /// `STRING` holding one template file's content, keyed by content hash.
    pub fn template_file_content(&self, content_hash: &str) -> String {
        format!("{}template:files:{content_hash}", self.prefix())
    }

    /// `STRING` integer counter of a participant's total content size.
    pub fn participant_size(&self, participant_id: i64) -> String {
        format!("{}{participant_id}:size", self.prefix())
    }

    /// `HASH` of `target_user_id.filename` -> last-seen cursor info.
    pub fn participant_prev_cursor(&self, participant_id: i64) -> String {
        format!("{}{participant_id}:csr:last", self.prefix())
    }

    /// `ZSET` of a participant's project filenames, scored by byte length.
    pub fn participant_file_list(&self, participant_id: i64) -> String {
        format!("{}{participant_id}:files", self.prefix())
    }

    /// `STRING` holding one of a participant's file contents, keyed by
    /// `md5(encFilename)` (spec §4.E: `{ptcId}:files:{md5(encFilename)}`),
    /// matching the template family's content-hash keying just above.
    pub fn participant_file_content(&self, participant_id: i64, content_hash: &str) -> String {
        format!("{}{participant_id}:files:{content_hash}", self.prefix())
    }
}

/// Namespaces a course+lesson scope for cold-tier (object store) keys.
#[derive(Debug, Clone, Copy)]
pub struct ObjectScope {
    course_id: i64,
    lesson_id: i64,
}

impl ObjectScope {
    /// Scopes keys to one course/lesson pair.
    pub fn new(course_id: i64, lesson_id: i64) -> Self {
        Self {
            course_id,
            lesson_id,
        }
    }

    fn prefix(&self) -> String {
        format!("course/{}/{}", self.course_id, self.lesson_id)
    }

    /// The lesson's template archive.
    pub fn lesson_template(&self) -> String {
        format!("{}/template.zip", self.prefix())
    }

    /// A participant's project archive.
    pub fn participant_project(&self, participant_id: i64) -> String {
        format!("{}/project/{participant_id}.zip", self.prefix())
    }

    /// An oversized individual file, addressed by a hash of its content
    /// rather than its name, since the same blob may be referenced by
    /// differently-renamed files over a project's history.
    pub fn bulk_file(&self, content_hash: &str) -> String {
        format!("{}/bulk/{content_hash}", self.prefix())
    }
}

/// Encodes a filename (which may contain `/`, unicode, or reserved
/// characters) into a string safe as a single KV hash-map field or sorted-set
/// member: URL-quoted, then base64-encoded (spec §4.E), matching the
/// original's `text_encode`. The base64 step is what lets the directory-mark
/// sentinel's raw NUL byte (see [`crate::filestore`]) travel through a
/// sorted-set member without ever aliasing a real filename's encoding.
pub fn encode_filename(name: &str) -> String {
    BASE64.encode(urlencoding::encode(name).as_bytes())
}

/// Reverses [`encode_filename`].
pub fn decode_filename(encoded: &str) -> String {
    BASE64
        .decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|quoted| urlencoding::decode(&quoted).map(|s| s.into_owned()).ok())
        .unwrap_or_else(|| encoded.to_owned())
}

/// Rejects a user-supplied name containing a raw NUL byte, which is reserved
/// for the directory-mark sentinel and would otherwise be indistinguishable
/// from it once encoded.
pub fn reject_nul_byte(name: &str) -> Result<()> {
    if name.contains('\0') {
        return Err(ErrorKind::InvalidFilename.into());
    }
    Ok(())
}

/// Hex MD5 digest of `content`, used both as the template file-content key
/// suffix and as the cold-tier bulk-file key.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Rejects absolute paths and parent-directory traversal in a ZIP entry
/// name (spec §9 "Archive extraction safety"), shared by template
/// extraction and project-archive rehydration — both unpack
/// tenant-supplied-adjacent content into the hot tier.
pub fn sanitize_archive_path(name: &str) -> Result<String, String> {
    if name.starts_with('/') || name.starts_with('\\') || name.contains(':') {
        return Err(format!("absolute path in archive: {name}"));
    }
    if name.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(format!("parent traversal in archive: {name}"));
    }
    Ok(name.trim_end_matches('/').replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_scope_namespaces_by_course_and_lesson() {
        let scope = LessonScope::new(1, 2);
        assert_eq!(scope.template_file_list(), "crs:1:2:template:files");
        assert_eq!(scope.participant_size(1234), "crs:1:2:1234:size");
    }

    #[test]
    fn object_scope_matches_the_slash_prefixed_layout() {
        let scope = ObjectScope::new(7, 9);
        assert_eq!(scope.lesson_template(), "course/7/9/template.zip");
        assert_eq!(scope.participant_project(42), "course/7/9/project/42.zip");
    }

    #[test]
    fn filename_round_trips_through_encoding() {
        let name = "src/utils/lib file (v2).rs";
        assert_eq!(decode_filename(&encode_filename(name)), name);
    }

    #[test]
    fn encode_filename_matches_the_known_oracle_value() {
        assert_eq!(encode_filename("asdf"), "YXNkZg==");
    }

    #[test]
    fn reject_nul_byte_rejects_only_names_containing_nul() {
        assert!(reject_nul_byte("main.py").is_ok());
        assert!(reject_nul_byte("main\0py").is_err());
    }

    #[test]
    fn content_hash_is_stable_and_content_addressed() {
        let a = content_hash(b"fn main() {}");
        let b = content_hash(b"fn main() {}");
        let c = content_hash(b"fn main() { panic!() }");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
    }
}
