//! In-memory fakes for every external-facing trait, so the rest of this
//! crate (and integration tests that build a full [`crate::context::AppContext`])
//! can run without Redis, Postgres, S3, or the upstream auth service.
//!
//! Enabled for `#[cfg(test)]` builds of this crate and, via the `testutil`
//! feature, for anything embedding it — `classroom-server`'s own tests build
//! an [`AppContext`] out of these rather than standing up real infrastructure.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use classroom_protocol::events::permissions::Permission;
use tokio::sync::mpsc;

use crate::auth::{Principal, TokenVerifier};
use crate::context::AppContext;
use crate::error::Result;
use crate::kv::{KvMessage, KvStore, KvSubscription, ScoredMember};
use crate::metastore::{
    CodeReference, Comment, Feedback, FeedbackThread, FeedbackViewer, Lesson, MetadataStore,
    Participant, Project, ProjectViewer, Role,
};
use crate::objectstore::ObjectStore;

/// An in-memory [`KvStore`], used wherever tests need the hot tier, room
/// membership, or pub/sub without Redis. Sorted sets, hashes, and strings
/// each live in their own map, matching Redis's own separation of keyspaces
/// by type.
#[derive(Default)]
pub struct InMemoryKv {
    strings: Mutex<BTreeMap<String, Vec<u8>>>,
    sorted_sets: Mutex<BTreeMap<String, BTreeMap<String, f64>>>,
    hashes: Mutex<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
    channels: Mutex<BTreeMap<String, Vec<mpsc::UnboundedSender<KvMessage>>>>,
}

impl InMemoryKv {
    /// Builds an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

struct InMemorySubscription {
    rx: mpsc::UnboundedReceiver<KvMessage>,
}

#[async_trait]
impl KvSubscription for InMemorySubscription {
    async fn next(&mut self) -> Option<KvMessage> {
        self.rx.recv().await
    }
}

#[async_trait]
impl KvStore for InMemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.strings.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.strings.lock().unwrap().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn strlen(&self, key: &str) -> Result<u64> {
        Ok(self.strings.lock().unwrap().get(key).map_or(0, |v| v.len() as u64))
    }

    async fn incrby(&self, key: &str, delta: i64) -> Result<i64> {
        let mut strings = self.strings.lock().unwrap();
        let current = strings
            .get(key)
            .map(|v| String::from_utf8_lossy(v).parse::<i64>().unwrap_or(0))
            .unwrap_or(0);
        let next = current + delta;
        strings.insert(key.to_string(), next.to_string().into_bytes());
        Ok(next)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut removed = self.strings.lock().unwrap().remove(key).is_some();
        removed |= self.sorted_sets.lock().unwrap().remove(key).is_some();
        removed |= self.hashes.lock().unwrap().remove(key).is_some();
        Ok(removed)
    }

    async fn expire(&self, _key: &str, _ttl_secs: u64) -> Result<()> {
        // TTLs are not observable within a single test run; nothing to do.
        Ok(())
    }

    async fn rename_nx(&self, src: &str, dst: &str) -> Result<bool> {
        let mut strings = self.strings.lock().unwrap();
        if strings.contains_key(dst) {
            return Ok(false);
        }
        let Some(value) = strings.remove(src) else {
            return Ok(false);
        };
        strings.insert(dst.to_string(), value);
        Ok(true)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        self.sorted_sets
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<bool> {
        let mut sets = self.sorted_sets.lock().unwrap();
        Ok(sets.get_mut(key).is_some_and(|set| set.remove(member).is_some()))
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>> {
        Ok(self.sorted_sets.lock().unwrap().get(key).and_then(|set| set.get(member).copied()))
    }

    async fn zscan(&self, key: &str) -> Result<Vec<ScoredMember>> {
        Ok(self
            .sorted_sets
            .lock()
            .unwrap()
            .get(key)
            .map(|set| set.iter().map(|(member, &score)| ScoredMember { member: member.clone(), score }).collect())
            .unwrap_or_default())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.hashes.lock().unwrap().get(key).and_then(|h| h.get(field).cloned()))
    }

    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> Result<()> {
        self.hashes
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_vec());
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<()> {
        let mut channels = self.channels.lock().unwrap();
        if let Some(subscribers) = channels.get_mut(channel) {
            let message = KvMessage { channel: channel.to_string(), payload: payload.to_vec() };
            subscribers.retain(|tx| tx.send(message.clone()).is_ok());
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn KvSubscription>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.lock().unwrap().entry(channel.to_string()).or_default().push(tx);
        Ok(Box::new(InMemorySubscription { rx }))
    }
}

/// An in-memory [`ObjectStore`], standing in for S3 in tests.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryObjectStore {
    /// Builds an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.objects.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn rename(&self, src: &str, dst: &str) -> Result<()> {
        let mut objects = self.objects.lock().unwrap();
        if let Some(value) = objects.remove(src) {
            objects.insert(dst.to_string(), value);
        }
        Ok(())
    }

    async fn size(&self, key: &str) -> Result<Option<u64>> {
        Ok(self.objects.lock().unwrap().get(key).map(|v| v.len() as u64))
    }
}

/// A [`TokenVerifier`] fake: every token of the form `"user:<id>"` resolves
/// to `Principal { user_id: <id> }`; anything else is rejected.
#[derive(Default)]
pub struct FakeTokenVerifier;

impl FakeTokenVerifier {
    /// Builds the fake verifier.
    pub fn new() -> Self {
        Self
    }

    /// The token this fake accepts for a given user id.
    pub fn token_for(user_id: i64) -> String {
        format!("user:{user_id}")
    }
}

#[async_trait]
impl TokenVerifier for FakeTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Option<Principal>> {
        Ok(token.strip_prefix("user:").and_then(|rest| rest.parse().ok()).map(|user_id| Principal { user_id }))
    }
}

/// State backing [`InMemoryMetadataStore`]. Plain fields behind one mutex —
/// this fake has no concurrency story of its own beyond "don't deadlock";
/// it exists to make behavior observable in tests, not to model Postgres's
/// isolation semantics.
#[derive(Default)]
struct MetadataState {
    next_id: i64,
    participants: Vec<Participant>,
    lessons: Vec<Lesson>,
    projects: Vec<Project>,
    viewers: Vec<ProjectViewer>,
    code_refs: Vec<CodeReference>,
    feedbacks: Vec<Feedback>,
    feedback_viewers: Vec<FeedbackViewer>,
    comments: Vec<Comment>,
}

impl MetadataState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// An in-memory [`MetadataStore`], standing in for Postgres in tests.
/// Construction helpers (`seed_participant`, `seed_lesson`) let a test set
/// up fixtures directly rather than going through the wire protocol.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    state: Mutex<MetadataState>,
}

impl InMemoryMetadataStore {
    /// Builds an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a participant directly, returning its assigned id.
    pub fn seed_participant(&self, course_id: i64, user_id: i64, role: Role, nickname: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.participants.push(Participant { id, course_id, user_id, role, nickname: nickname.to_string(), active: false });
        id
    }

    /// Seeds a lesson directly, returning its assigned id.
    pub fn seed_lesson(&self, course_id: i64, template_archive_key: Option<&str>) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.lessons.push(Lesson { id, course_id, template_archive_key: template_archive_key.map(str::to_string) });
        id
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn find_participant(&self, course_id: i64, user_id: i64) -> Result<Option<Participant>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .participants
            .iter()
            .find(|p| p.course_id == course_id && p.user_id == user_id)
            .cloned())
    }

    async fn get_participant(&self, participant_id: i64) -> Result<Option<Participant>> {
        Ok(self.state.lock().unwrap().participants.iter().find(|p| p.id == participant_id).cloned())
    }

    async fn list_course_participants(&self, course_id: i64) -> Result<Vec<Participant>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .participants
            .iter()
            .filter(|p| p.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn set_participant_active(&self, participant_id: i64, active: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(p) = state.participants.iter_mut().find(|p| p.id == participant_id) {
            p.active = active;
        }
        Ok(())
    }

    async fn touch_project_activity(&self, project_id: i64, now: chrono::DateTime<chrono::Utc>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(p) = state.projects.iter_mut().find(|p| p.id == project_id) {
            p.recent_activity_at = now;
        }
        Ok(())
    }

    async fn get_lesson(&self, course_id: i64, lesson_id: i64) -> Result<Option<Lesson>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .lessons
            .iter()
            .find(|l| l.id == lesson_id && l.course_id == course_id)
            .cloned())
    }

    async fn find_project(&self, lesson_id: i64, participant_id: i64) -> Result<Option<Project>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .projects
            .iter()
            .find(|p| p.lesson_id == lesson_id && p.participant_id == participant_id)
            .cloned())
    }

    async fn find_or_create_project(&self, lesson_id: i64, participant_id: i64) -> Result<Project> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.projects.iter().find(|p| p.lesson_id == lesson_id && p.participant_id == participant_id) {
            return Ok(existing.clone());
        }
        let id = state.next_id();
        let project = Project {
            id,
            lesson_id,
            participant_id,
            recent_activity_at: chrono::Utc::now(),
            active: true,
            template_applied: false,
        };
        state.projects.push(project.clone());
        Ok(project)
    }

    async fn mark_template_applied(&self, project_id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(p) = state.projects.iter_mut().find(|p| p.id == project_id) {
            p.template_applied = true;
        }
        Ok(())
    }

    async fn get_viewer_permission(&self, target_project_id: i64, viewer_participant_id: i64) -> Result<Option<ProjectViewer>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .viewers
            .iter()
            .find(|v| v.target_project_id == target_project_id && v.viewer_participant_id == viewer_participant_id)
            .copied())
    }

    async fn list_project_viewers(&self, target_project_id: i64) -> Result<Vec<ProjectViewer>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .viewers
            .iter()
            .filter(|v| v.target_project_id == target_project_id)
            .copied()
            .collect())
    }

    async fn list_viewer_grants(&self, viewer_participant_id: i64) -> Result<Vec<ProjectViewer>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .viewers
            .iter()
            .filter(|v| v.viewer_participant_id == viewer_participant_id)
            .copied()
            .collect())
    }

    async fn set_viewer_permission(&self, target_project_id: i64, viewer_participant_id: i64, permission: u8) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let permission = Permission(permission);
        if let Some(existing) = state
            .viewers
            .iter_mut()
            .find(|v| v.target_project_id == target_project_id && v.viewer_participant_id == viewer_participant_id)
        {
            existing.permission = permission;
        } else {
            state.viewers.push(ProjectViewer { target_project_id, viewer_participant_id, permission });
        }
        Ok(())
    }

    async fn find_or_create_code_reference(&self, project_id: i64, file: &str, line: &str) -> Result<CodeReference> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .code_refs
            .iter()
            .find(|c| c.project_id == project_id && c.file == file && c.line == line && !c.deleted)
        {
            return Ok(existing.clone());
        }
        let id = state.next_id();
        let code_ref = CodeReference { id, project_id, file: file.to_string(), line: line.to_string(), deleted: false };
        state.code_refs.push(code_ref.clone());
        Ok(code_ref)
    }

    async fn rewrite_code_reference_paths(&self, project_id: i64, old_prefix: &str, new_prefix: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for code_ref in state.code_refs.iter_mut().filter(|c| c.project_id == project_id) {
            if let Some(rest) = code_ref.file.strip_prefix(old_prefix) {
                code_ref.file = format!("{new_prefix}{rest}");
            }
        }
        Ok(())
    }

    async fn mark_code_references_deleted(&self, project_id: i64, path_prefix: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for code_ref in state
            .code_refs
            .iter_mut()
            .filter(|c| c.project_id == project_id && c.file.starts_with(path_prefix))
        {
            code_ref.deleted = true;
        }
        Ok(())
    }

    async fn create_feedback(&self, code_ref_id: i64, author_participant_id: i64, first_comment: &str) -> Result<(Feedback, Comment)> {
        let mut state = self.state.lock().unwrap();
        let feedback_id = state.next_id();
        let now = chrono::Utc::now();
        let feedback = Feedback { id: feedback_id, code_ref_id, author_participant_id, resolved: false, created_at: now };
        state.feedbacks.push(feedback.clone());

        let comment_id = state.next_id();
        let comment = Comment {
            id: comment_id,
            feedback_id,
            author_participant_id,
            content: first_comment.to_string(),
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        state.comments.push(comment.clone());
        Ok((feedback, comment))
    }

    async fn get_feedback(&self, feedback_id: i64) -> Result<Option<Feedback>> {
        Ok(self.state.lock().unwrap().feedbacks.iter().find(|f| f.id == feedback_id).cloned())
    }

    async fn set_feedback_resolved(&self, feedback_id: i64, resolved: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(f) = state.feedbacks.iter_mut().find(|f| f.id == feedback_id) {
            f.resolved = resolved;
        }
        Ok(())
    }

    async fn list_feedback_viewers(&self, feedback_id: i64) -> Result<Vec<FeedbackViewer>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .feedback_viewers
            .iter()
            .filter(|v| v.feedback_id == feedback_id)
            .copied()
            .collect())
    }

    async fn upsert_feedback_viewer(&self, feedback_id: i64, participant_id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .feedback_viewers
            .iter_mut()
            .find(|v| v.feedback_id == feedback_id && v.participant_id == participant_id)
        {
            existing.valid = true;
        } else {
            state.feedback_viewers.push(FeedbackViewer { feedback_id, participant_id, valid: true });
        }
        Ok(())
    }

    async fn invalidate_feedback_viewer(&self, feedback_id: i64, participant_id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .feedback_viewers
            .iter_mut()
            .find(|v| v.feedback_id == feedback_id && v.participant_id == participant_id)
        {
            existing.valid = false;
        }
        Ok(())
    }

    async fn add_comment(&self, feedback_id: i64, author_participant_id: i64, content: &str) -> Result<Comment> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let now = chrono::Utc::now();
        let comment = Comment {
            id,
            feedback_id,
            author_participant_id,
            content: content.to_string(),
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn edit_comment(&self, comment_id: i64, content: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let now = chrono::Utc::now();
        if let Some(c) = state.comments.iter_mut().find(|c| c.id == comment_id) {
            c.content = content.to_string();
            c.updated_at = now;
        }
        Ok(())
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let now = chrono::Utc::now();
        if let Some(c) = state.comments.iter_mut().find(|c| c.id == comment_id) {
            c.deleted = true;
            c.updated_at = now;
        }
        Ok(())
    }

    async fn get_comment(&self, comment_id: i64) -> Result<Option<Comment>> {
        Ok(self.state.lock().unwrap().comments.iter().find(|c| c.id == comment_id).cloned())
    }

    async fn list_lesson_feedback_for(&self, lesson_id: i64, participant_id: i64) -> Result<Vec<FeedbackThread>> {
        let state = self.state.lock().unwrap();
        let lesson_project_ids: Vec<i64> =
            state.projects.iter().filter(|p| p.lesson_id == lesson_id).map(|p| p.id).collect();

        let mut threads = Vec::new();
        for feedback in &state.feedbacks {
            let Some(code_ref) = state.code_refs.iter().find(|c| c.id == feedback.code_ref_id) else {
                continue;
            };
            if !lesson_project_ids.contains(&code_ref.project_id) {
                continue;
            }
            let visible = feedback.author_participant_id == participant_id
                || state
                    .feedback_viewers
                    .iter()
                    .any(|v| v.feedback_id == feedback.id && v.participant_id == participant_id && v.valid);
            if !visible {
                continue;
            }
            let Some(owner_project) = state.projects.iter().find(|p| p.id == code_ref.project_id) else {
                continue;
            };
            let comments = state.comments.iter().filter(|c| c.feedback_id == feedback.id).cloned().collect();
            threads.push(FeedbackThread {
                feedback: feedback.clone(),
                code_ref: code_ref.clone(),
                owner_participant_id: owner_project.participant_id,
                comments,
            });
        }
        Ok(threads)
    }
}

/// Assembles a fully in-memory [`AppContext`] for tests: separate
/// [`InMemoryKv`] instances for the hot tier and the cache (mirroring the
/// real `kv_db`/`cache_db` separation), an [`InMemoryObjectStore`], an
/// [`InMemoryMetadataStore`], and a [`FakeTokenVerifier`].
pub fn test_context(config: crate::config::Config) -> AppContext {
    AppContext::new(
        config,
        std::sync::Arc::new(InMemoryKv::new()),
        std::sync::Arc::new(InMemoryKv::new()),
        std::sync::Arc::new(InMemoryObjectStore::new()),
        std::sync::Arc::new(InMemoryMetadataStore::new()),
        std::sync::Arc::new(FakeTokenVerifier::new()),
    )
}

/// A minimal [`crate::config::Config`] suitable for [`test_context`],
/// overridable field-by-field via struct update syntax.
pub fn test_config() -> crate::config::Config {
    crate::config::Config {
        debug: true,
        database_url: String::new(),
        kv_url: String::new(),
        kv_db: 0,
        cache_db: 1,
        object_bucket: "test-bucket".to_string(),
        project_size_limit_bytes: 512 * 1024 * 1024,
        hot_limit_bytes: 128 * 1024 * 1024,
        monitor_key: "test-monitor-key".to_string(),
        sentry_dsn: None,
        auth_endpoint: String::new(),
        bind_addr: "127.0.0.1:0".parse().expect("valid addr"),
    }
}
