//! Component I — compute and cache a viewer's RWX bits over a target project.
//!
//! Grounded on the original's `CourseUserController.check_accessibility`
//! (teacher bypass unless an explicit ACL edge overrides it) and its
//! `@course_cache.memoize` decorator (short-TTL memoization keyed by the
//! viewer/target pair, invalidated explicitly on every permission write).

use std::sync::Arc;

use classroom_protocol::events::permissions::{ParticipantPermission, Permission, ProjectAccessible};

use crate::cache::Cache;
use crate::error::Result;
use crate::metastore::{MetadataStore, Participant};

const CACHE_TTL_SECS: u64 = 300;

fn edge_scope(viewer_id: i64, target_project_id: i64) -> String {
    format!("{viewer_id}:{target_project_id}")
}

/// The outcome of a successful [`PermissionEngine::modify_perm`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermChange {
    /// The viewer whose bits changed.
    pub viewer_id: i64,
    /// Bits held before the change.
    pub old: Permission,
    /// Bits held after the change.
    pub new: Permission,
    /// Bits gained (`new & !old`).
    pub added: Permission,
    /// Bits lost (`old & !new`).
    pub removed: Permission,
}

/// Computes and caches viewer → project access (component I).
pub struct PermissionEngine {
    metadata: Arc<dyn MetadataStore>,
    cache: Arc<Cache>,
}

impl PermissionEngine {
    /// Builds an engine over a metadata store and its dedicated cache namespace.
    pub fn new(metadata: Arc<dyn MetadataStore>, cache: Arc<Cache>) -> Self {
        Self { metadata, cache }
    }

    async fn edge_bits(&self, viewer_id: i64, target_project_id: i64) -> Result<Option<Permission>> {
        let metadata = self.metadata.clone();
        self.cache
            .memoize(
                &edge_scope(viewer_id, target_project_id),
                "checkPerm.edge",
                "",
                Some(CACHE_TTL_SECS),
                move || {
                    let metadata = metadata.clone();
                    async move {
                        let edge = metadata.get_viewer_permission(target_project_id, viewer_id).await?;
                        Ok(edge.map(|e| e.permission))
                    }
                },
            )
            .await
    }

    /// `checkPerm(viewer, target, need)` (spec §4.I): teacher-involved pairs
    /// default-allow unless an explicit edge denies `need`; otherwise an
    /// edge containing every bit of `need` is required.
    pub async fn check_perm(
        &self,
        viewer: &Participant,
        target_owner: &Participant,
        target_project_id: i64,
        need: Permission,
    ) -> Result<bool> {
        let edge = self.edge_bits(viewer.id, target_project_id).await?;
        let teacher_involved = viewer.role.is_teacher() || target_owner.role.is_teacher();
        Ok(if teacher_involved {
            edge.is_none_or(|bits| bits.contains(need))
        } else {
            edge.is_some_and(|bits| bits.contains(need))
        })
    }

    /// `modifyPerm` (spec §4.I): normalizes to the low 3 bits, ignores
    /// self-grants and no-op changes, and invalidates the cached edge on a
    /// real change. Returns `None` for a self-grant or no-op.
    pub async fn modify_perm(
        &self,
        owner: &Participant,
        owner_project_id: i64,
        target_participant_id: i64,
        new_perm: Permission,
    ) -> Result<Option<PermChange>> {
        if target_participant_id == owner.id {
            return Ok(None);
        }
        let new_perm = new_perm.normalized();
        let old = self
            .metadata
            .get_viewer_permission(owner_project_id, target_participant_id)
            .await?
            .map(|edge| edge.permission)
            .unwrap_or(Permission::NONE);
        if old == new_perm {
            return Ok(None);
        }
        let added = new_perm.difference(old);
        let removed = old.difference(new_perm);

        self.metadata
            .set_viewer_permission(owner_project_id, target_participant_id, new_perm.0)
            .await?;
        self.invalidate(target_participant_id, owner_project_id).await;

        Ok(Some(PermChange {
            viewer_id: target_participant_id,
            old,
            new: new_perm,
            added,
            removed,
        }))
    }

    /// Invalidates the cached `checkPerm` edge for `(viewer, target_project)`.
    /// The two broader memoizations named in spec §9
    /// ("accessibleTo(viewer), accessedBy(owner)") are computed fresh on
    /// every `PROJECT_ACCESSIBLE` call in this revision rather than cached,
    /// since that response is a full-roster scan and not a hot path; only
    /// the per-pair `checkPerm` result is memoized.
    async fn invalidate(&self, viewer_id: i64, target_project_id: i64) {
        let key = Cache::make_key(&edge_scope(viewer_id, target_project_id), "checkPerm.edge", "");
        if let Err(err) = self.cache.invalidate(&key).await {
            tracing::warn!(error = %err, viewer_id, target_project_id, "failed to invalidate checkPerm cache entry");
        }
    }

    /// `PROJECT_ACCESSIBLE` (spec §4.M): the default display bit for an
    /// absent edge is READ for teacher-involved pairs, `NONE` otherwise —
    /// deliberately disagreeing with `checkPerm`'s ALL-bits-implied default,
    /// since this response is display-only (spec §9 Open Question).
    pub async fn project_accessible(
        &self,
        course_id: i64,
        lesson_id: i64,
        caller: &Participant,
        caller_project_id: i64,
    ) -> Result<ProjectAccessible> {
        let roster = self.metadata.list_course_participants(course_id).await?;
        let viewers_on_mine = self.metadata.list_project_viewers(caller_project_id).await?;

        let mut accessible_to = Vec::new();
        for other in roster.iter().filter(|p| p.id != caller.id) {
            let edge = viewers_on_mine
                .iter()
                .find(|v| v.viewer_participant_id == other.id)
                .map(|v| v.permission);
            let display = display_bits(caller, other, edge);
            if !display.is_empty() {
                accessible_to.push(ParticipantPermission {
                    participant_id: other.id,
                    permission: display,
                });
            }
        }

        let mut accessed_by = Vec::new();
        for other in roster.iter().filter(|p| p.id != caller.id) {
            let Some(other_project) = self.metadata.find_project(lesson_id, other.id).await? else {
                continue;
            };
            let edge = self
                .metadata
                .get_viewer_permission(other_project.id, caller.id)
                .await?
                .map(|e| e.permission);
            let display = display_bits(caller, other, edge);
            if !display.is_empty() {
                accessed_by.push(ParticipantPermission {
                    participant_id: other.id,
                    permission: display,
                });
            }
        }

        Ok(ProjectAccessible {
            accessible_to,
            accessed_by,
        })
    }
}

fn display_bits(a: &Participant, b: &Participant, edge: Option<Permission>) -> Permission {
    let teacher_involved = a.role.is_teacher() || b.role.is_teacher();
    edge.unwrap_or(if teacher_involved { Permission::READ } else { Permission::NONE })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_bits_defaults_to_read_for_teacher_pairs() {
        use crate::metastore::Role;
        let teacher = Participant {
            id: 1,
            course_id: 1,
            user_id: 1,
            role: Role::Teacher,
            nickname: "t".into(),
            active: true,
        };
        let student = Participant {
            id: 2,
            course_id: 1,
            user_id: 2,
            role: Role::Student,
            nickname: "s".into(),
            active: true,
        };
        assert_eq!(display_bits(&teacher, &student, None), Permission::READ);
        assert_eq!(display_bits(&student, &student, None), Permission::NONE);
    }
}
