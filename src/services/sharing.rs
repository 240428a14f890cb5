//! Share manager: grants, changes and revokes per-user access to tasks and lists.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::db::{
    IncomingShare, Permission, Share, ShareRepository, ShareWithUser, Subject, SubjectKind, User,
    UserRepository,
};
use crate::error::{AppError, AppResult};
use crate::i18n;
use crate::services::notifications::NotificationDispatcher;
use crate::services::permissions::Access;
use crate::AppState;

fn subject_not_found(kind: SubjectKind) -> AppError {
    AppError::NotFound(i18n::t(&format!("not_found.{}", kind.as_str())))
}

pub async fn load_subject(
    pool: &SqlitePool,
    kind: SubjectKind,
    subject_id: &str,
) -> AppResult<Subject> {
    ShareRepository::find_subject(pool, kind, subject_id)
        .await?
        .ok_or_else(|| subject_not_found(kind))
}

/// Effective access of `user_id` on `subject`, including what a task inherits
/// from its list.
pub async fn resolve_access(pool: &SqlitePool, subject: &Subject, user_id: &str) -> AppResult<Access> {
    if subject.owner_id == user_id {
        return Ok(Access::Owner);
    }

    let direct = ShareRepository::find(pool, subject.kind, &subject.id, user_id)
        .await?
        .map(|s| s.permission);

    let inherited = match (&subject.kind, &subject.list_id) {
        (SubjectKind::Task, Some(list_id)) => {
            match ShareRepository::find_subject(pool, SubjectKind::List, list_id).await? {
                Some(list) => {
                    let on_list = ShareRepository::find(pool, SubjectKind::List, &list.id, user_id)
                        .await?
                        .map(|s| s.permission);
                    Access::resolve(&list.owner_id, user_id, on_list, Access::None)
                        .inherited_by_task()
                }
                None => Access::None,
            }
        }
        _ => Access::None,
    };

    Ok(Access::resolve(&subject.owner_id, user_id, direct, inherited))
}

/// Load a subject and fail with `Forbidden` unless the user holds at least `required`.
pub async fn require_access(
    pool: &SqlitePool,
    kind: SubjectKind,
    subject_id: &str,
    user_id: &str,
    required: Permission,
) -> AppResult<(Subject, Access)> {
    let subject = load_subject(pool, kind, subject_id).await?;
    let access = resolve_access(pool, &subject, user_id).await?;

    if !access.permits(required) {
        tracing::warn!(
            "Access denied: user {} needs {} on {} {}",
            user_id,
            required,
            kind,
            subject_id
        );
        return Err(AppError::Forbidden);
    }

    Ok((subject, access))
}

pub struct ShareService {
    pool: SqlitePool,
    dispatcher: NotificationDispatcher,
}

impl ShareService {
    pub fn new(pool: SqlitePool, dispatcher: NotificationDispatcher) -> Self {
        Self { pool, dispatcher }
    }

    pub fn from_state(state: &Arc<AppState>) -> Self {
        Self::new(state.db.clone(), NotificationDispatcher::from_state(state))
    }

    async fn require_manager(&self, subject: &Subject, actor_id: &str) -> AppResult<Access> {
        let access = resolve_access(&self.pool, subject, actor_id).await?;
        if !access.can_manage_shares() {
            tracing::warn!(
                "Access denied: user {} cannot manage shares of {} {}",
                actor_id,
                subject.kind,
                subject.id
            );
            return Err(AppError::Forbidden);
        }
        Ok(access)
    }

    /// Share a subject with the user registered under `target_email`.
    ///
    /// The actor must own the subject or hold ADMIN on it. A second share for
    /// the same user is a `Conflict`; use [`ShareService::update_share`] instead.
    pub async fn create_share(
        &self,
        kind: SubjectKind,
        subject_id: &str,
        actor: &User,
        target_email: &str,
        permission: Permission,
    ) -> AppResult<Share> {
        let subject = load_subject(&self.pool, kind, subject_id).await?;
        self.require_manager(&subject, &actor.id).await?;

        let target = UserRepository::find_by_email(&self.pool, target_email)
            .await?
            .ok_or_else(|| AppError::NotFound(i18n::t("not_found.user")))?;

        if target.id == subject.owner_id {
            return Err(AppError::Validation(i18n::t("validation.share_with_owner")));
        }

        let share =
            ShareRepository::create(&self.pool, kind, &subject.id, &target.id, permission).await?;

        tracing::info!(
            "User {} shared {} {} with user {} ({})",
            actor.id,
            kind,
            subject.id,
            target.id,
            permission
        );

        // The share stands even if the notification cannot be recorded.
        if let Err(e) = self
            .dispatcher
            .notify_share(&target.id, &actor.name, &subject.name, kind)
            .await
        {
            tracing::warn!(
                "Failed to record share notification for user {}: {:?}",
                target.id,
                e
            );
        }

        Ok(share)
    }

    pub async fn update_share(
        &self,
        kind: SubjectKind,
        subject_id: &str,
        actor_id: &str,
        target_user_id: &str,
        permission: Permission,
    ) -> AppResult<Share> {
        let subject = load_subject(&self.pool, kind, subject_id).await?;
        self.require_manager(&subject, actor_id).await?;

        let share = ShareRepository::update_permission(
            &self.pool,
            kind,
            &subject.id,
            target_user_id,
            permission,
        )
        .await?
        .ok_or_else(|| AppError::NotFound(i18n::t("not_found.share")))?;

        tracing::info!(
            "User {} set {} {} share of user {} to {}",
            actor_id,
            kind,
            subject.id,
            target_user_id,
            permission
        );

        Ok(share)
    }

    /// Revoke a share. Managers may revoke anyone's share; any grantee may drop
    /// their own.
    pub async fn remove_share(
        &self,
        kind: SubjectKind,
        subject_id: &str,
        actor_id: &str,
        target_user_id: &str,
    ) -> AppResult<()> {
        let subject = load_subject(&self.pool, kind, subject_id).await?;
        let access = resolve_access(&self.pool, &subject, actor_id).await?;

        if !access.can_remove_share(actor_id, target_user_id) {
            tracing::warn!(
                "Access denied: user {} cannot remove share of user {} on {} {}",
                actor_id,
                target_user_id,
                kind,
                subject.id
            );
            return Err(AppError::Forbidden);
        }

        if !ShareRepository::delete(&self.pool, kind, &subject.id, target_user_id).await? {
            return Err(AppError::NotFound(i18n::t("not_found.share")));
        }

        tracing::info!(
            "User {} removed share of user {} on {} {}",
            actor_id,
            target_user_id,
            kind,
            subject.id
        );

        Ok(())
    }

    /// Shares on a subject in insertion order. The caller needs at least VIEW.
    pub async fn list_shares(
        &self,
        kind: SubjectKind,
        subject_id: &str,
        caller_id: &str,
    ) -> AppResult<Vec<ShareWithUser>> {
        let (subject, _) =
            require_access(&self.pool, kind, subject_id, caller_id, Permission::View).await?;
        ShareRepository::list_for_subject(&self.pool, kind, &subject.id).await
    }

    pub async fn incoming(&self, user_id: &str) -> AppResult<Vec<IncomingShare>> {
        ShareRepository::list_incoming(&self.pool, user_id).await
    }
}
