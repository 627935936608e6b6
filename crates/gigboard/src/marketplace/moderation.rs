use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::context::{require_admin, RequestContext};
use super::domain::{EntityKind, Job, JobId, ModerationStatus, Service, ServiceId, User, UserId, UserStatus};
use super::error::MarketplaceError;
use super::notify::{dispatch, MarketplaceNotification, NotificationPublisher};
use super::store::{Committed, MarketplaceStore, RepositoryError, StoreRetry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

/// Admin review payload. `reason` is required to reject and ignored on approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub decision: Decision,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ReviewRequest {
    pub fn approve() -> Self {
        Self {
            decision: Decision::Approve,
            reason: None,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Reject,
            reason: Some(reason.into()),
        }
    }
}

/// Entity returned from a moderation call, serialized as the bare record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ModeratedEntity {
    User(User),
    Service(Service),
    Job(Job),
}

impl ModeratedEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            ModeratedEntity::User(_) => EntityKind::User,
            ModeratedEntity::Service(_) => EntityKind::Service,
            ModeratedEntity::Job(_) => EntityKind::Job,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ModeratedEntity::User(user) => user.id.as_str(),
            ModeratedEntity::Service(service) => service.id.as_str(),
            ModeratedEntity::Job(job) => job.id.as_str(),
        }
    }

    pub fn status_label(&self) -> &'static str {
        match self {
            ModeratedEntity::User(user) => user.status.label(),
            ModeratedEntity::Service(service) => service.status.label(),
            ModeratedEntity::Job(job) => job.status.label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Verdict {
    Approve,
    Reject(String),
}

impl Verdict {
    fn from_request(request: &ReviewRequest) -> Result<Self, MarketplaceError> {
        match request.decision {
            Decision::Approve => Ok(Verdict::Approve),
            Decision::Reject => required_reason(request.reason.as_deref()).map(Verdict::Reject),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Verdict::Approve => "approved",
            Verdict::Reject(_) => "rejected",
        }
    }
}

fn required_reason(reason: Option<&str>) -> Result<String, MarketplaceError> {
    reason
        .map(str::trim)
        .filter(|reason| !reason.is_empty())
        .map(str::to_string)
        .ok_or(MarketplaceError::MissingReason)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReviewState {
    Pending,
    Approved,
    Rejected,
    Other(&'static str),
}

/// Records that carry the pending/approved/rejected lifecycle.
trait Moderated: Clone {
    const KIND: EntityKind;

    fn record_id(&self) -> &str;
    fn review_state(&self) -> ReviewState;
    /// Who hears about the decision.
    fn owner(&self) -> &UserId;
    fn created_at(&self) -> DateTime<Utc>;
    fn apply(&mut self, verdict: &Verdict, actor: &UserId, at: DateTime<Utc>);
}

fn listing_state(status: ModerationStatus) -> ReviewState {
    match status {
        ModerationStatus::Pending => ReviewState::Pending,
        ModerationStatus::Approved => ReviewState::Approved,
        ModerationStatus::Rejected => ReviewState::Rejected,
    }
}

fn listing_status(verdict: &Verdict) -> ModerationStatus {
    match verdict {
        Verdict::Approve => ModerationStatus::Approved,
        Verdict::Reject(_) => ModerationStatus::Rejected,
    }
}

impl Moderated for User {
    const KIND: EntityKind = EntityKind::User;

    fn record_id(&self) -> &str {
        self.id.as_str()
    }

    fn review_state(&self) -> ReviewState {
        match self.status {
            UserStatus::Pending => ReviewState::Pending,
            UserStatus::Approved => ReviewState::Approved,
            UserStatus::Rejected => ReviewState::Rejected,
            other => ReviewState::Other(other.label()),
        }
    }

    fn owner(&self) -> &UserId {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn apply(&mut self, verdict: &Verdict, actor: &UserId, at: DateTime<Utc>) {
        match verdict {
            Verdict::Approve => {
                self.status = UserStatus::Approved;
                self.moderation.approve(actor, at);
            }
            Verdict::Reject(reason) => {
                self.status = UserStatus::Rejected;
                self.moderation.reject(reason);
            }
        }
        self.updated_at = at;
    }
}

impl Moderated for Service {
    const KIND: EntityKind = EntityKind::Service;

    fn record_id(&self) -> &str {
        self.id.as_str()
    }

    fn review_state(&self) -> ReviewState {
        listing_state(self.status)
    }

    fn owner(&self) -> &UserId {
        &self.freelancer_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn apply(&mut self, verdict: &Verdict, actor: &UserId, at: DateTime<Utc>) {
        self.status = listing_status(verdict);
        match verdict {
            Verdict::Approve => self.moderation.approve(actor, at),
            Verdict::Reject(reason) => self.moderation.reject(reason),
        }
        self.updated_at = at;
    }
}

impl Moderated for Job {
    const KIND: EntityKind = EntityKind::Job;

    fn record_id(&self) -> &str {
        self.id.as_str()
    }

    fn review_state(&self) -> ReviewState {
        listing_state(self.status)
    }

    fn owner(&self) -> &UserId {
        &self.client_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn apply(&mut self, verdict: &Verdict, actor: &UserId, at: DateTime<Utc>) {
        self.status = listing_status(verdict);
        match verdict {
            Verdict::Approve => self.moderation.approve(actor, at),
            Verdict::Reject(reason) => self.moderation.reject(reason),
        }
        self.updated_at = at;
    }
}

/// First terminal decision wins: repeating it is a no-op, contradicting it is a conflict.
fn must_apply<T: Moderated>(record: &T, verdict: &Verdict) -> Result<bool, MarketplaceError> {
    match (record.review_state(), verdict) {
        (ReviewState::Pending, _) => Ok(true),
        (ReviewState::Approved, Verdict::Approve) | (ReviewState::Rejected, Verdict::Reject(_)) => {
            Ok(false)
        }
        (ReviewState::Approved, Verdict::Reject(_)) => Err(MarketplaceError::Conflict {
            kind: T::KIND,
            id: record.record_id().to_string(),
            current: "approved",
        }),
        (ReviewState::Rejected, Verdict::Approve) => Err(MarketplaceError::Conflict {
            kind: T::KIND,
            id: record.record_id().to_string(),
            current: "rejected",
        }),
        (ReviewState::Other(current), _) => Err(MarketplaceError::NotPending {
            kind: T::KIND,
            id: record.record_id().to_string(),
            current,
        }),
    }
}

/// Applies admin decisions to users, services, and jobs.
pub struct ModerationEngine<S: ?Sized, N: ?Sized> {
    store: Arc<S>,
    notifications: Arc<N>,
    retry: StoreRetry,
}

impl<S, N> ModerationEngine<S, N>
where
    S: MarketplaceStore + ?Sized,
    N: NotificationPublisher + ?Sized,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, retry: StoreRetry) -> Self {
        Self {
            store,
            notifications,
            retry,
        }
    }

    pub fn review(
        &self,
        ctx: &RequestContext,
        kind: EntityKind,
        id: &str,
        request: &ReviewRequest,
    ) -> Result<ModeratedEntity, MarketplaceError> {
        let actor = require_admin(self.store.as_ref(), &self.retry, ctx, "moderation")?;
        let verdict = Verdict::from_request(request)?;
        let store = self.store.as_ref();

        match kind {
            EntityKind::User => {
                let id = UserId::from(id);
                if id == actor.id {
                    return Err(MarketplaceError::SelfModeration);
                }
                self.decide(
                    ctx,
                    &actor,
                    &verdict,
                    || {
                        store
                            .fetch_user(&id)?
                            .ok_or_else(|| MarketplaceError::not_found("user", &id))
                    },
                    |user| store.replace_user(user),
                )
                .map(ModeratedEntity::User)
            }
            EntityKind::Service => {
                let id = ServiceId::from(id);
                self.decide(
                    ctx,
                    &actor,
                    &verdict,
                    || {
                        store
                            .fetch_service(&id)?
                            .ok_or_else(|| MarketplaceError::not_found("service", &id))
                    },
                    |service| store.replace_service(service),
                )
                .map(ModeratedEntity::Service)
            }
            EntityKind::Job => {
                let id = JobId::from(id);
                self.decide(
                    ctx,
                    &actor,
                    &verdict,
                    || {
                        store
                            .fetch_job(&id)?
                            .ok_or_else(|| MarketplaceError::not_found("job", &id))
                    },
                    |job| store.replace_job(job),
                )
                .map(ModeratedEntity::Job)
            }
        }
    }

    fn decide<T, L, W>(
        &self,
        ctx: &RequestContext,
        actor: &User,
        verdict: &Verdict,
        load: L,
        write: W,
    ) -> Result<T, MarketplaceError>
    where
        T: Moderated,
        L: FnMut() -> Result<T, MarketplaceError>,
        W: FnMut(T) -> Result<T, RepositoryError>,
    {
        let at = ctx.received_at();
        let committed = self.retry.read_modify_write(
            "moderation_review",
            load,
            |mut record: T| {
                if must_apply(&record, verdict)? {
                    record.apply(verdict, &actor.id, at);
                    Ok(Committed::Written(record))
                } else {
                    Ok(Committed::Unchanged(record))
                }
            },
            write,
        )?;

        if !committed.was_written() {
            return Ok(committed.into_inner());
        }

        let record = committed.into_inner();
        info!(
            kind = %T::KIND,
            id = record.record_id(),
            actor = %actor.id,
            status = verdict.label(),
            "moderation decision recorded"
        );

        let mut notification = MarketplaceNotification::new(
            format!("{}_{}", T::KIND.label(), verdict.label()),
            record.owner(),
            record.record_id(),
        )
        .with_detail("actor", actor.id.as_str());
        if let Verdict::Reject(reason) = verdict {
            notification = notification.with_detail("reason", reason.as_str());
        }
        dispatch(self.notifications.as_ref(), notification);

        Ok(record)
    }

    /// Move an approved or pending user to `suspended`.
    pub fn suspend(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
        reason: Option<&str>,
    ) -> Result<User, MarketplaceError> {
        let actor = require_admin(self.store.as_ref(), &self.retry, ctx, "suspension")?;
        if user_id == &actor.id {
            return Err(MarketplaceError::SelfModeration);
        }
        let reason = required_reason(reason)?;
        let at = ctx.received_at();

        let committed = self.retry.read_modify_write(
            "suspend_user",
            || self.load_user(user_id),
            |mut user| match user.status {
                UserStatus::Suspended => Ok(Committed::Unchanged(user)),
                UserStatus::Approved | UserStatus::Pending => {
                    user.suspended_from = Some(user.status);
                    user.status = UserStatus::Suspended;
                    user.suspension_reason = Some(reason.clone());
                    user.updated_at = at;
                    Ok(Committed::Written(user))
                }
                UserStatus::Rejected => Err(MarketplaceError::InvalidState {
                    kind: EntityKind::User,
                    id: user.id.to_string(),
                    current: user.status.label(),
                    required: "pending or approved",
                }),
            },
            |user| self.store.replace_user(user),
        )?;

        if committed.was_written() {
            info!(user = %user_id, actor = %actor.id, "user suspended");
            dispatch(
                self.notifications.as_ref(),
                MarketplaceNotification::new("user_suspended", user_id, user_id.as_str())
                    .with_detail("reason", reason.as_str()),
            );
        }
        Ok(committed.into_inner())
    }

    /// Lift a suspension and restore the prior status. A user suspended while
    /// still pending goes back to the moderation queue, not to `approved`.
    pub fn reinstate(&self, ctx: &RequestContext, user_id: &UserId) -> Result<User, MarketplaceError> {
        let actor = require_admin(self.store.as_ref(), &self.retry, ctx, "reinstatement")?;
        if user_id == &actor.id {
            return Err(MarketplaceError::SelfModeration);
        }
        let at = ctx.received_at();

        let committed = self.retry.read_modify_write(
            "reinstate_user",
            || self.load_user(user_id),
            |mut user| match user.status {
                UserStatus::Approved => Ok(Committed::Unchanged(user)),
                UserStatus::Suspended => {
                    let restored = user.suspended_from.take().unwrap_or(UserStatus::Pending);
                    user.status = restored;
                    user.suspension_reason = None;
                    if restored == UserStatus::Approved {
                        user.moderation.approve(&actor.id, at);
                    }
                    user.updated_at = at;
                    Ok(Committed::Written(user))
                }
                other => Err(MarketplaceError::InvalidState {
                    kind: EntityKind::User,
                    id: user.id.to_string(),
                    current: other.label(),
                    required: "suspended",
                }),
            },
            |user| self.store.replace_user(user),
        )?;

        let written = committed.was_written();
        let user = committed.into_inner();
        if written {
            info!(user = %user_id, actor = %actor.id, status = user.status.label(), "user reinstated");
            dispatch(
                self.notifications.as_ref(),
                MarketplaceNotification::new("user_reinstated", user_id, user_id.as_str())
                    .with_detail("status", user.status.label()),
            );
        }
        Ok(user)
    }

    /// Pending entities of one kind, oldest first.
    pub fn queue(
        &self,
        ctx: &RequestContext,
        kind: EntityKind,
    ) -> Result<Vec<ModeratedEntity>, MarketplaceError> {
        require_admin(self.store.as_ref(), &self.retry, ctx, "the moderation queue")?;
        let store = self.store.as_ref();

        let queue = match kind {
            EntityKind::User => {
                pending_oldest_first(self.retry.call("scan_users", || store.users())?)
                    .into_iter()
                    .map(ModeratedEntity::User)
                    .collect()
            }
            EntityKind::Service => {
                pending_oldest_first(self.retry.call("scan_services", || store.services())?)
                    .into_iter()
                    .map(ModeratedEntity::Service)
                    .collect()
            }
            EntityKind::Job => pending_oldest_first(self.retry.call("scan_jobs", || store.jobs())?)
                .into_iter()
                .map(ModeratedEntity::Job)
                .collect(),
        };
        Ok(queue)
    }

    fn load_user(&self, user_id: &UserId) -> Result<User, MarketplaceError> {
        self.store
            .fetch_user(user_id)?
            .ok_or_else(|| MarketplaceError::not_found("user", user_id))
    }
}

fn pending_oldest_first<T: Moderated>(records: Vec<T>) -> Vec<T> {
    let mut pending: Vec<T> = records
        .into_iter()
        .filter(|record| record.review_state() == ReviewState::Pending)
        .collect();
    pending.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.record_id().cmp(b.record_id()))
    });
    pending
}
