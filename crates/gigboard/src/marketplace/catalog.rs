use std::sync::Arc;

use tracing::info;

use super::context::{caller, require_admin, viewer, RequestContext};
use super::domain::{
    normalize_skills, Category, CategoryDraft, CategoryId, EntityKind, Job, JobDraft, JobId,
    ModerationStamp, ModerationStatus, ProfileDraft, Service, ServiceDraft, ServiceId, User,
    UserId, UserProfile, UserStatus,
};
use super::error::{FieldError, MarketplaceError};
use super::rating::Rating;
use super::store::{Committed, MarketplaceStore, RepositoryError, StoreRetry};

/// Collects field errors so a form can show all of them at once.
#[derive(Default)]
struct Fields(Vec<FieldError>);

impl Fields {
    fn text(&mut self, field: &'static str, value: &str) -> String {
        let value = value.trim();
        if value.is_empty() {
            self.0.push(FieldError::new(field, "must not be empty"));
        }
        value.to_string()
    }

    fn positive(&mut self, field: &'static str, value: f64) -> f64 {
        if !(value.is_finite() && value > 0.0) {
            self.0.push(FieldError::new(field, "must be greater than zero"));
        }
        value
    }

    fn days(&mut self, field: &'static str, value: i64) -> u32 {
        match u32::try_from(value) {
            Ok(days) if days > 0 => days,
            _ => {
                self.0
                    .push(FieldError::new(field, "must be a positive number of days"));
                0
            }
        }
    }

    fn push(&mut self, field: &'static str, message: &str) {
        self.0.push(FieldError::new(field, message));
    }

    fn finish(self) -> Result<(), MarketplaceError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(MarketplaceError::ValidationFailed(self.0))
        }
    }
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Visible to everyone when public, otherwise only to the owner and admins.
fn visible_to(owner: &UserId, public: bool, viewer: Option<&User>) -> bool {
    public || viewer.is_some_and(|viewer| &viewer.id == owner || viewer.is_active_admin())
}

/// Entity creation and lookups: the start of every lifecycle.
pub struct Catalog<S: ?Sized> {
    store: Arc<S>,
    retry: StoreRetry,
    admin_subjects: Vec<String>,
}

impl<S> Catalog<S>
where
    S: MarketplaceStore + ?Sized,
{
    pub fn new(store: Arc<S>, retry: StoreRetry, admin_subjects: Vec<String>) -> Self {
        Self {
            store,
            retry,
            admin_subjects,
        }
    }

    /// Create the caller's user record. Configured admin subjects start approved.
    pub fn register(&self, ctx: &RequestContext, draft: &ProfileDraft) -> Result<User, MarketplaceError> {
        let identity = ctx.require_identity()?;

        let mut fields = Fields::default();
        let full_name = fields.text("full_name", &draft.full_name);
        if identity.email.trim().is_empty() {
            fields.push("email", "identity provider did not supply an email");
        }
        if let Some(rate) = draft.hourly_rate {
            fields.positive("hourly_rate", rate);
        }
        fields.finish()?;

        let is_admin = self
            .admin_subjects
            .iter()
            .any(|subject| subject == identity.subject.as_str());
        let now = ctx.received_at();
        let user = User {
            id: identity.subject.clone(),
            email: identity.email.trim().to_string(),
            profile: UserProfile {
                full_name,
                bio: draft.bio.trim().to_string(),
                skills: normalize_skills(&draft.skills),
                hourly_rate: draft.hourly_rate,
                location: optional_text(draft.location.as_deref()),
            },
            is_freelancer: draft.freelancer,
            is_client: draft.client,
            is_admin,
            status: if is_admin {
                UserStatus::Approved
            } else {
                UserStatus::Pending
            },
            rating: Rating::NoRating,
            moderation: ModerationStamp::default(),
            suspension_reason: None,
            suspended_from: None,
            created_at: now,
            updated_at: now,
            version: 0,
        };

        let stored = self
            .retry
            .call("insert_user", || self.store.insert_user(user.clone()))
            .map_err(|err| match err {
                RepositoryError::Conflict => MarketplaceError::AlreadyExists {
                    kind: "user",
                    id: identity.subject.to_string(),
                },
                other => other.into(),
            })?;

        info!(
            kind = %EntityKind::User,
            id = %stored.id,
            freelancer = stored.is_freelancer,
            admin = stored.is_admin,
            status = stored.status.label(),
            "user registered"
        );
        Ok(stored)
    }

    pub fn create_category(
        &self,
        ctx: &RequestContext,
        draft: &CategoryDraft,
    ) -> Result<Category, MarketplaceError> {
        let actor = require_admin(self.store.as_ref(), &self.retry, ctx, "creating categories")?;

        let mut fields = Fields::default();
        let name = fields.text("name", &draft.name);
        fields.finish()?;

        let category = Category {
            id: CategoryId::generate(),
            name,
            description: optional_text(draft.description.as_deref()),
            icon: optional_text(draft.icon.as_deref()),
            created_at: ctx.received_at(),
        };
        let stored = self
            .retry
            .call("insert_category", || self.store.insert_category(category.clone()))
            .map_err(|err| match err {
                RepositoryError::Conflict => MarketplaceError::AlreadyExists {
                    kind: "category",
                    id: category.name.clone(),
                },
                other => other.into(),
            })?;

        info!(category = %stored.id, name = %stored.name, actor = %actor.id, "category created");
        Ok(stored)
    }

    /// All categories, alphabetical.
    pub fn categories(&self) -> Result<Vec<Category>, MarketplaceError> {
        let mut categories = self.retry.call("scan_categories", || self.store.categories())?;
        categories.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(categories)
    }

    pub fn create_service(
        &self,
        ctx: &RequestContext,
        draft: &ServiceDraft,
    ) -> Result<Service, MarketplaceError> {
        let owner = caller(self.store.as_ref(), &self.retry, ctx)?
            .filter(|user| {
                user.is_freelancer
                    && !matches!(user.status, UserStatus::Suspended | UserStatus::Rejected)
            })
            .ok_or(MarketplaceError::FreelancerProfileRequired)?;

        let mut fields = Fields::default();
        let title = fields.text("title", &draft.title);
        let description = fields.text("description", &draft.description);
        let price = fields.positive("price", draft.price);
        let delivery_time = fields.days("delivery_time", draft.delivery_time);
        self.check_category(&draft.category_id, &mut fields)?;
        fields.finish()?;

        let now = ctx.received_at();
        let service = Service {
            id: ServiceId::generate(),
            freelancer_id: owner.id.clone(),
            category_id: draft.category_id.clone(),
            title,
            description,
            price,
            delivery_time,
            skills: normalize_skills(&draft.skills),
            status: ModerationStatus::Pending,
            is_active: true,
            moderation: ModerationStamp::default(),
            created_at: now,
            updated_at: now,
            version: 0,
        };
        let stored = self
            .retry
            .call("insert_service", || self.store.insert_service(service.clone()))?;

        info!(
            kind = %EntityKind::Service,
            id = %stored.id,
            actor = %owner.id,
            status = stored.status.label(),
            "service listed"
        );
        Ok(stored)
    }

    pub fn create_job(&self, ctx: &RequestContext, draft: &JobDraft) -> Result<Job, MarketplaceError> {
        let client = caller(self.store.as_ref(), &self.retry, ctx)?
            .filter(|user| {
                user.is_client && !matches!(user.status, UserStatus::Suspended | UserStatus::Rejected)
            })
            .ok_or_else(|| MarketplaceError::unauthorized("posting jobs requires a client account"))?;

        let mut fields = Fields::default();
        let title = fields.text("title", &draft.title);
        let description = fields.text("description", &draft.description);
        let budget = fields.positive("budget", draft.budget);
        let duration = fields.text("duration", &draft.duration);
        self.check_category(&draft.category_id, &mut fields)?;
        fields.finish()?;

        let now = ctx.received_at();
        let job = Job {
            id: JobId::generate(),
            client_id: client.id.clone(),
            category_id: draft.category_id.clone(),
            title,
            description,
            budget,
            duration,
            experience_level: draft.experience_level,
            skills: normalize_skills(&draft.skills),
            status: ModerationStatus::Pending,
            moderation: ModerationStamp::default(),
            created_at: now,
            updated_at: now,
            version: 0,
        };
        let stored = self.retry.call("insert_job", || self.store.insert_job(job.clone()))?;

        info!(
            kind = %EntityKind::Job,
            id = %stored.id,
            actor = %client.id,
            status = stored.status.label(),
            "job posted"
        );
        Ok(stored)
    }

    /// Owner-only visibility toggle for approved services.
    pub fn set_service_active(
        &self,
        ctx: &RequestContext,
        service_id: &ServiceId,
        active: bool,
    ) -> Result<Service, MarketplaceError> {
        let owner = caller(self.store.as_ref(), &self.retry, ctx)?
            .ok_or_else(|| MarketplaceError::unauthorized("register before managing services"))?;
        let at = ctx.received_at();

        let committed = self.retry.read_modify_write(
            "set_service_active",
            || {
                self.store
                    .fetch_service(service_id)?
                    .ok_or_else(|| MarketplaceError::not_found("service", service_id))
            },
            |mut service| {
                if service.freelancer_id != owner.id {
                    return Err(MarketplaceError::unauthorized(
                        "only the owning freelancer can toggle a service",
                    ));
                }
                if service.status != ModerationStatus::Approved {
                    return Err(MarketplaceError::InvalidState {
                        kind: EntityKind::Service,
                        id: service.id.to_string(),
                        current: service.status.label(),
                        required: "approved",
                    });
                }
                if service.is_active == active {
                    return Ok(Committed::Unchanged(service));
                }
                service.is_active = active;
                service.updated_at = at;
                Ok(Committed::Written(service))
            },
            |service| self.store.replace_service(service),
        )?;

        if committed.was_written() {
            info!(service = %service_id, actor = %owner.id, active, "service visibility toggled");
        }
        Ok(committed.into_inner())
    }

    pub fn user(&self, ctx: &RequestContext, user_id: &UserId) -> Result<User, MarketplaceError> {
        let viewer = viewer(self.store.as_ref(), &self.retry, ctx)?;
        self.retry
            .call("fetch_user", || self.store.fetch_user(user_id))?
            .filter(|user| visible_to(&user.id, user.status == UserStatus::Approved, viewer.as_ref()))
            .ok_or_else(|| MarketplaceError::not_found("user", user_id))
    }

    pub fn service(&self, ctx: &RequestContext, service_id: &ServiceId) -> Result<Service, MarketplaceError> {
        let viewer = viewer(self.store.as_ref(), &self.retry, ctx)?;
        self.retry
            .call("fetch_service", || self.store.fetch_service(service_id))?
            .filter(|service| {
                visible_to(&service.freelancer_id, service.accepts_applications(), viewer.as_ref())
            })
            .ok_or_else(|| MarketplaceError::not_found("service", service_id))
    }

    pub fn job(&self, ctx: &RequestContext, job_id: &JobId) -> Result<Job, MarketplaceError> {
        let viewer = viewer(self.store.as_ref(), &self.retry, ctx)?;
        self.retry
            .call("fetch_job", || self.store.fetch_job(job_id))?
            .filter(|job| {
                visible_to(&job.client_id, job.status == ModerationStatus::Approved, viewer.as_ref())
            })
            .ok_or_else(|| MarketplaceError::not_found("job", job_id))
    }

    fn check_category(&self, id: &CategoryId, fields: &mut Fields) -> Result<(), MarketplaceError> {
        if self
            .retry
            .call("fetch_category", || self.store.fetch_category(id))?
            .is_none()
        {
            fields.push("category_id", "unknown category");
        }
        Ok(())
    }
}
