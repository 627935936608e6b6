use std::sync::Arc;

use super::applications::{ApplicationOutcome, ApplicationWorkflow};
use super::catalog::Catalog;
use super::context::RequestContext;
use super::domain::{
    Application, ApplicationDraft, ApplicationId, Category, CategoryDraft, EntityKind, Job,
    JobDraft, JobId, ProfileDraft, Service, ServiceDraft, ServiceId, User, UserId,
};
use super::error::MarketplaceError;
use super::moderation::{ModeratedEntity, ModerationEngine, ReviewRequest};
use super::notify::NotificationPublisher;
use super::query::{QueryPipeline, SearchFilter, SortOrder};
use super::rating::{RatingAggregator, RatingSummary};
use super::store::{MarketplaceStore, StoreRetry};
use crate::config::MarketplaceConfig;

/// Facade composing the marketplace engines over one store and notification sink.
pub struct MarketplaceService<S: ?Sized, N: ?Sized> {
    catalog: Catalog<S>,
    moderation: ModerationEngine<S, N>,
    applications: ApplicationWorkflow<S, N>,
    ratings: RatingAggregator<S>,
    queries: QueryPipeline<S>,
    top_freelancers_limit: usize,
}

impl<S, N> MarketplaceService<S, N>
where
    S: MarketplaceStore + ?Sized + 'static,
    N: NotificationPublisher + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, config: &MarketplaceConfig) -> Self {
        let retry = StoreRetry::new(config.store_retry_attempts);
        Self {
            catalog: Catalog::new(Arc::clone(&store), retry, config.admin_subjects.clone()),
            moderation: ModerationEngine::new(Arc::clone(&store), Arc::clone(&notifications), retry),
            applications: ApplicationWorkflow::new(
                Arc::clone(&store),
                notifications,
                retry,
                config.allow_duplicate_applications,
            ),
            ratings: RatingAggregator::new(Arc::clone(&store), retry),
            queries: QueryPipeline::new(store, retry),
            top_freelancers_limit: config.top_freelancers_limit,
        }
    }

    pub fn register_user(&self, ctx: &RequestContext, draft: &ProfileDraft) -> Result<User, MarketplaceError> {
        self.catalog.register(ctx, draft)
    }

    pub fn user(&self, ctx: &RequestContext, id: &UserId) -> Result<User, MarketplaceError> {
        self.catalog.user(ctx, id)
    }

    pub fn create_category(
        &self,
        ctx: &RequestContext,
        draft: &CategoryDraft,
    ) -> Result<Category, MarketplaceError> {
        self.catalog.create_category(ctx, draft)
    }

    pub fn categories(&self) -> Result<Vec<Category>, MarketplaceError> {
        self.catalog.categories()
    }

    pub fn create_service(
        &self,
        ctx: &RequestContext,
        draft: &ServiceDraft,
    ) -> Result<Service, MarketplaceError> {
        self.catalog.create_service(ctx, draft)
    }

    pub fn service(&self, ctx: &RequestContext, id: &ServiceId) -> Result<Service, MarketplaceError> {
        self.catalog.service(ctx, id)
    }

    pub fn set_service_active(
        &self,
        ctx: &RequestContext,
        id: &ServiceId,
        active: bool,
    ) -> Result<Service, MarketplaceError> {
        self.catalog.set_service_active(ctx, id, active)
    }

    pub fn create_job(&self, ctx: &RequestContext, draft: &JobDraft) -> Result<Job, MarketplaceError> {
        self.catalog.create_job(ctx, draft)
    }

    pub fn job(&self, ctx: &RequestContext, id: &JobId) -> Result<Job, MarketplaceError> {
        self.catalog.job(ctx, id)
    }

    pub fn review(
        &self,
        ctx: &RequestContext,
        kind: EntityKind,
        id: &str,
        request: &ReviewRequest,
    ) -> Result<ModeratedEntity, MarketplaceError> {
        self.moderation.review(ctx, kind, id, request)
    }

    pub fn moderation_queue(
        &self,
        ctx: &RequestContext,
        kind: EntityKind,
    ) -> Result<Vec<ModeratedEntity>, MarketplaceError> {
        self.moderation.queue(ctx, kind)
    }

    pub fn suspend_user(
        &self,
        ctx: &RequestContext,
        id: &UserId,
        reason: Option<&str>,
    ) -> Result<User, MarketplaceError> {
        self.moderation.suspend(ctx, id, reason)
    }

    pub fn reinstate_user(&self, ctx: &RequestContext, id: &UserId) -> Result<User, MarketplaceError> {
        self.moderation.reinstate(ctx, id)
    }

    pub fn apply(
        &self,
        ctx: &RequestContext,
        service_id: &ServiceId,
        draft: &ApplicationDraft,
    ) -> Result<Application, MarketplaceError> {
        self.applications.apply(ctx, service_id, draft)
    }

    pub fn decide(
        &self,
        ctx: &RequestContext,
        id: &ApplicationId,
        outcome: ApplicationOutcome,
    ) -> Result<Application, MarketplaceError> {
        self.applications.decide(ctx, id, outcome)
    }

    pub fn application(&self, ctx: &RequestContext, id: &ApplicationId) -> Result<Application, MarketplaceError> {
        self.applications.get(ctx, id)
    }

    pub fn applications_for_service(
        &self,
        ctx: &RequestContext,
        service_id: &ServiceId,
    ) -> Result<Vec<Application>, MarketplaceError> {
        self.applications.for_service(ctx, service_id)
    }

    pub fn record_review(
        &self,
        ctx: &RequestContext,
        subject: &UserId,
        score: f64,
    ) -> Result<RatingSummary, MarketplaceError> {
        self.ratings.record_review(ctx, subject, score)
    }

    pub fn search_services(&self, filter: &SearchFilter, sort: SortOrder) -> Result<Vec<Service>, MarketplaceError> {
        self.queries.services(filter, sort)
    }

    pub fn search_jobs(&self, filter: &SearchFilter, sort: SortOrder) -> Result<Vec<Job>, MarketplaceError> {
        self.queries.jobs(filter, sort)
    }

    pub fn search_freelancers(&self, filter: &SearchFilter, sort: SortOrder) -> Result<Vec<User>, MarketplaceError> {
        self.queries.freelancers(filter, sort)
    }

    pub fn top_freelancers(&self, limit: Option<usize>) -> Result<Vec<User>, MarketplaceError> {
        self.queries
            .top_freelancers(limit.unwrap_or(self.top_freelancers_limit))
    }
}
