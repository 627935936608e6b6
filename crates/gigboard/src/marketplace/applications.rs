use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::context::{caller, RequestContext};
use super::domain::{
    Application, ApplicationDraft, ApplicationId, ApplicationStatus, Service, ServiceId, User,
};
use super::error::{FieldError, MarketplaceError};
use super::notify::{dispatch, MarketplaceNotification, NotificationPublisher};
use super::store::{Committed, MarketplaceStore, RepositoryError, StoreRetry};

/// Terminal outcome chosen by the deciding actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationOutcome {
    #[serde(alias = "accept")]
    Accepted,
    #[serde(alias = "decline")]
    Declined,
}

impl ApplicationOutcome {
    fn status(self) -> ApplicationStatus {
        match self {
            ApplicationOutcome::Accepted => ApplicationStatus::Accepted,
            ApplicationOutcome::Declined => ApplicationStatus::Declined,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub outcome: ApplicationOutcome,
}

/// Validated proposal terms.
#[derive(Debug, Clone, PartialEq)]
struct Proposal {
    message: String,
    proposed_price: f64,
    delivery_time: u32,
}

impl Proposal {
    fn validate(draft: &ApplicationDraft) -> Result<Self, MarketplaceError> {
        let mut fields = Vec::new();

        let message = draft.message.trim();
        if message.is_empty() {
            fields.push(FieldError::new("message", "must not be empty"));
        }
        if !(draft.proposed_price.is_finite() && draft.proposed_price > 0.0) {
            fields.push(FieldError::new("proposed_price", "must be greater than zero"));
        }
        let delivery_time = match u32::try_from(draft.delivery_time) {
            Ok(days) if days > 0 => days,
            _ => {
                fields.push(FieldError::new(
                    "delivery_time",
                    "must be a positive number of days",
                ));
                0
            }
        };

        if !fields.is_empty() {
            return Err(MarketplaceError::ValidationFailed(fields));
        }
        Ok(Self {
            message: message.to_string(),
            proposed_price: draft.proposed_price,
            delivery_time,
        })
    }
}

/// Freelancer proposals against approved services and their one-time decisions.
pub struct ApplicationWorkflow<S: ?Sized, N: ?Sized> {
    store: Arc<S>,
    notifications: Arc<N>,
    retry: StoreRetry,
    allow_duplicates: bool,
}

impl<S, N> ApplicationWorkflow<S, N>
where
    S: MarketplaceStore + ?Sized,
    N: NotificationPublisher + ?Sized,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, retry: StoreRetry, allow_duplicates: bool) -> Self {
        Self {
            store,
            notifications,
            retry,
            allow_duplicates,
        }
    }

    pub fn apply(
        &self,
        ctx: &RequestContext,
        service_id: &ServiceId,
        draft: &ApplicationDraft,
    ) -> Result<Application, MarketplaceError> {
        let freelancer = caller(self.store.as_ref(), &self.retry, ctx)?
            .filter(User::is_qualified_freelancer)
            .ok_or(MarketplaceError::FreelancerProfileRequired)?;
        let proposal = Proposal::validate(draft)?;

        let service = self.load_service(service_id)?;
        if !service.accepts_applications() {
            return Err(MarketplaceError::ServiceUnavailable {
                id: service.id.to_string(),
                current: service.status.label(),
                active: service.is_active,
            });
        }
        if service.freelancer_id == freelancer.id {
            return Err(MarketplaceError::ValidationFailed(vec![FieldError::new(
                "service_id",
                "freelancers cannot apply to their own service",
            )]));
        }

        let application = Application {
            id: ApplicationId::generate(),
            service_id: service.id.clone(),
            freelancer_id: freelancer.id.clone(),
            message: proposal.message,
            proposed_price: proposal.proposed_price,
            delivery_time: proposal.delivery_time,
            status: ApplicationStatus::Submitted,
            created_at: ctx.received_at(),
            decided_at: None,
            decided_by: None,
            version: 0,
        };

        let stored = self
            .retry
            .call("insert_application", || {
                if self.allow_duplicates {
                    self.store.insert_application(application.clone())
                } else {
                    self.store.insert_application_exclusive(application.clone())
                }
            })
            .map_err(|err| match err {
                RepositoryError::Conflict => MarketplaceError::DuplicateApplication {
                    service_id: service.id.to_string(),
                },
                other => other.into(),
            })?;

        info!(
            application = %stored.id,
            service = %stored.service_id,
            freelancer = %stored.freelancer_id,
            status = stored.status.label(),
            "application submitted"
        );
        dispatch(
            self.notifications.as_ref(),
            MarketplaceNotification::new(
                "application_received",
                &service.freelancer_id,
                stored.id.as_str(),
            )
            .with_detail("service_id", service.id.as_str())
            .with_detail("applicant", stored.freelancer_id.as_str()),
        );
        Ok(stored)
    }

    /// Move a submitted application to its terminal outcome. Unlike moderation,
    /// repeating a decision is an error.
    pub fn decide(
        &self,
        ctx: &RequestContext,
        application_id: &ApplicationId,
        outcome: ApplicationOutcome,
    ) -> Result<Application, MarketplaceError> {
        let actor = caller(self.store.as_ref(), &self.retry, ctx)?
            .ok_or_else(|| MarketplaceError::unauthorized("register before deciding applications"))?;
        let at = ctx.received_at();

        let committed = self.retry.read_modify_write(
            "decide_application",
            || {
                let application = self.load_application(application_id)?;
                let service = self.load_service(&application.service_id)?;
                let owns_service = service.freelancer_id == actor.id;
                if !(owns_service || actor.is_active_admin()) {
                    return Err(MarketplaceError::unauthorized(
                        "only the service owner or an admin can decide this application",
                    ));
                }
                Ok(application)
            },
            |mut application| {
                if !application.is_awaiting_decision() {
                    return Err(MarketplaceError::AlreadyDecided {
                        id: application.id.to_string(),
                        current: application.status.label(),
                    });
                }
                application.status = outcome.status();
                application.decided_at = Some(at);
                application.decided_by = Some(actor.id.clone());
                Ok(Committed::Written(application))
            },
            |application| self.store.replace_application(application),
        )?;

        let application = committed.into_inner();
        info!(
            application = %application.id,
            service = %application.service_id,
            actor = %actor.id,
            status = application.status.label(),
            "application decided"
        );
        dispatch(
            self.notifications.as_ref(),
            MarketplaceNotification::new(
                format!("application_{}", application.status.label()),
                &application.freelancer_id,
                application.id.as_str(),
            )
            .with_detail("service_id", application.service_id.as_str()),
        );
        Ok(application)
    }

    /// Visible to the applicant, the service owner and admins.
    pub fn get(
        &self,
        ctx: &RequestContext,
        application_id: &ApplicationId,
    ) -> Result<Application, MarketplaceError> {
        let viewer = caller(self.store.as_ref(), &self.retry, ctx)?;
        let application = self.retry.call("fetch_application", || {
            self.store.fetch_application(application_id)
        })?;
        let hidden = || MarketplaceError::not_found("application", application_id);
        let (application, viewer) = match (application, viewer) {
            (Some(application), Some(viewer)) => (application, viewer),
            _ => return Err(hidden()),
        };

        if application.freelancer_id == viewer.id || viewer.is_active_admin() {
            return Ok(application);
        }
        let service = self.load_service(&application.service_id)?;
        if service.freelancer_id == viewer.id {
            Ok(application)
        } else {
            Err(hidden())
        }
    }

    /// Applications against one service, newest first.
    pub fn for_service(
        &self,
        ctx: &RequestContext,
        service_id: &ServiceId,
    ) -> Result<Vec<Application>, MarketplaceError> {
        let viewer = caller(self.store.as_ref(), &self.retry, ctx)?
            .ok_or_else(|| MarketplaceError::unauthorized("register before viewing applications"))?;
        let service = self.load_service(service_id)?;
        if service.freelancer_id != viewer.id && !viewer.is_active_admin() {
            return Err(MarketplaceError::unauthorized(
                "only the service owner or an admin can list its applications",
            ));
        }

        let mut applications = self.retry.call("scan_applications", || {
            self.store.applications_for_service(service_id)
        })?;
        applications.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(applications)
    }

    fn load_service(&self, service_id: &ServiceId) -> Result<Service, MarketplaceError> {
        self.retry
            .call("fetch_service", || self.store.fetch_service(service_id))?
            .ok_or_else(|| MarketplaceError::not_found("service", service_id))
    }

    fn load_application(&self, id: &ApplicationId) -> Result<Application, MarketplaceError> {
        self.store
            .fetch_application(id)?
            .ok_or_else(|| MarketplaceError::not_found("application", id))
    }
}
