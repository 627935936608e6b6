//! Freelance marketplace core: the entity store contract and the moderation,
//! application, rating and discovery engines built on it.

pub mod applications;
pub mod catalog;
pub mod context;
pub mod domain;
pub mod error;
pub mod moderation;
pub mod notify;
pub mod query;
pub mod rating;
pub mod router;
pub mod service;
pub mod store;

pub use applications::{ApplicationOutcome, ApplicationWorkflow, DecisionRequest};
pub use catalog::Catalog;
pub use context::{Identity, IdentityError, IdentityProvider, ProxyHeaderIdentity, RequestContext};
pub use domain::{
    Application, ApplicationDraft, ApplicationId, ApplicationStatus, Category, CategoryDraft,
    CategoryId, EntityKind, ExperienceLevel, Job, JobDraft, JobId, ModerationStamp,
    ModerationStatus, ProfileDraft, Service, ServiceDraft, ServiceId, User, UserId, UserProfile,
    UserStatus,
};
pub use error::{ErrorClass, FieldError, MarketplaceError};
pub use moderation::{Decision, ModeratedEntity, ModerationEngine, ReviewRequest};
pub use notify::{MarketplaceNotification, NotificationError, NotificationPublisher};
pub use query::{CategoryFilter, QueryPipeline, SearchFilter, SortOrder};
pub use rating::{Rating, RatingAggregator, RatingSummary, ReviewScore};
pub use router::{marketplace_router, MarketplaceState};
pub use service::MarketplaceService;
pub use store::{Committed, InMemoryStore, MarketplaceStore, RepositoryError, StoreRetry};

#[cfg(test)]
mod tests;
