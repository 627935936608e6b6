use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::config::MarketplaceConfig;
use crate::marketplace::{
    Category, CategoryDraft, CategoryId, EntityKind, ExperienceLevel, Identity, InMemoryStore,
    Job, JobDraft, MarketplaceNotification, MarketplaceService, ModeratedEntity,
    NotificationError, NotificationPublisher, ProfileDraft, RequestContext, ReviewRequest,
    Service, ServiceDraft, User,
};

pub(super) const ADMIN: &str = "admin-1";

pub(super) fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
}

pub(super) fn ctx(subject: &str) -> RequestContext {
    ctx_at(subject, 0)
}

pub(super) fn ctx_at(subject: &str, minutes: i64) -> RequestContext {
    RequestContext::authenticated(
        Identity::new(subject, format!("{subject}@example.com")),
        at(minutes),
    )
}

pub(super) fn anonymous() -> RequestContext {
    RequestContext::anonymous(at(0))
}

pub(super) fn config() -> MarketplaceConfig {
    MarketplaceConfig {
        admin_subjects: vec![ADMIN.to_string()],
        ..MarketplaceConfig::default()
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifications {
    sent: Arc<Mutex<Vec<MarketplaceNotification>>>,
}

impl MemoryNotifications {
    pub(super) fn sent(&self) -> Vec<MarketplaceNotification> {
        self.sent.lock().expect("notification mutex poisoned").clone()
    }

    pub(super) fn templates(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .map(|notification| notification.template)
            .collect()
    }
}

impl NotificationPublisher for MemoryNotifications {
    fn publish(&self, notification: MarketplaceNotification) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct BrokenNotifications;

impl NotificationPublisher for BrokenNotifications {
    fn publish(&self, _notification: MarketplaceNotification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay down".to_string()))
    }
}

pub(super) struct Harness {
    pub(super) service: Arc<MarketplaceService<InMemoryStore, MemoryNotifications>>,
    pub(super) store: Arc<InMemoryStore>,
    pub(super) notifications: Arc<MemoryNotifications>,
}

pub(super) fn harness() -> Harness {
    harness_with(config())
}

pub(super) fn harness_with(config: MarketplaceConfig) -> Harness {
    let store = Arc::new(InMemoryStore::default());
    let notifications = Arc::new(MemoryNotifications::default());
    let service = Arc::new(MarketplaceService::new(
        Arc::clone(&store),
        Arc::clone(&notifications),
        &config,
    ));
    Harness {
        service,
        store,
        notifications,
    }
}

pub(super) fn profile(name: &str, freelancer: bool) -> ProfileDraft {
    ProfileDraft {
        full_name: name.to_string(),
        bio: format!("{name} builds things"),
        skills: vec!["rust".to_string()],
        hourly_rate: None,
        location: None,
        freelancer,
        client: true,
    }
}

impl Harness {
    pub(super) fn admin(&self) -> User {
        self.service
            .register_user(&ctx(ADMIN), &profile("Ada Admin", false))
            .expect("admin registers")
    }

    pub(super) fn member(&self, subject: &str) -> User {
        self.service
            .register_user(&ctx(subject), &profile(subject, false))
            .expect("member registers")
    }

    pub(super) fn pending_freelancer(&self, subject: &str) -> User {
        self.pending_freelancer_at(subject, 0)
    }

    pub(super) fn pending_freelancer_at(&self, subject: &str, minutes: i64) -> User {
        self.service
            .register_user(&ctx_at(subject, minutes), &profile(subject, true))
            .expect("freelancer registers")
    }

    /// Registered and approved; assumes [`Harness::admin`] already ran.
    pub(super) fn freelancer(&self, subject: &str) -> User {
        self.pending_freelancer(subject);
        self.approve(EntityKind::User, subject);
        self.user(subject)
    }

    pub(super) fn user(&self, subject: &str) -> User {
        self.service
            .user(&ctx(ADMIN), &subject.into())
            .expect("user exists")
    }

    pub(super) fn approve(&self, kind: EntityKind, id: &str) -> ModeratedEntity {
        self.service
            .review(&ctx(ADMIN), kind, id, &ReviewRequest::approve())
            .expect("admin approves")
    }

    pub(super) fn category(&self, name: &str) -> Category {
        self.service
            .create_category(
                &ctx(ADMIN),
                &CategoryDraft {
                    name: name.to_string(),
                    description: None,
                    icon: None,
                },
            )
            .expect("category created")
    }

    pub(super) fn listed_service(
        &self,
        owner: &str,
        category: &CategoryId,
        title: &str,
        price: f64,
        minutes: i64,
    ) -> Service {
        self.service
            .create_service(&ctx_at(owner, minutes), &service_draft(category, title, price))
            .expect("service listed")
    }

    pub(super) fn approved_service(
        &self,
        owner: &str,
        category: &CategoryId,
        title: &str,
        price: f64,
        minutes: i64,
    ) -> Service {
        let service = self.listed_service(owner, category, title, price, minutes);
        match self.approve(EntityKind::Service, service.id.as_str()) {
            ModeratedEntity::Service(service) => service,
            other => panic!("expected a service, got {other:?}"),
        }
    }

    pub(super) fn posted_job(&self, client: &str, category: &CategoryId, title: &str, budget: f64) -> Job {
        self.service
            .create_job(
                &ctx(client),
                &JobDraft {
                    category_id: category.clone(),
                    title: title.to_string(),
                    description: format!("{title} needed"),
                    budget,
                    duration: "2 weeks".to_string(),
                    experience_level: ExperienceLevel::Intermediate,
                    skills: vec!["design".to_string()],
                },
            )
            .expect("job posted")
    }
}

pub(super) fn service_draft(category: &CategoryId, title: &str, price: f64) -> ServiceDraft {
    ServiceDraft {
        category_id: category.clone(),
        title: title.to_string(),
        description: format!("{title} delivered with care"),
        price,
        delivery_time: 3,
        skills: vec!["figma".to_string(), "branding".to_string()],
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
