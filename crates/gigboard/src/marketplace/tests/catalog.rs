use super::common::*;

use crate::marketplace::{
    CategoryDraft, EntityKind, Identity, MarketplaceError, ModerationStatus, RequestContext,
    ServiceId, UserId, UserStatus,
};

#[test]
fn registration_uses_identity_and_starts_pending() {
    let h = harness();
    let user = h.pending_freelancer("fl-1");

    assert_eq!(user.id, UserId::from("fl-1"));
    assert_eq!(user.email, "fl-1@example.com");
    assert_eq!(user.status, UserStatus::Pending);
    assert!(user.is_freelancer && !user.is_admin);
    assert_eq!(user.rating.total_reviews(), 0);
    assert_eq!(user.version, 1);

    let again = h
        .service
        .register_user(&ctx("fl-1"), &profile("fl-1", true));
    assert!(matches!(
        again,
        Err(MarketplaceError::AlreadyExists { kind: "user", .. })
    ));
}

#[test]
fn configured_admin_is_born_approved() {
    let h = harness();
    let admin = h.admin();
    assert!(admin.is_admin);
    assert_eq!(admin.status, UserStatus::Approved);
}

#[test]
fn registration_requires_session() {
    let h = harness();
    let mut identity = Identity::new("fl-1", "fl-1@example.com");
    identity.session_valid = false;
    let expired = RequestContext::authenticated(identity, at(0));
    assert!(matches!(
        h.service.register_user(&expired, &profile("fl-1", true)),
        Err(MarketplaceError::AuthenticationRequired)
    ));
}

#[test]
fn categories_are_admin_only_unique_and_sorted() {
    let h = harness();
    h.admin();
    h.member("client-1");
    h.category("Writing");
    h.category("design");

    let draft = CategoryDraft {
        name: "Design".to_string(),
        description: None,
        icon: None,
    };
    assert!(matches!(
        h.service.create_category(&ctx(ADMIN), &draft),
        Err(MarketplaceError::AlreadyExists { kind: "category", .. })
    ));
    assert!(matches!(
        h.service.create_category(&ctx("client-1"), &draft),
        Err(MarketplaceError::Unauthorized { .. })
    ));

    let names: Vec<_> = h
        .service
        .categories()
        .expect("list")
        .into_iter()
        .map(|category| category.name)
        .collect();
    assert_eq!(names, vec!["design", "Writing"]);
}

#[test]
fn service_creation_validates_draft_and_category() {
    let h = harness();
    h.admin();
    h.pending_freelancer("fl-1");
    h.member("client-1");
    let design = h.category("Design");

    let mut draft = service_draft(&design.id, "  ", 0.0);
    draft.delivery_time = -1;
    draft.category_id = "cat_missing".into();
    match h.service.create_service(&ctx("fl-1"), &draft) {
        Err(MarketplaceError::ValidationFailed(fields)) => {
            let names: Vec<_> = fields.iter().map(|field| field.field).collect();
            assert_eq!(names, vec!["title", "price", "delivery_time", "category_id"]);
        }
        other => panic!("expected validation failure, got {other:?}"),
    }

    assert!(matches!(
        h.service
            .create_service(&ctx("client-1"), &service_draft(&design.id, "Logos", 40.0)),
        Err(MarketplaceError::FreelancerProfileRequired)
    ));

    let service = h.listed_service("fl-1", &design.id, "Logos", 40.0, 1);
    assert_eq!(service.status, ModerationStatus::Pending);
    assert!(service.is_active);
    assert_eq!(service.skills.len(), 2);
}

#[test]
fn job_posting_requires_client_capability() {
    let h = harness();
    h.admin();
    let design = h.category("Design");
    let mut draft = profile("fl-only", true);
    draft.client = false;
    h.service
        .register_user(&ctx("fl-only"), &draft)
        .expect("register");

    let result = h.service.create_job(
        &ctx("fl-only"),
        &crate::marketplace::JobDraft {
            category_id: design.id.clone(),
            title: "Poster".to_string(),
            description: "Concert poster".to_string(),
            budget: 300.0,
            duration: "1 week".to_string(),
            experience_level: crate::marketplace::ExperienceLevel::Entry,
            skills: Vec::new(),
        },
    );
    assert!(matches!(result, Err(MarketplaceError::Unauthorized { .. })));
}

#[test]
fn active_toggle_is_owner_only_and_needs_approval() {
    let h = harness();
    h.admin();
    h.freelancer("fl-1");
    h.freelancer("fl-2");
    let design = h.category("Design");
    let pending = h.listed_service("fl-1", &design.id, "Pending", 40.0, 1);
    let live = h.approved_service("fl-1", &design.id, "Live", 40.0, 2);

    match h.service.set_service_active(&ctx("fl-1"), &pending.id, false) {
        Err(err @ MarketplaceError::InvalidState { .. }) => {
            assert_eq!(err.current_status(), Some("pending"));
        }
        other => panic!("expected invalid state, got {other:?}"),
    }
    assert!(matches!(
        h.service.set_service_active(&ctx("fl-2"), &live.id, false),
        Err(MarketplaceError::Unauthorized { .. })
    ));

    let hidden = h
        .service
        .set_service_active(&ctx("fl-1"), &live.id, false)
        .expect("hide");
    assert!(!hidden.is_active);
    let unchanged = h
        .service
        .set_service_active(&ctx("fl-1"), &live.id, false)
        .expect("same value");
    assert_eq!(unchanged.version, hidden.version);
    let shown = h
        .service
        .set_service_active(&ctx("fl-1"), &live.id, true)
        .expect("show");
    assert!(shown.is_active);
    assert_eq!(shown.status, ModerationStatus::Approved);
}

#[test]
fn unapproved_listings_are_hidden_from_strangers() {
    let h = harness();
    h.admin();
    h.freelancer("fl-1");
    h.member("client-1");
    let design = h.category("Design");
    let pending = h.listed_service("fl-1", &design.id, "Draft", 40.0, 1);

    assert!(matches!(
        h.service.service(&anonymous(), &pending.id),
        Err(MarketplaceError::NotFound { .. })
    ));
    assert!(matches!(
        h.service.service(&ctx("client-1"), &pending.id),
        Err(MarketplaceError::NotFound { .. })
    ));
    h.service
        .service(&ctx("fl-1"), &pending.id)
        .expect("owner sees draft");
    h.service
        .service(&ctx(ADMIN), &pending.id)
        .expect("admin sees draft");

    assert!(matches!(
        h.service.user(&anonymous(), &UserId::from("client-1")),
        Err(MarketplaceError::NotFound { .. })
    ));
    h.service
        .user(&anonymous(), &UserId::from("fl-1"))
        .expect("approved profile is public");

    h.approve(EntityKind::Service, pending.id.as_str());
    h.service
        .service(&anonymous(), &pending.id)
        .expect("now public");
    assert!(matches!(
        h.service.service(&anonymous(), &ServiceId::from("svc_nope")),
        Err(MarketplaceError::NotFound { kind: "service", .. })
    ));
}
