use super::common::*;

use crate::marketplace::{
    EntityKind, MarketplaceError, MarketplaceService, ModeratedEntity, ModerationStatus,
    ReviewRequest, UserId, UserStatus,
};
use std::sync::Arc;

#[test]
fn approval_stamps_actor_and_request_time() {
    let h = harness();
    let admin = h.admin();
    h.freelancer("fl-1");
    let design = h.category("Design");
    let service = h.listed_service("fl-1", &design.id, "Logo Design", 50.0, 1);

    let reviewed = h
        .service
        .review(
            &ctx_at(ADMIN, 30),
            EntityKind::Service,
            service.id.as_str(),
            &ReviewRequest::approve(),
        )
        .expect("approve");

    let ModeratedEntity::Service(service) = reviewed else {
        panic!("expected a service");
    };
    assert_eq!(service.status, ModerationStatus::Approved);
    assert_eq!(service.moderation.approved_by, Some(admin.id));
    assert_eq!(service.moderation.approved_at, Some(at(30)));
    assert!(service.moderation.rejection_reason.is_none());
    assert!(h.notifications.templates().contains(&"service_approved".to_string()));
}

#[test]
fn rejection_requires_reason_and_leaves_approval_unset() {
    let h = harness();
    h.admin();
    let job_owner = h.member("client-1");
    let design = h.category("Design");
    let job = h.posted_job(&job_owner.id.0, &design.id, "Brand refresh", 800.0);

    let missing = h.service.review(
        &ctx(ADMIN),
        EntityKind::Job,
        job.id.as_str(),
        &ReviewRequest::reject("   "),
    );
    assert!(matches!(missing, Err(MarketplaceError::MissingReason)));

    let ModeratedEntity::Job(job) = h
        .service
        .review(
            &ctx(ADMIN),
            EntityKind::Job,
            job.id.as_str(),
            &ReviewRequest::reject("budget is unrealistic"),
        )
        .expect("reject")
    else {
        panic!("expected a job");
    };
    assert_eq!(job.status, ModerationStatus::Rejected);
    assert_eq!(
        job.moderation.rejection_reason.as_deref(),
        Some("budget is unrealistic")
    );
    assert!(job.moderation.approved_by.is_none());
    assert!(job.moderation.approved_at.is_none());

    let sent = h.notifications.sent();
    let notice = sent.last().expect("rejection notice");
    assert_eq!(notice.template, "job_rejected");
    assert_eq!(notice.recipient, job_owner.id);
    assert_eq!(
        notice.details.get("reason").map(String::as_str),
        Some("budget is unrealistic")
    );
}

#[test]
fn repeated_decision_is_a_no_op_and_opposite_decision_conflicts() {
    let h = harness();
    h.admin();
    h.freelancer("fl-1");
    let design = h.category("Design");
    let approved = h.approved_service("fl-1", &design.id, "Logo Design", 50.0, 1);
    let notices_before = h.notifications.sent().len();

    let again = h
        .service
        .review(
            &ctx_at(ADMIN, 90),
            EntityKind::Service,
            approved.id.as_str(),
            &ReviewRequest::approve(),
        )
        .expect("re-approval is not an error");
    assert_eq!(again, ModeratedEntity::Service(approved.clone()));
    assert_eq!(h.notifications.sent().len(), notices_before);

    let conflict = h.service.review(
        &ctx(ADMIN),
        EntityKind::Service,
        approved.id.as_str(),
        &ReviewRequest::reject("changed my mind"),
    );
    match conflict {
        Err(err @ MarketplaceError::Conflict { .. }) => {
            assert_eq!(err.current_status(), Some("approved"));
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    let current = h
        .service
        .service(&ctx(ADMIN), &approved.id)
        .expect("still there");
    assert_eq!(current, approved);
}

#[test]
fn non_admin_cannot_moderate() {
    let h = harness();
    h.admin();
    h.freelancer("fl-1");
    h.pending_freelancer("fl-2");

    let result = h.service.review(
        &ctx("fl-1"),
        EntityKind::User,
        "fl-2",
        &ReviewRequest::approve(),
    );
    assert!(matches!(result, Err(MarketplaceError::Unauthorized { .. })));

    let result = h.service.review(
        &anonymous(),
        EntityKind::User,
        "fl-2",
        &ReviewRequest::approve(),
    );
    assert!(matches!(result, Err(MarketplaceError::AuthenticationRequired)));
}

#[test]
fn admin_cannot_review_own_account() {
    let h = harness();
    h.admin();
    let result = h.service.review(
        &ctx(ADMIN),
        EntityKind::User,
        ADMIN,
        &ReviewRequest::approve(),
    );
    assert!(matches!(result, Err(MarketplaceError::SelfModeration)));
}

#[test]
fn suspended_user_is_not_pending() {
    let h = harness();
    h.admin();
    h.freelancer("fl-1");
    h.service
        .suspend_user(&ctx(ADMIN), &UserId::from("fl-1"), Some("chargebacks"))
        .expect("suspend");

    let result = h.service.review(
        &ctx(ADMIN),
        EntityKind::User,
        "fl-1",
        &ReviewRequest::approve(),
    );
    match result {
        Err(err @ MarketplaceError::NotPending { .. }) => {
            assert_eq!(err.current_status(), Some("suspended"));
        }
        other => panic!("expected not pending, got {other:?}"),
    }
}

#[test]
fn unknown_entity_is_not_found() {
    let h = harness();
    h.admin();
    let result = h.service.review(
        &ctx(ADMIN),
        EntityKind::Service,
        "svc_missing",
        &ReviewRequest::approve(),
    );
    assert!(matches!(result, Err(MarketplaceError::NotFound { kind: "service", .. })));
}

#[test]
fn queue_lists_pending_oldest_first() {
    let h = harness();
    h.admin();
    h.pending_freelancer_at("fl-late", 20);
    h.pending_freelancer_at("fl-early", 5);
    h.freelancer("fl-done");

    let queue = h
        .service
        .moderation_queue(&ctx(ADMIN), EntityKind::User)
        .expect("queue");
    let ids: Vec<_> = queue.iter().map(ModeratedEntity::id).collect();
    assert_eq!(ids, vec!["fl-early", "fl-late"]);

    assert!(matches!(
        h.service.moderation_queue(&ctx("fl-done"), EntityKind::User),
        Err(MarketplaceError::Unauthorized { .. })
    ));
}

#[test]
fn suspension_and_reinstatement_cycle() {
    let h = harness();
    let admin = h.admin();
    h.freelancer("fl-1");
    let id = UserId::from("fl-1");

    assert!(matches!(
        h.service.suspend_user(&ctx(ADMIN), &id, None),
        Err(MarketplaceError::MissingReason)
    ));

    let suspended = h
        .service
        .suspend_user(&ctx(ADMIN), &id, Some("spam"))
        .expect("suspend");
    assert_eq!(suspended.status, UserStatus::Suspended);
    assert_eq!(suspended.suspension_reason.as_deref(), Some("spam"));

    let again = h
        .service
        .suspend_user(&ctx(ADMIN), &id, Some("spam"))
        .expect("second suspension is a no-op");
    assert_eq!(again.version, suspended.version);

    let reinstated = h
        .service
        .reinstate_user(&ctx_at(ADMIN, 60), &id)
        .expect("reinstate");
    assert_eq!(reinstated.status, UserStatus::Approved);
    assert!(reinstated.suspension_reason.is_none());
    assert_eq!(reinstated.moderation.approved_by, Some(admin.id.clone()));
    assert_eq!(reinstated.moderation.approved_at, Some(at(60)));

    assert!(matches!(
        h.service.suspend_user(&ctx(ADMIN), &admin.id, Some("oops")),
        Err(MarketplaceError::SelfModeration)
    ));
    assert_eq!(
        h.notifications
            .templates()
            .iter()
            .filter(|template| template.starts_with("user_"))
            .cloned()
            .collect::<Vec<_>>(),
        vec!["user_approved", "user_suspended", "user_reinstated"]
    );
}

#[test]
fn reinstating_restores_pending_status_without_approval() {
    let h = harness();
    h.admin();
    h.pending_freelancer("fl-x");
    let id = UserId::from("fl-x");

    let suspended = h
        .service
        .suspend_user(&ctx(ADMIN), &id, Some("duplicate account"))
        .expect("suspend");
    assert_eq!(suspended.suspended_from, Some(UserStatus::Pending));

    let reinstated = h
        .service
        .reinstate_user(&ctx(ADMIN), &id)
        .expect("reinstate");
    assert_eq!(reinstated.status, UserStatus::Pending);
    assert!(!reinstated.is_qualified_freelancer());
    assert!(reinstated.moderation.approved_by.is_none());
    assert!(reinstated.suspended_from.is_none());

    let queue = h
        .service
        .moderation_queue(&ctx(ADMIN), EntityKind::User)
        .expect("queue");
    assert!(queue.iter().any(|entity| entity.id() == "fl-x"));

    let approved = h
        .service
        .review(&ctx(ADMIN), EntityKind::User, "fl-x", &ReviewRequest::approve())
        .expect("normal review still applies");
    assert_eq!(approved.status_label(), "approved");
}

#[test]
fn concurrent_reviews_leave_exactly_one_terminal_decision() {
    let h = harness();
    h.admin();
    h.freelancer("fl-1");
    let design = h.category("Design");
    let service = h.listed_service("fl-1", &design.id, "Logo Design", 50.0, 1);

    let outcomes: Vec<_> = std::thread::scope(|scope| {
        let approve = scope.spawn(|| {
            h.service.review(
                &ctx(ADMIN),
                EntityKind::Service,
                service.id.as_str(),
                &ReviewRequest::approve(),
            )
        });
        let reject = scope.spawn(|| {
            h.service.review(
                &ctx(ADMIN),
                EntityKind::Service,
                service.id.as_str(),
                &ReviewRequest::reject("duplicate listing"),
            )
        });
        vec![
            approve.join().expect("approve thread"),
            reject.join().expect("reject thread"),
        ]
    });

    let successes = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, Err(MarketplaceError::Conflict { .. })))
        .count();
    assert_eq!((successes, conflicts), (1, 1));

    let stored = h
        .service
        .service(&ctx(ADMIN), &service.id)
        .expect("stored");
    assert_ne!(stored.status, ModerationStatus::Pending);
    assert_eq!(stored.version, 2);
}

#[test]
fn failed_notification_does_not_undo_decision() {
    let store = Arc::new(crate::marketplace::InMemoryStore::default());
    let service = MarketplaceService::new(Arc::clone(&store), Arc::new(BrokenNotifications), &config());
    service
        .register_user(&ctx(ADMIN), &profile("Ada Admin", false))
        .expect("admin");
    service
        .register_user(&ctx("fl-1"), &profile("fl-1", true))
        .expect("freelancer");

    let reviewed = service
        .review(&ctx(ADMIN), EntityKind::User, "fl-1", &ReviewRequest::approve())
        .expect("decision stands");
    assert_eq!(reviewed.status_label(), "approved");
}

#[test]
fn store_outage_is_retried_then_surfaced() {
    let h = harness();
    h.admin();
    h.pending_freelancer("fl-1");

    h.store.fail_next(1);
    let reviewed = h
        .service
        .review(&ctx(ADMIN), EntityKind::User, "fl-1", &ReviewRequest::approve())
        .expect("one blip is absorbed");
    assert_eq!(reviewed.status_label(), "approved");

    h.pending_freelancer("fl-2");
    h.store.fail_next(50);
    let result = h.service.review(
        &ctx(ADMIN),
        EntityKind::User,
        "fl-2",
        &ReviewRequest::approve(),
    );
    assert!(matches!(result, Err(MarketplaceError::StoreUnavailable(_))));
    h.store.fail_next(0);
}
