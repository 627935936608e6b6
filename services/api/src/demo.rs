use crate::infra::InMemoryNotificationPublisher;
use chrono::Utc;
use clap::Args;
use gigboard::config::MarketplaceConfig;
use gigboard::error::AppError;
use gigboard::marketplace::{
    ApplicationDraft, ApplicationOutcome, CategoryDraft, CategoryFilter, EntityKind,
    ExperienceLevel, Identity, InMemoryStore, JobDraft, MarketplaceService, ProfileDraft,
    RequestContext, ReviewRequest, SearchFilter, ServiceDraft, SortOrder, UserId,
};
use std::sync::Arc;

const DEMO_ADMIN: &str = "demo-admin";

type DemoMarketplace = MarketplaceService<InMemoryStore, InMemoryNotificationPublisher>;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Review scores left for the seeded freelancer (comma separated, 1-5)
    #[arg(long, value_delimiter = ',', default_values_t = [5.0, 4.0, 4.5])]
    pub(crate) reviews: Vec<f64>,
    /// Decline the seeded proposal instead of accepting it
    #[arg(long)]
    pub(crate) decline: bool,
    /// Free-text search applied to the discovery step
    #[arg(long, default_value = "")]
    pub(crate) search: String,
    /// Number of freelancers to show in the leaderboard
    #[arg(long, default_value_t = 3)]
    pub(crate) top: usize,
}

fn ctx(subject: &str) -> RequestContext {
    RequestContext::authenticated(
        Identity::new(subject, format!("{subject}@gigboard.test")),
        Utc::now(),
    )
}

fn profile(name: &str, bio: &str, skills: &[&str], rate: Option<f64>, freelancer: bool) -> ProfileDraft {
    ProfileDraft {
        full_name: name.to_string(),
        bio: bio.to_string(),
        skills: skills.iter().map(|skill| skill.to_string()).collect(),
        hourly_rate: rate,
        location: None,
        freelancer,
        client: true,
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let notifications = InMemoryNotificationPublisher::default();
    let config = MarketplaceConfig {
        admin_subjects: vec![DEMO_ADMIN.to_string()],
        ..MarketplaceConfig::default()
    };
    let market: DemoMarketplace = MarketplaceService::new(
        Arc::new(InMemoryStore::default()),
        Arc::new(notifications.clone()),
        &config,
    );

    println!("Gigboard marketplace demo");

    market.register_user(&ctx(DEMO_ADMIN), &profile("Ops Desk", "", &[], None, false))?;
    let seeded = [
        ("ana", "Ana Ruiz", "Brand identities for small studios", &["branding", "figma"][..], Some(55.0)),
        ("kofi", "Kofi Mensah", "Backend services in Rust", &["rust", "postgres"][..], Some(80.0)),
        ("lee", "Lee Park", "Motion graphics and explainers", &["animation"][..], Some(40.0)),
    ];
    for (subject, name, bio, skills, rate) in seeded {
        let user = market.register_user(&ctx(subject), &profile(name, bio, skills, rate, true))?;
        println!("  Registered {} ({}), status {}", user.profile.full_name, user.id, user.status.label());
    }
    let client = market.register_user(
        &ctx("harbor"),
        &profile("Harbor Coffee", "Neighbourhood roastery", &[], None, false),
    )?;
    println!("  Registered client {} ({})", client.profile.full_name, client.id);

    println!("\nModeration");
    for subject in ["ana", "kofi", "lee", "harbor"] {
        market.review(&ctx(DEMO_ADMIN), EntityKind::User, subject, &ReviewRequest::approve())?;
    }
    println!("  Approved 4 pending profiles");

    let design = market.create_category(
        &ctx(DEMO_ADMIN),
        &CategoryDraft {
            name: "Design".to_string(),
            description: Some("Visual and brand work".to_string()),
            icon: None,
        },
    )?;
    let listing = market.create_service(
        &ctx("ana"),
        &ServiceDraft {
            category_id: design.id.clone(),
            title: "Logo and brand kit".to_string(),
            description: "Three logo concepts, palette and type pairing".to_string(),
            price: 320.0,
            delivery_time: 7,
            skills: vec!["branding".to_string()],
        },
    )?;
    let job = market.create_job(
        &ctx("harbor"),
        &JobDraft {
            category_id: design.id.clone(),
            title: "Seasonal menu illustrations".to_string(),
            description: "Six illustrations for the autumn menu".to_string(),
            budget: 600.0,
            duration: "2 weeks".to_string(),
            experience_level: ExperienceLevel::Intermediate,
            skills: vec!["illustration".to_string()],
        },
    )?;
    let queue = market.moderation_queue(&ctx(DEMO_ADMIN), EntityKind::Service)?;
    println!("  Services awaiting review: {}", queue.len());
    let approved = market.review(
        &ctx(DEMO_ADMIN),
        EntityKind::Service,
        listing.id.as_str(),
        &ReviewRequest::approve(),
    )?;
    println!("  {} {} is now {}", approved.kind(), approved.id(), approved.status_label());
    let rejected = market.review(
        &ctx(DEMO_ADMIN),
        EntityKind::Job,
        job.id.as_str(),
        &ReviewRequest::reject("Budget must include licensing terms"),
    )?;
    println!("  {} {} is now {}", rejected.kind(), rejected.id(), rejected.status_label());

    println!("\nProposal");
    let application = market.apply(
        &ctx("lee"),
        &listing.id,
        &ApplicationDraft {
            message: "Happy to animate the final mark as a bonus".to_string(),
            proposed_price: 300.0,
            delivery_time: 6,
        },
    )?;
    println!(
        "  {} applied to '{}' at {:.2} over {} days",
        application.freelancer_id, listing.title, application.proposed_price, application.delivery_time
    );
    let outcome = if args.decline {
        ApplicationOutcome::Declined
    } else {
        ApplicationOutcome::Accepted
    };
    let decided = market.decide(&ctx("ana"), &application.id, outcome)?;
    println!("  Owner decision: {}", decided.status.label());

    println!("\nReviews");
    let subject = UserId::from("ana");
    for score in &args.reviews {
        match market.record_review(&ctx("harbor"), &subject, *score) {
            Ok(summary) => println!(
                "  Scored {score}: average {:.2} over {} reviews",
                summary.rating.unwrap_or_default(),
                summary.total_reviews
            ),
            Err(err) => println!("  Score {score} refused: {err}"),
        }
    }
    market.record_review(&ctx("harbor"), &UserId::from("kofi"), 4.0)?;

    println!("\nDiscovery");
    let filter = SearchFilter::new(args.search.as_str(), CategoryFilter::All);
    for service in market.search_services(&filter, SortOrder::PriceLow)? {
        println!("  Service '{}' at {:.2}", service.title, service.price);
    }
    let jobs = market.search_jobs(&filter, SortOrder::Newest)?;
    println!("  Public jobs: {}", jobs.len());
    for user in market.search_freelancers(&filter, SortOrder::PriceHigh)? {
        println!(
            "  Freelancer {} at {:.2}/h",
            user.profile.full_name,
            user.profile.hourly_rate.unwrap_or_default()
        );
    }

    println!("\nTop freelancers");
    for (rank, user) in market.top_freelancers(Some(args.top))?.iter().enumerate() {
        println!(
            "  {}. {} {:.2} ({} reviews)",
            rank + 1,
            user.profile.full_name,
            user.rating.average().unwrap_or_default(),
            user.rating.total_reviews()
        );
    }

    println!("\nNotifications");
    for notification in notifications.events() {
        println!("  {} -> {}", notification.template, notification.recipient);
    }

    Ok(())
}
