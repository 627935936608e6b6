use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rating::Rating;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(format!(concat!($prefix, "_{}"), Uuid::new_v4().simple()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

identifier!(
    /// Subject id issued by the identity provider.
    UserId,
    "usr"
);
identifier!(CategoryId, "cat");
identifier!(ServiceId, "svc");
identifier!(JobId, "job");
identifier!(
    /// Identifier wrapper for freelancer proposals.
    ApplicationId,
    "app"
);

/// Entity families that pass through admin moderation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "users")]
    User,
    #[serde(rename = "services")]
    Service,
    #[serde(rename = "jobs")]
    Job,
}

impl EntityKind {
    pub const fn label(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Service => "service",
            EntityKind::Job => "job",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" | "users" | "freelancers" => Ok(EntityKind::User),
            "service" | "services" => Ok(EntityKind::Service),
            "job" | "jobs" => Ok(EntityKind::Job),
            other => Err(format!("unknown entity type '{other}'")),
        }
    }
}

/// Lifecycle of a user's freelancer qualification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl UserStatus {
    pub const fn label(self) -> &'static str {
        match self {
            UserStatus::Pending => "pending",
            UserStatus::Approved => "approved",
            UserStatus::Rejected => "rejected",
            UserStatus::Suspended => "suspended",
        }
    }
}

/// Approval lifecycle shared by services and jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ModerationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ModerationStatus::Pending => "pending",
            ModerationStatus::Approved => "approved",
            ModerationStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    Accepted,
    Declined,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Declined => "declined",
        }
    }
}

/// Last moderation decision. Approval and rejection fields are mutually exclusive;
/// each decision overwrites the previous one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModerationStamp {
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl ModerationStamp {
    pub(crate) fn approve(&mut self, actor: &UserId, at: DateTime<Utc>) {
        self.approved_by = Some(actor.clone());
        self.approved_at = Some(at);
        self.rejection_reason = None;
    }

    pub(crate) fn reject(&mut self, reason: &str) {
        self.approved_by = None;
        self.approved_at = None;
        self.rejection_reason = Some(reason.to_string());
    }
}

/// Public profile fields captured at registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub full_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    #[serde(default)]
    pub hourly_rate: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(flatten)]
    pub profile: UserProfile,
    pub is_freelancer: bool,
    pub is_client: bool,
    pub is_admin: bool,
    pub status: UserStatus,
    #[serde(flatten)]
    pub rating: Rating,
    #[serde(flatten)]
    pub moderation: ModerationStamp,
    #[serde(default)]
    pub suspension_reason: Option<String>,
    /// Status held before the current suspension; reinstatement restores it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspended_from: Option<UserStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl User {
    /// Freelancer capability that has cleared moderation.
    pub fn is_qualified_freelancer(&self) -> bool {
        self.is_freelancer && self.status == UserStatus::Approved
    }

    pub fn is_active_admin(&self) -> bool {
        self.is_admin && self.status != UserStatus::Suspended
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Listing offered by a freelancer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub freelancer_id: UserId,
    pub category_id: CategoryId,
    pub title: String,
    pub description: String,
    pub price: f64,
    /// Days.
    pub delivery_time: u32,
    pub skills: BTreeSet<String>,
    pub status: ModerationStatus,
    pub is_active: bool,
    #[serde(flatten)]
    pub moderation: ModerationStamp,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Service {
    pub fn accepts_applications(&self) -> bool {
        self.status == ModerationStatus::Approved && self.is_active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Entry,
    Intermediate,
    Expert,
}

/// Work posted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub client_id: UserId,
    pub category_id: CategoryId,
    pub title: String,
    pub description: String,
    pub budget: f64,
    pub duration: String,
    pub experience_level: ExperienceLevel,
    pub skills: BTreeSet<String>,
    pub status: ModerationStatus,
    #[serde(flatten)]
    pub moderation: ModerationStamp,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

/// A freelancer's proposal against a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub service_id: ServiceId,
    pub freelancer_id: UserId,
    pub message: String,
    pub proposed_price: f64,
    /// Days.
    pub delivery_time: u32,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub decided_by: Option<UserId>,
    #[serde(default)]
    pub version: u64,
}

impl Application {
    pub fn is_awaiting_decision(&self) -> bool {
        self.status == ApplicationStatus::Submitted
    }
}

fn default_true() -> bool {
    true
}

/// Registration payload; id and email come from the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub full_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub hourly_rate: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub freelancer: bool,
    #[serde(default = "default_true")]
    pub client: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDraft {
    pub category_id: CategoryId,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub delivery_time: i64,
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDraft {
    pub category_id: CategoryId,
    pub title: String,
    pub description: String,
    pub budget: f64,
    pub duration: String,
    pub experience_level: ExperienceLevel,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// Proposal payload submitted by a freelancer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDraft {
    pub message: String,
    pub proposed_price: f64,
    pub delivery_time: i64,
}

/// Trim, drop blanks, and dedupe skill tokens.
pub(crate) fn normalize_skills(raw: &[String]) -> BTreeSet<String> {
    raw.iter()
        .map(|skill| skill.trim())
        .filter(|skill| !skill.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_parses_path_segments() {
        assert_eq!("services".parse::<EntityKind>(), Ok(EntityKind::Service));
        assert_eq!("Users".parse::<EntityKind>(), Ok(EntityKind::User));
        assert_eq!("job".parse::<EntityKind>(), Ok(EntityKind::Job));
        assert!("categories".parse::<EntityKind>().is_err());
    }

    #[test]
    fn moderation_stamp_keeps_fields_exclusive() {
        let at = Utc::now();
        let mut stamp = ModerationStamp::default();
        stamp.reject("blurry portfolio");
        assert_eq!(stamp.rejection_reason.as_deref(), Some("blurry portfolio"));
        assert!(stamp.approved_by.is_none());

        stamp.approve(&UserId::from("admin-1"), at);
        assert_eq!(stamp.approved_by, Some(UserId::from("admin-1")));
        assert_eq!(stamp.approved_at, Some(at));
        assert!(stamp.rejection_reason.is_none());
    }

    #[test]
    fn skills_are_trimmed_and_deduplicated() {
        let skills = normalize_skills(&[
            " rust ".to_string(),
            "".to_string(),
            "rust".to_string(),
            "axum".to_string(),
        ]);
        assert_eq!(skills.into_iter().collect::<Vec<_>>(), vec!["axum", "rust"]);
    }

    #[test]
    fn generated_ids_carry_prefix() {
        let id = ServiceId::generate();
        assert!(id.as_str().starts_with("svc_"));
        assert_ne!(id, ServiceId::generate());
    }
}
