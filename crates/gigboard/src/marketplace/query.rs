//! Discovery over the publicly visible slice of the store.
//!
//! Every call re-scans the store and returns a fresh, fully ordered result; no
//! cursor or cache survives between calls, so identical inputs over an unchanged
//! store always yield identical sequences.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{CategoryId, Job, ModerationStatus, Service, User, UserStatus};
use super::error::MarketplaceError;
use super::store::{MarketplaceStore, StoreRetry};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(CategoryId),
}

impl CategoryFilter {
    /// `"all"` (any case) or an empty value is the wildcard.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => CategoryFilter::All,
            Some(value) if value.eq_ignore_ascii_case("all") => CategoryFilter::All,
            Some(value) => CategoryFilter::Only(CategoryId::from(value)),
        }
    }

    fn admits(&self, category: &CategoryId) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => wanted == category,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub search: String,
    pub category: CategoryFilter,
}

impl SearchFilter {
    pub fn new(search: impl Into<String>, category: CategoryFilter) -> Self {
        Self {
            search: search.into(),
            category,
        }
    }

    fn needle(&self) -> Option<String> {
        let search = self.search.trim();
        (!search.is_empty()).then(|| search.to_lowercase())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "newest")]
    Newest,
    #[serde(rename = "price-low")]
    PriceLow,
    #[serde(rename = "price-high")]
    PriceHigh,
}

/// A record family the pipeline can filter and order.
pub trait Discoverable {
    fn publicly_visible(&self) -> bool;
    /// Text fields probed by free-text search.
    fn haystack(&self) -> Vec<&str>;
    /// `None` opts out of category filtering.
    fn category(&self) -> Option<&CategoryId>;
    fn price(&self) -> Option<f64>;
    fn created_at(&self) -> DateTime<Utc>;
    fn sort_id(&self) -> &str;
}

impl Discoverable for Service {
    fn publicly_visible(&self) -> bool {
        self.accepts_applications()
    }

    fn haystack(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str(), self.description.as_str()];
        fields.extend(self.skills.iter().map(String::as_str));
        fields
    }

    fn category(&self) -> Option<&CategoryId> {
        Some(&self.category_id)
    }

    fn price(&self) -> Option<f64> {
        Some(self.price)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn sort_id(&self) -> &str {
        self.id.as_str()
    }
}

impl Discoverable for Job {
    fn publicly_visible(&self) -> bool {
        self.status == ModerationStatus::Approved
    }

    fn haystack(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str(), self.description.as_str()];
        fields.extend(self.skills.iter().map(String::as_str));
        fields
    }

    fn category(&self) -> Option<&CategoryId> {
        Some(&self.category_id)
    }

    fn price(&self) -> Option<f64> {
        Some(self.budget)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn sort_id(&self) -> &str {
        self.id.as_str()
    }
}

impl Discoverable for User {
    fn publicly_visible(&self) -> bool {
        self.is_freelancer && self.status == UserStatus::Approved
    }

    fn haystack(&self) -> Vec<&str> {
        let mut fields = vec![self.profile.full_name.as_str(), self.profile.bio.as_str()];
        fields.extend(self.profile.skills.iter().map(String::as_str));
        fields
    }

    fn category(&self) -> Option<&CategoryId> {
        None
    }

    fn price(&self) -> Option<f64> {
        self.profile.hourly_rate
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn sort_id(&self) -> &str {
        self.id.as_str()
    }
}

fn is_hit<T: Discoverable>(record: &T, filter: &SearchFilter, needle: Option<&str>) -> bool {
    if !record.publicly_visible() {
        return false;
    }
    if let Some(category) = record.category() {
        if !filter.category.admits(category) {
            return false;
        }
    }
    match needle {
        None => true,
        Some(needle) => record
            .haystack()
            .iter()
            .any(|field| field.to_lowercase().contains(needle)),
    }
}

fn newest_first<T: Discoverable>(a: &T, b: &T) -> Ordering {
    b.created_at()
        .cmp(&a.created_at())
        .then_with(|| b.sort_id().cmp(a.sort_id()))
}

/// Unpriced records trail in both directions.
fn by_price<T: Discoverable>(a: &T, b: &T, descending: bool) -> Ordering {
    let priced = match (a.price(), b.price()) {
        (Some(x), Some(y)) if descending => y.total_cmp(&x),
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    priced.then_with(|| newest_first(a, b))
}

/// Filter and order one record family.
pub fn discover<T: Discoverable>(records: Vec<T>, filter: &SearchFilter, sort: SortOrder) -> Vec<T> {
    let needle = filter.needle();
    let mut hits: Vec<T> = records
        .into_iter()
        .filter(|record| is_hit(record, filter, needle.as_deref()))
        .collect();
    match sort {
        SortOrder::Newest => hits.sort_by(newest_first),
        SortOrder::PriceLow => hits.sort_by(|a, b| by_price(a, b, false)),
        SortOrder::PriceHigh => hits.sort_by(|a, b| by_price(a, b, true)),
    }
    hits
}

/// Rated, visible freelancers: rating desc, then review count desc, then id asc.
pub fn rank_freelancers(users: Vec<User>, limit: usize) -> Vec<User> {
    let mut rated: Vec<User> = users
        .into_iter()
        .filter(|user| user.publicly_visible() && user.rating.average().is_some())
        .collect();
    rated.sort_by(|a, b| {
        let (a_avg, b_avg) = (
            a.rating.average().unwrap_or_default(),
            b.rating.average().unwrap_or_default(),
        );
        b_avg
            .total_cmp(&a_avg)
            .then_with(|| b.rating.total_reviews().cmp(&a.rating.total_reviews()))
            .then_with(|| a.id.cmp(&b.id))
    });
    rated.truncate(limit);
    rated
}

/// Store-backed discovery entry points.
pub struct QueryPipeline<S: ?Sized> {
    store: Arc<S>,
    retry: StoreRetry,
}

impl<S> QueryPipeline<S>
where
    S: MarketplaceStore + ?Sized,
{
    pub fn new(store: Arc<S>, retry: StoreRetry) -> Self {
        Self { store, retry }
    }

    pub fn services(&self, filter: &SearchFilter, sort: SortOrder) -> Result<Vec<Service>, MarketplaceError> {
        let services = self.retry.call("scan_services", || self.store.services())?;
        Ok(discover(services, filter, sort))
    }

    pub fn jobs(&self, filter: &SearchFilter, sort: SortOrder) -> Result<Vec<Job>, MarketplaceError> {
        let jobs = self.retry.call("scan_jobs", || self.store.jobs())?;
        Ok(discover(jobs, filter, sort))
    }

    pub fn freelancers(&self, filter: &SearchFilter, sort: SortOrder) -> Result<Vec<User>, MarketplaceError> {
        let users = self.retry.call("scan_users", || self.store.users())?;
        Ok(discover(users, filter, sort))
    }

    pub fn top_freelancers(&self, limit: usize) -> Result<Vec<User>, MarketplaceError> {
        let users = self.retry.call("scan_users", || self.store.users())?;
        Ok(rank_freelancers(users, limit))
    }
}
