use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::context::{caller, RequestContext};
use super::domain::{User, UserId, UserStatus};
use super::error::MarketplaceError;
use super::store::{Committed, MarketplaceStore, StoreRetry};

/// Running review aggregate attached to a user.
///
/// Persisted as the `rating` / `total_reviews` column pair; a rating exists iff the
/// count is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RatingColumns", into = "RatingColumns")]
pub enum Rating {
    #[default]
    NoRating,
    Rated { average: f64, count: u32 },
}

impl Rating {
    pub fn average(self) -> Option<f64> {
        match self {
            Rating::NoRating => None,
            Rating::Rated { average, .. } => Some(average),
        }
    }

    pub fn total_reviews(self) -> u32 {
        match self {
            Rating::NoRating => 0,
            Rating::Rated { count, .. } => count,
        }
    }

    /// Fold one more score into the aggregate.
    pub fn record(self, score: ReviewScore) -> Result<Rating, MarketplaceError> {
        match self {
            Rating::NoRating => Ok(Rating::Rated {
                average: score.value(),
                count: 1,
            }),
            Rating::Rated { average, count } => {
                let next = count.checked_add(1).ok_or_else(|| {
                    MarketplaceError::Internal("review count overflow".to_string())
                })?;
                let total = average * f64::from(count) + score.value();
                Ok(Rating::Rated {
                    average: total / f64::from(next),
                    count: next,
                })
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RatingColumns {
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    total_reviews: u32,
}

impl From<RatingColumns> for Rating {
    fn from(columns: RatingColumns) -> Self {
        match columns.rating {
            Some(average) if columns.total_reviews > 0 && average.is_finite() => Rating::Rated {
                average,
                count: columns.total_reviews,
            },
            _ => Rating::NoRating,
        }
    }
}

impl From<Rating> for RatingColumns {
    fn from(rating: Rating) -> Self {
        RatingColumns {
            rating: rating.average(),
            total_reviews: rating.total_reviews(),
        }
    }
}

/// Review score between 1 and 5 in half-point steps, stored as half points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReviewScore(u8);

impl ReviewScore {
    pub fn new(raw: f64) -> Result<Self, MarketplaceError> {
        let halves = raw * 2.0;
        if !raw.is_finite() || !(1.0..=5.0).contains(&raw) || halves.fract() != 0.0 {
            return Err(MarketplaceError::InvalidScore(raw));
        }
        Ok(Self(halves as u8))
    }

    pub fn value(self) -> f64 {
        f64::from(self.0) / 2.0
    }
}

/// Updated aggregate returned after a review is folded in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingSummary {
    pub user_id: UserId,
    pub rating: Option<f64>,
    pub total_reviews: u32,
}

impl From<&User> for RatingSummary {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            rating: user.rating.average(),
            total_reviews: user.rating.total_reviews(),
        }
    }
}

pub struct RatingAggregator<S: ?Sized> {
    store: Arc<S>,
    retry: StoreRetry,
}

impl<S> RatingAggregator<S>
where
    S: MarketplaceStore + ?Sized,
{
    pub fn new(store: Arc<S>, retry: StoreRetry) -> Self {
        Self { store, retry }
    }

    /// Fold a review score into the subject's aggregate as one atomic read-modify-write.
    pub fn record_review(
        &self,
        ctx: &RequestContext,
        subject_id: &UserId,
        raw_score: f64,
    ) -> Result<RatingSummary, MarketplaceError> {
        let identity = ctx.require_identity()?;
        let score = ReviewScore::new(raw_score)?;

        let reviewer = caller(self.store.as_ref(), &self.retry, ctx)?
            .filter(|user| user.status != UserStatus::Suspended)
            .ok_or_else(|| {
                MarketplaceError::unauthorized("only registered members in good standing can leave reviews")
            })?;
        if &reviewer.id == subject_id {
            return Err(MarketplaceError::unauthorized(
                "members cannot review themselves",
            ));
        }

        let now = ctx.received_at();
        let committed = self.retry.read_modify_write(
            "record_review",
            || {
                self.store
                    .fetch_user(subject_id)?
                    .ok_or_else(|| MarketplaceError::not_found("user", subject_id))
            },
            |mut subject| {
                subject.rating = subject.rating.record(score)?;
                subject.updated_at = now;
                Ok(Committed::Written(subject))
            },
            |subject| self.store.replace_user(subject),
        )?;

        let subject = committed.into_inner();
        let summary = RatingSummary::from(&subject);
        info!(
            subject = %subject.id,
            reviewer = %identity.subject,
            score = score.value(),
            rating = ?summary.rating,
            total_reviews = summary.total_reviews,
            "review recorded"
        );
        Ok(summary)
    }
}
