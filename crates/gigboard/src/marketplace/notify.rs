use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::UserId;

/// Outbound hook for decision notices (e-mail, push, inbox adapters).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: MarketplaceNotification) -> Result<(), NotificationError>;
}

/// Notice emitted after a committed moderation or application decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceNotification {
    pub template: String,
    pub recipient: UserId,
    pub entity_id: String,
    pub details: BTreeMap<String, String>,
}

impl MarketplaceNotification {
    pub fn new(template: impl Into<String>, recipient: &UserId, entity_id: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            recipient: recipient.clone(),
            entity_id: entity_id.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Publish after commit. A failed notice is logged; the transition stands.
pub(crate) fn dispatch<N>(publisher: &N, notification: MarketplaceNotification)
where
    N: NotificationPublisher + ?Sized,
{
    let template = notification.template.clone();
    let entity_id = notification.entity_id.clone();
    if let Err(err) = publisher.publish(notification) {
        warn!(%template, %entity_id, error = %err, "notification dispatch failed");
    }
}
