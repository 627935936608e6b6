use gigboard::marketplace::{MarketplaceNotification, NotificationError, NotificationPublisher};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Writes decision notices to the log stream until a mail adapter is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingNotificationPublisher;

impl NotificationPublisher for TracingNotificationPublisher {
    fn publish(&self, notification: MarketplaceNotification) -> Result<(), NotificationError> {
        info!(
            template = %notification.template,
            recipient = %notification.recipient,
            entity_id = %notification.entity_id,
            details = ?notification.details,
            "marketplace notification"
        );
        Ok(())
    }
}

/// Keeps notices in memory so the CLI demo can print what would have been sent.
#[derive(Default, Clone)]
pub(crate) struct InMemoryNotificationPublisher {
    events: Arc<Mutex<Vec<MarketplaceNotification>>>,
}

impl InMemoryNotificationPublisher {
    pub(crate) fn events(&self) -> Vec<MarketplaceNotification> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl NotificationPublisher for InMemoryNotificationPublisher {
    fn publish(&self, notification: MarketplaceNotification) -> Result<(), NotificationError> {
        let mut guard = self
            .events
            .lock()
            .map_err(|_| NotificationError::Transport("notification outbox poisoned".to_string()))?;
        guard.push(notification);
        Ok(())
    }
}
