use crate::cli::ServeArgs;
use crate::infra::{AppState, TracingNotificationPublisher};
use crate::routes::with_marketplace_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use gigboard::config::AppConfig;
use gigboard::error::AppError;
use gigboard::marketplace::{InMemoryStore, MarketplaceService, MarketplaceState, ProxyHeaderIdentity};
use gigboard::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(MarketplaceService::new(
        Arc::new(InMemoryStore::default()),
        Arc::new(TracingNotificationPublisher),
        &config.marketplace,
    ));
    let identity = Arc::new(ProxyHeaderIdentity::new(config.auth.clone()));

    let app = with_marketplace_routes(MarketplaceState::new(service, identity))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        admins = config.marketplace.admin_subjects.len(),
        "gigboard marketplace ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
