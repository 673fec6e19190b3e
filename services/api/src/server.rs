use crate::cli::ServeArgs;
use crate::infra::{AppState, HttpRateGateway};
use crate::routes::with_booking_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use shipdesk::config::AppConfig;
use shipdesk::error::AppError;
use shipdesk::telemetry;
use shipdesk::workflows::booking::BookingDesk;
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

    let gateway = HttpRateGateway::from_config(&config.upstream)
        .map_err(|err| AppError::Io(std::io::Error::other(err)))?;
    let desk = Arc::new(BookingDesk::new(Arc::new(gateway)));

    let app = with_booking_routes(desk)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, upstream = %config.upstream.base_url, "booking orchestrator ready");

    axum::serve(listener, app).await?;
    Ok(())
}
