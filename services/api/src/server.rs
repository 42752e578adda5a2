use crate::cli::ServeArgs;
use crate::infra::{assessment_service, orchestrator, AppState};
use crate::routes::with_scoring_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use trooth_scoring::config::AppConfig;
use trooth_scoring::error::AppError;
use trooth_scoring::telemetry;

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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let orchestrator = orchestrator(&config.llm, &config.scoring, false)?;
    let service = Arc::new(assessment_service(
        orchestrator,
        &config.history,
        &config.email,
    ));

    let app = with_scoring_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        ai_configured = config.llm.is_configured(),
        "assessment scoring service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
