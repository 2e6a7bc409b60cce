use crate::cli::ServeArgs;
use crate::infra::{load_policy_store, AppState, LocalPhotoStorage};
use crate::routes::with_catalog_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use rental_hub::access::AccessGate;
use rental_hub::config::AppConfig;
use rental_hub::error::AppError;
use rental_hub::properties::{MemoryPropertyRepository, MemoryReferenceStore, PropertyService};
use rental_hub::telemetry;
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

    let policies = load_policy_store(config.storage.policy_file.as_deref()).await?;
    let gate = Arc::new(AccessGate::new(Arc::new(policies)));

    let catalog = Arc::new(PropertyService::new(
        Arc::new(MemoryPropertyRepository::default()),
        Arc::new(MemoryReferenceStore::default()),
        Arc::new(LocalPhotoStorage::new(config.storage.media_dir.clone())),
    ));

    let app = with_catalog_routes(gate, catalog, &config.storage.media_dir)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        payment_mode = ?config.payments.mode,
        conekta_keys = config.payments.conekta.is_complete(),
        paypal_keys = config.payments.paypal.is_complete(),
        %addr,
        "rental catalog service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
