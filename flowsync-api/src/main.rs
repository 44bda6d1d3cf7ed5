//! flowsync Service Entry Point
//!
//! Bootstraps configuration, connects the cache store, seeds it from the
//! fallback file in static mode, reconciles against the backend (once, or on
//! a schedule), and serves the bulk configuration gRPC endpoint until Ctrl-C.

use std::sync::Arc;

use flowsync_api::backend::{connect_with_retry, BackoffPolicy, GrpcFlowSource};
use flowsync_api::jobs::{
    reconcile_configurations, scheduled_reconcile_task, ScheduledReconcileConfig,
    ScheduledReconcileMetrics,
};
use flowsync_api::telemetry::{init_tracing, TelemetryConfig};
use flowsync_api::{
    create_service, seed_from_fallback, ApiError, ApiResult, ReconciliationService, ServiceConfig,
};
use flowsync_storage::{FlowReconciler, RedisCacheStore};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::from_env();
    init_tracing(&telemetry_config)?;

    let config = ServiceConfig::from_env()?;
    config.validate()?;

    let store = Arc::new(RedisCacheStore::connect(&config.redis).await?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if config.loads_fallback() {
        let reconciler = FlowReconciler::new(Arc::clone(&store));
        seed_from_fallback(&reconciler, &config.flow_fallback_path).await?;
    }

    let mut job = None;
    if config.needs_backend() {
        let url = config
            .backend_url
            .as_deref()
            .ok_or_else(|| ApiError::configuration("FLOWSYNC_BACKEND_URL is not set"))?;
        let channel = connect_with_retry(url, BackoffPolicy::new(config.backend_connect_retries))
            .await
            .map_err(|e| ApiError::backend_unavailable(e.to_string()))?;
        let source = Arc::new(GrpcFlowSource::new(channel, config.session_token.as_deref())?);
        let service = ReconciliationService::new(Arc::clone(&store), source);

        if config.enable_scheduled_update {
            job = Some(tokio::spawn(scheduled_reconcile_task(
                service,
                ScheduledReconcileConfig::from(&config),
                shutdown_rx,
            )));
        } else {
            tracing::info!(
                configurations = config.configuration_ids.len(),
                "Scheduled reconciliation disabled, pulling once at startup"
            );
            let metrics = ScheduledReconcileMetrics::new();
            reconcile_configurations(&service, &config.configuration_ids, &metrics).await;
        }
    }

    if config.enable_grpc_update {
        tracing::info!(addr = %config.grpc_bind, "Starting flowsync gRPC server");
        tonic::transport::Server::builder()
            .add_service(create_service(Arc::clone(&store)))
            .serve_with_shutdown(config.grpc_bind, async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;
    } else {
        tracing::info!("gRPC update endpoint disabled");
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| ApiError::internal(format!("Failed to listen for Ctrl-C: {}", e)))?;
        tracing::info!("Shutdown signal received");
    }

    let _ = shutdown_tx.send(true);
    if let Some(job) = job {
        match job.await {
            Ok(metrics) => {
                let snapshot = metrics.snapshot();
                tracing::info!(
                    cycles = snapshot.cycles,
                    flows_repaired = snapshot.flows_repaired,
                    "Scheduled reconciliation stopped"
                );
            }
            Err(e) => tracing::error!(error = %e, "Scheduled reconciliation task failed"),
        }
    }

    Ok(())
}
