//! Static startup from a fallback flow file.
//!
//! In static mode with neither update path enabled, the cache is seeded once
//! from a JSON array of flows:
//!
//! ```json
//! [{"flow_id": 1, "last_updated": 1700000000, "definition": {"name": "checkout"}}]
//! ```
//!
//! Flows are written under their `flow:{flow_id}` keys through the
//! reconciliation callback, so an entry that already matches is left alone.

use std::path::Path;

use flowsync_core::{ConfigError, Flow};
use flowsync_storage::{CacheStore, FlowReconciler, ReconcileReport};

const FIELD: &str = "FLOWSYNC_FLOW_FALLBACK_PATH";

fn invalid_file(path: &Path, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        field: FIELD.to_string(),
        value: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Parse the contents of a fallback file.
pub fn parse_fallback(path: &Path, raw: &str) -> Result<Vec<Flow>, ConfigError> {
    serde_json::from_str(raw).map_err(|e| invalid_file(path, format!("not a flow list: {}", e)))
}

/// Read and parse the fallback file at `path`.
pub async fn read_fallback(path: &Path) -> Result<Vec<Flow>, ConfigError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| invalid_file(path, format!("cannot read file: {}", e)))?;
    parse_fallback(path, &raw)
}

/// Seed the cache from the fallback file.
///
/// An unreadable or malformed file is an error. Individual write failures
/// are counted in the report and logged, as for any reconciliation.
pub async fn seed_from_fallback<S: CacheStore>(
    reconciler: &FlowReconciler<S>,
    path: &Path,
) -> Result<ReconcileReport, ConfigError> {
    let flows = read_fallback(path).await?;
    if flows.is_empty() {
        tracing::warn!(path = %path.display(), "Fallback file holds no flows");
        return Ok(ReconcileReport::default());
    }

    let report = reconciler.on_success(&flows).await;
    tracing::info!(
        path = %path.display(),
        flows = flows.len(),
        inserted = report.inserted,
        overwritten = report.overwritten,
        errors = report.errors,
        "Cache seeded from fallback file"
    );
    Ok(report)
}
