//! gRPC Service Implementation
//!
//! Serves the bulk configuration endpoint defined in [`crate::proto`]:
//! clients push whole configurations which are written into, or removed
//! from, the cache under `{configuration_id}:{flow_id}` keys.
//!
//! Batch outcomes are reported in the `success` flag. Only a malformed
//! request is answered with an error status.

use std::sync::Arc;

use flowsync_core::{Flow, ScopeId};
use flowsync_storage::{CacheStore, FlowCacheService};
use tonic::{Request, Response, Status};

use crate::error::ApiError;
use crate::proto::configuration::configuration_service_server;
use crate::proto::{flows_from_wire, ConfigurationRequest, ConfigurationResponse};

// ============================================================================
// REQUEST HELPERS
// ============================================================================

/// Unpack a configuration request into its scope and domain flows.
fn parse_request(req: ConfigurationRequest) -> Result<(ScopeId, Vec<Flow>), ApiError> {
    let configuration = req
        .configuration
        .ok_or_else(|| ApiError::missing_field("configuration"))?;
    let scope = ScopeId::from(configuration.configuration_id);
    let flows = flows_from_wire(configuration.flows)?;
    Ok((scope, flows))
}

fn reply(success: bool) -> Response<ConfigurationResponse> {
    Response::new(ConfigurationResponse { success })
}

// ============================================================================
// CONFIGURATION SERVICE IMPLEMENTATION
// ============================================================================

pub struct ConfigurationServiceImpl<S: CacheStore> {
    cache: FlowCacheService<S>,
}

impl<S: CacheStore> ConfigurationServiceImpl<S> {
    pub fn new(cache: FlowCacheService<S>) -> Self {
        Self { cache }
    }
}

#[tonic::async_trait]
impl<S: CacheStore + 'static> configuration_service_server::ConfigurationService
    for ConfigurationServiceImpl<S>
{
    async fn update(
        &self,
        request: Request<ConfigurationRequest>,
    ) -> Result<Response<ConfigurationResponse>, Status> {
        let (scope, flows) = parse_request(request.into_inner())?;

        if flows.is_empty() {
            tracing::debug!(configuration = %scope, "Empty update, nothing to write");
            return Ok(reply(true));
        }

        let success = self.cache.update_many(&scope, &flows).await;
        if success {
            tracing::info!(configuration = %scope, flows = flows.len(), "Configuration updated");
        } else {
            tracing::warn!(
                configuration = %scope,
                flows = flows.len(),
                "Configuration update incomplete"
            );
        }
        Ok(reply(success))
    }

    async fn delete(
        &self,
        request: Request<ConfigurationRequest>,
    ) -> Result<Response<ConfigurationResponse>, Status> {
        let (scope, flows) = parse_request(request.into_inner())?;

        if flows.is_empty() {
            tracing::debug!(configuration = %scope, "Empty delete, nothing to remove");
            return Ok(reply(true));
        }

        let success = self.cache.delete_many(&scope, &flows).await;
        if success {
            tracing::info!(configuration = %scope, flows = flows.len(), "Configuration deleted");
        } else {
            tracing::warn!(
                configuration = %scope,
                flows = flows.len(),
                "Configuration delete incomplete, some flows were not cached"
            );
        }
        Ok(reply(success))
    }
}

// ============================================================================
// SERVICE FACTORY
// ============================================================================

/// Build the configuration service over `store`, ready to add to a server.
pub fn create_service<S: CacheStore + 'static>(
    store: Arc<S>,
) -> configuration_service_server::ConfigurationServiceServer<ConfigurationServiceImpl<S>> {
    configuration_service_server::ConfigurationServiceServer::new(ConfigurationServiceImpl::new(
        FlowCacheService::new(store),
    ))
}
