//! Store dispatch: fail-closed validation, then routed invocation.

use std::sync::Arc;

use serde_json::Value;

use postmesh_store::{MethodDirectory, StoreMethod};
use postmesh_types::{MessageType, PostmeshError, Result, RpcMessage};

use crate::registry::ServiceRegistry;

// ---------------------------------------------------------------------------
// StoreDispatcher
// ---------------------------------------------------------------------------

/// Routes validated `store` envelopes to their business service.
///
/// Validation is ordered and fail-closed: the first violation rejects
/// the message before any service is touched. The method allow-list is
/// re-fetched from the [`MethodDirectory`] on every call, so a directory
/// reconfigured at runtime takes effect immediately.
pub struct StoreDispatcher {
    registry: ServiceRegistry,
    directory: Arc<dyn MethodDirectory>,
}

impl StoreDispatcher {
    /// Creates a dispatcher over a routing table and method directory.
    pub fn new(registry: ServiceRegistry, directory: Arc<dyn MethodDirectory>) -> Self {
        Self {
            registry,
            directory,
        }
    }

    /// Validates and executes one `store` envelope.
    ///
    /// Returns the service's result unmodified. An unknown service name
    /// resolves to `Value::Null` — a defined no-op, not an error.
    ///
    /// # Errors
    ///
    /// `PostmeshError::InvalidMessage` for any validation violation;
    /// whatever the resolved service returns, unmodified, on invocation
    /// failure.
    pub async fn execute(&self, rpc_message: &RpcMessage) -> Result<Value> {
        if rpc_message.message_type != MessageType::Store {
            return Err(reject("invalid rpcMessage.type, not store"));
        }
        if rpc_message.service_name.trim().is_empty() {
            return Err(reject("invalid rpcMessage.serviceName"));
        }

        // The allow-list is authoritative and queried per call; the wire
        // name must also map onto a typed method to be invocable.
        let method_name = rpc_message.service_method.as_str();
        let method = match StoreMethod::from_name(method_name) {
            Some(method) if self.directory.is_allowed(method_name) => method,
            _ => return Err(reject("invalid rpcMessage.serviceMethod")),
        };

        if !rpc_message.body.is_valid() {
            return Err(reject("invalid rpcMessage.body"));
        }

        let service = match self.registry.resolve(&rpc_message.service_name) {
            Some(service) => service,
            None => return Ok(Value::Null),
        };

        if !cfg!(test) {
            tracing::debug!(
                service = %rpc_message.service_name,
                method = %method,
                wallet = %rpc_message.body.wallet,
                "dispatching store message"
            );
        }

        let body = &rpc_message.body;
        service
            .invoke(method, &body.wallet, &body.data, &body.sig)
            .await
            .map_err(|err| {
                if !cfg!(test) {
                    tracing::error!(
                        service = %rpc_message.service_name,
                        method = %method,
                        %err,
                        "store service failed"
                    );
                }
                err
            })
    }
}

fn reject(reason: &str) -> PostmeshError {
    PostmeshError::InvalidMessage {
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
