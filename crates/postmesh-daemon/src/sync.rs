//! Gossip sync bridge.
//!
//! Two directions:
//!
//! - Outbound: every store message dispatched over HTTP is published on
//!   the sync topic, best-effort, so peer relays converge on the same
//!   store state.
//! - Inbound: payloads arriving on the sync topic are decoded as
//!   envelopes and re-executed through the transfer service. Payloads
//!   that are not envelopes are logged and dropped — opaque gossip must
//!   never kill the subscription.
//!
//! Inbound messages bypass the HTTP dispatch hook, so a remote message
//! is applied locally without being republished.

use std::sync::Arc;

use postmesh_dispatch::TransferService;
use postmesh_http::DispatchHook;
use postmesh_relay::{BroadcastCallback, GossipRelay};
use postmesh_types::RpcMessage;

/// Builds the broadcast callback applying inbound gossip envelopes.
pub fn broadcast_callback(transfer: Arc<TransferService>) -> BroadcastCallback {
    Arc::new(move |data: Vec<u8>| {
        let transfer = transfer.clone();
        Box::pin(async move {
            let rpc_message = match RpcMessage::from_slice(&data) {
                Ok(rpc_message) => rpc_message,
                Err(_) => {
                    tracing::debug!(bytes = data.len(), "dropped non-envelope gossip payload");
                    return;
                }
            };
            match transfer.execute(&rpc_message).await {
                Ok(_) => {
                    tracing::debug!(
                        service = %rpc_message.service_name,
                        method = %rpc_message.service_method,
                        "applied gossip message"
                    );
                }
                Err(e) => {
                    tracing::warn!(%e, "failed to apply gossip message");
                }
            }
        })
    })
}

/// Builds the dispatch hook publishing store messages on the sync topic.
pub fn publish_hook(relay: Arc<GossipRelay>) -> DispatchHook {
    Arc::new(move |rpc_message: RpcMessage| {
        let relay = relay.clone();
        Box::pin(async move {
            if let Err(e) = relay.publish(&rpc_message.to_value()).await {
                tracing::warn!(%e, "failed to publish dispatched message");
            }
        })
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use postmesh_dispatch::{ServiceRegistry, StoreDispatcher};
    use postmesh_store::memory::MemoryEntityStore;
    use postmesh_store::{ServiceKind, StoreMethodDirectory};
    use postmesh_types::MessageBody;
    use serde_json::json;

    fn transfer() -> Arc<TransferService> {
        let mut registry = ServiceRegistry::new();
        for kind in ServiceKind::ALL {
            registry = registry.register(kind, Arc::new(MemoryEntityStore::new(kind)));
        }
        Arc::new(TransferService::new(StoreDispatcher::new(
            registry,
            Arc::new(StoreMethodDirectory),
        )))
    }

    #[tokio::test]
    async fn inbound_envelope_is_applied_to_the_store() {
        let transfer = transfer();
        let callback = broadcast_callback(transfer.clone());

        let msg = RpcMessage::store(
            "like",
            "add",
            MessageBody::new("0xabc", json!({"hash": "0x1"}), "0xdef"),
        );
        callback(serde_json::to_vec(&msg).unwrap()).await;

        let query = RpcMessage::store(
            "like",
            "queryList",
            MessageBody::new("0xabc", json!({}), "0xdef"),
        );
        let listed = transfer.execute(&query).await.unwrap();
        assert_eq!(listed["total"], 1);
    }

    #[tokio::test]
    async fn garbage_payload_is_dropped_silently() {
        let callback = broadcast_callback(transfer());
        // Must not panic or error.
        callback(b"not json at all".to_vec()).await;
    }
}
