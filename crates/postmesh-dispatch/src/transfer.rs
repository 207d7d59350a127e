//! Transfer-type gate in front of the store dispatcher.

use serde_json::Value;

use postmesh_types::{MessageType, Result, RpcMessage};

use crate::dispatcher::StoreDispatcher;

/// Entry point for every inbound envelope, typed or raw.
///
/// Inspects the transfer type and currently routes only `store` to the
/// [`StoreDispatcher`]. Every other accepted type resolves to an
/// explicit null success — "accepted, no-op" — so callers must not
/// assume all types execute meaningful work.
pub struct TransferService {
    store: StoreDispatcher,
}

impl TransferService {
    /// Creates the gate over a store dispatcher.
    pub fn new(store: StoreDispatcher) -> Self {
        Self { store }
    }

    /// Executes one typed envelope.
    pub async fn execute(&self, rpc_message: &RpcMessage) -> Result<Value> {
        match rpc_message.message_type {
            MessageType::Store => self.store.execute(rpc_message).await,
            // Accepted but unrouted transfer types are a defined no-op.
            MessageType::Other(_) => Ok(Value::Null),
        }
    }

    /// Decodes and executes a raw JSON envelope.
    ///
    /// The gossip topic delivers opaque bytes; a payload that is not a
    /// structurally valid envelope is rejected here as
    /// `invalid rpcMessage` before any further validation.
    pub async fn execute_value(&self, value: &Value) -> Result<Value> {
        let rpc_message = RpcMessage::from_value(value)?;
        self.execute(&rpc_message).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use postmesh_store::{EntityService, ServiceKind, StoreMethod, StoreMethodDirectory};
    use postmesh_types::MessageBody;
    use serde_json::json;

    use crate::registry::ServiceRegistry;

    #[derive(Default)]
    struct CountingService {
        invocations: AtomicUsize,
    }

    #[async_trait]
    impl EntityService for CountingService {
        async fn invoke(
            &self,
            _method: StoreMethod,
            _wallet: &str,
            _data: &Value,
            _sig: &str,
        ) -> Result<Value> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"stored": true}))
        }
    }

    fn transfer_with(service: Arc<CountingService>) -> TransferService {
        let registry = ServiceRegistry::new().register(ServiceKind::Like, service);
        TransferService::new(StoreDispatcher::new(
            registry,
            Arc::new(StoreMethodDirectory),
        ))
    }

    #[tokio::test]
    async fn store_type_routes_to_dispatcher() {
        let service = Arc::new(CountingService::default());
        let transfer = transfer_with(service.clone());

        let msg = RpcMessage::store(
            "like",
            "add",
            MessageBody::new("0xabc", json!({}), "0xdef"),
        );
        let result = transfer.execute(&msg).await.unwrap();
        assert_eq!(result, json!({"stored": true}));
        assert_eq!(service.invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_store_type_is_noop_success() {
        let service = Arc::new(CountingService::default());
        let transfer = transfer_with(service.clone());

        let mut msg = RpcMessage::store(
            "like",
            "add",
            MessageBody::new("0xabc", json!({}), "0xdef"),
        );
        msg.message_type = MessageType::Other("broadcast".into());

        let result = transfer.execute(&msg).await.unwrap();
        assert_eq!(result, Value::Null);
        assert_eq!(service.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_value_rejects_as_invalid_rpc_message() {
        let transfer = transfer_with(Arc::new(CountingService::default()));

        let err = transfer
            .execute_value(&json!({"type": "store", "body": 42}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid rpcMessage"));
    }
}
