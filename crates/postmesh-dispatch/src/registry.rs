//! Typed service routing table.
//!
//! Maps each [`ServiceKind`] to its [`EntityService`] once at startup.
//! Resolution of a wire name is a lookup, never a per-call branch over
//! strings.

use std::collections::HashMap;
use std::sync::Arc;

use postmesh_store::{EntityService, ServiceKind};

/// Routing table from business domain to service implementation.
///
/// Unknown wire names resolve to `None`, the "no handler" outcome the
/// dispatcher turns into a null success.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<ServiceKind, Arc<dyn EntityService>>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the service for one domain, replacing any previous one.
    pub fn register(mut self, kind: ServiceKind, service: Arc<dyn EntityService>) -> Self {
        self.services.insert(kind, service);
        self
    }

    /// Resolves a wire service name to its registered service.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn EntityService>> {
        let kind = ServiceKind::from_name(name)?;
        self.services.get(&kind).cloned()
    }

    /// Number of registered domains.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether no domain is registered.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use postmesh_store::StoreMethod;
    use postmesh_types::Result;
    use serde_json::{json, Value};

    struct EchoService;

    #[async_trait]
    impl EntityService for EchoService {
        async fn invoke(
            &self,
            _method: StoreMethod,
            wallet: &str,
            _data: &Value,
            _sig: &str,
        ) -> Result<Value> {
            Ok(json!({ "wallet": wallet }))
        }
    }

    #[test]
    fn resolves_registered_kind_only() {
        let registry =
            ServiceRegistry::new().register(ServiceKind::Like, Arc::new(EchoService));

        assert!(registry.resolve("like").is_some());
        assert!(registry.resolve("post").is_none());
        assert!(registry.resolve("media").is_none());
        assert_eq!(registry.len(), 1);
    }
}
