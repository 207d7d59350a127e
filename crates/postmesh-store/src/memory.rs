//! In-memory reference store.
//!
//! One [`MemoryEntityStore`] per [`ServiceKind`] backs the daemon when no
//! external store is wired in. Records are grouped per wallet and carry
//! the submitted payload plus the forwarded signature, so the full body
//! of every accepted request is observable downstream.
//!
//! Thread-safe via `std::sync::Mutex` — no external crate required.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use postmesh_types::{PostmeshError, Result};

use crate::service::{EntityService, ServiceKind, StoreMethod};

// ---------------------------------------------------------------------------
// MemoryEntityStore
// ---------------------------------------------------------------------------

/// In-memory store for one business domain.
pub struct MemoryEntityStore {
    kind: ServiceKind,
    /// Monotonic record id source, shared by all wallets of this store.
    next_id: AtomicU64,
    /// Records grouped per wallet.
    records: Mutex<HashMap<String, Vec<Value>>>,
}

impl MemoryEntityStore {
    /// Creates an empty store for the given domain.
    pub fn new(kind: ServiceKind) -> Self {
        Self {
            kind,
            next_id: AtomicU64::new(1),
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Number of records currently held for a wallet.
    ///
    /// Useful for monitoring and tests.
    pub fn record_count(&self, wallet: &str) -> usize {
        self.records
            .lock()
            .map(|map| map.get(wallet).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<Value>>>> {
        self.records.lock().map_err(|_| PostmeshError::StoreError {
            reason: format!("{} store lock poisoned", self.kind),
        })
    }

    fn add(&self, wallet: &str, data: &Value, sig: &str) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = json!({
            "id": id,
            "wallet": wallet,
            "data": data,
            "sig": sig,
            "createdAt": Utc::now().to_rfc3339(),
        });
        let mut map = self.lock()?;
        map.entry(wallet.to_string()).or_default().push(record.clone());
        Ok(record)
    }

    fn update(&self, wallet: &str, data: &Value, replace: bool) -> Result<Value> {
        let id = record_id(data)?;
        let mut map = self.lock()?;
        let records = map.get_mut(wallet).ok_or_else(|| not_found(self.kind, id))?;
        let record = records
            .iter_mut()
            .find(|r| r["id"] == json!(id))
            .ok_or_else(|| not_found(self.kind, id))?;

        if replace {
            record["data"] = data.clone();
        } else if let (Some(fields), Some(target)) =
            (data.as_object(), record["data"].as_object_mut())
        {
            // updateFor patches individual fields instead of the whole payload.
            for (key, value) in fields {
                if key != "id" {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
        record["updatedAt"] = json!(Utc::now().to_rfc3339());
        Ok(record.clone())
    }

    fn delete(&self, wallet: &str, data: &Value) -> Result<Value> {
        let id = record_id(data)?;
        let mut map = self.lock()?;
        let records = map.get_mut(wallet).ok_or_else(|| not_found(self.kind, id))?;
        let before = records.len();
        records.retain(|r| r["id"] != json!(id));
        if records.len() == before {
            return Err(not_found(self.kind, id));
        }
        Ok(json!({ "deleted": 1 }))
    }

    fn query_one(&self, wallet: &str, data: &Value) -> Result<Value> {
        let map = self.lock()?;
        let records = match map.get(wallet) {
            Some(records) => records,
            None => return Ok(Value::Null),
        };
        // With an id the lookup is exact; without one, the latest record wins.
        let found = match data.get("id").and_then(Value::as_u64) {
            Some(id) => records.iter().find(|r| r["id"] == json!(id)),
            None => records.last(),
        };
        Ok(found.cloned().unwrap_or(Value::Null))
    }

    fn query_list(&self, wallet: &str) -> Result<Value> {
        let map = self.lock()?;
        let list = map.get(wallet).cloned().unwrap_or_default();
        Ok(json!({ "total": list.len(), "list": list }))
    }
}

#[async_trait]
impl EntityService for MemoryEntityStore {
    async fn invoke(
        &self,
        method: StoreMethod,
        wallet: &str,
        data: &Value,
        sig: &str,
    ) -> Result<Value> {
        tracing::debug!(kind = %self.kind, %method, wallet, "store invoke");
        match method {
            StoreMethod::Add => self.add(wallet, data, sig),
            StoreMethod::Update => self.update(wallet, data, true),
            StoreMethod::UpdateFor => self.update(wallet, data, false),
            StoreMethod::Delete => self.delete(wallet, data),
            StoreMethod::QueryOne => self.query_one(wallet, data),
            StoreMethod::QueryList => self.query_list(wallet),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn record_id(data: &Value) -> Result<u64> {
    data.get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| PostmeshError::StoreError {
            reason: "data.id is required".into(),
        })
}

fn not_found(kind: ServiceKind, id: u64) -> PostmeshError {
    PostmeshError::StoreError {
        reason: format!("{kind} record {id} not found"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
