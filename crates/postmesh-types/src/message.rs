//! The signed request envelope.
//!
//! Every business request arriving over HTTP or the gossip topic is an
//! [`RpcMessage`]: a transfer type, a target service/method pair, and a
//! [`MessageBody`] carrying the claimed signer wallet, the payload, and
//! the signature over that payload. The relay forwards all three body
//! fields verbatim — signature verification belongs to the store
//! collaborator, never to the relay itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{PostmeshError, Result};

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// Transfer type of an [`RpcMessage`].
///
/// Only `store` is currently routed. Any other value is accepted on the
/// wire and resolves to a defined no-op at the transfer gate, so unknown
/// strings round-trip instead of failing deserialization.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// A store operation — the only routed transfer type.
    Store,
    /// Any other transfer type; accepted, never routed.
    Other(String),
}

impl From<String> for MessageType {
    fn from(s: String) -> Self {
        if s == "store" {
            Self::Store
        } else {
            Self::Other(s)
        }
    }
}

impl From<MessageType> for String {
    fn from(t: MessageType) -> Self {
        match t {
            MessageType::Store => "store".to_string(),
            MessageType::Other(s) => s,
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store => write!(f, "store"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

// ---------------------------------------------------------------------------
// MessageBody
// ---------------------------------------------------------------------------

/// Payload of an [`RpcMessage`].
///
/// `sig` is the signature over `data` claimed by `wallet`. The relay
/// checks only that the body is well-formed; the three fields travel to
/// the resolved business service untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    /// Claimed signer identity (address string).
    pub wallet: String,
    /// Operation-specific structured payload.
    pub data: Value,
    /// Signature over `data`, verified downstream.
    pub sig: String,
}

impl MessageBody {
    /// Creates a new body from its three wire fields.
    pub fn new(wallet: impl Into<String>, data: Value, sig: impl Into<String>) -> Self {
        Self {
            wallet: wallet.into(),
            data,
            sig: sig.into(),
        }
    }

    /// Returns `true` if the body is well-formed: a non-empty wallet and
    /// a non-empty signature. `data` is opaque and may be any JSON value.
    pub fn is_valid(&self) -> bool {
        !self.wallet.trim().is_empty() && !self.sig.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// RpcMessage
// ---------------------------------------------------------------------------

/// The validated envelope describing one requested operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcMessage {
    /// Transfer type; only [`MessageType::Store`] is routed.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Target business-domain handler (e.g. `post`, `like`, `search`).
    pub service_name: String,
    /// Operation on that handler, drawn from the store method allow-list.
    pub service_method: String,
    /// The signed payload.
    pub body: MessageBody,
}

impl RpcMessage {
    /// Builds a `store` envelope, the shape produced by every HTTP
    /// business route.
    pub fn store(
        service_name: impl Into<String>,
        service_method: impl Into<String>,
        body: MessageBody,
    ) -> Self {
        Self {
            message_type: MessageType::Store,
            service_name: service_name.into(),
            service_method: service_method.into(),
            body,
        }
    }

    /// Decodes an envelope from raw JSON.
    ///
    /// This is the entry point for untrusted wire payloads (the gossip
    /// topic). A structurally broken envelope is the `invalid rpcMessage`
    /// rejection of the dispatch pipeline.
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(|_| PostmeshError::InvalidMessage {
            reason: "invalid rpcMessage".into(),
        })
    }

    /// Decodes an envelope from raw bytes (gossip wire form).
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|_| PostmeshError::InvalidMessage {
            reason: "invalid rpcMessage".into(),
        })
    }

    /// Encodes the envelope to its JSON value form.
    pub fn to_value(&self) -> Value {
        // Serialization of a plain struct with string keys cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_type_maps_store_string() {
        let t: MessageType = "store".to_string().into();
        assert_eq!(t, MessageType::Store);

        let other: MessageType = "forward".to_string().into();
        assert_eq!(other, MessageType::Other("forward".into()));
    }

    #[test]
    fn envelope_wire_field_is_named_type() {
        let msg = RpcMessage::store(
            "like",
            "add",
            MessageBody::new("0xabc", json!({"hash": "0x1"}), "0xdef"),
        );
        let value = msg.to_value();
        assert_eq!(value["type"], "store");
        assert_eq!(value["serviceName"], "like");
        assert_eq!(value["serviceMethod"], "add");
        assert_eq!(value["body"]["wallet"], "0xabc");
    }

    #[test]
    fn envelope_roundtrip() {
        let msg = RpcMessage::store(
            "post",
            "queryList",
            MessageBody::new("0xabc", json!({"pageNo": 1}), "0xdef"),
        );
        let decoded = RpcMessage::from_value(&msg.to_value()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn unknown_transfer_type_is_accepted() {
        let value = json!({
            "type": "forward",
            "serviceName": "like",
            "serviceMethod": "add",
            "body": { "wallet": "0xabc", "data": {}, "sig": "0xdef" },
        });
        let decoded = RpcMessage::from_value(&value).unwrap();
        assert_eq!(decoded.message_type, MessageType::Other("forward".into()));
    }

    #[test]
    fn malformed_envelope_is_rejected() {
        let err = RpcMessage::from_value(&json!({"type": "store"})).unwrap_err();
        assert!(err.to_string().contains("invalid rpcMessage"));
    }

    #[test]
    fn body_validation_requires_wallet_and_sig() {
        assert!(MessageBody::new("0xabc", json!(null), "0xdef").is_valid());
        assert!(!MessageBody::new("", json!({}), "0xdef").is_valid());
        assert!(!MessageBody::new("0xabc", json!({}), "  ").is_valid());
    }
}
