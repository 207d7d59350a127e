//! Service domains, store methods, and the invocation seam.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use postmesh_types::Result;

// ---------------------------------------------------------------------------
// ServiceKind
// ---------------------------------------------------------------------------

/// The closed set of business domains a relay routes to.
///
/// Unknown service names do not belong here: routing treats them as
/// "no handler", a defined no-op, so [`ServiceKind::from_name`] returns
/// `Option` rather than an error.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Comment,
    Contact,
    Favorite,
    Follower,
    Like,
    Post,
    Profile,
    Portal,
    Search,
}

impl ServiceKind {
    /// Every routable domain, in route-registration order.
    pub const ALL: [ServiceKind; 9] = [
        Self::Comment,
        Self::Contact,
        Self::Favorite,
        Self::Follower,
        Self::Like,
        Self::Post,
        Self::Profile,
        Self::Portal,
        Self::Search,
    ];

    /// Resolves a wire service name. `None` means "no handler".
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "comment" => Some(Self::Comment),
            "contact" => Some(Self::Contact),
            "favorite" => Some(Self::Favorite),
            "follower" => Some(Self::Follower),
            "like" => Some(Self::Like),
            "post" => Some(Self::Post),
            "profile" => Some(Self::Profile),
            "portal" => Some(Self::Portal),
            "search" => Some(Self::Search),
            _ => None,
        }
    }

    /// The wire name of this domain.
    pub fn as_name(&self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Contact => "contact",
            Self::Favorite => "favorite",
            Self::Follower => "follower",
            Self::Like => "like",
            Self::Post => "post",
            Self::Profile => "profile",
            Self::Portal => "portal",
            Self::Search => "search",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_name())
    }
}

// ---------------------------------------------------------------------------
// StoreMethod
// ---------------------------------------------------------------------------

/// Operations a store service understands.
///
/// The dispatchable subset at any moment is governed by the
/// [`MethodDirectory`], not by this enum: a method must both parse here
/// and appear in the directory to be routed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum StoreMethod {
    Add,
    Update,
    UpdateFor,
    Delete,
    QueryOne,
    QueryList,
}

impl StoreMethod {
    /// Every store method, in wire order.
    pub const ALL: [StoreMethod; 6] = [
        Self::Add,
        Self::Update,
        Self::UpdateFor,
        Self::Delete,
        Self::QueryOne,
        Self::QueryList,
    ];

    /// Resolves a wire method name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "add" => Some(Self::Add),
            "update" => Some(Self::Update),
            "updateFor" => Some(Self::UpdateFor),
            "delete" => Some(Self::Delete),
            "queryOne" => Some(Self::QueryOne),
            "queryList" => Some(Self::QueryList),
            _ => None,
        }
    }

    /// The wire name of this method.
    pub fn as_name(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::UpdateFor => "updateFor",
            Self::Delete => "delete",
            Self::QueryOne => "queryOne",
            Self::QueryList => "queryList",
        }
    }
}

impl fmt::Display for StoreMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_name())
    }
}

// ---------------------------------------------------------------------------
// MethodDirectory
// ---------------------------------------------------------------------------

/// The externally supplied method allow-list.
///
/// The dispatcher queries this on every dispatch instead of caching the
/// result, so a directory that changes at runtime takes effect on the
/// next request.
pub trait MethodDirectory: Send + Sync {
    /// Wire names of the currently allowed store methods.
    fn method_names(&self) -> Vec<String>;

    /// Whether a wire method name is currently allowed.
    fn is_allowed(&self, name: &str) -> bool {
        self.method_names().iter().any(|m| m == name)
    }
}

/// Directory backed by the canonical store method set.
#[derive(Clone, Copy, Debug, Default)]
pub struct StoreMethodDirectory;

impl MethodDirectory for StoreMethodDirectory {
    fn method_names(&self) -> Vec<String> {
        StoreMethod::ALL.iter().map(|m| m.to_string()).collect()
    }
}

// ---------------------------------------------------------------------------
// EntityService
// ---------------------------------------------------------------------------

/// The narrow invocation interface of a business service.
///
/// The three arguments are the body fields of the dispatched
/// `RpcMessage`, forwarded verbatim. Signature verification happens
/// behind this interface, not in front of it.
#[async_trait]
pub trait EntityService: Send + Sync {
    /// Executes one store method and returns its raw result.
    async fn invoke(
        &self,
        method: StoreMethod,
        wallet: &str,
        data: &Value,
        sig: &str,
    ) -> Result<Value>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
