//! Signed-message dispatch pipeline.
//!
//! An [`RpcMessage`] entering the node passes through two gates:
//!
//! 1. [`TransferService`] — inspects the transfer type. Only `store`
//!    proceeds; every other type resolves to an explicit null success.
//! 2. [`StoreDispatcher`] — fail-closed validation (type, service name,
//!    method allow-list, body), then routing through a typed registry
//!    resolved once at startup.
//!
//! The resolved service receives `(wallet, data, sig)` verbatim and its
//! result or error travels back unmodified.

pub mod dispatcher;
pub mod registry;
pub mod transfer;

pub use dispatcher::StoreDispatcher;
pub use registry::ServiceRegistry;
pub use transfer::TransferService;
