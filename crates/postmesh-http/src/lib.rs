//! HTTP surface of the Postmesh relay.
//!
//! Every business route follows the fixed pattern
//! `POST /v1/{serviceName}/{serviceMethod}` with a `{wallet, data, sig}`
//! body, mapped 1:1 onto a `store` envelope before dispatch. The
//! [`admission::AdmissionController`] gates all entry points in front
//! of any dispatch work.

pub mod admission;
pub mod routes;
pub mod server;

pub use admission::{Admission, AdmissionConfig, AdmissionController, RouteClass};
pub use routes::{build_router, AppState, DispatchHook};
pub use server::HttpServer;
