//! The CableDB service layer.
//!
//! Sits between the RPC boundary and the embedded SQL engine:
//!
//! - [`registry`]: databases by spec string, connections by numeric token
//! - [`observer`]: per-query execution, result-mode classification, and
//!   callback dispatch
//! - [`reflector`]: engine catalog → column-typed table descriptors
//! - [`service`]: the five request handlers
//! - [`server`]: the TCP frame transport in front of the dispatcher

pub mod observer;
pub mod reflector;
pub mod registry;
pub mod server;
pub mod service;

pub use observer::QueryObserver;
pub use reflector::reflect_tables;
pub use registry::{DatabaseEntry, Registry};
pub use server::Server;
pub use service::{DatabaseService, ServiceConfig};
