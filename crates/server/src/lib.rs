//! # Siteprint Server
//!
//! HTTP REST surface over the [`siteprint`] similarity engine: fingerprint,
//! compare, scan, index, case baselines, and rescans. Admission on the API
//! routes is api-key based with a per-key crawl budget — requests are
//! priced by how many remote fetches they trigger, not counted flatly.

pub mod config;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
