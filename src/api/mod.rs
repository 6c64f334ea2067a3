//! Ruster Pulse HTTP API Module
//! REST surface over the snapshot cache: lookups, batches, cache control

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod types;

pub use middleware::start_cleanup_task;
pub use routes::create_router;
pub use types::*;
