//! HTTP surface of the shelfsync marketplace sync engine.
//!
//! Wires the core services onto SQLite and the Takealot client
//! ([`context::AppContext`]) and serves them over axum ([`router::build_app_router`]).

pub mod context;
pub mod error;
pub mod extract;
pub mod router;
pub mod routes;
pub mod telemetry;

pub use context::{AppContext, HealthStatus};
pub use error::{ApiError, ApiResult};
pub use router::build_app_router;
pub use routes::AppState;
pub use telemetry::init_tracing;
