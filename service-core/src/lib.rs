//! service-core: shared infrastructure for the video portal workspace.
pub mod error;
pub mod middleware;
pub mod observability;

pub use axum;
pub use tracing;
