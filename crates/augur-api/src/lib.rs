//! HTTP surface for the session orchestration core.
//!
//! `POST /turn` dispatches turn actions (SSE for `generate`, JSON for the
//! rest); `GET /health` and `GET /sessions` report service state.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
