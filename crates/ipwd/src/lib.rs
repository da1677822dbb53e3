//! IPW daemon library
//!
//! HTTP transport for the image review chain:
//! - `POST /ipw` runs a review and answers 200 (allowed) or 400 (denied)
//! - `GET /healthz` liveness probe
//! - environment-driven configuration

pub mod config;
pub mod error;
pub mod server;

pub use config::Cli;
pub use error::{ApiError, DaemonError, DaemonResult};
pub use server::{create_router, AppState, Server};
