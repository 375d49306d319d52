//! Kiosk API server library.
//!
//! Exposes config, state, error handling and routes so the binary entrypoint
//! and the integration tests build the same application.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
