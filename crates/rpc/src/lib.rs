//! HTTP API for the Cantus registry.
//!
//! Exposes the registry's two operations plus node housekeeping endpoints
//! (`/health`, `/version`, `/metrics`) over axum.

pub mod server;

pub use server::{start_server, AppState};
