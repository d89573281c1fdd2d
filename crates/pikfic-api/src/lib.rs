//! Pikfic — HTTP API server library.
//!
//! Exposes the router, state and configuration so the binary and the
//! integration tests assemble the same application.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
pub mod state;
