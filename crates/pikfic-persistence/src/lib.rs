//! Pikfic — persistence.
//!
//! A single gateway in front of two storage backends: a device-local JSON
//! library for anonymous use and an owner-scoped remote library once an
//! identity is present. Sharing is layered on top of the gateway.

pub mod gateway;
pub mod local_store;
pub mod selector;
pub mod sharing;
