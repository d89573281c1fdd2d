//! Pikfic — Story aggregate.
//!
//! Owns the story data model, the Draft → InProgress → Completed lifecycle,
//! and the storage ports the persistence layer implements.

pub mod domain;
