//! Domain layer for the story context.

pub mod aggregates;
pub mod cast;
pub mod repository;
pub mod setup;
