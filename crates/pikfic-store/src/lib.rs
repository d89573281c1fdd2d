//! Pikfic Store — `PostgreSQL` remote story library.
//!
//! Every record belongs to exactly one owner. The per-owner story quota is
//! enforced by the database as well as by the persistence gateway.

pub mod pg_story_repository;
