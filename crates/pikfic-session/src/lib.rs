//! Pikfic — story session orchestration.
//!
//! A `StorySession` owns one live story and drives it through generation
//! turns, saves, deletion and sharing, one operation at a time.

pub mod application;
