//! Pikfic — generation.
//!
//! Turns story state into a generation request, sends it to the
//! generative-text service, and validates what comes back against the fixed
//! episode schema. Streaming responses are decoded incrementally for display
//! while the authoritative result is still parsed from the full body.

pub mod client;
pub mod gemini;
pub mod genre;
pub mod prompt;
pub mod scanner;
pub mod schema;
