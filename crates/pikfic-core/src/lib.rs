//! Pikfic Core — shared abstractions.
//!
//! Everything in here is depended on by the story, generation, persistence
//! and session crates: time and identifier sources, the opaque identity
//! signal, the language tag, and the error taxonomy. No I/O lives here.

pub mod clock;
pub mod error;
pub mod id;
pub mod identity;
pub mod language;
