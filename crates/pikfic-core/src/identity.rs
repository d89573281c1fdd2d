//! The opaque "current identity or none" signal.
//!
//! Authentication happens elsewhere. Pikfic only needs a stable owner key to
//! scope remote records and an optional display name for attribution.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable key of the identity that owns remote records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Wraps an externally issued owner key.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A signed-in identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Owner key used for remote scoping.
    pub owner_id: OwnerId,
    /// Name shown when the owner chooses to be credited on a shared story.
    pub display_name: Option<String>,
}

impl Identity {
    /// Creates an identity.
    #[must_use]
    pub fn new(owner_id: OwnerId, display_name: Option<String>) -> Self {
        Self {
            owner_id,
            display_name,
        }
    }
}
