//! Narrative language tag.

use serde::{Deserialize, Serialize};

/// Language a story is written in. Also selects the notification copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    /// Korean (`kr`).
    #[default]
    #[serde(rename = "kr")]
    Korean,
    /// English (`en`).
    #[serde(rename = "en")]
    English,
    /// Japanese (`jp`).
    #[serde(rename = "jp")]
    Japanese,
    /// Chinese (`cn`).
    #[serde(rename = "cn")]
    Chinese,
}

impl Language {
    /// Returns the short storage code.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Korean => "kr",
            Self::English => "en",
            Self::Japanese => "jp",
            Self::Chinese => "cn",
        }
    }

    /// Parses a storage code.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "kr" => Some(Self::Korean),
            "en" => Some(Self::English),
            "jp" => Some(Self::Japanese),
            "cn" => Some(Self::Chinese),
            _ => None,
        }
    }

    /// English name of the language, as written into prompts.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Korean => "Korean",
            Self::English => "English",
            Self::Japanese => "Japanese",
            Self::Chinese => "Chinese",
        }
    }
}
