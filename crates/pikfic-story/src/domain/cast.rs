//! Character references.

use serde::{Deserialize, Serialize};

/// A named persona and the group it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRef {
    /// Group affiliation.
    pub group: String,
    /// Persona name.
    pub name: String,
}

impl CharacterRef {
    /// Creates a character reference.
    #[must_use]
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }
}

/// The secondary character: either a named persona or the reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Counterpart {
    /// A named persona.
    Named(CharacterRef),
    /// The reader stands in as the character.
    SelfInsert {
        /// Name the narrative uses for the reader.
        display_name: String,
    },
}

impl Counterpart {
    /// Name used in titles and prompts.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Named(character) => &character.name,
            Self::SelfInsert { display_name } => display_name,
        }
    }

    /// Whether this slot is a reader stand-in.
    #[must_use]
    pub fn is_self_insert(&self) -> bool {
        matches!(self, Self::SelfInsert { .. })
    }
}

/// Everyone who appears in a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cast {
    /// Primary character.
    pub lead: CharacterRef,
    /// Secondary character.
    pub counterpart: Counterpart,
    /// Supporting characters, in the order the user added them.
    #[serde(default)]
    pub supporting: Vec<CharacterRef>,
}

impl Cast {
    /// `lead X counterpart`, as shown on library cards.
    #[must_use]
    pub fn pairing_label(&self) -> String {
        format!("{} X {}", self.lead.name, self.counterpart.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counterpart_serializes_with_kind_tag() {
        let named = Counterpart::Named(CharacterRef::new("Aurora", "Min"));
        let reader = Counterpart::SelfInsert {
            display_name: "Y/N".to_owned(),
        };

        let named_json = serde_json::to_value(&named).unwrap();
        let reader_json = serde_json::to_value(&reader).unwrap();

        assert_eq!(named_json["kind"], "named");
        assert_eq!(named_json["name"], "Min");
        assert_eq!(reader_json["kind"], "self_insert");
        assert_eq!(reader_json["display_name"], "Y/N");
    }

    #[test]
    fn test_pairing_label_uses_self_insert_display_name() {
        let cast = Cast {
            lead: CharacterRef::new("Aurora", "Min"),
            counterpart: Counterpart::SelfInsert {
                display_name: "Y/N".to_owned(),
            },
            supporting: Vec::new(),
        };

        assert_eq!(cast.pairing_label(), "Min X Y/N");
        assert!(cast.counterpart.is_self_insert());
    }
}
