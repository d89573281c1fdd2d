//! Genre-specific prompt augmentations.

/// Augmentation used when a genre key is not recognised.
pub const UNCLASSIFIED: &str = "Unclassified fiction. Follow the premise and keep the tone consistent with it.";

struct GenreProfile {
    key: &'static str,
    aliases: &'static [&'static str],
    augmentation: &'static str,
}

const GENRES: &[GenreProfile] = &[
    GenreProfile {
        key: "slice-of-life",
        aliases: &["일상"],
        augmentation: "Focus on realistic, everyday details: cafes, practice rooms, and subtle emotional shifts. Keep the atmosphere cozy and natural.",
    },
    GenreProfile {
        key: "real-life",
        aliases: &["리얼물"],
        augmentation: "Ground the story in the reality of the entertainment industry: schedules, dorm life, waiting rooms, and backstage dynamics.",
    },
    GenreProfile {
        key: "campus",
        aliases: &["캠퍼스"],
        augmentation: "University setting. Use majors, senior/junior dynamics, campus festivals, library encounters, and late-night gatherings.",
    },
    GenreProfile {
        key: "office",
        aliases: &["오피스"],
        augmentation: "Company hierarchy setting. Use meeting rooms, overtime, business trips, and the tension of a secret office romance.",
    },
    GenreProfile {
        key: "omegaverse",
        aliases: &["오메가버스"],
        augmentation: "Apply Omegaverse rules (Alpha/Beta/Omega, pheromones, heat and rut cycles). Explore instinct against reason and biological tension.",
    },
    GenreProfile {
        key: "sentinelverse",
        aliases: &["센티넬버스"],
        augmentation: "Sentinel/Guide universe. Focus on guiding, bonding, sensory overload, and the urgency of battles or missions.",
    },
    GenreProfile {
        key: "genderbend",
        aliases: &["TS"],
        augmentation: "Alternate universe where the character was born the opposite gender. No physical transformation. Explore the social dynamics and reimagined chemistry this creates.",
    },
    GenreProfile {
        key: "beastfolk",
        aliases: &["수인"],
        augmentation: "Characters have animal traits (ears, tails) or can transform. Bring out animal instincts and behaviours.",
    },
    GenreProfile {
        key: "apocalypse",
        aliases: &["아포칼립스"],
        augmentation: "Zombie or disaster survival setting. Focus on scarcity, fragile trust, danger, and romance in a ruined world.",
    },
];

/// Augmentation text for `key`, falling back to [`UNCLASSIFIED`].
///
/// Matches the canonical key case-insensitively, or any alias exactly.
#[must_use]
pub fn augmentation(key: &str) -> &'static str {
    let key = key.trim();
    GENRES
        .iter()
        .find(|genre| genre.key.eq_ignore_ascii_case(key) || genre.aliases.contains(&key))
        .map_or(UNCLASSIFIED, |genre| genre.augmentation)
}

/// Canonical genre keys, in display order.
pub fn known_keys() -> impl Iterator<Item = &'static str> {
    GENRES.iter().map(|genre| genre.key)
}
