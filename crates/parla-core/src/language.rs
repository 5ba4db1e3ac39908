//! Supported practice languages
//!
//! A fixed registry of BCP-47 tags with their human-readable names. The name is
//! what gets handed to the LLM in the reply instruction, so it must read
//! naturally in English.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Ltr,
    Rtl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
    pub direction: Direction,
}

pub const LANGUAGES: &[Language] = &[
    Language {
        code: "zh-TW",
        name: "Chinese (Traditional)",
        direction: Direction::Ltr,
    },
    Language {
        code: "en-US",
        name: "English",
        direction: Direction::Ltr,
    },
    Language {
        code: "ja-JP",
        name: "Japanese",
        direction: Direction::Ltr,
    },
];

/// Look up a registry entry by exact tag
pub fn find(code: &str) -> Option<&'static Language> {
    LANGUAGES.iter().find(|l| l.code == code)
}

/// Human-readable name for a tag. Unknown tags read as "English".
pub fn display_name(code: &str) -> &'static str {
    find(code).map(|l| l.name).unwrap_or("English")
}

/// The primary subtag of a BCP-47 tag ("ja" for "ja-JP")
pub fn primary_subtag(tag: &str) -> &str {
    tag.split('-').next().unwrap_or(tag)
}

pub fn is_english(tag: &str) -> bool {
    primary_subtag(tag).eq_ignore_ascii_case("en")
}

/// The tag after `code` in the registry, wrapping around. Unknown tags start
/// from the first entry.
pub fn next_code(code: &str) -> &'static str {
    let idx = LANGUAGES
        .iter()
        .position(|l| l.code == code)
        .map(|i| (i + 1) % LANGUAGES.len())
        .unwrap_or(0);
    LANGUAGES[idx].code
}
