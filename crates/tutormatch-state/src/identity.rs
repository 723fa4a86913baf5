//! Student identity normalization.
//!
//! Students are identified by the `(name, class section)` pair. Both halves
//! are folded to uppercase, stripped of diacritics, and whitespace-collapsed
//! before any comparison, so "  joão  da silva" in "3º a" and "JOAO DA SILVA"
//! in "3º A" are the same student.

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fold text for identity comparison: strip diacritics, collapse
/// whitespace, uppercase.
pub fn normalize_text(input: &str) -> String {
    let stripped: String = input.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Normalized `(name, class section)` identity of a student.
///
/// The fields are private so a key can only exist in normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "StudentKeyParts")]
pub struct StudentKey {
    name: String,
    class_section: String,
}

#[derive(Deserialize)]
struct StudentKeyParts {
    name: String,
    class_section: String,
}

impl From<StudentKeyParts> for StudentKey {
    fn from(parts: StudentKeyParts) -> Self {
        StudentKey::new(&parts.name, &parts.class_section)
    }
}

impl StudentKey {
    pub fn new(name: &str, class_section: &str) -> Self {
        Self {
            name: normalize_text(name),
            class_section: normalize_text(class_section),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class_section(&self) -> &str {
        &self.class_section
    }

    /// `NAME|CLASS` with `\` and `|` escaped inside each half, so two
    /// different keys never join to the same string.
    pub fn joined(&self) -> String {
        format!(
            "{}|{}",
            escape_separator(&self.name),
            escape_separator(&self.class_section)
        )
    }

    /// True when either half normalized to an empty string.
    pub fn is_blank(&self) -> bool {
        self.name.is_empty() || self.class_section.is_empty()
    }
}

fn escape_separator(part: &str) -> String {
    part.replace('\\', "\\\\").replace('|', "\\|")
}

impl std::fmt::Display for StudentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.class_section)
    }
}
