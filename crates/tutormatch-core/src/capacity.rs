//! Capacity policy: tutor category to maximum load.

use serde::{Deserialize, Serialize};
use tutormatch_state::{normalize_text, TutorId, TutorRecord};

use crate::config::CapacityConfig;
use crate::domain::error::Result;
use crate::obs;

/// Maps a tutor category to its cap. Pure once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityPolicy {
    standard_cap: u32,
    pedagogical_cap: u32,
    /// Normalized role labels
    roles: Vec<String>,
}

impl CapacityPolicy {
    /// Build from validated configuration.
    pub fn from_config(config: &CapacityConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: &CapacityConfig) -> Self {
        Self {
            standard_cap: config.standard_cap,
            pedagogical_cap: config.pedagogical_cap,
            roles: config
                .pedagogical_roles
                .iter()
                .map(|r| normalize_text(r))
                .collect(),
        }
    }

    pub fn standard_cap(&self) -> u32 {
        self.standard_cap
    }

    pub fn pedagogical_cap(&self) -> u32 {
        self.pedagogical_cap
    }

    /// True when the normalized category contains any role label.
    pub fn is_pedagogical(&self, category: &str) -> bool {
        let category = normalize_text(category);
        self.roles.iter().any(|role| category.contains(role.as_str()))
    }

    pub fn capacity_for_category(&self, category: &str) -> u32 {
        if self.is_pedagogical(category) {
            self.pedagogical_cap
        } else {
            self.standard_cap
        }
    }

    /// Capacity of a tutor that may be missing from the directory.
    ///
    /// A missing record falls back to the standard cap.
    pub fn capacity_of(&self, tutor_id: &TutorId, tutor: Option<&TutorRecord>) -> u32 {
        match tutor {
            Some(record) => self.capacity_for_category(&record.category),
            None => {
                obs::emit_tutor_missing(tutor_id, "capacity lookup, using standard cap");
                self.standard_cap
            }
        }
    }
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self::build(&CapacityConfig::default())
    }
}
