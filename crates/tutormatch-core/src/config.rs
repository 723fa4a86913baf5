//! Allocation configuration.
//!
//! Loaded from TOML or built in code. Every field has a default, so an empty
//! file is a valid configuration:
//!
//! ```toml
//! [capacity]
//! standard_cap = 18
//! pedagogical_cap = 6
//! pedagogical_roles = ["CASF", "COORDENADOR", "COORDENADORA", "PEDAGOGO",
//!                      "PEDAGOGA", "DIRETOR", "DIRETORA"]
//!
//! [preferences]
//! max_preferences = 5
//! ```
//!
//! `${VAR}` references are substituted from the environment before parsing.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::{MatchError, Result};

pub const DEFAULT_STANDARD_CAP: u32 = 18;
pub const DEFAULT_PEDAGOGICAL_CAP: u32 = 6;
pub const DEFAULT_MAX_PREFERENCES: usize = 5;

fn default_pedagogical_roles() -> Vec<String> {
    [
        "CASF",
        "COORDENADOR",
        "COORDENADORA",
        "PEDAGOGO",
        "PEDAGOGA",
        "DIRETOR",
        "DIRETORA",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// Cap for tutors outside the pedagogical roles
    pub standard_cap: u32,
    /// Cap for pedagogical roles; must be below `standard_cap`
    pub pedagogical_cap: u32,
    /// Role labels matched as substrings of the normalized category
    pub pedagogical_roles: Vec<String>,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            standard_cap: DEFAULT_STANDARD_CAP,
            pedagogical_cap: DEFAULT_PEDAGOGICAL_CAP,
            pedagogical_roles: default_pedagogical_roles(),
        }
    }
}

impl CapacityConfig {
    pub fn validate(&self) -> Result<()> {
        if self.standard_cap == 0 {
            return Err(MatchError::InvalidConfig(
                "capacity.standard_cap must be greater than 0".to_string(),
            ));
        }
        if self.pedagogical_cap == 0 {
            return Err(MatchError::InvalidConfig(
                "capacity.pedagogical_cap must be greater than 0".to_string(),
            ));
        }
        if self.pedagogical_cap >= self.standard_cap {
            return Err(MatchError::InvalidConfig(format!(
                "capacity.pedagogical_cap ({}) must be less than capacity.standard_cap ({})",
                self.pedagogical_cap, self.standard_cap
            )));
        }
        if self.pedagogical_roles.is_empty() {
            return Err(MatchError::InvalidConfig(
                "capacity.pedagogical_roles must not be empty".to_string(),
            ));
        }
        if self.pedagogical_roles.iter().any(|r| r.trim().is_empty()) {
            return Err(MatchError::InvalidConfig(
                "capacity.pedagogical_roles must not contain blank labels".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceConfig {
    /// Ranked entries honored per student; longer lists are truncated
    pub max_preferences: usize,
}

impl Default for PreferenceConfig {
    fn default() -> Self {
        Self {
            max_preferences: DEFAULT_MAX_PREFERENCES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    pub capacity: CapacityConfig,
    pub preferences: PreferenceConfig,
}

impl AllocationConfig {
    /// Load and validate a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let expanded = substitute_env_vars(content)?;
        let config: AllocationConfig = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.capacity.validate()?;
        if self.preferences.max_preferences == 0 {
            return Err(MatchError::InvalidConfig(
                "preferences.max_preferences must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Replace `${VAR}` with the variable's value; unset variables stay verbatim.
fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| MatchError::InvalidConfig(e.to_string()))?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = AllocationConfig::from_toml_str("").unwrap();
        assert_eq!(config.capacity.standard_cap, 18);
        assert_eq!(config.capacity.pedagogical_cap, 6);
        assert_eq!(config.preferences.max_preferences, 5);
        assert!(config
            .capacity
            .pedagogical_roles
            .contains(&"COORDENADORA".to_string()));
    }

    #[test]
    fn test_partial_override() {
        let config = AllocationConfig::from_toml_str(
            r#"
            [capacity]
            standard_cap = 20
            "#,
        )
        .unwrap();
        assert_eq!(config.capacity.standard_cap, 20);
        assert_eq!(config.capacity.pedagogical_cap, 6);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TUTORMATCH_TEST_STD_CAP", "25");
        let config = AllocationConfig::from_toml_str(
            r#"
            [capacity]
            standard_cap = ${TUTORMATCH_TEST_STD_CAP}
            "#,
        )
        .unwrap();
        assert_eq!(config.capacity.standard_cap, 25);
        std::env::remove_var("TUTORMATCH_TEST_STD_CAP");
    }

    #[test]
    fn test_pedagogical_cap_must_be_below_standard() {
        let err = AllocationConfig::from_toml_str(
            r#"
            [capacity]
            standard_cap = 6
            pedagogical_cap = 6
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, MatchError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_zero_caps_and_ranks() {
        let mut config = AllocationConfig::default();
        config.capacity.pedagogical_cap = 0;
        assert!(config.validate().is_err());

        let mut config = AllocationConfig::default();
        config.preferences.max_preferences = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_blank_role_labels() {
        let mut config = AllocationConfig::default();
        config.capacity.pedagogical_roles.push("  ".to_string());
        assert!(config.validate().is_err());

        config.capacity.pedagogical_roles.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = AllocationConfig::from_toml_str("[capacity\nstandard_cap = ").unwrap_err();
        assert!(matches!(err, MatchError::ConfigParse(_)));
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[preferences]\nmax_preferences = 3").unwrap();

        let config = AllocationConfig::from_file(file.path()).unwrap();
        assert_eq!(config.preferences.max_preferences, 3);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = AllocationConfig::from_file("/nonexistent/tutormatch.toml").unwrap_err();
        assert!(matches!(err, MatchError::Io(_)));
    }
}
