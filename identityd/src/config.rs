//! Configuration loading (SPEC_FULL.md Module I) — an ambient concern
//! spec.md section 1 puts out of scope ("Configuration loading ... are
//! external") but which a runnable daemon still needs: something has to
//! say which domains exist and which extra attributes are exposed, since
//! `is_attribute_allowed` and path-decomposition's domain check both
//! consume it.
//!
//! Grounded in `redhat-performance-rusty-comms`'s `clap::Parser` CLI
//! pattern for the override flags, and `kata-types`'s `serde` + `toml`
//! structured-config pattern for the file format.

use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct DomainConfig {
    pub name: String,
}

/// Allow-list of extra attribute names exposable through
/// `Users.extraAttributes`, consulted by `is_attribute_allowed`
/// (spec.md section 4.F).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttributeAllowList {
    #[serde(default)]
    pub allowed: Vec<String>,
}

impl AttributeAllowList {
    pub fn is_allowed(&self, attr: &str) -> bool {
        self.allowed.iter().any(|a| a == attr)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bus_address: String,
    #[serde(default)]
    pub domains: Vec<DomainConfig>,
    #[serde(default)]
    pub user_attributes: AttributeAllowList,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bus_address: "system".to_string(),
            domains: Vec::new(),
            user_attributes: AttributeAllowList::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e.to_string()))?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Read(PathBuf, String),
    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, String),
}

/// CLI flags, matching the `clap::Parser` style `rusty-comms` uses for its
/// own binary entry point.
#[derive(Debug, Parser)]
#[command(name = "identityd", about = "Identity daemon exposing users, groups and domains over sbus")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "/etc/identityd/identityd.toml")]
    pub config: PathBuf,

    /// Overrides the bus address from the config file.
    #[arg(long)]
    pub address: Option<String>,
}

impl Cli {
    pub fn resolve(&self) -> Result<Config, ConfigError> {
        let mut config = if self.config.exists() {
            Config::load(&self.config)?
        } else {
            Config::default()
        };
        if let Some(address) = &self.address {
            config.bus_address = address.clone();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_minimal_toml() {
        let toml_text = r#"
            bus_address = "session"

            [[domains]]
            name = "dom"

            [user_attributes]
            allowed = ["phone"]
        "#;
        let config: Config = toml::from_str(toml_text).unwrap();
        assert_eq!(config.bus_address, "session");
        assert_eq!(config.domains.len(), 1);
        assert!(config.user_attributes.is_allowed("phone"));
        assert!(!config.user_attributes.is_allowed("ssn"));
    }
}
