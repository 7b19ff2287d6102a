use crate::client::ClientTarget;
use crate::error::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which conversion directions mappers are built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Both,
    /// Internal to external only: properties need a readable accessor
    Outward,
    /// External to internal only: properties need a writable accessor
    Inward,
}

impl Direction {
    pub fn needs_read(&self) -> bool {
        matches!(self, Direction::Both | Direction::Outward)
    }

    pub fn needs_write(&self) -> bool {
        matches!(self, Direction::Both | Direction::Inward)
    }
}

/// A package (file stem) prefix rewritten for client code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConversion {
    pub from: String,
    pub to: String,
}

/// Mapper generation settings, usually read from a YAML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapperConfig {
    pub direction: Direction,
    /// Client languages to derive type names for
    pub targets: Vec<ClientTarget>,
    pub package_conversions: Vec<PackageConversion>,
    /// Skip types that fail to resolve instead of aborting
    pub keep_going: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            direction: Direction::Both,
            targets: vec![ClientTarget::Java],
            package_conversions: Vec::new(),
            keep_going: false,
        }
    }
}

impl MapperConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: MapperConfig =
            serde_yaml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for conversion in &self.package_conversions {
            if conversion.from.is_empty() {
                return Err(Error::Config(format!(
                    "package conversion to '{}' has an empty source package",
                    conversion.to
                )));
            }
        }
        Ok(())
    }
}
