//! TOML level configuration.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::models::RelationMode;

const ACS_LEVELS: &str = include_str!("../../config/acs_levels.toml");
const AH_LEVELS: &str = include_str!("../../config/ah_levels.toml");

fn default_srid() -> u32 {
    4269
}

fn default_id_column() -> String {
    "geoid".to_string()
}

fn default_name_column() -> String {
    "name".to_string()
}

fn default_geometry_column() -> String {
    "geom".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// SRID used when a shape level does not declare one
    #[serde(default = "default_srid")]
    pub srid: u32,
    /// Synthetic root row ("nation")
    #[serde(default)]
    pub root: Option<RootConfig>,
    #[serde(default)]
    pub shapes: Vec<ShapeConfig>,
    #[serde(default)]
    pub points: Vec<PointConfig>,
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub shortcuts: Vec<ShortcutConfig>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RootConfig {
    pub id: String,
    pub name: String,
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ShapeConfig {
    pub name: String,
    pub schema: String,
    pub table: String,
    #[serde(default = "default_id_column")]
    pub id: String,
    #[serde(default = "default_name_column")]
    pub name_column: String,
    #[serde(default = "default_geometry_column")]
    pub geometry: String,
    pub srid: Option<u32>,
    pub parent: Option<String>,
    #[serde(default)]
    pub ignore_by_default: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PointConfig {
    pub name: String,
    pub schema: String,
    pub table: String,
    #[serde(default = "default_id_column")]
    pub id: String,
    #[serde(default = "default_name_column")]
    pub name_column: String,
    pub longitude: String,
    pub latitude: String,
    pub srid: Option<u32>,
    #[serde(default)]
    pub ignore_by_default: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClassifierConfig {
    pub prefix_length: Option<usize>,
    /// Prefix code to level name
    #[serde(default)]
    pub codes: BTreeMap<String, String>,
    #[serde(default)]
    pub max_length: Vec<MaxLengthConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MaxLengthConfig {
    pub max: usize,
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ShortcutConfig {
    pub source: String,
    pub levels: Vec<String>,
    pub retain_length: usize,
    #[serde(default)]
    pub skip_length: usize,
    pub mode: RelationMode,
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Built-in preset by name ("acs" or "ah")
    pub fn preset(name: &str) -> Option<Result<Self, ConfigError>> {
        match name {
            "acs" => Some(Self::from_toml_str(ACS_LEVELS)),
            "ah" => Some(Self::from_toml_str(AH_LEVELS)),
            _ => None,
        }
    }
}
