//! Maps an opaque geo-identifier to its level.

use std::collections::BTreeMap;

use crate::error::{ConfigError, RelateError};
use crate::registry::config::ClassifierConfig;

/// Identifier classification strategy, chosen once at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classifier {
    /// Fixed-width leading code, e.g. "050" for counties
    PrefixCode {
        length: usize,
        codes: BTreeMap<String, String>,
    },
    /// `(max id length, level)` sorted ascending by length
    MaxLength(Vec<(usize, String)>),
}

impl Classifier {
    /// Build from configuration. Level names are checked by the registry.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ConfigError> {
        let has_codes = config.prefix_length.is_some() || !config.codes.is_empty();
        let has_lengths = !config.max_length.is_empty();

        match (has_codes, has_lengths) {
            (true, false) => {
                let length = config.prefix_length.ok_or(ConfigError::ClassifierStrategy)?;
                if let Some(code) = config.codes.keys().find(|c| c.len() != length) {
                    return Err(ConfigError::ClassifierCode {
                        code: code.clone(),
                        length,
                    });
                }
                Ok(Classifier::PrefixCode {
                    length,
                    codes: config.codes.clone(),
                })
            }
            (false, true) => {
                let mut entries: Vec<(usize, String)> = config
                    .max_length
                    .iter()
                    .map(|e| (e.max, e.level.clone()))
                    .collect();
                entries.sort_by_key(|(max, _)| *max);
                Ok(Classifier::MaxLength(entries))
            }
            _ => Err(ConfigError::ClassifierStrategy),
        }
    }

    /// Level of `id`, or `UnknownLevel` when no table entry matches.
    pub fn classify(&self, id: &str) -> Result<&str, RelateError> {
        match self {
            Classifier::PrefixCode { length, codes } => id
                .get(..*length)
                .and_then(|prefix| codes.get(prefix))
                .map(String::as_str)
                .ok_or_else(|| RelateError::unknown_level(id)),
            Classifier::MaxLength(entries) => {
                let len = id.chars().count();
                entries
                    .iter()
                    .find(|(max, _)| *max >= len)
                    .map(|(_, level)| level.as_str())
                    .ok_or_else(|| RelateError::unknown_level(id))
            }
        }
    }

    /// Every level the classifier can produce
    pub fn levels(&self) -> Vec<&str> {
        match self {
            Classifier::PrefixCode { codes, .. } => codes.values().map(String::as_str).collect(),
            Classifier::MaxLength(entries) => entries.iter().map(|(_, l)| l.as_str()).collect(),
        }
    }

    /// Longest identifier classified as `level`, when the strategy knows one.
    pub fn max_length_of(&self, level: &str) -> Option<usize> {
        match self {
            Classifier::PrefixCode { .. } => None,
            Classifier::MaxLength(entries) => entries
                .iter()
                .filter(|(_, l)| l == level)
                .map(|(max, _)| *max)
                .max(),
        }
    }
}
