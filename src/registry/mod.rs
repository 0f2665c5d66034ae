//! Level registry: every configured level, the identifier classifier and
//! the shortcut index, validated once at startup and read-only afterwards.

mod ancestors;
pub mod classifier;
pub mod config;
pub mod shortcut;

use hashbrown::{HashMap, HashSet};
use tracing::{debug, info};

pub use classifier::Classifier;
pub use config::{Config, RootConfig};
pub use shortcut::{ShortcutIndex, ShortcutRule};

use crate::error::{ConfigError, RelateError};
use crate::models::{DatasetFamily, LevelDescriptor, LevelGeometry, RelationMode};

/// Immutable registry of configured levels.
#[derive(Debug, Clone)]
pub struct LevelRegistry {
    /// Shapes in config order, then points in config order
    levels: Vec<LevelDescriptor>,
    by_name: HashMap<String, usize>,
    classifier: Classifier,
    shortcuts: ShortcutIndex,
    root: Option<RootConfig>,
    default_srid: u32,
}

impl LevelRegistry {
    /// Validate a configuration and build the registry.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let mut levels = Vec::with_capacity(config.shapes.len() + config.points.len());

        for shape in &config.shapes {
            levels.push(LevelDescriptor {
                name: shape.name.clone(),
                family: DatasetFamily::Shapes,
                schema: shape.schema.clone(),
                table: shape.table.clone(),
                id_column: shape.id.clone(),
                name_column: shape.name_column.clone(),
                geometry: LevelGeometry::Column(shape.geometry.clone()),
                srid: shape.srid.unwrap_or(config.srid),
                parent: shape.parent.clone(),
                ignore_by_default: shape.ignore_by_default,
            });
        }

        for point in &config.points {
            let srid = point
                .srid
                .ok_or_else(|| ConfigError::MissingSrid(point.name.clone()))?;
            levels.push(LevelDescriptor {
                name: point.name.clone(),
                family: DatasetFamily::Points,
                schema: point.schema.clone(),
                table: point.table.clone(),
                id_column: point.id.clone(),
                name_column: point.name_column.clone(),
                geometry: LevelGeometry::LonLat {
                    longitude: point.longitude.clone(),
                    latitude: point.latitude.clone(),
                },
                srid,
                parent: None,
                ignore_by_default: point.ignore_by_default,
            });
        }

        let mut by_name = HashMap::new();
        for (idx, level) in levels.iter().enumerate() {
            if by_name.insert(level.name.clone(), idx).is_some() {
                return Err(ConfigError::DuplicateLevel(level.name.clone()));
            }
        }

        // Parents must resolve to shape levels
        for level in &levels {
            if let Some(parent) = &level.parent {
                let idx = by_name.get(parent).ok_or_else(|| ConfigError::UnknownParent {
                    level: level.name.clone(),
                    parent: parent.clone(),
                })?;
                if levels[*idx].family != DatasetFamily::Shapes {
                    return Err(ConfigError::ParentNotShape {
                        level: level.name.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        if let Some(root) = &config.root {
            if by_name.contains_key(&root.level) {
                return Err(ConfigError::DuplicateLevel(root.level.clone()));
            }
        }

        let classifier = Classifier::from_config(&config.classifier)?;
        for level in classifier.levels() {
            if !by_name.contains_key(level) {
                return Err(ConfigError::UnknownLevel {
                    context: "classifier".to_string(),
                    level: level.to_string(),
                });
            }
        }

        let mut rules = Vec::with_capacity(config.shortcuts.len());
        let mut seen = HashSet::new();
        for shortcut in &config.shortcuts {
            let context = format!("shortcut for '{}'", shortcut.source);
            for level in std::iter::once(&shortcut.source).chain(shortcut.levels.iter()) {
                if !by_name.contains_key(level) {
                    return Err(ConfigError::UnknownLevel {
                        context: context.clone(),
                        level: level.clone(),
                    });
                }
            }
            let invalid = |reason: String| ConfigError::InvalidShortcut {
                source_level: shortcut.source.clone(),
                reason,
            };
            if !matches!(shortcut.mode, RelationMode::Children | RelationMode::Parents) {
                return Err(invalid(format!(
                    "mode {} cannot be answered by a prefix test",
                    shortcut.mode
                )));
            }
            if shortcut.skip_length > shortcut.retain_length {
                return Err(invalid(format!(
                    "skip_length {} exceeds retain_length {}",
                    shortcut.skip_length, shortcut.retain_length
                )));
            }
            if let Some(max) = classifier.max_length_of(&shortcut.source) {
                if shortcut.retain_length > max {
                    return Err(invalid(format!(
                        "retain_length {} exceeds the level's id length {}",
                        shortcut.retain_length, max
                    )));
                }
            }
            if !seen.insert((shortcut.source.clone(), shortcut.mode)) {
                return Err(invalid(format!("duplicate rule for mode {}", shortcut.mode)));
            }
            rules.push(ShortcutRule {
                source_level: shortcut.source.clone(),
                target_levels: shortcut.levels.clone(),
                retain_length: shortcut.retain_length,
                skip_length: shortcut.skip_length,
                mode: shortcut.mode,
            });
        }

        let registry = Self {
            levels,
            by_name,
            classifier,
            shortcuts: ShortcutIndex::new(rules),
            root: config.root,
            default_srid: config.srid,
        };
        registry.check_acyclic()?;

        info!(
            "Level registry loaded: {} shape levels, {} point levels, {} shortcut rules",
            registry.all_levels(DatasetFamily::Shapes).len(),
            registry.all_levels(DatasetFamily::Points).len(),
            registry.shortcuts.len()
        );

        Ok(registry)
    }

    /// Descriptor of `level` within `family`
    pub fn describe(
        &self,
        level: &str,
        family: DatasetFamily,
    ) -> Result<&LevelDescriptor, RelateError> {
        self.get(level)
            .filter(|d| d.family == family)
            .ok_or_else(|| RelateError::unknown_level(level))
    }

    /// Descriptor of `level` in whichever family defines it
    pub fn get(&self, level: &str) -> Option<&LevelDescriptor> {
        self.by_name.get(level).map(|idx| &self.levels[*idx])
    }

    pub fn lookup(&self, level: &str) -> Result<&LevelDescriptor, RelateError> {
        self.get(level).ok_or_else(|| RelateError::unknown_level(level))
    }

    pub fn contains(&self, level: &str) -> bool {
        self.by_name.contains_key(level)
    }

    /// Level names of one family, in config order
    pub fn all_levels(&self, family: DatasetFamily) -> Vec<&str> {
        self.levels
            .iter()
            .filter(|d| d.family == family)
            .map(|d| d.name.as_str())
            .collect()
    }

    /// Every descriptor, shapes first, in config order
    pub fn descriptors(&self) -> impl Iterator<Item = &LevelDescriptor> {
        self.levels.iter()
    }

    /// Levels flagged `ignore_by_default`, across both families
    pub fn default_skip_set(&self) -> HashSet<String> {
        self.levels
            .iter()
            .filter(|d| d.ignore_by_default)
            .map(|d| d.name.clone())
            .collect()
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Level of an identifier
    pub fn classify(&self, id: &str) -> Result<&LevelDescriptor, RelateError> {
        let level = self.classifier.classify(id)?;
        debug!("Classified {} as {}", id, level);
        self.lookup(level)
    }

    pub fn shortcuts(&self) -> &ShortcutIndex {
        &self.shortcuts
    }

    pub fn root(&self) -> Option<&RootConfig> {
        self.root.as_ref()
    }

    pub fn default_srid(&self) -> u32 {
        self.default_srid
    }
}
