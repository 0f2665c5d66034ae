//! Relation resolution: plan target levels, compile, fan out, merge and format.

mod executor;
mod format;

pub use executor::fan_out;
pub use format::{root_row, Resolution, RootRow};

use hashbrown::HashSet;
use std::sync::Arc;
use tracing::info;

use crate::error::RelateError;
use crate::models::{GroupedRows, LevelDescriptor, RelationMode};
use crate::query::{CompileOptions, QueryCompiler, QueryDescriptor};
use crate::registry::LevelRegistry;
use crate::store::SpatialStore;
use crate::topology::{QuantizedSerializer, TopologyOptions, TopologySerializer};

/// Caller-facing switches for one resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOptions {
    /// Levels to leave out. `None` means the registry's ignore-by-default set,
    /// unless `target_levels` is given.
    pub skip_levels: Option<Vec<String>>,
    /// Restrict the scan to these levels
    pub target_levels: Option<Vec<String>>,
    pub overlap_size: bool,
    /// Radius for distance mode, in kilometers
    pub range_km: Option<f64>,
    pub display_name: bool,
    pub group_by_level: bool,
    /// Serialize as a topology payload instead of rows
    pub topology: Option<TopologyOptions>,
    pub root_row: RootRow,
    pub filter_negligible: bool,
    pub use_shortcuts: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            skip_levels: None,
            target_levels: None,
            overlap_size: false,
            range_km: None,
            display_name: false,
            group_by_level: false,
            topology: None,
            root_row: RootRow::Auto,
            filter_negligible: true,
            use_shortcuts: true,
        }
    }
}

impl ResolveOptions {
    fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            overlap_size: self.overlap_size,
            range_km: self.range_km,
            display_name: self.display_name,
            geometry: self.topology.is_some(),
            filter_negligible: self.filter_negligible,
            use_shortcuts: self.use_shortcuts,
        }
    }
}

/// Parse a textual radius in kilometers.
pub fn parse_range_km(raw: Option<&str>) -> Result<f64, RelateError> {
    let raw = raw.ok_or_else(|| RelateError::InvalidRange {
        reason: "missing range".to_string(),
    })?;
    let km: f64 = raw.trim().parse().map_err(|_| RelateError::InvalidRange {
        reason: format!("'{}' is not a number", raw),
    })?;
    if !km.is_finite() || km <= 0.0 {
        return Err(RelateError::InvalidRange {
            reason: format!("range must be positive, got {}", raw),
        });
    }
    Ok(km)
}

/// Resolves relations of one geography against a spatial store.
pub struct Resolver<S> {
    registry: Arc<LevelRegistry>,
    store: S,
    serializer: Arc<dyn TopologySerializer>,
}

impl<S: SpatialStore> Resolver<S> {
    pub fn new(registry: Arc<LevelRegistry>, store: S) -> Self {
        Self {
            registry,
            store,
            serializer: Arc::new(QuantizedSerializer),
        }
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn TopologySerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn registry(&self) -> &LevelRegistry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Levels to visit for `source`, in registry order, before the compiler
    /// drops the source level itself. Neighbors mode visits only the source
    /// level, whether or not it is ignored by default.
    pub fn target_levels<'a>(
        &'a self,
        source: &'a LevelDescriptor,
        mode: RelationMode,
        options: &ResolveOptions,
    ) -> Result<Vec<&'a str>, RelateError> {
        let registry = &*self.registry;
        let root_level = registry.root().map(|r| r.level.as_str());

        let requested: Option<HashSet<&str>> = match &options.target_levels {
            Some(levels) => Some(
                levels
                    .iter()
                    .map(|l| registry.lookup(l).map(|d| d.name.as_str()))
                    .collect::<Result<_, _>>()?,
            ),
            None => None,
        };

        let skip: HashSet<String> = match &options.skip_levels {
            Some(levels) => {
                for level in levels {
                    if !registry.contains(level) && Some(level.as_str()) != root_level {
                        return Err(RelateError::unknown_level(level.clone()));
                    }
                }
                levels.iter().cloned().collect()
            }
            None if requested.is_some() => HashSet::new(),
            None => registry.default_skip_set(),
        };

        // Neighbors compare the source level with itself; an explicit skip or
        // target list can still rule it out
        if mode == RelationMode::Neighbors {
            let name = source.name.as_str();
            let wanted = requested.as_ref().map_or(true, |r| r.contains(name));
            let skipped = options
                .skip_levels
                .as_ref()
                .is_some_and(|s| s.iter().any(|l| l == name));
            return Ok(if wanted && !skipped { vec![name] } else { Vec::new() });
        }

        let ancestors: Option<Vec<&str>> = match mode {
            RelationMode::Parents => Some(registry.ancestors_of(&source.name)?),
            _ => None,
        };

        Ok(registry
            .descriptors()
            .map(|d| d.name.as_str())
            .filter(|name| requested.as_ref().map_or(true, |r| r.contains(name)))
            .filter(|name| !skip.contains(*name))
            .filter(|name| ancestors.as_ref().map_or(true, |a| a.contains(name)))
            .collect())
    }

    /// Compile the descriptors a resolution would dispatch.
    pub fn plan(
        &self,
        source_id: &str,
        mode: RelationMode,
        options: &ResolveOptions,
    ) -> Result<Vec<QueryDescriptor>, RelateError> {
        let source = self.registry.classify(source_id)?;
        let targets = self.target_levels(source, mode, options)?;
        QueryCompiler::new(&self.registry).compile(
            source_id,
            mode,
            &targets,
            &options.compile_options(),
        )
    }

    /// Resolve every related geography of `source_id`.
    pub async fn resolve_relations(
        &self,
        source_id: &str,
        mode: RelationMode,
        options: &ResolveOptions,
    ) -> Result<Resolution, RelateError> {
        let descriptors = self.plan(source_id, mode, options)?;
        info!(
            "Resolving {} relations of {} across {} levels",
            mode,
            source_id,
            descriptors.len()
        );

        let mut rows = fan_out(&self.store, &descriptors).await?;

        if let Some(topology) = &options.topology {
            let payload = self.serializer.serialize(&rows, topology)?;
            return Ok(Resolution::Topology(payload));
        }

        if let Some(root) = self.registry.root() {
            let skipped = options
                .skip_levels
                .as_ref()
                .is_some_and(|s| s.iter().any(|l| *l == root.level));
            if !skipped && options.root_row.includes(mode, options.target_levels.is_some()) {
                rows.insert(0, root_row(root, options.overlap_size, options.display_name));
            }
        }

        if options.group_by_level {
            Ok(Resolution::Grouped(GroupedRows::from_rows(rows)))
        } else {
            Ok(Resolution::Rows(rows))
        }
    }
}
