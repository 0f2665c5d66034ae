//! Ancestor closure over the `parent` relation.

use hashbrown::HashSet;

use super::LevelRegistry;
use crate::error::{ConfigError, RelateError};

impl LevelRegistry {
    /// Transitive ancestors of `level`, nearest first. Never includes `level`
    /// itself; empty for a level without a parent.
    pub fn ancestors_of(&self, level: &str) -> Result<Vec<&str>, RelateError> {
        let descriptor = self.lookup(level)?;

        let mut seen: HashSet<&str> = HashSet::new();
        let mut ancestors = Vec::new();
        let mut next = descriptor.parent.as_deref();

        // Bounded by the level count; parents are acyclic after load
        while let Some(parent) = next {
            if parent == level || !seen.insert(parent) {
                break;
            }
            ancestors.push(parent);
            next = self.get(parent).and_then(|d| d.parent.as_deref());
        }

        Ok(ancestors)
    }

    pub(super) fn check_acyclic(&self) -> Result<(), ConfigError> {
        let limit = self.levels.len();
        for level in &self.levels {
            let mut next = level.parent.as_deref();
            let mut steps = 0;
            while let Some(parent) = next {
                if parent == level.name || steps > limit {
                    return Err(ConfigError::ParentCycle(level.name.clone()));
                }
                steps += 1;
                next = self.get(parent).and_then(|d| d.parent.as_deref());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::tests::fixture_registry;

    #[test]
    fn test_closure() {
        let registry = fixture_registry();
        assert_eq!(registry.ancestors_of("tract").unwrap(), vec!["county", "state"]);
        assert_eq!(registry.ancestors_of("place").unwrap(), vec!["county", "state"]);
        assert_eq!(registry.ancestors_of("county").unwrap(), vec!["state"]);
    }

    #[test]
    fn test_top_level_has_no_ancestors() {
        let registry = fixture_registry();
        assert!(registry.ancestors_of("state").unwrap().is_empty());
        assert!(registry.ancestors_of("university").unwrap().is_empty());
    }

    #[test]
    fn test_idempotent_and_excludes_self() {
        let registry = fixture_registry();
        for level in ["state", "county", "place", "tract"] {
            let first = registry.ancestors_of(level).unwrap();
            let second = registry.ancestors_of(level).unwrap();
            assert_eq!(first, second);
            assert!(!first.contains(&level));
        }
    }

    #[test]
    fn test_unknown_level() {
        let registry = fixture_registry();
        assert!(registry.ancestors_of("galaxy").is_err());
    }
}
