//! Lexical-prefix shortcuts between hierarchical identifier levels.
//!
//! FIPS-style ids are self-describing: a tract id embeds its county's id,
//! so for the configured pairs containment is decided with a string prefix
//! test instead of a geometric join.

use hashbrown::HashMap;

use crate::models::RelationMode;

/// Shortcut rule for one source level and relation mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutRule {
    pub source_level: String,
    pub target_levels: Vec<String>,
    /// Characters of the source id that every candidate must share
    pub retain_length: usize,
    /// Leading characters ignored on both ids (level header such as "05000US")
    pub skip_length: usize,
    pub mode: RelationMode,
}

impl ShortcutRule {
    pub fn applies_to(&self, target_level: &str) -> bool {
        self.target_levels.iter().any(|l| l == target_level)
    }

    /// The part of the source id candidates must start with. `None` when the
    /// source id is too short to truncate.
    pub fn retained<'a>(&self, source_id: &'a str) -> Option<&'a str> {
        char_slice(source_id, self.skip_length, self.retain_length)
    }

    /// Pure prefix test deciding candidate membership.
    pub fn matches(&self, source_id: &str, candidate_id: &str) -> bool {
        prefix_matches(source_id, candidate_id, self.skip_length, self.retain_length)
    }
}

/// Byte offset of the `chars`-th character, or the end of `s` when it has
/// exactly `chars` characters
fn char_offset(s: &str, chars: usize) -> Option<usize> {
    s.char_indices()
        .map(|(at, _)| at)
        .chain(std::iter::once(s.len()))
        .nth(chars)
}

/// Characters `from..to` of `s`, counted like SQL `substr`
fn char_slice(s: &str, from: usize, to: usize) -> Option<&str> {
    s.get(char_offset(s, from)?..char_offset(s, to)?)
}

/// `candidate[skip..]` starts with `source[skip..retain]`, positions counted
/// in characters. Ids too short to truncate never match.
pub fn prefix_matches(source_id: &str, candidate_id: &str, skip: usize, retain: usize) -> bool {
    let Some(retained) = char_slice(source_id, skip, retain) else {
        return false;
    };
    char_offset(candidate_id, skip).is_some_and(|at| candidate_id[at..].starts_with(retained))
}

/// Shortcut rules keyed by (source level, mode).
#[derive(Debug, Clone, Default)]
pub struct ShortcutIndex {
    rules: HashMap<(String, RelationMode), ShortcutRule>,
}

impl ShortcutIndex {
    pub fn new(rules: impl IntoIterator<Item = ShortcutRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|r| ((r.source_level.clone(), r.mode), r))
            .collect();
        Self { rules }
    }

    pub fn lookup(&self, source_level: &str, mode: RelationMode) -> Option<&ShortcutRule> {
        self.rules.get(&(source_level.to_string(), mode))
    }

    /// Rule usable for this exact (source, target, mode) triple
    pub fn rule_for(
        &self,
        source_level: &str,
        target_level: &str,
        mode: RelationMode,
    ) -> Option<&ShortcutRule> {
        self.lookup(source_level, mode)
            .filter(|rule| rule.applies_to(target_level))
    }

    pub fn rules(&self) -> impl Iterator<Item = &ShortcutRule> {
        self.rules.values()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
