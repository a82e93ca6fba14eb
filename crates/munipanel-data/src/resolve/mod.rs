//! Entity resolution across sources without a common numeric key.
//!
//! Every source row is mapped to a [`MatchKey`] `(normalized_name, state)`.
//! The state is always derived from the source itself (numeric code prefix
//! or parenthetical suffix), never from the name. Two rows from different
//! sources with equal keys denote the same municipality.
//!
//! After normalization and overrides the key sets of two sources are
//! expected to be equal; [`ResolutionReport`] exposes the symmetric
//! difference so the caller can reject or explicitly accept a residual.

pub mod normalize;
pub mod overrides;

pub use normalize::{NameNormalizer, PREPOSITIONS, SEPARATOR, strip_diacritics};
pub use overrides::{NameOverride, OverrideTable, builtin_overrides};

use crate::{DataError, Result, geo::State};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Canonical join key for a municipality.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[display("{name}/{state}")]
pub struct MatchKey {
    /// Normalized name after overrides
    pub name: String,
    /// State derived independently from the source row
    pub state: State,
}

/// Resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Load the built-in override table (default: true)
    pub use_builtin_overrides: bool,

    /// Additional rules, applied with priority over built-in ones
    pub extra_overrides: Vec<NameOverride>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            use_builtin_overrides: true,
            extra_overrides: Vec::new(),
        }
    }
}

/// Maps raw names to match keys.
#[derive(Debug, Clone)]
pub struct Resolver {
    normalizer: NameNormalizer,
    overrides: OverrideTable,
}

impl Resolver {
    /// Build a resolver; the override table is frozen here.
    pub fn new(config: ResolverConfig) -> Result<Self> {
        let builtin = if config.use_builtin_overrides {
            builtin_overrides()
        } else {
            Vec::new()
        };
        let overrides = OverrideTable::new(builtin.into_iter().chain(config.extra_overrides));
        Ok(Self {
            normalizer: NameNormalizer::new()?,
            overrides,
        })
    }

    /// Resolver with the built-in override table only.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ResolverConfig::default())
    }

    /// Normalize a raw name without applying overrides.
    pub fn normalize(&self, raw: &str) -> String {
        self.normalizer.normalize(raw)
    }

    /// Extract the state from a `NAME (ST)` suffix.
    pub fn state_from_suffix(&self, raw: &str) -> Option<State> {
        self.normalizer.state_from_suffix(raw)
    }

    /// Compute the match key of a raw name in a given state.
    pub fn match_key(&self, raw: &str, state: State) -> MatchKey {
        let normalized = self.normalizer.normalize(raw);
        MatchKey {
            name: self.overrides.apply(&normalized, state).to_string(),
            state,
        }
    }

    /// Resolve every row of a source.
    ///
    /// Rows repeating the same raw `(name, state)` pair (e.g. one row per
    /// year) collapse onto one entity. Two different raw names that end up
    /// on the same key are ambiguous and rejected.
    pub fn resolve_source<'a, I>(&self, source_name: &str, rows: I) -> Result<ResolvedSource>
    where
        I: IntoIterator<Item = (&'a str, State)>,
    {
        let mut row_keys = Vec::new();
        let mut entities: BTreeMap<MatchKey, ResolvedEntity> = BTreeMap::new();

        for (row, (raw, state)) in rows.into_iter().enumerate() {
            let key = self.match_key(raw, state);
            let raw_trimmed = raw.trim();
            match entities.get(&key) {
                Some(existing) if existing.raw_name != raw_trimmed => {
                    return Err(DataError::AmbiguousMatchKey {
                        source_name: source_name.to_string(),
                        key: key.to_string(),
                        first: existing.first_row,
                        second: row,
                    });
                }
                Some(_) => {}
                None => {
                    entities.insert(
                        key.clone(),
                        ResolvedEntity {
                            raw_name: raw_trimmed.to_string(),
                            first_row: row,
                        },
                    );
                }
            }
            row_keys.push(key);
        }

        info!(
            source = source_name,
            rows = row_keys.len(),
            entities = entities.len(),
            "resolved source"
        );

        Ok(ResolvedSource {
            name: source_name.to_string(),
            row_keys,
            entities,
        })
    }
}

/// First raw spelling seen for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntity {
    /// Raw name as recorded by the source
    pub raw_name: String,
    /// Index of the first row carrying this entity
    pub first_row: usize,
}

/// A source after resolution.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    name: String,
    row_keys: Vec<MatchKey>,
    entities: BTreeMap<MatchKey, ResolvedEntity>,
}

impl ResolvedSource {
    /// Source name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Match key of each input row, in input order.
    pub fn row_keys(&self) -> &[MatchKey] {
        &self.row_keys
    }

    /// Distinct entities in key order.
    pub const fn entities(&self) -> &BTreeMap<MatchKey, ResolvedEntity> {
        &self.entities
    }

    /// Whether the source carries `key`.
    pub fn contains(&self, key: &MatchKey) -> bool {
        self.entities.contains_key(key)
    }

    /// Number of distinct entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Compare key sets with another source.
    pub fn compare(&self, other: &Self) -> ResolutionReport {
        let only_left: BTreeSet<MatchKey> = self
            .entities
            .keys()
            .filter(|k| !other.entities.contains_key(*k))
            .cloned()
            .collect();
        let only_right: BTreeSet<MatchKey> = other
            .entities
            .keys()
            .filter(|k| !self.entities.contains_key(*k))
            .cloned()
            .collect();
        let matched = self.entities.len() - only_left.len();

        if only_left.is_empty() && only_right.is_empty() {
            info!(left = %self.name, right = %other.name, matched, "entity key sets agree");
        } else {
            for key in &only_left {
                warn!(key = %key, source = %self.name, "entity missing from {}", other.name);
            }
            for key in &only_right {
                warn!(key = %key, source = %other.name, "entity missing from {}", self.name);
            }
        }

        ResolutionReport {
            left: self.name.clone(),
            right: other.name.clone(),
            matched,
            only_left,
            only_right,
        }
    }
}

/// Symmetric difference between two resolved sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionReport {
    /// Left source name
    pub left: String,
    /// Right source name
    pub right: String,
    /// Keys present in both sources
    pub matched: usize,
    /// Keys only in the left source
    pub only_left: BTreeSet<MatchKey>,
    /// Keys only in the right source
    pub only_right: BTreeSet<MatchKey>,
}

impl ResolutionReport {
    /// Whether both key sets are equal.
    pub fn is_complete(&self) -> bool {
        self.only_left.is_empty() && self.only_right.is_empty()
    }

    /// All keys in exactly one of the two sources.
    pub fn symmetric_difference(&self) -> impl Iterator<Item = &MatchKey> {
        self.only_left.iter().chain(self.only_right.iter())
    }

    /// Fail unless every unmatched key is in `whitelist`.
    pub fn ensure_complete(&self, whitelist: &BTreeSet<MatchKey>) -> Result<()> {
        let outside = |keys: &BTreeSet<MatchKey>| -> Vec<String> {
            keys.iter()
                .filter(|k| !whitelist.contains(*k))
                .map(ToString::to_string)
                .collect()
        };
        let only_left = outside(&self.only_left);
        let only_right = outside(&self.only_right);

        if only_left.is_empty() && only_right.is_empty() {
            Ok(())
        } else {
            Err(DataError::ResolutionMismatch {
                left: self.left.clone(),
                right: self.right.clone(),
                only_left,
                only_right,
            })
        }
    }
}
