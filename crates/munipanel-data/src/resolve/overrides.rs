//! Manual spelling corrections between municipality sources.
//!
//! Entries are matched against already-normalized names, so they use the
//! `#` separator for absorbed prepositions.

use crate::geo::State;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single exact-replacement rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameOverride {
    /// Normalized name to replace
    pub from: String,
    /// Replacement name
    pub to: String,
    /// Restrict the rule to one state (None = any state)
    pub state: Option<State>,
}

impl NameOverride {
    /// Create an unconditional rule.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            state: None,
        }
    }

    /// Create a rule that only applies within `state`.
    pub fn in_state(from: impl Into<String>, to: impl Into<String>, state: State) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            state: Some(state),
        }
    }
}

/// Known divergences between the population and GDP sources.
const BUILTIN: [(&str, &str, Option<State>); 11] = [
    ("DONA EUSEBIA", "DONA EUZEBIA", None),
    ("FLORINIA", "FLORINEA", None),
    ("GRACHO CARDOSO", "GRACCHO CARDOSO", None),
    ("ITAPAGE", "ITAPAJE", None),
    ("POXOREO", "POXOREU", None),
    ("SAO LUIS # PARAITINGA", "SAO LUIZ # PARAITINGA", None),
    ("SAO THOME # LETRAS", "SAO TOME # LETRAS", None),
    ("AUGUSTO SEVERO", "CAMPO GRANDE", None),
    ("FORTALEZA # TABOCAO", "TABOCAO", None),
    ("SANTA TEREZINHA", "SANTA TERESINHA", Some(State::PB)),
    ("SANTA TERESINHA", "SANTA TEREZINHA", Some(State::BA)),
];

/// Returns the built-in override rules.
pub fn builtin_overrides() -> Vec<NameOverride> {
    BUILTIN
        .iter()
        .map(|(from, to, state)| NameOverride {
            from: (*from).to_string(),
            to: (*to).to_string(),
            state: *state,
        })
        .collect()
}

/// Immutable lookup built once from a rule list.
///
/// State-conditioned rules win over unconditional ones for the same name.
/// Rules are applied once; a replacement is never re-matched.
#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    rules: HashMap<(String, Option<State>), String>,
}

impl OverrideTable {
    /// Build a table; later rules replace earlier ones with the same key.
    pub fn new(rules: impl IntoIterator<Item = NameOverride>) -> Self {
        let rules = rules
            .into_iter()
            .map(|r| ((r.from, r.state), r.to))
            .collect();
        Self { rules }
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply the table to a normalized name.
    pub fn apply<'a>(&'a self, name: &'a str, state: State) -> &'a str {
        self.rules
            .get(&(name.to_string(), Some(state)))
            .or_else(|| self.rules.get(&(name.to_string(), None)))
            .map_or(name, String::as_str)
    }
}
