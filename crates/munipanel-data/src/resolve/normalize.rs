//! Municipality name normalization.
//!
//! The pipeline is order-sensitive:
//! ```text
//! "São João d'Aliança (GO)"  strip parenthetical  -> "São João d'Aliança"
//!                            strip diacritics     -> "Sao Joao d'Alianca"
//!                            uppercase, collapse  -> "SAO JOAO D'ALIANCA"
//! "Embu-Guaçu"               hyphens to spaces    -> "EMBU GUACU"
//! "Santa Rita do Sapucaí"    prepositions to '#'  -> "SANTA RITA # SAPUCAI"
//! ```

use crate::{DataError, Result, geo::State};
use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Prepositions absorbed into the separator token.
pub const PREPOSITIONS: [&str; 5] = ["DO", "DA", "DE", "DOS", "DAS"];

/// Token that replaces an interior preposition.
pub const SEPARATOR: &str = "#";

/// Strip diacritics via canonical decomposition, dropping combining marks.
pub fn strip_diacritics(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Deterministic name normalizer.
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    parenthetical: Regex,
    state_suffix: Regex,
}

impl NameNormalizer {
    /// Compile the normalizer patterns.
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| DataError::Parse(format!("pattern {pattern}: {e}")))
        };
        Ok(Self {
            parenthetical: compile(r"\s*\(.*?\)\s*")?,
            state_suffix: compile(r"\((\w{2})\)")?,
        })
    }

    /// Normalize a raw municipality name into its canonical spelling.
    pub fn normalize(&self, raw: &str) -> String {
        let stripped = self.parenthetical.replace_all(raw, " ");
        let plain = strip_diacritics(&stripped).to_uppercase().replace('-', " ");

        let tokens: Vec<&str> = plain.split_whitespace().collect();
        let last = tokens.len().saturating_sub(1);
        tokens
            .iter()
            .enumerate()
            .map(|(i, token)| {
                if i > 0 && i < last && PREPOSITIONS.contains(token) {
                    SEPARATOR
                } else {
                    *token
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Extract the state from a `NAME (ST)` suffix.
    pub fn state_from_suffix(&self, raw: &str) -> Option<State> {
        self.state_suffix
            .captures_iter(raw)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| State::from_abbreviation(m.as_str()))
            .last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ALPHA", "ALPHA")]
    #[case("ALPHA (ST)", "ALPHA")]
    #[case("  Alpha   Beta ", "ALPHA BETA")]
    #[case("Embu-Guaçu (SP)", "EMBU GUACU")]
    #[case("Santa Rita do Sapucaí", "SANTA RITA # SAPUCAI")]
    #[case("Barra dos Coqueiros", "BARRA # COQUEIROS")]
    #[case("Dias d'Ávila", "DIAS D'AVILA")]
    #[case("São Luís de Montes Belos", "SAO LUIS # MONTES BELOS")]
    #[case("Lagoa Da Confusão", "LAGOA # CONFUSAO")]
    fn test_normalize(#[case] raw: &str, #[case] expected: &str) {
        let normalizer = NameNormalizer::new().unwrap();
        assert_eq!(normalizer.normalize(raw), expected);
    }

    #[test]
    fn test_leading_and_trailing_prepositions_kept() {
        let normalizer = NameNormalizer::new().unwrap();
        assert_eq!(normalizer.normalize("DE ALPHA DA"), "DE ALPHA DA");
    }

    #[test]
    fn test_strip_diacritics() {
        assert_eq!(strip_diacritics("Ceará Mirim ÇÃÕ"), "Ceara Mirim CAO");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let normalizer = NameNormalizer::new().unwrap();
        let once = normalizer.normalize("Fortaleza do Tabocão (TO)");
        assert_eq!(normalizer.normalize(&once), once);
    }

    #[rstest]
    #[case("Alpha (SP)", Some(State::SP))]
    #[case("Alpha (Velha) (BA)", Some(State::BA))]
    #[case("Alpha", None)]
    #[case("Alpha (ZZ)", None)]
    fn test_state_from_suffix(#[case] raw: &str, #[case] expected: Option<State>) {
        let normalizer = NameNormalizer::new().unwrap();
        assert_eq!(normalizer.state_from_suffix(raw), expected);
    }
}
