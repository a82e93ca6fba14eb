//! Structural invariants of an assembled panel.

use crate::arena::Panel;
use crate::{PanelError, Result};
use tracing::debug;

impl Panel {
    /// Check the panel's structural invariants.
    ///
    /// * years of every entity are strictly increasing (no duplicate keys);
    /// * every column has one value per row;
    /// * every lag or lead equals its base column read from the same entity
    ///   at the recorded calendar offset (divided by its divisor for forward
    ///   ratios), and is missing where that row does not exist.
    ///
    /// A violation is an assembly bug and is returned as an error.
    pub fn verify(&self) -> Result<()> {
        for series in self.entities() {
            let entity = series.key().to_string();
            if let Some(w) = series.years().windows(2).find(|w| w[0] >= w[1]) {
                return Err(if w[0] == w[1] {
                    PanelError::DuplicateKey {
                        entity,
                        year: w[0],
                        context: "integrity check".to_string(),
                    }
                } else {
                    PanelError::UnsortedYears { entity }
                });
            }

            for name in self.column_names() {
                let values = series
                    .column(name)
                    .ok_or_else(|| PanelError::UnknownColumn(name.clone()))?;
                if values.len() != series.len() {
                    return Err(PanelError::LengthMismatch {
                        entity,
                        column: name.clone(),
                        expected: series.len(),
                        actual: values.len(),
                    });
                }
            }

            for temporal in self.temporal_columns() {
                let values = series
                    .column(&temporal.name)
                    .ok_or_else(|| PanelError::UnknownColumn(temporal.name.clone()))?;
                for (&year, &value) in series.years().iter().zip(values) {
                    let expected = temporal.expected(series, year);
                    if !same(value, expected) {
                        return Err(PanelError::TemporalLeak {
                            entity,
                            year,
                            column: temporal.name.clone(),
                            base: temporal.base.clone(),
                        });
                    }
                }
            }
        }
        debug!(
            entities = self.entity_count(),
            temporal_columns = self.temporal_columns().len(),
            "panel integrity verified"
        );
        Ok(())
    }
}

fn same(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => x.to_bits() == y.to_bits(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{EntityKey, EntitySeries};
    use munipanel_data::State;

    fn two_entities() -> Panel {
        let mut panel = Panel::new();
        for (code, values) in [("100001", [1.0, 2.0, 3.0]), ("100002", [10.0, 20.0, 30.0])] {
            let mut series =
                EntitySeries::new(EntityKey::new(code, State::SP), "X", vec![2010, 2011, 2012]).unwrap();
            series.set_column("x", values.map(Some).to_vec()).unwrap();
            panel.insert(series).unwrap();
        }
        panel.register("x");
        panel
    }

    #[test]
    fn test_verify_accepts_derived_lags() {
        let mut panel = two_entities();
        panel.lag("x", 1).unwrap();
        panel.lead("x", 1).unwrap();
        panel.verify().unwrap();
    }

    #[test]
    fn test_verify_detects_leak() {
        let mut panel = two_entities();
        panel.lag("x", 1).unwrap();
        // Overwrite the lag with a globally shifted column, which crosses
        // the entity boundary in the second entity's first year.
        panel
            .derive("x_lag1", |series| {
                let first = series.key().code == "100002";
                let mut values = series.shifted("x", -1)?;
                if first {
                    values[0] = Some(3.0);
                }
                Ok(values)
            })
            .unwrap();
        let err = panel.verify().unwrap_err();
        assert!(matches!(
            err,
            PanelError::TemporalLeak { year: 2010, ref column, .. } if column == "x_lag1"
        ));
    }
}
