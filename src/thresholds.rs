//! Clinical threshold configuration per sensor kind.
//!
//! The table is immutable after construction. A kind with no rule is a
//! legal state: the analysis engine records that no threshold is
//! configured instead of failing the ingestion.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::models::{AlertCategory, SensorKind, Urgency};

/// Valid range plus the alert metadata to use on violation. Values equal
/// to `min` or `max` are in range; the anomaly test is `< min || > max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdRule {
    pub min: f64,
    pub max: f64,
    pub urgency: Urgency,
    pub category: AlertCategory,
}

static BUILTIN_RULES: Lazy<HashMap<SensorKind, ThresholdRule>> = Lazy::new(|| {
    HashMap::from([
        (
            SensorKind::Temperature,
            ThresholdRule {
                min: 36.0,
                max: 37.5,
                urgency: Urgency::Critical,
                category: AlertCategory::AbnormalTemperature,
            },
        ),
        (
            SensorKind::BloodPressure,
            ThresholdRule {
                min: 90.0,
                max: 140.0,
                urgency: Urgency::Critical,
                category: AlertCategory::AbnormalBloodPressure,
            },
        ),
        (
            SensorKind::HeartRate,
            ThresholdRule {
                min: 60.0,
                max: 100.0,
                urgency: Urgency::Medium,
                category: AlertCategory::AbnormalHeartRate,
            },
        ),
    ])
});

#[derive(Debug, Clone)]
pub struct ThresholdTable {
    rules: HashMap<SensorKind, ThresholdRule>,
}

impl ThresholdTable {
    /// Table with the built-in clinical defaults, covering every
    /// `SensorKind`.
    pub fn builtin() -> Self {
        Self {
            rules: BUILTIN_RULES.clone(),
        }
    }

    /// Table holding exactly the given rules. A partial table is valid;
    /// kinds without a rule degrade to an unconfigured analysis.
    pub fn from_rules<I>(rules: I) -> Self
    where
        I: IntoIterator<Item = (SensorKind, ThresholdRule)>,
    {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    pub fn lookup(&self, kind: SensorKind) -> Option<&ThresholdRule> {
        self.rules.get(&kind)
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_covers_every_kind() {
        let table = ThresholdTable::builtin();
        for kind in [
            SensorKind::Temperature,
            SensorKind::BloodPressure,
            SensorKind::HeartRate,
        ] {
            let rule = table.lookup(kind).expect("builtin rule missing");
            assert!(rule.min < rule.max);
        }
    }

    #[test]
    fn partial_table_returns_none_for_missing_kind() {
        let table = ThresholdTable::from_rules([(
            SensorKind::Temperature,
            ThresholdRule {
                min: 36.0,
                max: 37.5,
                urgency: Urgency::Critical,
                category: AlertCategory::AbnormalTemperature,
            },
        )]);
        assert!(table.lookup(SensorKind::HeartRate).is_none());
    }
}
