//! Automatic analysis of incoming measurements.
//!
//! `AnalysisEngine` is pure computation: it classifies a single measurement
//! against the threshold table and builds the records to persist, leaving
//! all persistence to the caller. That keeps the decision logic testable
//! without a database.

use chrono::Utc;
use tracing::warn;

use crate::models::{Alert, Analysis, Measurement, Person, Sensor};
use crate::thresholds::ThresholdTable;

/// Outcome of analyzing one measurement: always an analysis, plus an alert
/// when the value is out of range. Record ids are unassigned (zero) until
/// the store commits them.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub analysis: Analysis,
    pub alert: Option<Alert>,
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisEngine {
    thresholds: ThresholdTable,
}

impl AnalysisEngine {
    pub fn new(thresholds: ThresholdTable) -> Self {
        Self { thresholds }
    }

    /// Classify `measurement` for `patient` under the care of `clinician`.
    ///
    /// Never fails for a well-formed measurement. A sensor kind with no
    /// configured rule yields an analysis stating so and no alert.
    /// Values equal to the rule's min or max count as in range.
    pub fn analyze(
        &self,
        patient: &Person,
        clinician: &Person,
        sensor: &Sensor,
        measurement: &Measurement,
    ) -> Verdict {
        let now = Utc::now();
        let kind = sensor.kind;

        let rule = match self.thresholds.lookup(kind) {
            Some(rule) => rule,
            None => {
                warn!(
                    sensor_kind = kind.as_str(),
                    patient_id = patient.id,
                    "no threshold configured, analysis skipped"
                );
                return Verdict {
                    analysis: Analysis {
                        id: 0,
                        patient_id: patient.id,
                        clinician_id: clinician.id,
                        measurement_id: measurement.id,
                        verdict: format!(
                            "analysis skipped: no threshold configured for {} sensor",
                            kind.as_str()
                        ),
                        analyzed_at: now,
                    },
                    alert: None,
                };
            }
        };

        let anomalous = measurement.value < rule.min || measurement.value > rule.max;

        let verdict_text = if anomalous {
            format!(
                "anomaly detected: {} reading {} {} outside normal range [{}, {}]",
                kind.as_str(),
                measurement.value,
                kind.unit(),
                rule.min,
                rule.max
            )
        } else {
            format!(
                "{} reading {} {} is normal (range [{}, {}])",
                kind.as_str(),
                measurement.value,
                kind.unit(),
                rule.min,
                rule.max
            )
        };

        let alert = anomalous.then(|| {
            warn!(
                patient_id = patient.id,
                urgency = rule.urgency.as_str(),
                category = rule.category.as_str(),
                value = measurement.value,
                "raising alert"
            );
            Alert {
                id: 0,
                patient_id: patient.id,
                clinician_id: clinician.id,
                urgency: rule.urgency,
                category: rule.category,
                description: verdict_text.clone(),
                resolved: false,
                raised_at: now,
            }
        });

        Verdict {
            analysis: Analysis {
                id: 0,
                patient_id: patient.id,
                clinician_id: clinician.id,
                measurement_id: measurement.id,
                verdict: verdict_text,
                analyzed_at: now,
            },
            alert,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertCategory, PersonRole, SensorKind, Urgency};
    use crate::thresholds::ThresholdRule;

    fn patient() -> Person {
        Person {
            id: 1,
            role: PersonRole::Patient,
            full_name: "Ada Pruitt".into(),
            email: "ada@example.com".into(),
            specialty: None,
        }
    }

    fn clinician() -> Person {
        Person {
            id: 2,
            role: PersonRole::Clinician,
            full_name: "Dr. Theo Marsh".into(),
            email: "theo@example.com".into(),
            specialty: Some("Cardiology".into()),
        }
    }

    fn sensor(kind: SensorKind) -> Sensor {
        Sensor { id: 3, kind }
    }

    fn measurement(value: f64) -> Measurement {
        Measurement {
            id: 0,
            patient_id: 1,
            sensor_id: 3,
            clinician_id: 2,
            value,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn normal_temperature_yields_no_alert() {
        let engine = AnalysisEngine::default();
        let verdict = engine.analyze(
            &patient(),
            &clinician(),
            &sensor(SensorKind::Temperature),
            &measurement(36.8),
        );
        assert!(verdict.analysis.verdict.contains("normal"));
        assert!(verdict.alert.is_none());
    }

    #[test]
    fn low_temperature_raises_critical_alert() {
        let engine = AnalysisEngine::default();
        let verdict = engine.analyze(
            &patient(),
            &clinician(),
            &sensor(SensorKind::Temperature),
            &measurement(35.0),
        );
        assert!(verdict.analysis.verdict.contains("anomaly"));
        let alert = verdict.alert.expect("alert expected");
        assert_eq!(alert.urgency, Urgency::Critical);
        assert_eq!(alert.category, AlertCategory::AbnormalTemperature);
        assert_eq!(alert.description, verdict.analysis.verdict);
        assert!(!alert.resolved);
    }

    #[test]
    fn low_heart_rate_uses_rule_urgency() {
        let engine = AnalysisEngine::default();
        let verdict = engine.analyze(
            &patient(),
            &clinician(),
            &sensor(SensorKind::HeartRate),
            &measurement(55.0),
        );
        let alert = verdict.alert.expect("alert expected");
        assert_eq!(alert.urgency, Urgency::Medium);
        assert_eq!(alert.category, AlertCategory::AbnormalHeartRate);
    }

    #[test]
    fn values_on_the_boundary_are_in_range() {
        let engine = AnalysisEngine::default();
        for value in [36.0, 37.5] {
            let verdict = engine.analyze(
                &patient(),
                &clinician(),
                &sensor(SensorKind::Temperature),
                &measurement(value),
            );
            assert!(verdict.alert.is_none(), "value {value} should be in range");
            assert!(verdict.analysis.verdict.contains("normal"));
        }
    }

    #[test]
    fn alert_iff_strictly_outside_range() {
        let engine = AnalysisEngine::default();
        for (value, expect_alert) in [
            (35.99, true),
            (36.0, false),
            (36.8, false),
            (37.5, false),
            (37.51, true),
        ] {
            let verdict = engine.analyze(
                &patient(),
                &clinician(),
                &sensor(SensorKind::Temperature),
                &measurement(value),
            );
            assert_eq!(verdict.alert.is_some(), expect_alert, "value {value}");
        }
    }

    #[test]
    fn unconfigured_kind_skips_analysis_without_alert() {
        let engine = AnalysisEngine::new(ThresholdTable::from_rules([(
            SensorKind::Temperature,
            ThresholdRule {
                min: 36.0,
                max: 37.5,
                urgency: Urgency::Critical,
                category: AlertCategory::AbnormalTemperature,
            },
        )]));
        let verdict = engine.analyze(
            &patient(),
            &clinician(),
            &sensor(SensorKind::HeartRate),
            &measurement(250.0),
        );
        assert!(verdict.analysis.verdict.contains("no threshold configured"));
        assert!(verdict.alert.is_none());
    }
}
