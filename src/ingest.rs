//! Ingestion pipeline: payload validation, reference resolution, automatic
//! analysis and the atomic commit of the resulting unit.
//!
//! One `ingest` call either commits the full measurement/analysis/alert
//! unit or leaves the store untouched. Batch ingestion is best-effort
//! across elements: one bad payload never sinks its neighbours.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::analysis::AnalysisEngine;
use crate::error::IngestError;
use crate::models::Measurement;
use crate::store::MeasurementStore;

/// Raw measurement payload as delivered by the transport layer. All fields
/// are optional at the type level so that presence is checked here, with
/// field-level errors, rather than during deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeasurementPayload {
    pub patient_id: Option<i64>,
    pub sensor_id: Option<i64>,
    pub clinician_id: Option<i64>,
    pub value: Option<Value>,
    pub timestamp: Option<String>,
}

/// Outcome of a batch ingestion: committed measurements plus per-index
/// failures. Never aborts on a single bad element.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub committed: Vec<Measurement>,
    pub failures: Vec<BatchFailure>,
}

#[derive(Debug)]
pub struct BatchFailure {
    pub index: usize,
    pub error: IngestError,
}

pub struct IngestionPipeline {
    store: MeasurementStore,
    engine: AnalysisEngine,
}

fn required<T: Copy>(field: Option<T>, name: &'static str) -> Result<T, IngestError> {
    field.ok_or(IngestError::MissingField(name))
}

fn numeric_value(raw: &Value) -> Result<f64, IngestError> {
    let value = raw.as_f64().ok_or_else(|| IngestError::InvalidValue {
        field: "value",
        reason: format!("expected a number, got {raw}"),
    })?;
    if !value.is_finite() {
        return Err(IngestError::InvalidValue {
            field: "value",
            reason: format!("value {value} is not finite"),
        });
    }
    Ok(value)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, IngestError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| IngestError::InvalidValue {
            field: "timestamp",
            reason: format!("not an ISO-8601 timestamp: {e}"),
        })
}

impl IngestionPipeline {
    pub fn new(store: MeasurementStore, engine: AnalysisEngine) -> Self {
        Self { store, engine }
    }

    pub fn store(&self) -> &MeasurementStore {
        &self.store
    }

    /// Ingest one payload: validate, resolve references, analyze and
    /// commit measurement + analysis + optional alert atomically. Returns
    /// the committed measurement with its assigned id.
    #[instrument(skip(self, payload))]
    pub async fn ingest(&self, payload: &MeasurementPayload) -> Result<Measurement, IngestError> {
        let patient_id = required(payload.patient_id, "patient_id")?;
        let sensor_id = required(payload.sensor_id, "sensor_id")?;
        let clinician_id = required(payload.clinician_id, "clinician_id")?;
        let raw_value = payload
            .value
            .as_ref()
            .filter(|v| !v.is_null())
            .ok_or(IngestError::MissingField("value"))?;
        let value = numeric_value(raw_value)?;

        let recorded_at = match payload.timestamp.as_deref() {
            Some(raw) => parse_timestamp(raw)?,
            None => Utc::now(),
        };

        let patient =
            self.store
                .patient(patient_id)
                .await?
                .ok_or(IngestError::ReferenceNotFound {
                    entity: "patient",
                    id: patient_id,
                })?;
        let sensor =
            self.store
                .sensor(sensor_id)
                .await?
                .ok_or(IngestError::ReferenceNotFound {
                    entity: "sensor",
                    id: sensor_id,
                })?;
        let clinician =
            self.store
                .clinician(clinician_id)
                .await?
                .ok_or(IngestError::ReferenceNotFound {
                    entity: "clinician",
                    id: clinician_id,
                })?;

        let measurement = Measurement {
            id: 0,
            patient_id: patient.id,
            sensor_id: sensor.id,
            clinician_id: clinician.id,
            value,
            recorded_at,
        };

        let verdict = self
            .engine
            .analyze(&patient, &clinician, &sensor, &measurement);

        let (measurement, _analysis, alert) = self
            .store
            .commit(measurement, verdict.analysis, verdict.alert)
            .await?;

        info!(
            measurement_id = measurement.id,
            patient_id = patient.id,
            alerted = alert.is_some(),
            "measurement ingested"
        );
        Ok(measurement)
    }

    /// Ingest a batch of payloads independently. Failed elements are
    /// reported with their index and skipped; the rest are committed.
    #[instrument(skip(self, payloads), fields(batch_size = payloads.len()))]
    pub async fn ingest_batch(&self, payloads: &[MeasurementPayload]) -> BatchReport {
        let mut report = BatchReport::default();
        for (index, payload) in payloads.iter().enumerate() {
            match self.ingest(payload).await {
                Ok(measurement) => report.committed.push(measurement),
                Err(error) => report.failures.push(BatchFailure { index, error }),
            }
        }
        info!(
            committed = report.committed.len(),
            failed = report.failures.len(),
            "batch ingestion finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_accepts_integer_values() {
        let payload: MeasurementPayload =
            serde_json::from_str(r#"{"patient_id":1,"sensor_id":3,"clinician_id":2,"value":55}"#)
                .expect("payload should deserialize");
        let value = numeric_value(payload.value.as_ref().unwrap()).unwrap();
        assert_eq!(value, 55.0);
    }

    #[test]
    fn non_numeric_value_is_rejected() {
        let raw = serde_json::json!("high");
        let err = numeric_value(&raw).unwrap_err();
        assert!(matches!(
            err,
            IngestError::InvalidValue { field: "value", .. }
        ));
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert!(matches!(
            err,
            IngestError::InvalidValue {
                field: "timestamp",
                ..
            }
        ));
    }

    #[test]
    fn timestamp_parses_iso8601() {
        let dt = parse_timestamp("2026-08-30T12:34:56Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-08-30T12:34:56+00:00");
    }
}
