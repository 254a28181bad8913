//! Domain records shared by the store, the analysis engine and the
//! ingestion pipeline.
//!
//! All records are plain rows correlated by integer foreign keys; nothing
//! owns anything else. Enums are stored as TEXT in SQLite, hence the
//! `as_str`/`parse_str` pairs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role tag for the unified people table. Patients, clinicians and
/// relatives share the same base fields and differ only by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonRole {
    Patient,
    Clinician,
    Relative,
}

impl PersonRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonRole::Patient => "patient",
            PersonRole::Clinician => "clinician",
            PersonRole::Relative => "relative",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "patient" => Some(PersonRole::Patient),
            "clinician" => Some(PersonRole::Clinician),
            "relative" => Some(PersonRole::Relative),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub role: PersonRole,
    pub full_name: String,
    pub email: String,
    pub specialty: Option<String>, // clinicians only
}

/// Closed set of sensor types; fixed at deploy time, not user-editable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Temperature,
    BloodPressure,
    HeartRate,
}

impl SensorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "temperature",
            SensorKind::BloodPressure => "blood_pressure",
            SensorKind::HeartRate => "heart_rate",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "temperature" => Some(SensorKind::Temperature),
            "blood_pressure" => Some(SensorKind::BloodPressure),
            "heart_rate" => Some(SensorKind::HeartRate),
            _ => None,
        }
    }

    /// Unit label used in verdict texts.
    pub fn unit(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "°C",
            SensorKind::BloodPressure => "mmHg",
            SensorKind::HeartRate => "bpm",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensor {
    pub id: i64,
    pub kind: SensorKind,
}

/// One timestamped physiological reading. Created only by the ingestion
/// pipeline; immutable afterwards except deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub id: i64,
    pub patient_id: i64,
    pub sensor_id: i64,
    pub clinician_id: i64,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

/// The automatically produced verdict for exactly one measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub id: i64,
    pub patient_id: i64,
    pub clinician_id: i64,
    pub measurement_id: i64,
    pub verdict: String,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::Critical => "critical",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Urgency::Low),
            "medium" => Some(Urgency::Medium),
            "critical" => Some(Urgency::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    AbnormalTemperature,
    AbnormalBloodPressure,
    AbnormalHeartRate,
}

impl AlertCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::AbnormalTemperature => "abnormal_temperature",
            AlertCategory::AbnormalBloodPressure => "abnormal_blood_pressure",
            AlertCategory::AbnormalHeartRate => "abnormal_heart_rate",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "abnormal_temperature" => Some(AlertCategory::AbnormalTemperature),
            "abnormal_blood_pressure" => Some(AlertCategory::AbnormalBloodPressure),
            "abnormal_heart_rate" => Some(AlertCategory::AbnormalHeartRate),
            _ => None,
        }
    }
}

/// Caregiver-facing flag raised when a measurement falls outside its
/// configured range. Resolved later, independently of the measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub patient_id: i64,
    pub clinician_id: i64,
    pub urgency: Urgency,
    pub category: AlertCategory,
    pub description: String,
    pub resolved: bool,
    pub raised_at: DateTime<Utc>,
}
