//! SQLite persistence boundary for measurements, analyses and alerts.
//!
//! The store owns schema bootstrap, entity resolution and the one write
//! path that matters: `commit`, which applies a measurement, its analysis
//! and an optional alert as a single transaction. Everything else is the
//! read side used by caregivers and maintenance.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{info, instrument};

use crate::models::{
    Alert, AlertCategory, Analysis, Measurement, Person, PersonRole, Sensor, SensorKind, Urgency,
};

/// Per-sensor aggregate over one patient's measurements.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SensorStats {
    pub sensor_kind: SensorKind,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: i64,
}

#[derive(Debug, Clone)]
pub struct MeasurementStore {
    pool: SqlitePool,
}

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn decode_err(msg: String) -> sqlx::Error {
    sqlx::Error::Decode(msg.into())
}

fn person_from_row(row: &SqliteRow) -> Result<Person, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(Person {
        id: row.try_get("id")?,
        role: PersonRole::parse_str(&role)
            .ok_or_else(|| decode_err(format!("unknown person role `{role}`")))?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        specialty: row.try_get("specialty")?,
    })
}

fn measurement_from_row(row: &SqliteRow) -> Result<Measurement, sqlx::Error> {
    Ok(Measurement {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        sensor_id: row.try_get("sensor_id")?,
        clinician_id: row.try_get("clinician_id")?,
        value: row.try_get("value")?,
        recorded_at: ts(row.try_get("recorded_at")?),
    })
}

fn analysis_from_row(row: &SqliteRow) -> Result<Analysis, sqlx::Error> {
    Ok(Analysis {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        clinician_id: row.try_get("clinician_id")?,
        measurement_id: row.try_get("measurement_id")?,
        verdict: row.try_get("verdict")?,
        analyzed_at: ts(row.try_get("analyzed_at")?),
    })
}

fn alert_from_row(row: &SqliteRow) -> Result<Alert, sqlx::Error> {
    let urgency: String = row.try_get("urgency")?;
    let category: String = row.try_get("category")?;
    Ok(Alert {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        clinician_id: row.try_get("clinician_id")?,
        urgency: Urgency::parse_str(&urgency)
            .ok_or_else(|| decode_err(format!("unknown urgency `{urgency}`")))?,
        category: AlertCategory::parse_str(&category)
            .ok_or_else(|| decode_err(format!("unknown alert category `{category}`")))?,
        description: row.try_get("description")?,
        resolved: row.try_get("resolved")?,
        raised_at: ts(row.try_get("raised_at")?),
    })
}

impl MeasurementStore {
    /// Open (creating if necessary) the database at `url` and bootstrap the
    /// schema. Foreign keys are enforced on every pooled connection.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::initialize_schema(&pool).await?;
        Ok(Self { pool })
    }

    async fn initialize_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        // Unified people table; patients, clinicians and relatives differ
        // only by role.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS persons (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                role TEXT NOT NULL,
                full_name TEXT NOT NULL,
                email TEXT NOT NULL,
                specialty TEXT
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sensors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS measurements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                patient_id INTEGER NOT NULL,
                sensor_id INTEGER NOT NULL,
                clinician_id INTEGER NOT NULL,
                value REAL NOT NULL,
                recorded_at INTEGER NOT NULL,
                FOREIGN KEY (patient_id) REFERENCES persons(id),
                FOREIGN KEY (sensor_id) REFERENCES sensors(id),
                FOREIGN KEY (clinician_id) REFERENCES persons(id)
            )",
        )
        .execute(pool)
        .await?;

        // No foreign key on measurement_id: measurements are deletable
        // independently of their analyses, orphans are tolerated.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS analyses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                patient_id INTEGER NOT NULL,
                clinician_id INTEGER NOT NULL,
                measurement_id INTEGER NOT NULL,
                verdict TEXT NOT NULL,
                analyzed_at INTEGER NOT NULL,
                FOREIGN KEY (patient_id) REFERENCES persons(id),
                FOREIGN KEY (clinician_id) REFERENCES persons(id)
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                patient_id INTEGER NOT NULL,
                clinician_id INTEGER NOT NULL,
                urgency TEXT NOT NULL,
                category TEXT NOT NULL,
                description TEXT NOT NULL,
                resolved INTEGER NOT NULL DEFAULT 0,
                raised_at INTEGER NOT NULL,
                FOREIGN KEY (patient_id) REFERENCES persons(id),
                FOREIGN KEY (clinician_id) REFERENCES persons(id)
            )",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    // ===== Entity resolution =====

    async fn person_with_role(
        &self,
        id: i64,
        role: PersonRole,
    ) -> Result<Option<Person>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM persons WHERE id = ? AND role = ?")
            .bind(id)
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(person_from_row).transpose()
    }

    pub async fn patient(&self, id: i64) -> Result<Option<Person>, sqlx::Error> {
        self.person_with_role(id, PersonRole::Patient).await
    }

    pub async fn clinician(&self, id: i64) -> Result<Option<Person>, sqlx::Error> {
        self.person_with_role(id, PersonRole::Clinician).await
    }

    pub async fn sensor(&self, id: i64) -> Result<Option<Sensor>, sqlx::Error> {
        let row = sqlx::query("SELECT id, kind FROM sensors WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            let kind: String = r.try_get("kind")?;
            Ok(Sensor {
                id: r.try_get("id")?,
                kind: SensorKind::parse_str(&kind)
                    .ok_or_else(|| decode_err(format!("unknown sensor kind `{kind}`")))?,
            })
        })
        .transpose()
    }

    // ===== Seeding =====

    pub async fn add_person(
        &self,
        role: PersonRole,
        full_name: &str,
        email: &str,
        specialty: Option<&str>,
    ) -> Result<Person, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO persons (role, full_name, email, specialty) VALUES (?, ?, ?, ?)",
        )
        .bind(role.as_str())
        .bind(full_name)
        .bind(email)
        .bind(specialty)
        .execute(&self.pool)
        .await?;
        Ok(Person {
            id: result.last_insert_rowid(),
            role,
            full_name: full_name.to_string(),
            email: email.to_string(),
            specialty: specialty.map(str::to_string),
        })
    }

    pub async fn add_sensor(&self, kind: SensorKind) -> Result<Sensor, sqlx::Error> {
        let result = sqlx::query("INSERT INTO sensors (kind) VALUES (?)")
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;
        Ok(Sensor {
            id: result.last_insert_rowid(),
            kind,
        })
    }

    // ===== Atomic ingestion commit =====

    /// Persist a measurement, its analysis and an optional alert as one
    /// transaction. On any failure the transaction is rolled back and no
    /// row of the unit is left behind. Returns the records with their
    /// assigned ids.
    #[instrument(skip(self, measurement, analysis, alert), fields(patient_id = measurement.patient_id))]
    pub async fn commit(
        &self,
        mut measurement: Measurement,
        mut analysis: Analysis,
        alert: Option<Alert>,
    ) -> Result<(Measurement, Analysis, Option<Alert>), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO measurements (patient_id, sensor_id, clinician_id, value, recorded_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(measurement.patient_id)
        .bind(measurement.sensor_id)
        .bind(measurement.clinician_id)
        .bind(measurement.value)
        .bind(measurement.recorded_at.timestamp())
        .execute(&mut *tx)
        .await?;
        measurement.id = result.last_insert_rowid();
        analysis.measurement_id = measurement.id;

        let result = sqlx::query(
            "INSERT INTO analyses (patient_id, clinician_id, measurement_id, verdict, analyzed_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(analysis.patient_id)
        .bind(analysis.clinician_id)
        .bind(analysis.measurement_id)
        .bind(&analysis.verdict)
        .bind(analysis.analyzed_at.timestamp())
        .execute(&mut *tx)
        .await?;
        analysis.id = result.last_insert_rowid();

        let alert = match alert {
            Some(mut alert) => {
                let result = sqlx::query(
                    "INSERT INTO alerts (patient_id, clinician_id, urgency, category,
                                         description, resolved, raised_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(alert.patient_id)
                .bind(alert.clinician_id)
                .bind(alert.urgency.as_str())
                .bind(alert.category.as_str())
                .bind(&alert.description)
                .bind(alert.resolved)
                .bind(alert.raised_at.timestamp())
                .execute(&mut *tx)
                .await?;
                alert.id = result.last_insert_rowid();
                Some(alert)
            }
            None => None,
        };

        tx.commit().await?;

        info!(
            measurement_id = measurement.id,
            analysis_id = analysis.id,
            alert_id = alert.as_ref().map(|a| a.id),
            "ingestion unit committed"
        );
        Ok((measurement, analysis, alert))
    }

    // ===== Measurements =====

    #[instrument(skip(self))]
    pub async fn measurements_for_patient(
        &self,
        patient_id: i64,
    ) -> Result<Vec<Measurement>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM measurements WHERE patient_id = ? ORDER BY recorded_at DESC, id DESC",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(measurement_from_row).collect()
    }

    pub async fn measurement(&self, id: i64) -> Result<Option<Measurement>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM measurements WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(measurement_from_row).transpose()
    }

    /// Delete one measurement. Its analysis is left in place; the relation
    /// tolerates orphaning.
    #[instrument(skip(self))]
    pub async fn delete_measurement(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM measurements WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Per-sensor min/max/mean over a patient's measurements.
    #[instrument(skip(self))]
    pub async fn patient_stats(&self, patient_id: i64) -> Result<Vec<SensorStats>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT s.kind AS kind,
                    MIN(m.value) AS min_value,
                    MAX(m.value) AS max_value,
                    AVG(m.value) AS mean_value,
                    COUNT(*) AS n
             FROM measurements m
             JOIN sensors s ON s.id = m.sensor_id
             WHERE m.patient_id = ?
             GROUP BY s.kind",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let kind: String = row.try_get("kind")?;
                Ok(SensorStats {
                    sensor_kind: SensorKind::parse_str(&kind)
                        .ok_or_else(|| decode_err(format!("unknown sensor kind `{kind}`")))?,
                    min: row.try_get("min_value")?,
                    max: row.try_get("max_value")?,
                    mean: row.try_get("mean_value")?,
                    count: row.try_get("n")?,
                })
            })
            .collect()
    }

    // ===== Analyses =====

    #[instrument(skip(self))]
    pub async fn analyses_for_patient(
        &self,
        patient_id: i64,
    ) -> Result<Vec<Analysis>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM analyses WHERE patient_id = ? ORDER BY analyzed_at DESC, id DESC",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(analysis_from_row).collect()
    }

    #[instrument(skip(self))]
    pub async fn analyses_for_clinician(
        &self,
        clinician_id: i64,
    ) -> Result<Vec<Analysis>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM analyses WHERE clinician_id = ? ORDER BY analyzed_at DESC, id DESC",
        )
        .bind(clinician_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(analysis_from_row).collect()
    }

    pub async fn analyses_for_measurement(
        &self,
        measurement_id: i64,
    ) -> Result<Vec<Analysis>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM analyses WHERE measurement_id = ? ORDER BY id")
            .bind(measurement_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(analysis_from_row).collect()
    }

    // ===== Alerts =====

    #[instrument(skip(self))]
    pub async fn alerts_for_patient(&self, patient_id: i64) -> Result<Vec<Alert>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM alerts WHERE patient_id = ? ORDER BY raised_at DESC, id DESC",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(alert_from_row).collect()
    }

    #[instrument(skip(self))]
    pub async fn unresolved_alerts(&self, patient_id: i64) -> Result<Vec<Alert>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM alerts WHERE patient_id = ? AND resolved = 0
             ORDER BY raised_at DESC, id DESC",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(alert_from_row).collect()
    }

    /// Mark an alert resolved (or reopen it). Returns false when no such
    /// alert exists.
    #[instrument(skip(self))]
    pub async fn resolve_alert(&self, alert_id: i64, resolved: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE alerts SET resolved = ? WHERE id = ?")
            .bind(resolved)
            .bind(alert_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
