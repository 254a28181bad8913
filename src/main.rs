//! Vigil command-line entry point.
//!
//! Stands in for the excluded transport layer: payloads arrive as
//! newline-delimited JSON on stdin (an object for a single measurement, an
//! array for a batch) and committed measurements are echoed as JSON on
//! stdout. `seed` creates a small demo roster so the pipeline has
//! something to resolve against.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vigil::analysis::AnalysisEngine;
use vigil::config::Settings;
use vigil::ingest::{IngestionPipeline, MeasurementPayload};
use vigil::models::{PersonRole, SensorKind};
use vigil::store::MeasurementStore;
use vigil::thresholds::ThresholdTable;

#[derive(Parser)]
#[command(name = "vigil", about = "Remote patient monitoring ingestion core")]
struct Cli {
    /// Override VIGIL_DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read measurement payloads from stdin and run them through the
    /// ingestion pipeline.
    Ingest,
    /// Create a demo patient, clinician and one sensor of each kind.
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.clone())),
        )
        .init();

    let cli = Cli::parse();
    let database_url = cli.database_url.unwrap_or(settings.database_url);

    let store = MeasurementStore::connect(&database_url)
        .await
        .with_context(|| format!("failed to open store at {database_url}"))?;

    match cli.command {
        Commands::Seed => seed(&store).await,
        Commands::Ingest => {
            let pipeline =
                IngestionPipeline::new(store, AnalysisEngine::new(ThresholdTable::builtin()));
            ingest_stdin(&pipeline).await
        }
    }
}

async fn seed(store: &MeasurementStore) -> Result<()> {
    let patient = store
        .add_person(PersonRole::Patient, "Demo Patient", "patient@example.com", None)
        .await?;
    let clinician = store
        .add_person(
            PersonRole::Clinician,
            "Demo Clinician",
            "clinician@example.com",
            Some("General"),
        )
        .await?;
    for kind in [
        SensorKind::Temperature,
        SensorKind::BloodPressure,
        SensorKind::HeartRate,
    ] {
        let sensor = store.add_sensor(kind).await?;
        info!(sensor_id = sensor.id, kind = kind.as_str(), "sensor seeded");
    }
    info!(
        patient_id = patient.id,
        clinician_id = clinician.id,
        "demo roster seeded"
    );
    Ok(())
}

async fn ingest_stdin(pipeline: &IngestionPipeline) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('[') {
            let payloads: Vec<MeasurementPayload> =
                serde_json::from_str(line).context("malformed batch payload")?;
            let report = pipeline.ingest_batch(&payloads).await;
            for measurement in &report.committed {
                println!("{}", serde_json::to_string(measurement)?);
            }
            for failure in &report.failures {
                error!(index = failure.index, error = %failure.error, "payload rejected");
            }
        } else {
            let payload: MeasurementPayload =
                serde_json::from_str(line).context("malformed payload")?;
            match pipeline.ingest(&payload).await {
                Ok(measurement) => println!("{}", serde_json::to_string(&measurement)?),
                Err(e) => error!(error = %e, "payload rejected"),
            }
        }
    }
    Ok(())
}
