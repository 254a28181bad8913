//! Vigil remote-patient-monitoring core.
//!
//! Sensors push physiological readings; this crate validates them,
//! evaluates them against per-sensor clinical thresholds, records an
//! analysis for every reading and raises an alert for caregivers when a
//! value falls outside its safe range. Transport, auth and the HTTP
//! surface live outside this crate; they hand the pipeline a raw payload
//! and consume the committed records.

pub mod analysis;
pub mod error;
pub mod ingest;
pub mod models;
pub mod store;
pub mod thresholds;

/// Application configuration
pub mod config {
    /// Runtime settings, read from the environment (a `.env` file is
    /// honored when present).
    #[derive(Debug, Clone)]
    pub struct Settings {
        /// SQLite connection string, e.g. `sqlite://vigil.db`.
        pub database_url: String,
        /// Default `tracing` filter when RUST_LOG is unset.
        pub log_filter: String,
    }

    impl Settings {
        pub fn from_env() -> Self {
            dotenv::dotenv().ok();
            Self {
                database_url: std::env::var("VIGIL_DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://vigil.db".to_string()),
                log_filter: std::env::var("VIGIL_LOG").unwrap_or_else(|_| "info".to_string()),
            }
        }
    }
}
