//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `FMO_LOG_LEVEL`: Log-Level oder Filter-Direktive, ueberschreibt die Datei
//! - `FMO_LOG_FORMAT`: Format (text/json), ueberschreibt die Datei

use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "FMO_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "FMO_LOG_FORMAT";

/// Initialisiert das Logging-System.
///
/// Umgebungsvariablen haben Vorrang vor den uebergebenen Werten,
/// bei ungueltigem Filter wird `info` verwendet.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env(ENV_LOG_LEVEL)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = std::env::var(ENV_LOG_FORMAT).unwrap_or_else(|_| format.to_string());

    match format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
