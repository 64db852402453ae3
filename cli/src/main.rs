//! fmo-listen – Einstiegspunkt
//!
//! Aufruf: `fmo-listen [host[:port]]`. Ohne Argument gilt `verbindung.host`
//! aus der Konfiguration.

use anyhow::Result;
use fmo_listen::{config::ClientConfig, logging::logging_initialisieren, Listener};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("FMO_CONFIG").unwrap_or_else(|_| "fmo.toml".into());

    let config = ClientConfig::laden(&config_pfad)?;
    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "FMO-Empfaenger wird initialisiert"
    );

    let host = std::env::args().nth(1);
    Listener::neu(config).starten(host).await
}
