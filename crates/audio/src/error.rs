//! Fehlertypen fuer die Audio-Engine

use thiserror::Error;

/// Alle moeglichen Fehler der Audio-Engine
///
/// Die Engine selbst bricht nie ab: Latenz-Ueberlauf, leere Aufnahmen und
/// eine noch nicht erzeugte Ausgabe sind keine Fehler. Fehler entstehen
/// nur beim Oeffnen einer Ausgabe oder beim Export.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Kein Standard-Ausgabegeraet verfuegbar")]
    KeinStandardAusgabegeraet,

    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Ausgabe noch nicht freigegeben")]
    AusgabeNichtFreigegeben,

    #[error("Export-Fehler: {0}")]
    Export(#[from] fmo_protocol::ProtocolError),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unerwarteter Fehler: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl From<AudioError> for fmo_core::FmoError {
    fn from(e: AudioError) -> Self {
        fmo_core::FmoError::Audio(e.to_string())
    }
}

pub type AudioResult<T> = Result<T, AudioError>;
