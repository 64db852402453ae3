//! Fehlertypen fuer Protokoll und Dateiformate

use thiserror::Error;

/// Fehler beim Validieren von Frames oder Parsen von Containern
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Frame-Laenge {0} ist kein Vielfaches von 2 Bytes")]
    UngeradeFrameLaenge(usize),

    #[error("WAV-Header zu kurz: {0} Bytes (erwartet 44)")]
    WavZuKurz(usize),

    #[error("Ungueltige WAV-Kennung bei Offset {offset}: erwartet {erwartet:?}")]
    WavKennung { offset: usize, erwartet: &'static str },

    #[error("Nicht unterstuetztes WAV-Format: {0}")]
    WavFormat(String),

    #[error("Aufnahme zu gross fuer WAV: {0} Bytes")]
    WavZuGross(usize),
}

impl From<ProtocolError> for fmo_core::FmoError {
    fn from(e: ProtocolError) -> Self {
        fmo_core::FmoError::UngueltigeNachricht(e.to_string())
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
