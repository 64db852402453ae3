//! Fehlertypen fuer Gate und Session

use fmo_audio::AudioError;
use fmo_core::{ConnectionKind, FmoError, ReservationId};
use fmo_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    /// Kein freier Slot fuer diese Verbindungsart
    #[error("Kein freier Slot fuer {0}")]
    KeinSlot(ConnectionKind),

    #[error("Unbekannte oder abgelaufene Reservierung {0}")]
    UnbekannteReservierung(ReservationId),

    #[error("Ungueltige Adresse: {0}")]
    UngueltigeAdresse(String),

    #[error("WebSocket-Fehler: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Session ist beendet")]
    SessionBeendet,

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Protokoll(#[from] ProtocolError),
}

impl From<StreamError> for FmoError {
    fn from(e: StreamError) -> Self {
        match e {
            StreamError::KeinSlot(kind) => FmoError::NichtJetzt(kind.to_string()),
            StreamError::UnbekannteReservierung(id) => FmoError::NichtJetzt(id.to_string()),
            StreamError::UngueltigeAdresse(s) => FmoError::Konfiguration(s),
            StreamError::WebSocket(e) => FmoError::Verbindung(e.to_string()),
            StreamError::SessionBeendet => FmoError::Getrennt("Session beendet".into()),
            StreamError::Audio(e) => e.into(),
            StreamError::Protokoll(e) => e.into(),
        }
    }
}

pub type StreamResult<T> = Result<T, StreamError>;
