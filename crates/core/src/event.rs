//! Ereignisse des Audio-Players
//!
//! Der Player meldet Zustandswechsel und Rohdaten ueber diese Ereignisse
//! an beliebig viele Abonnenten (UI, Transkription, Logging). Die
//! Zustellung selbst erfolgt ueber den Event-Hub im Audio-Crate.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Wiedergabe-Phase waehrend einer bestehenden Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPhase {
    /// Jitter Buffer fuellt sich, noch keine Ausgabe
    Buffering,
    /// Audio wird auf die Ausgabe-Uhr geplant
    Playing,
}

/// Alle Ereignisse, die der Audio-Player nach aussen meldet
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Verbindungsstatus hat sich geaendert (true = verbunden)
    Status(bool),
    /// Wiedergabe-Phase hat gewechselt
    Phase(PlaybackPhase),
    /// Ein Roh-Frame (16-bit PCM, little-endian) wurde empfangen.
    /// Wird unabhaengig von der Wiedergabe gemeldet, z.B. fuer Transkription.
    Pcm(Bytes),
    /// Die Latenzgrenze wurde ueberschritten und alte Samples verworfen
    LatencyTrimmed {
        /// Anzahl verworfener Samples
        dropped_samples: usize,
    },
}

impl PlayerEvent {
    /// Gibt true zurueck fuer Ereignisse, die pro Frame auftreten
    pub fn ist_hochfrequent(&self) -> bool {
        matches!(self, Self::Pcm(_) | Self::LatencyTrimmed { .. })
    }
}
