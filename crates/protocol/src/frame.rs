//! PCM-Frames des Audio-Kanals
//!
//! ## Nachrichtenformat (keine In-Band-Metadaten)
//!
//! ```text
//! Offset  Len  Beschreibung
//! ------  ---  -----------
//!  0       2   Sample 0 (i16, little-endian)
//!  2       2   Sample 1 (i16, little-endian)
//!  ...
//! 2n-2     2   Sample n-1
//! ```
//!
//! Frame-Grenzen sind Nachrichten-Grenzen des Transports. Die Abtastrate
//! ist fest (8000 Hz beim FMO), der Kanal ist mono.

use bytes::Bytes;

use crate::error::{ProtocolError, ProtocolResult};

/// Abtastrate des Relais in Hz
pub const STANDARD_SAMPLE_RATE: u32 = 8000;

/// Bytes pro Sample (16-bit PCM)
pub const BYTES_PRO_SAMPLE: usize = 2;

/// Ein validierter Roh-Frame wie er vom Transport empfangen wurde
///
/// Intern ein `Bytes`-Handle: Klonen ist billig, damit derselbe Frame
/// an Recorder, Roh-Frame-Abonnenten und Decoder verteilt werden kann.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmFrame {
    daten: Bytes,
}

impl PcmFrame {
    /// Validiert eine empfangene Nachricht
    ///
    /// # Fehler
    /// - `UngeradeFrameLaenge` wenn die Laenge nicht auf 16-bit ausgerichtet ist
    pub fn from_bytes(daten: impl Into<Bytes>) -> ProtocolResult<Self> {
        let daten = daten.into();
        if daten.len() % BYTES_PRO_SAMPLE != 0 {
            return Err(ProtocolError::UngeradeFrameLaenge(daten.len()));
        }
        Ok(Self { daten })
    }

    /// Baut einen Frame aus i16-Samples (Tests, Testsignale)
    pub fn from_samples(samples: &[i16]) -> Self {
        let mut daten = Vec::with_capacity(samples.len() * BYTES_PRO_SAMPLE);
        for s in samples {
            daten.extend_from_slice(&s.to_le_bytes());
        }
        Self {
            daten: Bytes::from(daten),
        }
    }

    /// Anzahl der Samples im Frame
    pub fn sample_count(&self) -> usize {
        self.daten.len() / BYTES_PRO_SAMPLE
    }

    /// Laenge in Bytes
    pub fn len(&self) -> usize {
        self.daten.len()
    }

    /// Gibt zurueck ob der Frame keine Samples enthaelt
    pub fn is_empty(&self) -> bool {
        self.daten.is_empty()
    }

    /// Roh-Bytes des Frames
    pub fn as_bytes(&self) -> &[u8] {
        &self.daten
    }

    /// Gibt das zugrundeliegende `Bytes`-Handle zurueck
    pub fn bytes(&self) -> Bytes {
        self.daten.clone()
    }

    /// Iteriert ueber die i16-Samples
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.daten
            .chunks_exact(BYTES_PRO_SAMPLE)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
    }

    /// Dauer des Frames bei gegebener Abtastrate
    pub fn dauer_secs(&self, sample_rate: u32) -> f64 {
        self.sample_count() as f64 / sample_rate as f64
    }
}

impl From<PcmFrame> for Bytes {
    fn from(frame: PcmFrame) -> Self {
        frame.daten
    }
}
