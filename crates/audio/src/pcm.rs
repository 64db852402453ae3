//! PCM-Decoder und dekodierte Sample-Bloecke
//!
//! Wandelt einen Roh-Frame (i16, little-endian) in normalisierte
//! f32-Samples um. Ein `SampleChunk` wird nach der Erzeugung nie mehr
//! veraendert; Kuerzen erzeugt einen neuen Chunk, der Besitz wandert
//! beim Entnehmen weiter (Delay-Line -> Jitter Buffer -> Scheduler).

use fmo_protocol::PcmFrame;

/// Skalierung von i16 auf [-1, 1)
const PCM16_SKALA: f32 = 1.0 / 32768.0;

/// Unveraenderlicher Block dekodierter Mono-Samples
#[derive(Debug, Clone, PartialEq)]
pub struct SampleChunk {
    samples: Vec<f32>,
}

impl SampleChunk {
    /// Erstellt einen Chunk aus bereits normalisierten Samples
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    /// Chunk aus Stille
    pub fn stille(len: usize) -> Self {
        Self::new(vec![0.0; len])
    }

    /// Anzahl Samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Dauer in Sekunden bei gegebener Abtastrate
    pub fn dauer_secs(&self, sample_rate: u32) -> f64 {
        self.samples.len() as f64 / sample_rate as f64
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Gibt die Samples frei (Besitzuebergabe an die Ausgabe)
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Behaelt nur die letzten `behalten` Samples
    ///
    /// Wird von der Latenzbegrenzung genutzt: die aeltesten Samples am
    /// Anfang des Chunks fallen weg.
    pub fn into_tail(mut self, behalten: usize) -> Self {
        let start = self.samples.len().saturating_sub(behalten);
        Self::new(self.samples.split_off(start))
    }
}

/// Dekodiert einen 16-bit PCM-Frame in normalisierte Samples
///
/// Jeder Wert wird durch 32768 geteilt. Die Frame-Ausrichtung wurde
/// bereits beim Empfang geprueft (`PcmFrame::from_bytes`).
pub fn decode_pcm16(frame: &PcmFrame) -> SampleChunk {
    SampleChunk::new(frame.samples().map(|s| s as f32 * PCM16_SKALA).collect())
}
