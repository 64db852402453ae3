//! Aufnahme des empfangenen Roh-Streams
//!
//! Der Recorder greift jeden Roh-Frame unabhaengig von Wiedergabe und
//! Verbindungszustand ab. `stop` liefert eine WAV-Datei (16-bit Mono)
//! oder `None`, wenn nichts aufgenommen wurde.

use bytes::Bytes;
use fmo_protocol::{encode_wav, PcmFrame};
use tracing::{debug, info};

use crate::error::AudioResult;

/// Sammelt Roh-Frames und exportiert sie als WAV
pub struct Recorder {
    sample_rate: u32,
    recording: bool,
    frames: Vec<Bytes>,
    bytes: usize,
}

impl Recorder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            recording: false,
            frames: Vec::new(),
            bytes: 0,
        }
    }

    /// Startet eine neue Aufnahme, vorherige Daten werden verworfen
    pub fn start(&mut self) {
        self.reset();
        self.recording = true;
        info!("Aufnahme gestartet");
    }

    /// Haengt einen Frame an, falls gerade aufgenommen wird
    pub fn append(&mut self, frame: &PcmFrame) {
        if !self.recording || frame.is_empty() {
            return;
        }
        self.bytes += frame.len();
        self.frames.push(frame.bytes());
    }

    /// Beendet die Aufnahme und liefert die WAV-Datei
    ///
    /// Der Puffer ist danach leer, auch wenn der Export fehlschlaegt.
    pub fn stop(&mut self) -> AudioResult<Option<Bytes>> {
        self.recording = false;
        let frames = std::mem::take(&mut self.frames);
        let bytes = std::mem::replace(&mut self.bytes, 0);

        let wav = encode_wav(frames, self.sample_rate)?;
        match &wav {
            Some(datei) => info!(pcm_bytes = bytes, wav_bytes = datei.len(), "Aufnahme beendet"),
            None => debug!("Aufnahme beendet, keine Daten"),
        }
        Ok(wav)
    }

    /// Verwirft aufgenommene Daten ohne Export
    pub fn reset(&mut self) {
        self.frames.clear();
        self.bytes = 0;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Bisher aufgenommene PCM-Bytes
    pub fn captured_bytes(&self) -> usize {
        self.bytes
    }
}
