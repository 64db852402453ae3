//! Jitter Buffer mit Latenzgrenze
//!
//! Puffert dekodierte Chunks in Empfangsreihenfolge. Der Transport
//! (WebSocket ueber TCP) liefert bereits geordnet, deshalb gibt es hier
//! keine Sequenznummern. Stattdessen wird die Gesamtlatenz begrenzt:
//! laeuft der Buffer ueber `max_buffer_secs`, werden die aeltesten
//! Samples verworfen bis nur noch `target_lead_secs` uebrig sind.
//!
//! ## Invariante
//! `queued_samples == Summe der Chunk-Laengen` nach jeder Aenderung.

use std::collections::VecDeque;

use tracing::debug;

use crate::pcm::SampleChunk;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Latenzgrenzen des Jitter Buffers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyBound {
    /// Ab dieser gepufferten Dauer wird gekuerzt (Sekunden)
    pub max_buffer_secs: f64,
    /// Auf diese Dauer wird gekuerzt (Sekunden)
    pub target_lead_secs: f64,
    /// Abtastrate in Hz
    pub sample_rate: u32,
}

impl Default for LatencyBound {
    fn default() -> Self {
        Self {
            max_buffer_secs: 1.0,
            target_lead_secs: 0.5,
            sample_rate: 8000,
        }
    }
}

// ---------------------------------------------------------------------------
// JitterBuffer
// ---------------------------------------------------------------------------

/// Geordnete Warteschlange dekodierter Chunks
///
/// Nicht thread-safe, gehoert exklusiv dem `AudioPlayer`.
pub struct JitterBuffer {
    bound: LatencyBound,
    queue: VecDeque<SampleChunk>,
    queued_samples: usize,
}

impl JitterBuffer {
    pub fn new(bound: LatencyBound) -> Self {
        Self {
            bound,
            queue: VecDeque::new(),
            queued_samples: 0,
        }
    }

    /// Haengt einen Chunk an und erzwingt danach die Latenzgrenze
    ///
    /// Gibt die Anzahl der dabei verworfenen Samples zurueck.
    pub fn push(&mut self, chunk: SampleChunk) -> usize {
        if chunk.is_empty() {
            return 0;
        }
        self.queued_samples += chunk.len();
        self.queue.push_back(chunk);
        self.enforce_latency_bound()
    }

    /// Entnimmt den aeltesten Chunk
    pub fn pop_next(&mut self) -> Option<SampleChunk> {
        let chunk = self.queue.pop_front()?;
        self.queued_samples -= chunk.len();
        Some(chunk)
    }

    /// Entnimmt alle Chunks in FIFO-Reihenfolge
    pub fn pop_all(&mut self) -> Vec<SampleChunk> {
        self.queued_samples = 0;
        self.queue.drain(..).collect()
    }

    /// Verwirft den gesamten Inhalt
    pub fn clear(&mut self) {
        self.queue.clear();
        self.queued_samples = 0;
    }

    /// Kuerzt den Buffer am Kopf, falls die Maximallatenz ueberschritten ist
    ///
    /// Ganze Chunks fallen weg solange sie vollstaendig in den Ueberschuss
    /// passen; ein verbleibender Rest wird vom Kopf-Chunk abgeschnitten.
    /// Gibt die Anzahl verworfener Samples zurueck.
    pub fn enforce_latency_bound(&mut self) -> usize {
        if self.queued_secs() <= self.bound.max_buffer_secs {
            return 0;
        }

        let ziel = (self.bound.target_lead_secs * self.bound.sample_rate as f64).floor() as usize;
        let mut excess = self.queued_samples.saturating_sub(ziel);
        let mut verworfen = 0;

        while excess > 0 {
            let Some(kopf_len) = self.queue.front().map(SampleChunk::len) else {
                break;
            };

            if kopf_len <= excess {
                self.queue.pop_front();
                self.queued_samples -= kopf_len;
                excess -= kopf_len;
                verworfen += kopf_len;
            } else {
                if let Some(kopf) = self.queue.pop_front() {
                    let rest = kopf.into_tail(kopf_len - excess);
                    self.queue.push_front(rest);
                }
                self.queued_samples -= excess;
                verworfen += excess;
                excess = 0;
            }
        }

        debug!(
            verworfen,
            verbleibend = self.queued_samples,
            "Latenzgrenze ueberschritten, alte Samples verworfen"
        );
        verworfen
    }

    /// Anzahl gepufferter Samples
    pub fn queued_samples(&self) -> usize {
        self.queued_samples
    }

    /// Gepufferte Dauer in Sekunden
    pub fn queued_secs(&self) -> f64 {
        self.queued_samples as f64 / self.bound.sample_rate as f64
    }

    /// Anzahl gepufferter Chunks
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn bound(&self) -> &LatencyBound {
        &self.bound
    }

    /// Prueft die Zaehl-Invariante (fuer Tests und Debug-Assertions)
    pub fn zaehlung_konsistent(&self) -> bool {
        self.queued_samples == self.queue.iter().map(SampleChunk::len).sum::<usize>()
    }
}

impl Default for JitterBuffer {
    fn default() -> Self {
        Self::new(LatencyBound::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
