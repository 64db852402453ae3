//! Verzoegerungsleitung gegen lokales Echo
//!
//! Sendet die eigene Station, kommt ihr Signal nach kurzer Zeit ueber
//! das Relais zurueck. Die Delay-Line haelt jeden Chunk fuer ein festes
//! Fenster (Standard 500 ms) zurueck. Ist beim Freigeben das Flag
//! "lokal sendend" gesetzt, wird der Chunk still verworfen. Massgeblich
//! ist der Zustand beim Freigeben, nicht beim Empfang.

use std::collections::VecDeque;
use std::time::Duration;

use crate::pcm::SampleChunk;

/// Standard-Verzoegerung
pub const STANDARD_ECHO_DELAY: Duration = Duration::from_millis(500);

/// Ein zurueckgehaltener Chunk mit Empfangszeitpunkt
#[derive(Debug, Clone)]
pub struct DelayedChunk {
    pub daten: SampleChunk,
    pub empfangen: Duration,
}

/// Ergebnis eines Freigabe-Durchlaufs
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainErgebnis {
    /// An den Jitter Buffer weitergereichte Chunks
    pub freigegeben: usize,
    /// Wegen lokaler Sendung verworfene Chunks
    pub unterdrueckt: usize,
}

/// FIFO mit fester Verzoegerung
pub struct EchoDelayLine {
    fifo: VecDeque<DelayedChunk>,
    delay: Duration,
    enabled: bool,
}

impl EchoDelayLine {
    pub fn new(delay: Duration) -> Self {
        Self {
            fifo: VecDeque::new(),
            delay,
            enabled: false,
        }
    }

    /// Aktiviert oder deaktiviert die Verzoegerung
    ///
    /// Beim Deaktivieren wird der FIFO sofort geleert.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.fifo.clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Haelt einen Chunk zurueck
    pub fn push(&mut self, daten: SampleChunk, jetzt: Duration) {
        self.fifo.push_back(DelayedChunk {
            daten,
            empfangen: jetzt,
        });
    }

    /// Gibt alle Chunks frei, deren Alter die Verzoegerung erreicht hat
    ///
    /// Bricht beim ersten zu jungen Chunk ab. Bei `unterdruecken` werden
    /// faellige Chunks verworfen statt an `senke` uebergeben.
    pub fn drain_ready<F>(&mut self, jetzt: Duration, unterdruecken: bool, mut senke: F) -> DrainErgebnis
    where
        F: FnMut(SampleChunk),
    {
        let mut ergebnis = DrainErgebnis::default();

        while let Some(kopf) = self.fifo.front() {
            if jetzt.saturating_sub(kopf.empfangen) < self.delay {
                break;
            }
            let Some(faellig) = self.fifo.pop_front() else {
                break;
            };
            if unterdruecken {
                ergebnis.unterdrueckt += 1;
            } else {
                ergebnis.freigegeben += 1;
                senke(faellig.daten);
            }
        }

        ergebnis
    }

    /// Gibt zurueck ob Chunks warten (Tick muss laufen)
    pub fn is_pending(&self) -> bool {
        !self.fifo.is_empty()
    }

    /// Anzahl wartender Chunks
    pub fn len(&self) -> usize {
        self.fifo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty()
    }

    /// Verwirft alle wartenden Chunks
    pub fn clear(&mut self) {
        self.fifo.clear();
    }
}

impl Default for EchoDelayLine {
    fn default() -> Self {
        Self::new(STANDARD_ECHO_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn chunk(wert: f32) -> SampleChunk {
        SampleChunk::new(vec![wert; 4])
    }

    #[test]
    fn nicht_vor_ablauf_freigegeben() {
        let mut dl = EchoDelayLine::default();
        dl.set_enabled(true);
        dl.push(chunk(1.0), ms(0));

        let mut raus = Vec::new();
        let e = dl.drain_ready(ms(499), false, |c| raus.push(c));
        assert_eq!(e.freigegeben, 0);
        assert!(raus.is_empty());
        assert!(dl.is_pending());

        let e = dl.drain_ready(ms(500), false, |c| raus.push(c));
        assert_eq!(e.freigegeben, 1);
        assert_eq!(raus.len(), 1);
        assert!(!dl.is_pending());
    }

    #[test]
    fn stoppt_beim_ersten_jungen_chunk() {
        let mut dl = EchoDelayLine::default();
        dl.set_enabled(true);
        dl.push(chunk(1.0), ms(0));
        dl.push(chunk(2.0), ms(100));
        dl.push(chunk(3.0), ms(300));

        let mut raus = Vec::new();
        dl.drain_ready(ms(650), false, |c| raus.push(c.samples()[0]));
        assert_eq!(raus, vec![1.0, 2.0]);
        assert_eq!(dl.len(), 1);
    }

    #[test]
    fn nie_doppelt_freigegeben() {
        let mut dl = EchoDelayLine::default();
        dl.set_enabled(true);
        dl.push(chunk(1.0), ms(0));

        let mut anzahl = 0;
        dl.drain_ready(ms(600), false, |_| anzahl += 1);
        dl.drain_ready(ms(700), false, |_| anzahl += 1);
        dl.drain_ready(ms(5000), false, |_| anzahl += 1);
        assert_eq!(anzahl, 1);
    }

    #[test]
    fn flag_beim_freigeben_massgeblich() {
        let mut dl = EchoDelayLine::default();
        dl.set_enabled(true);
        dl.push(chunk(1.0), ms(0));
        dl.push(chunk(2.0), ms(200));

        let mut raus = Vec::new();
        // Erster Chunk faellig waehrend lokal gesendet wird
        let e = dl.drain_ready(ms(550), true, |c| raus.push(c));
        assert_eq!(e.unterdrueckt, 1);
        assert!(raus.is_empty());

        // Sendung beendet, zweiter Chunk wird normal freigegeben
        let e = dl.drain_ready(ms(700), false, |c| raus.push(c));
        assert_eq!(e.freigegeben, 1);
        assert_eq!(raus.len(), 1);
    }

    #[test]
    fn deaktivieren_leert_fifo() {
        let mut dl = EchoDelayLine::default();
        dl.set_enabled(true);
        dl.push(chunk(1.0), ms(0));
        dl.push(chunk(2.0), ms(10));
        dl.set_enabled(false);
        assert!(!dl.is_pending());
        assert!(!dl.is_enabled());
    }
}
