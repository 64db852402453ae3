//! Planer: legt gepufferte Chunks lueckenlos auf die Ausgabe-Zeitachse
//!
//! Zwei Phasen pro Verbindung:
//! - **Buffering**: Chunks sammeln sich, bis `min_start_secs` erreicht ist
//! - **Playing**: jeder Durchlauf fuellt den Vorlauf bis `target_lead_secs`
//!
//! Der Wechsel nach Playing passiert hoechstens einmal pro Verbindung;
//! bei Unterlauf bleibt der Planer in Playing und setzt das Planungsende
//! auf die aktuelle Zeit, sobald es in der Vergangenheit liegt.

use fmo_core::PlaybackPhase;
use tracing::{debug, warn};

use crate::analyser::SpectrumAnalyser;
use crate::jitter_buffer::JitterBuffer;
use crate::output::{AudioBlock, OutputClock};
use crate::pipeline::AudioPipeline;

/// Zeitparameter des Planers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// Mindestpuffer vor dem ersten Abspielen (Sekunden)
    pub min_start_secs: f64,
    /// Angestrebter Vorlauf vor der Ausgabe-Uhr (Sekunden)
    pub target_lead_secs: f64,
    /// Abtastrate in Hz
    pub sample_rate: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_start_secs: 0.1,
            target_lead_secs: 0.5,
            sample_rate: 8000,
        }
    }
}

/// Ergebnis eines Planungsdurchlaufs
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassErgebnis {
    /// Der Durchlauf hat von Buffering nach Playing gewechselt
    pub gestartet: bool,
    /// Anzahl geplanter Chunks
    pub geplant: usize,
}

/// Zustand des Planers
pub struct Scheduler {
    config: SchedulerConfig,
    phase: PlaybackPhase,
    /// Ende des zuletzt geplanten Blocks auf der Ausgabe-Zeitachse
    scheduled_end: f64,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            phase: PlaybackPhase::Buffering,
            scheduled_end: 0.0,
        }
    }

    /// Zurueck nach Buffering (Verbindungsaufbau oder Trennen)
    pub fn reset(&mut self) {
        self.phase = PlaybackPhase::Buffering;
        self.scheduled_end = 0.0;
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn scheduled_end(&self) -> f64 {
        self.scheduled_end
    }

    /// Fuehrt einen Planungsdurchlauf aus
    ///
    /// Ohne Ausgabe ist der Durchlauf wirkungslos; Chunks bleiben im
    /// Jitter Buffer (unter dessen Latenzgrenze). Die Analyse sieht jeden
    /// Block nach der Sprachkette.
    pub fn pass(
        &mut self,
        jitter: &mut JitterBuffer,
        output: Option<&mut (dyn OutputClock + 'static)>,
        pipeline: &mut AudioPipeline,
        mut analyse: Option<&mut SpectrumAnalyser>,
    ) -> PassErgebnis {
        let mut ergebnis = PassErgebnis::default();
        let Some(output) = output else {
            return ergebnis;
        };

        let jetzt = output.current_time();

        if self.phase == PlaybackPhase::Buffering {
            if jitter.queued_secs() < self.config.min_start_secs {
                return ergebnis;
            }
            self.phase = PlaybackPhase::Playing;
            self.scheduled_end = jetzt;
            ergebnis.gestartet = true;
            debug!(
                gepuffert_secs = jitter.queued_secs(),
                start = jetzt,
                "Mindestpuffer erreicht, Wiedergabe startet"
            );
        }

        // Veraltetes Planungsende auf jetzt ziehen
        if self.scheduled_end < jetzt {
            self.scheduled_end = jetzt;
        }

        while self.scheduled_end - jetzt < self.config.target_lead_secs {
            let Some(chunk) = jitter.pop_next() else {
                break;
            };
            let dauer = chunk.dauer_secs(self.config.sample_rate);
            let mut samples = chunk.into_samples();
            pipeline.process(&mut samples);
            if let Some(a) = analyse.as_mut() {
                a.einspeisen(&samples);
            }

            let block = AudioBlock::new(samples, self.config.sample_rate);
            if let Err(e) = output.schedule(block, self.scheduled_end) {
                warn!(fehler = %e, start = self.scheduled_end, "Block konnte nicht geplant werden");
            }
            self.scheduled_end += dauer;
            ergebnis.geplant += 1;
        }

        ergebnis
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::output::{HeadlessOutput, ScheduleLog};
    use crate::pcm::SampleChunk;
    use std::sync::Arc;
    use std::time::Duration;

    struct Aufbau {
        uhr: ManualClock,
        log: ScheduleLog,
        output: HeadlessOutput,
        jitter: JitterBuffer,
        pipeline: AudioPipeline,
        scheduler: Scheduler,
    }

    fn aufbau() -> Aufbau {
        let uhr = ManualClock::new();
        let log = ScheduleLog::new();
        let output = HeadlessOutput::new(Arc::new(uhr.clone())).mit_log(log.clone());
        Aufbau {
            uhr,
            log,
            output,
            jitter: JitterBuffer::default(),
            pipeline: AudioPipeline::empty(),
            scheduler: Scheduler::default(),
        }
    }

    impl Aufbau {
        fn pass(&mut self) -> PassErgebnis {
            self.scheduler.pass(
                &mut self.jitter,
                Some(&mut self.output),
                &mut self.pipeline,
                None,
            )
        }
    }

    #[test]
    fn ohne_ausgabe_wirkungslos() {
        let mut a = aufbau();
        a.jitter.push(SampleChunk::stille(4000));
        let e = a
            .scheduler
            .pass(&mut a.jitter, None, &mut a.pipeline, None);
        assert_eq!(e, PassErgebnis::default());
        assert_eq!(a.scheduler.phase(), PlaybackPhase::Buffering);
        assert_eq!(a.jitter.queued_samples(), 4000);
    }

    #[test]
    fn wartet_auf_mindestpuffer() {
        let mut a = aufbau();
        a.jitter.push(SampleChunk::stille(400));
        assert!(!a.pass().gestartet);
        assert_eq!(a.scheduler.phase(), PlaybackPhase::Buffering);

        a.jitter.push(SampleChunk::stille(400));
        let e = a.pass();
        assert!(e.gestartet);
        assert_eq!(e.geplant, 2);
        assert_eq!(a.scheduler.phase(), PlaybackPhase::Playing);
    }

    #[test]
    fn vorlauf_begrenzt() {
        let mut a = aufbau();
        for _ in 0..8 {
            a.jitter.push(SampleChunk::stille(800));
        }
        let e = a.pass();
        // 5 Chunks = 0.5 s Vorlauf
        assert_eq!(e.geplant, 5);
        assert_eq!(a.jitter.len(), 3);
        assert!((a.scheduler.scheduled_end() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn lueckenlos_und_monoton() {
        let mut a = aufbau();
        for _ in 0..3 {
            a.jitter.push(SampleChunk::stille(800));
        }
        a.pass();
        a.uhr.advance(Duration::from_millis(150));
        a.jitter.push(SampleChunk::stille(800));
        a.pass();

        let eintraege = a.log.eintraege();
        assert_eq!(eintraege.len(), 4);
        for w in eintraege.windows(2) {
            assert!((w[1].start - w[0].ende()).abs() < 1e-9);
        }
    }

    #[test]
    fn unterlauf_bleibt_playing_und_klemmt() {
        let mut a = aufbau();
        a.jitter.push(SampleChunk::stille(800));
        a.pass();
        assert_eq!(a.scheduler.phase(), PlaybackPhase::Playing);

        // Puffer leer, Uhr laeuft weit ueber das Planungsende
        a.uhr.advance(Duration::from_secs(2));
        a.pass();
        assert_eq!(a.scheduler.phase(), PlaybackPhase::Playing);

        a.jitter.push(SampleChunk::stille(80));
        let e = a.pass();
        assert!(!e.gestartet);
        assert_eq!(e.geplant, 1);
        let letzter = a.log.eintraege().pop().unwrap();
        assert!((letzter.start - 2.0).abs() < 1e-9);
        assert!(a.scheduler.scheduled_end() >= 2.0);
    }

    #[test]
    fn analyse_sieht_verarbeitete_bloecke() {
        let mut a = aufbau();
        a.pipeline = AudioPipeline::new(vec![Box::new(crate::dsp::gain::Gain::new(0.5))]);
        a.output.set_gain(2.0);
        let mut analyse = SpectrumAnalyser::new();
        a.jitter.push(SampleChunk::new(vec![0.8; 800]));

        let e = a.scheduler.pass(
            &mut a.jitter,
            Some(&mut a.output),
            &mut a.pipeline,
            Some(&mut analyse),
        );
        assert_eq!(e.geplant, 1);
        let welle = analyse.wellenform();
        // Nach der Sprachkette, vor der Lautstaerke
        assert!(welle[welle.len() - 800..]
            .iter()
            .all(|s| (s - 0.4).abs() < 1e-6));
        assert!(welle[..welle.len() - 800].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn reset_zurueck_auf_buffering() {
        let mut a = aufbau();
        a.jitter.push(SampleChunk::stille(800));
        a.pass();
        a.scheduler.reset();
        assert_eq!(a.scheduler.phase(), PlaybackPhase::Buffering);
        assert_eq!(a.scheduler.scheduled_end(), 0.0);
    }
}
