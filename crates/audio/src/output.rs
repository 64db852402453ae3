//! Ausgabe-Uhr und ihr Lebenszyklus
//!
//! Die Engine plant Bloecke gegen eine Ausgabe-Zeitachse (Sekunden). Die
//! Ausgabe ist eine einzelne, langlebige Ressource: sie wird erst bei der
//! Freigabe durch den Benutzer erzeugt (`OutputSlot::unlock`), bei jeder
//! Verbindung fortgesetzt, beim Trennen angehalten und erst beim
//! Beenden zerstoert. Vor der Erzeugung sind alle Aufrufe wirkungslos.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::analyser::SpectrumAnalyser;
use crate::clock::WallClock;
use crate::error::AudioResult;
use crate::volume::VolumeController;

// ---------------------------------------------------------------------------
// AudioBlock
// ---------------------------------------------------------------------------

/// Ein fertig verarbeiteter Block, bereit zur Ausgabe
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBlock {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Dauer in Sekunden
    pub fn dauer_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

// ---------------------------------------------------------------------------
// OutputClock
// ---------------------------------------------------------------------------

/// Abstraktion einer Audio-Ausgabe mit eigener Zeitachse
///
/// Geplante Bloecke werden in der Reihenfolge und zu den Startzeiten
/// abgespielt, zu denen sie uebergeben wurden.
pub trait OutputClock: Send {
    /// Aktuelle Position auf der Ausgabe-Zeitachse in Sekunden
    fn current_time(&self) -> f64;

    /// Plant einen Block ab `start` (Sekunden, Ausgabe-Zeitachse)
    fn schedule(&mut self, block: AudioBlock, start: f64) -> AudioResult<()>;

    /// Setzt die Ausgabe-Lautstaerke (0..2)
    fn set_gain(&mut self, gain: f32);

    /// Haelt die Ausgabe an, die Zeitachse steht still
    fn suspend(&mut self);

    /// Setzt die Ausgabe fort
    fn resume(&mut self);

    fn is_suspended(&self) -> bool;
}

/// Erzeugt die Ausgabe beim ersten `unlock`
pub type OutputFactory = Box<dyn FnMut() -> AudioResult<Box<dyn OutputClock>> + Send>;

// ---------------------------------------------------------------------------
// OutputSlot
// ---------------------------------------------------------------------------

/// Haelt hoechstens eine Ausgabe und verwaltet ihren Lebenszyklus
pub struct OutputSlot {
    factory: OutputFactory,
    output: Option<Box<dyn OutputClock>>,
    /// Lebt zusammen mit der Ausgabe
    analyse: Option<SpectrumAnalyser>,
    gain: f32,
}

impl OutputSlot {
    pub fn new(factory: OutputFactory) -> Self {
        Self {
            factory,
            output: None,
            analyse: None,
            gain: 1.0,
        }
    }

    /// Erzeugt die Ausgabe, falls noch nicht geschehen
    ///
    /// Entspricht der Freigabe durch den Benutzer. Wiederholte Aufrufe
    /// verwenden die bestehende Ausgabe weiter.
    pub fn unlock(&mut self) -> AudioResult<()> {
        if self.output.is_some() {
            return Ok(());
        }
        let mut output = (self.factory)()?;
        output.set_gain(self.gain);
        info!("Audio-Ausgabe erzeugt");
        self.output = Some(output);
        self.analyse = Some(SpectrumAnalyser::new());
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.output.is_some()
    }

    /// Zugriff auf die Ausgabe, falls sie existiert
    pub fn get_mut(&mut self) -> Option<&mut (dyn OutputClock + 'static)> {
        self.output.as_deref_mut()
    }

    /// Ausgabe und Analyse gemeinsam fuer einen Planungsdurchlauf
    pub fn ausgabe_und_analyse(
        &mut self,
    ) -> (
        Option<&mut (dyn OutputClock + 'static)>,
        Option<&mut SpectrumAnalyser>,
    ) {
        (self.output.as_deref_mut(), self.analyse.as_mut())
    }

    pub fn analyse_mut(&mut self) -> Option<&mut SpectrumAnalyser> {
        self.analyse.as_mut()
    }

    pub fn current_time(&self) -> Option<f64> {
        self.output.as_ref().map(|o| o.current_time())
    }

    pub fn resume(&mut self) {
        if let Some(o) = self.output.as_mut() {
            if o.is_suspended() {
                o.resume();
                debug!("Audio-Ausgabe fortgesetzt");
            }
        }
    }

    pub fn suspend(&mut self) {
        if let Some(o) = self.output.as_mut() {
            if !o.is_suspended() {
                o.suspend();
                debug!("Audio-Ausgabe angehalten");
            }
        }
    }

    /// Merkt sich die Lautstaerke und wendet sie sofort an
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
        if let Some(o) = self.output.as_mut() {
            o.set_gain(gain);
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Zerstoert die Ausgabe (nur beim Beenden)
    pub fn destroy(&mut self) {
        self.analyse = None;
        if let Some(mut o) = self.output.take() {
            o.suspend();
            info!("Audio-Ausgabe zerstoert");
        }
    }
}

// ---------------------------------------------------------------------------
// HeadlessOutput
// ---------------------------------------------------------------------------

/// Eintrag im Protokoll der Headless-Ausgabe
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledBlock {
    /// Startzeit auf der Ausgabe-Zeitachse
    pub start: f64,
    /// Dauer in Sekunden
    pub dauer: f64,
    /// Samples nach Anwendung der Lautstaerke
    pub samples: Vec<f32>,
}

impl ScheduledBlock {
    pub fn ende(&self) -> f64 {
        self.start + self.dauer
    }
}

/// Gemeinsam nutzbares Protokoll geplanter Bloecke
#[derive(Debug, Clone, Default)]
pub struct ScheduleLog {
    eintraege: Arc<Mutex<Vec<ScheduledBlock>>>,
}

impl ScheduleLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kopie aller bisherigen Eintraege
    pub fn eintraege(&self) -> Vec<ScheduledBlock> {
        self.eintraege.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.eintraege.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.eintraege.lock().is_empty()
    }

    /// Summe der geplanten Dauer in Sekunden
    pub fn gesamt_dauer(&self) -> f64 {
        self.eintraege.lock().iter().map(|e| e.dauer).sum()
    }

    fn push(&self, eintrag: ScheduledBlock) {
        self.eintraege.lock().push(eintrag);
    }
}

/// Ausgabe ohne Soundkarte
///
/// Die Zeitachse folgt der injizierten Wanduhr, laeuft aber nur solange
/// die Ausgabe nicht angehalten ist.
pub struct HeadlessOutput {
    uhr: Arc<dyn WallClock>,
    /// Bis zum letzten Anhalten aufgelaufene Zeit
    basis: Duration,
    /// Wanduhr-Zeitpunkt des letzten Fortsetzens, None = angehalten
    laeuft_seit: Option<Duration>,
    volume: VolumeController,
    log: Option<ScheduleLog>,
}

impl HeadlessOutput {
    pub fn new(uhr: Arc<dyn WallClock>) -> Self {
        let jetzt = uhr.now();
        Self {
            uhr,
            basis: Duration::ZERO,
            laeuft_seit: Some(jetzt),
            volume: VolumeController::default(),
            log: None,
        }
    }

    /// Protokolliert alle geplanten Bloecke in `log`
    pub fn mit_log(mut self, log: ScheduleLog) -> Self {
        self.log = Some(log);
        self
    }
}

impl OutputClock for HeadlessOutput {
    fn current_time(&self) -> f64 {
        let laufend = self
            .laeuft_seit
            .map(|seit| self.uhr.now().saturating_sub(seit))
            .unwrap_or_default();
        (self.basis + laufend).as_secs_f64()
    }

    fn schedule(&mut self, block: AudioBlock, start: f64) -> AudioResult<()> {
        let dauer = block.dauer_secs();
        let mut samples = block.samples;
        self.volume.apply(&mut samples);
        if let Some(log) = &self.log {
            log.push(ScheduledBlock {
                start,
                dauer,
                samples,
            });
        }
        Ok(())
    }

    fn set_gain(&mut self, gain: f32) {
        self.volume.set_volume_sofort(gain);
    }

    fn suspend(&mut self) {
        if let Some(seit) = self.laeuft_seit.take() {
            self.basis += self.uhr.now().saturating_sub(seit);
        }
    }

    fn resume(&mut self) {
        if self.laeuft_seit.is_none() {
            self.laeuft_seit = Some(self.uhr.now());
        }
    }

    fn is_suspended(&self) -> bool {
        self.laeuft_seit.is_none()
    }
}
