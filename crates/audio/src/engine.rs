//! AudioPlayer – Zentrale Steuerung der Wiedergabe
//!
//! Besitzt Jitter Buffer, Delay-Line, Planer, Sprachkette, Recorder,
//! Ausgabe und Event-Hub. Alle Aenderungen laufen ueber `&mut self` auf
//! einem einzigen logischen Thread (der Session-Task). Der Player startet
//! selbst keine Timer: er meldet ueber `rearm_armed` und
//! `delay_line_pending`, welche Ticks gerade laufen muessen, und der
//! Aufrufer ruft `on_rearm_tick` bzw. `on_delay_tick`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::Receiver;
use fmo_core::{PlaybackPhase, PlayerEvent};
use fmo_protocol::{PcmFrame, STANDARD_SAMPLE_RATE};
use tracing::{debug, info};

use crate::clock::WallClock;
use crate::echo_delay::{EchoDelayLine, STANDARD_ECHO_DELAY};
use crate::error::AudioResult;
use crate::events::EventHub;
use crate::jitter_buffer::{JitterBuffer, LatencyBound};
use crate::output::{OutputFactory, OutputSlot};
use crate::pcm::{decode_pcm16, SampleChunk};
use crate::pipeline::{build_voice_chain, AudioPipeline};
use crate::recorder::Recorder;
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::volume::clamp_volume;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Konfiguration des AudioPlayers
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    /// Abtastrate des Streams in Hz
    pub sample_rate: u32,
    /// Mindestpuffer vor dem ersten Abspielen (Sekunden)
    pub min_start_secs: f64,
    /// Angestrebter Vorlauf vor der Ausgabe-Uhr (Sekunden)
    pub target_lead_secs: f64,
    /// Ab dieser gepufferten Dauer wird gekuerzt (Sekunden)
    pub max_buffer_secs: f64,
    /// Verzoegerung der Echo-Unterdrueckung
    pub echo_delay: Duration,
    /// Abstand der Planungsdurchlaeufe waehrend einer Verbindung
    pub rearm_intervall: Duration,
    /// Abstand der Delay-Line-Ticks
    pub delay_tick: Duration,
    /// Anfangs-Lautstaerke (0..2)
    pub volume: f32,
    /// Echo-Unterdrueckung beim Start aktiv
    pub local_mute: bool,
    /// Sprachkette (Filter + Kompressor) aktiv
    pub voice_filter: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_rate: STANDARD_SAMPLE_RATE,
            min_start_secs: 0.1,
            target_lead_secs: 0.5,
            max_buffer_secs: 1.0,
            echo_delay: STANDARD_ECHO_DELAY,
            rearm_intervall: Duration::from_millis(60),
            delay_tick: Duration::from_millis(50),
            volume: 1.0,
            local_mute: false,
            voice_filter: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Zustand und Statistik
// ---------------------------------------------------------------------------

/// Zustand des Players
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Keine Verbindung, eingehende Frames werden nur abgegriffen
    Disconnected,
    /// Verbunden, Jitter Buffer fuellt sich
    Buffering,
    /// Verbunden, Audio wird geplant
    Playing,
}

impl PlayerState {
    pub fn ist_verbunden(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Buffering => "buffering",
            Self::Playing => "playing",
        };
        f.write_str(name)
    }
}

/// Statistiken des Players (Snapshot)
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStats {
    /// Empfangene Frames gesamt
    pub frames_empfangen: u64,
    /// Empfangene Samples gesamt
    pub samples_empfangen: u64,
    /// Durch die Latenzgrenze verworfene Samples
    pub samples_verworfen: u64,
    /// Durch lokale Sendung unterdrueckte Chunks
    pub chunks_unterdrueckt: u64,
    /// Auf die Ausgabe geplante Chunks
    pub chunks_geplant: u64,
    /// Aktuell im Jitter Buffer gepufferte Dauer
    pub gepuffert_secs: f64,
    /// Aktueller Zustand
    pub state: PlayerState,
    /// Laeuft gerade eine Aufnahme
    pub aufnahme: bool,
    /// Bisher aufgenommene PCM-Bytes
    pub aufnahme_bytes: usize,
    /// Aktive Stufen der Sprachkette
    pub filter_aktiv: usize,
    /// Wegen nicht lesender Abonnenten verworfene Ereignisse
    pub ereignisse_verworfen: u64,
}

#[derive(Debug, Default)]
struct Zaehler {
    frames_empfangen: u64,
    samples_empfangen: u64,
    samples_verworfen: u64,
    chunks_unterdrueckt: u64,
    chunks_geplant: u64,
}

// ---------------------------------------------------------------------------
// AudioPlayer
// ---------------------------------------------------------------------------

/// Wiedergabe-Engine fuer einen einzelnen PCM-Stream
pub struct AudioPlayer {
    config: PlayerConfig,
    state: PlayerState,
    uhr: Arc<dyn WallClock>,
    jitter: JitterBuffer,
    delay: EchoDelayLine,
    scheduler: Scheduler,
    pipeline: AudioPipeline,
    recorder: Recorder,
    output: OutputSlot,
    events: EventHub,
    lokal_sendend: bool,
    zaehler: Zaehler,
}

impl AudioPlayer {
    /// Erstellt einen Player, die Ausgabe wird erst bei `unlock` erzeugt
    pub fn new(config: PlayerConfig, factory: OutputFactory, uhr: Arc<dyn WallClock>) -> Self {
        let jitter = JitterBuffer::new(LatencyBound {
            max_buffer_secs: config.max_buffer_secs,
            target_lead_secs: config.target_lead_secs,
            sample_rate: config.sample_rate,
        });
        let scheduler = Scheduler::new(SchedulerConfig {
            min_start_secs: config.min_start_secs,
            target_lead_secs: config.target_lead_secs,
            sample_rate: config.sample_rate,
        });
        let mut pipeline = build_voice_chain(config.sample_rate);
        pipeline.set_all_enabled(config.voice_filter);

        let mut delay = EchoDelayLine::new(config.echo_delay);
        delay.set_enabled(config.local_mute);

        let mut output = OutputSlot::new(factory);
        output.set_gain(clamp_volume(config.volume));

        Self {
            recorder: Recorder::new(config.sample_rate),
            config,
            state: PlayerState::Disconnected,
            uhr,
            jitter,
            delay,
            scheduler,
            pipeline,
            output,
            events: EventHub::new(),
            lokal_sendend: false,
            zaehler: Zaehler::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Verbindungs-Lebenszyklus
    // -----------------------------------------------------------------------

    /// Erzeugt die Ausgabe (Freigabe durch den Benutzer)
    ///
    /// Ist bereits eine Verbindung aktiv, laeuft die Ausgabe sofort an.
    pub fn unlock(&mut self) -> AudioResult<()> {
        self.output.unlock()?;
        if self.state.ist_verbunden() {
            self.output.resume();
            self.pass();
        } else {
            self.output.suspend();
        }
        Ok(())
    }

    /// Die Transport-Verbindung steht
    pub fn on_connected(&mut self) {
        self.reset_puffer();
        self.pipeline.reset_all();
        self.output.resume();
        self.state = PlayerState::Buffering;
        info!(
            ausgabe_bereit = self.output.is_ready(),
            "Audio-Stream verbunden, puffere"
        );
        self.events.emit(PlayerEvent::Status(true));
        self.events.emit(PlayerEvent::Phase(PlaybackPhase::Buffering));
    }

    /// Die Transport-Verbindung ist weg (gewollt oder durch Fehler)
    ///
    /// Verwirft Jitter Buffer und Delay-Line, die Aufnahme laeuft weiter.
    pub fn on_disconnected(&mut self) {
        if !self.state.ist_verbunden() {
            return;
        }
        self.reset_puffer();
        self.output.suspend();
        self.state = PlayerState::Disconnected;
        info!("Audio-Stream getrennt");
        self.events.emit(PlayerEvent::Status(false));
    }

    /// Ein Verbindungsversuch ist gescheitert, bevor der Stream stand
    pub fn on_connect_failed(&mut self) {
        if self.state.ist_verbunden() {
            self.on_disconnected();
            return;
        }
        self.events.emit(PlayerEvent::Status(false));
    }

    /// Beendet den Player endgueltig und zerstoert die Ausgabe
    pub fn shutdown(&mut self) {
        self.on_disconnected();
        self.output.destroy();
    }

    fn reset_puffer(&mut self) {
        self.jitter.clear();
        self.delay.clear();
        self.scheduler.reset();
    }

    // -----------------------------------------------------------------------
    // Datenpfad
    // -----------------------------------------------------------------------

    /// Verarbeitet einen empfangenen Roh-Frame
    ///
    /// Recorder und Roh-Frame-Ereignis erhalten jeden Frame, die
    /// Wiedergabe nur waehrend einer Verbindung.
    pub fn on_frame(&mut self, frame: PcmFrame) {
        self.zaehler.frames_empfangen += 1;
        self.zaehler.samples_empfangen += frame.sample_count() as u64;

        self.recorder.append(&frame);
        self.events.emit(PlayerEvent::Pcm(frame.bytes()));

        if !self.state.ist_verbunden() || frame.is_empty() {
            return;
        }

        let chunk = decode_pcm16(&frame);
        if self.delay.is_enabled() {
            self.delay.push(chunk, self.uhr.now());
        } else {
            self.ingest(chunk);
        }
    }

    /// Periodischer Planungsdurchlauf (alle `rearm_intervall`)
    pub fn on_rearm_tick(&mut self) {
        if self.state.ist_verbunden() {
            self.pass();
        }
    }

    /// Periodische Freigabe der Delay-Line (alle `delay_tick`)
    pub fn on_delay_tick(&mut self) {
        let mut faellig = Vec::new();
        let ergebnis = self
            .delay
            .drain_ready(self.uhr.now(), self.lokal_sendend, |c| faellig.push(c));

        if ergebnis.unterdrueckt > 0 {
            self.zaehler.chunks_unterdrueckt += ergebnis.unterdrueckt as u64;
            debug!(
                unterdrueckt = ergebnis.unterdrueckt,
                "Eigene Aussendung unterdrueckt"
            );
        }
        for chunk in faellig {
            self.ingest(chunk);
        }
    }

    fn ingest(&mut self, chunk: SampleChunk) {
        let verworfen = self.jitter.push(chunk);
        if verworfen > 0 {
            self.zaehler.samples_verworfen += verworfen as u64;
            self.events.emit(PlayerEvent::LatencyTrimmed {
                dropped_samples: verworfen,
            });
        }
        self.pass();
    }

    fn pass(&mut self) {
        let (output, analyse) = self.output.ausgabe_und_analyse();
        let ergebnis = self
            .scheduler
            .pass(&mut self.jitter, output, &mut self.pipeline, analyse);
        self.zaehler.chunks_geplant += ergebnis.geplant as u64;

        if ergebnis.gestartet {
            self.state = PlayerState::Playing;
            info!("Wiedergabe gestartet");
            self.events.emit(PlayerEvent::Phase(PlaybackPhase::Playing));
        }
    }

    // -----------------------------------------------------------------------
    // Timer-Status
    // -----------------------------------------------------------------------

    /// Muss der Planungs-Tick laufen?
    pub fn rearm_armed(&self) -> bool {
        self.state.ist_verbunden()
    }

    /// Muss der Delay-Line-Tick laufen?
    pub fn delay_line_pending(&self) -> bool {
        self.delay.is_pending()
    }

    // -----------------------------------------------------------------------
    // Steuerung
    // -----------------------------------------------------------------------

    /// Setzt die Lautstaerke (0..2, nicht-endlich = 0)
    pub fn set_volume(&mut self, volume: f32) {
        let v = clamp_volume(volume);
        self.output.set_gain(v);
        debug!(volume = v, "Lautstaerke gesetzt");
    }

    pub fn volume(&self) -> f32 {
        self.output.gain()
    }

    /// Aktiviert die Echo-Unterdrueckung ueber die Delay-Line
    ///
    /// Beim Deaktivieren werden zurueckgehaltene Chunks verworfen.
    pub fn set_local_mute(&mut self, enabled: bool) {
        self.delay.set_enabled(enabled);
        debug!(enabled, "Echo-Unterdrueckung");
    }

    pub fn local_mute(&self) -> bool {
        self.delay.is_enabled()
    }

    /// Schaltet die Sprachkette (Filter + Kompressor) ein oder aus
    pub fn set_voice_filter(&mut self, enabled: bool) {
        if enabled && self.pipeline.aktive() == 0 {
            self.pipeline.reset_all();
        }
        self.pipeline.set_all_enabled(enabled);
        debug!(enabled, stufen = self.pipeline.aktive(), "Sprachkette");
    }

    pub fn voice_filter(&self) -> bool {
        self.pipeline.aktive() > 0
    }

    /// Meldet, ob die eigene Station gerade sendet
    pub fn set_local_transmission(&mut self, sendend: bool) {
        self.lokal_sendend = sendend;
    }

    pub fn start_recording(&mut self) {
        self.recorder.start();
    }

    /// Beendet die Aufnahme und liefert die WAV-Datei (None = leer)
    pub fn stop_recording(&mut self) -> AudioResult<Option<Bytes>> {
        self.recorder.stop()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    /// Neuer Abonnent fuer Player-Ereignisse
    pub fn subscribe(&mut self) -> Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn output_ready(&self) -> bool {
        self.output.is_ready()
    }

    /// Geglaettetes Betragsspektrum der Wiedergabe (512 Bins)
    ///
    /// `None` solange keine Ausgabe existiert.
    pub fn spectrum(&mut self) -> Option<Vec<f32>> {
        Some(self.output.analyse_mut()?.spektrum().to_vec())
    }

    /// Spektrum skaliert auf 0..255 fuer Visualisierungen
    pub fn spectrum_bytes(&mut self) -> Option<Vec<u8>> {
        Some(self.output.analyse_mut()?.spektrum_bytes())
    }

    /// Die zuletzt geplanten Samples (Analysefenster)
    pub fn waveform(&mut self) -> Option<Vec<f32>> {
        Some(self.output.analyse_mut()?.wellenform())
    }

    /// Gepufferte Samples im Jitter Buffer
    pub fn queued_samples(&self) -> usize {
        self.jitter.queued_samples()
    }

    /// Ende des zuletzt geplanten Blocks auf der Ausgabe-Zeitachse
    pub fn scheduled_end(&self) -> f64 {
        self.scheduler.scheduled_end()
    }

    pub fn stats(&self) -> PlayerStats {
        PlayerStats {
            frames_empfangen: self.zaehler.frames_empfangen,
            samples_empfangen: self.zaehler.samples_empfangen,
            samples_verworfen: self.zaehler.samples_verworfen,
            chunks_unterdrueckt: self.zaehler.chunks_unterdrueckt,
            chunks_geplant: self.zaehler.chunks_geplant,
            gepuffert_secs: self.jitter.queued_secs(),
            state: self.state,
            aufnahme: self.recorder.is_recording(),
            aufnahme_bytes: self.recorder.captured_bytes(),
            filter_aktiv: self.pipeline.aktive(),
            ereignisse_verworfen: self.events.verworfen(),
        }
    }
}
