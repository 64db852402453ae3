//! fmo-audio – Wiedergabe-Engine des FMO-Clients
//!
//! Vollstaendige Empfangs-Pipeline fuer den PCM-Stream des Relais:
//! - PCM-Decoder (16-bit LE -> f32)
//! - Jitter Buffer mit Latenzgrenze
//! - Verzoegerungsleitung gegen lokales Echo
//! - Planer gegen die Ausgabe-Uhr (Buffering -> Playing)
//! - Sprachkette: Vorverstaerkung, Biquad-Filter, Kompressor
//! - Spektrum-Analyse hinter der Sprachkette
//! - Recorder mit WAV-Export
//! - Ausgabe headless oder via cpal (Feature `cpal`)

pub mod analyser;
pub mod clock;
pub mod dsp;
pub mod echo_delay;
pub mod engine;
pub mod error;
pub mod events;
pub mod jitter_buffer;
pub mod output;
pub mod pcm;
pub mod pipeline;
#[cfg(feature = "cpal")]
pub mod playback;
pub mod recorder;
pub mod scheduler;
pub mod volume;

// Bequeme Re-Exporte der wichtigsten Typen
pub use analyser::{SpectrumAnalyser, BIN_ANZAHL, FFT_GROESSE};
pub use clock::{ManualClock, SystemClock, WallClock};
pub use dsp::AudioProcessor;
pub use echo_delay::{EchoDelayLine, STANDARD_ECHO_DELAY};
pub use engine::{AudioPlayer, PlayerConfig, PlayerState, PlayerStats};
pub use error::{AudioError, AudioResult};
pub use events::{EventHub, EVENT_KAPAZITAET};
pub use jitter_buffer::{JitterBuffer, LatencyBound};
pub use output::{
    AudioBlock, HeadlessOutput, OutputClock, OutputFactory, OutputSlot, ScheduleLog,
    ScheduledBlock,
};
pub use pcm::{decode_pcm16, SampleChunk};
pub use pipeline::{build_voice_chain, AudioPipeline};
#[cfg(feature = "cpal")]
pub use playback::{CpalOutput, PlaybackConfig};
pub use recorder::Recorder;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use volume::VolumeController;
