//! Soundkarten-Ausgabe via cpal
//!
//! Oeffnet einen cpal OutputStream und liest Samples aus einem
//! lock-free Ring-Buffer. Die Zeitachse der Ausgabe ergibt sich aus der
//! Anzahl der Frames, die das Geraet bereits abgeholt hat. Luecken
//! zwischen geplanten Bloecken werden mit Stille aufgefuellt.
//!
//! cpal::Stream ist !Send, deshalb lebt der Stream in einem eigenen
//! std::thread. `CpalOutput` selbst haelt nur den Producer, Atomics und
//! einen Befehlskanal und ist damit Send.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{debug, error, info, warn};

use crate::error::{AudioError, AudioResult};
use crate::output::{AudioBlock, OutputClock};
use crate::volume::VolumeController;

/// Konfiguration fuer die Soundkarten-Ausgabe
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Kapazitaet des Ring-Buffers in Sekunden
    pub puffer_secs: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { puffer_secs: 4.0 }
    }
}

/// Zwischen Callback und Planer geteilter Zustand
#[derive(Debug, Default)]
struct AusgabeZustand {
    /// Vom Geraet abgeholte Frames (inklusive Stille)
    verbraucht: AtomicU64,
    /// Lautstaerke als f32-Bits
    gain: AtomicU32,
}

impl AusgabeZustand {
    fn new() -> Self {
        let z = Self::default();
        z.gain.store(1.0f32.to_bits(), Ordering::Relaxed);
        z
    }
}

enum StreamBefehl {
    Pause,
    Play,
    Stop,
}

/// Audio-Ausgabe auf dem Standard-Ausgabegeraet
pub struct CpalOutput {
    befehle: mpsc::Sender<StreamBefehl>,
    thread: Option<JoinHandle<()>>,
    producer: HeapProd<f32>,
    zustand: Arc<AusgabeZustand>,
    geraete_rate: u32,
    kanaele: usize,
    suspended: bool,
}

impl CpalOutput {
    /// Oeffnet das Standard-Ausgabegeraet in einem eigenen Thread
    pub fn open(config: PlaybackConfig) -> AudioResult<Self> {
        let zustand = Arc::new(AusgabeZustand::new());
        let (bereit_tx, bereit_rx) = mpsc::sync_channel::<AudioResult<(HeapProd<f32>, u32, usize)>>(1);
        let (befehl_tx, befehl_rx) = mpsc::channel::<StreamBefehl>();

        let thread_zustand = Arc::clone(&zustand);
        let thread = std::thread::Builder::new()
            .name("fmo-ausgabe".to_string())
            .spawn(move || {
                let stream = match stream_oeffnen(thread_zustand, &config) {
                    Ok((stream, producer, rate, kanaele)) => {
                        if bereit_tx.send(Ok((producer, rate, kanaele))).is_err() {
                            return;
                        }
                        stream
                    }
                    Err(e) => {
                        let _ = bereit_tx.send(Err(e));
                        return;
                    }
                };

                // Stream bleibt bis Stop in diesem Scope am Leben
                while let Ok(befehl) = befehl_rx.recv() {
                    let ergebnis = match befehl {
                        StreamBefehl::Pause => stream.pause().map_err(|e| e.to_string()),
                        StreamBefehl::Play => stream.play().map_err(|e| e.to_string()),
                        StreamBefehl::Stop => break,
                    };
                    if let Err(e) = ergebnis {
                        warn!(fehler = %e, "Ausgabe-Stream reagiert nicht");
                    }
                }
                debug!("Ausgabe-Thread beendet, cpal-Stream wird gedroppt");
            })?;

        let (producer, geraete_rate, kanaele) = bereit_rx
            .recv()
            .map_err(|_| AudioError::StreamFehler("Ausgabe-Thread vorzeitig beendet".to_string()))??;

        info!(geraete_rate, kanaele, "Soundkarten-Ausgabe geoeffnet");

        Ok(Self {
            befehle: befehl_tx,
            thread: Some(thread),
            producer,
            zustand,
            geraete_rate,
            kanaele,
            suspended: false,
        })
    }

    /// Abtastrate des Geraets
    pub fn geraete_rate(&self) -> u32 {
        self.geraete_rate
    }

    fn befehl(&self, befehl: StreamBefehl) {
        if self.befehle.send(befehl).is_err() {
            warn!("Ausgabe-Thread nicht mehr erreichbar");
        }
    }
}

impl OutputClock for CpalOutput {
    fn current_time(&self) -> f64 {
        self.zustand.verbraucht.load(Ordering::Acquire) as f64 / self.geraete_rate as f64
    }

    fn schedule(&mut self, block: AudioBlock, start: f64) -> AudioResult<()> {
        let samples = resample_linear(&block.samples, block.sample_rate, self.geraete_rate);

        // Position des naechsten geschriebenen Frames auf der Zeitachse
        let gepuffert = (self.producer.occupied_len() / self.kanaele) as u64;
        let schreib_pos = self.zustand.verbraucht.load(Ordering::Acquire) + gepuffert;
        let start_frame = (start * self.geraete_rate as f64).round().max(0.0) as u64;
        let luecke = start_frame.saturating_sub(schreib_pos) as usize;

        let benoetigt = (luecke + samples.len()) * self.kanaele;
        if self.producer.vacant_len() < benoetigt {
            return Err(AudioError::StreamFehler(format!(
                "Ring-Buffer voll: {} Samples benoetigt, {} frei",
                benoetigt,
                self.producer.vacant_len()
            )));
        }

        let kanaele = self.kanaele;
        self.producer
            .push_iter(std::iter::repeat(0.0f32).take(luecke * kanaele));
        self.producer.push_iter(
            samples
                .iter()
                .flat_map(|&s| std::iter::repeat(s).take(kanaele)),
        );
        Ok(())
    }

    fn set_gain(&mut self, gain: f32) {
        self.zustand.gain.store(gain.to_bits(), Ordering::Relaxed);
    }

    fn suspend(&mut self) {
        if !self.suspended {
            self.befehl(StreamBefehl::Pause);
            self.suspended = true;
        }
    }

    fn resume(&mut self) {
        if self.suspended {
            self.befehl(StreamBefehl::Play);
            self.suspended = false;
        }
    }

    fn is_suspended(&self) -> bool {
        self.suspended
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.befehle.send(StreamBefehl::Stop);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Oeffnet den Stream (laeuft im Ausgabe-Thread)
fn stream_oeffnen(
    zustand: Arc<AusgabeZustand>,
    config: &PlaybackConfig,
) -> AudioResult<(Stream, HeapProd<f32>, u32, usize)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(AudioError::KeinStandardAusgabegeraet)?;

    let supported = device
        .default_output_config()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;
    let sample_format = supported.sample_format();
    let stream_config = supported.config();
    let rate = stream_config.sample_rate.0;
    let kanaele = stream_config.channels as usize;

    let kapazitaet = (rate as f32 * config.puffer_secs) as usize * kanaele;
    let rb = HeapRb::<f32>::new(kapazitaet.max(1));
    let (producer, consumer) = rb.split();

    let err_fn = |err| error!("Playback-Fehler: {}", err);
    let mut quelle = CallbackQuelle {
        consumer,
        zustand,
        volume: VolumeController::default(),
        kanaele,
        puffer: Vec::new(),
    };

    let stream = match sample_format {
        SampleFormat::F32 => device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _| quelle.fuellen(data),
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?,
        SampleFormat::I16 => device
            .build_output_stream(
                &stream_config,
                move |data: &mut [i16], _| quelle.fuellen_i16(data),
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?,
        _ => {
            return Err(AudioError::StreamFehler(format!(
                "Nicht unterstuetztes Sample-Format: {:?}",
                sample_format
            )))
        }
    };

    stream
        .play()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    debug!("Playback-Stream geoeffnet: {}Hz {}ch", rate, kanaele);
    Ok((stream, producer, rate, kanaele))
}

/// Zustand des cpal-Callbacks
struct CallbackQuelle {
    consumer: HeapCons<f32>,
    zustand: Arc<AusgabeZustand>,
    volume: VolumeController,
    kanaele: usize,
    puffer: Vec<f32>,
}

impl CallbackQuelle {
    fn fuellen(&mut self, data: &mut [f32]) {
        let gelesen = self.consumer.pop_slice(data);
        // Stille fuer fehlende Samples
        data[gelesen..].fill(0.0);

        let gain = f32::from_bits(self.zustand.gain.load(Ordering::Relaxed));
        self.volume.set_volume(gain);
        self.volume.apply(data);

        self.zustand
            .verbraucht
            .fetch_add((data.len() / self.kanaele) as u64, Ordering::Release);
    }

    fn fuellen_i16(&mut self, data: &mut [i16]) {
        let mut puffer = std::mem::take(&mut self.puffer);
        puffer.resize(data.len(), 0.0);
        self.fuellen(&mut puffer);
        for (out, s) in data.iter_mut().zip(puffer.iter()) {
            *out = (*s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        }
        self.puffer = puffer;
    }
}

/// Lineare Umrechnung der Abtastrate
pub fn resample_linear(samples: &[f32], von: u32, nach: u32) -> Vec<f32> {
    if von == nach || samples.is_empty() || von == 0 {
        return samples.to_vec();
    }
    let verhaeltnis = von as f64 / nach as f64;
    let laenge = (samples.len() as f64 * nach as f64 / von as f64).round() as usize;
    let letzter = samples.len() - 1;

    (0..laenge)
        .map(|i| {
            let pos = i as f64 * verhaeltnis;
            let idx = (pos.floor() as usize).min(letzter);
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx];
            let b = samples[(idx + 1).min(letzter)];
            a + (b - a) * frac
        })
        .collect()
}
