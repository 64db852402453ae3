//! Verdrahtung: Ausgabe, Player, Gate und Session
//!
//! Laeuft bis Ctrl+C. Eine aktivierte Aufnahme wird beim Beenden als
//! WAV-Datei ins Aufnahme-Verzeichnis geschrieben.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Local};
use fmo_audio::{AudioPlayer, HeadlessOutput, OutputClock, OutputFactory, SystemClock, WallClock};
use fmo_core::PlayerEvent;
use fmo_stream::{AudioSession, AudioSessionHandle, SlotGate};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;

/// Abstand der Statistik-Ausgaben im Log
const STATISTIK_INTERVALL: Duration = Duration::from_secs(10);

pub struct Listener {
    config: ClientConfig,
}

impl Listener {
    pub fn neu(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Verbindet zum Relais und empfaengt bis Ctrl+C
    pub async fn starten(self, host: Option<String>) -> anyhow::Result<()> {
        let host = host.unwrap_or_else(|| self.config.verbindung.host.clone());
        let uhr: Arc<dyn WallClock> = Arc::new(SystemClock::new());
        let fabrik = ausgabe_fabrik(&self.config.audio.ausgabe, Arc::clone(&uhr))?;
        let player = AudioPlayer::new(self.config.player_config(), fabrik, uhr);
        let gate = Arc::new(SlotGate::new(self.config.verbindung.gate_limit));

        let (session, task) = AudioSession::spawn(player, gate, self.config.session_config());
        ereignisse_protokollieren(&session).await?;

        if self.config.aufnahme.aktiviert {
            session.start_recording().await?;
        }
        session.unlock().await.context("Audio-Ausgabe nicht verfuegbar")?;
        session.connect(host.clone()).await?;
        info!(%host, "Empfaenger gestartet, Beenden mit Ctrl+C");

        let mut statistik = tokio::time::interval(STATISTIK_INTERVALL);
        statistik.tick().await;
        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal.context("Signal-Handler fehlgeschlagen")?;
                    info!("Beende Empfaenger");
                    break;
                }
                _ = statistik.tick() => {
                    let s = session.stats().await?;
                    info!(
                        zustand = %s.state,
                        frames = s.frames_empfangen,
                        verworfen = s.samples_verworfen,
                        unterdrueckt = s.chunks_unterdrueckt,
                        gepuffert_secs = s.gepuffert_secs,
                        filter = s.filter_aktiv,
                        aufnahme_bytes = s.aufnahme_bytes,
                        ereignisse_verworfen = s.ereignisse_verworfen,
                        "Statistik"
                    );
                }
            }
        }

        if self.config.aufnahme.aktiviert {
            match session.stop_recording().await? {
                Some(wav) => {
                    let pfad = aufnahme_speichern(
                        Path::new(&self.config.aufnahme.verzeichnis),
                        Local::now(),
                        &wav,
                    )
                    .await?;
                    info!(pfad = %pfad.display(), bytes = wav.len(), "Aufnahme gespeichert");
                }
                None => info!("Keine Audiodaten aufgenommen"),
            }
        }

        session.shutdown().await?;
        task.await.context("Session-Task abgebrochen")?;
        Ok(())
    }
}

/// Waehlt die Ausgabe nach `audio.ausgabe`
///
/// `auto` oeffnet die Soundkarte erst bei `unlock` und faellt dann bei
/// jedem Fehler auf die Headless-Ausgabe zurueck.
fn ausgabe_fabrik(art: &str, uhr: Arc<dyn WallClock>) -> anyhow::Result<OutputFactory> {
    match art {
        "headless" => Ok(headless_fabrik(uhr)),
        "geraet" => geraete_fabrik(),
        _ => match geraete_fabrik() {
            Ok(geraet) => Ok(mit_rueckfall(geraet, uhr)),
            Err(e) => {
                debug!(fehler = %e, "Keine Soundkarten-Ausgabe");
                Ok(headless_fabrik(uhr))
            }
        },
    }
}

fn mit_rueckfall(mut geraet: OutputFactory, uhr: Arc<dyn WallClock>) -> OutputFactory {
    Box::new(move || match geraet() {
        Ok(ausgabe) => Ok(ausgabe),
        Err(e) => {
            warn!(fehler = %e, "Soundkarte nicht verfuegbar, verwende Headless-Ausgabe");
            Ok(Box::new(HeadlessOutput::new(Arc::clone(&uhr))) as Box<dyn OutputClock>)
        }
    })
}

fn headless_fabrik(uhr: Arc<dyn WallClock>) -> OutputFactory {
    info!("Headless-Ausgabe aktiv");
    Box::new(move || Ok(Box::new(HeadlessOutput::new(Arc::clone(&uhr))) as Box<dyn OutputClock>))
}

#[cfg(feature = "playback")]
fn geraete_fabrik() -> anyhow::Result<OutputFactory> {
    use fmo_audio::{CpalOutput, PlaybackConfig};
    info!("Soundkarten-Ausgabe aktiv");
    Ok(Box::new(|| {
        Ok(Box::new(CpalOutput::open(PlaybackConfig::default())?) as Box<dyn OutputClock>)
    }))
}

#[cfg(not(feature = "playback"))]
fn geraete_fabrik() -> anyhow::Result<OutputFactory> {
    anyhow::bail!("Soundkarten-Ausgabe nicht einkompiliert (Feature `playback`)")
}

/// Protokolliert Status- und Phasenwechsel in einem eigenen Thread
async fn ereignisse_protokollieren(session: &AudioSessionHandle) -> anyhow::Result<()> {
    let rx = session.subscribe().await?;
    tokio::task::spawn_blocking(move || {
        for ereignis in rx.iter() {
            match ereignis {
                PlayerEvent::Status(true) => info!("Mit Relais verbunden"),
                PlayerEvent::Status(false) => warn!("Nicht mit Relais verbunden"),
                PlayerEvent::Phase(phase) => info!(?phase, "Wiedergabe-Phase"),
                PlayerEvent::LatencyTrimmed { dropped_samples } => {
                    debug!(dropped_samples, "Latenz gekuerzt")
                }
                PlayerEvent::Pcm(_) => {}
            }
        }
    });
    Ok(())
}

/// Dateiname einer Aufnahme, z.B. `fmo-20260101-120000.wav`
pub fn aufnahme_dateiname(zeit: DateTime<Local>) -> String {
    format!("fmo-{}.wav", zeit.format("%Y%m%d-%H%M%S"))
}

async fn aufnahme_speichern(
    verzeichnis: &Path,
    zeit: DateTime<Local>,
    wav: &[u8],
) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(verzeichnis)
        .await
        .with_context(|| format!("Verzeichnis '{}' nicht anlegbar", verzeichnis.display()))?;
    let pfad = verzeichnis.join(aufnahme_dateiname(zeit));
    tokio::fs::write(&pfad, wav)
        .await
        .with_context(|| format!("Aufnahme '{}' nicht schreibbar", pfad.display()))?;
    Ok(pfad)
}
