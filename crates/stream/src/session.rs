//! Audio-Session: ein tokio-Task besitzt den `AudioPlayer`
//!
//! Alle Zustandsaenderungen laufen ueber diesen einen Task. Er wartet mit
//! `tokio::select!` gleichzeitig auf:
//! - Steuerbefehle vom `AudioSessionHandle`
//! - einen laufenden Verbindungsversuch
//! - Nachrichten vom WebSocket
//! - den Re-Arm-Takt (nur waehrend einer Verbindung)
//! - den Delay-Line-Takt (nur solange Chunks warten)
//! - den Heartbeat
//!
//! Nach Verbindungsverlust wird nicht automatisch neu verbunden.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::Receiver;
use fmo_audio::{AudioPlayer, PlayerStats};
use fmo_core::{ConnectionKind, PlayerEvent};
use fmo_protocol::{ClientMessage, PcmFrame, HEARTBEAT_INTERVALL};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::error::{StreamError, StreamResult};
use crate::gate::{ConnectionGate, SlotLease};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Verbindungsversuch = Pin<Box<dyn Future<Output = StreamResult<Verbunden>> + Send>>;

/// Pfad des Audio-Endpunkts auf dem Relais
pub const AUDIO_PFAD: &str = "/audio";

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// `wss://` statt `ws://`
    pub tls: bool,
    pub heartbeat: Duration,
    /// So lange wird auf einen Gate-Slot gewartet, bevor neu angefragt wird
    pub admission_timeout: Duration,
    pub retry_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tls: false,
            heartbeat: HEARTBEAT_INTERVALL,
            admission_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl SessionConfig {
    /// Baut die Audio-URL fuer einen Host (`name` oder `name:port`)
    pub fn audio_url(&self, host: &str) -> String {
        let schema = if self.tls { "wss" } else { "ws" };
        format!("{}://{}{}", schema, host.trim_end_matches('/'), AUDIO_PFAD)
    }
}

// ---------------------------------------------------------------------------
// Befehle & Handle
// ---------------------------------------------------------------------------

enum Befehl {
    Connect(String),
    Disconnect,
    Unlock(oneshot::Sender<StreamResult<()>>),
    SetVolume(f32),
    SetLocalMute(bool),
    SetLocalTransmission(bool),
    SetVoiceFilter(bool),
    StartRecording,
    StopRecording(oneshot::Sender<StreamResult<Option<Bytes>>>),
    Stats(oneshot::Sender<PlayerStats>),
    Spectrum(oneshot::Sender<Option<Vec<f32>>>),
    Subscribe(oneshot::Sender<Receiver<PlayerEvent>>),
    Shutdown(oneshot::Sender<()>),
}

/// Steuer-Handle der Session, beliebig klonbar
#[derive(Clone)]
pub struct AudioSessionHandle {
    tx: mpsc::Sender<Befehl>,
}

impl AudioSessionHandle {
    async fn senden(&self, befehl: Befehl) -> StreamResult<()> {
        self.tx
            .send(befehl)
            .await
            .map_err(|_| StreamError::SessionBeendet)
    }

    async fn anfragen<T>(&self, befehl: impl FnOnce(oneshot::Sender<T>) -> Befehl) -> StreamResult<T> {
        let (tx, rx) = oneshot::channel();
        self.senden(befehl(tx)).await?;
        rx.await.map_err(|_| StreamError::SessionBeendet)
    }

    /// Startet den Verbindungsaufbau zum Relais
    pub async fn connect(&self, host: impl Into<String>) -> StreamResult<()> {
        self.senden(Befehl::Connect(host.into())).await
    }

    pub async fn disconnect(&self) -> StreamResult<()> {
        self.senden(Befehl::Disconnect).await
    }

    /// Gibt die Audio-Ausgabe frei
    pub async fn unlock(&self) -> StreamResult<()> {
        self.anfragen(Befehl::Unlock).await?
    }

    pub async fn set_volume(&self, volume: f32) -> StreamResult<()> {
        self.senden(Befehl::SetVolume(volume)).await
    }

    pub async fn set_local_mute(&self, enabled: bool) -> StreamResult<()> {
        self.senden(Befehl::SetLocalMute(enabled)).await
    }

    pub async fn set_local_transmission(&self, sendend: bool) -> StreamResult<()> {
        self.senden(Befehl::SetLocalTransmission(sendend)).await
    }

    /// Schaltet Filter und Kompressor der Sprachkette
    pub async fn set_voice_filter(&self, enabled: bool) -> StreamResult<()> {
        self.senden(Befehl::SetVoiceFilter(enabled)).await
    }

    pub async fn start_recording(&self) -> StreamResult<()> {
        self.senden(Befehl::StartRecording).await
    }

    /// Beendet die Aufnahme; `None` wenn nichts aufgezeichnet wurde
    pub async fn stop_recording(&self) -> StreamResult<Option<Bytes>> {
        self.anfragen(Befehl::StopRecording).await?
    }

    pub async fn stats(&self) -> StreamResult<PlayerStats> {
        self.anfragen(Befehl::Stats).await
    }

    /// Aktuelles Spektrum der Wiedergabe, `None` vor `unlock`
    pub async fn spectrum(&self) -> StreamResult<Option<Vec<f32>>> {
        self.anfragen(Befehl::Spectrum).await
    }

    pub async fn subscribe(&self) -> StreamResult<Receiver<PlayerEvent>> {
        self.anfragen(Befehl::Subscribe).await
    }

    /// Trennt, zerstoert die Ausgabe und beendet den Task
    pub async fn shutdown(&self) -> StreamResult<()> {
        self.anfragen(Befehl::Shutdown).await
    }
}

// ---------------------------------------------------------------------------
// Session-Task
// ---------------------------------------------------------------------------

struct Verbunden {
    ws: WsStream,
    _lease: SlotLease,
}

pub struct AudioSession {
    player: AudioPlayer,
    gate: Arc<dyn ConnectionGate>,
    config: SessionConfig,
    rx: mpsc::Receiver<Befehl>,
    versuch: Option<Verbindungsversuch>,
    verbindung: Option<Verbunden>,
}

impl AudioSession {
    /// Startet die Session als eigenen Task
    pub fn spawn(
        player: AudioPlayer,
        gate: Arc<dyn ConnectionGate>,
        config: SessionConfig,
    ) -> (AudioSessionHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(64);
        let session = Self {
            player,
            gate,
            config,
            rx,
            versuch: None,
            verbindung: None,
        };
        let handle = tokio::spawn(session.run());
        (AudioSessionHandle { tx }, handle)
    }

    async fn run(mut self) {
        let mut rearm = takt(self.player.config().rearm_intervall);
        let mut delay = takt(self.player.config().delay_tick);
        let mut heartbeat = takt(self.config.heartbeat);

        loop {
            let rearm_aktiv = self.player.rearm_armed();
            let delay_aktiv = self.player.delay_line_pending();
            let verbunden = self.verbindung.is_some();
            let verbindet = self.versuch.is_some();

            tokio::select! {
                befehl = self.rx.recv() => {
                    let Some(befehl) = befehl else {
                        debug!("Alle Handles geschlossen, Session endet");
                        self.trennen().await;
                        self.player.shutdown();
                        break;
                    };
                    if let Some(antwort) = self.befehl(befehl).await {
                        let _ = antwort.send(());
                        break;
                    }
                }
                ergebnis = versuch_abwarten(&mut self.versuch), if verbindet => {
                    self.versuch = None;
                    match ergebnis {
                        Ok(v) => {
                            self.verbindung = Some(v);
                            self.player.on_connected();
                            heartbeat.reset();
                        }
                        Err(e) => {
                            warn!(fehler = %e, "Verbindungsaufbau fehlgeschlagen");
                            self.player.on_connect_failed();
                        }
                    }
                }
                nachricht = naechste_nachricht(&mut self.verbindung), if verbunden => {
                    self.nachricht(nachricht);
                }
                _ = rearm.tick(), if rearm_aktiv => {
                    self.player.on_rearm_tick();
                }
                _ = delay.tick(), if delay_aktiv => {
                    self.player.on_delay_tick();
                }
                _ = heartbeat.tick(), if verbunden => {
                    self.heartbeat().await;
                }
            }
        }
        info!("Audio-Session beendet");
    }

    /// Fuehrt einen Befehl aus; `Some` signalisiert das Ende der Session
    async fn befehl(&mut self, befehl: Befehl) -> Option<oneshot::Sender<()>> {
        match befehl {
            Befehl::Connect(host) => self.verbinden(host),
            Befehl::Disconnect => self.trennen().await,
            Befehl::Unlock(antwort) => {
                let _ = antwort.send(self.player.unlock().map_err(StreamError::from));
            }
            Befehl::SetVolume(v) => self.player.set_volume(v),
            Befehl::SetLocalMute(m) => self.player.set_local_mute(m),
            Befehl::SetLocalTransmission(s) => self.player.set_local_transmission(s),
            Befehl::SetVoiceFilter(f) => self.player.set_voice_filter(f),
            Befehl::StartRecording => self.player.start_recording(),
            Befehl::StopRecording(antwort) => {
                let _ = antwort.send(self.player.stop_recording().map_err(StreamError::from));
            }
            Befehl::Stats(antwort) => {
                let _ = antwort.send(self.player.stats());
            }
            Befehl::Spectrum(antwort) => {
                let _ = antwort.send(self.player.spectrum());
            }
            Befehl::Subscribe(antwort) => {
                let _ = antwort.send(self.player.subscribe());
            }
            Befehl::Shutdown(antwort) => {
                self.trennen().await;
                self.player.shutdown();
                return Some(antwort);
            }
        }
        None
    }

    fn verbinden(&mut self, host: String) {
        if self.verbindung.is_some() || self.versuch.is_some() {
            debug!(%host, "Bereits verbunden oder im Aufbau, ignoriert");
            return;
        }
        let url = self.config.audio_url(&host);
        info!(%url, "Verbinde Audio-Stream");
        self.versuch = Some(Box::pin(verbindung_aufbauen(
            Arc::clone(&self.gate),
            url,
            self.config.clone(),
        )));
    }

    async fn trennen(&mut self) {
        if self.versuch.take().is_some() {
            debug!("Laufender Verbindungsaufbau abgebrochen");
        }
        if let Some(mut v) = self.verbindung.take() {
            if let Err(e) = v.ws.close(None).await {
                debug!(fehler = %e, "Schliessen des WebSocket fehlgeschlagen");
            }
        }
        self.player.on_disconnected();
    }

    fn nachricht(&mut self, nachricht: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>) {
        match nachricht {
            Some(Ok(Message::Binary(daten))) => match PcmFrame::from_bytes(daten) {
                Ok(frame) => self.player.on_frame(frame),
                Err(e) => warn!(fehler = %e, "Ungueltiger Audio-Frame verworfen"),
            },
            Some(Ok(Message::Text(text))) => {
                trace!(laenge = text.len(), "Textnachricht ignoriert");
            }
            Some(Ok(Message::Close(grund))) => {
                info!(?grund, "Relais hat die Verbindung geschlossen");
                self.verbindung_verloren();
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(fehler = %e, "WebSocket-Fehler");
                self.verbindung_verloren();
            }
            None => {
                info!("WebSocket-Stream beendet");
                self.verbindung_verloren();
            }
        }
    }

    fn verbindung_verloren(&mut self) {
        self.verbindung = None;
        self.player.on_disconnected();
    }

    async fn heartbeat(&mut self) {
        let Some(v) = self.verbindung.as_mut() else {
            return;
        };
        let ping = ClientMessage::ping_jetzt().to_json();
        if let Err(e) = v.ws.send(Message::Text(ping)).await {
            warn!(fehler = %e, "Heartbeat konnte nicht gesendet werden");
        }
    }
}

fn takt(periode: Duration) -> Interval {
    let mut intervall = tokio::time::interval(periode);
    intervall.set_missed_tick_behavior(MissedTickBehavior::Delay);
    intervall
}

async fn versuch_abwarten(versuch: &mut Option<Verbindungsversuch>) -> StreamResult<Verbunden> {
    match versuch.as_mut() {
        Some(f) => f.await,
        None => std::future::pending().await,
    }
}

async fn naechste_nachricht(
    verbindung: &mut Option<Verbunden>,
) -> Option<Result<Message, tokio_tungstenite::tungstenite::Error>> {
    match verbindung.as_mut() {
        Some(v) => v.ws.next().await,
        None => std::future::pending().await,
    }
}

/// Slot anfordern, Socket verfolgen, Handshake durchfuehren
///
/// Kommt kein Slot innerhalb von `admission_timeout`, wird nach
/// `retry_delay` erneut angefragt, bis der Aufrufer abbricht.
async fn verbindung_aufbauen(
    gate: Arc<dyn ConnectionGate>,
    url: String,
    config: SessionConfig,
) -> StreamResult<Verbunden> {
    let id = loop {
        match tokio::time::timeout(
            config.admission_timeout,
            gate.request_slot(ConnectionKind::Audio),
        )
        .await
        {
            Ok(id) => break id?,
            Err(_) => {
                debug!(wartezeit = ?config.retry_delay, "Kein Slot frei, neuer Versuch");
                tokio::time::sleep(config.retry_delay).await;
            }
        }
    };

    let request = match url.as_str().into_client_request() {
        Ok(r) => r,
        Err(e) => {
            gate.release_slot(id);
            return Err(StreamError::UngueltigeAdresse(format!("{}: {}", url, e)));
        }
    };

    let lease = gate.track_socket(id)?;
    let (ws, antwort) = connect_async(request).await?;
    debug!(status = %antwort.status(), reservierung = %lease.id(), "Handshake abgeschlossen");
    Ok(Verbunden { ws, _lease: lease })
}
