//! Client-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! Standardwerte, der Empfaenger laeuft also auch ohne Konfigurationsdatei.

use std::time::Duration;

use fmo_audio::PlayerConfig;
use fmo_stream::{SessionConfig, STANDARD_LIMIT};
use serde::{Deserialize, Serialize};

use crate::logging::{log_format_gueltig, log_level_gueltig};

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub verbindung: VerbindungsEinstellungen,
    pub audio: AudioEinstellungen,
    pub aufnahme: AufnahmeEinstellungen,
    pub logging: LoggingEinstellungen,
}

/// Relais-Adresse und Verbindungsverhalten
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerbindungsEinstellungen {
    /// Host des Relais, optional mit Port (`fmo.local:8080`)
    pub host: String,
    /// `wss://` statt `ws://`
    pub tls: bool,
    pub heartbeat_secs: u64,
    /// Wartezeit auf einen Gate-Slot bevor neu angefragt wird
    pub admission_timeout_ms: u64,
    pub retry_delay_ms: u64,
    /// Gleichzeitige Verbindungen pro Art
    pub gate_limit: usize,
}

impl Default for VerbindungsEinstellungen {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            tls: false,
            heartbeat_secs: 30,
            admission_timeout_ms: 10_000,
            retry_delay_ms: 1_000,
            gate_limit: STANDARD_LIMIT,
        }
    }
}

/// Wiedergabe-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    pub sample_rate: u32,
    /// Mindestpuffer vor dem ersten Abspielen
    pub min_start_ms: u64,
    /// Angestrebter Vorlauf vor der Ausgabe-Uhr
    pub target_lead_ms: u64,
    /// Ab dieser gepufferten Dauer werden alte Samples verworfen
    pub max_buffer_ms: u64,
    pub echo_delay_ms: u64,
    /// Lautstaerke 0.0 bis 2.0
    pub volume: f32,
    /// Eigene Sendungen verzoegert unterdruecken
    pub local_mute: bool,
    pub voice_filter: bool,
    /// "auto", "headless" oder "geraet"
    pub ausgabe: String,
}

impl Default for AudioEinstellungen {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            min_start_ms: 100,
            target_lead_ms: 500,
            max_buffer_ms: 1000,
            echo_delay_ms: 500,
            volume: 1.0,
            local_mute: false,
            voice_filter: true,
            ausgabe: "auto".into(),
        }
    }
}

/// Aufnahme des empfangenen Streams
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AufnahmeEinstellungen {
    /// Beim Start aufnehmen und beim Beenden als WAV speichern
    pub aktiviert: bool,
    pub verzeichnis: String,
}

impl Default for AufnahmeEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: false,
            verzeichnis: "aufnahmen".into(),
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config: Self = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.validieren()?;
        Ok(config)
    }

    /// Prueft Wertebereiche, die serde nicht abdeckt
    pub fn validieren(&self) -> anyhow::Result<()> {
        let a = &self.audio;
        if a.sample_rate == 0 {
            anyhow::bail!("audio.sample_rate muss groesser 0 sein");
        }
        if !(0.0..=2.0).contains(&a.volume) {
            anyhow::bail!("audio.volume {} liegt nicht in 0.0..=2.0", a.volume);
        }
        if a.target_lead_ms > a.max_buffer_ms {
            anyhow::bail!(
                "audio.target_lead_ms ({}) groesser als audio.max_buffer_ms ({})",
                a.target_lead_ms,
                a.max_buffer_ms
            );
        }
        if !matches!(a.ausgabe.as_str(), "auto" | "headless" | "geraet") {
            anyhow::bail!("audio.ausgabe '{}' unbekannt", a.ausgabe);
        }
        if self.verbindung.host.trim().is_empty() {
            anyhow::bail!("verbindung.host darf nicht leer sein");
        }
        if self.verbindung.gate_limit == 0 {
            anyhow::bail!("verbindung.gate_limit muss mindestens 1 sein");
        }
        if !log_level_gueltig(&self.logging.level) {
            anyhow::bail!("logging.level '{}' ungueltig", self.logging.level);
        }
        if !log_format_gueltig(&self.logging.format) {
            anyhow::bail!("logging.format '{}' ungueltig", self.logging.format);
        }
        Ok(())
    }

    /// Parameter fuer den `AudioPlayer`
    pub fn player_config(&self) -> PlayerConfig {
        let a = &self.audio;
        PlayerConfig {
            sample_rate: a.sample_rate,
            min_start_secs: a.min_start_ms as f64 / 1000.0,
            target_lead_secs: a.target_lead_ms as f64 / 1000.0,
            max_buffer_secs: a.max_buffer_ms as f64 / 1000.0,
            echo_delay: Duration::from_millis(a.echo_delay_ms),
            volume: a.volume,
            local_mute: a.local_mute,
            voice_filter: a.voice_filter,
            ..PlayerConfig::default()
        }
    }

    /// Parameter fuer die WebSocket-Session
    pub fn session_config(&self) -> SessionConfig {
        let v = &self.verbindung;
        SessionConfig {
            tls: v.tls,
            heartbeat: Duration::from_secs(v.heartbeat_secs.max(1)),
            admission_timeout: Duration::from_millis(v.admission_timeout_ms),
            retry_delay: Duration::from_millis(v.retry_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ClientConfig::default();
        cfg.validieren().unwrap();
        assert_eq!(cfg.audio.sample_rate, 8000);
        assert_eq!(cfg.verbindung.gate_limit, 2);
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.aufnahme.aktiviert);
    }

    #[test]
    fn standardwerte_entsprechen_player_defaults() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.player_config(), PlayerConfig::default());
        assert_eq!(cfg.session_config().heartbeat, Duration::from_secs(30));
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [verbindung]
            host = "fmo.local:8080"
            tls = true

            [audio]
            volume = 0.5
            local_mute = true
        "#;
        let cfg: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.verbindung.host, "fmo.local:8080");
        assert_eq!(
            cfg.session_config().audio_url(&cfg.verbindung.host),
            "wss://fmo.local:8080/audio"
        );
        let player = cfg.player_config();
        assert_eq!(player.volume, 0.5);
        assert!(player.local_mute);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(player.echo_delay, Duration::from_millis(500));
        assert_eq!(cfg.verbindung.heartbeat_secs, 30);
    }

    #[test]
    fn ungueltige_werte_abgelehnt() {
        let mut cfg = ClientConfig::default();
        cfg.audio.volume = 3.0;
        assert!(cfg.validieren().is_err());

        let mut cfg = ClientConfig::default();
        cfg.audio.target_lead_ms = 2000;
        assert!(cfg.validieren().is_err());

        let mut cfg = ClientConfig::default();
        cfg.logging.format = "xml".into();
        assert!(cfg.validieren().is_err());

        let mut cfg = ClientConfig::default();
        cfg.audio.ausgabe = "lautsprecher".into();
        assert!(cfg.validieren().is_err());
    }

    #[test]
    fn beispielkonfiguration_ist_valide() {
        let cfg: ClientConfig = toml::from_str(include_str!("../../fmo.toml.example")).unwrap();
        cfg.validieren().unwrap();
        assert_eq!(cfg.verbindung.host, "fmo.local");
    }

    #[test]
    fn fehlende_datei_liefert_standard() {
        let cfg = ClientConfig::laden("/nicht/vorhanden/fmo.toml").unwrap();
        assert_eq!(cfg.verbindung.host, "localhost");
    }
}
