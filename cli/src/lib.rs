//! fmo-listen – Kommandozeilen-Empfaenger fuer FMO-Relais
//!
//! Laedt die Konfiguration, richtet das Logging ein und verbindet den
//! Audio-Player ueber eine WebSocket-Session mit dem Relais.

pub mod config;
pub mod listener;
pub mod logging;

pub use listener::Listener;
