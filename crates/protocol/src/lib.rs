//! fmo-protocol – Nachrichten- und Dateiformate des Audio-Kanals
//!
//! Der Audio-WebSocket des Relais liefert ausschliesslich binaere
//! Nachrichten: eine Nachricht entspricht genau einem Frame aus
//! 16-bit PCM (mono, little-endian). In Gegenrichtung sendet der Client
//! nur einen JSON-Heartbeat. Aufnahmen werden als WAV-Container
//! exportiert.

pub mod control;
pub mod error;
pub mod frame;
pub mod wav;

pub use control::{ClientMessage, HEARTBEAT_INTERVALL};
pub use error::{ProtocolError, ProtocolResult};
pub use frame::{PcmFrame, BYTES_PRO_SAMPLE, STANDARD_SAMPLE_RATE};
pub use wav::{encode_wav, WavHeader, WAV_HEADER_LAENGE};
