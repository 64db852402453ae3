//! fmo-stream – Netzwerkseite des FMO-Audio-Clients
//!
//! - `gate`: begrenzt gleichzeitige Verbindungen pro Art
//! - `session`: WebSocket-Empfang, Heartbeat und Steuerbefehle fuer den
//!   `AudioPlayer` in einem einzigen tokio-Task

pub mod error;
pub mod gate;
pub mod session;

pub use error::{StreamError, StreamResult};
pub use gate::{ConnectionGate, GateStatus, SlotGate, SlotLease, HANDSHAKE_TIMEOUT, STANDARD_LIMIT};
pub use session::{AudioSession, AudioSessionHandle, SessionConfig, AUDIO_PFAD};
