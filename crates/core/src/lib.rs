//! fmo-core – Gemeinsame Typen, Ereignisse und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die von allen anderen
//! FMO-Crates gemeinsam genutzt werden: den zentralen Fehler-Enum,
//! Identifikationstypen fuer Verbindungs-Reservierungen und die
//! Ereignisse, die der Audio-Player nach aussen meldet.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{FmoError, Result};
pub use event::{PlaybackPhase, PlayerEvent};
pub use types::{ConnectionKind, ReservationId};
