//! Nachrichten vom Client an das Relais (Audio-Kanal)
//!
//! Auf dem Audio-WebSocket sendet der Client nur einen Heartbeat, damit
//! das Relais eine still gewordene Verbindung nicht schliesst:
//!
//! ```json
//! {"type":"ping","timestamp":1718000000000}
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Abstand zwischen zwei Heartbeats
pub const HEARTBEAT_INTERVALL: Duration = Duration::from_secs(30);

/// Nachrichten, die der Client ueber den Audio-Kanal sendet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Heartbeat mit Unix-Zeitstempel in Millisekunden
    Ping { timestamp: i64 },
}

impl ClientMessage {
    /// Heartbeat mit aktuellem Zeitstempel
    pub fn ping_jetzt() -> Self {
        Self::Ping {
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Serialisiert die Nachricht als JSON-Text
    pub fn to_json(&self) -> String {
        // Ein Enum ohne Maps/Floats kann nicht fehlschlagen
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parst eine JSON-Nachricht
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
