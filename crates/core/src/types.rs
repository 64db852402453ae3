//! Gemeinsame Identifikationstypen
//!
//! IDs verwenden das Newtype-Pattern um Verwechslungen zur Compilezeit
//! auszuschliessen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reservierung eines Verbindungs-Slots beim Connection-Gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(pub Uuid);

impl ReservationId {
    /// Erstellt eine neue zufaellige ReservationId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReservationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "reservation:{}", self.0)
    }
}

/// Art einer Socket-Verbindung zum Relais
///
/// Das Relais begrenzt die Anzahl gleichzeitiger Verbindungen pro Art,
/// deshalb zaehlt der Connection-Gate getrennt nach `ConnectionKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// Steuerkanal (Stationen, WiFi, QSO-Log)
    Control,
    /// Ereigniskanal
    Events,
    /// Audio-Stream
    Audio,
}

impl ConnectionKind {
    /// Alle bekannten Verbindungsarten
    pub const ALLE: [ConnectionKind; 3] = [Self::Control, Self::Events, Self::Audio];

    /// Kurzname wie er in Logs erscheint
    pub fn name(&self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Events => "events",
            Self::Audio => "audio",
        }
    }
}

impl std::fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservation_id_eindeutig() {
        let a = ReservationId::new();
        let b = ReservationId::new();
        assert_ne!(a, b, "Zwei neue Reservierungen muessen verschieden sein");
    }

    #[test]
    fn reservation_id_display() {
        let id = ReservationId(Uuid::nil());
        assert!(id.to_string().starts_with("reservation:"));
    }

    #[test]
    fn connection_kind_serde() {
        let json = serde_json::to_string(&ConnectionKind::Audio).unwrap();
        assert_eq!(json, "\"audio\"");
        let kind: ConnectionKind = serde_json::from_str("\"events\"").unwrap();
        assert_eq!(kind, ConnectionKind::Events);
    }
}
