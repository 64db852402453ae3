//! Fehlertypen fuer den FMO-Relais-Client
//!
//! Zentraler Fehler-Enum fuer alles, was ueber Crate-Grenzen hinweg
//! gemeldet wird. Untermodule definieren eigene Fehler und konvertieren
//! via `#[from]` bzw. `From`-Implementierungen hierher.

use thiserror::Error;

/// Globaler Result-Alias fuer den FMO-Client
pub type Result<T> = std::result::Result<T, FmoError>;

/// Alle moeglichen Fehler im FMO-Client
#[derive(Debug, Error)]
pub enum FmoError {
    // --- Verbindung & Netzwerk ---
    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Verbindung getrennt: {0}")]
    Getrennt(String),

    #[error("Zeitlimit ueberschritten: {0}")]
    Zeitlimit(String),

    /// Der Connection-Gate hat (noch) keinen Slot vergeben
    #[error("Verbindung derzeit nicht moeglich: {0}")]
    NichtJetzt(String),

    // --- Protokoll ---
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Audio ---
    #[error("Audiofehler: {0}")]
    Audio(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl FmoError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn ein spaeterer Versuch erfolgreich sein koennte
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(
            self,
            Self::Zeitlimit(_) | Self::Verbindung(_) | Self::Getrennt(_) | Self::NichtJetzt(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = FmoError::Verbindung("Host nicht erreichbar".into());
        assert_eq!(e.to_string(), "Verbindung fehlgeschlagen: Host nicht erreichbar");
    }

    #[test]
    fn wiederholbar_erkennung() {
        assert!(FmoError::Zeitlimit("test".into()).ist_wiederholbar());
        assert!(FmoError::NichtJetzt("audio".into()).ist_wiederholbar());
        assert!(!FmoError::Konfiguration("test".into()).ist_wiederholbar());
        assert!(!FmoError::intern("kaputt").ist_wiederholbar());
    }
}
