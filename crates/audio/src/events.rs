//! Verteilung der Player-Ereignisse an Abonnenten
//!
//! Jeder Abonnent erhaelt einen eigenen begrenzten crossbeam-Receiver.
//! Getrennte Abonnenten (Receiver gedroppt) werden beim naechsten Senden
//! entfernt. Liest ein Abonnent nicht mehr, werden Ereignisse fuer ihn
//! verworfen statt gepuffert.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use fmo_core::PlayerEvent;
use tracing::{trace, warn};

/// Ereignisse pro Abonnent, die ungelesen gepuffert werden
pub const EVENT_KAPAZITAET: usize = 1024;

/// Event-Hub fuer `PlayerEvent`
pub struct EventHub {
    abonnenten: Vec<Sender<PlayerEvent>>,
    kapazitaet: usize,
    verworfen: u64,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::mit_kapazitaet(EVENT_KAPAZITAET)
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mit_kapazitaet(kapazitaet: usize) -> Self {
        Self {
            abonnenten: Vec::new(),
            kapazitaet: kapazitaet.max(1),
            verworfen: 0,
        }
    }

    /// Registriert einen neuen Abonnenten
    pub fn subscribe(&mut self) -> Receiver<PlayerEvent> {
        let (tx, rx) = bounded(self.kapazitaet);
        self.abonnenten.push(tx);
        rx
    }

    /// Sendet ein Ereignis an alle Abonnenten
    pub fn emit(&mut self, event: PlayerEvent) {
        if self.abonnenten.is_empty() {
            return;
        }
        if !event.ist_hochfrequent() {
            trace!(?event, abonnenten = self.abonnenten.len(), "Ereignis");
        }
        let verworfen = &mut self.verworfen;
        self.abonnenten
            .retain(|tx| match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    *verworfen += 1;
                    if !event.ist_hochfrequent() {
                        warn!(?event, "Abonnent liest nicht, Ereignis verworfen");
                    }
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            });
    }

    /// Ereignisse, die wegen voller Abonnenten-Queues verworfen wurden
    pub fn verworfen(&self) -> u64 {
        self.verworfen
    }

    /// Anzahl aktiver Abonnenten
    pub fn anzahl(&self) -> usize {
        self.abonnenten.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use fmo_core::PlaybackPhase;

    #[test]
    fn alle_abonnenten_erhalten_ereignis() {
        let mut hub = EventHub::new();
        let a = hub.subscribe();
        let b = hub.subscribe();
        hub.emit(PlayerEvent::Status(true));
        assert_eq!(a.try_recv().unwrap(), PlayerEvent::Status(true));
        assert_eq!(b.try_recv().unwrap(), PlayerEvent::Status(true));
    }

    #[test]
    fn getrennte_abonnenten_entfernt() {
        let mut hub = EventHub::new();
        let a = hub.subscribe();
        let b = hub.subscribe();
        drop(b);
        hub.emit(PlayerEvent::Phase(PlaybackPhase::Playing));
        assert_eq!(hub.anzahl(), 1);
        assert!(a.try_recv().is_ok());
    }

    #[test]
    fn haengender_abonnent_bleibt_begrenzt() {
        let mut hub = EventHub::mit_kapazitaet(4);
        let langsam = hub.subscribe();
        let schnell = hub.subscribe();
        for _ in 0..10 {
            hub.emit(PlayerEvent::Pcm(Bytes::from_static(&[0, 0])));
            assert!(schnell.try_recv().is_ok());
        }
        assert_eq!(langsam.len(), 4);
        assert_eq!(hub.verworfen(), 6);
        assert_eq!(hub.anzahl(), 2);

        // Nach dem Leeren kommen neue Ereignisse wieder an
        while langsam.try_recv().is_ok() {}
        hub.emit(PlayerEvent::Status(true));
        assert_eq!(langsam.try_recv().unwrap(), PlayerEvent::Status(true));
    }

    #[test]
    fn ohne_abonnenten_kein_fehler() {
        let mut hub = EventHub::new();
        hub.emit(PlayerEvent::Status(false));
        assert_eq!(hub.anzahl(), 0);
    }
}
