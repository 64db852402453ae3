//! Wanduhr fuer Delay-Line und Headless-Ausgabe
//!
//! Die Engine liest die Zeit nie direkt vom System, sondern ueber
//! `WallClock`. Tests setzen eine `ManualClock` ein und schalten die
//! Zeit von Hand weiter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotone Zeitquelle
pub trait WallClock: Send + Sync {
    /// Vergangene Zeit seit einem festen, beliebigen Startpunkt
    fn now(&self) -> Duration;
}

/// Systemuhr auf Basis von `Instant`
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Von Hand gesteuerte Uhr (Mikrosekunden-Aufloesung)
///
/// Klone teilen sich denselben Zeitstand.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schaltet die Uhr weiter
    pub fn advance(&self, dauer: Duration) {
        self.micros
            .fetch_add(dauer.as_micros() as u64, Ordering::SeqCst);
    }

    /// Setzt die Uhr auf einen absoluten Stand
    pub fn set(&self, zeit: Duration) {
        self.micros.store(zeit.as_micros() as u64, Ordering::SeqCst);
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_geteilt() {
        let uhr = ManualClock::new();
        let klon = uhr.clone();
        uhr.advance(Duration::from_millis(250));
        assert_eq!(klon.now(), Duration::from_millis(250));
        klon.set(Duration::from_secs(2));
        assert_eq!(uhr.now(), Duration::from_secs(2));
    }

    #[test]
    fn system_clock_monoton() {
        let uhr = SystemClock::new();
        let a = uhr.now();
        let b = uhr.now();
        assert!(b >= a);
    }
}
