//! Lautstaerke-Kontrolle der Ausgabe
//!
//! Ein einzelner Master-Gain (0.0..2.0, 1.0 = unveraendert) mit sanftem
//! Uebergang pro Sample, damit Aenderungen nicht klicken.

/// Obergrenze des Master-Gains
pub const MAX_VOLUME: f32 = 2.0;

/// Lautstaerke-Kontroller fuer die Ausgabe
#[derive(Debug, Clone)]
pub struct VolumeController {
    /// Aktuell angewendeter Gain
    volume: f32,
    /// Ziel-Gain (fuer sanfte Uebergaenge)
    target: f32,
    /// Glaettungskoeffizient pro Sample
    smoothing: f32,
}

impl VolumeController {
    pub fn new(volume: f32) -> Self {
        let v = clamp_volume(volume);
        Self {
            volume: v,
            target: v,
            smoothing: 0.995,
        }
    }

    /// Setzt die Lautstaerke (sanfter Uebergang)
    ///
    /// Werte ausserhalb 0..2 werden begrenzt, NaN und Unendlich werden zu 0.
    pub fn set_volume(&mut self, volume: f32) {
        self.target = clamp_volume(volume);
    }

    /// Setzt die Lautstaerke ohne Uebergang
    pub fn set_volume_sofort(&mut self, volume: f32) {
        self.set_volume(volume);
        self.volume = self.target;
    }

    /// Aktuell angewendeter Gain
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Ziel-Gain
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Wendet die Lautstaerke in-place an
    pub fn apply(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            self.volume = self.smoothing * self.volume + (1.0 - self.smoothing) * self.target;
            *s *= self.volume;
        }
    }
}

impl Default for VolumeController {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Begrenzt auf 0..2, nicht-endliche Werte werden zu 0
pub fn clamp_volume(volume: f32) -> f32 {
    if !volume.is_finite() {
        return 0.0;
    }
    volume.clamp(0.0, MAX_VOLUME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_default_eins() {
        let vc = VolumeController::default();
        assert!((vc.volume() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn volume_clamp() {
        assert_eq!(clamp_volume(99.0), 2.0);
        assert_eq!(clamp_volume(-5.0), 0.0);
        assert_eq!(clamp_volume(f32::NAN), 0.0);
        assert_eq!(clamp_volume(f32::INFINITY), 0.0);
        assert_eq!(clamp_volume(f32::NEG_INFINITY), 0.0);
        assert_eq!(clamp_volume(0.7), 0.7);
    }

    #[test]
    fn volume_sofort_skaliert() {
        let mut vc = VolumeController::default();
        vc.set_volume_sofort(0.5);
        let mut samples = vec![1.0f32; 4];
        vc.apply(&mut samples);
        for s in &samples {
            assert!((*s - 0.5).abs() < 1e-6, "Lautstaerke 0.5 erwartet, war {}", s);
        }
    }

    #[test]
    fn volume_uebergang_ist_sanft() {
        let mut vc = VolumeController::default();
        vc.set_volume(0.0);
        let mut samples = vec![1.0f32; 8];
        vc.apply(&mut samples);
        // Kein Sprung auf 0, sondern monoton fallend
        assert!(samples[0] > 0.9);
        assert!(samples.windows(2).all(|w| w[1] <= w[0]));

        let mut lang = vec![1.0f32; 8000];
        vc.apply(&mut lang);
        assert!(*lang.last().unwrap() < 1e-3);
    }
}
