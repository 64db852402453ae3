//! Fester Verstaerker am Anfang der Sprachkette

use super::AudioProcessor;

/// Multipliziert jedes Sample mit einem festen Faktor
pub struct Gain {
    faktor: f32,
    enabled: bool,
}

impl Gain {
    pub fn new(faktor: f32) -> Self {
        Self {
            faktor,
            enabled: true,
        }
    }

    pub fn faktor(&self) -> f32 {
        self.faktor
    }
}

impl AudioProcessor for Gain {
    fn process(&mut self, samples: &mut [f32]) {
        if !self.enabled {
            return;
        }
        for s in samples.iter_mut() {
            *s *= self.faktor;
        }
    }

    fn reset(&mut self) {}

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_skaliert() {
        let mut g = Gain::new(1.5);
        let mut samples = vec![0.2f32, -0.4];
        g.process(&mut samples);
        assert!((samples[0] - 0.3).abs() < 1e-6);
        assert!((samples[1] + 0.6).abs() < 1e-6);
    }
}
