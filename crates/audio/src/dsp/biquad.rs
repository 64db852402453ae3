//! Biquad-Filter (RBJ Audio-EQ-Cookbook)
//!
//! Ein Filter zweiter Ordnung in Direktform I. Die Koeffizienten werden
//! einmal bei der Erzeugung berechnet, der Zustand laeuft ueber
//! Chunk-Grenzen hinweg weiter.

use std::f32::consts::PI;

use super::AudioProcessor;

/// Filtertyp mit seinen Parametern
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterTyp {
    /// Hochpass (Grenzfrequenz, Guete)
    Hochpass { freq: f32, q: f32 },
    /// Tiefpass (Grenzfrequenz, Guete)
    Tiefpass { freq: f32, q: f32 },
    /// Glockenfilter (Mittenfrequenz, Guete, Verstaerkung in dB)
    Peaking { freq: f32, q: f32, gain_db: f32 },
    /// Hoehen-Kuhschwanz (Eckfrequenz, Verstaerkung in dB, Flankensteilheit 1)
    HighShelf { freq: f32, gain_db: f32 },
}

impl FilterTyp {
    fn freq(&self) -> f32 {
        match *self {
            Self::Hochpass { freq, .. }
            | Self::Tiefpass { freq, .. }
            | Self::Peaking { freq, .. }
            | Self::HighShelf { freq, .. } => freq,
        }
    }
}

/// Normalisierte Koeffizienten (a0 = 1)
#[derive(Debug, Clone, Copy, PartialEq)]
struct Koeffizienten {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Koeffizienten {
    fn durchlass() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    fn berechnen(typ: FilterTyp, sample_rate: f32) -> Self {
        let w0 = 2.0 * PI * typ.freq() / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();

        let (b0, b1, b2, a0, a1, a2) = match typ {
            FilterTyp::Hochpass { q, .. } => {
                let alpha = sin_w0 / (2.0 * q);
                (
                    (1.0 + cos_w0) / 2.0,
                    -(1.0 + cos_w0),
                    (1.0 + cos_w0) / 2.0,
                    1.0 + alpha,
                    -2.0 * cos_w0,
                    1.0 - alpha,
                )
            }
            FilterTyp::Tiefpass { q, .. } => {
                let alpha = sin_w0 / (2.0 * q);
                (
                    (1.0 - cos_w0) / 2.0,
                    1.0 - cos_w0,
                    (1.0 - cos_w0) / 2.0,
                    1.0 + alpha,
                    -2.0 * cos_w0,
                    1.0 - alpha,
                )
            }
            FilterTyp::Peaking { q, gain_db, .. } => {
                let a = 10.0_f32.powf(gain_db / 40.0);
                let alpha = sin_w0 / (2.0 * q);
                (
                    1.0 + alpha * a,
                    -2.0 * cos_w0,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos_w0,
                    1.0 - alpha / a,
                )
            }
            FilterTyp::HighShelf { gain_db, .. } => {
                let a = 10.0_f32.powf(gain_db / 40.0);
                // Flankensteilheit S = 1
                let alpha = sin_w0 / 2.0 * 2.0_f32.sqrt();
                let wurzel_a = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + wurzel_a),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - wurzel_a),
                    (a + 1.0) - (a - 1.0) * cos_w0 + wurzel_a,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - wurzel_a,
                )
            }
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Biquad-Prozessor fuer einen Mono-Kanal
pub struct Biquad {
    typ: FilterTyp,
    koeff: Koeffizienten,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
    enabled: bool,
}

impl Biquad {
    /// Erstellt einen Filter fuer die gegebene Abtastrate
    ///
    /// Liegt die Frequenz bei oder ueber Nyquist, arbeitet der Filter als
    /// Durchlass.
    pub fn new(typ: FilterTyp, sample_rate: u32) -> Self {
        let fs = sample_rate as f32;
        let koeff = if typ.freq() > 0.0 && typ.freq() < fs / 2.0 {
            Koeffizienten::berechnen(typ, fs)
        } else {
            Koeffizienten::durchlass()
        };

        Self {
            typ,
            koeff,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
            enabled: true,
        }
    }

    pub fn typ(&self) -> FilterTyp {
        self.typ
    }

    /// Gibt zurueck ob der Filter wegen Nyquist als Durchlass arbeitet
    pub fn ist_durchlass(&self) -> bool {
        self.koeff == Koeffizienten::durchlass()
    }
}

impl AudioProcessor for Biquad {
    fn process(&mut self, samples: &mut [f32]) {
        if !self.enabled {
            return;
        }
        let k = self.koeff;
        for s in samples.iter_mut() {
            let x = *s;
            let y = k.b0 * x + k.b1 * self.x1 + k.b2 * self.x2 - k.a1 * self.y1 - k.a2 * self.y2;
            self.x2 = self.x1;
            self.x1 = x;
            self.y2 = self.y1;
            self.y1 = y;
            *s = y;
        }
    }

    fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

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

    /// RMS eines eingeschwungenen Sinus nach dem Filter
    fn antwort(filter: &mut Biquad, freq: f32, fs: u32) -> f32 {
        let n = fs as usize;
        let mut samples: Vec<f32> = (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / fs as f32).sin())
            .collect();
        filter.process(&mut samples);
        let rest = &samples[n / 2..];
        (rest.iter().map(|s| s * s).sum::<f32>() / rest.len() as f32).sqrt()
    }

    const SINUS_RMS: f32 = std::f32::consts::FRAC_1_SQRT_2;

    #[test]
    fn hochpass_daempft_tiefen() {
        let mut hp = Biquad::new(FilterTyp::Hochpass { freq: 800.0, q: 0.7 }, 8000);
        assert!(antwort(&mut hp, 100.0, 8000) < 0.05);
        hp.reset();
        assert!(antwort(&mut hp, 2500.0, 8000) > 0.6);
    }

    #[test]
    fn tiefpass_daempft_hoehen() {
        let mut lp = Biquad::new(FilterTyp::Tiefpass { freq: 1000.0, q: 0.7 }, 8000);
        assert!(antwort(&mut lp, 3800.0, 8000) < 0.05);
        lp.reset();
        assert!(antwort(&mut lp, 200.0, 8000) > 0.65);
    }

    #[test]
    fn peaking_hebt_mittenfrequenz() {
        let mut pk = Biquad::new(
            FilterTyp::Peaking {
                freq: 1000.0,
                q: 1.0,
                gain_db: 6.0,
            },
            8000,
        );
        let rms = antwort(&mut pk, 1000.0, 8000);
        // +6 dB ~ Faktor 2
        assert!((rms / SINUS_RMS - 2.0).abs() < 0.1, "Faktor war {}", rms / SINUS_RMS);
    }

    #[test]
    fn ueber_nyquist_durchlass() {
        let mut lp = Biquad::new(FilterTyp::Tiefpass { freq: 5000.0, q: 0.5 }, 8000);
        assert!(lp.ist_durchlass());
        let mut samples = vec![0.3f32, -0.2, 0.1];
        lp.process(&mut samples);
        assert_eq!(samples, vec![0.3, -0.2, 0.1]);
    }

    #[test]
    fn deaktiviert_unveraendert() {
        let mut hp = Biquad::new(FilterTyp::Hochpass { freq: 800.0, q: 0.7 }, 8000);
        hp.set_enabled(false);
        let mut samples = vec![0.5f32; 16];
        hp.process(&mut samples);
        assert!(samples.iter().all(|&s| s == 0.5));
    }
}
