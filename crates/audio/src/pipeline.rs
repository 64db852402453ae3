//! Audio-Processing-Pipeline der Wiedergabe
//!
//! Verbindet DSP-Module in fester Reihenfolge. Chunks werden in strikter
//! Abspielreihenfolge durchgereicht, der Filterzustand laeuft deshalb
//! lueckenlos ueber Chunk-Grenzen weiter.

use crate::dsp::AudioProcessor;

/// Audio-Verarbeitungs-Pipeline
///
/// Wendet eine Kette von `AudioProcessor`-Implementierungen
/// sequenziell auf jeden Block an.
pub struct AudioPipeline {
    processors: Vec<Box<dyn AudioProcessor>>,
}

impl AudioPipeline {
    /// Erstellt eine neue Pipeline mit der gegebenen Prozessor-Kette
    pub fn new(processors: Vec<Box<dyn AudioProcessor>>) -> Self {
        Self { processors }
    }

    /// Leere Pipeline ohne Prozessoren
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Verarbeitet einen Block in-place durch die gesamte Pipeline
    pub fn process(&mut self, samples: &mut [f32]) {
        for processor in self.processors.iter_mut() {
            processor.process(samples);
        }
    }

    /// Gibt die Anzahl der Prozessoren zurueck
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Gibt zurueck ob die Pipeline leer ist
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Anzahl aktiver Prozessoren
    pub fn aktive(&self) -> usize {
        self.processors.iter().filter(|p| p.is_enabled()).count()
    }

    /// Setzt alle Prozessoren zurueck
    pub fn reset_all(&mut self) {
        for p in self.processors.iter_mut() {
            p.reset();
        }
    }

    /// Aktiviert oder deaktiviert alle Prozessoren
    pub fn set_all_enabled(&mut self, enabled: bool) {
        for p in self.processors.iter_mut() {
            p.set_enabled(enabled);
        }
    }
}

/// Erstellt die Sprachkette fuer Funk-Audio
///
/// Reihenfolge: Vorverstaerkung 1.5 -> Hochpass 800 Hz -> Tiefpass 3500 Hz
/// -> Peaking 1000 Hz +2 dB -> Peaking 1400 Hz +1 dB -> High-Shelf 2600 Hz
/// +1 dB -> Kompressor
pub fn build_voice_chain(sample_rate: u32) -> AudioPipeline {
    use crate::dsp::{
        biquad::{Biquad, FilterTyp},
        compressor::{Compressor, CompressorConfig},
        gain::Gain,
    };

    AudioPipeline::new(vec![
        Box::new(Gain::new(1.5)),
        Box::new(Biquad::new(FilterTyp::Hochpass { freq: 800.0, q: 0.7 }, sample_rate)),
        Box::new(Biquad::new(FilterTyp::Tiefpass { freq: 3500.0, q: 0.5 }, sample_rate)),
        Box::new(Biquad::new(
            FilterTyp::Peaking {
                freq: 1000.0,
                q: 1.0,
                gain_db: 2.0,
            },
            sample_rate,
        )),
        Box::new(Biquad::new(
            FilterTyp::Peaking {
                freq: 1400.0,
                q: 0.8,
                gain_db: 1.0,
            },
            sample_rate,
        )),
        Box::new(Biquad::new(
            FilterTyp::HighShelf {
                freq: 2600.0,
                gain_db: 1.0,
            },
            sample_rate,
        )),
        Box::new(Compressor::new(CompressorConfig::sprache(sample_rate as f32))),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::gain::Gain;

    #[test]
    fn pipeline_leer_passiert_unveraendert() {
        let mut pipeline = AudioPipeline::empty();
        let mut samples = vec![0.5f32; 480];
        pipeline.process(&mut samples);
        assert!(samples.iter().all(|&s| s == 0.5));
        assert_eq!(pipeline.aktive(), 0);
    }

    #[test]
    fn pipeline_mit_gain() {
        assert!(AudioPipeline::empty().is_empty());
        let mut pipeline = AudioPipeline::new(vec![Box::new(Gain::new(2.0))]);
        assert_eq!(pipeline.len(), 1);
        let mut samples = vec![0.25f32; 4];
        pipeline.process(&mut samples);
        assert!(samples.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn sprachkette_hat_7_prozessoren() {
        let pipeline = build_voice_chain(8000);
        assert_eq!(pipeline.len(), 7);
        assert_eq!(pipeline.aktive(), 7);
    }

    #[test]
    fn sprachkette_deaktiviert_unveraendert() {
        let mut pipeline = build_voice_chain(8000);
        pipeline.set_all_enabled(false);
        assert_eq!(pipeline.aktive(), 0);
        let mut samples = vec![0.1f32; 800];
        pipeline.process(&mut samples);
        assert!(samples.iter().all(|&s| s == 0.1));
    }

    #[test]
    fn sprachkette_daempft_brummen() {
        let mut pipeline = build_voice_chain(8000);
        let mut brummen: Vec<f32> = (0..8000)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 50.0 * i as f32 / 8000.0).sin())
            .collect();
        pipeline.process(&mut brummen);
        let spitze = brummen[4000..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(spitze < 0.05, "50 Hz sollte weggefiltert sein, Spitze {}", spitze);
    }

    #[test]
    fn sprachkette_laenge_erhalten_und_endlich() {
        let mut pipeline = build_voice_chain(8000);
        let mut samples: Vec<f32> = (0..960).map(|i| ((i % 7) as f32 - 3.0) / 4.0).collect();
        pipeline.process(&mut samples);
        assert_eq!(samples.len(), 960);
        assert!(samples.iter().all(|s| s.is_finite()));
        pipeline.reset_all();
    }
}
