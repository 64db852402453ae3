//! Dynamik-Kompressor mit weichem Knie
//!
//! Die Pegelerkennung laeuft pro Sample in dB. Unterhalb von
//! `threshold - knee/2` bleibt das Signal unveraendert, oberhalb von
//! `threshold + knee/2` gilt das volle Verhaeltnis, dazwischen wird
//! quadratisch uebergeblendet. Die Gain-Reduktion wird mit getrennten
//! Attack/Release-Zeiten geglaettet.

use super::AudioProcessor;

/// Konfiguration fuer den Kompressor
#[derive(Debug, Clone)]
pub struct CompressorConfig {
    /// Einsatzpunkt in dBFS
    pub threshold_db: f32,
    /// Breite des weichen Knies in dB
    pub knee_db: f32,
    /// Kompressionsverhaeltnis (4.0 = 4:1)
    pub ratio: f32,
    /// Attack-Zeit in Sekunden
    pub attack_secs: f32,
    /// Release-Zeit in Sekunden
    pub release_secs: f32,
    /// Abtastrate in Hz
    pub sample_rate: f32,
}

impl CompressorConfig {
    /// Einstellung fuer die Sprachkette des Empfaengers
    pub fn sprache(sample_rate: f32) -> Self {
        Self {
            threshold_db: -24.0,
            knee_db: 20.0,
            ratio: 4.0,
            attack_secs: 0.002,
            release_secs: 0.25,
            sample_rate,
        }
    }

    fn time_to_coeff(time_secs: f32, sample_rate: f32) -> f32 {
        if time_secs <= 0.0 {
            return 0.0;
        }
        (-1.0 / (time_secs * sample_rate)).exp()
    }
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self::sprache(8000.0)
    }
}

/// Kompressor-Prozessor
pub struct Compressor {
    config: CompressorConfig,
    attack_coeff: f32,
    release_coeff: f32,
    /// Aktuelle (geglaettete) Gain-Reduktion in dB, <= 0
    reduktion_db: f32,
    enabled: bool,
}

impl Compressor {
    pub fn new(config: CompressorConfig) -> Self {
        Self {
            attack_coeff: CompressorConfig::time_to_coeff(config.attack_secs, config.sample_rate),
            release_coeff: CompressorConfig::time_to_coeff(config.release_secs, config.sample_rate),
            reduktion_db: 0.0,
            config,
            enabled: true,
        }
    }

    /// Aktuelle Gain-Reduktion in dB (0 = keine)
    pub fn reduktion_db(&self) -> f32 {
        self.reduktion_db
    }

    /// Statische Kennlinie: gewuenschte Reduktion fuer einen Eingangspegel
    fn kennlinie(&self, pegel_db: f32) -> f32 {
        let CompressorConfig {
            threshold_db,
            knee_db,
            ratio,
            ..
        } = self.config;
        let steigung = 1.0 / ratio - 1.0;
        let ueber = pegel_db - threshold_db;

        if knee_db > 0.0 && ueber.abs() <= knee_db / 2.0 {
            let x = ueber + knee_db / 2.0;
            steigung * x * x / (2.0 * knee_db)
        } else if ueber > 0.0 {
            steigung * ueber
        } else {
            0.0
        }
    }
}

impl AudioProcessor for Compressor {
    fn process(&mut self, samples: &mut [f32]) {
        if !self.enabled {
            return;
        }

        for sample in samples.iter_mut() {
            let pegel_db = 20.0 * sample.abs().max(1e-6).log10();
            let ziel = self.kennlinie(pegel_db);

            // Mehr Reduktion: Attack, weniger Reduktion: Release
            let coeff = if ziel < self.reduktion_db {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.reduktion_db = coeff * self.reduktion_db + (1.0 - coeff) * ziel;

            *sample *= 10.0_f32.powf(self.reduktion_db / 20.0);
        }
    }

    fn reset(&mut self) {
        self.reduktion_db = 0.0;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}
