//! Spektrum-Analyse der verarbeiteten Wiedergabe
//!
//! Sitzt hinter der Sprachkette und vor der Lautstaerke. Haelt ein
//! rollierendes Fenster der zuletzt geplanten Samples und liefert daraus
//! ein geglaettetes Betragsspektrum fuer Visualisierungen.
//!
//! Glaettung und Byte-Skalierung folgen dem Verhalten eines Browser-
//! `AnalyserNode`: Blackman-Fenster, Betrag normiert auf die FFT-Groesse,
//! exponentielle Glaettung bei jeder Abfrage.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// FFT-Groesse (Samples im Analysefenster)
pub const FFT_GROESSE: usize = 1024;
/// Anzahl der Frequenz-Bins (halbe FFT-Groesse)
pub const BIN_ANZAHL: usize = FFT_GROESSE / 2;
/// Gewicht des vorherigen Spektrums bei der Glaettung
pub const STANDARD_GLAETTUNG: f32 = 0.8;

/// Untere und obere Grenze der Byte-Skalierung in dB
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    fenster: Vec<f32>,
    /// Ringpuffer der letzten `FFT_GROESSE` Samples
    verlauf: Vec<f32>,
    schreib_pos: usize,
    arbeit: Vec<Complex<f32>>,
    spektrum: Vec<f32>,
    glaettung: f32,
}

impl SpectrumAnalyser {
    pub fn new() -> Self {
        Self::mit_glaettung(STANDARD_GLAETTUNG)
    }

    pub fn mit_glaettung(glaettung: f32) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(FFT_GROESSE),
            fenster: blackman(FFT_GROESSE),
            verlauf: vec![0.0; FFT_GROESSE],
            schreib_pos: 0,
            arbeit: vec![Complex::new(0.0, 0.0); FFT_GROESSE],
            spektrum: vec![0.0; BIN_ANZAHL],
            glaettung: glaettung.clamp(0.0, 1.0),
        }
    }

    /// Nimmt einen verarbeiteten Block in das Analysefenster auf
    pub fn einspeisen(&mut self, samples: &[f32]) {
        // Laengere Bloecke: nur das Ende zaehlt
        let start = samples.len().saturating_sub(FFT_GROESSE);
        for &s in &samples[start..] {
            self.verlauf[self.schreib_pos] = s;
            self.schreib_pos = (self.schreib_pos + 1) % FFT_GROESSE;
        }
    }

    /// Berechnet das geglaettete Betragsspektrum (`BIN_ANZAHL` Werte)
    pub fn spektrum(&mut self) -> &[f32] {
        for (i, ziel) in self.arbeit.iter_mut().enumerate() {
            let s = self.verlauf[(self.schreib_pos + i) % FFT_GROESSE];
            *ziel = Complex::new(s * self.fenster[i], 0.0);
        }
        self.fft.process(&mut self.arbeit);

        let skala = 1.0 / FFT_GROESSE as f32;
        for (wert, bin) in self.spektrum.iter_mut().zip(&self.arbeit) {
            let betrag = bin.norm() * skala;
            *wert = self.glaettung * *wert + (1.0 - self.glaettung) * betrag;
            if !wert.is_finite() {
                *wert = 0.0;
            }
        }
        &self.spektrum
    }

    /// Spektrum als Bytes zwischen -100 dB (0) und -30 dB (255)
    pub fn spektrum_bytes(&mut self) -> Vec<u8> {
        self.spektrum()
            .iter()
            .map(|&betrag| {
                let db = 20.0 * betrag.max(f32::MIN_POSITIVE).log10();
                let skaliert = 255.0 * (db - MIN_DB) / (MAX_DB - MIN_DB);
                skaliert.clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    /// Zeitbereich des Analysefensters, aelteste Samples zuerst
    pub fn wellenform(&self) -> Vec<f32> {
        let (neu, alt) = self.verlauf.split_at(self.schreib_pos);
        alt.iter().chain(neu).copied().collect()
    }

    /// Leert Fenster und Glaettungszustand
    pub fn reset(&mut self) {
        self.verlauf.fill(0.0);
        self.spektrum.fill(0.0);
        self.schreib_pos = 0;
    }
}

impl Default for SpectrumAnalyser {
    fn default() -> Self {
        Self::new()
    }
}

fn blackman(n: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..n)
        .map(|i| {
            let x = i as f32 / n as f32;
            0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sinus(freq: f32, rate: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / rate).sin())
            .collect()
    }

    fn max_bin(spektrum: &[f32]) -> usize {
        spektrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn sinus_trifft_erwarteten_bin() {
        let mut a = SpectrumAnalyser::new();
        // 8 kHz / 1024 = 7.8125 Hz pro Bin, 500 Hz liegt auf Bin 64
        a.einspeisen(&sinus(500.0, 8000.0, FFT_GROESSE));
        let spektrum = a.spektrum();
        assert_eq!(spektrum.len(), BIN_ANZAHL);
        assert_eq!(max_bin(spektrum), 64);
        assert!(spektrum[64] > 10.0 * spektrum[200]);
    }

    #[test]
    fn glaettung_naehert_sich_an() {
        let mut a = SpectrumAnalyser::new();
        a.einspeisen(&sinus(1000.0, 8000.0, FFT_GROESSE));
        let erster = a.spektrum()[128];
        let zweiter = a.spektrum()[128];
        let dritter = a.spektrum()[128];
        assert!(erster > 0.0);
        assert!(zweiter > erster && dritter > zweiter);
        // Erste Abfrage: 20 % des ungeglaetteten Betrags
        assert!((zweiter - erster * 1.8).abs() < 1e-4 * erster.max(1.0));

        let mut roh = SpectrumAnalyser::mit_glaettung(0.0);
        roh.einspeisen(&sinus(1000.0, 8000.0, FFT_GROESSE));
        assert!((roh.spektrum()[128] * 0.2 - erster).abs() < 1e-5);
    }

    #[test]
    fn fenster_rolliert() {
        let mut a = SpectrumAnalyser::new();
        a.einspeisen(&vec![1.0; FFT_GROESSE]);
        a.einspeisen(&[2.0, 3.0]);
        let welle = a.wellenform();
        assert_eq!(welle.len(), FFT_GROESSE);
        assert_eq!(&welle[FFT_GROESSE - 3..], &[1.0, 2.0, 3.0]);

        // Bloecke groesser als das Fenster
        let lang: Vec<f32> = (0..FFT_GROESSE + 10).map(|i| i as f32).collect();
        a.einspeisen(&lang);
        assert_eq!(a.wellenform()[0], 10.0);
    }

    #[test]
    fn stille_ergibt_null_bytes() {
        let mut a = SpectrumAnalyser::new();
        assert!(a.spektrum_bytes().iter().all(|&b| b == 0));

        a.einspeisen(&sinus(500.0, 8000.0, FFT_GROESSE));
        for _ in 0..20 {
            a.spektrum();
        }
        let bytes = a.spektrum_bytes();
        assert_eq!(bytes.len(), BIN_ANZAHL);
        assert!(bytes[64] > 200);
    }

    #[test]
    fn reset_leert_fenster() {
        let mut a = SpectrumAnalyser::new();
        a.einspeisen(&sinus(500.0, 8000.0, FFT_GROESSE));
        a.spektrum();
        a.reset();
        assert!(a.wellenform().iter().all(|&s| s == 0.0));
        assert!(a.spektrum().iter().all(|&b| b == 0.0));
    }
}
