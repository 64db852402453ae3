//! Sprachkette der Wiedergabe
//!
//! Vorverstaerkung, RBJ-Biquads und ein Soft-Knee-Kompressor. Die Bausteine
//! laufen in Wiedergabe-Reihenfolge ueber jeden Chunk, ihr Zustand reicht
//! also ueber Chunk-Grenzen hinweg.

pub mod biquad;
pub mod compressor;
pub mod gain;

/// Baustein der `AudioPipeline`
pub trait AudioProcessor: Send + Sync {
    /// Verarbeitet Samples in-place
    fn process(&mut self, samples: &mut [f32]);

    /// Verwirft Filter- und Huellkurvenzustand (bei neuer Verbindung)
    fn reset(&mut self);

    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);
}
