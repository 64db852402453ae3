//! WAV-Container fuer Aufnahmen (RIFF/WAVE, lineares PCM)
//!
//! ## Header-Format (44 Bytes, little-endian)
//!
//! ```text
//! Offset  Len  Beschreibung
//! ------  ---  -----------
//!  0       4   "RIFF"
//!  4       4   36 + Datenlaenge
//!  8       4   "WAVE"
//! 12       4   "fmt "
//! 16       4   16 (Groesse des fmt-Blocks)
//! 20       2   1 (lineares PCM)
//! 22       2   Kanaele
//! 24       4   Abtastrate
//! 28       4   Byte-Rate = Abtastrate * Kanaele * Bits/8
//! 32       2   Block-Align = Kanaele * Bits/8
//! 34       2   Bits pro Sample
//! 36       4   "data"
//! 40       4   Datenlaenge
//! 44+      N   PCM-Daten
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, ProtocolResult};

/// Laenge des kanonischen WAV-Headers
pub const WAV_HEADER_LAENGE: usize = 44;

/// Beschreibung eines PCM-WAV-Containers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    /// Laenge der PCM-Daten in Bytes
    pub data_length: u32,
    /// Anzahl Kanaele
    pub num_channels: u16,
    /// Abtastrate in Hz
    pub sample_rate: u32,
    /// Bits pro Sample
    pub bits_per_sample: u16,
}

impl WavHeader {
    /// Header fuer 16-bit Mono-PCM
    pub fn pcm16_mono(sample_rate: u32, data_length: u32) -> Self {
        Self {
            data_length,
            num_channels: 1,
            sample_rate,
            bits_per_sample: 16,
        }
    }

    /// Bytes pro Sample-Frame (alle Kanaele)
    pub fn block_align(&self) -> u16 {
        self.num_channels * self.bits_per_sample / 8
    }

    /// Bytes pro Sekunde
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.num_channels as u32 * self.bits_per_sample as u32 / 8
    }

    /// Anzahl Samples pro Kanal in den Nutzdaten
    pub fn sample_count(&self) -> u32 {
        match self.block_align() {
            0 => 0,
            align => self.data_length / align as u32,
        }
    }

    /// Serialisiert den Header byte-genau
    pub fn encode(&self) -> [u8; WAV_HEADER_LAENGE] {
        let mut buf = [0u8; WAV_HEADER_LAENGE];
        buf[0..4].copy_from_slice(b"RIFF");
        buf[4..8].copy_from_slice(&(36 + self.data_length).to_le_bytes());
        buf[8..12].copy_from_slice(b"WAVE");
        buf[12..16].copy_from_slice(b"fmt ");
        buf[16..20].copy_from_slice(&16u32.to_le_bytes());
        buf[20..22].copy_from_slice(&1u16.to_le_bytes());
        buf[22..24].copy_from_slice(&self.num_channels.to_le_bytes());
        buf[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        buf[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        buf[32..34].copy_from_slice(&self.block_align().to_le_bytes());
        buf[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        buf[36..40].copy_from_slice(b"data");
        buf[40..44].copy_from_slice(&self.data_length.to_le_bytes());
        buf
    }

    /// Parst einen kanonischen 44-Byte-Header
    ///
    /// # Fehler
    /// - `WavZuKurz` bei weniger als 44 Bytes
    /// - `WavKennung` wenn RIFF/WAVE/fmt/data nicht an ihrer Stelle stehen
    /// - `WavFormat` bei anderem Format als lineares PCM
    pub fn parse(buf: &[u8]) -> ProtocolResult<Self> {
        if buf.len() < WAV_HEADER_LAENGE {
            return Err(ProtocolError::WavZuKurz(buf.len()));
        }

        for (offset, kennung) in [(0, "RIFF"), (8, "WAVE"), (12, "fmt "), (36, "data")] {
            if &buf[offset..offset + 4] != kennung.as_bytes() {
                return Err(ProtocolError::WavKennung {
                    offset,
                    erwartet: kennung,
                });
            }
        }

        let u16_at = |o: usize| u16::from_le_bytes([buf[o], buf[o + 1]]);
        let u32_at = |o: usize| u32::from_le_bytes([buf[o], buf[o + 1], buf[o + 2], buf[o + 3]]);

        let fmt_groesse = u32_at(16);
        let format = u16_at(20);
        if fmt_groesse != 16 || format != 1 {
            return Err(ProtocolError::WavFormat(format!(
                "fmt-Groesse {fmt_groesse}, Format {format}"
            )));
        }

        Ok(Self {
            num_channels: u16_at(22),
            sample_rate: u32_at(24),
            bits_per_sample: u16_at(34),
            data_length: u32_at(40),
        })
    }
}

/// Baut eine vollstaendige WAV-Datei aus aufgezeichneten Roh-Frames
///
/// Gibt `Ok(None)` zurueck wenn keine Frames vorliegen – eine leere
/// Aufnahme ist kein Fehler, sondern "nichts zu exportieren".
pub fn encode_wav<I, B>(frames: I, sample_rate: u32) -> ProtocolResult<Option<Bytes>>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let frames: Vec<B> = frames.into_iter().collect();
    if frames.is_empty() {
        return Ok(None);
    }

    let gesamt: usize = frames.iter().map(|f| f.as_ref().len()).sum();
    // 36 + Datenlaenge muss in das u32-Feld passen
    let data_length = u32::try_from(gesamt)
        .ok()
        .filter(|l| l.checked_add(36).is_some())
        .ok_or(ProtocolError::WavZuGross(gesamt))?;

    let header = WavHeader::pcm16_mono(sample_rate, data_length);
    let mut buf = BytesMut::with_capacity(WAV_HEADER_LAENGE + gesamt);
    buf.put_slice(&header.encode());
    for frame in &frames {
        buf.put_slice(frame.as_ref());
    }

    Ok(Some(buf.freeze()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_byte_genau() {
        let header = WavHeader::pcm16_mono(8000, 16000);
        let buf = header.encode();

        assert_eq!(&buf[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(buf[4..8].try_into().unwrap()), 16036);
        assert_eq!(&buf[8..12], b"WAVE");
        assert_eq!(&buf[12..16], b"fmt ");
        assert_eq!(u32::from_le_bytes(buf[16..20].try_into().unwrap()), 16);
        assert_eq!(u16::from_le_bytes(buf[20..22].try_into().unwrap()), 1);
        assert_eq!(u16::from_le_bytes(buf[22..24].try_into().unwrap()), 1);
        assert_eq!(u32::from_le_bytes(buf[24..28].try_into().unwrap()), 8000);
        assert_eq!(u32::from_le_bytes(buf[28..32].try_into().unwrap()), 16000);
        assert_eq!(u16::from_le_bytes(buf[32..34].try_into().unwrap()), 2);
        assert_eq!(u16::from_le_bytes(buf[34..36].try_into().unwrap()), 16);
        assert_eq!(&buf[36..40], b"data");
        assert_eq!(u32::from_le_bytes(buf[40..44].try_into().unwrap()), 16000);
    }

    #[test]
    fn header_parse_nach_encode() {
        let header = WavHeader::pcm16_mono(8000, 16000);
        let geparst = WavHeader::parse(&header.encode()).unwrap();
        assert_eq!(geparst, header);
        assert_eq!(geparst.sample_count(), 8000);
    }

    #[test]
    fn parse_zu_kurz() {
        assert_eq!(WavHeader::parse(&[0u8; 10]), Err(ProtocolError::WavZuKurz(10)));
    }

    #[test]
    fn parse_falsche_kennung() {
        let mut buf = WavHeader::pcm16_mono(8000, 0).encode();
        buf[8..12].copy_from_slice(b"AVI ");
        assert_eq!(
            WavHeader::parse(&buf),
            Err(ProtocolError::WavKennung {
                offset: 8,
                erwartet: "WAVE"
            })
        );
    }

    #[test]
    fn parse_kein_pcm() {
        let mut buf = WavHeader::pcm16_mono(8000, 0).encode();
        buf[20..22].copy_from_slice(&3u16.to_le_bytes()); // IEEE float
        assert!(matches!(WavHeader::parse(&buf), Err(ProtocolError::WavFormat(_))));
    }

    #[test]
    fn encode_wav_leer_ist_none() {
        let frames: Vec<Vec<u8>> = Vec::new();
        assert_eq!(encode_wav(frames, 8000).unwrap(), None);
    }

    #[test]
    fn encode_wav_haengt_frames_an() {
        let frames = vec![vec![1u8, 2], vec![3u8, 4, 5, 6]];
        let wav = encode_wav(frames, 8000).unwrap().unwrap();
        assert_eq!(wav.len(), WAV_HEADER_LAENGE + 6);
        assert_eq!(&wav[WAV_HEADER_LAENGE..], &[1, 2, 3, 4, 5, 6]);
        let header = WavHeader::parse(&wav).unwrap();
        assert_eq!(header.data_length, 6);
        assert_eq!(header.sample_count(), 3);
    }

    #[test]
    fn encode_wav_mit_hound_lesbar() {
        let samples: Vec<i16> = (0..8000).map(|i| ((i % 200) as i16 - 100) * 100).collect();
        let frames: Vec<Vec<u8>> = samples
            .chunks(800)
            .map(|c| c.iter().flat_map(|s| s.to_le_bytes()).collect())
            .collect();

        let wav = encode_wav(frames, 8000).unwrap().unwrap();
        let mut reader = hound::WavReader::new(std::io::Cursor::new(wav.to_vec())).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 8000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 8000);

        let gelesen: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(gelesen, samples);
    }
}
