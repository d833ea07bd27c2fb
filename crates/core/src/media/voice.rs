//! Voice selection and WAV framing for synthesized speech.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::model::{MediaBlob, PersonaParameters};
use crate::provider::{PcmAudio, ProviderError};

/// Prebuilt voices of the speech model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceProfile {
    Fenrir,
    Charon,
    Puck,
    Zephyr,
    Kore,
}

impl VoiceProfile {
    /// Pick a voice from gender, age bracket and style keywords.
    ///
    /// The same parameters always map to the same voice.
    pub fn for_persona(params: &PersonaParameters) -> Self {
        let style = params.style.to_lowercase();
        let young = params.age < 30;

        if params.is_male() {
            if style.contains("fitness") || style.contains("active") {
                VoiceProfile::Fenrir
            } else if style.contains("professional") || !young {
                VoiceProfile::Charon
            } else {
                VoiceProfile::Puck
            }
        } else if style.contains("fitness") || style.contains("sporty") || young {
            VoiceProfile::Zephyr
        } else {
            VoiceProfile::Kore
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VoiceProfile::Fenrir => "Fenrir",
            VoiceProfile::Charon => "Charon",
            VoiceProfile::Puck => "Puck",
            VoiceProfile::Zephyr => "Zephyr",
            VoiceProfile::Kore => "Kore",
        }
    }
}

/// Frame raw little-endian 16-bit PCM into a WAV container.
pub fn wav_from_pcm(pcm: &PcmAudio) -> Result<MediaBlob, ProviderError> {
    let spec = WavSpec {
        channels: pcm.channels.max(1),
        sample_rate: pcm.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut buffer = Vec::with_capacity(pcm.data.len() + 44);
    {
        let mut writer = WavWriter::new(Cursor::new(&mut buffer), spec)
            .map_err(|e| ProviderError::InvalidMedia(e.to_string()))?;
        // A trailing odd byte is not a whole sample.
        for chunk in pcm.data.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))
                .map_err(|e| ProviderError::InvalidMedia(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| ProviderError::InvalidMedia(e.to_string()))?;
    }

    Ok(MediaBlob::new("audio/wav", buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn persona(gender: &str, age: u32, style: &str) -> PersonaParameters {
        let mut params = fixtures::persona_parameters();
        params.gender = gender.to_string();
        params.age = age;
        params.style = style.to_string();
        params
    }

    #[test]
    fn test_male_voices() {
        assert_eq!(
            VoiceProfile::for_persona(&persona("male", 24, "Fitness coach")),
            VoiceProfile::Fenrir
        );
        assert_eq!(
            VoiceProfile::for_persona(&persona("male", 24, "Active outdoors")),
            VoiceProfile::Fenrir
        );
        assert_eq!(
            VoiceProfile::for_persona(&persona("male", 24, "professional")),
            VoiceProfile::Charon
        );
        assert_eq!(
            VoiceProfile::for_persona(&persona("male", 35, "travel")),
            VoiceProfile::Charon
        );
        assert_eq!(
            VoiceProfile::for_persona(&persona("male", 22, "travel")),
            VoiceProfile::Puck
        );
    }

    #[test]
    fn test_other_voices() {
        assert_eq!(
            VoiceProfile::for_persona(&persona("female", 40, "sporty")),
            VoiceProfile::Zephyr
        );
        assert_eq!(
            VoiceProfile::for_persona(&persona("female", 25, "luxury")),
            VoiceProfile::Zephyr
        );
        assert_eq!(
            VoiceProfile::for_persona(&persona("female", 30, "luxury")),
            VoiceProfile::Kore
        );
        assert_eq!(
            VoiceProfile::for_persona(&persona("non-binary", 45, "art")),
            VoiceProfile::Kore
        );
    }

    #[test]
    fn test_wav_header() {
        let pcm = PcmAudio {
            sample_rate: 24_000,
            channels: 1,
            data: vec![0x01, 0x00, 0xff, 0x7f, 0x00, 0x80],
        };
        let wav = wav_from_pcm(&pcm).unwrap();
        let bytes = wav.data();

        assert_eq!(wav.mime_type(), "audio/wav");
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(u16::from_le_bytes([bytes[22], bytes[23]]), 1);
        assert_eq!(
            u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]),
            24_000
        );
        assert_eq!(u16::from_le_bytes([bytes[34], bytes[35]]), 16);
        assert_eq!(bytes.len(), 44 + 6);
        assert_eq!(&bytes[44..], &pcm.data[..]);
    }

    #[test]
    fn test_wav_ignores_trailing_byte() {
        let pcm = PcmAudio {
            sample_rate: 24_000,
            channels: 1,
            data: vec![0x01, 0x00, 0x02],
        };
        let wav = wav_from_pcm(&pcm).unwrap();
        assert_eq!(wav.len(), 44 + 2);
    }
}
