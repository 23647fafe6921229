//! Audio decoder using symphonia
//!
//! Decodes a whole asset file up front into interleaved stereo f32 samples at
//! the file's native rate. Channel pools prime every channel at preload time,
//! so there is no streaming or progressive decode here.
//!
//! # Sample Format
//!
//! - Output: stereo f32 samples (interleaved: [L, R, L, R, ...])
//! - Mono files: duplicated to stereo
//! - Multi-channel: downmixed to stereo

use crate::error::{Error, Result};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Fully decoded audio for one asset
///
/// Immutable once decoded; channels share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl DecodedAudio {
    /// Wrap already-decoded interleaved stereo samples
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Interleaved stereo samples [L, R, L, R, ...]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Native sample rate of the source file
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of stereo frames
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    /// Total playable duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Streaming decoder handle wrapping symphonia
struct AudioDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    native_sample_rate: u32,
}

impl AudioDecoder {
    fn new(file_path: &Path) -> Result<Self> {
        let file = File::open(file_path)
            .map_err(|e| Error::Decode(format!("{}: {}", file_path.display(), e)))?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create hint from file extension
        let mut hint = Hint::new();
        if let Some(ext) = file_path.extension() {
            hint.with_extension(ext.to_str().unwrap_or(""));
        }

        // Probe format
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Decode(format!("{}: {:?}", file_path.display(), e)))?;

        let format = probed.format;

        let track = format.default_track().ok_or_else(|| {
            Error::Decode(format!("{}: no audio track found", file_path.display()))
        })?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let native_sample_rate = codec_params.sample_rate.unwrap_or(44100);

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("{}: {:?}", file_path.display(), e)))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            native_sample_rate,
        })
    }

    /// Decode the next packet into stereo f32, or None at end of file
    fn decode_chunk(&mut self) -> Result<Option<Vec<f32>>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None); // EOF
                }
                Err(e) => return Err(Error::Decode(format!("{:?}", e))),
            };

            // Skip packets from other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = self
                .decoder
                .decode(&packet)
                .map_err(|e| Error::Decode(format!("{:?}", e)))?;

            return Ok(Some(convert_to_stereo_f32(&decoded)?));
        }
    }
}

/// Decode an entire audio file into stereo f32 samples
pub fn decode_file<P: AsRef<Path>>(file_path: P) -> Result<DecodedAudio> {
    let mut decoder = AudioDecoder::new(file_path.as_ref())?;

    let mut samples = Vec::new();
    while let Some(chunk) = decoder.decode_chunk()? {
        samples.extend_from_slice(&chunk);
    }

    if samples.is_empty() {
        return Err(Error::Decode(format!(
            "{}: file contains no audio frames",
            file_path.as_ref().display()
        )));
    }

    Ok(DecodedAudio::new(samples, decoder.native_sample_rate))
}

/// Convert a decoded buffer of any supported sample format to stereo f32
fn convert_to_stereo_f32(buffer: &AudioBufferRef) -> Result<Vec<f32>> {
    let (planes, frames) = match buffer {
        AudioBufferRef::F32(buf) => {
            let channels = buf.spec().channels.count();
            let planes: Vec<Vec<f32>> = (0..channels).map(|ch| buf.chan(ch).to_vec()).collect();
            (planes, buf.frames())
        }
        AudioBufferRef::F64(buf) => {
            let channels = buf.spec().channels.count();
            let planes: Vec<Vec<f32>> = (0..channels)
                .map(|ch| buf.chan(ch).iter().map(|&s| s as f32).collect())
                .collect();
            (planes, buf.frames())
        }
        AudioBufferRef::S16(buf) => {
            let channels = buf.spec().channels.count();
            let planes: Vec<Vec<f32>> = (0..channels)
                .map(|ch| {
                    buf.chan(ch)
                        .iter()
                        .map(|&s| s as f32 / 32768.0)
                        .collect()
                })
                .collect();
            (planes, buf.frames())
        }
        AudioBufferRef::S32(buf) => {
            let channels = buf.spec().channels.count();
            let planes: Vec<Vec<f32>> = (0..channels)
                .map(|ch| {
                    buf.chan(ch)
                        .iter()
                        .map(|&s| s as f32 / 2147483648.0)
                        .collect()
                })
                .collect();
            (planes, buf.frames())
        }
        AudioBufferRef::U8(buf) => {
            let channels = buf.spec().channels.count();
            let planes: Vec<Vec<f32>> = (0..channels)
                .map(|ch| {
                    buf.chan(ch)
                        .iter()
                        .map(|&s| (s as f32 - 128.0) / 128.0)
                        .collect()
                })
                .collect();
            (planes, buf.frames())
        }
        _ => {
            return Err(Error::Decode(
                "unsupported sample format in source file".to_string(),
            ));
        }
    };

    Ok(interleave_stereo(&planes, frames))
}

/// Map per-channel planes to interleaved stereo
fn interleave_stereo(planes: &[Vec<f32>], frames: usize) -> Vec<f32> {
    let mut stereo = Vec::with_capacity(frames * 2);

    match planes.len() {
        0 => {}
        1 => {
            // Mono: duplicate to stereo
            for &sample in &planes[0] {
                stereo.push(sample);
                stereo.push(sample);
            }
        }
        2 => {
            for i in 0..frames {
                stereo.push(planes[0][i]);
                stereo.push(planes[1][i]);
            }
        }
        n => {
            // Multi-channel: average even channels into left, odd into right
            let half = (n as f32 / 2.0).max(1.0);
            for i in 0..frames {
                let mut left_sum = 0.0f32;
                let mut right_sum = 0.0f32;
                for (ch, plane) in planes.iter().enumerate() {
                    if ch % 2 == 0 {
                        left_sum += plane[i];
                    } else {
                        right_sum += plane[i];
                    }
                }
                stereo.push(left_sum / half);
                stereo.push(right_sum / half);
            }
        }
    }

    stereo
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoded_audio_metrics() {
        let audio = DecodedAudio::new(vec![0.0; 88200], 44100);
        assert_eq!(audio.frames(), 44100);
        assert!((audio.duration_secs() - 1.0).abs() < 1e-9);
        assert_eq!(audio.sample_rate(), 44100);
    }

    #[test]
    fn test_interleave_mono_duplicates() {
        let planes = vec![vec![0.1, 0.2]];
        let stereo = interleave_stereo(&planes, 2);
        assert_eq!(stereo, vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn test_interleave_stereo_passthrough() {
        let planes = vec![vec![0.1, 0.2], vec![0.3, 0.4]];
        let stereo = interleave_stereo(&planes, 2);
        assert_eq!(stereo, vec![0.1, 0.3, 0.2, 0.4]);
    }

    #[test]
    fn test_decode_wav_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..4410 {
            let t = i as f32 / 44100.0;
            writer
                .write_sample((t * 440.0 * std::f32::consts::TAU).sin() * 0.5)
                .unwrap();
        }
        writer.finalize().unwrap();

        let audio = decode_file(&path).unwrap();
        assert_eq!(audio.sample_rate(), 44100);
        assert_eq!(audio.frames(), 4410);
        assert!((audio.duration_secs() - 0.1).abs() < 1e-3);
    }

    #[test]
    fn test_decode_missing_file_errors() {
        let err = decode_file("/nonexistent/missing.wav").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_decode_garbage_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not a wav file").unwrap();

        assert!(decode_file(&path).is_err());
    }
}
