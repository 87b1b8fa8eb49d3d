use hound::{SampleFormat, WavReader};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

/// Reasons a single file could not be turned into an [`AudioTrack`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid WAV data: {0}")]
    Wav(#[from] hound::Error),

    #[error("no converter configured to decode {}", .0.display())]
    NoConverter(PathBuf),

    #[error("ffmpeg not found at '{}'", .0.display())]
    ConverterMissing(PathBuf),

    #[error("ffmpeg exited with {status}: {stderr}")]
    Converter { status: String, stderr: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Decoded waveform. Samples are interleaved and normalized to full scale 1.0.
#[derive(Debug, Clone)]
pub struct AudioTrack {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl AudioTrack {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        AudioTrack {
            samples,
            channels: channels.max(1),
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Track length in whole milliseconds, rounded to nearest.
    pub fn len_ms(&self) -> u64 {
        (self.duration_seconds() * 1000.0).round() as u64
    }

    /// Loudness of the whole track; `-inf` for digital silence.
    pub fn dbfs(&self) -> f64 {
        if self.samples.is_empty() {
            return f64::NEG_INFINITY;
        }
        let sum_of_squares: f64 = self
            .samples
            .iter()
            .map(|&s| {
                let s = s as f64;
                s * s
            })
            .sum();
        let rms = (sum_of_squares / self.samples.len() as f64).sqrt();
        20.0 * rms.log10()
    }
}

/// Loads audio files, reading WAV directly and everything else through ffmpeg.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    ffmpeg: Option<PathBuf>,
}

impl Decoder {
    pub fn new(ffmpeg: Option<PathBuf>) -> Self {
        Decoder { ffmpeg }
    }

    pub fn load(&self, path: &Path) -> Result<AudioTrack, DecodeError> {
        if is_wav(path) {
            return read_wav(WavReader::open(path)?);
        }

        let ffmpeg = self
            .ffmpeg
            .as_deref()
            .ok_or_else(|| DecodeError::NoConverter(path.to_path_buf()))?;

        // Scratch dir is removed when it drops at the end of this call.
        let scratch = tempfile::tempdir()?;
        let wav_path = scratch.path().join("decoded.wav");
        convert_to_wav(ffmpeg, path, &wav_path)?;
        read_wav(WavReader::open(&wav_path)?)
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

fn read_wav<R: Read>(reader: WavReader<R>) -> Result<AudioTrack, DecodeError> {
    let spec = reader.spec();
    debug!("WAV spec: {:?}", spec);

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let full_scale = (1u64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / full_scale))
                .collect::<Result<_, _>>()?
        }
    };

    Ok(AudioTrack::new(samples, spec.channels, spec.sample_rate))
}

fn convert_to_wav(ffmpeg: &Path, input: &Path, output: &Path) -> Result<(), DecodeError> {
    debug!("Converting {} with {}", input.display(), ffmpeg.display());

    // pcm_s16le keeps the source channel layout and sample rate
    let result = Command::new(ffmpeg)
        .args(["-v", "error", "-nostdin", "-y", "-i"])
        .arg(input)
        .args(["-vn", "-acodec", "pcm_s16le"])
        .arg(output)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| converter_error(ffmpeg, e))?;

    if !result.status.success() {
        return Err(DecodeError::Converter {
            status: result.status.to_string(),
            stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
        });
    }
    Ok(())
}

fn converter_error(ffmpeg: &Path, e: std::io::Error) -> DecodeError {
    if e.kind() == std::io::ErrorKind::NotFound {
        DecodeError::ConverterMissing(ffmpeg.to_path_buf())
    } else {
        DecodeError::Io(e)
    }
}

/// Confirms a usable ffmpeg exists, preferring an explicitly configured path.
pub fn locate_ffmpeg(explicit: Option<&Path>) -> Result<PathBuf, DecodeError> {
    let candidate = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("ffmpeg"));

    let status = Command::new(&candidate)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| converter_error(&candidate, e))?;

    if !status.success() {
        return Err(DecodeError::Converter {
            status: status.to_string(),
            stderr: "'-version' probe failed".to_string(),
        });
    }

    debug!("Using converter {}", candidate.display());
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{tone_with_gaps, write_wav_i16};
    use hound::{WavSpec, WavWriter};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn duration_and_length_follow_frame_count() {
        let track = AudioTrack::new(vec![0.0; 2 * 44_100 * 3 + 2], 2, 44_100);
        assert_eq!(track.frame_count(), 44_100 * 3 + 1);
        assert!((track.duration_seconds() - 3.0000227).abs() < 1e-6);
        assert_eq!(track.len_ms(), 3_000);
    }

    #[test]
    fn dbfs_of_half_scale_square_wave() {
        let track = AudioTrack::new(tone_with_gaps(1_000, 1, 2_000, &[]), 1, 1_000);
        assert!((track.dbfs() - (-6.0206)).abs() < 1e-3);
    }

    #[test]
    fn dbfs_of_silence_is_negative_infinity() {
        assert_eq!(AudioTrack::new(vec![0.0; 100], 1, 1_000).dbfs(), f64::NEG_INFINITY);
        assert_eq!(AudioTrack::new(Vec::new(), 1, 1_000).dbfs(), f64::NEG_INFINITY);
    }

    #[test]
    fn loads_int_wav_normalized() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("001.wav");
        write_wav_i16(&path, 8_000, 2, &[0.5, -0.5, 0.25, 0.0]);

        let track = Decoder::default().load(&path).unwrap();
        assert_eq!(track.channels(), 2);
        assert_eq!(track.sample_rate(), 8_000);
        assert_eq!(track.samples(), &[0.5, -0.5, 0.25, 0.0]);
    }

    #[test]
    fn loads_float_wav() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("float.WAV");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for s in [0.75f32, -0.125, 0.0] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let track = Decoder::default().load(&path).unwrap();
        assert_eq!(track.samples(), &[0.75, -0.125, 0.0]);
        assert_eq!(track.sample_rate(), 16_000);
    }

    #[test]
    fn corrupt_wav_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        fs::write(&path, b"definitely not RIFF").unwrap();

        let err = Decoder::default().load(&path).unwrap_err();
        assert!(matches!(err, DecodeError::Wav(_)));
    }

    #[test]
    fn non_wav_without_converter_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("001.mp3");
        fs::write(&path, b"not a real mp3").unwrap();

        let err = Decoder::default().load(&path).unwrap_err();
        assert!(matches!(err, DecodeError::NoConverter(p) if p == path));
    }

    #[test]
    fn missing_converter_is_reported() {
        let bogus = Path::new("/nonexistent/bin/ffmpeg-hymnscan");
        let err = locate_ffmpeg(Some(bogus)).unwrap_err();
        assert!(matches!(err, DecodeError::ConverterMissing(p) if p == bogus));
    }
}
