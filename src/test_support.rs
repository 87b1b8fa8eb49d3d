use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;

use crate::audio::AudioTrack;

/// Half-scale square wave with digital silence over each `[start_ms, end_ms)` gap.
pub fn tone_with_gaps(sample_rate: u32, channels: u16, total_ms: u64, gaps: &[(u64, u64)]) -> Vec<f32> {
    let frames = total_ms * sample_rate as u64 / 1000;
    let mut samples = Vec::with_capacity(frames as usize * channels as usize);
    for frame in 0..frames {
        let ms = frame * 1000 / sample_rate as u64;
        let silent = gaps.iter().any(|&(start, end)| ms >= start && ms < end);
        let value = if silent {
            0.0
        } else if frame % 2 == 0 {
            0.5
        } else {
            -0.5
        };
        for _ in 0..channels {
            samples.push(value);
        }
    }
    samples
}

/// Mono track at 1 kHz, so one frame per millisecond.
pub fn track_with_gaps(total_ms: u64, gaps: &[(u64, u64)]) -> AudioTrack {
    AudioTrack::new(tone_with_gaps(1_000, 1, total_ms, gaps), 1, 1_000)
}

pub fn write_wav_i16(path: &Path, sample_rate: u32, channels: u16, samples: &[f32]) {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for &s in samples {
        let v = (s * 32_768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        writer.write_sample(v).unwrap();
    }
    writer.finalize().unwrap();
}
