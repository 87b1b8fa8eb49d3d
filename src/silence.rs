use thiserror::Error;
use tracing::debug;

use crate::audio::AudioTrack;

/// Tuning for intro detection. Defaults were tuned by ear on the hymnal recordings.
#[derive(Debug, Clone, PartialEq)]
pub struct IntroParams {
    /// Earliest accepted intro end, in ms
    pub min_ms: u64,
    /// Latest accepted intro end, in ms
    pub max_ms: u64,
    pub min_silence_len_ms: u64,
    /// Silence is anything at or below (track dBFS - offset)
    pub silence_thresh_db_offset: f64,
}

impl Default for IntroParams {
    fn default() -> Self {
        IntroParams {
            min_ms: 5_000,
            max_ms: 25_000,
            min_silence_len_ms: 1_000,
            silence_thresh_db_offset: 16.0,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("minimum silence length must be greater than 0 ms")]
    ZeroSilenceLength,
    #[error("intro window is empty: min {min_ms} ms > max {max_ms} ms")]
    EmptyWindow { min_ms: u64, max_ms: u64 },
    #[error("silence threshold offset must be finite, got {0}")]
    NonFiniteOffset(f64),
}

impl IntroParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.min_silence_len_ms == 0 {
            return Err(ParamsError::ZeroSilenceLength);
        }
        if self.min_ms > self.max_ms {
            return Err(ParamsError::EmptyWindow {
                min_ms: self.min_ms,
                max_ms: self.max_ms,
            });
        }
        if !self.silence_thresh_db_offset.is_finite() {
            return Err(ParamsError::NonFiniteOffset(self.silence_thresh_db_offset));
        }
        Ok(())
    }
}

/// Half-open `[start_ms, end_ms)` span whose energy stays under the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceInterval {
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Sum of squared samples up to every millisecond boundary of a track.
struct EnergyIndex {
    prefix: Vec<f64>,
    frames: Vec<usize>,
    channels: usize,
}

impl EnergyIndex {
    fn new(track: &AudioTrack, len_ms: u64) -> Self {
        let channels = track.channels() as usize;
        let samples = track.samples();
        let frame_count = track.frame_count();
        let rate = track.sample_rate() as u64;

        let mut prefix = Vec::with_capacity(len_ms as usize + 1);
        let mut frames = Vec::with_capacity(len_ms as usize + 1);
        let mut acc = 0.0_f64;
        let mut frame = 0usize;

        for ms in 0..=len_ms {
            let boundary = ((ms * rate / 1000) as usize).min(frame_count);
            while frame < boundary {
                acc += samples[frame * channels..(frame + 1) * channels]
                    .iter()
                    .map(|&s| {
                        let s = s as f64;
                        s * s
                    })
                    .sum::<f64>();
                frame += 1;
            }
            prefix.push(acc);
            frames.push(boundary);
        }

        EnergyIndex {
            prefix,
            frames,
            channels,
        }
    }

    /// RMS over all channels of `[start_ms, end_ms)`.
    fn rms(&self, start_ms: u64, end_ms: u64) -> f64 {
        let (a, b) = (start_ms as usize, end_ms as usize);
        let count = (self.frames[b] - self.frames[a]) * self.channels;
        if count == 0 {
            return 0.0;
        }
        let energy = (self.prefix[b] - self.prefix[a]).max(0.0);
        (energy / count as f64).sqrt()
    }
}

fn db_to_amplitude(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Finds every stretch of at least `min_silence_len_ms` at or below `silence_thresh_db`.
///
/// Each millisecond offset starts a candidate window of `min_silence_len_ms`.
/// Silent windows that overlap or touch are merged, so an interval ends
/// `min_silence_len_ms` after its last silent window start.
pub fn detect_silence(
    track: &AudioTrack,
    min_silence_len_ms: u64,
    silence_thresh_db: f64,
) -> Vec<SilenceInterval> {
    let len_ms = track.len_ms();
    if min_silence_len_ms == 0 || len_ms < min_silence_len_ms {
        return Vec::new();
    }

    let threshold = db_to_amplitude(silence_thresh_db);
    let energy = EnergyIndex::new(track, len_ms);

    let mut intervals = Vec::new();
    // (first silent start, last silent start) of the range being built
    let mut current: Option<(u64, u64)> = None;

    for start in 0..=len_ms - min_silence_len_ms {
        if energy.rms(start, start + min_silence_len_ms) > threshold {
            continue;
        }
        current = match current {
            Some((first, last)) if start <= last + min_silence_len_ms => Some((first, start)),
            Some((first, last)) => {
                intervals.push(SilenceInterval {
                    start_ms: first,
                    end_ms: last + min_silence_len_ms,
                });
                Some((start, start))
            }
            None => Some((start, start)),
        };
    }

    if let Some((first, last)) = current {
        intervals.push(SilenceInterval {
            start_ms: first,
            end_ms: last + min_silence_len_ms,
        });
    }

    intervals
}

/// Start of the first silence inside the intro window, in seconds; 0.0 when none.
pub fn detect_intro(track: &AudioTrack, params: &IntroParams) -> f64 {
    let threshold = track.dbfs() - params.silence_thresh_db_offset;
    let silences = detect_silence(track, params.min_silence_len_ms, threshold);
    debug!(
        "Threshold {:.2} dBFS, {} silence ranges: {:?}",
        threshold,
        silences.len(),
        silences
    );

    silences
        .iter()
        .find(|s| (params.min_ms..=params.max_ms).contains(&s.start_ms))
        .map(|s| s.start_ms as f64 / 1000.0)
        .unwrap_or(0.0)
}
