use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::audio::{DecodeError, Decoder};
use crate::silence::{IntroParams, detect_intro};
use crate::utils::{normalize_extension, round3, write_json_atomic};

/// One line of the output dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntroAnalysisResult {
    pub filename: String,
    pub duration_sec: f64,
    pub intro_duration_sec: f64,
}

#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: DecodeError,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub results: Vec<IntroAnalysisResult>,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub extension: String,
    pub params: IntroParams,
}

impl Default for ScanSettings {
    fn default() -> Self {
        ScanSettings {
            extension: "mp3".to_string(),
            params: IntroParams::default(),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

/// Audio files directly inside `dir`, sorted by file name.
pub fn list_audio_files(dir: &Path, extension: &str) -> anyhow::Result<Vec<PathBuf>> {
    let meta = fs::metadata(dir)
        .with_context(|| format!("Cannot read input folder {}", dir.display()))?;
    if !meta.is_dir() {
        bail!("Input path {} is not a folder", dir.display());
    }

    let ext = normalize_extension(extension);
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && has_extension(path, &ext) {
            files.push(path.to_path_buf());
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

pub fn analyze_file(
    path: &Path,
    decoder: &Decoder,
    params: &IntroParams,
) -> Result<IntroAnalysisResult, DecodeError> {
    info!("Processing {}", path.display());
    let track = decoder.load(path)?;

    let filename = file_name(path);
    info!(
        "{} - {} channels, {} Hz",
        filename,
        track.channels(),
        track.sample_rate()
    );

    let item = IntroAnalysisResult {
        duration_sec: round3(track.duration_seconds()),
        intro_duration_sec: round3(detect_intro(&track, params)),
        filename,
    };
    info!(
        "{}: duration {:.3}s, intro {:.3}s",
        item.filename, item.duration_sec, item.intro_duration_sec
    );
    Ok(item)
}

/// Analyzes one file into `report`. A decoded file is checkpointed to
/// `output_path` before this returns; a decode failure is only logged.
pub fn process_file(
    path: &Path,
    decoder: &Decoder,
    params: &IntroParams,
    output_path: &Path,
    report: &mut ScanReport,
) -> anyhow::Result<()> {
    match analyze_file(path, decoder, params) {
        Ok(item) => {
            report.results.push(item);
            write_json_atomic(output_path, &report.results)?;
        }
        Err(e) => {
            warn!("Failed to process {}: {}", file_name(path), e);
            report.skipped.push(SkippedFile {
                path: path.to_path_buf(),
                reason: e,
            });
        }
    }
    Ok(())
}

/// Scans `input_dir` and checkpoints the growing result list to `output_path`
/// after every decoded file. Files that fail to decode are logged and skipped.
pub fn run(
    input_dir: &Path,
    output_path: &Path,
    settings: &ScanSettings,
    decoder: &Decoder,
) -> anyhow::Result<ScanReport> {
    settings.params.validate()?;

    let files = list_audio_files(input_dir, &settings.extension)?;
    info!(
        "Found {} {} files in {}",
        files.len(),
        normalize_extension(&settings.extension),
        input_dir.display()
    );

    let mut report = ScanReport::default();
    for (i, path) in files.iter().enumerate() {
        debug!("File {}/{}", i + 1, files.len());
        process_file(path, decoder, &settings.params, output_path, &mut report)?;
    }

    write_json_atomic(output_path, &report.results)?;
    info!(
        "Ready! {} processed files, {} skipped. Output: {}",
        report.results.len(),
        report.skipped.len(),
        output_path.display()
    );
    Ok(report)
}
