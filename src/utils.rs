use anyhow::Context;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Rounds to millisecond precision, the resolution used in every JSON output.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Lowercase extension without a leading dot.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Writes `value` as 2-space pretty JSON, replacing `path` in one rename.
///
/// Readers only ever see the previous document or the new one in full.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut builder = tempfile::Builder::new();
    // same mode a plain create would give (0666 minus umask), not tempfile's 0600
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let mut tmp = builder
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    if let Ok(existing) = fs::metadata(path) {
        tmp.as_file().set_permissions(existing.permissions())?;
    }
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
