use anyhow::Context;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::scan::IntroAnalysisResult;
use crate::utils::{normalize_extension, write_json_atomic};

/// Numeric codes are compared by their decimal text, so `3` matches `3.mp3`.
fn hymn_code(hymn: &Value) -> Option<String> {
    match hymn.get("code")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn set_durations(hymn: &mut Value, item: &IntroAnalysisResult) -> bool {
    let Some(obj) = hymn.as_object_mut() else {
        return false;
    };
    let time = obj.entry("time").or_insert_with(|| json!({}));
    if !time.is_object() {
        *time = json!({});
    }
    time["duration"] = json!(item.duration_sec);
    time["introDuration"] = json!(item.intro_duration_sec);
    true
}

/// Copies scanned durations into the `time` block of matching hymns.
///
/// A result matches the hymn whose `code` equals its file name up to the first
/// dot. Returns how many hymns were updated.
pub fn merge_into_catalogue(
    results: &[IntroAnalysisResult],
    catalogue: &Path,
    extension: &str,
) -> anyhow::Result<usize> {
    let data = fs::read_to_string(catalogue)
        .with_context(|| format!("Failed to read catalogue {}", catalogue.display()))?;
    let mut hymns: Vec<Value> = serde_json::from_str(&data)
        .with_context(|| format!("Catalogue {} is not a JSON array", catalogue.display()))?;

    let suffix = format!(".{}", normalize_extension(extension));
    let mut updated = 0;

    for item in results {
        if !item.filename.to_ascii_lowercase().ends_with(&suffix) {
            continue;
        }
        let code = item.filename.split('.').next().unwrap_or_default();

        // later duplicates of a code win
        let Some(hymn) = hymns
            .iter_mut()
            .rev()
            .find(|h| hymn_code(h).as_deref() == Some(code))
        else {
            debug!("No hymn with code {} for {}", code, item.filename);
            continue;
        };
        if set_durations(hymn, item) {
            updated += 1;
        }
    }

    write_json_atomic(catalogue, &hymns)?;
    info!("{} updated with {} durations", catalogue.display(), updated);
    Ok(updated)
}
