mod args;
mod audio;
mod hymns;
mod scan;
mod silence;
mod utils;

#[cfg(test)]
mod test_support;

use clap::Parser;
use clap::error::ErrorKind;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use crate::args::Args;
use crate::audio::{Decoder, locate_ffmpeg};
use crate::scan::ScanSettings;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    // Checked once up front; per-file decode errors are handled by the scan.
    let ffmpeg = match locate_ffmpeg(args.ffmpeg.as_deref()) {
        Ok(path) => path,
        Err(e) => {
            error!(
                "{}. Install ffmpeg or set --ffmpeg / HYMNSCAN_FFMPEG before running.",
                e
            );
            std::process::exit(1);
        }
    };

    let settings = ScanSettings {
        extension: args.extension.clone(),
        params: args.intro_params(),
    };
    let decoder = Decoder::new(Some(ffmpeg));

    let report = scan::run(&args.input_dir, &args.output, &settings, &decoder)?;
    for skipped in &report.skipped {
        debug!("Not in output: {} ({})", skipped.path.display(), skipped.reason);
    }

    if let Some(catalogue) = &args.merge_into {
        info!("Merging durations into {}", catalogue.display());
        hymns::merge_into_catalogue(&report.results, catalogue, &settings.extension)?;
    }

    info!("Process complete.");
    Ok(())
}
