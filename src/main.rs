use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use webrecorder_lib::bootstrap::{self, AppPaths};
use webrecorder_lib::commands::{self, DEFAULT_FRAGMENT_BYTES};
use wr_core::config::{QualityPreset, RecorderConfig};
use wr_core::recording::mib_to_bytes;
use wr_core::ContainerKind;

/// Chunked recorder: persists fragments as they arrive and merges them on stop.
#[derive(Parser, Debug)]
#[command(name = "webrecorder")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Application data root (config, logs, sandbox, database).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file; defaults to `<data-dir>/config.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a media file through the recording pipeline.
    Record {
        #[arg(long)]
        input: PathBuf,

        /// low | medium | high | ultra
        #[arg(long)]
        quality: Option<QualityPreset>,

        /// Flush threshold in MiB.
        #[arg(long)]
        threshold_mb: Option<f64>,

        #[arg(long)]
        timeslice_ms: Option<u64>,

        /// Size of each replayed fragment in KiB.
        #[arg(long)]
        fragment_kb: Option<usize>,
    },
    /// Reassemble existing part files, in the order given.
    Merge {
        #[arg(required = true)]
        parts: Vec<PathBuf>,

        /// mp4 | webm; sniffed from the first part when omitted.
        #[arg(long)]
        container: Option<ContainerKind>,
    },
    /// Run the validation pass over a media file.
    Validate {
        file: PathBuf,

        #[arg(long)]
        container: Option<ContainerKind>,
    },
    /// List the quality presets.
    Qualities,
}

fn load(cli: &Cli) -> anyhow::Result<RecorderConfig> {
    let paths = match &cli.data_dir {
        Some(root) => AppPaths::from_root(root),
        None => AppPaths::resolve()?,
    };

    bootstrap::tracing::init_tracing_subscriber(Some(&paths.logs_dir))?;

    let config_path = cli.config.clone().unwrap_or(paths.config_path);
    bootstrap::load_config(&config_path, &paths.app_data_root)
}

async fn run(cli: Cli, mut config: RecorderConfig) -> anyhow::Result<bool> {
    match cli.command {
        Command::Record {
            input,
            quality,
            threshold_mb,
            timeslice_ms,
            fragment_kb,
        } => {
            if let Some(mib) = threshold_mb {
                config.recording.flush_threshold_bytes = mib_to_bytes(mib);
            }
            if let Some(ms) = timeslice_ms {
                config.recording.timeslice_ms = ms.max(1);
            }
            let quality = quality.unwrap_or(config.recording.quality);
            let fragment_bytes = fragment_kb
                .map(|kb| kb.saturating_mul(1024))
                .unwrap_or(DEFAULT_FRAGMENT_BYTES);

            let (outcome, written) =
                commands::record(&config, input, quality, fragment_bytes).await?;
            println!("{}", outcome.status_message());
            println!("parts: {}, bytes: {}", outcome.total_files, outcome.total_bytes);
            if let Some(path) = written {
                println!("output: {}", path.display());
            }
            if let Some(hint) = outcome.output.as_ref().and_then(|o| o.remediation.as_ref()) {
                println!("hint: {hint}");
            }
            Ok(outcome.is_valid())
        }
        Command::Merge { parts, container } => {
            match commands::merge(&config, &parts, container).await? {
                Some((output, path)) => {
                    println!(
                        "merged {} parts ({} skipped) into {}",
                        output.parts_merged,
                        output.parts_skipped,
                        path.display()
                    );
                    if let Some(hint) = &output.remediation {
                        println!("hint: {hint}");
                    }
                    Ok(output.valid)
                }
                None => {
                    println!("nothing to merge");
                    Ok(true)
                }
            }
        }
        Command::Validate { file, container } => {
            let (container, valid) = commands::validate(&config, &file, container).await?;
            println!(
                "{}: {} ({container})",
                file.display(),
                if valid { "valid" } else { "invalid" }
            );
            Ok(valid)
        }
        Command::Qualities => {
            println!("{}", serde_json::to_string_pretty(&commands::qualities())?);
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to initialize: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli, config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(err) => {
            error!(error = %format!("{err:#}"), "Command failed");
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
