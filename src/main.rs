//! # heic2jpg - Main Entry Point
//!
//! Questo è il punto di ingresso del front-end da terminale.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing` (su stderr)
//! - Caricamento della configurazione e override da CLI
//! - Ogni argomento è un "drop": i file vengono filtrati, le cartelle scansionate
//! - Rendering del progresso (progress bar o eventi JSON)
//!
//! ## Esempio di utilizzo:
//! ```bash
//! heic2jpg ~/Pictures/iphone IMG_0042.HEIC --verbose
//! heic2jpg ~/Pictures/iphone --json --tool heif-convert
//! heic2jpg --check-tools
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use heic_converter::driver::DriverEvent;
use heic_converter::file_manager::FileManager;
use heic_converter::json_output::JsonMessage;
use heic_converter::progress::ProgressManager;
use heic_converter::{Config, Converter, ExternalToolCodec, ItemStatus, JPEG_QUALITY};

#[derive(Parser)]
#[command(name = "heic2jpg")]
#[command(about = "Convert HEIC/HEIF photos to JPEG next to the originals")]
struct Args {
    /// HEIC/HEIF files or folders containing them
    #[arg(required_unless_present = "check_tools")]
    paths: Vec<PathBuf>,

    /// Config file (default: ~/.config/heic2jpg/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory searched for conversion tools before PATH
    #[arg(long)]
    tools_dir: Option<PathBuf>,

    /// Conversion tool to try first (sips, heif-convert, magick, convert)
    #[arg(long)]
    tool: Option<String>,

    /// Only look at the top level of dropped folders
    #[arg(long)]
    no_recursive: bool,

    /// Output progress and status as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Report which conversion tools are installed and exit
    #[arg(long)]
    check_tools: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

async fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config.clone().or_else(Config::default_path) {
        Some(path) => Config::from_file(&path).await?,
        None => Config::default(),
    };

    if args.tools_dir.is_some() {
        config.tools_dir = args.tools_dir.clone();
    }
    if args.tool.is_some() {
        config.preferred_tool = args.tool.clone();
    }
    if args.no_recursive {
        config.recursive = false;
    }
    if args.json {
        config.json_output = true;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&args).await?;
    let json = config.json_output;
    let codec = ExternalToolCodec::new(&config);

    if args.check_tools {
        print!("{}", codec.tools_report());
        return Ok(());
    }

    match codec.check_dependencies() {
        Ok(tools) => info!("Conversion tools available: {}", tools.join(", ")),
        Err(e) => {
            if json {
                JsonMessage::error(e.to_string()).emit();
            }
            return Err(e.into());
        }
    }

    let mut converter = Converter::new(config, Arc::new(codec))?;

    let mut dropped = Vec::new();
    for path in args.paths {
        if path.exists() {
            dropped.push(path);
        } else {
            warn!("Skipping missing path: {}", path.display());
        }
    }
    converter.add_paths(dropped);

    let queued: Vec<PathBuf> = converter
        .state()
        .queue
        .items()
        .iter()
        .map(|item| item.source_path.clone())
        .collect();

    if queued.is_empty() {
        info!("No HEIC/HEIF files to convert");
        if json {
            JsonMessage::Queued { files: queued }.emit();
        }
        converter.shutdown().await;
        return Ok(());
    }

    info!("{}", converter.state().status_message);
    let total = queued.len();
    if json {
        JsonMessage::Queued { files: queued }.emit();
    }

    let started = Instant::now();
    converter.start()?;

    let progress = if json {
        JsonMessage::Start {
            total_files: total,
            quality: JPEG_QUALITY,
        }
        .emit();
        None
    } else {
        Some(ProgressManager::new(total as u64))
    };

    while let Some(event) = converter.next_event().await {
        let item_path = match &event {
            DriverEvent::ItemFinished { index, .. } => converter
                .state()
                .queue
                .get(*index)
                .map(|item| item.source_path.clone()),
            _ => None,
        };

        if let Some(ref bar) = progress {
            match &event {
                DriverEvent::ItemStarted { .. } => bar.set_message(&converter.state().status_message),
                DriverEvent::ItemFinished {
                    succeeded, completed, ..
                } => {
                    bar.set_position(*completed as u64);
                    if let Some(ref path) = item_path {
                        let status = if *succeeded {
                            ItemStatus::Succeeded
                        } else {
                            ItemStatus::Failed
                        };
                        bar.println(&format!("{} {}", status.icon(), FileManager::display_name(path)));
                    }
                }
                DriverEvent::BatchFinished { stats, .. } => bar.finish(&stats.format_summary()),
            }
        } else {
            for message in JsonMessage::from_event(&event, item_path.as_ref()) {
                message.emit();
            }
        }
    }

    let Some(stats) = converter.last_stats() else {
        if json {
            JsonMessage::error("conversion worker stopped before the batch finished").emit();
        }
        return Err(anyhow::anyhow!("conversion worker stopped before the batch finished"));
    };
    let elapsed = started.elapsed();
    if json {
        JsonMessage::complete(&stats, elapsed.as_secs_f64()).emit();
    } else {
        info!("{} in {:.1}s", stats.format_summary(), elapsed.as_secs_f64());
    }

    converter.shutdown().await;

    if stats.has_failures() {
        return Err(anyhow::anyhow!("{} file(s) could not be converted", stats.failed));
    }
    Ok(())
}
