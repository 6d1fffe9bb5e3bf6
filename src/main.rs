//! # Media Archiver - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Costruzione della configurazione (file `--config` + override da CLI)
//! - Gestione di Ctrl-C: nessun nuovo file viene avviato, quelli in corso finiscono
//!
//! ## Esempio di utilizzo:
//! ```bash
//! media-archiver /path/to/photos --output /mnt/archive --max-bytes 2097152 --workers 8
//! ```

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use media_archiver::{Config, ImageMagickCodec, TransferPipeline};

#[derive(Parser)]
#[command(name = "media-archiver")]
#[command(about = "Mirror a media folder into an archive: size-bounded JPEGs, verbatim videos")]
struct Args {
    /// Directory containing the media to archive
    source: Option<PathBuf>,

    /// Maximum size in bytes of each converted image
    #[arg(short, long)]
    max_bytes: Option<u64>,

    /// Destination root (default: <source>_archive next to the source)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum number of simultaneous codec processes
    #[arg(short, long)]
    workers: Option<usize>,

    /// Text log file (default: <destination>/media-archiver.log)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Emit newline-delimited JSON events on stdout instead of a progress bar
    #[arg(long)]
    json: bool,

    /// Load settings from a JSON file; command line values take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Explicit path to the ImageMagick binary
    #[arg(long)]
    magick: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    async fn into_config(self) -> Result<Config> {
        let mut config = match self.config {
            Some(ref path) => Config::from_file(path).await?,
            None => Config::default(),
        };

        if let Some(source) = self.source {
            config.source_dir = source;
        }
        if config.source_dir.as_os_str().is_empty() {
            return Err(anyhow!("No source directory given"));
        }
        if let Some(max_bytes) = self.max_bytes {
            config.max_bytes = max_bytes;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.output.is_some() {
            config.output_dir = self.output;
        }
        if self.log_file.is_some() {
            config.log_file = self.log_file;
        }
        if self.magick.is_some() {
            config.codec_binary = self.magick;
        }
        config.json_output |= self.json;

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --verbose; JSON mode keeps stdout clean
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = args.into_config().await?;
    let codec = Arc::new(ImageMagickCodec::new(config.codec_binary.clone()));

    let (stop_sender, stop_receiver) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, finishing files in progress");
            let _ = stop_sender.send(());
        }
    });

    let json_output = config.json_output;
    let report = TransferPipeline::new(config, codec)
        .with_cancellation(stop_receiver)
        .run()
        .await?;

    if !json_output {
        println!("{}", report.stats.format_summary());
        if let Some(log_file) = report.log_file {
            println!("Log: {}", log_file.display());
        }
    }

    Ok(())
}
