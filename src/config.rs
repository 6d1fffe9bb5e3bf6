//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri dell'archiviazione
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Calcola la directory di destinazione e il path del log quando non specificati
//!
//! ## Parametri di configurazione:
//! - `source_dir`: Directory sorgente da archiviare (obbligatoria)
//! - `output_dir`: Radice di destinazione (default: `<sorgente>_archive` accanto alla sorgente)
//! - `max_bytes`: Budget massimo per ogni JPEG prodotto (default: 1 MiB)
//! - `workers`: Numero massimo di processi di codifica simultanei (default: 4)
//! - `log_file`: Path del log testuale (default: `<destinazione>/media-archiver.log`)
//! - `json_output`: Emette eventi JSON su stdout invece della progress bar
//! - `codec_binary`: Path esplicito del binario ImageMagick
//!
//! ## Esempio:
//! ```rust
//! use media_archiver::Config;
//!
//! let config = Config {
//!     max_bytes: 2 * 1024 * 1024,
//!     workers: 2,
//!     ..Config::new("/photos")
//! };
//! assert!(config.validate().is_ok());
//! ```

use crate::error::ArchiveError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default byte budget for a converted image (1 MiB)
pub const DEFAULT_MAX_BYTES: u64 = 1024 * 1024;

/// Default number of concurrent codec processes
pub const DEFAULT_WORKERS: usize = 4;

pub const LOG_FILE_NAME: &str = "media-archiver.log";

/// Configuration for an archiving run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory containing the media to archive
    pub source_dir: PathBuf,
    /// Destination root (None = sibling `<source>_archive`)
    pub output_dir: Option<PathBuf>,
    /// Maximum size in bytes of every produced JPEG
    pub max_bytes: u64,
    /// Upper bound on simultaneous codec processes
    pub workers: usize,
    /// Text log location (None = inside the destination root)
    pub log_file: Option<PathBuf>,
    /// Emit newline-delimited JSON events for programmatic use
    pub json_output: bool,
    /// Explicit path to the ImageMagick binary
    pub codec_binary: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::new(),
            output_dir: None,
            max_bytes: DEFAULT_MAX_BYTES,
            workers: DEFAULT_WORKERS,
            log_file: None,
            json_output: false,
            codec_binary: None,
        }
    }
}

impl Config {
    /// Configuration with defaults for everything but the source directory
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            ..Self::default()
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ArchiveError> {
        if self.source_dir.as_os_str().is_empty() {
            return Err(ArchiveError::Validation("source directory is required".into()));
        }

        if self.max_bytes == 0 {
            return Err(ArchiveError::InvalidBudget(self.max_bytes));
        }

        if self.workers == 0 {
            return Err(ArchiveError::Validation(
                "Number of workers must be greater than 0".into(),
            ));
        }

        if let Some(ref output_dir) = self.output_dir {
            if self.source_dir.starts_with(output_dir) {
                return Err(ArchiveError::Validation(format!(
                    "Output directory must not be the source or one of its parents: {}",
                    output_dir.display()
                )));
            }
        }

        Ok(())
    }

    /// Check the fatal preconditions on the source root
    pub fn check_source(&self) -> Result<(), ArchiveError> {
        if !self.source_dir.exists() {
            return Err(ArchiveError::SourceNotFound(self.source_dir.clone()));
        }
        if !self.source_dir.is_dir() {
            return Err(ArchiveError::NotADirectory(self.source_dir.clone()));
        }
        Ok(())
    }

    /// Destination root: the configured one, or `<source>_archive` next to the source
    pub fn destination_root(&self) -> PathBuf {
        if let Some(ref output_dir) = self.output_dir {
            return output_dir.clone();
        }

        let name = self
            .source_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media".to_string());

        let parent = self.source_dir.parent().unwrap_or(Path::new(""));
        parent.join(format!("{}_archive", name))
    }

    /// Where the text log is written
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.destination_root().join(LOG_FILE_NAME))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
