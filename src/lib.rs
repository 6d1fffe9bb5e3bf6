//! # Media Archiver Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Errori fatali del run
//! - `catalog`: Walk della sorgente e classificazione dei file
//! - `dedup`: Deduplicazione per (nome file, mtime)
//! - `platform`: Comandi specifici per piattaforma (lookup dei tool)
//! - `codec`: Confine verso il codec esterno (ImageMagick)
//! - `encoder`: Ladder di scale per restare sotto il budget in byte
//! - `file_times`: Propagazione dei timestamp sui file prodotti
//! - `run_log`: Log testuale del run
//! - `json_output`: Eventi JSON per l'uso programmatico
//! - `progress`: Progress bar e contatori
//! - `pipeline`: Orchestratore del trasferimento
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use media_archiver::{Config, ImageMagickCodec, TransferPipeline};
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::new("/photos");
//! let codec = Arc::new(ImageMagickCodec::new(None));
//! let report = TransferPipeline::new(config, codec).run().await?;
//! println!("{}", report.stats.format_summary());
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod codec;
pub mod config;
pub mod dedup;
pub mod encoder;
pub mod error;
pub mod file_times;
pub mod json_output;
pub mod pipeline;
pub mod platform;
pub mod progress;
pub mod run_log;

pub use catalog::{MediaCategory, PathCatalog, SourceEntry};
pub use codec::{Codec, ImageMagickCodec};
pub use config::Config;
pub use dedup::{DuplicateIndex, DuplicateKey, Observation};
pub use encoder::{ByteBudget, ConversionOutcome, SizeBoundedEncoder};
pub use error::ArchiveError;
pub use pipeline::{RunReport, TransferPipeline};
pub use progress::TransferStats;
