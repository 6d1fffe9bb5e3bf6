//! # Pipeline Module
//!
//! Modulo che separa le responsabilità del trasferimento in sottomoduli:
//! - `transfer_pipeline`: Orchestratore principale (catalogo → dedup → dispatch)
//! - `task`: Worker per il singolo file (conversione immagine o copia video)
//! - `path_resolver`: Calcolo centralizzato dei path di destinazione

pub mod path_resolver;
pub mod task;
pub mod transfer_pipeline;

pub use path_resolver::PathResolver;
pub use task::{EntryOutcome, EntryTask, TransferJob};
pub use transfer_pipeline::{RunReport, TransferPipeline};
