//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'uso programmatico
//! (una riga JSON per evento su stdout, attivato con `--json`).
//!
//! ## Tipi di messaggi:
//! - `start`: inizio dell'esecuzione
//! - `file_complete`: fine elaborazione di un file (convertito, copiato o fallito)
//! - `skipped`: file saltato (duplicato o estensione non supportata)
//! - `complete`: fine esecuzione con i contatori finali
//! - `error`: errore fatale

use crate::pipeline::EntryOutcome;
use crate::progress::TransferStats;
use serde::Serialize;
use std::path::PathBuf;

/// Why an entry produced no output
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    Duplicate { original: PathBuf },
    Unsupported,
}

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    Start {
        source_dir: PathBuf,
        output_dir: PathBuf,
        max_bytes: u64,
        workers: usize,
    },
    FileComplete {
        path: PathBuf,
        destination: PathBuf,
        outcome: EntryOutcome,
    },
    Skipped {
        path: PathBuf,
        #[serde(flatten)]
        reason: SkipReason,
    },
    Complete {
        stats: TransferStats,
        log_file: Option<PathBuf>,
        duration_seconds: f64,
    },
    Error {
        message: String,
    },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }
}
