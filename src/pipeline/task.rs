//! # Entry Task Module
//!
//! Worker per il trasferimento di un singolo file già classificato e
//! deduplicato. Separato dall'orchestratore per poter girare su un task tokio.
//!
//! ## Responsabilità:
//! - Immagini: conversione tramite `SizeBoundedEncoder` + timestamp
//! - Video: copia byte per byte + timestamp
//! - Isolamento: qualsiasi errore diventa `EntryOutcome::Failed`, mai un panic
//!   o un errore propagato all'orchestratore

use crate::{
    catalog::{format_size, MediaCategory, SourceEntry},
    encoder::{ByteBudget, ConversionOutcome, ConversionRequest, SizeBoundedEncoder},
    file_times,
    pipeline::path_resolver::PathResolver,
    run_log::RunLog,
};
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// What happened to one dispatched entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryOutcome {
    Converted {
        bytes_out: u64,
        scale_used: u8,
        warning: Option<String>,
        attempts: u32,
    },
    Copied {
        bytes: u64,
    },
    Failed {
        reason: String,
    },
}

impl EntryOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// A non-duplicate entry with its reserved destination
#[derive(Debug, Clone)]
pub struct TransferJob {
    pub entry: SourceEntry,
    pub destination: PathBuf,
}

/// Per-entry worker, cheap to clone into spawned tasks
#[derive(Clone)]
pub struct EntryTask {
    encoder: SizeBoundedEncoder,
    budget: ByteBudget,
    log: Arc<RunLog>,
}

impl EntryTask {
    pub fn new(encoder: SizeBoundedEncoder, budget: ByteBudget, log: Arc<RunLog>) -> Self {
        Self { encoder, budget, log }
    }

    /// Process one entry. Never fails: errors are logged and reported as `Failed`.
    pub async fn process(&self, job: &TransferJob) -> EntryOutcome {
        let relative = job.entry.relative_path.display().to_string();

        match self.transfer(job).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.log.err(format!("{}: {}", relative, e));
                EntryOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn transfer(&self, job: &TransferJob) -> Result<EntryOutcome> {
        match job.entry.category {
            MediaCategory::Image => self.convert_image(job).await,
            MediaCategory::Video => self.copy_video(job).await,
            MediaCategory::Unsupported => Err(anyhow!(
                "unsupported file dispatched: {}",
                job.entry.path.display()
            )),
        }
    }

    async fn convert_image(&self, job: &TransferJob) -> Result<EntryOutcome> {
        let entry = &job.entry;
        PathResolver::ensure_parent_dirs(&job.destination).await?;

        let request = ConversionRequest {
            source: entry.path.clone(),
            destination: job.destination.clone(),
            budget: self.budget,
        };
        let outcome = self.encoder.encode(&request).await?;
        let relative = entry.relative_path.display();

        Ok(match outcome {
            ConversionOutcome::Converted {
                bytes_out,
                scale_used,
                warning,
                attempts,
            } => {
                file_times::apply_best_effort(&job.destination, entry);

                match warning {
                    Some(ref text) => self.log.warn(format!(
                        "{} -> {} ({}, scale {}%): {}",
                        relative,
                        job.destination.display(),
                        format_size(bytes_out),
                        scale_used,
                        text
                    )),
                    None => self.log.ok(format!(
                        "{} -> {} ({}, scale {}%)",
                        relative,
                        job.destination.display(),
                        format_size(bytes_out),
                        scale_used
                    )),
                }

                EntryOutcome::Converted {
                    bytes_out,
                    scale_used,
                    warning,
                    attempts,
                }
            }
            ConversionOutcome::Failed { reason, attempts } => {
                debug!("{} failed after {} attempts", relative, attempts);
                self.log.err(format!("{}: {}", relative, reason));
                EntryOutcome::Failed { reason }
            }
        })
    }

    async fn copy_video(&self, job: &TransferJob) -> Result<EntryOutcome> {
        let entry = &job.entry;
        PathResolver::ensure_parent_dirs(&job.destination).await?;

        let bytes = tokio::fs::copy(&entry.path, &job.destination)
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to copy {} to {}: {}",
                    entry.path.display(),
                    job.destination.display(),
                    e
                )
            })?;
        file_times::apply_best_effort(&job.destination, entry);

        self.log.ok(format!(
            "{} -> {} (copied {})",
            entry.relative_path.display(),
            job.destination.display(),
            format_size(bytes)
        ));
        Ok(EntryOutcome::Copied { bytes })
    }
}
