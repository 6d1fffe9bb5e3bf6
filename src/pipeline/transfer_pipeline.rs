//! # Transfer Pipeline Orchestrator
//!
//! Orchestratore principale: delega discovery, deduplicazione, conversione e
//! copia ai moduli specializzati e possiede in esclusiva i contatori.
//!
//! ## Flusso di esecuzione:
//! 1. Precondizioni fatali (sorgente esistente, codec disponibile)
//! 2. Scheletro di directory sotto la destinazione
//! 3. Walk ordinato della sorgente: classificazione, dedup e prenotazione del
//!    path di destinazione avvengono qui, in sequenza, nell'ordine del walk
//! 4. Dispatch su worker tokio limitati da un `Semaphore` (`--workers`)
//! 5. Raccolta dei risultati nel solo loop principale, poi un record di riepilogo
//!
//! Un errore su un singolo file non interrompe mai il run.

use crate::{
    catalog::PathCatalog,
    codec::Codec,
    config::Config,
    dedup::{DuplicateIndex, Observation},
    encoder::{ByteBudget, SizeBoundedEncoder},
    error::ArchiveError,
    json_output::{JsonMessage, SkipReason},
    pipeline::{
        path_resolver::PathResolver,
        task::{EntryOutcome, EntryTask, TransferJob},
    },
    progress::{ProgressManager, TransferStats},
    run_log::RunLog,
};
use anyhow::{anyhow, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

type InFlight = FuturesUnordered<JoinHandle<(TransferJob, EntryOutcome)>>;

/// Final state of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub stats: TransferStats,
    pub destination: PathBuf,
    pub log_file: Option<PathBuf>,
}

/// Orchestratore di un singolo run
pub struct TransferPipeline {
    config: Config,
    codec: Arc<dyn Codec>,
    stop_receiver: Option<broadcast::Receiver<()>>,
}

/// Run-scoped collaborators shared by the bookkeeping helpers
struct RunContext {
    log: Arc<RunLog>,
    progress: ProgressManager,
    json_output: bool,
    stats: TransferStats,
}

impl TransferPipeline {
    pub fn new(config: Config, codec: Arc<dyn Codec>) -> Self {
        Self {
            config,
            codec,
            stop_receiver: None,
        }
    }

    /// Stop starting new files once a signal arrives on `stop_receiver`
    pub fn with_cancellation(mut self, stop_receiver: broadcast::Receiver<()>) -> Self {
        self.stop_receiver = Some(stop_receiver);
        self
    }

    fn should_stop(&mut self) -> bool {
        if let Some(ref mut receiver) = self.stop_receiver {
            match receiver.try_recv() {
                Ok(_) => return true,
                Err(broadcast::error::TryRecvError::Empty) => return false,
                // Signal was sent but we missed it, treat as stop
                Err(broadcast::error::TryRecvError::Lagged(_)) => return true,
                // Sender dropped, keep going
                Err(broadcast::error::TryRecvError::Closed) => return false,
            }
        }
        false
    }

    /// Execute the whole run.
    ///
    /// Returns `Err` only for fatal preconditions (missing source, unusable
    /// codec, invalid configuration). Per-file problems end up in the counters.
    pub async fn run(&mut self) -> Result<RunReport> {
        let start_time = Instant::now();

        self.config.validate()?;
        self.config.check_source()?;
        let budget = ByteBudget::new(self.config.max_bytes)?;

        let source_root = self.config.source_dir.canonicalize().map_err(|e| {
            anyhow!("Failed to resolve {}: {}", self.config.source_dir.display(), e)
        })?;
        let dest_root = Self::prepare_destination(&self.config.destination_root()).await?;
        // An ancestor destination would map some outputs onto source files
        if source_root.starts_with(&dest_root) {
            return Err(ArchiveError::Validation(format!(
                "Destination {} must not be the source directory or one of its parents",
                dest_root.display()
            ))
            .into());
        }

        let log_path = self.config.log_path();
        let log = Arc::new(RunLog::open(&log_path));

        if let Err(e) = self.codec.check_available().await {
            log.err(e.to_string());
            if self.config.json_output {
                JsonMessage::Error {
                    message: e.to_string(),
                }
                .emit();
            }
            return Err(e.into());
        }

        if self.config.json_output {
            JsonMessage::Start {
                source_dir: source_root.clone(),
                output_dir: dest_root.clone(),
                max_bytes: budget.get(),
                workers: self.config.workers,
            }
            .emit();
        }
        log.info(format!(
            "Archiving {} -> {} (max {} bytes per image, {} workers, codec {})",
            source_root.display(),
            dest_root.display(),
            budget.get(),
            self.config.workers,
            self.codec.name()
        ));

        let catalog = PathCatalog::new(&source_root).excluding(&dest_root);
        let mirror = catalog.mirror_directories(&dest_root);
        debug!("Mirrored {} directories", mirror.created);
        for (path, e) in &mirror.failures {
            log.warn(format!("Could not create directory {}: {}", path.display(), e));
        }

        let mut ctx = RunContext {
            log: log.clone(),
            progress: if self.config.json_output {
                ProgressManager::hidden()
            } else {
                ProgressManager::new()
            },
            json_output: self.config.json_output,
            stats: TransferStats::new(),
        };

        let qualifying = self.stream_entries(&catalog, &dest_root, budget, &mut ctx).await?;

        if qualifying == 0 && !ctx.stats.interrupted {
            log.warn(format!("No images or videos found under {}", source_root.display()));
        }

        let stats = ctx.stats;
        let status = if stats.interrupted { "Interrupted" } else { "Completed" };
        log.info(format!(
            "{}: {}. Log file: {}",
            status,
            stats.format_summary(),
            log.path().unwrap_or(log_path.as_path()).display()
        ));
        ctx.progress.finish(&stats.format_summary());
        log.flush();

        if self.config.json_output {
            JsonMessage::Complete {
                stats: stats.clone(),
                log_file: log.path().map(Path::to_path_buf),
                duration_seconds: start_time.elapsed().as_secs_f64(),
            }
            .emit();
        }

        Ok(RunReport {
            stats,
            destination: dest_root,
            log_file: log.path().map(Path::to_path_buf),
        })
    }

    async fn prepare_destination(dest_root: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dest_root).await.map_err(|e| {
            anyhow!("Failed to create destination {}: {}", dest_root.display(), e)
        })?;
        dest_root
            .canonicalize()
            .map_err(|e| anyhow!("Failed to resolve {}: {}", dest_root.display(), e))
    }

    /// Walk, classify, dedup and dispatch. Returns the number of qualifying
    /// (image or video) files seen, duplicates included.
    async fn stream_entries(
        &mut self,
        catalog: &PathCatalog,
        dest_root: &Path,
        budget: ByteBudget,
        ctx: &mut RunContext,
    ) -> Result<usize> {
        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let worker = EntryTask::new(
            SizeBoundedEncoder::new(self.codec.clone()),
            budget,
            ctx.log.clone(),
        );
        let mut duplicates = DuplicateIndex::new();
        let mut resolver = PathResolver::new(dest_root);
        let mut in_flight: InFlight = FuturesUnordered::new();
        let mut qualifying = 0usize;

        for entry in catalog.entries() {
            if self.should_stop() {
                ctx.stats.interrupted = true;
                ctx.log.warn("Interrupted: no new files will be started");
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    ctx.log.warn(e.to_string());
                    continue;
                }
            };
            ctx.progress.discovered();
            let relative = entry.relative_path.display().to_string();

            if !entry.category.is_qualifying() {
                ctx.stats.add_unsupported();
                ctx.log.warn(format!("Unsupported file type, not archived: {}", relative));
                ctx.progress.update(&format!("[SKIP] {}", relative));
                if ctx.json_output {
                    JsonMessage::Skipped {
                        path: entry.relative_path.clone(),
                        reason: SkipReason::Unsupported,
                    }
                    .emit();
                }
                continue;
            }
            qualifying += 1;

            if let Observation::Duplicate(original) = duplicates.observe_entry(&entry) {
                ctx.stats.add_duplicate();
                ctx.log.skip(format!("{} duplicate of {}", relative, original.display()));
                ctx.progress.update(&format!("[DUP] {}", relative));
                if ctx.json_output {
                    JsonMessage::Skipped {
                        path: entry.relative_path.clone(),
                        reason: SkipReason::Duplicate { original },
                    }
                    .emit();
                }
                continue;
            }

            let claim = resolver.claim(&entry);
            if claim.renamed {
                ctx.log.warn(format!(
                    "{} would overwrite an earlier output, writing {} instead",
                    relative,
                    claim.path.display()
                ));
            }

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| anyhow!("Worker pool closed: {}", e))?;
            let job = TransferJob {
                entry,
                destination: claim.path,
            };
            let worker = worker.clone();
            in_flight.push(tokio::spawn(async move {
                let _permit = permit;
                let outcome = worker.process(&job).await;
                (job, outcome)
            }));

            // Collect whatever finished while we were walking
            while let Some(Some(joined)) = in_flight.next().now_or_never() {
                Self::record_completion(ctx, joined);
            }
        }

        while let Some(joined) = in_flight.next().await {
            Self::record_completion(ctx, joined);
        }

        Ok(qualifying)
    }

    fn record_completion(
        ctx: &mut RunContext,
        joined: Result<(TransferJob, EntryOutcome), JoinError>,
    ) {
        let (job, outcome) = match joined {
            Ok(result) => result,
            Err(e) => {
                ctx.stats.add_error();
                ctx.log.err(format!("Worker task failed: {}", e));
                ctx.progress.update("[ERR] worker task failed");
                return;
            }
        };

        let relative = job.entry.relative_path.display();
        match outcome {
            EntryOutcome::Converted {
                bytes_out,
                ref warning,
                ..
            } => {
                ctx.stats.add_converted(bytes_out, warning.is_some());
                ctx.progress.update(&format!("[OK] {}", relative));
            }
            EntryOutcome::Copied { bytes } => {
                ctx.stats.add_copied(bytes);
                ctx.progress.update(&format!("[OK] {}", relative));
            }
            EntryOutcome::Failed { .. } => {
                ctx.stats.add_error();
                ctx.progress.update(&format!("[ERR] {}", relative));
            }
        }

        if ctx.json_output {
            JsonMessage::FileComplete {
                path: job.entry.relative_path.clone(),
                destination: job.destination,
                outcome,
            }
            .emit();
        }
    }
}
