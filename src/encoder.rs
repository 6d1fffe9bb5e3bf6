//! # Size-Bounded Encoder
//!
//! Converte un'immagine in JPEG restando sotto un budget in byte, usando solo
//! il [`Codec`] esterno come primitiva.
//!
//! ## Algoritmo (ladder)
//!
//! 1. Scale tentate in ordine: 100, 90, 80, 70, 60, 50 (% delle dimensioni originali)
//! 2. Per ogni scala: tentativo con flatten dell'alpha su bianco; se il tool
//!    fallisce o non produce file, secondo tentativo alla stessa scala senza i
//!    flag alpha (alcuni formati li rifiutano)
//! 3. File prodotto ≤ budget → `Converted` subito, alla scala più grande possibile
//! 4. File prodotto > budget → scala successiva
//! 5. Ladder esaurita con un file prodotto → `Converted` con warning (best effort)
//! 6. Ladder esaurita senza alcun file → `Failed`
//!
//! ## Output
//!
//! Ogni tentativo scrive su un file di staging nascosto accanto alla
//! destinazione; un tentativo riuscito viene rinominato sopra la destinazione,
//! quindi ogni step sostituisce il precedente e non resta sporcizia su disco.

use crate::codec::{Codec, EncodeJob};
use crate::config::DEFAULT_MAX_BYTES;
use crate::error::ArchiveError;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Resize percentages, largest first
pub const SCALE_LADDER: [u8; 6] = [100, 90, 80, 70, 60, 50];

/// Warning attached to a conversion that stayed over budget
pub const OVER_BUDGET_WARNING: &str = "target not reached, best-effort saved";

/// Positive byte cap for one converted image
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ByteBudget(NonZeroU64);

impl ByteBudget {
    pub fn new(bytes: u64) -> Result<Self, ArchiveError> {
        NonZeroU64::new(bytes)
            .map(Self)
            .ok_or(ArchiveError::InvalidBudget(bytes))
    }

    pub fn get(&self) -> u64 {
        self.0.get()
    }
}

impl Default for ByteBudget {
    fn default() -> Self {
        Self(NonZeroU64::new(DEFAULT_MAX_BYTES).unwrap_or(NonZeroU64::MIN))
    }
}

impl TryFrom<u64> for ByteBudget {
    type Error = ArchiveError;

    fn try_from(bytes: u64) -> Result<Self, Self::Error> {
        Self::new(bytes)
    }
}

#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub budget: ByteBudget,
}

/// Result of one `encode` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    Converted {
        bytes_out: u64,
        scale_used: u8,
        /// Set when `bytes_out` is still over budget
        warning: Option<String>,
        attempts: u32,
    },
    Failed {
        reason: String,
        attempts: u32,
    },
}

impl ConversionOutcome {
    pub fn is_over_budget(&self) -> bool {
        matches!(self, Self::Converted { warning: Some(_), .. })
    }
}

/// Last file a ladder step actually produced
#[derive(Debug, Clone, Copy)]
struct Produced {
    bytes: u64,
    scale: u8,
}

/// Stateless driver of the scale ladder
#[derive(Clone)]
pub struct SizeBoundedEncoder {
    codec: Arc<dyn Codec>,
}

impl SizeBoundedEncoder {
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self { codec }
    }

    /// Produce a JPEG at `request.destination`, at the largest scale that fits.
    ///
    /// Codec failures become `Failed`; only unexpected I/O (e.g. a rename
    /// refused by the filesystem) is returned as an error.
    pub async fn encode(&self, request: &ConversionRequest) -> Result<ConversionOutcome> {
        let staging = staging_path(&request.destination)?;
        let result = self.run_ladder(request, &staging).await;
        discard(&staging).await;
        result
    }

    async fn run_ladder(
        &self,
        request: &ConversionRequest,
        staging: &Path,
    ) -> Result<ConversionOutcome> {
        let max_bytes = request.budget.get();
        let mut attempts = 0u32;
        let mut last_produced: Option<Produced> = None;

        for scale in SCALE_LADDER {
            let produced = self
                .attempt_step(request, staging, scale, &mut attempts)
                .await?;
            let Some(bytes) = produced else {
                debug!(
                    "No output at scale {}% for {}",
                    scale,
                    request.source.display()
                );
                continue;
            };

            tokio::fs::rename(staging, &request.destination)
                .await
                .map_err(|e| {
                    anyhow!(
                        "Failed to move output into {}: {}",
                        request.destination.display(),
                        e
                    )
                })?;
            last_produced = Some(Produced { bytes, scale });

            if bytes <= max_bytes {
                debug!(
                    "{} fits at scale {}% ({} <= {} bytes)",
                    request.source.display(),
                    scale,
                    bytes,
                    max_bytes
                );
                return Ok(ConversionOutcome::Converted {
                    bytes_out: bytes,
                    scale_used: scale,
                    warning: None,
                    attempts,
                });
            }

            debug!(
                "{} over budget at scale {}% ({} > {} bytes)",
                request.source.display(),
                scale,
                bytes,
                max_bytes
            );
        }

        Ok(match last_produced {
            Some(produced) => ConversionOutcome::Converted {
                bytes_out: produced.bytes,
                scale_used: produced.scale,
                warning: Some(OVER_BUDGET_WARNING.to_string()),
                attempts,
            },
            None => ConversionOutcome::Failed {
                reason: "conversion failed".to_string(),
                attempts,
            },
        })
    }

    /// One ladder step: alpha-flattening attempt, then the plain retry.
    /// Returns the produced size, if any attempt produced a file.
    async fn attempt_step(
        &self,
        request: &ConversionRequest,
        staging: &Path,
        scale: u8,
        attempts: &mut u32,
    ) -> Result<Option<u64>> {
        for flatten_alpha in [true, false] {
            discard(staging).await;

            let job = EncodeJob {
                source: request.source.clone(),
                destination: staging.to_path_buf(),
                scale,
                flatten_alpha,
                max_bytes: request.budget.get(),
            };
            *attempts += 1;

            let exited_ok = match self.codec.encode(&job).await {
                Ok(success) => success,
                Err(e) => {
                    debug!("{} could not be started: {}", self.codec.name(), e);
                    false
                }
            };

            if exited_ok {
                if let Ok(metadata) = tokio::fs::metadata(staging).await {
                    if metadata.is_file() {
                        return Ok(Some(metadata.len()));
                    }
                }
            }

            debug!(
                "Attempt at scale {}% (flatten_alpha={}) produced nothing for {}",
                scale,
                flatten_alpha,
                request.source.display()
            );
        }

        Ok(None)
    }
}

/// Hidden sibling of the destination used while a step is in flight
fn staging_path(destination: &Path) -> Result<PathBuf> {
    let file_name = destination
        .file_name()
        .ok_or_else(|| anyhow!("Invalid destination path: {}", destination.display()))?;

    let mut staged = std::ffi::OsString::from(".");
    staged.push(file_name);
    staged.push(".partial");
    Ok(destination.with_file_name(staged))
}

async fn discard(path: &Path) {
    let _ = tokio::fs::remove_file(path).await;
}


#[cfg(test)]
mod tests {
    use super::testing::FakeCodec;
    use super::*;
    use tempfile::TempDir;

    const KIB: u64 = 1024;

    fn request(dir: &TempDir, budget: u64) -> ConversionRequest {
        let source = dir.path().join("photo.JPG");
        std::fs::write(&source, b"source").unwrap();
        ConversionRequest {
            source,
            destination: dir.path().join("photo.jpeg"),
            budget: ByteBudget::new(budget).unwrap(),
        }
    }

    fn leftovers(dir: &TempDir) -> Vec<String> {
        std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".partial"))
            .collect()
    }

    #[tokio::test]
    async fn test_fits_at_full_scale_without_descent() {
        let dir = TempDir::new().unwrap();
        let codec = Arc::new(FakeCodec::by_scale(|_| Some(500 * KIB)));
        let encoder = SizeBoundedEncoder::new(codec.clone());

        let outcome = encoder.encode(&request(&dir, 1024 * KIB)).await.unwrap();

        assert_eq!(
            outcome,
            ConversionOutcome::Converted {
                bytes_out: 500 * KIB,
                scale_used: 100,
                warning: None,
                attempts: 1,
            }
        );
        assert_eq!(codec.calls(), vec![(100, true)]);
        assert_eq!(std::fs::metadata(dir.path().join("photo.jpeg")).unwrap().len(), 500 * KIB);
        assert!(leftovers(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_stops_at_largest_scale_that_fits() {
        let dir = TempDir::new().unwrap();
        let codec = Arc::new(FakeCodec::by_scale(|scale| match scale {
            100 => Some(2048 * KIB),
            90 => Some(1200 * KIB),
            80 => Some(900 * KIB),
            _ => Some(100 * KIB),
        }));
        let encoder = SizeBoundedEncoder::new(codec.clone());

        let outcome = encoder.encode(&request(&dir, 1024 * KIB)).await.unwrap();

        assert!(matches!(
            outcome,
            ConversionOutcome::Converted {
                scale_used: 80,
                bytes_out,
                warning: None,
                ..
            } if bytes_out == 900 * KIB
        ));
        let scales: Vec<u8> = codec.calls().into_iter().map(|(s, _)| s).collect();
        assert_eq!(scales, vec![100, 90, 80]);
        assert_eq!(std::fs::metadata(dir.path().join("photo.jpeg")).unwrap().len(), 900 * KIB);
    }

    #[tokio::test]
    async fn test_never_fits_keeps_smallest_attempt_with_warning() {
        let dir = TempDir::new().unwrap();
        let codec = Arc::new(FakeCodec::by_scale(|scale| Some(u64::from(scale) * 100 * KIB)));
        let encoder = SizeBoundedEncoder::new(codec.clone());

        let outcome = encoder.encode(&request(&dir, 1024 * KIB)).await.unwrap();

        match outcome {
            ConversionOutcome::Converted {
                bytes_out,
                scale_used,
                warning,
                attempts,
            } => {
                assert_eq!(bytes_out, 5000 * KIB);
                assert_eq!(scale_used, 50);
                assert_eq!(warning.as_deref(), Some(OVER_BUDGET_WARNING));
                assert_eq!(attempts, 6);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(outcome_file_len(&dir) == 5000 * KIB);
        assert!(leftovers(&dir).is_empty());
    }

    fn outcome_file_len(dir: &TempDir) -> u64 {
        std::fs::metadata(dir.path().join("photo.jpeg")).unwrap().len()
    }

    #[tokio::test]
    async fn test_nothing_produced_fails_after_both_alpha_modes() {
        let dir = TempDir::new().unwrap();
        let codec = Arc::new(FakeCodec::by_scale(|_| None));
        let encoder = SizeBoundedEncoder::new(codec.clone());

        let outcome = encoder.encode(&request(&dir, 1024 * KIB)).await.unwrap();

        assert_eq!(
            outcome,
            ConversionOutcome::Failed {
                reason: "conversion failed".into(),
                attempts: 12,
            }
        );
        let calls = codec.calls();
        assert_eq!(calls.len(), 12);
        assert_eq!(&calls[..2], &[(100, true), (100, false)]);
        assert!(!dir.path().join("photo.jpeg").exists());
    }

    #[tokio::test]
    async fn test_alpha_flags_rejected_retries_same_scale() {
        let dir = TempDir::new().unwrap();
        let codec = Arc::new(FakeCodec::new(|_, _, flatten_alpha| {
            if flatten_alpha {
                None
            } else {
                Some(300 * KIB)
            }
        }));
        let encoder = SizeBoundedEncoder::new(codec.clone());

        let outcome = encoder.encode(&request(&dir, 1024 * KIB)).await.unwrap();

        assert!(matches!(
            outcome,
            ConversionOutcome::Converted { scale_used: 100, attempts: 2, warning: None, .. }
        ));
        assert_eq!(codec.calls(), vec![(100, true), (100, false)]);
    }

    #[tokio::test]
    async fn test_clean_exit_without_file_retries_without_alpha_flags() {
        let dir = TempDir::new().unwrap();
        let codec = Arc::new(
            FakeCodec::new(|_, scale, flatten_alpha| {
                if flatten_alpha || scale > 90 {
                    None
                } else {
                    Some(400 * KIB)
                }
            })
            .exits_ok_without_output(),
        );
        let encoder = SizeBoundedEncoder::new(codec.clone());

        let outcome = encoder.encode(&request(&dir, 1024 * KIB)).await.unwrap();

        assert!(matches!(
            outcome,
            ConversionOutcome::Converted { scale_used: 90, attempts: 4, warning: None, .. }
        ));
        assert_eq!(
            codec.calls(),
            vec![(100, true), (100, false), (90, true), (90, false)]
        );
        assert_eq!(outcome_file_len(&dir), 400 * KIB);
    }

    #[tokio::test]
    async fn test_clean_exits_that_never_write_fail() {
        let dir = TempDir::new().unwrap();
        let codec = Arc::new(FakeCodec::by_scale(|_| None).exits_ok_without_output());
        let encoder = SizeBoundedEncoder::new(codec.clone());

        let outcome = encoder.encode(&request(&dir, 1024 * KIB)).await.unwrap();

        assert_eq!(
            outcome,
            ConversionOutcome::Failed {
                reason: "conversion failed".into(),
                attempts: 12,
            }
        );
        let calls = codec.calls();
        for (step, scale) in SCALE_LADDER.iter().enumerate() {
            assert_eq!(calls[step * 2], (*scale, true));
            assert_eq!(calls[step * 2 + 1], (*scale, false));
        }
        assert!(!dir.path().join("photo.jpeg").exists());
        assert!(leftovers(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_later_step_failure_keeps_earlier_oversized_output() {
        let dir = TempDir::new().unwrap();
        let codec = Arc::new(FakeCodec::by_scale(|scale| {
            if scale >= 70 {
                Some(4096 * KIB)
            } else {
                None
            }
        }));
        let encoder = SizeBoundedEncoder::new(codec);

        let outcome = encoder.encode(&request(&dir, 1024 * KIB)).await.unwrap();

        assert!(matches!(
            outcome,
            ConversionOutcome::Converted { scale_used: 70, warning: Some(_), .. }
        ));
        assert!(outcome.is_over_budget());
        assert_eq!(outcome_file_len(&dir), 4096 * KIB);
    }

    #[tokio::test]
    async fn test_larger_budget_avoids_descent() {
        let dir = TempDir::new().unwrap();
        let codec = Arc::new(FakeCodec::by_scale(|scale| match scale {
            100 => Some(1800 * KIB),
            _ => Some(700 * KIB),
        }));
        let encoder = SizeBoundedEncoder::new(codec.clone());

        let default_outcome = encoder.encode(&request(&dir, 1024 * KIB)).await.unwrap();
        assert!(matches!(default_outcome, ConversionOutcome::Converted { scale_used: 90, .. }));

        let larger = encoder.encode(&request(&dir, 2_097_152)).await.unwrap();
        assert!(matches!(
            larger,
            ConversionOutcome::Converted { scale_used: 100, warning: None, .. }
        ));
    }

    #[test]
    fn test_budget_must_be_positive() {
        assert!(ByteBudget::new(0).is_err());
        assert_eq!(ByteBudget::default().get(), 1_048_576);
        assert_eq!(ByteBudget::try_from(42).unwrap().get(), 42);
    }

    #[test]
    fn test_staging_path_is_hidden_sibling() {
        let staged = staging_path(Path::new("/out/a/photo.jpeg")).unwrap();
        assert_eq!(staged, PathBuf::from("/out/a/.photo.jpeg.partial"));
    }
}
