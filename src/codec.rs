//! # Codec Boundary Module
//!
//! The encoder never touches pixels itself. Every encode is a request to an
//! external capability described by [`Codec`]; the production implementation
//! shells out to ImageMagick, tests plug in a scripted fake.
//!
//! ## Fixed directive set
//!
//! | Directive | ImageMagick argument |
//! |-----------|----------------------|
//! | first frame only | `<src>[0]` |
//! | auto-orient | `-auto-orient` |
//! | strip metadata | `-strip` |
//! | sRGB | `-colorspace sRGB` |
//! | chroma subsampling | `-sampling-factor 4:2:0` |
//! | progressive | `-interlace Line` |
//! | flatten alpha to white (optional) | `-background white -alpha remove -alpha off` |
//! | resize | `-resize <N>%` |
//! | byte budget hint | `-define jpeg:extent=<hint>` |
//! | encode as JPEG | `jpeg:<dst>` |
//!
//! Only the exit status matters. Stdout and stderr are discarded so that
//! decoder warnings (corrupt EXIF, truncated chunks, ...) never count as failure.

use crate::error::ArchiveError;
use crate::platform::PlatformCommands;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::debug;

const MIB: u64 = 1024 * 1024;
const KIB: u64 = 1024;

/// One encode attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Percent of the original pixel dimensions
    pub scale: u8,
    /// Flatten transparency onto an opaque white background
    pub flatten_alpha: bool,
    pub max_bytes: u64,
}

/// Capability to turn one source image into a JPEG at a destination path
#[async_trait]
pub trait Codec: Send + Sync {
    fn name(&self) -> &str;

    /// Fail fast when the tool cannot be used at all
    async fn check_available(&self) -> Result<(), ArchiveError> {
        Ok(())
    }

    /// Run one attempt. `Ok(true)` means the tool exited successfully; whether a
    /// file was actually produced is checked by the caller.
    async fn encode(&self, job: &EncodeJob) -> std::io::Result<bool>;
}

/// Render a byte budget in the units the extent directive reads best
pub fn extent_hint(max_bytes: u64) -> String {
    if max_bytes >= MIB && max_bytes % MIB == 0 {
        format!("{}MB", max_bytes / MIB)
    } else if max_bytes >= KIB && max_bytes % KIB == 0 {
        format!("{}KB", max_bytes / KIB)
    } else {
        max_bytes.to_string()
    }
}

/// ImageMagick (`magick` 7 or `convert` 6) driven as a subprocess.
///
/// The binary is resolved on first use and cached for the rest of the run.
#[derive(Debug, Default)]
pub struct ImageMagickCodec {
    explicit: Option<PathBuf>,
    binary: OnceCell<PathBuf>,
}

impl ImageMagickCodec {
    /// `explicit` overrides the PATH lookup
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self {
            explicit,
            binary: OnceCell::new(),
        }
    }

    /// Find the binary, either the explicit one or the first candidate on PATH
    pub async fn locate(explicit: Option<&Path>) -> Result<PathBuf, ArchiveError> {
        let platform = PlatformCommands::instance();

        if let Some(path) = explicit {
            if path.is_file() {
                return Ok(path.to_path_buf());
            }
            return platform
                .resolve_tool(&path.to_string_lossy())
                .await
                .ok_or_else(|| {
                    ArchiveError::MissingDependency(format!(
                        "configured ImageMagick binary not found: {}",
                        path.display()
                    ))
                });
        }

        platform.find_codec().await.ok_or_else(|| {
            ArchiveError::MissingDependency(format!(
                "ImageMagick is required for image conversion (install one of: {})",
                platform.codec_candidates().join(", ")
            ))
        })
    }

    async fn binary(&self) -> Result<&PathBuf, ArchiveError> {
        self.binary
            .get_or_try_init(|| Self::locate(self.explicit.as_deref()))
            .await
    }

    /// Full argument list for one attempt
    pub fn build_args(job: &EncodeJob) -> Vec<OsString> {
        let mut source = job.source.as_os_str().to_os_string();
        source.push("[0]");

        let mut args: Vec<OsString> = vec!["-quiet".into(), source];
        args.extend(
            [
                "-auto-orient",
                "-strip",
                "-colorspace",
                "sRGB",
                "-sampling-factor",
                "4:2:0",
                "-interlace",
                "Line",
            ]
            .map(OsString::from),
        );

        if job.flatten_alpha {
            args.extend(
                ["-background", "white", "-alpha", "remove", "-alpha", "off"].map(OsString::from),
            );
        }

        args.push("-resize".into());
        args.push(format!("{}%", job.scale).into());
        args.push("-define".into());
        args.push(format!("jpeg:extent={}", extent_hint(job.max_bytes)).into());

        let mut destination = OsString::from("jpeg:");
        destination.push(job.destination.as_os_str());
        args.push(destination);

        args
    }
}

#[async_trait]
impl Codec for ImageMagickCodec {
    fn name(&self) -> &str {
        "imagemagick"
    }

    async fn check_available(&self) -> Result<(), ArchiveError> {
        self.binary().await.map(|_| ())
    }

    async fn encode(&self, job: &EncodeJob) -> std::io::Result<bool> {
        let binary = self
            .binary()
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()))?;
        let args = Self::build_args(job);
        debug!("Running {} {:?}", binary.display(), args);

        let start_time = std::time::Instant::now();
        let status = Command::new(binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await?;

        debug!(
            "{} exited with {} after {:?}",
            binary.display(),
            status,
            start_time.elapsed()
        );
        Ok(status.success())
    }
}
