//! # Path Catalog Module
//!
//! Questo modulo gestisce la discovery dei file nella directory sorgente.
//!
//! ## Responsabilità:
//! - Walk ricorsivo e deterministico della sorgente (ordine per nome file)
//! - Classificazione di ogni file (immagine / video / non supportato)
//! - Pre-creazione dello scheletro di directory sotto la destinazione
//! - Utilità per la formattazione human-readable delle dimensioni
//!
//! ## Formati riconosciuti:
//! - **Immagini**: jpg, jpeg, png, bmp, tif, tiff, gif, heic, heif, webp
//! - **Video**: mp4, mov, mkv, avi, m4v, wmv, webm, mts, m2ts, 3gp, 3g2
//!
//! Tutto il resto è `Unsupported`: viene contato ma mai trasferito.
//!
//! ## Determinismo:
//! Il walk è ordinato per nome, quindi due esecuzioni sullo stesso albero
//! producono la stessa sequenza. La deduplicazione "first seen" dipende da questo.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "bmp", "tif", "tiff", "gif", "heic", "heif", "webp",
];

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "mkv", "avi", "m4v", "wmv", "webm", "mts", "m2ts", "3gp", "3g2",
];

/// How a discovered file is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Image,
    Video,
    Unsupported,
}

impl MediaCategory {
    /// Classify a file by its (case-insensitive) extension
    pub fn from_extension(extension: &str) -> Self {
        let ext = extension.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Self::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Self::Video
        } else {
            Self::Unsupported
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .map(|ext| Self::from_extension(&ext.to_string_lossy()))
            .unwrap_or(Self::Unsupported)
    }

    pub fn is_qualifying(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

/// One regular file discovered under the source root
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub path: PathBuf,
    pub relative_path: PathBuf,
    /// Lowercased extension, empty when the file has none
    pub extension: String,
    pub modified: DateTime<Utc>,
    pub created: Option<DateTime<Utc>>,
    pub category: MediaCategory,
}

impl SourceEntry {
    fn from_dir_entry(root: &Path, entry: &DirEntry) -> Result<Self> {
        let path = entry.path().to_path_buf();
        let metadata = entry
            .metadata()
            .map_err(|e| anyhow!("Failed to read metadata for {}: {}", path.display(), e))?;

        let relative_path = path
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(entry.file_name()));

        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .map_err(|e| anyhow!("No modification time for {}: {}", path.display(), e))?;
        let created = metadata.created().ok().map(DateTime::<Utc>::from);

        Ok(Self {
            category: MediaCategory::from_extension(&extension),
            path,
            relative_path,
            extension,
            modified,
            created,
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Last-modified time in 100ns ticks since the Unix epoch
    pub fn modified_ticks(&self) -> i64 {
        to_ticks(&self.modified)
    }
}

pub fn to_ticks(time: &DateTime<Utc>) -> i64 {
    time.timestamp() * 10_000_000 + i64::from(time.timestamp_subsec_nanos() / 100)
}

/// Result of pre-creating the destination skeleton
#[derive(Debug, Default)]
pub struct MirrorReport {
    pub created: usize,
    pub failures: Vec<(PathBuf, std::io::Error)>,
}

/// Walks one source root
pub struct PathCatalog {
    root: PathBuf,
    excluded: Option<PathBuf>,
}

impl PathCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            excluded: None,
        }
    }

    /// Prune a subtree from the walk (the destination, when nested in the source)
    pub fn excluding(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded = Some(path.into());
        self
    }

    fn walker(&self) -> impl Iterator<Item = walkdir::Result<DirEntry>> + '_ {
        WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| match self.excluded {
                Some(ref excluded) => e.path() != excluded.as_path(),
                None => true,
            })
    }

    /// Recreate every source subdirectory under `dest_root`.
    ///
    /// Failures are collected, not raised: the pipeline creates parents lazily too.
    pub fn mirror_directories(&self, dest_root: &Path) -> MirrorReport {
        let mut report = MirrorReport::default();

        for entry in self.walker().filter_map(|e| e.ok()) {
            if !entry.file_type().is_dir() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let target = dest_root.join(relative);
            match std::fs::create_dir_all(&target) {
                Ok(()) => report.created += 1,
                Err(e) => report.failures.push((target, e)),
            }
        }

        report
    }

    /// Lazily stream every regular file, in deterministic order
    pub fn entries(&self) -> impl Iterator<Item = Result<SourceEntry>> + '_ {
        self.walker().filter_map(move |entry| match entry {
            Ok(entry) if entry.file_type().is_file() => {
                Some(SourceEntry::from_dir_entry(&self.root, &entry))
            }
            Ok(_) => None,
            Err(e) => Some(Err(anyhow!("Failed to walk source tree: {}", e))),
        })
    }
}

/// Get human-readable file size
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"data").unwrap();
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        assert_eq!(MediaCategory::from_path(Path::new("a/IMG_1.JPG")), MediaCategory::Image);
        assert_eq!(MediaCategory::from_path(Path::new("b.HeIc")), MediaCategory::Image);
        assert_eq!(MediaCategory::from_path(Path::new("clip.M2TS")), MediaCategory::Video);
        assert_eq!(MediaCategory::from_path(Path::new("clip.3g2")), MediaCategory::Video);
        assert_eq!(MediaCategory::from_path(Path::new("notes.txt")), MediaCategory::Unsupported);
        assert_eq!(MediaCategory::from_path(Path::new("README")), MediaCategory::Unsupported);
    }

    #[test]
    fn test_entries_are_sorted_and_classified() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "b/photo.jpg");
        touch(temp_dir.path(), "a/photo.JPG");
        touch(temp_dir.path(), "a/clip.mp4");
        touch(temp_dir.path(), "notes.txt");

        let catalog = PathCatalog::new(temp_dir.path());
        let entries: Vec<SourceEntry> = catalog.entries().map(|e| e.unwrap()).collect();
        let relative: Vec<String> = entries
            .iter()
            .map(|e| e.relative_path.to_string_lossy().replace('\\', "/"))
            .collect();

        assert_eq!(relative, vec!["a/clip.mp4", "a/photo.JPG", "b/photo.jpg", "notes.txt"]);
        assert_eq!(entries[1].extension, "jpg");
        assert_eq!(entries[1].category, MediaCategory::Image);
        assert_eq!(entries[0].category, MediaCategory::Video);
        assert_eq!(entries[3].category, MediaCategory::Unsupported);

        // A second pass over the unchanged tree classifies identically.
        let again: Vec<MediaCategory> = catalog.entries().map(|e| e.unwrap().category).collect();
        let first: Vec<MediaCategory> = entries.iter().map(|e| e.category).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn test_mirror_creates_empty_directories_too() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        touch(source.path(), "2023/summer/a.jpg");
        std::fs::create_dir_all(source.path().join("empty/nested")).unwrap();

        let report = PathCatalog::new(source.path()).mirror_directories(dest.path());

        assert!(report.failures.is_empty());
        assert_eq!(report.created, 4);
        assert!(dest.path().join("2023/summer").is_dir());
        assert!(dest.path().join("empty/nested").is_dir());
        assert!(!dest.path().join("2023/summer/a.jpg").exists());
    }

    #[test]
    fn test_excluded_subtree_is_pruned() {
        let source = TempDir::new().unwrap();
        touch(source.path(), "keep.jpg");
        touch(source.path(), "out/already.jpeg");

        let catalog = PathCatalog::new(source.path()).excluding(source.path().join("out"));
        let names: Vec<String> = catalog.entries().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names, vec!["keep.jpg"]);
    }

    #[test]
    fn test_ticks_have_sub_second_precision() {
        let time = DateTime::<Utc>::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        assert_eq!(to_ticks(&time), 17_000_000_001_234_567);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1_048_576), "1.00 MB");
    }
}
