//! # Path Resolution Module
//!
//! Centralizza tutta la logica di calcolo dei path di destinazione.
//!
//! - Immagini: stesso path relativo, estensione forzata a `.jpeg`
//! - Video: stesso path relativo, estensione invariata
//!
//! Due immagini nella stessa directory possono collidere (`foto.png` e
//! `foto.jpg` → `foto.jpeg`): la prima in ordine di traversal tiene il nome,
//! le successive diventano `foto_png.jpeg`, `foto_png_2.jpeg`, ...

use crate::catalog::{MediaCategory, SourceEntry};
use anyhow::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSION: &str = "jpeg";

/// Destination chosen for one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub path: PathBuf,
    /// The natural destination was taken and a suffixed name was used
    pub renamed: bool,
}

/// Maps source entries to unique destination paths under one root
pub struct PathResolver {
    dest_root: PathBuf,
    claimed: HashSet<String>,
}

impl PathResolver {
    pub fn new(dest_root: impl Into<PathBuf>) -> Self {
        Self {
            dest_root: dest_root.into(),
            claimed: HashSet::new(),
        }
    }

    /// Natural destination, ignoring collisions
    pub fn destination_for(&self, entry: &SourceEntry) -> PathBuf {
        let target = self.dest_root.join(&entry.relative_path);
        match entry.category {
            MediaCategory::Image => target.with_extension(IMAGE_EXTENSION),
            _ => target,
        }
    }

    /// Reserve a destination no earlier entry of this run is using
    pub fn claim(&mut self, entry: &SourceEntry) -> Claim {
        let natural = self.destination_for(entry);
        if self.try_reserve(&natural) {
            return Claim {
                path: natural,
                renamed: false,
            };
        }

        let stem = natural
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix = if entry.extension.is_empty() {
            "dup".to_string()
        } else {
            entry.extension.clone()
        };
        let extension = natural
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut counter = 1u32;
        loop {
            let name = if counter == 1 {
                format!("{}_{}", stem, suffix)
            } else {
                format!("{}_{}_{}", stem, suffix, counter)
            };
            let candidate = if extension.is_empty() {
                natural.with_file_name(name)
            } else {
                natural.with_file_name(format!("{}.{}", name, extension))
            };
            if self.try_reserve(&candidate) {
                return Claim {
                    path: candidate,
                    renamed: true,
                };
            }
            counter += 1;
        }
    }

    // Case-insensitive so the same rule holds on NTFS and APFS.
    fn try_reserve(&mut self, path: &Path) -> bool {
        self.claimed.insert(path.to_string_lossy().to_lowercase())
    }

    /// Create parent directories if needed
    pub async fn ensure_parent_dirs(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                anyhow::anyhow!(
                    "Failed to create parent directories for {}: {}",
                    path.display(),
                    e
                )
            })?;
        }
        Ok(())
    }
}
