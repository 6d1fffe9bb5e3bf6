//! # Duplicate Index Module
//!
//! Deduplicazione in un solo passaggio, sensibile all'ordine.
//!
//! La chiave è `(nome file in minuscolo, mtime in tick)`: due file con lo stesso
//! nome e lo stesso istante di modifica sono lo stesso asset, indipendentemente
//! dalla directory. Il primo osservato vince; i successivi vengono saltati con un
//! riferimento al path relativo del primo. Nessun confronto di contenuto.

use crate::catalog::SourceEntry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Coarse identity of a media asset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DuplicateKey {
    pub file_name: String,
    pub modified_ticks: i64,
}

impl DuplicateKey {
    pub fn new(file_name: &str, modified_ticks: i64) -> Self {
        Self {
            file_name: file_name.to_lowercase(),
            modified_ticks,
        }
    }
}

impl From<&SourceEntry> for DuplicateKey {
    fn from(entry: &SourceEntry) -> Self {
        Self::new(&entry.file_name(), entry.modified_ticks())
    }
}

/// Decision for one observed key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    FirstSeen,
    /// Relative path of the entry that claimed the key first
    Duplicate(PathBuf),
}

/// In-memory first-seen set, scoped to one run
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    first_seen: HashMap<DuplicateKey, PathBuf>,
}

impl DuplicateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Must be called in traversal order.
    pub fn observe(&mut self, key: DuplicateKey, relative_path: &Path) -> Observation {
        match self.first_seen.get(&key) {
            Some(original) => Observation::Duplicate(original.clone()),
            None => {
                self.first_seen.insert(key, relative_path.to_path_buf());
                Observation::FirstSeen
            }
        }
    }

    pub fn observe_entry(&mut self, entry: &SourceEntry) -> Observation {
        self.observe(DuplicateKey::from(entry), &entry.relative_path)
    }

    pub fn len(&self) -> usize {
        self.first_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_seen.is_empty()
    }
}
