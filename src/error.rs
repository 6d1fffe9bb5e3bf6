//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore custom dell'applicazione.
//!
//! ## Categorie di errori:
//! - `SourceNotFound` / `NotADirectory`: la directory sorgente non è utilizzabile (fatale)
//! - `MissingDependency`: il tool di codifica esterno non è disponibile (fatale)
//! - `InvalidBudget`: budget in byte non positivo
//! - `Validation`: parametri di configurazione non validi
//! - `Io`: errori di I/O (permessi, disco pieno, etc.)
//!
//! Solo le prime tre categorie interrompono un'esecuzione; tutti gli errori per
//! singolo file vengono contati e registrati dal pipeline senza propagarsi.
//!
//! ## Esempio:
//! ```rust
//! use media_archiver::ArchiveError;
//!
//! let err = ArchiveError::MissingDependency("magick".to_string());
//! assert!(err.is_fatal());
//! ```

use std::path::PathBuf;

/// Custom error types for the archiving run
#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    #[error("Source directory does not exist: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Source path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Byte budget must be a positive integer, got {0}")]
    InvalidBudget(u64),

    #[error("Configuration error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// Errors that must stop the run before any file is processed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound(_) | Self::NotADirectory(_) | Self::MissingDependency(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_taxonomy() {
        assert!(ArchiveError::SourceNotFound(PathBuf::from("/nope")).is_fatal());
        assert!(ArchiveError::NotADirectory(PathBuf::from("/etc/hosts")).is_fatal());
        assert!(ArchiveError::MissingDependency("magick".into()).is_fatal());
        assert!(!ArchiveError::InvalidBudget(0).is_fatal());
        assert!(!ArchiveError::Validation("workers".into()).is_fatal());
    }

    #[test]
    fn test_messages_name_the_path() {
        let err = ArchiveError::SourceNotFound(PathBuf::from("/media/missing"));
        assert!(err.to_string().contains("/media/missing"));
    }
}
