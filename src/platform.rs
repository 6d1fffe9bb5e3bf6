//! # Platform-specific utilities
//!
//! Questo modulo centralizza la logica cross-platform per trovare il tool di
//! codifica esterno. Su Windows `convert.exe` è un comando di sistema che non ha
//! nulla a che fare con ImageMagick, quindi lì viene cercato solo `magick`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::debug;

/// Platform-specific command manager
pub struct PlatformCommands {
    commands: HashMap<&'static str, &'static str>,
    which_command: &'static str,
    codec_candidates: &'static [&'static str],
}

impl PlatformCommands {
    /// Get the singleton instance
    pub fn instance() -> &'static Self {
        static INSTANCE: OnceLock<PlatformCommands> = OnceLock::new();
        INSTANCE.get_or_init(Self::new)
    }

    fn new() -> Self {
        let mut commands = HashMap::new();
        if cfg!(windows) {
            commands.insert("magick", "magick.exe");
            Self {
                commands,
                which_command: "where",
                codec_candidates: &["magick"],
            }
        } else {
            commands.insert("magick", "magick");
            commands.insert("convert", "convert");
            Self {
                commands,
                which_command: "which",
                codec_candidates: &["magick", "convert"],
            }
        }
    }

    /// Get the platform-specific command name
    pub fn get_command<'a>(&self, base_name: &'a str) -> &'a str {
        self.commands.get(base_name).copied().unwrap_or(base_name)
    }

    /// Get the command used to check if a program exists
    pub fn which_command(&self) -> &str {
        self.which_command
    }

    /// Codec binaries to try, in order of preference
    pub fn codec_candidates(&self) -> &[&'static str] {
        self.codec_candidates
    }

    /// Resolve a command to an absolute path via `which`/`where`
    pub async fn resolve_tool(&self, base_name: &str) -> Option<PathBuf> {
        let command_name = self.get_command(base_name);

        let output = tokio::process::Command::new(self.which_command)
            .arg(command_name)
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            debug!("{} not found on PATH", command_name);
            return None;
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(PathBuf::from)
    }

    /// Check if a command is available on the system
    pub async fn is_command_available(&self, base_name: &str) -> bool {
        self.resolve_tool(base_name).await.is_some()
    }

    /// First available codec binary
    pub async fn find_codec(&self) -> Option<PathBuf> {
        for candidate in self.codec_candidates {
            if let Some(path) = self.resolve_tool(candidate).await {
                debug!("Using codec binary {}", path.display());
                return Some(path);
            }
        }
        None
    }
}
