//! # File Management Module
//!
//! Questo modulo gestisce le operazioni sui file e la discovery di immagini HEIC.
//!
//! ## Responsabilità:
//! - Riconoscimento estensioni HEIC/HEIF (case-insensitive)
//! - Discovery di file HEIC in una cartella (ricorsiva o no)
//! - Calcolo del path di output (stessa cartella, estensione `jpg`)
//! - Nome leggibile dei file per i messaggi di stato
//!
//! ## Formati supportati:
//! - **Input**: HEIC, HEIF
//! - **Output**: JPG
//!
//! ## Esempio:
//! ```rust
//! use heic_converter::file_manager::FileManager;
//! use std::path::Path;
//!
//! assert!(FileManager::is_heic(Path::new("IMG_0001.HEIC")));
//! assert_eq!(
//!     FileManager::output_path(Path::new("/photos/vacation.heic")),
//!     Path::new("/photos/vacation.jpg"),
//! );
//! ```

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Extensions accepted into the queue, compared lowercase
pub const RECOGNIZED_EXTENSIONS: &[&str] = &["heic", "heif"];

/// Extension of every converted file
pub const OUTPUT_EXTENSION: &str = "jpg";

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Check if a path has a HEIC/HEIF extension
    pub fn is_heic(path: &Path) -> bool {
        if let Some(ext) = path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            RECOGNIZED_EXTENSIONS.contains(&ext_lower.as_str())
        } else {
            false
        }
    }

    /// Find all HEIC/HEIF files in a directory, sorted by path
    pub fn find_heic_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(anyhow::anyhow!("Not a directory: {}", dir.display()));
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();

        for entry in WalkDir::new(dir).max_depth(max_depth).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                // The dropped folder itself must be readable, nested failures are skipped
                Err(e) if e.depth() == 0 => return Err(e.into()),
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if entry.file_type().is_file() && Self::is_heic(entry.path()) {
                files.push(entry.path().to_path_buf());
            }
        }

        debug!("Found {} HEIC files in {}", files.len(), dir.display());
        Ok(files)
    }

    /// Sibling path with the extension replaced by `jpg`
    pub fn output_path(input_path: &Path) -> PathBuf {
        input_path.with_extension(OUTPUT_EXTENSION)
    }

    /// Display name of a path (file name, or the full path if there is none)
    pub fn display_name(path: &Path) -> String {
        path.file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string())
    }
}
