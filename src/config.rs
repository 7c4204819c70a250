//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con i parametri di esecuzione
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//!
//! ## Parametri di configurazione:
//! - `tools_dir`: Directory con i tool di conversione, cercata prima del PATH (default: None)
//! - `preferred_tool`: Tool da provare per primo (default: None = ordine standard)
//! - `recursive`: Scansione ricorsiva delle cartelle (default: true)
//! - `json_output`: Eventi JSON su stdout invece della progress bar (default: false)
//!
//! La qualità JPEG NON è configurabile: vedi `codec::JPEG_QUALITY`.
//!
//! ## Esempio:
//! ```rust
//! use heic_converter::Config;
//!
//! let config = Config {
//!     preferred_tool: Some("heif-convert".to_string()),
//!     ..Default::default()
//! };
//! config.validate().unwrap();
//! ```

use crate::codec::KNOWN_TOOLS;
use crate::error::{ConvertError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a conversion session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory searched for codec tools before the system PATH
    pub tools_dir: Option<PathBuf>,
    /// Codec tool tried before the standard order
    pub preferred_tool: Option<String>,
    /// Descend into subfolders when a folder is added
    pub recursive: bool,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools_dir: None,
            preferred_tool: None,
            recursive: true,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if let Some(ref tool) = self.preferred_tool {
            if !KNOWN_TOOLS.contains(&tool.as_str()) {
                return Err(ConvertError::Validation(format!(
                    "Unknown conversion tool '{}', expected one of: {}",
                    tool,
                    KNOWN_TOOLS.join(", ")
                )));
            }
        }

        if let Some(ref tools_dir) = self.tools_dir {
            if !tools_dir.is_dir() {
                return Err(ConvertError::Validation(format!(
                    "Tools directory is not a directory: {}",
                    tools_dir.display()
                )));
            }
        }

        Ok(())
    }

    /// Default location of the config file (`~/.config/heic2jpg/config.json` on Linux)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("heic2jpg").join("config.json"))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
