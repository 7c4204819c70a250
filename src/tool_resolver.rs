//! # Tool Path Resolver
//!
//! Trova i tool esterni di conversione HEIC:
//! - Directory configurata (`Config::tools_dir`), con o senza sottocartella per piattaforma
//! - Tool installati nel PATH di sistema

use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tool path resolver for bundled and system-installed codec tools
#[derive(Debug, Clone, Default)]
pub struct ToolPathResolver {
    tools_dir: Option<PathBuf>,
}

impl ToolPathResolver {
    pub fn new(tools_dir: Option<PathBuf>) -> Self {
        Self { tools_dir }
    }

    /// Resolve the path to a specific tool, tools dir first
    pub fn resolve_tool(&self, tool_name: &str) -> Option<PathBuf> {
        if let Some(ref tools_dir) = self.tools_dir {
            if let Some(bundled) = Self::find_in_tools_dir(tools_dir, tool_name) {
                debug!("Using bundled tool: {} -> {:?}", tool_name, bundled);
                return Some(bundled);
            }
        }

        let system = Self::find_in_system_path(tool_name);
        if let Some(ref path) = system {
            debug!("Using system tool: {} -> {:?}", tool_name, path);
        }
        system
    }

    /// Check if a specific tool is available
    pub fn is_tool_available(&self, tool_name: &str) -> bool {
        self.resolve_tool(tool_name).is_some()
    }

    fn executable_name(tool_name: &str) -> String {
        let extension = if cfg!(windows) { ".exe" } else { "" };
        format!("{}{}", tool_name, extension)
    }

    fn platform_dir() -> &'static str {
        if cfg!(target_os = "windows") {
            "windows"
        } else if cfg!(target_os = "macos") {
            "darwin"
        } else {
            env::consts::OS
        }
    }

    // tools/<tool> or tools/<platform>/<tool>
    fn find_in_tools_dir(tools_dir: &Path, tool_name: &str) -> Option<PathBuf> {
        let executable = Self::executable_name(tool_name);
        [
            tools_dir.join(&executable),
            tools_dir.join(Self::platform_dir()).join(&executable),
        ]
        .into_iter()
        .find(|path| path.is_file())
    }

    fn find_in_system_path(tool_name: &str) -> Option<PathBuf> {
        which::which(tool_name).ok()
    }

    /// Installation hint for a missing tool
    pub fn install_instructions(tool_name: &str) -> String {
        match tool_name {
            "sips" => "built into macOS".to_string(),
            "heif-convert" if cfg!(target_os = "macos") => "brew install libheif".to_string(),
            "heif-convert" => "sudo apt-get install libheif-examples".to_string(),
            "magick" | "convert" if cfg!(target_os = "macos") => "brew install imagemagick".to_string(),
            "magick" | "convert" => "sudo apt-get install imagemagick".to_string(),
            _ => format!("install {}", tool_name),
        }
    }
}
