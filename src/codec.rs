//! # Image Codec Module
//!
//! Questo modulo incapsula il servizio di decodifica HEIC / codifica JPEG.
//! Nessuna elaborazione in memoria: la conversione è delegata a tool esterni,
//! come `sips` su macOS o `heif-convert` di libheif.
//!
//! ## Tool Selection (priorità decrescente):
//! 1. **sips**: Built-in macOS, usa i codec di sistema
//! 2. **heif-convert**: libheif, disponibile su Linux e macOS
//! 3. **magick**: ImageMagick 7 (richiede il delegate libheif)
//! 4. **convert**: ImageMagick 6
//!
//! Un `preferred_tool` in `Config` viene provato per primo. Se un tool fallisce
//! si passa al successivo; errore solo se falliscono tutti.
//!
//! ## Qualità:
//! Fissa a `JPEG_QUALITY` (0.95), mappata su scala 1-100 per i tool.
//!
//! ## Verifica output:
//! I tool scrivono in un file temporaneo accanto alla destinazione. Dopo ogni
//! tool riuscito il file viene riaperto con `image` per controllare che sia un
//! JPEG valido (header e dimensioni leggibili), e solo allora rinominato sopra
//! `name.jpg`. Se tutti i tool falliscono un JPEG esistente resta intatto.

use crate::config::Config;
use crate::error::{ConvertError, Result};
use crate::tool_resolver::ToolPathResolver;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::process::Command;
use tracing::{debug, error, warn};

/// Lossy quality used for every conversion, on a 0.0-1.0 scale
pub const JPEG_QUALITY: f32 = 0.95;

/// Codec tools in default order of preference
pub const KNOWN_TOOLS: &[&str] = &["sips", "heif-convert", "magick", "convert"];

/// Map a 0.0-1.0 quality onto the 1-100 scale the tools expect
pub fn quality_percent(quality: f32) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8
}

/// Decodes a source image and writes it as JPEG at `destination`
#[async_trait]
pub trait ImageCodec: Send + Sync {
    /// Short identifier for logs
    fn id(&self) -> &'static str;

    /// Convert `source` to a JPEG at `destination`, overwriting it if present
    async fn convert(&self, source: &Path, destination: &Path, quality: f32) -> Result<()>;
}

/// Command line for a known tool
fn tool_args(tool: &str, input: &str, output: &str, quality: u8) -> Vec<String> {
    let quality = quality.to_string();
    let quality = quality.as_str();
    let args: Vec<&str> = match tool {
        "sips" => vec!["-s", "format", "jpeg", "-s", "formatOptions", quality, input, "--out", output],
        "heif-convert" => vec!["-q", quality, input, output],
        _ => vec![input, "-quality", quality, output],
    };
    args.into_iter().map(str::to_string).collect()
}

/// Codec backed by external command line tools
#[derive(Debug, Clone)]
pub struct ExternalToolCodec {
    resolver: ToolPathResolver,
    tool_order: Vec<&'static str>,
}

impl ExternalToolCodec {
    pub fn new(config: &Config) -> Self {
        let mut tool_order: Vec<&'static str> = Vec::with_capacity(KNOWN_TOOLS.len());
        if let Some(ref preferred) = config.preferred_tool {
            if let Some(tool) = KNOWN_TOOLS.iter().find(|t| **t == preferred.as_str()) {
                tool_order.push(*tool);
            }
        }
        for tool in KNOWN_TOOLS {
            if !tool_order.contains(tool) {
                tool_order.push(*tool);
            }
        }

        Self {
            resolver: ToolPathResolver::new(config.tools_dir.clone()),
            tool_order,
        }
    }

    /// Tools in the order they will be tried
    pub fn tool_order(&self) -> &[&'static str] {
        &self.tool_order
    }

    /// Tools that resolve to an executable, in try order
    pub fn available_tools(&self) -> Vec<(&'static str, PathBuf)> {
        self.tool_order
            .iter()
            .filter_map(|tool| self.resolver.resolve_tool(tool).map(|path| (*tool, path)))
            .collect()
    }

    /// Fail if no conversion tool is installed
    pub fn check_dependencies(&self) -> Result<Vec<&'static str>> {
        let available: Vec<&'static str> = self.available_tools().into_iter().map(|(t, _)| t).collect();
        if available.is_empty() {
            let hints: Vec<String> = self
                .tool_order
                .iter()
                .map(|tool| format!("{} ({})", tool, ToolPathResolver::install_instructions(tool)))
                .collect();
            error!("No HEIC conversion tools available");
            return Err(ConvertError::MissingDependency(format!(
                "no HEIC conversion tool found, install one of: {}",
                hints.join(", ")
            )));
        }
        Ok(available)
    }

    /// Human readable tool availability report
    pub fn tools_report(&self) -> String {
        let mut report = String::from("HEIC conversion tools:\n");
        for tool in &self.tool_order {
            match self.resolver.resolve_tool(tool) {
                Some(path) => report.push_str(&format!("  ✅ {} -> {}\n", tool, path.display())),
                None => report.push_str(&format!(
                    "  ❌ {} (install with: {})\n",
                    tool,
                    ToolPathResolver::install_instructions(tool)
                )),
            }
        }
        report
    }

    /// Empty sibling of `destination` the tools write into before it replaces it
    fn staging_path(destination: &Path) -> Result<TempPath> {
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let staging = tempfile::Builder::new()
            .prefix(".heic2jpg-")
            .suffix(".jpg")
            .tempfile_in(dir)?;
        Ok(staging.into_temp_path())
    }

    /// Reopen the produced file and make sure it is a readable JPEG
    async fn verify_output(destination: &Path) -> Result<()> {
        let destination = destination.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let reader = image::io::Reader::open(&destination)?.with_guessed_format()?;
            if reader.format() != Some(image::ImageFormat::Jpeg) {
                return Err(ConvertError::ToolFailed(format!(
                    "{} is not a JPEG file",
                    destination.display()
                )));
            }
            let (width, height) = reader.into_dimensions()?;
            debug!("Verified {} ({}x{})", destination.display(), width, height);
            Ok(())
        })
        .await
        .map_err(|e| ConvertError::ToolFailed(format!("output verification aborted: {}", e)))?
    }
}

#[async_trait]
impl ImageCodec for ExternalToolCodec {
    fn id(&self) -> &'static str {
        "external-tools"
    }

    async fn convert(&self, source: &Path, destination: &Path, quality: f32) -> Result<()> {
        let metadata = tokio::fs::metadata(source).await?;
        if !metadata.is_file() {
            return Err(ConvertError::UnsupportedFormat(format!(
                "{} is not a regular file",
                source.display()
            )));
        }

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(ConvertError::Io(std::io::Error::new(
                    ErrorKind::NotFound,
                    format!("output directory does not exist: {}", parent.display()),
                )));
            }
        }

        let input = source
            .to_str()
            .ok_or_else(|| ConvertError::UnsupportedFormat(format!("non UTF-8 path: {:?}", source)))?;

        let tools = self.available_tools();
        if tools.is_empty() {
            return Err(ConvertError::MissingDependency(format!(
                "no HEIC conversion tool available ({})",
                self.tool_order.join("/")
            )));
        }

        let staging = Self::staging_path(destination)?;
        let output = staging
            .to_str()
            .ok_or_else(|| ConvertError::UnsupportedFormat(format!("non UTF-8 path: {:?}", destination)))?
            .to_string();

        let quality = quality_percent(quality);
        let mut failures = Vec::new();

        for (tool_name, tool_path) in tools {
            let args = tool_args(tool_name, input, &output, quality);
            debug!("Converting with {}: {:?}", tool_name, args);

            let start_time = std::time::Instant::now();
            let result = Command::new(&tool_path).args(&args).output().await;
            let elapsed = start_time.elapsed();

            match result {
                Ok(out) if out.status.success() => match Self::verify_output(&staging).await {
                    Ok(()) => {
                        if destination.exists() {
                            debug!("Overwriting existing output: {}", destination.display());
                        }
                        staging.persist(destination).map_err(|e| ConvertError::Io(e.error))?;
                        debug!("Converted {} with {} in {:?}", input, tool_name, elapsed);
                        return Ok(());
                    }
                    Err(e) => {
                        warn!("{} reported success but output is unusable: {}", tool_name, e);
                        failures.push(format!("{}: {}", tool_name, e));
                    }
                },
                Ok(out) => {
                    let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
                    warn!("{} failed after {:?} ({}), trying next tool", tool_name, elapsed, out.status);
                    failures.push(format!("{}: {} {}", tool_name, out.status, stderr));
                }
                Err(e) => {
                    warn!("Could not launch {}: {}", tool_name, e);
                    failures.push(format!("{}: {}", tool_name, e));
                }
            }
        }

        Err(ConvertError::ToolFailed(format!(
            "all conversion tools failed for {}: {}",
            input,
            failures.join("; ")
        )))
    }
}
