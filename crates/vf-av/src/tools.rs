//! Locating ffmpeg and ffprobe.
//!
//! A [`ToolRegistry`] is built once at startup. Configured paths win when
//! they exist on disk; anything else is looked up on `PATH` with
//! [`which`]. Missing tools are simply absent, and [`ToolRegistry::require`]
//! turns that into a [`ToolError::NotFound`] at the point of use.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use vf_core::config::ToolsConfig;
use vf_core::ToolError;

pub const FFMPEG: &str = "ffmpeg";
pub const FFPROBE: &str = "ffprobe";

/// Every tool the pipeline shells out to.
pub const KNOWN_TOOLS: [&str; 2] = [FFMPEG, FFPROBE];

/// How a tool's path was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolSource {
    /// `tools.<name>_path` in the config file.
    Configured,
    /// Found on `PATH`.
    Search,
    /// Registered directly through [`ToolRegistry::insert`].
    Manual,
}

/// A tool with a known executable path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTool {
    pub name: String,
    pub path: PathBuf,
    pub source: ToolSource,
}

/// One line of `check-tools` output.
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub resolved: Option<ResolvedTool>,
    /// First line of `<tool> -version`.
    pub version: Option<String>,
}

impl ToolStatus {
    pub fn is_available(&self) -> bool {
        self.resolved.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    resolved: BTreeMap<String, ResolvedTool>,
}

impl ToolRegistry {
    pub fn discover(config: &ToolsConfig) -> Self {
        let mut registry = Self::default();
        for name in KNOWN_TOOLS {
            let configured = match name {
                FFMPEG => config.ffmpeg_path.as_deref(),
                _ => config.ffprobe_path.as_deref(),
            };
            match locate(name, configured) {
                Some(tool) => {
                    tracing::debug!("{name}: {} ({:?})", tool.path.display(), tool.source);
                    registry.resolved.insert(name.to_string(), tool);
                }
                None => tracing::debug!("{name}: not found"),
            }
        }
        registry
    }

    /// Register `name` at an explicit path, replacing any earlier entry.
    pub fn insert(&mut self, name: &str, path: impl Into<PathBuf>) -> &mut Self {
        let tool = ResolvedTool {
            name: name.to_string(),
            path: path.into(),
            source: ToolSource::Manual,
        };
        self.resolved.insert(tool.name.clone(), tool);
        self
    }

    /// # Errors
    ///
    /// [`ToolError::NotFound`] if `name` was never resolved.
    pub fn require(&self, name: &str) -> Result<&ResolvedTool, ToolError> {
        self.resolved.get(name).ok_or_else(|| ToolError::NotFound {
            tool: name.to_string(),
        })
    }

    /// Status of every known tool, in [`KNOWN_TOOLS`] order. Runs each
    /// available tool once to read its version.
    pub fn statuses(&self) -> Vec<ToolStatus> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| {
                let resolved = self.resolved.get(name).cloned();
                let version = resolved.as_ref().and_then(|t| version_line(&t.path));
                ToolStatus {
                    name: name.to_string(),
                    resolved,
                    version,
                }
            })
            .collect()
    }
}

fn locate(name: &str, configured: Option<&Path>) -> Option<ResolvedTool> {
    if let Some(path) = configured {
        if path.exists() {
            return Some(ResolvedTool {
                name: name.to_string(),
                path: path.to_path_buf(),
                source: ToolSource::Configured,
            });
        }
        tracing::warn!(
            "configured {name} at {} does not exist, falling back to PATH",
            path.display()
        );
    }

    which::which(name).ok().map(|path| ResolvedTool {
        name: name.to_string(),
        path,
        source: ToolSource::Search,
    })
}

fn version_line(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout.lines().next().map(str::to_owned)
}
