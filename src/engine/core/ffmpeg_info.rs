use crate::error::{ConvertError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Explicit executable locations from the config file's `[tools]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
    pub lspci: Option<PathBuf>,
    pub vainfo: Option<PathBuf>,
}

impl ToolPaths {
    fn configured(&self, name: &str) -> Option<&Path> {
        match name {
            "ffmpeg" => self.ffmpeg.as_deref(),
            "ffprobe" => self.ffprobe.as_deref(),
            "lspci" => self.lspci.as_deref(),
            "vainfo" => self.vainfo.as_deref(),
            _ => None,
        }
    }
}

/// Resolve an executable: configured path first, then PATH
pub fn locate_tool(name: &str, paths: &ToolPaths) -> Result<PathBuf> {
    if let Some(path) = paths.configured(name) {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        tracing::warn!(tool = name, path = %path.display(), "configured tool path does not exist, searching PATH");
    }
    which::which(name).map_err(|_| ConvertError::tool_not_found(name))
}

/// The external programs a conversion run depends on.
///
/// `ffmpeg` and `ffprobe` are resolved up front; the hardware probes are
/// only looked up when a code path actually needs them.
#[derive(Debug, Clone)]
pub struct Tools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    /// Configured overrides for the auxiliary probes
    pub paths: ToolPaths,
}

impl Tools {
    pub fn locate(paths: &ToolPaths) -> Result<Self> {
        let ffmpeg = locate_tool("ffmpeg", paths)?;
        let ffprobe = locate_tool("ffprobe", paths)?;
        tracing::debug!(ffmpeg = %ffmpeg.display(), ffprobe = %ffprobe.display(), "located transcoder");
        Ok(Self {
            ffmpeg,
            ffprobe,
            paths: paths.clone(),
        })
    }

    /// Look up an auxiliary probe (`lspci`, `vainfo`); missing is fatal
    pub fn require(&self, name: &str) -> Result<PathBuf> {
        locate_tool(name, &self.paths)
    }
}

/// First line of `<tool> -version`
pub fn tool_version(program: &Path) -> anyhow::Result<String> {
    use anyhow::Context;

    let output = Command::new(program)
        .arg("-version")
        .output()
        .with_context(|| format!("Failed to execute {}", program.display()))?;

    if !output.status.success() {
        anyhow::bail!("{} -version failed with status: {}", program.display(), output.status);
    }

    let version_output = String::from_utf8_lossy(&output.stdout);
    let first_line = version_output.lines().next().unwrap_or("Unknown version");

    Ok(first_line.to_string())
}

/// Raw `ffmpeg -hide_banner -encoders` listing
pub fn list_encoders(ffmpeg: &Path) -> Result<String> {
    let output = Command::new(ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .output()
        .map_err(|e| ConvertError::from_spawn("ffmpeg", e))?;

    if !output.status.success() {
        return Err(ConvertError::tool_failed(
            "ffmpeg",
            format!("-encoders exited with {}", output.status),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
