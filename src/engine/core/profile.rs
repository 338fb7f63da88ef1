//! Quality tiers, preset scales and output naming.

use super::types::QualityTier;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Containers the converter knows how to write
pub const OUTPUT_FORMATS: &[&str] = &[
    "mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v", "mpeg", "mpg",
];

pub const DEFAULT_OUTPUT_FORMAT: &str = "mp4";

/// Preset used for hardware encoders when none is configured
pub const DEFAULT_HW_PRESET: &str = "medium";

/// Preset used for software encoders when none is configured
pub const DEFAULT_SW_PRESET: &str = "faster";

/// Numeric quality knobs derived from a quality tier.
///
/// Each value is a quantizer: lower means better quality and bigger files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncodeProfile {
    /// Constant quantizer for VAAPI/Vulkan (`-qp`)
    pub cq: u32,
    /// Software constant rate factor (`-crf`)
    pub crf: u32,
    /// QSV / VP9 VAAPI `-global_quality`
    pub global_quality: u32,
    /// NVENC `-cq`
    pub nvenc_cq: u32,
}

impl EncodeProfile {
    pub fn for_tier(tier: QualityTier) -> Self {
        let (cq, crf, global_quality, nvenc_cq) = match tier {
            QualityTier::VeryHigh => (19, 18, 18, 19),
            QualityTier::High => (22, 21, 21, 22),
            QualityTier::Medium => (25, 24, 24, 25),
            QualityTier::Low => (28, 27, 27, 28),
            QualityTier::VeryLow => (31, 30, 30, 31),
            QualityTier::SuperLow => (35, 34, 34, 35),
        };
        Self {
            cq,
            crf,
            global_quality,
            nvenc_cq,
        }
    }
}

/// NVENC `-preset pN` scale
pub fn nvenc_preset_level(preset: &str) -> u32 {
    match preset {
        "ultrafast" => 1,
        "veryfast" => 2,
        "faster" => 3,
        "medium" => 4,
        "slow" => 5,
        "veryslow" => 6,
        _ => 4,
    }
}

/// QSV accepts x264-style names but has nothing faster than veryfast
pub fn qsv_preset_name(preset: &str) -> &'static str {
    match preset {
        "ultrafast" | "superfast" | "veryfast" => "veryfast",
        "faster" => "faster",
        "fast" => "fast",
        "slow" => "slow",
        "slower" => "slower",
        "veryslow" => "veryslow",
        _ => "medium",
    }
}

/// SVT-AV1 preset (0 = slowest, 13 = fastest)
pub fn svt_av1_preset(preset: &str) -> u32 {
    match preset {
        "ultrafast" => 12,
        "veryfast" => 10,
        "faster" => 8,
        "medium" => 6,
        "slow" => 4,
        "veryslow" => 2,
        _ => 8,
    }
}

/// libvpx-vp9 `-cpu-used` (0 = slowest, 8 = fastest)
pub fn vpx_cpu_used(preset: &str) -> u32 {
    match preset {
        "ultrafast" => 8,
        "veryfast" => 6,
        "faster" => 5,
        "medium" => 4,
        "slow" => 2,
        "veryslow" => 0,
        _ => 4,
    }
}

/// Where the converted file goes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputTarget {
    pub file: Option<PathBuf>,
    pub folder: Option<PathBuf>,
    pub format: Option<String>,
}

fn normalize_format(format: &str) -> Option<String> {
    let lower = format.trim().trim_start_matches('.').to_ascii_lowercase();
    OUTPUT_FORMATS.contains(&lower.as_str()).then_some(lower)
}

fn recognized_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(normalize_format)
}

/// Append `.ext` to a path without touching any dots already in the name
fn with_appended_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Resolve the output path for an input.
///
/// `output_file` wins over everything else. `output_format` always decides
/// the extension when it names a known container; an unknown format falls
/// back to mp4.
pub fn resolve_output_path(input: &Path, target: &OutputTarget) -> PathBuf {
    let format = target.format.as_deref().map(|f| {
        normalize_format(f).unwrap_or_else(|| {
            tracing::warn!(format = f, "unrecognized output format, using mp4");
            DEFAULT_OUTPUT_FORMAT.to_string()
        })
    });

    if let Some(file) = &target.file {
        let file = match &target.folder {
            Some(folder) if file.is_relative() => folder.join(file),
            _ => file.clone(),
        };
        return match (format, recognized_extension(&file)) {
            (Some(fmt), Some(_)) => file.with_extension(fmt),
            (Some(fmt), None) => with_appended_extension(&file, &fmt),
            (None, Some(_)) => file,
            (None, None) => with_appended_extension(&file, DEFAULT_OUTPUT_FORMAT),
        };
    }

    let ext = format.unwrap_or_else(|| DEFAULT_OUTPUT_FORMAT.to_string());
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let dir = match &target.folder {
        Some(folder) => folder.clone(),
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };

    let candidate = dir.join(format!("{}.{}", stem, ext));
    if candidate == input {
        // Never write over the source
        dir.join(format!("{}-converted.{}", stem, ext))
    } else {
        candidate
    }
}
