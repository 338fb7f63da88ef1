use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Implements `FromStr`, `TryFrom<String>` and `Display` for a settings enum
/// from a single table of accepted spellings.
macro_rules! setting_enum {
    ($ty:ident, $field:literal, { $($variant:ident => $name:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = ConvertError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name $(| $alias)* => Ok(Self::$variant),)+
                    _ => Err(ConvertError::invalid($field, s)),
                }
            }
        }

        impl TryFrom<String> for $ty {
            type Error = ConvertError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $(Self::$variant => $name,)+
                })
            }
        }
    };
}

/// GPU selection requested by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GpuChoice {
    #[default]
    Auto,
    Nvidia,
    Amd,
    Intel,
    Software,
    Vulkan,
}

setting_enum!(GpuChoice, "gpu", {
    Auto => "auto",
    Nvidia => "nvidia" | "nvenc",
    Amd => "amd" | "vaapi",
    Intel => "intel" | "qsv",
    Software => "software" | "cpu" | "none",
    Vulkan => "vulkan",
});

/// Named quality tier, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum QualityTier {
    VeryHigh,
    High,
    #[default]
    Medium,
    Low,
    VeryLow,
    SuperLow,
}

setting_enum!(QualityTier, "video_quality", {
    VeryHigh => "veryhigh",
    High => "high",
    Medium => "medium" | "default",
    Low => "low",
    VeryLow => "verylow",
    SuperLow => "superlow",
});

impl QualityTier {
    pub const ALL: [QualityTier; 6] = [
        QualityTier::VeryHigh,
        QualityTier::High,
        QualityTier::Medium,
        QualityTier::Low,
        QualityTier::VeryLow,
        QualityTier::SuperLow,
    ];
}

/// Target video codec family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VideoCodec {
    #[default]
    H264,
    H265,
    Av1,
    Vp9,
}

setting_enum!(VideoCodec, "video_encoder", {
    H264 => "h264" | "avc" | "x264",
    H265 => "h265" | "hevc" | "x265",
    Av1 => "av1",
    Vp9 => "vp9",
});

impl VideoCodec {
    /// Prefix ffmpeg uses for hardware encoder names (`h264_nvenc`, `hevc_vaapi`, ...)
    pub fn hw_prefix(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::H265 => "hevc",
            Self::Av1 => "av1",
            Self::Vp9 => "vp9",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SubtitleMode {
    #[default]
    Extract,
    Embed,
    None,
}

setting_enum!(SubtitleMode, "subtitle_extract", {
    Extract => "extract" | "srt",
    Embed => "embedded" | "embed",
    None => "none",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AudioMode {
    #[default]
    Copy,
    Reencode,
    None,
}

setting_enum!(AudioMode, "audio_handling", {
    Copy => "copy",
    Reencode => "reencode",
    None => "none",
});

macro_rules! into_string {
    ($($ty:ident),+) => {
        $(impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.to_string()
            }
        })+
    };
}

into_string!(GpuChoice, QualityTier, VideoCodec, SubtitleMode, AudioMode);

/// Hardware encoder family a GPU vendor maps onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum HwFamily {
    Nvenc,
    Vaapi,
    Qsv,
    Vulkan,
}

impl HwFamily {
    /// Encoder name suffix used by ffmpeg
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Nvenc => "nvenc",
            Self::Vaapi => "vaapi",
            Self::Qsv => "qsv",
            Self::Vulkan => "vulkan",
        }
    }

    /// Infer the family from an ffmpeg encoder or decoder name
    pub fn from_codec_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with("_nvenc") || lower.ends_with("_cuvid") {
            Some(Self::Nvenc)
        } else if lower.ends_with("_vaapi") {
            Some(Self::Vaapi)
        } else if lower.ends_with("_qsv") {
            Some(Self::Qsv)
        } else if lower.ends_with("_vulkan") {
            Some(Self::Vulkan)
        } else {
            None
        }
    }
}

/// Parser for ffmpeg progress output (key=value format)
#[derive(Debug, Default, Clone)]
pub struct ProgressParser {
    pub out_time_us: u64,
    pub frame: Option<u64>,
    pub fps: Option<f64>,
    pub speed: Option<f64>,
    pub bitrate_kbps: Option<f64>,
    pub total_size: Option<u64>,
    pub is_complete: bool,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a single line of ffmpeg progress output
    pub fn parse_line(&mut self, line: &str) {
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim();
            match key.trim() {
                "out_time_us" => {
                    if let Ok(us) = value.parse::<u64>() {
                        self.out_time_us = us;
                    }
                }
                "frame" => {
                    if let Ok(frame) = value.parse::<u64>() {
                        self.frame = Some(frame);
                    }
                }
                "fps" => {
                    if let Ok(f) = value.parse::<f64>() {
                        self.fps = Some(f);
                    }
                }
                "speed" => {
                    // "1.23x"
                    if let Ok(s) = value.trim_end_matches('x').parse::<f64>() {
                        self.speed = Some(s);
                    }
                }
                "bitrate" => {
                    if let Ok(b) = value.trim_end_matches("kbits/s").parse::<f64>() {
                        self.bitrate_kbps = Some(b);
                    }
                }
                "total_size" => {
                    if let Ok(size) = value.parse::<u64>() {
                        self.total_size = Some(size);
                    }
                }
                "progress" => {
                    if value == "end" {
                        self.is_complete = true;
                    }
                }
                _ => {}
            }
        }
    }

    /// Get output time in seconds
    pub fn out_time_s(&self) -> f64 {
        self.out_time_us as f64 / 1_000_000.0
    }

    /// Calculate progress percentage given total duration
    pub fn progress_pct(&self, duration_s: Option<f64>) -> f64 {
        if let Some(dur) = duration_s {
            if dur > 0.0 {
                return (self.out_time_s() / dur * 100.0).min(100.0);
            }
        }
        0.0
    }
}
