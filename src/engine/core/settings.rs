//! Conversion settings.
//!
//! Settings arrive in layers (command line and environment, then the config
//! file's `[defaults]` table). Each layer is a [`SettingsLayer`] of optional
//! values; the merged layer is validated once into an immutable
//! [`ConvertSettings`] that the rest of the engine borrows.

use super::profile::{DEFAULT_HW_PRESET, DEFAULT_SW_PRESET, OutputTarget};
use super::types::{AudioMode, GpuChoice, QualityTier, SubtitleMode, VideoCodec};
use crate::error::{ConvertError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default audio codec for re-encoding
pub const DEFAULT_AUDIO_CODEC: &str = "aac";

/// One layer of user settings; `None` means "not set here"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsLayer {
    pub gpu: Option<GpuChoice>,
    pub video_quality: Option<QualityTier>,
    pub video_encoder: Option<VideoCodec>,
    pub preset: Option<String>,
    pub video_filter: Option<String>,
    pub video_resolution: Option<String>,
    pub options: Option<String>,
    pub subtitle_extract: Option<SubtitleMode>,
    pub audio_handling: Option<AudioMode>,
    pub audio_codec: Option<String>,
    pub audio_bitrate: Option<String>,
    pub audio_channels: Option<String>,
    pub output_file: Option<PathBuf>,
    pub output_folder: Option<PathBuf>,
    pub output_format: Option<String>,
    pub trim_start: Option<String>,
    pub trim_end: Option<String>,
    pub trim_duration: Option<String>,
    pub gpu_partial: Option<bool>,
    pub force_software: Option<bool>,
    pub force_copy_video: Option<bool>,
    pub only_extract_subtitles: Option<bool>,
    pub force_encoder: Option<String>,
    pub force_decoder: Option<String>,
}

/// Empty strings count as unset, the same as an absent environment variable
fn set<T>(value: Option<T>) -> Option<T>
where
    T: AsRef<str>,
{
    value.filter(|v| !v.as_ref().trim().is_empty())
}

impl SettingsLayer {
    /// Fill every unset field from `lower`
    pub fn or(self, lower: SettingsLayer) -> SettingsLayer {
        SettingsLayer {
            gpu: self.gpu.or(lower.gpu),
            video_quality: self.video_quality.or(lower.video_quality),
            video_encoder: self.video_encoder.or(lower.video_encoder),
            preset: set(self.preset).or(lower.preset),
            video_filter: set(self.video_filter).or(lower.video_filter),
            video_resolution: set(self.video_resolution).or(lower.video_resolution),
            options: set(self.options).or(lower.options),
            subtitle_extract: self.subtitle_extract.or(lower.subtitle_extract),
            audio_handling: self.audio_handling.or(lower.audio_handling),
            audio_codec: set(self.audio_codec).or(lower.audio_codec),
            audio_bitrate: set(self.audio_bitrate).or(lower.audio_bitrate),
            audio_channels: set(self.audio_channels).or(lower.audio_channels),
            output_file: self.output_file.or(lower.output_file),
            output_folder: self.output_folder.or(lower.output_folder),
            output_format: set(self.output_format).or(lower.output_format),
            trim_start: set(self.trim_start).or(lower.trim_start),
            trim_end: set(self.trim_end).or(lower.trim_end),
            trim_duration: set(self.trim_duration).or(lower.trim_duration),
            gpu_partial: self.gpu_partial.or(lower.gpu_partial),
            force_software: self.force_software.or(lower.force_software),
            force_copy_video: self.force_copy_video.or(lower.force_copy_video),
            only_extract_subtitles: self.only_extract_subtitles.or(lower.only_extract_subtitles),
            force_encoder: set(self.force_encoder).or(lower.force_encoder),
            force_decoder: set(self.force_decoder).or(lower.force_decoder),
        }
    }

    /// Validate and freeze the merged layer
    pub fn resolve(self) -> Result<ConvertSettings> {
        let trim = Trim {
            start: set(self.trim_start).map(|s| parse_time("trim_start", &s)).transpose()?,
            end: set(self.trim_end).map(|s| parse_time("trim_end", &s)).transpose()?,
            duration: set(self.trim_duration)
                .map(|s| parse_time("trim_duration", &s))
                .transpose()?,
        };

        let audio = AudioSettings {
            mode: self.audio_handling.unwrap_or_default(),
            codec: set(self.audio_codec).unwrap_or_else(|| DEFAULT_AUDIO_CODEC.to_string()),
            bitrates_kbps: set(self.audio_bitrate)
                .map(|s| parse_bitrate_list(&s))
                .transpose()?
                .unwrap_or_default(),
            channels: set(self.audio_channels)
                .map(|s| parse_channel_list(&s))
                .transpose()?
                .unwrap_or_default(),
        };

        let gpu = self.gpu.unwrap_or_default();
        Ok(ConvertSettings {
            gpu,
            quality: self.video_quality.unwrap_or_default(),
            video_codec: self.video_encoder.unwrap_or_default(),
            preset: set(self.preset).map(|p| p.trim().to_ascii_lowercase()),
            video_filter: set(self.video_filter).map(|f| f.trim().to_string()),
            video_resolution: set(self.video_resolution)
                .map(|r| parse_resolution(&r))
                .transpose()?,
            extra_options: set(self.options)
                .map(|o| split_options(&o))
                .transpose()?
                .unwrap_or_default(),
            subtitle_mode: self.subtitle_extract.unwrap_or_default(),
            audio,
            output: OutputTarget {
                file: self.output_file,
                folder: self.output_folder,
                format: set(self.output_format),
            },
            trim,
            gpu_partial: self.gpu_partial.unwrap_or(false),
            force_software: self.force_software.unwrap_or(false) || gpu == GpuChoice::Software,
            force_copy_video: self.force_copy_video.unwrap_or(false),
            only_extract_subtitles: self.only_extract_subtitles.unwrap_or(false),
            force_encoder: set(self.force_encoder).map(|s| s.trim().to_string()),
            force_decoder: set(self.force_decoder).map(|s| s.trim().to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioSettings {
    pub mode: AudioMode,
    pub codec: String,
    /// One value for every track, or one per track
    pub bitrates_kbps: Vec<u32>,
    /// One value for every track, or one per track
    pub channels: Vec<u32>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            mode: AudioMode::default(),
            codec: DEFAULT_AUDIO_CODEC.to_string(),
            bitrates_kbps: Vec::new(),
            channels: Vec::new(),
        }
    }
}

/// Input-side cut points, in seconds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trim {
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub duration: Option<f64>,
}

impl Trim {
    /// `-ss`/`-to`/`-t` as input options (placed before `-i`)
    pub fn input_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(start) = self.start {
            args.push("-ss".to_string());
            args.push(format_seconds(start));
        }
        // An end point and a duration are mutually exclusive; the end point wins
        if let Some(end) = self.end {
            args.push("-to".to_string());
            args.push(format_seconds(end));
        } else if let Some(duration) = self.duration {
            args.push("-t".to_string());
            args.push(format_seconds(duration));
        }
        args
    }
}

/// Validated, immutable settings for a conversion run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertSettings {
    pub gpu: GpuChoice,
    pub quality: QualityTier,
    pub video_codec: VideoCodec,
    pub preset: Option<String>,
    pub video_filter: Option<String>,
    pub video_resolution: Option<(u32, u32)>,
    pub extra_options: Vec<String>,
    pub subtitle_mode: SubtitleMode,
    pub audio: AudioSettings,
    pub output: OutputTarget,
    pub trim: Trim,
    pub gpu_partial: bool,
    pub force_software: bool,
    pub force_copy_video: bool,
    pub only_extract_subtitles: bool,
    pub force_encoder: Option<String>,
    pub force_decoder: Option<String>,
}

impl ConvertSettings {
    pub fn hw_preset(&self) -> &str {
        self.preset.as_deref().unwrap_or(DEFAULT_HW_PRESET)
    }

    pub fn sw_preset(&self) -> &str {
        self.preset.as_deref().unwrap_or(DEFAULT_SW_PRESET)
    }

    /// User filter chain with the requested resolution appended as a scale
    pub fn filter_chain(&self) -> Option<String> {
        let scale = self
            .video_resolution
            .map(|(w, h)| format!("scale={}:{}", w, h));
        match (self.video_filter.as_deref(), scale) {
            (Some(filter), Some(scale)) => Some(format!("{},{}", filter, scale)),
            (Some(filter), None) => Some(filter.to_string()),
            (None, scale) => scale,
        }
    }

    /// A forced encoder or decoder pins the run to a single pipeline
    pub fn is_forced(&self) -> bool {
        self.force_encoder.is_some() || self.force_decoder.is_some()
    }

    /// Whether GPU vendor detection is needed at all
    pub fn wants_hardware(&self) -> bool {
        !self.force_software && !self.force_copy_video && !self.is_forced()
    }
}

/// Boolean flag values as they appear in environment variables
pub fn parse_flag(s: &str) -> std::result::Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected a boolean, got '{}'", other)),
    }
}

/// Seconds (`90`, `12.5`) or clock time (`1:30`, `01:02:03.250`)
pub fn parse_time(field: &'static str, s: &str) -> Result<f64> {
    let s = s.trim();
    let mut seconds = 0.0;
    for part in s.split(':') {
        let value: f64 = part.parse().map_err(|_| ConvertError::invalid(field, s))?;
        if value < 0.0 {
            return Err(ConvertError::invalid(field, s));
        }
        seconds = seconds * 60.0 + value;
    }
    if s.split(':').count() > 3 {
        return Err(ConvertError::invalid(field, s));
    }
    Ok(seconds)
}

/// ffmpeg accepts plain seconds; keep millisecond precision
pub fn format_seconds(seconds: f64) -> String {
    let formatted = format!("{:.3}", seconds);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// `1280x720` or `1280:720`
pub fn parse_resolution(s: &str) -> Result<(u32, u32)> {
    let (w, h) = s
        .trim()
        .split_once(['x', 'X', ':'])
        .ok_or_else(|| ConvertError::invalid("video_resolution", s))?;
    let w: u32 = w.trim().parse().map_err(|_| ConvertError::invalid("video_resolution", s))?;
    let h: u32 = h.trim().parse().map_err(|_| ConvertError::invalid("video_resolution", s))?;
    if w == 0 || h == 0 {
        return Err(ConvertError::invalid("video_resolution", s));
    }
    Ok((w, h))
}

/// `128k`, `192`, or a comma-separated list of those, in kbps
pub fn parse_bitrate_list(s: &str) -> Result<Vec<u32>> {
    s.split(',')
        .map(|item| {
            let item = item.trim();
            let digits = item.trim_end_matches(['k', 'K']);
            match digits.parse::<u32>() {
                Ok(kbps) if kbps > 0 => Ok(kbps),
                _ => Err(ConvertError::invalid("audio_bitrate", item)),
            }
        })
        .collect()
}

pub fn parse_channel_list(s: &str) -> Result<Vec<u32>> {
    s.split(',')
        .map(|item| match item.trim().parse::<u32>() {
            Ok(channels) if (1..=16).contains(&channels) => Ok(channels),
            _ => Err(ConvertError::invalid("audio_channels", item.trim())),
        })
        .collect()
}

/// Split raw passthrough options with shell quoting rules
pub fn split_options(s: &str) -> Result<Vec<String>> {
    shlex::split(s).ok_or_else(|| ConvertError::invalid("options", s))
}
