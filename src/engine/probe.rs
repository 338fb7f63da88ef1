// Input probing using ffprobe

use crate::error::{ConvertError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    profile: Option<String>,
    pix_fmt: Option<String>,
    channels: Option<u32>,
    #[serde(default)]
    disposition: FfprobeDisposition,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    forced: u8,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtitleTrack {
    /// Ordinal among subtitle streams (`0:s:N`)
    pub index: usize,
    pub codec: String,
    pub language: Option<String>,
    pub title: Option<String>,
    pub forced: bool,
}

impl SubtitleTrack {
    /// Only SubRip tracks can be demuxed to a standalone `.srt`
    pub fn is_subrip(&self) -> bool {
        matches!(self.codec.as_str(), "subrip" | "srt")
    }

    /// Text-based tracks, which any container's subtitle codec can take
    pub fn is_text(&self) -> bool {
        matches!(
            self.codec.as_str(),
            "subrip" | "srt" | "ass" | "ssa" | "mov_text" | "webvtt" | "text"
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioTrack {
    /// Ordinal among audio streams (`0:a:N`)
    pub index: usize,
    pub language: Option<String>,
    pub channels: u32,
}

/// Immutable snapshot of one input file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaProbe {
    pub path: PathBuf,
    pub pix_fmt: String,
    pub profile: String,
    pub codec: String,
    pub duration_s: Option<f64>,
    pub subtitle_tracks: Vec<SubtitleTrack>,
    pub audio_tracks: Vec<AudioTrack>,
}

impl MediaProbe {
    /// 10-bit pixel format (`yuv420p10le`, `p010le`, ...) or a 10-bit profile
    pub fn is_ten_bit(&self) -> bool {
        let pix = self.pix_fmt.to_ascii_lowercase();
        pix.contains("p10") || pix.contains("10le") || pix.contains("10be") || self.profile.contains("10")
    }

    pub fn is_hevc(&self) -> bool {
        matches!(self.codec.to_ascii_lowercase().as_str(), "hevc" | "h265")
    }
}

/// Probe input file using ffprobe to get stream metadata
pub fn probe_media(ffprobe: &Path, input_path: &Path) -> Result<MediaProbe> {
    if !input_path.exists() {
        return Err(ConvertError::InputNotFound {
            path: input_path.to_path_buf(),
        });
    }

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(input_path)
        .output()
        .map_err(|e| ConvertError::from_spawn("ffprobe", e))?;

    if !output.status.success() {
        return Err(ConvertError::tool_failed(
            "ffprobe",
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    parse_ffprobe_json(input_path, &String::from_utf8_lossy(&output.stdout))
}

/// Parse `ffprobe -show_format -show_streams` JSON into a `MediaProbe`
pub fn parse_ffprobe_json(path: &Path, json: &str) -> Result<MediaProbe> {
    let output: FfprobeOutput = serde_json::from_str(json)?;

    let mut probe = MediaProbe {
        path: path.to_path_buf(),
        duration_s: output.format.duration.and_then(|d| d.parse::<f64>().ok()),
        ..MediaProbe::default()
    };

    let mut saw_video = false;
    for stream in output.streams {
        match stream.codec_type.as_deref() {
            Some("video") if !saw_video => {
                // First video stream only
                saw_video = true;
                probe.codec = stream.codec_name.unwrap_or_default();
                probe.profile = stream.profile.unwrap_or_default();
                probe.pix_fmt = stream.pix_fmt.unwrap_or_default();
            }
            Some("audio") => {
                probe.audio_tracks.push(AudioTrack {
                    index: probe.audio_tracks.len(),
                    language: stream.tags.language,
                    channels: stream.channels.unwrap_or(2),
                });
            }
            Some("subtitle") => {
                let title_forced = stream
                    .tags
                    .title
                    .as_deref()
                    .is_some_and(|t| t.to_ascii_lowercase().contains("(forced)"));
                probe.subtitle_tracks.push(SubtitleTrack {
                    index: probe.subtitle_tracks.len(),
                    codec: stream.codec_name.unwrap_or_default(),
                    language: stream.tags.language,
                    title: stream.tags.title,
                    forced: title_forced || stream.disposition.forced == 1,
                });
            }
            _ => {}
        }
    }

    if !saw_video {
        return Err(ConvertError::NoVideoStream {
            path: path.to_path_buf(),
        });
    }

    Ok(probe)
}
