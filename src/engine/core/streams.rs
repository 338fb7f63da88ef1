//! Subtitle and audio handling shared by every pipeline candidate.

use super::settings::{AudioSettings, ConvertSettings};
use super::types::{AudioMode, SubtitleMode};
use crate::engine::probe::{AudioTrack, MediaProbe, SubtitleTrack};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Bitrate per channel when re-encoding without an explicit bitrate
pub const KBPS_PER_CHANNEL: u32 = 32;

/// Language tag for tracks without a usable one
pub const UNDETERMINED_LANGUAGE: &str = "und";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtitleOutput {
    /// Subtitle ordinal in the input (`0:s:N`)
    pub track: usize,
    /// Language suffix, unique within one input (`eng`, `eng2`, ...)
    pub suffix: String,
    pub forced: bool,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SubtitlePlan {
    /// Demux to sidecar `.srt` files; the main output carries none
    Extract(Vec<SubtitleOutput>),
    /// Keep text subtitles in the container, converted to a codec it accepts
    Embed { codec: &'static str, tracks: Vec<usize> },
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioOutput {
    pub track: usize,
    pub bitrate_kbps: u32,
    pub channels: u32,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AudioPlan {
    Copy { tracks: Vec<usize> },
    Reencode { codec: String, tracks: Vec<AudioOutput> },
    None,
}

/// Stream decisions for one input, merged into every candidate's command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamPlan {
    pub subtitles: SubtitlePlan,
    pub audio: AudioPlan,
}

impl StreamPlan {
    /// Sidecar subtitle files to extract before the main conversion
    pub fn extractions(&self) -> &[SubtitleOutput] {
        match &self.subtitles {
            SubtitlePlan::Extract(outputs) => outputs,
            _ => &[],
        }
    }

    pub fn audio_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        match &self.audio {
            AudioPlan::Copy { tracks } => {
                for (out, track) in tracks.iter().enumerate() {
                    args.push("-map".to_string());
                    args.push(format!("0:a:{}", track));
                    args.push(format!("-c:a:{}", out));
                    args.push("copy".to_string());
                }
            }
            AudioPlan::Reencode { codec, tracks } => {
                for (out, track) in tracks.iter().enumerate() {
                    args.push("-map".to_string());
                    args.push(format!("0:a:{}", track.track));
                    args.push(format!("-c:a:{}", out));
                    args.push(codec.clone());
                    args.push(format!("-b:a:{}", out));
                    args.push(format!("{}k", track.bitrate_kbps));
                    args.push(format!("-ac:a:{}", out));
                    args.push(track.channels.to_string());
                    args.push(format!("-metadata:s:a:{}", out));
                    args.push(format!("language={}", track.language));
                }
            }
            AudioPlan::None => args.push("-an".to_string()),
        }
        args
    }

    pub fn subtitle_args(&self) -> Vec<String> {
        match &self.subtitles {
            SubtitlePlan::Embed { tracks, .. } if tracks.is_empty() => vec!["-sn".to_string()],
            SubtitlePlan::Embed { codec, tracks } => {
                let mut args = Vec::new();
                for track in tracks {
                    args.push("-map".to_string());
                    args.push(format!("0:s:{}", track));
                }
                args.push("-c:s".to_string());
                args.push(codec.to_string());
                args
            }
            SubtitlePlan::Extract(_) | SubtitlePlan::None => vec!["-sn".to_string()],
        }
    }

    /// Audio then subtitle arguments for the main output
    pub fn output_args(&self) -> Vec<String> {
        let mut args = self.audio_args();
        args.extend(self.subtitle_args());
        args
    }
}

/// Lowercased language tag, with placeholders collapsed to `und`
pub fn normalize_language(language: Option<&str>) -> String {
    match language.map(|l| l.trim().to_ascii_lowercase()) {
        Some(lang) if !matches!(lang.as_str(), "" | "und" | "unknown" | "n/a" | "none") => lang,
        _ => UNDETERMINED_LANGUAGE.to_string(),
    }
}

/// Text codec the output container can carry
pub fn embed_codec_for(output: &Path) -> &'static str {
    let ext = output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4" | "m4v" | "mov") => "mov_text",
        Some("webm") => "webvtt",
        _ => "srt",
    }
}

/// Sidecar paths for every SubRip track: `<stem>.<lang>[n][.forced].srt`
pub fn subtitle_outputs(tracks: &[SubtitleTrack], output: &Path) -> Vec<SubtitleOutput> {
    let dir = output.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());

    let mut issued: HashSet<String> = HashSet::new();
    let mut outputs = Vec::new();

    for track in tracks {
        if !track.is_subrip() {
            tracing::debug!(track = track.index, codec = %track.codec, "skipping non-SubRip subtitle");
            continue;
        }

        // A tag like `eng2` may already be taken by a numbered duplicate
        let language = normalize_language(track.language.as_deref());
        let mut suffix = language.clone();
        let mut n = 2;
        while issued.contains(&suffix) {
            suffix = format!("{}{}", language, n);
            n += 1;
        }
        issued.insert(suffix.clone());

        let file_name = if track.forced {
            format!("{}.{}.forced.srt", stem, suffix)
        } else {
            format!("{}.{}.srt", stem, suffix)
        };

        outputs.push(SubtitleOutput {
            track: track.index,
            path: dir.join(file_name),
            suffix,
            forced: track.forced,
        });
    }
    outputs
}

/// One value for all tracks, or one per track
fn per_track(values: &[u32], index: usize) -> Option<u32> {
    if values.len() == 1 {
        values.first().copied()
    } else {
        values.get(index).copied()
    }
}

pub fn plan_audio(tracks: &[AudioTrack], audio: &AudioSettings) -> AudioPlan {
    match audio.mode {
        AudioMode::None => AudioPlan::None,
        AudioMode::Copy => AudioPlan::Copy {
            tracks: tracks.iter().map(|t| t.index).collect(),
        },
        AudioMode::Reencode => AudioPlan::Reencode {
            codec: audio.codec.clone(),
            tracks: tracks
                .iter()
                .enumerate()
                .map(|(i, track)| {
                    let channels = per_track(&audio.channels, i).unwrap_or(track.channels);
                    AudioOutput {
                        track: track.index,
                        bitrate_kbps: per_track(&audio.bitrates_kbps, i)
                            .unwrap_or(KBPS_PER_CHANNEL * channels),
                        channels,
                        language: normalize_language(track.language.as_deref()),
                    }
                })
                .collect(),
        },
    }
}

pub fn build_stream_plan(probe: &MediaProbe, settings: &ConvertSettings, output: &Path) -> StreamPlan {
    let subtitles = match settings.subtitle_mode {
        SubtitleMode::Extract => SubtitlePlan::Extract(subtitle_outputs(&probe.subtitle_tracks, output)),
        SubtitleMode::Embed => {
            let tracks: Vec<usize> = probe
                .subtitle_tracks
                .iter()
                .filter(|t| {
                    let text = t.is_text();
                    if !text {
                        tracing::warn!(track = t.index, codec = %t.codec, "bitmap subtitle cannot be embedded, dropping");
                    }
                    text
                })
                .map(|t| t.index)
                .collect();
            SubtitlePlan::Embed {
                codec: embed_codec_for(output),
                tracks,
            }
        }
        SubtitleMode::None => SubtitlePlan::None,
    };

    StreamPlan {
        subtitles,
        audio: plan_audio(&probe.audio_tracks, &settings.audio),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::core::settings::SettingsLayer;

    fn sub(index: usize, language: Option<&str>, forced: bool) -> SubtitleTrack {
        SubtitleTrack {
            index,
            codec: "subrip".to_string(),
            language: language.map(String::from),
            title: None,
            forced,
        }
    }

    fn audio(index: usize, channels: u32) -> AudioTrack {
        AudioTrack {
            index,
            language: Some("eng".to_string()),
            channels,
        }
    }

    #[test]
    fn test_duplicate_languages_are_numbered() {
        let tracks = vec![
            sub(0, Some("eng"), false),
            sub(1, Some("eng"), false),
            sub(2, Some("ENG"), true),
            sub(3, Some("por"), false),
        ];
        let outputs = subtitle_outputs(&tracks, Path::new("/out/movie.mp4"));
        let names: Vec<_> = outputs
            .iter()
            .map(|o| o.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "movie.eng.srt",
                "movie.eng2.srt",
                "movie.eng3.forced.srt",
                "movie.por.srt"
            ]
        );
        assert_eq!(outputs[0].path.parent(), Some(Path::new("/out")));
    }

    #[test]
    fn test_placeholder_languages_become_und() {
        for lang in [None, Some(""), Some("unknown"), Some("N/A"), Some("und")] {
            assert_eq!(normalize_language(lang), "und", "{:?}", lang);
        }
        let tracks = vec![sub(0, None, false), sub(1, Some("unknown"), false)];
        let outputs = subtitle_outputs(&tracks, Path::new("movie.mp4"));
        assert_eq!(outputs[0].suffix, "und");
        assert_eq!(outputs[1].suffix, "und2");
    }

    #[test]
    fn test_numbered_tag_does_not_collide() {
        let tracks = vec![
            sub(0, Some("eng2"), false),
            sub(1, Some("eng"), false),
            sub(2, Some("eng"), false),
        ];
        let outputs = subtitle_outputs(&tracks, Path::new("/out/m.mp4"));
        let paths: Vec<_> = outputs.iter().map(|o| o.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/out/m.eng2.srt"),
                PathBuf::from("/out/m.eng.srt"),
                PathBuf::from("/out/m.eng3.srt"),
            ]
        );
    }

    #[test]
    fn test_embed_maps_text_tracks_only() {
        let mut pgs = sub(0, Some("eng"), false);
        pgs.codec = "hdmv_pgs_subtitle".to_string();
        let mut ass = sub(2, Some("jpn"), false);
        ass.codec = "ass".to_string();
        let probe = MediaProbe {
            subtitle_tracks: vec![pgs, sub(1, Some("eng"), false), ass],
            ..MediaProbe::default()
        };
        let settings = SettingsLayer {
            subtitle_extract: Some(SubtitleMode::Embed),
            ..SettingsLayer::default()
        }
        .resolve()
        .unwrap();

        let plan = build_stream_plan(&probe, &settings, Path::new("/out/m.mp4"));
        assert_eq!(
            plan.subtitle_args(),
            vec!["-map", "0:s:1", "-map", "0:s:2", "-c:s", "mov_text"]
        );

        let bitmap_only = MediaProbe {
            subtitle_tracks: probe.subtitle_tracks[..1].to_vec(),
            ..MediaProbe::default()
        };
        let plan = build_stream_plan(&bitmap_only, &settings, Path::new("/out/m.mp4"));
        assert_eq!(plan.subtitle_args(), vec!["-sn"]);
    }

    #[test]
    fn test_bitmap_subtitles_are_not_extracted() {
        let mut pgs = sub(0, Some("eng"), false);
        pgs.codec = "hdmv_pgs_subtitle".to_string();
        let outputs = subtitle_outputs(&[pgs, sub(1, Some("eng"), false)], Path::new("m.mp4"));
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].track, 1);
        assert_eq!(outputs[0].suffix, "eng");
    }

    #[test]
    fn test_embed_codec_by_container() {
        assert_eq!(embed_codec_for(Path::new("a.mp4")), "mov_text");
        assert_eq!(embed_codec_for(Path::new("a.MOV")), "mov_text");
        assert_eq!(embed_codec_for(Path::new("a.webm")), "webvtt");
        assert_eq!(embed_codec_for(Path::new("a.mkv")), "srt");
    }

    #[test]
    fn test_reencode_default_bitrate_per_channel() {
        let settings = AudioSettings {
            mode: AudioMode::Reencode,
            ..AudioSettings::default()
        };
        let plan = plan_audio(&[audio(0, 2), audio(1, 6)], &settings);
        let AudioPlan::Reencode { codec, tracks } = plan else {
            panic!("expected reencode plan");
        };
        assert_eq!(codec, "aac");
        assert_eq!(tracks[0].bitrate_kbps, 64);
        assert_eq!(tracks[1].bitrate_kbps, 192);
        assert_eq!(tracks[1].channels, 6);
    }

    #[test]
    fn test_reencode_overrides() {
        let settings = AudioSettings {
            mode: AudioMode::Reencode,
            bitrates_kbps: vec![128],
            channels: vec![2, 1],
            ..AudioSettings::default()
        };
        let plan = plan_audio(&[audio(0, 6), audio(1, 6), audio(2, 6)], &settings);
        let AudioPlan::Reencode { tracks, .. } = plan else {
            panic!("expected reencode plan");
        };
        assert!(tracks.iter().all(|t| t.bitrate_kbps == 128));
        assert_eq!(tracks.iter().map(|t| t.channels).collect::<Vec<_>>(), vec![2, 1, 6]);
    }

    #[test]
    fn test_audio_args() {
        let copy = StreamPlan {
            subtitles: SubtitlePlan::None,
            audio: AudioPlan::Copy { tracks: vec![0, 1] },
        };
        assert_eq!(
            copy.output_args(),
            vec!["-map", "0:a:0", "-c:a:0", "copy", "-map", "0:a:1", "-c:a:1", "copy", "-sn"]
        );

        let none = StreamPlan {
            subtitles: SubtitlePlan::Embed {
                codec: "mov_text",
                tracks: vec![0],
            },
            audio: AudioPlan::None,
        };
        assert_eq!(none.output_args(), vec!["-an", "-map", "0:s:0", "-c:s", "mov_text"]);
    }
}
