#![allow(dead_code)] // Each test binary uses a different subset

use ffconvert::engine::hardware::{DEFAULT_RENDER_DEVICE, GpuVendor, HostCapability};
use ffconvert::engine::probe::{AudioTrack, MediaProbe, SubtitleTrack};
use ffconvert::engine::{FfmpegInvocation, TranscodeRunner};
use ffconvert::error::Result;
use std::path::PathBuf;

/// Runner that replays canned exit codes and records every command.
/// Once the script runs out every further attempt succeeds.
pub struct ScriptedRunner {
    codes: Vec<i32>,
    pub seen: Vec<FfmpegInvocation>,
}

impl ScriptedRunner {
    pub fn new(codes: Vec<i32>) -> Self {
        Self {
            codes,
            seen: Vec::new(),
        }
    }
}

impl TranscodeRunner for ScriptedRunner {
    fn run(&mut self, invocation: &FfmpegInvocation, _duration_s: Option<f64>) -> Result<i32> {
        self.seen.push(invocation.clone());
        Ok(if self.codes.is_empty() {
            0
        } else {
            self.codes.remove(0)
        })
    }
}

pub fn host(vendor: GpuVendor) -> HostCapability {
    HostCapability::new(vendor, DEFAULT_RENDER_DEVICE)
}

pub fn audio(index: usize, language: &str, channels: u32) -> AudioTrack {
    AudioTrack {
        index,
        language: Some(language.to_string()),
        channels,
    }
}

pub fn subrip(index: usize, language: Option<&str>, forced: bool) -> SubtitleTrack {
    SubtitleTrack {
        index,
        codec: "subrip".to_string(),
        language: language.map(String::from),
        title: None,
        forced,
    }
}

pub fn probe(path: &str, codec: &str, pix_fmt: &str) -> MediaProbe {
    MediaProbe {
        path: PathBuf::from(path),
        pix_fmt: pix_fmt.to_string(),
        codec: codec.to_string(),
        duration_s: Some(120.0),
        ..MediaProbe::default()
    }
}

/// Shell-style rendering of every recorded command, one per line
pub fn commands(seen: &[FfmpegInvocation]) -> String {
    seen.iter()
        .map(FfmpegInvocation::display)
        .collect::<Vec<_>>()
        .join("\n")
}
