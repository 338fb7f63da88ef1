use super::ladder::{Stage, TranscodeRunner};
use super::pipeline::PipelineCandidate;
use super::settings::{ConvertSettings, Trim};
use super::streams::{StreamPlan, SubtitleOutput};
use super::types::ProgressParser;
use crate::engine::probe::MediaProbe;
use crate::error::{ConvertError, EXIT_INTERRUPTED, Result};
use std::collections::VecDeque;
use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Lines of ffmpeg stderr kept for failure reports
const STDERR_TAIL_LINES: usize = 20;

/// A transcoder command as a program plus a structured argument list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl FfmpegInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(&mut self, path: &Path) -> &mut Self {
        self.arg(path.to_string_lossy())
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args.iter().map(OsStr::new));
        cmd
    }

    /// Shell-quoted form for logs and `Running command:` lines
    pub fn display(&self) -> String {
        std::iter::once(self.program.to_string_lossy().to_string())
            .chain(self.args.iter().cloned())
            .map(|word| quote_word(&word))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Quote only words a shell would split or expand
fn quote_word(word: &str) -> String {
    let needs_quoting = word.is_empty()
        || word
            .chars()
            .any(|c| c.is_whitespace() || "'\"\\$`;&|<>()*?!#~".contains(c));
    if !needs_quoting {
        return word.to_string();
    }
    shlex::try_quote(word)
        .map(|q| q.into_owned())
        .unwrap_or_else(|_| format!("\"{}\"", word))
}

/// Everything about one input that stays fixed across ladder attempts
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertJob {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Expected output duration, for progress reporting
    pub duration_s: Option<f64>,
    pub trim: Trim,
    pub stream_plan: StreamPlan,
    pub extra_options: Vec<String>,
}

impl ConvertJob {
    pub fn new(
        probe: &MediaProbe,
        settings: &ConvertSettings,
        output: PathBuf,
        stream_plan: StreamPlan,
    ) -> Self {
        Self {
            input: probe.path.clone(),
            output,
            duration_s: expected_duration(probe.duration_s, &settings.trim),
            trim: settings.trim.clone(),
            stream_plan,
            extra_options: settings.extra_options.clone(),
        }
    }
}

fn expected_duration(source: Option<f64>, trim: &Trim) -> Option<f64> {
    let start = trim.start.unwrap_or(0.0);
    let remaining = source.map(|d| (d - start).max(0.0));
    match (trim.end, trim.duration) {
        (Some(end), _) => Some((end - start).max(0.0)),
        (None, Some(duration)) => Some(remaining.map_or(duration, |r| r.min(duration))),
        (None, None) => remaining,
    }
}

/// Assemble the transcoder command for one candidate at one ladder stage
pub fn build_invocation(
    ffmpeg: &Path,
    candidate: &PipelineCandidate,
    stage: Stage,
    job: &ConvertJob,
) -> FfmpegInvocation {
    let mut inv = FfmpegInvocation::new(ffmpeg);
    inv.args(["-hide_banner", "-y"]);

    inv.args(candidate.hw_init_args.iter().cloned());
    if stage == Stage::FullHardware {
        inv.args(candidate.hw_decode_args.iter().cloned());
    }
    inv.args(candidate.input_args.iter().cloned());
    inv.args(job.trim.input_args());

    inv.arg("-i").path_arg(&job.input);
    inv.args(["-progress", "pipe:1", "-nostats"]);
    inv.args(["-map", "0:v:0"]);

    let filters = match stage {
        Stage::FullHardware => candidate.hw_filters.as_ref(),
        Stage::SoftwareDecodeHardwareEncode | Stage::FullSoftware => candidate.sw_filters.as_ref(),
    };
    if let Some(filters) = filters {
        inv.arg("-vf").arg(filters.as_str());
    }

    inv.args(candidate.encode_args.iter().cloned());
    inv.args(job.stream_plan.output_args());
    inv.args(job.extra_options.iter().cloned());
    inv.path_arg(&job.output);
    inv
}

/// Demux every planned subtitle track to its sidecar file in one pass
pub fn build_subtitle_extraction(
    ffmpeg: &Path,
    input: &Path,
    trim: &Trim,
    outputs: &[SubtitleOutput],
) -> Option<FfmpegInvocation> {
    if outputs.is_empty() {
        return None;
    }

    let mut inv = FfmpegInvocation::new(ffmpeg);
    inv.args(["-hide_banner", "-y"]);
    inv.args(trim.input_args());
    inv.arg("-i").path_arg(input);
    for output in outputs {
        inv.arg("-map").arg(format!("0:s:{}", output.track));
        inv.args(["-c:s", "srt"]);
        inv.path_arg(&output.path);
    }
    Some(inv)
}

/// Exit code for a finished transcoder; death by signal reads as interruption
pub fn exit_code_of(status: &ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => EXIT_INTERRUPTED,
    }
}

/// Runs ffmpeg for real, printing a progress line from `-progress` output
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    pub silent: bool,
}

impl FfmpegRunner {
    pub fn new(silent: bool) -> Self {
        Self { silent }
    }

    fn print_progress(&self, parser: &ProgressParser, duration_s: Option<f64>) {
        if self.silent {
            return;
        }
        let pct = parser.progress_pct(duration_s);
        if pct > 0.0 {
            print!("\rProgress: {:.1}%", pct);
        } else {
            print!("\rTime: {:.1}s", parser.out_time_s());
        }
        if let Some(fps) = parser.fps {
            print!(" | FPS: {:.1}", fps);
        }
        if let Some(speed) = parser.speed {
            print!(" | Speed: {:.2}x", speed);
        }
        std::io::stdout().flush().ok();
    }
}

impl TranscodeRunner for FfmpegRunner {
    fn run(&mut self, invocation: &FfmpegInvocation, duration_s: Option<f64>) -> Result<i32> {
        let mut cmd = invocation.to_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| ConvertError::from_spawn("ffmpeg", e))?;

        // Drain stderr on its own thread so the pipe never fills
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ConvertError::tool_failed("ffmpeg", "stderr not captured"))?;
        let stderr_thread = std::thread::spawn(move || {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            for line in BufReader::new(stderr).lines().map_while(std::result::Result::ok) {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail
        });

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ConvertError::tool_failed("ffmpeg", "stdout not captured"))?;
        let mut parser = ProgressParser::new();
        for line in BufReader::new(stdout).lines().map_while(std::result::Result::ok) {
            parser.parse_line(&line);
            if line.starts_with("progress=") {
                self.print_progress(&parser, duration_s);
            }
        }

        let status = child.wait()?;
        if !self.silent {
            println!();
        }

        let tail = stderr_thread.join().unwrap_or_default();
        let code = exit_code_of(&status);
        if code != 0 && code != EXIT_INTERRUPTED {
            for line in &tail {
                tracing::warn!(target: "ffmpeg", "{}", line);
            }
        }
        tracing::debug!(code, frames = ?parser.frame, complete = parser.is_complete, "ffmpeg exited");
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::core::streams::{AudioPlan, SubtitlePlan};

    #[test]
    fn test_display_quotes_spaces() {
        let mut inv = FfmpegInvocation::new("ffmpeg");
        inv.args(["-i", "my movie.mkv", "-vf", "scale=1280:720"]);
        assert_eq!(inv.display(), "ffmpeg -i 'my movie.mkv' -vf scale=1280:720");
    }

    #[test]
    fn test_subtitle_extraction_maps_each_track() {
        let outputs = vec![
            SubtitleOutput {
                track: 0,
                suffix: "eng".to_string(),
                forced: false,
                path: PathBuf::from("/out/m.eng.srt"),
            },
            SubtitleOutput {
                track: 2,
                suffix: "eng2".to_string(),
                forced: true,
                path: PathBuf::from("/out/m.eng2.forced.srt"),
            },
        ];
        let inv = build_subtitle_extraction(Path::new("ffmpeg"), Path::new("in.mkv"), &Trim::default(), &outputs).unwrap();
        assert_eq!(
            inv.args,
            vec![
                "-hide_banner", "-y", "-i", "in.mkv",
                "-map", "0:s:0", "-c:s", "srt", "/out/m.eng.srt",
                "-map", "0:s:2", "-c:s", "srt", "/out/m.eng2.forced.srt",
            ]
        );
        assert!(build_subtitle_extraction(Path::new("ffmpeg"), Path::new("in.mkv"), &Trim::default(), &[]).is_none());
    }

    #[test]
    fn test_expected_duration_with_trim() {
        let trim = Trim {
            start: Some(10.0),
            end: None,
            duration: None,
        };
        assert_eq!(expected_duration(Some(100.0), &trim), Some(90.0));

        let trim = Trim {
            start: Some(10.0),
            end: Some(40.0),
            duration: None,
        };
        assert_eq!(expected_duration(Some(100.0), &trim), Some(30.0));

        let trim = Trim {
            start: None,
            end: None,
            duration: Some(500.0),
        };
        assert_eq!(expected_duration(Some(100.0), &trim), Some(100.0));
        assert_eq!(expected_duration(None, &Trim::default()), None);
    }

    #[test]
    fn test_plain_job_layout() {
        let job = ConvertJob {
            input: PathBuf::from("in.mkv"),
            output: PathBuf::from("out.mp4"),
            duration_s: None,
            trim: Trim::default(),
            stream_plan: StreamPlan {
                subtitles: SubtitlePlan::None,
                audio: AudioPlan::None,
            },
            extra_options: vec!["-movflags".to_string(), "+faststart".to_string()],
        };
        let candidate = PipelineCandidate {
            kind: crate::engine::core::CandidateKind::Software,
            family: None,
            encoder: "libx264".to_string(),
            hw_init_args: Vec::new(),
            hw_decode_args: Vec::new(),
            input_args: Vec::new(),
            encode_args: vec!["-c:v".to_string(), "libx264".to_string()],
            hw_filters: None,
            sw_filters: None,
        };
        let inv = build_invocation(Path::new("ffmpeg"), &candidate, Stage::FullSoftware, &job);
        assert_eq!(
            inv.display(),
            "ffmpeg -hide_banner -y -i in.mkv -progress pipe:1 -nostats -map 0:v:0 -c:v libx264 -an -sn -movflags +faststart out.mp4"
        );
    }
}
