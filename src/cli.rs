use clap::Parser;
use ffconvert::engine::{
    AudioMode, GpuChoice, QualityTier, SettingsLayer, SubtitleMode, VideoCodec, parse_flag,
};
use std::path::PathBuf;

/// Every conversion option doubles as an environment variable of the same
/// name (`gpu=nvidia ffconvert movie.mkv`), as the desktop front end sets them.
#[derive(Parser, Debug)]
#[command(name = "ffconvert")]
#[command(version, about = "Video converter with automatic GPU selection and software fallback", long_about = None)]
pub struct Cli {
    /// Input files or directories (directories are scanned recursively)
    #[arg(value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// GPU to use: auto, nvidia, amd, intel, vulkan or software
    #[arg(long, env = "gpu")]
    pub gpu: Option<GpuChoice>,

    /// Output file name (relative names land in the output folder)
    #[arg(long, alias = "output_file", env = "output_file")]
    pub output_file: Option<PathBuf>,

    /// Folder for converted files (defaults to the input's folder)
    #[arg(long, alias = "output_folder", env = "output_folder")]
    pub output_folder: Option<PathBuf>,

    /// Output container: mp4, mkv, webm, mov, ...
    #[arg(long, alias = "output_format", env = "output_format")]
    pub output_format: Option<String>,

    /// veryhigh, high, medium, low, verylow or superlow
    #[arg(long, alias = "video_quality", env = "video_quality")]
    pub video_quality: Option<QualityTier>,

    /// Target codec: h264, h265, av1 or vp9
    #[arg(long, alias = "video_encoder", env = "video_encoder")]
    pub video_encoder: Option<VideoCodec>,

    /// Encoder speed preset (ultrafast .. veryslow)
    #[arg(long, env = "preset")]
    pub preset: Option<String>,

    /// Extra ffmpeg video filter chain
    #[arg(long, alias = "video_filter", env = "video_filter")]
    pub video_filter: Option<String>,

    /// Scale output to WIDTHxHEIGHT
    #[arg(long, alias = "video_resolution", env = "video_resolution")]
    pub video_resolution: Option<String>,

    /// Raw ffmpeg output options, split with shell rules
    #[arg(long, env = "options", allow_hyphen_values = true)]
    pub options: Option<String>,

    /// Subtitles: extract (to .srt files), embedded or none
    #[arg(long, alias = "subtitle_extract", env = "subtitle_extract")]
    pub subtitle_extract: Option<SubtitleMode>,

    /// Audio: copy, reencode or none
    #[arg(long, alias = "audio_handling", env = "audio_handling")]
    pub audio_handling: Option<AudioMode>,

    /// Codec for re-encoded audio
    #[arg(long, alias = "audio_codec", env = "audio_codec")]
    pub audio_codec: Option<String>,

    /// Re-encode bitrate in kbps, one value or one per track ("128,192")
    #[arg(long, alias = "audio_bitrate", env = "audio_bitrate")]
    pub audio_bitrate: Option<String>,

    /// Re-encode channel count, one value or one per track
    #[arg(long, alias = "audio_channels", env = "audio_channels")]
    pub audio_channels: Option<String>,

    /// Start position (seconds or HH:MM:SS)
    #[arg(long, alias = "trim_start", env = "trim_start")]
    pub trim_start: Option<String>,

    /// End position (seconds or HH:MM:SS); wins over --trim-duration
    #[arg(long, alias = "trim_end", env = "trim_end")]
    pub trim_end: Option<String>,

    /// Length to keep (seconds or HH:MM:SS)
    #[arg(long, alias = "trim_duration", env = "trim_duration")]
    pub trim_duration: Option<String>,

    /// Decode in software, encode on the GPU
    #[arg(long, alias = "gpu_partial", env = "gpu_partial", num_args = 0..=1, require_equals = true, default_missing_value = "true", value_parser = parse_flag)]
    pub gpu_partial: Option<bool>,

    /// Skip the GPU entirely
    #[arg(long, alias = "force_software", env = "force_software", num_args = 0..=1, require_equals = true, default_missing_value = "true", value_parser = parse_flag)]
    pub force_software: Option<bool>,

    /// Copy the video stream without re-encoding
    #[arg(long, alias = "force_copy_video", env = "force_copy_video", num_args = 0..=1, require_equals = true, default_missing_value = "true", value_parser = parse_flag)]
    pub force_copy_video: Option<bool>,

    /// Extract subtitles and stop
    #[arg(long, alias = "only_extract_subtitles", env = "only_extract_subtitles", num_args = 0..=1, require_equals = true, default_missing_value = "true", value_parser = parse_flag)]
    pub only_extract_subtitles: Option<bool>,

    /// Use this ffmpeg encoder and nothing else
    #[arg(long, alias = "force_encoder", env = "force_encoder")]
    pub force_encoder: Option<String>,

    /// Use this ffmpeg decoder and nothing else
    #[arg(long, alias = "force_decoder", env = "force_decoder")]
    pub force_decoder: Option<String>,

    /// Print the ffmpeg executable in use and exit
    #[arg(long, alias = "show_executable", env = "show_executable", num_args = 0..=1, require_equals = true, default_missing_value = "true", value_parser = parse_flag)]
    pub show_executable: Option<bool>,

    /// List hardware encoders that pass a live test and exit
    #[arg(long, alias = "detect_encoders", env = "detect_encoders", num_args = 0..=1, require_equals = true, default_missing_value = "true", value_parser = parse_flag)]
    pub detect_encoders: Option<bool>,

    /// Print the ffmpeg commands each input would run, without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Show config status and location, or create default config if missing
    #[arg(long)]
    pub init_config: bool,

    /// Debug logging (RUST_LOG still wins)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Conversion options given on the command line or in the environment
    pub fn to_layer(&self) -> SettingsLayer {
        SettingsLayer {
            gpu: self.gpu,
            video_quality: self.video_quality,
            video_encoder: self.video_encoder,
            preset: self.preset.clone(),
            video_filter: self.video_filter.clone(),
            video_resolution: self.video_resolution.clone(),
            options: self.options.clone(),
            subtitle_extract: self.subtitle_extract,
            audio_handling: self.audio_handling,
            audio_codec: self.audio_codec.clone(),
            audio_bitrate: self.audio_bitrate.clone(),
            audio_channels: self.audio_channels.clone(),
            output_file: self.output_file.clone(),
            output_folder: self.output_folder.clone(),
            output_format: self.output_format.clone(),
            trim_start: self.trim_start.clone(),
            trim_end: self.trim_end.clone(),
            trim_duration: self.trim_duration.clone(),
            gpu_partial: self.gpu_partial,
            force_software: self.force_software,
            force_copy_video: self.force_copy_video,
            only_extract_subtitles: self.only_extract_subtitles,
            force_encoder: self.force_encoder.clone(),
            force_decoder: self.force_decoder.clone(),
        }
    }

    pub fn show_executable(&self) -> bool {
        self.show_executable.unwrap_or(false)
    }

    pub fn detect_encoders(&self) -> bool {
        self.detect_encoders.unwrap_or(false)
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
