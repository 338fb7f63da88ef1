mod ffmpeg_cmd;
mod ffmpeg_info;
mod ladder;
mod pipeline;
mod profile;
mod scan;
mod settings;
mod streams;
mod types;

pub use ffmpeg_cmd::{
    ConvertJob, FfmpegInvocation, FfmpegRunner, build_invocation, build_subtitle_extraction,
    exit_code_of,
};
pub use ffmpeg_info::{ToolPaths, Tools, list_encoders, locate_tool, tool_version};
pub use ladder::{
    AttemptRecord, ExecutionResult, LadderState, Outcome, Stage, TranscodeRunner, execute,
    initial_state, planned_invocations, transition,
};
pub use pipeline::{
    CandidateKind, CandidatePlan, PipelineBuilder, PipelineCandidate, PlanMode,
    adapt_filter_chain, build_candidates, downconvert_filter, hardware_encoder, hw_decode_args,
    hw_init_args, software_encoder, split_filter_chain, upload_filter,
};
pub use profile::{
    DEFAULT_HW_PRESET, DEFAULT_OUTPUT_FORMAT, DEFAULT_SW_PRESET, EncodeProfile, OUTPUT_FORMATS,
    OutputTarget, nvenc_preset_level, qsv_preset_name, resolve_output_path, svt_av1_preset,
    vpx_cpu_used,
};
pub use scan::{expand_inputs, is_video_file, scan};
pub use settings::{
    AudioSettings, ConvertSettings, DEFAULT_AUDIO_CODEC, SettingsLayer, Trim, format_seconds,
    parse_bitrate_list, parse_channel_list, parse_flag, parse_resolution, parse_time,
    split_options,
};
pub use streams::{
    AudioOutput, AudioPlan, KBPS_PER_CHANNEL, StreamPlan, SubtitleOutput, SubtitlePlan,
    UNDETERMINED_LANGUAGE, build_stream_plan, embed_codec_for, normalize_language, plan_audio,
    subtitle_outputs,
};
pub use types::{
    AudioMode, GpuChoice, HwFamily, ProgressParser, QualityTier, SubtitleMode, VideoCodec,
};
