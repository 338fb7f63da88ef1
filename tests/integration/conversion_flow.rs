use crate::common::{ScriptedRunner, host};
use ffconvert::engine::hardware::GpuVendor;
use ffconvert::engine::probe::parse_ffprobe_json;
use ffconvert::engine::{
    CandidateKind, ConvertJob, ConvertSettings, LadderState, OutputTarget, SettingsLayer, Stage,
    build_candidates, build_stream_plan, build_subtitle_extraction, execute, resolve_output_path,
};
use std::path::{Path, PathBuf};

const SHOW_PROBE: &str = r#"{
    "streams": [
        {"index": 0, "codec_type": "video", "codec_name": "hevc", "profile": "Main 10", "pix_fmt": "yuv420p10le"},
        {"index": 1, "codec_type": "audio", "codec_name": "ac3", "channels": 2, "tags": {"language": "eng"}},
        {"index": 2, "codec_type": "audio", "codec_name": "eac3", "channels": 6, "tags": {"language": "jpn"}},
        {"index": 3, "codec_type": "subtitle", "codec_name": "subrip", "tags": {"language": "eng"}},
        {"index": 4, "codec_type": "subtitle", "codec_name": "subrip", "tags": {"language": "eng", "title": "SDH"}},
        {"index": 5, "codec_type": "subtitle", "codec_name": "subrip"}
    ],
    "format": {"duration": "1420.5"}
}"#;

fn settings(layer: SettingsLayer) -> ConvertSettings {
    layer.resolve().unwrap()
}

/// Probe, plan and run one input the way the binary does
fn convert(
    layer: SettingsLayer,
    vendor: GpuVendor,
    codes: Vec<i32>,
) -> (ffconvert::engine::ExecutionResult, ScriptedRunner, ConvertJob) {
    let settings = settings(layer);
    let probe = parse_ffprobe_json(Path::new("/media/show.mkv"), SHOW_PROBE).unwrap();
    let output = resolve_output_path(&probe.path, &settings.output);
    let plan = build_candidates(&settings, &probe, &host(vendor));
    let stream_plan = build_stream_plan(&probe, &settings, &output);
    let job = ConvertJob::new(&probe, &settings, output, stream_plan);

    let mut runner = ScriptedRunner::new(codes);
    let result = execute(&plan, &job, Path::new("ffmpeg"), &mut runner).unwrap();
    (result, runner, job)
}

#[test]
fn subtitles_extract_to_unique_sidecars() {
    let settings = settings(SettingsLayer::default());
    let probe = parse_ffprobe_json(Path::new("/media/show.mkv"), SHOW_PROBE).unwrap();
    let output = resolve_output_path(&probe.path, &settings.output);
    assert_eq!(output, PathBuf::from("/media/show.mp4"));

    let plan = build_stream_plan(&probe, &settings, &output);
    let paths: Vec<_> = plan.extractions().iter().map(|s| s.path.clone()).collect();
    assert_eq!(
        paths,
        vec![
            PathBuf::from("/media/show.eng.srt"),
            PathBuf::from("/media/show.eng2.srt"),
            PathBuf::from("/media/show.und.srt"),
        ]
    );

    let extract =
        build_subtitle_extraction(Path::new("ffmpeg"), &probe.path, &settings.trim, plan.extractions())
            .unwrap();
    assert_eq!(
        extract.display(),
        "ffmpeg -hide_banner -y -i /media/show.mkv \
         -map 0:s:0 -c:s srt /media/show.eng.srt \
         -map 0:s:1 -c:s srt /media/show.eng2.srt \
         -map 0:s:2 -c:s srt /media/show.und.srt"
    );
}

#[test]
fn hardware_success_needs_one_attempt() {
    let (result, runner, job) = convert(SettingsLayer::default(), GpuVendor::Amd, vec![0]);
    assert!(result.succeeded());
    assert_eq!(runner.seen.len(), 1);
    assert_eq!(result.attempts[0].stage, Stage::FullHardware);
    assert_eq!(result.attempts[0].encoder, "h264_vaapi");
    assert_eq!(job.duration_s, Some(1420.5));

    let args = &runner.seen[0].args;
    // 10-bit HEVC into H.264 converts on the GPU
    assert!(args.windows(2).any(|w| w == ["-vf", "scale_vaapi=format=nv12"]));
    assert!(args.windows(2).any(|w| w == ["-c:a:1", "copy"]));
    assert!(args.contains(&"-sn".to_string()));
}

#[test]
fn failing_hardware_degrades_through_every_tier() {
    let (result, runner, _) = convert(SettingsLayer::default(), GpuVendor::Nvidia, vec![1, 1, 0]);
    assert!(result.succeeded());
    assert_eq!(runner.seen.len(), 3);

    let stages: Vec<_> = result.attempts.iter().map(|a| a.stage).collect();
    assert_eq!(
        stages,
        vec![
            Stage::FullHardware,
            Stage::SoftwareDecodeHardwareEncode,
            Stage::FullSoftware
        ]
    );
    assert_eq!(result.attempts[1].encoder, "h264_nvenc");
    assert_eq!(result.attempts[2].candidate, CandidateKind::Software);
    assert!(runner.seen[0].args.contains(&"cuda".to_string()));
    assert!(!runner.seen[1].args.contains(&"-hwaccel".to_string()));
}

#[test]
fn interruption_propagates_without_fallback() {
    let (result, runner, _) = convert(SettingsLayer::default(), GpuVendor::Intel, vec![255]);
    assert_eq!(runner.seen.len(), 1);
    assert_eq!(result.exit_code, 255);
    assert_eq!(result.final_state, LadderState::Failed);
    assert!(result.was_interrupted());
}

#[test]
fn interruption_during_hybrid_stage_stops_there() {
    let (result, runner, _) = convert(SettingsLayer::default(), GpuVendor::Nvidia, vec![1, 255]);
    assert_eq!(runner.seen.len(), 2);
    assert_eq!(result.exit_code, 255);
}

#[test]
fn software_only_runs_once() {
    let layer = SettingsLayer {
        force_software: Some(true),
        ..SettingsLayer::default()
    };
    let (result, runner, _) = convert(layer, GpuVendor::Nvidia, vec![69]);
    assert_eq!(runner.seen.len(), 1);
    assert_eq!(result.exit_code, 69);
    assert_eq!(result.attempts[0].encoder, "libx264");
}

#[test]
fn reencode_bitrate_follows_channel_count() {
    let layer = SettingsLayer {
        audio_handling: Some("reencode".parse().unwrap()),
        ..SettingsLayer::default()
    };
    let (_, runner, _) = convert(layer, GpuVendor::None, vec![0]);
    let args = &runner.seen[0].args;
    assert!(args.windows(2).any(|w| w == ["-b:a:0", "64k"]));
    assert!(args.windows(2).any(|w| w == ["-b:a:1", "192k"]));
    assert!(args.windows(2).any(|w| w == ["-metadata:s:a:1", "language=jpn"]));
}

#[test]
fn trim_applies_before_input() {
    let layer = SettingsLayer {
        trim_start: Some("00:01:00".to_string()),
        trim_end: Some("90".to_string()),
        trim_duration: Some("10".to_string()),
        ..SettingsLayer::default()
    };
    let (_, runner, job) = convert(layer, GpuVendor::None, vec![0]);
    let args = &runner.seen[0].args;
    let input = args.iter().position(|a| a == "-i").unwrap();
    assert_eq!(&args[input - 4..input], ["-ss", "60", "-to", "90"]);
    assert!(!args.contains(&"-t".to_string()));
    assert_eq!(job.duration_s, Some(30.0));
}

#[test]
fn output_extension_resolution() {
    let target = |file: Option<&str>, format: Option<&str>| OutputTarget {
        file: file.map(PathBuf::from),
        folder: Some(PathBuf::from("/out")),
        format: format.map(String::from),
    };
    let input = Path::new("/media/show.mkv");

    assert_eq!(
        resolve_output_path(input, &target(Some("movie"), None)),
        PathBuf::from("/out/movie.mp4")
    );
    assert_eq!(
        resolve_output_path(input, &target(Some("movie.avi"), Some("mkv"))),
        PathBuf::from("/out/movie.mkv")
    );
    assert_eq!(
        resolve_output_path(input, &target(None, Some("webm"))),
        PathBuf::from("/out/show.webm")
    );
    assert_eq!(
        resolve_output_path(input, &target(None, Some("xyz"))),
        PathBuf::from("/out/show.mp4")
    );
}
