// Property-based tests for the degradation ladder, quality tiers and
// subtitle naming.
use crate::common::{ScriptedRunner, host, probe, subrip};
use ffconvert::engine::hardware::GpuVendor;
use ffconvert::engine::{
    ConvertJob, EncodeProfile, LadderState, QualityTier, SettingsLayer, Stage, build_candidates,
    build_stream_plan, execute, subtitle_outputs,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::path::Path;

fn vendor() -> impl Strategy<Value = GpuVendor> {
    prop_oneof![
        Just(GpuVendor::None),
        Just(GpuVendor::Nvidia),
        Just(GpuVendor::Amd),
        Just(GpuVendor::Intel),
        Just(GpuVendor::Vulkan),
    ]
}

/// Mostly ordinary failures, with the odd success or interruption
fn exit_code() -> impl Strategy<Value = i32> {
    prop_oneof![
        4 => 1..255i32,
        1 => Just(0),
        1 => Just(255),
    ]
}

fn language() -> impl Strategy<Value = Option<&'static str>> {
    prop_oneof![
        Just(None),
        Just(Some("eng")),
        Just(Some("eng2")),
        Just(Some("ENG")),
        Just(Some("por")),
        Just(Some("und")),
        Just(Some("und2")),
        Just(Some("unknown")),
    ]
}

proptest! {
    #[test]
    fn ladder_attempts_are_bounded_and_ordered(
        vendor in vendor(),
        codes in prop::collection::vec(exit_code(), 0..5),
        force_software in any::<bool>(),
        gpu_partial in any::<bool>(),
        ten_bit in any::<bool>(),
    ) {
        let layer = SettingsLayer {
            force_software: Some(force_software),
            gpu_partial: Some(gpu_partial),
            ..SettingsLayer::default()
        };
        let settings = layer.resolve().unwrap();
        let pix_fmt = if ten_bit { "yuv420p10le" } else { "yuv420p" };
        let probe = probe("/in/a.mkv", "hevc", pix_fmt);
        let plan = build_candidates(&settings, &probe, &host(vendor));
        let stream_plan = build_stream_plan(&probe, &settings, Path::new("/in/a.mp4"));
        let job = ConvertJob::new(&probe, &settings, "/in/a.mp4".into(), stream_plan);

        let mut runner = ScriptedRunner::new(codes);
        let result = execute(&plan, &job, Path::new("ffmpeg"), &mut runner).unwrap();
        let attempts = &result.attempts;

        prop_assert!(!attempts.is_empty() && attempts.len() <= 3);
        prop_assert!(result.final_state == LadderState::Succeeded || result.final_state == LadderState::Failed);
        prop_assert_eq!(result.exit_code, attempts[attempts.len() - 1].exit_code);

        // Only the last attempt may succeed or be interrupted
        for attempt in &attempts[..attempts.len() - 1] {
            prop_assert!(attempt.exit_code != 0 && attempt.exit_code != 255);
        }
        prop_assert_eq!(result.succeeded(), result.exit_code == 0);

        // Stages never go back up the ladder
        for pair in attempts.windows(2) {
            prop_assert!(stage_rank(pair[0].stage) < stage_rank(pair[1].stage));
        }

        // Without a usable GPU (or when asked) only software runs, once
        if force_software || vendor == GpuVendor::None {
            prop_assert_eq!(attempts.len(), 1);
            prop_assert_eq!(attempts[0].stage, Stage::FullSoftware);
        }

        // Full software always comes after exactly one hybrid attempt
        if let Some(pos) = attempts.iter().position(|a| a.stage == Stage::FullSoftware) {
            if pos > 0 {
                prop_assert_eq!(attempts[pos - 1].stage, Stage::SoftwareDecodeHardwareEncode);
            }
        }
        if gpu_partial {
            prop_assert!(attempts.iter().all(|a| a.stage != Stage::FullHardware));
        }
    }

    #[test]
    fn quality_tiers_are_monotonic(a in 0usize..6, b in 0usize..6) {
        let (better, worse) = (QualityTier::ALL[a.min(b)], QualityTier::ALL[a.max(b)]);
        let (p, q) = (EncodeProfile::for_tier(better), EncodeProfile::for_tier(worse));
        prop_assert!(p.cq <= q.cq);
        prop_assert!(p.crf <= q.crf);
        prop_assert!(p.global_quality <= q.global_quality);
        prop_assert!(p.nvenc_cq <= q.nvenc_cq);
    }

    #[test]
    fn subtitle_sidecars_never_collide(
        tracks in prop::collection::vec((language(), any::<bool>()), 0..12),
    ) {
        let tracks: Vec<_> = tracks
            .into_iter()
            .enumerate()
            .map(|(i, (lang, forced))| subrip(i, lang, forced))
            .collect();
        let outputs = subtitle_outputs(&tracks, Path::new("/out/movie.mp4"));
        prop_assert_eq!(outputs.len(), tracks.len());

        let suffixes: HashSet<_> = outputs.iter().map(|o| o.suffix.clone()).collect();
        prop_assert_eq!(suffixes.len(), outputs.len());
        let paths: HashSet<_> = outputs.iter().map(|o| o.path.clone()).collect();
        prop_assert_eq!(paths.len(), outputs.len());

        for output in &outputs {
            prop_assert!(output.suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }
}

fn stage_rank(stage: Stage) -> u8 {
    match stage {
        Stage::FullHardware => 0,
        Stage::SoftwareDecodeHardwareEncode => 1,
        Stage::FullSoftware => 2,
    }
}
