use ffconvert::config::Config;
use ffconvert::engine::{AudioMode, GpuChoice, QualityTier, SettingsLayer, SubtitleMode};
use std::fs;
use tempfile::TempDir;

const CONFIG: &str = r#"
[defaults]
gpu = "intel"
video_quality = "low"
subtitle_extract = "none"
audio_handling = "reencode"
audio_bitrate = "160"
output_format = "mkv"
preset = "slow"

[tools]
ffprobe = "/opt/ffmpeg/bin/ffprobe"
"#;

#[test]
fn config_file_fills_unset_options() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, CONFIG).unwrap();

    let config = Config::load_from(&path).unwrap();

    // Command line only sets the quality
    let cli = SettingsLayer {
        video_quality: Some(QualityTier::VeryHigh),
        preset: Some(String::new()),
        ..SettingsLayer::default()
    };
    let settings = cli.or(config.defaults).resolve().unwrap();

    assert_eq!(settings.gpu, GpuChoice::Intel);
    assert_eq!(settings.quality, QualityTier::VeryHigh);
    assert_eq!(settings.subtitle_mode, SubtitleMode::None);
    assert_eq!(settings.audio.mode, AudioMode::Reencode);
    assert_eq!(settings.audio.bitrates_kbps, vec![160]);
    assert_eq!(settings.output.format.as_deref(), Some("mkv"));
    // An empty value on the command line counts as unset
    assert_eq!(settings.preset.as_deref(), Some("slow"));

    assert_eq!(
        config.tools.ffprobe.as_deref(),
        Some(std::path::Path::new("/opt/ffmpeg/bin/ffprobe"))
    );
    assert_eq!(config.tools.ffmpeg, None);
}

#[test]
fn invalid_values_fail_to_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[defaults]\ngpu = \"matrox\"\n").unwrap();

    let err = Config::load_from(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse config file"));
}

#[test]
fn invalid_trim_is_rejected_at_resolve() {
    let layer = SettingsLayer {
        trim_start: Some("soon".to_string()),
        ..SettingsLayer::default()
    };
    let err = layer.resolve().unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn saved_config_reloads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ffconvert").join("config.toml");

    let mut config = Config::default();
    config.defaults.gpu = Some(GpuChoice::Vulkan);
    config.defaults.force_copy_video = Some(true);
    config.log_file = Some(dir.path().join("ffconvert.log"));
    config.save_to(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("[defaults]"));
    assert!(text.contains("gpu = \"vulkan\""));

    assert_eq!(Config::load_from(&path).unwrap(), config);
}
