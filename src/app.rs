use crate::cli::Cli;
use ffconvert::engine::hardware::{self, HostCapability};
use ffconvert::engine::{self, ConvertJob, ConvertSettings, FfmpegRunner, Tools, TranscodeRunner, probe};
use ffconvert::error::{ConvertError, EXIT_INTERRUPTED, EXIT_INVALID_OPTION, EXIT_SETUP_FAILURE};
use ffconvert::{config, logging};
use std::path::Path;

/// Run the command line and return the process exit code
pub fn run(cli: Cli) -> i32 {
    if cli.init_config {
        return handle_init_config();
    }

    let config = match config::Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return EXIT_SETUP_FAILURE;
        }
    };

    if let Err(e) = logging::init_logging(cli.verbose, config.log_file.as_deref()) {
        eprintln!("Warning: {:#}", e);
    }

    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("run", id = %run_id);
    let _guard = span.enter();

    match dispatch(&cli, &config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn dispatch(cli: &Cli, config: &config::Config) -> Result<i32, ConvertError> {
    let settings = cli.to_layer().or(config.defaults.clone()).resolve()?;
    tracing::debug!(?settings, "resolved settings");

    let tools = Tools::locate(&config.tools)?;

    if cli.show_executable() {
        return Ok(handle_show_executable(&tools));
    }
    if cli.detect_encoders() {
        return handle_detect_encoders(&tools, &settings);
    }

    if cli.inputs.is_empty() {
        eprintln!("No input files given. Run 'ffconvert --help' for usage.");
        return Ok(EXIT_INVALID_OPTION);
    }
    let inputs = engine::expand_inputs(&cli.inputs)?;
    if inputs.len() > 1 && settings.output.file.is_some() {
        return Err(ConvertError::invalid(
            "output_file",
            "a single output file cannot take multiple inputs",
        ));
    }

    let host = HostCapability::detect(settings.gpu, settings.wants_hardware(), &tools)?;
    let mut runner = FfmpegRunner::new(false);

    let total = inputs.len();
    let mut last_failure = 0;
    for (i, input) in inputs.iter().enumerate() {
        if total > 1 {
            println!("[{}/{}] {}", i + 1, total, input.display());
        }
        let span = tracing::info_span!("input", path = %input.display());
        let _guard = span.enter();

        let code = match convert_one(input, &settings, &tools, &host, &mut runner, cli.dry_run) {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(error = %e, "conversion aborted");
                eprintln!("Error: {}: {}", input.display(), e);
                e.exit_code()
            }
        };

        match code {
            0 => {}
            EXIT_INTERRUPTED => {
                tracing::warn!(remaining = total - i - 1, "interrupted, skipping remaining inputs");
                return Ok(EXIT_INTERRUPTED);
            }
            code => last_failure = code,
        }
    }

    Ok(last_failure)
}

fn convert_one(
    input: &Path,
    settings: &ConvertSettings,
    tools: &Tools,
    host: &HostCapability,
    runner: &mut dyn TranscodeRunner,
    dry_run: bool,
) -> Result<i32, ConvertError> {
    let probe = probe::probe_media(&tools.ffprobe, input)?;
    let output = engine::resolve_output_path(input, &settings.output);
    let stream_plan = engine::build_stream_plan(&probe, settings, &output);

    let extractions = stream_plan.extractions();
    if let Some(extract) =
        engine::build_subtitle_extraction(&tools.ffmpeg, input, &settings.trim, extractions)
    {
        for sub in extractions {
            println!("Extracting subtitle: {}", sub.path.display());
        }
        if dry_run {
            println!("{}", extract.display());
        } else {
            let code = runner.run(&extract, None)?;
            if code == EXIT_INTERRUPTED {
                return Ok(code);
            }
            if code != 0 {
                tracing::warn!(code, "subtitle extraction failed");
                if settings.only_extract_subtitles {
                    return Ok(code);
                }
            }
        }
    }

    if settings.only_extract_subtitles {
        if extractions.is_empty() {
            println!("No text subtitles to extract in {}", input.display());
        }
        return Ok(0);
    }

    let plan = engine::build_candidates(settings, &probe, host);
    let job = ConvertJob::new(&probe, settings, output, stream_plan);

    if dry_run {
        for (stage, invocation) in engine::planned_invocations(&plan, &job, &tools.ffmpeg) {
            println!("# {}", stage.describe());
            println!("{}", invocation.display());
        }
        return Ok(0);
    }

    let result = engine::execute(&plan, &job, &tools.ffmpeg, runner)?;
    for attempt in &result.attempts {
        tracing::debug!(
            stage = ?attempt.stage,
            encoder = %attempt.encoder,
            exit_code = attempt.exit_code,
            started_at = %attempt.started_at.format("%H:%M:%S"),
            elapsed_s = attempt.elapsed.as_secs_f64(),
            "attempt"
        );
    }

    if result.succeeded() {
        println!("Converted: {}", job.output.display());
    } else if !result.was_interrupted() {
        eprintln!(
            "Conversion failed for {} (exit code {})",
            input.display(),
            result.exit_code
        );
    }
    Ok(result.exit_code)
}

fn handle_show_executable(tools: &Tools) -> i32 {
    println!("{}", tools.ffmpeg.display());
    match engine::tool_version(&tools.ffmpeg) {
        Ok(version) => {
            println!("{}", version);
            0
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_SETUP_FAILURE
        }
    }
}

fn handle_detect_encoders(tools: &Tools, settings: &ConvertSettings) -> Result<i32, ConvertError> {
    let vendor = hardware::resolve_vendor(settings.gpu, tools)?;
    let mut host = HostCapability::new(vendor, hardware::detect_render_device());
    println!("GPU vendor: {}", host.vendor);
    println!("Render device: {}", host.render_device);

    host.supported_hw_encoders = hardware::detect_encoders(tools, vendor)?;
    if host.supported_hw_encoders.is_empty() {
        println!("No working hardware encoders found");
    }
    for encoder in &host.supported_hw_encoders {
        println!("{}", encoder);
    }
    Ok(0)
}

fn handle_init_config() -> i32 {
    let path = match config::Config::config_path() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return EXIT_SETUP_FAILURE;
        }
    };

    if config::Config::exists() {
        match config::Config::load() {
            Ok(cfg) => {
                println!("Config loaded successfully from {}", path.display());
                println!("{:#?}", cfg);
                0
            }
            Err(e) => {
                eprintln!("Config at {} is invalid: {:#}", path.display(), e);
                EXIT_SETUP_FAILURE
            }
        }
    } else {
        println!("Config missing, creating default config...");
        match config::Config::default().save_to(&path) {
            Ok(()) => {
                println!("Default config saved to {}", path.display());
                0
            }
            Err(e) => {
                eprintln!("Failed to save default config: {:#}", e);
                EXIT_SETUP_FAILURE
            }
        }
    }
}
