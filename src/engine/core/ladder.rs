//! Degradation ladder: full hardware, then software decode with the hardware
//! encoder, then full software.

use super::ffmpeg_cmd::{ConvertJob, FfmpegInvocation, build_invocation};
use super::pipeline::{CandidateKind, CandidatePlan, PipelineCandidate, PlanMode};
use crate::error::{EXIT_INTERRUPTED, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};

/// Executes one transcoder invocation and reports its exit code
pub trait TranscodeRunner {
    fn run(&mut self, invocation: &FfmpegInvocation, duration_s: Option<f64>) -> Result<i32>;
}

/// Where decoding and encoding happen for one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    FullHardware,
    SoftwareDecodeHardwareEncode,
    FullSoftware,
}

impl Stage {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::FullHardware => "Decode GPU, encode GPU",
            Self::SoftwareDecodeHardwareEncode => "Decode Software, Encode GPU",
            Self::FullSoftware => "Decode Software, Encode Software",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LadderState {
    NotStarted,
    AttemptingHardware,
    AttemptingSoftwareDecodeHardwareEncode,
    AttemptingFullSoftware,
    Succeeded,
    Failed,
}

impl LadderState {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::AttemptingHardware => Some(Stage::FullHardware),
            Self::AttemptingSoftwareDecodeHardwareEncode => Some(Stage::SoftwareDecodeHardwareEncode),
            Self::AttemptingFullSoftware => Some(Stage::FullSoftware),
            Self::NotStarted | Self::Succeeded | Self::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Success,
    RecoverableFailure,
    UserInterrupt,
}

impl Outcome {
    pub fn classify(exit_code: i32) -> Self {
        match exit_code {
            0 => Self::Success,
            EXIT_INTERRUPTED => Self::UserInterrupt,
            _ => Self::RecoverableFailure,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub stage: Stage,
    pub candidate: CandidateKind,
    pub encoder: String,
    pub exit_code: i32,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub final_state: LadderState,
    pub outcome: Outcome,
    pub attempts: Vec<AttemptRecord>,
}

impl ExecutionResult {
    pub fn succeeded(&self) -> bool {
        self.final_state == LadderState::Succeeded
    }

    pub fn was_interrupted(&self) -> bool {
        self.outcome == Outcome::UserInterrupt
    }
}

/// First attempting state for a plan
pub fn initial_state(plan: &CandidatePlan) -> LadderState {
    let Some(first) = plan.first() else {
        return LadderState::Failed;
    };
    match (plan.mode, first.is_hardware()) {
        (PlanMode::Exclusive, true) if first.decodes_on_gpu() => LadderState::AttemptingHardware,
        (PlanMode::Exclusive, true) => LadderState::AttemptingSoftwareDecodeHardwareEncode,
        (PlanMode::Ladder { partial: true }, true) => LadderState::AttemptingSoftwareDecodeHardwareEncode,
        (PlanMode::Ladder { partial: false }, true) => LadderState::AttemptingHardware,
        (_, false) => LadderState::AttemptingFullSoftware,
    }
}

/// Next state after an attempt ends with `outcome`.
///
/// Exclusive plans retry a hardware candidate once with software decoding
/// but never move on to the software fallback.
pub fn transition(state: LadderState, outcome: Outcome, plan: &CandidatePlan) -> LadderState {
    match outcome {
        Outcome::Success => LadderState::Succeeded,
        Outcome::UserInterrupt => LadderState::Failed,
        Outcome::RecoverableFailure => match state {
            LadderState::AttemptingHardware => LadderState::AttemptingSoftwareDecodeHardwareEncode,
            LadderState::AttemptingSoftwareDecodeHardwareEncode
                if !plan.is_exclusive() && plan.fallback().is_some() =>
            {
                LadderState::AttemptingFullSoftware
            }
            _ => LadderState::Failed,
        },
    }
}

/// Candidate that runs in a given state
fn candidate_for(state: LadderState, plan: &CandidatePlan) -> Option<&PipelineCandidate> {
    if plan.is_exclusive() {
        return plan.first();
    }
    match state.stage()? {
        Stage::FullHardware | Stage::SoftwareDecodeHardwareEncode => plan.hardware(),
        Stage::FullSoftware => plan.fallback(),
    }
}

fn encode_mode(stage: Stage, candidate: &PipelineCandidate) -> &'static str {
    if candidate.kind == CandidateKind::Copy {
        "Copy video stream"
    } else {
        stage.describe()
    }
}

/// Walk the ladder for one input until success, interruption or exhaustion
pub fn execute(
    plan: &CandidatePlan,
    job: &ConvertJob,
    ffmpeg: &Path,
    runner: &mut dyn TranscodeRunner,
) -> Result<ExecutionResult> {
    let mut state = initial_state(plan);
    let mut attempts = Vec::new();
    let mut exit_code = 1;
    let mut outcome = Outcome::RecoverableFailure;

    while !state.is_terminal() {
        let (Some(stage), Some(candidate)) = (state.stage(), candidate_for(state, plan)) else {
            break;
        };

        let invocation = build_invocation(ffmpeg, candidate, stage, job);
        println!("Encode mode: {}", encode_mode(stage, candidate));
        println!("Running command: {}", invocation.display());
        tracing::info!(?stage, encoder = %candidate.encoder, "starting attempt");

        let started_at = Local::now();
        let clock = Instant::now();
        exit_code = runner.run(&invocation, job.duration_s)?;
        outcome = Outcome::classify(exit_code);

        attempts.push(AttemptRecord {
            stage,
            candidate: candidate.kind,
            encoder: candidate.encoder.clone(),
            exit_code,
            started_at,
            elapsed: clock.elapsed(),
        });

        let next = transition(state, outcome, plan);
        match outcome {
            Outcome::Success => tracing::info!(?stage, "attempt succeeded"),
            Outcome::UserInterrupt => tracing::warn!("interrupted by user, not retrying"),
            Outcome::RecoverableFailure => match next.stage() {
                Some(next_stage) => tracing::warn!(
                    exit_code,
                    from = ?stage,
                    to = ?next_stage,
                    "attempt failed, falling back"
                ),
                None => tracing::error!(exit_code, ?stage, "attempt failed, no fallback left"),
            },
        }
        state = next;
    }

    if !state.is_terminal() {
        state = LadderState::Failed;
    }

    Ok(ExecutionResult {
        exit_code,
        final_state: state,
        outcome,
        attempts,
    })
}

/// Every command the ladder would run if each attempt failed, in order.
/// Used for dry runs.
pub fn planned_invocations(
    plan: &CandidatePlan,
    job: &ConvertJob,
    ffmpeg: &Path,
) -> Vec<(Stage, FfmpegInvocation)> {
    let mut planned = Vec::new();
    let mut state = initial_state(plan);
    while let (Some(stage), Some(candidate)) = (state.stage(), candidate_for(state, plan)) {
        planned.push((stage, build_invocation(ffmpeg, candidate, stage, job)));
        state = transition(state, Outcome::RecoverableFailure, plan);
    }
    planned
}
