//! Encode pipeline candidates.
//!
//! A candidate bundles everything the command builder needs for one
//! encoder: device init, hardware decode flags, encoder knobs and two filter
//! chains (one for GPU-resident frames, one for software-decoded frames).

use super::profile::{
    EncodeProfile, nvenc_preset_level, qsv_preset_name, svt_av1_preset, vpx_cpu_used,
};
use super::settings::ConvertSettings;
use super::types::{HwFamily, VideoCodec};
use crate::engine::hardware::HostCapability;
use crate::engine::probe::MediaProbe;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CandidateKind {
    Software,
    Nvenc,
    Vaapi,
    Qsv,
    Vulkan,
    Copy,
    Forced,
}

impl CandidateKind {
    fn from_family(family: HwFamily) -> Self {
        match family {
            HwFamily::Nvenc => Self::Nvenc,
            HwFamily::Vaapi => Self::Vaapi,
            HwFamily::Qsv => Self::Qsv,
            HwFamily::Vulkan => Self::Vulkan,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineCandidate {
    pub kind: CandidateKind,
    /// Hardware family of the encoder; `None` for software and copy
    pub family: Option<HwFamily>,
    pub encoder: String,
    /// Device setup shared by every stage that touches the GPU
    pub hw_init_args: Vec<String>,
    /// Hardware decode flags, full hardware stage only
    pub hw_decode_args: Vec<String>,
    /// Always placed before `-i` (forced decoder)
    pub input_args: Vec<String>,
    pub encode_args: Vec<String>,
    pub hw_filters: Option<String>,
    pub sw_filters: Option<String>,
}

impl PipelineCandidate {
    pub fn is_hardware(&self) -> bool {
        self.family.is_some()
    }

    pub fn decodes_on_gpu(&self) -> bool {
        !self.hw_decode_args.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlanMode {
    /// Only one candidate and no software fallback
    Exclusive,
    /// Walk the degradation ladder; `partial` skips hardware decoding
    Ladder { partial: bool },
}

/// Ordered candidates for one input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidatePlan {
    pub candidates: Vec<PipelineCandidate>,
    pub mode: PlanMode,
}

impl CandidatePlan {
    pub fn is_exclusive(&self) -> bool {
        self.mode == PlanMode::Exclusive
    }

    pub fn first(&self) -> Option<&PipelineCandidate> {
        self.candidates.first()
    }

    pub fn hardware(&self) -> Option<&PipelineCandidate> {
        self.candidates.iter().find(|c| c.is_hardware())
    }

    /// Last-resort candidate used by the full software stage
    pub fn fallback(&self) -> Option<&PipelineCandidate> {
        self.candidates.iter().rev().find(|c| !c.is_hardware())
    }
}

pub fn software_encoder(codec: VideoCodec) -> &'static str {
    match codec {
        VideoCodec::H264 => "libx264",
        VideoCodec::H265 => "libx265",
        VideoCodec::Av1 => "libsvtav1",
        VideoCodec::Vp9 => "libvpx-vp9",
    }
}

/// Hardware encoder for a family, if that family can encode the codec
pub fn hardware_encoder(family: HwFamily, codec: VideoCodec) -> Option<String> {
    let supported = match family {
        HwFamily::Nvenc | HwFamily::Vulkan => codec != VideoCodec::Vp9,
        HwFamily::Vaapi | HwFamily::Qsv => true,
    };
    supported.then(|| format!("{}_{}", codec.hw_prefix(), family.suffix()))
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Device initialisation for a family on a render node
pub fn hw_init_args(family: HwFamily, render_device: &str) -> Vec<String> {
    match family {
        HwFamily::Nvenc => Vec::new(),
        HwFamily::Vaapi => vec![
            "-init_hw_device".to_string(),
            format!("vaapi=va:{}", render_device),
            "-filter_hw_device".to_string(),
            "va".to_string(),
        ],
        HwFamily::Qsv => vec![
            "-init_hw_device".to_string(),
            format!("qsv=qs:{}", render_device),
            "-filter_hw_device".to_string(),
            "qs".to_string(),
        ],
        HwFamily::Vulkan => strings(&["-init_hw_device", "vulkan=vk:0", "-filter_hw_device", "vk"]),
    }
}

/// Decode on the GPU and keep frames there
pub fn hw_decode_args(family: HwFamily) -> Vec<String> {
    match family {
        HwFamily::Nvenc => strings(&["-hwaccel", "cuda", "-hwaccel_output_format", "cuda"]),
        HwFamily::Vaapi => strings(&[
            "-hwaccel",
            "vaapi",
            "-hwaccel_output_format",
            "vaapi",
            "-hwaccel_device",
            "va",
        ]),
        HwFamily::Qsv => strings(&[
            "-hwaccel",
            "qsv",
            "-hwaccel_output_format",
            "qsv",
            "-hwaccel_device",
            "qs",
        ]),
        HwFamily::Vulkan => strings(&[
            "-hwaccel",
            "vulkan",
            "-hwaccel_output_format",
            "vulkan",
            "-hwaccel_device",
            "vk",
        ]),
    }
}

/// Filter that moves software frames onto the encoder's device
pub fn upload_filter(family: HwFamily) -> &'static str {
    match family {
        HwFamily::Nvenc => "hwupload_cuda",
        HwFamily::Qsv => "hwupload=extra_hw_frames=64",
        HwFamily::Vaapi | HwFamily::Vulkan => "hwupload",
    }
}

fn hw_scale_filter(family: HwFamily) -> &'static str {
    match family {
        HwFamily::Nvenc => "scale_cuda",
        HwFamily::Vaapi => "scale_vaapi",
        HwFamily::Qsv => "scale_qsv",
        HwFamily::Vulkan => "scale_vulkan",
    }
}

/// On-GPU conversion of 10-bit surfaces to 8-bit
pub fn downconvert_filter(family: HwFamily) -> &'static str {
    match family {
        HwFamily::Nvenc => "scale_cuda=format=yuv420p",
        HwFamily::Vaapi => "scale_vaapi=format=nv12",
        HwFamily::Qsv => "vpp_qsv=format=nv12",
        HwFamily::Vulkan => "scale_vulkan=format=nv12",
    }
}

/// Split a filter chain on top-level commas, honouring quotes and escapes
pub fn split_filter_chain(chain: &str) -> Vec<String> {
    let mut filters = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut escaped = false;

    for ch in chain.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => {
                current.push(ch);
                escaped = true;
            }
            '\'' => {
                current.push(ch);
                in_quote = !in_quote;
            }
            ',' if !in_quote => {
                if !current.trim().is_empty() {
                    filters.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        filters.push(current.trim().to_string());
    }
    filters
}

/// Rewrite a software filter chain so it runs on GPU-resident frames.
///
/// `scale` becomes the family's scaler with an explicit output format; any
/// other run of filters is wrapped in a download/upload pair.
pub fn adapt_filter_chain(
    chain: Option<&str>,
    family: HwFamily,
    source_ten_bit: bool,
    to_eight_bit: bool,
) -> Option<String> {
    let keep_ten_bit = source_ten_bit && !to_eight_bit;
    let hw_format = if keep_ten_bit { "p010" } else { "nv12" };
    let sw_format = |ten_bit: bool| if ten_bit { "p010le" } else { "nv12" };

    let mut adapted: Vec<String> = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    let mut current_ten_bit = source_ten_bit;

    let flush = |pending: &mut Vec<String>, adapted: &mut Vec<String>, current_ten_bit: &mut bool| {
        if pending.is_empty() {
            return;
        }
        adapted.push(format!(
            "hwdownload,format={},{},format={},{}",
            sw_format(*current_ten_bit),
            pending.join(","),
            sw_format(keep_ten_bit),
            upload_filter(family)
        ));
        pending.clear();
        *current_ten_bit = keep_ten_bit;
    };

    for filter in split_filter_chain(chain.unwrap_or_default()) {
        let (name, args) = match filter.split_once('=') {
            Some((name, args)) => (name.trim(), Some(args)),
            None => (filter.trim(), None),
        };
        if name == "scale" {
            flush(&mut pending, &mut adapted, &mut current_ten_bit);
            adapted.push(match args {
                Some(args) if !args.is_empty() => {
                    format!("{}={}:format={}", hw_scale_filter(family), args, hw_format)
                }
                _ => format!("{}=format={}", hw_scale_filter(family), hw_format),
            });
            current_ten_bit = keep_ten_bit;
        } else {
            pending.push(filter);
        }
    }
    flush(&mut pending, &mut adapted, &mut current_ten_bit);

    if to_eight_bit && current_ten_bit {
        adapted.push(downconvert_filter(family).to_string());
    }

    (!adapted.is_empty()).then(|| adapted.join(","))
}

fn join_filters(parts: &[Option<&str>]) -> Option<String> {
    let parts: Vec<&str> = parts.iter().flatten().copied().collect();
    (!parts.is_empty()).then(|| parts.join(","))
}

/// Filters for software-decoded frames feeding a hardware encoder
fn software_decode_filters(
    chain: Option<&str>,
    family: HwFamily,
    source_ten_bit: bool,
    to_eight_bit: bool,
) -> Option<String> {
    match family {
        // NVENC takes system memory frames directly
        HwFamily::Nvenc => join_filters(&[chain, to_eight_bit.then_some("format=yuv420p")]),
        _ => {
            let format = if source_ten_bit && !to_eight_bit { "p010" } else { "nv12" };
            let upload = format!("format={},{}", format, upload_filter(family));
            join_filters(&[chain, Some(upload.as_str())])
        }
    }
}

fn software_encode_args(codec: VideoCodec, profile: &EncodeProfile, preset: &str) -> Vec<String> {
    let encoder = software_encoder(codec);
    let crf = profile.crf.to_string();
    match codec {
        VideoCodec::H264 | VideoCodec::H265 => {
            strings(&["-c:v", encoder, "-crf", crf.as_str(), "-preset", preset])
        }
        VideoCodec::Av1 => {
            let speed = svt_av1_preset(preset).to_string();
            strings(&["-c:v", encoder, "-crf", crf.as_str(), "-preset", speed.as_str()])
        }
        VideoCodec::Vp9 => {
            let cpu_used = vpx_cpu_used(preset).to_string();
            strings(&[
                "-c:v",
                encoder,
                "-crf",
                crf.as_str(),
                "-b:v",
                "0",
                "-deadline",
                "good",
                "-cpu-used",
                cpu_used.as_str(),
            ])
        }
    }
}

fn hardware_encode_args(
    family: HwFamily,
    codec: VideoCodec,
    encoder: &str,
    profile: &EncodeProfile,
    preset: &str,
) -> Vec<String> {
    let mut args = strings(&["-c:v", encoder]);
    match family {
        HwFamily::Nvenc => {
            args.extend(strings(&["-rc", "vbr", "-cq"]));
            args.push(profile.nvenc_cq.to_string());
            args.extend(strings(&["-b:v", "0", "-preset"]));
            args.push(format!("p{}", nvenc_preset_level(preset)));
        }
        HwFamily::Vaapi if codec == VideoCodec::Vp9 => {
            args.extend(strings(&["-rc_mode", "CQP", "-global_quality"]));
            args.push(profile.global_quality.to_string());
        }
        HwFamily::Vaapi => {
            args.extend(strings(&["-rc_mode", "CQP", "-qp"]));
            args.push(profile.cq.to_string());
        }
        HwFamily::Qsv => {
            args.push("-global_quality".to_string());
            args.push(profile.global_quality.to_string());
            args.push("-preset".to_string());
            args.push(qsv_preset_name(preset).to_string());
        }
        HwFamily::Vulkan => {
            args.extend(strings(&["-rc_mode", "cqp", "-qp"]));
            args.push(profile.cq.to_string());
        }
    }
    args
}

/// Builds the ordered candidate list for one input
pub struct PipelineBuilder<'a> {
    settings: &'a ConvertSettings,
    probe: &'a MediaProbe,
    host: &'a HostCapability,
    profile: EncodeProfile,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(settings: &'a ConvertSettings, probe: &'a MediaProbe, host: &'a HostCapability) -> Self {
        Self {
            settings,
            probe,
            host,
            profile: EncodeProfile::for_tier(settings.quality),
        }
    }

    /// 10-bit source into an 8-bit-only target
    fn needs_eight_bit(&self) -> bool {
        self.probe.is_ten_bit() && self.settings.video_codec == VideoCodec::H264
    }

    /// 10-bit HEVC to H.264 stays on the GPU end to end
    fn is_full_gpu_transcode(&self) -> bool {
        self.needs_eight_bit() && self.probe.is_hevc()
    }

    pub fn software(&self) -> PipelineCandidate {
        let chain = self.settings.filter_chain();
        PipelineCandidate {
            kind: CandidateKind::Software,
            family: None,
            encoder: software_encoder(self.settings.video_codec).to_string(),
            hw_init_args: Vec::new(),
            hw_decode_args: Vec::new(),
            input_args: Vec::new(),
            encode_args: software_encode_args(
                self.settings.video_codec,
                &self.profile,
                self.settings.sw_preset(),
            ),
            hw_filters: None,
            sw_filters: join_filters(&[
                chain.as_deref(),
                self.needs_eight_bit().then_some("format=yuv420p"),
            ]),
        }
    }

    pub fn copy(&self) -> PipelineCandidate {
        if self.settings.filter_chain().is_some() {
            tracing::warn!("video filters are ignored when copying the video stream");
        }
        PipelineCandidate {
            kind: CandidateKind::Copy,
            family: None,
            encoder: "copy".to_string(),
            hw_init_args: Vec::new(),
            hw_decode_args: Vec::new(),
            input_args: Vec::new(),
            encode_args: strings(&["-c:v", "copy"]),
            hw_filters: None,
            sw_filters: None,
        }
    }

    fn hardware_with_encoder(&self, family: HwFamily, encoder: String) -> PipelineCandidate {
        let chain = self.settings.filter_chain();
        let ten_bit = self.probe.is_ten_bit();
        let to_eight_bit = self.needs_eight_bit();
        PipelineCandidate {
            kind: CandidateKind::from_family(family),
            family: Some(family),
            hw_init_args: hw_init_args(family, &self.host.render_device),
            hw_decode_args: hw_decode_args(family),
            input_args: Vec::new(),
            encode_args: hardware_encode_args(
                family,
                self.settings.video_codec,
                &encoder,
                &self.profile,
                self.settings.hw_preset(),
            ),
            hw_filters: adapt_filter_chain(chain.as_deref(), family, ten_bit, to_eight_bit),
            sw_filters: software_decode_filters(chain.as_deref(), family, ten_bit, to_eight_bit),
            encoder,
        }
    }

    pub fn hardware(&self, family: HwFamily) -> Option<PipelineCandidate> {
        let encoder = hardware_encoder(family, self.settings.video_codec)?;
        Some(self.hardware_with_encoder(family, encoder))
    }

    /// A user-pinned encoder and/or decoder. Without a forced encoder the
    /// software encoder for the target codec is used.
    pub fn forced(&self) -> PipelineCandidate {
        let encoder = self
            .settings
            .force_encoder
            .clone()
            .unwrap_or_else(|| software_encoder(self.settings.video_codec).to_string());

        let mut candidate = match HwFamily::from_codec_name(&encoder) {
            Some(family) => self.hardware_with_encoder(family, encoder),
            None => {
                let mut software = self.software();
                if let Some(pos) = software.encode_args.iter().position(|a| a == "-c:v") {
                    software.encode_args[pos + 1] = encoder.clone();
                }
                software.encoder = encoder;
                software
            }
        };
        candidate.kind = CandidateKind::Forced;
        // A pinned decoder replaces GPU decoding
        if let Some(decoder) = &self.settings.force_decoder {
            candidate.hw_decode_args.clear();
            candidate.input_args = vec!["-c:v".to_string(), decoder.clone()];
        }
        candidate
    }

    pub fn build(&self) -> CandidatePlan {
        if self.settings.is_forced() {
            return CandidatePlan {
                candidates: vec![self.forced()],
                mode: PlanMode::Exclusive,
            };
        }
        if self.settings.force_copy_video {
            return CandidatePlan {
                candidates: vec![self.copy()],
                mode: PlanMode::Exclusive,
            };
        }

        let mut candidates = Vec::new();
        if !self.settings.force_software {
            match self.host.vendor.hw_family() {
                Some(family) => match self.hardware(family) {
                    Some(candidate) => {
                        if self.is_full_gpu_transcode() {
                            tracing::info!(
                                encoder = %candidate.encoder,
                                "10-bit HEVC source, converting to 8-bit on the GPU"
                            );
                        }
                        candidates.push(candidate);
                    }
                    None => tracing::info!(
                        family = family.suffix(),
                        codec = %self.settings.video_codec,
                        "no hardware encoder for this codec, using software"
                    ),
                },
                None => tracing::debug!("no usable GPU vendor, using software"),
            }
        }
        candidates.push(self.software());

        CandidatePlan {
            candidates,
            mode: PlanMode::Ladder {
                partial: self.settings.gpu_partial,
            },
        }
    }
}

/// Convenience wrapper around [`PipelineBuilder`]
pub fn build_candidates(
    settings: &ConvertSettings,
    probe: &MediaProbe,
    host: &HostCapability,
) -> CandidatePlan {
    PipelineBuilder::new(settings, probe, host).build()
}
