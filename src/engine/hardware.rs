//! GPU vendor detection and hardware encoder probing

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use regex::Regex;
use serde::Serialize;

use crate::engine::core::{FfmpegInvocation, GpuChoice, HwFamily, Tools, hw_init_args, upload_filter};
use crate::error::{ConvertError, Result};

/// Render node used when `/dev/dri` has none to offer
pub const DEFAULT_RENDER_DEVICE: &str = "/dev/dri/renderD128";

/// GPU vendor the pipeline is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum GpuVendor {
    #[default]
    None,
    Nvidia,
    Amd,
    Intel,
    Vulkan,
}

impl GpuVendor {
    /// Encoder family used for conversions on this vendor
    pub fn hw_family(&self) -> Option<HwFamily> {
        self.families().first().copied()
    }

    /// Every family worth probing on this vendor, preferred first
    pub fn families(&self) -> &'static [HwFamily] {
        match self {
            Self::None => &[],
            Self::Nvidia => &[HwFamily::Nvenc],
            Self::Amd => &[HwFamily::Vaapi],
            Self::Intel => &[HwFamily::Qsv, HwFamily::Vaapi],
            Self::Vulkan => &[HwFamily::Vulkan],
        }
    }
}

impl fmt::Display for GpuVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Nvidia => "nvidia",
            Self::Amd => "amd",
            Self::Intel => "intel",
            Self::Vulkan => "vulkan",
        })
    }
}

/// What the host can do, as far as this run needs to know
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostCapability {
    pub vendor: GpuVendor,
    pub render_device: String,
    /// Only filled by encoder detection; every entry passed a live test
    pub supported_hw_encoders: BTreeSet<String>,
}

impl HostCapability {
    pub fn new(vendor: GpuVendor, render_device: impl Into<String>) -> Self {
        Self {
            vendor,
            render_device: render_device.into(),
            supported_hw_encoders: BTreeSet::new(),
        }
    }

    /// Software-only host, no probing
    pub fn software() -> Self {
        Self::new(GpuVendor::None, DEFAULT_RENDER_DEVICE)
    }

    /// Resolve the vendor for a run. `lspci` is only consulted for `auto`
    /// when hardware encoding is actually wanted.
    pub fn detect(choice: GpuChoice, wants_hardware: bool, tools: &Tools) -> Result<Self> {
        if !wants_hardware {
            return Ok(Self::software());
        }
        let vendor = resolve_vendor(choice, tools)?;
        let render_device = detect_render_device();
        tracing::info!(%vendor, render_device = %render_device, "GPU selection");
        Ok(Self::new(vendor, render_device))
    }
}

/// Map a GPU choice to a vendor, running `lspci` for `auto`
pub fn resolve_vendor(choice: GpuChoice, tools: &Tools) -> Result<GpuVendor> {
    match choice {
        GpuChoice::Nvidia => Ok(GpuVendor::Nvidia),
        GpuChoice::Amd => Ok(GpuVendor::Amd),
        GpuChoice::Intel => Ok(GpuVendor::Intel),
        GpuChoice::Vulkan => Ok(GpuVendor::Vulkan),
        GpuChoice::Software => Ok(GpuVendor::None),
        GpuChoice::Auto => {
            let lspci = tools.require("lspci")?;
            detect_vendor(&lspci)
        }
    }
}

/// Run `lspci` and classify its output
pub fn detect_vendor(lspci: &Path) -> Result<GpuVendor> {
    let output = Command::new(lspci)
        .output()
        .map_err(|e| ConvertError::from_spawn("lspci", e))?;

    if !output.status.success() {
        return Err(ConvertError::tool_failed(
            "lspci",
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    classify_vendor(&String::from_utf8_lossy(&output.stdout))
}

/// Pick a vendor from `lspci` output.
///
/// Only display controllers count. With several GPUs the discrete vendors
/// win: NVIDIA, then AMD, then Intel.
pub fn classify_vendor(lspci_output: &str) -> Result<GpuVendor> {
    let display = Regex::new(r"(?i)\b(vga|3d|display)\b")?;
    let nvidia = Regex::new(r"(?i)\bnvidia\b")?;
    // "ati" must be a whole word; it is a substring of "Corporation"
    let amd = Regex::new(r"(?i)\b(amd|ati|radeon|advanced micro devices)\b")?;
    let intel = Regex::new(r"(?i)\bintel\b")?;

    let mut found = BTreeSet::new();
    for line in lspci_output.lines().filter(|l| display.is_match(l)) {
        if nvidia.is_match(line) {
            found.insert(0);
        } else if amd.is_match(line) {
            found.insert(1);
        } else if intel.is_match(line) {
            found.insert(2);
        }
    }

    Ok(match found.first().copied() {
        Some(0) => GpuVendor::Nvidia,
        Some(1) => GpuVendor::Amd,
        Some(2) => GpuVendor::Intel,
        _ => GpuVendor::None,
    })
}

/// All `renderD*` nodes under a DRI directory, sorted
pub fn list_render_devices(dri_path: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dri_path) else {
        return Vec::new();
    };

    let mut devices: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| n.starts_with("renderD"))
                .unwrap_or(false)
        })
        .map(|e| e.path())
        .collect();

    // renderD128 before renderD129
    devices.sort();
    devices
}

/// First render node, or the conventional default
pub fn detect_render_device() -> String {
    list_render_devices(Path::new("/dev/dri"))
        .first()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| DEFAULT_RENDER_DEVICE.to_string())
}

/// Codec prefixes (`h264`, `hevc`, `av1`, `vp9`) with a VA encode entry point
pub fn parse_vainfo_encode_profiles(output: &str) -> Result<BTreeSet<String>> {
    let re = Regex::new(r"VAProfile(H264|HEVC|AV1|VP9)\w*\s*:\s*VAEntrypointEncSlice(?:LP)?\b")?;
    Ok(re
        .captures_iter(output)
        .map(|c| c[1].to_ascii_lowercase())
        .collect())
}

/// Run `vainfo` against one render node. A failing driver is reported as
/// "nothing supported"; only a missing binary is an error.
pub fn run_vainfo(vainfo: &Path, device: &str) -> Result<String> {
    let output = Command::new(vainfo)
        .args(["--display", "drm", "--device", device])
        .output()
        .map_err(|e| ConvertError::from_spawn("vainfo", e))?;

    if !output.status.success() {
        tracing::debug!(device, status = %output.status, "vainfo reported no usable driver");
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Encoders of one family listed by `ffmpeg -encoders`
pub fn candidate_encoders(encoders_output: &str, family: HwFamily) -> Result<Vec<String>> {
    let re = Regex::new(&format!(
        r"(?m)^\s*V\S*\s+((?:h264|hevc|av1|vp9)_{})\b",
        family.suffix()
    ))?;
    Ok(re
        .captures_iter(encoders_output)
        .map(|c| c[1].to_string())
        .collect())
}

/// One-frame synthetic encode that proves an encoder works on this host
pub fn live_test_invocation(
    ffmpeg: &Path,
    encoder: &str,
    family: HwFamily,
    device: &str,
) -> FfmpegInvocation {
    let mut inv = FfmpegInvocation::new(ffmpeg);
    inv.args(["-hide_banner", "-loglevel", "error"]);
    inv.args(hw_init_args(family, device));
    inv.args([
        "-f",
        "lavfi",
        "-i",
        "color=c=black:s=256x256:r=25:d=0.1",
        "-frames:v",
        "1",
    ]);
    if family != HwFamily::Nvenc {
        inv.arg("-vf");
        inv.arg(format!("format=nv12,{}", upload_filter(family)));
    }
    inv.args(["-c:v", encoder, "-f", "null", "-"]);
    inv
}

fn va_based(family: HwFamily) -> bool {
    matches!(family, HwFamily::Vaapi | HwFamily::Qsv)
}

/// Encoder detection with the external probes injected.
///
/// `vainfo` is asked once per render node for VA-based families; `live_test`
/// runs each plausible encoder on each node until one succeeds.
pub fn select_working_encoders<V, T>(
    ffmpeg: &Path,
    encoders_output: &str,
    vendor: GpuVendor,
    render_devices: &[String],
    mut vainfo: V,
    mut live_test: T,
) -> Result<BTreeSet<String>>
where
    V: FnMut(&str) -> Result<String>,
    T: FnMut(&FfmpegInvocation) -> bool,
{
    let default_devices = [DEFAULT_RENDER_DEVICE.to_string()];
    let devices = if render_devices.is_empty() {
        &default_devices[..]
    } else {
        render_devices
    };

    let mut working = BTreeSet::new();
    let mut va_profiles: Option<BTreeSet<String>> = None;

    for &family in vendor.families() {
        let mut names = candidate_encoders(encoders_output, family)?;
        if names.is_empty() {
            tracing::debug!(family = family.suffix(), "ffmpeg lists no encoders for family");
            continue;
        }

        if va_based(family) {
            if va_profiles.is_none() {
                let mut profiles = BTreeSet::new();
                for device in devices {
                    profiles.extend(parse_vainfo_encode_profiles(&vainfo(device.as_str())?)?);
                }
                va_profiles = Some(profiles);
            }
            if let Some(profiles) = &va_profiles {
                names.retain(|name| {
                    name.split('_')
                        .next()
                        .is_some_and(|prefix| profiles.contains(prefix))
                });
            }
        }

        // Only VA-based families are tied to a render node
        let family_devices = if va_based(family) { devices } else { &devices[..1] };

        for name in names {
            for device in family_devices {
                let inv = live_test_invocation(ffmpeg, &name, family, device);
                tracing::debug!(encoder = %name, device = %device, "live-testing encoder");
                if live_test(&inv) {
                    working.insert(name.clone());
                    break;
                }
            }
        }
    }

    Ok(working)
}

/// Detect hardware encoders that actually work on this host
pub fn detect_encoders(tools: &Tools, vendor: GpuVendor) -> Result<BTreeSet<String>> {
    let listing = crate::engine::core::list_encoders(&tools.ffmpeg)?;
    let devices: Vec<String> = list_render_devices(Path::new("/dev/dri"))
        .into_iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect();

    let needs_vainfo = vendor.families().iter().any(|&f| va_based(f));
    let vainfo = if needs_vainfo {
        Some(tools.require("vainfo")?)
    } else {
        None
    };

    select_working_encoders(
        &tools.ffmpeg,
        &listing,
        vendor,
        &devices,
        |device| match &vainfo {
            Some(path) => run_vainfo(path, device),
            None => Ok(String::new()),
        },
        |inv| {
            inv.to_command()
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false)
        },
    )
}
