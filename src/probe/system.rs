//! Tool versions and host platform facts for `--version`

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{InterpError, InterpResult};
use crate::probe::tools::run_tool;

/// Versions of the toolchain and the host it runs on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    /// Platform name
    #[serde(rename = "p")]
    pub platform: String,
    /// ffmpeg version
    #[serde(rename = "ff")]
    pub ffmpeg: String,
    /// VapourSynth core version
    #[serde(rename = "vs")]
    pub vapoursynth: String,
    /// CPU model
    #[serde(rename = "c")]
    pub cpu: String,
    /// Logical CPU count
    #[serde(rename = "t")]
    pub threads: usize,
}

struct VersionPatterns {
    ffmpeg: Regex,
    vs_core: Regex,
    cpu_model: Regex,
}

fn patterns() -> &'static VersionPatterns {
    static PATTERNS: OnceLock<VersionPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| VersionPatterns {
        ffmpeg: Regex::new(r"(?m)^ffmpeg version (\S+)").expect("valid ffmpeg version regex"),
        vs_core: Regex::new(r"(?m)^Core (.+?)\s*$").expect("valid core version regex"),
        cpu_model: Regex::new(r"(?m)^model name\s*:\s*(.+?)\s*$").expect("valid cpuinfo regex"),
    })
}

/// Version from the first line of `ffmpeg -version`
pub fn parse_ffmpeg_version(output: &str) -> Option<String> {
    patterns()
        .ffmpeg
        .captures(output)
        .map(|caps| caps[1].to_string())
}

/// Core version from `vspipe --version`
pub fn parse_vs_core(output: &str) -> Option<String> {
    patterns()
        .vs_core
        .captures(output)
        .map(|caps| caps[1].to_string())
}

/// CPU model from `/proc/cpuinfo` content
pub fn parse_cpu_model(cpuinfo: &str) -> Option<String> {
    patterns()
        .cpu_model
        .captures(cpuinfo)
        .map(|caps| caps[1].to_string())
}

/// Platform name in the form `linux`, `darwin`, `win32`, `freebsd`
pub fn platform_name() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}

/// CPU model of the host
pub fn cpu_model() -> InterpResult<String> {
    #[cfg(target_os = "linux")]
    {
        let cpuinfo = std::fs::read_to_string("/proc/cpuinfo")?;
        parse_cpu_model(&cpuinfo).ok_or_else(|| InterpError::ToolFailed {
            tool: "cpuinfo".to_string(),
            message: "no model name in /proc/cpuinfo".to_string(),
        })
    }

    #[cfg(any(target_os = "macos", target_os = "freebsd"))]
    {
        let output = run_tool(
            Path::new("/usr/sbin/sysctl"),
            &["-n", "machdep.cpu.brand_string"],
        )?;
        Ok(String::from_utf8_lossy(&output).trim().to_string())
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "freebsd")))]
    {
        Ok(std::env::var("PROCESSOR_IDENTIFIER")
            .unwrap_or_else(|_| std::env::consts::ARCH.to_string()))
    }
}

/// Collect the version report
pub fn version_info(ffmpeg: &Path, vspipe: &Path) -> InterpResult<VersionInfo> {
    let output = run_tool(ffmpeg, &["-version"])?;
    let ffmpeg_version =
        parse_ffmpeg_version(&String::from_utf8_lossy(&output)).ok_or_else(|| {
            InterpError::ToolFailed {
                tool: "ffmpeg".to_string(),
                message: "unrecognised version output".to_string(),
            }
        })?;

    let output = run_tool(vspipe, &["--version"])?;
    let vapoursynth = parse_vs_core(&String::from_utf8_lossy(&output)).ok_or_else(|| {
        InterpError::ToolFailed {
            tool: "vspipe".to_string(),
            message: "unrecognised version output".to_string(),
        }
    })?;

    Ok(VersionInfo {
        platform: platform_name().to_string(),
        ffmpeg: ffmpeg_version,
        vapoursynth,
        cpu: cpu_model()?,
        threads: num_cpus::get(),
    })
}
