//! ffmpeg encoder command construction

use std::ffi::OsString;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use serde_yaml::{Mapping, Value};
use tracing::info;

use crate::error::{InterpError, InterpResult};
use crate::pipeline::InterpolationJob;
use crate::probe::{tool_name, Encoder};

/// Characters escaped at the filter option level
const OPTION_SPECIAL: &[char] = &[':', '\\', '\''];
/// Characters escaped at the filtergraph level
const GRAPH_SPECIAL: &[char] = &['[', ']', ',', ';', '\\', '\''];

/// Logo overlay placement: bottom left, 20 pixels in
const LOGO_OVERLAY: &str = "[2:v]overlay=20:H-h-20:format=rgb";

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Escape a value for use as a filter option inside a filtergraph
pub fn escape_filter_param(value: &str) -> String {
    escape_chars(&escape_chars(value, OPTION_SPECIAL), GRAPH_SPECIAL)
}

/// `-filter_complex` arguments for the optional logo and subtitles.
///
/// Empty when neither is requested.
pub fn build_filter(logo: bool, subtitles: Option<&str>) -> Vec<String> {
    let mut chain = Vec::new();
    if logo {
        chain.push(LOGO_OVERLAY.to_string());
    }
    if let Some(path) = subtitles {
        chain.push(format!("subtitles={}", escape_filter_param(path)));
    }
    if chain.is_empty() {
        return Vec::new();
    }

    chain[0] = format!("[0:v]{}", chain[0]);
    chain.push("format=yuv420p[out]".to_string());
    vec!["-filter_complex".to_string(), chain.join(",")]
}

/// Render a scalar profile setting the way encoders expect it
pub fn param_value(key: &Value, value: &Value) -> InterpResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Tagged(tagged) => param_value(key, &tagged.value),
        _ => Err(InterpError::InvalidProfile {
            message: format!("encoder option {} must be a scalar", param_key(key)?),
        }),
    }
}

fn param_key(key: &Value) -> InterpResult<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(InterpError::InvalidProfile {
            message: "encoder option names must be strings".to_string(),
        }),
    }
}

/// `-x264-params k=v:k=v`, or nothing for an empty mapping
pub fn x264_params(params: &Mapping) -> InterpResult<Vec<String>> {
    if params.is_empty() {
        return Ok(Vec::new());
    }

    let pairs = params
        .iter()
        .map(|(k, v)| Ok(format!("{}={}", param_key(k)?, param_value(k, v)?)))
        .collect::<InterpResult<Vec<_>>>()?;
    Ok(vec!["-x264-params".to_string(), pairs.join(":")])
}

/// One `-key value` pair per NVENC option
pub fn nvenc_params(params: &Mapping) -> InterpResult<Vec<String>> {
    let mut args = Vec::with_capacity(params.len() * 2);
    for (k, v) in params {
        args.push(format!("-{}", param_key(k)?));
        args.push(param_value(k, v)?);
    }
    Ok(args)
}

/// Target, peak and buffer video bitrates for a `kbps` target
pub fn bitrates(kbps: u64) -> Vec<String> {
    vec![
        "-b:v".to_string(),
        format!("{}k", kbps),
        "-maxrate".to_string(),
        format!("{}k", kbps * 2),
        "-bufsize".to_string(),
        format!("{}k", kbps * 3 / 2),
    ]
}

/// Encoder arguments reading raw frames from stdin and audio from the input
pub fn ffmpeg_args(job: &InterpolationJob) -> InterpResult<Vec<OsString>> {
    let mut args: Vec<OsString> = ["-y", "-v", "info", "-thread_queue_size", "16", "-i", "pipe:"]
        .iter()
        .map(OsString::from)
        .collect();
    args.push("-i".into());
    args.push(job.input.clone().into_os_string());

    if let Some(logo) = &job.logo {
        args.push("-i".into());
        args.push(logo.clone().into_os_string());
    }

    let subtitles = job.subtitles.as_ref().map(|p| p.to_string_lossy());
    let filter = build_filter(job.logo.is_some(), subtitles.as_deref());
    if filter.is_empty() {
        args.extend(["-map", "0:v"].map(OsString::from));
    } else {
        args.extend(filter.into_iter().map(OsString::from));
        args.extend(["-map", "[out]"].map(OsString::from));
    }

    args.extend(["-map", "1:a", "-pix_fmt", "yuv420p", "-c:v"].map(OsString::from));
    args.push(job.encoder.name().into());
    args.extend(bitrates(job.profile.v_bitrate).into_iter().map(OsString::from));
    args.extend(["-profile:v", "high", "-level", "4.2"].map(OsString::from));

    let encoder_params = match job.encoder {
        Encoder::Nvenc => nvenc_params(&job.profile.nvenc)?,
        Encoder::X264 => x264_params(&job.profile.x264)?,
    };
    args.extend(encoder_params.into_iter().map(OsString::from));

    args.extend(["-c:a", "aac", "-b:a"].map(OsString::from));
    args.push(format!("{}k", job.profile.a_bitrate).into());
    args.push(job.output.clone().into_os_string());

    Ok(args)
}

/// Start the encoder with `stdin` as its frame source and both outputs piped
pub fn spawn_ffmpeg(program: &Path, args: &[OsString], stdin: Stdio) -> InterpResult<Child> {
    info!("Starting encoder: {} {:?}", program.display(), args);

    Command::new(program)
        .args(args)
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| InterpError::ToolSpawn {
            tool: tool_name(program),
            source,
        })
}
