//! Codec and hardware acceleration discovery, encoder selection

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};

use crate::error::{InterpError, InterpResult};
use crate::probe::tools::run_tool;

/// Decoders and encoders ffmpeg offers for one codec
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecSupport {
    pub decoders: Vec<String>,
    pub encoders: Vec<String>,
}

/// Encodable video codecs keyed by codec name
pub type VideoCodecs = BTreeMap<String, CodecSupport>;

/// H.264 encoder used for the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoder {
    /// Software x264
    X264,
    /// NVIDIA NVENC
    Nvenc,
}

impl Encoder {
    /// ffmpeg encoder name
    pub fn name(self) -> &'static str {
        match self {
            Encoder::X264 => "libx264",
            Encoder::Nvenc => "h264_nvenc",
        }
    }
}

impl fmt::Display for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn codec_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Capability flags: decode, encode, video
    RE.get_or_init(|| Regex::new(r"^\s\SEV\S{3}\s+(\S+)\s+(.*)$").expect("valid codec regex"))
}

/// Parse `ffmpeg -codecs` output, keeping encodable video codecs only
pub fn parse_codecs(output: &str) -> VideoCodecs {
    let mut codecs = VideoCodecs::new();

    for line in output.lines() {
        let Some(caps) = codec_re().captures(line) else {
            continue;
        };
        let description = caps.get(2).map_or("", |m| m.as_str());
        codecs.insert(
            caps[1].to_string(),
            CodecSupport {
                decoders: implementation_list(description, "decoders"),
                encoders: implementation_list(description, "encoders"),
            },
        );
    }

    codecs
}

/// Names inside a `(decoders: a b c )` style group of a codec description
fn implementation_list(description: &str, kind: &str) -> Vec<String> {
    let marker = format!("({}:", kind);
    let Some(start) = description.find(&marker) else {
        return Vec::new();
    };
    let rest = &description[start + marker.len()..];
    let end = rest.find(')').unwrap_or(rest.len());

    rest[..end].split_whitespace().map(str::to_owned).collect()
}

/// Parse `ffmpeg -hwaccels` output
pub fn parse_hwaccels(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("Hardware "))
        .map(str::to_owned)
        .collect()
}

/// Pick the H.264 encoder: NVENC when requested and available, else x264
pub fn select_encoder(gpu: bool, codecs: &VideoCodecs) -> InterpResult<Encoder> {
    let encoders = codecs
        .get("h264")
        .map(|support| support.encoders.as_slice())
        .unwrap_or_default();
    let offers = |encoder: Encoder| encoders.iter().any(|e| e == encoder.name());

    let encoder = if gpu && offers(Encoder::Nvenc) {
        Encoder::Nvenc
    } else if offers(Encoder::X264) {
        Encoder::X264
    } else {
        return Err(InterpError::NoEncoder);
    };

    debug!(%encoder, gpu, "encoder selected");
    Ok(encoder)
}

/// Encodable video codecs of the installed ffmpeg
pub fn video_codecs(ffmpeg: &Path) -> InterpResult<VideoCodecs> {
    let output = run_tool(ffmpeg, &["-v", "error", "-codecs"])?;
    Ok(parse_codecs(&String::from_utf8_lossy(&output)))
}

/// Hardware acceleration methods of the installed ffmpeg
pub fn hwaccels(ffmpeg: &Path) -> InterpResult<Vec<String>> {
    let output = run_tool(ffmpeg, &["-v", "error", "-hwaccels"])?;
    let accels = parse_hwaccels(&String::from_utf8_lossy(&output));
    info!("Hardware acceleration methods: {:?}", accels);
    Ok(accels)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODECS: &str = "Codecs:
 D..... = Decoding supported
 .E.... = Encoding supported
 ..V... = Video codec
 -------
 D.VI.S 012v                 Uncompressed 4:2:2 10-bit
 DEV.LS h264                 H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10 (decoders: h264 h264_v4l2m2m h264_cuvid ) (encoders: libx264 libx264rgb h264_nvenc h264_vaapi )
 DEV.L. mpeg4                MPEG-4 part 2 (decoders: mpeg4 mpeg4_cuvid ) (encoders: mpeg4 libxvid )
 DEV.LS ffv1                 FFmpeg video codec #1
 DEA.L. aac                  AAC (Advanced Audio Coding) (decoders: aac aac_fixed )
";

    #[test]
    fn test_parse_codecs() {
        let codecs = parse_codecs(CODECS);

        assert_eq!(
            codecs.keys().collect::<Vec<_>>(),
            vec!["ffv1", "h264", "mpeg4"]
        );
        let h264 = &codecs["h264"];
        assert_eq!(h264.decoders, vec!["h264", "h264_v4l2m2m", "h264_cuvid"]);
        assert_eq!(
            h264.encoders,
            vec!["libx264", "libx264rgb", "h264_nvenc", "h264_vaapi"]
        );
        assert!(codecs["ffv1"].encoders.is_empty());
    }

    #[test]
    fn test_description_parentheses_are_not_lists() {
        let line = " DEV.L. msmpeg4v3            MPEG-4 part 2 Microsoft variant version 3 (decoders: msmpeg4 ) (encoders: msmpeg4 )";
        let codecs = parse_codecs(line);
        assert_eq!(codecs["msmpeg4v3"].decoders, vec!["msmpeg4"]);

        let line = " DEV.L. flv1                 FLV / Sorenson Spark / Sorenson H.263 (Flash Video) (decoders: flv ) (encoders: flv )";
        let codecs = parse_codecs(line);
        assert_eq!(codecs["flv1"].encoders, vec!["flv"]);
    }

    #[test]
    fn test_select_encoder() {
        let codecs = parse_codecs(CODECS);
        assert_eq!(select_encoder(true, &codecs).unwrap(), Encoder::Nvenc);
        assert_eq!(select_encoder(false, &codecs).unwrap(), Encoder::X264);
    }

    #[test]
    fn test_select_encoder_without_nvenc() {
        let line = " DEV.LS h264                 H.264 (decoders: h264 ) (encoders: libx264 )";
        let codecs = parse_codecs(line);
        assert_eq!(select_encoder(true, &codecs).unwrap(), Encoder::X264);
    }

    #[test]
    fn test_select_encoder_none() {
        let line = " DEV.LS h264                 H.264 (decoders: h264 ) (encoders: h264_vaapi )";
        assert!(matches!(
            select_encoder(false, &parse_codecs(line)),
            Err(InterpError::NoEncoder)
        ));
        assert!(matches!(
            select_encoder(true, &VideoCodecs::new()),
            Err(InterpError::NoEncoder)
        ));
    }

    #[test]
    fn test_parse_hwaccels() {
        let output = "Hardware acceleration methods:\nvdpau\ncuda\n\nvaapi\n";
        assert_eq!(parse_hwaccels(output), vec!["vdpau", "cuda", "vaapi"]);
    }
}
