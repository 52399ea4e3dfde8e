//! One-shot tool probing: input metadata, codecs, versions

pub mod codecs;
pub mod ffprobe;
pub mod system;
pub mod tools;

pub use codecs::{
    hwaccels, parse_codecs, parse_hwaccels, select_encoder, video_codecs, CodecSupport, Encoder,
    VideoCodecs,
};
pub use ffprobe::{parse_ffprobe, probe_media, FrameCount, MediaInfo};
pub use system::{platform_name, version_info, VersionInfo};
pub use tools::{run_tool, tool_name};
