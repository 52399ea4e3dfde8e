//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

/// Arguments describing one interpolation run
#[derive(Args, Debug, Clone)]
pub struct InterpolateArgs {
    /// Path to the input file to be processed
    #[arg(
        value_parser = existing_path,
        required_unless_present_any = ["version", "list_profiles"]
    )]
    pub input: Option<PathBuf>,

    /// Path to the output file; the extension determines the container format
    #[arg(required_unless_present_any = ["version", "list_profiles"])]
    pub output: Option<PathBuf>,

    /// Read and render subtitles from the given file
    #[arg(short = 's', long, value_parser = existing_path)]
    pub subtitles: Option<PathBuf>,

    /// Read and render subtitles from the input file (overrides -s)
    #[arg(short = 'S', long)]
    pub inline_subtitles: bool,

    /// Overlay image rendered on the bottom left
    #[arg(short = 'l', long, value_parser = existing_path)]
    pub logo: Option<PathBuf>,

    /// Use GPU acceleration
    #[arg(short = 'G', long)]
    pub gpu: bool,

    /// Encoding profile
    #[arg(short = 'p', long, default_value = "default")]
    pub profile: String,

    /// Override encoding profile settings (JSON object)
    #[arg(short = 'o', long = "override", value_name = "JSON", value_parser = parse_json)]
    pub override_json: Option<serde_json::Value>,
}

impl InterpolateArgs {
    /// Subtitle source after applying `--inline-subtitles`
    pub fn subtitle_source(&self) -> Option<PathBuf> {
        if self.inline_subtitles {
            self.input.clone()
        } else {
            self.subtitles.clone()
        }
    }
}

/// Accept only paths that exist
pub fn existing_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.exists() {
        Ok(path)
    } else {
        Err(format!("File not found: {}", value))
    }
}

/// Parse a JSON document
pub fn parse_json(value: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(value).map_err(|e| format!("Invalid JSON: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_existing_path() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        assert_eq!(existing_path(path).unwrap(), file.path());
        assert!(existing_path("/nonexistent/input.mkv").is_err());
    }

    #[test]
    fn test_parse_json() {
        assert_eq!(
            parse_json(r#"{"v_bitrate": 8000}"#).unwrap()["v_bitrate"],
            8000
        );
        assert!(parse_json("{v_bitrate: 8000}").is_err());
    }
}
