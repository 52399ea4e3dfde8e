//! Running one-shot external tools

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{InterpError, InterpResult};

/// Display name of a tool: the file name of its program path
pub fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| program.to_string_lossy().to_string())
}

/// Run a tool to completion and return its stdout.
///
/// Fails when the tool cannot be started or exits unsuccessfully.
pub fn run_tool(program: &Path, args: &[&str]) -> InterpResult<Vec<u8>> {
    let tool = tool_name(program);
    debug!(%tool, ?args, "running tool");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| InterpError::ToolSpawn {
            tool: tool.clone(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(InterpError::ToolFailed {
            tool,
            message: format!("exited with {}: {}", output.status, stderr.trim()),
        });
    }

    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_name() {
        assert_eq!(tool_name(Path::new("/usr/bin/ffprobe")), "ffprobe");
        assert_eq!(tool_name(Path::new("vspipe")), "vspipe");
    }

    #[test]
    fn test_missing_tool() {
        let result = run_tool(Path::new("nonexistent_tool_xyz_12345"), &[]);
        assert!(matches!(result, Err(InterpError::ToolSpawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_output_and_failure() {
        let out = run_tool(Path::new("sh"), &["-c", "echo hello"]).unwrap();
        assert_eq!(out, b"hello\n");

        let result = run_tool(Path::new("sh"), &["-c", "echo bad >&2; exit 3"]);
        match result {
            Err(InterpError::ToolFailed { tool, message }) => {
                assert_eq!(tool, "sh");
                assert!(message.contains("bad"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
