//! vspipe frame server command construction

use std::ffi::OsString;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use serde_yaml::Value;
use tracing::info;

use crate::error::{InterpError, InterpResult};
use crate::pipeline::InterpolationJob;
use crate::probe::tool_name;

/// Render profile settings in SVP's relaxed JSON notation, e.g.
/// `{block:{w:16,overlap:2},gpu:true}`. Strings are emitted bare.
pub fn svp_config(value: &Value) -> String {
    match value {
        Value::Mapping(map) => {
            let fields: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}:{}", svp_config(k), svp_config(v)))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Sequence(items) => {
            let items: Vec<String> = items.iter().map(svp_config).collect();
            format!("[{}]", items.join(","))
        }
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        Value::Tagged(tagged) => svp_config(&tagged.value),
    }
}

fn script_arg(name: &str, value: &str) -> [OsString; 2] {
    ["--arg".into(), format!("{}={}", name, value).into()]
}

/// Arguments running `script` over the input and writing Y4M to stdout
pub fn vspipe_args(job: &InterpolationJob, script: &Path) -> Vec<OsString> {
    let mut source = OsString::from("source=");
    source.push(job.input.as_os_str());

    let mut args: Vec<OsString> = vec!["--arg".into(), source];
    args.extend(script_arg("analyse", &svp_config(&job.profile.analyse)));
    args.extend(script_arg("smooth", &svp_config(&job.profile.smooth)));
    if job.gpu {
        args.extend(script_arg("gpu", "1"));
    }
    args.push("--y4m".into());
    args.push(script.as_os_str().to_owned());
    args.push("-".into());
    args
}

/// Start the frame server with stdout piped and diagnostics discarded
pub fn spawn_vspipe(program: &Path, args: &[OsString]) -> InterpResult<Child> {
    info!("Starting frame server: {} {:?}", program.display(), args);

    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| InterpError::ToolSpawn {
            tool: tool_name(program),
            source,
        })
}
