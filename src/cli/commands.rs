//! Command implementations
//!
//! Every command reports through JSON records and returns the process exit
//! code. Expected failures (bad input, missing encoder, unreadable profiles)
//! become error records with exit code 1.

use anyhow::Result;
use tracing::{error, info, warn};

use crate::cli::Cli;
use crate::config::AppConfig;
use crate::engine::{supervise_child, ProgressMonitor, ProgressState};
use crate::error::{InterpError, InterpResult};
use crate::output::{Record, RecordSink};
use crate::pipeline::{exit_code, InterpolationJob, Pipeline};
use crate::probe::{hwaccels, probe_media, select_encoder, version_info, video_codecs};
use crate::profile::ProfileSet;

/// Run the command selected on the command line
pub fn run(cli: &Cli, sink: &mut dyn RecordSink) -> Result<i32> {
    let config = match AppConfig::initialize(cli.config.as_deref(), &cli.config_overrides()) {
        Ok(config) => config,
        Err(e) => return report(sink, e),
    };

    let profiles = match ProfileSet::load(&config.profiles) {
        Ok(profiles) => profiles,
        Err(e) => return report(sink, e),
    };

    if cli.version {
        version(&config, sink)?;
        return Ok(0);
    }

    if cli.list_profiles {
        sink.emit(&Record::Profiles {
            names: profiles.names(),
        })?;
        return Ok(0);
    }

    match interpolate(cli, &config, &profiles, sink) {
        Ok(code) => Ok(code),
        Err(e) => report(sink, e),
    }
}

/// Emit the version report, or an `invalid_config` record if any probe fails
pub fn version(config: &AppConfig, sink: &mut dyn RecordSink) -> InterpResult<()> {
    match version_info(&config.tools.ffmpeg, &config.tools.vspipe) {
        Ok(info) => sink.emit(&Record::Version(info)),
        Err(e) => {
            warn!("Version probe failed: {}", e);
            sink.emit(&Record::Error {
                kind: "invalid_config",
            })
        }
    }
}

/// Probe, start the pipeline and follow the encoder to completion
pub fn interpolate(
    cli: &Cli,
    config: &AppConfig,
    profiles: &ProfileSet,
    sink: &mut dyn RecordSink,
) -> InterpResult<i32> {
    let args = &cli.job;
    let (input, output) = match (&args.input, &args.output) {
        (Some(input), Some(output)) => (input.clone(), output.clone()),
        _ => {
            return Err(InterpError::ConfigError {
                message: "input and output files are required".to_string(),
            })
        }
    };

    let profile = profiles.resolve(&args.profile, args.override_json.as_ref())?;
    let media = probe_media(&config.tools.ffprobe, &input)?;

    let codecs = video_codecs(&config.tools.ffmpeg)?;
    if args.gpu {
        if let Err(e) = hwaccels(&config.tools.ffmpeg) {
            warn!("Could not list hardware acceleration methods: {}", e);
        }
    }
    let encoder = select_encoder(args.gpu, &codecs)?;

    let job = InterpolationJob {
        subtitles: args.subtitle_source(),
        logo: args.logo.clone(),
        gpu: args.gpu,
        input,
        output,
        encoder,
        profile,
    };
    info!(
        "Interpolating {} -> {} with {}",
        job.input.display(),
        job.output.display(),
        job.encoder
    );

    let mut pipeline = Pipeline::start(config, &job)?;
    let mut monitor = ProgressMonitor::new(ProgressState::new(media, config.output_fps), sink);

    let status = match supervise_child(&mut pipeline.encoder, &config.follow_options(), &mut monitor)
    {
        Ok(status) => status,
        Err(e) => {
            pipeline.abort();
            return Err(e);
        }
    };
    pipeline.finish();

    let code = exit_code(status);
    if status.success() {
        info!("Encoding finished");
    } else {
        warn!("Encoder exited with {}", status);
        let failure = monitor.failure(code);
        monitor.emit(&failure)?;
    }
    Ok(code)
}

/// Report an error as a record and fail with exit code 1
fn report(sink: &mut dyn RecordSink, err: InterpError) -> Result<i32> {
    error!("{}", err);
    sink.emit(&Record::error(&err))?;
    Ok(1)
}
