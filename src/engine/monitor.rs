//! Orchestration of a followed encoder run
//!
//! [`ProgressMonitor`] consumes tagged lines, skips immediate repeats,
//! parses progress and emits merged progress records. The last few raw
//! lines are kept for the failure record. [`supervise`] drives a follower
//! into a monitor and makes sure the child never outlives a failed run.

use std::collections::VecDeque;
use std::fs::File;
use std::process::{Child, ExitStatus};

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::engine::progress::{parse_progress, ProgressSnapshot};
use crate::error::InterpResult;
use crate::follow::{take_pipes, ChildHandle, FollowOptions, ProcessFollower, TaggedLine};
use crate::output::{Record, RecordSink};
use crate::probe::MediaInfo;

/// Lines kept for failure diagnostics
pub const RECENT_LINES: usize = 5;

/// Bounded window of the most recent raw lines, oldest evicted first
#[derive(Debug, Clone)]
pub struct RecentLines {
    lines: VecDeque<String>,
    capacity: usize,
}

impl RecentLines {
    /// Create an empty window
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a line, evicting the oldest one when full
    pub fn push(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Retained lines, oldest first
    pub fn to_vec(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Default for RecentLines {
    fn default() -> Self {
        Self::new(RECENT_LINES)
    }
}

/// Running state reported with every progress record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressState {
    /// Probed input facts
    #[serde(flatten)]
    pub media: MediaInfo,
    /// Expected number of output frames
    #[serde(rename = "nft")]
    pub target_frames: Option<u64>,
    /// Latest decoded progress
    #[serde(flatten)]
    pub progress: Option<ProgressSnapshot>,
}

impl ProgressState {
    /// Initial state for an input converted to `output_fps`
    pub fn new(media: MediaInfo, output_fps: f64) -> Self {
        let target_frames = media.target_frames(output_fps);
        Self {
            media,
            target_frames,
            progress: None,
        }
    }

    /// Merge a fresh snapshot into the state
    pub fn merge(&mut self, snapshot: ProgressSnapshot) {
        self.progress = Some(snapshot);
    }
}

/// Counters for one monitored run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Lines delivered by the follower
    pub lines_received: u64,
    /// Lines skipped as repeats of the previous one
    pub duplicates_skipped: u64,
    /// Progress records emitted
    pub progress_updates: u64,
}

/// Turns followed output lines into progress records
pub struct ProgressMonitor<S: RecordSink> {
    state: ProgressState,
    sink: S,
    last: Option<Vec<u8>>,
    recent: RecentLines,
    stats: MonitorStats,
}

impl<S: RecordSink> ProgressMonitor<S> {
    /// Create a monitor emitting into `sink`
    pub fn new(state: ProgressState, sink: S) -> Self {
        Self {
            state,
            sink,
            last: None,
            recent: RecentLines::default(),
            stats: MonitorStats::default(),
        }
    }

    /// Handle one line from either stream.
    ///
    /// Returns `false` when the line repeats the previous one and was skipped.
    pub fn observe(&mut self, line: &TaggedLine) -> InterpResult<bool> {
        self.stats.lines_received += 1;

        if self.last.as_deref() == Some(line.line.as_slice()) {
            self.stats.duplicates_skipped += 1;
            return Ok(false);
        }
        self.last = Some(line.line.clone());
        self.recent.push(line.text());
        trace!(stream = %line.tag, line = %line.text(), "child output");

        if let Some(snapshot) = parse_progress(&line.line) {
            self.state.merge(snapshot);
            self.stats.progress_updates += 1;
            self.sink.emit(&Record::Progress(self.state.clone()))?;
        }
        Ok(true)
    }

    /// Feed every line of a follower, stopping at the first error
    pub fn consume<I>(&mut self, lines: I) -> InterpResult<()>
    where
        I: IntoIterator<Item = InterpResult<TaggedLine>>,
    {
        for line in lines {
            self.observe(&line?)?;
        }
        Ok(())
    }

    /// Failure record for an unsuccessful exit
    pub fn failure(&self, code: i32) -> Record {
        Record::failure(code, self.recent.to_vec())
    }

    /// Emit a record through this monitor's sink
    pub fn emit(&mut self, record: &Record) -> InterpResult<()> {
        self.sink.emit(record)
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn recent(&self) -> &RecentLines {
        &self.recent
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the monitor, returning its sink
    pub fn into_sink(self) -> S {
        self.sink
    }
}

/// Follow a process' pipes into `monitor` until the session ends, then reap it.
///
/// If following fails, the child is terminated and waited for before the
/// error is returned.
pub fn supervise<P, S>(
    child: &mut P,
    stdout: File,
    stderr: File,
    options: &FollowOptions,
    monitor: &mut ProgressMonitor<S>,
) -> InterpResult<ExitStatus>
where
    P: ChildHandle,
    S: RecordSink,
{
    let followed = ProcessFollower::new(&mut *child, stdout, stderr, options)
        .and_then(|follower| monitor.consume(follower));

    if let Err(e) = followed {
        warn!(error = %e, pid = child.id(), "following failed, stopping child");
        reap(child);
        return Err(e);
    }

    let status = child.wait()?;
    let stats = monitor.stats();
    debug!(
        %status,
        lines = stats.lines_received,
        duplicates = stats.duplicates_skipped,
        updates = stats.progress_updates,
        "child finished"
    );
    Ok(status)
}

/// [`supervise`] a spawned child through its own stdout and stderr pipes
pub fn supervise_child<S: RecordSink>(
    child: &mut Child,
    options: &FollowOptions,
    monitor: &mut ProgressMonitor<S>,
) -> InterpResult<ExitStatus> {
    match take_pipes(child) {
        Ok((stdout, stderr)) => supervise(child, stdout, stderr, options, monitor),
        Err(e) => {
            reap(child);
            Err(e)
        }
    }
}

/// Terminate a child and wait for it, logging failures
pub fn reap<P: ChildHandle>(child: &mut P) {
    if let Err(e) = child.terminate() {
        warn!(error = %e, pid = child.id(), "failed to terminate child");
    }
    match child.wait() {
        Ok(status) => debug!(%status, "child reaped"),
        Err(e) => warn!(error = %e, pid = child.id(), "failed to wait for child"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InterpError;
    use crate::follow::StreamTag;
    use crate::probe::FrameCount;

    const PROGRESS: &[u8] =
        b"frame=   10 fps=25.0 q=28.0 size=     100kB time=00:00:00.40 bitrate= 500.0kbits/s speed=1.0x";

    fn stderr(line: &[u8]) -> InterpResult<TaggedLine> {
        Ok(TaggedLine::new(StreamTag::Stderr, line.to_vec()))
    }

    fn monitor() -> ProgressMonitor<Vec<Record>> {
        ProgressMonitor::new(ProgressState::default(), Vec::new())
    }

    #[test]
    fn test_identical_lines_parsed_once() {
        let mut monitor = monitor();
        monitor
            .consume((0..5).map(|_| stderr(PROGRESS)))
            .unwrap();

        let stats = monitor.stats();
        assert_eq!(stats.lines_received, 5);
        assert_eq!(stats.duplicates_skipped, 4);
        assert_eq!(stats.progress_updates, 1);
        assert_eq!(monitor.sink().len(), 1);
        assert_eq!(monitor.recent().len(), 1);
    }

    #[test]
    fn test_dedup_spans_streams() {
        let mut monitor = monitor();
        monitor
            .consume(vec![
                Ok(TaggedLine::new(StreamTag::Stdout, b"same".to_vec())),
                Ok(TaggedLine::new(StreamTag::Stderr, b"same".to_vec())),
                stderr(b"other"),
                stderr(b"same"),
            ])
            .unwrap();

        assert_eq!(monitor.stats().duplicates_skipped, 1);
        assert_eq!(monitor.recent().to_vec(), vec!["same", "other", "same"]);
    }

    #[test]
    fn test_recent_window_evicts_oldest() {
        let mut monitor = monitor();
        monitor
            .consume((0..8).map(|i| stderr(format!("line {}", i).as_bytes())))
            .unwrap();

        assert_eq!(
            monitor.recent().to_vec(),
            vec!["line 3", "line 4", "line 5", "line 6", "line 7"]
        );
        assert!(monitor.sink().is_empty());
    }

    #[test]
    fn test_failure_record_carries_recent_lines() {
        let mut monitor = monitor();
        monitor
            .consume(vec![stderr(b"a"), stderr(b"b"), stderr(b"c"), stderr(b"d")])
            .unwrap();

        assert_eq!(
            monitor.failure(1),
            Record::failure(1, vec!["a".into(), "b".into(), "c".into(), "d".into()])
        );
    }

    #[test]
    fn test_progress_record_merges_media() {
        let media = MediaInfo {
            frames: Some(FrameCount::Counted(250)),
            frame_rate: Some([25, 1]),
            duration: Some(10.0),
        };
        let mut monitor = ProgressMonitor::new(ProgressState::new(media, 60.0), Vec::new());
        monitor.consume(vec![stderr(b"banner"), stderr(PROGRESS)]).unwrap();

        let records = monitor.into_sink();
        assert_eq!(records.len(), 1);
        let json = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(json["nf"], 250);
        assert_eq!(json["r"], serde_json::json!([25, 1]));
        assert_eq!(json["d"], 10.0);
        assert_eq!(json["nft"], 600);
        assert_eq!(json["f"], 10);
        assert_eq!(json["spd"], "1.0x");
    }

    #[test]
    fn test_consume_stops_on_error() {
        let mut monitor = monitor();
        let result = monitor.consume(vec![
            stderr(b"first"),
            Err(InterpError::ConfigError {
                message: "boom".to_string(),
            }),
            stderr(b"never"),
        ]);

        assert!(result.is_err());
        assert_eq!(monitor.recent().to_vec(), vec!["first"]);
    }

    #[test]
    fn test_recent_lines_zero_capacity() {
        let mut recent = RecentLines::new(0);
        recent.push("x".to_string());
        assert!(recent.is_empty());
    }
}
