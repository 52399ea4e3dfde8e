//! Live following of a child process' stdout and stderr
//!
//! A [`ProcessFollower`] yields [`TaggedLine`]s from both pipes in arrival
//! order. Per-stream order is always preserved; the interleaving between the
//! two streams follows OS delivery and is not deterministic.
//!
//! Three backends implement the same contract and are picked per platform:
//!
//! - readiness polling with `poll(2)` (unix),
//! - an edge-triggered `kqueue` that also watches for process exit
//!   (macOS, FreeBSD),
//! - one blocking reader thread per stream feeding a channel (portable).
//!
//! All backends close a stream on end-of-file or read error without touching
//! the other one. The session ends once both streams are closed or, for the
//! notification backends, once the child has exited. Exit triggers one last
//! non-blocking drain of both pipes; bytes the child had not yet flushed at
//! that point may be lost.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::process::{Child, ExitStatus};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{InterpError, InterpResult};

pub mod line;
#[cfg(unix)]
mod pipe;
#[cfg(unix)]
mod poll;
#[cfg(any(target_os = "macos", target_os = "freebsd"))]
mod kqueue;
mod threaded;

pub use line::{find_line, LineAssembler};

/// Which of the two child pipes a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamTag {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamTag::Stdout => write!(f, "stdout"),
            StreamTag::Stderr => write!(f, "stderr"),
        }
    }
}

/// One line of child output with its terminator stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedLine {
    pub tag: StreamTag,
    pub line: Vec<u8>,
}

impl TaggedLine {
    /// Create a tagged line
    pub fn new(tag: StreamTag, line: Vec<u8>) -> Self {
        Self { tag, line }
    }

    /// Lossy UTF-8 view of the line
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.line).into_owned()
    }
}

/// Process handle as seen by the follower and its consumer
pub trait ChildHandle {
    /// OS process id
    fn id(&self) -> u32;

    /// Exit status if the process has already exited, without blocking
    fn try_exit(&mut self) -> io::Result<Option<ExitStatus>>;

    /// Block until the process exits
    fn wait(&mut self) -> io::Result<ExitStatus>;

    /// Ask the process to terminate. Does nothing if it already exited.
    fn terminate(&mut self) -> io::Result<()>;
}

impl ChildHandle for Child {
    fn id(&self) -> u32 {
        Child::id(self)
    }

    fn try_exit(&mut self) -> io::Result<Option<ExitStatus>> {
        self.try_wait()
    }

    fn wait(&mut self) -> io::Result<ExitStatus> {
        Child::wait(self)
    }

    fn terminate(&mut self) -> io::Result<()> {
        // A reaped pid may already belong to someone else
        if self.try_wait()?.is_some() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            match kill(Pid::from_raw(Child::id(self) as i32), Signal::SIGTERM) {
                Ok(()) | Err(Errno::ESRCH) => Ok(()),
                Err(e) => Err(e.into()),
            }
        }

        #[cfg(not(unix))]
        {
            self.kill()
        }
    }
}

/// Notification backend used to follow the pipes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FollowStrategy {
    /// Best backend for the current platform
    #[default]
    Auto,
    /// Level-triggered readiness polling
    Readiness,
    /// Edge-triggered event queue with process exit notification
    EdgeTriggered,
    /// One blocking reader thread per stream
    Threaded,
}

impl FollowStrategy {
    /// Backend `Auto` resolves to on this platform
    pub fn platform_default() -> Self {
        if cfg!(any(target_os = "macos", target_os = "freebsd")) {
            FollowStrategy::EdgeTriggered
        } else if cfg!(unix) {
            FollowStrategy::Readiness
        } else {
            FollowStrategy::Threaded
        }
    }

    /// Replace `Auto` with the platform default
    pub fn resolve(self) -> Self {
        match self {
            FollowStrategy::Auto => Self::platform_default(),
            other => other,
        }
    }

    /// Whether this backend can run on the current platform
    pub fn is_supported(self) -> bool {
        match self.resolve() {
            FollowStrategy::Readiness => cfg!(unix),
            FollowStrategy::EdgeTriggered => cfg!(any(target_os = "macos", target_os = "freebsd")),
            _ => true,
        }
    }
}

impl fmt::Display for FollowStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FollowStrategy::Auto => "auto",
            FollowStrategy::Readiness => "readiness",
            FollowStrategy::EdgeTriggered => "edge-triggered",
            FollowStrategy::Threaded => "threaded",
        };
        f.write_str(name)
    }
}

/// Follower tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowOptions {
    /// Backend selection
    pub strategy: FollowStrategy,
    /// Upper bound on one readiness wait, so child exit is noticed promptly
    pub poll_interval: Duration,
}

impl Default for FollowOptions {
    fn default() -> Self {
        Self {
            strategy: FollowStrategy::Auto,
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Iterator over the tagged output lines of one child process
///
/// Must be iterated by a single consumer, once. Dropping it before the end
/// closes the pipes; the consumer stays responsible for reaping the child.
pub struct ProcessFollower<'a> {
    strategy: FollowStrategy,
    inner: Box<dyn Iterator<Item = InterpResult<TaggedLine>> + 'a>,
}

impl<'a> ProcessFollower<'a> {
    /// Follow a spawned child, taking ownership of its stdout and stderr pipes
    pub fn for_child(child: &'a mut Child, options: &FollowOptions) -> InterpResult<Self> {
        let (stdout, stderr) = take_pipes(child)?;
        Self::new(child, stdout, stderr, options)
    }

    /// Follow the given pipe read ends of a process
    pub fn new<P>(
        child: &'a mut P,
        stdout: File,
        stderr: File,
        options: &FollowOptions,
    ) -> InterpResult<Self>
    where
        P: ChildHandle + 'a,
    {
        let strategy = options.strategy.resolve();
        if !strategy.is_supported() {
            return Err(InterpError::UnsupportedStrategy { strategy });
        }
        debug!(pid = child.id(), %strategy, "following child output");

        let inner: Box<dyn Iterator<Item = InterpResult<TaggedLine>> + 'a> = match strategy {
            #[cfg(unix)]
            FollowStrategy::Readiness => Box::new(poll::PollFollower::new(
                child,
                stdout,
                stderr,
                options.poll_interval,
            )?),
            #[cfg(any(target_os = "macos", target_os = "freebsd"))]
            FollowStrategy::EdgeTriggered => {
                Box::new(kqueue::KqueueFollower::new(child, stdout, stderr)?)
            }
            FollowStrategy::Threaded => Box::new(threaded::ThreadedFollower::spawn(stdout, stderr)?),
            other => return Err(InterpError::UnsupportedStrategy { strategy: other }),
        };

        Ok(Self { strategy, inner })
    }

    /// Follow two arbitrary readers with the thread-per-stream backend
    pub fn threaded<R>(stdout: R, stderr: R) -> InterpResult<Self>
    where
        R: Read + Send + 'static,
    {
        Ok(Self {
            strategy: FollowStrategy::Threaded,
            inner: Box::new(threaded::ThreadedFollower::spawn(stdout, stderr)?),
        })
    }

    /// Backend in use
    pub fn strategy(&self) -> FollowStrategy {
        self.strategy
    }
}

impl Iterator for ProcessFollower<'_> {
    type Item = InterpResult<TaggedLine>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Take the stdout and stderr read ends out of a spawned child
pub fn take_pipes(child: &mut Child) -> InterpResult<(File, File)> {
    let stdout = child.stdout.take().ok_or(InterpError::MissingPipe {
        stream: StreamTag::Stdout,
    })?;
    let stderr = child.stderr.take().ok_or(InterpError::MissingPipe {
        stream: StreamTag::Stderr,
    })?;

    Ok((pipe_file(stdout), pipe_file(stderr)))
}

#[cfg(unix)]
fn pipe_file<T: Into<std::os::fd::OwnedFd>>(pipe: T) -> File {
    File::from(pipe.into())
}

#[cfg(windows)]
fn pipe_file<T: Into<std::os::windows::io::OwnedHandle>>(pipe: T) -> File {
    File::from(pipe.into())
}
