//! Readiness-polling backend built on `poll(2)`

use std::collections::VecDeque;
use std::fs::File;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tracing::debug;

use super::pipe::PipeStream;
use super::{ChildHandle, StreamTag, TaggedLine};
use crate::error::{InterpError, InterpResult};

pub(super) struct PollFollower<'a, P: ChildHandle> {
    child: &'a mut P,
    streams: [PipeStream; 2],
    pending: VecDeque<TaggedLine>,
    timeout_ms: u16,
    done: bool,
}

impl<'a, P: ChildHandle> PollFollower<'a, P> {
    pub(super) fn new(
        child: &'a mut P,
        stdout: File,
        stderr: File,
        interval: Duration,
    ) -> InterpResult<Self> {
        let streams = [
            PipeStream::new(StreamTag::Stdout, stdout).map_err(InterpError::NotificationSetup)?,
            PipeStream::new(StreamTag::Stderr, stderr).map_err(InterpError::NotificationSetup)?,
        ];
        let timeout_ms = u16::try_from(interval.as_millis())
            .unwrap_or(u16::MAX)
            .max(1);

        Ok(Self {
            child,
            streams,
            pending: VecDeque::new(),
            timeout_ms,
            done: false,
        })
    }

    /// One notification cycle: wait, drain ready pipes, check for exit
    fn step(&mut self) -> InterpResult<()> {
        let ready: Vec<usize> = {
            let mut fds = Vec::with_capacity(2);
            let mut slots = Vec::with_capacity(2);
            for (slot, stream) in self.streams.iter().enumerate() {
                if let Some(fd) = stream.as_fd() {
                    fds.push(PollFd::new(fd, PollFlags::POLLIN));
                    slots.push(slot);
                }
            }

            match poll(&mut fds, PollTimeout::from(self.timeout_ms)) {
                Ok(_) => {}
                Err(Errno::EINTR) => return Ok(()),
                Err(e) => return Err(InterpError::NotificationWait(e.into())),
            }

            let mut ready = Vec::with_capacity(fds.len());
            for (fd, slot) in fds.iter().zip(slots) {
                if fd.revents().is_some_and(|r| !r.is_empty()) {
                    ready.push(slot);
                }
            }
            ready
        };

        // Readable, hangup and error all resolve through read()
        for slot in ready {
            self.streams[slot].drain(&mut self.pending);
        }

        if self.streams.iter().all(|s| !s.is_open()) {
            debug!("both streams closed");
            self.done = true;
            return Ok(());
        }

        if let Some(status) = self.child.try_exit()? {
            debug!(%status, "child exited, final drain");
            self.finish();
        }
        Ok(())
    }

    fn finish(&mut self) {
        for stream in self.streams.iter_mut() {
            stream.drain(&mut self.pending);
            stream.close(&mut self.pending);
        }
        self.done = true;
    }

    fn abandon(&mut self) {
        for stream in self.streams.iter_mut() {
            stream.discard();
        }
        self.pending.clear();
        self.done = true;
    }
}

impl<P: ChildHandle> Iterator for PollFollower<'_, P> {
    type Item = InterpResult<TaggedLine>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Some(Ok(line));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.step() {
                self.abandon();
                return Some(Err(e));
            }
        }
    }
}
