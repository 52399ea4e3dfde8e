//! Edge-triggered backend built on `kqueue`
//!
//! Both pipes are registered with `EV_CLEAR`, so each wakeup must drain a
//! pipe until it would block. The child is watched through `EVFILT_PROC`
//! with `NOTE_EXIT`.

use std::collections::VecDeque;
use std::fs::File;

use nix::errno::Errno;
use nix::sys::event::{EventFilter, EventFlag, FilterFlag, KEvent, Kqueue};
use tracing::debug;

use super::pipe::PipeStream;
use super::{ChildHandle, StreamTag, TaggedLine};
use crate::error::{InterpError, InterpResult};

/// Pipes plus the process filter
const MAX_EVENTS: usize = 3;

pub(super) struct KqueueFollower<'a, P: ChildHandle> {
    child: &'a mut P,
    queue: Option<Kqueue>,
    streams: [PipeStream; 2],
    pending: VecDeque<TaggedLine>,
    exited_early: bool,
    done: bool,
}

impl<'a, P: ChildHandle> KqueueFollower<'a, P> {
    pub(super) fn new(child: &'a mut P, stdout: File, stderr: File) -> InterpResult<Self> {
        let streams = [
            PipeStream::new(StreamTag::Stdout, stdout).map_err(InterpError::NotificationSetup)?,
            PipeStream::new(StreamTag::Stderr, stderr).map_err(InterpError::NotificationSetup)?,
        ];
        let queue = Kqueue::new().map_err(|e| InterpError::NotificationSetup(e.into()))?;

        let reads: Vec<KEvent> = streams
            .iter()
            .filter_map(|s| s.raw_fd())
            .map(|fd| {
                KEvent::new(
                    fd as usize,
                    EventFilter::EVFILT_READ,
                    EventFlag::EV_ADD | EventFlag::EV_CLEAR,
                    FilterFlag::empty(),
                    0,
                    0,
                )
            })
            .collect();
        queue
            .kevent(&reads, &mut [], None)
            .map_err(|e| InterpError::NotificationSetup(e.into()))?;

        let exit = KEvent::new(
            child.id() as usize,
            EventFilter::EVFILT_PROC,
            EventFlag::EV_ADD | EventFlag::EV_ONESHOT,
            FilterFlag::NOTE_EXIT,
            0,
            0,
        );
        let exited_early = match queue.kevent(&[exit], &mut [], None) {
            Ok(_) => false,
            // Already gone before we could watch it
            Err(Errno::ESRCH) => true,
            Err(e) => return Err(InterpError::NotificationSetup(e.into())),
        };

        Ok(Self {
            child,
            queue: Some(queue),
            streams,
            pending: VecDeque::new(),
            exited_early,
            done: false,
        })
    }

    fn step(&mut self) -> InterpResult<()> {
        if self.exited_early {
            debug!(pid = self.child.id(), "child exited before registration");
            self.finish();
            return Ok(());
        }

        let Some(queue) = self.queue.as_ref() else {
            self.done = true;
            return Ok(());
        };

        let mut events = vec![
            KEvent::new(
                0,
                EventFilter::EVFILT_READ,
                EventFlag::empty(),
                FilterFlag::empty(),
                0,
                0
            );
            MAX_EVENTS
        ];
        let count = match queue.kevent(&[], &mut events, None) {
            Ok(count) => count,
            Err(Errno::EINTR) => return Ok(()),
            Err(e) => return Err(InterpError::NotificationWait(e.into())),
        };

        let mut exited = false;
        for event in &events[..count] {
            match event.filter() {
                Ok(EventFilter::EVFILT_PROC) => exited = true,
                Ok(EventFilter::EVFILT_READ) => {
                    let fd = event.ident() as std::os::fd::RawFd;
                    if let Some(stream) = self.streams.iter_mut().find(|s| s.raw_fd() == Some(fd)) {
                        stream.drain(&mut self.pending);
                    }
                }
                _ => {}
            }
        }

        if exited {
            debug!(pid = self.child.id(), "exit notification, final drain");
            self.finish();
        } else if self.streams.iter().all(|s| !s.is_open()) {
            debug!("both streams closed");
            self.release();
        }
        Ok(())
    }

    fn finish(&mut self) {
        for stream in self.streams.iter_mut() {
            stream.drain(&mut self.pending);
            stream.close(&mut self.pending);
        }
        self.release();
    }

    fn release(&mut self) {
        self.queue = None;
        self.done = true;
    }

    fn abandon(&mut self) {
        for stream in self.streams.iter_mut() {
            stream.discard();
        }
        self.pending.clear();
        self.release();
    }
}

impl<P: ChildHandle> Iterator for KqueueFollower<'_, P> {
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
