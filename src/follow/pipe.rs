//! Non-blocking pipe read ends shared by the notification backends

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use tracing::{trace, warn};

use super::line::LineAssembler;
use super::{StreamTag, TaggedLine};

const READ_CHUNK: usize = 8192;

/// Switch a descriptor to non-blocking mode
pub(super) fn set_nonblocking(file: &File) -> io::Result<()> {
    let fd = file.as_raw_fd();
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

/// One followed pipe: its read end and the bytes not yet split into lines
pub(super) struct PipeStream {
    tag: StreamTag,
    file: Option<File>,
    assembler: LineAssembler,
}

impl PipeStream {
    /// Wrap a pipe read end, switching it to non-blocking mode
    pub(super) fn new(tag: StreamTag, file: File) -> io::Result<Self> {
        set_nonblocking(&file)?;
        Ok(Self {
            tag,
            file: Some(file),
            assembler: LineAssembler::new(),
        })
    }

    pub(super) fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub(super) fn as_fd(&self) -> Option<BorrowedFd<'_>> {
        self.file.as_ref().map(|f| f.as_fd())
    }

    #[cfg(any(target_os = "macos", target_os = "freebsd"))]
    pub(super) fn raw_fd(&self) -> Option<std::os::fd::RawFd> {
        self.file.as_ref().map(|f| f.as_raw_fd())
    }

    /// Read everything available right now and queue the complete lines.
    ///
    /// End-of-file and read errors close the stream.
    pub(super) fn drain(&mut self, out: &mut VecDeque<TaggedLine>) {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let result = match self.file.as_mut() {
                Some(file) => file.read(&mut chunk),
                None => return,
            };

            match result {
                Ok(0) => {
                    trace!(stream = %self.tag, "end of stream");
                    self.close(out);
                    return;
                }
                Ok(n) => {
                    self.assembler.push(&chunk[..n]);
                    self.collect(out);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(stream = %self.tag, error = %e, "read failed, closing stream");
                    self.close(out);
                    return;
                }
            }
        }
    }

    /// Close the read end, delivering a trailing partial line
    pub(super) fn close(&mut self, out: &mut VecDeque<TaggedLine>) {
        if self.file.take().is_none() {
            return;
        }
        self.collect(out);
        if let Some(rest) = self.assembler.finish() {
            out.push_back(TaggedLine::new(self.tag, rest));
        }
    }

    /// Close the read end and drop anything buffered
    pub(super) fn discard(&mut self) {
        self.file = None;
        self.assembler = LineAssembler::new();
    }

    fn collect(&mut self, out: &mut VecDeque<TaggedLine>) {
        while let Some(line) = self.assembler.next_line() {
            out.push_back(TaggedLine::new(self.tag, line));
        }
    }
}
