//! Portable backend: one blocking reader thread per stream
//!
//! Readers do single-byte reads so a line is handed over as soon as its
//! terminator arrives, and send it down a shared channel. Each reader ends
//! with a close message; the consumer stops after seeing both.

use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use super::line::LineAssembler;
use super::{StreamTag, TaggedLine};
use crate::error::{InterpError, InterpResult};

enum Message {
    Line(TaggedLine),
    Closed(StreamTag),
}

pub(super) struct ThreadedFollower {
    rx: Receiver<Message>,
    open: usize,
    readers: Vec<JoinHandle<()>>,
}

impl ThreadedFollower {
    pub(super) fn spawn<R>(stdout: R, stderr: R) -> InterpResult<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let readers = vec![
            spawn_reader(StreamTag::Stdout, stdout, tx.clone())?,
            spawn_reader(StreamTag::Stderr, stderr, tx)?,
        ];

        Ok(Self {
            rx,
            open: readers.len(),
            readers,
        })
    }

    fn join_readers(&mut self) {
        for reader in self.readers.drain(..) {
            if reader.join().is_err() {
                warn!("pipe reader thread panicked");
            }
        }
    }
}

impl Iterator for ThreadedFollower {
    type Item = InterpResult<TaggedLine>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.open > 0 {
            match self.rx.recv() {
                Ok(Message::Line(line)) => return Some(Ok(line)),
                Ok(Message::Closed(tag)) => {
                    trace!(stream = %tag, "reader finished");
                    self.open -= 1;
                }
                // Every sender is gone, so both readers have exited
                Err(_) => self.open = 0,
            }
        }

        // Readers own the pipe ends; joining them closes both
        if !self.readers.is_empty() {
            self.join_readers();
            debug!("both streams closed");
        }
        None
    }
}

fn spawn_reader<R>(tag: StreamTag, source: R, tx: Sender<Message>) -> InterpResult<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("follow-{}", tag))
        .spawn(move || read_lines(tag, source, &tx))
        .map_err(InterpError::NotificationSetup)
}

fn read_lines<R: Read>(tag: StreamTag, mut source: R, tx: &Sender<Message>) {
    let mut assembler = LineAssembler::new();
    let mut byte = [0u8; 1];

    loop {
        match source.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {
                assembler.push(&byte);
                while let Some(line) = assembler.next_line() {
                    if tx.send(Message::Line(TaggedLine::new(tag, line))).is_err() {
                        // Consumer gave up
                        return;
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(stream = %tag, error = %e, "read failed, closing stream");
                break;
            }
        }
    }

    if let Some(rest) = assembler.finish() {
        let _ = tx.send(Message::Line(TaggedLine::new(tag, rest)));
    }
    let _ = tx.send(Message::Closed(tag));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn lines_for(lines: &[TaggedLine], tag: StreamTag) -> Vec<String> {
        lines.iter().filter(|l| l.tag == tag).map(|l| l.text()).collect()
    }

    #[test]
    fn test_threaded_per_stream_order() {
        let stdout = Cursor::new(b"hello\r\nworld\n".to_vec());
        let stderr = Cursor::new(b"err1\r".to_vec());

        let follower = ThreadedFollower::spawn(stdout, stderr).unwrap();
        let lines: Vec<TaggedLine> = follower.map(|l| l.unwrap()).collect();

        assert_eq!(lines_for(&lines, StreamTag::Stdout), vec!["hello", "world"]);
        assert_eq!(lines_for(&lines, StreamTag::Stderr), vec!["err1"]);
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_threaded_flushes_trailing_partial() {
        let stdout = Cursor::new(b"one\ntwo".to_vec());
        let stderr = Cursor::new(Vec::new());

        let follower = ThreadedFollower::spawn(stdout, stderr).unwrap();
        let lines: Vec<TaggedLine> = follower.map(|l| l.unwrap()).collect();

        assert_eq!(lines_for(&lines, StreamTag::Stdout), vec!["one", "two"]);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    #[test]
    fn test_threaded_read_error_keeps_sibling() {
        let stdout: Box<dyn Read + Send> = Box::new(FailingReader);
        let stderr: Box<dyn Read + Send> = Box::new(Cursor::new(b"a\nb\n".to_vec()));

        let follower = ThreadedFollower::spawn(stdout, stderr).unwrap();
        let lines: Vec<TaggedLine> = follower.map(|l| l.unwrap()).collect();

        assert_eq!(lines_for(&lines, StreamTag::Stderr), vec!["a", "b"]);
        assert!(lines_for(&lines, StreamTag::Stdout).is_empty());
    }
}
