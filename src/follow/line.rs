//! CR/LF tolerant line splitting
//!
//! `\n`, `\r` and `\r\n` all terminate a line. Tools that redraw a status
//! line in place (ffmpeg, vspipe) end it with a bare `\r`, so a bare `\r`
//! must never wait for a following `\n` before the line is delivered.

/// Terminator that ended an extracted line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    Lf,
    Cr,
    CrLf,
}

/// Extract the next complete line from `buf`.
///
/// Returns `None` and leaves `buf` untouched when it holds no terminator.
/// Otherwise the line (without its terminator) is removed from the front of
/// the buffer and any trailing partial line stays behind.
pub fn find_line(buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    split_line(buf).map(|(line, _)| line)
}

/// Same as [`find_line`], also reporting which terminator was consumed.
pub fn split_line(buf: &mut Vec<u8>) -> Option<(Vec<u8>, Terminator)> {
    let end = buf.iter().position(|&b| b == b'\r' || b == b'\n')?;
    let terminator = match (buf[end], buf.get(end + 1)) {
        (b'\n', _) => Terminator::Lf,
        (_, Some(b'\n')) => Terminator::CrLf,
        _ => Terminator::Cr,
    };
    let consumed = if terminator == Terminator::CrLf { 2 } else { 1 };

    let rest = buf.split_off(end + consumed);
    buf.truncate(end);
    Some((std::mem::replace(buf, rest), terminator))
}

/// Split a complete byte blob into lines, keeping a final unterminated segment.
pub fn split_lines(data: &[u8]) -> Vec<Vec<u8>> {
    let mut assembler = LineAssembler::new();
    assembler.push(data);
    let mut lines: Vec<Vec<u8>> = assembler.by_ref().collect();
    lines.extend(assembler.finish());
    lines
}

/// Per-stream line assembler fed with bytes as they arrive
///
/// Remembers a `\r` that ended the previous chunk so that a `\n` arriving
/// in the next chunk is swallowed instead of producing an empty line.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: Vec<u8>,
    pending_cr: bool,
}

impl LineAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Append newly read bytes
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Extract the next complete line, if any
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        if self.pending_cr && !self.buf.is_empty() {
            self.pending_cr = false;
            if self.buf[0] == b'\n' {
                self.buf.remove(0);
            }
        }

        let (line, terminator) = split_line(&mut self.buf)?;
        if terminator == Terminator::Cr && self.buf.is_empty() {
            self.pending_cr = true;
        }
        Some(line)
    }

    /// Bytes buffered after the last complete line
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Take the trailing partial line at end of stream, if it is non-empty
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        self.pending_cr = false;
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }
}

impl Iterator for LineAssembler {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(buf: &mut Vec<u8>) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        while let Some(line) = find_line(buf) {
            lines.push(line);
        }
        lines
    }

    /// Reference split: cut on `\r\n`, `\r` or `\n`, last segment is the remainder.
    fn reference_split(data: &[u8]) -> (Vec<Vec<u8>>, Vec<u8>) {
        let mut lines = Vec::new();
        let mut current = Vec::new();
        let mut i = 0;
        while i < data.len() {
            match data[i] {
                b'\r' => {
                    lines.push(std::mem::take(&mut current));
                    if data.get(i + 1) == Some(&b'\n') {
                        i += 1;
                    }
                }
                b'\n' => lines.push(std::mem::take(&mut current)),
                b => current.push(b),
            }
            i += 1;
        }
        (lines, current)
    }

    #[test]
    fn test_find_line_no_terminator() {
        let mut buf = b"partial".to_vec();
        assert_eq!(find_line(&mut buf), None);
        assert_eq!(buf, b"partial");
    }

    #[test]
    fn test_find_line_terminators() {
        let mut buf = b"a\nb\rc\r\nd".to_vec();
        assert_eq!(find_line(&mut buf), Some(b"a".to_vec()));
        assert_eq!(find_line(&mut buf), Some(b"b".to_vec()));
        assert_eq!(find_line(&mut buf), Some(b"c".to_vec()));
        assert_eq!(find_line(&mut buf), None);
        assert_eq!(buf, b"d");
    }

    #[test]
    fn test_find_line_lf_before_cr() {
        let mut buf = b"x\n\ry".to_vec();
        assert_eq!(split_line(&mut buf), Some((b"x".to_vec(), Terminator::Lf)));
        assert_eq!(split_line(&mut buf), Some((Vec::new(), Terminator::Cr)));
        assert_eq!(buf, b"y");
    }

    #[test]
    fn test_find_line_matches_reference_split() {
        // Every sequence of length <= 6 over an alphabet mixing text and terminators
        let alphabet = [b'a', b'\r', b'\n', b'z'];
        for len in 0..=6u32 {
            for code in 0..alphabet.len().pow(len) {
                let mut data = Vec::new();
                let mut c = code;
                for _ in 0..len {
                    data.push(alphabet[c % alphabet.len()]);
                    c /= alphabet.len();
                }

                let (expected, remainder) = reference_split(&data);
                let mut buf = data.clone();
                let lines = drain(&mut buf);
                assert_eq!(lines, expected, "input {:?}", data);
                assert_eq!(buf, remainder, "input {:?}", data);
                assert!(lines
                    .iter()
                    .all(|l| !l.contains(&b'\r') && !l.contains(&b'\n')));
            }
        }
    }

    #[test]
    fn test_assembler_crlf_split_across_reads() {
        let mut assembler = LineAssembler::new();
        assembler.push(b"frame=1\r");
        assert_eq!(assembler.next_line(), Some(b"frame=1".to_vec()));
        assert_eq!(assembler.next_line(), None);

        assembler.push(b"\nframe=2\r");
        assert_eq!(assembler.next_line(), Some(b"frame=2".to_vec()));
        assert_eq!(assembler.next_line(), None);
        assert!(assembler.pending().is_empty());
    }

    #[test]
    fn test_assembler_byte_at_a_time() {
        let mut assembler = LineAssembler::new();
        let mut lines = Vec::new();
        for &b in b"hello\r\nworld\n\rnext\r" {
            assembler.push(&[b]);
            lines.extend(assembler.by_ref());
        }
        assert_eq!(
            lines,
            vec![b"hello".to_vec(), b"world".to_vec(), Vec::new(), b"next".to_vec()]
        );
    }

    #[test]
    fn test_assembler_finish_returns_partial() {
        let mut assembler = LineAssembler::new();
        assembler.push(b"done\ntail");
        assert_eq!(assembler.next_line(), Some(b"done".to_vec()));
        assert_eq!(assembler.finish(), Some(b"tail".to_vec()));
        assert_eq!(assembler.finish(), None);
    }

    #[test]
    fn test_split_lines() {
        let lines = split_lines(b"duration=1.5\r\nr_frame_rate=24/1\nnb_frames=36");
        assert_eq!(
            lines,
            vec![
                b"duration=1.5".to_vec(),
                b"r_frame_rate=24/1".to_vec(),
                b"nb_frames=36".to_vec()
            ]
        );
    }
}
