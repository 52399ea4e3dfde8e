//! Record sinks

use std::io::Write;

use tracing::trace;

use crate::error::InterpResult;
use crate::output::Record;

/// Destination for emitted records
pub trait RecordSink {
    /// Emit one record
    fn emit(&mut self, record: &Record) -> InterpResult<()>;
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn emit(&mut self, record: &Record) -> InterpResult<()> {
        (**self).emit(record)
    }
}

/// Collects records in memory
impl RecordSink for Vec<Record> {
    fn emit(&mut self, record: &Record) -> InterpResult<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// Writes each record as one compact JSON line and flushes it
pub struct JsonLineWriter<W: Write> {
    out: W,
}

impl<W: Write> JsonLineWriter<W> {
    /// Create a new writer
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl JsonLineWriter<std::io::Stdout> {
    /// Writer on the process stdout
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> RecordSink for JsonLineWriter<W> {
    fn emit(&mut self, record: &Record) -> InterpResult<()> {
        let line = serde_json::to_string(record)?;
        trace!(record = %line, "emit");
        writeln!(self.out, "{}", line)?;
        // Consumers read progress live
        self.out.flush()?;
        Ok(())
    }
}
