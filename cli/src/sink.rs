//! JSON-lines track sink: one object per track row, tagged with its cycle.

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracker_core::{BoxError, TrackRow, TrackSink};

#[derive(Serialize)]
struct Line<'a> {
    cycle: u64,
    #[serde(flatten)]
    row: &'a TrackRow,
}

pub struct JsonLinesSink<W: Write> {
    writer: W,
    cycle: u64,
}

impl JsonLinesSink<BufWriter<File>> {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, cycle: 0 }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TrackSink for JsonLinesSink<W> {
    fn store(&mut self, rows: &[TrackRow]) -> Result<(), BoxError> {
        self.cycle += 1;
        for row in rows {
            serde_json::to_writer(&mut self.writer, &Line { cycle: self.cycle, row })?;
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Sink for runs without `--output`.
#[derive(Default)]
pub struct NullSink;

impl TrackSink for NullSink {
    fn store(&mut self, _rows: &[TrackRow]) -> Result<(), BoxError> {
        Ok(())
    }
}
