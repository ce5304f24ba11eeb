//! Boundaries to the outside world: where reports come from and where track
//! rows go.

use crate::{error::BoxError, report::DetectionReport, snapshot::TrackRow};
use std::collections::VecDeque;

/// Reports are fetched a page per call; each page goes through a whole
/// alignment/association round. An empty page ends the cycle.
pub trait ReportSource {
    fn next_batch(&mut self) -> Result<Vec<DetectionReport>, BoxError>;
}

/// Receives one row per live track at the end of every cycle.
pub trait TrackSink {
    fn store(&mut self, rows: &[TrackRow]) -> Result<(), BoxError>;
}

pub const DEFAULT_PACKET_SIZE: usize = 20;

/// In-memory source handing out queued reports in sensor-time order, one
/// packet at a time.
#[derive(Clone, Debug)]
pub struct PagedReportSource {
    queue: VecDeque<DetectionReport>,
    packet_size: usize,
}

impl PagedReportSource {
    pub fn new(packet_size: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            packet_size: packet_size.max(1),
        }
    }

    /// Queue reports; the whole queue is kept sorted by sensor time.
    pub fn push(&mut self, reports: impl IntoIterator<Item = DetectionReport>) {
        self.queue.extend(reports);
        self.queue.make_contiguous().sort();
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Default for PagedReportSource {
    fn default() -> Self {
        Self::new(DEFAULT_PACKET_SIZE)
    }
}

impl FromIterator<DetectionReport> for PagedReportSource {
    fn from_iter<I: IntoIterator<Item = DetectionReport>>(iter: I) -> Self {
        let mut src = Self::default();
        src.push(iter);
        src
    }
}

impl ReportSource for PagedReportSource {
    fn next_batch(&mut self) -> Result<Vec<DetectionReport>, BoxError> {
        let n = self.packet_size.min(self.queue.len());
        Ok(self.queue.drain(..n).collect())
    }
}

/// Sink keeping every stored row batch, one entry per cycle.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    pub cycles: Vec<Vec<TrackRow>>,
}

impl TrackSink for MemorySink {
    fn store(&mut self, rows: &[TrackRow]) -> Result<(), BoxError> {
        self.cycles.push(rows.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SensorId;

    #[test]
    fn pages_in_time_order() {
        let mut src: PagedReportSource = (0..45u64)
            .rev()
            .map(|i| DetectionReport::new(i, SensorId(1), 0.0, 0.0, 0.0, i as f64))
            .collect();
        let first = src.next_batch().unwrap();
        assert_eq!(first.len(), 20);
        assert_eq!(first[0].dr_id, 0);
        assert_eq!(src.next_batch().unwrap().len(), 20);
        assert_eq!(src.next_batch().unwrap().len(), 5);
        assert!(src.next_batch().unwrap().is_empty());
        assert_eq!(src.pending(), 0);
    }

    #[test]
    fn memory_sink_records_cycles() {
        let mut sink = MemorySink::default();
        sink.store(&[]).unwrap();
        assert_eq!(sink.cycles.len(), 1);
    }
}
