//! Temporal alignment: split an unordered batch of reports into groups whose
//! sensor times lie within `dt` of the group's earliest report.

use crate::report::{DetectionReport, ReportGroup};

#[derive(Clone, Debug)]
pub struct Alignment {
    dt: f64,
    pending: ReportGroup,
}

impl Alignment {
    pub fn new(dt: f64) -> Self {
        Self {
            dt,
            pending: ReportGroup::new(),
        }
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Add reports to the working set.
    pub fn load(&mut self, reports: impl IntoIterator<Item = DetectionReport>) {
        self.pending.extend(reports);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Reports not yet handed out.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Drop every pending report.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Consume and return the next aligned group.
    ///
    /// The earliest pending report anchors the group; the sweep takes reports
    /// while `sensor_time - anchor <= dt` and stops at the first one past it.
    /// An exhausted working set yields an empty group.
    pub fn next_group(&mut self) -> ReportGroup {
        let mut group = ReportGroup::new();
        let Some(anchor) = self.pending.pop_first() else {
            return group;
        };
        let anchor_time = anchor.sensor_time;
        group.insert(anchor);
        while let Some(next) = self.pending.first() {
            if next.sensor_time - anchor_time > self.dt {
                break;
            }
            if let Some(dr) = self.pending.pop_first() {
                group.insert(dr);
            }
        }
        group
    }
}
