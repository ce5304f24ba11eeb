//! `tracker_core`: multi-sensor detection-report tracking engine.
//!
//! # Module layout
//! - [`types`]: Fundamental types (IDs, state vectors, distances)
//! - [`feature`]: Colour / plate features and feature sets
//! - [`report`]: Detection reports and their total order
//! - [`alignment`]: Time alignment of report batches
//! - [`candidate`]: Sensor-neighbourhood candidate grouping
//! - [`comparator`]: Report-to-track and list rating policies
//! - [`kf`]: Kalman filter (predict / correct)
//! - [`track`]: Track state and lifecycle
//! - [`track_manager`]: Track initialisation clustering and TTL expiry
//! - [`association`]: Greedy data association
//! - [`fusion`]: Measurement fusion into tracks
//! - [`snapshot`]: Published snapshots and persistence rows
//! - [`source`]: Report source / track sink boundaries
//! - [`pipeline`]: Full tracking cycle orchestrator

pub mod alignment;
pub mod association;
pub mod candidate;
pub mod comparator;
pub mod error;
pub mod feature;
pub mod fusion;
pub mod kf;
pub mod pipeline;
pub mod report;
pub mod snapshot;
pub mod source;
pub mod track;
pub mod track_manager;
pub mod types;

pub use error::{BoxError, FilterError, TrackerError};
pub use feature::{Feature, FeatureSet};
pub use pipeline::{CycleOutput, CycleStats, Pipeline, TrackerConfig};
pub use report::{DetectionReport, ReportGroup};
pub use snapshot::{Snapshot, SnapshotBuffer, TrackRow};
pub use source::{MemorySink, PagedReportSource, ReportSource, TrackSink};
pub use track::Track;
pub use track_manager::Associations;
pub use types::{SensorId, StateCov, StateVec, TrackId};
