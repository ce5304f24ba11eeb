//! Candidate grouping: partition one aligned group into sub-groups of reports
//! that could plausibly come from overlapping sensor coverage.
//!
//! Sensors whose coverage spheres intersect are neighbours. Neighbourhoods are
//! the connected components of that relation, found with union-find over the
//! sensor directory once at construction.

use crate::report::ReportGroup;
use crate::types::SensorId;
use sensor_models::SensorDirectory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How an aligned group is split before association.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingMode {
    /// Whole aligned group is one candidate group
    #[default]
    Single,
    /// One candidate group per sensor neighbourhood
    SensorNeighborhood,
}

// ---------------------------------------------------------------------------
// Union-Find (path halving + union by rank)
// ---------------------------------------------------------------------------

struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, x: usize, y: usize) {
        let rx = self.find(x);
        let ry = self.find(y);
        if rx == ry {
            return;
        }
        match self.rank[rx].cmp(&self.rank[ry]) {
            std::cmp::Ordering::Less => self.parent[rx] = ry,
            std::cmp::Ordering::Greater => self.parent[ry] = rx,
            std::cmp::Ordering::Equal => {
                self.parent[ry] = rx;
                self.rank[rx] += 1;
            }
        }
    }
}

/// Sub-group key. Known neighbourhoods sort before unknown sensors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum GroupKey {
    Neighborhood(usize),
    Unregistered(SensorId),
}

#[derive(Clone, Debug)]
pub struct CandidateSelector {
    mode: GroupingMode,
    /// Sensor → neighbourhood index (dense, ordered by lowest sensor id)
    neighborhood: BTreeMap<SensorId, usize>,
}

impl CandidateSelector {
    pub fn new(mode: GroupingMode, sensors: &SensorDirectory) -> Self {
        let neighborhood = match mode {
            GroupingMode::Single => BTreeMap::new(),
            GroupingMode::SensorNeighborhood => neighborhoods(sensors),
        };
        Self { mode, neighborhood }
    }

    pub fn mode(&self) -> GroupingMode {
        self.mode
    }

    /// Number of sensor neighbourhoods (0 in `Single` mode).
    pub fn neighborhood_count(&self) -> usize {
        self.neighborhood
            .values()
            .max()
            .map_or(0, |&max| max + 1)
    }

    /// Split an aligned group. Every report lands in exactly one sub-group;
    /// an empty input gives no sub-groups.
    pub fn select(&self, group: ReportGroup) -> Vec<ReportGroup> {
        if group.is_empty() {
            return Vec::new();
        }
        match self.mode {
            GroupingMode::Single => vec![group],
            GroupingMode::SensorNeighborhood => {
                let mut parts: BTreeMap<GroupKey, ReportGroup> = BTreeMap::new();
                for dr in group {
                    let key = match self.neighborhood.get(&dr.sensor_id) {
                        Some(&n) => GroupKey::Neighborhood(n),
                        None => GroupKey::Unregistered(dr.sensor_id),
                    };
                    parts.entry(key).or_default().insert(dr);
                }
                parts.into_values().collect()
            }
        }
    }
}

fn neighborhoods(sensors: &SensorDirectory) -> BTreeMap<SensorId, usize> {
    let list: Vec<_> = sensors.sensors().collect();
    let mut uf = UnionFind::new(list.len());
    for i in 0..list.len() {
        for j in (i + 1)..list.len() {
            if list[i].overlaps(list[j]) {
                uf.union(i, j);
            }
        }
    }

    // Sensors come out in id order, so numbering roots on first sight is
    // stable across runs.
    let mut root_index: BTreeMap<usize, usize> = BTreeMap::new();
    let mut out = BTreeMap::new();
    for (i, sensor) in list.iter().enumerate() {
        let root = uf.find(i);
        let next = root_index.len();
        let idx = *root_index.entry(root).or_insert(next);
        out.insert(sensor.id, idx);
    }
    out
}
