//! Fusion: apply associated reports to their tracks as filter corrections.

use crate::{error::FilterError, track::Track, track_manager::Associations};
use tracing::warn;

/// Apply every report of `associations` to its track, in report order.
/// Returns the number of reports applied. Ids with no live track are skipped.
pub fn fuse_reports(tracks: &mut [Track], associations: &Associations) -> Result<usize, FilterError> {
    let mut applied = 0;
    for (id, reports) in associations {
        if reports.is_empty() {
            continue;
        }
        let Some(track) = tracks.iter_mut().find(|t| t.id == *id) else {
            warn!(track = %id, "association refers to an unknown track");
            continue;
        };
        for dr in reports {
            track.apply_measurement(dr)?;
            applied += 1;
        }
    }
    Ok(applied)
}
