//! Bitrate ladder planning.
//!
//! Pure arithmetic over a probe result and a reference table: pick the
//! lowest `max_rungs` heights and derive an aspect-preserving, even width
//! for each. Bitrate ceilings come straight from the table.

use vf_core::config::{RungConfig, DEFAULT_LADDER};
use vf_core::{MediaProbe, PlannerError, RenditionSpec};

/// Compute the ladder for `probe` from `table`.
///
/// The table is sorted ascending by height (duplicates and zero heights
/// dropped) and the first `max_rungs` entries are used. Requests for more
/// rungs than the table holds yield the whole table. Rungs taller than the
/// source are kept.
///
/// # Errors
///
/// - [`PlannerError::InvalidSourceDimensions`] if either source dimension is 0.
/// - [`PlannerError::EmptyLadder`] if `max_rungs` is 0 or the table has no
///   usable rungs.
pub fn plan_ladder(
    probe: &MediaProbe,
    table: &[RungConfig],
    max_rungs: usize,
) -> Result<Vec<RenditionSpec>, PlannerError> {
    if probe.width == 0 || probe.height == 0 {
        return Err(PlannerError::InvalidSourceDimensions {
            width: probe.width,
            height: probe.height,
        });
    }

    let mut rungs: Vec<RungConfig> = table.iter().filter(|r| r.height > 0).copied().collect();
    rungs.sort_by_key(|r| r.height);
    rungs.dedup_by_key(|r| r.height);

    if max_rungs == 0 || rungs.is_empty() {
        return Err(PlannerError::EmptyLadder);
    }

    Ok(rungs
        .into_iter()
        .take(max_rungs)
        .map(|rung| RenditionSpec {
            target_height: rung.height,
            computed_width: even_width(rung.height, probe.width, probe.height),
            max_bitrate_bps: rung.max_bitrate_bps,
        })
        .collect())
}

/// [`plan_ladder`] against the built-in 720p/1080p/1440p table.
pub fn plan_default_ladder(
    probe: &MediaProbe,
    max_rungs: usize,
) -> Result<Vec<RenditionSpec>, PlannerError> {
    plan_ladder(probe, &DEFAULT_LADDER, max_rungs)
}

/// `ceil(target_height * source_width / source_height)`, bumped to the next
/// even number. `source_height` must be non-zero.
pub fn even_width(target_height: u32, source_width: u32, source_height: u32) -> u32 {
    let raw = (u64::from(target_height) * u64::from(source_width)).div_ceil(u64::from(source_height));
    let even = raw + (raw & 1);
    u32::try_from(even).unwrap_or(u32::MAX - 1)
}
