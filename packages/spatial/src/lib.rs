#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batched proximity matching between a "build" collection (parcels) and a
//! "probe" collection (activity features).
//!
//! Every probe batch gets its own R-tree over probe envelopes. Each build
//! record's boundary is matched to its nearest probe envelope; the pair is
//! kept when [`robust_distance`] is within the configured threshold, and
//! tagged with [`is_spatially_compatible`]. Batches run in parallel on the
//! rayon pool and fail independently.

pub mod boundary;

use std::borrow::Cow;
use std::ops::Range;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use geo::{BoundingRect as _, Geometry, Rect};
use parcel_fusion_geometry::{
    GeometryError, Reprojector, boundary as boundary_of, envelope, is_spatially_compatible,
    planar_distance, robust_distance,
};
use parcel_fusion_parallel::{batch_ranges, in_parallel, progress::ProgressCallback};
use parcel_fusion_parcel_models::{ActivityRecord, Crs, Parcel};
use rstar::{AABB, Envelope as _, RTree, RTreeObject};
use thiserror::Error;

use crate::boundary::aabb_of;

/// Maximum distance (in linear units of the working CRS) between a build
/// record and its nearest probe record for the pair to be kept.
pub const DEFAULT_MATCH_DISTANCE_THRESHOLD: f64 = 2.0;

/// Probe records per parallel batch.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Smallest search radius used when looking for the nearest envelope.
const MIN_SEARCH_RADIUS: f64 = 1e-9;

/// Anything with an optional geometry can take part in a match.
pub trait SpatialRecord {
    /// The record's geometry, if it has one.
    fn geometry(&self) -> Option<&Geometry<f64>>;
}

impl SpatialRecord for Parcel {
    fn geometry(&self) -> Option<&Geometry<f64>> {
        self.geometry.as_ref()
    }
}

impl SpatialRecord for ActivityRecord {
    fn geometry(&self) -> Option<&Geometry<f64>> {
        self.geometry.as_ref()
    }
}

impl<T: SpatialRecord + ?Sized> SpatialRecord for &T {
    fn geometry(&self) -> Option<&Geometry<f64>> {
        (**self).geometry()
    }
}

impl SpatialRecord for Geometry<f64> {
    fn geometry(&self) -> Option<&Geometry<f64>> {
        Some(self)
    }
}

/// Matcher tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatcherConfig {
    /// Pairs farther apart than this are dropped. Inclusive.
    pub distance_threshold: f64,
    /// Probe records per batch. Zero means a single batch.
    pub batch_size: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            distance_threshold: DEFAULT_MATCH_DISTANCE_THRESHOLD,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// One retained (build record, nearest probe record) pair.
#[derive(Debug)]
pub struct MatchCandidate<'a, B, P> {
    /// Robust distance between the two geometries.
    pub distance: f64,
    /// Position of the build record in the build slice.
    pub build_index: usize,
    /// The build record.
    pub build: &'a B,
    /// The probe record.
    pub probe: &'a P,
    /// Whether the pair satisfies the spatial-compatibility rule.
    pub is_compatible: bool,
    /// Position of the probe record in the probe slice.
    pub probe_index: usize,
}

/// Reasons a whole batch produced no candidates.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The batch worker panicked while building its index.
    #[error("Batch {batch} panicked: {message}")]
    BatchPanicked {
        /// Batch number.
        batch: usize,
        /// Panic payload, if it was a string.
        message: String,
    },
}

/// A batch whose candidates are absent from the results.
#[derive(Debug)]
pub struct BatchFailure {
    /// Batch number.
    pub batch: usize,
    /// Probe records covered by the batch.
    pub probe_range: Range<usize>,
    /// What went wrong.
    pub error: MatchError,
}

/// Single-pass stream of candidates, batch after batch.
pub type MatchStream<'a, B, P> =
    std::iter::Flatten<std::vec::IntoIter<Vec<MatchCandidate<'a, B, P>>>>;

/// Output of [`tree_based_proximity`].
///
/// Candidates are sorted by distance within each batch; batches follow
/// each other with no ordering between them.
#[derive(Debug)]
pub struct MatchResults<'a, B, P> {
    batches: Vec<Vec<MatchCandidate<'a, B, P>>>,
    failures: Vec<BatchFailure>,
}

impl<'a, B, P> MatchResults<'a, B, P> {
    /// Batches that failed.
    #[must_use]
    pub fn failures(&self) -> &[BatchFailure] {
        &self.failures
    }

    /// Total number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// Whether no candidate was retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.iter().all(Vec::is_empty)
    }

    /// Splits into the candidate stream and the batch failures.
    #[must_use]
    pub fn into_parts(self) -> (MatchStream<'a, B, P>, Vec<BatchFailure>) {
        (self.batches.into_iter().flatten(), self.failures)
    }
}

impl<'a, B, P> IntoIterator for MatchResults<'a, B, P> {
    type Item = MatchCandidate<'a, B, P>;
    type IntoIter = MatchStream<'a, B, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.batches.into_iter().flatten()
    }
}

struct BuildBoundary<'a> {
    build_index: usize,
    geometry: &'a Geometry<f64>,
    boundary: Geometry<f64>,
    bbox: Rect<f64>,
}

struct ProbeEntry<'a> {
    probe_index: usize,
    geometry: Cow<'a, Geometry<f64>>,
    envelope: Geometry<f64>,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for ProbeEntry<'_> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Matches every build record to its nearest probe record.
///
/// Probe geometries are reprojected from `probe_crs` into `build_crs`
/// batch by batch. A probe record that cannot be reprojected is skipped,
/// and so is a pair whose distance or predicate fails or panics. A panic
/// anywhere else fails only that batch (logged and reported in
/// [`MatchResults::failures`]). Build records with no geometry are skipped
/// but keep their index.
pub fn tree_based_proximity<'a, B, P>(
    build: &'a [B],
    build_crs: &Crs,
    probe: &'a [P],
    probe_crs: &Crs,
    reprojector: &dyn Reprojector,
    config: &MatcherConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> MatchResults<'a, B, P>
where
    B: SpatialRecord + Sync,
    P: SpatialRecord + Sync,
{
    let boundaries = build_boundaries(build);
    let ranges = batch_ranges(probe.len(), config.batch_size);

    log::debug!(
        "Matching {} build boundaries against {} probe records in {} batches",
        boundaries.len(),
        probe.len(),
        ranges.len(),
    );
    progress.set_message(format!("{} probe records", probe.len()));

    let work: Vec<(usize, Range<usize>)> = ranges.into_iter().enumerate().collect();
    let outcomes = in_parallel(
        work,
        |(batch, range)| {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                run_batch(
                    batch,
                    range.clone(),
                    build,
                    &boundaries,
                    probe,
                    probe_crs,
                    build_crs,
                    reprojector,
                    config,
                )
            }));
            let result = outcome.map_err(|payload| MatchError::BatchPanicked {
                batch,
                message: panic_message(payload.as_ref()),
            });
            (batch, range, result)
        },
        progress,
    );

    let mut batches = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for (batch, probe_range, result) in outcomes {
        match result {
            Ok(candidates) => batches.push(candidates),
            Err(error) => {
                log::warn!("Dropping batch {batch} (probe records {probe_range:?}): {error}");
                failures.push(BatchFailure {
                    batch,
                    probe_range,
                    error,
                });
            }
        }
    }

    MatchResults { batches, failures }
}

fn build_boundaries<B: SpatialRecord>(build: &[B]) -> Vec<BuildBoundary<'_>> {
    build
        .iter()
        .enumerate()
        .filter_map(|(build_index, record)| {
            let geometry = record.geometry()?;
            match boundary_of(geometry) {
                Ok(boundary) => {
                    let bbox = boundary.bounding_rect()?;
                    Some(BuildBoundary {
                        build_index,
                        geometry,
                        boundary,
                        bbox,
                    })
                }
                Err(e) => {
                    log::debug!("Skipping build record {build_index}: {e}");
                    None
                }
            }
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn run_batch<'a, B: SpatialRecord, P: SpatialRecord>(
    batch: usize,
    range: Range<usize>,
    build: &'a [B],
    boundaries: &[BuildBoundary<'_>],
    probe: &'a [P],
    probe_crs: &Crs,
    build_crs: &Crs,
    reprojector: &dyn Reprojector,
    config: &MatcherConfig,
) -> Vec<MatchCandidate<'a, B, P>> {
    let aligned = probe_crs.same_as(build_crs);
    let mut entries = Vec::with_capacity(range.len());

    for (probe_index, record) in probe.iter().enumerate().take(range.end).skip(range.start) {
        let Some(geometry) = record.geometry() else {
            continue;
        };
        let geometry = if aligned {
            Cow::Borrowed(geometry)
        } else {
            match reprojector.reproject(geometry, probe_crs, build_crs) {
                Ok(geometry) => Cow::Owned(geometry),
                Err(e) => {
                    log::debug!("Batch {batch}: skipping probe record {probe_index}: {e}");
                    continue;
                }
            }
        };
        let envelope = match envelope(&geometry) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::debug!("Skipping probe record {probe_index}: {e}");
                continue;
            }
        };
        let Some(rect) = envelope.bounding_rect() else {
            continue;
        };

        entries.push(ProbeEntry {
            probe_index,
            geometry,
            envelope,
            aabb: aabb_of(rect),
        });
    }

    let Some(extent) = entries
        .iter()
        .map(|entry| entry.aabb)
        .reduce(|a, b| a.merged(&b))
    else {
        return Vec::new();
    };
    let tree = RTree::bulk_load(entries);

    let mut candidates = Vec::new();
    for bnd in boundaries {
        let Some(nearest) = nearest_envelope(&tree, &extent, bnd, config.distance_threshold) else {
            continue;
        };

        let measured = catch_unwind(AssertUnwindSafe(
            || -> Result<Option<(f64, bool)>, GeometryError> {
                let distance = robust_distance(bnd.geometry, &nearest.geometry)?;
                if distance > config.distance_threshold {
                    return Ok(None);
                }
                let is_compatible = is_spatially_compatible(bnd.geometry, &nearest.geometry)?;
                Ok(Some((distance, is_compatible)))
            },
        ));

        match measured {
            Ok(Ok(Some((distance, is_compatible)))) => candidates.push(MatchCandidate {
                distance,
                build_index: bnd.build_index,
                build: &build[bnd.build_index],
                probe: &probe[nearest.probe_index],
                is_compatible,
                probe_index: nearest.probe_index,
            }),
            Ok(Ok(None)) => {}
            Ok(Err(e)) => log::debug!(
                "Batch {batch}: dropping build {} / probe {}: {e}",
                bnd.build_index,
                nearest.probe_index,
            ),
            Err(payload) => log::debug!(
                "Batch {batch}: dropping build {} / probe {} after panic: {}",
                bnd.build_index,
                nearest.probe_index,
                panic_message(payload.as_ref()),
            ),
        }
    }

    candidates.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.build_index.cmp(&b.build_index))
            .then(a.probe_index.cmp(&b.probe_index))
    });

    log::trace!("Batch {batch} retained {} candidates", candidates.len());

    candidates
}

/// Exact nearest probe envelope to a build boundary.
///
/// Searches a window around the boundary, widening it until a candidate
/// is found whose distance fits inside the window. Ties go to the lowest
/// probe index.
fn nearest_envelope<'t, 'a>(
    tree: &'t RTree<ProbeEntry<'a>>,
    extent: &AABB<[f64; 2]>,
    bnd: &BuildBoundary<'_>,
    threshold: f64,
) -> Option<&'t ProbeEntry<'a>> {
    let mut radius = threshold.max(MIN_SEARCH_RADIUS);

    while radius.is_finite() {
        let window = expanded(bnd.bbox, radius);
        let best = tree
            .locate_in_envelope_intersecting(&window)
            .filter_map(|entry| {
                planar_distance(&bnd.boundary, &entry.envelope)
                    .ok()
                    .map(|distance| (entry, distance))
            })
            .min_by(|(a, da), (b, db)| da.total_cmp(db).then(a.probe_index.cmp(&b.probe_index)));

        match best {
            Some((entry, distance)) if distance <= radius => return Some(entry),
            Some((_, distance)) => radius = distance,
            None if window.contains_envelope(extent) => return None,
            None => radius *= 4.0,
        }
    }

    None
}

fn expanded(rect: Rect<f64>, radius: f64) -> AABB<[f64; 2]> {
    AABB::from_corners(
        [rect.min().x - radius, rect.min().y - radius],
        [rect.max().x + radius, rect.max().y + radius],
    )
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
