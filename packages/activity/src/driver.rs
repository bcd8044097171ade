//! Per-state activity matching.
//!
//! Each (state, activity source) pair walks
//! `not_loaded -> loaded -> matched -> filtered -> merged`, or ends in
//! `skipped` when its layer cannot be loaded. Sources of one state run one
//! after another; the spatial match inside each source is parallel at the
//! batch level. Bundles are written back into the parcels only after every
//! state has finished.

use std::{sync::Arc, time::Instant};

use futures::stream::{self, StreamExt as _};
use parcel_fusion_fusion::{
    ActivityEntry, BundleMap, FusionError, apply_bundles, reset_activity_info,
};
use parcel_fusion_geometry::Reprojector;
use parcel_fusion_parallel::progress::{ProgressCallback, null_progress};
use parcel_fusion_parcel_models::{ActivityLayer, ActivityRecord, AttributeMap, Crs, Parcel};
use parcel_fusion_source::{
    ActivitySourceDefinition, ActivitySourceLoader, ColumnRenameRules, StateActivities,
};
use parcel_fusion_spatial::{MatcherConfig, tree_based_proximity};
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

use crate::{
    compat::{is_compatible_activity, is_inactive},
    info::format_activity_info,
    name::resolve_activity_name,
    rules::DomainRules,
};

/// Lifecycle of one (state, activity source) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SourceState {
    NotLoaded,
    Loaded,
    Matched,
    Filtered,
    Merged,
    Skipped,
}

fn log_transition(state: &str, source: &str, from: SourceState, to: SourceState) {
    log::debug!("[{state}] {source}: {from} -> {to}");
}

/// Configuration-level failures that stop the run.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Fusion hit an invariant violation.
    #[error(transparent)]
    Fusion(#[from] FusionError),

    /// A matching task panicked or was cancelled.
    #[error("Matching task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A source that names activities from a column has no rule saying
    /// which column.
    #[error("No rename rule maps an activity column for {state} source '{source_name}'")]
    MissingRewriteRule {
        /// State abbreviation.
        state: String,
        /// Activity source name.
        source_name: String,
    },
}

/// Driver tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOptions {
    /// Spatial matcher settings.
    pub matcher: MatcherConfig,
    /// States matched at the same time. Values below one mean one.
    pub state_concurrency: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            matcher: MatcherConfig::default(),
            state_concurrency: 1,
        }
    }
}

/// Everything a matching task needs besides the data.
pub struct MatchContext {
    /// Domain filtering tables.
    pub rules: DomainRules,
    /// Column rename rules.
    pub rename_rules: ColumnRenameRules,
    /// Brings activity geometries into the parcel CRS.
    pub reprojector: Arc<dyn Reprojector>,
    /// Spatial matcher settings.
    pub matcher: MatcherConfig,
    /// Batch progress sink.
    pub progress: Arc<dyn ProgressCallback>,
}

/// One accepted (parcel, activity record) pair, for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    /// State abbreviation.
    pub state: String,
    /// Activity source name.
    pub source: String,
    /// Parcel identifier.
    pub object_id: String,
    /// Resolved activity name.
    pub activity: String,
    /// Robust distance between parcel and activity geometry.
    pub distance: f64,
    /// Activity columns listed in the source's `keep_cols`.
    pub attributes: AttributeMap,
}

/// An activity source that contributed nothing because it failed to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSource {
    /// State abbreviation.
    pub state: String,
    /// Activity source name.
    pub source: String,
    /// Why the source was skipped.
    pub reason: String,
}

/// Result of matching one source against one state's parcels.
#[derive(Debug, Default)]
pub struct SourceOutcome {
    /// Accepted entries keyed by row in the full parcel collection.
    pub bundles: BundleMap,
    /// Accepted pairs.
    pub records: Vec<MatchRecord>,
    /// Candidates produced by the spatial matcher.
    pub candidates: usize,
    /// Candidates that passed every filter.
    pub accepted: usize,
    /// Matcher batches that failed.
    pub failed_batches: usize,
}

/// Summary of a full matching pass.
#[derive(Debug, Default)]
pub struct MatchReport {
    /// Accepted entries keyed by parcel row.
    pub bundles: BundleMap,
    /// Accepted pairs, sorted by state, source and parcel.
    pub match_records: Vec<MatchRecord>,
    /// Sources that failed to load.
    pub skipped_sources: Vec<SkippedSource>,
    /// Spatial candidates seen.
    pub candidates: usize,
    /// Candidates accepted.
    pub accepted: usize,
    /// Matcher batches that failed.
    pub failed_batches: usize,
    /// Parcels whose activity fields were updated.
    pub updated_parcels: usize,
}

impl MatchReport {
    fn absorb(&mut self, outcome: SourceOutcome) {
        self.bundles.merge(outcome.bundles);
        self.match_records.extend(outcome.records);
        self.candidates += outcome.candidates;
        self.accepted += outcome.accepted;
        self.failed_batches += outcome.failed_batches;
    }

    fn merge(&mut self, other: Self) {
        self.bundles.merge(other.bundles);
        self.match_records.extend(other.match_records);
        self.skipped_sources.extend(other.skipped_sources);
        self.candidates += other.candidates;
        self.accepted += other.accepted;
        self.failed_batches += other.failed_batches;
    }

    fn sort(&mut self) {
        self.match_records.sort_by(|a, b| {
            (&a.state, &a.source, &a.object_id, &a.activity)
                .cmp(&(&b.state, &b.source, &b.object_id, &b.activity))
                .then(a.distance.total_cmp(&b.distance))
        });
        self.skipped_sources.sort_by(|a, b| {
            (&a.state, &a.source).cmp(&(&b.state, &b.source))
        });
    }
}

/// Matches one loaded activity layer against the parcels at `rows`.
///
/// Candidates are accepted when they are spatially compatible, pass the
/// domain rights-type rule and are not flagged inactive.
///
/// # Errors
///
/// Returns [`FusionError::UndefinedActivityName`] if an accepted candidate
/// resolves to a blank activity name.
pub fn process_state_activity(
    context: &MatchContext,
    source: &ActivitySourceDefinition,
    layer: &ActivityLayer,
    parcels: &[Parcel],
    rows: &[usize],
    parcels_crs: &Crs,
) -> Result<SourceOutcome, FusionError> {
    let state = layer.state.as_str();
    let build: Vec<&Parcel> = rows.iter().map(|&row| &parcels[row]).collect();

    let results = tree_based_proximity(
        &build,
        parcels_crs,
        &layer.records,
        &layer.crs,
        context.reprojector.as_ref(),
        &context.matcher,
        &context.progress,
    );
    let (candidates, failures) = results.into_parts();
    log_transition(state, &source.name, SourceState::Loaded, SourceState::Matched);

    for failure in &failures {
        log::warn!(
            "[{state}] {}: batch {} (probe records {:?}) skipped: {}",
            source.name,
            failure.batch,
            failure.probe_range,
            failure.error,
        );
    }

    let mut outcome = SourceOutcome {
        failed_batches: failures.len(),
        ..SourceOutcome::default()
    };

    for candidate in candidates {
        outcome.candidates += 1;

        let row = rows[candidate.build_index];
        let parcel: &Parcel = candidate.build;
        let record = candidate.probe;

        let name = resolve_activity_name(
            state,
            source,
            record,
            &context.rename_rules,
            &context.rules,
        );
        if !candidate.is_compatible
            || !is_compatible_activity(parcel, state, source, &name, &context.rules)
        {
            continue;
        }
        if is_inactive(state, record, &context.rules) {
            log::trace!("[{state}] Dropping inactive {name} on parcel {}", parcel.object_id);
            continue;
        }
        if name.trim().is_empty() {
            log::error!("Activity is undefined for {state} source {}", source.name);
            return Err(FusionError::UndefinedActivityName {
                row,
                state: state.to_string(),
            });
        }

        let info = format_activity_info(state, source, record, &name, &context.rename_rules);
        outcome.records.push(MatchRecord {
            state: state.to_string(),
            source: source.name.clone(),
            object_id: parcel.object_id.clone(),
            activity: name.clone(),
            distance: candidate.distance,
            attributes: kept_columns(source, record),
        });
        outcome.bundles.insert(row, ActivityEntry::new(name, info));
        outcome.accepted += 1;
    }

    log_transition(state, &source.name, SourceState::Matched, SourceState::Filtered);
    log::debug!(
        "[{state}] {}: {} of {} candidates accepted",
        source.name,
        outcome.accepted,
        outcome.candidates,
    );

    Ok(outcome)
}

fn kept_columns(source: &ActivitySourceDefinition, record: &ActivityRecord) -> AttributeMap {
    source
        .keep_cols
        .iter()
        .filter_map(|column| {
            record
                .get_ignore_case(column)
                .map(|value| (column.clone(), value.to_string()))
        })
        .collect()
}

/// Runs every configured activity source against a parcel collection.
pub struct ActivityMatcher {
    loader: Arc<dyn ActivitySourceLoader>,
    context: Arc<MatchContext>,
    state_concurrency: usize,
}

impl ActivityMatcher {
    /// Creates a matcher with no progress reporting.
    #[must_use]
    pub fn new(
        loader: Arc<dyn ActivitySourceLoader>,
        rules: DomainRules,
        rename_rules: ColumnRenameRules,
        reprojector: Arc<dyn Reprojector>,
        options: MatchOptions,
    ) -> Self {
        Self {
            loader,
            context: Arc::new(MatchContext {
                rules,
                rename_rules,
                reprojector,
                matcher: options.matcher,
                progress: null_progress(),
            }),
            state_concurrency: options.state_concurrency.max(1),
        }
    }

    /// Replaces the batch progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        if let Some(context) = Arc::get_mut(&mut self.context) {
            context.progress = progress;
        }
        self
    }

    /// Checks that every source can name its activities.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::MissingRewriteRule`] for a source that takes
    /// its activity name from a column no rename rule identifies.
    pub fn validate(&self, states: &[&StateActivities]) -> Result<(), DriverError> {
        for state in states {
            for source in &state.activities {
                if !source.use_name_as_activity
                    && self
                        .context
                        .rename_rules
                        .activity_columns(&state.state, &source.name)
                        .is_empty()
                {
                    return Err(DriverError::MissingRewriteRule {
                        state: state.state.clone(),
                        source_name: source.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Matches `parcels` against the sources of `states` and fuses the
    /// results into them.
    ///
    /// `activity_info` is rebuilt from scratch; `activity` keeps its
    /// existing tokens. Parcels are only modified after every state is done,
    /// so an error leaves nothing half-written.
    ///
    /// # Errors
    ///
    /// * [`DriverError::MissingRewriteRule`] from [`Self::validate`]
    /// * [`DriverError::Fusion`] if an activity name is undefined
    /// * [`DriverError::Join`] if a matching task dies
    pub async fn run(
        &self,
        mut parcels: Vec<Parcel>,
        crs: &Crs,
        states: &[&StateActivities],
    ) -> Result<(Vec<Parcel>, MatchReport), DriverError> {
        self.validate(states)?;

        log::info!(
            "Running activity match for states: {}",
            states
                .iter()
                .map(|s| s.state.as_str())
                .collect::<Vec<_>>()
                .join(","),
        );

        reset_activity_info(&mut parcels);
        let shared = Arc::new(parcels);

        let reports: Vec<Result<MatchReport, DriverError>> =
            stream::iter(states.iter().map(|state| self.run_state(state, &shared, crs)))
                .buffer_unordered(self.state_concurrency)
                .collect()
                .await;

        let mut report = MatchReport::default();
        for state_report in reports {
            report.merge(state_report?);
        }
        report.sort();

        let mut parcels = Arc::try_unwrap(shared).unwrap_or_else(|shared| (*shared).clone());
        report.updated_parcels = apply_bundles(&mut parcels, &report.bundles)?;

        log::info!(
            "Activity match accepted {} of {} candidates, updated {} parcels ({} sources skipped, {} batches failed)",
            report.accepted,
            report.candidates,
            report.updated_parcels,
            report.skipped_sources.len(),
            report.failed_batches,
        );

        Ok((parcels, report))
    }

    async fn run_state(
        &self,
        state: &StateActivities,
        parcels: &Arc<Vec<Parcel>>,
        crs: &Crs,
    ) -> Result<MatchReport, DriverError> {
        let code = state.state.as_str();
        let start = Instant::now();
        let mut report = MatchReport::default();

        let rows: Arc<Vec<usize>> = Arc::new(
            parcels
                .iter()
                .enumerate()
                .filter(|(_, parcel)| parcel.is_in_state(code))
                .map(|(row, _)| row)
                .collect(),
        );
        if rows.is_empty() {
            log::warn!(
                "[{code}] No parcels in state, skipping {} activity sources",
                state.activities.len()
            );
            return Ok(report);
        }

        log::info!(
            "Running activity match for {code}: {} parcels, {} activity sources",
            rows.len(),
            state.activities.len(),
        );

        for source in &state.activities {
            let layer = match self.loader.load(code, source).await {
                Ok(layer) if !layer.is_empty() => layer,
                Ok(_) => {
                    skip_source(&mut report, code, source, "layer has no features".to_string());
                    continue;
                }
                Err(e) => {
                    skip_source(&mut report, code, source, e.to_string());
                    continue;
                }
            };
            log_transition(code, &source.name, SourceState::NotLoaded, SourceState::Loaded);

            let context = Arc::clone(&self.context);
            let parcels = Arc::clone(parcels);
            let rows = Arc::clone(&rows);
            let crs = crs.clone();
            let definition = source.clone();

            let outcome = tokio::task::spawn_blocking(move || {
                process_state_activity(&context, &definition, &layer, &parcels, &rows, &crs)
            })
            .await??;

            report.absorb(outcome);
            log_transition(code, &source.name, SourceState::Filtered, SourceState::Merged);
        }

        log::info!("Activity match for {code} took {:?}", start.elapsed());

        Ok(report)
    }
}

fn skip_source(
    report: &mut MatchReport,
    state: &str,
    source: &ActivitySourceDefinition,
    reason: String,
) {
    log::error!(
        "No activity data found for state: {state} and activity: {} ({reason})",
        source.name
    );
    log_transition(state, &source.name, SourceState::NotLoaded, SourceState::Skipped);
    report.skipped_sources.push(SkippedSource {
        state: state.to_string(),
        source: source.name.clone(),
        reason,
    });
}
