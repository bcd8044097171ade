//! The `match` subcommand.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use clap::Args;
use parcel_fusion_activity::{ActivityMatcher, DomainRules, MatchOptions, MatchRecord};
use parcel_fusion_aggregate::{
    AggregateError, create_output, fill_lessees, join_activity_info, write_table,
};
use parcel_fusion_cli_utils::{BatchProgress, MultiProgress};
use parcel_fusion_geometry::EpsgReprojector;
use parcel_fusion_source::{
    ActivitySourceLoader, ActivitySources, CachedLoader, ColumnRenameRules, DirectoryCache,
    GeoJsonFileLoader, geojson_io,
};
use parcel_fusion_spatial::{DEFAULT_BATCH_SIZE, DEFAULT_MATCH_DISTANCE_THRESHOLD, MatcherConfig};

#[derive(Args)]
pub struct MatchArgs {
    /// Parcel collection to match (`GeoJSON`)
    #[arg(long)]
    parcels: PathBuf,
    /// Activity source descriptor file (TOML)
    #[arg(long)]
    sources: PathBuf,
    /// Column rename rules (JSON)
    #[arg(long)]
    rename_rules: PathBuf,
    /// Where to write the fused parcel collection (`GeoJSON`)
    #[arg(long)]
    output: PathBuf,
    /// Directory relative source locations resolve against (defaults to the
    /// directory of the sources file)
    #[arg(long)]
    source_dir: Option<PathBuf>,
    /// Cache loaded activity layers in this directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    /// Replacement domain rules table (TOML)
    #[arg(long)]
    domain_rules: Option<PathBuf>,
    /// Maximum distance between a parcel and an activity, in CRS units
    #[arg(long, default_value_t = DEFAULT_MATCH_DISTANCE_THRESHOLD)]
    distance_threshold: f64,
    /// Activity records per matching batch (0 for a single batch)
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,
    /// States matched concurrently
    #[arg(long, default_value_t = 1)]
    state_concurrency: usize,
    /// Also write every accepted match to this CSV file
    #[arg(long)]
    match_records: Option<PathBuf>,
}

/// Runs the match and writes its outputs. Nothing is written unless the
/// whole match succeeds.
pub async fn run(
    args: MatchArgs,
    states: Option<Vec<String>>,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();

    let sources = ActivitySources::load(&args.sources).await?;
    let selected = sources.select(states.as_deref())?;
    let rename_rules = ColumnRenameRules::load(&args.rename_rules).await?;
    let rules = match &args.domain_rules {
        Some(path) => DomainRules::load(path).await?,
        None => DomainRules::default(),
    };

    let collection = geojson_io::read_parcels_geojson(&args.parcels).await?;
    log::info!(
        "Loaded {} parcels ({}) from {}",
        collection.parcels.len(),
        collection.crs,
        args.parcels.display()
    );

    let base_dir = args.source_dir.clone().unwrap_or_else(|| {
        args.sources
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    });
    let files = GeoJsonFileLoader::new(base_dir);
    let loader: Arc<dyn ActivitySourceLoader> = match &args.cache_dir {
        Some(dir) => Arc::new(CachedLoader::new(files, DirectoryCache::new(dir.clone()))),
        None => Arc::new(files),
    };

    let options = MatchOptions {
        matcher: MatcherConfig {
            distance_threshold: args.distance_threshold,
            batch_size: args.batch_size,
        },
        state_concurrency: args.state_concurrency,
    };
    let matcher = ActivityMatcher::new(
        loader,
        rules,
        rename_rules,
        Arc::new(EpsgReprojector),
        options,
    )
    .with_progress(BatchProgress::new(multi, "Matching batches"));

    let (mut parcels, report) = matcher
        .run(collection.parcels, &collection.crs, &selected)
        .await?;
    join_activity_info(&mut parcels);
    fill_lessees(&mut parcels);

    for skipped in &report.skipped_sources {
        log::warn!(
            "Skipped {}-{}: {}",
            skipped.state,
            skipped.source,
            skipped.reason
        );
    }

    geojson_io::write_parcels_geojson(&args.output, &parcels, &collection.crs).await?;
    log::info!("Wrote {} parcels to {}", parcels.len(), args.output.display());

    if let Some(path) = &args.match_records {
        write_match_records(path, &report.match_records)?;
        log::info!(
            "Wrote {} match records to {}",
            report.match_records.len(),
            path.display()
        );
    }

    log::info!("Match finished in {:.1?}", start.elapsed());
    Ok(())
}

/// Writes accepted matches with their kept columns, one row per match.
fn write_match_records(path: &Path, records: &[MatchRecord]) -> Result<(), AggregateError> {
    let kept: BTreeSet<&str> = records
        .iter()
        .flat_map(|record| record.attributes.keys().map(String::as_str))
        .collect();

    let mut headers = vec!["state", "source", "object_id", "activity", "distance"];
    headers.extend(kept.iter().copied());

    let rows = records.iter().map(|record| {
        let mut row = vec![
            record.state.clone(),
            record.source.clone(),
            record.object_id.clone(),
            record.activity.clone(),
            record.distance.to_string(),
        ];
        row.extend(
            kept.iter()
                .map(|column| record.attributes.get(*column).cloned().unwrap_or_default()),
        );
        row
    });

    write_table(create_output(path)?, &headers, rows)
}

#[cfg(test)]
mod tests {
    use parcel_fusion_parcel_models::AttributeMap;

    use super::*;

    fn record(object_id: &str, kept: &[(&str, &str)]) -> MatchRecord {
        MatchRecord {
            state: "MT".to_string(),
            source: "Leases".to_string(),
            object_id: object_id.to_string(),
            activity: "Grazing".to_string(),
            distance: 0.0,
            attributes: kept
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<AttributeMap>(),
        }
    }

    #[test]
    fn match_records_carry_kept_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("matches.csv");

        write_match_records(
            &path,
            &[
                record("1", &[("LEASE_NO", "G-1")]),
                record("2", &[("lessee", "ACME")]),
            ],
        )
        .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "state,source,object_id,activity,distance,LEASE_NO,lessee");
        assert_eq!(lines[1], "MT,Leases,1,Grazing,0,G-1,");
        assert_eq!(lines[2], "MT,Leases,2,Grazing,0,,ACME");
    }
}
