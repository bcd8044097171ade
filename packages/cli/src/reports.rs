//! The `aggregate` subcommand.

use std::{collections::BTreeMap, path::PathBuf, time::Instant};

use clap::Args;
use geo::Geometry;
use parcel_fusion_aggregate::{
    attach_reservation_acres, clean::MIN_CLIPPED_ACRES, clip_to_boundaries, create_output,
    filter_parcels_by_acreage, fix_trust_names, join_activity_info, remove_river_slivers,
    remove_timber_rows, reproject_parcels, reservation_acres, summarize_reservations,
    summarize_universities, write_parcels, write_reservations, write_universities,
};
use parcel_fusion_cli_utils::{MultiProgress, StageProgress};
use parcel_fusion_geometry::{EpsgReprojector, Reprojector};
use parcel_fusion_parcel_models::{Crs, Parcel, columns};
use parcel_fusion_source::geojson_io;
use parcel_fusion_spatial::boundary::BoundaryIndex;

const PARCELS_CSV: &str = "parcels.csv";
const PARCELS_GEOJSON: &str = "parcels.geojson";
const RESERVATIONS_CSV: &str = "by_reservation.csv";
const UNIVERSITIES_CSV: &str = "by_university.csv";

const STAGES: &[&str] = &["Cleaning", "Clipping", "Summarizing", "Writing"];

#[derive(Args)]
pub struct AggregateArgs {
    /// Fused parcel collection (`GeoJSON`)
    #[arg(long)]
    parcels: PathBuf,
    /// Directory the cleaned dataset and reports are written to
    #[arg(long)]
    output_dir: PathBuf,
    /// Reservation boundaries (`GeoJSON`) to clip parcels to
    #[arg(long)]
    reservations: Option<PathBuf>,
    /// Boundary property holding the reservation name
    #[arg(long, default_value = columns::RESERVATION_NAME)]
    reservation_name_field: String,
    /// Smallest clipped acreage kept after clipping
    #[arg(long, default_value_t = MIN_CLIPPED_ACRES)]
    min_acres: f64,
}

/// Cleans, clips and summarizes a parcel collection, then writes the
/// dataset and reports to the output directory.
pub async fn run(
    args: AggregateArgs,
    states: Option<Vec<String>>,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut stages = StageProgress::new(multi, "Aggregating", STAGES);

    let collection = geojson_io::read_parcels_geojson(&args.parcels).await?;
    let mut parcels = collection.parcels;
    if let Some(states) = &states {
        parcels.retain(|parcel| states.iter().any(|state| parcel.is_in_state(state)));
    }
    log::info!("Aggregating {} parcels", parcels.len());

    stages.next_stage();
    parcels = remove_timber_rows(parcels);
    parcels = remove_river_slivers(parcels);
    fix_trust_names(&mut parcels);
    join_activity_info(&mut parcels);

    stages.next_stage();
    let albers = Crs::conus_albers();
    let reprojector = EpsgReprojector;
    reproject_parcels(&mut parcels, &collection.crs, &albers, &reprojector)?;

    let mut boundary_acres = BTreeMap::new();
    if let Some(path) = &args.reservations {
        let boundaries =
            read_boundaries(path, &args.reservation_name_field, &albers, &reprojector).await?;
        boundary_acres = reservation_acres(&boundaries);
        let index = BoundaryIndex::new(boundaries);
        parcels = clip_to_boundaries(parcels, &index);
        parcels = filter_parcels_by_acreage(parcels, args.min_acres);
    }

    stages.next_stage();
    let mut reservations = summarize_reservations(&parcels);
    attach_reservation_acres(&mut reservations, &boundary_acres);
    let universities = summarize_universities(&parcels);

    stages.next_stage();
    let dir = &args.output_dir;
    write_parcels(create_output(&dir.join(PARCELS_CSV))?, &parcels)?;
    geojson_io::write_parcels_geojson(&dir.join(PARCELS_GEOJSON), &parcels, &albers).await?;
    write_reservations(create_output(&dir.join(RESERVATIONS_CSV))?, &reservations)?;
    if !universities.is_empty() {
        write_universities(create_output(&dir.join(UNIVERSITIES_CSV))?, &universities)?;
    }
    stages.finish(format!(
        "Wrote {} parcels, {} reservations, {} universities",
        parcels.len(),
        reservations.len(),
        universities.len()
    ));

    log::info!(
        "Aggregation finished in {:.1?}, output in {}",
        start.elapsed(),
        dir.display()
    );
    Ok(())
}

/// Reads named boundary polygons, reprojected to `target`.
async fn read_boundaries(
    path: &std::path::Path,
    name_field: &str,
    target: &Crs,
    reprojector: &dyn Reprojector,
) -> Result<Vec<(String, Geometry<f64>)>, Box<dyn std::error::Error>> {
    let collection = geojson_io::read_parcels_geojson(path).await?;
    let mut boundaries = Vec::with_capacity(collection.parcels.len());

    for feature in &collection.parcels {
        let (Some(name), Some(geometry)) = (boundary_name(feature, name_field), &feature.geometry)
        else {
            log::warn!(
                "Skipping boundary feature {} without a name or geometry",
                feature.object_id
            );
            continue;
        };
        let geometry = reprojector.reproject(geometry, &collection.crs, target)?;
        boundaries.push((name, geometry));
    }

    log::info!("Read {} boundaries from {}", boundaries.len(), path.display());
    Ok(boundaries)
}

/// Name of a boundary feature read through the parcel reader.
fn boundary_name(feature: &Parcel, field: &str) -> Option<String> {
    if field == columns::RESERVATION_NAME {
        feature.reservation_name.clone()
    } else {
        feature.attribute(field).map(ToString::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_names_come_from_the_configured_field() {
        let mut feature = Parcel::new("0", "", "", None);
        feature.reservation_name = Some("Navajo Nation".to_string());
        feature
            .attributes
            .insert("LARNAME".to_string(), "Hopi".to_string());

        assert_eq!(
            boundary_name(&feature, columns::RESERVATION_NAME).as_deref(),
            Some("Navajo Nation")
        );
        assert_eq!(boundary_name(&feature, "LARNAME").as_deref(), Some("Hopi"));
        assert_eq!(boundary_name(&feature, "LANDAREA"), None);
    }
}
