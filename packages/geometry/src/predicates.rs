//! Multi-predicate spatial compatibility rule.

use geo::dimensions::{Dimensions, HasDimensions as _};
use geo::{Geometry, Relate as _};

use crate::{GeometryError, boundary, envelope};

/// DE-9IM pattern for `overlaps` between two areas or two point sets.
const OVERLAPS_AREA_OR_POINT: &str = "T*T***T**";
/// DE-9IM pattern for `overlaps` between two curves.
const OVERLAPS_CURVE: &str = "1*T***T**";

/// Decides whether two geometries are spatially compatible.
///
/// True when any of contains, overlaps, within or covers holds in either
/// direction between the full geometries, or between `a`'s boundary and
/// `b`'s envelope, or between `b`'s boundary and `a`'s envelope. The
/// boundary/envelope pairs catch near-touching parcels that strict polygon
/// predicates reject because of survey noise along shared edges.
///
/// The rule is symmetric: swapping `a` and `b` never changes the answer.
///
/// # Errors
///
/// Returns [`GeometryError::EmptyGeometry`] if either input is empty, or
/// [`GeometryError::Relate`] if a DE-9IM pattern cannot be evaluated.
pub fn is_spatially_compatible(
    a: &Geometry<f64>,
    b: &Geometry<f64>,
) -> Result<bool, GeometryError> {
    if a.is_empty() || b.is_empty() {
        return Err(GeometryError::EmptyGeometry);
    }

    if any_relation(a, b)? {
        return Ok(true);
    }

    for (boundary_of, envelope_of) in [(a, b), (b, a)] {
        let derived =
            boundary(boundary_of).and_then(|bnd| envelope(envelope_of).map(|env| (bnd, env)));
        match derived {
            Ok((bnd, env)) => {
                if any_relation(&bnd, &env)? {
                    return Ok(true);
                }
            }
            Err(e) => log::trace!("Skipping boundary/envelope relation: {e}"),
        }
    }

    Ok(false)
}

/// True when `a` and `b` satisfy contains, within, covers, covered-by or
/// overlaps.
///
/// Evaluates the eight directed relations from a single intersection
/// matrix. Empty inputs relate to nothing.
///
/// # Errors
///
/// Returns [`GeometryError::Relate`] if the overlaps pattern is rejected.
pub fn any_relation(a: &Geometry<f64>, b: &Geometry<f64>) -> Result<bool, GeometryError> {
    if a.is_empty() || b.is_empty() {
        return Ok(false);
    }

    let matrix = a.relate(b);
    if matrix.is_contains() || matrix.is_within() || matrix.is_covers() || matrix.is_coveredby()
    {
        return Ok(true);
    }

    let pattern = match (a.dimensions(), b.dimensions()) {
        (Dimensions::TwoDimensional, Dimensions::TwoDimensional)
        | (Dimensions::ZeroDimensional, Dimensions::ZeroDimensional) => OVERLAPS_AREA_OR_POINT,
        (Dimensions::OneDimensional, Dimensions::OneDimensional) => OVERLAPS_CURVE,
        _ => return Ok(false),
    };

    matrix
        .matches(pattern)
        .map_err(|e| GeometryError::Relate(format!("{e:?}")))
}
