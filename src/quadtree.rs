//! Quadtree decomposition of areal geometries.
//!
//! [`decompose`] covers a feature with a set of disjoint axis-aligned cells.
//! Cells entirely inside the geometry are tagged [`Coverage::Full`] and need
//! no geometry at query time; cells straddling the boundary carry the exact
//! clipped remainder as [`Coverage::Partial`] for later point tests.

use geo::{MultiPolygon, Rect};

use crate::geom;

/// Relative tolerance for treating a clipped area as filling its cell.
///
/// Boolean clipping runs on floating point; demanding exact equality would
/// demote genuinely full cells to partial and bloat the geometry table.
const FULL_COVERAGE_REL_EPS: f64 = 1e-9;

/// Ceiling on cells generated for a single feature. Once reached, splitting
/// stops and remaining cells store their exact remainders.
pub const MAX_CELLS_PER_FEATURE: usize = 1 << 20;

/// How much of its cell a decomposed quadrant covers.
#[derive(Debug, Clone, PartialEq)]
pub enum Coverage {
    /// The cell lies entirely inside the source geometry.
    Full,
    /// The cell straddles the geometry boundary; holds the exact
    /// intersection for point-level disambiguation.
    Partial(MultiPolygon<f64>),
}

impl Coverage {
    /// Returns `true` for [`Coverage::Full`].
    pub fn is_full(&self) -> bool {
        matches!(self, Coverage::Full)
    }
}

/// One cell of a decomposed feature.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadrantEntry {
    /// The cell rectangle.
    pub rect: Rect<f64>,
    /// Coverage of the cell by the source geometry.
    pub coverage: Coverage,
}

/// Decomposes `geometry` against `bounds` into disjoint quadrant cells.
///
/// Splitting recurses until a cell is fully covered, its clipped area drops
/// below `min_area`, or `max_depth` is exhausted; the latter two cases store
/// the exact remainder rather than dropping it. Cells whose intersection
/// with the geometry is empty or degenerate (zero width or height, e.g. an
/// edge-adjacent neighbour) produce nothing.
///
/// # Arguments
///
/// * `geometry` - the areal shape to cover
/// * `bounds` - the rectangle to decompose, normally the geometry's envelope
/// * `min_area` - precision budget: clipped areas below this stop splitting
/// * `max_depth` - recursion budget; at most `4^max_depth` cells result
pub fn decompose(
    geometry: &MultiPolygon<f64>,
    bounds: Rect<f64>,
    min_area: f64,
    max_depth: u32,
) -> Vec<QuadrantEntry> {
    let mut entries = Vec::new();
    decompose_into(geometry, bounds, min_area, max_depth, &mut entries);
    entries
}

fn decompose_into(
    geometry: &MultiPolygon<f64>,
    bounds: Rect<f64>,
    min_area: f64,
    depth_left: u32,
    out: &mut Vec<QuadrantEntry>,
) {
    let clipped = geom::intersection(geometry, &bounds);
    let Some(clip_envelope) = geom::envelope(&clipped) else {
        return;
    };
    if geom::is_degenerate(&clip_envelope) {
        return;
    }

    let clipped_area = geom::area(&clipped);
    if clipped_area == 0.0 {
        return;
    }

    if clipped_area < min_area {
        out.push(QuadrantEntry {
            rect: bounds,
            coverage: Coverage::Partial(clipped),
        });
        return;
    }

    let cell_area = geom::rect_area(&bounds);
    if clipped_area >= cell_area * (1.0 - FULL_COVERAGE_REL_EPS) {
        out.push(QuadrantEntry {
            rect: bounds,
            coverage: Coverage::Full,
        });
        return;
    }

    if depth_left == 0 || out.len() >= MAX_CELLS_PER_FEATURE {
        out.push(QuadrantEntry {
            rect: bounds,
            coverage: Coverage::Partial(clipped),
        });
        return;
    }

    // Deeper levels clip against the already-clipped shape, never the
    // original geometry.
    for quadrant in geom::quadrants(&bounds) {
        decompose_into(&clipped, quadrant, min_area, depth_left - 1, out);
    }
}
