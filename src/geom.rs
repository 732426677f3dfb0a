//! Geometry adapter over the `geo` and `wkt` crates.
//!
//! Everything spatial the index needs funnels through here: WKT parsing,
//! envelope computation, boolean clipping, area, and the point-containment
//! test. Containment is boundary-inclusive throughout: a point lying exactly
//! on a geometry's edge counts as contained, matching the rectangle
//! containment convention of the coarse index.

use std::borrow::Cow;

use geo::{Area, BooleanOps, BoundingRect, Geometry, Intersects, MultiPolygon, Point, Rect, coord};
use wkt::ToWkt;

use crate::error::{BiotopeError, Result};

/// Geometry input accepted by [`crate::SpatialIndex::add_feature`]: either a
/// WKT string to be parsed, or an already-built areal shape.
#[derive(Debug, Clone)]
pub enum GeometryInput<'a> {
    /// Well-known text, e.g. `"POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))"`.
    Wkt(Cow<'a, str>),
    /// A pre-built shape, consumed by the index.
    Shape(MultiPolygon<f64>),
}

impl GeometryInput<'_> {
    /// Resolves the input to a concrete multipolygon, parsing WKT if needed.
    pub(crate) fn into_multi_polygon(self) -> Result<MultiPolygon<f64>> {
        match self {
            GeometryInput::Wkt(text) => parse_wkt(&text),
            GeometryInput::Shape(shape) => Ok(shape),
        }
    }
}

impl<'a> From<&'a str> for GeometryInput<'a> {
    fn from(text: &'a str) -> Self {
        GeometryInput::Wkt(Cow::Borrowed(text))
    }
}

impl From<String> for GeometryInput<'_> {
    fn from(text: String) -> Self {
        GeometryInput::Wkt(Cow::Owned(text))
    }
}

impl<'a> From<&'a String> for GeometryInput<'a> {
    fn from(text: &'a String) -> Self {
        GeometryInput::Wkt(Cow::Borrowed(text))
    }
}

impl From<MultiPolygon<f64>> for GeometryInput<'_> {
    fn from(shape: MultiPolygon<f64>) -> Self {
        GeometryInput::Shape(shape)
    }
}

impl From<geo::Polygon<f64>> for GeometryInput<'_> {
    fn from(polygon: geo::Polygon<f64>) -> Self {
        GeometryInput::Shape(MultiPolygon::new(vec![polygon]))
    }
}

impl From<Rect<f64>> for GeometryInput<'_> {
    fn from(rect: Rect<f64>) -> Self {
        GeometryInput::Shape(MultiPolygon::new(vec![rect.to_polygon()]))
    }
}

/// Parses a WKT string into an areal geometry.
///
/// Accepts `POLYGON` and `MULTIPOLYGON`. Non-areal WKT such as `POINT` or
/// `LINESTRING` parses but is rejected as unusable for an areal index.
///
/// # Examples
///
/// ```rust
/// let square = biotope::geom::parse_wkt("POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))")?;
/// assert_eq!(square.0.len(), 1);
/// # Ok::<(), biotope::BiotopeError>(())
/// ```
pub fn parse_wkt(text: &str) -> Result<MultiPolygon<f64>> {
    use std::str::FromStr;

    let parsed = wkt::Wkt::<f64>::from_str(text)
        .map_err(|e| BiotopeError::GeometryParse(format!("{e:?}")))?;
    let geometry: Geometry<f64> = parsed
        .try_into()
        .map_err(|e: wkt::conversion::Error| BiotopeError::GeometryParse(format!("{e:?}")))?;
    into_areal(geometry)
}

fn into_areal(geometry: Geometry<f64>) -> Result<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => Ok(MultiPolygon::new(vec![polygon])),
        Geometry::MultiPolygon(multi) => Ok(multi),
        Geometry::Rect(rect) => Ok(MultiPolygon::new(vec![rect.to_polygon()])),
        Geometry::Triangle(triangle) => Ok(MultiPolygon::new(vec![triangle.to_polygon()])),
        other => Err(BiotopeError::InvalidGeometry(format!(
            "expected an areal geometry, got {}",
            kind_name(&other)
        ))),
    }
}

fn kind_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Serializes a geometry to its canonical WKT form.
pub fn to_wkt(geometry: &MultiPolygon<f64>) -> String {
    geometry.wkt_string()
}

/// Axis-aligned envelope of a geometry, or `None` for an empty one.
pub fn envelope(geometry: &MultiPolygon<f64>) -> Option<Rect<f64>> {
    geometry.bounding_rect()
}

/// Clips a geometry to a rectangle.
pub fn intersection(geometry: &MultiPolygon<f64>, clip: &Rect<f64>) -> MultiPolygon<f64> {
    let clip = MultiPolygon::new(vec![clip.to_polygon()]);
    geometry.intersection(&clip)
}

/// Planar unsigned area of a geometry.
pub fn area(geometry: &MultiPolygon<f64>) -> f64 {
    geometry.unsigned_area()
}

/// Planar area of a rectangle.
pub fn rect_area(rect: &Rect<f64>) -> f64 {
    rect.unsigned_area()
}

/// Whether a rectangle has zero width or zero height.
pub fn is_degenerate(rect: &Rect<f64>) -> bool {
    rect.width() == 0.0 || rect.height() == 0.0
}

/// Boundary-inclusive point-containment test.
pub fn covers_point(geometry: &MultiPolygon<f64>, x: f64, y: f64) -> bool {
    geometry.intersects(&Point::new(x, y))
}

/// Splits a rectangle into four equal quadrants.
pub fn quadrants(rect: &Rect<f64>) -> [Rect<f64>; 4] {
    let min = rect.min();
    let max = rect.max();
    let center = rect.center();
    [
        Rect::new(min, center),
        Rect::new(coord! { x: center.x, y: min.y }, coord! { x: max.x, y: center.y }),
        Rect::new(coord! { x: min.x, y: center.y }, coord! { x: center.x, y: max.y }),
        Rect::new(center, max),
    ]
}
