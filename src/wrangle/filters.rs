//! Filtering wranglers: drop (or flag) occurrence records that fail a
//! condition.
//!
//! Every filter honors the shared assessment mechanism from
//! [`super::OccurrenceWrangler`]: attach an [`Assessment`](super::Assessment)
//! to annotate failing records instead of dropping them.

use geo::MultiPolygon;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use super::{OccurrenceWrangler, WranglerCore};
use crate::error::Result;
use crate::geom;
use crate::index::SpatialIndex;
use crate::occurrence::{AttributeValue, Attributes, Occurrence};

/// Keeps records whose coordinates fall inside a rectangle, bounds included.
#[derive(Debug)]
pub struct BoundingBoxFilter {
    core: WranglerCore,
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl BoundingBoxFilter {
    /// A filter keeping records with `min_x <= x <= max_x` and
    /// `min_y <= y <= max_y`.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            core: WranglerCore::new(),
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }
}

impl OccurrenceWrangler for BoundingBoxFilter {
    fn name(&self) -> &str {
        "BoundingBoxFilter"
    }

    fn core(&self) -> &WranglerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut WranglerCore {
        &mut self.core
    }

    fn passes(&mut self, occurrence: &Occurrence) -> bool {
        (self.min_x..=self.max_x).contains(&occurrence.x())
            && (self.min_y..=self.max_y).contains(&occurrence.y())
    }
}

/// Keeps records whose coordinates carry at least a minimum number of
/// decimal places.
///
/// Precision is judged on the decimal rendering of each coordinate; a
/// coordinate that prints without a fractional part always fails.
#[derive(Debug)]
pub struct DecimalPrecisionFilter {
    core: WranglerCore,
    decimal_places: usize,
}

impl DecimalPrecisionFilter {
    /// A filter requiring `decimal_places` digits after the point on both
    /// coordinates.
    pub fn new(decimal_places: usize) -> Self {
        Self {
            core: WranglerCore::new(),
            decimal_places,
        }
    }
}

fn decimal_places(value: f64) -> Option<usize> {
    let rendered = value.to_string();
    rendered.find('.').map(|dot| rendered.len() - dot - 1)
}

impl OccurrenceWrangler for DecimalPrecisionFilter {
    fn name(&self) -> &str {
        "DecimalPrecisionFilter"
    }

    fn core(&self) -> &WranglerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut WranglerCore {
        &mut self.core
    }

    fn passes(&mut self, occurrence: &Occurrence) -> bool {
        match (decimal_places(occurrence.x()), decimal_places(occurrence.y())) {
            (Some(x_places), Some(y_places)) => {
                x_places.min(y_places) >= self.decimal_places
            }
            _ => false,
        }
    }
}

/// Keeps the first record seen at each (x, y) locality, dropping repeats.
///
/// Localities compare by exact coordinate bits. By default the seen set
/// resets at every batch so one filter instance can serve many species
/// groups; disable the reset to deduplicate across batches.
#[derive(Debug)]
pub struct UniqueLocalitiesFilter {
    core: WranglerCore,
    seen: FxHashSet<(u64, u64)>,
    reset_per_batch: bool,
}

impl UniqueLocalitiesFilter {
    pub fn new() -> Self {
        Self::with_reset(true)
    }

    /// Controls whether the seen set clears at the start of each batch.
    pub fn with_reset(reset_per_batch: bool) -> Self {
        Self {
            core: WranglerCore::new(),
            seen: FxHashSet::default(),
            reset_per_batch,
        }
    }
}

impl Default for UniqueLocalitiesFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl OccurrenceWrangler for UniqueLocalitiesFilter {
    fn name(&self) -> &str {
        "UniqueLocalitiesFilter"
    }

    fn core(&self) -> &WranglerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut WranglerCore {
        &mut self.core
    }

    fn begin_batch(&mut self, _occurrences: &[Occurrence]) {
        if self.reset_per_batch {
            self.seen.clear();
        }
    }

    fn passes(&mut self, occurrence: &Occurrence) -> bool {
        self.seen
            .insert((occurrence.x().to_bits(), occurrence.y().to_bits()))
    }
}

/// Passes a batch through untouched when it is large enough, drops it
/// entirely when it is not.
///
/// The decision is batch-scoped: every record in a batch shares the same
/// verdict.
#[derive(Debug)]
pub struct MinimumPointsFilter {
    core: WranglerCore,
    minimum_count: usize,
    batch_passes: bool,
}

impl MinimumPointsFilter {
    /// A filter requiring at least `minimum_count` records per batch.
    pub fn new(minimum_count: usize) -> Self {
        Self {
            core: WranglerCore::new(),
            minimum_count,
            batch_passes: true,
        }
    }
}

impl OccurrenceWrangler for MinimumPointsFilter {
    fn name(&self) -> &str {
        "MinimumPointsFilter"
    }

    fn core(&self) -> &WranglerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut WranglerCore {
        &mut self.core
    }

    fn begin_batch(&mut self, occurrences: &[Occurrence]) {
        self.batch_passes = occurrences.len() >= self.minimum_count;
    }

    fn passes(&mut self, _occurrence: &Occurrence) -> bool {
        self.batch_passes
    }
}

/// Declarative pass condition applied to a single attribute by
/// [`AttributeFilter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeCondition {
    /// Passes when the attribute is absent or not one of the listed values.
    ///
    /// With a `delimiter`, a text attribute is treated as a multi-value
    /// field: it is split on the delimiter and every part (surrounding
    /// whitespace trimmed) must stay off the list. Non-text attributes are
    /// always compared whole, and split parts only match `Text` values.
    NotIn {
        values: Vec<AttributeValue>,
        #[serde(default)]
        delimiter: Option<char>,
    },
    /// Passes when the attribute is one of the listed values.
    OneOf { values: Vec<AttributeValue> },
}

impl AttributeCondition {
    /// A [`NotIn`](AttributeCondition::NotIn) condition over whole values.
    pub fn not_in<V: Into<AttributeValue>>(values: impl IntoIterator<Item = V>) -> Self {
        AttributeCondition::NotIn {
            values: values.into_iter().map(Into::into).collect(),
            delimiter: None,
        }
    }

    /// A [`NotIn`](AttributeCondition::NotIn) condition that splits text
    /// attributes on `delimiter` and requires every part to pass.
    pub fn not_in_split<V: Into<AttributeValue>>(
        values: impl IntoIterator<Item = V>,
        delimiter: char,
    ) -> Self {
        AttributeCondition::NotIn {
            values: values.into_iter().map(Into::into).collect(),
            delimiter: Some(delimiter),
        }
    }

    /// A [`OneOf`](AttributeCondition::OneOf) condition over whole values.
    pub fn one_of<V: Into<AttributeValue>>(values: impl IntoIterator<Item = V>) -> Self {
        AttributeCondition::OneOf {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    fn check(&self, value: Option<&AttributeValue>) -> bool {
        match (self, value) {
            (AttributeCondition::NotIn { values, delimiter }, Some(value)) => {
                match (delimiter, value) {
                    (Some(sep), AttributeValue::Text(text)) => text
                        .split(*sep)
                        .map(str::trim)
                        .all(|part| !values.iter().any(|v| v.as_str() == Some(part))),
                    _ => !values.contains(value),
                }
            }
            (AttributeCondition::NotIn { .. }, None) => true,
            (AttributeCondition::OneOf { values }, Some(value)) => values.contains(value),
            (AttributeCondition::OneOf { .. }, None) => false,
        }
    }
}

enum AttributePass {
    Condition(AttributeCondition),
    Predicate(Box<dyn Fn(Option<&AttributeValue>) -> bool + Send + Sync>),
}

/// Keeps records whose named attribute satisfies a condition.
///
/// The condition is either a declarative [`AttributeCondition`] (the form
/// [`WranglerConfig`](super::WranglerConfig) can express) or an arbitrary
/// predicate over the attribute value.
pub struct AttributeFilter {
    core: WranglerCore,
    attribute: String,
    pass: AttributePass,
}

impl AttributeFilter {
    pub fn new(attribute: impl Into<String>, condition: AttributeCondition) -> Self {
        Self {
            core: WranglerCore::new(),
            attribute: attribute.into(),
            pass: AttributePass::Condition(condition),
        }
    }

    /// A filter judging the attribute with an arbitrary predicate.
    ///
    /// The predicate sees `None` when the record lacks the attribute.
    pub fn with_predicate<F>(attribute: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(Option<&AttributeValue>) -> bool + Send + Sync + 'static,
    {
        Self {
            core: WranglerCore::new(),
            attribute: attribute.into(),
            pass: AttributePass::Predicate(Box::new(predicate)),
        }
    }
}

impl OccurrenceWrangler for AttributeFilter {
    fn name(&self) -> &str {
        "AttributeFilter"
    }

    fn core(&self) -> &WranglerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut WranglerCore {
        &mut self.core
    }

    fn passes(&mut self, occurrence: &Occurrence) -> bool {
        let value = occurrence.get_attribute(&self.attribute);
        match &self.pass {
            AttributePass::Condition(condition) => condition.check(value),
            AttributePass::Predicate(predicate) => predicate(value),
        }
    }
}

/// Keeps records falling outside every supplied geometry.
///
/// The geometries are decomposed into an internal [`SpatialIndex`], so large
/// polygon sets stay cheap to test against.
pub struct DisjointGeometriesFilter {
    core: WranglerCore,
    geom_index: SpatialIndex,
}

impl DisjointGeometriesFilter {
    /// Builds the filter from WKT geometries.
    ///
    /// # Errors
    ///
    /// Returns [`BiotopeError::GeometryParse`](crate::BiotopeError::GeometryParse)
    /// or [`BiotopeError::InvalidGeometry`](crate::BiotopeError::InvalidGeometry)
    /// when a WKT cannot be indexed.
    pub fn new<S: AsRef<str>>(geometry_wkts: &[S]) -> Result<Self> {
        let mut geom_index = SpatialIndex::memory();
        for (feature_id, wkt) in geometry_wkts.iter().enumerate() {
            let mut attributes = Attributes::new();
            attributes.insert("feature_id".to_string(), (feature_id as i64).into());
            geom_index.add_feature(feature_id, wkt.as_ref(), attributes)?;
        }
        Ok(Self {
            core: WranglerCore::new(),
            geom_index,
        })
    }
}

impl OccurrenceWrangler for DisjointGeometriesFilter {
    fn name(&self) -> &str {
        "DisjointGeometriesFilter"
    }

    fn core(&self) -> &WranglerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut WranglerCore {
        &mut self.core
    }

    fn passes(&mut self, occurrence: &Occurrence) -> bool {
        self.geom_index
            .search(occurrence.x(), occurrence.y())
            .is_empty()
    }
}

/// Keeps records falling inside at least one supplied geometry.
pub struct IntersectGeometriesFilter {
    core: WranglerCore,
    geometries: Vec<MultiPolygon<f64>>,
}

impl IntersectGeometriesFilter {
    /// Builds the filter from WKT geometries.
    ///
    /// # Errors
    ///
    /// Returns [`BiotopeError::GeometryParse`](crate::BiotopeError::GeometryParse)
    /// or [`BiotopeError::InvalidGeometry`](crate::BiotopeError::InvalidGeometry)
    /// when a WKT does not describe an areal geometry.
    pub fn new<S: AsRef<str>>(geometry_wkts: &[S]) -> Result<Self> {
        let geometries = geometry_wkts
            .iter()
            .map(|wkt| geom::parse_wkt(wkt.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            core: WranglerCore::new(),
            geometries,
        })
    }
}

impl OccurrenceWrangler for IntersectGeometriesFilter {
    fn name(&self) -> &str {
        "IntersectGeometriesFilter"
    }

    fn core(&self) -> &WranglerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut WranglerCore {
        &mut self.core
    }

    fn passes(&mut self, occurrence: &Occurrence) -> bool {
        let inside = self
            .geometries
            .iter()
            .any(|geometry| geom::covers_point(geometry, occurrence.x(), occurrence.y()));
        if !inside {
            log::debug!(
                "{} at ({}, {}) fails intersect test",
                occurrence.species_name(),
                occurrence.x(),
                occurrence.y()
            );
        }
        inside
    }
}

/// Hit-acceptance test used by [`SpatialIndexFilter`]: judges a hit's
/// attribute record against the accepted values for the record's species.
type HitMatcher = Box<dyn Fn(&Attributes, &[AttributeValue]) -> bool + Send + Sync>;

/// Keeps records whose index hits carry an accepted value for their species.
///
/// `intersections` maps a normalized species name to the attribute values
/// accepted for it. A record passes when its species is not mapped (or maps
/// to an empty list), or when at least one feature containing the record's
/// coordinates satisfies the hit matcher. The default matcher accepts a hit
/// that carries an accepted value under `hit_attribute`;
/// [`with_matcher`](Self::with_matcher) swaps in an arbitrary test.
pub struct SpatialIndexFilter {
    core: WranglerCore,
    index: SpatialIndex,
    intersections: FxHashMap<String, Vec<AttributeValue>>,
    matcher: HitMatcher,
}

impl SpatialIndexFilter {
    pub fn new(
        index: SpatialIndex,
        hit_attribute: impl Into<String>,
        intersections: FxHashMap<String, Vec<AttributeValue>>,
    ) -> Self {
        let attribute = hit_attribute.into();
        Self::with_matcher(index, intersections, move |hit, accepted| {
            hit.get(&attribute).is_some_and(|value| accepted.contains(value))
        })
    }

    /// Builds the filter with a custom hit matcher in place of the
    /// attribute-equality test.
    pub fn with_matcher<F>(
        index: SpatialIndex,
        intersections: FxHashMap<String, Vec<AttributeValue>>,
        matcher: F,
    ) -> Self
    where
        F: Fn(&Attributes, &[AttributeValue]) -> bool + Send + Sync + 'static,
    {
        Self {
            core: WranglerCore::new(),
            index,
            intersections,
            matcher: Box::new(matcher),
        }
    }

    /// Opens the backing index from its storage location, then builds the
    /// filter.
    pub fn open<P: AsRef<std::path::Path>>(
        path: P,
        hit_attribute: impl Into<String>,
        intersections: FxHashMap<String, Vec<AttributeValue>>,
    ) -> Result<Self> {
        Ok(Self::new(
            SpatialIndex::open(path)?,
            hit_attribute,
            intersections,
        ))
    }
}

impl OccurrenceWrangler for SpatialIndexFilter {
    fn name(&self) -> &str {
        "SpatialIndexFilter"
    }

    fn core(&self) -> &WranglerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut WranglerCore {
        &mut self.core
    }

    fn passes(&mut self, occurrence: &Occurrence) -> bool {
        let accepted = match self.intersections.get(occurrence.species_name()) {
            Some(accepted) if !accepted.is_empty() => accepted,
            _ => return true,
        };
        self.index
            .search(occurrence.x(), occurrence.y())
            .values()
            .any(|hit| (self.matcher)(hit, accepted))
    }
}
