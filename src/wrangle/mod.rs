//! Occurrence wrangling: composable cleaning passes over observation data.
//!
//! A wrangler inspects a batch of [`Occurrence`] records and either modifies
//! them, filters them, or both. Wranglers share a common lifecycle driven by
//! [`OccurrenceWrangler::wrangle`]: each record is first offered for
//! modification, then checked against the wrangler's pass condition. A
//! failing record is normally dropped; with an [`Assessment`] attached the
//! record is kept and annotated with a pass/fail attribute instead, so
//! downstream tooling can see what would have been removed.
//!
//! Wranglers are chained with [`WranglerPipeline`] and built from JSON
//! configuration via [`factory::wranglers_from_json`].
//!
//! # Examples
//!
//! ```rust
//! use biotope::wrangle::filters::BoundingBoxFilter;
//! use biotope::wrangle::{OccurrenceWrangler, WranglerPipeline};
//! use biotope::Occurrence;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let occurrences = vec![
//!     Occurrence::new("Quercus alba", -89.6, 37.8)?,
//!     Occurrence::new("Quercus alba", 4.9, 52.4)?,
//! ];
//!
//! let mut pipeline = WranglerPipeline::new()
//!     .with(Box::new(BoundingBoxFilter::new(-180.0, 0.0, 0.0, 90.0)));
//! let kept = pipeline.wrangle(occurrences);
//!
//! assert_eq!(kept.len(), 1);
//! assert_eq!(pipeline.reports()[0].filtered, 1);
//! # Ok(())
//! # }
//! ```

pub mod factory;
pub mod filters;
pub mod modifiers;

use serde::{Deserialize, Serialize};

use crate::occurrence::{AttributeValue, Occurrence};

pub use factory::{WranglerConfig, build_wrangler, wranglers_from_json};
pub use filters::{
    AttributeCondition, AttributeFilter, BoundingBoxFilter, DecimalPrecisionFilter,
    DisjointGeometriesFilter, IntersectGeometriesFilter, MinimumPointsFilter, SpatialIndexFilter,
    UniqueLocalitiesFilter,
};
pub use modifiers::{AttributeModifier, CommonFormatModifier};

/// Annotate-instead-of-drop configuration for a wrangler.
///
/// With an assessment attached, records failing the pass condition are kept
/// and the named attribute is set to `fail_value` (`pass_value` otherwise).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Attribute to write the assessment into.
    pub attribute: String,
    /// Value stored when the record passes.
    #[serde(default = "Assessment::default_pass_value")]
    pub pass_value: AttributeValue,
    /// Value stored when the record fails.
    #[serde(default = "Assessment::default_fail_value")]
    pub fail_value: AttributeValue,
}

impl Assessment {
    const fn default_pass_value() -> AttributeValue {
        AttributeValue::Int(0)
    }

    const fn default_fail_value() -> AttributeValue {
        AttributeValue::Int(1)
    }

    /// An assessment writing 0 (pass) or 1 (fail) into `attribute`.
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            pass_value: Self::default_pass_value(),
            fail_value: Self::default_fail_value(),
        }
    }

    /// Overrides the stored pass/fail values.
    pub fn with_values(
        mut self,
        pass_value: impl Into<AttributeValue>,
        fail_value: impl Into<AttributeValue>,
    ) -> Self {
        self.pass_value = pass_value.into();
        self.fail_value = fail_value.into();
        self
    }
}

/// Counters and outcome summary of one wrangler run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WranglerReport {
    /// Wrangler name.
    pub name: String,
    /// Wrangler version.
    pub version: String,
    /// Records examined.
    pub assessed: usize,
    /// Records changed in place (including assessment annotations).
    pub modified: usize,
    /// Records that failed the pass condition.
    pub filtered: usize,
}

/// Shared bookkeeping every wrangler carries: counters plus the optional
/// assessment.
#[derive(Debug, Default)]
pub struct WranglerCore {
    assessment: Option<Assessment>,
    assessed: usize,
    modified: usize,
    filtered: usize,
}

impl WranglerCore {
    /// A core with no assessment attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// The attached assessment, if any.
    pub fn assessment(&self) -> Option<&Assessment> {
        self.assessment.as_ref()
    }

    /// Attaches or replaces the assessment.
    pub fn set_assessment(&mut self, assessment: Option<Assessment>) {
        self.assessment = assessment;
    }

    fn record(&mut self, filtered: bool, modified: bool) {
        self.assessed += 1;
        self.filtered += usize::from(filtered);
        self.modified += usize::from(modified);
    }
}

/// One cleaning pass over occurrence records.
///
/// Implementors override [`modify`](Self::modify) and/or
/// [`passes`](Self::passes); the provided [`wrangle`](Self::wrangle) drives
/// the shared lifecycle and keeps the counters in
/// [`WranglerCore`](Self::core) current.
pub trait OccurrenceWrangler {
    /// The wrangler's name, used in reports.
    fn name(&self) -> &str;

    /// The wrangler's version, used in reports.
    fn version(&self) -> &str {
        "1.0"
    }

    /// Shared bookkeeping, read side.
    fn core(&self) -> &WranglerCore;

    /// Shared bookkeeping, write side.
    fn core_mut(&mut self) -> &mut WranglerCore;

    /// Modifies the record in place. Returns whether anything changed.
    fn modify(&mut self, _occurrence: &mut Occurrence) -> bool {
        false
    }

    /// Whether the record passes. The default accepts everything.
    fn passes(&mut self, _occurrence: &Occurrence) -> bool {
        true
    }

    /// Called once per batch before any per-record work. Batch-scoped
    /// wranglers reset or precompute state here.
    fn begin_batch(&mut self, _occurrences: &[Occurrence]) {}

    /// Attaches an assessment, switching the wrangler from dropping failing
    /// records to annotating them.
    fn with_assessment(mut self, assessment: Assessment) -> Self
    where
        Self: Sized,
    {
        self.core_mut().set_assessment(Some(assessment));
        self
    }

    /// Runs one record through the modify/assess lifecycle. `None` means the
    /// record was dropped.
    fn wrangle_one(&mut self, mut occurrence: Occurrence) -> Option<Occurrence> {
        let mut is_modified = self.modify(&mut occurrence);
        let is_filtered = !self.passes(&occurrence);

        let keep = match self.core().assessment().cloned() {
            Some(assessment) => {
                let value = if is_filtered {
                    assessment.fail_value
                } else {
                    assessment.pass_value
                };
                occurrence.set_attribute(&assessment.attribute, value);
                is_modified = true;
                true
            }
            None => !is_filtered,
        };

        self.core_mut().record(is_filtered, is_modified);
        if is_filtered {
            log::trace!("{} filtered a record", self.name());
        }
        keep.then_some(occurrence)
    }

    /// Runs a whole batch through the wrangler, dropping filtered records.
    fn wrangle(&mut self, occurrences: Vec<Occurrence>) -> Vec<Occurrence> {
        self.begin_batch(&occurrences);
        let mut kept = Vec::with_capacity(occurrences.len());
        for occurrence in occurrences {
            if let Some(occurrence) = self.wrangle_one(occurrence) {
                kept.push(occurrence);
            }
        }
        kept
    }

    /// Summarizes what the wrangler did so far.
    fn report(&self) -> WranglerReport {
        let core = self.core();
        WranglerReport {
            name: self.name().to_string(),
            version: self.version().to_string(),
            assessed: core.assessed,
            modified: core.modified,
            filtered: core.filtered,
        }
    }
}

/// An ordered chain of wranglers applied in sequence.
#[derive(Default)]
pub struct WranglerPipeline {
    wranglers: Vec<Box<dyn OccurrenceWrangler>>,
}

impl WranglerPipeline {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a pipeline from a JSON array of wrangler configurations. See
    /// [`factory::wranglers_from_json`] for the accepted document shape.
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(Self {
            wranglers: wranglers_from_json(json)?,
        })
    }

    /// Appends a wrangler, builder style.
    pub fn with(mut self, wrangler: Box<dyn OccurrenceWrangler>) -> Self {
        self.wranglers.push(wrangler);
        self
    }

    /// Appends a wrangler.
    pub fn push(&mut self, wrangler: Box<dyn OccurrenceWrangler>) {
        self.wranglers.push(wrangler);
    }

    /// Number of wranglers in the pipeline.
    pub fn len(&self) -> usize {
        self.wranglers.len()
    }

    /// Whether the pipeline holds no wranglers.
    pub fn is_empty(&self) -> bool {
        self.wranglers.is_empty()
    }

    /// Runs the batch through every wrangler in order. Records dropped by an
    /// earlier wrangler never reach a later one.
    pub fn wrangle(&mut self, occurrences: Vec<Occurrence>) -> Vec<Occurrence> {
        self.wranglers
            .iter_mut()
            .fold(occurrences, |batch, wrangler| wrangler.wrangle(batch))
    }

    /// Reports for every wrangler, in pipeline order.
    pub fn reports(&self) -> Vec<WranglerReport> {
        self.wranglers.iter().map(|w| w.report()).collect()
    }
}
