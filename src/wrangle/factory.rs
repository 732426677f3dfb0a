//! Configuration-driven wrangler construction.
//!
//! A cleaning run is described by a JSON array of wrangler configurations,
//! each tagged with a `wrangler_type`:
//!
//! ```json
//! [
//!     {"wrangler_type": "bbox_filter",
//!      "min_x": -180.0, "min_y": -90.0, "max_x": 180.0, "max_y": 90.0},
//!     {"wrangler_type": "decimal_precision_filter",
//!      "decimal_precision": 2,
//!      "store_attribute": "imprecise"},
//!     {"wrangler_type": "unique_localities_filter"}
//! ]
//! ```
//!
//! `store_attribute` (with optional `pass_value`/`fail_value`) switches any
//! filter into assessment mode; see [`Assessment`](super::Assessment).

use std::path::PathBuf;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::filters::{
    AttributeCondition, AttributeFilter, BoundingBoxFilter, DecimalPrecisionFilter,
    DisjointGeometriesFilter, IntersectGeometriesFilter, MinimumPointsFilter, SpatialIndexFilter,
    UniqueLocalitiesFilter,
};
use super::modifiers::{AttributeModifier, CommonFormatModifier};
use super::{Assessment, OccurrenceWrangler};
use crate::error::{BiotopeError, Result};
use crate::occurrence::AttributeValue;

/// Shared assessment knobs accepted by every filter configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentConfig {
    /// Attribute to store the assessment in; absent means filter mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_attribute: Option<String>,
    /// Value stored on pass (default 0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_value: Option<AttributeValue>,
    /// Value stored on fail (default 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_value: Option<AttributeValue>,
}

impl AssessmentConfig {
    fn to_assessment(&self) -> Option<Assessment> {
        self.store_attribute.as_ref().map(|attribute| {
            let mut assessment = Assessment::new(attribute);
            if let Some(pass_value) = &self.pass_value {
                assessment.pass_value = pass_value.clone();
            }
            if let Some(fail_value) = &self.fail_value {
                assessment.fail_value = fail_value.clone();
            }
            assessment
        })
    }
}

fn default_reset() -> bool {
    true
}

/// One wrangler configuration, tagged by `wrangler_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "wrangler_type", rename_all = "snake_case")]
pub enum WranglerConfig {
    /// [`AttributeFilter`]
    AttributeFilter {
        attribute_name: String,
        condition: AttributeCondition,
        #[serde(flatten)]
        assessment: AssessmentConfig,
    },
    /// [`BoundingBoxFilter`]
    BboxFilter {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        #[serde(flatten)]
        assessment: AssessmentConfig,
    },
    /// [`DecimalPrecisionFilter`]
    DecimalPrecisionFilter {
        decimal_precision: usize,
        #[serde(flatten)]
        assessment: AssessmentConfig,
    },
    /// [`DisjointGeometriesFilter`]
    DisjointGeometriesFilter {
        geometry_wkts: Vec<String>,
        #[serde(flatten)]
        assessment: AssessmentConfig,
    },
    /// [`IntersectGeometriesFilter`]
    IntersectGeometriesFilter {
        geometry_wkts: Vec<String>,
        #[serde(flatten)]
        assessment: AssessmentConfig,
    },
    /// [`MinimumPointsFilter`]
    MinimumPointsFilter {
        minimum_points: usize,
        #[serde(flatten)]
        assessment: AssessmentConfig,
    },
    /// [`SpatialIndexFilter`]; the index is opened from `index_path`.
    SpatialIndexFilter {
        index_path: PathBuf,
        hit_attribute: String,
        species: FxHashMap<String, Vec<AttributeValue>>,
        #[serde(flatten)]
        assessment: AssessmentConfig,
    },
    /// [`UniqueLocalitiesFilter`]
    UniqueLocalitiesFilter {
        #[serde(default = "default_reset")]
        reset_per_batch: bool,
        #[serde(flatten)]
        assessment: AssessmentConfig,
    },
    /// [`AttributeModifier`]
    AttributeModifier {
        attribute_name: String,
        map_values: FxHashMap<String, AttributeValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<AttributeValue>,
    },
    /// [`CommonFormatModifier`]
    AttributeMapModifier {
        attribute_mapping: FxHashMap<String, String>,
    },
}

/// Builds the wrangler a configuration describes.
///
/// # Errors
///
/// Geometry-backed configurations propagate parse failures; everything else
/// is infallible once deserialized.
pub fn build_wrangler(config: WranglerConfig) -> Result<Box<dyn OccurrenceWrangler>> {
    let wrangler: Box<dyn OccurrenceWrangler> = match config {
        WranglerConfig::AttributeFilter {
            attribute_name,
            condition,
            assessment,
        } => boxed(AttributeFilter::new(attribute_name, condition), &assessment),
        WranglerConfig::BboxFilter {
            min_x,
            min_y,
            max_x,
            max_y,
            assessment,
        } => boxed(BoundingBoxFilter::new(min_x, min_y, max_x, max_y), &assessment),
        WranglerConfig::DecimalPrecisionFilter {
            decimal_precision,
            assessment,
        } => boxed(DecimalPrecisionFilter::new(decimal_precision), &assessment),
        WranglerConfig::DisjointGeometriesFilter {
            geometry_wkts,
            assessment,
        } => boxed(DisjointGeometriesFilter::new(&geometry_wkts)?, &assessment),
        WranglerConfig::IntersectGeometriesFilter {
            geometry_wkts,
            assessment,
        } => boxed(IntersectGeometriesFilter::new(&geometry_wkts)?, &assessment),
        WranglerConfig::MinimumPointsFilter {
            minimum_points,
            assessment,
        } => boxed(MinimumPointsFilter::new(minimum_points), &assessment),
        WranglerConfig::SpatialIndexFilter {
            index_path,
            hit_attribute,
            species,
            assessment,
        } => boxed(
            SpatialIndexFilter::open(index_path, hit_attribute, species)?,
            &assessment,
        ),
        WranglerConfig::UniqueLocalitiesFilter {
            reset_per_batch,
            assessment,
        } => boxed(UniqueLocalitiesFilter::with_reset(reset_per_batch), &assessment),
        WranglerConfig::AttributeModifier {
            attribute_name,
            map_values,
            default_value,
        } => {
            let mut modifier = AttributeModifier::new(attribute_name, map_values);
            if let Some(default_value) = default_value {
                modifier = modifier.with_default(default_value);
            }
            Box::new(modifier)
        }
        WranglerConfig::AttributeMapModifier { attribute_mapping } => {
            Box::new(CommonFormatModifier::new(attribute_mapping))
        }
    };
    Ok(wrangler)
}

fn boxed<W: OccurrenceWrangler + 'static>(
    wrangler: W,
    assessment: &AssessmentConfig,
) -> Box<dyn OccurrenceWrangler> {
    match assessment.to_assessment() {
        Some(assessment) => Box::new(wrangler.with_assessment(assessment)),
        None => Box::new(wrangler),
    }
}

/// Builds wranglers from a JSON array of configurations.
///
/// # Errors
///
/// Returns [`BiotopeError::InvalidConfig`] when the document does not
/// deserialize, plus whatever [`build_wrangler`] reports.
pub fn wranglers_from_json(json: &str) -> Result<Vec<Box<dyn OccurrenceWrangler>>> {
    let configs: Vec<WranglerConfig> =
        serde_json::from_str(json).map_err(|e| BiotopeError::InvalidConfig(e.to_string()))?;
    configs.into_iter().map(build_wrangler).collect()
}
