//! Occurrence records and their attribute values.
//!
//! An [`Occurrence`] is one observation of a species at a coordinate, plus a
//! free-form attribute record. The species name and coordinates are mirrored
//! into the attribute map so wranglers can treat every field uniformly.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BiotopeError, Result};

/// Attribute key mirroring the species name.
pub const SPECIES_NAME_KEY: &str = "species_name";
/// Attribute key mirroring the x coordinate.
pub const X_KEY: &str = "x";
/// Attribute key mirroring the y coordinate.
pub const Y_KEY: &str = "y";

/// A scalar attribute value, round-trippable through JSON without tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Explicit absence of a value.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Integer number.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Free text.
    Text(String),
}

impl AttributeValue {
    /// The contained boolean, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// The contained number as `f64`; integers promote.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(value) => Some(*value as f64),
            AttributeValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// The contained text, if this is a `Text`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Whether this is the `Null` value.
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "null"),
            AttributeValue::Bool(value) => write!(f, "{value}"),
            AttributeValue::Int(value) => write!(f, "{value}"),
            AttributeValue::Float(value) => write!(f, "{value}"),
            AttributeValue::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(value.into())
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

/// A string-keyed attribute record.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// One species observation at a coordinate.
///
/// The species name is normalized on construction (first letter uppercased,
/// remainder lowercased) and the three core fields are kept mirrored in the
/// attribute map under [`SPECIES_NAME_KEY`], [`X_KEY`], and [`Y_KEY`].
///
/// # Examples
///
/// ```rust
/// use biotope::Occurrence;
///
/// let occ = Occurrence::new("quercus ALBA", -89.6, 37.8)?;
/// assert_eq!(occ.species_name(), "Quercus alba");
/// assert_eq!(occ.get_attribute("x").and_then(|v| v.as_f64()), Some(-89.6));
/// # Ok::<(), biotope::BiotopeError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    species_name: String,
    x: f64,
    y: f64,
    attributes: Attributes,
}

impl Occurrence {
    /// Creates an occurrence with an empty attribute record.
    ///
    /// # Errors
    ///
    /// Returns [`BiotopeError::InvalidInput`] for an empty species name.
    pub fn new(species_name: &str, x: f64, y: f64) -> Result<Self> {
        Self::with_attributes(species_name, x, y, Attributes::new())
    }

    /// Creates an occurrence carrying extra attributes.
    ///
    /// The core fields overwrite any same-named keys in `attributes`.
    pub fn with_attributes(
        species_name: &str,
        x: f64,
        y: f64,
        attributes: Attributes,
    ) -> Result<Self> {
        if species_name.is_empty() {
            return Err(BiotopeError::InvalidInput(
                "species name cannot be empty".to_string(),
            ));
        }
        let species_name = normalize_species(species_name);
        let mut occurrence = Occurrence {
            species_name: species_name.clone(),
            x,
            y,
            attributes,
        };
        occurrence
            .attributes
            .insert(SPECIES_NAME_KEY.to_string(), species_name.into());
        occurrence.attributes.insert(X_KEY.to_string(), x.into());
        occurrence.attributes.insert(Y_KEY.to_string(), y.into());
        Ok(occurrence)
    }

    /// The normalized species name.
    pub fn species_name(&self) -> &str {
        &self.species_name
    }

    /// The x coordinate (longitude for geographic data).
    pub fn x(&self) -> f64 {
        self.x
    }

    /// The y coordinate (latitude for geographic data).
    pub fn y(&self) -> f64 {
        self.y
    }

    /// The full attribute record, core fields included.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Looks up one attribute.
    pub fn get_attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Sets one attribute. Writes to a core key (`species_name`, `x`, `y`)
    /// update the corresponding field too, normalizing the species name.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<AttributeValue>) {
        let value = value.into();
        match name {
            SPECIES_NAME_KEY => {
                if let AttributeValue::Text(text) = &value {
                    self.species_name = normalize_species(text);
                    self.attributes
                        .insert(name.to_string(), self.species_name.clone().into());
                    return;
                }
            }
            X_KEY => {
                if let Some(number) = value.as_f64() {
                    self.x = number;
                }
            }
            Y_KEY => {
                if let Some(number) = value.as_f64() {
                    self.y = number;
                }
            }
            _ => {}
        }
        self.attributes.insert(name.to_string(), value);
    }
}

fn normalize_species(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}
