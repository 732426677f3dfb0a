//! Modifying wranglers: rewrite occurrence records without dropping any.

use rustc_hash::FxHashMap;

use super::{OccurrenceWrangler, WranglerCore};
use crate::occurrence::{AttributeValue, Attributes, Occurrence};

/// Rewrites one attribute through a value mapping.
///
/// The current value is matched by its string rendering (so `Int(5)` matches
/// the key `"5"`), replaced by the mapped value, or by the configured default
/// when unmapped. Records always count as modified: the attribute is written
/// on every record, mapped or not.
#[derive(Debug)]
pub struct AttributeModifier {
    core: WranglerCore,
    attribute: String,
    mapping: FxHashMap<String, AttributeValue>,
    default: AttributeValue,
}

impl AttributeModifier {
    /// A modifier replacing unmapped values with `Null`.
    pub fn new(attribute: impl Into<String>, mapping: FxHashMap<String, AttributeValue>) -> Self {
        Self {
            core: WranglerCore::new(),
            attribute: attribute.into(),
            mapping,
            default: AttributeValue::Null,
        }
    }

    /// Overrides the value written for unmapped inputs.
    pub fn with_default(mut self, default: impl Into<AttributeValue>) -> Self {
        self.default = default.into();
        self
    }
}

impl OccurrenceWrangler for AttributeModifier {
    fn name(&self) -> &str {
        "AttributeModifier"
    }

    fn core(&self) -> &WranglerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut WranglerCore {
        &mut self.core
    }

    fn modify(&mut self, occurrence: &mut Occurrence) -> bool {
        let replacement = occurrence
            .get_attribute(&self.attribute)
            .map(|value| value.to_string())
            .and_then(|key| self.mapping.get(&key))
            .cloned()
            .unwrap_or_else(|| self.default.clone());
        occurrence.set_attribute(&self.attribute, replacement);
        true
    }
}

/// Rebuilds each record's attributes through a source-to-target name map.
///
/// Only mapped attributes survive, under their target names; a mapped source
/// that is absent comes through as `Null`. The species name and coordinates
/// are carried over untouched (and stay mirrored in the attribute record).
#[derive(Debug)]
pub struct CommonFormatModifier {
    core: WranglerCore,
    attribute_map: FxHashMap<String, String>,
}

impl CommonFormatModifier {
    pub fn new(attribute_map: FxHashMap<String, String>) -> Self {
        Self {
            core: WranglerCore::new(),
            attribute_map,
        }
    }
}

impl OccurrenceWrangler for CommonFormatModifier {
    fn name(&self) -> &str {
        "CommonFormatModifier"
    }

    fn core(&self) -> &WranglerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut WranglerCore {
        &mut self.core
    }

    fn modify(&mut self, occurrence: &mut Occurrence) -> bool {
        let mut remapped = Attributes::new();
        for (source, target) in &self.attribute_map {
            let value = occurrence
                .get_attribute(source)
                .cloned()
                .unwrap_or(AttributeValue::Null);
            remapped.insert(target.clone(), value);
        }
        // The species name comes from a valid record, so rebuilding with it
        // cannot fail.
        match Occurrence::with_attributes(
            occurrence.species_name(),
            occurrence.x(),
            occurrence.y(),
            remapped,
        ) {
            Ok(rebuilt) => {
                *occurrence = rebuilt;
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(species: &str, key: &str, value: AttributeValue) -> Occurrence {
        let mut attributes = Attributes::new();
        attributes.insert(key.to_string(), value);
        Occurrence::with_attributes(species, 1.0, 2.0, attributes).unwrap()
    }

    #[test]
    fn test_attribute_modifier_maps_values() {
        let mut mapping = FxHashMap::default();
        mapping.insert("EX".to_string(), AttributeValue::from("extinct"));
        mapping.insert("LC".to_string(), AttributeValue::from("least_concern"));
        let mut modifier = AttributeModifier::new("iucn", mapping);

        let kept = modifier.wrangle(vec![
            tagged("A a", "iucn", "EX".into()),
            tagged("A a", "iucn", "??".into()),
        ]);
        assert_eq!(
            kept[0].get_attribute("iucn").and_then(|v| v.as_str()),
            Some("extinct")
        );
        assert!(kept[1].get_attribute("iucn").is_some_and(|v| v.is_null()));

        let report = modifier.report();
        assert_eq!(report.modified, 2);
        assert_eq!(report.filtered, 0);
    }

    #[test]
    fn test_attribute_modifier_matches_numeric_rendering() {
        let mut mapping = FxHashMap::default();
        mapping.insert("5".to_string(), AttributeValue::from("five"));
        let mut modifier = AttributeModifier::new("code", mapping);

        let kept = modifier.wrangle(vec![tagged("A a", "code", AttributeValue::Int(5))]);
        assert_eq!(
            kept[0].get_attribute("code").and_then(|v| v.as_str()),
            Some("five")
        );
    }

    #[test]
    fn test_attribute_modifier_custom_default() {
        let mut modifier =
            AttributeModifier::new("status", FxHashMap::default()).with_default("unknown");
        let kept = modifier.wrangle(vec![tagged("A a", "status", "whatever".into())]);
        assert_eq!(
            kept[0].get_attribute("status").and_then(|v| v.as_str()),
            Some("unknown")
        );
    }

    #[test]
    fn test_common_format_renames_and_drops() {
        let mut map = FxHashMap::default();
        map.insert("lat".to_string(), "latitude".to_string());
        map.insert("collector".to_string(), "recorded_by".to_string());
        let mut modifier = CommonFormatModifier::new(map);

        let mut attributes = Attributes::new();
        attributes.insert("lat".to_string(), AttributeValue::Float(52.4));
        attributes.insert("junk".to_string(), "discard me".into());
        let record = Occurrence::with_attributes("A a", 4.9, 52.4, attributes).unwrap();

        let kept = modifier.wrangle(vec![record]);
        let record = &kept[0];
        assert_eq!(
            record.get_attribute("latitude").and_then(|v| v.as_f64()),
            Some(52.4)
        );
        // Mapped but absent sources come through as Null.
        assert!(record.get_attribute("recorded_by").is_some_and(|v| v.is_null()));
        assert!(record.get_attribute("junk").is_none());
        assert!(record.get_attribute("lat").is_none());
    }

    #[test]
    fn test_common_format_keeps_core_fields() {
        let mut modifier = CommonFormatModifier::new(FxHashMap::default());
        let kept = modifier.wrangle(vec![Occurrence::new("picea ABIES", 15.3, 61.0).unwrap()]);
        let record = &kept[0];
        assert_eq!(record.species_name(), "Picea abies");
        assert_eq!(record.x(), 15.3);
        assert_eq!(
            record.get_attribute("y").and_then(|v| v.as_f64()),
            Some(61.0)
        );
    }
}
