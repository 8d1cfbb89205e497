use log::warn;
use serde_json::{Map, Value};

use crate::audit::keys::{KeyCategory, KeyClassifier};
use crate::audit::street::StreetNameFixer;
use crate::data::osm::{Element, ElementType, Tag};
use crate::data::record::ShapedRecord;
use crate::errors::{Error, ErrorKind, Result};

pub const ADDRESS_PREFIX: &str = "addr:";

/// Top-level fields owned by the shaper. Tags never overwrite them.
pub const RESERVED_FIELDS: [&str; 7] = ["id", "type", "visible", "pos", "created", "address", "node_refs"];

pub struct Shaper {
    classifier: KeyClassifier,
    street_names: Option<StreetNameFixer>,
}

impl Shaper {
    pub fn new(classifier: KeyClassifier) -> Shaper {
        Shaper {
            classifier,
            street_names: None,
        }
    }

    /// Street names under `address.street` are corrected with `fixer`.
    pub fn with_street_names(mut self, fixer: StreetNameFixer) -> Shaper {
        self.street_names = Some(fixer);
        self
    }

    pub fn classifier(&self) -> &KeyClassifier {
        &self.classifier
    }

    /// Cleans problem characters out of a key and lowercases keys that are
    /// only upper or mixed case letters.
    pub fn normalize_key(&self, key: &str) -> String {
        let key = if self.classifier.has_problem_chars(key) {
            self.classifier.sanitize(key)
        } else {
            key.to_string()
        };
        match self.classifier.classify(&key) {
            KeyCategory::Upper | KeyCategory::UpperColon => key.to_lowercase(),
            _ => key,
        }
    }

    pub fn shape(&self, element: &Element) -> Result<ShapedRecord> {
        let element_name = element.element_type.as_str();
        let id = element.id.as_deref()
            .ok_or_else(|| Error::missing_attribute(element_name, "id"))?;

        let mut fields = Map::new();
        let mut address = Map::new();
        for tag in &element.tags {
            self.apply_tag(&mut fields, &mut address, tag, id);
        }

        fields.insert("id".to_string(), Value::from(id));
        fields.insert("type".to_string(), Value::from(element_name));

        if let Some(visible) = element.visible.as_deref() {
            fields.insert("visible".to_string(), Value::Bool(parse_visible(visible, id)?));
        }

        let created: Map<String, Value> = element.created.fields()
            .map(|(name, value)| (name.to_string(), Value::from(value)))
            .collect();
        fields.insert("created".to_string(), Value::Object(created));

        if let (Some(lat), Some(lon)) = (element.lat.as_deref(), element.lon.as_deref()) {
            let lat = parse_coordinate(lat, "lat", element_name, id)?;
            let lon = parse_coordinate(lon, "lon", element_name, id)?;
            fields.insert("pos".to_string(), Value::Array(vec![Value::from(lat), Value::from(lon)]));
        }

        if !address.is_empty() {
            fields.insert("address".to_string(), Value::Object(address));
        }

        if element.element_type == ElementType::Way && !element.node_refs.is_empty() {
            let node_refs = element.node_refs.iter().map(|r| Value::from(r.as_str())).collect();
            fields.insert("node_refs".to_string(), Value::Array(node_refs));
        }

        Ok(ShapedRecord::from_fields(fields))
    }

    fn apply_tag(&self, fields: &mut Map<String, Value>, address: &mut Map<String, Value>, tag: &Tag, id: &str) {
        let key = self.normalize_key(&tag.key);
        let colons = key.matches(':').count();

        if colons == 1 {
            if let Some(field) = key.strip_prefix(ADDRESS_PREFIX).filter(|field| !field.is_empty()) {
                let value = match (&self.street_names, field == "street") {
                    (Some(fixer), true) => fixer.update_name(&tag.value),
                    _ => tag.value.clone(),
                };
                address.insert(field.to_string(), Value::String(value));
                return;
            }
        }

        // Empty segments are dropped, so `a::b` nests like `a:b:c` minus one level.
        let segments: Vec<&str> = if colons >= 2 {
            key.split(':').filter(|segment| !segment.is_empty()).collect()
        } else {
            vec![key.as_str()]
        };
        let Some(&field) = segments.first().filter(|field| !field.is_empty()) else {
            warn!(id = id, key = tag.key.as_str(); "Tag key has no usable field name, skipping");
            return;
        };
        if RESERVED_FIELDS.contains(&field) {
            warn!(id = id, key = tag.key.as_str(); "Tag would overwrite a record field, skipping");
            return;
        }
        insert_nested(fields, &segments, Value::String(tag.value.clone()));
    }
}

/// Sets `path` inside `map`, creating mappings on the way down. Whatever was
/// in the way is replaced, so the last write wins.
fn insert_nested(map: &mut Map<String, Value>, path: &[&str], value: Value) {
    match path {
        [] => (),
        [leaf] => {
            map.insert(leaf.to_string(), value);
        },
        [head, rest @ ..] => {
            let child = map.entry(head.to_string()).or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(child_map) = child {
                insert_nested(child_map, rest, value);
            }
        },
    }
}

/// `f64` parsing accepts `NaN` and `inf`, which JSON cannot hold.
fn parse_coordinate(value: &str, name: &str, element_name: &str, id: &str) -> Result<f64> {
    let coordinate: f64 = value.trim().parse()
        .map_err(|err| Error::from(err).context(format_args!("{} {} {} {:?}", element_name, id, name, value)))?;
    if !coordinate.is_finite() {
        return Err(Error::new(
            ErrorKind::InvalidAttribute,
            format!("{} {} has non-finite {}={:?}", element_name, id, name, value),
        ));
    }
    Ok(coordinate)
}

fn parse_visible(value: &str, id: &str) -> Result<bool> {
    match value.trim() {
        v if v.eq_ignore_ascii_case("true") => Ok(true),
        v if v.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(Error::new(
            ErrorKind::InvalidAttribute,
            format!("element {} has visible={:?}, expected true or false", id, other),
        )),
    }
}

/// Shapes every node and way of an element stream. Relations are passed over.
pub fn shaped_records<'s, I>(elements: I, shaper: &'s Shaper) -> impl Iterator<Item = Result<ShapedRecord>> + 's
where
    I: Iterator<Item = Result<Element>> + 's,
{
    elements.filter_map(move |element| match element {
        Ok(element) if element.element_type.is_shapeable() => Some(shaper.shape(&element)),
        Ok(_) => None,
        Err(err) => Some(Err(err)),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::audit::street::StreetConfig;
    use crate::etl::parse_osm::fixtures::SAMPLE_OSM;
    use crate::etl::parse_osm::ElementReader;

    fn shaper() -> Shaper {
        Shaper::new(KeyClassifier::new().unwrap())
    }

    fn node(id: &str) -> Element {
        Element::new(ElementType::Node).with_id(id)
    }

    fn all_keys(value: &Value, keys: &mut Vec<String>) {
        if let Value::Object(map) = value {
            for (key, child) in map {
                keys.push(key.clone());
                all_keys(child, keys);
            }
        }
    }

    #[test]
    fn address_tags_nest_under_address() {
        let element = node("1").with_tag("addr:street", "High Street").with_tag("addr:postcode", "OX1 4AU");
        let record = shaper().shape(&element).unwrap();
        assert_eq!(record.get("address"), Some(&json!({"street": "High Street", "postcode": "OX1 4AU"})));
        assert!(!record.contains("addr:street"));
    }

    #[test]
    fn upper_case_keys_are_lowercased() {
        let record = shaper().shape(&node("1").with_tag("FIXME", "check")).unwrap();
        assert_eq!(record.get_str("fixme"), Some("check"));
        assert!(!record.contains("FIXME"));

        let record = shaper().shape(&node("1").with_tag("naptan:Street", "Cowley Road")).unwrap();
        assert_eq!(record.get_str("naptan:street"), Some("Cowley Road"));
    }

    #[test]
    fn problem_chars_are_substituted() {
        let element = node("1")
            .with_tag("name.en", "Taste of India")
            .with_tag("fish&chips", "yes")
            .with_tag("opening hours", "9-5");
        let record = shaper().shape(&element).unwrap();
        assert_eq!(record.get_str("name_en"), Some("Taste of India"));
        assert_eq!(record.get_str("fish_and_chips"), Some("yes"));
        assert_eq!(record.get_str("opening_hours"), Some("9-5"));
    }

    #[test]
    fn problem_keys_in_the_address_namespace_still_nest() {
        let record = shaper().shape(&node("1").with_tag("addr:house name", "Rose Cottage")).unwrap();
        assert_eq!(record.get("address"), Some(&json!({"house_name": "Rose Cottage"})));
    }

    #[test]
    fn multiple_colons_nest_one_level_per_colon() {
        let record = shaper().shape(&node("1").with_tag("a:b:c", "v")).unwrap();
        assert_eq!(record.get("a"), Some(&json!({"b": {"c": "v"}})));

        let record = shaper().shape(&node("1").with_tag("addr:street:name", "Broad")).unwrap();
        assert_eq!(record.get("addr"), Some(&json!({"street": {"name": "Broad"}})));
        assert!(!record.contains("address"));
    }

    #[test]
    fn empty_colon_segments_never_become_field_names() {
        let record = shaper().shape(&node("1").with_tag("a::b", "x")).unwrap();
        assert_eq!(record.get("a"), Some(&json!({"b": "x"})));

        let record = shaper().shape(&node("1").with_tag("addr:", "x")).unwrap();
        assert_eq!(record.get_str("addr:"), Some("x"));
        assert!(!record.contains("address"));

        let record = shaper().shape(&node("1").with_tag("::", "x").with_tag("", "y")).unwrap();
        assert_eq!(record.get("id"), Some(&json!("1")));
        assert!(!record.contains(""));
        assert!(!record.contains("::"));
    }

    #[test]
    fn nesting_conflicts_keep_the_last_value() {
        let element = node("1")
            .with_tag("a:b:c", "deep")
            .with_tag("a:b:d", "sibling")
            .with_tag("a", "flat")
            .with_tag("x:y:z", "first")
            .with_tag("x:y", "flat")
            .with_tag("x:y:z:w", "last");
        let record = shaper().shape(&element).unwrap();
        assert_eq!(record.get_str("a"), Some("flat"));
        assert_eq!(record.get("x"), Some(&json!({"y": {"z": {"w": "last"}}})));
        assert_eq!(record.get_str("x:y"), Some("flat"));
    }

    #[test]
    fn duplicate_keys_keep_the_last_value() {
        let element = node("1")
            .with_tag("name", "first")
            .with_tag("name", "second")
            .with_tag("addr:city", "Oxford")
            .with_tag("addr:city", "Abingdon");
        let record = shaper().shape(&element).unwrap();
        assert_eq!(record.get_str("name"), Some("second"));
        assert_eq!(record.get("address"), Some(&json!({"city": "Abingdon"})));
    }

    #[test]
    fn number_and_other_keys_are_kept_as_is() {
        let element = node("1").with_tag("name_1", "alt").with_tag("name-en", "x");
        let record = shaper().shape(&element).unwrap();
        assert_eq!(record.get_str("name_1"), Some("alt"));
        assert_eq!(record.get_str("name-en"), Some("x"));
    }

    #[test]
    fn coordinates_become_a_float_position() {
        let mut element = node("1");
        element.lat = Some("51.752".to_string());
        element.lon = Some("-1.2577".to_string());
        let record = shaper().shape(&element).unwrap();
        assert_eq!(record.get("pos"), Some(&json!([51.752, -1.2577])));
        assert!(record.get("pos").unwrap()[0].is_f64());
    }

    #[test]
    fn position_needs_both_coordinates() {
        let mut element = node("1");
        element.lat = Some("51.752".to_string());
        assert!(!shaper().shape(&element).unwrap().contains("pos"));
    }

    #[test]
    fn bad_coordinates_are_invalid_attributes() {
        let mut element = node("1");
        element.lat = Some("north".to_string());
        element.lon = Some("-1.2".to_string());
        let err = shaper().shape(&element).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidAttribute);
    }

    #[test]
    fn non_finite_coordinates_are_invalid_attributes() {
        for (lat, lon) in [("NaN", "inf"), ("51.75", "infinity"), ("-inf", "-1.2")] {
            let mut element = node("1");
            element.lat = Some(lat.to_string());
            element.lon = Some(lon.to_string());
            let err = shaper().shape(&element).unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidAttribute, "lat={} lon={}", lat, lon);
        }
    }

    #[test]
    fn visible_and_provenance_are_copied() {
        let mut element = node("1");
        element.visible = Some("true".to_string());
        element.created.user = Some("alice".to_string());
        element.created.version = Some("3".to_string());
        let record = shaper().shape(&element).unwrap();
        assert_eq!(record.get("visible"), Some(&json!(true)));
        assert_eq!(record.get("created"), Some(&json!({"user": "alice", "version": "3"})));
        assert_eq!(record.get_str("type"), Some("node"));
    }

    #[test]
    fn visible_must_be_a_boolean() {
        let mut element = node("1");
        element.visible = Some("maybe".to_string());
        assert_eq!(shaper().shape(&element).unwrap_err().kind, ErrorKind::InvalidAttribute);
    }

    #[test]
    fn missing_id_is_an_error() {
        let element = Element::new(ElementType::Node).with_tag("name", "x");
        let err = shaper().shape(&element).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingRequiredAttribute);
    }

    #[test]
    fn ways_carry_node_refs_only_when_present() {
        let mut way = Element::new(ElementType::Way).with_id("9");
        assert!(!shaper().shape(&way).unwrap().contains("node_refs"));

        way.node_refs = vec!["3".to_string(), "1".to_string(), "2".to_string()];
        let record = shaper().shape(&way).unwrap();
        assert_eq!(record.get("node_refs"), Some(&json!(["3", "1", "2"])));
        assert_eq!(record.get_str("type"), Some("way"));
    }

    #[test]
    fn tags_cannot_overwrite_record_fields() {
        let element = node("1").with_tag("type", "multipolygon").with_tag("id", "x").with_tag("address", "somewhere");
        let record = shaper().shape(&element).unwrap();
        assert_eq!(record.get_str("type"), Some("node"));
        assert_eq!(record.id(), Some("1"));
        assert!(!record.contains("address"));
    }

    #[test]
    fn street_names_are_corrected_when_configured() {
        let fixer = StreetNameFixer::new(&StreetConfig::default()).unwrap();
        let shaper = shaper().with_street_names(fixer);
        let record = shaper.shape(&node("1").with_tag("addr:street", "Banbury Rd")).unwrap();
        assert_eq!(record.get("address"), Some(&json!({"street": "Banbury Road"})));
    }

    #[test]
    fn shaped_keys_never_contain_problem_chars() {
        let shaper = shaper();
        let element = node("1")
            .with_tag("a b", "1")
            .with_tag("x=y:z.w:q", "2")
            .with_tag("Name.EN", "3")
            .with_tag("addr:flat#", "4")
            .with_tag("k&v:a b:c.d", "5");
        let record = shaper.shape(&element).unwrap();

        let mut keys = Vec::new();
        all_keys(&json!(record), &mut keys);
        assert!(keys.contains(&"name_en".to_string()));
        for key in keys {
            assert!(!shaper.classifier().has_problem_chars(&key), "{:?}", key);
        }
    }

    #[test]
    fn shapes_nodes_and_ways_of_a_document() {
        let shaper = shaper();
        let records: Vec<ShapedRecord> = shaped_records(ElementReader::new(SAMPLE_OSM.as_bytes()), &shaper)
            .collect::<Result<_>>()
            .unwrap();
        // The relation is not shaped.
        assert_eq!(records.len(), 5);

        let way = &records[4];
        assert_eq!(way.get("node_refs"), Some(&json!(["101", "102", "104"])));
        assert_eq!(way.get("name"), Some(&json!({"en": {"old": "Old Lane"}})));
        assert_eq!(way.get_str("fast_and_food"), Some("yes"));
        assert_eq!(way.get("address"), Some(&json!({"street": "Reliuance Way"})));
    }
}
