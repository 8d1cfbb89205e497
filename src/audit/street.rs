use std::collections::{BTreeMap, BTreeSet, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::data::osm::{Element, Tag};
use crate::errors::Result;

pub const STREET_KEY: &str = "addr:street";

const STREET_TYPE_PATTERN: &str = r"\b\S+\.?$";

const EXPECTED_STREET_TYPES: [&str; 24] = [
    "Street", "Avenue", "Boulevard", "Drive", "Court", "Place", "Square", "Lane",
    "Road", "Trail", "Parkway", "Commons", "Close", "Crescent", "Way", "Gardens",
    "Grove", "Hill", "Mews", "Row", "Terrace", "Walk", "Green", "Yard",
];

const STREET_TYPE_MAPPING: [(&str, &str); 10] = [
    ("St", "Street"),
    ("St.", "Street"),
    ("Ave", "Avenue"),
    ("Rd", "Road"),
    ("Rd.", "Road"),
    ("road", "Road"),
    ("way", "Way"),
    ("Way?", "Way"),
    ("Way,", "Way"),
    ("Road,", "Road"),
];

const STREET_NAME_MAPPING: [(&str, &str); 1] = [
    ("Reliuance Way", "Reliance Way"),
];

/// Street audit settings from the user config. Missing fields fall back to
/// the built-in lists.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreetConfig {
    pub expected: Vec<String>,
    pub type_mapping: BTreeMap<String, String>,
    pub name_mapping: BTreeMap<String, String>,
}

impl Default for StreetConfig {
    fn default() -> Self {
        StreetConfig {
            expected: EXPECTED_STREET_TYPES.iter().map(|s| s.to_string()).collect(),
            type_mapping: STREET_TYPE_MAPPING.iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            name_mapping: STREET_NAME_MAPPING.iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }
}

pub fn is_street_name(tag: &Tag) -> bool {
    tag.key == STREET_KEY
}

pub struct StreetNameFixer {
    street_type: Regex,
    expected: HashSet<String>,
    type_mapping: BTreeMap<String, String>,
    name_mapping: BTreeMap<String, String>,
}

impl StreetNameFixer {
    pub fn new(config: &StreetConfig) -> Result<StreetNameFixer> {
        Ok(StreetNameFixer {
            street_type: Regex::new(STREET_TYPE_PATTERN)?,
            expected: config.expected.iter().cloned().collect(),
            type_mapping: config.type_mapping.clone(),
            name_mapping: config.name_mapping.clone(),
        })
    }

    /// The trailing token of a street name, e.g. `Rd` in `Banbury Rd`.
    pub fn street_type<'a>(&self, name: &'a str) -> Option<&'a str> {
        self.street_type.find(name).map(|m| m.as_str())
    }

    pub fn is_expected(&self, street_type: &str) -> bool {
        self.expected.contains(street_type)
    }

    /// Applies the configured corrections: a whole-name correction if one
    /// exists, otherwise a mapped street type. Unknown names come back as-is.
    pub fn update_name(&self, name: &str) -> String {
        if let Some(corrected) = self.name_mapping.get(name) {
            return corrected.clone();
        }
        if let Some(m) = self.street_type.find(name) {
            if let Some(replacement) = self.type_mapping.get(m.as_str()) {
                return format!("{}{}", &name[..m.start()], replacement);
            }
        }
        name.to_string()
    }
}

/// Street names grouped by the unexpected street type they end in.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreetAudit {
    pub unexpected: BTreeMap<String, BTreeSet<String>>,
}

impl StreetAudit {
    pub fn record(&mut self, fixer: &StreetNameFixer, name: &str) {
        if let Some(street_type) = fixer.street_type(name) {
            if !fixer.is_expected(street_type) {
                self.unexpected
                    .entry(street_type.to_string())
                    .or_default()
                    .insert(name.to_string());
            }
        }
    }

    pub fn record_element(&mut self, fixer: &StreetNameFixer, element: &Element) {
        for tag in element.tags.iter().filter(|tag| is_street_name(tag)) {
            self.record(fixer, &tag.value);
        }
    }

    pub fn name_count(&self) -> usize {
        self.unexpected.values().map(BTreeSet::len).sum()
    }
}
