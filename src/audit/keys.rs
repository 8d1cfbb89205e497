use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::Serialize;

use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCategory {
    #[serde(rename = "problemchars")]
    ProblemChars,
    Numbers,
    Lower,
    Upper,
    LowerColon,
    UpperColon,
    MultipleColons,
    Other,
}

impl KeyCategory {
    /// Every category, in the order keys are tested against them.
    pub const ALL: [KeyCategory; 8] = [
        KeyCategory::ProblemChars,
        KeyCategory::Numbers,
        KeyCategory::Lower,
        KeyCategory::Upper,
        KeyCategory::LowerColon,
        KeyCategory::UpperColon,
        KeyCategory::MultipleColons,
        KeyCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyCategory::ProblemChars => "problemchars",
            KeyCategory::Numbers => "numbers",
            KeyCategory::Lower => "lower",
            KeyCategory::Upper => "upper",
            KeyCategory::LowerColon => "lower_colon",
            KeyCategory::UpperColon => "upper_colon",
            KeyCategory::MultipleColons => "multiple_colons",
            KeyCategory::Other => "other",
        }
    }
}

const RULES: [(KeyCategory, &str); 7] = [
    (KeyCategory::ProblemChars, r##"[=+/&<>;'"?%#$@,. \t\r\n]"##),
    (KeyCategory::Numbers, r"[0-9]"),
    (KeyCategory::Lower, r"^([a-z]|_)*$"),
    (KeyCategory::Upper, r"^([A-Za-z]|_)*$"),
    (KeyCategory::LowerColon, r"^([a-z]|_)*:([a-z]|_)*$"),
    (KeyCategory::UpperColon, r"^([A-Za-z]|_)*:([A-Za-z]|_)*$"),
    (KeyCategory::MultipleColons, r"^(([A-Za-z]|_)*:)+([A-Za-z]|_)*$"),
];

/// Replacements applied to keys with problem characters, in order. Whatever
/// problem characters remain afterwards become `_`.
const SANITIZE_TABLE: [(&str, &str); 3] = [
    (" ", "_"),
    ("&", "_and_"),
    (".", "_"),
];

struct KeyRule {
    category: KeyCategory,
    pattern: Regex,
}

/// Ordered table of key patterns. The first matching rule decides the
/// category, so categories never overlap; keys matching none are `Other`.
pub struct KeyClassifier {
    rules: Vec<KeyRule>,
}

impl KeyClassifier {
    pub fn new() -> Result<KeyClassifier> {
        let rules = RULES.iter()
            .map(|(category, pattern)| Ok(KeyRule {
                category: *category,
                pattern: Regex::new(pattern)?,
            }))
            .collect::<Result<Vec<_>>>()?;
        Ok(KeyClassifier { rules })
    }

    pub fn classify(&self, key: &str) -> KeyCategory {
        self.rules.iter()
            .find(|rule| rule.pattern.is_match(key))
            .map(|rule| rule.category)
            .unwrap_or(KeyCategory::Other)
    }

    /// Classifies `key` and records it in `counts`.
    pub fn tally(&self, key: &str, counts: &mut ClassificationCounts) -> KeyCategory {
        let category = self.classify(key);
        counts.record(category, key);
        category
    }

    /// Whether `key` satisfies the pattern of `category` on its own, ignoring
    /// rule order. `Other` holds when no pattern matches.
    pub fn matches(&self, category: KeyCategory, key: &str) -> bool {
        match self.rules.iter().find(|rule| rule.category == category) {
            Some(rule) => rule.pattern.is_match(key),
            None => self.rules.iter().all(|rule| !rule.pattern.is_match(key)),
        }
    }

    pub fn has_problem_chars(&self, key: &str) -> bool {
        self.matches(KeyCategory::ProblemChars, key)
    }

    pub fn sanitize(&self, key: &str) -> String {
        let mut sanitized = key.to_string();
        for (from, to) in SANITIZE_TABLE {
            sanitized = sanitized.replace(from, to);
        }
        match self.rules.iter().find(|rule| rule.category == KeyCategory::ProblemChars) {
            Some(rule) => rule.pattern.replace_all(&sanitized, "_").into_owned(),
            None => sanitized,
        }
    }
}

/// Per-category key counts and the keys behind them, in the order seen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationCounts {
    pub counts: BTreeMap<KeyCategory, usize>,
    pub keys: BTreeMap<KeyCategory, Vec<String>>,
}

impl Default for ClassificationCounts {
    fn default() -> Self {
        ClassificationCounts {
            counts: KeyCategory::ALL.iter().map(|category| (*category, 0)).collect(),
            keys: KeyCategory::ALL.iter().map(|category| (*category, Vec::new())).collect(),
        }
    }
}

impl ClassificationCounts {
    pub fn record(&mut self, category: KeyCategory, key: &str) {
        *self.counts.entry(category).or_insert(0) += 1;
        self.keys.entry(category).or_default().push(key.to_string());
    }

    pub fn count(&self, category: KeyCategory) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn unique_keys(&self) -> BTreeSet<&str> {
        self.keys.values()
            .flatten()
            .map(String::as_str)
            .collect()
    }
}
