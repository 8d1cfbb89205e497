use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::audit::keys::{ClassificationCounts, KeyCategory, KeyClassifier};
use crate::audit::tags::TagKeys;
use crate::errors::Result;
use crate::etl::parse_osm::{open_osm, OsmElements};
use crate::UserConfig;

use super::{remove_if_exists, write_json, Etl};

pub const ETL_NAME: &str = "tag_audit";
pub const OUTPUT_FILE_NAME: &str = "tag_audit.json";

#[derive(Debug, Serialize)]
pub struct TagAuditReport {
    #[serde(flatten)]
    pub classification: ClassificationCounts,
    pub unique_key_count: usize,
}

/// Classifies every tag key in the extract.
pub struct TagAuditEtl<'a> {
    config: &'a UserConfig,
    classifier: &'a KeyClassifier,
}

impl TagAuditEtl<'_> {
    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }

    pub fn new<'a>(config: &'a UserConfig, classifier: &'a KeyClassifier) -> TagAuditEtl<'a> {
        TagAuditEtl {
            config,
            classifier,
        }
    }
}

impl Etl for TagAuditEtl<'_> {
    type Input = OsmElements;
    type Output = TagAuditReport;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(Self::output_path(dir).try_exists()?)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        remove_if_exists(&Self::output_path(dir))
    }

    fn extract(&mut self, _dir: &Path) -> Result<Self::Input> {
        open_osm(&self.config.data_path)
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let mut classification = ClassificationCounts::default();
        for key in TagKeys::new(input) {
            self.classifier.tally(&key?, &mut classification);
        }

        info!(keys = classification.total(); "Tag keys read");
        for category in KeyCategory::ALL {
            info!(category = category.as_str(), count = classification.count(category); "Tag keys classified");
        }

        let unique_key_count = classification.unique_keys().len();
        Ok(TagAuditReport {
            classification,
            unique_key_count,
        })
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        write_json(&Self::output_path(dir), &output)
    }
}
