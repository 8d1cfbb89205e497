use std::path::{Path, PathBuf};

use log::info;

use crate::audit::street::{StreetAudit, StreetNameFixer};
use crate::errors::Result;
use crate::etl::parse_osm::{open_osm, OsmElements};
use crate::UserConfig;

use super::{remove_if_exists, write_json, Etl};

pub const ETL_NAME: &str = "street_audit";
pub const OUTPUT_FILE_NAME: &str = "street_audit.json";

pub struct StreetAuditEtl<'a> {
    config: &'a UserConfig,
    fixer: &'a StreetNameFixer,
}

impl StreetAuditEtl<'_> {
    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }

    pub fn new<'a>(config: &'a UserConfig, fixer: &'a StreetNameFixer) -> StreetAuditEtl<'a> {
        StreetAuditEtl {
            config,
            fixer,
        }
    }
}

impl Etl for StreetAuditEtl<'_> {
    type Input = OsmElements;
    type Output = StreetAudit;

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
        let mut audit = StreetAudit::default();
        for element in input {
            audit.record_element(self.fixer, &element?);
        }
        info!(
            street_types = audit.unexpected.len(),
            street_names = audit.name_count();
            "Found unexpected street types"
        );
        Ok(audit)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        write_json(&Self::output_path(dir), &output)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::etl::parse_osm::fixtures::SAMPLE_OSM;
    use crate::test_config;

    #[test]
    fn writes_unexpected_street_types() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("sample.osm");
        fs::write(&data_path, SAMPLE_OSM).unwrap();
        let config = test_config(&data_path);
        let fixer = StreetNameFixer::new(&config.streets).unwrap();

        StreetAuditEtl::new(&config, &fixer).process(dir.path()).unwrap();

        let audit: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(OUTPUT_FILE_NAME)).unwrap()).unwrap();
        assert_eq!(audit["unexpected"]["Rd"], serde_json::json!(["St Giles Rd"]));
        // "Way" is an expected street type even when the name itself is misspelt.
        assert!(audit["unexpected"].get("Way").is_none());
    }
}
