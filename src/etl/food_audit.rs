use std::path::{Path, PathBuf};

use log::info;

use crate::audit::food::FoodNodes;
use crate::audit::shape::Shaper;
use crate::data::record::{drain_records, ShapedRecord};
use crate::errors::Result;
use crate::etl::parse_osm::{open_osm, OsmElements};
use crate::UserConfig;

use super::{remove_if_exists, write_json, Etl};

pub const ETL_NAME: &str = "food_audit";
pub const OUTPUT_FILE_NAME: &str = "food_nodes.json";

/// How complete the food places are, in terms of their `cuisine` and
/// `amenity` fields.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FoodSummary {
    pub total: usize,
    pub with_cuisine_and_amenity: usize,
    pub without_cuisine: usize,
    pub without_amenity: usize,
}

impl FoodSummary {
    pub fn of(records: &[ShapedRecord]) -> FoodSummary {
        let mut summary = FoodSummary {
            total: records.len(),
            ..FoodSummary::default()
        };
        for record in records {
            match (record.contains("cuisine"), record.contains("amenity")) {
                (true, true) => summary.with_cuisine_and_amenity += 1,
                (false, true) => summary.without_cuisine += 1,
                (true, false) => summary.without_amenity += 1,
                (false, false) => {
                    summary.without_cuisine += 1;
                    summary.without_amenity += 1;
                },
            }
        }
        summary
    }
}

pub struct FoodAuditEtl<'a> {
    config: &'a UserConfig,
    shaper: &'a Shaper,
}

impl FoodAuditEtl<'_> {
    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }

    pub fn new<'a>(config: &'a UserConfig, shaper: &'a Shaper) -> FoodAuditEtl<'a> {
        FoodAuditEtl {
            config,
            shaper,
        }
    }
}

impl Etl for FoodAuditEtl<'_> {
    type Input = OsmElements;
    type Output = Vec<ShapedRecord>;

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
        let mut food_nodes = Vec::new();
        drain_records(FoodNodes::new(input, self.shaper), &mut food_nodes, self.config.strict)?;
        let summary = FoodSummary::of(&food_nodes);
        info!(
            food_nodes = summary.total,
            with_cuisine_and_amenity = summary.with_cuisine_and_amenity,
            without_cuisine = summary.without_cuisine,
            without_amenity = summary.without_amenity;
            "Collected food nodes"
        );
        Ok(food_nodes)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        write_json(&Self::output_path(dir), &output)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::audit::keys::KeyClassifier;
    use crate::errors::ErrorKind;
    use crate::etl::parse_osm::fixtures::SAMPLE_OSM;
    use crate::test_config;

    #[test]
    fn writes_shaped_food_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("sample.osm");
        fs::write(&data_path, SAMPLE_OSM).unwrap();
        let config = test_config(&data_path);
        let shaper = Shaper::new(KeyClassifier::new().unwrap());

        FoodAuditEtl::new(&config, &shaper).process(dir.path()).unwrap();

        let records: Vec<ShapedRecord> =
            serde_json::from_str(&fs::read_to_string(dir.path().join(OUTPUT_FILE_NAME)).unwrap()).unwrap();
        let ids: Vec<&str> = records.iter().filter_map(ShapedRecord::id).collect();
        assert_eq!(ids, vec!["101", "103"]);
        assert_eq!(records[0].get_str("amenity"), Some("pub"));
    }

    #[test]
    fn summarizes_cuisine_and_amenity_coverage() {
        let record = |fields: serde_json::Value| -> ShapedRecord { serde_json::from_value(fields).unwrap() };
        let records = vec![
            record(serde_json::json!({"id": "1", "amenity": "pub"})),
            record(serde_json::json!({"id": "2", "cuisine": "indian"})),
            record(serde_json::json!({"id": "3", "amenity": "cafe", "cuisine": "coffee_shop"})),
            record(serde_json::json!({"id": "4", "amenity": "bar"})),
        ];
        assert_eq!(FoodSummary::of(&records), FoodSummary {
            total: 4,
            with_cuisine_and_amenity: 1,
            without_cuisine: 2,
            without_amenity: 1,
        });
        assert_eq!(FoodSummary::of(&[]), FoodSummary::default());
    }

    #[test]
    fn strict_mode_rejects_food_nodes_without_id() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("no_id.osm");
        fs::write(&data_path, r#"<osm><node id="1"><tag k="amenity" v="cafe"/></node><node><tag k="amenity" v="bar"/></node></osm>"#).unwrap();
        let shaper = Shaper::new(KeyClassifier::new().unwrap());

        let strict = test_config(&data_path);
        let err = FoodAuditEtl::new(&strict, &shaper).transform(open_osm(&data_path).unwrap()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingRequiredAttribute);

        let mut lenient = test_config(&data_path);
        lenient.strict = false;
        let records = FoodAuditEtl::new(&lenient, &shaper).transform(open_osm(&data_path).unwrap()).unwrap();
        assert_eq!(records.len(), 1);
    }
}
