use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::audit::shape::{shaped_records, Shaper};
use crate::data::record::{drain_records, JsonLinesSink, ShapedRecord};
use crate::errors::Result;
use crate::etl::parse_osm::{open_osm, OsmElements};
use crate::UserConfig;

use super::{remove_if_exists, write_json, Etl};

pub const ETL_NAME: &str = "load_records";
pub const OUTPUT_FILE_NAME: &str = "records.jsonl";
pub const MANIFEST_FILE_NAME: &str = "manifest.json";
pub const STAGING_FILE_NAME: &str = "records.jsonl.partial";

/// Describes what the collection on disk was loaded from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub data_name: String,
    pub source: String,
    pub record_count: usize,
}

/// Elements to shape, and where to stage the shaped records.
pub struct LoadInput {
    elements: OsmElements,
    staging_path: PathBuf,
}

/// Records written to the staging file, not yet part of the collection.
pub struct StagedRecords {
    manifest: Manifest,
    staging_path: PathBuf,
}

/// Shapes every node and way and loads them into the collection, replacing
/// its contents only when the dataset or the record count changed. Records
/// are streamed to a staging file, so memory stays flat regardless of the
/// extract size.
pub struct LoadRecordsEtl<'a> {
    config: &'a UserConfig,
    shaper: &'a Shaper,
}

impl LoadRecordsEtl<'_> {
    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }

    fn manifest_path(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE_NAME)
    }

    fn staging_path(dir: &Path) -> PathBuf {
        dir.join(STAGING_FILE_NAME)
    }

    fn stage<I>(&self, records: I, staging_path: &Path) -> Result<usize>
    where
        I: Iterator<Item = Result<ShapedRecord>>,
    {
        let mut sink = JsonLinesSink::new(BufWriter::new(File::create(staging_path)?), self.config.pretty);
        drain_records(records, &mut sink, self.config.strict)
    }

    fn read_manifest(dir: &Path) -> Result<Option<Manifest>> {
        let path = Self::manifest_path(dir);
        if !path.try_exists()? {
            return Ok(None);
        }
        match serde_json::from_reader(BufReader::new(File::open(&path)?)) {
            Ok(manifest) => Ok(Some(manifest)),
            Err(err) => {
                let message = err.to_string();
                warn!(err = message.as_str(); "Ignoring unreadable collection manifest");
                Ok(None)
            },
        }
    }

    pub fn new<'a>(config: &'a UserConfig, shaper: &'a Shaper) -> LoadRecordsEtl<'a> {
        LoadRecordsEtl {
            config,
            shaper,
        }
    }
}

impl Etl for LoadRecordsEtl<'_> {
    type Input = LoadInput;
    type Output = StagedRecords;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    /// Never cached: whether the collection needs a reload depends on the
    /// freshly shaped record count.
    fn is_cached(&self, _dir: &Path) -> Result<bool> {
        Ok(false)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        remove_if_exists(&Self::output_path(dir))?;
        remove_if_exists(&Self::manifest_path(dir))?;
        remove_if_exists(&Self::staging_path(dir))
    }

    fn extract(&mut self, dir: &Path) -> Result<Self::Input> {
        Ok(LoadInput {
            elements: open_osm(&self.config.data_path)?,
            staging_path: Self::staging_path(dir),
        })
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let LoadInput { elements, staging_path } = input;
        let staged = if self.config.progress {
            self.stage(shaped_records(tqdm::tqdm(elements), self.shaper), &staging_path)
        } else {
            self.stage(shaped_records(elements, self.shaper), &staging_path)
        };
        let record_count = match staged {
            Ok(record_count) => record_count,
            Err(err) => {
                remove_if_exists(&staging_path)?;
                return Err(err);
            },
        };

        Ok(StagedRecords {
            manifest: Manifest {
                data_name: self.config.data_name(),
                source: self.config.data_path.display().to_string(),
                record_count,
            },
            staging_path,
        })
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let StagedRecords { manifest, staging_path } = output;
        let output_path = Self::output_path(dir);

        if Self::read_manifest(dir)?.as_ref() == Some(&manifest) && output_path.try_exists()? {
            remove_if_exists(&staging_path)?;
            info!(data_name = manifest.data_name.as_str(), records = manifest.record_count; "Collection is up to date");
            return Ok(());
        }

        fs::rename(&staging_path, &output_path)?;
        write_json(&Self::manifest_path(dir), &manifest)?;
        info!(data_name = manifest.data_name.as_str(), records = manifest.record_count; "Collection reloaded");
        Ok(())
    }
}
