mod audit;
mod data;
mod errors;
mod etl;

use std::fs::{create_dir_all, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Deserialize;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use crate::audit::keys::KeyClassifier;
use crate::audit::shape::Shaper;
use crate::audit::street::{StreetConfig, StreetNameFixer};
use crate::errors::{Error, ErrorKind, Result};
use crate::etl::food_audit::FoodAuditEtl;
use crate::etl::load_records::LoadRecordsEtl;
use crate::etl::street_audit::StreetAuditEtl;
use crate::etl::tag_audit::TagAuditEtl;
use crate::etl::Etl;

#[derive(Deserialize)]
pub struct UserConfig {
    pub data_path: PathBuf,
    /// Names the output directory and the collection. Defaults to the input
    /// file name up to its first dot.
    #[serde(default)]
    pub data_name: Option<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Fail on elements that cannot be shaped instead of skipping them.
    #[serde(default = "default_strict")]
    pub strict: bool,
    #[serde(default)]
    pub pretty: bool,
    #[serde(default)]
    pub progress: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub streets: StreetConfig,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_strict() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl UserConfig {
    pub fn data_name(&self) -> String {
        if let Some(name) = &self.data_name {
            return name.clone();
        }
        self.data_path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.split('.').next())
            .filter(|name| !name.is_empty())
            .unwrap_or("osm")
            .to_string()
    }
}

#[derive(Parser)]
#[command(about = "Audit OpenStreetMap tag data and load it as shaped records")]
struct Cli {
    /// JSON config file.
    #[arg(short, long, default_value = "config/oxford_england.json")]
    config: PathBuf,

    /// Discard cached step outputs before running.
    #[arg(long)]
    clean: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Classify every tag key.
    Tags,
    /// List street names with unexpected street types.
    Streets,
    /// Shape the food places.
    Food,
    /// Shape every node and way and load the collection.
    Load,
    /// Run every step.
    All,
}

impl Command {
    fn includes(self, step: Command) -> bool {
        self == Command::All || self == step
    }
}

fn load_user_config(path: &Path) -> Result<UserConfig> {
    let file = File::open(path)
        .map_err(|err| Error::new(ErrorKind::Config, format!("could not open config {}: {}", path.display(), err)))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|err| Error::new(ErrorKind::Config, format!("could not parse config {}: {}", path.display(), err)))
}

fn create_output_dir(config: &UserConfig) -> Result<PathBuf> {
    let output_dir = config.output_dir.join(config.data_name());
    create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn run_step<E: Etl>(mut etl: E, dir: &Path, clean: bool) -> Result<()> {
    if clean {
        etl.clean(dir)?;
    }
    etl.process(dir)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let user_config = load_user_config(&cli.config)?;
    setup_logging(&user_config.log_level);

    let output_dir = create_output_dir(&user_config)?;
    let command = cli.command.unwrap_or(Command::All);

    let shaper = Shaper::new(KeyClassifier::new()?)
        .with_street_names(StreetNameFixer::new(&user_config.streets)?);
    let street_fixer = StreetNameFixer::new(&user_config.streets)?;

    if command.includes(Command::Tags) {
        run_step(TagAuditEtl::new(&user_config, shaper.classifier()), &output_dir, cli.clean)?;
    }
    if command.includes(Command::Streets) {
        run_step(StreetAuditEtl::new(&user_config, &street_fixer), &output_dir, cli.clean)?;
    }
    if command.includes(Command::Food) {
        run_step(FoodAuditEtl::new(&user_config, &shaper), &output_dir, cli.clean)?;
    }
    if command.includes(Command::Load) {
        run_step(LoadRecordsEtl::new(&user_config, &shaper), &output_dir, cli.clean)?;
    }

    Ok(())
}

/// Strict, quiet config reading `data_path` with every other field defaulted.
#[cfg(test)]
pub fn test_config(data_path: &Path) -> UserConfig {
    serde_json::from_value(serde_json::json!({ "data_path": data_path })).unwrap()
}
