use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use log::{LevelFilter, info, warn};

use anaplace::floorplan::HBTree;
use anaplace::io::Instance;

use crate::EPOCH;
use crate::config::SAConfig;

pub mod cli;

/// Reads the JSON config file; falls back to the defaults (with a warning)
/// when the file is absent or unparsable.
pub fn read_config(path: Option<&Path>) -> SAConfig {
    let Some(path) = path else {
        return SAConfig::default();
    };
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            warn!("could not open config file: {err}");
            warn!("falling back on default config");
            return SAConfig::default();
        }
    };
    serde_json::from_reader(std::io::BufReader::new(file)).unwrap_or_else(|err| {
        warn!("config file could not be parsed: {err}");
        warn!("falling back on default config");
        SAConfig::default()
    })
}

pub fn read_instance(path: &Path) -> Result<Instance> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("could not read instance file {}", path.display()))?;
    anaplace::io::parse_instance(&text)
}

pub fn write_placement(path: &Path, tree: &HBTree) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("could not create output file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    anaplace::io::write_placement(&mut writer, tree)?;
    info!("placement written to {}", path.display());
    Ok(())
}

pub fn init_logger(level_filter: LevelFilter) -> Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            let duration = EPOCH.elapsed();
            let sec = duration.as_secs() % 60;
            let min = (duration.as_secs() / 60) % 60;
            let hours = (duration.as_secs() / 60) / 60;

            let prefix = format!(
                "[{}] [{:0>2}:{:0>2}:{:0>2}]",
                record.level(),
                hours,
                min,
                sec,
            );

            out.finish(format_args!("{prefix:<18}{message}"))
        })
        .level(level_filter)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}
