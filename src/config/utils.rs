#[cfg(test)]
#[path = "utils_test.rs"]
mod tests;

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Local;
use eyre::{Context, Result};
use log::LevelFilter;
use regex::{Captures, Regex};
use thiserror::Error;

use super::{APP_NAME, Configuration, LogConfig, LogFile};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("server endpoint {0:?} must start with http:// or https://")]
    InvalidEndpoint(String),

    #[error("general.max_input_length must be greater than zero")]
    ZeroInputLength,
}

pub fn load_configuration(config_path: &str) -> Result<Configuration> {
    let raw = std::fs::read_to_string(config_path).wrap_err(format!("reading {}", config_path))?;
    let config: Configuration = toml::from_str(&raw).wrap_err("parsing configuration")?;
    validate(&config)?;
    Ok(config)
}

/// validate checks the values serde can not reject on its own.
pub fn validate(config: &Configuration) -> Result<(), ConfigError> {
    let endpoint = config.server.endpoint.as_str();
    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        return Err(ConfigError::InvalidEndpoint(endpoint.to_string()));
    }
    if config.general.max_input_length == 0 {
        return Err(ConfigError::ZeroInputLength);
    }
    Ok(())
}

/// init_logger sends every log record to the configured file.
pub fn init_logger(config: &LogConfig) -> Result<()> {
    let log_file = open_log_file(&config.file)?;

    let raw_level = config.level.as_deref().unwrap_or("info");
    let log_level = LevelFilter::from_str(raw_level)
        .wrap_err(format!("parsing log level {}", raw_level))?;

    let mut builder = env_logger::Builder::new();
    builder.filter(None, log_level);
    for filter in config.filters.as_deref().unwrap_or_default() {
        let level = filter
            .level
            .as_deref()
            .and_then(|l| LevelFilter::from_str(l).ok())
            .unwrap_or(log_level);
        builder.filter(filter.module.as_deref(), level);
    }

    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{}/{}:{} {} [{}] - {}",
                record.module_path().unwrap_or("unknown"),
                basename(record.file().unwrap_or("unknown")),
                record.line().unwrap_or(0),
                Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .try_init()?;
    Ok(())
}

fn open_log_file(file: &LogFile) -> Result<File> {
    let path = resolve_path(&file.path).wrap_err(format!("resolving log file path {}", file.path))?;
    if let Some(dir) = Path::new(&path).parent() {
        std::fs::create_dir_all(dir).wrap_err(format!("creating directory {}", dir.display()))?;
    }

    let mut options = OpenOptions::new();
    options.create(true);
    if file.append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options.open(&path).wrap_err(format!("opening log file {}", path))
}

pub fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

/// resolve_path expands `$VAR` and `${VAR}` and makes the result absolute.
/// Unset variables expand to nothing.
pub fn resolve_path(path: &str) -> Result<String> {
    let re = Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").wrap_err("compiling regex")?;
    let expanded = re.replace_all(path, |caps: &Captures| {
        std::env::var(&caps[1]).unwrap_or_default()
    });

    let absolute = std::path::absolute(&*expanded)
        .wrap_err(format!("resolving path {}", expanded))?;
    Ok(absolute.to_string_lossy().to_string())
}

/// lookup_config_path returns the first existing file of:
/// * $XDG_CONFIG_HOME/convo/config.toml
/// * $HOME/.config/convo/config.toml
/// * $HOME/.convo.toml
pub fn lookup_config_path() -> Option<String> {
    config_candidates()
        .into_iter()
        .find(|path| path.is_file())
        .map(|path| path.to_string_lossy().to_string())
}

fn config_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![];
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        candidates.push(Path::new(&xdg).join(APP_NAME).join("config.toml"));
    }
    if let Ok(home) = std::env::var("HOME") {
        let home = Path::new(&home);
        candidates.push(home.join(".config").join(APP_NAME).join("config.toml"));
        candidates.push(home.join(format!(".{}.toml", APP_NAME)));
    }
    candidates
}
