pub mod constants;
pub(crate) mod defaults;
pub mod models;
pub mod utils;

pub use models::*;
pub use utils::*;

use std::sync::OnceLock;

use eyre::Result;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_SHA: &str = match option_env!("GIT_SHA") {
    Some(v) => v,
    None => "unknown",
};

pub fn user_agent() -> String {
    format!("{}/{} ({})", APP_NAME, VERSION, std::env::consts::OS)
}

pub fn version() -> String {
    format!("{} version: {} {}", APP_NAME, VERSION, GIT_SHA)
}

static CONFIG: OnceLock<Configuration> = OnceLock::new();

// Tests install their own configuration per thread.
#[cfg(test)]
thread_local! {
    static TEST_CONFIG: std::cell::Cell<Option<&'static Configuration>> =
        const { std::cell::Cell::new(None) };
}

impl Configuration {
    /// instance returns the installed configuration, or the defaults when
    /// nothing was installed.
    pub fn instance() -> &'static Configuration {
        #[cfg(test)]
        if let Some(config) = TEST_CONFIG.with(|c| c.get()) {
            return config;
        }
        CONFIG.get_or_init(Configuration::default)
    }

    /// init installs `config` for the rest of the process.
    #[cfg(not(test))]
    pub fn init(config: Configuration) -> Result<()> {
        CONFIG
            .set(config)
            .map_err(|_| eyre::eyre!("configuration already initialized"))
    }

    #[cfg(test)]
    pub fn init(config: Configuration) -> Result<()> {
        let config: &'static Configuration = Box::leak(Box::new(config));
        TEST_CONFIG.with(|c| c.set(Some(config)));
        Ok(())
    }
}

/// verbose prints startup progress to stderr when `general.verbose` is on.
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {
        if $crate::config::Configuration::instance().general.verbose {
            eprintln!($($arg)*);
        }
    };
}

pub use verbose;
