//! `twinroom.toml` configuration.
//!
//! # Example
//!
//! ```toml
//! contracts = "contracts"
//! extension = ".slang"
//! port = 3000
//! engine = "slangroom-exec"
//! request_timeout_secs = 10
//! log_level = "warn"
//! ```
//!
//! Every key is optional. `TWINROOM_CONTRACTS`, `TWINROOM_PORT`,
//! `TWINROOM_ENGINE`, `TWINROOM_REQUEST_TIMEOUT` and `TWINROOM_LOG` override
//! the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "twinroom.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory scanned for contracts.
    pub contracts: PathBuf,
    pub extension: String,
    /// Preferred listen port; an ephemeral port is used when it is taken.
    pub port: u16,
    /// Execution engine program.
    pub engine: String,
    pub request_timeout_secs: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            contracts: PathBuf::from("contracts"),
            extension: twinroom_core::CONTRACT_EXTENSION.to_string(),
            port: 3000,
            engine: "slangroom-exec".to_string(),
            request_timeout_secs: 10,
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load from `TWINROOM_CONFIG` (or `twinroom.toml` when present), then
    /// apply environment overrides.
    ///
    /// Returns the warnings for ignored overrides alongside the config; they
    /// are logged by the caller once logging is set up from this config.
    pub fn load() -> Result<(Config, Vec<String>), String> {
        let mut config = match std::env::var_os("TWINROOM_CONFIG") {
            Some(path) => read_config(Path::new(&path))?,
            None if Path::new(CONFIG_FILE).is_file() => read_config(Path::new(CONFIG_FILE))?,
            None => Config::default(),
        };
        let warnings = config.apply_env(|key| std::env::var(key).ok());
        Ok((config, warnings))
    }

    /// Apply `TWINROOM_*` overrides. Unparseable numbers are ignored and
    /// reported in the returned warnings.
    pub fn apply_env<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = lookup("TWINROOM_CONTRACTS") {
            self.contracts = PathBuf::from(dir);
        }
        if let Some(engine) = lookup("TWINROOM_ENGINE") {
            self.engine = engine;
        }
        if let Some(level) = lookup("TWINROOM_LOG") {
            self.log_level = level;
        }
        if let Some(port) = lookup("TWINROOM_PORT") {
            match port.trim().parse() {
                Ok(port) => self.port = port,
                Err(_) => warnings.push(format!(
                    "ignoring TWINROOM_PORT={:?}: not a port number",
                    port
                )),
            }
        }
        if let Some(secs) = lookup("TWINROOM_REQUEST_TIMEOUT") {
            match secs.trim().parse() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(_) => warnings.push(format!(
                    "ignoring TWINROOM_REQUEST_TIMEOUT={:?}: not a number",
                    secs
                )),
            }
        }
        warnings
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Read and parse a config file.
///
/// Returns a human-readable error string on failure.
pub fn read_config(path: &Path) -> Result<Config, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}
