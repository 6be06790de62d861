use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{consts::DEFAULT_STAGING_DIR, error::Error, operate::Settings};

/// What a process does once started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Accepts peers and relays between them.
    Server,
    /// Connects to a hub and interprets what it receives.
    Client,
    /// A client that also reads command lines from stdin.
    Terminal,
}

/// Startup configuration, read from a TOML `.config` file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub basic: Basic,
    pub server: ServerAddr,
    pub script: Script,
    #[serde(default)]
    pub transfer: Transfer,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Basic {
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerAddr {
    pub addr: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transfer {
    pub staging_dir: PathBuf,
}

impl Default for Transfer {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        text.parse()
    }

    /// Interpreter paths taken from `[script]` and `[transfer]`.
    pub fn settings(&self) -> Settings {
        Settings {
            script_dir: self.script.dir.clone(),
            staging_dir: self.transfer.staging_dir.clone(),
        }
    }
}

impl std::str::FromStr for Config {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(text)?)
    }
}
