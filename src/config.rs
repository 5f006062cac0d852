//! Runtime configuration threaded through every component entry point

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::protocol::timeouts;

/// A source endpoint, e.g. `"ANSK|Laura"`. The short alias after the `|`
/// names the local partition and the daemon-side download path.
#[derive(Debug, Clone)]
pub struct Bot {
    name: String,
}

impl Bot {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> &str {
        self.name.split('|').nth(1).unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub data_dir: PathBuf,
    pub catalog_url: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub idle_timeout: Duration,
    pub pace: Duration,
    pub verbose: bool,
}

impl Config {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            data_dir: PathBuf::from("./data"),
            catalog_url: "https://packs.ansktracker.net/".to_string(),
            connect_timeout: Duration::from_secs(timeouts::CONNECT_SECS),
            read_timeout: Duration::from_secs(timeouts::READ_SECS),
            idle_timeout: Duration::from_secs(timeouts::IDLE_SECS),
            pace: Duration::from_secs(timeouts::PACE_SECS),
            verbose: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BotsFile {
    bots: Vec<String>,
}

/// Bot roster from a TOML file (`bots = ["NET|Alias", ...]`), or the
/// built-in roster when no file is given.
pub fn load_bots(path: Option<&Path>) -> Result<Vec<Bot>> {
    match path {
        Some(p) => {
            let raw = std::fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
            let parsed: BotsFile =
                toml::from_str(&raw).with_context(|| format!("parse {}", p.display()))?;
            Ok(parsed.bots.into_iter().map(Bot::new).collect())
        }
        None => Ok(default_bots()),
    }
}

pub fn default_bots() -> Vec<Bot> {
    [
        "ANSK|Laura",
        "ANSK|Kuroneko",
        "ANSK|Victorique",
        "ANSK|Sora",
        "ANSK|Kobato",
    ]
    .into_iter()
    .map(Bot::new)
    .collect()
}
