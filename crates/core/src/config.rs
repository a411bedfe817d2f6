use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::scanner::ScanOptions;

pub const ENV_MAX_DEPTH: &str = "MTPTREE_MAX_DEPTH";
pub const ENV_STORAGE: &str = "MTPTREE_STORAGE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Deepest folder nesting any walk will follow.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_true")]
    pub ignore_hidden: bool,

    /// Storage to select on open; the lowest id when unset.
    #[serde(default)]
    pub storage: Option<u32>,

    /// Copy buffer of the directory-backed provider.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_max_depth() -> usize {
    64
}

fn default_true() -> bool {
    true
}

fn default_chunk_size() -> usize {
    64 * 1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            ignore_hidden: true,
            storage: None,
            chunk_size: default_chunk_size(),
        }
    }
}

impl Config {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Applies `MTPTREE_*` overrides from the process environment.
    pub fn with_env(self) -> Result<Self> {
        self.with_vars(|key| std::env::var(key).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = var(ENV_MAX_DEPTH) {
            self.max_depth = v
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{ENV_MAX_DEPTH}={v:?} is not a number")))?;
        }
        if let Some(v) = var(ENV_STORAGE) {
            self.storage = Some(parse_storage(&v)?);
        }
        Ok(self)
    }

    pub fn scan_options(&self, recursive: bool) -> ScanOptions {
        ScanOptions {
            recursive,
            ignore_hidden: self.ignore_hidden,
            max_depth: self.max_depth,
        }
    }
}

/// Accepts decimal or `0x`-prefixed hex storage ids.
pub fn parse_storage(v: &str) -> Result<u32> {
    let v = v.trim();
    let parsed = match v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => v.parse(),
    };
    parsed.map_err(|_| Error::Config(format!("invalid storage id {v:?}")))
}
