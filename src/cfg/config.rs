// src/cfg/config.rs

use globset::{Glob, GlobSet, GlobSetBuilder};
use log::{debug, error, warn};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::error::{Error, Result};

const APP_DIR: &str = "gmail-headline";
const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";
const DEFAULT_TOKEN_FILE: &str = "token.json";

fn default_account() -> String {
    "me".to_string()
}

fn default_output_file() -> PathBuf {
    PathBuf::from("headline.jsonl")
}

fn default_limit() -> usize {
    50
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Mailbox the API calls act on; `me` is the authenticated user.
    #[serde(default = "default_account")]
    pub account: String,

    #[serde(default, alias = "credentials_file", rename = "credentials-file")]
    pub credentials_file: Option<PathBuf>,

    #[serde(default, alias = "token_file", rename = "token-file")]
    pub token_file: Option<PathBuf>,

    #[serde(default = "default_output_file", alias = "output_file", rename = "output-file")]
    pub output_file: PathBuf,

    /// Run-wide cap on exported messages.
    #[serde(default = "default_limit")]
    pub limit: usize,

    #[serde(default, alias = "retrieve_queries", rename = "retrieve-queries")]
    pub retrieve_queries: Vec<String>,

    #[serde(default, alias = "delete_queries", rename = "delete-queries")]
    pub delete_queries: Vec<String>,

    #[serde(default, alias = "skip_labels", rename = "skip-labels")]
    pub skip_labels: SkipLabels,

    #[serde(default, alias = "dry_run", rename = "dry-run")]
    pub dry_run: bool,

    #[serde(default = "default_timeout_secs", alias = "timeout_secs", rename = "timeout-secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries", alias = "max_retries", rename = "max-retries")]
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            account: default_account(),
            credentials_file: None,
            token_file: None,
            output_file: default_output_file(),
            limit: default_limit(),
            retrieve_queries: Vec::new(),
            delete_queries: Vec::new(),
            skip_labels: SkipLabels::default(),
            dry_run: false,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl Config {
    /// Overlay command-line / environment values onto the file values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(path) = &cli.credentials_file {
            self.credentials_file = Some(path.clone());
        }
        if let Some(path) = &cli.token_file {
            self.token_file = Some(path.clone());
        }
        if let Some(path) = &cli.output_file {
            self.output_file = path.clone();
        }
        if let Some(limit) = cli.limit {
            self.limit = limit;
        }
        if cli.dry_run {
            self.dry_run = true;
        }
    }

    /// Client secret path, falling back to the per-user config dir.
    pub fn credentials_path(&self) -> Result<PathBuf> {
        resolve_path(self.credentials_file.as_deref(), DEFAULT_CREDENTIALS_FILE)
    }

    /// Cached token path, falling back to the per-user config dir.
    pub fn token_path(&self) -> Result<PathBuf> {
        resolve_path(self.token_file.as_deref(), DEFAULT_TOKEN_FILE)
    }

    pub fn validate(&self) -> Result<()> {
        if self.account.trim().is_empty() {
            return Err(Error::Config("`account` must not be empty".to_string()));
        }
        for (key, queries) in [
            ("retrieve-queries", &self.retrieve_queries),
            ("delete-queries", &self.delete_queries),
        ] {
            if queries.iter().any(|q| q.trim().is_empty()) {
                return Err(Error::Config(format!("`{}` contains an empty query", key)));
            }
        }
        if self.retrieve_queries.is_empty() && self.delete_queries.is_empty() {
            warn!("Both `retrieve-queries` and `delete-queries` are empty; the run will do nothing");
        }
        Ok(())
    }
}

fn resolve_path(configured: Option<&Path>, filename: &str) -> Result<PathBuf> {
    match configured {
        Some(path) => Ok(path.to_path_buf()),
        None => dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(filename))
            .ok_or_else(|| Error::Config(format!("cannot determine config directory for {}", filename))),
    }
}

/// Label patterns that exclude a message from retrieval.
/// Plain label ids match exactly; glob syntax (`CATEGORY_*`) is allowed.
#[derive(Debug, Clone)]
pub struct SkipLabels {
    patterns: Vec<String>,
    set: GlobSet,
}

impl Default for SkipLabels {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }
}

impl SkipLabels {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pat in patterns {
            let glob = Glob::new(pat.as_ref())
                .map_err(|e| Error::Config(format!("invalid skip-label pattern '{}': {}", pat.as_ref(), e)))?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build skip-label set: {}", e)))?;
        Ok(Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            set,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// First of `labels` matched by the set, if any.
    pub fn matched<'a, S: AsRef<str>>(&self, labels: &'a [S]) -> Option<&'a str> {
        if self.is_empty() {
            return None;
        }
        for label in labels {
            let label: &'a str = label.as_ref();
            if self.set.is_match(label) {
                return Some(label);
            }
        }
        None
    }
}

impl<'de> Deserialize<'de> for SkipLabels {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Vec::<String>::deserialize(deserializer)?;
        SkipLabels::new(&raw).map_err(de::Error::custom)
    }
}

pub fn load_config(config_path: &Path) -> Result<Config> {
    debug!("Loading configuration from {:?}", config_path);

    let content = fs::read_to_string(config_path).map_err(|e| {
        error!("Failed to read config file {}: {}", config_path.display(), e);
        Error::Config(format!("failed to read config file {}: {}", config_path.display(), e))
    })?;

    let cfg = parse_config(&content)?;
    debug!("Successfully loaded configuration");
    Ok(cfg)
}

pub fn parse_config(content: &str) -> Result<Config> {
    serde_yaml::from_str(content).map_err(|e| {
        error!("Failed to parse YAML: {}", e);
        Error::Config(format!("failed to parse YAML: {}", e))
    })
}
