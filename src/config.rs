use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::language::LanguageKind;

/// Configuration file name looked up at the repository root.
pub const CONFIG_FILE: &str = "codeprop.toml";

/// Build configuration loaded from `codeprop.toml` at the repository root.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Additional glob patterns to exclude (beyond .gitignore and the hard-excluded directories).
    pub exclude: Vec<String>,
    /// Restrict dispatch to these languages (`java`, `python`). Empty means all.
    pub languages: Vec<String>,
    /// Parse files on the rayon pool.
    pub parallel: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            languages: Vec::new(),
            parallel: true,
        }
    }
}

impl BuildConfig {
    /// Load configuration from `codeprop.toml` in the given root directory.
    ///
    /// Returns the default configuration if the file does not exist or cannot be parsed.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|err| {
                warn!("failed to parse {CONFIG_FILE}: {err}. Using defaults.");
                Self::default()
            }),
            Err(err) => {
                warn!("failed to read {CONFIG_FILE}: {err}. Using defaults.");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// The language allow-list, or `None` when every language is allowed.
    /// Unknown names are reported and ignored.
    pub fn allowed_languages(&self) -> Option<HashSet<LanguageKind>> {
        if self.languages.is_empty() {
            return None;
        }
        let mut set = HashSet::new();
        for name in &self.languages {
            match LanguageKind::from_str_loose(name) {
                Some(lang) => {
                    set.insert(lang);
                }
                None => warn!("ignoring unknown language {name:?} in {CONFIG_FILE}"),
            }
        }
        Some(set)
    }
}
