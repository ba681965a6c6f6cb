//! Run configuration.
//!
//! [`SweepConfig`] is built once (usually from a TOML file) and passed by
//! reference into every component. Nothing here reads global state.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::accounts::{AccountDirectory, AccountEntry};
use crate::error::{SweepError, SweepResult};
use crate::term::FlagCategory;

/// Disqualifiers used when the config file does not list any.
pub const DEFAULT_DISQUALIFIERS: [&str; 17] = [
    "cheap",
    "free",
    "affordable",
    "do it yourself",
    "jobs",
    "university",
    "wikipedia",
    "craigslist",
    "template",
    "sample",
    "how to",
    "salary",
    "career",
    "policy",
    "student",
    "definition",
    "internship",
];

pub const DEFAULT_IRRELEVANT_LIST: &str = "Low-quality Searches & Words";
pub const DEFAULT_COMPETITOR_LIST: &str = "Competitor Terms";
pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;

/// Which text of an approved term becomes the exclusion phrase.
///
/// Fixed for a whole run; the two modes are never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhraseMode {
    /// The disqualifier or model anchor phrase. Broader coverage, shorter lists.
    #[default]
    MatchedKeyword,
    /// The full raw search term.
    FullTerm,
}

/// Destination list for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSettings {
    pub name: String,
    /// Create the list when it does not exist. Unset means on for
    /// irrelevant. Competitor lists are never created, so `true` is rejected
    /// there.
    #[serde(default)]
    pub auto_create: Option<bool>,
}

impl ListSettings {
    pub fn new(name: impl Into<String>, auto_create: bool) -> Self {
        Self {
            name: name.into(),
            auto_create: Some(auto_create),
        }
    }
}

/// Destination lists per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListConfig {
    #[serde(default = "default_irrelevant_list")]
    pub irrelevant: ListSettings,
    #[serde(default = "default_competitor_list")]
    pub competitor: ListSettings,
}

fn default_irrelevant_list() -> ListSettings {
    ListSettings {
        name: DEFAULT_IRRELEVANT_LIST.to_string(),
        auto_create: None,
    }
}

fn default_competitor_list() -> ListSettings {
    ListSettings {
        name: DEFAULT_COMPETITOR_LIST.to_string(),
        auto_create: None,
    }
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            irrelevant: default_irrelevant_list(),
            competitor: default_competitor_list(),
        }
    }
}

impl ListConfig {
    pub fn settings(&self, category: FlagCategory) -> &ListSettings {
        match category {
            FlagCategory::Irrelevant => &self.irrelevant,
            FlagCategory::Competitor => &self.competitor,
        }
    }

    pub fn name(&self, category: FlagCategory) -> &str {
        &self.settings(category).name
    }

    pub fn auto_create(&self, category: FlagCategory) -> bool {
        match category {
            FlagCategory::Irrelevant => self.irrelevant.auto_create.unwrap_or(true),
            FlagCategory::Competitor => false,
        }
    }
}

fn default_disqualifiers() -> Vec<String> {
    DEFAULT_DISQUALIFIERS.iter().map(|d| d.to_string()).collect()
}

fn default_lookback_days() -> u32 {
    DEFAULT_LOOKBACK_DAYS
}

/// Everything a run needs besides credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Ordered disqualifier table; the first match wins.
    #[serde(default = "default_disqualifiers")]
    pub disqualifiers: Vec<String>,
    #[serde(default)]
    pub phrase_mode: PhraseMode,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default)]
    pub lists: ListConfig,
    #[serde(default)]
    pub accounts: Vec<AccountEntry>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            disqualifiers: default_disqualifiers(),
            phrase_mode: PhraseMode::default(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            lists: ListConfig::default(),
            accounts: Vec::new(),
        }
    }
}

impl SweepConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> SweepResult<Self> {
        let config: SweepConfig =
            toml::from_str(raw).map_err(|e| SweepError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> SweepResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SweepError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> SweepResult<()> {
        if self.lookback_days == 0 {
            return Err(SweepError::Configuration(
                "lookback_days must be at least 1".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for category in FlagCategory::ALL {
            let name = self.lists.name(category).trim();
            if name.is_empty() {
                return Err(SweepError::Configuration(format!(
                    "{category} list name is empty"
                )));
            }
            if !names.insert(name.to_lowercase()) {
                return Err(SweepError::Configuration(format!(
                    "{category} list name '{name}' is used by another category"
                )));
            }
        }

        if self.lists.competitor.auto_create == Some(true) {
            return Err(SweepError::Configuration(
                "competitor lists cannot be auto-created; create the list in the account first"
                    .to_string(),
            ));
        }

        // Builds the alias index, which rejects bad ids and colliding aliases.
        self.directory().map(|_| ())
    }

    /// Alias lookup over the configured accounts.
    pub fn directory(&self) -> SweepResult<AccountDirectory> {
        AccountDirectory::new(self.accounts.clone())
    }
}
