use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_AGENT: &str = "indexbot/0.2";
pub const DEFAULT_CONFIG_PATH: &str = ".indexbot/config.toml";
pub const DEFAULT_OPT_IN_TEMPLATE: &str = "User:HBC Archive Indexerbot/OptIn";
pub const DEFAULT_TEMPLATE: &str = "User:HBC Archive Indexerbot/default template";
pub const DEFAULT_BOT_USER: &str = "Legobot";
pub const DEFAULT_EDIT_SUMMARY: &str = "BOT: Updating index";
pub const DEFAULT_TASK_ID: u32 = 15;
pub const DEFAULT_RECENT_EDIT_HOURS: i64 = 12;

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct IndexerConfig {
    #[serde(default)]
    pub wiki: WikiSection,
    #[serde(default)]
    pub indexer: IndexerSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiSection {
    pub api_url: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct IndexerSection {
    pub opt_in_template: Option<String>,
    pub default_template: Option<String>,
    pub bot_user: Option<String>,
    pub edit_summary: Option<String>,
    pub log_page: Option<String>,
    pub enable_page: Option<String>,
    pub task_id: Option<u32>,
    pub recent_edit_hours: Option<i64>,
}

/// Resolved view of `[indexer]` handed to the pipeline and the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerSettings {
    pub opt_in_template: String,
    pub default_template: String,
    pub bot_user: String,
    pub edit_summary: String,
    pub log_page: Option<String>,
    pub enable_page: Option<String>,
    pub task_id: u32,
    pub recent_edit_hours: i64,
}

impl Default for IndexerSettings {
    fn default() -> Self {
        Self {
            opt_in_template: DEFAULT_OPT_IN_TEMPLATE.to_string(),
            default_template: DEFAULT_TEMPLATE.to_string(),
            bot_user: DEFAULT_BOT_USER.to_string(),
            edit_summary: DEFAULT_EDIT_SUMMARY.to_string(),
            log_page: None,
            enable_page: None,
            task_id: DEFAULT_TASK_ID,
            recent_edit_hours: DEFAULT_RECENT_EDIT_HOURS,
        }
    }
}

impl IndexerConfig {
    /// Resolve the wiki API URL: env WIKI_API_URL > config > None.
    pub fn api_url(&self) -> Option<String> {
        env_override("WIKI_API_URL").or_else(|| self.wiki.api_url.clone())
    }

    /// Resolve user agent: env WIKI_USER_AGENT > config > DEFAULT_USER_AGENT.
    pub fn user_agent(&self) -> String {
        env_override("WIKI_USER_AGENT")
            .or_else(|| self.wiki.user_agent.clone())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    pub fn settings(&self) -> IndexerSettings {
        let defaults = IndexerSettings::default();
        let section = &self.indexer;
        IndexerSettings {
            opt_in_template: non_blank(&section.opt_in_template)
                .unwrap_or(defaults.opt_in_template),
            default_template: non_blank(&section.default_template)
                .unwrap_or(defaults.default_template),
            bot_user: non_blank(&section.bot_user).unwrap_or(defaults.bot_user),
            edit_summary: non_blank(&section.edit_summary).unwrap_or(defaults.edit_summary),
            log_page: non_blank(&section.log_page),
            enable_page: non_blank(&section.enable_page),
            task_id: section.task_id.unwrap_or(defaults.task_id),
            recent_edit_hours: section
                .recent_edit_hours
                .unwrap_or(defaults.recent_edit_hours),
        }
    }
}

/// Load and parse an IndexerConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<IndexerConfig> {
    if !config_path.exists() {
        return Ok(IndexerConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: IndexerConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

fn env_override(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}
