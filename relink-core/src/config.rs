//! Application configuration, loaded from a TOML file.
//!
//! Every section has defaults except `[source]` candidates and `[mappings]`,
//! which describe the mirror being watched. `[telegram]` is optional; without
//! it changes are only logged.

use crate::error::{CoreError, Result};
use crate::patch::{DEFAULT_FIELD, NameMapping};
use relink_scanner::PairingPolicy;
use relink_scanner::client::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

pub const TELEGRAM_TOKEN_ENV: &str = "RELINK_TELEGRAM_TOKEN";
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/relink/relink.toml";

/// Written by `relink init`.
pub const STARTER_CONFIG: &str = r#"# relink configuration
site_name = "SamFTP"

[source]
# Tried in order; the first one that answers is used for the run.
candidates = ["http://172.16.50.5/"]
timeout_secs = 30

[extract]
link_selector = "li > a.hvr-bounce-to-bottom"
link_attr = "href"
label_selector = "li > a.hvr-bounce-to-bottom"
# "strict" fails when the selectors disagree on length, "truncate" pairs up to the shorter one.
pairing = "strict"

[rclone]
config_path = "~/.config/rclone/rclone.conf"
field = "url"

[store]
path = "~/.config/relink/relink.db"

# [telegram]
# bot_token = "123456:ABC"   # or set RELINK_TELEGRAM_TOKEN
# chat_id = "-100123456789"

# Page label -> rclone remote name
[mappings]
"Animation Movies -1080p" = "AnimationMovie1080"
"Animation Movies" = "AnimationMovie"
"Cartoon TV Series" = "AnimationSeries"
"KOREAN TV & WEB Series" = "KoreanSeries"
"Foreign Language Movies" = "ForeignLanguageMovies"
"South-Movie Hindi Dubbed" = "Sindian"
"Hindi Movies" = "Hindi"
"English Movies -1080p" = "English1080"
"English Movies" = "English"
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_site_name")]
    pub site_name: String,
    pub source: SourceConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub rclone: RcloneConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub mappings: NameMapping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub candidates: Vec<Url>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    pub link_selector: String,
    pub link_attr: String,
    pub label_selector: String,
    pub pairing: PairingPolicy,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            link_selector: "li > a.hvr-bounce-to-bottom".to_string(),
            link_attr: "href".to_string(),
            label_selector: "li > a.hvr-bounce-to-bottom".to_string(),
            pairing: PairingPolicy::Strict,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RcloneConfig {
    pub config_path: String,
    pub field: String,
}

impl Default for RcloneConfig {
    fn default() -> Self {
        Self {
            config_path: "~/.config/rclone/rclone.conf".to_string(),
            field: DEFAULT_FIELD.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "~/.config/relink/relink.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
}

fn default_site_name() -> String {
    "mirror".to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

impl AppConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            CoreError::config(format!("reading config file at {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.candidates.is_empty() {
            return Err(CoreError::config("[source] needs at least one candidate URL"));
        }
        if self.source.timeout_secs == 0 {
            return Err(CoreError::config("[source] timeout_secs must be positive"));
        }
        if self.extract.link_selector.trim().is_empty()
            || self.extract.label_selector.trim().is_empty()
        {
            return Err(CoreError::config("[extract] selectors must not be empty"));
        }
        if self.extract.link_attr.trim().is_empty() {
            return Err(CoreError::config("[extract] link_attr must not be empty"));
        }

        let field = &self.rclone.field;
        if field.is_empty() || field.contains('=') || field.contains(char::is_whitespace) {
            return Err(CoreError::config(format!(
                "[rclone] field '{}' must be a bare key",
                field
            )));
        }

        // Each section has one url line, so it can follow only one label
        let mut targets: HashMap<&str, &str> = HashMap::new();
        for (label, section) in self.mappings.iter() {
            if section.trim().is_empty() || section.contains(['[', ']']) {
                return Err(CoreError::config(format!(
                    "[mappings] '{}' has an invalid section name '{}'",
                    label, section
                )));
            }
            if let Some(other) = targets.insert(section, label) {
                return Err(CoreError::config(format!(
                    "[mappings] '{}' and '{}' both map to section '{}'",
                    other, label, section
                )));
            }
        }

        if let Some(telegram) = &self.telegram {
            if telegram.chat_id.trim().is_empty() {
                return Err(CoreError::config("[telegram] chat_id must not be empty"));
            }
            Url::parse(&telegram.api_base).map_err(|e| {
                CoreError::config(format!("[telegram] invalid api_base: {}", e))
            })?;
        }

        Ok(())
    }

    pub fn rclone_path(&self) -> PathBuf {
        expand_path(&self.rclone.config_path)
    }

    pub fn store_path(&self) -> PathBuf {
        expand_path(&self.store.path)
    }

    /// Bot token, with the environment variable taking precedence over the file.
    pub fn telegram_token(&self) -> Option<String> {
        std::env::var(TELEGRAM_TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .or_else(|| {
                self.telegram
                    .as_ref()
                    .map(|t| t.bot_token.clone())
                    .filter(|token| !token.trim().is_empty())
            })
    }
}
