use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::changelog::DEFAULT_LOG_DIR;
use crate::images::DEFAULT_IMAGE_PREFIX;
use crate::walker::{default_extensions, normalize_path};

pub const DEFAULT_CONFIG_FILENAME: &str = "docfix.toml";
pub const DEFAULT_REDIRECT_MAPPING: &str = "redirects_config.json";
pub const DEFAULT_REDIRECT_OUTPUT: &str = "_redirects";
pub const DEFAULT_REDIRECT_PRODUCT: &str = "aws";
pub const DEFAULT_STAGING_URL: &str = "http://localhost:4321";
pub const DEFAULT_USER_AGENT: &str = "docfix-redirect-tester/0.1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct DocfixConfig {
    #[serde(default)]
    pub walk: WalkSection,
    #[serde(default)]
    pub changelog: ChangelogSection,
    #[serde(default)]
    pub images: ImagesSection,
    #[serde(default)]
    pub redirects: RedirectsSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WalkSection {
    pub extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ChangelogSection {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ImagesSection {
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct RedirectsSection {
    pub mapping: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub products: Option<Vec<String>>,
    pub staging_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub delay_ms: Option<u64>,
    pub user_agent: Option<String>,
}

/// Load and parse a DocfixConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<DocfixConfig> {
    if !config_path.exists() {
        return Ok(DocfixConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: DocfixConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env,
    Config,
    Default,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Config => "config",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Sourced<T> {
    fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Values given on the command line; they win over env, config and defaults.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub redirect_mapping: Option<PathBuf>,
    pub redirect_output: Option<PathBuf>,
    pub staging_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: PathBuf,
    pub config_found: bool,
    pub extensions: Vec<String>,
    pub changelog_dir: Sourced<PathBuf>,
    pub image_prefix: Sourced<String>,
    pub redirect_mapping: Sourced<PathBuf>,
    pub redirect_output: Sourced<PathBuf>,
    pub products: Vec<String>,
    pub staging_url: Sourced<String>,
    pub timeout: Duration,
    pub delay: Duration,
    pub user_agent: Sourced<String>,
}

impl Settings {
    pub fn load(config_path: &Path, overrides: &SettingsOverrides) -> Result<Self> {
        let config = load_config(config_path)?;
        Ok(Self::resolve_with_lookup(
            config_path,
            config_path.exists(),
            &config,
            overrides,
            |key| env::var(key).ok(),
        ))
    }

    /// Precedence for each value: flag > env > config file > default.
    pub fn resolve_with_lookup<F>(
        config_path: &Path,
        config_found: bool,
        config: &DocfixConfig,
        overrides: &SettingsOverrides,
        lookup: F,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let changelog_dir = pick(
            None,
            env_value("DOCFIX_CHANGELOG_DIR").map(PathBuf::from),
            config.changelog.dir.clone(),
            PathBuf::from(DEFAULT_LOG_DIR),
        );
        let image_prefix = pick(
            None,
            env_value("DOCFIX_IMAGE_PREFIX"),
            config.images.prefix.clone(),
            DEFAULT_IMAGE_PREFIX.to_string(),
        );
        let redirect_mapping = pick(
            overrides.redirect_mapping.clone(),
            None,
            config.redirects.mapping.clone(),
            PathBuf::from(DEFAULT_REDIRECT_MAPPING),
        );
        let redirect_output = pick(
            overrides.redirect_output.clone(),
            None,
            config.redirects.output.clone(),
            PathBuf::from(DEFAULT_REDIRECT_OUTPUT),
        );
        let staging_url = pick(
            overrides.staging_url.clone(),
            env_value("DOCFIX_STAGING_URL"),
            config.redirects.staging_url.clone(),
            DEFAULT_STAGING_URL.to_string(),
        );
        let user_agent = pick(
            None,
            env_value("DOCFIX_USER_AGENT"),
            config.redirects.user_agent.clone(),
            DEFAULT_USER_AGENT.to_string(),
        );

        Self {
            config_path: config_path.to_path_buf(),
            config_found,
            extensions: config
                .walk
                .extensions
                .clone()
                .filter(|extensions| !extensions.is_empty())
                .unwrap_or_else(default_extensions),
            changelog_dir,
            image_prefix,
            redirect_mapping,
            redirect_output,
            products: config
                .redirects
                .products
                .clone()
                .unwrap_or_else(|| vec![DEFAULT_REDIRECT_PRODUCT.to_string()]),
            staging_url,
            timeout: Duration::from_secs(
                overrides
                    .timeout_secs
                    .or(config.redirects.timeout_secs)
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            delay: Duration::from_millis(config.redirects.delay_ms.unwrap_or(DEFAULT_DELAY_MS)),
            user_agent,
        }
    }

    pub fn diagnostics(&self) -> String {
        [
            format!(
                "config_path: {} ({})",
                normalize_path(&self.config_path),
                if self.config_found { "found" } else { "missing" }
            ),
            format!("extensions: {}", self.extensions.join(", ")),
            format!(
                "changelog_dir: {} ({})",
                normalize_path(&self.changelog_dir.value),
                self.changelog_dir.source.as_str()
            ),
            format!(
                "image_prefix: {} ({})",
                self.image_prefix.value,
                self.image_prefix.source.as_str()
            ),
            format!(
                "redirect_mapping: {} ({})",
                normalize_path(&self.redirect_mapping.value),
                self.redirect_mapping.source.as_str()
            ),
            format!(
                "redirect_output: {} ({})",
                normalize_path(&self.redirect_output.value),
                self.redirect_output.source.as_str()
            ),
            format!("products: {}", self.products.join(", ")),
            format!(
                "staging_url: {} ({})",
                self.staging_url.value,
                self.staging_url.source.as_str()
            ),
            format!("timeout_secs: {}", self.timeout.as_secs()),
            format!("delay_ms: {}", self.delay.as_millis()),
            format!(
                "user_agent: {} ({})",
                self.user_agent.value,
                self.user_agent.source.as_str()
            ),
        ]
        .join("\n")
    }
}

fn pick<T>(flag: Option<T>, env: Option<T>, config: Option<T>, default: T) -> Sourced<T> {
    if let Some(value) = flag {
        return Sourced::new(value, ValueSource::Flag);
    }
    if let Some(value) = env {
        return Sourced::new(value, ValueSource::Env);
    }
    if let Some(value) = config {
        return Sourced::new(value, ValueSource::Config);
    }
    Sourced::new(default, ValueSource::Default)
}
