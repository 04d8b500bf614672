use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

pub const MANUAL_REVIEW_NOTE: &str = "MANUALLY REVIEW AND UPDATE new_link";
pub const DEFAULT_STATUS_CODE: u16 = 301;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RedirectRule {
    pub old_link: String,
    pub new_link: String,
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    #[serde(rename = "_note", default)]
    pub note: Option<String>,
}

fn default_status_code() -> u16 {
    DEFAULT_STATUS_CODE
}

impl RedirectRule {
    pub fn needs_review(&self) -> bool {
        self.note.as_deref() == Some(MANUAL_REVIEW_NOTE)
    }

    /// `_redirects` line: `<source> <destination> <status>`.
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {}",
            normalize_source_path(&self.old_link),
            normalize_destination(&self.new_link),
            self.status_code
        )
    }
}

/// Redirect mapping file: a JSON object keyed by product, each holding a list
/// of rules. Products are only validated when selected.
#[derive(Debug, Clone, Default)]
pub struct RedirectMapping {
    products: BTreeMap<String, Value>,
}

/// Rules of one product that are ready to publish, plus how many were held
/// back for manual review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRules {
    pub product: String,
    pub rules: Vec<RedirectRule>,
    pub pending_review: usize,
}

impl RedirectMapping {
    pub fn parse(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).context("failed to parse redirect mapping")?;
        let Value::Object(object) = value else {
            bail!("redirect mapping must be a JSON object keyed by product");
        };
        Ok(Self {
            products: object.into_iter().collect(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("redirect mapping not found: {}", path.display());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid redirect mapping {}", path.display()))
    }

    pub fn product_names(&self) -> Vec<&str> {
        self.products.keys().map(String::as_str).collect()
    }

    /// Selects the given products in order; products absent from the mapping
    /// are skipped.
    pub fn select(&self, products: &[String]) -> Result<Vec<ProductRules>> {
        let mut selected = Vec::new();
        for product in products {
            let Some(raw) = self.products.get(product) else {
                log::debug!("redirect mapping has no `{product}` section");
                continue;
            };
            let all: Vec<RedirectRule> = serde_json::from_value(raw.clone())
                .with_context(|| format!("invalid redirect rules for `{product}`"))?;
            let total = all.len();
            let rules = all
                .into_iter()
                .filter(|rule| !rule.needs_review())
                .collect::<Vec<_>>();
            let pending_review = total - rules.len();
            if pending_review > 0 {
                log::warn!("{product}: {pending_review} redirect(s) still need manual review");
            }
            selected.push(ProductRules {
                product: product.clone(),
                rules,
                pending_review,
            });
        }
        Ok(selected)
    }
}

pub fn is_absolute_http_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Ensures a leading `/`; a trailing slash is kept as written.
pub fn normalize_source_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// `http(s)` URLs are kept verbatim; anything else is a site path.
pub fn normalize_destination(destination: &str) -> String {
    if is_absolute_http_url(destination) {
        destination.to_string()
    } else {
        normalize_source_path(destination)
    }
}

#[derive(Debug, Clone)]
pub struct GenerateReport {
    pub output: PathBuf,
    pub lines: Vec<String>,
    pub pending_review: usize,
}

pub fn render_redirects(selected: &[ProductRules]) -> Vec<String> {
    selected
        .iter()
        .flat_map(|product| product.rules.iter().map(RedirectRule::to_line))
        .collect()
}

pub fn generate_redirects(
    mapping_path: &Path,
    output: &Path,
    products: &[String],
) -> Result<GenerateReport> {
    let mapping = RedirectMapping::load(mapping_path)?;
    let selected = mapping.select(products)?;
    let lines = render_redirects(&selected);

    let mut content = String::new();
    for line in &lines {
        content.push_str(line);
        content.push('\n');
    }
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(output, content).with_context(|| format!("failed to write {}", output.display()))?;

    Ok(GenerateReport {
        output: output.to_path_buf(),
        lines,
        pending_review: selected.iter().map(|product| product.pending_review).sum(),
    })
}
