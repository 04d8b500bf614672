use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::changelog::{ChangeEntry, ChangeLog, IMAGE_LOG_FILENAME};
use crate::pipeline::{DocumentNormalizer, Normalized};
use crate::rules::{RewriteRule, apply_rule};

pub const DEFAULT_IMAGE_PREFIX: &str = "/images/aws/";

static DISABLED_EMBED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\{\s*/\*\s*<img\s+([^>]+?)\s*/?>\s*\*/\}\s*\{\s*/\*\s*mdx-disabled\s*\*/\s*\}",
    )
    .expect("disabled embed regex")
});

static RAW_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<img\s+([^>]*?)\s*/?>").expect("raw image regex"));

static FIGURE_SHORTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\{<\s*figure\s+[^>]*src="([^"]+)"[^>]*alt="([^"]+)"[^>]*>\}\}"#)
        .expect("figure shortcode regex")
});

static SRC_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"src\s*=\s*["']([^"']+)["']"#).expect("src attribute regex"));

static ALT_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"alt\s*=\s*["']([^"']+)["']"#).expect("alt attribute regex"));

/// Returns `(src, alt)` when both attributes are present and non-empty.
pub fn extract_attributes(tag: &str) -> Option<(&str, &str)> {
    let src = SRC_ATTRIBUTE.captures(tag)?.get(1)?.as_str();
    let alt = ALT_ATTRIBUTE.captures(tag)?.get(1)?.as_str();
    Some((src, alt))
}

pub fn canonical_image(prefix: &str, src: &str, alt: &str) -> String {
    format!("![{alt}]({prefix}{src})")
}

/// `{/* <img ...> */}{/* mdx-disabled */}`
#[derive(Debug, Clone)]
pub struct DisabledEmbedRule {
    prefix: String,
}

impl DisabledEmbedRule {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl RewriteRule for DisabledEmbedRule {
    fn name(&self) -> &'static str {
        "disabled-embed"
    }

    fn pattern(&self) -> &Regex {
        &DISABLED_EMBED
    }

    fn render(&self, captures: &Captures<'_>) -> Option<String> {
        let (src, alt) = extract_attributes(captures.get(1)?.as_str())?;
        Some(canonical_image(&self.prefix, src, alt))
    }
}

/// `<img ...>` and `<img ... />`
#[derive(Debug, Clone)]
pub struct RawImageRule {
    prefix: String,
}

impl RawImageRule {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl RewriteRule for RawImageRule {
    fn name(&self) -> &'static str {
        "raw-image"
    }

    fn pattern(&self) -> &Regex {
        &RAW_IMAGE
    }

    fn render(&self, captures: &Captures<'_>) -> Option<String> {
        let (src, alt) = extract_attributes(captures.get(1)?.as_str())?;
        Some(canonical_image(&self.prefix, src, alt))
    }
}

/// `{{< figure src="..." alt="..." >}}`; unlike the tag families, `src` must
/// come before `alt`.
#[derive(Debug, Clone)]
pub struct FigureShortcodeRule {
    prefix: String,
}

impl FigureShortcodeRule {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl RewriteRule for FigureShortcodeRule {
    fn name(&self) -> &'static str {
        "figure-shortcode"
    }

    fn pattern(&self) -> &Regex {
        &FIGURE_SHORTCODE
    }

    fn render(&self, captures: &Captures<'_>) -> Option<String> {
        let src = captures.get(1)?.as_str();
        let alt = captures.get(2)?.as_str();
        Some(canonical_image(&self.prefix, src, alt))
    }
}

/// Line-scoped image rewriting. Families run in order and each one sees the
/// line as left by the previous family.
pub struct ImageNormalizer {
    families: Vec<Box<dyn RewriteRule>>,
}

impl ImageNormalizer {
    pub fn new(prefix: &str) -> Self {
        Self {
            families: vec![
                Box::new(DisabledEmbedRule::new(prefix)),
                Box::new(RawImageRule::new(prefix)),
                Box::new(FigureShortcodeRule::new(prefix)),
            ],
        }
    }

    pub fn family_names(&self) -> Vec<&'static str> {
        self.families.iter().map(|family| family.name()).collect()
    }

    /// Rewrites one line. Entries go to `changes` under `path` and `line_number`.
    pub fn normalize_line(
        &self,
        path: &str,
        line_number: usize,
        line: &str,
        changes: &mut ChangeLog,
    ) -> String {
        let mut current = line.to_string();
        for family in &self.families {
            let applied = apply_rule(&**family, &current);
            if !applied.changed() {
                continue;
            }
            for rewrite in applied.rewrites {
                log::debug!(
                    "{path}:{line_number}: {} rewrote {}",
                    rewrite.rule,
                    rewrite.original
                );
                changes.record(ChangeEntry {
                    path: path.to_string(),
                    line: line_number,
                    original: rewrite.original,
                    replacement: rewrite.replacement,
                });
            }
            current = applied.text;
        }
        current
    }
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_PREFIX)
    }
}

impl DocumentNormalizer for ImageNormalizer {
    fn name(&self) -> &'static str {
        "images"
    }

    fn log_file_name(&self) -> &'static str {
        IMAGE_LOG_FILENAME
    }

    fn normalize(&self, path: &str, content: &str) -> Normalized {
        let mut changes = ChangeLog::new();
        let mut output = String::with_capacity(content.len());
        for (index, line) in content.split_inclusive('\n').enumerate() {
            output.push_str(&self.normalize_line(path, index + 1, line, &mut changes));
        }
        Normalized {
            content: (!changes.is_empty()).then_some(output),
            log: changes,
        }
    }
}
