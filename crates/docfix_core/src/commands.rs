use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::changelog::{COMMAND_LOG_FILENAME, ChangeEntry, ChangeLog};
use crate::pipeline::{DocumentNormalizer, Normalized};
use crate::rules::{Applied, RewriteRule, apply_rule, line_number_at};

static COMMAND_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{<\s*(?i:command)\s*>\}\}([\s\S]*?)\{\{<\s*/\s*(?i:command)\s*>\}\}")
        .expect("command block regex")
});

static PROMPT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[$#]\s*").expect("prompt marker regex"));

/// `{{< command >}} ... {{< /command >}}` rewritten as a `bash` code fence.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandBlockRule;

impl RewriteRule for CommandBlockRule {
    fn name(&self) -> &'static str {
        "command-block"
    }

    fn pattern(&self) -> &Regex {
        &COMMAND_BLOCK
    }

    fn render(&self, captures: &Captures<'_>) -> Option<String> {
        let inner = captures.get(1)?;
        Some(normalize_command_block(inner.as_str()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CommandNormalizer;

impl DocumentNormalizer for CommandNormalizer {
    fn name(&self) -> &'static str {
        "commands"
    }

    fn log_file_name(&self) -> &'static str {
        COMMAND_LOG_FILENAME
    }

    fn normalize(&self, path: &str, content: &str) -> Normalized {
        let applied = normalize_commands(content);
        let mut log = ChangeLog::new();
        for rewrite in &applied.rewrites {
            log.record(ChangeEntry {
                path: path.to_string(),
                line: line_number_at(content, rewrite.start),
                original: rewrite.original.trim().to_string(),
                replacement: rewrite.replacement.trim().to_string(),
            });
        }
        Normalized {
            content: applied.changed().then_some(applied.text),
            log,
        }
    }
}

pub fn normalize_commands(content: &str) -> Applied {
    apply_rule(&CommandBlockRule, content)
}

/// Builds the fenced block for the text found between the delimiters. The
/// fence uses `\r\n` when the block itself does.
pub fn normalize_command_block(inner: &str) -> String {
    let newline = if inner.contains("\r\n") { "\r\n" } else { "\n" };
    let lines = inner.lines().collect::<Vec<_>>();
    let first = lines.iter().position(|line| !line.trim().is_empty());
    let last = lines.iter().rposition(|line| !line.trim().is_empty());

    let body = match (first, last) {
        (Some(first), Some(last)) => lines[first..=last]
            .iter()
            .map(|line| strip_prompt(line))
            .collect::<Vec<_>>()
            .join(newline),
        _ => String::new(),
    };
    format!("```bash{newline}{body}{newline}```")
}

/// Drops one leading `$` or `#` prompt marker and the whitespace around it.
pub fn strip_prompt(line: &str) -> String {
    PROMPT_MARKER.replace(line, "").into_owned()
}
