use regex::{Captures, Regex};

/// A single "pattern + required captures + canonical formatter" unit.
///
/// `render` returns `None` when a match lacks one of the captures the rule
/// needs; such matches are left in place and produce no rewrite.
pub trait RewriteRule {
    fn name(&self) -> &'static str;
    fn pattern(&self) -> &Regex;
    fn render(&self, captures: &Captures<'_>) -> Option<String>;
}

/// One replacement performed by [`apply_rule`], located in the input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub rule: &'static str,
    pub start: usize,
    pub original: String,
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub text: String,
    pub rewrites: Vec<Rewrite>,
}

impl Applied {
    pub fn changed(&self) -> bool {
        !self.rewrites.is_empty()
    }
}

/// Apply `rule` to every non-overlapping match in `text` in a single forward
/// pass. Offsets in the returned rewrites refer to `text`, not to the output.
pub fn apply_rule<R: RewriteRule + ?Sized>(rule: &R, text: &str) -> Applied {
    let mut output = String::with_capacity(text.len());
    let mut rewrites = Vec::new();
    let mut cursor = 0usize;

    for captures in rule.pattern().captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let Some(replacement) = rule.render(&captures) else {
            continue;
        };
        output.push_str(&text[cursor..whole.start()]);
        output.push_str(&replacement);
        cursor = whole.end();
        rewrites.push(Rewrite {
            rule: rule.name(),
            start: whole.start(),
            original: whole.as_str().to_string(),
            replacement,
        });
    }

    if rewrites.is_empty() {
        return Applied {
            text: text.to_string(),
            rewrites,
        };
    }
    output.push_str(&text[cursor..]);
    Applied {
        text: output,
        rewrites,
    }
}

/// 1-based line number of the byte offset `offset` in `text`.
pub fn line_number_at(text: &str, offset: usize) -> usize {
    let end = offset.min(text.len());
    text.as_bytes()[..end].iter().filter(|byte| **byte == b'\n').count() + 1
}
