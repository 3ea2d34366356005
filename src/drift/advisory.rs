//! Optional advisory pass backed by a text-completion model.
//!
//! The model only ever adds findings marked non-deterministic; it never
//! removes or changes rule-derived ones, and a bad completion is dropped.

use serde::Deserialize;

use crate::drift::types::{Finding, Severity};

/// Largest excerpt of any one file placed in a prompt.
const MAX_EXCERPT_CHARS: usize = 4000;

/// Something that turns a prompt into completed text.
pub trait CompletionSource: Send + Sync {
    fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// One file's content as shown to the model.
#[derive(Debug, Clone)]
pub struct Excerpt {
    pub path: String,
    pub text: String,
}

impl Excerpt {
    pub fn new(path: impl Into<String>, text: &str) -> Self {
        let text = match text.char_indices().nth(MAX_EXCERPT_CHARS) {
            Some((cut, _)) => format!("{}\n[truncated]", &text[..cut]),
            None => text.to_string(),
        };
        Self {
            path: path.into(),
            text,
        }
    }
}

/// Build the prompt for one rule.
pub fn build_prompt(rule: &str, code: &[Excerpt], docs: &[Excerpt]) -> String {
    let mut prompt = format!(
        "You review whether documentation still matches code for the `{}` rule.\n\
         Report only concrete mismatches. Answer with a JSON array of objects with the \
         keys type, severity (info, warning, error or critical), file, explanation and \
         suggestion. Answer [] when the docs are accurate.\n",
        rule
    );
    for (label, excerpts) in [("CODE", code), ("DOCS", docs)] {
        for excerpt in excerpts {
            prompt.push_str(&format!("\n=== {} {} ===\n{}\n", label, excerpt.path, excerpt.text));
        }
    }
    prompt
}

#[derive(Debug, Deserialize)]
struct AdvisoryItem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    file: String,
    explanation: String,
    #[serde(default)]
    suggestion: String,
}

/// Parse a completion into advisory findings.
///
/// The JSON array may be wrapped in prose or a code fence; the outermost
/// `[...]` is taken.
pub fn parse_completion(text: &str, default_severity: Severity) -> anyhow::Result<Vec<Finding>> {
    let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
        anyhow::bail!("completion contains no JSON array");
    };
    if end < start {
        anyhow::bail!("completion contains no JSON array");
    }
    let items: Vec<AdvisoryItem> = serde_json::from_str(&text[start..=end])?;
    Ok(items
        .into_iter()
        .filter(|item| !item.explanation.trim().is_empty())
        .map(|item| {
            let explanation = if item.kind.trim().is_empty() {
                item.explanation
            } else {
                format!("[{}] {}", item.kind.trim(), item.explanation)
            };
            let file = if item.file.trim().is_empty() {
                "<advisory>".to_string()
            } else {
                item.file
            };
            Finding::advisory(
                Severity::parse_or(&item.severity, default_severity),
                file,
                explanation,
                item.suggestion,
            )
        })
        .collect())
}

/// Ask `source` about one rule. Failures are logged and yield nothing.
pub fn advisory_findings(
    source: &dyn CompletionSource,
    rule: &str,
    code: &[Excerpt],
    docs: &[Excerpt],
    default_severity: Severity,
) -> Vec<Finding> {
    let prompt = build_prompt(rule, code, docs);
    let completion = match source.complete(&prompt) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(rule, error = %e, "completion failed; skipping advisory pass");
            return Vec::new();
        }
    };
    match parse_completion(&completion, default_severity) {
        Ok(findings) => findings,
        Err(e) => {
            tracing::warn!(rule, error = %e, "ignoring malformed completion");
            Vec::new()
        }
    }
}
