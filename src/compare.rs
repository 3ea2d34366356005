//! Deterministic value comparison between code and policy text.
//!
//! A comparison pulls values out of the changed code with one configured
//! pattern and out of the policy corpus with another, then checks every
//! code value against the policy values with a fixed operator.

use serde::{Deserialize, Serialize};

use crate::diff::{looks_like_diff, parse_unified_diff};
use crate::drift::types::{Finding, FindingSource, FindingType, Severity};
use crate::extract::text::LineIndex;
use crate::safety::SafePattern;

/// Comparison operator; the code value is the left operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Equals,
    NotEquals,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
}

impl CompareOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "equals" | "eq" | "==" => Some(CompareOp::Equals),
            "not_equals" | "ne" | "!=" => Some(CompareOp::NotEquals),
            "gt" | ">" => Some(CompareOp::Gt),
            "gte" | ">=" => Some(CompareOp::Gte),
            "lt" | "<" => Some(CompareOp::Lt),
            "lte" | "<=" => Some(CompareOp::Lte),
            "contains" => Some(CompareOp::Contains),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Equals => "equals",
            CompareOp::NotEquals => "not_equals",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
            CompareOp::Contains => "contains",
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How values are interpreted before comparing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Numeric when both sides parse as numbers, text otherwise.
    #[default]
    Auto,
    Number,
    String,
}

impl ValueType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Some(ValueType::Auto),
            "number" | "numeric" => Some(ValueType::Number),
            "string" | "text" => Some(ValueType::String),
            _ => None,
        }
    }
}

/// Parse a number, tolerating thousands separators, whitespace, a leading
/// currency symbol and a trailing percent sign.
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let s = s.strip_prefix(['$', '€', '£', '¥']).unwrap_or(s);
    let s = s.trim_end().strip_suffix('%').unwrap_or(s);
    let cleaned: String = s
        .chars()
        .filter(|c| *c != ',' && *c != '_' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn compare_numbers(code: f64, policy: f64, op: CompareOp) -> bool {
    match op {
        CompareOp::Equals => code == policy,
        CompareOp::NotEquals => code != policy,
        CompareOp::Gt => code > policy,
        CompareOp::Gte => code >= policy,
        CompareOp::Lt => code < policy,
        CompareOp::Lte => code <= policy,
        CompareOp::Contains => code == policy,
    }
}

fn compare_text(code: &str, policy: &str, op: CompareOp) -> bool {
    let code = code.trim().to_lowercase();
    let policy = policy.trim().to_lowercase();
    match op {
        CompareOp::Equals => code == policy,
        CompareOp::NotEquals => code != policy,
        CompareOp::Gt => code > policy,
        CompareOp::Gte => code >= policy,
        CompareOp::Lt => code < policy,
        CompareOp::Lte => code <= policy,
        CompareOp::Contains => code.contains(&policy) || policy.contains(&code),
    }
}

/// Whether one code value satisfies `op` against one policy value.
pub fn satisfies(code: &str, policy: &str, op: CompareOp, value_type: ValueType) -> bool {
    match value_type {
        ValueType::String => compare_text(code, policy, op),
        ValueType::Number => match (parse_number(code), parse_number(policy)) {
            (Some(a), Some(b)) => compare_numbers(a, b, op),
            _ => false,
        },
        ValueType::Auto => match (parse_number(code), parse_number(policy)) {
            (Some(a), Some(b)) if op != CompareOp::Contains => compare_numbers(a, b, op),
            _ => compare_text(code, policy, op),
        },
    }
}

/// Every code value must satisfy `op` against at least one policy value.
/// Vacuously true with no code values; false with no policy values.
pub fn compare_values(
    code_values: &[String],
    policy_values: &[String],
    op: CompareOp,
    value_type: ValueType,
) -> bool {
    code_values.iter().all(|c| {
        policy_values
            .iter()
            .any(|p| satisfies(c, p, op, value_type))
    })
}

/// A validated comparison, ready to run.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub name: String,
    pub code_pattern: SafePattern,
    pub policy_pattern: SafePattern,
    pub op: CompareOp,
    pub value_type: ValueType,
    pub severity: Severity,
}

/// A value pulled from code, with where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CodeValue {
    value: String,
    file: Option<String>,
    line: usize,
}

/// Values from the added lines of a diff, or from the whole text otherwise.
fn code_values(pattern: &SafePattern, text: &str, file: Option<&str>) -> Vec<CodeValue> {
    if !looks_like_diff(text) {
        let lines = LineIndex::new(text);
        return pattern
            .values_at(text)
            .into_iter()
            .map(|(offset, value)| CodeValue {
                value,
                file: file.map(str::to_string),
                line: lines.line_of(offset),
            })
            .collect();
    }

    let mut values = Vec::new();
    for diff_file in parse_unified_diff(text) {
        let mut joined = String::new();
        let mut starts: Vec<(usize, usize)> = Vec::new();
        for added in diff_file.hunks.iter().flat_map(|h| h.added.iter()) {
            starts.push((joined.len(), added.line));
            joined.push_str(&added.text);
            joined.push('\n');
        }
        let path = diff_file.path().map(str::to_string).or_else(|| file.map(str::to_string));
        for (offset, value) in pattern.values_at(&joined) {
            let idx = starts.partition_point(|(s, _)| *s <= offset).saturating_sub(1);
            let line = starts.get(idx).map_or(0, |(_, l)| *l);
            values.push(CodeValue {
                value,
                file: path.clone(),
                line,
            });
        }
    }
    values
}

/// Run one comparison. `None` when nothing changed or the code agrees with
/// policy.
pub fn evaluate(
    comparison: &Comparison,
    code: &str,
    code_file: Option<&str>,
    policy: &str,
    policy_file: Option<&str>,
) -> Option<Finding> {
    let code_values = code_values(&comparison.code_pattern, code, code_file);
    if code_values.is_empty() {
        tracing::debug!(comparison = %comparison.name, "no code values; skipping");
        return None;
    }
    let first = &code_values[0];
    let code_location = first.file.clone().unwrap_or_else(|| "<code>".to_string());

    let policy_values = comparison.policy_pattern.values(policy);
    if policy_values.is_empty() {
        let shown: Vec<&str> = code_values.iter().map(|v| v.value.as_str()).collect();
        return Some(
            Finding::new(
                FindingSource::Policy,
                FindingType::PolicyValueMissing,
                comparison.severity,
                policy_file.map_or(code_location, str::to_string),
                format!(
                    "Comparison `{}`: code sets {} but the policy has no value matching `{}`",
                    comparison.name,
                    shown.join(", "),
                    comparison.policy_pattern.as_str()
                ),
                "Document the value in the policy or fix the policy pattern",
            ),
        );
    }

    let failing: Vec<&CodeValue> = code_values
        .iter()
        .filter(|c| {
            !policy_values
                .iter()
                .any(|p| satisfies(&c.value, p, comparison.op, comparison.value_type))
        })
        .collect();
    let first_failing = failing.first()?;

    let failing_values: Vec<&str> = failing.iter().map(|c| c.value.as_str()).collect();
    let finding = Finding::new(
        FindingSource::Policy,
        FindingType::PolicyValueMismatch,
        comparison.severity,
        first_failing.file.clone().unwrap_or(code_location),
        format!(
            "Comparison `{}`: code value {} is not {} policy value {}",
            comparison.name,
            failing_values.join(", "),
            comparison.op,
            policy_values.join(", ")
        ),
        "Align the code with the policy, or update the policy if it changed",
    );
    Some(if first_failing.line > 0 {
        finding.at_line(first_failing.line)
    } else {
        finding
    })
}

/// Run every comparison against one code text (diff or plain) and the
/// policy corpus.
pub fn run_comparisons(comparisons: &[Comparison], code: &str, policy: &str) -> Vec<Finding> {
    comparisons
        .iter()
        .filter_map(|c| evaluate(c, code, None, policy, None))
        .collect()
}
