//! Safety screening for patterns that come from user configuration.
//!
//! Built-in extraction rules use the linear-time `regex` crate. Patterns
//! from configuration are compiled with `fancy-regex` so authors can use
//! look-around and backreferences, which means they run on a backtracking
//! engine and can blow up on adversarial input. Every configured pattern
//! goes through [`validate_pattern_safety`] before any file is scanned:
//!
//! 1. it must compile;
//! 2. a structural screen rejects nested unbounded repetition over
//!    ambiguous bodies (`(a+)+`, `(a|aa)+`, `(\w|\d)*`);
//! 3. it is run against a fixed probe battery under a time budget and a
//!    lowered backtrack limit.
//!
//! The probe regex is discarded afterwards and a fresh [`SafePattern`] is
//! compiled, so the first real search starts from a clean state.

use std::time::{Duration, Instant};

use fancy_regex::{Expr, Regex, RegexBuilder};
use thiserror::Error;

/// Per-probe execution budget.
pub const PROBE_BUDGET: Duration = Duration::from_millis(100);

/// Length of the repeated-character runs in the probe battery.
const PROBE_LEN: usize = 4096;

/// Backtrack limit used while probing (the library default is 1,000,000).
const PROBE_BACKTRACK_LIMIT: usize = 100_000;

/// Errors produced when screening a configured pattern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("invalid pattern {pattern:?}: {message}")]
    Invalid { pattern: String, message: String },
    #[error("pattern {pattern:?} may backtrack catastrophically: {detail}")]
    Catastrophic { pattern: String, detail: String },
    #[error("pattern {pattern:?} exceeded the {budget_ms}ms safety budget on probe {probe:?}")]
    TooSlow {
        pattern: String,
        probe: String,
        budget_ms: u128,
    },
}

/// A configured pattern that passed the safety screen.
#[derive(Debug, Clone)]
pub struct SafePattern {
    source: String,
    regex: Regex,
}

impl SafePattern {
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        match self.regex.is_match(text) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::warn!(pattern = %self.source, error = %e, "pattern execution failed");
                false
            }
        }
    }

    /// Every capture-group-1 value (or the whole match when the pattern has
    /// no groups), trimmed, in match order.
    pub fn values(&self, text: &str) -> Vec<String> {
        self.values_at(text).into_iter().map(|(_, v)| v).collect()
    }

    /// Same as [`SafePattern::values`], paired with each value's byte offset.
    pub fn values_at(&self, text: &str) -> Vec<(usize, String)> {
        let mut values = Vec::new();
        for caps in self.regex.captures_iter(text) {
            let caps = match caps {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(pattern = %self.source, error = %e, "pattern execution aborted");
                    break;
                }
            };
            let m = caps.get(1).or_else(|| caps.get(0));
            if let Some(m) = m {
                let value = m.as_str().trim();
                if !value.is_empty() {
                    values.push((m.start(), value.to_string()));
                }
            }
        }
        values
    }
}

/// Screens configured patterns with a fixed probe battery.
#[derive(Debug, Clone)]
pub struct SafetyValidator {
    budget: Duration,
    probes: Vec<String>,
}

impl Default for SafetyValidator {
    fn default() -> Self {
        Self::new(PROBE_BUDGET)
    }
}

impl SafetyValidator {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            probes: probe_battery(PROBE_LEN),
        }
    }

    /// Validate `pattern` and return a freshly compiled [`SafePattern`].
    pub fn validate(&self, pattern: &str) -> Result<SafePattern, PatternError> {
        let tree = Expr::parse_tree(pattern).map_err(|e| PatternError::Invalid {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        if let Some(detail) = screen(&tree.expr) {
            return Err(PatternError::Catastrophic {
                pattern: pattern.to_string(),
                detail,
            });
        }

        let probe_regex = RegexBuilder::new(pattern)
            .backtrack_limit(PROBE_BACKTRACK_LIMIT)
            .build()
            .map_err(|e| PatternError::Invalid {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;

        for probe in &self.probes {
            let start = Instant::now();
            let outcome = probe_regex.find(probe);
            let elapsed = start.elapsed();
            if outcome.is_err() || elapsed > self.budget {
                return Err(PatternError::TooSlow {
                    pattern: pattern.to_string(),
                    probe: probe_label(probe),
                    budget_ms: self.budget.as_millis(),
                });
            }
        }

        let regex = Regex::new(pattern).map_err(|e| PatternError::Invalid {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(SafePattern {
            source: pattern.to_string(),
            regex,
        })
    }
}

/// Validate a configured pattern with the default budget.
pub fn validate_pattern_safety(pattern: &str) -> Result<SafePattern, PatternError> {
    SafetyValidator::default().validate(pattern)
}

/// Long repeated runs, with and without a trailing mismatch.
fn probe_battery(n: usize) -> Vec<String> {
    vec![
        "a".repeat(n),
        format!("{}!", "a".repeat(n)),
        format!("{}!", "0".repeat(n)),
        format!("{}x", " ".repeat(n)),
        format!("{}!", "ab".repeat(n / 2)),
        format!("{}\n", "a1_".repeat(n / 3)),
        format!("{}\"", "\\\"".repeat(n / 2)),
    ]
}

fn probe_label(probe: &str) -> String {
    let head: String = probe.chars().take(6).collect();
    format!("{}... ({} chars)", head, probe.chars().count())
}

// =============================================================================
// Structural screen
// =============================================================================

/// Coarse character categories used to decide whether two alternation
/// branches can start with the same character.
const CAT_DIGIT: u8 = 1;
const CAT_LOWER: u8 = 1 << 1;
const CAT_UPPER: u8 = 1 << 2;
const CAT_UNDERSCORE: u8 = 1 << 3;
const CAT_SPACE: u8 = 1 << 4;
const CAT_OTHER: u8 = 1 << 5;
const CAT_ALL: u8 = 0b11_1111;

/// The set of characters an expression can start with.
#[derive(Debug, Clone, PartialEq, Eq)]
enum First {
    Chars(Vec<char>),
    Cats(u8),
}

impl First {
    fn cats(&self) -> u8 {
        match self {
            First::Cats(c) => *c,
            First::Chars(chars) => chars.iter().fold(0, |acc, c| acc | category(*c)),
        }
    }

    fn overlaps(&self, other: &First) -> bool {
        match (self, other) {
            (First::Chars(a), First::Chars(b)) => a.iter().any(|c| b.contains(c)),
            _ => self.cats() & other.cats() != 0,
        }
    }

    fn union(self, other: First) -> First {
        match (self, other) {
            (First::Chars(mut a), First::Chars(b)) => {
                for c in b {
                    if !a.contains(&c) {
                        a.push(c);
                    }
                }
                First::Chars(a)
            }
            (a, b) => First::Cats(a.cats() | b.cats()),
        }
    }
}

fn category(c: char) -> u8 {
    if c.is_ascii_digit() {
        CAT_DIGIT
    } else if c.is_lowercase() {
        CAT_LOWER
    } else if c.is_uppercase() {
        CAT_UPPER
    } else if c == '_' {
        CAT_UNDERSCORE
    } else if c.is_whitespace() {
        CAT_SPACE
    } else {
        CAT_OTHER
    }
}

/// Returns a description of the first dangerous construct, if any.
fn screen(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Repeat { child, hi, .. } => {
            if *hi == usize::MAX {
                if contains_unbounded_repeat(child) {
                    return Some("nested unbounded quantifier".to_string());
                }
                if has_ambiguous_alternation(child) {
                    return Some(
                        "unbounded quantifier over alternation with overlapping branches"
                            .to_string(),
                    );
                }
            }
            screen(child)
        }
        Expr::Concat(children) | Expr::Alt(children) => children.iter().find_map(screen),
        Expr::Group(child) => screen(child),
        Expr::LookAround(child, _) => screen(child),
        // Atomic groups never backtrack into their body.
        Expr::AtomicGroup(_) => None,
        _ => None,
    }
}

fn contains_unbounded_repeat(expr: &Expr) -> bool {
    match expr {
        Expr::Repeat { child, hi, .. } => *hi == usize::MAX || contains_unbounded_repeat(child),
        Expr::Concat(children) | Expr::Alt(children) => {
            children.iter().any(contains_unbounded_repeat)
        }
        Expr::Group(child) => contains_unbounded_repeat(child),
        _ => false,
    }
}

fn has_ambiguous_alternation(expr: &Expr) -> bool {
    match expr {
        Expr::Alt(branches) => {
            let firsts: Vec<First> = branches.iter().map(first_set).collect();
            for (i, a) in firsts.iter().enumerate() {
                for b in &firsts[i + 1..] {
                    if a.overlaps(b) {
                        return true;
                    }
                }
            }
            branches.iter().any(has_ambiguous_alternation)
        }
        Expr::Concat(children) => children.iter().any(has_ambiguous_alternation),
        Expr::Group(child) => has_ambiguous_alternation(child),
        Expr::Repeat { child, .. } => has_ambiguous_alternation(child),
        _ => false,
    }
}

fn first_set(expr: &Expr) -> First {
    match expr {
        Expr::Literal { val, casei, .. } => match val.chars().next() {
            Some(c) if *casei => First::Chars(vec![
                c.to_lowercase().next().unwrap_or(c),
                c.to_uppercase().next().unwrap_or(c),
            ]),
            Some(c) => First::Chars(vec![c]),
            None => First::Chars(Vec::new()),
        },
        Expr::Concat(children) => {
            let mut acc = First::Chars(Vec::new());
            for child in children {
                acc = acc.union(first_set(child));
                if !can_be_empty(child) {
                    break;
                }
            }
            acc
        }
        Expr::Alt(branches) => branches
            .iter()
            .map(first_set)
            .fold(First::Chars(Vec::new()), First::union),
        Expr::Group(child) | Expr::AtomicGroup(child) => first_set(child),
        Expr::Repeat { child, .. } => first_set(child),
        Expr::Delegate { inner, .. } => class_first(inner),
        Expr::Empty | Expr::Assertion(_) | Expr::LookAround(..) => First::Chars(Vec::new()),
        _ => First::Cats(CAT_ALL),
    }
}

fn can_be_empty(expr: &Expr) -> bool {
    match expr {
        Expr::Empty | Expr::Assertion(_) | Expr::LookAround(..) => true,
        Expr::Repeat { child, lo, .. } => *lo == 0 || can_be_empty(child),
        Expr::Group(child) | Expr::AtomicGroup(child) => can_be_empty(child),
        Expr::Concat(children) => children.iter().all(can_be_empty),
        Expr::Alt(branches) => branches.iter().any(can_be_empty),
        Expr::Literal { val, .. } => val.is_empty(),
        _ => false,
    }
}

/// Approximate the first-character categories of a delegated class such as
/// `\d`, `\w`, `[a-z_]` or `[^,]`.
fn class_first(inner: &str) -> First {
    match inner {
        "\\d" => return First::Cats(CAT_DIGIT),
        "\\w" => return First::Cats(CAT_DIGIT | CAT_LOWER | CAT_UPPER | CAT_UNDERSCORE),
        "\\s" => return First::Cats(CAT_SPACE),
        _ => {}
    }
    let Some(body) = inner.strip_prefix('[').and_then(|s| s.strip_suffix(']')) else {
        return First::Cats(CAT_ALL);
    };
    if body.starts_with('^') {
        return First::Cats(CAT_ALL);
    }

    let mut cats = 0u8;
    let chars: Vec<char> = body.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            cats |= match chars[i + 1] {
                'd' => CAT_DIGIT,
                'w' => CAT_DIGIT | CAT_LOWER | CAT_UPPER | CAT_UNDERSCORE,
                's' => CAT_SPACE,
                other => category(other),
            };
            i += 2;
            continue;
        }
        if i + 2 < chars.len() && chars[i + 1] == '-' {
            cats |= category(c) | category(chars[i + 2]);
            i += 3;
            continue;
        }
        cats |= category(c);
        i += 1;
    }
    First::Cats(cats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_pattern_accepted() {
        let pattern = validate_pattern_safety("a+").unwrap();
        assert_eq!(pattern.as_str(), "a+");
        assert!(pattern.is_match("baaa"));
    }

    #[test]
    fn test_nested_quantifier_rejected() {
        let err = validate_pattern_safety("(a+)+$").unwrap_err();
        assert!(matches!(err, PatternError::Catastrophic { .. }));
    }

    #[test]
    fn test_ambiguous_alternation_rejected() {
        let err = validate_pattern_safety("^(a|aa)+$").unwrap_err();
        assert!(matches!(err, PatternError::Catastrophic { .. }));

        let err = validate_pattern_safety(r"(\w|\d)*x").unwrap_err();
        assert!(matches!(err, PatternError::Catastrophic { .. }));
    }

    #[test]
    fn test_disjoint_alternation_accepted() {
        assert!(validate_pattern_safety("(GET|POST)+").is_ok());
        assert!(validate_pattern_safety(r"(\d{1,3},)+\d{3}").is_ok());
        assert!(validate_pattern_safety(r"retention of (\d+) days").is_ok());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = validate_pattern_safety("(unclosed").unwrap_err();
        assert!(matches!(err, PatternError::Invalid { .. }));
    }

    #[test]
    fn test_lookaround_supported() {
        let pattern = validate_pattern_safety(r"(?<=limit: )\d+").unwrap();
        assert_eq!(pattern.values("limit: 42"), vec!["42".to_string()]);
    }

    #[test]
    fn test_values_prefers_first_group() {
        let pattern = validate_pattern_safety(r"MAX_USERS\s*=\s*(\d+)").unwrap();
        assert_eq!(
            pattern.values("MAX_USERS = 10\nMAX_USERS=20"),
            vec!["10".to_string(), "20".to_string()]
        );

        let whole = validate_pattern_safety(r"\d+").unwrap();
        assert_eq!(whole.values("a 1 b 22"), vec!["1".to_string(), "22".to_string()]);
    }

    #[test]
    fn test_error_message_names_pattern() {
        let err = validate_pattern_safety("(a+)+").unwrap_err();
        assert!(err.to_string().contains("(a+)+"));
    }

    #[test]
    fn test_class_first_categories() {
        assert_eq!(class_first("\\d"), First::Cats(CAT_DIGIT));
        assert_eq!(class_first("[a-z]"), First::Cats(CAT_LOWER));
        assert!(class_first("[^,]").overlaps(&First::Chars(vec![','])));
        assert!(!class_first("[0-9]").overlaps(&First::Chars(vec!['a'])));
    }
}
