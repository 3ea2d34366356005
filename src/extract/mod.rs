//! Pattern-based fact extraction.
//!
//! Each supported language registers a list of [`ExtractionRule`]s in the
//! [`LanguageRegistry`]. A rule is a plain function that scans the file text
//! through a [`ScanContext`] and pushes [`Fact`]s. Rules are independent:
//! they never rely on each other's output or ordering.
//!
//! Extraction is best-effort:
//! - binary, non-UTF-8 or oversized input yields no facts ([`SkipReason`]);
//! - a rule that panics is logged and contributes nothing for that file;
//! - every pattern is capped at `max_matches_per_pattern` matches;
//! - all rules for one file share a wall-clock budget, and once it is spent
//!   the remaining rules are skipped with a warning.

pub mod docs;
pub mod graphql;
pub mod languages;
mod registry;
pub mod text;

pub use docs::{extract_doc_facts, DocIndex};
pub use registry::{Language, LanguageRegistry};

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::facts::{Fact, FactKind, KindSet};
use text::LineIndex;

/// Resource limits applied to every file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractLimits {
    pub max_file_bytes: usize,
    pub max_matches_per_pattern: usize,
    pub file_budget: Duration,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: 1024 * 1024,
            max_matches_per_pattern: 5000,
            file_budget: Duration::from_secs(2),
        }
    }
}

/// Why a file produced no facts without being an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Binary,
    NotUtf8,
    Oversized { bytes: usize, limit: usize },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Binary => write!(f, "binary file (contains NUL bytes)"),
            SkipReason::NotUtf8 => write!(f, "not valid UTF-8 text"),
            SkipReason::Oversized { bytes, limit } => {
                write!(f, "file is {} bytes, limit is {}", bytes, limit)
            }
        }
    }
}

/// Decode raw file content, rejecting binary and oversized input.
pub fn decode_text<'a>(bytes: &'a [u8], limits: &ExtractLimits) -> Result<&'a str, SkipReason> {
    if bytes.len() > limits.max_file_bytes {
        return Err(SkipReason::Oversized {
            bytes: bytes.len(),
            limit: limits.max_file_bytes,
        });
    }
    if bytes.contains(&0) {
        return Err(SkipReason::Binary);
    }
    std::str::from_utf8(bytes).map_err(|_| SkipReason::NotUtf8)
}

/// Signature of an extraction rule.
pub type RuleFn = fn(&ScanContext<'_>, &mut Vec<Fact>);

/// One independent extraction pass.
#[derive(Clone, Copy)]
pub struct ExtractionRule {
    pub name: &'static str,
    /// Kinds this rule can emit; rules are skipped when none are requested.
    pub kinds: &'static [FactKind],
    pub run: RuleFn,
}

impl std::fmt::Debug for ExtractionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionRule")
            .field("name", &self.name)
            .field("kinds", &self.kinds)
            .finish()
    }
}

/// The text of one file plus the limits rules must respect.
pub struct ScanContext<'a> {
    pub text: &'a str,
    pub file: &'a str,
    lines: LineIndex,
    max_matches: usize,
    deadline: Instant,
}

impl<'a> ScanContext<'a> {
    pub fn new(text: &'a str, file: &'a str, limits: &ExtractLimits) -> Self {
        Self {
            text,
            file,
            lines: LineIndex::new(text),
            max_matches: limits.max_matches_per_pattern,
            deadline: Instant::now() + limits.file_budget,
        }
    }

    /// Capped, budget-aware iteration over the matches of `re`.
    pub fn captures<'s>(&'s self, re: &'s Regex) -> impl Iterator<Item = Captures<'a>> + 's {
        re.captures_iter(self.text)
            .take(self.max_matches)
            .take_while(move |_| !self.expired())
    }

    /// Same as [`ScanContext::captures`] over a slice of the file.
    pub fn captures_in<'s>(
        &'s self,
        re: &'s Regex,
        slice: &'a str,
    ) -> impl Iterator<Item = Captures<'a>> + 's {
        re.captures_iter(slice)
            .take(self.max_matches)
            .take_while(move |_| !self.expired())
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn line_of(&self, offset: usize) -> usize {
        self.lines.line_of(offset)
    }

    /// Lowercased file extension.
    pub fn extension(&self) -> String {
        Path::new(self.file)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase()
    }

    /// Build a code fact located at byte `offset`.
    pub fn fact(
        &self,
        kind: FactKind,
        name: impl Into<String>,
        signature: Option<String>,
        offset: usize,
    ) -> Fact {
        Fact::code(kind, name, signature, self.file, self.line_of(offset))
    }

    /// Build an endpoint fact from a method and path.
    pub fn endpoint(&self, method: &str, path: &str, offset: usize) -> Fact {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        self.fact(
            FactKind::Endpoint,
            format!("{} {}", method.to_uppercase(), path),
            None,
            offset,
        )
    }
}

/// Run one rule inside a panic boundary.
fn run_rule(rule: &ExtractionRule, ctx: &ScanContext<'_>) -> Vec<Fact> {
    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut out = Vec::new();
        (rule.run)(ctx, &mut out);
        out
    }));
    match result {
        Ok(facts) => facts,
        Err(_) => {
            tracing::warn!(rule = rule.name, file = ctx.file, "extraction rule failed; skipping");
            Vec::new()
        }
    }
}

/// Lazy, single-pass sequence of facts for one file.
///
/// Rules run one at a time as the stream is consumed. Facts are filtered to
/// the requested kinds and deduplicated by `(kind, name)`.
pub struct FactStream<'a> {
    ctx: Option<ScanContext<'a>>,
    rules: std::slice::Iter<'a, ExtractionRule>,
    kinds: KindSet,
    pending: std::vec::IntoIter<Fact>,
    seen: HashSet<(FactKind, String)>,
}

impl<'a> FactStream<'a> {
    fn empty() -> Self {
        Self {
            ctx: None,
            rules: [].iter(),
            kinds: KindSet::empty(),
            pending: Vec::new().into_iter(),
            seen: HashSet::new(),
        }
    }
}

impl Iterator for FactStream<'_> {
    type Item = Fact;

    fn next(&mut self) -> Option<Fact> {
        loop {
            for fact in self.pending.by_ref() {
                if self.kinds.contains(fact.kind) && self.seen.insert((fact.kind, fact.name.clone()))
                {
                    return Some(fact);
                }
            }

            let ctx = self.ctx.as_ref()?;
            let Some(rule) = self.rules.next() else {
                self.ctx = None;
                return None;
            };
            if !self.kinds.intersects(rule.kinds) {
                continue;
            }
            if ctx.expired() {
                tracing::warn!(
                    file = ctx.file,
                    rule = rule.name,
                    "extraction budget exhausted; skipping remaining rules"
                );
                self.ctx = None;
                return None;
            }
            self.pending = run_rule(rule, ctx).into_iter();
        }
    }
}

/// Language-dispatching extractor.
pub struct Extractor {
    registry: LanguageRegistry,
    limits: ExtractLimits,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(ExtractLimits::default())
    }
}

impl Extractor {
    pub fn new(limits: ExtractLimits) -> Self {
        Self::with_registry(LanguageRegistry::builtin(), limits)
    }

    pub fn with_registry(registry: LanguageRegistry, limits: ExtractLimits) -> Self {
        Self { registry, limits }
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn limits(&self) -> &ExtractLimits {
        &self.limits
    }

    /// Whether any language handles `path`.
    pub fn supports(&self, path: &str) -> bool {
        self.registry.for_path(path).is_some()
    }

    /// Lazily extract facts of the requested kinds from `text`.
    pub fn stream<'a>(&'a self, text: &'a str, path: &'a str, kinds: KindSet) -> FactStream<'a> {
        if let Err(reason) = decode_text(text.as_bytes(), &self.limits) {
            tracing::debug!(file = path, %reason, "skipping file");
            return FactStream::empty();
        }
        let Some(language) = self.registry.for_path(path) else {
            return FactStream::empty();
        };
        FactStream {
            ctx: Some(ScanContext::new(text, path, &self.limits)),
            rules: language.rules.iter(),
            kinds,
            pending: Vec::new().into_iter(),
            seen: HashSet::new(),
        }
    }

    /// Extract all facts of the requested kinds from `text`.
    pub fn extract(&self, text: &str, path: &str, kinds: KindSet) -> Vec<Fact> {
        self.stream(text, path, kinds).collect()
    }

    /// Extract from raw file bytes, reporting why a file was skipped.
    pub fn extract_bytes(
        &self,
        bytes: &[u8],
        path: &str,
        kinds: KindSet,
    ) -> Result<Vec<Fact>, SkipReason> {
        let text = decode_text(bytes, &self.limits)?;
        Ok(self.extract(text, path, kinds))
    }
}

/// Extractor with the built-in languages and default limits, built once.
static DEFAULT_EXTRACTOR: Lazy<Extractor> = Lazy::new(Extractor::default);

/// Extract facts from one file with the built-in languages and default limits.
pub fn extract_facts(text: &str, path: &str, kinds: KindSet) -> Vec<Fact> {
    DEFAULT_EXTRACTOR.extract(text, path, kinds)
}

/// Capture group `i` as a string slice.
pub(crate) fn group<'h>(caps: &Captures<'h>, i: usize) -> Option<&'h str> {
    caps.get(i).map(|m| m.as_str())
}

/// The first participating capture group among `indices`.
pub(crate) fn first_group<'h>(caps: &Captures<'h>, indices: &[usize]) -> Option<&'h str> {
    indices.iter().find_map(|i| group(caps, *i))
}

/// Start offset of the whole match, past any leading whitespace the
/// pattern consumed (`^\s*` or a `[^\w]` boundary that took a newline).
pub(crate) fn start(caps: &Captures<'_>) -> usize {
    caps.get(0)
        .map(|m| {
            let s = m.as_str();
            m.start() + (s.len() - s.trim_start().len())
        })
        .unwrap_or(0)
}

/// End offset of the whole match.
pub(crate) fn end(caps: &Captures<'_>) -> usize {
    caps.get(0).map(|m| m.end()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only(kind: FactKind) -> KindSet {
        [kind].into_iter().collect()
    }

    #[test]
    fn test_decode_text_guards() {
        let limits = ExtractLimits {
            max_file_bytes: 8,
            ..Default::default()
        };
        assert_eq!(decode_text(b"ok", &limits), Ok("ok"));
        assert_eq!(decode_text(b"a\0b", &limits), Err(SkipReason::Binary));
        assert_eq!(decode_text(&[0xff, 0xfe], &limits), Err(SkipReason::NotUtf8));
        assert!(matches!(
            decode_text(b"0123456789", &limits),
            Err(SkipReason::Oversized { bytes: 10, limit: 8 })
        ));
    }

    #[test]
    fn test_unknown_extension_yields_nothing() {
        let facts = extract_facts("function a() {}", "notes.txt", KindSet::all());
        assert!(facts.is_empty());
    }

    #[test]
    fn test_null_byte_text_yields_nothing() {
        let facts = extract_facts("function a() {}\0", "a.js", KindSet::all());
        assert!(facts.is_empty());
    }

    #[test]
    fn test_kind_filter() {
        let src = "function createUser(email) {}\napp.get('/users', list);\n";
        let facts = extract_facts(src, "server.js", only(FactKind::Endpoint));
        assert!(facts.iter().all(|f| f.kind == FactKind::Endpoint));
        assert_eq!(facts.len(), 1);
    }

    #[test]
    fn test_dedup_by_kind_and_name() {
        let src = "function a(x) {}\nfunction a(x, y) {}\n";
        let facts = extract_facts(src, "dup.js", only(FactKind::Function));
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].line, 1);
    }

    fn panicking_rule(_ctx: &ScanContext<'_>, _out: &mut Vec<Fact>) {
        panic!("boom");
    }

    fn constant_rule(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
        out.push(ctx.fact(FactKind::Function, "survivor", None, 0));
    }

    static TEST_RULES: &[ExtractionRule] = &[
        ExtractionRule {
            name: "panics",
            kinds: &[FactKind::Function],
            run: panicking_rule,
        },
        ExtractionRule {
            name: "constant",
            kinds: &[FactKind::Function],
            run: constant_rule,
        },
    ];

    #[test]
    fn test_panicking_rule_is_isolated() {
        let mut registry = LanguageRegistry::new();
        registry.register(Language {
            tag: "test",
            extensions: &["tst"],
            rules: TEST_RULES,
        });
        let extractor = Extractor::with_registry(registry, ExtractLimits::default());
        let facts = extractor.extract("anything", "a.tst", KindSet::all());
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].name, "survivor");
    }

    #[test]
    fn test_exhausted_budget_stops_extraction() {
        let limits = ExtractLimits {
            file_budget: Duration::from_secs(0),
            ..Default::default()
        };
        let extractor = Extractor::new(limits);
        let facts = extractor.extract("function a() {}", "a.js", KindSet::all());
        assert!(facts.is_empty());
    }

    #[test]
    fn test_stream_is_lazy_and_finite() {
        let extractor = Extractor::default();
        let src = "function a() {}\nfunction b() {}\n";
        let mut stream = extractor.stream(src, "a.js", only(FactKind::Function));
        assert_eq!(stream.next().map(|f| f.name), Some("a".to_string()));
        assert_eq!(stream.next().map(|f| f.name), Some("b".to_string()));
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_extract_bytes_reports_skip() {
        let extractor = Extractor::default();
        let err = extractor
            .extract_bytes(b"\0\0", "a.js", KindSet::all())
            .unwrap_err();
        assert_eq!(err, SkipReason::Binary);
        assert_eq!(err.to_string(), "binary file (contains NUL bytes)");
    }
}
