//! Payload field rename detection.
//!
//! A hunk that removes exactly one field-like key and adds exactly one
//! different key is read as a rename. The rename only matters when the
//! documentation still uses the old key and has not picked up the new one.

use std::collections::{BTreeSet, HashSet};

use globset::GlobSet;
use lazy_static::lazy_static;
use phf::phf_set;
use regex::Regex;

use crate::diff::{parse_unified_diff, DiffLine};
use crate::drift::types::{Finding, FindingSource, FindingType, Severity, SeverityConfig};
use crate::extract::DocIndex;
use crate::matcher::globs::{is_glob, GlobCache};

lazy_static! {
    static ref STRING_LITERAL: Regex =
        Regex::new(r#""(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'|`[^`\n]*`"#).unwrap();
    static ref QUOTED_KEY: Regex =
        Regex::new(r#"["']([A-Za-z_$][\w$\-]*)["']\s*:(:?)"#).unwrap();
    static ref BARE_KEY: Regex = Regex::new(r"(?:^|[^\w$:])([A-Za-z_$][\w$]*)\s*:(:?)").unwrap();
    static ref GO_TAG: Regex =
        Regex::new(r#"\b(?:json|yaml|xml|bson|msgpack|form):"([A-Za-z_$][\w$\-]*)"#).unwrap();
    static ref ANNOTATION_KEY: Regex = Regex::new(
        r#"(?:@JsonProperty|@SerializedName|@Json|@JsonAlias)\(\s*(?:value\s*=\s*|name\s*=\s*)?"([^"]+)""#
    ).unwrap();
    static ref SERDE_RENAME: Regex =
        Regex::new(r#"#\[serde\([^\]]*\brename\s*=\s*"([^"]+)""#).unwrap();
    static ref ALIAS_KEY: Regex =
        Regex::new(r#"\b(?:Field|field|Schema)\([^)]*\balias\s*=\s*["']([^"']+)["']"#).unwrap();
}

/// Bare `word:` matches that are syntax, not keys.
static NOT_A_KEY: phf::Set<&'static str> = phf_set! {
    "else", "default", "case", "try", "finally", "except", "http", "https",
    "do", "then", "public", "private", "protected", "return", "lambda",
};

/// Blank the contents of string literals, except literals directly followed
/// by `:` which are kept as keys.
fn blank_strings(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut last = 0;
    for m in STRING_LITERAL.find_iter(line) {
        out.push_str(&line[last..m.start()]);
        let after = line[m.end()..].trim_start();
        if after.starts_with(':') && !after.starts_with("::") {
            out.push_str(m.as_str());
        } else {
            let quote = &m.as_str()[..1];
            out.push_str(quote);
            out.push_str(quote);
        }
        last = m.end();
    }
    out.push_str(&line[last..]);
    out
}

/// Field-like tokens on one source line.
pub fn field_tokens(line: &str) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();

    for re in [&*GO_TAG, &*ANNOTATION_KEY, &*SERDE_RENAME, &*ALIAS_KEY] {
        for caps in re.captures_iter(line) {
            if let Some(key) = caps.get(1) {
                let key = key.as_str().split(',').next().unwrap_or("").trim();
                if !key.is_empty() && key != "-" {
                    tokens.insert(key.to_string());
                }
            }
        }
    }

    let blanked = blank_strings(line);
    for caps in QUOTED_KEY.captures_iter(&blanked) {
        if caps.get(2).map_or(false, |m| !m.as_str().is_empty()) {
            continue;
        }
        if let Some(key) = caps.get(1) {
            tokens.insert(key.as_str().to_string());
        }
    }

    // Keys inside kept literals are already collected; drop them before
    // looking for bare identifiers.
    let bare_source = STRING_LITERAL.replace_all(&blanked, "\"\"");
    for caps in BARE_KEY.captures_iter(&bare_source) {
        if caps.get(2).map_or(false, |m| !m.as_str().is_empty()) {
            continue;
        }
        if let Some(key) = caps.get(1) {
            if !NOT_A_KEY.contains(key.as_str()) {
                tokens.insert(key.as_str().to_string());
            }
        }
    }

    tokens
}

/// Keys a rename may involve: literal names plus glob patterns.
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    exact: HashSet<String>,
    globs: Option<GlobSet>,
}

impl Allowlist {
    /// Build from configured entries; entries with glob syntax are compiled
    /// through the run's glob cache.
    pub fn new(entries: &[String], cache: &mut GlobCache) -> Result<Self, globset::Error> {
        let (patterns, exact): (Vec<String>, Vec<String>) =
            entries.iter().cloned().partition(|e| is_glob(e));
        let globs = if patterns.is_empty() {
            None
        } else {
            Some(cache.set(&patterns)?.clone())
        };
        Ok(Self {
            exact: exact.into_iter().collect(),
            globs,
        })
    }

    /// Field-like tokens of the documentation snapshot.
    pub fn from_docs(docs: &DocIndex) -> Self {
        Self {
            exact: docs.field_tokens().map(str::to_string).collect(),
            globs: None,
        }
    }

    /// The configured list, or the documentation's field tokens when the
    /// configured list is empty.
    pub fn resolve(
        configured: &[String],
        docs: &DocIndex,
        cache: &mut GlobCache,
    ) -> Result<Self, globset::Error> {
        if configured.is_empty() {
            Ok(Self::from_docs(docs))
        } else {
            Self::new(configured, cache)
        }
    }

    pub fn allows(&self, key: &str) -> bool {
        self.exact.contains(key) || self.globs.as_ref().map_or(false, |g| g.is_match(key))
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.globs.is_none()
    }
}

/// An inferred 1:1 key rename within one hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameCandidate {
    pub old_key: String,
    pub new_key: String,
    pub file: Option<String>,
    /// Post-image line of the first added line carrying the new key.
    pub line: usize,
}

fn collect(lines: &[DiffLine], header: &str) -> BTreeSet<String> {
    lines
        .iter()
        .filter(|l| !l.text.starts_with(header))
        .flat_map(|l| field_tokens(&l.text))
        .collect()
}

/// Rename candidates in a unified diff.
pub fn rename_candidates(diff: &str, allowlist: &Allowlist) -> Vec<RenameCandidate> {
    let mut candidates = Vec::new();
    for file in parse_unified_diff(diff) {
        for hunk in &file.hunks {
            // `---`/`+++` lines are header-shaped even inside a hunk.
            let removed = collect(&hunk.removed, "--");
            let added = collect(&hunk.added, "++");
            let (Some(old_key), Some(new_key)) = (single(&removed), single(&added)) else {
                continue;
            };
            if old_key == new_key || !(allowlist.allows(old_key) || allowlist.allows(new_key)) {
                continue;
            }
            let line = hunk
                .added
                .iter()
                .find(|l| field_tokens(&l.text).contains(new_key))
                .map_or(hunk.new_start, |l| l.line);
            candidates.push(RenameCandidate {
                old_key: old_key.to_string(),
                new_key: new_key.to_string(),
                file: file.path().map(str::to_string),
                line,
            });
        }
    }
    candidates
}

fn single(set: &BTreeSet<String>) -> Option<&str> {
    if set.len() == 1 {
        set.iter().next().map(String::as_str)
    } else {
        None
    }
}

/// Renames the documentation has not caught up with, at the given severity.
pub fn detect_renames_at(
    diff: &str,
    allowlist: &Allowlist,
    docs: &DocIndex,
    severity: Severity,
) -> Vec<Finding> {
    rename_candidates(diff, allowlist)
        .into_iter()
        .filter(|c| docs.mentions(&c.old_key) && !docs.mentions(&c.new_key))
        .map(|c| {
            Finding::new(
                FindingSource::Payload,
                FindingType::PayloadKeyRename,
                severity,
                c.file.as_deref().unwrap_or("<diff>"),
                format!(
                    "Payload key `{}` was renamed to `{}` but the docs still use `{}`",
                    c.old_key, c.new_key, c.old_key
                ),
                format!("Replace `{}` with `{}` in the documentation", c.old_key, c.new_key),
            )
            .at_line(c.line)
        })
        .collect()
}

/// Renames the documentation has not caught up with.
pub fn detect_renames(diff: &str, allowlist: &Allowlist, docs: &DocIndex) -> Vec<Finding> {
    detect_renames_at(diff, allowlist, docs, SeverityConfig::default().rename)
}
