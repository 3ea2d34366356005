//! Per-run cache of compiled glob sets.

use std::collections::HashMap;

use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled glob sets keyed by their pattern list.
///
/// One cache is owned by each run; nothing is shared between runs.
#[derive(Debug, Default)]
pub struct GlobCache {
    sets: HashMap<Vec<String>, GlobSet>,
}

impl GlobCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile (once) the glob set for `patterns`.
    pub fn set(&mut self, patterns: &[String]) -> Result<&GlobSet, globset::Error> {
        if !self.sets.contains_key(patterns) {
            let mut builder = GlobSetBuilder::new();
            for pattern in patterns {
                builder.add(Glob::new(pattern)?);
            }
            self.sets.insert(patterns.to_vec(), builder.build()?);
        }
        Ok(&self.sets[patterns])
    }

    /// Whether `path` matches any of `patterns`. Invalid patterns match
    /// nothing; config validation reports them before a run starts.
    pub fn matches_any(&mut self, patterns: &[String], path: &str) -> bool {
        if patterns.is_empty() {
            return false;
        }
        let path = normalize_separators(path);
        match self.set(patterns) {
            Ok(set) => set.is_match(path.as_str()),
            Err(e) => {
                tracing::warn!(error = %e, "invalid glob pattern; treating as no match");
                false
            }
        }
    }
}

/// Whether `pattern` uses glob syntax rather than naming a literal.
pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

/// Forward slashes and no leading `./`.
pub fn normalize_separators(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.strip_prefix("./").map(str::to_string).unwrap_or(path)
}
