//! Minimal unified diff parsing.
//!
//! Only what the payload and policy checks need: file sections, hunks and
//! the removed/added lines of each hunk with their line numbers. Context
//! lines are counted but not kept.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HUNK_HEADER: Regex =
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").unwrap();
}

/// One removed or added line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    /// Line number on the side the line belongs to (old for removed, new
    /// for added).
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub new_start: usize,
    pub removed: Vec<DiffLine>,
    pub added: Vec<DiffLine>,
}

/// The hunks of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffFile {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    pub hunks: Vec<Hunk>,
}

impl DiffFile {
    /// The post-image path, falling back to the pre-image for deletions.
    pub fn path(&self) -> Option<&str> {
        self.new_path.as_deref().or(self.old_path.as_deref())
    }
}

/// Strip the `a/` / `b/` prefix and any trailing timestamp; `/dev/null`
/// becomes `None`.
fn header_path(raw: &str) -> Option<String> {
    let raw = raw.split('\t').next().unwrap_or(raw).trim();
    if raw == "/dev/null" || raw.is_empty() {
        return None;
    }
    let path = raw
        .strip_prefix("a/")
        .or_else(|| raw.strip_prefix("b/"))
        .unwrap_or(raw);
    Some(path.to_string())
}

/// Parse unified diff text into file sections.
///
/// Hunk line counts are honored, so a removed line that itself starts with
/// `--` is not mistaken for a file header.
pub fn parse_unified_diff(text: &str) -> Vec<DiffFile> {
    let mut files: Vec<DiffFile> = Vec::new();
    let mut old_left = 0usize;
    let mut new_left = 0usize;
    let mut old_line = 0usize;
    let mut new_line = 0usize;

    for raw in text.lines() {
        let in_hunk = old_left > 0 || new_left > 0;

        if in_hunk {
            if let Some(body) = raw.strip_prefix('-') {
                push_line(&mut files, |h| &mut h.removed, old_line, body);
                old_line += 1;
                old_left = old_left.saturating_sub(1);
                continue;
            }
            if let Some(body) = raw.strip_prefix('+') {
                push_line(&mut files, |h| &mut h.added, new_line, body);
                new_line += 1;
                new_left = new_left.saturating_sub(1);
                continue;
            }
            if raw.starts_with(' ') || raw.is_empty() {
                old_line += 1;
                new_line += 1;
                old_left = old_left.saturating_sub(1);
                new_left = new_left.saturating_sub(1);
                continue;
            }
            if raw.starts_with('\\') {
                continue;
            }
            // Anything else ends the hunk early (truncated or hand-edited diff).
            old_left = 0;
            new_left = 0;
        }

        if raw.starts_with("diff --git ") {
            files.push(DiffFile::default());
        } else if let Some(rest) = raw.strip_prefix("--- ") {
            if files.last().map_or(true, |f| !f.hunks.is_empty() || f.old_path.is_some()) {
                files.push(DiffFile::default());
            }
            if let Some(file) = files.last_mut() {
                file.old_path = header_path(rest);
            }
        } else if let Some(rest) = raw.strip_prefix("+++ ") {
            if let Some(file) = files.last_mut() {
                file.new_path = header_path(rest);
            }
        } else if let Some(caps) = HUNK_HEADER.captures(raw) {
            let num = |i: usize, default: usize| {
                caps.get(i)
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(default)
            };
            old_line = num(1, 0);
            old_left = num(2, 1);
            new_line = num(3, 0);
            new_left = num(4, 1);
            if files.is_empty() {
                files.push(DiffFile::default());
            }
            if let Some(file) = files.last_mut() {
                file.hunks.push(Hunk {
                    old_start: old_line,
                    new_start: new_line,
                    ..Default::default()
                });
            }
        }
    }

    files
}

fn push_line(
    files: &mut [DiffFile],
    side: impl Fn(&mut Hunk) -> &mut Vec<DiffLine>,
    line: usize,
    body: &str,
) {
    if let Some(hunk) = files.last_mut().and_then(|f| f.hunks.last_mut()) {
        side(hunk).push(DiffLine {
            line,
            text: body.to_string(),
        });
    }
}

/// Whether `text` looks like unified diff output rather than plain source.
pub fn looks_like_diff(text: &str) -> bool {
    text.lines()
        .any(|l| l.starts_with("diff --git ") || HUNK_HEADER.is_match(l))
}

/// The added lines of a diff joined with newlines.
pub fn added_text(text: &str) -> String {
    parse_unified_diff(text)
        .iter()
        .flat_map(|f| f.hunks.iter())
        .flat_map(|h| h.added.iter())
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATCH: &str = "\
diff --git a/src/api.ts b/src/api.ts
index 1111111..2222222 100644
--- a/src/api.ts
+++ b/src/api.ts
@@ -10,3 +10,3 @@ export function handler() {
   return {
-    \"user_id\": id,
+    \"uid\": id,
   };
@@ -40 +40,2 @@
--- not a header
+++ not a header either
+const LIMIT = 7;
diff --git a/README.md b/README.md
--- a/README.md
+++ /dev/null
@@ -1 +0,0 @@
-gone
";

    #[test]
    fn test_parse_files_and_hunks() {
        let files = parse_unified_diff(PATCH);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path(), Some("src/api.ts"));
        assert_eq!(files[0].hunks.len(), 2);
        assert_eq!(files[1].new_path, None);
        assert_eq!(files[1].path(), Some("README.md"));

        let first = &files[0].hunks[0];
        assert_eq!(first.removed, vec![DiffLine { line: 11, text: "    \"user_id\": id,".to_string() }]);
        assert_eq!(first.added, vec![DiffLine { line: 11, text: "    \"uid\": id,".to_string() }]);
    }

    #[test]
    fn test_counts_keep_dash_lines_in_hunk() {
        let files = parse_unified_diff(PATCH);
        let second = &files[0].hunks[1];
        assert_eq!(second.removed.len(), 1);
        assert_eq!(second.removed[0].text, "-- not a header");
        assert_eq!(second.added.len(), 2);
        assert_eq!(second.added[1].line, 41);
    }

    #[test]
    fn test_bare_hunks_without_headers() {
        let files = parse_unified_diff("@@ -1 +1 @@\n-a\n+b\n");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path(), None);
        assert_eq!(files[0].hunks[0].added[0].text, "b");
    }

    #[test]
    fn test_looks_like_diff_and_added_text() {
        assert!(looks_like_diff(PATCH));
        assert!(!looks_like_diff("const LIMIT = 7;\n"));
        assert_eq!(added_text("@@ -1,2 +1,2 @@\n-a\n+b\n c\n"), "b");
    }
}
