//! Drift synthesis: runs every rule against a workspace and merges the
//! findings into one ordered report.

use std::collections::BTreeSet;

use anyhow::Context;
use rayon::prelude::*;

use crate::compare;
use crate::config::{FullScan, Rule, Settings};
use crate::extract::{decode_text, DocIndex, ExtractLimits, Extractor};
use crate::facts::Fact;
use crate::matcher::{compare_facts, GlobCache};
use crate::rename::{detect_renames_at, Allowlist};

use super::advisory::{advisory_findings, CompletionSource, Excerpt};
use super::types::{DriftReport, Finding, RuleSummary, ScanMode, SkippedFile};
use super::workspace::Workspace;

/// What changed in this run.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// `None` treats every file as changed.
    files: Option<BTreeSet<String>>,
    diff: Option<String>,
}

impl ChangeSet {
    /// Every file counts as changed.
    pub fn all() -> Self {
        Self::default()
    }

    /// Only the listed files count as changed.
    pub fn files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: Some(files.into_iter().map(Into::into).collect()),
            diff: None,
        }
    }

    /// Attach unified diff text for the rename and policy checks.
    pub fn with_diff(mut self, diff: impl Into<String>) -> Self {
        self.diff = Some(diff.into());
        self
    }

    pub fn is_changed(&self, path: &str) -> bool {
        self.files.as_ref().map_or(true, |f| f.contains(path))
    }

    pub fn diff(&self) -> Option<&str> {
        self.diff.as_deref()
    }
}

/// Files read for one purpose, with the ones that could not be used.
#[derive(Debug, Default)]
struct Loaded {
    texts: Vec<(String, String)>,
    skipped: Vec<SkippedFile>,
}

impl Loaded {
    fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.texts.iter().map(|(p, t)| (p.as_str(), t.as_str()))
    }

    fn excerpts(&self) -> Vec<Excerpt> {
        self.pairs().map(|(p, t)| Excerpt::new(p, t)).collect()
    }

    fn joined(&self) -> String {
        self.texts
            .iter()
            .map(|(_, t)| t.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Read files in parallel, keeping workspace order.
fn load(workspace: &dyn Workspace, paths: &[String], limits: &ExtractLimits) -> Loaded {
    let results: Vec<Result<(String, String), SkippedFile>> = paths
        .par_iter()
        .map(|path| {
            let bytes = workspace.read_bytes(path).map_err(|e| SkippedFile {
                file: path.clone(),
                reason: format!("unreadable: {:#}", e),
            })?;
            match decode_text(&bytes, limits) {
                Ok(text) => Ok((path.clone(), text.to_string())),
                Err(reason) => Err(SkippedFile {
                    file: path.clone(),
                    reason: reason.to_string(),
                }),
            }
        })
        .collect();

    let mut loaded = Loaded::default();
    for result in results {
        match result {
            Ok(pair) => loaded.texts.push(pair),
            Err(skipped) => {
                tracing::warn!(file = %skipped.file, reason = %skipped.reason, "skipping file");
                loaded.skipped.push(skipped);
            }
        }
    }
    loaded.texts.sort_by(|a, b| a.0.cmp(&b.0));
    loaded
}

fn matching(files: &[String], globs: &mut GlobCache, patterns: &[String]) -> Vec<String> {
    if patterns.is_empty() {
        return Vec::new();
    }
    files
        .iter()
        .filter(|f| globs.matches_any(patterns, f))
        .cloned()
        .collect()
}

fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

/// Runs rules, rename detection and policy comparisons.
pub struct Synthesizer<'a> {
    settings: &'a Settings,
    extractor: Extractor,
    completion: Option<&'a dyn CompletionSource>,
}

impl<'a> Synthesizer<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            extractor: Extractor::new(settings.limits),
            completion: None,
        }
    }

    /// Enable the advisory pass for rules that ask for it.
    pub fn with_completion(mut self, source: &'a dyn CompletionSource) -> Self {
        self.completion = Some(source);
        self
    }

    /// Scan mode for a rule matching `code_files` files.
    pub fn scan_mode(&self, rule: &Rule, code_files: usize) -> ScanMode {
        match rule.full_scan {
            FullScan::Always => ScanMode::Full,
            FullScan::Never => ScanMode::Incremental,
            FullScan::Auto if code_files <= self.settings.full_scan_max_files => ScanMode::Full,
            FullScan::Auto => {
                tracing::debug!(
                    rule = %rule.name,
                    code_files,
                    ceiling = self.settings.full_scan_max_files,
                    "too many files for a full scan; comparing changed files only"
                );
                ScanMode::Incremental
            }
        }
    }

    /// Run everything against `workspace`.
    pub fn run(&self, workspace: &dyn Workspace, changes: &ChangeSet) -> anyhow::Result<DriftReport> {
        let files = workspace.list_files().context("listing workspace files")?;
        let mut globs = GlobCache::new();
        let mut report = DriftReport::new();
        let mut scanned: BTreeSet<String> = BTreeSet::new();

        for rule in &self.settings.rules {
            let (findings, summary, loaded) =
                self.run_rule(rule, workspace, &files, changes, &mut globs);
            scanned.extend(loaded.texts.into_iter().map(|(p, _)| p));
            for skipped in loaded.skipped {
                report.add_skipped(skipped);
            }
            report.findings.extend(findings);
            report.rules.push(summary);
        }

        if let Some(diff) = changes.diff() {
            let docs = self.all_docs(workspace, &files, &mut globs, &mut report);
            let allowlist = Allowlist::resolve(&self.settings.allowlist, &docs, &mut globs)
                .context("compiling payload allowlist")?;
            let mut renames =
                detect_renames_at(diff, &allowlist, &docs, self.settings.severity.rename);
            sort_findings(&mut renames);
            report.findings.extend(renames);
        }

        if !self.settings.comparisons.is_empty() {
            let mut policy = self.compare_policy(workspace, &files, changes, &mut globs, &mut report);
            sort_findings(&mut policy);
            report.findings.extend(policy);
        }

        report.files_scanned = scanned.len();
        Ok(report)
    }

    fn run_rule(
        &self,
        rule: &Rule,
        workspace: &dyn Workspace,
        files: &[String],
        changes: &ChangeSet,
        globs: &mut GlobCache,
    ) -> (Vec<Finding>, RuleSummary, Loaded) {
        let code_files: Vec<String> = matching(files, globs, &rule.code)
            .into_iter()
            .filter(|f| self.extractor.supports(f))
            .collect();
        let doc_files = matching(files, globs, &rule.docs);
        let mode = self.scan_mode(rule, code_files.len());
        let targets: Vec<String> = match mode {
            ScanMode::Full => code_files,
            ScanMode::Incremental => code_files.into_iter().filter(|f| changes.is_changed(f)).collect(),
        };

        let mut summary = RuleSummary {
            name: rule.name.clone(),
            mode,
            code_files: targets.len(),
            doc_files: doc_files.len(),
            findings: 0,
        };
        if targets.is_empty() {
            tracing::debug!(rule = %rule.name, "no code files to compare");
            return (Vec::new(), summary, Loaded::default());
        }

        let limits = self.extractor.limits();
        let mut code = load(workspace, &targets, limits);
        let docs = load(workspace, &doc_files, limits);

        let facts: Vec<Fact> = code
            .texts
            .par_iter()
            .flat_map_iter(|(path, text)| self.extractor.extract(text, path, rule.kinds))
            .collect();
        let index = DocIndex::from_texts(docs.pairs());
        let doc_facts = index.facts_of(rule.kinds);
        tracing::debug!(
            rule = %rule.name,
            code_facts = facts.len(),
            doc_facts = doc_facts.len(),
            ?mode,
            "comparing"
        );

        let full_scan = mode == ScanMode::Full;
        let mut findings: Vec<Finding> = rule
            .kinds
            .iter()
            .flat_map(|kind| compare_facts(kind, &facts, &doc_facts, &self.settings.severity, full_scan))
            .collect();

        if rule.advisory {
            if let Some(source) = self.completion {
                findings.extend(advisory_findings(
                    source,
                    &rule.name,
                    &code.excerpts(),
                    &docs.excerpts(),
                    self.settings.severity.default,
                ));
            }
        }

        sort_findings(&mut findings);
        summary.findings = findings.len();
        code.skipped.extend(docs.skipped);
        (findings, summary, code)
    }

    /// Doc index over every rule's doc files.
    fn all_docs(
        &self,
        workspace: &dyn Workspace,
        files: &[String],
        globs: &mut GlobCache,
        report: &mut DriftReport,
    ) -> DocIndex {
        let paths: BTreeSet<String> = self
            .settings
            .rules
            .iter()
            .flat_map(|rule| matching(files, globs, &rule.docs))
            .collect();
        let paths: Vec<String> = paths.into_iter().collect();
        let loaded = load(workspace, &paths, self.extractor.limits());
        for skipped in loaded.skipped.iter().cloned() {
            report.add_skipped(skipped);
        }
        DocIndex::from_texts(loaded.pairs())
    }

    fn compare_policy(
        &self,
        workspace: &dyn Workspace,
        files: &[String],
        changes: &ChangeSet,
        globs: &mut GlobCache,
        report: &mut DriftReport,
    ) -> Vec<Finding> {
        let mut patterns = self.settings.policy.clone();
        for rule in &self.settings.rules {
            patterns.extend(rule.policy.iter().cloned());
        }
        let policy_paths = matching(files, globs, &patterns);
        let policy = load(workspace, &policy_paths, self.extractor.limits());
        for skipped in policy.skipped.iter().cloned() {
            report.add_skipped(skipped);
        }
        if policy.texts.is_empty() {
            tracing::warn!("no policy documents matched; every comparison with code values will report a missing policy value");
        }
        let policy_text = policy.joined();
        let policy_label = match policy.texts.as_slice() {
            [(only, _)] => Some(only.as_str()),
            _ => None,
        };

        let comparisons = &self.settings.comparisons;
        if let Some(diff) = changes.diff() {
            return comparisons
                .iter()
                .filter_map(|c| compare::evaluate(c, diff, None, &policy_text, policy_label))
                .collect();
        }

        let policy_set: BTreeSet<&str> = policy_paths.iter().map(String::as_str).collect();
        let code_paths: BTreeSet<String> = self
            .settings
            .rules
            .iter()
            .flat_map(|rule| matching(files, globs, &rule.code))
            .filter(|f| changes.is_changed(f) && !policy_set.contains(f.as_str()))
            .collect();
        let code_paths: Vec<String> = code_paths.into_iter().collect();
        let code = load(workspace, &code_paths, self.extractor.limits());
        for skipped in code.skipped.iter().cloned() {
            report.add_skipped(skipped);
        }

        let mut findings = Vec::new();
        for comparison in comparisons {
            for (path, text) in code.pairs() {
                findings.extend(compare::evaluate(
                    comparison,
                    text,
                    Some(path),
                    &policy_text,
                    policy_label,
                ));
            }
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::drift::types::{FindingSource, FindingType, Severity};
    use crate::drift::workspace::MemoryWorkspace;

    fn settings(yaml: &str) -> Settings {
        Config::parse_str(yaml).unwrap().compile().unwrap()
    }

    const RULES: &str = r#"
rules:
  - name: api
    code: ["src/**/*.ts"]
    docs: ["docs/**/*.md"]
    kinds: [function, endpoint]
"#;

    fn workspace() -> MemoryWorkspace {
        MemoryWorkspace::new()
            .with_file(
                "src/users.ts",
                "export function createUser(email, password) {}\n\
                 export function deleteUser(id) {}\n\
                 app.get('/users/:id', getUser);\n",
            )
            .with_file(
                "docs/api.md",
                "# Users\n\nCall `createUser(username, password)` to sign up.\n\n\
                 Use `deleteUser(id)`.\n\n`GET /users/{id}` returns a user.\n",
            )
    }

    #[test]
    fn test_rule_findings() {
        let settings = settings(RULES);
        let report = Synthesizer::new(&settings).run(&workspace(), &ChangeSet::all()).unwrap();

        assert_eq!(report.files_scanned, 1);
        assert_eq!(report.rules[0].mode, ScanMode::Full);
        let kinds: Vec<FindingType> = report.findings.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![FindingType::FunctionSignatureMismatch]);
        assert!(report.findings[0].explanation.contains("createUser"));
        assert_eq!(report.findings[0].file, "src/users.ts");
    }

    #[test]
    fn test_readme_mention_does_not_hide_signature_drift() {
        let settings = settings(RULES);
        let ws = workspace().with_file("docs/README.md", "See `createUser` for sign up.\n");
        let report = Synthesizer::new(&settings).run(&ws, &ChangeSet::all()).unwrap();
        let kinds: Vec<FindingType> = report.findings.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![FindingType::FunctionSignatureMismatch]);
        assert!(report.findings[0].explanation.contains("docs/api.md:3"));
    }

    #[test]
    fn test_incremental_skips_unchanged() {
        let settings = settings(&RULES.replace("kinds: [function, endpoint]", "kinds: [function]\n    full_scan: never"));
        let report = Synthesizer::new(&settings)
            .run(&workspace(), &ChangeSet::files(["docs/api.md"]))
            .unwrap();
        assert_eq!(report.rules[0].mode, ScanMode::Incremental);
        assert_eq!(report.rules[0].code_files, 0);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_auto_falls_back_to_incremental() {
        let settings = settings(&format!("{}full_scan_max_files: 0\n", RULES));
        let synth = Synthesizer::new(&settings);
        assert_eq!(synth.scan_mode(&settings.rules[0], 1), ScanMode::Incremental);
        assert_eq!(synth.scan_mode(&settings.rules[0], 0), ScanMode::Full);
    }

    #[test]
    fn test_binary_files_are_skipped() {
        let settings = settings(RULES);
        let ws = workspace().with_file("src/blob.ts", vec![0u8, 1, 2]);
        let report = Synthesizer::new(&settings).run(&ws, &ChangeSet::all()).unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].file, "src/blob.ts");
        assert_eq!(report.files_scanned, 1);
    }

    #[test]
    fn test_diff_drives_renames_and_comparisons() {
        let yaml = format!(
            "{}payload:\n  allowlist: [user_id, uid]\ncomparisons:\n  - name: retention\n    code_pattern: 'RETENTION_DAYS\\s*=\\s*(\\d+)'\n    policy_pattern: 'retained for (\\d+) days'\n    op: lte\npolicy: [\"policy/*.md\"]\n",
            RULES
        );
        let settings = settings(&yaml);
        let ws = workspace()
            .with_file("docs/payload.md", "The response has a `user_id` field.\n")
            .with_file("policy/data.md", "Data is retained for 30 days.\n");
        let diff = "--- a/src/users.ts\n+++ b/src/users.ts\n@@ -1,2 +1,2 @@\n-  \"user_id\": id,\n-const RETENTION_DAYS = 30;\n+  \"uid\": id,\n+const RETENTION_DAYS = 90;\n";
        let changes = ChangeSet::files(["src/users.ts"]).with_diff(diff);

        let report = Synthesizer::new(&settings).run(&ws, &changes).unwrap();
        let sources: Vec<(FindingSource, FindingType)> =
            report.findings.iter().map(|f| (f.source, f.kind)).collect();
        assert!(sources.contains(&(FindingSource::Payload, FindingType::PayloadKeyRename)));
        let policy = report
            .findings
            .iter()
            .find(|f| f.kind == FindingType::PolicyValueMismatch)
            .unwrap();
        assert_eq!(policy.severity, Severity::Error);
        assert_eq!(policy.line, Some(2));
        assert!(policy.explanation.contains("90"));
    }

    #[test]
    fn test_whole_file_comparison_without_diff() {
        let yaml = format!(
            "{}comparisons:\n  - name: retention\n    code_pattern: 'RETENTION_DAYS = (\\d+)'\n    policy_pattern: 'retained for (\\d+) days'\n    op: equals\npolicy: [\"policy/*.md\"]\n",
            RULES
        );
        let settings = settings(&yaml);
        let ws = MemoryWorkspace::new()
            .with_file("src/config.ts", "const x = 1;\nconst RETENTION_DAYS = 7;\n")
            .with_file("policy/data.md", "retained for 30 days");
        let report = Synthesizer::new(&settings).run(&ws, &ChangeSet::all()).unwrap();
        let f = report
            .findings
            .iter()
            .find(|f| f.kind == FindingType::PolicyValueMismatch)
            .unwrap();
        assert_eq!(f.file, "src/config.ts");
        assert_eq!(f.line, Some(2));
    }
}
