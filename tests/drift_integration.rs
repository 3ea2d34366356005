//! Integration tests for the full drift pipeline.
//!
//! These tests run the synthesizer against the fixture repository in
//! `testdata/repo` through the on-disk workspace.

use std::path::PathBuf;

use docdrift::config;
use docdrift::drift::{
    ChangeSet, DriftReport, FindingSource, FindingType, FsWorkspace, ScanMode, Severity,
    Synthesizer,
};

fn repo_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata").join("repo")
}

fn run(changes: ChangeSet) -> DriftReport {
    let root = repo_path();
    let (_, config) = config::load(None, &root).expect("should find docdrift.yaml");
    let settings = config.compile().expect("fixture config should be valid");
    Synthesizer::new(&settings)
        .run(&FsWorkspace::new(&root), &changes)
        .expect("run should succeed")
}

fn with_diff() -> ChangeSet {
    let diff = std::fs::read_to_string(repo_path().join("changes.diff")).expect("should read diff");
    ChangeSet::all().with_diff(diff)
}

fn kinds_in(report: &DriftReport, file: &str) -> Vec<FindingType> {
    let mut kinds: Vec<FindingType> = report
        .findings
        .iter()
        .filter(|f| f.file == file)
        .map(|f| f.kind)
        .collect();
    kinds.sort();
    kinds
}

#[test]
fn test_code_drift_findings() {
    let report = run(ChangeSet::all());

    assert_eq!(report.files_scanned, 2);
    assert_eq!(report.rules.len(), 1);
    assert_eq!(report.rules[0].mode, ScanMode::Full);
    assert_eq!(report.rules[0].doc_files, 2);

    let mut expected = vec![
        FindingType::FunctionMissingDoc,
        FindingType::FunctionSignatureMismatch,
        FindingType::EndpointMethodMismatch,
        FindingType::EnvVarMissingDoc,
        FindingType::PolicyValueMismatch,
    ];
    expected.sort();
    assert_eq!(kinds_in(&report, "src/users.ts"), expected);

    let mut expected_docs = vec![
        FindingType::DocsMentionsMissingFunction,
        FindingType::DocsMentionsMissingEndpoint,
    ];
    expected_docs.sort();
    assert_eq!(kinds_in(&report, "docs/api.md"), expected_docs);

    assert!(kinds_in(&report, "src/serializers.ts").is_empty());
}

#[test]
fn test_signature_mismatch_references_doc_variant() {
    let report = run(ChangeSet::all());
    let mismatch = report
        .findings
        .iter()
        .find(|f| f.kind == FindingType::FunctionSignatureMismatch)
        .expect("createUser should drift");
    assert!(mismatch.explanation.contains("createUser(email, password)"));
    assert!(mismatch.explanation.contains("createUser(username, password)"));
    assert!(mismatch.explanation.contains("docs/api.md:5"));
}

#[test]
fn test_route_templates_match_across_styles() {
    let report = run(ChangeSet::all());
    // `GET /users/:id` in code is documented as `GET /users/{id}`.
    assert!(!report
        .findings
        .iter()
        .any(|f| f.kind == FindingType::EndpointMissingDoc));
    let mismatch = report
        .findings
        .iter()
        .find(|f| f.kind == FindingType::EndpointMethodMismatch)
        .unwrap();
    assert!(mismatch.explanation.contains("DELETE /users/:id"));
}

#[test]
fn test_diff_adds_rename_and_line_numbers() {
    let report = run(with_diff());

    let rename = report
        .findings
        .iter()
        .find(|f| f.kind == FindingType::PayloadKeyRename)
        .expect("user_id -> uid should be reported");
    assert_eq!(rename.source, FindingSource::Payload);
    assert_eq!(rename.file, "src/serializers.ts");
    assert_eq!(rename.line, Some(3));

    let policy = report
        .findings
        .iter()
        .find(|f| f.kind == FindingType::PolicyValueMismatch)
        .unwrap();
    assert_eq!(policy.file, "src/users.ts");
    assert_eq!(policy.line, Some(3));
    assert_eq!(policy.severity, Severity::Error);
    assert!(policy.explanation.contains("45"));
}

#[test]
fn test_findings_are_ordered_and_gate() {
    let report = run(with_diff());

    // Rule findings come first, then payload, then policy.
    let sources: Vec<FindingSource> = report.findings.iter().map(|f| f.source).collect();
    let first_payload = sources.iter().position(|s| *s == FindingSource::Payload).unwrap();
    let first_policy = sources.iter().position(|s| *s == FindingSource::Policy).unwrap();
    assert!(sources[..first_payload].iter().all(|s| *s == FindingSource::Docs));
    assert!(first_payload < first_policy);

    let docs: Vec<(&str, usize)> = report
        .findings
        .iter()
        .filter(|f| f.source == FindingSource::Docs)
        .map(|f| (f.file.as_str(), f.line.unwrap_or(0)))
        .collect();
    let mut sorted = docs.clone();
    sorted.sort();
    assert_eq!(docs, sorted);

    assert!(report.fails_at(Severity::Error));
    assert!(!report.fails_at(Severity::Critical));
    assert!(report.findings.iter().all(|f| f.is_deterministic()));
}

#[test]
fn test_changed_files_limit_policy_checks() {
    let report = run(ChangeSet::files(["src/serializers.ts"]));
    assert!(!report
        .findings
        .iter()
        .any(|f| f.source == FindingSource::Policy));
    // The rule itself still runs a full scan under the auto ceiling.
    assert_eq!(report.rules[0].mode, ScanMode::Full);
}
