//! Output formatting for drift results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption

use colored::*;
use serde::{Deserialize, Serialize};

use crate::drift::{DriftReport, Finding, RuleSummary, ScanMode, Severity, SkippedFile};
use crate::facts::Fact;

// =============================================================================
// JSON Format
// =============================================================================

/// Top-level JSON document for `docdrift check`.
#[derive(Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub root: String,
    pub config: String,
    pub fail_on: Severity,
    pub passed: bool,
    pub files_scanned: usize,
    pub findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedFile>,
    pub rules: Vec<RuleSummary>,
}

/// Render a report as pretty-printed JSON.
pub fn to_json(
    root: &str,
    config_path: &str,
    report: &DriftReport,
    fail_on: Severity,
) -> anyhow::Result<String> {
    let doc = JsonReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        root: root.to_string(),
        config: config_path.to_string(),
        fail_on,
        passed: !report.fails_at(fail_on),
        files_scanned: report.files_scanned,
        findings: report.findings.clone(),
        skipped: report.skipped.clone(),
        rules: report.rules.clone(),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Write results in JSON format.
pub fn write_json(
    root: &str,
    config_path: &str,
    report: &DriftReport,
    fail_on: Severity,
) -> anyhow::Result<()> {
    println!("{}", to_json(root, config_path, report, fail_on)?);
    Ok(())
}

/// Write extracted facts as a JSON array.
pub fn write_facts_json(facts: &[Fact]) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(facts)?);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write results in pretty (human-readable) format.
pub fn write_pretty(root: &str, config_path: &str, report: &DriftReport, fail_on: Severity) {
    println!();
    print!("  ");
    print!("{}", "docdrift".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Scanning: ".dimmed());
    println!("{}", root);
    print!("  {}", "Config:   ".dimmed());
    println!("{}", config_path);
    println!();

    if !report.rules.is_empty() {
        write_rules(&report.rules);
        println!();
    }

    if !report.findings.is_empty() {
        write_findings(&report.findings);
        println!();
    }

    if !report.skipped.is_empty() {
        write_skipped(&report.skipped);
        println!();
    }

    write_final_status(report, fail_on);
    println!();
}

fn write_rules(rules: &[RuleSummary]) {
    println!("  {}", "Rules:".bold());
    for rule in rules {
        let mode = match rule.mode {
            ScanMode::Full => "full".normal(),
            ScanMode::Incremental => "incremental".dimmed(),
        };
        println!(
            "    {:<20} {:<12} {:>4} code  {:>4} docs  {:>4} findings",
            rule.name, mode, rule.code_files, rule.doc_files, rule.findings
        );
    }
}

fn write_findings(findings: &[Finding]) {
    println!("  {} ({}):", "Findings".bold(), findings.len());
    println!();

    for f in findings {
        write_severity_tag(f.severity);
        print!("   ");
        print!("{:<34}", f.kind.as_str().dimmed());
        print!("{}", f.file.blue());
        if let Some(line) = f.line {
            print!("{}", format!(":{}", line).dimmed());
        }
        if !f.is_deterministic() {
            print!("  {}", "(advisory)".dimmed());
        }
        println!();

        println!("            {}", f.explanation);
        if !f.suggestion.is_empty() {
            println!("            {}", format!("-> {}", f.suggestion).dimmed());
        }
        println!();
    }
}

fn write_severity_tag(severity: Severity) {
    match severity {
        Severity::Critical => print!("    {} ", "CRIT ".red().bold()),
        Severity::Error => print!("    {} ", "ERROR".red()),
        Severity::Warning => print!("    {} ", "WARN ".yellow()),
        Severity::Info => print!("    {} ", "INFO ".blue()),
    }
}

fn write_skipped(skipped: &[SkippedFile]) {
    println!("  {} ({}):", "Skipped".dimmed(), skipped.len());
    for s in skipped {
        println!("    {}  {}", s.file, s.reason.dimmed());
    }
}

fn write_final_status(report: &DriftReport, fail_on: Severity) {
    print!(
        "  {}",
        format!("Files: {}  Fail on: {}", report.files_scanned, fail_on).dimmed()
    );
    for (severity, count) in report.severity_counts() {
        print!("  {}: {}", severity, count);
    }
    print!("  ");
    if report.fails_at(fail_on) {
        print!("{}", "FAILED".red());
    } else {
        print!("{}", "PASSED".green());
    }
    println!();
}

/// Write extracted facts grouped by file.
pub fn write_facts_pretty(facts: &[Fact]) {
    let mut current: Option<&str> = None;
    for fact in facts {
        if current != Some(fact.file.as_str()) {
            if current.is_some() {
                println!();
            }
            println!("  {}", fact.file.blue());
            current = Some(fact.file.as_str());
        }
        println!(
            "    {:<18} {:<40} {}",
            fact.kind.as_str().dimmed(),
            fact.display_signature(),
            format!(":{}", fact.line).dimmed()
        );
    }
    if facts.is_empty() {
        println!("  {}", "no facts found".dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::{FindingSource, FindingType};

    #[test]
    fn test_json_report_shape() {
        let mut report = DriftReport::new();
        report.files_scanned = 3;
        report.findings.push(
            Finding::new(
                FindingSource::Docs,
                FindingType::EndpointMissingDoc,
                Severity::Warning,
                "src/routes.py",
                "GET /health is not documented",
                "Document the endpoint",
            )
            .at_line(4),
        );

        let json = to_json(".", "docdrift.yaml", &report, Severity::Error).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["passed"], true);
        assert_eq!(value["files_scanned"], 3);
        assert_eq!(value["fail_on"], "error");
        assert_eq!(value["findings"][0]["type"], "endpoint-missing-doc");
        assert_eq!(value["findings"][0]["line"], 4);
        assert!(value.get("skipped").is_none());

        let json = to_json(".", "docdrift.yaml", &report, Severity::Warning).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["passed"], false);
    }
}
