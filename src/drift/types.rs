//! Core types for drift results.

use serde::{Deserialize, Serialize};

/// Severity levels for findings, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    /// Parse a severity string, falling back to `default` for anything that
    /// is not exactly one of `info|warning|error|critical` (case-insensitive).
    pub fn parse_or(s: &str, default: Severity) -> Severity {
        s.parse().unwrap_or(default)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// Severity assignment per finding family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityConfig {
    pub default: Severity,
    pub docs_drift: Severity,
    pub policy_drift: Severity,
    pub rename: Severity,
}

impl Default for SeverityConfig {
    fn default() -> Self {
        Self {
            default: Severity::Warning,
            docs_drift: Severity::Warning,
            policy_drift: Severity::Error,
            rename: Severity::Warning,
        }
    }
}

/// Which corpus comparison produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSource {
    Docs,
    Policy,
    Payload,
    Llm,
}

impl FindingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingSource::Docs => "docs",
            FindingSource::Policy => "policy",
            FindingSource::Payload => "payload",
            FindingSource::Llm => "llm",
        }
    }
}

impl std::fmt::Display for FindingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Finding type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingType {
    // Functions
    FunctionMissingDoc,
    FunctionMissingParams,
    FunctionExtraParams,
    FunctionSignatureMismatch,
    DocsMentionsMissingFunction,
    // Endpoints
    EndpointMissingDoc,
    EndpointMethodMismatch,
    DocsMentionsMissingEndpoint,
    // GraphQL
    GraphqlMissingDoc,
    GraphqlOperationTypeMismatch,
    DocsMentionsMissingGraphql,
    // WebSocket
    WebsocketMissingDoc,
    DocsMentionsMissingWebsocket,
    // Name-only kinds
    ClassMissingDoc,
    EnvVarMissingDoc,
    ConfigKeyMissingDoc,
    CliFlagMissingDoc,
    CliCommandMissingDoc,
    ComponentMissingDoc,
    ModelMissingDoc,
    EventMissingDoc,
    // Payload
    PayloadKeyRename,
    // Policy
    PolicyValueMissing,
    PolicyValueMismatch,
    // Non-deterministic
    Advisory,
}

impl FindingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingType::FunctionMissingDoc => "function-missing-doc",
            FindingType::FunctionMissingParams => "function-missing-params",
            FindingType::FunctionExtraParams => "function-extra-params",
            FindingType::FunctionSignatureMismatch => "function-signature-mismatch",
            FindingType::DocsMentionsMissingFunction => "docs-mentions-missing-function",
            FindingType::EndpointMissingDoc => "endpoint-missing-doc",
            FindingType::EndpointMethodMismatch => "endpoint-method-mismatch",
            FindingType::DocsMentionsMissingEndpoint => "docs-mentions-missing-endpoint",
            FindingType::GraphqlMissingDoc => "graphql-missing-doc",
            FindingType::GraphqlOperationTypeMismatch => "graphql-operation-type-mismatch",
            FindingType::DocsMentionsMissingGraphql => "docs-mentions-missing-graphql",
            FindingType::WebsocketMissingDoc => "websocket-missing-doc",
            FindingType::DocsMentionsMissingWebsocket => "docs-mentions-missing-websocket",
            FindingType::ClassMissingDoc => "class-missing-doc",
            FindingType::EnvVarMissingDoc => "env-var-missing-doc",
            FindingType::ConfigKeyMissingDoc => "config-key-missing-doc",
            FindingType::CliFlagMissingDoc => "cli-flag-missing-doc",
            FindingType::CliCommandMissingDoc => "cli-command-missing-doc",
            FindingType::ComponentMissingDoc => "component-missing-doc",
            FindingType::ModelMissingDoc => "model-missing-doc",
            FindingType::EventMissingDoc => "event-missing-doc",
            FindingType::PayloadKeyRename => "payload-key-rename",
            FindingType::PolicyValueMissing => "policy-value-missing",
            FindingType::PolicyValueMismatch => "policy-value-mismatch",
            FindingType::Advisory => "advisory",
        }
    }
}

impl std::fmt::Display for FindingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single detected drift.
///
/// The `deterministic` flag is fixed by the constructor used: [`Finding::new`]
/// for rule-based findings, [`Finding::advisory`] for model-sourced ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub source: FindingSource,
    #[serde(rename = "type")]
    pub kind: FindingType,
    pub severity: Severity,
    deterministic: bool,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub explanation: String,
    pub suggestion: String,
}

impl Finding {
    /// A deterministic, rule-derived finding.
    pub fn new(
        source: FindingSource,
        kind: FindingType,
        severity: Severity,
        file: impl Into<String>,
        explanation: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            source,
            kind,
            severity,
            deterministic: true,
            file: file.into(),
            line: None,
            explanation: explanation.into(),
            suggestion: suggestion.into(),
        }
    }

    /// A model-sourced finding. Always non-deterministic.
    pub fn advisory(
        severity: Severity,
        file: impl Into<String>,
        explanation: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            source: FindingSource::Llm,
            kind: FindingType::Advisory,
            severity,
            deterministic: false,
            file: file.into(),
            line: None,
            explanation: explanation.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    /// Sort key for stable output within one comparison unit.
    pub(crate) fn sort_key(&self) -> (&str, usize, FindingType, &str) {
        (
            self.file.as_str(),
            self.line.unwrap_or(0),
            self.kind,
            self.explanation.as_str(),
        )
    }
}

/// A file that was not analyzed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

/// Whether a rule compared every matching file or only changed ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Full,
    Incremental,
}

/// Per-rule run metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSummary {
    pub name: String,
    pub mode: ScanMode,
    pub code_files: usize,
    pub doc_files: usize,
    pub findings: usize,
}

/// Results of one drift run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriftReport {
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub skipped: Vec<SkippedFile>,
    #[serde(default)]
    pub rules: Vec<RuleSummary>,
    /// Number of code files analyzed
    pub files_scanned: usize,
}

impl DriftReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a skipped file once.
    pub fn add_skipped(&mut self, skipped: SkippedFile) {
        if !self.skipped.iter().any(|s| s.file == skipped.file) {
            self.skipped.push(skipped);
        }
    }

    /// Whether any deterministic finding is at or above `threshold`.
    /// Advisory findings never gate.
    pub fn fails_at(&self, threshold: Severity) -> bool {
        self.findings
            .iter()
            .any(|f| f.is_deterministic() && f.severity >= threshold)
    }

    /// Count of findings per severity, most severe first.
    pub fn severity_counts(&self) -> Vec<(Severity, usize)> {
        [
            Severity::Critical,
            Severity::Error,
            Severity::Warning,
            Severity::Info,
        ]
        .into_iter()
        .map(|s| (s, self.findings.iter().filter(|f| f.severity == s).count()))
        .filter(|(_, n)| *n > 0)
        .collect()
    }
}
