//! Configuration schema for docdrift.
//!
//! A config file binds rules (code globs, doc globs, fact kinds) and the
//! policy comparisons to run. Everything is optional; an empty file is a
//! valid config that scans nothing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compare::{CompareOp, Comparison, ValueType};
use crate::drift::types::{Severity, SeverityConfig};
use crate::extract::ExtractLimits;
use crate::facts::{FactKind, KindSet};
use crate::matcher::globs::{is_glob, GlobCache};
use crate::safety::{PatternError, SafetyValidator};

/// Config file names searched for, in order.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["docdrift.yaml", ".docdrift.yaml", "drift.yaml"];

/// Starter config written by `docdrift init`.
pub const TEMPLATE: &str = r#"# docdrift configuration
version: "1"

# info | warning | error | critical
severity:
  default: warning
  docs_drift: warning
  policy_drift: error
  rename: warning

limits:
  max_file_bytes: 1048576
  max_matches_per_pattern: 5000
  file_budget_ms: 2000

# Rules with full_scan: auto compare every matching file when there are at
# most this many, and only changed files otherwise.
full_scan_max_files: 400

rules:
  - name: api
    code: ["src/**/*.ts", "src/**/*.js"]
    docs: ["docs/**/*.md", "README.md"]
    kinds: [function, endpoint, env-var]
    full_scan: auto

# Payload keys watched for renames. Leave empty to use the field names the
# docs mention.
payload:
  allowlist: []

comparisons: []
#  - name: retention
#    code_pattern: 'RETENTION_DAYS\s*=\s*(\d+)'
#    policy_pattern: 'retained for (\d+) days'
#    op: lte
#    value_type: number
#    severity: error

policy: ["policy/**/*.md"]
"#;

/// Errors raised while loading or validating a config.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no config file found (looked for {})", DEFAULT_CONFIG_NAMES.join(", "))]
    NotFound,

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{context}: invalid glob {pattern:?}: {source}")]
    InvalidGlob {
        context: String,
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("rule {rule:?}: unknown fact kind {kind:?}")]
    UnknownKind { rule: String, kind: String },

    #[error("rule {rule:?}: no code globs")]
    EmptyRule { rule: String },

    #[error("duplicate rule name {0:?}")]
    DuplicateRule(String),

    #[error("comparison {name:?}: unknown operator {op:?}")]
    UnknownOperator { name: String, op: String },

    #[error("comparison {name:?}: unknown value_type {value_type:?}")]
    UnknownValueType { name: String, value_type: String },

    #[error("comparison {name:?}: {field}: {source}")]
    UnsafePattern {
        name: String,
        field: &'static str,
        #[source]
        source: PatternError,
    },
}

/// Top-level config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub severity: SeveritySection,
    pub limits: LimitsSection,
    /// Ceiling for `full_scan: auto`.
    pub full_scan_max_files: usize,
    pub rules: Vec<RuleConfig>,
    pub payload: PayloadSection,
    pub comparisons: Vec<ComparisonConfig>,
    /// Policy document globs shared by every comparison.
    pub policy: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            severity: SeveritySection::default(),
            limits: LimitsSection::default(),
            full_scan_max_files: 400,
            rules: Vec::new(),
            payload: PayloadSection::default(),
            comparisons: Vec::new(),
            policy: Vec::new(),
        }
    }
}

/// Severity strings per finding family. Unset families inherit `default`,
/// except policy drift which is `error` unless set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SeveritySection {
    pub default: Option<String>,
    pub docs_drift: Option<String>,
    pub policy_drift: Option<String>,
    pub rename: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsSection {
    pub max_file_bytes: usize,
    pub max_matches_per_pattern: usize,
    pub file_budget_ms: u64,
}

impl Default for LimitsSection {
    fn default() -> Self {
        let limits = ExtractLimits::default();
        Self {
            max_file_bytes: limits.max_file_bytes,
            max_matches_per_pattern: limits.max_matches_per_pattern,
            file_budget_ms: limits.file_budget.as_millis() as u64,
        }
    }
}

/// Whether a rule compares every matching file or only changed ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FullScan {
    /// Full when the rule matches at most `full_scan_max_files` code files.
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RuleConfig {
    pub name: String,
    pub code: Vec<String>,
    pub docs: Vec<String>,
    /// Extra policy globs for this rule's comparisons.
    pub policy: Vec<String>,
    /// Fact kinds to extract; empty means every kind.
    pub kinds: Vec<String>,
    pub full_scan: FullScan,
    /// Ask the attached completion source for advisory findings.
    pub advisory: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PayloadSection {
    /// Exact keys or globs; empty derives the list from the docs.
    pub allowlist: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ComparisonConfig {
    pub name: String,
    pub code_pattern: String,
    pub policy_pattern: String,
    pub op: String,
    pub value_type: String,
    pub severity: Option<String>,
}

/// A validated rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub code: Vec<String>,
    pub docs: Vec<String>,
    pub policy: Vec<String>,
    pub kinds: KindSet,
    pub full_scan: FullScan,
    pub advisory: bool,
}

/// A config that passed validation, with everything compiled.
#[derive(Debug, Clone)]
pub struct Settings {
    pub severity: SeverityConfig,
    pub limits: ExtractLimits,
    pub full_scan_max_files: usize,
    pub rules: Vec<Rule>,
    pub allowlist: Vec<String>,
    pub comparisons: Vec<Comparison>,
    pub policy: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            severity: SeverityConfig::default(),
            limits: ExtractLimits::default(),
            full_scan_max_files: 400,
            rules: Vec::new(),
            allowlist: Vec::new(),
            comparisons: Vec::new(),
            policy: Vec::new(),
        }
    }
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a config from YAML text.
    pub fn parse_str(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Validate and compile into run settings.
    pub fn compile(&self) -> Result<Settings, ConfigError> {
        let severity = self.severity.resolve();
        let mut cache = GlobCache::new();

        let mut rules = Vec::with_capacity(self.rules.len());
        for (i, rule) in self.rules.iter().enumerate() {
            let name = if rule.name.trim().is_empty() {
                format!("rule-{}", i + 1)
            } else {
                rule.name.trim().to_string()
            };
            if rules.iter().any(|r: &Rule| r.name == name) {
                return Err(ConfigError::DuplicateRule(name));
            }
            if rule.code.is_empty() {
                return Err(ConfigError::EmptyRule { rule: name });
            }
            for (field, globs) in [("code", &rule.code), ("docs", &rule.docs), ("policy", &rule.policy)] {
                check_globs(&mut cache, &format!("rule {:?} {}", name, field), globs)?;
            }
            let kinds = if rule.kinds.is_empty() {
                KindSet::all()
            } else {
                rule.kinds
                    .iter()
                    .map(|k| {
                        FactKind::parse(k).ok_or_else(|| ConfigError::UnknownKind {
                            rule: name.clone(),
                            kind: k.clone(),
                        })
                    })
                    .collect::<Result<KindSet, _>>()?
            };
            rules.push(Rule {
                name,
                code: rule.code.clone(),
                docs: rule.docs.clone(),
                policy: rule.policy.clone(),
                kinds,
                full_scan: rule.full_scan,
                advisory: rule.advisory,
            });
        }

        check_globs(&mut cache, "policy", &self.policy)?;
        let allowlist_globs: Vec<String> =
            self.payload.allowlist.iter().filter(|e| is_glob(e)).cloned().collect();
        check_globs(&mut cache, "payload allowlist", &allowlist_globs)?;

        let validator = SafetyValidator::default();
        let mut comparisons = Vec::with_capacity(self.comparisons.len());
        for (i, c) in self.comparisons.iter().enumerate() {
            let name = if c.name.trim().is_empty() {
                format!("comparison-{}", i + 1)
            } else {
                c.name.trim().to_string()
            };
            let op = CompareOp::parse(&c.op).ok_or_else(|| ConfigError::UnknownOperator {
                name: name.clone(),
                op: c.op.clone(),
            })?;
            let value_type =
                ValueType::parse(&c.value_type).ok_or_else(|| ConfigError::UnknownValueType {
                    name: name.clone(),
                    value_type: c.value_type.clone(),
                })?;
            let severity = match &c.severity {
                Some(s) => parse_severity(&format!("comparison {:?} severity", name), s, severity.default),
                None => severity.policy_drift,
            };
            let pattern = |field: &'static str, source: &str| {
                validator.validate(source).map_err(|source| ConfigError::UnsafePattern {
                    name: name.clone(),
                    field,
                    source,
                })
            };
            comparisons.push(Comparison {
                code_pattern: pattern("code_pattern", &c.code_pattern)?,
                policy_pattern: pattern("policy_pattern", &c.policy_pattern)?,
                name,
                op,
                value_type,
                severity,
            });
        }

        Ok(Settings {
            severity,
            limits: self.limits.resolve(),
            full_scan_max_files: self.full_scan_max_files,
            rules,
            allowlist: self.payload.allowlist.clone(),
            comparisons,
            policy: self.policy.clone(),
        })
    }
}

impl SeveritySection {
    /// Unset families inherit `default` (`policy_drift` inherits `error`);
    /// unknown values fall back to `default`.
    pub fn resolve(&self) -> SeverityConfig {
        let default = match &self.default {
            Some(v) => parse_severity("severity.default", v, Severity::Warning),
            None => Severity::Warning,
        };
        let field = |name: &str, value: &Option<String>, unset: Severity| match value {
            Some(v) => parse_severity(&format!("severity.{}", name), v, default),
            None => unset,
        };
        SeverityConfig {
            default,
            docs_drift: field("docs_drift", &self.docs_drift, default),
            policy_drift: field("policy_drift", &self.policy_drift, Severity::Error),
            rename: field("rename", &self.rename, default),
        }
    }
}

impl LimitsSection {
    pub fn resolve(&self) -> ExtractLimits {
        ExtractLimits {
            max_file_bytes: self.max_file_bytes,
            max_matches_per_pattern: self.max_matches_per_pattern,
            file_budget: Duration::from_millis(self.file_budget_ms),
        }
    }
}

fn parse_severity(field: &str, value: &str, fallback: Severity) -> Severity {
    value.parse().unwrap_or_else(|_| {
        tracing::warn!(field, value, fallback = %fallback, "unknown severity; using fallback");
        fallback
    })
}

fn check_globs(cache: &mut GlobCache, context: &str, globs: &[String]) -> Result<(), ConfigError> {
    for pattern in globs {
        globset::Glob::new(pattern).map_err(|source| ConfigError::InvalidGlob {
            context: context.to_string(),
            pattern: pattern.clone(),
            source,
        })?;
    }
    if !globs.is_empty() {
        cache.set(globs).map_err(|source| ConfigError::InvalidGlob {
            context: context.to_string(),
            pattern: globs.join(", "),
            source,
        })?;
    }
    Ok(())
}

/// Validate a config for correctness.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    config.compile().map(|_| ())
}

/// Find a config file in `dir`.
pub fn discover(dir: &Path) -> Result<PathBuf, ConfigError> {
    DEFAULT_CONFIG_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .ok_or(ConfigError::NotFound)
}

/// Load the config at `path`, or discover one under `root`.
pub fn load(path: Option<&Path>, root: &Path) -> Result<(PathBuf, Config), ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => discover(root)?,
    };
    let config = Config::parse_file(&path)?;
    tracing::debug!(path = %path.display(), rules = config.rules.len(), "loaded config");
    Ok((path, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version: "1"
severity:
  default: info
  policy_drift: critical
rules:
  - name: api
    code: ["src/**/*.ts"]
    docs: ["docs/**/*.md"]
    kinds: [function, endpoint, env_var]
    full_scan: never
payload:
  allowlist: ["user_id", "user_*"]
comparisons:
  - name: retention
    code_pattern: 'RETENTION_DAYS\s*=\s*(\d+)'
    policy_pattern: 'retained for (\d+) days'
    op: "<="
    value_type: number
policy: ["policy/**/*.md"]
"#;

    #[test]
    fn test_parse_and_compile() {
        let config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        let settings = config.compile().unwrap();

        assert_eq!(settings.severity.default, Severity::Info);
        assert_eq!(settings.severity.docs_drift, Severity::Info);
        assert_eq!(settings.severity.policy_drift, Severity::Critical);
        assert_eq!(settings.rules.len(), 1);
        let rule = &settings.rules[0];
        assert_eq!(rule.full_scan, FullScan::Never);
        assert!(rule.kinds.contains(FactKind::EnvVar));
        assert!(!rule.kinds.contains(FactKind::Class));
        assert_eq!(settings.comparisons[0].op, CompareOp::Lte);
        assert_eq!(settings.comparisons[0].severity, Severity::Critical);
        assert_eq!(settings.full_scan_max_files, 400);
    }

    #[test]
    fn test_defaults() {
        let settings = Config::parse_str("").unwrap().compile().unwrap();
        assert_eq!(settings.severity, SeverityConfig::default());
        assert_eq!(settings.limits, ExtractLimits::default());
        assert!(settings.rules.is_empty());
    }

    #[test]
    fn test_template_is_valid() {
        let config = Config::parse_str(TEMPLATE).unwrap();
        assert!(validate(&config).is_ok());
        assert_eq!(config.rules[0].name, "api");
    }

    #[test]
    fn test_rejects_unsafe_pattern() {
        let yaml = "comparisons:\n  - name: bad\n    code_pattern: '(a+)+$'\n    policy_pattern: 'x'\n    op: eq\n";
        let config = Config::parse_str(yaml).unwrap();
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::UnsafePattern { field: "code_pattern", .. }));
    }

    #[test]
    fn test_unknown_severity_falls_back_to_default() {
        let yaml = "severity:\n  default: info\n  docs_drift: fatal\n  policy_drift: loud\ncomparisons:\n  - code_pattern: 'a'\n    policy_pattern: 'b'\n    op: eq\n    severity: urgent\n";
        let settings = Config::parse_str(yaml).unwrap().compile().unwrap();
        assert_eq!(settings.severity.docs_drift, Severity::Info);
        assert_eq!(settings.severity.policy_drift, Severity::Info);
        assert_eq!(settings.comparisons[0].severity, Severity::Info);

        let bad_default = Config::parse_str("severity:\n  default: fatal\n").unwrap();
        let settings = bad_default.compile().unwrap();
        assert_eq!(settings.severity, SeverityConfig::default());
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let bad_glob = Config::parse_str("rules:\n  - name: a\n    code: ['src/[']\n").unwrap();
        assert!(matches!(validate(&bad_glob), Err(ConfigError::InvalidGlob { .. })));

        let bad_kind = Config::parse_str("rules:\n  - name: a\n    code: ['*.rs']\n    kinds: [widget]\n").unwrap();
        assert!(matches!(validate(&bad_kind), Err(ConfigError::UnknownKind { .. })));

        let bad_op = Config::parse_str("comparisons:\n  - code_pattern: 'a'\n    policy_pattern: 'b'\n    op: '~'\n").unwrap();
        assert!(matches!(validate(&bad_op), Err(ConfigError::UnknownOperator { .. })));

        let dup = Config::parse_str("rules:\n  - name: a\n    code: ['*.rs']\n  - name: a\n    code: ['*.go']\n").unwrap();
        assert!(matches!(validate(&dup), Err(ConfigError::DuplicateRule(_))));
    }

    #[test]
    fn test_discover() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(discover(dir.path()), Err(ConfigError::NotFound)));
        std::fs::write(dir.path().join(".docdrift.yaml"), "rules: []\n").unwrap();
        let (path, config) = load(None, dir.path()).unwrap();
        assert!(path.ends_with(".docdrift.yaml"));
        assert!(config.rules.is_empty());
    }
}
