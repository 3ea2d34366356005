//! docdrift - documentation and policy drift detection.
//!
//! docdrift extracts structural facts (functions, routes, env vars, GraphQL
//! fields, socket events and more) from source files with per-language
//! pattern rules, then compares them against the documentation and policy
//! documents that describe the code. Mismatches are reported as findings.
//!
//! # Architecture
//!
//! - `extract`: language registry, per-language rules and doc extraction
//! - `matcher`: normalization and code-vs-doc comparison
//! - `diff` / `rename`: unified diff parsing and payload rename detection
//! - `compare`: configured value comparisons between code and policy
//! - `safety`: screening of user-supplied patterns
//! - `drift`: result types, workspace access and the synthesizer
//! - `config`: YAML config schema
//! - `report`: Output formatting (text, JSON)
//!
//! # Adding a New Language
//!
//! See `src/extract/languages/` for examples. Write the extraction rules and
//! register the language in `languages/mod.rs`.

pub mod cli;
pub mod compare;
pub mod config;
pub mod diff;
pub mod drift;
pub mod extract;
pub mod facts;
pub mod matcher;
pub mod rename;
pub mod report;
pub mod safety;

pub use compare::{compare_values, run_comparisons, CompareOp, Comparison, ValueType};
pub use config::{Config, ConfigError, Settings};
pub use drift::{
    ChangeSet, CompletionSource, DriftReport, Finding, FindingSource, FindingType, FsWorkspace,
    MemoryWorkspace, Severity, SeverityConfig, Synthesizer, Workspace,
};
pub use extract::{extract_doc_facts, extract_facts, DocIndex, Extractor, LanguageRegistry};
pub use facts::{DocFact, Fact, FactKind, KindSet};
pub use matcher::{
    compare_endpoints, compare_facts, compare_functions, compare_graphql, compare_named,
    compare_websocket, GlobCache,
};
pub use rename::{detect_renames, Allowlist, RenameCandidate};
pub use safety::{validate_pattern_safety, PatternError, SafePattern};
