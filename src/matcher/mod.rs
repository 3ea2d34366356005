//! Code-vs-documentation matching.
//!
//! Each comparison takes the code facts and documentation facts of one rule
//! and emits deterministic findings. Facts of different kinds are never
//! compared with each other; every entry point filters its inputs by kind.
//!
//! `full_scan` enables the symmetric direction: documentation that mentions
//! something the code no longer has. It only makes sense when the code side
//! holds every file of the rule, not just the changed ones.

pub mod globs;
pub mod names;
pub mod params;
pub mod paths;

pub use globs::GlobCache;
pub use params::{normalize_params, ParamDiff};

use std::collections::{HashMap, HashSet};

use crate::drift::types::{Finding, FindingSource, FindingType, SeverityConfig};
use crate::extract::graphql::normalize_operation_type;
use crate::facts::{Fact, FactKind};
use names::{normalize_name, normalize_ws_event};
use paths::{endpoint_key, methods_match};

fn of_kind(facts: &[Fact], kind: FactKind) -> impl Iterator<Item = &Fact> {
    facts.iter().filter(move |f| f.kind == kind)
}

fn code_finding(
    kind: FindingType,
    severity: &SeverityConfig,
    fact: &Fact,
    explanation: String,
    suggestion: String,
) -> Finding {
    Finding::new(
        FindingSource::Docs,
        kind,
        severity.docs_drift,
        &fact.file,
        explanation,
        suggestion,
    )
    .at_line(fact.line)
}

/// Compare facts of one kind, dispatching to the kind's matching strategy.
pub fn compare_facts(
    kind: FactKind,
    code: &[Fact],
    docs: &[Fact],
    severity: &SeverityConfig,
    full_scan: bool,
) -> Vec<Finding> {
    match kind {
        FactKind::Function => compare_functions(code, docs, severity, full_scan),
        FactKind::Endpoint => compare_endpoints(code, docs, severity, full_scan),
        FactKind::GraphqlOperation => compare_graphql(code, docs, severity, full_scan),
        FactKind::WebsocketEvent => compare_websocket(code, docs, severity, full_scan),
        FactKind::Class
        | FactKind::EnvVar
        | FactKind::ConfigKey
        | FactKind::CliFlag
        | FactKind::CliCommand
        | FactKind::Component
        | FactKind::Model
        | FactKind::Event
        | FactKind::Test => compare_named(kind, code, docs, severity, full_scan),
    }
}

/// The documented variant closest to `code_params`:
/// `2*|shared| - |code only| - |doc only|`, highest wins, first seen wins ties.
pub fn best_doc_match<'d>(code_params: &[String], variants: &[&'d Fact]) -> Option<(&'d Fact, ParamDiff)> {
    let mut best: Option<(&'d Fact, ParamDiff)> = None;
    for doc in variants.iter().copied() {
        let doc_params = normalize_params(doc.signature.as_deref().unwrap_or(""));
        let diff = ParamDiff::new(code_params, &doc_params);
        if best.as_ref().map_or(true, |(_, b)| diff.score > b.score) {
            best = Some((doc, diff));
        }
    }
    best
}

/// Functions: documented by name, then by parameter list.
pub fn compare_functions(
    code: &[Fact],
    docs: &[Fact],
    severity: &SeverityConfig,
    full_scan: bool,
) -> Vec<Finding> {
    let mut by_name: HashMap<String, Vec<&Fact>> = HashMap::new();
    for doc in of_kind(docs, FactKind::Function) {
        by_name.entry(doc.name.to_lowercase()).or_default().push(doc);
    }

    let mut findings = Vec::new();
    for fact in of_kind(code, FactKind::Function) {
        let Some(variants) = by_name.get(&fact.name.to_lowercase()) else {
            findings.push(code_finding(
                FindingType::FunctionMissingDoc,
                severity,
                fact,
                format!("Function `{}` is not documented", fact.display_signature()),
                format!("Document `{}` or exclude it from this rule", fact.name),
            ));
            continue;
        };

        // Name-only mentions document the function without its parameters;
        // they count only when no doc lists a signature.
        let signed: Vec<&Fact> = variants.iter().copied().filter(|d| d.signature.is_some()).collect();
        if signed.is_empty() {
            continue;
        }
        let Some(signature) = fact.signature.as_deref() else { continue };
        let code_params = normalize_params(signature);
        if signed
            .iter()
            .any(|d| normalize_params(d.signature.as_deref().unwrap_or("")) == code_params)
        {
            continue;
        }
        let Some((doc, diff)) = best_doc_match(&code_params, &signed) else { continue };

        let documented = format!("`{}` ({})", doc.display_signature(), doc.location());
        let (kind, explanation) = if diff.extra.is_empty() && !diff.missing.is_empty() {
            (
                FindingType::FunctionMissingParams,
                format!(
                    "`{}` takes {} not listed in the docs {}",
                    fact.name,
                    quote_list(&diff.missing),
                    documented
                ),
            )
        } else if diff.missing.is_empty() && !diff.extra.is_empty() {
            (
                FindingType::FunctionExtraParams,
                format!(
                    "Docs {} list {} that `{}` no longer takes",
                    documented,
                    quote_list(&diff.extra),
                    fact.name
                ),
            )
        } else {
            (
                FindingType::FunctionSignatureMismatch,
                format!(
                    "`{}` does not match documented {}",
                    fact.display_signature(),
                    documented
                ),
            )
        };
        findings.push(code_finding(
            kind,
            severity,
            fact,
            explanation,
            format!("Update {} to `{}`", doc.location(), fact.display_signature()),
        ));
    }

    if full_scan {
        let code_names: HashSet<String> = of_kind(code, FactKind::Function)
            .map(|f| f.name.to_lowercase())
            .collect();
        let mut reported = HashSet::new();
        // Only call-shaped mentions claim a function exists.
        for doc in of_kind(docs, FactKind::Function).filter(|d| d.signature.is_some()) {
            let key = doc.name.to_lowercase();
            if !code_names.contains(&key) && reported.insert(key) {
                findings.push(doc_finding(
                    FindingType::DocsMentionsMissingFunction,
                    severity,
                    doc,
                    format!("Docs mention `{}` but no such function exists", doc.display_signature()),
                ));
            }
        }
    }

    findings
}

fn doc_finding(kind: FindingType, severity: &SeverityConfig, doc: &Fact, explanation: String) -> Finding {
    Finding::new(
        FindingSource::Docs,
        kind,
        severity.docs_drift,
        &doc.file,
        explanation,
        format!("Remove or update the mention at {}", doc.location()),
    )
    .at_line(doc.line)
}

fn quote_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|i| format!("`{}`", i)).collect();
    let noun = if items.len() == 1 { "parameter" } else { "parameters" };
    format!("{} {}", noun, quoted.join(", "))
}

/// Endpoints: keyed by `(METHOD, normalized path)`; `ANY` matches every method.
pub fn compare_endpoints(
    code: &[Fact],
    docs: &[Fact],
    severity: &SeverityConfig,
    full_scan: bool,
) -> Vec<Finding> {
    let doc_keys: Vec<(String, String, &Fact)> = of_kind(docs, FactKind::Endpoint)
        .filter_map(|d| endpoint_key(&d.name).map(|(m, p)| (m, p, d)))
        .collect();
    let code_keys: Vec<(String, String, &Fact)> = of_kind(code, FactKind::Endpoint)
        .filter_map(|f| endpoint_key(&f.name).map(|(m, p)| (m, p, f)))
        .collect();

    let mut findings = Vec::new();
    for (method, path, fact) in &code_keys {
        let same_path: Vec<&(String, String, &Fact)> = doc_keys.iter().filter(|(_, p, _)| p == path).collect();
        if same_path.iter().any(|(m, _, _)| methods_match(method, m)) {
            continue;
        }
        if let Some((doc_method, _, doc)) = same_path.first() {
            findings.push(code_finding(
                FindingType::EndpointMethodMismatch,
                severity,
                fact,
                format!(
                    "`{}` is documented as `{}` ({})",
                    fact.name,
                    doc.name,
                    doc.location()
                ),
                format!("Document the {} method or fix the route", method),
            ));
            tracing::debug!(code = %fact.name, doc_method = %doc_method, "endpoint method mismatch");
            continue;
        }
        findings.push(code_finding(
            FindingType::EndpointMissingDoc,
            severity,
            fact,
            format!("Endpoint `{}` is not documented", fact.name),
            format!("Add `{} {}` to the API docs", method, path),
        ));
    }

    if full_scan {
        let mut reported = HashSet::new();
        for (method, path, doc) in &doc_keys {
            let exists = code_keys
                .iter()
                .any(|(m, p, _)| p == path && methods_match(m, method));
            if !exists && reported.insert((method.clone(), path.clone())) {
                findings.push(doc_finding(
                    FindingType::DocsMentionsMissingEndpoint,
                    severity,
                    doc,
                    format!("Docs describe `{}` but no route serves it", doc.name),
                ));
            }
        }
    }

    findings
}

/// `(OperationType, field)` from a GraphQL fact name.
fn graphql_key(fact: &Fact) -> Option<(&'static str, &str)> {
    let (op, field) = fact.graphql_parts()?;
    Some((normalize_operation_type(op)?, field.trim()))
}

/// GraphQL root fields: keyed by operation type and field name.
pub fn compare_graphql(
    code: &[Fact],
    docs: &[Fact],
    severity: &SeverityConfig,
    full_scan: bool,
) -> Vec<Finding> {
    let doc_keys: Vec<((&str, &str), &Fact)> = of_kind(docs, FactKind::GraphqlOperation)
        .filter_map(|d| graphql_key(d).map(|k| (k, d)))
        .collect();
    let code_keys: Vec<((&str, &str), &Fact)> = of_kind(code, FactKind::GraphqlOperation)
        .filter_map(|f| graphql_key(f).map(|k| (k, f)))
        .collect();

    let mut findings = Vec::new();
    for ((op, field), fact) in &code_keys {
        if doc_keys.iter().any(|(k, _)| k == &(*op, *field)) {
            continue;
        }
        if let Some(((doc_op, _), doc)) = doc_keys.iter().find(|((_, f), _)| f == field) {
            findings.push(code_finding(
                FindingType::GraphqlOperationTypeMismatch,
                severity,
                fact,
                format!(
                    "`{}` is a {} field but is documented under {} ({})",
                    field,
                    op,
                    doc_op,
                    doc.location()
                ),
                format!("Document `{}.{}`", op, field),
            ));
            continue;
        }
        findings.push(code_finding(
            FindingType::GraphqlMissingDoc,
            severity,
            fact,
            format!("GraphQL operation `{}.{}` is not documented", op, field),
            format!("Document the `{}` {} field", field, op.to_lowercase()),
        ));
    }

    if full_scan {
        let mut reported = HashSet::new();
        for ((op, field), doc) in &doc_keys {
            let exists = code_keys.iter().any(|((_, f), _)| f == field);
            if !exists && reported.insert((*op, *field)) {
                findings.push(doc_finding(
                    FindingType::DocsMentionsMissingGraphql,
                    severity,
                    doc,
                    format!("Docs mention `{}.{}` but the schema has no such field", op, field),
                ));
            }
        }
    }

    findings
}

/// WebSocket events: keyed by the normalized event name.
pub fn compare_websocket(
    code: &[Fact],
    docs: &[Fact],
    severity: &SeverityConfig,
    full_scan: bool,
) -> Vec<Finding> {
    let doc_names: HashSet<String> = of_kind(docs, FactKind::WebsocketEvent)
        .map(|d| normalize_ws_event(&d.name))
        .collect();
    let code_names: HashSet<String> = of_kind(code, FactKind::WebsocketEvent)
        .map(|f| normalize_ws_event(&f.name))
        .collect();

    let mut findings = Vec::new();
    for fact in of_kind(code, FactKind::WebsocketEvent) {
        let event = normalize_ws_event(&fact.name);
        if !doc_names.contains(&event) {
            findings.push(code_finding(
                FindingType::WebsocketMissingDoc,
                severity,
                fact,
                format!("WebSocket event `{}` is not documented", event),
                format!("Document the `{}` event and its payload", event),
            ));
        }
    }

    if full_scan {
        let mut reported = HashSet::new();
        for doc in of_kind(docs, FactKind::WebsocketEvent) {
            let event = normalize_ws_event(&doc.name);
            if !code_names.contains(&event) && reported.insert(event.clone()) {
                findings.push(doc_finding(
                    FindingType::DocsMentionsMissingWebsocket,
                    severity,
                    doc,
                    format!("Docs mention WebSocket event `{}` but no handler exists", event),
                ));
            }
        }
    }

    findings
}

/// The missing-doc finding for name-keyed kinds; `None` for kinds that are
/// never required to be documented.
fn missing_doc_type(kind: FactKind) -> Option<FindingType> {
    match kind {
        FactKind::Function => Some(FindingType::FunctionMissingDoc),
        FactKind::Endpoint => Some(FindingType::EndpointMissingDoc),
        FactKind::GraphqlOperation => Some(FindingType::GraphqlMissingDoc),
        FactKind::WebsocketEvent => Some(FindingType::WebsocketMissingDoc),
        FactKind::Class => Some(FindingType::ClassMissingDoc),
        FactKind::EnvVar => Some(FindingType::EnvVarMissingDoc),
        FactKind::ConfigKey => Some(FindingType::ConfigKeyMissingDoc),
        FactKind::CliFlag => Some(FindingType::CliFlagMissingDoc),
        FactKind::CliCommand => Some(FindingType::CliCommandMissingDoc),
        FactKind::Component => Some(FindingType::ComponentMissingDoc),
        FactKind::Model => Some(FindingType::ModelMissingDoc),
        FactKind::Event => Some(FindingType::EventMissingDoc),
        FactKind::Test => None,
    }
}

/// Name-keyed kinds: documented when any doc fact of the same kind has the
/// same normalized name. There is no symmetric check for these kinds.
pub fn compare_named(
    kind: FactKind,
    code: &[Fact],
    docs: &[Fact],
    severity: &SeverityConfig,
    _full_scan: bool,
) -> Vec<Finding> {
    let Some(finding_type) = missing_doc_type(kind) else {
        return Vec::new();
    };
    let documented: HashSet<String> = of_kind(docs, kind)
        .map(|d| normalize_name(kind, &d.name))
        .collect();

    of_kind(code, kind)
        .filter(|f| !documented.contains(&normalize_name(kind, &f.name)))
        .map(|f| {
            code_finding(
                finding_type,
                severity,
                f,
                format!("{} `{}` is not documented", kind_label(kind), f.name),
                format!("Document `{}`", f.name),
            )
        })
        .collect()
}

fn kind_label(kind: FactKind) -> &'static str {
    match kind {
        FactKind::Function => "Function",
        FactKind::Class => "Class",
        FactKind::Endpoint => "Endpoint",
        FactKind::EnvVar => "Environment variable",
        FactKind::ConfigKey => "Config key",
        FactKind::CliFlag => "CLI flag",
        FactKind::CliCommand => "CLI command",
        FactKind::Component => "Component",
        FactKind::Model => "Model",
        FactKind::Event => "Event",
        FactKind::Test => "Test",
        FactKind::GraphqlOperation => "GraphQL operation",
        FactKind::WebsocketEvent => "WebSocket event",
    }
}
