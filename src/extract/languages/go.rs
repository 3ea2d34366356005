//! Go: funcs and methods, types, net/http and router-framework routes,
//! env lookups, viper keys, flag/cobra CLIs, gorm models and gqlgen resolvers.

use lazy_static::lazy_static;
use regex::Regex;

use super::{http_method, join_paths, lower_first, push_function};
use crate::extract::graphql::normalize_operation_type;
use crate::extract::registry::Language;
use crate::extract::text::balanced_contents;
use crate::extract::{end, group, start, ExtractionRule, ScanContext};
use crate::facts::{Fact, FactKind};

pub const LANGUAGE: Language = Language {
    tag: "go",
    extensions: &["go"],
    rules: RULES,
};

static RULES: &[ExtractionRule] = &[
    ExtractionRule { name: "go-funcs", kinds: &[FactKind::Function, FactKind::Test], run: functions },
    ExtractionRule { name: "go-types", kinds: &[FactKind::Class, FactKind::Model], run: types },
    ExtractionRule { name: "go-routes", kinds: &[FactKind::Endpoint], run: routes },
    ExtractionRule { name: "go-env", kinds: &[FactKind::EnvVar], run: env_vars },
    ExtractionRule { name: "go-config", kinds: &[FactKind::ConfigKey], run: config_keys },
    ExtractionRule { name: "go-cli", kinds: &[FactKind::CliFlag, FactKind::CliCommand], run: cli },
    ExtractionRule { name: "go-graphql", kinds: &[FactKind::GraphqlOperation], run: graphql },
];

lazy_static! {
    static ref FUNC: Regex = Regex::new(
        r"(?m)^func[ \t]*(?:\([^)]*\)[ \t]*)?([A-Za-z_]\w*)[ \t]*(?:\[[^\]]*\][ \t]*)?\("
    ).unwrap();
    static ref TYPE_DECL: Regex = Regex::new(
        r"(?m)^(?:type[ \t]+|[ \t]+)([A-Za-z_]\w*)(?:\[[^\]]*\])?[ \t]+(struct|interface)[ \t]*\{"
    ).unwrap();
    static ref HANDLE: Regex = Regex::new(
        r#"\.(HandleFunc|Handle)\(\s*"([^"]+)""#
    ).unwrap();
    static ref METHODS_CALL: Regex = Regex::new(r#"^[^\n]*?\.Methods\(([^)]*)\)"#).unwrap();
    static ref QUOTED: Regex = Regex::new(r#""([^"]+)""#).unwrap();
    static ref FRAMEWORK_ROUTE: Regex = Regex::new(
        r#"\b([A-Za-z_]\w*)\.(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS|Any|Get|Post|Put|Patch|Delete|Head|Options|All)\(\s*"([^"]*)""#
    ).unwrap();
    static ref GROUP: Regex = Regex::new(
        r#"\b([A-Za-z_]\w*)\s*:?=\s*([A-Za-z_]\w*)\.(?:Group|Route)\(\s*"([^"]*)""#
    ).unwrap();
    static ref METHOD_FUNC: Regex = Regex::new(
        r#"\.(?:Method|MethodFunc)\(\s*"([A-Z]+)"\s*,\s*"([^"]+)""#
    ).unwrap();
    static ref ENV: Regex = Regex::new(r#"\bos\.(?:Getenv|LookupEnv|Setenv)\(\s*"([^"]+)""#).unwrap();
    static ref VIPER: Regex = Regex::new(
        r#"\bviper\.(?:Get\w*|IsSet|SetDefault|BindEnv)\(\s*"([^"]+)""#
    ).unwrap();
    static ref FLAG_DEF: Regex = Regex::new(
        r#"\b(?:flag|pflag|[A-Za-z_]\w*\.(?:Persistent)?Flags\(\))\.(?:Bool|Int|Int64|Uint|String|Float64|Duration|StringSlice|StringArray|Count)(?:Var)?P?\(([^\n]*)"#
    ).unwrap();
    static ref COBRA_USE: Regex = Regex::new(r#"\bUse:\s*"([A-Za-z][\w-]*)"#).unwrap();
    static ref GQLGEN_RESOLVER: Regex = Regex::new(
        r"(?m)^func[ \t]*\(\s*\w+\s+\*?(query|mutation|subscription)Resolver\s*\)\s*([A-Z]\w*)\s*\("
    ).unwrap();
}

fn functions(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    let is_test_file = ctx.file.ends_with("_test.go");
    for caps in ctx.captures(&FUNC) {
        let Some(name) = group(&caps, 1) else { continue };
        let at = start(&caps);
        if is_test_file && (name.starts_with("Test") || name.starts_with("Benchmark")) {
            out.push(ctx.fact(FactKind::Test, name, None, at));
            continue;
        }
        push_function(ctx, out, FactKind::Function, name, end(&caps) - 1, at);
    }
}

fn types(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&TYPE_DECL) {
        let (Some(name), Some(shape)) = (group(&caps, 1), group(&caps, 2)) else { continue };
        let at = start(&caps);
        out.push(ctx.fact(FactKind::Class, name, None, at));

        if shape == "struct" {
            let body = balanced_contents(ctx.text, end(&caps) - 1).unwrap_or("");
            if body.contains("gorm.Model") || body.contains("gorm:\"") {
                out.push(ctx.fact(FactKind::Model, name, None, at));
            }
        }
    }
}

fn routes(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&HANDLE) {
        let Some(pattern) = group(&caps, 2) else { continue };
        let at = start(&caps);
        // Go 1.22 patterns carry the method: "GET /users/{id}"
        if let Some((method, path)) = pattern.split_once(' ') {
            if method.chars().all(|c| c.is_ascii_uppercase()) {
                out.push(ctx.endpoint(method, path.trim(), at));
                continue;
            }
        }
        let rest = &ctx.text[end(&caps)..];
        let methods: Vec<String> = METHODS_CALL
            .captures(rest)
            .map(|m| QUOTED.captures_iter(&m[1]).map(|q| q[1].to_uppercase()).collect())
            .unwrap_or_default();
        if methods.is_empty() {
            out.push(ctx.endpoint("ANY", pattern, at));
        }
        for method in methods {
            out.push(ctx.endpoint(&method, pattern, at));
        }
    }

    let groups: Vec<(String, String, String)> = ctx
        .captures(&GROUP)
        .filter_map(|c| {
            Some((
                group(&c, 1)?.to_string(),
                group(&c, 2)?.to_string(),
                group(&c, 3)?.to_string(),
            ))
        })
        .collect();

    for caps in ctx.captures(&FRAMEWORK_ROUTE) {
        let (Some(receiver), Some(verb), Some(path)) = (group(&caps, 1), group(&caps, 2), group(&caps, 3))
        else {
            continue;
        };
        if matches!(receiver, "http" | "client" | "resty") {
            continue;
        }
        let Some(method) = http_method(verb) else { continue };
        let prefix = group_prefix(&groups, receiver);
        out.push(ctx.endpoint(method, &join_paths(&prefix, path), start(&caps)));
    }

    for caps in ctx.captures(&METHOD_FUNC) {
        if let (Some(method), Some(path)) = (group(&caps, 1), group(&caps, 2)) {
            out.push(ctx.endpoint(method, path, start(&caps)));
        }
    }
}

/// Resolve nested `Group("/x")` prefixes for a router variable.
fn group_prefix(groups: &[(String, String, String)], var: &str) -> String {
    let mut parts = Vec::new();
    let mut current = var;
    for _ in 0..8 {
        match groups.iter().find(|(v, _, _)| v == current) {
            Some((_, parent, prefix)) => {
                parts.push(prefix.as_str());
                if parent == current {
                    break;
                }
                current = parent.as_str();
            }
            None => break,
        }
    }
    parts.reverse();
    parts
        .into_iter()
        .fold(String::new(), |acc, p| join_paths(&acc, p))
}

fn env_vars(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&ENV) {
        if let Some(name) = group(&caps, 1) {
            out.push(ctx.fact(FactKind::EnvVar, name, None, start(&caps)));
        }
    }
}

fn config_keys(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&VIPER) {
        if let Some(key) = group(&caps, 1) {
            out.push(ctx.fact(FactKind::ConfigKey, key, None, start(&caps)));
        }
    }
}

fn cli(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&FLAG_DEF) {
        let Some(args) = group(&caps, 1) else { continue };
        // the Var forms take the destination pointer first
        if let Some(name) = QUOTED.captures(args).and_then(|q| group(&q, 1)) {
            out.push(ctx.fact(FactKind::CliFlag, format!("--{}", name), None, start(&caps)));
        }
    }
    for caps in ctx.captures(&COBRA_USE) {
        if let Some(name) = group(&caps, 1) {
            out.push(ctx.fact(FactKind::CliCommand, name, None, start(&caps)));
        }
    }
}

fn graphql(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&GQLGEN_RESOLVER) {
        let Some(operation) = group(&caps, 1).and_then(normalize_operation_type) else { continue };
        let Some(field) = group(&caps, 2) else { continue };
        let name = format!("{}.{}", operation, lower_first(field));
        out.push(ctx.fact(FactKind::GraphqlOperation, name, None, start(&caps)));
    }
}
