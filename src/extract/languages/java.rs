//! Java and Kotlin: methods, classes, Spring/JAX-RS/Micronaut/Ktor routes,
//! env and `@Value` config, JPA entities, JUnit tests, WebSocket handlers and
//! Spring GraphQL controllers.

use lazy_static::lazy_static;
use phf::phf_set;
use regex::Regex;

use super::{http_method, join_paths, prefix_at, push_function};
use crate::extract::graphql::normalize_operation_type;
use crate::extract::registry::Language;
use crate::extract::{end, first_group, group, start, ExtractionRule, ScanContext};
use crate::facts::{Fact, FactKind};
use crate::matcher::names::normalize_ws_event;

pub const LANGUAGE: Language = Language {
    tag: "java",
    extensions: &["java", "kt", "kts"],
    rules: RULES,
};

static RULES: &[ExtractionRule] = &[
    ExtractionRule { name: "jvm-methods", kinds: &[FactKind::Function, FactKind::Test], run: methods },
    ExtractionRule { name: "jvm-classes", kinds: &[FactKind::Class, FactKind::Model], run: classes },
    ExtractionRule { name: "jvm-spring-routes", kinds: &[FactKind::Endpoint], run: spring_routes },
    ExtractionRule { name: "jvm-jaxrs-routes", kinds: &[FactKind::Endpoint], run: jaxrs_routes },
    ExtractionRule { name: "jvm-ktor-routes", kinds: &[FactKind::Endpoint], run: ktor_routes },
    ExtractionRule { name: "jvm-env", kinds: &[FactKind::EnvVar], run: env_vars },
    ExtractionRule { name: "jvm-config", kinds: &[FactKind::ConfigKey], run: config_keys },
    ExtractionRule { name: "jvm-websocket", kinds: &[FactKind::WebsocketEvent], run: websocket },
    ExtractionRule { name: "jvm-graphql", kinds: &[FactKind::GraphqlOperation], run: graphql },
];

/// Words that can precede `name(` without it being a declaration.
static NOT_A_TYPE: phf::Set<&'static str> = phf_set! {
    "return", "new", "throw", "else", "case", "yield", "await", "if", "for", "while",
    "switch", "catch", "synchronized", "try", "do", "super", "this", "assert", "in", "is",
};

lazy_static! {
    static ref JAVA_METHOD: Regex = Regex::new(
        r"(?m)^[ \t]*(?:(?:public|private|protected|static|final|abstract|synchronized|native|default|override|suspend|open|internal)\s+)*(?:<[^>\n]+>\s+)?([\w<>\[\],.? ]+?)\s+([A-Za-z_]\w*)\s*\("
    ).unwrap();
    static ref KOTLIN_FUN: Regex = Regex::new(
        r"(?m)^[ \t]*(?:(?:public|private|protected|internal|override|open|suspend|inline|operator|abstract)\s+)*fun\s+(?:<[^>\n]+>\s+)?(?:[\w.]+\.)?([A-Za-z_]\w*)\s*\("
    ).unwrap();
    static ref CLASS: Regex = Regex::new(
        r"(?m)^[ \t]*(?:(?:public|private|protected|abstract|final|static|sealed|data|open|internal|enum|annotation|inner)\s+)*(class|interface|enum|record|object)\s+([A-Za-z_]\w*)"
    ).unwrap();
    static ref MAPPING: Regex = Regex::new(
        r"@(Request|Get|Post|Put|Patch|Delete)Mapping\b(?:\s*\(([^)]*)\))?"
    ).unwrap();
    static ref FIRST_QUOTED: Regex = Regex::new(r#""([^"]*)""#).unwrap();
    static ref REQUEST_METHOD: Regex = Regex::new(r"RequestMethod\.(\w+)").unwrap();
    static ref MICRONAUT_CONTROLLER: Regex = Regex::new(r#"@Controller\s*\(\s*(?:value\s*=\s*)?"([^"]*)""#).unwrap();
    static ref MICRONAUT_ROUTE: Regex = Regex::new(
        r#"@(Get|Post|Put|Patch|Delete|Head|Options)\b(?:\s*\(\s*(?:value\s*=\s*|uri\s*=\s*)?"([^"]*)"[^)]*\))?"#
    ).unwrap();
    static ref JAXRS_PATH: Regex = Regex::new(r#"@Path\s*\(\s*(?:value\s*=\s*)?"([^"]*)"[^)]*\)"#).unwrap();
    static ref JAXRS_VERB: Regex = Regex::new(r"@(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS)\b").unwrap();
    static ref KTOR_ROUTE: Regex = Regex::new(
        r#"(?m)^[ \t]*(get|post|put|patch|delete|head|options)\s*(?:<[^>\n]*>\s*)?\(\s*"([^"]+)"\s*\)\s*\{"#
    ).unwrap();
    static ref ENV: Regex = Regex::new(r#"\bSystem\.getenv\(\s*"([^"]+)""#).unwrap();
    static ref VALUE_KEY: Regex = Regex::new(r#"@Value\s*\(\s*"\$\{([^}:"]+)"#).unwrap();
    static ref PROPERTIES_PREFIX: Regex = Regex::new(
        r#"@ConfigurationProperties\s*\(\s*(?:prefix\s*=\s*|value\s*=\s*)?"([^"]+)""#
    ).unwrap();
    static ref MESSAGE_MAPPING: Regex = Regex::new(r#"@(?:MessageMapping|SubscribeMapping)\s*\(\s*"([^"]+)""#).unwrap();
    static ref ENDPOINT_HOOK: Regex = Regex::new(r"@On(Message|Open|Close|Error)\b").unwrap();
    static ref SCHEMA_MAPPING: Regex = Regex::new(
        r#"@(Query|Mutation|Subscription)Mapping\b(?:\s*\(\s*(?:name\s*=\s*|value\s*=\s*)?"(\w+)"\s*\))?"#
    ).unwrap();
    static ref SCHEMA_MAPPING_TYPED: Regex = Regex::new(
        r#"@SchemaMapping\s*\(\s*typeName\s*=\s*"(\w+)"\s*,\s*field\s*=\s*"(\w+)""#
    ).unwrap();
    static ref NEXT_DECL_NAME: Regex = Regex::new(
        r"^(?:\s*@\w+(?:\([^)]*\))?)*\s*(?:(?:public|private|protected|static|final|suspend|override)\s+)*(?:fun\s+)?(?:[\w<>\[\],.?]+\s+)?([A-Za-z_]\w*)\s*\("
    ).unwrap();
    static ref CLASS_AHEAD: Regex = Regex::new(
        r"^(?:\s*@\w+(?:\([^)]*\))?)*\s*(?:(?:public|private|protected|abstract|final|open|internal)\s+)*(?:class|interface|object)\b"
    ).unwrap();
}

/// Annotation lines directly above byte `offset`.
fn annotations_above(text: &str, offset: usize) -> Vec<&str> {
    let line_start = text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    text[..line_start]
        .lines()
        .rev()
        .map(str::trim)
        .take_while(|l| l.starts_with('@') || l.is_empty())
        .collect()
}

fn declares_class_after(text: &str, offset: usize) -> bool {
    CLASS_AHEAD.is_match(&text[offset..])
}

fn methods(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    let kotlin = matches!(ctx.extension().as_str(), "kt" | "kts");
    let re: &Regex = if kotlin { &*KOTLIN_FUN } else { &*JAVA_METHOD };

    for caps in ctx.captures(re) {
        let name_group = if kotlin { 1 } else { 2 };
        let Some(name) = group(&caps, name_group) else { continue };
        if NOT_A_TYPE.contains(name) {
            continue;
        }
        if !kotlin {
            let ty = group(&caps, 1).unwrap_or("");
            if ty.split_whitespace().any(|w| NOT_A_TYPE.contains(w)) {
                continue;
            }
        }
        let at = start(&caps);
        let annotations = annotations_above(ctx.text, at);
        if annotations.iter().any(|a| a.starts_with("@Test") || a.starts_with("@ParameterizedTest")) {
            out.push(ctx.fact(FactKind::Test, name, None, at));
            continue;
        }
        push_function(ctx, out, FactKind::Function, name, end(&caps) - 1, at);
    }
}

fn classes(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&CLASS) {
        let Some(name) = group(&caps, 2) else { continue };
        let at = start(&caps);
        out.push(ctx.fact(FactKind::Class, name, None, at));
        let annotations = annotations_above(ctx.text, at);
        if annotations
            .iter()
            .any(|a| a.starts_with("@Entity") || a.starts_with("@Table") || a.starts_with("@Document"))
        {
            out.push(ctx.fact(FactKind::Model, name, None, at));
        }
    }
}

fn mapping_path(args: &str) -> &str {
    FIRST_QUOTED
        .captures(args)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or("")
}

fn spring_routes(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    let mut prefixes: Vec<(usize, String)> = Vec::new();
    let mut routes: Vec<(usize, Vec<String>, String)> = Vec::new();

    for caps in ctx.captures(&MAPPING) {
        let Some(kind) = group(&caps, 1) else { continue };
        let args = group(&caps, 2).unwrap_or("");
        let path = mapping_path(args).to_string();
        let at = start(&caps);

        if kind == "Request" {
            if declares_class_after(ctx.text, end(&caps)) {
                prefixes.push((at, path));
                continue;
            }
            let methods: Vec<String> = REQUEST_METHOD
                .captures_iter(args)
                .map(|m| m[1].to_uppercase())
                .collect();
            let methods = if methods.is_empty() { vec!["ANY".to_string()] } else { methods };
            routes.push((at, methods, path));
        } else if let Some(method) = http_method(kind) {
            routes.push((at, vec![method.to_string()], path));
        }
    }

    for caps in ctx.captures(&MICRONAUT_CONTROLLER) {
        if let Some(path) = group(&caps, 1) {
            prefixes.push((start(&caps), path.to_string()));
        }
    }
    if ctx.text.contains("io.micronaut") {
        for caps in ctx.captures(&MICRONAUT_ROUTE) {
            let Some(method) = group(&caps, 1).and_then(http_method) else { continue };
            let path = group(&caps, 2).unwrap_or("").to_string();
            routes.push((start(&caps), vec![method.to_string()], path));
        }
    }

    prefixes.sort_by_key(|(at, _)| *at);
    for (at, methods, path) in routes {
        let full = join_paths(prefix_at(&prefixes, at), &path);
        for method in methods {
            out.push(ctx.endpoint(&method, &full, at));
        }
    }
}

fn jaxrs_routes(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    if !(ctx.text.contains("javax.ws.rs") || ctx.text.contains("jakarta.ws.rs")) {
        return;
    }
    let mut class_paths: Vec<(usize, String)> = Vec::new();
    let mut method_paths: Vec<(usize, usize, String)> = Vec::new();
    for caps in ctx.captures(&JAXRS_PATH) {
        let Some(path) = group(&caps, 1) else { continue };
        if declares_class_after(ctx.text, end(&caps)) {
            class_paths.push((start(&caps), path.to_string()));
        } else {
            method_paths.push((start(&caps), end(&caps), path.to_string()));
        }
    }

    for caps in ctx.captures(&JAXRS_VERB) {
        let Some(method) = group(&caps, 1) else { continue };
        let at = start(&caps);
        // @Path may sit on either side of the verb within the same annotation block
        let sub = method_paths
            .iter()
            .find(|(s, e, _)| {
                let (lo, hi) = if *e <= at { (*e, at) } else { (end(&caps), *s) };
                ctx.text[lo..hi].trim().is_empty() || ctx.text[lo..hi].trim_start().starts_with('@')
                    && !ctx.text[lo..hi].contains('(')
            })
            .map(|(_, _, p)| p.as_str())
            .unwrap_or("");
        let full = join_paths(prefix_at(&class_paths, at), sub);
        out.push(ctx.endpoint(method, &full, at));
    }
}

fn ktor_routes(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    if !ctx.text.contains("io.ktor") {
        return;
    }
    for caps in ctx.captures(&KTOR_ROUTE) {
        let (Some(verb), Some(path)) = (group(&caps, 1), group(&caps, 2)) else { continue };
        if let Some(method) = http_method(verb) {
            out.push(ctx.endpoint(method, path, start(&caps)));
        }
    }
}

fn env_vars(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&ENV) {
        if let Some(name) = group(&caps, 1) {
            out.push(ctx.fact(FactKind::EnvVar, name, None, start(&caps)));
        }
    }
}

fn config_keys(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for re in [&*VALUE_KEY, &*PROPERTIES_PREFIX] {
        for caps in ctx.captures(re) {
            if let Some(key) = group(&caps, 1) {
                out.push(ctx.fact(FactKind::ConfigKey, key.trim(), None, start(&caps)));
            }
        }
    }
}

fn websocket(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&MESSAGE_MAPPING) {
        if let Some(dest) = group(&caps, 1) {
            out.push(ctx.fact(FactKind::WebsocketEvent, normalize_ws_event(dest), None, start(&caps)));
        }
    }
    for caps in ctx.captures(&ENDPOINT_HOOK) {
        if let Some(hook) = group(&caps, 1) {
            out.push(ctx.fact(FactKind::WebsocketEvent, normalize_ws_event(hook), None, start(&caps)));
        }
    }
}

fn graphql(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&SCHEMA_MAPPING) {
        let Some(operation) = group(&caps, 1).and_then(normalize_operation_type) else { continue };
        let field = match group(&caps, 2) {
            Some(explicit) => Some(explicit.to_string()),
            None => NEXT_DECL_NAME
                .captures(&ctx.text[end(&caps)..])
                .and_then(|c| first_group(&c, &[1]).map(str::to_string)),
        };
        if let Some(field) = field {
            let name = format!("{}.{}", operation, field);
            out.push(ctx.fact(FactKind::GraphqlOperation, name, None, start(&caps)));
        }
    }
    for caps in ctx.captures(&SCHEMA_MAPPING_TYPED) {
        let Some(operation) = group(&caps, 1).and_then(normalize_operation_type) else { continue };
        if let Some(field) = group(&caps, 2) {
            let name = format!("{}.{}", operation, field);
            out.push(ctx.fact(FactKind::GraphqlOperation, name, None, start(&caps)));
        }
    }
}
