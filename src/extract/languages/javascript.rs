//! JavaScript / TypeScript (plus Vue and Svelte single-file components).

use std::path::Path;

use lazy_static::lazy_static;
use phf::phf_set;
use regex::Regex;

use super::{http_method, join_paths, prefix_at, push_function, skip_blank};
use crate::extract::graphql::{normalize_operation_type, operation_fields, schema_fields};
use crate::extract::registry::Language;
use crate::extract::text::{balanced_contents, matching_close, top_level_items};
use crate::extract::{end, first_group, group, start, ExtractionRule, ScanContext};
use crate::facts::{Fact, FactKind};
use crate::matcher::names::normalize_ws_event;

pub const LANGUAGE: Language = Language {
    tag: "javascript",
    extensions: &[
        "js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts", "vue", "svelte",
    ],
    rules: RULES,
};

static RULES: &[ExtractionRule] = &[
    ExtractionRule { name: "js-functions", kinds: &[FactKind::Function, FactKind::Component], run: functions },
    ExtractionRule { name: "js-classes", kinds: &[FactKind::Class, FactKind::Component, FactKind::Model, FactKind::Function], run: classes },
    ExtractionRule { name: "js-routes", kinds: &[FactKind::Endpoint], run: routes },
    ExtractionRule { name: "js-nest-routes", kinds: &[FactKind::Endpoint], run: nest_routes },
    ExtractionRule { name: "js-next-routes", kinds: &[FactKind::Endpoint], run: next_routes },
    ExtractionRule { name: "js-env", kinds: &[FactKind::EnvVar], run: env_vars },
    ExtractionRule { name: "js-config", kinds: &[FactKind::ConfigKey], run: config_keys },
    ExtractionRule { name: "js-cli", kinds: &[FactKind::CliFlag, FactKind::CliCommand], run: cli },
    ExtractionRule { name: "js-models", kinds: &[FactKind::Model], run: models },
    ExtractionRule { name: "js-events", kinds: &[FactKind::Event, FactKind::WebsocketEvent], run: events },
    ExtractionRule { name: "js-graphql", kinds: &[FactKind::GraphqlOperation], run: graphql },
    ExtractionRule { name: "js-components", kinds: &[FactKind::Component], run: components },
    ExtractionRule { name: "js-tests", kinds: &[FactKind::Test], run: tests_rule },
];

/// Receivers whose `.get('/x')` calls register server routes.
static ROUTER_NAMES: phf::Set<&'static str> = phf_set! {
    "app", "router", "server", "fastify", "koa", "route", "routes", "routing", "r", "api_router",
};

static METHOD_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "constructor", "if", "for", "while", "switch", "catch", "return", "function", "super",
    "else", "do", "try", "new", "typeof", "await", "yield", "import",
};

lazy_static! {
    static ref FUNC_DECL: Regex = Regex::new(
        r"(?m)(?:^|[^\w$.])(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)\s*(?:<[^>()]*>)?\s*\("
    ).unwrap();
    static ref FUNC_ASSIGN: Regex = Regex::new(
        r"(?m)(?:^|[^\w$.])(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=\n]+)?=\s*(?:async\s+)?(function\b\s*\*?\s*(?:[A-Za-z_$][\w$]*)?\s*)?(?:<[^>()]*>)?\s*\("
    ).unwrap();
    static ref ARROW_BARE: Regex = Regex::new(
        r"(?m)(?:^|[^\w$.])(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?([A-Za-z_$][\w$]*)\s*=>"
    ).unwrap();
    static ref CLASS: Regex = Regex::new(
        r"(?m)(?:^|[^\w$.])(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)(?:\s*<[^>{]*>)?(?:\s+extends\s+([\w$.]+))?[^{]*\{"
    ).unwrap();
    static ref VERB_CALL: Regex = Regex::new(
        r#"\b([A-Za-z_$][\w$]*)\s*\.\s*(get|post|put|patch|delete|del|head|options|all)\s*\(\s*(?:'([^'\n]*)'|"([^"\n]*)"|`([^`\n]*)`)"#
    ).unwrap();
    static ref ROUTE_CHAIN: Regex = Regex::new(
        r#"\.route\s*\(\s*(?:'([^'\n]*)'|"([^"\n]*)")\s*\)"#
    ).unwrap();
    static ref CHAIN_LINK: Regex = Regex::new(
        r"^\s*\.\s*(get|post|put|patch|delete|head|options|all)\s*\("
    ).unwrap();
    static ref ROUTE_OBJECT: Regex = Regex::new(r"\.route\s*\(\s*\{").unwrap();
    static ref OBJ_METHOD: Regex = Regex::new(
        r#"\bmethod\s*:\s*(?:\[([^\]]*)\]|['"](\w+)['"])"#
    ).unwrap();
    static ref OBJ_URL: Regex = Regex::new(r#"\b(?:url|path)\s*:\s*['"]([^'"]+)['"]"#).unwrap();
    static ref QUOTED_WORD: Regex = Regex::new(r#"['"](\w+)['"]"#).unwrap();
    static ref NEST_CONTROLLER: Regex = Regex::new(
        r#"@Controller\s*\(\s*(?:\{[^}]*path\s*:\s*)?(?:'([^']*)'|"([^"]*)")?"#
    ).unwrap();
    static ref NEST_ROUTE: Regex = Regex::new(
        r#"@(Get|Post|Put|Patch|Delete|Head|Options|All)\s*\(\s*(?:'([^']*)'|"([^"]*)")?\s*\)"#
    ).unwrap();
    static ref NEXT_HANDLER: Regex = Regex::new(
        r"(?m)^\s*export\s+(?:async\s+)?(?:function\s+|const\s+)(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS)\b"
    ).unwrap();
    static ref ENV_DOT: Regex = Regex::new(
        r"\b(?:process\.env|import\.meta\.env)\.([A-Za-z_][A-Za-z0-9_]*)"
    ).unwrap();
    static ref ENV_INDEX: Regex = Regex::new(
        r#"\bprocess\.env\[\s*['"]([^'"]+)['"]\s*\]|\bDeno\.env\.get\(\s*['"]([^'"]+)['"]"#
    ).unwrap();
    static ref ENV_DESTRUCTURE: Regex = Regex::new(r"\{([^{}]*)\}\s*=\s*process\.env\b").unwrap();
    static ref CONFIG_GET: Regex = Regex::new(
        r#"\b[A-Za-z_$]*[cC]onfig(?:Service)?\s*\.\s*(?:get|has|getOrThrow)\s*(?:<[^>()]*>)?\s*\(\s*['"]([^'"]+)['"]"#
    ).unwrap();
    static ref CLI_OPTION: Regex = Regex::new(
        r#"\.(?:option|requiredOption|addOption)\s*\(\s*(?:new\s+Option\s*\(\s*)?['"]([^'"]+)['"]"#
    ).unwrap();
    static ref LONG_FLAG: Regex = Regex::new(r"--[A-Za-z0-9][\w-]*").unwrap();
    static ref SHORT_FLAG: Regex = Regex::new(r"(?:^|\s)(-[A-Za-z0-9])\b").unwrap();
    static ref CLI_COMMAND: Regex = Regex::new(
        r#"\.command\s*\(\s*['"]([A-Za-z][\w:-]*)"#
    ).unwrap();
    static ref MONGOOSE_MODEL: Regex = Regex::new(
        r#"\bmodel\s*(?:<[^>()]*>)?\s*\(\s*['"](\w+)['"]"#
    ).unwrap();
    static ref SEQUELIZE_DEFINE: Regex = Regex::new(r#"\.define\s*\(\s*['"](\w+)['"]"#).unwrap();
    static ref TYPEORM_ENTITY: Regex = Regex::new(
        r"@Entity\s*\([^)]*\)\s*(?:export\s+)?(?:default\s+)?class\s+(\w+)"
    ).unwrap();
    static ref EVENT_CALL: Regex = Regex::new(
        r#"\b([A-Za-z_$][\w$]*)\s*\.\s*(on|once|emit|addListener|addEventListener)\s*\(\s*(?:'([^'\n]+)'|"([^"\n]+)"|`([^`\n]+)`)"#
    ).unwrap();
    static ref WS_HANDLER: Regex = Regex::new(
        r"\b([A-Za-z_$][\w$]*)\s*\.\s*(onmessage|onopen|onclose|onerror)\s*="
    ).unwrap();
    static ref RESOLVER_MAP: Regex = Regex::new(
        r"\b(Query|Mutation|Subscription)\s*:\s*\{"
    ).unwrap();
    static ref GQL_TEMPLATE: Regex = Regex::new(r"\b(?:gql|graphql|buildSchema)\s*\(?\s*`([^`]*)`").unwrap();
    static ref COMPONENT_WRAP: Regex = Regex::new(
        r"(?m)(?:^|[^\w$.])(?:export\s+)?(?:const|let)\s+([A-Z][\w$]*)\s*(?::[^=\n]+)?=\s*(?:React\.)?(?:memo|forwardRef)\s*(?:<[^>()]*>)?\s*\("
    ).unwrap();
    static ref JSX_RETURN: Regex = Regex::new(r"return\s*\(?\s*<[A-Za-z>]").unwrap();
    static ref TEST_CALL: Regex = Regex::new(
        r#"(?m)^\s*(?:it|test|describe)(?:\.(?:only|skip|concurrent))?\s*\(\s*(?:'([^'\n]*)'|"([^"\n]*)"|`([^`\n]*)`)"#
    ).unwrap();
}

fn is_jsx_file(ctx: &ScanContext<'_>) -> bool {
    matches!(ctx.extension().as_str(), "jsx" | "tsx")
}

/// `const f = (a, b) => ...` needs an arrow after the parameter list.
fn is_arrow_after(text: &str, close: usize) -> bool {
    let rest = &text[close + 1..];
    let trimmed = rest.trim_start();
    if trimmed.starts_with("=>") {
        return true;
    }
    if trimmed.starts_with(':') {
        let window: String = trimmed.chars().take(200).collect();
        let stop = window.find(['{', ';', '\n']).unwrap_or(window.len());
        return window[..stop].contains("=>");
    }
    false
}

fn looks_like_component(name: &str, body_probe: &str, ctx: &ScanContext<'_>) -> bool {
    crate::extract::text::is_pascal_case(name) && (is_jsx_file(ctx) || JSX_RETURN.is_match(body_probe))
}

/// Text following a parameter list, for JSX heuristics.
fn body_probe<'a>(text: &'a str, open: usize) -> &'a str {
    let from = matching_close(text, open).map(|c| c + 1).unwrap_or(open);
    let mut to = (from + 2000).min(text.len());
    while !text.is_char_boundary(to) {
        to -= 1;
    }
    &text[from..to]
}

fn functions(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&FUNC_DECL) {
        let Some(name) = group(&caps, 1) else { continue };
        let open = end(&caps) - 1;
        push_function(ctx, out, FactKind::Function, name, open, start(&caps));
        if looks_like_component(name, body_probe(ctx.text, open), ctx) {
            out.push(ctx.fact(FactKind::Component, name, None, start(&caps)));
        }
    }

    for caps in ctx.captures(&FUNC_ASSIGN) {
        let Some(name) = group(&caps, 1) else { continue };
        let open = end(&caps) - 1;
        let has_function_keyword = caps.get(2).is_some();
        let Some(close) = matching_close(ctx.text, open) else { continue };
        if !has_function_keyword && !is_arrow_after(ctx.text, close) {
            continue;
        }
        push_function(ctx, out, FactKind::Function, name, open, start(&caps));
        if looks_like_component(name, body_probe(ctx.text, open), ctx) {
            out.push(ctx.fact(FactKind::Component, name, None, start(&caps)));
        }
    }

    for caps in ctx.captures(&ARROW_BARE) {
        let (Some(name), Some(param)) = (group(&caps, 1), group(&caps, 2)) else { continue };
        if param == "async" {
            continue;
        }
        out.push(ctx.fact(FactKind::Function, name, Some(param.to_string()), start(&caps)));
    }
}

fn classes(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&CLASS) {
        let Some(name) = group(&caps, 1) else { continue };
        let at = start(&caps);
        out.push(ctx.fact(FactKind::Class, name, None, at));

        match group(&caps, 2) {
            Some(base) if base.ends_with("Component") => {
                out.push(ctx.fact(FactKind::Component, name, None, at));
            }
            Some(base) if base == "Model" || base.ends_with(".Model") => {
                out.push(ctx.fact(FactKind::Model, name, None, at));
            }
            _ => {}
        }

        let open = end(&caps) - 1;
        let Some(body) = balanced_contents(ctx.text, open) else { continue };
        let body_start = open + 1;
        for item in top_level_items(body, false) {
            if !matches!(item.next, Some('(') | Some('<')) || METHOD_KEYWORDS.contains(item.ident) {
                continue;
            }
            let after = body_start + item.offset + item.ident.len();
            let Some(paren) = ctx.text[after..].find('(').map(|i| after + i) else { continue };
            if ctx.text[after..paren].contains(['{', ';', '=']) {
                continue;
            }
            push_function(ctx, out, FactKind::Function, item.ident, paren, body_start + item.offset);
        }
    }
}

fn is_router_receiver(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    ROUTER_NAMES.contains(lower.as_str()) || lower.ends_with("router") || lower.ends_with("app")
}

fn is_route_path(path: &str) -> bool {
    path.starts_with('/') || path == "*"
}

fn routes(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&VERB_CALL) {
        let (Some(receiver), Some(verb)) = (group(&caps, 1), group(&caps, 2)) else { continue };
        let Some(path) = first_group(&caps, &[3, 4, 5]) else { continue };
        if !is_router_receiver(receiver) || !is_route_path(path) {
            continue;
        }
        if let Some(method) = http_method(verb) {
            out.push(ctx.endpoint(method, path, start(&caps)));
        }
    }

    for caps in ctx.captures(&ROUTE_CHAIN) {
        let Some(path) = first_group(&caps, &[1, 2]) else { continue };
        let mut pos = end(&caps);
        while let Some(link) = CHAIN_LINK.captures(&ctx.text[pos..]) {
            let Some(method) = group(&link, 1).and_then(http_method) else { break };
            out.push(ctx.endpoint(method, path, start(&caps)));
            let open = pos + end(&link) - 1;
            match matching_close(ctx.text, open) {
                Some(close) => pos = close + 1,
                None => break,
            }
        }
    }

    for m in ROUTE_OBJECT.find_iter(ctx.text).take(1000) {
        let Some(body) = balanced_contents(ctx.text, m.end() - 1) else { continue };
        let Some(url) = OBJ_URL.captures(body).and_then(|c| group(&c, 1).map(str::to_string)) else {
            continue;
        };
        let Some(method_caps) = OBJ_METHOD.captures(body) else {
            out.push(ctx.endpoint("ANY", &url, m.start()));
            continue;
        };
        if let Some(single) = group(&method_caps, 2) {
            out.push(ctx.endpoint(single, &url, m.start()));
        } else if let Some(list) = group(&method_caps, 1) {
            for verb in QUOTED_WORD.captures_iter(list) {
                out.push(ctx.endpoint(&verb[1], &url, m.start()));
            }
        }
    }
}

fn nest_routes(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    let prefixes: Vec<(usize, String)> = ctx
        .captures(&NEST_CONTROLLER)
        .map(|c| (start(&c), first_group(&c, &[1, 2]).unwrap_or("").to_string()))
        .collect();
    if prefixes.is_empty() {
        return;
    }
    for caps in ctx.captures(&NEST_ROUTE) {
        let Some(method) = group(&caps, 1).and_then(http_method) else { continue };
        let path = first_group(&caps, &[2, 3]).unwrap_or("");
        let at = start(&caps);
        out.push(ctx.endpoint(method, &join_paths(prefix_at(&prefixes, at), path), at));
    }
}

/// Route path implied by a Next.js file location.
fn next_route_path(file: &str) -> Option<(String, bool)> {
    let normalized = file.replace('\\', "/");
    let path = Path::new(&normalized);
    let stem = path.file_stem()?.to_str()?;
    let parts: Vec<&str> = normalized.split('/').collect();

    if stem == "route" {
        let app = parts.iter().rposition(|p| *p == "app")?;
        let segments: Vec<&str> = parts[app + 1..parts.len() - 1]
            .iter()
            .copied()
            .filter(|s| !(s.starts_with('(') && s.ends_with(')')))
            .collect();
        return Some((join_paths("", &segments.join("/")), true));
    }

    let pages = parts.iter().rposition(|p| *p == "pages")?;
    if parts.get(pages + 1) != Some(&"api") {
        return None;
    }
    let mut segments: Vec<&str> = parts[pages + 1..parts.len() - 1].to_vec();
    if stem != "index" {
        segments.push(stem);
    }
    Some((join_paths("", &segments.join("/")), false))
}

fn next_routes(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    let Some((path, app_router)) = next_route_path(ctx.file) else { return };
    if app_router {
        for caps in ctx.captures(&NEXT_HANDLER) {
            if let Some(method) = group(&caps, 1) {
                out.push(ctx.endpoint(method, &path, start(&caps)));
            }
        }
    } else if ctx.text.contains("export default") {
        let at = ctx.text.find("export default").unwrap_or(0);
        out.push(ctx.endpoint("ANY", &path, at));
    }
}

fn env_vars(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&ENV_DOT) {
        if let Some(name) = group(&caps, 1) {
            out.push(ctx.fact(FactKind::EnvVar, name, None, start(&caps)));
        }
    }
    for caps in ctx.captures(&ENV_INDEX) {
        if let Some(name) = first_group(&caps, &[1, 2]) {
            out.push(ctx.fact(FactKind::EnvVar, name, None, start(&caps)));
        }
    }
    for caps in ctx.captures(&ENV_DESTRUCTURE) {
        let Some(list) = group(&caps, 1) else { continue };
        for entry in list.split(',') {
            let name = entry.split([':', '=']).next().unwrap_or("").trim();
            if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                out.push(ctx.fact(FactKind::EnvVar, name, None, start(&caps)));
            }
        }
    }
}

fn config_keys(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&CONFIG_GET) {
        if let Some(key) = group(&caps, 1) {
            out.push(ctx.fact(FactKind::ConfigKey, key, None, start(&caps)));
        }
    }
}

/// Canonical flag from a commander/yargs option spec such as `-d, --dry-run <v>`.
pub(crate) fn flag_from_spec(spec: &str) -> Option<String> {
    if let Some(long) = LONG_FLAG.find(spec) {
        return Some(long.as_str().to_string());
    }
    if let Some(caps) = SHORT_FLAG.captures(spec) {
        return group(&caps, 1).map(str::to_string);
    }
    let word = spec.split_whitespace().next()?;
    word.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        .then(|| format!("--{}", word))
}

fn cli(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&CLI_OPTION) {
        if let Some(flag) = group(&caps, 1).and_then(flag_from_spec) {
            out.push(ctx.fact(FactKind::CliFlag, flag, None, start(&caps)));
        }
    }
    for caps in ctx.captures(&CLI_COMMAND) {
        if let Some(name) = group(&caps, 1) {
            out.push(ctx.fact(FactKind::CliCommand, name, None, start(&caps)));
        }
    }
}

fn models(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for re in [&*MONGOOSE_MODEL, &*SEQUELIZE_DEFINE, &*TYPEORM_ENTITY] {
        for caps in ctx.captures(re) {
            if let Some(name) = group(&caps, 1) {
                out.push(ctx.fact(FactKind::Model, name, None, start(&caps)));
            }
        }
    }
}

fn is_socket_receiver(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("socket") || matches!(lower.as_str(), "ws" | "wss" | "io" | "conn")
}

fn events(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&EVENT_CALL) {
        let (Some(receiver), Some(method)) = (group(&caps, 1), group(&caps, 2)) else { continue };
        let Some(event) = first_group(&caps, &[3, 4, 5]) else { continue };
        if is_socket_receiver(receiver) {
            let name = normalize_ws_event(event);
            out.push(ctx.fact(FactKind::WebsocketEvent, name, None, start(&caps)));
        } else if method != "addEventListener" && !is_router_receiver(receiver) {
            out.push(ctx.fact(FactKind::Event, event, None, start(&caps)));
        }
    }
    for caps in ctx.captures(&WS_HANDLER) {
        if let Some(handler) = group(&caps, 2) {
            let name = normalize_ws_event(handler);
            out.push(ctx.fact(FactKind::WebsocketEvent, name, None, start(&caps)));
        }
    }
}

fn graphql(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&RESOLVER_MAP) {
        let Some(operation) = group(&caps, 1).and_then(normalize_operation_type) else { continue };
        let open = end(&caps) - 1;
        let Some(body) = balanced_contents(ctx.text, open) else { continue };
        for item in top_level_items(body, false) {
            if matches!(item.next, Some(':' | '(' | ',') | None) {
                let name = format!("{}.{}", operation, item.ident);
                out.push(ctx.fact(FactKind::GraphqlOperation, name, None, open + 1 + item.offset));
            }
        }
    }

    for caps in ctx.captures(&GQL_TEMPLATE) {
        let Some(body) = caps.get(1) else { continue };
        let base = body.start();
        let fields = schema_fields(body.as_str())
            .into_iter()
            .chain(operation_fields(body.as_str()));
        for field in fields {
            out.push(ctx.fact(FactKind::GraphqlOperation, field.name(), None, base + field.offset));
        }
    }
}

fn components(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&COMPONENT_WRAP) {
        if let Some(name) = group(&caps, 1) {
            out.push(ctx.fact(FactKind::Component, name, None, start(&caps)));
        }
    }
    if matches!(ctx.extension().as_str(), "vue" | "svelte") {
        if let Some(stem) = Path::new(ctx.file).file_stem().and_then(|s| s.to_str()) {
            out.push(ctx.fact(FactKind::Component, stem, None, 0));
        }
    }
}

fn tests_rule(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&TEST_CALL) {
        if let Some(name) = first_group(&caps, &[1, 2, 3]) {
            let at = skip_blank(ctx.text, start(&caps));
            out.push(ctx.fact(FactKind::Test, name, None, at));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::extract::extract_facts;
    use crate::facts::{Fact, FactKind, KindSet};

    fn facts_of(src: &str, path: &str, kind: FactKind) -> Vec<Fact> {
        extract_facts(src, path, [kind].into_iter().collect::<KindSet>())
    }

    fn names(src: &str, path: &str, kind: FactKind) -> Vec<String> {
        let mut names: Vec<String> = facts_of(src, path, kind).into_iter().map(|f| f.name).collect();
        names.sort();
        names
    }

    #[test]
    fn test_function_forms() {
        let src = r#"
export async function createUser(email: string, password: string): Promise<User> {}
const deleteUser = async (id) => { return id; };
const total = (a + b) * c;
let square = x => x * x;
const legacy = function (a, b) {};
"#;
        let facts = facts_of(src, "users.ts", FactKind::Function);
        let create = facts.iter().find(|f| f.name == "createUser").unwrap();
        assert_eq!(create.signature.as_deref(), Some("email: string, password: string"));
        assert_eq!(create.line, 2);
        assert_eq!(
            names(src, "users.ts", FactKind::Function),
            vec!["createUser", "deleteUser", "legacy", "square"]
        );
    }

    #[test]
    fn test_declaration_lines_at_column_zero() {
        let src = "// header\nfunction createUser(email) {}\nconst x = 1;\nexport const deleteUser = (id) => id;\nclass Repo {}\n";
        let functions = facts_of(src, "users.ts", FactKind::Function);
        let line_of = |name: &str| functions.iter().find(|f| f.name == name).map(|f| f.line);
        assert_eq!(line_of("createUser"), Some(2));
        assert_eq!(line_of("deleteUser"), Some(4));
        let classes = facts_of(src, "users.ts", FactKind::Class);
        assert_eq!(classes[0].line, 5);
    }

    #[test]
    fn test_class_methods_and_components() {
        let src = r#"
export class UserService {
  constructor(private repo: Repo) {}
  async findById(id: string) { if (x) { return 1; } }
  static create(data) {}
}
class Panel extends React.Component {}
"#;
        assert_eq!(
            names(src, "svc.ts", FactKind::Function),
            vec!["create", "findById"]
        );
        assert_eq!(names(src, "svc.ts", FactKind::Class), vec!["Panel", "UserService"]);
        assert_eq!(names(src, "svc.ts", FactKind::Component), vec!["Panel"]);
    }

    #[test]
    fn test_express_and_chain_routes() {
        let src = r#"
app.get('/users/:id', getUser);
userRouter.post("/users", createUser);
axios.get('/users');
router.route('/items').get(list).put(update);
app.del('/items/:id', remove);
"#;
        assert_eq!(
            names(src, "server.js", FactKind::Endpoint),
            vec![
                "DELETE /items/:id",
                "GET /items",
                "GET /users/:id",
                "POST /users",
                "PUT /items",
            ]
        );
    }

    #[test]
    fn test_fastify_route_object() {
        let src = "fastify.route({ method: ['GET', 'HEAD'], url: '/health', handler });\n";
        assert_eq!(
            names(src, "app.js", FactKind::Endpoint),
            vec!["GET /health", "HEAD /health"]
        );
    }

    #[test]
    fn test_nest_controller_prefix() {
        let src = r#"
@Controller('users')
export class UsersController {
  @Get(':id')
  findOne() {}
  @Post()
  create() {}
}
"#;
        assert_eq!(
            names(src, "users.controller.ts", FactKind::Endpoint),
            vec!["GET /users/:id", "POST /users"]
        );
    }

    #[test]
    fn test_next_app_router() {
        let src = "export async function GET(req) {}\nexport function POST(req) {}\n";
        assert_eq!(
            names(src, "web/app/(shop)/orders/[id]/route.ts", FactKind::Endpoint),
            vec!["GET /orders/[id]", "POST /orders/[id]"]
        );
        let api = "export default function handler(req, res) {}\n";
        assert_eq!(
            names(api, "pages/api/users/index.ts", FactKind::Endpoint),
            vec!["ANY /api/users"]
        );
    }

    #[test]
    fn test_env_config_and_cli() {
        let src = r#"
const url = process.env.DATABASE_URL;
const key = process.env['API_KEY'];
const { PORT, HOST: host = 'x' } = process.env;
const mode = import.meta.env.VITE_MODE;
const ttl = config.get('cache.ttl');
program.option('-d, --dry-run', 'no writes').option('-v');
program.command('deploy <env>');
"#;
        assert_eq!(
            names(src, "cli.ts", FactKind::EnvVar),
            vec!["API_KEY", "DATABASE_URL", "HOST", "PORT", "VITE_MODE"]
        );
        assert_eq!(names(src, "cli.ts", FactKind::ConfigKey), vec!["cache.ttl"]);
        assert_eq!(names(src, "cli.ts", FactKind::CliFlag), vec!["--dry-run", "-v"]);
        assert_eq!(names(src, "cli.ts", FactKind::CliCommand), vec!["deploy"]);
    }

    #[test]
    fn test_events_and_websockets() {
        let src = r#"
socket.on('chat message', handle);
ws.onmessage = (e) => {};
io.on('connection', onConnect);
emitter.emit('user.created', user);
button.addEventListener('click', go);
"#;
        assert_eq!(
            names(src, "rt.js", FactKind::WebsocketEvent),
            vec!["chat message", "connect", "message"]
        );
        assert_eq!(names(src, "rt.js", FactKind::Event), vec!["user.created"]);
    }

    #[test]
    fn test_graphql_resolvers_and_templates() {
        let src = r#"
const typeDefs = gql`
  type Query { user(id: ID!): User }
`;
const resolvers = {
  Query: {
    user: (_, { id }) => find(id),
    users() { return all(); },
  },
  Mutation: { createUser },
};
"#;
        assert_eq!(
            names(src, "schema.js", FactKind::GraphqlOperation),
            vec!["Mutation.createUser", "Query.user", "Query.users"]
        );
    }

    #[test]
    fn test_models_components_and_tests() {
        let src = r#"
const User = mongoose.model('User', schema);
@Entity()
export class Order {}
export const Card = React.memo((props) => <div/>);
function Header() { return <h1>hi</h1>; }
describe('users', () => { it('creates a user', () => {}); });
"#;
        assert_eq!(names(src, "m.tsx", FactKind::Model), vec!["Order", "User"]);
        assert_eq!(names(src, "m.tsx", FactKind::Component), vec!["Card", "Header"]);
        assert_eq!(names(src, "m.tsx", FactKind::Test), vec!["users"]);
    }
}
