//! Rust: fns, types, actix/rocket/axum/warp routes, env lookups, clap CLIs,
//! serde/diesel models and async-graphql roots.

use lazy_static::lazy_static;
use regex::Regex;

use super::{http_method, join_paths, push_function, to_camel_case};
use crate::extract::graphql::normalize_operation_type;
use crate::extract::registry::Language;
use crate::extract::text::{balanced_contents, to_kebab_case, top_level_items};
use crate::extract::{end, first_group, group, start, ExtractionRule, ScanContext};
use crate::facts::{Fact, FactKind};

pub const LANGUAGE: Language = Language {
    tag: "rust",
    extensions: &["rs"],
    rules: RULES,
};

static RULES: &[ExtractionRule] = &[
    ExtractionRule { name: "rs-fns", kinds: &[FactKind::Function, FactKind::Test], run: functions },
    ExtractionRule { name: "rs-types", kinds: &[FactKind::Class, FactKind::Model], run: types },
    ExtractionRule { name: "rs-routes", kinds: &[FactKind::Endpoint], run: routes },
    ExtractionRule { name: "rs-env", kinds: &[FactKind::EnvVar], run: env_vars },
    ExtractionRule { name: "rs-config", kinds: &[FactKind::ConfigKey], run: config_keys },
    ExtractionRule { name: "rs-clap", kinds: &[FactKind::CliFlag, FactKind::CliCommand], run: cli },
    ExtractionRule { name: "rs-graphql", kinds: &[FactKind::GraphqlOperation], run: graphql },
];

lazy_static! {
    static ref FN: Regex = Regex::new(
        r#"(?m)^[ \t]*(?:pub(?:\([^)]*\))?[ \t]+)?(?:default[ \t]+)?(?:const[ \t]+)?(?:async[ \t]+)?(?:unsafe[ \t]+)?(?:extern[ \t]+"[^"]*"[ \t]+)?fn[ \t]+([A-Za-z_]\w*)"#
    ).unwrap();
    static ref TYPE_DECL: Regex = Regex::new(
        r"(?m)^[ \t]*(?:pub(?:\([^)]*\))?[ \t]+)?(struct|enum|trait|union)[ \t]+([A-Za-z_]\w*)"
    ).unwrap();
    static ref DIESEL_TABLE: Regex = Regex::new(r"\btable!\s*\{\s*(?:[\w:]+\s*\.\s*)?(\w+)\s*\(").unwrap();
    static ref ROUTE_ATTR: Regex = Regex::new(
        r#"#\[(?:[\w:]+::)?(get|post|put|patch|delete|head|options)\s*\(\s*"([^"]+)""#
    ).unwrap();
    static ref ROUTE_MACRO: Regex = Regex::new(
        r#"#\[(?:[\w:]+::)?route\s*\(\s*"([^"]+)"([^\]]*)\]"#
    ).unwrap();
    static ref METHOD_ARG: Regex = Regex::new(r#"method\s*=\s*"(\w+)""#).unwrap();
    static ref DOT_ROUTE: Regex = Regex::new(r#"\.route\(\s*"([^"]+)"\s*,"#).unwrap();
    static ref HANDLER_VERB: Regex = Regex::new(
        r"(?:^|[\s.,(:])(get|post|put|patch|delete|head|options|any)(?:_service)?\s*\("
    ).unwrap();
    static ref ACTIX_RESOURCE: Regex = Regex::new(r#"web::resource\(\s*"([^"]+)"\s*\)"#).unwrap();
    static ref ACTIX_METHOD: Regex = Regex::new(r"web::(get|post|put|patch|delete|head)\(\)").unwrap();
    static ref WARP_PATH: Regex = Regex::new(r"warp::path!\(([^)]*)\)").unwrap();
    static ref ENV: Regex = Regex::new(
        r#"\b(?:env::var(?:_os)?\(|env!\(|option_env!\()\s*"([^"]+)""#
    ).unwrap();
    static ref CLAP_ENV: Regex = Regex::new(r#"#\[(?:arg|clap)\([^\]]*\benv\s*=\s*"([^"]+)""#).unwrap();
    static ref CONFIG_GET: Regex = Regex::new(
        r#"\b\w*(?:config|settings|cfg)\w*\s*\.\s*get(?:_string|_int|_bool|_float|_table|_array)?(?:::<[^>]*>)?\(\s*"([^"]+)""#
    ).unwrap();
    static ref CLAP_FIELD: Regex = Regex::new(
        r"#\[(?:arg|clap)\(([^\]]*)\)\]\s*(?:(?:///[^\n]*|#\[[^\]]*\])\s*)*(?:pub(?:\([^)]*\))?\s+)?([a-z_]\w*)\s*:"
    ).unwrap();
    static ref LONG_NAME: Regex = Regex::new(r#"\blong\s*=\s*"([^"]+)""#).unwrap();
    static ref LONG_FLAG: Regex = Regex::new(r"\blong\b").unwrap();
    static ref BUILDER_LONG: Regex = Regex::new(r#"\.long\(\s*"([^"]+)"\s*\)"#).unwrap();
    static ref SUBCOMMAND_ENUM: Regex = Regex::new(
        r"derive\([^)]*\bSubcommand\b[^)]*\)\]\s*(?:#\[[^\]]*\]\s*)*(?:pub(?:\([^)]*\))?\s+)?enum\s+\w+\s*\{"
    ).unwrap();
    static ref BUILDER_SUBCOMMAND: Regex = Regex::new(r#"\bCommand::new\(\s*"([^"]+)"\s*\)"#).unwrap();
    static ref GRAPHQL_IMPL: Regex = Regex::new(
        r"#\[(?:async_graphql::)?(?:Object|Subscription)[^\]]*\]\s*impl(?:<[^>]*>)?\s+(\w+)[^{]*\{"
    ).unwrap();
    static ref IMPL_FN: Regex = Regex::new(
        r"(?m)^[ \t]*(?:pub(?:\([^)]*\))?[ \t]+)?(?:async[ \t]+)?fn[ \t]+([A-Za-z_]\w*)"
    ).unwrap();
}

/// Attribute lines directly above byte `offset`.
fn attributes_above(text: &str, offset: usize) -> Vec<&str> {
    let line_start = text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    text[..line_start]
        .lines()
        .rev()
        .map(str::trim)
        .take_while(|l| l.starts_with("#[") || l.starts_with("///") || l.is_empty())
        .filter(|l| l.starts_with("#["))
        .collect()
}

/// Index of the `(` opening a parameter list, skipping generic parameters.
fn params_open(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(from) {
        match b {
            b'<' => depth += 1,
            b'>' if depth > 0 && bytes.get(i.wrapping_sub(1)) != Some(&b'-') => depth -= 1,
            b'(' if depth == 0 => return Some(i),
            b'{' | b';' if depth == 0 => return None,
            _ => {}
        }
        if i - from > 2000 {
            return None;
        }
    }
    None
}

fn functions(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&FN) {
        let Some(name) = group(&caps, 1) else { continue };
        let at = start(&caps);
        let attrs = attributes_above(ctx.text, at);
        if attrs.iter().any(|a| a.contains("test]") || a.contains("test(")) {
            out.push(ctx.fact(FactKind::Test, name, None, at));
            continue;
        }
        if let Some(open) = params_open(ctx.text, end(&caps)) {
            push_function(ctx, out, FactKind::Function, name, open, at);
        }
    }
}

fn types(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&TYPE_DECL) {
        let (Some(shape), Some(name)) = (group(&caps, 1), group(&caps, 2)) else { continue };
        let at = start(&caps);
        out.push(ctx.fact(FactKind::Class, name, None, at));

        if shape == "struct" {
            let attrs = attributes_above(ctx.text, at);
            let is_model = attrs.iter().any(|a| {
                a.contains("Serialize")
                    || a.contains("Deserialize")
                    || a.contains("Queryable")
                    || a.contains("Insertable")
                    || a.contains("FromRow")
                    || a.contains("table_name")
            });
            if is_model {
                out.push(ctx.fact(FactKind::Model, name, None, at));
            }
        }
    }
    for caps in ctx.captures(&DIESEL_TABLE) {
        if let Some(table) = group(&caps, 1) {
            out.push(ctx.fact(FactKind::Model, table, None, start(&caps)));
        }
    }
}

fn routes(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&ROUTE_ATTR) {
        let (Some(verb), Some(path)) = (group(&caps, 1), group(&caps, 2)) else { continue };
        if let Some(method) = http_method(verb) {
            out.push(ctx.endpoint(method, path, start(&caps)));
        }
    }

    for caps in ctx.captures(&ROUTE_MACRO) {
        let Some(path) = group(&caps, 1) else { continue };
        let args = group(&caps, 2).unwrap_or("");
        let mut any = false;
        for m in METHOD_ARG.captures_iter(args) {
            out.push(ctx.endpoint(&m[1], path, start(&caps)));
            any = true;
        }
        if !any {
            out.push(ctx.endpoint("ANY", path, start(&caps)));
        }
    }

    for caps in ctx.captures(&DOT_ROUTE) {
        let Some(path) = group(&caps, 1) else { continue };
        let open = caps.get(0).and_then(|m| m.as_str().find('(').map(|i| m.start() + i));
        let Some(args) = open.and_then(|o| balanced_contents(ctx.text, o)) else { continue };
        for verb in HANDLER_VERB.captures_iter(args) {
            if let Some(method) = http_method(&verb[1]) {
                out.push(ctx.endpoint(method, path, start(&caps)));
            }
        }
    }

    for caps in ctx.captures(&ACTIX_RESOURCE) {
        let Some(path) = group(&caps, 1) else { continue };
        let rest = &ctx.text[end(&caps)..];
        let chain = &rest[..rest.find(';').unwrap_or(rest.len())];
        for m in ACTIX_METHOD.captures_iter(chain) {
            if let Some(method) = http_method(&m[1]) {
                out.push(ctx.endpoint(method, path, start(&caps)));
            }
        }
    }

    for caps in ctx.captures(&WARP_PATH) {
        let Some(spec) = group(&caps, 1) else { continue };
        let segments: Vec<String> = spec
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "..")
            .map(|s| match s.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
                Some(literal) => literal.to_string(),
                None => "{}".to_string(),
            })
            .collect();
        out.push(ctx.endpoint("ANY", &join_paths("", &segments.join("/")), start(&caps)));
    }
}

fn env_vars(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for re in [&*ENV, &*CLAP_ENV] {
        for caps in ctx.captures(re) {
            if let Some(name) = group(&caps, 1) {
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

fn cli(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&CLAP_FIELD) {
        let (Some(args), Some(field)) = (group(&caps, 1), group(&caps, 2)) else { continue };
        let flag = match LONG_NAME.captures(args) {
            Some(named) => format!("--{}", &named[1]),
            None if LONG_FLAG.is_match(args) => format!("--{}", to_kebab_case(field)),
            None => continue,
        };
        out.push(ctx.fact(FactKind::CliFlag, flag, None, start(&caps)));
    }
    for caps in ctx.captures(&BUILDER_LONG) {
        if let Some(name) = group(&caps, 1) {
            out.push(ctx.fact(FactKind::CliFlag, format!("--{}", name), None, start(&caps)));
        }
    }

    for caps in ctx.captures(&SUBCOMMAND_ENUM) {
        let open = end(&caps) - 1;
        let Some(body) = balanced_contents(ctx.text, open) else { continue };
        for item in top_level_items(body, false) {
            if item.ident.starts_with(|c: char| c.is_ascii_uppercase()) {
                let name = to_kebab_case(item.ident);
                out.push(ctx.fact(FactKind::CliCommand, name, None, open + 1 + item.offset));
            }
        }
    }
    for caps in ctx.captures(&BUILDER_SUBCOMMAND) {
        if let Some(name) = group(&caps, 1) {
            out.push(ctx.fact(FactKind::CliCommand, name, None, start(&caps)));
        }
    }
}

/// Operation type implied by an async-graphql root type name.
fn root_operation(type_name: &str) -> Option<&'static str> {
    ["Subscription", "Mutation", "Query"]
        .into_iter()
        .find(|op| type_name.contains(op))
        .and_then(normalize_operation_type)
}

fn graphql(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&GRAPHQL_IMPL) {
        let Some(operation) = group(&caps, 1).and_then(root_operation) else { continue };
        let open = end(&caps) - 1;
        let Some(body) = balanced_contents(ctx.text, open) else { continue };
        for m in ctx.captures_in(&IMPL_FN, body) {
            let Some(field) = first_group(&m, &[1]) else { continue };
            let name = format!("{}.{}", operation, to_camel_case(field));
            out.push(ctx.fact(FactKind::GraphqlOperation, name, None, open + 1 + start(&m)));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::extract::extract_facts;
    use crate::facts::{Fact, FactKind, KindSet};

    fn facts_of(src: &str, kind: FactKind) -> Vec<Fact> {
        extract_facts(src, "lib.rs", [kind].into_iter().collect::<KindSet>())
    }

    fn names(src: &str, kind: FactKind) -> Vec<String> {
        let mut names: Vec<String> = facts_of(src, kind).into_iter().map(|f| f.name).collect();
        names.sort();
        names
    }

    #[test]
    fn test_fns_with_generics_and_tests() {
        let src = r#"
pub async fn create_user<T: Into<String>>(email: T, pool: &PgPool) -> Result<User> {
}

impl Repo {
    pub fn find(&self, id: u64) -> Option<User> { None }
}

#[test]
fn test_create() {}
"#;
        let facts = facts_of(src, FactKind::Function);
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].name, "create_user");
        assert_eq!(facts[0].signature.as_deref(), Some("email: T, pool: &PgPool"));
        assert_eq!(facts[1].signature.as_deref(), Some("&self, id: u64"));
        assert_eq!(names(src, FactKind::Test), vec!["test_create"]);
    }

    #[test]
    fn test_types_and_models() {
        let src = r#"
#[derive(Debug, Serialize)]
pub struct User { id: i64 }

pub enum Role { Admin }

table! {
    orders (id) {
        id -> Int4,
    }
}
"#;
        assert_eq!(names(src, FactKind::Class), vec!["Role", "User"]);
        assert_eq!(names(src, FactKind::Model), vec!["User", "orders"]);
    }

    #[test]
    fn test_routes() {
        let src = r#"
#[get("/users/{id}")]
async fn get_user() {}

#[route("/items", method = "GET", method = "HEAD")]
async fn items() {}

let app = Router::new()
    .route("/orders", get(list_orders).post(create_order))
    .route("/health", any(health));

web::resource("/login").route(web::post().to(login));

let hello = warp::path!("hello" / String);
"#;
        assert_eq!(
            names(src, FactKind::Endpoint),
            vec![
                "ANY /health",
                "ANY /hello/{}",
                "GET /items",
                "GET /orders",
                "GET /users/{id}",
                "HEAD /items",
                "POST /login",
                "POST /orders",
            ]
        );
    }

    #[test]
    fn test_env_and_clap() {
        let src = r#"
let url = std::env::var("DATABASE_URL")?;
const V: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
struct Args {
    /// Skip writes
    #[arg(long)]
    dry_run: bool,
    #[arg(short, long = "out-dir", env = "OUT_DIR")]
    output: PathBuf,
    #[arg(short)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Serve { port: u16 },
    RunMigrations,
}
"#;
        assert_eq!(
            names(src, FactKind::EnvVar),
            vec!["CARGO_PKG_VERSION", "DATABASE_URL", "OUT_DIR"]
        );
        assert_eq!(names(src, FactKind::CliFlag), vec!["--dry-run", "--out-dir"]);
        assert_eq!(names(src, FactKind::CliCommand), vec!["run-migrations", "serve"]);
    }

    #[test]
    fn test_async_graphql_roots() {
        let src = r#"
#[Object]
impl QueryRoot {
    async fn user_by_id(&self, id: ID) -> User { todo!() }
    async fn users(&self) -> Vec<User> { vec![] }
}
"#;
        assert_eq!(
            names(src, FactKind::GraphqlOperation),
            vec!["Query.userById", "Query.users"]
        );
    }
}
