//! Python: functions, classes, Flask/FastAPI/Django/aiohttp routes, env
//! lookups, argparse/click CLIs, ORM models, Socket.IO handlers and
//! Graphene/Strawberry schemas.

use lazy_static::lazy_static;
use regex::Regex;

use super::{http_method, join_paths, push_function, to_camel_case};
use crate::extract::graphql::normalize_operation_type;
use crate::extract::registry::Language;
use crate::extract::text::{balanced_contents, indented_block};
use crate::extract::{end, first_group, group, start, ExtractionRule, ScanContext};
use crate::facts::{Fact, FactKind};
use crate::matcher::names::normalize_ws_event;

pub const LANGUAGE: Language = Language {
    tag: "python",
    extensions: &["py", "pyi"],
    rules: RULES,
};

static RULES: &[ExtractionRule] = &[
    ExtractionRule { name: "py-functions", kinds: &[FactKind::Function, FactKind::Test], run: functions },
    ExtractionRule { name: "py-classes", kinds: &[FactKind::Class, FactKind::Model], run: classes },
    ExtractionRule { name: "py-routes", kinds: &[FactKind::Endpoint], run: routes },
    ExtractionRule { name: "py-django-urls", kinds: &[FactKind::Endpoint], run: django_urls },
    ExtractionRule { name: "py-env", kinds: &[FactKind::EnvVar], run: env_vars },
    ExtractionRule { name: "py-config", kinds: &[FactKind::ConfigKey], run: config_keys },
    ExtractionRule { name: "py-cli", kinds: &[FactKind::CliFlag, FactKind::CliCommand], run: cli },
    ExtractionRule { name: "py-sockets", kinds: &[FactKind::WebsocketEvent, FactKind::Event], run: sockets },
    ExtractionRule { name: "py-graphql", kinds: &[FactKind::GraphqlOperation], run: graphql },
];

lazy_static! {
    static ref DEF: Regex = Regex::new(r"(?m)^[ \t]*(?:async[ \t]+)?def[ \t]+([A-Za-z_]\w*)[ \t]*\(").unwrap();
    static ref CLASS: Regex = Regex::new(r"(?m)^[ \t]*class[ \t]+([A-Za-z_]\w*)[ \t]*(?:\(([^)]*)\))?[ \t]*:").unwrap();
    static ref ROUTE_DECORATOR: Regex = Regex::new(
        r#"(?m)^[ \t]*@([A-Za-z_][\w.]*)\.(route|get|post|put|patch|delete|head|options|api_route|websocket)\(\s*(?:'([^']*)'|"([^"]*)")"#
    ).unwrap();
    static ref ROUTER_PREFIX: Regex = Regex::new(
        r#"(?m)^[ \t]*(\w+)\s*=\s*(?:APIRouter|Blueprint)\s*\(([^)]*)\)"#
    ).unwrap();
    static ref PREFIX_ARG: Regex = Regex::new(r#"\b(?:prefix|url_prefix)\s*=\s*['"]([^'"]*)['"]"#).unwrap();
    static ref METHODS_ARG: Regex = Regex::new(r"\bmethods\s*=\s*[\[(]([^\])]*)[\])]").unwrap();
    static ref QUOTED: Regex = Regex::new(r#"['"]([^'"]+)['"]"#).unwrap();
    static ref AIOHTTP_ROUTE: Regex = Regex::new(
        r#"\.add_(get|post|put|patch|delete|head|route)\(\s*(?:(?:'(\w+)'|"(\w+)")\s*,\s*)?(?:'([^']*)'|"([^"]*)")"#
    ).unwrap();
    static ref DJANGO_PATH: Regex = Regex::new(
        r#"\b(?:path|re_path|url)\(\s*r?(?:'([^']*)'|"([^"]*)")"#
    ).unwrap();
    static ref ENV: Regex = Regex::new(
        r#"\bos\.(?:environ\s*\[\s*|environ\.get\(\s*|getenv\(\s*|environ\.setdefault\(\s*)(?:'([^']+)'|"([^"]+)")"#
    ).unwrap();
    static ref SETTINGS_ATTR: Regex = Regex::new(r"\bsettings\.([A-Z][A-Z0-9_]+)\b").unwrap();
    static ref CONFIG_INDEX: Regex = Regex::new(
        r#"\b(?:config|app\.config|current_app\.config)\s*(?:\[\s*|\.get\(\s*)(?:'([^']+)'|"([^"]+)")"#
    ).unwrap();
    static ref ADD_ARGUMENT: Regex = Regex::new(r"\.add_argument\(([^)]*)\)").unwrap();
    static ref CLICK_OPTION: Regex = Regex::new(r"@(?:click|typer)\.option\(([^)]*)\)").unwrap();
    static ref LONG_FLAG: Regex = Regex::new(r#"['"](--[\w-]+)['"]"#).unwrap();
    static ref SHORT_FLAG: Regex = Regex::new(r#"['"](-\w)['"]"#).unwrap();
    static ref CLICK_COMMAND: Regex = Regex::new(
        r#"(?m)^[ \t]*@\w+\.(?:command|group)\((?:\s*(?:name\s*=\s*)?(?:'([^']+)'|"([^"]+)"))?[^)]*\)\s*\n(?:[ \t]*@.*\n)*[ \t]*(?:async\s+)?def\s+(\w+)"#
    ).unwrap();
    static ref ADD_PARSER: Regex = Regex::new(r#"\.add_parser\(\s*(?:'([^']+)'|"([^"]+)")"#).unwrap();
    static ref SOCKET_ON: Regex = Regex::new(
        r#"(?m)^[ \t]*@(\w+)\.on\(\s*(?:'([^']+)'|"([^"]+)")"#
    ).unwrap();
    static ref SOCKET_EVENT: Regex = Regex::new(
        r"(?m)^[ \t]*@(\w+)\.event\b[^\n]*\n(?:[ \t]*@.*\n)*[ \t]*(?:async\s+)?def\s+(\w+)"
    ).unwrap();
    static ref SIGNAL: Regex = Regex::new(r#"\bsignal\(\s*(?:'([^']+)'|"([^"]+)")"#).unwrap();
    static ref GQL_CLASS: Regex = Regex::new(
        r"(?m)^[ \t]*class[ \t]+(Query|Mutation|Subscription)\b[^:\n]*:"
    ).unwrap();
    static ref GQL_MEMBER: Regex = Regex::new(
        r"(?m)^([ \t]+)(?:(?:async[ \t]+)?def[ \t]+([A-Za-z_]\w*)|([A-Za-z_]\w*)[ \t]*(?::[^=\n]+)?=|([A-Za-z_]\w*)[ \t]*:)"
    ).unwrap();
}

fn is_test_name(name: &str) -> bool {
    name.starts_with("test_") || name == "test"
}

fn functions(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&DEF) {
        let Some(name) = group(&caps, 1) else { continue };
        let at = start(&caps);
        if is_test_name(name) {
            out.push(ctx.fact(FactKind::Test, name, None, at));
            continue;
        }
        push_function(ctx, out, FactKind::Function, name, end(&caps) - 1, at);
    }
}

/// Base classes that mark an ORM or validation model.
fn is_model_base(bases: &str) -> bool {
    bases.split(',').map(str::trim).any(|base| {
        matches!(
            base,
            "models.Model" | "Model" | "db.Model" | "Base" | "DeclarativeBase" | "BaseModel"
                | "SQLModel" | "Document"
        ) || base.ends_with(".Model")
    })
}

fn classes(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&CLASS) {
        let Some(name) = group(&caps, 1) else { continue };
        let at = start(&caps);
        out.push(ctx.fact(FactKind::Class, name, None, at));
        if group(&caps, 2).map(is_model_base).unwrap_or(false) {
            out.push(ctx.fact(FactKind::Model, name, None, at));
        }
    }
}

fn routes(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    let prefixes: Vec<(String, String)> = ctx
        .captures(&ROUTER_PREFIX)
        .filter_map(|c| {
            let var = group(&c, 1)?.to_string();
            let args = group(&c, 2)?;
            let prefix = PREFIX_ARG.captures(args).and_then(|p| group(&p, 1).map(str::to_string))?;
            Some((var, prefix))
        })
        .collect();

    for caps in ctx.captures(&ROUTE_DECORATOR) {
        let (Some(receiver), Some(verb)) = (group(&caps, 1), group(&caps, 2)) else { continue };
        let Some(path) = first_group(&caps, &[3, 4]) else { continue };
        let prefix = prefixes
            .iter()
            .find(|(var, _)| var == receiver)
            .map(|(_, p)| p.as_str())
            .unwrap_or("");
        let full = join_paths(prefix, path);
        let at = start(&caps);

        match verb {
            "websocket" => out.push(ctx.endpoint("WS", &full, at)),
            "route" | "api_route" => {
                let paren = caps.get(2).map(|m| m.end()).unwrap_or(0);
                let args = balanced_contents(ctx.text, paren).unwrap_or("");
                let methods: Vec<String> = METHODS_ARG
                    .captures(args)
                    .map(|m| {
                        QUOTED
                            .captures_iter(&m[1])
                            .map(|q| q[1].to_uppercase())
                            .collect()
                    })
                    .unwrap_or_default();
                if methods.is_empty() {
                    out.push(ctx.endpoint("GET", &full, at));
                }
                for method in methods {
                    out.push(ctx.endpoint(&method, &full, at));
                }
            }
            other => {
                if let Some(method) = http_method(other) {
                    out.push(ctx.endpoint(method, &full, at));
                }
            }
        }
    }

    for caps in ctx.captures(&AIOHTTP_ROUTE) {
        let Some(verb) = group(&caps, 1) else { continue };
        let Some(path) = first_group(&caps, &[4, 5]) else { continue };
        let method = match first_group(&caps, &[2, 3]) {
            Some(explicit) if explicit != "*" => explicit.to_uppercase(),
            _ => http_method(verb).unwrap_or("ANY").to_string(),
        };
        out.push(ctx.endpoint(&method, path, start(&caps)));
    }
}

fn django_urls(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    if !ctx.text.contains("urlpatterns") {
        return;
    }
    for caps in ctx.captures(&DJANGO_PATH) {
        let Some(raw) = first_group(&caps, &[1, 2]) else { continue };
        let path = raw.trim_start_matches('^').trim_end_matches('$');
        out.push(ctx.endpoint("ANY", &join_paths("", path), start(&caps)));
    }
}

fn env_vars(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&ENV) {
        if let Some(name) = first_group(&caps, &[1, 2]) {
            out.push(ctx.fact(FactKind::EnvVar, name, None, start(&caps)));
        }
    }
}

fn config_keys(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&SETTINGS_ATTR) {
        if let Some(name) = group(&caps, 1) {
            out.push(ctx.fact(FactKind::ConfigKey, name, None, start(&caps)));
        }
    }
    for caps in ctx.captures(&CONFIG_INDEX) {
        if let Some(name) = first_group(&caps, &[1, 2]) {
            out.push(ctx.fact(FactKind::ConfigKey, name, None, start(&caps)));
        }
    }
}

/// Preferred flag among the quoted option names of one declaration.
fn flag_in(args: &str) -> Option<String> {
    LONG_FLAG
        .captures(args)
        .or_else(|| SHORT_FLAG.captures(args))
        .and_then(|c| group(&c, 1).map(str::to_string))
}

fn cli(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for re in [&*ADD_ARGUMENT, &*CLICK_OPTION] {
        for caps in ctx.captures(re) {
            if let Some(flag) = group(&caps, 1).and_then(flag_in) {
                out.push(ctx.fact(FactKind::CliFlag, flag, None, start(&caps)));
            }
        }
    }
    for caps in ctx.captures(&CLICK_COMMAND) {
        let name = match first_group(&caps, &[1, 2]) {
            Some(explicit) => explicit.to_string(),
            // click derives the command name from the function name
            None => group(&caps, 3).unwrap_or("").replace('_', "-"),
        };
        if !name.is_empty() {
            out.push(ctx.fact(FactKind::CliCommand, name, None, start(&caps)));
        }
    }
    for caps in ctx.captures(&ADD_PARSER) {
        if let Some(name) = first_group(&caps, &[1, 2]) {
            out.push(ctx.fact(FactKind::CliCommand, name, None, start(&caps)));
        }
    }
}

fn sockets(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&SOCKET_ON) {
        let Some(receiver) = group(&caps, 1) else { continue };
        let Some(event) = first_group(&caps, &[2, 3]) else { continue };
        if receiver.contains("sio") || receiver.contains("socket") {
            out.push(ctx.fact(FactKind::WebsocketEvent, normalize_ws_event(event), None, start(&caps)));
        }
    }
    for caps in ctx.captures(&SOCKET_EVENT) {
        if let Some(handler) = group(&caps, 2) {
            out.push(ctx.fact(FactKind::WebsocketEvent, normalize_ws_event(handler), None, start(&caps)));
        }
    }
    for caps in ctx.captures(&SIGNAL) {
        if let Some(name) = first_group(&caps, &[1, 2]) {
            out.push(ctx.fact(FactKind::Event, name, None, start(&caps)));
        }
    }
}

/// Direct members of a Graphene / Strawberry root type become its fields.
fn graphql(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    if !(ctx.text.contains("graphene") || ctx.text.contains("strawberry")) {
        return;
    }
    for caps in ctx.captures(&GQL_CLASS) {
        let Some(operation) = group(&caps, 1).and_then(normalize_operation_type) else { continue };
        let (body_start, body) = indented_block(ctx.text, start(&caps));
        let mut member_indent: Option<usize> = None;

        for member in ctx.captures_in(&GQL_MEMBER, body) {
            let indent = group(&member, 1).map(str::len).unwrap_or(0);
            let expected = *member_indent.get_or_insert(indent);
            if indent != expected {
                continue;
            }
            let Some(raw) = first_group(&member, &[2, 3, 4]) else { continue };
            let field = raw.strip_prefix("resolve_").unwrap_or(raw);
            if field.starts_with('_') || matches!(field, "mutate" | "Meta" | "Arguments" | "class") {
                continue;
            }
            let name = format!("{}.{}", operation, to_camel_case(field));
            out.push(ctx.fact(FactKind::GraphqlOperation, name, None, body_start + start(&member)));
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

    fn names(src: &str, kind: FactKind) -> Vec<String> {
        let mut names: Vec<String> = facts_of(src, "app.py", kind).into_iter().map(|f| f.name).collect();
        names.sort();
        names
    }

    #[test]
    fn test_functions_and_tests() {
        let src = "def create_user(email, password='x'):\n    pass\n\nclass Svc:\n    async def fetch(self, id: int) -> User:\n        pass\n\ndef test_create_user():\n    pass\n";
        let facts = facts_of(src, "app.py", FactKind::Function);
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].signature.as_deref(), Some("email, password='x'"));
        assert_eq!(facts[1].name, "fetch");
        assert_eq!(facts[1].line, 5);
        assert_eq!(names(src, FactKind::Test), vec!["test_create_user"]);
    }

    #[test]
    fn test_classes_and_models() {
        let src = "class User(models.Model):\n    pass\n\nclass Item(BaseModel):\n    pass\n\nclass Helper(object):\n    pass\n";
        assert_eq!(names(src, FactKind::Class), vec!["Helper", "Item", "User"]);
        assert_eq!(names(src, FactKind::Model), vec!["Item", "User"]);
    }

    #[test]
    fn test_flask_and_fastapi_routes() {
        let src = r#"
router = APIRouter(prefix="/users")

@app.route("/login", methods=["GET", "POST"])
def login(): ...

@app.route("/health")
def health(): ...

@router.get("/{user_id}")
async def read_user(user_id: int): ...

@app.websocket("/ws")
async def ws(socket): ...
"#;
        assert_eq!(
            names(src, FactKind::Endpoint),
            vec![
                "GET /health",
                "GET /login",
                "GET /users/{user_id}",
                "POST /login",
                "WS /ws",
            ]
        );
    }

    #[test]
    fn test_django_and_aiohttp() {
        let src = "urlpatterns = [\n    path('articles/<int:year>/', views.year),\n]\napp.router.add_get('/status', status)\n";
        assert_eq!(
            names(src, FactKind::Endpoint),
            vec!["ANY /articles/<int:year>/", "GET /status"]
        );
    }

    #[test]
    fn test_env_config_cli() {
        let src = r#"
db = os.environ["DATABASE_URL"]
key = os.getenv('API_KEY', 'x')
debug = settings.DEBUG_MODE
parser.add_argument("-n", "--dry-run", action="store_true")
sub.add_parser("migrate")

@cli.command()
def sync_all():
    pass
"#;
        assert_eq!(names(src, FactKind::EnvVar), vec!["API_KEY", "DATABASE_URL"]);
        assert_eq!(names(src, FactKind::ConfigKey), vec!["DEBUG_MODE"]);
        assert_eq!(names(src, FactKind::CliFlag), vec!["--dry-run"]);
        assert_eq!(names(src, FactKind::CliCommand), vec!["migrate", "sync-all"]);
    }

    #[test]
    fn test_socketio_handlers() {
        let src = "@socketio.on('chat')\ndef on_chat(data): ...\n\n@sio.event\nasync def disconnect(sid): ...\n";
        assert_eq!(names(src, FactKind::WebsocketEvent), vec!["chat", "close"]);
    }

    #[test]
    fn test_graphene_schema() {
        let src = r#"
import graphene

class Query(graphene.ObjectType):
    user_by_id = graphene.Field(User, id=graphene.ID())
    users = graphene.List(User)

    def resolve_user_by_id(self, info, id):
        return None

class Other:
    ignored = 1
"#;
        assert_eq!(
            names(src, FactKind::GraphqlOperation),
            vec!["Query.userById", "Query.users"]
        );
    }
}
