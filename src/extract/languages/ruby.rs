//! Ruby: defs, classes, Rails/Sinatra routes (with `resources` expansion and
//! `namespace`/`scope` prefixes), ENV lookups, ActiveRecord models, specs and
//! graphql-ruby types.

use lazy_static::lazy_static;
use regex::Regex;

use super::{http_method, join_paths, push_function, to_camel_case};
use crate::extract::graphql::normalize_operation_type;
use crate::extract::registry::Language;
use crate::extract::text::indented_block;
use crate::extract::{end, first_group, group, start, ExtractionRule, ScanContext};
use crate::facts::{Fact, FactKind};

pub const LANGUAGE: Language = Language {
    tag: "ruby",
    extensions: &["rb", "rake"],
    rules: RULES,
};

static RULES: &[ExtractionRule] = &[
    ExtractionRule { name: "rb-defs", kinds: &[FactKind::Function, FactKind::Test], run: defs },
    ExtractionRule { name: "rb-classes", kinds: &[FactKind::Class, FactKind::Model], run: classes },
    ExtractionRule { name: "rb-routes", kinds: &[FactKind::Endpoint], run: routes },
    ExtractionRule { name: "rb-env", kinds: &[FactKind::EnvVar], run: env_vars },
    ExtractionRule { name: "rb-config", kinds: &[FactKind::ConfigKey], run: config_keys },
    ExtractionRule { name: "rb-specs", kinds: &[FactKind::Test], run: specs },
    ExtractionRule { name: "rb-graphql", kinds: &[FactKind::GraphqlOperation], run: graphql },
];

lazy_static! {
    static ref DEF: Regex = Regex::new(
        r"(?m)^[ \t]*def[ \t]+(?:self\.)?([A-Za-z_]\w*[?!=]?)[ \t]*(\()?([^\n]*)"
    ).unwrap();
    static ref CLASS: Regex = Regex::new(
        r"(?m)^[ \t]*class[ \t]+([A-Z]\w*(?:::\w+)*)(?:[ \t]*<[ \t]*([\w:]+))?"
    ).unwrap();
    static ref VERB_ROUTE: Regex = Regex::new(
        r#"(?m)^[ \t]*(get|post|put|patch|delete|match)[ \t]*\(?[ \t]*(?:'([^']+)'|"([^"]+)")"#
    ).unwrap();
    static ref VIA: Regex = Regex::new(r"via:\s*(?:\[([^\]]*)\]|:(\w+))").unwrap();
    static ref SYMBOL: Regex = Regex::new(r":(\w+)").unwrap();
    static ref RESOURCES: Regex = Regex::new(
        r"(?m)^[ \t]*(resources|resource)[ \t]+:(\w+)([^\n]*)"
    ).unwrap();
    static ref ONLY: Regex = Regex::new(r"only:\s*(?:\[([^\]]*)\]|:(\w+))").unwrap();
    static ref EXCEPT: Regex = Regex::new(r"except:\s*(?:\[([^\]]*)\]|:(\w+))").unwrap();
    static ref NAMESPACE: Regex = Regex::new(
        r#"(?m)^[ \t]*(?:namespace[ \t]+:(\w+)|scope[ \t]+(?:path:[ \t]*)?['"]/?([^'"]*)['"])[^\n]*\bdo\b"#
    ).unwrap();
    static ref ENV: Regex = Regex::new(
        r#"\bENV(?:\[\s*|\.fetch\(\s*)(?:'([^']+)'|"([^"]+)")"#
    ).unwrap();
    static ref SETTINGS: Regex = Regex::new(r"\b(?:Settings|config\.x)\.([a-z_]\w*(?:\.[a-z_]\w*)*)").unwrap();
    static ref SPEC: Regex = Regex::new(
        r#"(?m)^[ \t]*(?:it|describe|context|test|specify)[ \t]*\(?[ \t]*(?:'([^']+)'|"([^"]+)")"#
    ).unwrap();
    static ref GQL_TYPE: Regex = Regex::new(
        r"(?m)^[ \t]*class[ \t]+(?:\w+::)*(Query|Mutation|Subscription)Type\b"
    ).unwrap();
    static ref GQL_FIELD: Regex = Regex::new(r"(?m)^[ \t]*field[ \t]+:(\w+)").unwrap();
}

fn defs(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&DEF) {
        let Some(name) = group(&caps, 1) else { continue };
        let at = start(&caps);
        if name.starts_with("test_") {
            out.push(ctx.fact(FactKind::Test, name, None, at));
            continue;
        }
        match caps.get(2) {
            Some(paren) => push_function(ctx, out, FactKind::Function, name, paren.start(), at),
            None => {
                let rest = group(&caps, 3).unwrap_or("").trim();
                let params = rest.split('#').next().unwrap_or("").trim();
                let signature = if params.starts_with(';') { "" } else { params };
                out.push(ctx.fact(FactKind::Function, name, Some(signature.to_string()), at));
            }
        }
    }
}

fn classes(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&CLASS) {
        let Some(name) = group(&caps, 1) else { continue };
        let at = start(&caps);
        out.push(ctx.fact(FactKind::Class, name, None, at));
        if matches!(
            group(&caps, 2),
            Some("ApplicationRecord" | "ActiveRecord::Base" | "Sequel::Model")
        ) {
            out.push(ctx.fact(FactKind::Model, name, None, at));
        }
    }
}

/// `namespace`/`scope` blocks as `(start, end, prefix)` byte ranges.
fn namespaces(ctx: &ScanContext<'_>) -> Vec<(usize, usize, String)> {
    ctx.captures(&NAMESPACE)
        .filter_map(|c| {
            let prefix = first_group(&c, &[1, 2])?.to_string();
            let (body_start, body) = indented_block(ctx.text, start(&c));
            Some((body_start, body_start + body.len(), prefix))
        })
        .collect()
}

fn prefix_for(spaces: &[(usize, usize, String)], offset: usize) -> String {
    spaces
        .iter()
        .filter(|(s, e, _)| *s <= offset && offset < *e)
        .fold(String::new(), |acc, (_, _, p)| join_paths(&acc, p))
}

fn symbols(list: Option<&str>, single: Option<&str>) -> Vec<String> {
    match (list, single) {
        (Some(list), _) => SYMBOL.captures_iter(list).map(|c| c[1].to_string()).collect(),
        (None, Some(one)) => vec![one.to_string()],
        _ => Vec::new(),
    }
}

/// Rails' conventional routes for `resources`/`resource`.
fn resource_routes(plural: bool, name: &str, options: &str) -> Vec<(&'static str, String)> {
    let base = format!("/{}", name);
    let member = if plural { format!("{}/:id", base) } else { base.clone() };
    let all: Vec<(&'static str, &'static str, String)> = vec![
        ("index", "GET", base.clone()),
        ("create", "POST", base.clone()),
        ("new", "GET", format!("{}/new", base)),
        ("edit", "GET", format!("{}/edit", member)),
        ("show", "GET", member.clone()),
        ("update", "PATCH", member.clone()),
        ("update", "PUT", member.clone()),
        ("destroy", "DELETE", member),
    ];

    let only = ONLY.captures(options).map(|c| symbols(group(&c, 1), group(&c, 2)));
    let except = EXCEPT
        .captures(options)
        .map(|c| symbols(group(&c, 1), group(&c, 2)))
        .unwrap_or_default();

    all.into_iter()
        .filter(|(action, _, _)| plural || *action != "index")
        .filter(|(action, _, _)| only.as_ref().map_or(true, |o| o.iter().any(|a| a == action)))
        .filter(|(action, _, _)| !except.iter().any(|a| a == action))
        .map(|(_, method, path)| (method, path))
        .collect()
}

fn routes(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    let spaces = namespaces(ctx);

    for caps in ctx.captures(&VERB_ROUTE) {
        let Some(verb) = group(&caps, 1) else { continue };
        let Some(path) = first_group(&caps, &[2, 3]) else { continue };
        let at = start(&caps);
        let full = join_paths(&prefix_for(&spaces, at), path);

        if verb == "match" {
            let line_end = ctx.text[end(&caps)..].find('\n').map_or(ctx.text.len(), |i| end(&caps) + i);
            let line = &ctx.text[end(&caps)..line_end];
            let methods = VIA
                .captures(line)
                .map(|c| symbols(group(&c, 1), group(&c, 2)))
                .unwrap_or_default();
            if methods.is_empty() || methods.iter().any(|m| m == "all") {
                out.push(ctx.endpoint("ANY", &full, at));
            }
            for method in methods.iter().filter_map(|m| http_method(m)) {
                if method != "ANY" {
                    out.push(ctx.endpoint(method, &full, at));
                }
            }
        } else if let Some(method) = http_method(verb) {
            out.push(ctx.endpoint(method, &full, at));
        }
    }

    for caps in ctx.captures(&RESOURCES) {
        let (Some(kind), Some(name)) = (group(&caps, 1), group(&caps, 2)) else { continue };
        let at = start(&caps);
        let prefix = prefix_for(&spaces, at);
        for (method, path) in resource_routes(kind == "resources", name, group(&caps, 3).unwrap_or("")) {
            out.push(ctx.endpoint(method, &join_paths(&prefix, &path), at));
        }
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
    for caps in ctx.captures(&SETTINGS) {
        if let Some(key) = group(&caps, 1) {
            out.push(ctx.fact(FactKind::ConfigKey, key, None, start(&caps)));
        }
    }
}

fn specs(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&SPEC) {
        if let Some(name) = first_group(&caps, &[1, 2]) {
            out.push(ctx.fact(FactKind::Test, name, None, start(&caps)));
        }
    }
}

fn graphql(ctx: &ScanContext<'_>, out: &mut Vec<Fact>) {
    for caps in ctx.captures(&GQL_TYPE) {
        let Some(operation) = group(&caps, 1).and_then(normalize_operation_type) else { continue };
        let (body_start, body) = indented_block(ctx.text, start(&caps));
        for field in ctx.captures_in(&GQL_FIELD, body) {
            if let Some(name) = group(&field, 1) {
                let name = format!("{}.{}", operation, to_camel_case(name));
                out.push(ctx.fact(FactKind::GraphqlOperation, name, None, body_start + start(&field)));
            }
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
    fn test_defs() {
        let src = "class UserService\n  def create(email, password)\n  end\n\n  def self.find id\n  end\n\n  def test_create\n  end\nend\n";
        let facts = facts_of(src, "user_service.rb", FactKind::Function);
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].signature.as_deref(), Some("email, password"));
        assert_eq!(facts[1].name, "find");
        assert_eq!(facts[1].signature.as_deref(), Some("id"));
        assert_eq!(names(src, "user_service.rb", FactKind::Test), vec!["test_create"]);
    }

    #[test]
    fn test_models() {
        let src = "class User < ApplicationRecord\nend\nclass Helper\nend\n";
        assert_eq!(names(src, "user.rb", FactKind::Model), vec!["User"]);
        assert_eq!(names(src, "user.rb", FactKind::Class), vec!["Helper", "User"]);
    }

    #[test]
    fn test_rails_routes() {
        let src = r#"
Rails.application.routes.draw do
  get '/health', to: 'status#show'
  namespace :api do
    resources :users, only: [:index, :show]
    match '/search', to: 'search#run', via: [:get, :post]
  end
  resource :profile, except: :destroy
end
"#;
        assert_eq!(
            names(src, "config/routes.rb", FactKind::Endpoint),
            vec![
                "GET /api/search",
                "GET /api/users",
                "GET /api/users/:id",
                "GET /health",
                "GET /profile",
                "GET /profile/edit",
                "GET /profile/new",
                "PATCH /profile",
                "POST /api/search",
                "POST /profile",
                "PUT /profile",
            ]
        );
    }

    #[test]
    fn test_env_specs_graphql() {
        let src = r#"
key = ENV['API_KEY']
url = ENV.fetch("DATABASE_URL")

module Types
  class QueryType < Types::BaseObject
    field :user_by_id, UserType, null: true
    field :users, [UserType]
  end
end

describe 'users' do
  it "creates a user" do
  end
end
"#;
        assert_eq!(names(src, "app.rb", FactKind::EnvVar), vec!["API_KEY", "DATABASE_URL"]);
        assert_eq!(
            names(src, "app.rb", FactKind::GraphqlOperation),
            vec!["Query.userById", "Query.users"]
        );
        assert_eq!(names(src, "app.rb", FactKind::Test), vec!["creates a user", "users"]);
    }
}
