//! Fact extraction from documentation and policy prose.
//!
//! Prose has no grammar worth parsing, so this is deliberately shallow:
//! - call-shaped tokens `name(a, b)` become function facts with a signature;
//! - `VERB /path` tokens (also split across table cells) become endpoints;
//! - `Query.field` tokens, labeled operations and fenced GraphQL blocks
//!   become GraphQL facts;
//! - labeled socket events become WebSocket facts;
//! - backticked identifiers, `--flags` and `UPPER_SNAKE` words become
//!   name-only facts of the kinds they can plausibly refer to.

use std::collections::{BTreeSet, HashSet};

use lazy_static::lazy_static;
use phf::phf_set;
use regex::Regex;

use super::graphql::{normalize_operation_type, operation_fields, schema_fields};
use super::text::{balanced_contents, LineIndex};
use crate::facts::{Fact, FactKind, KindSet};
use crate::matcher::names::normalize_ws_event;

/// Longest parameter text accepted from a call-shaped token.
const MAX_DOC_SIGNATURE: usize = 300;

/// Words that look like calls in prose but never name a function.
static NOT_A_FUNCTION: phf::Set<&'static str> = phf_set! {
    "if", "for", "while", "switch", "catch", "return", "function", "def", "fn",
    "func", "sizeof", "typeof", "e.g", "i.e", "and", "or", "not", "see",
    "optional", "required", "default", "deprecated",
};

lazy_static! {
    static ref CALL: Regex = Regex::new(
        r"\b([A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*)\("
    ).unwrap();
    static ref VERB_PATH: Regex = Regex::new(
        r"\b(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS|ANY|ALL)\b[\s|`*]{1,12}(/[^\s`'\x22|),]*)"
    ).unwrap();
    static ref GQL_DOTTED: Regex = Regex::new(r"\b(Query|Mutation|Subscription)\.([A-Za-z_]\w*)").unwrap();
    static ref GQL_LABELED: Regex = Regex::new(
        r"(?i)\b(query|mutation|subscription)\s*:?\s*`([A-Za-z_]\w*)`"
    ).unwrap();
    static ref FENCE: Regex = Regex::new(r"(?m)^[ \t]*(```|~~~)[ \t]*([\w+-]*)[^\n]*\n").unwrap();
    static ref WS_LABELED: Regex = Regex::new(
        r#"(?i)\b(?:websocket|ws|socket(?:\.io)?)\s+(?:event|message)s?\s*:?\s*[`'"]([^`'"\n]+)[`'"]"#
    ).unwrap();
    static ref WS_CALL: Regex = Regex::new(
        r#"\b(?:socket|ws|io|sio)\.(?:on|emit|send)\(\s*['"]([^'"\n]+)['"]"#
    ).unwrap();
    static ref WS_CONTEXT: Regex = Regex::new(r"(?i)\b(?:websocket|web socket|ws|socket\.io|socket)\b").unwrap();
    static ref EVENT_LABELED: Regex = Regex::new(
        r#"(?i)\b(?:emits?|events?)\s*:?\s*[`'"]([^`'"\n]+)[`'"]"#
    ).unwrap();
    static ref BACKTICK: Regex = Regex::new(r"`([^`\n]{1,100})`").unwrap();
    static ref IDENT_LIKE: Regex = Regex::new(
        r"^[A-Za-z_$][\w$]*(?:[.:\-][A-Za-z0-9_$]+)*$"
    ).unwrap();
    static ref FLAG: Regex = Regex::new(r"(?:^|[\s(\[,])(--[A-Za-z][\w-]*)").unwrap();
    static ref SHOUTING: Regex = Regex::new(r"\b([A-Z][A-Z0-9]*_[A-Z0-9_]*[A-Z0-9])\b").unwrap();
    static ref WORD: Regex = Regex::new(r"[A-Za-z_$][\w$]*(?:-[A-Za-z0-9_$]+)*").unwrap();
    static ref QUOTED_KEY: Regex = Regex::new(r#"["']([A-Za-z_][\w\-]*)["']\s*:"#).unwrap();
}

/// Collects facts for one documentation file.
///
/// Function mentions with different signatures are kept as separate
/// variants; a name-only mention is dropped once any variant exists.
struct DocScan<'a> {
    path: &'a str,
    lines: LineIndex,
    facts: Vec<Fact>,
    seen: HashSet<(FactKind, String, Option<String>)>,
    names: HashSet<(FactKind, String)>,
}

impl<'a> DocScan<'a> {
    fn push(&mut self, kind: FactKind, name: &str, signature: Option<String>, offset: usize) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        if signature.is_none() && self.names.contains(&(kind, name.to_string())) {
            return;
        }
        if !self.seen.insert((kind, name.to_string(), signature.clone())) {
            return;
        }
        self.names.insert((kind, name.to_string()));
        let line = self.lines.line_of(offset);
        self.facts.push(Fact::doc(kind, name, signature, self.path, line));
    }
}

/// Extract facts from a documentation or policy file.
pub fn extract_doc_facts(text: &str, path: &str) -> Vec<Fact> {
    let mut scan = DocScan {
        path,
        lines: LineIndex::new(text),
        facts: Vec::new(),
        seen: HashSet::new(),
        names: HashSet::new(),
    };

    calls(text, &mut scan);
    endpoints(text, &mut scan);
    graphql(text, &mut scan);
    sockets(text, &mut scan);
    labeled_events(text, &mut scan);
    backticked(text, &mut scan);
    flags_and_env(text, &mut scan);

    scan.facts
}

fn calls(text: &str, scan: &mut DocScan<'_>) {
    for caps in CALL.captures_iter(text) {
        let (Some(whole), Some(dotted)) = (caps.get(0), caps.get(1)) else { continue };
        let dotted = dotted.as_str();
        if dotted
            .split('.')
            .next()
            .and_then(normalize_operation_type)
            .is_some()
            && dotted.contains('.')
        {
            continue;
        }
        let name = dotted.rsplit('.').next().unwrap_or(dotted);
        if NOT_A_FUNCTION.contains(name.to_lowercase().as_str()) {
            continue;
        }
        let Some(params) = balanced_contents(text, whole.end() - 1) else { continue };
        if params.len() > MAX_DOC_SIGNATURE {
            continue;
        }
        scan.push(FactKind::Function, name, Some(params.trim().to_string()), whole.start());
    }
}

fn endpoints(text: &str, scan: &mut DocScan<'_>) {
    for caps in VERB_PATH.captures_iter(text) {
        let (Some(verb), Some(path)) = (caps.get(1), caps.get(2)) else { continue };
        let path = path.as_str().trim_end_matches(['.', ':', ';', '*']);
        let name = format!("{} {}", verb.as_str(), path);
        scan.push(FactKind::Endpoint, &name, None, verb.start());
    }
}

/// Fenced code blocks as `(info string, body offset, body)`.
fn fenced_blocks(text: &str) -> Vec<(&str, usize, &str)> {
    let mut blocks = Vec::new();
    let mut search_from = 0;
    while let Some(open) = FENCE.captures_at(text, search_from) {
        let (Some(whole), Some(fence)) = (open.get(0), open.get(1)) else { break };
        let info = open.get(2).map_or("", |m| m.as_str());
        let body_start = whole.end();
        let close = text[body_start..]
            .match_indices(fence.as_str())
            .map(|(i, _)| body_start + i)
            .find(|&i| text[..i].trim_end_matches([' ', '\t']).ends_with('\n'));
        let body_end = close.unwrap_or(text.len());
        blocks.push((info, body_start, &text[body_start..body_end]));
        search_from = match close {
            Some(c) => c + fence.as_str().len(),
            None => text.len(),
        };
        if search_from >= text.len() {
            break;
        }
    }
    blocks
}

fn graphql(text: &str, scan: &mut DocScan<'_>) {
    for caps in GQL_DOTTED.captures_iter(text) {
        let (Some(op), Some(field)) = (caps.get(1), caps.get(2)) else { continue };
        let name = format!("{}.{}", op.as_str(), field.as_str());
        scan.push(FactKind::GraphqlOperation, &name, None, op.start());
    }
    for caps in GQL_LABELED.captures_iter(text) {
        let (Some(op), Some(field)) = (caps.get(1), caps.get(2)) else { continue };
        if let Some(op) = normalize_operation_type(op.as_str()) {
            let name = format!("{}.{}", op, field.as_str());
            scan.push(FactKind::GraphqlOperation, &name, None, caps.get(0).map_or(0, |m| m.start()));
        }
    }
    for (info, body_start, body) in fenced_blocks(text) {
        if !matches!(info.to_lowercase().as_str(), "graphql" | "gql" | "graphqls") {
            continue;
        }
        for field in schema_fields(body).into_iter().chain(operation_fields(body)) {
            scan.push(FactKind::GraphqlOperation, &field.name(), None, body_start + field.offset);
        }
    }
}

fn sockets(text: &str, scan: &mut DocScan<'_>) {
    for caps in WS_LABELED.captures_iter(text).chain(WS_CALL.captures_iter(text)) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else { continue };
        scan.push(FactKind::WebsocketEvent, &normalize_ws_event(name.as_str()), None, whole.start());
    }

    // Backticked names on lines that talk about sockets.
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if WS_CONTEXT.is_match(line) {
            for caps in BACKTICK.captures_iter(line) {
                let Some(inner) = caps.get(1) else { continue };
                let token = inner.as_str().trim();
                if IDENT_LIKE.is_match(token) && !token.contains('.') {
                    scan.push(FactKind::WebsocketEvent, &normalize_ws_event(token), None, offset + inner.start());
                }
            }
        }
        offset += line.len();
    }
}

fn labeled_events(text: &str, scan: &mut DocScan<'_>) {
    for caps in EVENT_LABELED.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else { continue };
        scan.push(FactKind::Event, name.as_str(), None, whole.start());
    }
}

fn backticked(text: &str, scan: &mut DocScan<'_>) {
    for caps in BACKTICK.captures_iter(text) {
        let Some(inner) = caps.get(1) else { continue };
        let at = inner.start();
        let token = inner.as_str().trim();

        if token.starts_with('-') {
            let flag = token
                .split(|c: char| c.is_whitespace() || c == '=')
                .next()
                .unwrap_or(token);
            if flag.trim_start_matches('-').chars().next().map_or(false, |c| c.is_ascii_alphabetic()) {
                scan.push(FactKind::CliFlag, flag, None, at);
            }
            continue;
        }
        if !IDENT_LIKE.is_match(token) {
            continue;
        }

        let has_lower = token.chars().any(|c| c.is_lowercase());
        let has_alpha = token.chars().any(|c| c.is_alphabetic());
        if !has_lower && has_alpha {
            scan.push(FactKind::EnvVar, token, None, at);
            scan.push(FactKind::ConfigKey, token, None, at);
            continue;
        }
        if token.contains(':') {
            scan.push(FactKind::Event, token, None, at);
            continue;
        }
        if token.contains('.') {
            scan.push(FactKind::ConfigKey, token, None, at);
            scan.push(FactKind::Event, token, None, at);
            continue;
        }
        if token.contains('-') {
            for kind in [FactKind::CliCommand, FactKind::ConfigKey, FactKind::Event] {
                scan.push(kind, token, None, at);
            }
            continue;
        }
        for kind in [
            FactKind::Function,
            FactKind::Class,
            FactKind::Component,
            FactKind::Model,
            FactKind::CliCommand,
            FactKind::Event,
            FactKind::ConfigKey,
        ] {
            scan.push(kind, token, None, at);
        }
    }
}

fn flags_and_env(text: &str, scan: &mut DocScan<'_>) {
    for caps in FLAG.captures_iter(text) {
        if let Some(flag) = caps.get(1) {
            scan.push(FactKind::CliFlag, flag.as_str(), None, flag.start());
        }
    }
    for caps in SHOUTING.captures_iter(text) {
        if let Some(name) = caps.get(1) {
            scan.push(FactKind::EnvVar, name.as_str(), None, name.start());
        }
    }
}

/// Whether a word reads like a payload field name (`user_id`, `userId`,
/// `user-id`) rather than an ordinary English word.
pub fn is_field_like(word: &str) -> bool {
    let bytes = word.as_bytes();
    let inner_separator = bytes
        .windows(3)
        .any(|w| w[0].is_ascii_alphanumeric() && matches!(w[1], b'_' | b'-') && w[2].is_ascii_alphanumeric());
    let camel = bytes
        .windows(2)
        .any(|w| w[0].is_ascii_lowercase() && w[1].is_ascii_uppercase());
    inner_separator || camel
}

/// The documentation snapshot of one run: every doc fact plus the set of
/// words mentioned anywhere.
#[derive(Debug, Clone, Default)]
pub struct DocIndex {
    facts: Vec<Fact>,
    words: HashSet<String>,
    fields: BTreeSet<String>,
}

impl DocIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index one documentation file.
    pub fn add(&mut self, path: &str, text: &str) {
        self.facts.extend(extract_doc_facts(text, path));
        for m in WORD.find_iter(text) {
            let word = m.as_str();
            if is_field_like(word) {
                self.fields.insert(word.to_string());
            }
            self.words.insert(word.to_string());
        }
        for caps in QUOTED_KEY.captures_iter(text) {
            if let Some(key) = caps.get(1) {
                self.fields.insert(key.as_str().to_string());
                self.words.insert(key.as_str().to_string());
            }
        }
    }

    pub fn from_texts<'a>(docs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut index = Self::new();
        for (path, text) in docs {
            index.add(path, text);
        }
        index
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    /// Facts of the requested kinds.
    pub fn facts_of(&self, kinds: KindSet) -> Vec<Fact> {
        self.facts.iter().filter(|f| kinds.contains(f.kind)).cloned().collect()
    }

    /// Whether `word` appears anywhere in the indexed documentation.
    pub fn mentions(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    /// Field-like words and quoted keys, sorted.
    pub fn field_tokens(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.words.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn of_kind(facts: &[Fact], kind: FactKind) -> Vec<String> {
        let mut names: Vec<String> = facts.iter().filter(|f| f.kind == kind).map(|f| f.name.clone()).collect();
        names.sort();
        names
    }

    #[test]
    fn test_call_shaped_tokens() {
        let doc = "## API\n\nCall `createUser(username, password)` to register.\nUse UserService.remove(id) to delete.\nIf (x) nothing.\n";
        let facts = extract_doc_facts(doc, "docs/api.md");
        let create = facts.iter().find(|f| f.name == "createUser");
        assert_eq!(create.and_then(|f| f.signature.as_deref()), Some("username, password"));
        assert_eq!(create.map(|f| f.line), Some(3));
        assert_eq!(create.map(|f| f.file.as_str()), Some("docs/api.md"));
        assert!(facts.iter().any(|f| f.name == "remove" && f.kind == FactKind::Function));
        assert!(!facts.iter().any(|f| f.name.eq_ignore_ascii_case("if")));
    }

    #[test]
    fn test_signature_wins_over_name_only_mention() {
        let doc = "`login` is documented below.\n\nlogin(email, password)\n";
        let facts = extract_doc_facts(doc, "a.md");
        let login: Vec<&Fact> = facts.iter().filter(|f| f.kind == FactKind::Function && f.name == "login").collect();
        assert_eq!(login.len(), 1);
        assert_eq!(login[0].signature.as_deref(), Some("email, password"));
    }

    #[test]
    fn test_endpoints_in_prose_and_tables() {
        let doc = "Send `GET /users/{id}` to fetch.\n\n| POST | /users |\n|---|---|\n\n**DELETE** `/users/:id`.\n";
        let facts = extract_doc_facts(doc, "a.md");
        assert_eq!(
            of_kind(&facts, FactKind::Endpoint),
            vec!["DELETE /users/:id", "GET /users/{id}", "POST /users"]
        );
    }

    #[test]
    fn test_graphql_tokens() {
        let doc = "Use Query.user to fetch.\nThe mutation `createUser` adds one.\n\n```graphql\ntype Subscription {\n  userAdded: User\n}\n```\n";
        let facts = extract_doc_facts(doc, "a.md");
        assert_eq!(
            of_kind(&facts, FactKind::GraphqlOperation),
            vec!["Mutation.createUser", "Query.user", "Subscription.userAdded"]
        );
        assert!(!facts.iter().any(|f| f.kind == FactKind::Function && f.name == "user"));
    }

    #[test]
    fn test_websocket_labels() {
        let doc = "The WebSocket event `chat message` is broadcast.\nClients handle `onmessage` on the socket.\n";
        let facts = extract_doc_facts(doc, "a.md");
        assert_eq!(
            of_kind(&facts, FactKind::WebsocketEvent),
            vec!["chat message", "message"]
        );
    }

    #[test]
    fn test_backticks_flags_and_env() {
        let doc = "Set `DATABASE_URL` or REDIS_URL. Pass `--dry-run` or --verbose.\nThe `cache.ttl` key and the `deploy` command. Emits `user:created`.\n";
        let facts = extract_doc_facts(doc, "a.md");
        assert_eq!(of_kind(&facts, FactKind::EnvVar), vec!["DATABASE_URL", "REDIS_URL"]);
        assert_eq!(of_kind(&facts, FactKind::CliFlag), vec!["--dry-run", "--verbose"]);
        assert_eq!(of_kind(&facts, FactKind::ConfigKey), vec!["DATABASE_URL", "cache.ttl", "deploy"]);
        assert!(of_kind(&facts, FactKind::CliCommand).contains(&"deploy".to_string()));
        assert!(of_kind(&facts, FactKind::Event).contains(&"user:created".to_string()));
        let deploy = facts.iter().find(|f| f.kind == FactKind::Function && f.name == "deploy");
        assert_eq!(deploy.map(|f| f.signature.is_none()), Some(true));
    }

    #[test]
    fn test_is_field_like() {
        assert!(is_field_like("user_id"));
        assert!(is_field_like("userId"));
        assert!(is_field_like("user-id"));
        assert!(!is_field_like("user"));
        assert!(!is_field_like("_private"));
    }

    #[test]
    fn test_doc_index() {
        let index = DocIndex::from_texts([
            ("docs/a.md", "The payload has `user_id` and \"displayName\": \"x\"."),
            ("docs/b.md", "GET /health"),
        ]);
        assert!(index.mentions("user_id"));
        assert!(!index.mentions("uid"));
        let fields: Vec<&str> = index.field_tokens().collect();
        assert_eq!(fields, vec!["displayName", "user_id"]);
        assert_eq!(index.facts_of([FactKind::Endpoint].into_iter().collect()).len(), 1);
    }
}
