//! Fact model shared by the extractors and the matcher.
//!
//! A [`Fact`] is one structural element (function, route, env var, ...)
//! found in a single file. Code-side and doc-side facts share the same type;
//! [`FactOrigin`] records which corpus a fact came from.

use serde::{Deserialize, Serialize};

/// The kinds of structural elements the extractors know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FactKind {
    Function,
    Class,
    Endpoint,
    EnvVar,
    ConfigKey,
    CliFlag,
    CliCommand,
    Component,
    Model,
    Event,
    Test,
    GraphqlOperation,
    WebsocketEvent,
}

impl FactKind {
    /// Every kind, in declaration order.
    pub const ALL: [FactKind; 13] = [
        FactKind::Function,
        FactKind::Class,
        FactKind::Endpoint,
        FactKind::EnvVar,
        FactKind::ConfigKey,
        FactKind::CliFlag,
        FactKind::CliCommand,
        FactKind::Component,
        FactKind::Model,
        FactKind::Event,
        FactKind::Test,
        FactKind::GraphqlOperation,
        FactKind::WebsocketEvent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FactKind::Function => "function",
            FactKind::Class => "class",
            FactKind::Endpoint => "endpoint",
            FactKind::EnvVar => "env-var",
            FactKind::ConfigKey => "config-key",
            FactKind::CliFlag => "cli-flag",
            FactKind::CliCommand => "cli-command",
            FactKind::Component => "component",
            FactKind::Model => "model",
            FactKind::Event => "event",
            FactKind::Test => "test",
            FactKind::GraphqlOperation => "graphql-operation",
            FactKind::WebsocketEvent => "websocket-event",
        }
    }

    /// Parse a kind name. Underscores are accepted in place of dashes so
    /// YAML authors can write either `env_var` or `env-var`.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        match normalized.as_str() {
            "function" | "functions" => Some(FactKind::Function),
            "class" | "classes" => Some(FactKind::Class),
            "endpoint" | "endpoints" | "route" | "routes" => Some(FactKind::Endpoint),
            "env-var" | "env" | "env-vars" => Some(FactKind::EnvVar),
            "config-key" | "config" | "config-keys" => Some(FactKind::ConfigKey),
            "cli-flag" | "cli-flags" | "flag" => Some(FactKind::CliFlag),
            "cli-command" | "cli-commands" | "command" => Some(FactKind::CliCommand),
            "component" | "components" => Some(FactKind::Component),
            "model" | "models" => Some(FactKind::Model),
            "event" | "events" => Some(FactKind::Event),
            "test" | "tests" => Some(FactKind::Test),
            "graphql-operation" | "graphql" => Some(FactKind::GraphqlOperation),
            "websocket-event" | "websocket" => Some(FactKind::WebsocketEvent),
            _ => None,
        }
    }
}

impl std::fmt::Display for FactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FactKind::parse(s).ok_or_else(|| format!("unknown fact kind: {}", s))
    }
}

/// A small set of fact kinds, used to scope extraction to what a rule needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KindSet(u16);

impl KindSet {
    pub fn empty() -> Self {
        KindSet(0)
    }

    pub fn all() -> Self {
        FactKind::ALL.iter().copied().collect()
    }

    pub fn insert(&mut self, kind: FactKind) {
        self.0 |= 1 << kind as u16;
    }

    pub fn contains(&self, kind: FactKind) -> bool {
        self.0 & (1 << kind as u16) != 0
    }

    /// True if any kind in `kinds` is in the set.
    pub fn intersects(&self, kinds: &[FactKind]) -> bool {
        kinds.iter().any(|k| self.contains(*k))
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = FactKind> + '_ {
        FactKind::ALL.iter().copied().filter(|k| self.contains(*k))
    }
}

impl FromIterator<FactKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = FactKind>>(iter: I) -> Self {
        let mut set = KindSet::empty();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

/// Which corpus a fact was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactOrigin {
    Code,
    Doc,
}

/// One extracted structural element.
///
/// Naming conventions per kind:
/// - `Endpoint`: `"<METHOD> <path>"`, e.g. `"GET /users/:id"` (`ANY` when the
///   framework idiom does not pin a method)
/// - `GraphqlOperation`: `"<OperationType>.<field>"`, e.g. `"Query.user"`
/// - `CliFlag`: the long form with dashes, e.g. `"--dry-run"`
///
/// `signature` holds the raw parameter text for functions and is `None` for
/// name-only documentation mentions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub kind: FactKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub file: String,
    pub line: usize,
    pub origin: FactOrigin,
}

/// Documentation facts share the code fact representation.
pub type DocFact = Fact;

impl Fact {
    pub fn code(
        kind: FactKind,
        name: impl Into<String>,
        signature: Option<String>,
        file: impl Into<String>,
        line: usize,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            signature,
            file: file.into(),
            line,
            origin: FactOrigin::Code,
        }
    }

    pub fn doc(
        kind: FactKind,
        name: impl Into<String>,
        signature: Option<String>,
        file: impl Into<String>,
        line: usize,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            signature,
            file: file.into(),
            line,
            origin: FactOrigin::Doc,
        }
    }

    /// Split an endpoint fact name into `(method, path)`.
    pub fn endpoint_parts(&self) -> Option<(&str, &str)> {
        if self.kind != FactKind::Endpoint {
            return None;
        }
        self.name.split_once(' ')
    }

    /// Split a GraphQL fact name into `(operation type, field)`.
    pub fn graphql_parts(&self) -> Option<(&str, &str)> {
        if self.kind != FactKind::GraphqlOperation {
            return None;
        }
        self.name.split_once('.')
    }

    /// Human-readable rendering used in finding explanations.
    pub fn display_signature(&self) -> String {
        match &self.signature {
            Some(sig) if self.kind == FactKind::Function => {
                format!("{}({})", self.name, collapse_whitespace(sig))
            }
            _ => self.name.clone(),
        }
    }

    /// `file:line` location string.
    pub fn location(&self) -> String {
        format!("{}:{}", self.file, self.line)
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_accepts_aliases() {
        assert_eq!(FactKind::parse("env_var"), Some(FactKind::EnvVar));
        assert_eq!(FactKind::parse("env-var"), Some(FactKind::EnvVar));
        assert_eq!(FactKind::parse("GraphQL"), Some(FactKind::GraphqlOperation));
        assert_eq!(FactKind::parse("routes"), Some(FactKind::Endpoint));
        assert_eq!(FactKind::parse("nope"), None);
    }

    #[test]
    fn test_kind_serde_is_kebab_case() {
        let json = serde_json::to_string(&FactKind::WebsocketEvent).unwrap();
        assert_eq!(json, "\"websocket-event\"");
        for kind in FactKind::ALL {
            assert_eq!(FactKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_kind_set() {
        let set: KindSet = [FactKind::Function, FactKind::Endpoint].into_iter().collect();
        assert!(set.contains(FactKind::Function));
        assert!(!set.contains(FactKind::Model));
        assert!(set.intersects(&[FactKind::Model, FactKind::Endpoint]));
        assert_eq!(set.iter().count(), 2);
        assert_eq!(KindSet::all().iter().count(), FactKind::ALL.len());
    }

    #[test]
    fn test_endpoint_parts() {
        let fact = Fact::code(FactKind::Endpoint, "GET /users/:id", None, "a.ts", 3);
        assert_eq!(fact.endpoint_parts(), Some(("GET", "/users/:id")));
        let func = Fact::code(FactKind::Function, "GET x", None, "a.ts", 3);
        assert_eq!(func.endpoint_parts(), None);
    }

    #[test]
    fn test_display_signature() {
        let fact = Fact::code(
            FactKind::Function,
            "createUser",
            Some("email,\n    password".to_string()),
            "a.ts",
            1,
        );
        assert_eq!(fact.display_signature(), "createUser(email, password)");
    }
}
