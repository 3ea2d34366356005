//! GraphQL SDL and operation-document scanning, shared by the `.graphql`
//! language, embedded `gql` templates and the documentation extractor.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use super::text::{balanced_contents, skip_balanced, top_level_items};

lazy_static! {
    static ref SCHEMA_BLOCK: Regex = Regex::new(r"\bschema\s*(?:@\w+\s*)*\{").unwrap();
    static ref SCHEMA_ROOT: Regex =
        Regex::new(r"\b(query|mutation|subscription)\s*:\s*([A-Za-z_]\w*)").unwrap();
    static ref TYPE_BLOCK: Regex =
        Regex::new(r"(?m)(?:^|[\s;])(?:extend\s+)?type\s+([A-Za-z_]\w*)[^{;=()]*\{").unwrap();
    static ref OPERATION: Regex =
        Regex::new(r"(?m)^[ \t]*(query|mutation|subscription)\b[ \t]*(?:[A-Za-z_]\w*)?").unwrap();
}

/// Canonical operation type name, case-insensitive.
pub fn normalize_operation_type(s: &str) -> Option<&'static str> {
    match s.trim().to_ascii_lowercase().as_str() {
        "query" | "queries" => Some("Query"),
        "mutation" | "mutations" => Some("Mutation"),
        "subscription" | "subscriptions" => Some("Subscription"),
        _ => None,
    }
}

/// One root field: `Query.user` at byte `offset` of the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootField {
    pub operation: &'static str,
    pub field: String,
    pub offset: usize,
}

impl RootField {
    pub fn name(&self) -> String {
        format!("{}.{}", self.operation, self.field)
    }
}

/// Root type names, honoring a `schema { query: RootQuery }` block.
fn root_types(text: &str) -> HashMap<String, &'static str> {
    let mut roots = HashMap::new();
    for op in ["Query", "Mutation", "Subscription"] {
        roots.insert(op.to_string(), op);
    }
    for m in SCHEMA_BLOCK.find_iter(text) {
        let Some(body) = balanced_contents(text, m.end() - 1) else {
            continue;
        };
        for caps in SCHEMA_ROOT.captures_iter(body) {
            if let Some(op) = normalize_operation_type(&caps[1]) {
                roots.insert(caps[2].to_string(), op);
            }
        }
    }
    roots
}

/// Fields of `type Query { ... }` style root types (including `extend type`).
pub fn schema_fields(text: &str) -> Vec<RootField> {
    let roots = root_types(text);
    let mut fields = Vec::new();

    for caps in TYPE_BLOCK.captures_iter(text) {
        let Some(&operation) = roots.get(&caps[1]) else {
            continue;
        };
        let open = caps.get(0).map(|m| m.end() - 1).unwrap_or(0);
        let Some(body) = balanced_contents(text, open) else {
            continue;
        };
        for item in top_level_items(body, true) {
            if matches!(item.next, Some(':') | Some('(')) {
                fields.push(RootField {
                    operation,
                    field: item.ident.to_string(),
                    offset: open + 1 + item.offset,
                });
            }
        }
    }
    fields
}

/// Root selections of executable documents (`query Name($id: ID!) { user }`).
/// Aliases resolve to the selected field.
pub fn operation_fields(text: &str) -> Vec<RootField> {
    let mut fields = Vec::new();

    for caps in OPERATION.captures_iter(text) {
        let Some(operation) = normalize_operation_type(&caps[1]) else {
            continue;
        };
        let Some(open) = selection_open(text, caps.get(0).map(|m| m.end()).unwrap_or(0)) else {
            continue;
        };
        let Some(body) = balanced_contents(text, open) else {
            continue;
        };
        for item in top_level_items(body, true) {
            let field = if item.next == Some(':') {
                aliased_field(body, item.offset + item.ident.len())
            } else {
                Some(item.ident)
            };
            if let Some(field) = field {
                fields.push(RootField {
                    operation,
                    field: field.to_string(),
                    offset: open + 1 + item.offset,
                });
            }
        }
    }
    fields
}

/// Locate the `{` opening the selection set after an operation header.
fn selection_open(text: &str, mut i: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i)? {
            b'{' => return Some(i),
            b'(' => i = skip_balanced(text, i)?,
            b'@' => {
                i += 1;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
            }
            _ => return None,
        }
    }
}

/// `alias: field` -> `field`.
fn aliased_field(body: &str, after_alias: usize) -> Option<&str> {
    let rest = body.get(after_alias..)?.trim_start().strip_prefix(':')?.trim_start();
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    (end > 0).then(|| &rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(fields: &[RootField]) -> Vec<String> {
        fields.iter().map(|f| f.name()).collect()
    }

    #[test]
    fn test_schema_fields() {
        let sdl = r#"
type Query {
  "The current user"
  me: User
  user(id: ID!): User
}

type User { id: ID! name: String }

extend type Mutation {
  createUser(input: NewUser!): User!
}
"#;
        assert_eq!(
            names(&schema_fields(sdl)),
            vec!["Query.me", "Query.user", "Mutation.createUser"]
        );
    }

    #[test]
    fn test_schema_block_renames_roots() {
        let sdl = "schema { query: RootQuery }\ntype RootQuery {\n  health: Boolean\n}\n";
        assert_eq!(names(&schema_fields(sdl)), vec!["Query.health"]);
    }

    #[test]
    fn test_operation_fields_with_alias_and_variables() {
        let doc = "query GetUser($id: ID!) @cached {\n  account: user(id: $id) { name }\n  viewer { id }\n}\nmutation { logout }\n";
        assert_eq!(
            names(&operation_fields(doc)),
            vec!["Query.user", "Query.viewer", "Mutation.logout"]
        );
    }

    #[test]
    fn test_field_offset_points_at_field() {
        let sdl = "type Query {\n  me: User\n}\n";
        let fields = schema_fields(sdl);
        assert_eq!(&sdl[fields[0].offset..fields[0].offset + 2], "me");
    }

    #[test]
    fn test_normalize_operation_type() {
        assert_eq!(normalize_operation_type("QUERY"), Some("Query"));
        assert_eq!(normalize_operation_type("mutations"), Some("Mutation"));
        assert_eq!(normalize_operation_type("fragment"), None);
    }
}
