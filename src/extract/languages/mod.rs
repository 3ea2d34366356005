//! Built-in extraction rules per language family.

pub mod go;
pub mod graphql;
pub mod java;
pub mod javascript;
pub mod python;
pub mod ruby;
pub mod rust_lang;

use super::registry::Language;
use super::text::balanced_contents;
use super::ScanContext;
use crate::facts::{Fact, FactKind};

/// Every built-in language.
pub fn all() -> Vec<Language> {
    vec![
        javascript::LANGUAGE,
        python::LANGUAGE,
        go::LANGUAGE,
        rust_lang::LANGUAGE,
        java::LANGUAGE,
        ruby::LANGUAGE,
        graphql::LANGUAGE,
    ]
}

/// Push a function fact whose parameter list opens at byte `open`.
pub(crate) fn push_function(
    ctx: &ScanContext<'_>,
    out: &mut Vec<Fact>,
    kind: FactKind,
    name: &str,
    open: usize,
    offset: usize,
) {
    let signature = balanced_contents(ctx.text, open).map(|p| p.trim().to_string());
    out.push(ctx.fact(kind, name, signature, offset));
}

/// Index of the first non-blank byte at or after `i`.
pub(crate) fn skip_blank(text: &str, mut i: usize) -> usize {
    let bytes = text.as_bytes();
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Join a route prefix and a route path with exactly one slash between.
pub(crate) fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim().trim_matches('/');
    let path = path.trim().trim_start_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{}", path),
        (false, true) => format!("/{}", prefix),
        (false, false) => format!("/{}/{}", prefix, path),
    }
}

/// The most recent prefix declared at or before `offset`.
pub(crate) fn prefix_at(prefixes: &[(usize, String)], offset: usize) -> &str {
    prefixes
        .iter()
        .rev()
        .find(|(at, _)| *at <= offset)
        .map(|(_, p)| p.as_str())
        .unwrap_or("")
}

/// Map a lowercase framework verb to an HTTP method.
pub(crate) fn http_method(verb: &str) -> Option<&'static str> {
    match verb.to_ascii_lowercase().as_str() {
        "get" => Some("GET"),
        "post" => Some("POST"),
        "put" => Some("PUT"),
        "patch" => Some("PATCH"),
        "delete" | "del" | "destroy" => Some("DELETE"),
        "head" => Some("HEAD"),
        "options" => Some("OPTIONS"),
        "all" | "any" | "route" | "handle" | "handlefunc" | "match" => Some("ANY"),
        _ => None,
    }
}

/// `snake_case` to `camelCase`, as GraphQL servers expose Python/Ruby/Rust fields.
pub(crate) fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper = false;
    for (i, c) in s.chars().enumerate() {
        if c == '_' && i > 0 {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Lowercase the first character (`User` -> `user`).
pub(crate) fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("", ""), "/");
        assert_eq!(join_paths("/api/", "/users"), "/api/users");
        assert_eq!(join_paths("users", ""), "/users");
        assert_eq!(join_paths("", "users/:id"), "/users/:id");
    }

    #[test]
    fn test_prefix_at() {
        let prefixes = vec![(10, "a".to_string()), (50, "b".to_string())];
        assert_eq!(prefix_at(&prefixes, 5), "");
        assert_eq!(prefix_at(&prefixes, 20), "a");
        assert_eq!(prefix_at(&prefixes, 80), "b");
    }

    #[test]
    fn test_case_helpers() {
        assert_eq!(to_camel_case("user_by_id"), "userById");
        assert_eq!(to_camel_case("_private"), "_private");
        assert_eq!(lower_first("User"), "user");
        assert_eq!(http_method("del"), Some("DELETE"));
        assert_eq!(http_method("fetch"), None);
    }
}
