//! Route path canonicalization.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `{id}`, `${id}`, `<id>`, `<int:id>`, `[id]`, `[...slug]`.
    static ref PARAM_SPAN: Regex = Regex::new(r"\$?\{[^}/]*\}|<[^>/]*>|\[[^\]/]*\]").unwrap();
    /// Express/Rails `:id`, optionally suffixed `?` or constrained `(\d+)`.
    static ref COLON_PARAM: Regex = Regex::new(r"^:\w+\??(?:\([^)]*\))?").unwrap();
}

/// Canonical form of a route path.
///
/// Parameter placeholders of every supported syntax collapse to `{}`,
/// duplicate slashes collapse, a trailing slash is dropped (except for the
/// root), static segments are lowercased and query strings are removed.
pub fn normalize_path(path: &str) -> String {
    let path = path.trim();
    let path = path.split(['?', '#']).next().unwrap_or("");

    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(normalize_segment)
        .collect();

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

fn normalize_segment(segment: &str) -> String {
    let segment = COLON_PARAM.replace(segment, "{}");
    let segment = PARAM_SPAN.replace_all(&segment, "{}");
    segment.to_lowercase()
}

/// Canonical HTTP method; `ALL` is folded into `ANY`.
pub fn normalize_method(method: &str) -> String {
    match method.trim().to_uppercase().as_str() {
        "ALL" | "*" => "ANY".to_string(),
        other => other.to_string(),
    }
}

/// Whether a code-side method is satisfied by a documented one.
pub fn methods_match(code: &str, doc: &str) -> bool {
    code == "ANY" || doc == "ANY" || code == doc
}

/// Split an endpoint fact name into normalized `(METHOD, path)`.
pub fn endpoint_key(name: &str) -> Option<(String, String)> {
    let (method, path) = name.trim().split_once(char::is_whitespace)?;
    Some((normalize_method(method), normalize_path(path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_styles_collapse() {
        let expected = "/users/{}";
        for path in [
            "/users/{id}",
            "/users/:id",
            "/users/<id>",
            "/users/<int:id>",
            "/users/[id]",
            "/users/${userId}",
            "/users/:id(\\d+)",
        ] {
            assert_eq!(normalize_path(path), expected, "{}", path);
        }
    }

    #[test]
    fn test_slashes_case_and_query() {
        assert_eq!(normalize_path("//API//Users/"), "/api/users");
        assert_eq!(normalize_path("/search?q=1"), "/search");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/files/{name}.{ext}"), "/files/{}.{}");
    }

    #[test]
    fn test_endpoint_key() {
        assert_eq!(
            endpoint_key("get /Users/:id/"),
            Some(("GET".to_string(), "/users/{}".to_string()))
        );
        assert_eq!(endpoint_key("all /x").map(|k| k.0), Some("ANY".to_string()));
        assert_eq!(endpoint_key("/nomethod"), None);
    }

    #[test]
    fn test_methods_match() {
        assert!(methods_match("ANY", "POST"));
        assert!(methods_match("GET", "GET"));
        assert!(!methods_match("GET", "POST"));
    }
}
