//! Parameter-list normalization and comparison.
//!
//! Signatures from a dozen languages are reduced to an ordered list of
//! lowercase parameter names: defaults, type annotations, variadic and
//! optional markers and receivers are removed; for `Type name` / `name Type`
//! pairs the token that looks less like a type is kept.

use std::collections::HashSet;

use phf::phf_set;

use crate::extract::text::{is_lifetime_quote, skip_balanced, skip_string};

/// Words that qualify a parameter without naming it.
static MODIFIERS: phf::Set<&'static str> = phf_set! {
    "mut", "const", "final", "readonly", "public", "private", "protected",
    "var", "val", "let", "ref", "in", "out", "inout", "params", "vararg",
    "noinline", "crossinline", "override", "static", "volatile", "unsigned",
    "signed", "struct", "dyn", "impl",
};

/// Implicit receivers that never appear in documented signatures.
static RECEIVERS: phf::Set<&'static str> = phf_set! {
    "self", "cls", "this",
};

/// Type names across the supported language families.
static PRIMITIVES: phf::Set<&'static str> = phf_set! {
    "int", "integer", "long", "short", "byte", "char", "float", "double",
    "bool", "boolean", "void", "string", "str", "number", "any", "object",
    "unknown", "never", "symbol", "bigint", "undefined", "null",
    "i8", "i16", "i32", "i64", "i128", "isize",
    "u8", "u16", "u32", "u64", "u128", "usize", "f32", "f64",
    "int8", "int16", "int32", "int64", "uint", "uint8", "uint16", "uint32",
    "uint64", "uintptr", "float32", "float64", "complex64", "complex128",
    "rune", "error", "bytes", "dict", "list", "tuple", "set", "none",
};

/// Byte offsets of `s` at bracket depth 0 and outside string literals,
/// paired with the byte found there.
fn top_level_bytes(s: &str) -> Vec<(usize, u8)> {
    let bytes = s.as_bytes();
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'"' | b'`' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'\'' if !is_lifetime_quote(bytes, i) => {
                i = skip_string(bytes, i);
                continue;
            }
            b'(' | b'[' | b'{' | b'<' => depth += 1,
            b'>' if i > 0 && matches!(bytes[i - 1], b'=' | b'-') => {
                if depth == 0 {
                    out.push((i, b));
                }
            }
            b')' | b']' | b'}' | b'>' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push((i, b)),
            _ => {}
        }
        i += 1;
    }
    out
}

/// Split a parameter list on top-level commas.
pub fn split_top_level(sig: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut last = 0;
    for (i, b) in top_level_bytes(sig) {
        if b == b',' {
            parts.push(&sig[last..i]);
            last = i + 1;
        }
    }
    parts.push(&sig[last..]);
    parts.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect()
}

/// Cut a default value (`= x`, but not `==` or `=>`).
fn strip_default(param: &str) -> &str {
    let bytes = param.as_bytes();
    for (i, b) in top_level_bytes(param) {
        if b != b'=' {
            continue;
        }
        let next = bytes.get(i + 1).copied();
        let prev = if i > 0 { Some(bytes[i - 1]) } else { None };
        if matches!(next, Some(b'=') | Some(b'>'))
            || matches!(prev, Some(b'=') | Some(b'!') | Some(b'<') | Some(b'>'))
        {
            continue;
        }
        return &param[..i];
    }
    param
}

/// Cut a `: Type` annotation (but not `::` paths).
fn strip_annotation(param: &str) -> &str {
    let bytes = param.as_bytes();
    for (i, b) in top_level_bytes(param) {
        if b != b':' {
            continue;
        }
        let double = bytes.get(i + 1) == Some(&b':') || (i > 0 && bytes[i - 1] == b':');
        if !double {
            return &param[..i];
        }
    }
    param
}

/// Drop leading `@Annotation(...)` decorations (Java, Kotlin, TypeScript).
fn strip_decorators(mut param: &str) -> &str {
    while let Some(rest) = param.strip_prefix('@') {
        let name_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
            .unwrap_or(rest.len());
        let after = &rest[name_len..];
        let after = match after.trim_start().strip_prefix('(') {
            Some(_) => {
                let open = after.len() - after.trim_start().len();
                match skip_balanced(after, open) {
                    Some(end) => &after[end..],
                    None => "",
                }
            }
            None => after,
        };
        param = after.trim_start();
    }
    param
}

/// How strongly a token reads as a type rather than a name.
fn type_score(token: &str) -> u8 {
    let bare = token.trim_start_matches("...").trim_end_matches("...");
    let core = bare.trim_start_matches(['*', '&']);
    let head: String = core
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    if PRIMITIVES.contains(head.to_lowercase().as_str()) && !head.is_empty() {
        3
    } else if core.contains(['[', '<', '.', '{', '('])
        || core.starts_with('[')
        || core.chars().next().map_or(false, |c| c.is_uppercase())
        || head.ends_with("_t")
    {
        2
    } else if bare.starts_with(['*', '&']) {
        1
    } else {
        0
    }
}

/// Reduce a token to its identifier characters, lowercased.
fn clean_name(token: &str) -> String {
    token
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
        .collect()
}

/// Normalize one parameter; `None` when it names nothing (receivers, bare
/// `*` or `/` separators).
pub fn normalize_param(raw: &str) -> Option<String> {
    let param = strip_decorators(raw.trim());
    let param = strip_annotation(strip_default(param)).trim();

    if param.starts_with('{') {
        return Some("{}".to_string());
    }
    if param.starts_with('[') {
        return Some("[]".to_string());
    }

    let tokens: Vec<&str> = param
        .split_whitespace()
        .filter(|t| !t.starts_with('\'') && !t.starts_with("&'"))
        .filter(|t| !MODIFIERS.contains(clean_name(t).as_str()))
        .collect();

    let chosen = match tokens.as_slice() {
        [] => return None,
        [only] => *only,
        [.., a, b] => {
            if type_score(b) < type_score(a) {
                *b
            } else {
                *a
            }
        }
    };

    let name = clean_name(chosen);
    if name.is_empty() || RECEIVERS.contains(name.as_str()) || MODIFIERS.contains(name.as_str()) {
        return None;
    }
    Some(name)
}

/// Normalize a raw parameter list to ordered lowercase names.
pub fn normalize_params(sig: &str) -> Vec<String> {
    split_top_level(sig)
        .into_iter()
        .filter_map(normalize_param)
        .collect()
}

/// Difference between a code parameter list and a documented one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDiff {
    /// In code, absent from the docs.
    pub missing: Vec<String>,
    /// In the docs, absent from code.
    pub extra: Vec<String>,
    pub score: i64,
}

impl ParamDiff {
    pub fn new(code: &[String], doc: &[String]) -> Self {
        let code_set: HashSet<&String> = code.iter().collect();
        let doc_set: HashSet<&String> = doc.iter().collect();
        let missing: Vec<String> = dedup_in_order(code.iter().filter(|p| !doc_set.contains(p)));
        let extra: Vec<String> = dedup_in_order(doc.iter().filter(|p| !code_set.contains(p)));
        let shared = code_set.intersection(&doc_set).count() as i64;
        let score = 2 * shared - missing.len() as i64 - extra.len() as i64;
        Self {
            missing,
            extra,
            score,
        }
    }
}

fn dedup_in_order<'a>(items: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.filter(|p| seen.insert(*p)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(sig: &str) -> Vec<String> {
        normalize_params(sig)
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level("a: Map<String, Int>, b = f(1, 2), c = \"x,y\""),
            vec!["a: Map<String, Int>", "b = f(1, 2)", "c = \"x,y\""]
        );
        assert_eq!(split_top_level("  "), Vec::<&str>::new());
    }

    #[test]
    fn test_typescript_and_javascript() {
        assert_eq!(names("email: string, password?: string"), vec!["email", "password"]);
        assert_eq!(names("id, opts = {}, ...rest"), vec!["id", "opts", "rest"]);
        assert_eq!(names("{ a, b }: Props"), vec!["{}"]);
        assert_eq!(names("this: Window, cb: () => void"), vec!["cb"]);
    }

    #[test]
    fn test_python() {
        assert_eq!(names("self, user_id: int = 5, *args, **kwargs"), vec!["user_id", "args", "kwargs"]);
        assert_eq!(names("cls, a, /, b, *, c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_typed_pairs() {
        assert_eq!(names("String email, int age"), vec!["email", "age"]);
        assert_eq!(names("email string, age int"), vec!["email", "age"]);
        assert_eq!(names("p *Person, args ...string"), vec!["p", "args"]);
        assert_eq!(names("const char *name, size_t len"), vec!["name", "len"]);
        assert_eq!(names("final Map<String, Integer> counts"), vec!["counts"]);
        assert_eq!(names("@RequestParam(value = \"q\") String query"), vec!["query"]);
    }

    #[test]
    fn test_rust() {
        assert_eq!(names("&self, name: &str, mut count: usize"), vec!["name", "count"]);
        assert_eq!(names("&'a mut self, items: Vec<&'a str>"), vec!["items"]);
    }

    #[test]
    fn test_output_is_lowercase() {
        assert_eq!(names("UserId, Email"), vec!["userid", "email"]);
    }

    #[test]
    fn test_param_diff() {
        let code = normalize_params("email, password");
        let doc = normalize_params("username, password");
        let diff = ParamDiff::new(&code, &doc);
        assert_eq!(diff.missing, vec!["email"]);
        assert_eq!(diff.extra, vec!["username"]);
        assert_eq!(diff.score, 0);
        assert_eq!(ParamDiff::new(&code, &code).score, 4);
    }
}
