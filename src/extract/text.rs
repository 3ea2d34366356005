//! Text scanning helpers shared by the extraction rules.
//!
//! Everything here works on bytes: every delimiter we care about is ASCII,
//! and ASCII bytes never occur inside a multi-byte UTF-8 sequence, so byte
//! offsets found here are always valid `str` boundaries.

/// Maximum distance scanned when looking for a closing delimiter.
const MAX_BALANCED_SPAN: usize = 20_000;

/// Maps byte offsets to 1-based line numbers.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { starts }
    }

    /// 1-based line containing `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset).max(1)
    }
}

fn closer_for(open: u8) -> Option<u8> {
    match open {
        b'(' => Some(b')'),
        b'[' => Some(b']'),
        b'{' => Some(b'}'),
        _ => None,
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// A `'` that starts a Rust lifetime (`&'a`, `<'a>`) rather than a literal.
pub(crate) fn is_lifetime_quote(bytes: &[u8], i: usize) -> bool {
    if i == 0 {
        return false;
    }
    let prev = bytes[i - 1];
    if prev != b'&' && prev != b'<' && prev != b',' && prev != b' ' && prev != b'+' {
        return false;
    }
    let mut j = i + 1;
    if j >= bytes.len() || !(bytes[j].is_ascii_alphabetic() || bytes[j] == b'_') {
        return false;
    }
    while j < bytes.len() && is_ident_byte(bytes[j]) {
        j += 1;
    }
    j >= bytes.len() || bytes[j] != b'\''
}

/// Skip a string literal starting at `i` (which holds the quote byte).
/// Returns the index just past the closing quote. Single and double quoted
/// strings end at a newline when unterminated.
pub(crate) fn skip_string(bytes: &[u8], i: usize) -> usize {
    let quote = bytes[i];
    let mut j = i + 1;
    while j < bytes.len() {
        let b = bytes[j];
        if b == b'\\' {
            j += 2;
            continue;
        }
        if b == quote {
            return j + 1;
        }
        if b == b'\n' && quote != b'`' {
            return j;
        }
        j += 1;
    }
    bytes.len()
}

/// Find the index of the delimiter closing the one at `open`.
///
/// Tracks `()`, `[]` and `{}` together and skips string literals.
pub fn matching_close(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    closer_for(*bytes.get(open)?)?;
    let limit = bytes.len().min(open.saturating_add(MAX_BALANCED_SPAN));
    let mut stack: Vec<u8> = Vec::new();
    let mut i = open;
    while i < limit {
        let b = bytes[i];
        match b {
            b'"' | b'`' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'\'' => {
                if !is_lifetime_quote(bytes, i) {
                    i = skip_string(bytes, i);
                    continue;
                }
            }
            b'(' | b'[' | b'{' => stack.push(closer_for(b).unwrap_or(b')')),
            b')' | b']' | b'}' => {
                match stack.pop() {
                    Some(expected) if expected == b => {}
                    // Mismatched closer: treat as the end of a malformed span.
                    _ => return None,
                }
                if stack.is_empty() {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Contents between the delimiter at `open` and its match.
pub fn balanced_contents(text: &str, open: usize) -> Option<&str> {
    let close = matching_close(text, open)?;
    Some(&text[open + 1..close])
}

/// Index just past the delimiter matching the one at `open`.
pub fn skip_balanced(text: &str, open: usize) -> Option<usize> {
    matching_close(text, open).map(|c| c + 1)
}

/// Modifier keywords skipped when reading the leading identifier of an item.
const ITEM_MODIFIERS: &[&str] = &[
    "async", "static", "get", "set", "pub", "readonly", "public", "private", "protected",
    "override", "extend",
];

/// One top-level item inside a braced body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopLevelItem<'a> {
    /// Offset of the identifier within the scanned body.
    pub offset: usize,
    pub ident: &'a str,
    /// First non-blank character after the identifier.
    pub next: Option<char>,
}

/// Leading identifiers of each top-level item in `body` (the text between a
/// pair of braces). Items are separated by `,`, `;` or newlines at depth 0;
/// nested brackets, strings and comments are skipped. With `hash_comments`
/// a `#` starts a line comment (GraphQL, Python, Ruby).
pub fn top_level_items(body: &str, hash_comments: bool) -> Vec<TopLevelItem<'_>> {
    let bytes = body.as_bytes();
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut at_start = true;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if b == b'/' && bytes.get(i + 1) == Some(&b'/') || hash_comments && b == b'#' {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                i += 1;
            }
            i += 2;
            continue;
        }
        match b {
            b'"' | b'`' => {
                i = skip_string(bytes, i);
                at_start = false;
                continue;
            }
            b'\'' if !is_lifetime_quote(bytes, i) => {
                i = skip_string(bytes, i);
                at_start = false;
                continue;
            }
            b'(' | b'[' | b'{' => {
                depth += 1;
                at_start = false;
            }
            b')' | b']' | b'}' => {
                depth = depth.saturating_sub(1);
            }
            b',' | b';' | b'\n' if depth == 0 => at_start = true,
            b' ' | b'\t' | b'\r' => {}
            _ if depth == 0 && at_start && (b.is_ascii_alphabetic() || b == b'_' || b == b'$') => {
                let (ident_start, ident_end) = read_item_ident(bytes, i);
                let mut j = ident_end;
                while j < bytes.len() && (bytes[j] == b' ' || bytes[j] == b'\t') {
                    j += 1;
                }
                items.push(TopLevelItem {
                    offset: ident_start,
                    ident: &body[ident_start..ident_end],
                    next: bytes.get(j).map(|b| *b as char),
                });
                at_start = false;
                i = ident_end;
                continue;
            }
            _ => at_start = false,
        }
        i += 1;
    }

    items
}

/// Read an identifier at `i`, skipping leading modifier keywords.
fn read_item_ident(bytes: &[u8], i: usize) -> (usize, usize) {
    let mut start = i;
    loop {
        let mut end = start;
        while end < bytes.len() && is_ident_byte(bytes[end]) {
            end += 1;
        }
        let word = std::str::from_utf8(&bytes[start..end]).unwrap_or("");
        let mut next = end;
        while next < bytes.len() && (bytes[next] == b' ' || bytes[next] == b'\t') {
            next += 1;
        }
        let followed_by_ident = next > end
            && next < bytes.len()
            && (bytes[next].is_ascii_alphabetic() || bytes[next] == b'_');
        if ITEM_MODIFIERS.contains(&word) && followed_by_ident {
            start = next;
            continue;
        }
        return (start, end);
    }
}

/// Lines of an indentation-delimited block (Python class bodies) that
/// starts on the line after `offset`. Returns `(body_offset, body)`.
pub fn indented_block(text: &str, offset: usize) -> (usize, &str) {
    let line_start = text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let base_indent = indent_width(&text[line_start..]);
    let body_start = match text[offset..].find('\n') {
        Some(i) => offset + i + 1,
        None => return (text.len(), ""),
    };

    let mut end = body_start;
    for line in text[body_start..].split_inclusive('\n') {
        let trimmed = line.trim();
        if !trimmed.is_empty() && indent_width(line) <= base_indent {
            break;
        }
        end += line.len();
    }
    (body_start, &text[body_start..end])
}

fn indent_width(line: &str) -> usize {
    line.bytes()
        .take_while(|b| *b == b' ' || *b == b'\t')
        .map(|b| if b == b'\t' { 4 } else { 1 })
        .sum()
}

/// Convert `snake_case` / `PascalCase` to `kebab-case`.
pub fn to_kebab_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c == '_' {
            out.push('-');
        } else if c.is_uppercase() {
            if i > 0 && !out.ends_with('-') {
                out.push('-');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// True for `PascalCase` identifiers.
pub fn is_pascal_case(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && s.chars().any(|c| c.is_ascii_lowercase())
        && s.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index() {
        let idx = LineIndex::new("a\nbb\n\nccc");
        assert_eq!(idx.line_of(0), 1);
        assert_eq!(idx.line_of(2), 2);
        assert_eq!(idx.line_of(5), 3);
        assert_eq!(idx.line_of(6), 4);
    }

    #[test]
    fn test_matching_close_nested() {
        let text = "f(a, g(b), [c, (d)]) tail";
        assert_eq!(matching_close(text, 1), Some(19));
        assert_eq!(balanced_contents(text, 1), Some("a, g(b), [c, (d)]"));
    }

    #[test]
    fn test_matching_close_skips_strings() {
        let text = r#"f(a = ")", b = '(') x"#;
        assert_eq!(balanced_contents(text, 1), Some(r#"a = ")", b = '('"#));
    }

    #[test]
    fn test_matching_close_rust_lifetimes() {
        let text = "fn f<'a>(x: &'a str, y: u8) {}";
        let open = text.find('(').unwrap();
        assert_eq!(balanced_contents(text, open), Some("x: &'a str, y: u8"));
    }

    #[test]
    fn test_matching_close_unbalanced() {
        assert_eq!(matching_close("f(a, b", 1), None);
        assert_eq!(matching_close("f(a]", 1), None);
    }

    #[test]
    fn test_top_level_items() {
        let body = r#"
    user: (parent, args) => find(args.id),
    async users(parent) { return all(); },
    // comment: ignored
    nested: { inner: 1 },
    shorthand,
"#;
        let items = top_level_items(body, false);
        let names: Vec<_> = items.iter().map(|i| (i.ident, i.next)).collect();
        assert_eq!(
            names,
            vec![
                ("user", Some(':')),
                ("users", Some('(')),
                ("nested", Some(':')),
                ("shorthand", Some(',')),
            ]
        );
    }

    #[test]
    fn test_top_level_items_hash_comments() {
        let body = "\n  # the current user\n  me: User\n  user(id: ID!): User\n";
        let items = top_level_items(body, true);
        let names: Vec<_> = items.iter().map(|i| i.ident).collect();
        assert_eq!(names, vec!["me", "user"]);
    }

    #[test]
    fn test_indented_block() {
        let text = "class Query:\n    me = 1\n\n    def resolve_me(self):\n        pass\nx = 2\n";
        let (start, body) = indented_block(text, 0);
        assert_eq!(start, 13);
        assert!(body.contains("resolve_me"));
        assert!(!body.contains("x = 2"));
    }

    #[test]
    fn test_to_kebab_case() {
        assert_eq!(to_kebab_case("dry_run"), "dry-run");
        assert_eq!(to_kebab_case("ListUsers"), "list-users");
        assert_eq!(to_kebab_case("serve"), "serve");
    }

    #[test]
    fn test_is_pascal_case() {
        assert!(is_pascal_case("UserCard"));
        assert!(!is_pascal_case("userCard"));
        assert!(!is_pascal_case("API"));
    }
}
