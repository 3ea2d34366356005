//! Name canonicalization for the name-keyed fact kinds.

use crate::facts::FactKind;

/// DOM-style handler names that lose their `on` prefix.
const DOM_EVENTS: &[&str] = &["message", "open", "close", "error"];

/// Canonical WebSocket event name.
///
/// Case-insensitive; `onmessage`/`onopen`/`onclose`/`onerror` lose the `on`
/// prefix, `disconnect` becomes `close` and `connection` becomes `connect`.
/// Application event names are only trimmed and lowercased.
pub fn normalize_ws_event(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    if let Some(rest) = lowered.strip_prefix("on") {
        if DOM_EVENTS.contains(&rest) {
            return rest.to_string();
        }
    }
    match lowered.as_str() {
        "disconnect" => "close".to_string(),
        "connection" => "connect".to_string(),
        _ => lowered,
    }
}

/// `--dry-run`, `-Dry-Run` and `DRY-RUN` all become `dry-run`.
pub fn normalize_flag(name: &str) -> String {
    name.trim().trim_start_matches('-').to_lowercase()
}

/// Environment variables compare verbatim, upper-cased.
pub fn normalize_env(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Comparison key for a fact name of `kind`.
pub fn normalize_name(kind: FactKind, name: &str) -> String {
    match kind {
        FactKind::CliFlag => normalize_flag(name),
        FactKind::EnvVar => normalize_env(name),
        FactKind::WebsocketEvent => normalize_ws_event(name),
        FactKind::Function
        | FactKind::Class
        | FactKind::Endpoint
        | FactKind::ConfigKey
        | FactKind::CliCommand
        | FactKind::Component
        | FactKind::Model
        | FactKind::Event
        | FactKind::Test
        | FactKind::GraphqlOperation => name.trim().to_lowercase(),
    }
}
