use serde::Serialize;

/// Logs the pretty-printed JSON form of `value` through `log_action`, but
/// only when the debug level is actually enabled, so callers can log
/// request/response bodies without paying the serialization cost in
/// production.
pub fn with_pretty_json_debug<T, F>(value: &T, log_action: F)
where
    T: Serialize,
    F: FnOnce(&str),
{
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let pretty_json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|error| format!("<pretty serialize failed: {error}>"));
    log_action(pretty_json.as_str());
}
