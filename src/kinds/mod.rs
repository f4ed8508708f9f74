//! Raw predicates for each context kind, before inversion and session caching.

pub mod domain;
pub mod ip;

use crate::errors::{ContextError, Result};
use crate::parser::split_lines;
use crate::signals::{SessionStore, SignalSource};

/// Header condition. A value list that is a single empty line accepts any
/// non-empty header value; otherwise the trimmed value must equal one entry.
pub fn header_matches(signals: &dyn SignalSource, name: &str, values: &str) -> bool {
    let actual = match signals.header(name.trim()) {
        Some(v) => v.trim().to_string(),
        None => return false,
    };
    if actual.is_empty() {
        return false;
    }
    let allowed = split_lines(values);
    if allowed == [""] {
        return true;
    }
    allowed.iter().any(|v| !v.is_empty() && *v == actual)
}

/// Query parameter condition. An empty value list accepts any non-empty value.
pub fn query_matches(
    uid: u64,
    signals: &dyn SignalSource,
    name: &str,
    values: &str,
) -> Result<bool> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ContextError::MissingParameterName { uid });
    }
    let actual = match signals.query_param(name) {
        Some(v) if !v.is_empty() => v,
        _ => return Ok(false),
    };
    let allowed: Vec<&str> = split_lines(values)
        .into_iter()
        .filter(|v| !v.is_empty())
        .collect();
    if allowed.is_empty() {
        return Ok(true);
    }
    Ok(allowed.iter().any(|v| *v == actual))
}

/// Session flag condition: presence of the key, whatever its value.
pub fn session_flag_matches(session: &dyn SessionStore, variable: &str) -> bool {
    if !session.has_fe_user() {
        return false;
    }
    session.session_value(variable.trim()).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{MemorySession, RequestSignals};
    use serde_json::json;

    #[test]
    fn header_exact_values() {
        let s = RequestSignals::new("", "").with_header("X-Env", " staging ");
        assert!(header_matches(&s, "x-env", "live\nstaging"));
        assert!(!header_matches(&s, "x-env", "Staging"));
        assert!(!header_matches(&s, "x-other", "staging"));
    }

    #[test]
    fn header_empty_value_list_means_any_value() {
        let s = RequestSignals::new("", "")
            .with_header("X-Env", "anything")
            .with_header("X-Blank", "  ");
        assert!(header_matches(&s, "X-Env", ""));
        assert!(!header_matches(&s, "X-Blank", ""));
        assert!(!header_matches(&s, "X-Missing", ""));
    }

    #[test]
    fn query_values() {
        let s = RequestSignals::new("", "").with_query("lang", "de").with_query("empty", "");
        assert!(query_matches(1, &s, "lang", "en\nde").unwrap());
        assert!(!query_matches(1, &s, "lang", "en").unwrap());
        assert!(query_matches(1, &s, "lang", "").unwrap());
        assert!(!query_matches(1, &s, "empty", "").unwrap());
        assert!(!query_matches(1, &s, "absent", "").unwrap());
    }

    #[test]
    fn query_without_name_is_an_error() {
        let s = RequestSignals::new("", "");
        let err = query_matches(7, &s, "  ", "").unwrap_err();
        assert!(matches!(err, ContextError::MissingParameterName { uid: 7 }));
    }

    #[test]
    fn session_flag_tests_presence_not_truthiness() {
        let session = MemorySession::new()
            .with_value("zero", json!(0))
            .with_value("no", json!(false))
            .with_value("blank", json!(""))
            .with_value("list", json!([]));
        for key in ["zero", "no", "blank", "list"] {
            assert!(session_flag_matches(&session, key), "{key}");
        }
        assert!(!session_flag_matches(&session, "missing"));
        assert!(!session_flag_matches(&MemorySession::without_user(), "zero"));
    }
}
