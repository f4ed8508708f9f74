//! Host matching against configured domain patterns.

use crate::parser::split_lines;

/// True if `host` matches any pattern, one pattern per line.
///
/// A pattern starting with `.` matches that domain and all of its
/// subdomains; any other pattern must equal the host, port included.
pub fn matches(patterns: &str, host: &str) -> bool {
    let host = host.trim().to_ascii_lowercase();
    if host.is_empty() {
        return false;
    }
    split_lines(patterns)
        .into_iter()
        .filter(|p| !p.is_empty())
        .any(|pattern| {
            let pattern = pattern.to_ascii_lowercase();
            match pattern.strip_prefix('.') {
                Some(suffix) => {
                    host == suffix
                        || host
                            .strip_suffix(suffix)
                            .is_some_and(|rest| rest.ends_with('.'))
                }
                None => host == pattern,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_includes_port() {
        assert!(matches("example.org", "example.org"));
        assert!(matches("example.org:8080", "example.org:8080"));
        assert!(!matches("example.org", "example.org:8080"));
        assert!(!matches("example.org", "www.example.org"));
    }

    #[test]
    fn leading_dot_covers_subdomains() {
        assert!(matches(".example.org", "example.org"));
        assert!(matches(".example.org", "www.example.org"));
        assert!(matches(".example.org", "a.b.example.org"));
        assert!(!matches(".example.org", "badexample.org"));
    }

    #[test]
    fn comparison_ignores_case() {
        assert!(matches("Example.ORG", "example.org"));
    }

    #[test]
    fn empty_host_or_list_never_matches() {
        assert!(!matches("example.org", ""));
        assert!(!matches("", "example.org"));
    }
}
