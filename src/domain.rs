use url::Url;

/// Canonical host for an arbitrary URL string: lowercase, no `www.` label,
/// no port. Empty or unparseable input yields "".
pub fn normalize_domain(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    let parsed = Url::parse(raw)
        .ok()
        .filter(|u| u.host_str().is_some())
        .or_else(|| Url::parse(&format!("https://{}", raw)).ok());

    let host = match parsed.as_ref().and_then(|u| u.host_str()) {
        Some(h) => h.to_ascii_lowercase(),
        None => return String::new(),
    };

    host.strip_prefix("www.").unwrap_or(&host).to_string()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_whitespace() {
        assert_eq!(normalize_domain(""), "");
        assert_eq!(normalize_domain("   "), "");
    }

    #[test]
    fn strips_scheme_www_and_port() {
        assert_eq!(normalize_domain("HTTP://WWW.Example.com:8080/x"), "example.com");
        assert_eq!(normalize_domain("https://www.foo.com/path?q=1"), "foo.com");
        assert_eq!(normalize_domain("http://bar.net:80"), "bar.net");
    }

    #[test]
    fn assumes_scheme_when_missing() {
        assert_eq!(normalize_domain("example.com"), "example.com");
        assert_eq!(normalize_domain("www.example.com/about"), "example.com");
    }

    #[test]
    fn round_trips_canonical_domains() {
        for d in ["solarco.com", "energy.example.org", "a-b.io"] {
            assert_eq!(normalize_domain(&format!("https://{}", d)), d);
            assert_eq!(normalize_domain(d), d);
        }
    }

    #[test]
    fn malformed_yields_empty() {
        assert_eq!(normalize_domain("not a url at all"), "");
        assert_eq!(normalize_domain("::::"), "");
    }
}
