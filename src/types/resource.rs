//! Fetched resource payloads and content security metadata.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Raw payload returned by the resource read capability for one identifier.
///
/// Either a protocol envelope (`{"contents": [...]}`) or bare markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceContent {
    pub uri: String,
    pub raw: String,
}

impl ResourceContent {
    pub fn new(uri: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            raw: raw.into(),
        }
    }
}

/// Network origins a UI resource declares it needs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiResourceCsp {
    /// Origins reachable through fetch/XHR/WebSocket.
    #[serde(default)]
    pub connect_domains: Vec<String>,
    /// Origins scripts, styles, images and fonts may load from.
    #[serde(default)]
    pub resource_domains: Vec<String>,
}

impl UiResourceCsp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_domain(mut self, domain: impl Into<String>) -> Self {
        self.connect_domains.push(domain.into());
        self
    }

    pub fn resource_domain(mut self, domain: impl Into<String>) -> Self {
        self.resource_domains.push(domain.into());
        self
    }

    /// Render a `Content-Security-Policy` value.
    ///
    /// Starts from `default-src 'none'` and only adds the declared origins,
    /// sorted and deduplicated.
    pub fn to_policy(&self) -> String {
        let resources = sanitized(&self.resource_domains);
        let connects = sanitized(&self.connect_domains);

        let with_sources = |directive: &str, base: &str, extra: &[String]| {
            let mut parts = vec![directive.to_string(), base.to_string()];
            parts.extend(extra.iter().cloned());
            parts.join(" ")
        };

        let connect = if connects.is_empty() {
            "connect-src 'none'".to_string()
        } else {
            format!("connect-src {}", connects.join(" "))
        };

        [
            "default-src 'none'".to_string(),
            with_sources("script-src", "'unsafe-inline'", &resources),
            with_sources("style-src", "'unsafe-inline'", &resources),
            with_sources("img-src", "data:", &resources),
            with_sources("font-src", "data:", &resources),
            connect,
        ]
        .join("; ")
    }
}

fn sanitized(domains: &[String]) -> Vec<String> {
    domains
        .iter()
        .map(|d| d.trim())
        // A stray ';' or quote would let a domain inject its own directive.
        .filter(|d| !d.is_empty() && !d.contains([';', '\'', ',']) && !d.contains(char::is_whitespace))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_closed() {
        let policy = UiResourceCsp::new().to_policy();
        assert!(policy.starts_with("default-src 'none'"));
        assert!(policy.contains("connect-src 'none'"));
    }

    #[test]
    fn test_policy_sorted_and_deduplicated() {
        let csp = UiResourceCsp::new()
            .connect_domain("https://b.example.com")
            .connect_domain("https://a.example.com")
            .connect_domain("https://a.example.com")
            .resource_domain("https://cdn.example.com");

        let policy = csp.to_policy();
        assert!(policy.contains("connect-src https://a.example.com https://b.example.com"));
        assert!(policy.contains("script-src 'unsafe-inline' https://cdn.example.com"));
    }

    #[test]
    fn test_policy_rejects_injected_directives() {
        let csp = UiResourceCsp::new().connect_domain("https://x.com; script-src *");
        assert!(csp.to_policy().contains("connect-src 'none'"));
    }
}
