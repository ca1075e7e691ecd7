//! Navigation guard.
//!
//! Classifies outbound URLs from a surface (same-surface navigations and
//! popup requests). Hosts are compared exactly or against `*.suffix`
//! patterns; substring checks are never used.

use sidechat_config::NavigationConfig;
use tracing::warn;
use url::Url;

/// A host pattern: an exact host, or `*.suffix` matching the suffix and any subdomain of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostPattern {
    Exact(String),
    Subdomains(String),
}

fn is_valid_host(host: &str) -> bool {
    !host.is_empty()
        && host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                && !label.starts_with('-')
                && !label.ends_with('-')
        })
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

impl HostPattern {
    /// Parse `host` or `*.suffix`; `None` for anything else.
    pub fn parse(pattern: &str) -> Option<Self> {
        let pattern = normalize_host(pattern);
        if let Some(suffix) = pattern.strip_prefix("*.") {
            return is_valid_host(suffix).then(|| HostPattern::Subdomains(suffix.to_string()));
        }
        is_valid_host(&pattern).then_some(HostPattern::Exact(pattern))
    }

    pub fn matches(&self, host: &str) -> bool {
        let host = normalize_host(host);
        if !is_valid_host(&host) {
            return false;
        }
        match self {
            HostPattern::Exact(exact) => host == *exact,
            HostPattern::Subdomains(suffix) => {
                host == *suffix
                    || (host.len() > suffix.len() + 1
                        && host.ends_with(suffix.as_str())
                        && host.as_bytes()[host.len() - suffix.len() - 1] == b'.')
            }
        }
    }
}

/// Whether `url`'s host satisfies a host pattern string. Unparseable input never matches.
pub fn url_matches_pattern(url: &str, pattern: &str) -> bool {
    let Some(pattern) = HostPattern::parse(pattern) else {
        return false;
    };
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| pattern.matches(h)))
        .unwrap_or(false)
}

/// Lowercased hostname of a URL.
pub fn hostname_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(normalize_host))
}

/// What to do with an outbound URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    /// Identity-provider flow, left untouched.
    AllowAuth,
    /// Allowlisted host.
    Allow,
    /// Not http(s); left to the host's own scheme policy.
    PassThrough,
    /// Blocked in the surface and handed to the external browser.
    External(String),
    /// Unparseable; blocked outright.
    Blocked,
}

impl NavigationDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(
            self,
            NavigationDecision::AllowAuth | NavigationDecision::Allow | NavigationDecision::PassThrough
        )
    }
}

/// Allowlist plus auth-domain exemptions.
#[derive(Debug, Clone, Default)]
pub struct NavigationGuard {
    allow: Vec<HostPattern>,
    auth: Vec<HostPattern>,
}

impl NavigationGuard {
    pub fn new(allow: Vec<HostPattern>, auth: Vec<HostPattern>) -> Self {
        Self { allow, auth }
    }

    /// Build from platform domain patterns and the navigation config.
    pub fn from_config<I>(platform_patterns: I, config: &NavigationConfig) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let allow = parse_all(platform_patterns.into_iter().chain(config.companion_domains.iter().cloned()));
        let auth = parse_all(config.auth_domains.iter().cloned());
        Self { allow, auth }
    }

    pub fn is_auth_host(&self, host: &str) -> bool {
        self.auth.iter().any(|p| p.matches(host))
    }

    /// True iff `host` is exactly an allowed host or matches an allowed pattern.
    pub fn is_allowed_navigation(&self, host: &str) -> bool {
        self.is_auth_host(host) || self.allow.iter().any(|p| p.matches(host))
    }

    pub fn classify(&self, url: &str) -> NavigationDecision {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return NavigationDecision::Blocked,
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return NavigationDecision::PassThrough;
        }
        let Some(host) = parsed.host_str() else {
            return NavigationDecision::Blocked;
        };
        if self.is_auth_host(host) {
            NavigationDecision::AllowAuth
        } else if self.allow.iter().any(|p| p.matches(host)) {
            NavigationDecision::Allow
        } else {
            NavigationDecision::External(parsed.to_string())
        }
    }
}

fn parse_all(patterns: impl Iterator<Item = String>) -> Vec<HostPattern> {
    patterns
        .filter_map(|raw| {
            let parsed = HostPattern::parse(&raw);
            if parsed.is_none() {
                warn!("Ignoring malformed host pattern '{}'", raw);
            }
            parsed
        })
        .collect()
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
