//! Cookie export parsing and target detection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::PlatformEntry;

use super::ImportError;

/// One cookie from a browser export. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    pub domain: String,
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Seconds since the Unix epoch; absent for session cookies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<f64>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

impl CookieRecord {
    /// Domain without the leading dot, lowercased.
    pub fn normalized_domain(&self) -> String {
        self.domain.trim().trim_start_matches('.').to_ascii_lowercase()
    }

    pub fn is_expired(&self, now_secs: f64) -> bool {
        self.expiration_date.is_some_and(|exp| exp < now_secs)
    }
}

/// Result of parsing a raw export.
#[derive(Debug)]
pub(crate) struct ParsedCookies {
    pub cookies: Vec<CookieRecord>,
    pub skipped_without_name: usize,
}

/// Parse a JSON array of cookie records.
///
/// Anything that is not an array of objects carrying a `domain` string is
/// rejected outright; records without a name are skipped.
pub(crate) fn parse_cookie_export(raw: &str) -> Result<ParsedCookies, ImportError> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|e| ImportError::InvalidFormat(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(ImportError::InvalidFormat("expected a JSON array of cookies".to_string()));
    };
    if items.is_empty() {
        return Err(ImportError::Empty);
    }

    let mut cookies = Vec::with_capacity(items.len());
    let mut skipped_without_name = 0;
    for (index, item) in items.into_iter().enumerate() {
        let has_domain = item
            .get("domain")
            .and_then(Value::as_str)
            .is_some_and(|d| !d.trim().trim_start_matches('.').is_empty());
        if !has_domain {
            return Err(ImportError::InvalidFormat(format!("cookie #{} has no domain", index)));
        }
        let has_name = item
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|n| !n.is_empty());
        if !has_name {
            skipped_without_name += 1;
            continue;
        }
        let cookie: CookieRecord = serde_json::from_value(item)
            .map_err(|e| ImportError::InvalidFormat(format!("cookie #{}: {}", index, e)))?;
        cookies.push(cookie);
    }

    if cookies.is_empty() {
        return Err(ImportError::Empty);
    }
    Ok(ParsedCookies {
        cookies,
        skipped_without_name,
    })
}

fn cookie_applies_to(cookie_domain: &str, host: &str) -> bool {
    if cookie_domain == host {
        return true;
    }
    // Parent-domain cookie (".google.com" for gemini.google.com); a bare TLD never counts.
    let parent = cookie_domain.contains('.')
        && host.len() > cookie_domain.len()
        && host.ends_with(cookie_domain)
        && host.as_bytes()[host.len() - cookie_domain.len() - 1] == b'.';
    // Subdomain cookie ("auth.chatgpt.com" for chatgpt.com).
    let child = cookie_domain.len() > host.len()
        && cookie_domain.ends_with(host)
        && cookie_domain.as_bytes()[cookie_domain.len() - host.len() - 1] == b'.';
    parent || child
}

/// Pick the platform whose domain the most cookies belong to.
///
/// Ties go to the earlier registry entry; no hits at all yields `None`.
pub fn detect_target(cookies: &[CookieRecord], platforms: &[PlatformEntry]) -> Option<String> {
    let domains: Vec<String> = cookies.iter().map(CookieRecord::normalized_domain).collect();
    let mut best: Option<(&PlatformEntry, usize)> = None;

    for platform in platforms {
        let Some(host) = platform.host() else { continue };
        let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
        let hits = domains.iter().filter(|d| cookie_applies_to(d, &host)).count();
        if hits > 0 && best.is_none_or(|(_, top)| hits > top) {
            best = Some((platform, hits));
        }
    }

    best.map(|(platform, _)| platform.id.clone())
}
