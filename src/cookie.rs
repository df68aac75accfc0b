//! Cookie records and a URL-scoped cookie store
//!
//! Matching follows RFC 6265 domain and path rules. The jar keeps cookies in
//! insertion order and hands them out in that order, so a snapshot lists them
//! the way they were received.

use std::net::IpAddr;
use std::sync::{PoisonError, RwLock};

use ::cookie::Cookie as RawCookie;
use chrono::{DateTime, TimeDelta, Utc};
use http::HeaderValue;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};

/// A stored cookie with its standard attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Lowercase, without a leading dot
    pub domain: String,
    pub path: String,
    /// `None` for session cookies
    pub expires: Option<DateTime<Utc>>,
    pub secure: bool,
    pub http_only: bool,
    /// Only sent to exactly `domain`, not its subdomains
    pub host_only: bool,
    /// When the cookie was stored
    pub time_stamp: DateTime<Utc>,
}

impl Cookie {
    /// A session cookie valid for `domain` and its subdomains
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: normalize_domain(&domain.into()),
            path: path.into(),
            expires: None,
            secure: false,
            http_only: false,
            host_only: false,
            time_stamp: Utc::now(),
        }
    }

    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    pub fn host_only(mut self) -> Self {
        self.host_only = true;
        self
    }

    /// Parse a `Set-Cookie` header value received from `request_url`
    ///
    /// Attribute syntax and the RFC 6265 date forms (including the legacy
    /// `Wed, 21-Oct-2015 07:28:00 GMT`) are handled by the `cookie` crate.
    /// Scoping rules are applied here.
    pub fn parse(header: &str, request_url: &Url, now: DateTime<Utc>) -> Result<Self> {
        let raw = RawCookie::parse(header)
            .map_err(|e| Error::InvalidSetCookie(format!("{header}: {e}")))?;

        let host = request_url
            .host_str()
            .map(normalize_domain)
            .ok_or_else(|| Error::InvalidSetCookie(header.to_string()))?;

        let mut cookie = Self {
            name: raw.name().to_string(),
            value: raw.value().trim_matches('"').to_string(),
            domain: host.clone(),
            path: default_path(request_url.path()),
            expires: None,
            secure: raw.secure().unwrap_or(false),
            http_only: raw.http_only().unwrap_or(false),
            host_only: true,
            time_stamp: now,
        };

        if let Some(domain) = raw.domain().map(normalize_domain).filter(|d| !d.is_empty()) {
            if !domain_matches(&host, &domain) {
                return Err(Error::InvalidSetCookie(format!(
                    "domain {domain} does not cover {host}"
                )));
            }
            cookie.domain = domain;
            cookie.host_only = false;
        }

        if let Some(path) = raw.path().filter(|p| p.starts_with('/')) {
            cookie.path = path.to_string();
        }

        // Max-Age wins over Expires
        if let Some(max_age) = raw.max_age() {
            let secs = max_age.whole_seconds();
            cookie.expires = Some(if secs <= 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                TimeDelta::try_seconds(secs)
                    .and_then(|delta| now.checked_add_signed(delta))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            });
        } else if let Some(expires) = raw.expires_datetime() {
            cookie.expires = Some(
                DateTime::from_timestamp(expires.unix_timestamp(), expires.nanosecond())
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
            );
        }

        Ok(cookie)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }

    /// Whether this cookie would be sent to `url` at time `now`
    pub fn matches(&self, url: &Url, now: DateTime<Utc>) -> bool {
        let Some(host) = url.host_str().map(normalize_domain) else {
            return false;
        };

        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            domain_matches(&host, &self.domain)
        };

        domain_ok
            && path_matches(url.path(), &self.path)
            && (!self.secure || url.scheme() == "https")
            && !self.is_expired_at(now)
    }

    fn same_identity(&self, other: &Cookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }
}

/// Thread-safe cookie store
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: RwLock<Vec<Cookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a cookie, replacing one with the same name, domain and path in place
    ///
    /// An already-expired cookie evicts its stored counterpart and is not kept.
    pub fn add(&self, cookie: Cookie) {
        let mut cookies = self.cookies.write().unwrap_or_else(PoisonError::into_inner);
        let existing = cookies.iter().position(|c| c.same_identity(&cookie));

        if cookie.is_expired_at(Utc::now()) {
            if let Some(idx) = existing {
                debug!(name = %cookie.name, domain = %cookie.domain, "Evicting expired cookie");
                cookies.remove(idx);
            }
            return;
        }

        match existing {
            Some(idx) => cookies[idx] = cookie,
            None => cookies.push(cookie),
        }
    }

    /// Parse and store a `Set-Cookie` header received from `url`
    pub fn store_set_cookie(&self, header: &str, url: &Url) -> Result<()> {
        let cookie = Cookie::parse(header, url, Utc::now())?;
        debug!(name = %cookie.name, domain = %cookie.domain, path = %cookie.path, "Storing cookie");
        self.add(cookie);
        Ok(())
    }

    /// Cookies in scope for `url`, in store order
    pub fn cookies_for(&self, url: &Url) -> Vec<Cookie> {
        self.cookies_for_at(url, Utc::now())
    }

    pub fn cookies_for_at(&self, url: &Url, now: DateTime<Utc>) -> Vec<Cookie> {
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.matches(url, now))
            .cloned()
            .collect()
    }

    /// Every stored cookie regardless of scope
    pub fn all(&self) -> Vec<Cookie> {
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.cookies.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl reqwest::cookie::CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for header in cookie_headers {
            let Ok(raw) = header.to_str() else {
                warn!(%url, "Skipping non-ASCII Set-Cookie header");
                continue;
            };
            if let Err(e) = self.store_set_cookie(raw, url) {
                warn!(%url, error = %e, "Rejected Set-Cookie header");
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self
            .cookies_for(url)
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");

        if header.is_empty() {
            return None;
        }
        HeaderValue::from_str(&header).ok()
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// RFC 6265 section 5.1.3
fn domain_matches(host: &str, domain: &str) -> bool {
    if host == domain {
        return true;
    }
    host.parse::<IpAddr>().is_err()
        && host.len() > domain.len()
        && host.ends_with(domain)
        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
}

/// RFC 6265 section 5.1.4
fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/')
            || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/'))
}

fn default_path(request_path: &str) -> String {
    if !request_path.starts_with('/') {
        return "/".to_string();
    }
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => request_path[..idx].to_string(),
    }
}
