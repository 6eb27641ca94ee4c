//! Single cookie representation with `Set-Cookie` serialization and parsing.

use crate::base::neterror::NetError;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::format_description::well_known::Rfc2822;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// IMF-fixdate, the preferred HTTP-date form (RFC 7231 §7.1.1.1).
const HTTP_DATE: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Represents a cookie.
/// Modeled after Chromium's `net::CanonicalCookie`, but keeps the raw
/// attributes as received instead of resolving them against a URL.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CanonicalCookie {
    pub name: String,
    pub value: String,
    pub expires: Option<OffsetDateTime>,
    pub max_age: Option<i64>,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub partitioned: bool,
    pub same_site: Option<SameSite>,
    /// Raw `key=value` attributes that are not recognized, in order of appearance.
    pub unparsed: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    /// `SameSite=None`.
    NoRestriction,
}

impl SameSite {
    /// Parse an attribute value, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("strict") {
            Some(Self::Strict)
        } else if value.eq_ignore_ascii_case("lax") {
            Some(Self::Lax)
        } else if value.eq_ignore_ascii_case("none") {
            Some(Self::NoRestriction)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::NoRestriction => "None",
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reserved name prefixes from RFC 6265bis §4.1.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NamePrefix {
    /// `__Secure-`, or the legacy `__Secure` without a dash.
    Secure,
    /// `__Host-`
    Host,
}

impl NamePrefix {
    fn of(name: &str) -> Option<Self> {
        if name.starts_with("__Host-") {
            Some(Self::Host)
        } else if name.starts_with("__Secure") {
            Some(Self::Secure)
        } else {
            None
        }
    }
}

impl CanonicalCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn with_expires(mut self, expires: OffsetDateTime) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Set the expiry from a millisecond Unix epoch.
    pub fn with_expires_millis(mut self, millis: i64) -> Result<Self, NetError> {
        let nanos = i128::from(millis) * 1_000_000;
        let expires = OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map_err(|_| NetError::CookieInvalidExpires)?;
        self.expires = Some(expires);
        Ok(self)
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn partitioned(mut self, partitioned: bool) -> Self {
        self.partitioned = partitioned;
        self
    }

    /// A cookie is expired once its absolute expiry is not in the future.
    /// Cookies without `expires` live for the session.
    pub fn is_expired(&self, current_time: OffsetDateTime) -> bool {
        self.expires.is_some_and(|expiry| expiry <= current_time)
    }

    /// Validate `__Secure-` and `__Host-` cookie prefixes per RFC 6265bis.
    /// - `__Secure-` cookies MUST have the Secure attribute
    /// - `__Host-` cookies MUST have Secure, Path="/", and no Domain attribute
    pub fn validate_prefix(&self) -> Result<(), NetError> {
        match NamePrefix::of(&self.name) {
            Some(NamePrefix::Secure) if !self.secure => Err(NetError::CookieInvalidPrefix),
            Some(NamePrefix::Host)
                if !self.secure || self.path.as_deref() != Some("/") || self.domain.is_some() =>
            {
                Err(NetError::CookieInvalidPrefix)
            }
            _ => Ok(()),
        }
    }

    /// Serialize into a single `Set-Cookie` header value.
    ///
    /// A cookie without a name serializes to an empty string. Reserved
    /// name prefixes force their implied attributes: `__Secure` adds
    /// `Secure`; `__Host-` adds `Secure`, pins `Path=/` and drops `Domain`.
    pub fn serialize(&self) -> Result<String, NetError> {
        if self.name.is_empty() {
            return Ok(String::new());
        }
        if !is_valid_name(&self.name) {
            return Err(NetError::CookieInvalidName);
        }
        if !is_valid_value(&self.value) {
            return Err(NetError::CookieInvalidValue);
        }

        let prefix = NamePrefix::of(&self.name);
        let secure = self.secure || prefix.is_some();
        let (domain, path) = match prefix {
            Some(NamePrefix::Host) => (None, Some("/")),
            _ => (self.domain.as_deref(), self.path.as_deref()),
        };

        let mut out = format!("{}={}", self.name, self.value);

        if secure {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if self.partitioned {
            out.push_str("; Partitioned");
        }
        if let Some(max_age) = self.max_age {
            if max_age < 0 {
                return Err(NetError::CookieInvalidMaxAge);
            }
            out.push_str(&format!("; Max-Age={}", max_age));
        }
        if let Some(domain) = domain {
            if !is_valid_domain(domain) {
                return Err(NetError::CookieInvalidDomain);
            }
            out.push_str(&format!("; Domain={}", domain));
        }
        if let Some(same_site) = self.same_site {
            out.push_str(&format!("; SameSite={}", same_site));
        }
        if let Some(path) = path {
            if !is_valid_path(path) {
                return Err(NetError::CookieInvalidPath);
            }
            out.push_str(&format!("; Path={}", path));
        }
        if let Some(expires) = self.expires {
            out.push_str(&format!("; Expires={}", format_http_date(expires)?));
        }
        for attr in &self.unparsed {
            out.push_str("; ");
            out.push_str(attr);
        }

        Ok(out)
    }

    /// Parse a single `Set-Cookie` header value.
    ///
    /// Returns `None` when the cookie must be dropped: it has no name, its
    /// `Max-Age` is negative, or it violates its reserved name prefix.
    /// Unknown attributes are kept verbatim in [`unparsed`](Self::unparsed).
    pub fn parse(line: &str) -> Option<Self> {
        let mut segments = line.split(';');
        let pair = segments.next().unwrap_or_default();

        // Only the first '=' separates name from value.
        let (name, value) = match pair.split_once('=') {
            Some((name, value)) => (name.trim(), value.trim()),
            None => ("", pair.trim()),
        };
        if name.is_empty() {
            tracing::debug!(line = %line, "dropping cookie without a name");
            return None;
        }

        let mut cookie = Self::new(name, value);

        for segment in segments {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (key, val) = match segment.split_once('=') {
                Some((key, val)) => (key.trim(), val.trim()),
                None => (segment, ""),
            };

            match key.to_ascii_lowercase().as_str() {
                "expires" => match parse_http_date(val) {
                    Some(expires) => cookie.expires = Some(expires),
                    None => {
                        tracing::debug!(name = %cookie.name, expires = %val, "ignoring bad Expires")
                    }
                },
                "max-age" => match val.parse::<i64>() {
                    Ok(seconds) if seconds < 0 => {
                        tracing::debug!(
                            name = %cookie.name,
                            max_age = seconds,
                            "dropping cookie with negative Max-Age"
                        );
                        return None;
                    }
                    Ok(seconds) => cookie.max_age = Some(seconds),
                    Err(_) => {
                        tracing::debug!(name = %cookie.name, max_age = %val, "ignoring bad Max-Age")
                    }
                },
                "domain" => {
                    let domain = val.strip_prefix('.').unwrap_or(val);
                    if !domain.is_empty() {
                        cookie.domain = Some(domain.to_string());
                    }
                }
                "path" => {
                    // A missing or relative path falls back to the default path.
                    if val.starts_with('/') {
                        cookie.path = Some(val.to_string());
                    }
                }
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                "samesite" => match SameSite::parse(val) {
                    Some(same_site) => cookie.same_site = Some(same_site),
                    None => cookie.unparsed.push(segment.to_string()),
                },
                _ => cookie.unparsed.push(segment.to_string()),
            }
        }

        if cookie.validate_prefix().is_err() {
            tracing::warn!(name = %cookie.name, "dropping cookie that violates its name prefix");
            return None;
        }

        Some(cookie)
    }
}

/// RFC 7230 `token`: no whitespace, quotes, separators or controls.
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'-'
                        | b'.'
                        | b'^'
                        | b'_'
                        | b'`'
                        | b'|'
                        | b'~'
                )
        })
}

/// RFC 6265 `cookie-value`, optionally wrapped in DQUOTEs.
pub(crate) fn is_valid_value(value: &str) -> bool {
    let inner = match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => inner,
        None => value,
    };
    inner
        .bytes()
        .all(|b| matches!(b, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E))
}

/// Hostname labels: alphanumerics and '-', never leading or trailing '-'.
pub(crate) fn is_valid_domain(domain: &str) -> bool {
    let domain = domain.strip_prefix('.').unwrap_or(domain);
    !domain.is_empty()
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        })
}

pub(crate) fn is_valid_path(path: &str) -> bool {
    path.bytes().all(|b| (0x20..=0x7E).contains(&b) && b != b';')
}

pub(crate) fn format_http_date(time: OffsetDateTime) -> Result<String, NetError> {
    time.to_offset(UtcOffset::UTC)
        .format(HTTP_DATE)
        .map_err(|_| NetError::CookieInvalidExpires)
}

pub(crate) fn parse_http_date(value: &str) -> Option<OffsetDateTime> {
    PrimitiveDateTime::parse(value, HTTP_DATE)
        .map(PrimitiveDateTime::assume_utc)
        .or_else(|_| OffsetDateTime::parse(value, &Rfc2822))
        .ok()
}
