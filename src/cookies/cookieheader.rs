//! `Cookie` / `Set-Cookie` header helpers.

use crate::base::neterror::NetError;
use http::header::SET_COOKIE;
use http::HeaderMap;
use std::collections::HashMap;

/// Parse a client `Cookie` header into a name -> value map.
///
/// Segments are split on `;` and the first `=` of each separates the pair.
/// Segments without `=` are skipped, surrounding DQUOTEs are removed from
/// values, and the first occurrence of a name wins.
pub fn parse_cookie_header(header: &str) -> Result<HashMap<String, String>, NetError> {
    let mut cookies = HashMap::new();

    for segment in header.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        if segment.starts_with('=') {
            return Err(NetError::CookieInvalidHeader);
        }
        let Some((name, value)) = segment.split_once('=') else {
            continue;
        };

        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);

        cookies
            .entry(name.trim().to_string())
            .or_insert_with(|| value.to_string());
    }

    Ok(cookies)
}

/// Every `Set-Cookie` value as its own entry.
///
/// `Set-Cookie` must never be comma-joined since `Expires` dates contain commas.
pub fn extract_set_cookie_headers(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .collect()
}
