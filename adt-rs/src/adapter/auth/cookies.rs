//! Cookie ingestion for cookie-based sessions: Netscape cookie files
//! (`curl -c` format) and plain `k=v; k=v` cookie strings.

use crate::domain::error::{AdtError, Result};
use crate::domain::system::SessionCookie;

/// Parse Netscape cookie-file content.
///
/// Format: one cookie per line, seven TAB-separated columns
/// `domain  include-subdomains  path  secure  expiry  name  value`.
/// Lines starting with `#` are comments, except the `#HttpOnly_` prefix,
/// which marks an HttpOnly cookie. Blank lines and trailing whitespace are
/// tolerated.
pub fn parse_netscape(content: &str) -> Result<Vec<SessionCookie>> {
    let mut cookies = Vec::new();
    for (line_no, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim_end();
        if line.trim().is_empty() {
            continue;
        }

        let (line, http_only) = match line.strip_prefix("#HttpOnly_") {
            Some(rest) => (rest, true),
            None => {
                if line.starts_with('#') {
                    continue;
                }
                (line, false)
            }
        };

        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() < 7 {
            return Err(AdtError::InvalidArgument(format!(
                "cookie file line {}: expected 7 tab-separated columns, got {}",
                line_no + 1,
                columns.len()
            )));
        }

        cookies.push(SessionCookie {
            domain: columns[0].to_string(),
            path: columns[2].to_string(),
            secure: columns[3].eq_ignore_ascii_case("TRUE"),
            name: columns[5].to_string(),
            value: columns[6].to_string(),
            http_only,
        });
    }
    Ok(cookies)
}

/// Parse a `k=v; k=v` cookie string (as copied from a browser).
pub fn parse_cookie_string(input: &str) -> Result<Vec<SessionCookie>> {
    let mut cookies = Vec::new();
    for pair in input.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (name, value) = pair.split_once('=').ok_or_else(|| {
            AdtError::InvalidArgument(format!("cookie pair '{pair}' is missing '='"))
        })?;
        cookies.push(SessionCookie::new(name.trim(), value.trim()));
    }
    if cookies.is_empty() {
        return Err(AdtError::InvalidArgument(
            "cookie string contained no cookies".into(),
        ));
    }
    Ok(cookies)
}

/// When cookie auth carries no `sap-usercontext`, synthesize one from the
/// configured client and language so the backend binds the session.
pub fn ensure_usercontext(cookies: &mut Vec<SessionCookie>, client: &str, language: &str) {
    if cookies.iter().any(|c| c.name == "sap-usercontext") {
        return;
    }
    cookies.push(SessionCookie::new(
        "sap-usercontext",
        format!("sap-client={client}&sap-language={language}"),
    ));
}
