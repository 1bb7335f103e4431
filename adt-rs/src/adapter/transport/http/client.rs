//! The stateful HTTP transport: URL composition, session cookie jar, CSRF
//! acquisition with a single refresh-and-retry, auth headers and error
//! classification.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use tokio::sync::Mutex;
use tracing::{debug, trace};
use url::Url;

use crate::adapter::auth;
use crate::domain::error::{AdtError, Result};
use crate::domain::system::{AuthMaterial, SystemEndpoint};
use crate::port::transport::{AdtResponse, Method, RequestOptions, Transport};

/// ADT discovery path used for CSRF token fetches.
const DISCOVERY_PATH: &str = "/sap/bc/adt/discovery";

const DEFAULT_ACCEPT: &str = "application/*";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

struct RawResponse {
    status: u16,
    headers: HeaderMap,
    body: String,
    content_type: Option<String>,
}

/// Shared HTTP primitive for all engine services. Multiple requests may be
/// in flight; only the CSRF refresh is a serialized critical section. The
/// cookie jar is owned by the inner reqwest client and never touched by any
/// other component.
pub struct HttpTransport {
    http: reqwest::Client,
    base: Url,
    client_id: String,
    language: String,
    basic: Option<(String, String)>,
    csrf: Mutex<Option<String>>,
}

impl HttpTransport {
    pub fn new(endpoint: &SystemEndpoint) -> Result<Self> {
        let base = Url::parse(&endpoint.base_url)
            .map_err(|err| AdtError::InvalidArgument(format!("invalid base URL: {err}")))?;

        let jar = Arc::new(reqwest::cookie::Jar::default());
        let mut basic = None;
        match &endpoint.auth {
            AuthMaterial::Basic { username, password } => {
                basic = Some((username.clone(), password.clone()));
            }
            AuthMaterial::Cookies(cookies) => {
                let mut cookies = cookies.clone();
                auth::ensure_usercontext(&mut cookies, &endpoint.client, &endpoint.language);
                for cookie in &cookies {
                    let mut attrs = format!("{}={}; Path={}", cookie.name, cookie.value, cookie.path);
                    if cookie.secure {
                        attrs.push_str("; Secure");
                    }
                    if cookie.http_only {
                        attrs.push_str("; HttpOnly");
                    }
                    jar.add_cookie_str(&attrs, &base);
                }
            }
        }

        let http = reqwest::Client::builder()
            .cookie_provider(jar)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .danger_accept_invalid_certs(endpoint.insecure)
            .build()
            .map_err(|err| AdtError::Network(format!("failed to build HTTP client: {err}")))?;

        Ok(HttpTransport {
            http,
            base,
            client_id: endpoint.client.clone(),
            language: endpoint.language.clone(),
            basic,
            csrf: Mutex::new(None),
        })
    }

    fn build_url(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
        let mut url = self
            .base
            .join(path)
            .map_err(|err| AdtError::InvalidArgument(format!("invalid request path {path}: {err}")))?;
        for (key, value) in query {
            url.query_pairs_mut().append_pair(key, value);
        }
        let has_client = url.query_pairs().any(|(key, _)| key == "sap-client");
        let has_language = url.query_pairs().any(|(key, _)| key == "sap-language");
        if !has_client {
            url.query_pairs_mut()
                .append_pair("sap-client", &self.client_id);
        }
        if !has_language {
            url.query_pairs_mut()
                .append_pair("sap-language", &self.language);
        }
        Ok(url)
    }

    async fn send(
        &self,
        url: Url,
        options: &RequestOptions,
        csrf_token: Option<&str>,
    ) -> Result<RawResponse> {
        let method = match options.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut request = self.http.request(method, url.clone());
        if let Some((username, password)) = &self.basic {
            request = request.basic_auth(username, Some(password));
        }

        let accept = options.accept.as_deref().unwrap_or(DEFAULT_ACCEPT);
        request = request.header(ACCEPT, accept);

        if let Some(token) = csrf_token {
            request = request.header(
                "x-csrf-token",
                HeaderValue::from_str(token)
                    .map_err(|_| AdtError::AuthFailed("unusable CSRF token".into()))?,
            );
        }

        if let Some(body) = &options.body {
            let content_type = options.content_type.clone().unwrap_or_else(|| {
                if body.trim_start().starts_with("<?xml") {
                    "application/*".to_string()
                } else {
                    "text/plain; charset=utf-8".to_string()
                }
            });
            request = request.header(CONTENT_TYPE, content_type).body(body.clone());
        }

        debug!(method = options.method.as_str(), url = %url, "adt request");
        let response = request.send().await.map_err(classify_reqwest)?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(classify_reqwest)?;

        debug!(status, bytes = body.len(), "adt response");
        trace!(body = %body, "adt response body");

        Ok(RawResponse {
            status,
            headers,
            body,
            content_type,
        })
    }

    /// Return the cached CSRF token, fetching (or with `force`, refetching)
    /// it first. Concurrent callers serialize here.
    async fn csrf_token(&self, force: bool) -> Result<String> {
        let mut slot = self.csrf.lock().await;
        if !force {
            if let Some(token) = slot.as_ref() {
                return Ok(token.clone());
            }
        }
        *slot = None;

        let url = self.build_url(DISCOVERY_PATH, &[])?;
        let mut request = self
            .http
            .get(url)
            .header(ACCEPT, DEFAULT_ACCEPT)
            .header("x-csrf-token", "fetch");
        if let Some((username, password)) = &self.basic {
            request = request.basic_auth(username, Some(password));
        }
        let response = request.send().await.map_err(classify_reqwest)?;
        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Err(AdtError::AuthFailed(format!(
                "CSRF token fetch rejected with HTTP {status}"
            )));
        }
        let token = response
            .headers()
            .get("x-csrf-token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AdtError::AuthFailed("server did not issue a CSRF token".into()))?;
        debug!("fetched CSRF token");
        *slot = Some(token.clone());
        Ok(token)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, path: &str, options: RequestOptions) -> Result<AdtResponse> {
        let url = self.build_url(path, &options.query)?;

        if !options.method.is_mutating() {
            let raw = self.send(url, &options, None).await?;
            return classify(raw);
        }

        let token = self.csrf_token(false).await?;
        let raw = self.send(url.clone(), &options, Some(&token)).await?;
        if !csrf_rejected(&raw) {
            return classify(raw);
        }

        debug!("CSRF token invalidated, refreshing once");
        let token = self.csrf_token(true).await?;
        let raw = self.send(url, &options, Some(&token)).await?;
        if csrf_rejected(&raw) {
            return Err(AdtError::AuthFailed(
                "CSRF token rejected twice in one request; session is invalid".into(),
            ));
        }
        classify(raw)
    }
}

/// A 403 carrying `x-csrf-token: Required` means the token is stale.
fn csrf_rejected(raw: &RawResponse) -> bool {
    raw.status == 403
        && raw
            .headers
            .get("x-csrf-token")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("required"))
            .unwrap_or(false)
}

fn classify_reqwest(err: reqwest::Error) -> AdtError {
    if err.is_timeout() {
        AdtError::Timeout(err.to_string())
    } else {
        AdtError::Network(err.to_string())
    }
}

/// Map the HTTP status onto the engine taxonomy, preserving the server text.
fn classify(raw: RawResponse) -> Result<AdtResponse> {
    let RawResponse {
        status,
        body,
        content_type,
        ..
    } = raw;

    if (200..300).contains(&status) {
        return Ok(AdtResponse {
            status,
            body,
            content_type,
        });
    }

    let message = if body.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        body.trim().to_string()
    };

    if (400..500).contains(&status) {
        if message.contains("AlreadyExists") || message.contains("already exist") {
            return Err(AdtError::AlreadyExists(message));
        }
        let lower = message.to_ascii_lowercase();
        if lower.contains("locked") || lower.contains("foreign lock") {
            return Err(AdtError::LockConflict(message));
        }
        return Err(match status {
            401 | 403 => AdtError::AuthFailed(message),
            404 => AdtError::NotFound(message),
            _ => AdtError::InvalidArgument(message),
        });
    }

    Err(AdtError::Server { status, message })
}
