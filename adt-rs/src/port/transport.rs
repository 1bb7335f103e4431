use async_trait::async_trait;

use crate::domain::error::Result;

/// HTTP method subset the ADT surface uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Non-idempotent methods need a CSRF token.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Method::Get)
    }
}

/// One ADT request. Paths are relative to the configured base URL; the
/// transport appends `sap-client`/`sap-language` unless the caller already
/// set them.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
    pub content_type: Option<String>,
    pub accept: Option<String>,
}

impl RequestOptions {
    pub fn get() -> Self {
        RequestOptions::default()
    }

    pub fn post() -> Self {
        RequestOptions {
            method: Method::Post,
            ..RequestOptions::default()
        }
    }

    pub fn put() -> Self {
        RequestOptions {
            method: Method::Put,
            ..RequestOptions::default()
        }
    }

    pub fn delete() -> Self {
        RequestOptions {
            method: Method::Delete,
            ..RequestOptions::default()
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }
}

/// A decoded ADT response. ADT payloads are text (XML, ABAP serialization or
/// plain source).
#[derive(Debug, Clone, Default)]
pub struct AdtResponse {
    pub status: u16,
    pub body: String,
    pub content_type: Option<String>,
}

/// The transport seam. The HTTP adapter implements this against a live
/// system; tests implement it with scripted responses.
///
/// Implementations classify failures into the engine error taxonomy before
/// returning, so services above never see raw HTTP statuses on the error
/// path.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, path: &str, options: RequestOptions) -> Result<AdtResponse>;
}
