use serde::{Deserialize, Serialize};

use crate::domain::error::{AdtError, Result};

/// One HTTP cookie carried into the session, either from a Netscape cookie
/// file or a `k=v; k=v` cookie string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        SessionCookie {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: "/".into(),
            secure: false,
            http_only: false,
        }
    }
}

/// Authentication material: basic credentials or a pre-populated cookie set.
/// The two are mutually exclusive per engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthMaterial {
    Basic { username: String, password: String },
    Cookies(Vec<SessionCookie>),
}

impl AuthMaterial {
    pub fn username(&self) -> Option<&str> {
        match self {
            AuthMaterial::Basic { username, .. } => Some(username),
            AuthMaterial::Cookies(_) => None,
        }
    }
}

/// The remote SAP system: base URL, client, language, TLS flag and auth
/// material. Immutable after construction; one per engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemEndpoint {
    pub base_url: String,
    pub client: String,
    pub language: String,
    pub insecure: bool,
    pub auth: AuthMaterial,
}

impl SystemEndpoint {
    pub fn new(
        base_url: impl Into<String>,
        client: impl Into<String>,
        language: impl Into<String>,
        insecure: bool,
        auth: AuthMaterial,
    ) -> Result<Self> {
        let base_url: String = base_url.into();
        if base_url.is_empty() {
            return Err(AdtError::InvalidArgument("base URL is required".into()));
        }
        let endpoint = SystemEndpoint {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: client.into(),
            language: language.into(),
            insecure,
            auth,
        };
        Ok(endpoint)
    }

    /// Basic-auth convenience constructor with the standard defaults
    /// (client 001, language EN).
    pub fn basic(base_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        SystemEndpoint::new(
            base_url,
            "001",
            "EN",
            false,
            AuthMaterial::Basic {
                username: username.into(),
                password: password.into(),
            },
        )
    }
}
