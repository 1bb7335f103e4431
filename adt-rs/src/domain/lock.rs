use serde::{Deserialize, Serialize};

/// A server-issued edit lock. Acquired by `Engine::lock`, consumed by at
/// most one update/delete and exactly one unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHandle {
    pub handle: String,
    /// Transport request the object is recorded on, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corr_nr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corr_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corr_text: Option<String>,
    pub is_local: bool,
    pub is_link_up: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_support: Option<String>,
}
