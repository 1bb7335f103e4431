use serde::{Deserialize, Serialize};

/// Summary row of the transport organizer list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportSummary {
    pub number: String,
    pub owner: String,
    pub description: String,
    /// K = workbench request, W = customizing request, S = task.
    #[serde(default)]
    pub request_type: String,
    /// D = modifiable, R = released.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub changed_at: String,
    #[serde(default)]
    pub client: String,
}

/// Detailed view of one transport request: the summary plus its tasks and
/// recorded objects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportDetails {
    #[serde(flatten)]
    pub summary: TransportSummary,
    pub tasks: Vec<TransportTask>,
    pub objects: Vec<TransportObject>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportTask {
    pub number: String,
    #[serde(default)]
    pub parent: String,
    pub owner: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    pub objects: Vec<TransportObject>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportObject {
    /// R3TR, LIMU, CORR.
    pub pgmid: String,
    /// PROG, CLAS, DEVC, ...
    pub object_type: String,
    pub name: String,
    #[serde(default)]
    pub info: String,
}

/// Result of the transport pre-check for an object: how changes to it would
/// be recorded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportInfo {
    pub pgmid: String,
    pub object: String,
    pub object_name: String,
    pub operation: String,
    pub dev_class: String,
    pub recording: String,
}

/// Options for creating a transport request.
#[derive(Debug, Clone, Default)]
pub struct CreateTransportOptions {
    pub description: String,
    pub package: String,
    pub transport_layer: Option<String>,
    /// "workbench" (default) or "customizing".
    pub customizing: bool,
}

/// Options for releasing a transport request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseTransportOptions {
    pub ignore_locks: bool,
    pub skip_atc: bool,
}
