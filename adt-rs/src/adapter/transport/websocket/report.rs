//! Report-domain verbs: run a report with optional ALV capture, and read or
//! write its text elements and variants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::adapter::transport::websocket::client::VspClient;
use crate::adapter::transport::websocket::messages::WsDomain;
use crate::domain::error::Result;

/// Reports can run long; give them a larger deadline.
const REPORT_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Clone, Default)]
pub struct RunReportParams {
    pub report: String,
    pub variant: Option<String>,
    pub params: BTreeMap<String, String>,
    pub capture_alv: bool,
    pub max_rows: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlvColumn {
    pub name: String,
    #[serde(default, rename = "type")]
    pub column_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReportResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub report: String,
    #[serde(default)]
    pub runtime_ms: u64,
    #[serde(default)]
    pub alv_captured: bool,
    #[serde(default)]
    pub columns: Vec<AlvColumn>,
    #[serde(default)]
    pub rows: Vec<BTreeMap<String, String>>,
    #[serde(default)]
    pub total_rows: u64,
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextElements {
    #[serde(default)]
    pub program: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub selection_texts: BTreeMap<String, String>,
    #[serde(default)]
    pub text_symbols: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetTextElementsResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub program: String,
    #[serde(default)]
    pub selection_texts_set: u32,
    #[serde(default)]
    pub text_symbols_set: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportVariant {
    pub name: String,
    #[serde(default)]
    pub protected: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportVariants {
    #[serde(default)]
    pub report: String,
    #[serde(default)]
    pub variants: Vec<ReportVariant>,
}

impl VspClient {
    pub async fn run_report(&self, params: RunReportParams) -> Result<RunReportResult> {
        let mut body = json!({
            "report": params.report,
            "capture_alv": params.capture_alv,
        });
        if let Some(variant) = &params.variant {
            body["variant"] = json!(variant);
        }
        if !params.params.is_empty() {
            body["params"] = json!(params.params);
        }
        if let Some(max_rows) = params.max_rows {
            body["max_rows"] = json!(max_rows);
        }
        let data = self
            .call(WsDomain::Report, "runReport", Some(body), Some(REPORT_TIMEOUT_MS))
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn get_text_elements(&self, program: &str, language: Option<&str>) -> Result<TextElements> {
        let mut body = json!({"program": program});
        if let Some(language) = language {
            body["language"] = json!(language);
        }
        let data = self
            .call(WsDomain::Report, "getTextElements", Some(body), None)
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn set_text_elements(
        &self,
        program: &str,
        language: Option<&str>,
        selection_texts: BTreeMap<String, String>,
        text_symbols: BTreeMap<String, String>,
    ) -> Result<SetTextElementsResult> {
        let mut body = json!({"program": program});
        if let Some(language) = language {
            body["language"] = json!(language);
        }
        if !selection_texts.is_empty() {
            body["selection_texts"] = json!(selection_texts);
        }
        if !text_symbols.is_empty() {
            body["text_symbols"] = json!(text_symbols);
        }
        let data = self
            .call(WsDomain::Report, "setTextElements", Some(body), None)
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn get_report_variants(&self, report: &str) -> Result<ReportVariants> {
        let data = self
            .call(WsDomain::Report, "getVariants", Some(json!({"report": report})), None)
            .await?;
        Ok(serde_json::from_value(data)?)
    }
}
