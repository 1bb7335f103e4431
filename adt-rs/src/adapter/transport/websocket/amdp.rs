//! AMDP debugger verbs on the `amdp` domain. Break events arrive either in
//! the reply of `resume`/`executeAndDebug` or asynchronously on the events
//! channel.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::adapter::transport::websocket::client::VspClient;
use crate::adapter::transport::websocket::messages::WsDomain;
use crate::domain::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmdpPosition {
    #[serde(default)]
    pub program: String,
    #[serde(default)]
    pub include: String,
    #[serde(default)]
    pub line: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmdpNativePosition {
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub line: u32,
}

/// One event reported by resume / executeAndDebug: on_break,
/// on_toggle_breakpoints or on_execution_end.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmdpEvent {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub context_id: String,
    #[serde(default)]
    pub abap_position: Option<AmdpPosition>,
    #[serde(default)]
    pub native_position: Option<AmdpNativePosition>,
    #[serde(default)]
    pub variable_count: u32,
    #[serde(default)]
    pub stack_depth: u32,
    #[serde(default)]
    pub aborted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmdpResumeResult {
    #[serde(default)]
    pub events: Vec<AmdpEvent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmdpBreakpoint {
    #[serde(default)]
    pub program: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmdpBreakpointsResult {
    #[serde(default)]
    pub breakpoints: Vec<AmdpBreakpoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmdpVariable {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, rename = "type")]
    pub var_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmdpVariablesResult {
    #[serde(default)]
    pub variables: Vec<AmdpVariable>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmdpStatus {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub context_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmdpExecuteDebugResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub execution_rows: u64,
    #[serde(default)]
    pub execution_error: String,
    #[serde(default)]
    pub events: Vec<AmdpEvent>,
}

impl VspClient {
    /// Start an AMDP debug session. `cascade_mode` defaults to FULL.
    pub async fn amdp_start(&self, user: &str, cascade_mode: Option<&str>) -> Result<()> {
        let params = json!({
            "user": user,
            "cascadeMode": cascade_mode.unwrap_or("FULL"),
        });
        self.call(WsDomain::Amdp, "start", Some(params), None).await?;
        Ok(())
    }

    pub async fn amdp_stop(&self) -> Result<()> {
        self.call(WsDomain::Amdp, "stop", None, None).await?;
        Ok(())
    }

    /// Resume execution and wait for the next break (or execution end).
    pub async fn amdp_resume(&self) -> Result<AmdpResumeResult> {
        let data = self.call(WsDomain::Amdp, "resume", None, None).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// `step_type`: over (default), into, out.
    pub async fn amdp_step(&self, step_type: Option<&str>) -> Result<()> {
        let params = json!({"type": step_type.unwrap_or("over")});
        self.call(WsDomain::Amdp, "step", Some(params), None).await?;
        Ok(())
    }

    pub async fn amdp_set_breakpoint(&self, program: &str, line: u32) -> Result<()> {
        let params = json!({"program": program, "line": line});
        self.call(WsDomain::Amdp, "setBreakpoint", Some(params), None)
            .await?;
        Ok(())
    }

    pub async fn amdp_breakpoints(&self) -> Result<AmdpBreakpointsResult> {
        let data = self.call(WsDomain::Amdp, "getBreakpoints", None, None).await?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn amdp_variables(&self) -> Result<AmdpVariablesResult> {
        let data = self.call(WsDomain::Amdp, "getVariables", None, None).await?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn amdp_status(&self) -> Result<AmdpStatus> {
        let data = self.call(WsDomain::Amdp, "getStatus", None, None).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// Start, set a breakpoint, execute and resume in one server round trip,
    /// so the breakpoint is hit inside the same ABAP session.
    pub async fn amdp_execute_and_debug(
        &self,
        class: &str,
        method: &str,
        line: u32,
        count: u32,
        cascade_mode: Option<&str>,
    ) -> Result<AmdpExecuteDebugResult> {
        let params = json!({
            "class": class,
            "method": method,
            "line": line,
            "count": count,
            "cascadeMode": cascade_mode.unwrap_or("FULL"),
        });
        let data = self
            .call(WsDomain::Amdp, "executeAndDebug", Some(params), Some(120_000))
            .await?;
        Ok(serde_json::from_value(data)?)
    }
}
