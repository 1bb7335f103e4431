//! The engine value: one SAP system, one shared HTTP transport, one safety
//! policy, and a lazily established WebSocket session. All read, CRUD,
//! workflow, deployment and CTS operations hang off this type (in the
//! sibling service modules).

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::adapter::transport::http::HttpTransport;
use crate::adapter::transport::websocket::VspClient;
use crate::domain::error::Result;
use crate::domain::safety::{OperationClass, SafetyPolicy};
use crate::domain::system::SystemEndpoint;
use crate::port::transport::Transport;

pub struct Engine {
    transport: Arc<dyn Transport>,
    safety: SafetyPolicy,
    system: SystemEndpoint,
    vsp: Mutex<Option<VspClient>>,
}

impl Engine {
    /// Build an engine with the live HTTP transport.
    pub fn new(system: SystemEndpoint, safety: SafetyPolicy) -> Result<Engine> {
        let transport = Arc::new(HttpTransport::new(&system)?);
        Ok(Engine::with_transport(transport, system, safety))
    }

    /// Build an engine over any transport implementation. Tests inject
    /// recording mocks here.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        system: SystemEndpoint,
        safety: SafetyPolicy,
    ) -> Engine {
        Engine {
            transport,
            safety,
            system,
            vsp: Mutex::new(None),
        }
    }

    pub fn safety(&self) -> &SafetyPolicy {
        &self.safety
    }

    pub fn system(&self) -> &SystemEndpoint {
        &self.system
    }

    /// The user the engine acts as, used for transport listings and the
    /// `adtcore:responsible` default.
    pub fn username(&self) -> String {
        self.system
            .auth
            .username()
            .unwrap_or("DEVELOPER")
            .to_string()
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Gate helper: evaluated before any network I/O of an operation.
    pub(crate) fn gate(&self, op: OperationClass, op_name: &str) -> Result<()> {
        self.safety.check_operation(op, op_name)
    }

    /// The shared ZADT_VSP session, connected on first use.
    pub async fn vsp(&self) -> Result<VspClient> {
        let mut slot = self.vsp.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = VspClient::connect(&self.system).await?;
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Drop the WebSocket session (it reconnects on next use).
    pub async fn disconnect_vsp(&self) {
        let mut slot = self.vsp.lock().await;
        if let Some(client) = slot.take() {
            let _ = client.close().await;
        }
    }
}
