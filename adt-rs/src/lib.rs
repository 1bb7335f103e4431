//! An SAP ABAP Development Tools (ADT) client engine for LLM-driven CLI
//! agents.
//!
//! The crate turns high-level tool invocations into the stateful HTTP and
//! WebSocket traffic the ADT surface requires: CSRF-bound sessions, the
//! lock/modify/unlock/activate protocol, three-phase abapGit deployments
//! with iterative activation, and the ZADT_VSP WebSocket multiplexer for
//! streamed exports and debugger traffic.
//!
//! The layout follows a hexagonal split: `domain` holds the core types and
//! the error taxonomy, `port` the transport seam, `adapter` the concrete
//! HTTP/WebSocket transports and auth parsers, `application` the wire
//! codecs and archive handling, and `services` the [`Engine`] with the
//! read/CRUD/workflow/deployment APIs.
//!
//! # Example
//!
//! ```rust,no_run
//! use adt_rs::{Engine, ObjectKind, ObjectRef, SafetyPolicy, SystemEndpoint};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let system = SystemEndpoint::basic("http://a4h:50000", "DEVELOPER", "secret")?;
//!     let engine = Engine::new(system, SafetyPolicy::read_only_default())?;
//!
//!     let program = ObjectRef::new(ObjectKind::Program, "ZTEST");
//!     let source = engine.get_source(&program).await?;
//!     println!("{source}");
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod port;
pub mod services;

// Public API exports
pub use domain::{
    severity_is_error, ActivationMessage, ActivationResult, AdtError, AuthMaterial, ClassInclude,
    CreateTransportOptions, DependencyNode, DependencyTree, InactiveObject, LockHandle,
    ObjectKind, ObjectRef, OperationClass, ReleaseTransportOptions, Result, SafetyPolicy,
    SessionCookie, SyntaxDiagnostic, SystemEndpoint, TransportDetails, TransportInfo,
    TransportSummary, UnitTestFlags, UnitTestResult,
};

pub use port::{AdtResponse, Method, RequestOptions, Transport};

pub use adapter::transport::websocket::{VspClient, WelcomeInfo, WsDomain, WsEvent};
pub use adapter::HttpTransport;

pub use services::{
    CdsDependencyOptions, CreateClassResult, CreateOptions, DependencyLevel, DeployOptions,
    DeployReport, EditParams, EditResult, Engine, PackageInfo, PackageObject, QueryResult,
    RenameResult, SearchResult, WriteResult,
};

pub use application::archive;
