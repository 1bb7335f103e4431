//! Core types of the ADT engine: object addressing, the safety policy, the
//! error taxonomy, and the result records the wire codecs decode into.

pub mod check;
pub mod cts;
pub mod dependency;
pub mod error;
pub mod lock;
pub mod object;
pub mod safety;
pub mod system;

pub use check::{
    severity_is_error, ActivationMessage, ActivationResult, InactiveObject, SyntaxDiagnostic,
    UnitTestAlert, UnitTestClass, UnitTestFlags, UnitTestMethod, UnitTestResult,
    UnitTestStackEntry,
};
pub use cts::{
    CreateTransportOptions, ReleaseTransportOptions, TransportDetails, TransportInfo,
    TransportObject, TransportSummary, TransportTask,
};
pub use dependency::{DependencyNode, DependencyTree};
pub use error::{AdtError, Result};
pub use lock::LockHandle;
pub use object::{ClassInclude, CreationInfo, ObjectKind, ObjectRef};
pub use safety::{OperationClass, SafetyPolicy};
pub use system::{AuthMaterial, SessionCookie, SystemEndpoint};
