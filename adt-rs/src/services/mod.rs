//! Engine services: the read, CRUD, check, workflow, deployment, CTS and
//! code intelligence APIs, all methods on [`engine::Engine`].

pub mod checks;
pub mod crud;
pub mod cts;
pub mod dependencies;
pub mod deploy;
pub mod engine;
pub mod intel;
pub mod read;
pub mod workflows;

pub use crud::CreateOptions;
pub use dependencies::{CdsDependencyOptions, DependencyLevel};
pub use deploy::{DeployOptions, DeployReport, DEFAULT_ACTIVATION_PASSES};
pub use engine::Engine;
pub use intel::{CompletionProposal, SourcePosition, TypeHierarchyEntry, UsageReference};
pub use read::{
    FunctionGroupInfo, GrepMatch, PackageInfo, PackageObject, QueryColumn, QueryResult,
    SearchResult,
};
pub use workflows::{CreateClassResult, EditParams, EditResult, RenameResult, WriteResult};
