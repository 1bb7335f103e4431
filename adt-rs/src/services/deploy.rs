//! The deployment engine: abapGit archive in, three phases out.
//!
//! Phase 1 creates every shell (AlreadyExists counts as success), phase 2
//! uploads sources under lock with no syntax check (cross-object
//! dependencies would fail spuriously), phase 3 activates iteratively until
//! the inactive set is empty or stops shrinking. Failures never abort the
//! run; the report carries per-phase counters.

use serde::Serialize;
use tracing::{debug, info};

use crate::application::archive::{self, DeploymentObject};
use crate::domain::check::InactiveObject;
use crate::domain::error::{AdtError, Result};
use crate::domain::object::{ObjectKind, ObjectRef};
use crate::domain::safety::OperationClass;
use crate::services::crud::CreateOptions;
use crate::services::engine::Engine;

/// Default number of activation passes.
pub const DEFAULT_ACTIVATION_PASSES: usize = 5;

#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub package: String,
    pub dry_run: bool,
    /// Restrict to one archive type (CLAS, PROG, ...).
    pub type_filter: Option<String>,
    /// Substring filter on object names (a `*` wildcard is stripped).
    pub name_filter: Option<String>,
    pub max_activation_passes: usize,
}

impl Default for DeployOptions {
    fn default() -> Self {
        DeployOptions {
            package: String::new(),
            dry_run: false,
            type_filter: None,
            name_filter: None,
            max_activation_passes: DEFAULT_ACTIVATION_PASSES,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectFailure {
    pub object_type: String,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreatePhase {
    pub created: usize,
    pub existed: usize,
    pub failed: Vec<ObjectFailure>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadPhase {
    pub uploaded: usize,
    pub failed: Vec<ObjectFailure>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivationPass {
    pub activated: usize,
    pub still_inactive: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivationPhase {
    pub passes: Vec<ActivationPass>,
    pub total_activated: usize,
    pub still_inactive: Vec<InactiveObject>,
}

/// The cumulative deployment report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeployReport {
    pub package: String,
    pub total_files: usize,
    pub deployable: Vec<String>,
    pub skipped: Vec<String>,
    pub dry_run: bool,
    pub create: CreatePhase,
    pub upload: UploadPhase,
    pub activation: ActivationPhase,
    pub success: bool,
}

impl DeployReport {
    /// Any per-object failure (or remaining inactive object) turns the run
    /// into `deployment-partial`.
    pub fn as_error(&self) -> Option<AdtError> {
        if self.dry_run || self.success {
            return None;
        }
        Some(AdtError::DeploymentPartial(format!(
            "create {}+{} existed / {} failed; upload {} ok / {} failed; {} pass(es), {} activated, {} still inactive",
            self.create.created,
            self.create.existed,
            self.create.failed.len(),
            self.upload.uploaded,
            self.upload.failed.len(),
            self.activation.passes.len(),
            self.activation.total_activated,
            self.activation.still_inactive.len(),
        )))
    }
}

impl Engine {
    /// Deploy an abapGit ZIP into a package. With `dry_run`, the plan is
    /// computed and returned without a single network request.
    pub async fn deploy_archive(&self, zip_bytes: &[u8], options: DeployOptions) -> Result<DeployReport> {
        self.gate(OperationClass::Workflow, "DeployArchive")?;
        if options.package.is_empty() {
            return Err(AdtError::InvalidArgument("package is required".into()));
        }
        let package = options.package.to_uppercase();
        self.safety().check_mutation_target(&package)?;

        // Parse, group, order.
        let files = archive::unzip(zip_bytes)?;
        let objects = archive::plan(&files);

        let mut deployable = Vec::new();
        let mut skipped = Vec::new();
        for object in objects {
            if let Some(filter) = &options.type_filter {
                if !filter.eq_ignore_ascii_case(&object.object_type) {
                    continue;
                }
            }
            if let Some(filter) = &options.name_filter {
                let needle = filter.replace('*', "").to_uppercase();
                if !object.name.contains(&needle) {
                    continue;
                }
            }
            if deploy_kind(&object).is_some() {
                deployable.push(object);
            } else {
                skipped.push(object);
            }
        }

        let mut report = DeployReport {
            package: package.clone(),
            total_files: files.len(),
            deployable: deployable
                .iter()
                .map(|o| format!("{} {}", o.object_type, o.name))
                .collect(),
            skipped: skipped
                .iter()
                .map(|o| format!("{} {}", o.object_type, o.name))
                .collect(),
            dry_run: options.dry_run,
            ..DeployReport::default()
        };

        if options.dry_run {
            report.success = true;
            return Ok(report);
        }
        if deployable.is_empty() {
            report.success = true;
            return Ok(report);
        }

        self.ensure_package(&package, &mut report).await?;

        info!(package = %package, objects = deployable.len(), "deployment starting");
        self.phase_create(&deployable, &package, &mut report).await;
        self.phase_upload(&deployable, &mut report).await;
        self.phase_activate(&deployable, options.max_activation_passes, &mut report)
            .await;

        report.success = report.create.failed.is_empty()
            && report.upload.failed.is_empty()
            && report.activation.still_inactive.is_empty();
        Ok(report)
    }

    /// The target package must exist; creating it tolerates AlreadyExists.
    async fn ensure_package(&self, package: &str, report: &mut DeployReport) -> Result<()> {
        if self.get_package(package).await.is_ok() {
            return Ok(());
        }
        let created = self
            .create_object(CreateOptions {
                kind: Some(ObjectKind::Package),
                name: package.to_string(),
                description: format!("Deployment target {package}"),
                package: package.to_string(),
                ..CreateOptions::default()
            })
            .await;
        match created {
            Ok(_) => Ok(()),
            Err(AdtError::AlreadyExists(_)) => Ok(()),
            Err(err) => {
                report.create.failed.push(ObjectFailure {
                    object_type: "DEVC".into(),
                    name: package.to_string(),
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Phase 1: create every shell in dependency order.
    async fn phase_create(
        &self,
        objects: &[DeploymentObject],
        package: &str,
        report: &mut DeployReport,
    ) {
        for object in objects {
            let Some(kind) = deploy_kind(object) else {
                continue;
            };
            let description = if object.description.is_empty() {
                object.name.clone()
            } else {
                object.description.clone()
            };
            let outcome = self
                .create_object(CreateOptions {
                    kind: Some(kind),
                    name: object.name.clone(),
                    description,
                    package: package.to_string(),
                    ..CreateOptions::default()
                })
                .await;
            match outcome {
                Ok(_) => report.create.created += 1,
                Err(AdtError::AlreadyExists(_)) => report.create.existed += 1,
                Err(err) => report.create.failed.push(ObjectFailure {
                    object_type: object.object_type.clone(),
                    name: object.name.clone(),
                    reason: err.to_string(),
                }),
            }
        }
        debug!(
            created = report.create.created,
            existed = report.create.existed,
            failed = report.create.failed.len(),
            "phase 1 done"
        );
    }

    /// Phase 2: lock -> PUT main source -> unlock, per object. No syntax
    /// check here. An upload failure still attempts the unlock.
    async fn phase_upload(&self, objects: &[DeploymentObject], report: &mut DeployReport) {
        for object in objects {
            let Some(kind) = deploy_kind(object) else {
                continue;
            };
            if object.main_source.is_empty() {
                continue;
            }
            let object_ref = ObjectRef::new(kind, &object.name);
            let (object_url, source_url) = match (object_ref.object_url(), object_ref.source_url()) {
                (Ok(object_url), Ok(source_url)) => (object_url, source_url),
                _ => continue,
            };

            let lock = match self.lock(&object_url, None).await {
                Ok(lock) => lock,
                Err(err) => {
                    report.upload.failed.push(ObjectFailure {
                        object_type: object.object_type.clone(),
                        name: object.name.clone(),
                        reason: format!("lock failed: {err}"),
                    });
                    continue;
                }
            };

            let put_result = self
                .update_source(&source_url, &object.main_source, &lock.handle, None)
                .await;
            let unlock_result = self.unlock(&object_url, &lock.handle).await;

            match put_result {
                Ok(()) => {
                    if let Err(unlock_err) = unlock_result {
                        debug!(object = %object.name, error = %unlock_err, "unlock failed after upload");
                    }
                    report.upload.uploaded += 1;
                }
                Err(err) => {
                    report.upload.failed.push(ObjectFailure {
                        object_type: object.object_type.clone(),
                        name: object.name.clone(),
                        reason: format!("upload failed: {err}"),
                    });
                }
            }
        }
        debug!(
            uploaded = report.upload.uploaded,
            failed = report.upload.failed.len(),
            "phase 2 done"
        );
    }

    /// Phase 3: bulk-activate the deployed set, then re-activate whatever
    /// stayed inactive, until the inactive set is empty or stops changing.
    async fn phase_activate(
        &self,
        objects: &[DeploymentObject],
        max_passes: usize,
        report: &mut DeployReport,
    ) {
        let mut targets: Vec<(String, String)> = objects
            .iter()
            .filter_map(|object| {
                let kind = deploy_kind(object)?;
                let object_ref = ObjectRef::new(kind, &object.name);
                Some((object_ref.object_url().ok()?, object_ref.name))
            })
            .collect();

        let mut previous_inactive: Option<Vec<InactiveObject>> = None;
        for pass in 0..max_passes.max(1) {
            let activation = match self.activate_objects(&targets).await {
                Ok(activation) => activation,
                Err(err) => {
                    debug!(pass, error = %err, "activation pass failed");
                    break;
                }
            };

            let still_inactive = activation.inactive.clone();
            let activated = targets.len().saturating_sub(still_inactive.len());
            report.activation.passes.push(ActivationPass {
                activated,
                still_inactive: still_inactive.len(),
            });
            report.activation.total_activated += activated;

            if still_inactive.is_empty() {
                report.activation.still_inactive.clear();
                return;
            }

            // Fixpoint: stop once a pass makes no progress.
            if previous_inactive.as_ref() == Some(&still_inactive) {
                report.activation.still_inactive = still_inactive;
                return;
            }

            targets = still_inactive
                .iter()
                .map(|object| (object.uri.clone(), object.name.clone()))
                .collect();
            report.activation.still_inactive = still_inactive.clone();
            previous_inactive = Some(still_inactive);
        }
    }
}

/// Which archive types the native ADT endpoints can deploy. Others are
/// reported as skipped.
fn deploy_kind(object: &DeploymentObject) -> Option<ObjectKind> {
    match object.object_type.as_str() {
        "PROG" | "CLAS" | "INTF" | "DDLS" | "BDEF" | "SRVD" => {
            ObjectKind::from_archive_type(&object.object_type)
        }
        _ => None,
    }
}
