//! Atomic multi-step editing workflows. Every lock acquired here is
//! released on every exit path: an unlock failure after a successful
//! mutation is a non-fatal warning, while after a failed mutation the
//! mutation error takes precedence.

use tracing::{debug, warn};

use crate::application::codec::lines;
use crate::domain::check::{ActivationResult, SyntaxDiagnostic, UnitTestFlags, UnitTestResult};
use crate::domain::error::{AdtError, Result};
use crate::domain::object::{ClassInclude, ObjectKind, ObjectRef};
use crate::domain::safety::OperationClass;
use crate::services::crud::CreateOptions;
use crate::services::engine::Engine;

/// Outcome of a write/create workflow, carrying per-step results.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct WriteResult {
    pub success: bool,
    pub name: String,
    pub object_url: String,
    pub syntax: Vec<SyntaxDiagnostic>,
    pub activation: Option<ActivationResult>,
    pub warnings: Vec<String>,
    pub message: String,
}

/// Outcome of the class-with-tests workflow.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CreateClassResult {
    #[serde(flatten)]
    pub write: WriteResult,
    pub unit_tests: Option<UnitTestResult>,
}

/// Parameters of the surgical string replacement.
#[derive(Debug, Clone)]
pub struct EditParams {
    pub object_url: String,
    pub old_string: String,
    pub new_string: String,
    pub replace_all: bool,
    pub syntax_check: bool,
    pub case_insensitive: bool,
    pub transport: Option<String>,
}

impl Default for EditParams {
    fn default() -> Self {
        EditParams {
            object_url: String::new(),
            old_string: String::new(),
            new_string: String::new(),
            replace_all: false,
            syntax_check: true,
            case_insensitive: false,
            transport: None,
        }
    }
}

/// Outcome of a surgical edit.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct EditResult {
    pub success: bool,
    pub object_url: String,
    pub replacements: usize,
    pub activation: Option<ActivationResult>,
    pub warnings: Vec<String>,
}

/// Outcome of a rename: partial means the copy exists but the old object
/// could not be deleted.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RenameResult {
    pub success: bool,
    pub partial: bool,
    pub old_name: String,
    pub new_name: String,
    pub activation: Option<ActivationResult>,
    pub message: String,
}

impl Engine {
    /// Update an existing object: syntax-check, then lock -> PUT -> unlock ->
    /// activate. Syntax errors return without saving.
    pub async fn write_object(
        &self,
        kind: ObjectKind,
        name: &str,
        source: &str,
        transport: Option<&str>,
    ) -> Result<WriteResult> {
        self.gate(OperationClass::Workflow, "WriteSource")?;
        let object = ObjectRef::new(kind, name);
        let object_url = object.object_url()?;
        let source_url = object.source_url()?;

        let mut result = WriteResult {
            name: object.name.clone(),
            object_url: object_url.clone(),
            ..WriteResult::default()
        };

        // Step 1: check before touching the object.
        let diagnostics = self.syntax_check(&object_url, source).await?;
        let has_errors = diagnostics.iter().any(|d| d.is_error());
        result.syntax = diagnostics;
        if has_errors {
            result.message = "source has syntax errors - not saved".into();
            return Ok(result);
        }

        // Steps 2-4: the locked window is exactly the PUT.
        let lock = self.lock(&object_url, None).await?;
        let put_result = self
            .update_source(&source_url, source, &lock.handle, transport)
            .await;
        let unlock_result = self.unlock(&object_url, &lock.handle).await;
        match (put_result, unlock_result) {
            (Err(put_err), _) => return Err(put_err),
            (Ok(()), Err(unlock_err)) => {
                warn!(object = %object.name, error = %unlock_err, "unlock failed after update");
                result.warnings.push(format!("unlock failed: {unlock_err}"));
            }
            (Ok(()), Ok(())) => {}
        }

        // Step 5: activate outside the lock.
        let activation = self.activate(&object_url, &object.name).await?;
        result.success = activation.success;
        result.message = if activation.success {
            "updated and activated".into()
        } else {
            "saved but activation failed - check activation messages".into()
        };
        result.activation = Some(activation);
        Ok(result)
    }

    pub async fn write_program(
        &self,
        name: &str,
        source: &str,
        transport: Option<&str>,
    ) -> Result<WriteResult> {
        self.write_object(ObjectKind::Program, name, source, transport).await
    }

    pub async fn write_class(
        &self,
        name: &str,
        source: &str,
        transport: Option<&str>,
    ) -> Result<WriteResult> {
        self.write_object(ObjectKind::Class, name, source, transport).await
    }

    pub async fn write_interface(
        &self,
        name: &str,
        source: &str,
        transport: Option<&str>,
    ) -> Result<WriteResult> {
        self.write_object(ObjectKind::Interface, name, source, transport).await
    }

    /// Create a new object shell, upload its source and activate it.
    pub async fn create_and_activate(
        &self,
        kind: ObjectKind,
        name: &str,
        description: &str,
        package: &str,
        source: &str,
        transport: Option<&str>,
    ) -> Result<WriteResult> {
        self.gate(OperationClass::Workflow, "CreateAndActivate")?;
        self.safety().check_mutation_target(&package.to_uppercase())?;

        let object = self
            .create_object(CreateOptions {
                kind: Some(kind),
                name: name.to_string(),
                description: description.to_string(),
                package: package.to_string(),
                transport: transport.map(str::to_string),
                ..CreateOptions::default()
            })
            .await?;
        let object_url = object.object_url()?;
        let source_url = object.source_url()?;

        let mut result = WriteResult {
            name: object.name.clone(),
            object_url: object_url.clone(),
            ..WriteResult::default()
        };

        let lock = self.lock(&object_url, None).await?;
        let put_result = self
            .update_source(&source_url, source, &lock.handle, transport)
            .await;
        let unlock_result = self.unlock(&object_url, &lock.handle).await;
        match (put_result, unlock_result) {
            (Err(put_err), _) => return Err(put_err),
            (Ok(()), Err(unlock_err)) => {
                result.warnings.push(format!("unlock failed: {unlock_err}"));
            }
            (Ok(()), Ok(())) => {}
        }

        let activation = self.activate(&object_url, &object.name).await?;
        result.success = activation.success;
        result.message = if activation.success {
            "created and activated".into()
        } else {
            "created but activation failed - check activation messages".into()
        };
        result.activation = Some(activation);
        Ok(result)
    }

    /// Create a class together with its testclasses include, activate, and
    /// run the unit tests.
    pub async fn create_class_with_tests(
        &self,
        name: &str,
        description: &str,
        package: &str,
        class_source: &str,
        test_source: &str,
        transport: Option<&str>,
    ) -> Result<CreateClassResult> {
        self.gate(OperationClass::Workflow, "CreateClassWithTests")?;
        self.safety().check_mutation_target(&package.to_uppercase())?;

        let object = self
            .create_object(CreateOptions {
                kind: Some(ObjectKind::Class),
                name: name.to_string(),
                description: description.to_string(),
                package: package.to_string(),
                transport: transport.map(str::to_string),
                ..CreateOptions::default()
            })
            .await?;
        let object_url = object.object_url()?;
        let source_url = object.source_url()?;

        let mut result = CreateClassResult {
            write: WriteResult {
                name: object.name.clone(),
                object_url: object_url.clone(),
                ..WriteResult::default()
            },
            unit_tests: None,
        };

        // Main source, test include creation and test source all happen
        // under one lock.
        let lock = self.lock(&object_url, None).await?;
        let upload_result = async {
            self.update_source(&source_url, class_source, &lock.handle, transport)
                .await?;
            self.create_test_include(&object.name, &lock.handle, transport)
                .await?;
            self.update_class_include(
                &object.name,
                ClassInclude::Testclasses,
                test_source,
                &lock.handle,
                transport,
            )
            .await
        }
        .await;
        let unlock_result = self.unlock(&object_url, &lock.handle).await;
        match (upload_result, unlock_result) {
            (Err(upload_err), _) => return Err(upload_err),
            (Ok(()), Err(unlock_err)) => {
                result
                    .write
                    .warnings
                    .push(format!("unlock failed: {unlock_err}"));
            }
            (Ok(()), Ok(())) => {}
        }

        let activation = self.activate(&object_url, &object.name).await?;
        let activated = activation.success;
        result.write.activation = Some(activation);
        if !activated {
            result.write.message = "created but activation failed - check activation messages".into();
            return Ok(result);
        }

        match self.run_unit_tests(&object_url, UnitTestFlags::default()).await {
            Ok(report) => {
                result.write.success = true;
                result.write.message = "class created, activated and tested".into();
                result.unit_tests = Some(report);
            }
            Err(err) => {
                // The class exists and is active; a failed test run is a
                // warning, not a rollback.
                result.write.success = true;
                result.write.message = "class created and activated".into();
                result.write.warnings.push(format!("unit test run failed: {err}"));
            }
        }
        Ok(result)
    }

    /// Surgical replacement of `old_string` by `new_string`. With
    /// `replace_all=false`, exactly one match is required; no lock is taken
    /// before the match count is validated.
    pub async fn edit_source(&self, params: EditParams) -> Result<EditResult> {
        self.gate(OperationClass::Workflow, "EditSource")?;
        if params.old_string.is_empty() {
            return Err(AdtError::InvalidArgument("old_string must not be empty".into()));
        }
        if params.old_string == params.new_string {
            return Err(AdtError::InvalidArgument(
                "old_string and new_string are identical".into(),
            ));
        }

        let object_url = params.object_url.trim_end_matches('/').to_string();
        let source_url = if object_url.ends_with("/source/main") || object_url.contains("/includes/")
        {
            object_url.clone()
        } else {
            format!("{object_url}/source/main")
        };
        let lock_url = source_url
            .strip_suffix("/source/main")
            .unwrap_or(object_url.as_str())
            .to_string();

        // Step 1: current state, canonicalized.
        let stored = self.get_source_by_url(&source_url).await?;
        let (canonical, ending) = lines::canonicalize(&stored);
        let (needle, _) = lines::canonicalize(&params.old_string);
        let (replacement, _) = lines::canonicalize(&params.new_string);

        // Step 2: match.
        let matches = find_matches(&canonical, &needle, params.case_insensitive);
        if !params.replace_all && matches.len() != 1 {
            return Err(AdtError::InvalidArgument(format!(
                "non-unique match ({})",
                matches.len()
            )));
        }
        if matches.is_empty() {
            return Err(AdtError::InvalidArgument("non-unique match (0)".into()));
        }

        // Step 3: substitute.
        let new_source = replace_at(&canonical, &needle, &replacement, &matches);
        let replacements = matches.len();

        // Step 4: optional syntax check; errors abort before any write.
        if params.syntax_check {
            let diagnostics = self.syntax_check(&lock_url, &new_source).await?;
            let errors: Vec<SyntaxDiagnostic> =
                diagnostics.iter().filter(|d| d.is_error()).cloned().collect();
            if !errors.is_empty() {
                let summary = errors
                    .iter()
                    .map(|d| format!("{}:{} {}", d.line, d.offset, d.text))
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(AdtError::SyntaxErrors {
                    summary: format!("edit rejected, {} error(s): {summary}", errors.len()),
                    diagnostics,
                });
            }
        }

        // Step 5: lock -> PUT -> unlock -> activate. The stored EOL convention
        // is restored on write.
        let mut result = EditResult {
            object_url: lock_url.clone(),
            replacements,
            ..EditResult::default()
        };
        let body = lines::restore(&new_source, ending);

        let lock = self.lock(&lock_url, None).await?;
        let put_result = self
            .update_source(&source_url, &body, &lock.handle, params.transport.as_deref())
            .await;
        let unlock_result = self.unlock(&lock_url, &lock.handle).await;
        match (put_result, unlock_result) {
            (Err(put_err), _) => return Err(put_err),
            (Ok(()), Err(unlock_err)) => {
                result.warnings.push(format!("unlock failed: {unlock_err}"));
            }
            (Ok(()), Ok(())) => {}
        }

        let object_name = lock_url.rsplit('/').next().unwrap_or("").to_uppercase();
        let activation = self.activate(&lock_url, &object_name).await?;
        result.success = activation.success;
        result.activation = Some(activation);
        debug!(object = %object_name, replacements, "edit applied");
        Ok(result)
    }

    /// Rename by copy: read, substitute names, create and activate the new
    /// object, then delete the old one. A failed delete yields
    /// partial success naming both objects.
    pub async fn rename_object(
        &self,
        kind: ObjectKind,
        old_name: &str,
        new_name: &str,
        package: &str,
        transport: Option<&str>,
    ) -> Result<RenameResult> {
        self.gate(OperationClass::Workflow, "RenameObject")?;
        self.safety().check_mutation_target(&package.to_uppercase())?;

        let old_object = ObjectRef::new(kind, old_name);
        let new_object = ObjectRef::new(kind, new_name);
        if old_object.name == new_object.name {
            return Err(AdtError::InvalidArgument(
                "old and new name are identical".into(),
            ));
        }

        let mut result = RenameResult {
            old_name: old_object.name.clone(),
            new_name: new_object.name.clone(),
            ..RenameResult::default()
        };

        let source = self.get_source(&old_object).await?;
        let renamed = rename_identifiers(&source, &old_object.name, &new_object.name);

        let write = self
            .create_and_activate(
                kind,
                &new_object.name,
                &format!("Renamed from {}", old_object.name),
                package,
                &renamed,
                transport,
            )
            .await?;
        result.activation = write.activation.clone();
        if !write.success {
            result.message = format!(
                "copy {} created but not activated - old object untouched",
                new_object.name
            );
            return Ok(result);
        }

        // Delete the old object under its own lock.
        let old_url = old_object.object_url()?;
        let delete_outcome = async {
            let lock = self.lock(&old_url, None).await?;
            let deleted = self
                .delete_object(&old_url, &lock.handle, transport)
                .await;
            if deleted.is_err() {
                // The object still exists; give its lock back.
                if let Err(unlock_err) = self.unlock(&old_url, &lock.handle).await {
                    warn!(object = %old_object.name, error = %unlock_err, "unlock after failed delete also failed");
                }
            }
            deleted
        }
        .await;

        match delete_outcome {
            Ok(()) => {
                result.success = true;
                result.message = format!(
                    "renamed {} to {}",
                    old_object.name, new_object.name
                );
            }
            Err(err) => {
                result.partial = true;
                result.message = format!(
                    "created and activated {} but could not delete {}: {err}",
                    new_object.name, old_object.name
                );
            }
        }
        Ok(result)
    }
}

/// Non-overlapping match offsets, optionally ASCII-case-folded (length
/// preserving, so offsets are valid in the original).
fn find_matches(haystack: &str, needle: &str, case_insensitive: bool) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    if case_insensitive {
        let folded_haystack = haystack.to_ascii_lowercase();
        let folded_needle = needle.to_ascii_lowercase();
        folded_haystack
            .match_indices(&folded_needle)
            .map(|(offset, _)| offset)
            .collect()
    } else {
        haystack.match_indices(needle).map(|(offset, _)| offset).collect()
    }
}

/// Rebuild the source with `replacement` substituted at every match offset.
fn replace_at(source: &str, needle: &str, replacement: &str, offsets: &[usize]) -> String {
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for &offset in offsets {
        out.push_str(&source[cursor..offset]);
        out.push_str(replacement);
        cursor = offset + needle.len();
    }
    out.push_str(&source[cursor..]);
    out
}

/// Case-preserving identifier substitution: uppercase occurrences get the
/// uppercase new name, lowercase the lowercase one.
fn rename_identifiers(source: &str, old_name: &str, new_name: &str) -> String {
    let offsets = find_matches(source, old_name, true);
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for offset in offsets {
        out.push_str(&source[cursor..offset]);
        let matched = &source[offset..offset + old_name.len()];
        if matched.chars().any(|c| c.is_ascii_lowercase()) {
            out.push_str(&new_name.to_lowercase());
        } else {
            out.push_str(&new_name.to_uppercase());
        }
        cursor = offset + old_name.len();
    }
    out.push_str(&source[cursor..]);
    out
}
