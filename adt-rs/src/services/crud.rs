//! CRUD primitives: lock/unlock, source updates, object creation and
//! deletion, and the class-include sub-API.

use tracing::debug;

use crate::application::codec::{abap, xml};
use crate::domain::error::{AdtError, Result};
use crate::domain::lock::LockHandle;
use crate::domain::object::{ClassInclude, ObjectKind, ObjectRef};
use crate::domain::safety::OperationClass;
use crate::port::transport::RequestOptions;
use crate::services::engine::Engine;

/// Accept header for the lock result's ABAP serialization payload.
const LOCK_ACCEPT: &str =
    "application/vnd.sap.as+xml;charset=UTF-8;dataname=com.sap.adt.lock.result";

/// Options for creating a new object.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub kind: Option<ObjectKind>,
    pub name: String,
    pub description: String,
    pub package: String,
    /// Transport request (corrNr) for transportable packages.
    pub transport: Option<String>,
    pub responsible: Option<String>,
    /// Function group for function modules.
    pub parent: Option<String>,
}

impl Engine {
    /// Acquire an edit lock. `access_mode` defaults to MODIFY.
    pub async fn lock(&self, object_url: &str, access_mode: Option<&str>) -> Result<LockHandle> {
        self.gate(OperationClass::Lock, "LockObject")?;
        let options = RequestOptions::post()
            .query("_action", "LOCK")
            .query("accessMode", access_mode.unwrap_or("MODIFY"))
            .accept(LOCK_ACCEPT);
        let response = self.transport().request(object_url, options).await?;

        let fields = abap::decode_values(&response.body)?;
        let handle = fields.get("LOCK_HANDLE").cloned().unwrap_or_default();
        if handle.is_empty() {
            return Err(AdtError::LockConflict(format!(
                "server returned no lock handle for {object_url}"
            )));
        }
        let non_empty = |key: &str| fields.get(key).filter(|v| !v.is_empty()).cloned();
        Ok(LockHandle {
            handle,
            corr_nr: non_empty("CORRNR"),
            corr_user: non_empty("CORRUSER"),
            corr_text: non_empty("CORRTEXT"),
            is_local: abap::flag(fields.get("IS_LOCAL")),
            is_link_up: abap::flag(fields.get("IS_LINK_UP")),
            modification_support: non_empty("MODIFICATION_SUPPORT"),
        })
    }

    /// Release an edit lock. Unlock is idempotent on the server; a failure
    /// here is usually a double unlock and is safe to treat as a warning by
    /// workflow callers.
    pub async fn unlock(&self, object_url: &str, lock_handle: &str) -> Result<()> {
        self.gate(OperationClass::Lock, "UnlockObject")?;
        let options = RequestOptions::post()
            .query("_action", "UNLOCK")
            .query("lockHandle", lock_handle);
        self.transport().request(object_url, options).await?;
        Ok(())
    }

    /// PUT the full source of an object. Requires a lock; `transport` is the
    /// corrNr for transportable objects.
    pub async fn update_source(
        &self,
        source_url: &str,
        source: &str,
        lock_handle: &str,
        transport: Option<&str>,
    ) -> Result<()> {
        self.gate(OperationClass::Update, "UpdateSource")?;
        let mut options = RequestOptions::put()
            .query("lockHandle", lock_handle)
            .body(source.to_string());
        if let Some(corr_nr) = transport {
            options = options.query("corrNr", corr_nr);
        }
        self.transport().request(source_url, options).await?;
        Ok(())
    }

    /// Create a new object shell from a minimal ADT descriptor. Success has
    /// no response body; the object URL is synthesized client-side.
    pub async fn create_object(&self, options: CreateOptions) -> Result<ObjectRef> {
        self.gate(OperationClass::Create, "CreateObject")?;
        let kind = options
            .kind
            .ok_or_else(|| AdtError::InvalidArgument("object kind is required".into()))?;
        if options.name.is_empty() {
            return Err(AdtError::InvalidArgument("object name is required".into()));
        }

        let object = match &options.parent {
            Some(parent) => ObjectRef::with_parent(kind, &options.name, parent),
            None => ObjectRef::new(kind, &options.name),
        };

        if kind == ObjectKind::FunctionModule {
            if object.parent.is_none() {
                return Err(AdtError::InvalidArgument(
                    "function modules require a parent function group".into(),
                ));
            }
        } else if options.package.is_empty() {
            return Err(AdtError::InvalidArgument("package is required".into()));
        }
        if !options.package.is_empty() {
            self.safety().check_mutation_target(&options.package)?;
        }

        let info = kind.creation_info().ok_or_else(|| {
            AdtError::UnsupportedObject(format!("{} cannot be created via ADT", kind.adt_type()))
        })?;
        let creation_path = match &object.parent {
            Some(parent) => info.path.replace("{}", &parent.to_lowercase()),
            None => info.path.to_string(),
        };

        let body = build_creation_body(&object, &options, info.root, info.namespace);
        let mut request = RequestOptions::post().body(body).content_type("application/*");
        if let Some(corr_nr) = &options.transport {
            request = request.query("corrNr", corr_nr);
        }
        self.transport().request(&creation_path, request).await?;
        debug!(name = %object.name, kind = kind.adt_type(), "object created");
        Ok(object)
    }

    /// DELETE an object under its lock.
    pub async fn delete_object(
        &self,
        object_url: &str,
        lock_handle: &str,
        transport: Option<&str>,
    ) -> Result<()> {
        self.gate(OperationClass::Delete, "DeleteObject")?;
        let mut options = RequestOptions::delete().query("lockHandle", lock_handle);
        if let Some(corr_nr) = transport {
            options = options.query("corrNr", corr_nr);
        }
        self.transport().request(object_url, options).await?;
        Ok(())
    }

    /// Create the testclasses include of a class. Requires a lock on the
    /// parent class.
    pub async fn create_test_include(
        &self,
        class_name: &str,
        lock_handle: &str,
        transport: Option<&str>,
    ) -> Result<()> {
        self.gate(OperationClass::Create, "CreateTestInclude")?;
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<class:abapClassInclude xmlns:class="http://www.sap.com/adt/oo/classes"
  xmlns:adtcore="http://www.sap.com/adt/core"
  adtcore:name="dummy" class:includeType="testclasses"/>"#;
        let includes_url = format!(
            "/sap/bc/adt/oo/classes/{}/includes",
            class_name.to_lowercase()
        );
        let mut options = RequestOptions::post()
            .query("lockHandle", lock_handle)
            .body(body)
            .content_type("application/*");
        if let Some(corr_nr) = transport {
            options = options.query("corrNr", corr_nr);
        }
        self.transport().request(&includes_url, options).await?;
        Ok(())
    }

    /// Write a class include. Non-main includes PUT directly to the include
    /// URL (no `/source/main` suffix).
    pub async fn update_class_include(
        &self,
        class_name: &str,
        include: ClassInclude,
        source: &str,
        lock_handle: &str,
        transport: Option<&str>,
    ) -> Result<()> {
        self.gate(OperationClass::Update, "UpdateClassInclude")?;
        let url = include.source_url(class_name);
        let mut options = RequestOptions::put()
            .query("lockHandle", lock_handle)
            .body(source.to_string())
            .content_type("text/plain; charset=utf-8");
        if let Some(corr_nr) = transport {
            options = options.query("corrNr", corr_nr);
        }
        self.transport().request(&url, options).await?;
        Ok(())
    }
}

/// The minimal creation descriptor: adtcore attributes plus a packageRef
/// (or a containerRef to the function group for function modules).
fn build_creation_body(
    object: &ObjectRef,
    options: &CreateOptions,
    root: &str,
    namespace: &str,
) -> String {
    let responsible = options.responsible.as_deref().unwrap_or("DEVELOPER");
    let description = xml::escape(&options.description);
    let kind = object.kind.adt_type();
    let name = &object.name;

    if let Some(parent) = &object.parent {
        return format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<{root} {namespace} xmlns:adtcore="http://www.sap.com/adt/core"
  adtcore:description="{description}"
  adtcore:name="{name}"
  adtcore:type="{kind}"
  adtcore:responsible="{responsible}">
  <adtcore:containerRef adtcore:name="{parent}" adtcore:type="FUGR/F"
    adtcore:uri="/sap/bc/adt/functions/groups/{parent_lower}"/>
</{root}>"#,
            parent_lower = parent.to_lowercase(),
        );
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<{root} {namespace} xmlns:adtcore="http://www.sap.com/adt/core"
  adtcore:description="{description}"
  adtcore:name="{name}"
  adtcore:type="{kind}"
  adtcore:responsible="{responsible}">
  <adtcore:packageRef adtcore:name="{package}"/>
</{root}>"#,
        package = options.package.to_uppercase(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_body_for_programs() {
        let object = ObjectRef::new(ObjectKind::Program, "ZTEST");
        let options = CreateOptions {
            kind: Some(ObjectKind::Program),
            name: "ZTEST".into(),
            description: "Demo <report>".into(),
            package: "$tmp".into(),
            ..CreateOptions::default()
        };
        let info = ObjectKind::Program.creation_info().unwrap();
        let body = build_creation_body(&object, &options, info.root, info.namespace);
        assert!(body.contains(r#"adtcore:name="ZTEST""#));
        assert!(body.contains(r#"adtcore:type="PROG/P""#));
        assert!(body.contains(r#"adtcore:description="Demo &lt;report&gt;""#));
        assert!(body.contains(r#"adtcore:responsible="DEVELOPER""#));
        assert!(body.contains(r#"<adtcore:packageRef adtcore:name="$TMP"/>"#));
        assert!(body.starts_with("<?xml"));
    }

    #[test]
    fn creation_body_for_function_modules_uses_container_ref() {
        let object = ObjectRef::with_parent(ObjectKind::FunctionModule, "Z_ADD", "ZFG_MATH");
        let options = CreateOptions {
            kind: Some(ObjectKind::FunctionModule),
            name: "Z_ADD".into(),
            description: "Adder".into(),
            parent: Some("ZFG_MATH".into()),
            ..CreateOptions::default()
        };
        let info = ObjectKind::FunctionModule.creation_info().unwrap();
        let body = build_creation_body(&object, &options, info.root, info.namespace);
        assert!(body.contains(r#"<adtcore:containerRef adtcore:name="ZFG_MATH" adtcore:type="FUGR/F""#));
        assert!(body.contains("/sap/bc/adt/functions/groups/zfg_math"));
        assert!(!body.contains("packageRef"));
    }
}
