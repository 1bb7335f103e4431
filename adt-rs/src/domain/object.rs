use serde::{Deserialize, Serialize};

use crate::domain::error::{AdtError, Result};

/// Closed enumeration of the ABAP object kinds the engine can address.
///
/// The ADT URL for a kind is a pure function of (kind, name, parent); no
/// state is involved (see [`ObjectRef::object_url`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    Program,
    Include,
    Class,
    Interface,
    FunctionGroup,
    FunctionModule,
    Structure,
    Table,
    Ddls,
    Bdef,
    Srvd,
    Srvb,
    Package,
    Transaction,
    Type,
}

impl ObjectKind {
    /// The ADT workbench type string (`adtcore:type`).
    pub fn adt_type(&self) -> &'static str {
        match self {
            ObjectKind::Program => "PROG/P",
            ObjectKind::Include => "PROG/I",
            ObjectKind::Class => "CLAS/OC",
            ObjectKind::Interface => "INTF/OI",
            ObjectKind::FunctionGroup => "FUGR/F",
            ObjectKind::FunctionModule => "FUGR/FF",
            ObjectKind::Structure => "TABL/DS",
            ObjectKind::Table => "TABL/DT",
            ObjectKind::Ddls => "DDLS/DF",
            ObjectKind::Bdef => "BDEF/BDO",
            ObjectKind::Srvd => "SRVD/SRV",
            ObjectKind::Srvb => "SRVB/SVB",
            ObjectKind::Package => "DEVC/K",
            ObjectKind::Transaction => "TRAN/T",
            ObjectKind::Type => "DTEL/DE",
        }
    }

    /// Parse either a tool-facing kind (`class`, `function-module`, ...) or
    /// an ADT workbench type (`CLAS/OC`, `FUGR/FF`, ...).
    pub fn parse(input: &str) -> Result<ObjectKind> {
        let normalized = input.trim().to_ascii_lowercase();
        let kind = match normalized.as_str() {
            "program" | "prog/p" | "prog" => ObjectKind::Program,
            "include" | "prog/i" => ObjectKind::Include,
            "class" | "clas/oc" | "clas" => ObjectKind::Class,
            "interface" | "intf/oi" | "intf" => ObjectKind::Interface,
            "function-group" | "function_group" | "fugr/f" | "fugr" => ObjectKind::FunctionGroup,
            "function-module" | "function_module" | "fugr/ff" | "func" => ObjectKind::FunctionModule,
            "structure" | "tabl/ds" => ObjectKind::Structure,
            "table" | "tabl/dt" | "tabl" => ObjectKind::Table,
            "ddls" | "ddls/df" => ObjectKind::Ddls,
            "bdef" | "bdef/bdo" => ObjectKind::Bdef,
            "srvd" | "srvd/srv" => ObjectKind::Srvd,
            "srvb" | "srvb/svb" => ObjectKind::Srvb,
            "package" | "devc/k" | "devc" => ObjectKind::Package,
            "transaction" | "tran/t" | "tran" => ObjectKind::Transaction,
            "type" | "dtel/de" | "dtel" => ObjectKind::Type,
            other => {
                return Err(AdtError::UnsupportedObject(format!(
                    "unknown object kind '{other}'"
                )))
            }
        };
        Ok(kind)
    }

    /// Parse an abapGit archive type token (`CLAS`, `PROG`, ...). Unknown
    /// tokens are tolerated by the archive parser and skipped at deploy time.
    pub fn from_archive_type(token: &str) -> Option<ObjectKind> {
        match token.to_ascii_uppercase().as_str() {
            "PROG" => Some(ObjectKind::Program),
            "CLAS" => Some(ObjectKind::Class),
            "INTF" => Some(ObjectKind::Interface),
            "FUGR" => Some(ObjectKind::FunctionGroup),
            "FUNC" => Some(ObjectKind::FunctionModule),
            "TABL" => Some(ObjectKind::Table),
            "DDLS" => Some(ObjectKind::Ddls),
            "BDEF" => Some(ObjectKind::Bdef),
            "SRVD" => Some(ObjectKind::Srvd),
            "SRVB" => Some(ObjectKind::Srvb),
            "DEVC" => Some(ObjectKind::Package),
            _ => None,
        }
    }

    /// True for kinds whose `{object_url}/source/main` endpoint serves plain
    /// ABAP (or DDL) text.
    pub fn has_source(&self) -> bool {
        !matches!(
            self,
            ObjectKind::Package | ObjectKind::Transaction | ObjectKind::Type
        )
    }

    /// Creation endpoint, XML root element and namespace declaration used by
    /// the minimal ADT creation descriptor.
    pub fn creation_info(&self) -> Option<CreationInfo> {
        let info = match self {
            ObjectKind::Program => CreationInfo {
                path: "/sap/bc/adt/programs/programs",
                root: "program:abapProgram",
                namespace: r#"xmlns:program="http://www.sap.com/adt/programs/programs""#,
            },
            ObjectKind::Include => CreationInfo {
                path: "/sap/bc/adt/programs/includes",
                root: "include:abapInclude",
                namespace: r#"xmlns:include="http://www.sap.com/adt/programs/includes""#,
            },
            ObjectKind::Class => CreationInfo {
                path: "/sap/bc/adt/oo/classes",
                root: "class:abapClass",
                namespace: r#"xmlns:class="http://www.sap.com/adt/oo/classes""#,
            },
            ObjectKind::Interface => CreationInfo {
                path: "/sap/bc/adt/oo/interfaces",
                root: "intf:abapInterface",
                namespace: r#"xmlns:intf="http://www.sap.com/adt/oo/interfaces""#,
            },
            ObjectKind::FunctionGroup => CreationInfo {
                path: "/sap/bc/adt/functions/groups",
                root: "group:abapFunctionGroup",
                namespace: r#"xmlns:group="http://www.sap.com/adt/functions/groups""#,
            },
            ObjectKind::FunctionModule => CreationInfo {
                // The `{}` placeholder is replaced by the lowercased parent
                // function group.
                path: "/sap/bc/adt/functions/groups/{}/fmodules",
                root: "fmodule:abapFunctionModule",
                namespace: r#"xmlns:fmodule="http://www.sap.com/adt/functions/fmodules""#,
            },
            ObjectKind::Ddls => CreationInfo {
                path: "/sap/bc/adt/ddic/ddl/sources",
                root: "ddl:ddlSource",
                namespace: r#"xmlns:ddl="http://www.sap.com/adt/ddic/ddlsources""#,
            },
            ObjectKind::Bdef => CreationInfo {
                path: "/sap/bc/adt/bo/behaviordefinitions",
                root: "bdef:behaviorDefinition",
                namespace: r#"xmlns:bdef="http://www.sap.com/adt/bo/behaviordefinitions""#,
            },
            ObjectKind::Srvd => CreationInfo {
                path: "/sap/bc/adt/ddic/srvd/sources",
                root: "srvd:srvdSource",
                namespace: r#"xmlns:srvd="http://www.sap.com/adt/ddic/srvdsources""#,
            },
            ObjectKind::Package => CreationInfo {
                path: "/sap/bc/adt/packages",
                root: "pak:package",
                namespace: r#"xmlns:pak="http://www.sap.com/adt/packages""#,
            },
            _ => return None,
        };
        Some(info)
    }
}

/// Metadata for building a creation request, see [`ObjectKind::creation_info`].
#[derive(Debug, Clone, Copy)]
pub struct CreationInfo {
    pub path: &'static str,
    pub root: &'static str,
    pub namespace: &'static str,
}

/// A (kind, name, optional parent) triple addressing one ABAP object.
///
/// Names are stored uppercased; URLs use the lowercase form, which is what
/// the ADT endpoints serve.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl ObjectRef {
    pub fn new(kind: ObjectKind, name: impl Into<String>) -> Self {
        ObjectRef {
            kind,
            name: name.into().to_uppercase(),
            parent: None,
        }
    }

    pub fn with_parent(kind: ObjectKind, name: impl Into<String>, parent: impl Into<String>) -> Self {
        ObjectRef {
            kind,
            name: name.into().to_uppercase(),
            parent: Some(parent.into().to_uppercase()),
        }
    }

    /// The ADT object URL. Function modules require a parent function group.
    pub fn object_url(&self) -> Result<String> {
        let name = self.name.to_lowercase();
        let url = match self.kind {
            ObjectKind::Program => format!("/sap/bc/adt/programs/programs/{name}"),
            ObjectKind::Include => format!("/sap/bc/adt/programs/includes/{name}"),
            ObjectKind::Class => format!("/sap/bc/adt/oo/classes/{name}"),
            ObjectKind::Interface => format!("/sap/bc/adt/oo/interfaces/{name}"),
            ObjectKind::FunctionGroup => format!("/sap/bc/adt/functions/groups/{name}"),
            ObjectKind::FunctionModule => {
                let parent = self.parent.as_deref().ok_or_else(|| {
                    AdtError::InvalidArgument(
                        "function modules require a parent function group".into(),
                    )
                })?;
                format!(
                    "/sap/bc/adt/functions/groups/{}/fmodules/{name}",
                    parent.to_lowercase()
                )
            }
            ObjectKind::Structure => format!("/sap/bc/adt/ddic/structures/{name}"),
            ObjectKind::Table => format!("/sap/bc/adt/ddic/tables/{name}"),
            ObjectKind::Ddls => format!("/sap/bc/adt/ddic/ddl/sources/{name}"),
            ObjectKind::Bdef => format!("/sap/bc/adt/bo/behaviordefinitions/{name}"),
            ObjectKind::Srvd => format!("/sap/bc/adt/ddic/srvd/sources/{name}"),
            ObjectKind::Srvb => format!("/sap/bc/adt/businessservices/bindings/{name}"),
            ObjectKind::Package => format!("/sap/bc/adt/packages/{name}"),
            ObjectKind::Transaction => format!("/sap/bc/adt/transactions/{name}"),
            ObjectKind::Type => format!("/sap/bc/adt/ddic/dataelements/{name}"),
        };
        Ok(url)
    }

    /// The main source URL (`{object_url}/source/main`).
    pub fn source_url(&self) -> Result<String> {
        if !self.kind.has_source() {
            return Err(AdtError::UnsupportedObject(format!(
                "{} objects have no source endpoint",
                self.kind.adt_type()
            )));
        }
        Ok(format!("{}/source/main", self.object_url()?))
    }
}

/// The five ordered includes of a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassInclude {
    Main,
    Definitions,
    Implementations,
    Macros,
    Testclasses,
}

impl ClassInclude {
    pub fn parse(input: &str) -> Result<ClassInclude> {
        match input.trim().to_ascii_lowercase().as_str() {
            "main" | "" => Ok(ClassInclude::Main),
            "definitions" | "locals_def" => Ok(ClassInclude::Definitions),
            "implementations" | "locals_imp" => Ok(ClassInclude::Implementations),
            "macros" => Ok(ClassInclude::Macros),
            "testclasses" => Ok(ClassInclude::Testclasses),
            other => Err(AdtError::InvalidArgument(format!(
                "unknown class include '{other}' (expected main, definitions, implementations, macros or testclasses)"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassInclude::Main => "main",
            ClassInclude::Definitions => "definitions",
            ClassInclude::Implementations => "implementations",
            ClassInclude::Macros => "macros",
            ClassInclude::Testclasses => "testclasses",
        }
    }

    /// Source URL for an include. Non-main includes are read and written
    /// directly at the include URL, without a `/source/main` suffix.
    pub fn source_url(&self, class_name: &str) -> String {
        let name = class_name.to_lowercase();
        match self {
            ClassInclude::Main => format!("/sap/bc/adt/oo/classes/{name}/source/main"),
            other => format!("/sap/bc/adt/oo/classes/{name}/includes/{}", other.as_str()),
        }
    }
}
