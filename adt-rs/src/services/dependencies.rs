//! CDS dependency analysis: fetch the dependency tree of a DDL source and
//! expose the derived views (flatten, depth, type counts, table leaves,
//! cycles) computed by [`DependencyTree`].

use crate::application::codec::xml;
use crate::domain::dependency::{DependencyNode, DependencyTree};
use crate::domain::error::{AdtError, Result};
use crate::domain::safety::OperationClass;
use crate::port::transport::RequestOptions;
use crate::services::engine::Engine;

/// How far the server resolves dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyLevel {
    /// Direct dependencies only.
    Unit,
    /// Recursive resolution.
    #[default]
    Hierarchy,
}

impl DependencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyLevel::Unit => "unit",
            DependencyLevel::Hierarchy => "hierarchy",
        }
    }

    pub fn parse(input: &str) -> Result<DependencyLevel> {
        match input.trim().to_ascii_lowercase().as_str() {
            "unit" => Ok(DependencyLevel::Unit),
            "hierarchy" | "" => Ok(DependencyLevel::Hierarchy),
            other => Err(AdtError::InvalidArgument(format!(
                "unknown dependency level '{other}' (expected unit or hierarchy)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CdsDependencyOptions {
    pub level: DependencyLevel,
    pub with_associations: bool,
    /// Restrict resolution to a package context.
    pub package: Option<String>,
}

impl Engine {
    /// Fetch the dependency tree of a DDLS source.
    pub async fn cds_dependencies(
        &self,
        ddls_name: &str,
        options: CdsDependencyOptions,
    ) -> Result<DependencyTree> {
        self.gate(OperationClass::Read, "GetCDSDependencies")?;
        let name = ddls_name.to_uppercase();
        let body = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<dependencies:request xmlns:dependencies="http://www.sap.com/adt/ris/dependencies">
  <dependencies:ddlsName>{name}</dependencies:ddlsName>
  <dependencies:dependencyLevel>{level}</dependencies:dependencyLevel>
  <dependencies:withAssociations>{associations}</dependencies:withAssociations>{package}
</dependencies:request>"#,
            name = xml::escape(&name),
            level = options.level.as_str(),
            associations = options.with_associations,
            package = options
                .package
                .as_deref()
                .map(|p| format!(
                    "\n  <dependencies:packageContext>{}</dependencies:packageContext>",
                    xml::escape(&p.to_uppercase())
                ))
                .unwrap_or_default(),
        );

        let request = RequestOptions::post()
            .body(body)
            .content_type("application/*");
        let path = format!(
            "/sap/bc/adt/ddic/ddl/sources/{}/dependencies",
            name.to_lowercase()
        );
        let response = self.transport().request(&path, request).await?;
        parse_dependency_tree(&response.body, &name)
    }
}

/// The response is a nested `node` structure:
/// `<node name=.. type=.. inactive=..><node .../></node>`.
fn parse_dependency_tree(body: &str, root_name: &str) -> Result<DependencyTree> {
    let doc = xml::parse(body)?;
    let root_node = xml::elements(&doc, "node")
        .next()
        .ok_or_else(|| AdtError::NotFound(format!("no dependency data for {root_name}")))?;
    Ok(DependencyTree::new(convert_node(root_node)))
}

fn convert_node(node: roxmltree::Node<'_, '_>) -> DependencyNode {
    DependencyNode {
        name: xml::attr_or(node, "name", "").to_string(),
        node_type: xml::attr_or(node, "type", "").to_string(),
        inactive: xml::attr_or(node, "inactive", "false") == "true",
        children: xml::children(node, "node").map(convert_node).collect(),
    }
}
