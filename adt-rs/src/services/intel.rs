//! Code intelligence: definition and reference navigation, code completion
//! and the type hierarchy. All four POST the current source text together
//! with a 1-based line/column position.

use serde::{Deserialize, Serialize};

use crate::application::codec::{abap, xml};
use crate::domain::error::Result;
use crate::domain::safety::OperationClass;
use crate::port::transport::RequestOptions;
use crate::services::engine::Engine;

/// A resolved source position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcePosition {
    pub uri: String,
    pub line: u32,
    pub column: u32,
    #[serde(default)]
    pub name: String,
}

/// One usage reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageReference {
    pub uri: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub object_type: String,
    #[serde(default)]
    pub is_definition: bool,
}

/// One completion proposal, in server rank order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionProposal {
    pub identifier: String,
    #[serde(default)]
    pub kind: String,
}

/// One entry of a type hierarchy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeHierarchyEntry {
    pub name: String,
    #[serde(default)]
    pub object_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub uri: String,
}

impl Engine {
    /// Navigate to the definition (or, with `implementation`, the
    /// implementation) of the symbol in `[start_column, end_column]` on
    /// `line`.
    pub async fn find_definition(
        &self,
        source_url: &str,
        source: &str,
        line: u32,
        start_column: u32,
        end_column: u32,
        implementation: bool,
    ) -> Result<SourcePosition> {
        self.gate(OperationClass::Intelligence, "FindDefinition")?;
        let uri = format!("{source_url}#start={line},{start_column};end={line},{end_column}");
        let mut options = RequestOptions::post()
            .query("uri", uri)
            .body(source.to_string())
            .content_type("text/plain; charset=utf-8");
        if implementation {
            options = options.query("filter", "implementation");
        }
        let response = self
            .transport()
            .request("/sap/bc/adt/navigation/target", options)
            .await?;

        let doc = xml::parse(&response.body)?;
        let mut position = SourcePosition::default();
        if let Some(node) = xml::elements(&doc, "objectReference").next() {
            let raw_uri = xml::attr_or(node, "uri", "");
            let (uri, line, column) = xml::split_start_fragment(raw_uri);
            position = SourcePosition {
                uri,
                line,
                column,
                name: xml::attr_or(node, "name", "").to_string(),
            };
        }
        Ok(position)
    }

    /// All usages of the symbol at (line, column), or of the whole object
    /// when no position is given.
    pub async fn find_references(
        &self,
        object_url: &str,
        position: Option<(u32, u32)>,
    ) -> Result<Vec<UsageReference>> {
        self.gate(OperationClass::Intelligence, "FindReferences")?;
        let uri = match position {
            Some((line, column)) => format!("{object_url}#start={line},{column}"),
            None => object_url.to_string(),
        };
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<usagereferences:usageReferenceRequest xmlns:usagereferences="http://www.sap.com/adt/ris/usageReferences">
  <usagereferences:affectedObjects/>
</usagereferences:usageReferenceRequest>"#;
        let options = RequestOptions::post()
            .query("uri", uri)
            .body(body)
            .content_type("application/*");
        let response = self
            .transport()
            .request(
                "/sap/bc/adt/repository/informationsystem/usageReferences",
                options,
            )
            .await?;

        let doc = xml::parse(&response.body)?;
        let references = xml::elements(&doc, "referencedObject")
            .map(|node| UsageReference {
                uri: xml::attr_or(node, "uri", "").to_string(),
                name: xml::attr_or(node, "name", "").to_string(),
                object_type: xml::attr_or(node, "type", "").to_string(),
                is_definition: xml::attr_or(node, "isResult", "false") == "true",
            })
            .collect();
        Ok(references)
    }

    /// Completion proposals at (line, column), in server rank order. The
    /// response is an ABAP-serialization row set.
    pub async fn code_completion(
        &self,
        source_url: &str,
        source: &str,
        line: u32,
        column: u32,
    ) -> Result<Vec<CompletionProposal>> {
        self.gate(OperationClass::Intelligence, "CodeCompletion")?;
        let uri = format!("{source_url}#start={line},{column}");
        let options = RequestOptions::post()
            .query("uri", uri)
            .query("signalCompleteness", "true")
            .body(source.to_string())
            .content_type("text/plain; charset=utf-8");
        let response = self
            .transport()
            .request("/sap/bc/adt/abapsource/codecompletion/proposal", options)
            .await?;

        if response.body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let rows = abap::decode_rows(&response.body, "SCC_COMPLETION")?;
        let proposals = rows
            .into_iter()
            .filter_map(|row| {
                let identifier = row.get("IDENTIFIER")?.clone();
                if identifier.is_empty() {
                    return None;
                }
                Some(CompletionProposal {
                    identifier,
                    kind: row.get("KIND").cloned().unwrap_or_default(),
                })
            })
            .collect();
        Ok(proposals)
    }

    /// Super- or subtype hierarchy of the type at (line, column).
    pub async fn type_hierarchy(
        &self,
        source_url: &str,
        source: &str,
        line: u32,
        column: u32,
        super_types: bool,
    ) -> Result<Vec<TypeHierarchyEntry>> {
        self.gate(OperationClass::Intelligence, "GetTypeHierarchy")?;
        let uri = format!("{source_url}#start={line},{column}");
        let hierarchy_type = if super_types { "superTypes" } else { "subTypes" };
        let options = RequestOptions::post()
            .query("uri", uri)
            .query("type", hierarchy_type)
            .body(source.to_string())
            .content_type("text/plain; charset=utf-8");
        let response = self
            .transport()
            .request("/sap/bc/adt/abapsource/typehierarchy", options)
            .await?;

        let doc = xml::parse(&response.body)?;
        let entries = xml::elements(&doc, "entry")
            .map(|node| TypeHierarchyEntry {
                name: xml::attr_or(node, "name", "").to_string(),
                object_type: xml::attr_or(node, "type", "").to_string(),
                description: xml::attr_or(node, "description", "").to_string(),
                uri: xml::attr_or(node, "uri", "").to_string(),
            })
            .collect();
        Ok(entries)
    }
}
