//! Read API: source and metadata GETs, object search, package listing and
//! the data preview (table contents / free SQL).

use serde::{Deserialize, Serialize};

use crate::application::codec::{abap, xml};
use crate::domain::error::{AdtError, Result};
use crate::domain::object::{ClassInclude, ObjectKind, ObjectRef};
use crate::domain::safety::OperationClass;
use crate::port::transport::RequestOptions;
use crate::services::engine::Engine;

/// One hit from the repository quick search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    pub name: String,
    pub object_type: String,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub description: String,
    pub uri: String,
}

/// Package metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub uri: String,
}

/// One object inside a package.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageObject {
    pub object_type: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub uri: String,
}

/// Function group metadata with its module list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionGroupInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub function_modules: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryColumn {
    pub name: String,
    #[serde(default)]
    pub column_type: String,
}

/// Result of a data preview run, row-major.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<QueryColumn>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: u64,
}

/// One match from a source grep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrepMatch {
    pub object_uri: String,
    pub line: u32,
    pub text: String,
}

impl Engine {
    /// Fetch the main source of any source-bearing object.
    pub async fn get_source(&self, object: &ObjectRef) -> Result<String> {
        self.gate(OperationClass::Read, "GetSource")?;
        let url = object.source_url()?;
        let response = self.transport().request(&url, RequestOptions::get()).await?;
        Ok(response.body)
    }

    /// Fetch raw text from an explicit ADT source URL.
    pub async fn get_source_by_url(&self, source_url: &str) -> Result<String> {
        self.gate(OperationClass::Read, "GetSource")?;
        let response = self
            .transport()
            .request(source_url, RequestOptions::get())
            .await?;
        Ok(response.body)
    }

    /// Read one of a class's five includes.
    pub async fn get_class_include(&self, class_name: &str, include: ClassInclude) -> Result<String> {
        self.gate(OperationClass::Read, "GetClassInclude")?;
        let url = include.source_url(class_name);
        let response = self.transport().request(&url, RequestOptions::get()).await?;
        Ok(response.body)
    }

    /// Table and structure definitions are served as DDL text.
    pub async fn get_table(&self, table_name: &str) -> Result<String> {
        self.gate(OperationClass::Query, "GetTable")?;
        let object = ObjectRef::new(ObjectKind::Table, table_name);
        let response = self
            .transport()
            .request(&object.source_url()?, RequestOptions::get())
            .await?;
        Ok(response.body)
    }

    pub async fn get_structure(&self, structure_name: &str) -> Result<String> {
        self.gate(OperationClass::Read, "GetStructure")?;
        let object = ObjectRef::new(ObjectKind::Structure, structure_name);
        let response = self
            .transport()
            .request(&object.source_url()?, RequestOptions::get())
            .await?;
        Ok(response.body)
    }

    /// Package metadata (`adtcore` attributes of the package element).
    pub async fn get_package(&self, package_name: &str) -> Result<PackageInfo> {
        self.gate(OperationClass::Read, "GetPackage")?;
        let object = ObjectRef::new(ObjectKind::Package, package_name);
        let url = object.object_url()?;
        let response = self.transport().request(&url, RequestOptions::get()).await?;
        let doc = xml::parse(&response.body)?;
        let root = doc.root_element();
        Ok(PackageInfo {
            name: xml::attr_or(root, "name", &object.name).to_string(),
            description: xml::attr_or(root, "description", "").to_string(),
            uri: url,
        })
    }

    /// List the objects of a package via the repository node structure.
    pub async fn list_package_contents(&self, package_name: &str) -> Result<Vec<PackageObject>> {
        self.gate(OperationClass::Read, "GetPackageContents")?;
        let options = RequestOptions::post()
            .query("parent_type", "DEVC/K")
            .query("parent_name", package_name.to_uppercase())
            .query("withShortDescriptions", "true");
        let response = self
            .transport()
            .request("/sap/bc/adt/repository/nodestructure", options)
            .await?;
        let rows = abap::decode_rows(&response.body, "SEU_ADT_REPOSITORY_OBJ_NODE")?;
        let objects = rows
            .into_iter()
            .filter(|row| {
                row.get("OBJECT_NAME")
                    .map(|name| !name.is_empty())
                    .unwrap_or(false)
            })
            .map(|row| PackageObject {
                object_type: row.get("OBJECT_TYPE").cloned().unwrap_or_default(),
                name: row.get("OBJECT_NAME").cloned().unwrap_or_default(),
                description: row.get("DESCRIPTION").cloned().unwrap_or_default(),
                uri: row.get("OBJECT_URI").cloned().unwrap_or_default(),
            })
            .collect();
        Ok(objects)
    }

    /// Repository quick search. `*` wildcards are honored by the server.
    pub async fn search_objects(&self, query: &str, max_results: u32) -> Result<Vec<SearchResult>> {
        self.gate(OperationClass::Search, "SearchObject")?;
        let options = RequestOptions::get()
            .query("operation", "quickSearch")
            .query("query", query)
            .query("maxResults", max_results.to_string());
        let response = self
            .transport()
            .request("/sap/bc/adt/repository/informationsystem/search", options)
            .await?;
        let doc = xml::parse(&response.body)?;
        let results = xml::elements(&doc, "objectReference")
            .map(|node| SearchResult {
                name: xml::attr_or(node, "name", "").to_string(),
                object_type: xml::attr_or(node, "type", "").to_string(),
                package: xml::attr_or(node, "packageName", "").to_string(),
                description: xml::attr_or(node, "description", "").to_string(),
                uri: xml::attr_or(node, "uri", "").to_string(),
            })
            .collect();
        Ok(results)
    }

    /// Function group metadata: description plus the contained modules.
    pub async fn get_function_group(&self, group_name: &str) -> Result<FunctionGroupInfo> {
        self.gate(OperationClass::Read, "GetFunctionGroup")?;
        let object = ObjectRef::new(ObjectKind::FunctionGroup, group_name);
        let url = object.object_url()?;
        let response = self.transport().request(&url, RequestOptions::get()).await?;
        let doc = xml::parse(&response.body)?;
        let root = doc.root_element();
        let modules = xml::elements(&doc, "functionModule")
            .filter_map(|node| xml::attr(node, "name").map(str::to_string))
            .collect();
        Ok(FunctionGroupInfo {
            name: xml::attr_or(root, "name", &object.name).to_string(),
            description: xml::attr_or(root, "description", "").to_string(),
            function_modules: modules,
        })
    }

    /// Transaction metadata as a raw record (server XML differs widely by
    /// release, so the caller gets the text).
    pub async fn get_transaction(&self, transaction_name: &str) -> Result<String> {
        self.gate(OperationClass::Read, "GetTransaction")?;
        let object = ObjectRef::new(ObjectKind::Transaction, transaction_name);
        let response = self
            .transport()
            .request(&object.object_url()?, RequestOptions::get())
            .await?;
        Ok(response.body)
    }

    /// Data element / type information.
    pub async fn get_type_info(&self, type_name: &str) -> Result<String> {
        self.gate(OperationClass::Read, "GetTypeInfo")?;
        let object = ObjectRef::new(ObjectKind::Type, type_name);
        let response = self
            .transport()
            .request(&object.object_url()?, RequestOptions::get())
            .await?;
        Ok(response.body)
    }

    /// Read table contents via the data preview with a generated SELECT.
    /// This is the predefined-query class, not free SQL.
    pub async fn get_table_contents(&self, table_name: &str, max_rows: u32) -> Result<QueryResult> {
        self.gate(OperationClass::Query, "GetTableContents")?;
        let sql = format!("SELECT * FROM {}", table_name.to_uppercase());
        self.data_preview(&sql, max_rows).await
    }

    /// Execute a caller-supplied SELECT. FreeSql class; blocked by default
    /// policies.
    pub async fn run_query(&self, sql: &str, max_rows: u32) -> Result<QueryResult> {
        self.gate(OperationClass::FreeSql, "RunQuery")?;
        self.data_preview(sql, max_rows).await
    }

    async fn data_preview(&self, sql: &str, max_rows: u32) -> Result<QueryResult> {
        let options = RequestOptions::post()
            .query("rowNumber", max_rows.to_string())
            .body(sql.to_string())
            .content_type("text/plain; charset=utf-8")
            .accept("application/xml");
        let response = self
            .transport()
            .request("/sap/bc/adt/datapreview/freestyle", options)
            .await?;
        parse_data_preview(&response.body)
    }

    /// Substring/pattern scan over one object's source. Case folding is
    /// ASCII, which covers ABAP identifiers.
    pub async fn grep_object(
        &self,
        object_url: &str,
        pattern: &str,
        case_insensitive: bool,
    ) -> Result<Vec<GrepMatch>> {
        self.gate(OperationClass::Search, "GrepObject")?;
        let source_url = if object_url.ends_with("/source/main") || object_url.contains("/includes/")
        {
            object_url.to_string()
        } else {
            format!("{object_url}/source/main")
        };
        let response = self
            .transport()
            .request(&source_url, RequestOptions::get())
            .await?;
        Ok(grep_lines(&response.body, object_url, pattern, case_insensitive))
    }

    /// Scan every source object of a package. Results are grouped per
    /// object; `max_objects` caps how many matching objects are returned.
    pub async fn grep_package(
        &self,
        package_name: &str,
        pattern: &str,
        case_insensitive: bool,
        max_objects: usize,
    ) -> Result<Vec<(PackageObject, Vec<GrepMatch>)>> {
        self.gate(OperationClass::Search, "GrepPackage")?;
        let contents = self.list_package_contents(package_name).await?;
        let mut results = Vec::new();
        for object in contents {
            if results.len() >= max_objects {
                break;
            }
            let Ok(kind) = ObjectKind::parse(&object.object_type) else {
                continue;
            };
            if !kind.has_source() || kind == ObjectKind::FunctionModule {
                continue;
            }
            let object_ref = ObjectRef::new(kind, &object.name);
            let source = match self.get_source(&object_ref).await {
                Ok(source) => source,
                // Objects without a readable source are skipped, not fatal.
                Err(AdtError::NotFound(_)) | Err(AdtError::UnsupportedObject(_)) => continue,
                Err(err) => return Err(err),
            };
            let matches = grep_lines(
                &source,
                &object_ref.object_url()?,
                pattern,
                case_insensitive,
            );
            if !matches.is_empty() {
                results.push((object, matches));
            }
        }
        Ok(results)
    }
}

fn grep_lines(
    source: &str,
    object_uri: &str,
    pattern: &str,
    case_insensitive: bool,
) -> Vec<GrepMatch> {
    let needle = if case_insensitive {
        pattern.to_ascii_lowercase()
    } else {
        pattern.to_string()
    };
    source
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            if case_insensitive {
                line.to_ascii_lowercase().contains(&needle)
            } else {
                line.contains(&needle)
            }
        })
        .map(|(index, line)| GrepMatch {
            object_uri: object_uri.to_string(),
            line: index as u32 + 1,
            text: line.to_string(),
        })
        .collect()
}

/// The data preview response is column-major: each `columns` element carries
/// its metadata and the full value list of that column.
fn parse_data_preview(body: &str) -> Result<QueryResult> {
    let doc = xml::parse(body)?;

    let mut columns = Vec::new();
    let mut column_values: Vec<Vec<String>> = Vec::new();
    for column_node in xml::elements(&doc, "columns") {
        let metadata = xml::descendants(column_node, "metadata").next();
        let name = metadata
            .and_then(|m| xml::attr(m, "name"))
            .unwrap_or_default()
            .to_string();
        let column_type = metadata
            .and_then(|m| xml::attr(m, "type"))
            .unwrap_or_default()
            .to_string();
        let values: Vec<String> = xml::descendants(column_node, "data")
            .map(|node| xml::text(node).trim().to_string())
            .collect();
        columns.push(QueryColumn { name, column_type });
        column_values.push(values);
    }

    let total_rows = xml::elements(&doc, "totalRows")
        .next()
        .map(|node| xml::text(node).trim().parse().unwrap_or(0))
        .unwrap_or_else(|| column_values.iter().map(Vec::len).max().unwrap_or(0) as u64);

    let row_count = column_values.iter().map(Vec::len).max().unwrap_or(0);
    let mut rows = Vec::with_capacity(row_count);
    for row_index in 0..row_count {
        let row = column_values
            .iter()
            .map(|values| values.get(row_index).cloned().unwrap_or_default())
            .collect();
        rows.push(row);
    }

    Ok(QueryResult {
        columns,
        rows,
        total_rows,
    })
}
