//! The tool catalog: stable identifiers, JSON schemas for the agent, and
//! the operation class each tool carries into the safety gate. Focused mode
//! exposes a curated subset; expert mode exposes everything.

use serde_json::{json, Value};

use adt_rs::OperationClass;

use crate::config::Mode;

/// One tool: identifier, description, input schema and its safety class.
#[derive(Debug, Clone)]
pub struct Tool {
    pub name: &'static str,
    pub description: &'static str,
    pub class: OperationClass,
    pub input_schema: Value,
}

impl Tool {
    /// The MCP wire representation (name, description, inputSchema).
    pub fn definition(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }
}

fn schema(required: &[(&str, &str, &str)], optional: &[(&str, &str, &str)]) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required_names = Vec::new();
    for (name, kind, description) in required.iter().chain(optional.iter()) {
        properties.insert(
            name.to_string(),
            json!({"type": kind, "description": description}),
        );
    }
    for (name, _, _) in required {
        required_names.push(name.to_string());
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required_names,
    })
}

/// The focused-mode whitelist: the unified entry points plus the essential
/// read, search, intelligence and development tools.
const FOCUSED_TOOLS: &[&str] = &[
    "GetSource",
    "WriteSource",
    "SearchObject",
    "GrepObject",
    "GrepPackage",
    "EditSource",
    "GetTable",
    "GetTableContents",
    "RunQuery",
    "GetPackage",
    "GetFunctionGroup",
    "GetCDSDependencies",
    "FindDefinition",
    "FindReferences",
    "SyntaxCheck",
    "RunUnitTests",
    "LockObject",
    "UnlockObject",
    "DeployZip",
];

/// Every tool, the expert-mode catalog.
pub fn full_catalog() -> Vec<Tool> {
    use OperationClass as Op;
    vec![
        // --- Unified entry points ---
        Tool {
            name: "GetSource",
            description: "Read source of any object; dispatches over object_type (program, class, interface, function-module, function-group, include, class-include, ddls, bdef, srvd)",
            class: Op::Read,
            input_schema: schema(
                &[
                    ("object_type", "string", "Object kind, e.g. program, class, function-module"),
                    ("name", "string", "Object name"),
                ],
                &[
                    ("parent", "string", "Function group (required for function modules)"),
                    ("include", "string", "Class include: main, definitions, implementations, macros, testclasses"),
                ],
            ),
        },
        Tool {
            name: "WriteSource",
            description: "Write source of a program, class or interface. mode=upsert (default) detects whether the object exists; create and update force one path. For classes, test_source additionally creates the testclasses include and runs the unit tests after activation",
            class: Op::Workflow,
            input_schema: schema(
                &[
                    ("object_type", "string", "program, class or interface"),
                    ("name", "string", "Object name"),
                    ("source", "string", "Full source code"),
                ],
                &[
                    ("mode", "string", "upsert (default), create or update"),
                    ("description", "string", "Object description (create path)"),
                    ("package", "string", "Package, e.g. $TMP (create path)"),
                    ("test_source", "string", "Unit test source for the testclasses include (classes only)"),
                    ("transport", "string", "Transport request for transportable packages"),
                ],
            ),
        },
        // --- Reads ---
        Tool {
            name: "GetProgram",
            description: "Retrieve ABAP program source code",
            class: Op::Read,
            input_schema: schema(&[("program_name", "string", "Name of the ABAP program")], &[]),
        },
        Tool {
            name: "GetClass",
            description: "Retrieve ABAP class source code",
            class: Op::Read,
            input_schema: schema(&[("class_name", "string", "Name of the ABAP class")], &[]),
        },
        Tool {
            name: "GetInterface",
            description: "Retrieve ABAP interface source code",
            class: Op::Read,
            input_schema: schema(&[("interface_name", "string", "Name of the ABAP interface")], &[]),
        },
        Tool {
            name: "GetInclude",
            description: "Retrieve ABAP include source code",
            class: Op::Read,
            input_schema: schema(&[("include_name", "string", "Name of the ABAP include")], &[]),
        },
        Tool {
            name: "GetFunction",
            description: "Retrieve ABAP function module source code",
            class: Op::Read,
            input_schema: schema(
                &[
                    ("function_name", "string", "Name of the function module"),
                    ("function_group", "string", "Name of the function group"),
                ],
                &[],
            ),
        },
        Tool {
            name: "GetFunctionGroup",
            description: "Retrieve function group metadata and its function module list",
            class: Op::Read,
            input_schema: schema(&[("function_group", "string", "Name of the function group")], &[]),
        },
        Tool {
            name: "GetClassInclude",
            description: "Retrieve source of a class include (definitions, implementations, macros, testclasses)",
            class: Op::Read,
            input_schema: schema(
                &[
                    ("class_name", "string", "Name of the ABAP class"),
                    ("include_type", "string", "main, definitions, implementations, macros or testclasses"),
                ],
                &[],
            ),
        },
        Tool {
            name: "GetTable",
            description: "Retrieve ABAP table definition",
            class: Op::Query,
            input_schema: schema(&[("table_name", "string", "Name of the ABAP table")], &[]),
        },
        Tool {
            name: "GetStructure",
            description: "Retrieve ABAP structure definition",
            class: Op::Read,
            input_schema: schema(&[("structure_name", "string", "Name of the ABAP structure")], &[]),
        },
        Tool {
            name: "GetTableContents",
            description: "Read table contents via the data preview",
            class: Op::Query,
            input_schema: schema(
                &[("table_name", "string", "Name of the ABAP table")],
                &[("max_rows", "number", "Row cap (default 100)")],
            ),
        },
        Tool {
            name: "RunQuery",
            description: "Execute a freestyle SELECT against the database (free SQL; blocked by default policies)",
            class: Op::FreeSql,
            input_schema: schema(
                &[("sql_query", "string", "SELECT statement")],
                &[("max_rows", "number", "Row cap (default 100)")],
            ),
        },
        Tool {
            name: "GetPackage",
            description: "Retrieve package metadata and contents",
            class: Op::Read,
            input_schema: schema(&[("package_name", "string", "Name of the ABAP package")], &[]),
        },
        Tool {
            name: "GetTransaction",
            description: "Retrieve transaction metadata",
            class: Op::Read,
            input_schema: schema(&[("transaction_name", "string", "Transaction code")], &[]),
        },
        Tool {
            name: "GetTypeInfo",
            description: "Retrieve data element / type information",
            class: Op::Read,
            input_schema: schema(&[("type_name", "string", "Type name")], &[]),
        },
        Tool {
            name: "GetCDSDependencies",
            description: "Retrieve the CDS view dependency tree with depth, per-type counts, table leaves and cycle detection",
            class: Op::Read,
            input_schema: schema(
                &[("ddls_name", "string", "CDS DDL source name")],
                &[
                    ("dependency_level", "string", "unit (direct) or hierarchy (recursive, default)"),
                    ("with_associations", "boolean", "Include modeled associations"),
                    ("context_package", "string", "Package context filter"),
                ],
            ),
        },
        Tool {
            name: "SearchObject",
            description: "Repository quick search (use * as wildcard)",
            class: Op::Search,
            input_schema: schema(
                &[("query", "string", "Search pattern")],
                &[("max_results", "number", "Result cap (default 100)")],
            ),
        },
        Tool {
            name: "GrepObject",
            description: "Search for a pattern in one object's source, with 1-based line numbers",
            class: Op::Search,
            input_schema: schema(
                &[
                    ("object_url", "string", "ADT URL of the object"),
                    ("pattern", "string", "Substring to find"),
                ],
                &[("case_insensitive", "boolean", "Fold case when matching")],
            ),
        },
        Tool {
            name: "GrepPackage",
            description: "Search for a pattern across all source objects of a package",
            class: Op::Search,
            input_schema: schema(
                &[
                    ("package_name", "string", "Package to scan"),
                    ("pattern", "string", "Substring to find"),
                ],
                &[
                    ("case_insensitive", "boolean", "Fold case when matching"),
                    ("max_results", "number", "Cap on matching objects (default 100)"),
                ],
            ),
        },
        // --- Code intelligence ---
        Tool {
            name: "FindDefinition",
            description: "Navigate to the definition of the symbol at a position",
            class: Op::Intelligence,
            input_schema: schema(
                &[
                    ("source_url", "string", "ADT source URL"),
                    ("source", "string", "Full source text"),
                    ("line", "number", "1-based line"),
                    ("start_column", "number", "1-based start column"),
                    ("end_column", "number", "1-based end column"),
                ],
                &[("implementation", "boolean", "Jump to the implementation instead")],
            ),
        },
        Tool {
            name: "FindReferences",
            description: "Find usages of an object or of the symbol at a position",
            class: Op::Intelligence,
            input_schema: schema(
                &[("object_url", "string", "ADT URL of the object")],
                &[
                    ("line", "number", "1-based line"),
                    ("column", "number", "1-based column"),
                ],
            ),
        },
        Tool {
            name: "CodeCompletion",
            description: "Completion proposals at a position, in server rank order",
            class: Op::Intelligence,
            input_schema: schema(
                &[
                    ("source_url", "string", "ADT source URL"),
                    ("source", "string", "Full source text"),
                    ("line", "number", "1-based line"),
                    ("column", "number", "1-based column"),
                ],
                &[],
            ),
        },
        Tool {
            name: "GetTypeHierarchy",
            description: "Super- or subtype hierarchy of the type at a position",
            class: Op::Intelligence,
            input_schema: schema(
                &[
                    ("source_url", "string", "ADT source URL"),
                    ("source", "string", "Full source text"),
                    ("line", "number", "1-based line"),
                    ("column", "number", "1-based column"),
                ],
                &[("super_types", "boolean", "Supertypes instead of subtypes")],
            ),
        },
        // --- Development ---
        Tool {
            name: "SyntaxCheck",
            description: "Check ABAP source for syntax errors without saving",
            class: Op::Test,
            input_schema: schema(
                &[
                    ("object_url", "string", "ADT URL of the object"),
                    ("content", "string", "Source to check"),
                ],
                &[],
            ),
        },
        Tool {
            name: "Activate",
            description: "Activate an ABAP object",
            class: Op::Activate,
            input_schema: schema(
                &[
                    ("object_url", "string", "ADT URL of the object"),
                    ("object_name", "string", "Technical name"),
                ],
                &[],
            ),
        },
        Tool {
            name: "RunUnitTests",
            description: "Run ABAP Unit tests for an object",
            class: Op::Test,
            input_schema: schema(
                &[("object_url", "string", "ADT URL of the object")],
                &[
                    ("include_dangerous", "boolean", "Include dangerous risk level"),
                    ("include_long", "boolean", "Include long-running tests"),
                ],
            ),
        },
        // --- CRUD primitives ---
        Tool {
            name: "LockObject",
            description: "Acquire an edit lock",
            class: Op::Lock,
            input_schema: schema(
                &[("object_url", "string", "ADT URL of the object")],
                &[("access_mode", "string", "MODIFY (default) or READ")],
            ),
        },
        Tool {
            name: "UnlockObject",
            description: "Release an edit lock",
            class: Op::Lock,
            input_schema: schema(
                &[
                    ("object_url", "string", "ADT URL of the object"),
                    ("lock_handle", "string", "Handle from LockObject"),
                ],
                &[],
            ),
        },
        Tool {
            name: "UpdateSource",
            description: "Write source under an existing lock",
            class: Op::Update,
            input_schema: schema(
                &[
                    ("object_url", "string", "ADT URL of the object"),
                    ("source", "string", "Full source"),
                    ("lock_handle", "string", "Handle from LockObject"),
                ],
                &[("transport", "string", "Transport request")],
            ),
        },
        Tool {
            name: "CreateObject",
            description: "Create a new object shell (PROG/P, CLAS/OC, INTF/OI, PROG/I, FUGR/F, FUGR/FF, DEVC/K)",
            class: Op::Create,
            input_schema: schema(
                &[
                    ("object_type", "string", "ADT type, e.g. PROG/P"),
                    ("name", "string", "Object name"),
                    ("description", "string", "Description"),
                    ("package_name", "string", "Target package"),
                ],
                &[
                    ("transport", "string", "Transport request"),
                    ("parent_name", "string", "Function group for FUGR/FF"),
                ],
            ),
        },
        Tool {
            name: "DeleteObject",
            description: "Delete an object under an existing lock",
            class: Op::Delete,
            input_schema: schema(
                &[
                    ("object_url", "string", "ADT URL of the object"),
                    ("lock_handle", "string", "Handle from LockObject"),
                ],
                &[("transport", "string", "Transport request")],
            ),
        },
        Tool {
            name: "CreateTestInclude",
            description: "Create the testclasses include of a class (requires a lock on the class)",
            class: Op::Create,
            input_schema: schema(
                &[
                    ("class_name", "string", "Name of the class"),
                    ("lock_handle", "string", "Handle from LockObject"),
                ],
                &[("transport", "string", "Transport request")],
            ),
        },
        Tool {
            name: "UpdateClassInclude",
            description: "Write a class include (requires a lock on the class)",
            class: Op::Update,
            input_schema: schema(
                &[
                    ("class_name", "string", "Name of the class"),
                    ("include_type", "string", "definitions, implementations, macros or testclasses"),
                    ("source", "string", "Include source"),
                    ("lock_handle", "string", "Handle from LockObject"),
                ],
                &[("transport", "string", "Transport request")],
            ),
        },
        // --- Workflows ---
        Tool {
            name: "WriteProgram",
            description: "Update an existing program: syntax check, lock, save, unlock, activate",
            class: Op::Workflow,
            input_schema: schema(
                &[
                    ("program_name", "string", "Name of the program"),
                    ("source", "string", "Full source"),
                ],
                &[("transport", "string", "Transport request")],
            ),
        },
        Tool {
            name: "WriteClass",
            description: "Update an existing class: syntax check, lock, save, unlock, activate",
            class: Op::Workflow,
            input_schema: schema(
                &[
                    ("class_name", "string", "Name of the class"),
                    ("source", "string", "Full source (definition and implementation)"),
                ],
                &[("transport", "string", "Transport request")],
            ),
        },
        Tool {
            name: "CreateAndActivateProgram",
            description: "Create a program with source and activate it",
            class: Op::Workflow,
            input_schema: schema(
                &[
                    ("program_name", "string", "Name of the program"),
                    ("description", "string", "Description"),
                    ("package_name", "string", "Target package, e.g. $TMP"),
                    ("source", "string", "Full source"),
                ],
                &[("transport", "string", "Transport request")],
            ),
        },
        Tool {
            name: "CreateClassWithTests",
            description: "Create a class with unit tests, activate it and run the tests",
            class: Op::Workflow,
            input_schema: schema(
                &[
                    ("class_name", "string", "Name of the class"),
                    ("description", "string", "Description"),
                    ("package_name", "string", "Target package, e.g. $TMP"),
                    ("class_source", "string", "Class source"),
                    ("test_source", "string", "Unit test source"),
                ],
                &[("transport", "string", "Transport request")],
            ),
        },
        Tool {
            name: "EditSource",
            description: "Surgical string replacement: fetch, match old_string (unique unless replace_all), optional syntax check, lock, save, unlock, activate",
            class: Op::Workflow,
            input_schema: schema(
                &[
                    ("object_url", "string", "ADT URL of the object"),
                    ("old_string", "string", "Exact string to replace; must be unique unless replace_all"),
                    ("new_string", "string", "Replacement text"),
                ],
                &[
                    ("replace_all", "boolean", "Replace every occurrence (default false)"),
                    ("syntax_check", "boolean", "Validate before saving (default true)"),
                    ("case_insensitive", "boolean", "Fold case when matching (default false)"),
                    ("transport", "string", "Transport request"),
                ],
            ),
        },
        Tool {
            name: "RenameObject",
            description: "Rename by copy: read, substitute names, create and activate the copy, delete the original",
            class: Op::Workflow,
            input_schema: schema(
                &[
                    ("object_type", "string", "program, class, interface or function-group"),
                    ("old_name", "string", "Current name"),
                    ("new_name", "string", "New name"),
                    ("package_name", "string", "Package for the copy"),
                ],
                &[("transport", "string", "Transport request")],
            ),
        },
        // --- Deployment ---
        Tool {
            name: "DeployZip",
            description: "Deploy an abapGit ZIP (base64) into a package: create shells, upload sources, activate iteratively",
            class: Op::Workflow,
            input_schema: schema(
                &[
                    ("zip_base64", "string", "abapGit ZIP, base64-encoded"),
                    ("package", "string", "Target package, e.g. $ZGIT"),
                ],
                &[
                    ("dry_run", "boolean", "Plan only, no changes"),
                    ("type_filter", "string", "Deploy only this archive type (e.g. CLAS)"),
                    ("name_filter", "string", "Substring filter on object names"),
                ],
            ),
        },
        // --- CTS ---
        Tool {
            name: "ListTransports",
            description: "List transport requests of a user",
            class: Op::Transport,
            input_schema: schema(&[], &[("user", "string", "User (default: session user)")]),
        },
        Tool {
            name: "GetTransport",
            description: "Transport request details with tasks and objects",
            class: Op::Transport,
            input_schema: schema(&[("number", "string", "Transport number")], &[]),
        },
        Tool {
            name: "CreateTransport",
            description: "Create a workbench (or customizing) transport request",
            class: Op::Transport,
            input_schema: schema(
                &[
                    ("description", "string", "Request description"),
                    ("package", "string", "Package the request is for"),
                ],
                &[
                    ("transport_layer", "string", "Transport layer"),
                    ("customizing", "boolean", "Customizing instead of workbench"),
                ],
            ),
        },
        Tool {
            name: "ReleaseTransport",
            description: "Release a transport request",
            class: Op::Transport,
            input_schema: schema(
                &[("number", "string", "Transport number")],
                &[
                    ("ignore_locks", "boolean", "Release despite locks"),
                    ("skip_atc", "boolean", "Skip the ATC check"),
                ],
            ),
        },
        Tool {
            name: "DeleteTransport",
            description: "Delete a modifiable transport request",
            class: Op::Transport,
            input_schema: schema(&[("number", "string", "Transport number")], &[]),
        },
        Tool {
            name: "GetTransportInfo",
            description: "Pre-check how changes to an object would be recorded",
            class: Op::Transport,
            input_schema: schema(
                &[
                    ("object_url", "string", "ADT URL of the object"),
                    ("dev_class", "string", "Package of the object"),
                ],
                &[],
            ),
        },
        // --- ZADT_VSP (WebSocket) ---
        Tool {
            name: "RunReport",
            description: "Execute a report via ZADT_VSP, optionally capturing its ALV output",
            class: Op::Test,
            input_schema: schema(
                &[("report", "string", "Report name")],
                &[
                    ("variant", "string", "Variant to run with"),
                    ("capture_alv", "boolean", "Capture ALV rows"),
                    ("max_rows", "number", "ALV row cap"),
                ],
            ),
        },
        Tool {
            name: "GetTextElements",
            description: "Read a program's selection texts and text symbols",
            class: Op::Read,
            input_schema: schema(
                &[("program", "string", "Program name")],
                &[("language", "string", "Language key")],
            ),
        },
        Tool {
            name: "GetReportVariants",
            description: "List the variants of a report",
            class: Op::Read,
            input_schema: schema(&[("report", "string", "Report name")], &[]),
        },
        Tool {
            name: "GitExport",
            description: "Export packages as an abapGit ZIP, streamed in chunks over ZADT_VSP",
            class: Op::Read,
            input_schema: schema(
                &[("packages", "string", "Comma-separated package patterns")],
                &[("chunk_size", "number", "Chunk size in bytes (default 5 MiB)")],
            ),
        },
        Tool {
            name: "AmdpExecuteAndDebug",
            description: "Run an AMDP method under the debugger with a breakpoint, returning the break events",
            class: Op::Test,
            input_schema: schema(
                &[
                    ("class", "string", "AMDP class"),
                    ("method", "string", "AMDP method"),
                    ("line", "number", "Breakpoint line"),
                ],
                &[
                    ("count", "number", "Execution count parameter"),
                    ("cascade_mode", "string", "Cascade mode (default FULL)"),
                ],
            ),
        },
        Tool {
            name: "AmdpStatus",
            description: "Status of the AMDP debug session",
            class: Op::Read,
            input_schema: schema(&[], &[]),
        },
    ]
}

/// The catalog for an exposure mode.
pub fn catalog(mode: Mode) -> Vec<Tool> {
    let all = full_catalog();
    match mode {
        Mode::Expert => all,
        Mode::Focused => all
            .into_iter()
            .filter(|tool| FOCUSED_TOOLS.contains(&tool.name))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_are_unique() {
        let all = full_catalog();
        let mut names: Vec<&str> = all.iter().map(|t| t.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), all.len());
    }

    #[test]
    fn focused_is_a_strict_subset_of_expert() {
        let expert = catalog(Mode::Expert);
        let focused = catalog(Mode::Focused);
        assert!(focused.len() < expert.len());
        assert_eq!(focused.len(), FOCUSED_TOOLS.len());
        for tool in &focused {
            assert!(expert.iter().any(|t| t.name == tool.name));
        }
        // The unified entry points are always in the focused set.
        assert!(focused.iter().any(|t| t.name == "GetSource"));
        assert!(focused.iter().any(|t| t.name == "WriteSource"));
        // Transport management is expert-only.
        assert!(!focused.iter().any(|t| t.name == "CreateTransport"));
    }

    #[test]
    fn definitions_carry_schema_and_required_fields() {
        let tool = full_catalog()
            .into_iter()
            .find(|t| t.name == "EditSource")
            .unwrap();
        let definition = tool.definition();
        assert_eq!(definition["name"], "EditSource");
        let required = definition["inputSchema"]["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "old_string"));
        assert!(definition["inputSchema"]["properties"]["replace_all"]["type"] == "boolean");
    }

    #[test]
    fn every_focused_name_exists() {
        let all = full_catalog();
        for name in FOCUSED_TOOLS {
            assert!(all.iter().any(|t| t.name == *name), "missing {name}");
        }
    }
}
