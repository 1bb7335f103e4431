//! Tool handlers: decode arguments, call into the engine, format results.
//! Sources come back as plain text, records as pretty-printed JSON; every
//! engine error becomes a tool result with the is-error flag and the
//! `kind: server text` message.

use serde_json::Value;

use adt_rs::{
    AdtError, CdsDependencyOptions, ClassInclude, CreateOptions, CreateTransportOptions,
    DependencyLevel, EditParams, Engine, ObjectKind, ObjectRef, ReleaseTransportOptions, Result,
    UnitTestFlags,
};

use crate::catalog::Tool;
use crate::handlers_deploy;

/// What a tool call produced: a text block, flagged on failure.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutcome {
    pub fn ok(text: impl Into<String>) -> ToolOutcome {
        ToolOutcome {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn err(text: impl Into<String>) -> ToolOutcome {
        ToolOutcome {
            text: text.into(),
            is_error: true,
        }
    }
}

// --- argument decoding ---

pub fn req_str(args: &Value, key: &str) -> Result<String> {
    match args.get(key).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(AdtError::InvalidArgument(format!("{key} is required"))),
    }
}

pub fn opt_str(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn opt_bool(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub fn opt_u32(args: &Value, key: &str, default: u32) -> u32 {
    args.get(key)
        .and_then(Value::as_u64)
        .map(|v| v as u32)
        .unwrap_or(default)
}

pub fn req_u32(args: &Value, key: &str) -> Result<u32> {
    args.get(key)
        .and_then(Value::as_u64)
        .map(|v| v as u32)
        .ok_or_else(|| AdtError::InvalidArgument(format!("{key} is required")))
}

fn record(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|err| format!("serialization failed: {err}"))
}

/// Dispatch one tool call. Argument validation and the safety gate run
/// before any network I/O; in dry-run mode, write-class tools report the
/// validated action without executing it.
pub async fn dispatch(engine: &Engine, tool: &Tool, args: &Value) -> ToolOutcome {
    if let Err(err) = engine.safety().check_operation(tool.class, tool.name) {
        return ToolOutcome::err(err.to_string());
    }
    if engine.safety().dry_run && tool.class.is_write() && tool.name != "DeployZip" {
        // DeployZip computes its plan itself in dry-run mode.
        return match handle(engine, tool, args, true).await {
            Ok(text) => ToolOutcome::ok(text),
            Err(err) => ToolOutcome::err(err.to_string()),
        };
    }
    match handle(engine, tool, args, false).await {
        Ok(text) => ToolOutcome::ok(text),
        Err(err) => ToolOutcome::err(err.to_string()),
    }
}

async fn handle(engine: &Engine, tool: &Tool, args: &Value, dry_run: bool) -> Result<String> {
    match tool.name {
        // --- unified ---
        "GetSource" => get_source_unified(engine, args).await,
        "WriteSource" => write_source_unified(engine, args, dry_run).await,

        // --- reads ---
        "GetProgram" => {
            let name = req_str(args, "program_name")?;
            engine.get_source(&ObjectRef::new(ObjectKind::Program, name)).await
        }
        "GetClass" => {
            let name = req_str(args, "class_name")?;
            engine.get_source(&ObjectRef::new(ObjectKind::Class, name)).await
        }
        "GetInterface" => {
            let name = req_str(args, "interface_name")?;
            engine.get_source(&ObjectRef::new(ObjectKind::Interface, name)).await
        }
        "GetInclude" => {
            let name = req_str(args, "include_name")?;
            engine.get_source(&ObjectRef::new(ObjectKind::Include, name)).await
        }
        "GetFunction" => {
            let name = req_str(args, "function_name")?;
            let group = req_str(args, "function_group")?;
            engine
                .get_source(&ObjectRef::with_parent(ObjectKind::FunctionModule, name, group))
                .await
        }
        "GetFunctionGroup" => {
            let group = req_str(args, "function_group")?;
            Ok(record(&engine.get_function_group(&group).await?))
        }
        "GetClassInclude" => {
            let class_name = req_str(args, "class_name")?;
            let include = ClassInclude::parse(&req_str(args, "include_type")?)?;
            engine.get_class_include(&class_name, include).await
        }
        "GetTable" => engine.get_table(&req_str(args, "table_name")?).await,
        "GetStructure" => engine.get_structure(&req_str(args, "structure_name")?).await,
        "GetTableContents" => {
            let table = req_str(args, "table_name")?;
            let max_rows = opt_u32(args, "max_rows", 100);
            Ok(record(&engine.get_table_contents(&table, max_rows).await?))
        }
        "RunQuery" => {
            let sql = req_str(args, "sql_query")?;
            let max_rows = opt_u32(args, "max_rows", 100);
            Ok(record(&engine.run_query(&sql, max_rows).await?))
        }
        "GetPackage" => {
            let name = req_str(args, "package_name")?;
            let info = engine.get_package(&name).await?;
            let contents = engine.list_package_contents(&name).await?;
            Ok(format!(
                "{}\n\nObjects ({}):\n{}",
                record(&info),
                contents.len(),
                record(&contents)
            ))
        }
        "GetTransaction" => engine.get_transaction(&req_str(args, "transaction_name")?).await,
        "GetTypeInfo" => engine.get_type_info(&req_str(args, "type_name")?).await,
        "GetCDSDependencies" => get_cds_dependencies(engine, args).await,
        "SearchObject" => {
            let query = req_str(args, "query")?;
            let max = opt_u32(args, "max_results", 100);
            Ok(record(&engine.search_objects(&query, max).await?))
        }
        "GrepObject" => {
            let object_url = req_str(args, "object_url")?;
            let pattern = req_str(args, "pattern")?;
            let folded = opt_bool(args, "case_insensitive", false);
            Ok(record(&engine.grep_object(&object_url, &pattern, folded).await?))
        }
        "GrepPackage" => {
            let package = req_str(args, "package_name")?;
            let pattern = req_str(args, "pattern")?;
            let folded = opt_bool(args, "case_insensitive", false);
            let max = opt_u32(args, "max_results", 100) as usize;
            let hits = engine.grep_package(&package, &pattern, folded, max).await?;
            let mut out = String::new();
            for (object, matches) in hits {
                out.push_str(&format!("{} {} ({} match(es))\n", object.object_type, object.name, matches.len()));
                for hit in matches {
                    out.push_str(&format!("  {}: {}\n", hit.line, hit.text));
                }
            }
            if out.is_empty() {
                out = "no matches".into();
            }
            Ok(out)
        }

        // --- code intelligence ---
        "FindDefinition" => {
            let position = engine
                .find_definition(
                    &req_str(args, "source_url")?,
                    &req_str(args, "source")?,
                    req_u32(args, "line")?,
                    req_u32(args, "start_column")?,
                    req_u32(args, "end_column")?,
                    opt_bool(args, "implementation", false),
                )
                .await?;
            Ok(record(&position))
        }
        "FindReferences" => {
            let object_url = req_str(args, "object_url")?;
            let position = match (args.get("line").and_then(Value::as_u64), args.get("column").and_then(Value::as_u64)) {
                (Some(line), Some(column)) => Some((line as u32, column as u32)),
                _ => None,
            };
            Ok(record(&engine.find_references(&object_url, position).await?))
        }
        "CodeCompletion" => {
            let proposals = engine
                .code_completion(
                    &req_str(args, "source_url")?,
                    &req_str(args, "source")?,
                    req_u32(args, "line")?,
                    req_u32(args, "column")?,
                )
                .await?;
            Ok(record(&proposals))
        }
        "GetTypeHierarchy" => {
            let entries = engine
                .type_hierarchy(
                    &req_str(args, "source_url")?,
                    &req_str(args, "source")?,
                    req_u32(args, "line")?,
                    req_u32(args, "column")?,
                    opt_bool(args, "super_types", false),
                )
                .await?;
            Ok(record(&entries))
        }

        // --- development ---
        "SyntaxCheck" => {
            let diagnostics = engine
                .syntax_check(&req_str(args, "object_url")?, &req_str(args, "content")?)
                .await?;
            if diagnostics.is_empty() {
                Ok("no syntax issues".into())
            } else {
                Ok(record(&diagnostics))
            }
        }
        "Activate" => {
            if dry_run {
                return Ok("dry-run: Activate validated, not executed".into());
            }
            let result = engine
                .activate(&req_str(args, "object_url")?, &req_str(args, "object_name")?)
                .await?;
            Ok(record(&result))
        }
        "RunUnitTests" => {
            let flags = UnitTestFlags {
                dangerous: opt_bool(args, "include_dangerous", false),
                long: opt_bool(args, "include_long", false),
                ..UnitTestFlags::default()
            };
            let report = engine
                .run_unit_tests(&req_str(args, "object_url")?, flags)
                .await?;
            Ok(record(&report))
        }

        // --- CRUD primitives ---
        "LockObject" => {
            let object_url = req_str(args, "object_url")?;
            let access_mode = opt_str(args, "access_mode");
            let lock = engine.lock(&object_url, access_mode.as_deref()).await?;
            Ok(record(&lock))
        }
        "UnlockObject" => {
            engine
                .unlock(&req_str(args, "object_url")?, &req_str(args, "lock_handle")?)
                .await?;
            Ok("unlocked".into())
        }
        "UpdateSource" => {
            if dry_run {
                return Ok("dry-run: UpdateSource validated, not executed".into());
            }
            let object_url = req_str(args, "object_url")?;
            let source_url = if object_url.ends_with("/source/main") {
                object_url
            } else {
                format!("{object_url}/source/main")
            };
            engine
                .update_source(
                    &source_url,
                    &req_str(args, "source")?,
                    &req_str(args, "lock_handle")?,
                    opt_str(args, "transport").as_deref(),
                )
                .await?;
            Ok("source updated".into())
        }
        "CreateObject" => {
            let kind = ObjectKind::parse(&req_str(args, "object_type")?)?;
            let options = CreateOptions {
                kind: Some(kind),
                name: req_str(args, "name")?,
                description: req_str(args, "description")?,
                package: req_str(args, "package_name")?,
                transport: opt_str(args, "transport"),
                parent: opt_str(args, "parent_name"),
                ..CreateOptions::default()
            };
            if dry_run {
                return Ok(format!(
                    "dry-run: would create {} {}",
                    kind.adt_type(),
                    options.name.to_uppercase()
                ));
            }
            let object = engine.create_object(options).await?;
            Ok(format!("created {}", object.object_url()?))
        }
        "DeleteObject" => {
            if dry_run {
                return Ok("dry-run: DeleteObject validated, not executed".into());
            }
            engine
                .delete_object(
                    &req_str(args, "object_url")?,
                    &req_str(args, "lock_handle")?,
                    opt_str(args, "transport").as_deref(),
                )
                .await?;
            Ok("deleted".into())
        }
        "CreateTestInclude" => {
            if dry_run {
                return Ok("dry-run: CreateTestInclude validated, not executed".into());
            }
            engine
                .create_test_include(
                    &req_str(args, "class_name")?,
                    &req_str(args, "lock_handle")?,
                    opt_str(args, "transport").as_deref(),
                )
                .await?;
            Ok("test include created".into())
        }
        "UpdateClassInclude" => {
            if dry_run {
                return Ok("dry-run: UpdateClassInclude validated, not executed".into());
            }
            let include = ClassInclude::parse(&req_str(args, "include_type")?)?;
            engine
                .update_class_include(
                    &req_str(args, "class_name")?,
                    include,
                    &req_str(args, "source")?,
                    &req_str(args, "lock_handle")?,
                    opt_str(args, "transport").as_deref(),
                )
                .await?;
            Ok("include updated".into())
        }

        // --- workflows ---
        "WriteProgram" => {
            let name = req_str(args, "program_name")?;
            let source = req_str(args, "source")?;
            if dry_run {
                return Ok(format!("dry-run: would write program {}", name.to_uppercase()));
            }
            Ok(record(
                &engine
                    .write_program(&name, &source, opt_str(args, "transport").as_deref())
                    .await?,
            ))
        }
        "WriteClass" => {
            let name = req_str(args, "class_name")?;
            let source = req_str(args, "source")?;
            if dry_run {
                return Ok(format!("dry-run: would write class {}", name.to_uppercase()));
            }
            Ok(record(
                &engine
                    .write_class(&name, &source, opt_str(args, "transport").as_deref())
                    .await?,
            ))
        }
        "CreateAndActivateProgram" => {
            let name = req_str(args, "program_name")?;
            let description = req_str(args, "description")?;
            let package = req_str(args, "package_name")?;
            let source = req_str(args, "source")?;
            if dry_run {
                return Ok(format!("dry-run: would create program {}", name.to_uppercase()));
            }
            Ok(record(
                &engine
                    .create_and_activate(
                        ObjectKind::Program,
                        &name,
                        &description,
                        &package,
                        &source,
                        opt_str(args, "transport").as_deref(),
                    )
                    .await?,
            ))
        }
        "CreateClassWithTests" => {
            let name = req_str(args, "class_name")?;
            let description = req_str(args, "description")?;
            let package = req_str(args, "package_name")?;
            let class_source = req_str(args, "class_source")?;
            let test_source = req_str(args, "test_source")?;
            if dry_run {
                return Ok(format!("dry-run: would create class {}", name.to_uppercase()));
            }
            Ok(record(
                &engine
                    .create_class_with_tests(
                        &name,
                        &description,
                        &package,
                        &class_source,
                        &test_source,
                        opt_str(args, "transport").as_deref(),
                    )
                    .await?,
            ))
        }
        "EditSource" => {
            let params = EditParams {
                object_url: req_str(args, "object_url")?,
                old_string: req_str(args, "old_string")?,
                new_string: req_str(args, "new_string")?,
                replace_all: opt_bool(args, "replace_all", false),
                syntax_check: opt_bool(args, "syntax_check", true),
                case_insensitive: opt_bool(args, "case_insensitive", false),
                transport: opt_str(args, "transport"),
            };
            if dry_run {
                return Ok(format!("dry-run: would edit {}", params.object_url));
            }
            Ok(record(&engine.edit_source(params).await?))
        }
        "RenameObject" => {
            let kind = ObjectKind::parse(&req_str(args, "object_type")?)?;
            let old_name = req_str(args, "old_name")?;
            let new_name = req_str(args, "new_name")?;
            let package = req_str(args, "package_name")?;
            if dry_run {
                return Ok(format!(
                    "dry-run: would rename {} to {}",
                    old_name.to_uppercase(),
                    new_name.to_uppercase()
                ));
            }
            Ok(record(
                &engine
                    .rename_object(
                        kind,
                        &old_name,
                        &new_name,
                        &package,
                        opt_str(args, "transport").as_deref(),
                    )
                    .await?,
            ))
        }

        // --- deployment ---
        "DeployZip" => handlers_deploy::deploy_zip(engine, args).await,

        // --- CTS ---
        "ListTransports" => {
            let user = opt_str(args, "user");
            Ok(record(&engine.list_transports(user.as_deref()).await?))
        }
        "GetTransport" => Ok(record(&engine.get_transport(&req_str(args, "number")?).await?)),
        "CreateTransport" => {
            let options = CreateTransportOptions {
                description: req_str(args, "description")?,
                package: req_str(args, "package")?,
                transport_layer: opt_str(args, "transport_layer"),
                customizing: opt_bool(args, "customizing", false),
            };
            if dry_run {
                return Ok("dry-run: CreateTransport validated, not executed".into());
            }
            let number = engine.create_transport(options).await?;
            Ok(format!("created transport {number}"))
        }
        "ReleaseTransport" => {
            let number = req_str(args, "number")?;
            if dry_run {
                return Ok(format!("dry-run: would release transport {number}"));
            }
            engine
                .release_transport(
                    &number,
                    ReleaseTransportOptions {
                        ignore_locks: opt_bool(args, "ignore_locks", false),
                        skip_atc: opt_bool(args, "skip_atc", false),
                    },
                )
                .await?;
            Ok(format!("released transport {}", number.to_uppercase()))
        }
        "DeleteTransport" => {
            let number = req_str(args, "number")?;
            if dry_run {
                return Ok(format!("dry-run: would delete transport {number}"));
            }
            engine.delete_transport(&number).await?;
            Ok(format!("deleted transport {}", number.to_uppercase()))
        }
        "GetTransportInfo" => {
            let info = engine
                .get_transport_info(&req_str(args, "object_url")?, &req_str(args, "dev_class")?)
                .await?;
            Ok(record(&info))
        }

        // --- ZADT_VSP ---
        "RunReport" => {
            let vsp = engine.vsp().await?;
            let result = vsp
                .run_report(adt_rs::adapter::transport::websocket::report::RunReportParams {
                    report: req_str(args, "report")?.to_uppercase(),
                    variant: opt_str(args, "variant"),
                    capture_alv: opt_bool(args, "capture_alv", true),
                    max_rows: args.get("max_rows").and_then(Value::as_u64),
                    ..Default::default()
                })
                .await?;
            Ok(record(&result))
        }
        "GetTextElements" => {
            let vsp = engine.vsp().await?;
            let program = req_str(args, "program")?;
            let language = opt_str(args, "language");
            Ok(record(&vsp.get_text_elements(&program, language.as_deref()).await?))
        }
        "GetReportVariants" => {
            let vsp = engine.vsp().await?;
            Ok(record(&vsp.get_report_variants(&req_str(args, "report")?).await?))
        }
        "GitExport" => {
            let packages = req_str(args, "packages")?;
            let chunk_size = args.get("chunk_size").and_then(Value::as_u64);
            let vsp = engine.vsp().await?;
            let payload = vsp.git_export(&packages, chunk_size, |_, _, _| {}).await?;
            use base64::Engine as _;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&payload);
            Ok(format!(
                "exported {} bytes for '{packages}'\nzip_base64:\n{encoded}",
                payload.len()
            ))
        }
        "AmdpExecuteAndDebug" => {
            let vsp = engine.vsp().await?;
            let result = vsp
                .amdp_execute_and_debug(
                    &req_str(args, "class")?,
                    &req_str(args, "method")?,
                    req_u32(args, "line")?,
                    opt_u32(args, "count", 10),
                    opt_str(args, "cascade_mode").as_deref(),
                )
                .await?;
            Ok(record(&result))
        }
        "AmdpStatus" => {
            let vsp = engine.vsp().await?;
            Ok(record(&vsp.amdp_status().await?))
        }

        other => Err(AdtError::InvalidArgument(format!("unknown tool '{other}'"))),
    }
}

async fn get_source_unified(engine: &Engine, args: &Value) -> Result<String> {
    let object_type = req_str(args, "object_type")?;
    let name = req_str(args, "name")?;

    if object_type.eq_ignore_ascii_case("class-include") {
        let include = req_str(args, "include").map_err(|_| {
            AdtError::InvalidArgument("include is required for class-include reads".into())
        })?;
        return engine
            .get_class_include(&name, ClassInclude::parse(&include)?)
            .await;
    }

    let kind = ObjectKind::parse(&object_type)?;
    if kind == ObjectKind::Class {
        if let Some(include) = opt_str(args, "include") {
            let include = ClassInclude::parse(&include)?;
            return engine.get_class_include(&name, include).await;
        }
    }

    let object = match kind {
        ObjectKind::FunctionModule => {
            let parent = req_str(args, "parent")
                .map_err(|_| AdtError::InvalidArgument("parent (function group) is required for function modules".into()))?;
            ObjectRef::with_parent(kind, name, parent)
        }
        _ => ObjectRef::new(kind, name),
    };
    engine.get_source(&object).await
}

async fn write_source_unified(engine: &Engine, args: &Value, dry_run: bool) -> Result<String> {
    let kind = ObjectKind::parse(&req_str(args, "object_type")?)?;
    if !matches!(kind, ObjectKind::Program | ObjectKind::Class | ObjectKind::Interface) {
        return Err(AdtError::UnsupportedObject(
            "WriteSource supports program, class and interface".into(),
        ));
    }
    let name = req_str(args, "name")?;
    let source = req_str(args, "source")?;
    let mode = opt_str(args, "mode").unwrap_or_else(|| "upsert".into());
    let transport = opt_str(args, "transport");
    let test_source = opt_str(args, "test_source");
    if test_source.is_some() && kind != ObjectKind::Class {
        return Err(AdtError::InvalidArgument(
            "test_source is only valid for classes".into(),
        ));
    }

    let object = ObjectRef::new(kind, &name);
    let exists = match mode.as_str() {
        "create" => false,
        "update" => true,
        "upsert" => match engine.get_source(&object).await {
            Ok(_) => true,
            Err(AdtError::NotFound(_)) => false,
            Err(err) => return Err(err),
        },
        other => {
            return Err(AdtError::InvalidArgument(format!(
                "invalid mode '{other}' (expected upsert, create or update)"
            )))
        }
    };

    if dry_run {
        return Ok(format!(
            "dry-run: would {} {} {}",
            if exists { "update" } else { "create" },
            kind.adt_type(),
            object.name
        ));
    }

    if exists {
        let result = engine
            .write_object(kind, &name, &source, transport.as_deref())
            .await?;
        if let Some(test_source) = test_source {
            let tests = update_test_include(engine, &object.name, &test_source, transport.as_deref()).await?;
            return Ok(format!("{}\n\nUnit tests:\n{tests}", record(&result)));
        }
        return Ok(record(&result));
    }

    let description = opt_str(args, "description").unwrap_or_else(|| object.name.clone());
    let package = req_str(args, "package")
        .map_err(|_| AdtError::InvalidArgument("package is required to create a new object".into()))?;

    if kind == ObjectKind::Class {
        if let Some(test_source) = test_source {
            let result = engine
                .create_class_with_tests(
                    &name,
                    &description,
                    &package,
                    &source,
                    &test_source,
                    transport.as_deref(),
                )
                .await?;
            return Ok(record(&result));
        }
    }
    let result = engine
        .create_and_activate(kind, &name, &description, &package, &source, transport.as_deref())
        .await?;
    Ok(record(&result))
}

/// Write the testclasses include of an existing class and rerun its tests.
async fn update_test_include(
    engine: &Engine,
    class_name: &str,
    test_source: &str,
    transport: Option<&str>,
) -> Result<String> {
    let object = ObjectRef::new(ObjectKind::Class, class_name);
    let object_url = object.object_url()?;

    let lock = engine.lock(&object_url, None).await?;
    let upload = async {
        match engine
            .create_test_include(class_name, &lock.handle, transport)
            .await
        {
            Ok(()) | Err(AdtError::AlreadyExists(_)) => {}
            Err(err) => return Err(err),
        }
        engine
            .update_class_include(
                class_name,
                ClassInclude::Testclasses,
                test_source,
                &lock.handle,
                transport,
            )
            .await
    }
    .await;
    let unlock_result = engine.unlock(&object_url, &lock.handle).await;
    match (upload, unlock_result) {
        (Err(err), _) => return Err(err),
        (Ok(()), Err(unlock_err)) => {
            tracing::warn!(class = class_name, error = %unlock_err, "unlock failed after test include update");
        }
        (Ok(()), Ok(())) => {}
    }

    engine.activate(&object_url, &object.name).await?;
    let report = engine.run_unit_tests(&object_url, UnitTestFlags::default()).await?;
    Ok(record(&report))
}

async fn get_cds_dependencies(engine: &Engine, args: &Value) -> Result<String> {
    let name = req_str(args, "ddls_name")?;
    let options = CdsDependencyOptions {
        level: match opt_str(args, "dependency_level") {
            Some(level) => DependencyLevel::parse(&level)?,
            None => DependencyLevel::Hierarchy,
        },
        with_associations: opt_bool(args, "with_associations", false),
        package: opt_str(args, "context_package"),
    };
    let tree = engine.cds_dependencies(&name, options).await?;

    let summary = serde_json::json!({
        "root": tree.root.name,
        "nodes": tree.flatten().len(),
        "depth": tree.depth(),
        "by_type": tree.count_by_type(),
        "table_leaves": tree.table_leaves().iter().map(|n| n.name.clone()).collect::<Vec<_>>(),
        "cycles": tree.find_cycles(),
        "tree": tree,
    });
    Ok(serde_json::to_string_pretty(&summary).unwrap_or_default())
}
