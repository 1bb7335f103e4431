//! The DeployZip tool: decode the archive, run the three-phase deployment
//! and render the cumulative report the way an agent can act on it.

use base64::Engine as _;
use serde_json::Value;

use adt_rs::{AdtError, DeployOptions, DeployReport, Engine, Result};

use crate::handlers::{opt_bool, opt_str, req_str};

pub async fn deploy_zip(engine: &Engine, args: &Value) -> Result<String> {
    let encoded = req_str(args, "zip_base64")?;
    let package = req_str(args, "package")?;
    let zip_bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(|err| AdtError::InvalidArgument(format!("zip_base64 is not valid base64: {err}")))?;

    let options = DeployOptions {
        package: package.clone(),
        // Policy-level dry-run forces a plan-only pass.
        dry_run: opt_bool(args, "dry_run", false) || engine.safety().dry_run,
        type_filter: opt_str(args, "type_filter"),
        name_filter: opt_str(args, "name_filter"),
        ..DeployOptions::default()
    };

    let report = engine.deploy_archive(&zip_bytes, options).await?;
    Ok(render_report(&report))
}

pub fn render_report(report: &DeployReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Deploy -> {}\n", report.package));
    out.push_str(&format!(
        "{} file(s), {} deployable, {} skipped\n",
        report.total_files,
        report.deployable.len(),
        report.skipped.len()
    ));
    for name in &report.deployable {
        out.push_str(&format!("  + {name}\n"));
    }
    for name in &report.skipped {
        out.push_str(&format!("  - {name} (skipped, no native ADT deployment)\n"));
    }

    if report.dry_run {
        out.push_str("\ndry run - no changes made\n");
        return out;
    }

    out.push_str(&format!(
        "\nPhase 1 (create):   {} created, {} existed, {} failed\n",
        report.create.created,
        report.create.existed,
        report.create.failed.len()
    ));
    for failure in &report.create.failed {
        out.push_str(&format!(
            "  ! {} {}: {}\n",
            failure.object_type, failure.name, failure.reason
        ));
    }

    out.push_str(&format!(
        "Phase 2 (upload):   {} uploaded, {} failed\n",
        report.upload.uploaded,
        report.upload.failed.len()
    ));
    for failure in &report.upload.failed {
        out.push_str(&format!(
            "  ! {} {}: {}\n",
            failure.object_type, failure.name, failure.reason
        ));
    }

    out.push_str(&format!(
        "Phase 3 (activate): {} pass(es), {} activated\n",
        report.activation.passes.len(),
        report.activation.total_activated
    ));
    for (index, pass) in report.activation.passes.iter().enumerate() {
        out.push_str(&format!(
            "  pass {}: {} activated, {} still inactive\n",
            index + 1,
            pass.activated,
            pass.still_inactive
        ));
    }
    if report.activation.still_inactive.is_empty() {
        out.push_str("\nall objects active - deployment verified\n");
    } else {
        out.push_str(&format!(
            "\nWARNING: {} object(s) still inactive:\n",
            report.activation.still_inactive.len()
        ));
        for object in &report.activation.still_inactive {
            out.push_str(&format!("  ? {} ({})\n", object.name, object.uri));
        }
    }

    out
}
