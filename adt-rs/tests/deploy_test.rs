//! Deployment engine behavior: dry runs touch no network, phase 2 never
//! syntax-checks, AlreadyExists is tolerated, and iterative activation
//! stops at the fixpoint.

mod common;

use std::io::Write;

use adt_rs::{DeployOptions, Method};

use common::{activation_body, engine_with, lock_body, permissive_policy, MockTransport, Reply};

fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

fn sample_archive() -> Vec<u8> {
    build_zip(&[
        ("src/zif_api.intf.abap", "INTERFACE zif_api PUBLIC.\nENDINTERFACE."),
        (
            "src/zcl_impl.clas.abap",
            "CLASS zcl_impl DEFINITION PUBLIC.\nENDCLASS.",
        ),
        (
            "src/zcl_impl.clas.xml",
            "<abapGit><DESCRIPT>Implementation</DESCRIPT></abapGit>",
        ),
        ("src/zrun.prog.abap", "REPORT zrun."),
        // Tolerated but skipped: no native ADT deployment path.
        ("src/zmsg.msag.xml", "<abapGit><DESCRIPT>Messages</DESCRIPT></abapGit>"),
    ])
}

#[tokio::test]
async fn dry_run_issues_zero_network_requests() {
    let transport = MockTransport::new();
    let engine = engine_with(transport.clone(), permissive_policy());

    let report = engine
        .deploy_archive(
            &sample_archive(),
            DeployOptions {
                package: "$ZGIT".into(),
                dry_run: true,
                ..DeployOptions::default()
            },
        )
        .await
        .unwrap();

    assert!(report.dry_run);
    assert!(report.success);
    assert_eq!(report.deployable.len(), 3);
    assert_eq!(report.skipped, vec!["MSAG ZMSG"]);
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn three_phases_run_in_order_with_already_exists_tolerated() {
    let transport = MockTransport::new();
    transport
        // The target package exists.
        .on(Method::Get, "/sap/bc/adt/packages/$zgit", Reply::Ok("<pak:package xmlns:pak=\"http://www.sap.com/adt/packages\" xmlns:adtcore=\"http://www.sap.com/adt/core\" adtcore:name=\"$ZGIT\"/>".into()))
        // Phase 1 creates. The class shell already exists.
        .on(Method::Post, "/sap/bc/adt/oo/interfaces", Reply::Ok(String::new()))
        .on(
            Method::Post,
            "/sap/bc/adt/oo/classes",
            Reply::AlreadyExists("Resource ZCL_IMPL AlreadyExists".into()),
        )
        .on(Method::Post, "/sap/bc/adt/programs/programs", Reply::Ok(String::new()))
        // Phase 2 lock/put/unlock per object.
        .on_action(Method::Post, "/oo/interfaces/zif_api", "LOCK", Reply::Ok(lock_body("L1")))
        .on(Method::Put, "/zif_api/source/main", Reply::Ok(String::new()))
        .on_action(Method::Post, "/oo/interfaces/zif_api", "UNLOCK", Reply::Ok(String::new()))
        .on_action(Method::Post, "/oo/classes/zcl_impl", "LOCK", Reply::Ok(lock_body("L2")))
        .on(Method::Put, "/zcl_impl/source/main", Reply::Ok(String::new()))
        .on_action(Method::Post, "/oo/classes/zcl_impl", "UNLOCK", Reply::Ok(String::new()))
        .on_action(Method::Post, "/programs/programs/zrun", "LOCK", Reply::Ok(lock_body("L3")))
        .on(Method::Put, "/zrun/source/main", Reply::Ok(String::new()))
        .on_action(Method::Post, "/programs/programs/zrun", "UNLOCK", Reply::Ok(String::new()))
        // Phase 3: first pass leaves the class inactive, second finishes.
        .on(
            Method::Post,
            "/sap/bc/adt/activation",
            Reply::Ok(activation_body(&[(
                "/sap/bc/adt/oo/classes/zcl_impl",
                "ZCL_IMPL",
            )])),
        )
        .on(Method::Post, "/sap/bc/adt/activation", Reply::Ok(String::new()));

    let engine = engine_with(transport.clone(), permissive_policy());
    let report = engine
        .deploy_archive(
            &sample_archive(),
            DeployOptions {
                package: "$ZGIT".into(),
                ..DeployOptions::default()
            },
        )
        .await
        .unwrap();

    assert!(report.success, "report: {report:?}");
    assert_eq!(report.create.created, 2);
    assert_eq!(report.create.existed, 1);
    assert!(report.create.failed.is_empty());
    assert_eq!(report.upload.uploaded, 3);
    assert_eq!(report.activation.passes.len(), 2);
    assert!(report.activation.still_inactive.is_empty());
    assert!(report.as_error().is_none());

    // Phase 2 issued no syntax check.
    assert!(transport.requests_to("/checkruns").is_empty());

    // Interfaces deploy before classes before programs, and every create
    // precedes every upload.
    let requests = transport.requests();
    let create_intf = transport.position_of(Method::Post, "/oo/interfaces").unwrap();
    let create_prog = transport
        .position_of(Method::Post, "/sap/bc/adt/programs/programs")
        .unwrap();
    assert!(create_intf < create_prog);
    let first_put = requests.iter().position(|r| r.method == Method::Put).unwrap();
    assert!(create_prog < first_put);
}

#[tokio::test]
async fn upload_failure_still_unlocks_and_turns_partial() {
    let transport = MockTransport::new();
    transport
        .on(Method::Get, "/sap/bc/adt/packages/$zgit", Reply::Ok("<pak:package xmlns:pak=\"http://www.sap.com/adt/packages\"/>".into()))
        .on(Method::Post, "/sap/bc/adt/programs/programs", Reply::Ok(String::new()))
        .on_action(Method::Post, "/programs/programs/zrun", "LOCK", Reply::Ok(lock_body("L1")))
        .on(
            Method::Put,
            "/zrun/source/main",
            Reply::Server("save rejected".into()),
        )
        .on_action(Method::Post, "/programs/programs/zrun", "UNLOCK", Reply::Ok(String::new()))
        .on(Method::Post, "/sap/bc/adt/activation", Reply::Ok(String::new()));

    let archive = build_zip(&[("src/zrun.prog.abap", "REPORT zrun.")]);
    let engine = engine_with(transport.clone(), permissive_policy());
    let report = engine
        .deploy_archive(
            &archive,
            DeployOptions {
                package: "$ZGIT".into(),
                ..DeployOptions::default()
            },
        )
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.upload.uploaded, 0);
    assert_eq!(report.upload.failed.len(), 1);
    assert!(report.upload.failed[0].reason.contains("save rejected"));

    // The unlock was still attempted after the failed upload.
    let unlocks: Vec<_> = transport
        .requests_to("/programs/programs/zrun")
        .into_iter()
        .filter(|r| r.has_query("_action", "UNLOCK"))
        .collect();
    assert_eq!(unlocks.len(), 1);

    let err = report.as_error().unwrap();
    assert_eq!(err.code(), "deployment-partial");
}

#[tokio::test]
async fn activation_stops_when_the_inactive_set_stops_shrinking() {
    let transport = MockTransport::new();
    transport
        .on(Method::Get, "/sap/bc/adt/packages/$zgit", Reply::Ok("<pak:package xmlns:pak=\"http://www.sap.com/adt/packages\"/>".into()))
        .on(Method::Post, "/sap/bc/adt/programs/programs", Reply::Ok(String::new()))
        .on_action(Method::Post, "/programs/programs/zrun", "LOCK", Reply::Ok(lock_body("L1")))
        .on(Method::Put, "/zrun/source/main", Reply::Ok(String::new()))
        .on_action(Method::Post, "/programs/programs/zrun", "UNLOCK", Reply::Ok(String::new()))
        // Every pass reports the same inactive object: no progress.
        .on(
            Method::Post,
            "/sap/bc/adt/activation",
            Reply::Ok(activation_body(&[(
                "/sap/bc/adt/programs/programs/zrun",
                "ZRUN",
            )])),
        );

    let archive = build_zip(&[("src/zrun.prog.abap", "REPORT zrun.")]);
    let engine = engine_with(transport.clone(), permissive_policy());
    let report = engine
        .deploy_archive(
            &archive,
            DeployOptions {
                package: "$ZGIT".into(),
                ..DeployOptions::default()
            },
        )
        .await
        .unwrap();

    // Pass 1 finds the inactive set, pass 2 sees it unchanged and stops,
    // well before the 5-pass limit.
    assert_eq!(report.activation.passes.len(), 2);
    assert_eq!(report.activation.still_inactive.len(), 1);
    assert!(!report.success);
}

#[tokio::test]
async fn zero_object_archive_succeeds_without_phases() {
    let transport = MockTransport::new();
    let engine = engine_with(transport.clone(), permissive_policy());
    let archive = build_zip(&[("README.md", "not abap")]);

    let report = engine
        .deploy_archive(
            &archive,
            DeployOptions {
                package: "$ZGIT".into(),
                ..DeployOptions::default()
            },
        )
        .await
        .unwrap();

    assert!(report.success);
    assert!(report.deployable.is_empty());
    assert_eq!(report.create.created, 0);
    assert_eq!(report.upload.uploaded, 0);
    assert!(report.activation.passes.is_empty());
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn type_filter_narrows_the_deployable_set() {
    let transport = MockTransport::new();
    let engine = engine_with(transport.clone(), permissive_policy());

    let report = engine
        .deploy_archive(
            &sample_archive(),
            DeployOptions {
                package: "$ZGIT".into(),
                dry_run: true,
                type_filter: Some("CLAS".into()),
                ..DeployOptions::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(report.deployable, vec!["CLAS ZCL_IMPL"]);
}
