//! The safety gate fires before any network I/O: a strict mock transport
//! with no scripted rules panics on contact, so a passing test here proves
//! zero requests were made.

mod common;

use adt_rs::{
    CreateOptions, CreateTransportOptions, DeployOptions, ObjectKind, OperationClass, SafetyPolicy,
};

use common::{engine_with, MockTransport};

fn policy(mutator: impl FnOnce(&mut SafetyPolicy)) -> SafetyPolicy {
    let mut policy = SafetyPolicy::unrestricted();
    mutator(&mut policy);
    policy
}

#[tokio::test]
async fn read_only_blocks_every_write_class_tool() {
    let transport = MockTransport::new();
    let engine = engine_with(transport.clone(), policy(|p| p.read_only = true));

    assert_eq!(
        engine
            .create_object(CreateOptions {
                kind: Some(ObjectKind::Program),
                name: "ZX".into(),
                description: "x".into(),
                package: "$TMP".into(),
                ..CreateOptions::default()
            })
            .await
            .unwrap_err()
            .code(),
        "blocked-by-policy"
    );
    assert_eq!(
        engine
            .update_source("/sap/bc/adt/programs/programs/zx/source/main", "x", "H", None)
            .await
            .unwrap_err()
            .code(),
        "blocked-by-policy"
    );
    assert_eq!(
        engine
            .delete_object("/sap/bc/adt/programs/programs/zx", "H", None)
            .await
            .unwrap_err()
            .code(),
        "blocked-by-policy"
    );
    assert_eq!(
        engine
            .activate("/sap/bc/adt/programs/programs/zx", "ZX")
            .await
            .unwrap_err()
            .code(),
        "blocked-by-policy"
    );
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn free_sql_gate_blocks_run_query_only() {
    let transport = MockTransport::new();
    let engine = engine_with(transport.clone(), policy(|p| p.block_free_sql = true));

    let err = engine.run_query("SELECT * FROM T000", 10).await.unwrap_err();
    assert_eq!(err.code(), "blocked-by-policy");
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn transport_read_only_denies_create_transport_before_network() {
    let transport = MockTransport::new();
    let engine = engine_with(
        transport.clone(),
        policy(|p| {
            p.enable_transports = true;
            p.transport_read_only = true;
        }),
    );

    let err = engine
        .create_transport(CreateTransportOptions {
            description: "x".into(),
            package: "ZPKG".into(),
            ..CreateTransportOptions::default()
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), "blocked-by-policy");
    assert!(err.to_string().contains("transport-read-only"));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn transports_are_off_unless_opted_in() {
    let transport = MockTransport::new();
    let engine = engine_with(transport.clone(), SafetyPolicy::unrestricted());

    let err = engine.list_transports(None).await.unwrap_err();
    assert_eq!(err.code(), "blocked-by-policy");
    assert!(err.to_string().contains("enable-transports"));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn transportable_packages_need_the_explicit_flag() {
    let transport = MockTransport::new();
    let engine = engine_with(transport.clone(), SafetyPolicy::unrestricted());

    let err = engine
        .create_and_activate(
            ObjectKind::Program,
            "ZX",
            "x",
            "ZPKG",
            "REPORT zx.",
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "blocked-by-policy");
    assert!(err.to_string().contains("allow-transportable-edits"));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn package_allow_list_applies_even_with_transportable_edits() {
    // The stricter rule wins: either check failing denies.
    let transport = MockTransport::new();
    let engine = engine_with(
        transport.clone(),
        policy(|p| {
            p.allow_transportable_edits = true;
            p.allowed_packages = vec!["$TMP".into()];
        }),
    );

    let err = engine
        .deploy_archive(
            b"irrelevant",
            DeployOptions {
                package: "ZPKG".into(),
                dry_run: true,
                ..DeployOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "blocked-by-policy");
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn allow_list_without_the_class_denies() {
    let transport = MockTransport::new();
    let engine = engine_with(
        transport.clone(),
        policy(|p| {
            p.allowed_ops = [
                OperationClass::Read,
                OperationClass::Search,
            ]
            .into_iter()
            .collect();
        }),
    );

    let err = engine
        .syntax_check("/sap/bc/adt/programs/programs/zx", "REPORT zx.")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "blocked-by-policy");
    assert_eq!(transport.request_count(), 0);
}
