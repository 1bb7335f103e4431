//! Read API paths and parsing against a scripted transport.

mod common;

use adt_rs::{CdsDependencyOptions, Method, ObjectKind, ObjectRef, SafetyPolicy, UnitTestFlags};

use common::{engine_with, MockTransport, Reply};

#[tokio::test]
async fn get_program_source_hits_the_canonical_path() {
    let transport = MockTransport::new();
    transport.on(
        Method::Get,
        "/sap/bc/adt/programs/programs/ztest/source/main",
        Reply::Ok("REPORT ztest.\nWRITE 'hello'.\n".into()),
    );
    let engine = engine_with(transport.clone(), SafetyPolicy::unrestricted());

    let source = engine
        .get_source(&ObjectRef::new(ObjectKind::Program, "ZTEST"))
        .await
        .unwrap();
    assert!(source.starts_with("REPORT ztest."));

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].path,
        "/sap/bc/adt/programs/programs/ztest/source/main"
    );
}

#[tokio::test]
async fn function_module_source_requires_the_group() {
    let transport = MockTransport::new();
    transport.on(
        Method::Get,
        "/sap/bc/adt/functions/groups/zfg_math/fmodules/z_add/source/main",
        Reply::Ok("FUNCTION z_add.\nENDFUNCTION.\n".into()),
    );
    let engine = engine_with(transport.clone(), SafetyPolicy::unrestricted());

    let object = ObjectRef::with_parent(ObjectKind::FunctionModule, "Z_ADD", "ZFG_MATH");
    let source = engine.get_source(&object).await.unwrap();
    assert!(source.contains("FUNCTION z_add"));

    let bare = ObjectRef::new(ObjectKind::FunctionModule, "Z_ADD");
    let err = engine.get_source(&bare).await.unwrap_err();
    assert_eq!(err.code(), "invalid-argument");
}

#[tokio::test]
async fn search_parses_object_references() {
    let transport = MockTransport::new();
    transport.on(
        Method::Get,
        "/sap/bc/adt/repository/informationsystem/search",
        Reply::Ok(
            r#"<adtcore:objectReferences xmlns:adtcore="http://www.sap.com/adt/core">
  <adtcore:objectReference adtcore:uri="/sap/bc/adt/programs/programs/ztest"
    adtcore:type="PROG/P" adtcore:name="ZTEST" adtcore:packageName="$TMP"
    adtcore:description="Test program"/>
  <adtcore:objectReference adtcore:uri="/sap/bc/adt/oo/classes/zcl_test"
    adtcore:type="CLAS/OC" adtcore:name="ZCL_TEST" adtcore:packageName="$TMP"/>
</adtcore:objectReferences>"#
                .into(),
        ),
    );
    let engine = engine_with(transport.clone(), SafetyPolicy::unrestricted());

    let results = engine.search_objects("ZT*", 50).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].name, "ZTEST");
    assert_eq!(results[0].package, "$TMP");
    assert_eq!(results[1].object_type, "CLAS/OC");

    let request = &transport.requests()[0];
    assert!(request.has_query("operation", "quickSearch"));
    assert!(request.has_query("query", "ZT*"));
    assert!(request.has_query("maxResults", "50"));
}

#[tokio::test]
async fn package_contents_decode_the_node_structure() {
    let transport = MockTransport::new();
    transport.on(
        Method::Post,
        "/sap/bc/adt/repository/nodestructure",
        Reply::Ok(
            r#"<asx:abap xmlns:asx="http://www.sap.com/abapxml"><asx:values><DATA><TREE_CONTENT>
  <SEU_ADT_REPOSITORY_OBJ_NODE>
    <OBJECT_TYPE>PROG/P</OBJECT_TYPE><OBJECT_NAME>ZRUN</OBJECT_NAME>
    <DESCRIPTION>Runner</DESCRIPTION>
    <OBJECT_URI>/sap/bc/adt/programs/programs/zrun</OBJECT_URI>
  </SEU_ADT_REPOSITORY_OBJ_NODE>
  <SEU_ADT_REPOSITORY_OBJ_NODE>
    <OBJECT_TYPE>CLAS/OC</OBJECT_TYPE><OBJECT_NAME>ZCL_A</OBJECT_NAME>
    <DESCRIPTION/>
    <OBJECT_URI>/sap/bc/adt/oo/classes/zcl_a</OBJECT_URI>
  </SEU_ADT_REPOSITORY_OBJ_NODE>
  <SEU_ADT_REPOSITORY_OBJ_NODE>
    <OBJECT_TYPE/><OBJECT_NAME/><DESCRIPTION/><OBJECT_URI/>
  </SEU_ADT_REPOSITORY_OBJ_NODE>
</TREE_CONTENT></DATA></asx:values></asx:abap>"#
                .into(),
        ),
    );
    let engine = engine_with(transport.clone(), SafetyPolicy::unrestricted());

    let objects = engine.list_package_contents("$tmp").await.unwrap();
    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0].name, "ZRUN");
    assert_eq!(objects[1].object_type, "CLAS/OC");

    let request = &transport.requests()[0];
    assert!(request.has_query("parent_name", "$TMP"));
    assert!(request.has_query("parent_type", "DEVC/K"));
}

#[tokio::test]
async fn cds_dependencies_build_the_tree_views() {
    let transport = MockTransport::new();
    transport.on(
        Method::Post,
        "/sap/bc/adt/ddic/ddl/sources/zv_top/dependencies",
        Reply::Ok(
            r#"<dependencies:result xmlns:dependencies="http://www.sap.com/adt/ris/dependencies">
  <dependencies:node dependencies:name="ZV_TOP" dependencies:type="DDLS">
    <dependencies:node dependencies:name="ZV_BASE" dependencies:type="DDLS">
      <dependencies:node dependencies:name="SFLIGHT" dependencies:type="TABLE"/>
    </dependencies:node>
    <dependencies:node dependencies:name="SPFLI" dependencies:type="TABLE"/>
  </dependencies:node>
</dependencies:result>"#
                .into(),
        ),
    );
    let engine = engine_with(transport.clone(), SafetyPolicy::unrestricted());

    let tree = engine
        .cds_dependencies("zv_top", CdsDependencyOptions::default())
        .await
        .unwrap();
    assert_eq!(tree.root.name, "ZV_TOP");
    assert_eq!(tree.depth(), 3);
    assert_eq!(tree.flatten().len(), 4);
    assert_eq!(tree.count_by_type()["TABLE"], 2);
    assert_eq!(tree.table_leaves().len(), 2);
    assert!(tree.find_cycles().is_empty());

    let request = &transport.requests()[0];
    let body = request.body.as_deref().unwrap();
    assert!(body.contains("<dependencies:ddlsName>ZV_TOP</dependencies:ddlsName>"));
    assert!(body.contains("hierarchy"));
}

#[tokio::test]
async fn unit_test_run_posts_the_flag_matrix() {
    let transport = MockTransport::new();
    transport.on(
        Method::Post,
        "/sap/bc/adt/abapunit/testruns",
        Reply::Ok(String::new()),
    );
    let engine = engine_with(transport.clone(), SafetyPolicy::unrestricted());

    let report = engine
        .run_unit_tests("/sap/bc/adt/oo/classes/zcl_x", UnitTestFlags::default())
        .await
        .unwrap();
    assert!(report.classes.is_empty());

    let body = transport.requests()[0].body.clone().unwrap();
    assert!(body.contains(r#"harmless="true" dangerous="false" critical="false""#));
    assert!(body.contains(r#"short="true" medium="true" long="false""#));
    assert!(body.contains("/sap/bc/adt/oo/classes/zcl_x"));
}

#[tokio::test]
async fn grep_package_scans_source_objects() {
    let transport = MockTransport::new();
    transport
        .on(
            Method::Post,
            "/sap/bc/adt/repository/nodestructure",
            Reply::Ok(
                r#"<asx:abap xmlns:asx="http://www.sap.com/abapxml"><asx:values><DATA><TREE_CONTENT>
  <SEU_ADT_REPOSITORY_OBJ_NODE>
    <OBJECT_TYPE>PROG/P</OBJECT_TYPE><OBJECT_NAME>ZA</OBJECT_NAME>
  </SEU_ADT_REPOSITORY_OBJ_NODE>
  <SEU_ADT_REPOSITORY_OBJ_NODE>
    <OBJECT_TYPE>PROG/P</OBJECT_TYPE><OBJECT_NAME>ZB</OBJECT_NAME>
  </SEU_ADT_REPOSITORY_OBJ_NODE>
</TREE_CONTENT></DATA></asx:values></asx:abap>"#
                    .into(),
            ),
        )
        .on(
            Method::Get,
            "/sap/bc/adt/programs/programs/za/source/main",
            Reply::Ok("REPORT za.\n\" TODO tighten selection\n".into()),
        )
        .on(
            Method::Get,
            "/sap/bc/adt/programs/programs/zb/source/main",
            Reply::Ok("REPORT zb.\n".into()),
        );
    let engine = engine_with(transport.clone(), SafetyPolicy::unrestricted());

    let hits = engine.grep_package("$TMP", "TODO", false, 100).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0.name, "ZA");
    assert_eq!(hits[0].1[0].line, 2);
}
