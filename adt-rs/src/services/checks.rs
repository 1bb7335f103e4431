//! Syntax check, activation and unit test runs.

use base64::Engine as _;

use crate::application::codec::xml;
use crate::domain::check::{
    severity_is_error, ActivationMessage, ActivationResult, InactiveObject, SyntaxDiagnostic,
    UnitTestAlert, UnitTestClass, UnitTestFlags, UnitTestMethod, UnitTestResult,
    UnitTestStackEntry,
};
use crate::domain::error::Result;
use crate::domain::safety::OperationClass;
use crate::port::transport::RequestOptions;
use crate::services::engine::Engine;

impl Engine {
    /// Run the ABAP check run against caller-supplied source. The source is
    /// embedded base64-encoded into the check artifact, so unsaved code can
    /// be checked.
    pub async fn syntax_check(
        &self,
        object_url: &str,
        source: &str,
    ) -> Result<Vec<SyntaxDiagnostic>> {
        self.gate(OperationClass::Test, "SyntaxCheck")?;
        let source_url = if object_url.ends_with("/source/main") {
            object_url.to_string()
        } else {
            format!("{object_url}/source/main")
        };
        let encoded = base64::engine::general_purpose::STANDARD.encode(source.as_bytes());
        let body = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<chkrun:checkObjectList xmlns:chkrun="http://www.sap.com/adt/checkrun" xmlns:adtcore="http://www.sap.com/adt/core">
  <chkrun:checkObject adtcore:uri="{source_url}" chkrun:version="active">
    <chkrun:artifacts>
      <chkrun:artifact chkrun:contentType="text/plain; charset=utf-8" chkrun:uri="{source_url}">
        <chkrun:content>{encoded}</chkrun:content>
      </chkrun:artifact>
    </chkrun:artifacts>
  </chkrun:checkObject>
</chkrun:checkObjectList>"#
        );

        let options = RequestOptions::post()
            .query("reporters", "abapCheckRun")
            .body(body)
            .content_type("application/*");
        let response = self
            .transport()
            .request("/sap/bc/adt/checkruns", options)
            .await?;
        parse_syntax_check(&response.body)
    }

    /// Activate a single object.
    pub async fn activate(&self, object_url: &str, object_name: &str) -> Result<ActivationResult> {
        self.activate_objects(&[(object_url.to_string(), object_name.to_string())])
            .await
    }

    /// Activate a set of objects in one request. Success means no E/A/X
    /// message and an empty inactive set.
    pub async fn activate_objects(
        &self,
        objects: &[(String, String)],
    ) -> Result<ActivationResult> {
        self.gate(OperationClass::Activate, "Activate")?;
        let mut references = String::new();
        for (uri, name) in objects {
            references.push_str(&format!(
                "  <adtcore:objectReference adtcore:uri=\"{}\" adtcore:name=\"{}\"/>\n",
                xml::escape(uri),
                xml::escape(name)
            ));
        }
        let body = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<adtcore:objectReferences xmlns:adtcore=\"http://www.sap.com/adt/core\">\n{references}</adtcore:objectReferences>"
        );

        let options = RequestOptions::post()
            .query("method", "activate")
            .query("preauditRequested", "true")
            .body(body)
            .content_type("application/xml");
        let response = self
            .transport()
            .request("/sap/bc/adt/activation", options)
            .await?;
        parse_activation(&response.body)
    }

    /// Run ABAP Unit for one object.
    pub async fn run_unit_tests(
        &self,
        object_url: &str,
        flags: UnitTestFlags,
    ) -> Result<UnitTestResult> {
        self.gate(OperationClass::Test, "RunUnitTests")?;
        let body = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<aunit:runConfiguration xmlns:aunit="http://www.sap.com/adt/aunit">
  <external>
    <coverage active="false"/>
  </external>
  <options>
    <uriType value="semantic"/>
    <testDeterminationStrategy sameProgram="true" assignedTests="false"/>
    <testRiskLevels harmless="{harmless}" dangerous="{dangerous}" critical="{critical}"/>
    <testDurations short="{short}" medium="{medium}" long="{long}"/>
    <withNavigationUri enabled="true"/>
  </options>
  <adtcore:objectSets xmlns:adtcore="http://www.sap.com/adt/core">
    <objectSet kind="inclusive">
      <adtcore:objectReferences>
        <adtcore:objectReference adtcore:uri="{uri}"/>
      </adtcore:objectReferences>
    </objectSet>
  </adtcore:objectSets>
</aunit:runConfiguration>"#,
            harmless = flags.harmless,
            dangerous = flags.dangerous,
            critical = flags.critical,
            short = flags.short,
            medium = flags.medium,
            long = flags.long,
            uri = xml::escape(object_url),
        );

        let options = RequestOptions::post()
            .body(body)
            .content_type("application/*")
            .accept("application/*");
        let response = self
            .transport()
            .request("/sap/bc/adt/abapunit/testruns", options)
            .await?;
        parse_unit_tests(&response.body)
    }
}

/// Empty response means no diagnostics.
fn parse_syntax_check(body: &str) -> Result<Vec<SyntaxDiagnostic>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let doc = xml::parse(body)?;
    let diagnostics = xml::elements(&doc, "checkMessage")
        .map(|node| {
            let raw_uri = xml::attr_or(node, "uri", "");
            let (uri, line, offset) = xml::split_start_fragment(raw_uri);
            SyntaxDiagnostic {
                uri,
                line,
                offset,
                severity: xml::attr_or(node, "type", "").to_string(),
                text: xml::attr_or(node, "shortText", "").to_string(),
            }
        })
        .collect();
    Ok(diagnostics)
}

/// Empty response means success with no messages.
fn parse_activation(body: &str) -> Result<ActivationResult> {
    let mut result = ActivationResult {
        success: true,
        ..ActivationResult::default()
    };
    if body.trim().is_empty() {
        return Ok(result);
    }

    let doc = xml::parse(body)?;
    for node in xml::elements(&doc, "msg") {
        let severity = xml::attr_or(node, "type", "").to_string();
        let text = xml::descendants(node, "shortText")
            .next()
            .map(xml::text)
            .unwrap_or_default()
            .trim()
            .to_string();
        if severity_is_error(&severity) {
            result.success = false;
        }
        result.messages.push(ActivationMessage {
            obj_descr: xml::attr_or(node, "objDescr", "").to_string(),
            severity,
            line: xml::attr_or(node, "line", "0").parse().unwrap_or(0),
            href: xml::attr_or(node, "href", "").to_string(),
            text,
        });
    }

    for inactive in xml::elements(&doc, "inactiveObjects") {
        for entry in xml::descendants(inactive, "entry") {
            let Some(object) = xml::children(entry, "object").next() else {
                continue;
            };
            let Some(reference) = xml::children(object, "ref").next() else {
                continue;
            };
            result.success = false;
            result.inactive.push(InactiveObject {
                uri: xml::attr_or(reference, "uri", "").to_string(),
                object_type: xml::attr_or(reference, "type", "").to_string(),
                name: xml::attr_or(reference, "name", "").to_string(),
                parent_uri: xml::attr_or(reference, "parentUri", "").to_string(),
            });
        }
    }

    Ok(result)
}

fn parse_alerts(node: roxmltree::Node<'_, '_>) -> Vec<UnitTestAlert> {
    xml::children(node, "alerts")
        .flat_map(|alerts| xml::children(alerts, "alert").collect::<Vec<_>>())
        .map(|alert| UnitTestAlert {
            kind: xml::attr_or(alert, "kind", "").to_string(),
            severity: xml::attr_or(alert, "severity", "").to_string(),
            title: xml::descendants(alert, "title")
                .next()
                .map(xml::text)
                .unwrap_or_default()
                .trim()
                .to_string(),
            details: xml::descendants(alert, "detail")
                .filter_map(|detail| xml::attr(detail, "text").map(str::to_string))
                .filter(|text| !text.is_empty())
                .collect(),
            stack: xml::descendants(alert, "stackEntry")
                .map(|entry| UnitTestStackEntry {
                    uri: xml::attr_or(entry, "uri", "").to_string(),
                    name: xml::attr_or(entry, "name", "").to_string(),
                    description: xml::attr_or(entry, "description", "").to_string(),
                })
                .collect(),
        })
        .collect()
}

/// Empty response means no test classes were found.
fn parse_unit_tests(body: &str) -> Result<UnitTestResult> {
    if body.trim().is_empty() {
        return Ok(UnitTestResult::default());
    }
    let doc = xml::parse(body)?;
    let mut result = UnitTestResult::default();
    for class_node in xml::elements(&doc, "testClass") {
        let mut class = UnitTestClass {
            uri: xml::attr_or(class_node, "uri", "").to_string(),
            name: xml::attr_or(class_node, "name", "").to_string(),
            duration_category: xml::attr_or(class_node, "durationCategory", "").to_string(),
            risk_level: xml::attr_or(class_node, "riskLevel", "").to_string(),
            alerts: parse_alerts(class_node),
            ..UnitTestClass::default()
        };
        for method_node in xml::descendants(class_node, "testMethod") {
            class.methods.push(UnitTestMethod {
                uri: xml::attr_or(method_node, "uri", "").to_string(),
                name: xml::attr_or(method_node, "name", "").to_string(),
                execution_time: xml::attr_or(method_node, "executionTime", "0")
                    .parse()
                    .unwrap_or(0),
                alerts: parse_alerts(method_node),
            });
        }
        result.classes.push(class);
    }
    Ok(result)
}
