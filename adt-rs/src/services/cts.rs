//! CTS transport management: list, inspect, create, release and delete
//! transport requests, and the transport pre-check for objects.

use crate::application::codec::{abap, xml};
use crate::domain::cts::{
    CreateTransportOptions, ReleaseTransportOptions, TransportDetails, TransportInfo,
    TransportObject, TransportSummary, TransportTask,
};
use crate::domain::error::{AdtError, Result};
use crate::domain::safety::OperationClass;
use crate::port::transport::RequestOptions;
use crate::services::engine::Engine;

const ORGANIZER_ACCEPT: &str = "application/vnd.sap.adt.transportorganizertree.v1+xml";
const REQUEST_ACCEPT: &str = "application/vnd.sap.adt.transportrequests.v1+xml";
const CHECK_CONTENT_TYPE: &str =
    "application/vnd.sap.as+xml; charset=UTF-8; dataname=com.sap.adt.transport.service.checkData";

impl Engine {
    /// List the transport requests of a user (default: the session user).
    pub async fn list_transports(&self, user: Option<&str>) -> Result<Vec<TransportSummary>> {
        self.gate(OperationClass::Transport, "ListTransports")?;
        self.safety().check_transport("", "ListTransports", false)?;
        let user = user
            .map(str::to_string)
            .unwrap_or_else(|| self.username())
            .to_uppercase();
        let options = RequestOptions::get()
            .query("user", user)
            .accept(ORGANIZER_ACCEPT);
        let response = self
            .transport()
            .request("/sap/bc/adt/cts/transportrequests", options)
            .await?;
        parse_transport_list(&response.body)
    }

    /// Detailed view of one transport request.
    pub async fn get_transport(&self, number: &str) -> Result<TransportDetails> {
        self.gate(OperationClass::Transport, "GetTransport")?;
        let number = number.to_uppercase();
        self.safety().check_transport(&number, "GetTransport", false)?;
        if number.is_empty() {
            return Err(AdtError::InvalidArgument("transport number is required".into()));
        }
        let path = format!("/sap/bc/adt/cts/transportrequests/{number}");
        let options = RequestOptions::get().accept(REQUEST_ACCEPT);
        let response = self.transport().request(&path, options).await?;
        parse_transport_details(&response.body)
    }

    /// Create a transport request; returns the new transport number.
    pub async fn create_transport(&self, options: CreateTransportOptions) -> Result<String> {
        self.gate(OperationClass::Transport, "CreateTransport")?;
        self.safety().check_transport("", "CreateTransport", true)?;
        if options.description.is_empty() {
            return Err(AdtError::InvalidArgument("description is required".into()));
        }
        if options.package.is_empty() {
            return Err(AdtError::InvalidArgument("package is required".into()));
        }
        self.safety().check_package(&options.package)?;

        let request_type = if options.customizing { "W" } else { "K" };
        let body = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<tm:root xmlns:tm="http://www.sap.com/cts/adt/tm">
  <tm:request tm:desc="{description}" tm:type="{request_type}" tm:target="" tm:cts_project="">
    <tm:abap_object tm:pgmid="R3TR" tm:type="DEVC" tm:name="{package}"/>
  </tm:request>
</tm:root>"#,
            description = xml::escape(&options.description),
            package = options.package.to_uppercase(),
        );

        let mut request = RequestOptions::post()
            .body(body)
            .content_type("application/vnd.sap.as+xml")
            .accept("text/plain");
        if let Some(layer) = &options.transport_layer {
            request = request.query("transportLayer", layer);
        }
        let response = self
            .transport()
            .request("/sap/bc/adt/cts/transports", request)
            .await?;

        // The response is plain text: either the bare number or a URL
        // ending in it.
        let text = response.body.trim();
        let number = text.rsplit('/').next().unwrap_or(text).trim().to_string();
        if number.is_empty() {
            return Err(AdtError::Network(format!(
                "unexpected create-transport response: {text}"
            )));
        }
        Ok(number)
    }

    /// Release a transport request.
    pub async fn release_transport(
        &self,
        number: &str,
        options: ReleaseTransportOptions,
    ) -> Result<()> {
        self.gate(OperationClass::Transport, "ReleaseTransport")?;
        let number = number.to_uppercase();
        self.safety()
            .check_transport(&number, "ReleaseTransport", true)?;
        if number.len() != 10 {
            return Err(AdtError::InvalidArgument(format!(
                "invalid transport number '{number}' (expected 10 characters)"
            )));
        }

        let action = if options.skip_atc {
            "relObjigchkatc"
        } else if options.ignore_locks {
            "relwithignlock"
        } else {
            "newreleasejobs"
        };
        let path = format!("/sap/bc/adt/cts/transportrequests/{number}/{action}");
        let request = RequestOptions::post().accept(REQUEST_ACCEPT);
        self.transport().request(&path, request).await?;
        Ok(())
    }

    /// Delete a (modifiable) transport request.
    pub async fn delete_transport(&self, number: &str) -> Result<()> {
        self.gate(OperationClass::Transport, "DeleteTransport")?;
        let number = number.to_uppercase();
        self.safety()
            .check_transport(&number, "DeleteTransport", true)?;
        if number.is_empty() {
            return Err(AdtError::InvalidArgument("transport number is required".into()));
        }
        let path = format!("/sap/bc/adt/cts/transportrequests/{number}");
        self.transport()
            .request(&path, RequestOptions::delete())
            .await?;
        Ok(())
    }

    /// Pre-check how changes to an object would be recorded.
    pub async fn get_transport_info(
        &self,
        object_url: &str,
        dev_class: &str,
    ) -> Result<TransportInfo> {
        self.gate(OperationClass::Transport, "GetTransportInfo")?;
        self.safety()
            .check_transport("", "GetTransportInfo", false)?;
        let body = abap::encode_values(&[
            ("DEVCLASS", &dev_class.to_uppercase()),
            ("OPERATION", "I"),
            ("URI", object_url),
        ]);
        let options = RequestOptions::post()
            .body(body)
            .content_type(CHECK_CONTENT_TYPE)
            .accept(CHECK_CONTENT_TYPE);
        let response = self
            .transport()
            .request("/sap/bc/adt/cts/transportchecks", options)
            .await?;

        let fields = abap::decode_values(&response.body)?;
        let field = |key: &str| fields.get(key).cloned().unwrap_or_default();
        Ok(TransportInfo {
            pgmid: field("PGMID"),
            object: field("OBJECT"),
            object_name: field("OBJECTNAME"),
            operation: field("OPERATION"),
            dev_class: field("DEVCLASS"),
            recording: field("RECORDING"),
        })
    }
}

fn parse_transport_object(node: roxmltree::Node<'_, '_>) -> TransportObject {
    TransportObject {
        pgmid: xml::attr_or(node, "pgmid", "").to_string(),
        object_type: xml::attr_or(node, "type", "").to_string(),
        name: xml::attr_or(node, "name", "").to_string(),
        info: xml::attr_or(node, "obj_info", "").to_string(),
    }
}

fn parse_summary(node: roxmltree::Node<'_, '_>) -> TransportSummary {
    TransportSummary {
        number: xml::attr_or(node, "number", "").to_string(),
        owner: xml::attr_or(node, "owner", "").to_string(),
        description: xml::attr_or(node, "desc", "").to_string(),
        request_type: xml::attr_or(node, "type", "").to_string(),
        status: xml::attr_or(node, "status", "").to_string(),
        status_text: xml::attr_or(node, "status_text", "").to_string(),
        target: xml::attr_or(node, "target", "").to_string(),
        changed_at: xml::attr_or(node, "lastchanged_timestamp", "").to_string(),
        client: xml::attr_or(node, "source_client", "").to_string(),
    }
}

fn parse_transport_list(body: &str) -> Result<Vec<TransportSummary>> {
    let doc = xml::parse(body)?;
    Ok(xml::elements(&doc, "request").map(parse_summary).collect())
}

fn parse_transport_details(body: &str) -> Result<TransportDetails> {
    let doc = xml::parse(body)?;
    let request = xml::elements(&doc, "request")
        .next()
        .ok_or_else(|| AdtError::NotFound("transport not found in response".into()))?;

    let mut details = TransportDetails {
        summary: parse_summary(request),
        ..TransportDetails::default()
    };

    // Prefer the aggregated all_objects list when the server sends one.
    let objects: Vec<TransportObject> = match xml::children(request, "all_objects").next() {
        Some(all) => xml::children(all, "abap_object")
            .map(parse_transport_object)
            .collect(),
        None => xml::children(request, "abap_object")
            .map(parse_transport_object)
            .collect(),
    };
    details.objects = objects;

    for task_node in xml::children(request, "task") {
        details.tasks.push(TransportTask {
            number: xml::attr_or(task_node, "number", "").to_string(),
            parent: xml::attr_or(task_node, "parent", "").to_string(),
            owner: xml::attr_or(task_node, "owner", "").to_string(),
            description: xml::attr_or(task_node, "desc", "").to_string(),
            status: xml::attr_or(task_node, "status", "").to_string(),
            objects: xml::children(task_node, "abap_object")
                .map(parse_transport_object)
                .collect(),
        });
    }

    Ok(details)
}
