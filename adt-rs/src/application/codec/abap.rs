//! Decoder for the ABAP serialization envelope
//! `<asx:abap><asx:values><DATA>...` that lock results, transport checks and
//! the repository node structure come back in.

use std::collections::BTreeMap;

use crate::application::codec::xml;
use crate::domain::error::{AdtError, Result};

/// Decode the first `DATA` record into a flat field map (element name ->
/// text). Nested elements are flattened by their leaf name.
pub fn decode_values(body: &str) -> Result<BTreeMap<String, String>> {
    let doc = xml::parse(body)?;
    let data = xml::elements(&doc, "DATA")
        .next()
        .ok_or_else(|| AdtError::Network("missing values/DATA envelope in response".into()))?;
    let mut fields = BTreeMap::new();
    for child in data.children().filter(|c| c.is_element()) {
        fields.insert(child.tag_name().name().to_string(), xml::text(child).trim().to_string());
    }
    Ok(fields)
}

/// Decode every repeated row element (e.g. `SEU_ADT_REPOSITORY_OBJ_NODE`)
/// into a field map each.
pub fn decode_rows(body: &str, row_element: &str) -> Result<Vec<BTreeMap<String, String>>> {
    let doc = xml::parse(body)?;
    let mut rows = Vec::new();
    for row in xml::elements(&doc, row_element) {
        let mut fields = BTreeMap::new();
        for child in row.children().filter(|c| c.is_element()) {
            fields.insert(child.tag_name().name().to_string(), xml::text(child).trim().to_string());
        }
        rows.push(fields);
    }
    Ok(rows)
}

/// ABAP booleans are "X" / "" (or "-" for false in some tables).
pub fn flag(value: Option<&String>) -> bool {
    matches!(value.map(String::as_str), Some("X"))
}

/// Render a `values/DATA` request envelope from (field, value) pairs, in the
/// given order.
pub fn encode_values(fields: &[(&str, &str)]) -> String {
    let mut body = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<asx:abap xmlns:asx=\"http://www.sap.com/abapxml\" version=\"1.0\">\n  <asx:values>\n    <DATA>\n",
    );
    for (name, value) in fields {
        body.push_str(&format!("      <{name}>{}</{name}>\n", xml::escape(value)));
    }
    body.push_str("    </DATA>\n  </asx:values>\n</asx:abap>");
    body
}
