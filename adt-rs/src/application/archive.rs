//! abapGit archive handling: the filename grammar
//! `{name}.{kind}[.{include}].{ext}`, in-memory ZIP extraction, grouping by
//! object, and the stable deployment ordering the three-phase deployer
//! consumes.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use serde::{Deserialize, Serialize};

use crate::domain::error::{AdtError, Result};

/// Source extensions the archive parser accepts.
const SOURCE_EXTENSIONS: [&str; 4] = [".abap", ".asddls", ".asbdef", ".srvdsrv"];

/// Class include sub-kinds in upload order. The empty string is the main
/// source.
const INCLUDE_ORDER: [&str; 5] = ["", "locals_def", "locals_imp", "macros", "testclasses"];

/// One file lifted out of an abapGit ZIP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveFile {
    /// Original path inside the archive.
    pub path: String,
    /// CLAS, INTF, PROG, ... Empty when the type suffix is unknown.
    pub object_type: String,
    pub object_name: String,
    /// "", locals_def, locals_imp, macros or testclasses.
    pub include_type: String,
    /// XML metadata sibling rather than source.
    pub is_metadata: bool,
    pub content: String,
}

/// Parse an abapGit filename into (type, name, include, is_xml).
///
/// `zcl_x.clas.abap` -> (CLAS, ZCL_X, "", false);
/// `zcl_x.clas.testclasses.abap` -> (CLAS, ZCL_X, testclasses, false);
/// `zcl_x.clas.xml` -> (CLAS, ZCL_X, "", true).
pub fn parse_filename(filename: &str) -> Option<(String, String, String, bool)> {
    let base = filename.rsplit('/').next().unwrap_or(filename);

    let (stem, is_xml) = if let Some(stem) = base.strip_suffix(".xml") {
        (stem, true)
    } else {
        let stem = SOURCE_EXTENSIONS
            .iter()
            .find_map(|ext| base.strip_suffix(ext))?;
        (stem, false)
    };

    let mut parts = stem.split('.');
    let name = parts.next()?.to_uppercase();
    if name.is_empty() {
        return None;
    }
    let type_token = parts.next().unwrap_or("");
    let object_type = archive_type(type_token);

    let include = match parts.next() {
        Some(token) if INCLUDE_ORDER.contains(&token) => token.to_string(),
        _ => String::new(),
    };

    Some((object_type, name, include, is_xml))
}

/// abapGit type suffix -> SAP type token. Unknown suffixes yield an empty
/// string; such files are tolerated but skipped at deploy time.
fn archive_type(token: &str) -> String {
    match token.to_ascii_lowercase().as_str() {
        "clas" => "CLAS",
        "intf" => "INTF",
        "prog" => "PROG",
        "fugr" => "FUGR",
        "func" => "FUNC",
        "ddls" => "DDLS",
        "doma" => "DOMA",
        "dtel" => "DTEL",
        "tabl" => "TABL",
        "bdef" => "BDEF",
        "srvd" => "SRVD",
        "srvb" => "SRVB",
        "devc" => "DEVC",
        "tran" => "TRAN",
        "msag" => "MSAG",
        "enqu" => "ENQU",
        "shlp" => "SHLP",
        _ => "",
    }
    .to_string()
}

/// Extract every abapGit source or metadata file from a ZIP in memory.
pub fn unzip(data: &[u8]) -> Result<Vec<ArchiveFile>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|err| AdtError::InvalidArgument(format!("not a readable ZIP archive: {err}")))?;

    let mut files = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| AdtError::InvalidArgument(format!("broken ZIP entry: {err}")))?;
        if entry.is_dir() {
            continue;
        }
        let path = entry.name().to_string();
        let Some((object_type, object_name, include_type, is_metadata)) = parse_filename(&path)
        else {
            continue;
        };
        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .map_err(|err| AdtError::InvalidArgument(format!("unreadable entry {path}: {err}")))?;
        files.push(ArchiveFile {
            path,
            object_type,
            object_name,
            include_type,
            is_metadata,
            content,
        });
    }
    Ok(files)
}

/// Extract `<DESCRIPT>` from an abapGit XML metadata blob.
pub fn extract_description(xml_content: &str) -> Option<String> {
    let start = xml_content.find("<DESCRIPT>")? + "<DESCRIPT>".len();
    let end = xml_content[start..].find("</DESCRIPT>")? + start;
    let description = xml_content[start..end].trim();
    if description.is_empty() {
        None
    } else {
        Some(description.to_string())
    }
}

/// One object ready for deployment: main source, includes and metadata
/// gathered from its archive group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentObject {
    pub object_type: String,
    pub name: String,
    pub description: String,
    pub main_source: String,
    /// include sub-kind -> source, in upload order.
    pub includes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

/// Fixed creation priority: providers before consumers. Types outside the
/// map sort last.
fn type_priority(object_type: &str) -> usize {
    match object_type {
        "INTF" => 1,
        "DOMA" => 2,
        "DTEL" => 3,
        "TABL" => 4,
        "DDLS" => 5,
        "CLAS" => 6,
        "PROG" => 7,
        "FUGR" => 8,
        "FUNC" => 9,
        "BDEF" => 10,
        "SRVD" => 11,
        "SRVB" => 12,
        _ => 99,
    }
}

/// Group archive files by (type, name) and produce the totally ordered
/// deployment sequence: by type priority, then name; within a group the
/// main source comes first, then metadata, then includes in fixed order.
pub fn plan(files: &[ArchiveFile]) -> Vec<DeploymentObject> {
    let mut groups: BTreeMap<(usize, String, String), DeploymentObject> = BTreeMap::new();

    for file in files {
        if file.object_type.is_empty() || file.object_name.is_empty() {
            continue;
        }
        let key = (
            type_priority(&file.object_type),
            file.object_name.clone(),
            file.object_type.clone(),
        );
        let object = groups.entry(key).or_insert_with(|| DeploymentObject {
            object_type: file.object_type.clone(),
            name: file.object_name.clone(),
            ..DeploymentObject::default()
        });
        if file.is_metadata {
            if let Some(description) = extract_description(&file.content) {
                object.description = description;
            }
            object.metadata = Some(file.content.clone());
        } else if file.include_type.is_empty() {
            object.main_source = file.content.clone();
        } else {
            object
                .includes
                .insert(file.include_type.clone(), file.content.clone());
        }
    }

    groups.into_values().collect()
}

/// Iterate an object's includes in the fixed upload order.
pub fn ordered_includes(object: &DeploymentObject) -> Vec<(&str, &str)> {
    INCLUDE_ORDER
        .iter()
        .skip(1)
        .filter_map(|include| {
            object
                .includes
                .get(*include)
                .map(|source| (*include, source.as_str()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::FileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);
            for (name, content) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn filename_grammar() {
        assert_eq!(
            parse_filename("src/zcl_x.clas.abap").unwrap(),
            ("CLAS".into(), "ZCL_X".into(), "".into(), false)
        );
        assert_eq!(
            parse_filename("zcl_x.clas.testclasses.abap").unwrap(),
            ("CLAS".into(), "ZCL_X".into(), "testclasses".into(), false)
        );
        assert_eq!(
            parse_filename("zcl_x.clas.xml").unwrap(),
            ("CLAS".into(), "ZCL_X".into(), "".into(), true)
        );
        assert_eq!(
            parse_filename("zv_demo.ddls.asddls").unwrap(),
            ("DDLS".into(), "ZV_DEMO".into(), "".into(), false)
        );
        // Unknown kind suffix is tolerated with an empty type.
        assert_eq!(
            parse_filename("zthing.wapa.abap").unwrap().0,
            "".to_string()
        );
        // Non-abapGit files are skipped entirely.
        assert!(parse_filename("README.md").is_none());
    }

    #[test]
    fn unzip_and_group() {
        let data = build_zip(&[
            ("src/zcl_a.clas.abap", "CLASS zcl_a DEFINITION."),
            ("src/zcl_a.clas.testclasses.abap", "CLASS ltc_a DEFINITION."),
            (
                "src/zcl_a.clas.xml",
                "<abapGit><DESCRIPT>Demo class</DESCRIPT></abapGit>",
            ),
            ("src/zif_a.intf.abap", "INTERFACE zif_a."),
            ("src/README.md", "ignored"),
        ]);
        let files = unzip(&data).unwrap();
        assert_eq!(files.len(), 4);

        let objects = plan(&files);
        assert_eq!(objects.len(), 2);
        // Interface sorts before the class.
        assert_eq!(objects[0].object_type, "INTF");
        assert_eq!(objects[1].object_type, "CLAS");
        let class = &objects[1];
        assert_eq!(class.description, "Demo class");
        assert_eq!(class.main_source, "CLASS zcl_a DEFINITION.");
        assert_eq!(
            ordered_includes(class),
            vec![("testclasses", "CLASS ltc_a DEFINITION.")]
        );
    }

    #[test]
    fn plan_orders_by_priority_then_name() {
        let files = vec![
            ArchiveFile {
                path: "zb.prog.abap".into(),
                object_type: "PROG".into(),
                object_name: "ZB".into(),
                include_type: "".into(),
                is_metadata: false,
                content: "REPORT zb.".into(),
            },
            ArchiveFile {
                path: "za.prog.abap".into(),
                object_type: "PROG".into(),
                object_name: "ZA".into(),
                include_type: "".into(),
                is_metadata: false,
                content: "REPORT za.".into(),
            },
            ArchiveFile {
                path: "zif_x.intf.abap".into(),
                object_type: "INTF".into(),
                object_name: "ZIF_X".into(),
                include_type: "".into(),
                is_metadata: false,
                content: "INTERFACE zif_x.".into(),
            },
        ];
        let names: Vec<String> = plan(&files).into_iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["ZIF_X", "ZA", "ZB"]);
    }

    #[test]
    fn description_extraction() {
        assert_eq!(
            extract_description("<x><DESCRIPT>  Hello </DESCRIPT></x>"),
            Some("Hello".to_string())
        );
        assert_eq!(extract_description("<x><DESCRIPT></DESCRIPT></x>"), None);
        assert_eq!(extract_description("<x/>"), None);
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        assert_eq!(
            unzip(b"definitely not a zip").unwrap_err().code(),
            "invalid-argument"
        );
    }
}
