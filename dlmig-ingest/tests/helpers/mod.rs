//! Test Helper Utilities
//!
//! Shared fixtures for dlmig-ingest integration tests:
//! - FOXML export documents and title directories in a `TempDir`
//! - Catalog (X-Server) responses mounted on a `wiremock` server

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ROOT_A: &str = "2f30448f-78c5-4d41-981c-b4c0eae300a2";
pub const ROOT_B: &str = "7a1c9e02-5b1d-4e3b-9f0a-0c2d7e6f1a10";
pub const SIGNATURE: &str = "Skř 2-0212.345";

pub const IMAGE_KINDS: [&str; 3] = ["IMG_FULL", "IMG_PREVIEW", "IMG_THUMB"];
pub const ASSET_BYTES: &[u8] = b"\xff\xd8\xff\xe0 page image";

// =============================================================================
// FOXML fixtures
// =============================================================================

fn image_datastream(pack_id: &str, kind: &str, extra: &str) -> String {
    format!(
        r#"  <foxml:datastream ID="{kind}" STATE="A" CONTROL_GROUP="M" VERSIONABLE="true" FEDORA_URI="info:fedora/uuid:{id}/{kind}">
    <foxml:datastreamVersion ID="{kind}.0" LABEL="" MIMETYPE="image/jpeg" SIZE="16">
      <foxml:binaryContent>/9j/4AAQSkZJRgABAQ==</foxml:binaryContent>{extra}
    </foxml:datastreamVersion>
  </foxml:datastream>
"#,
        kind = kind,
        id = pack_id,
        extra = extra
    )
}

/// Page document declaring the given image datastreams
///
/// `full_extra` is inserted into the IMG_FULL version element.
pub fn page_foxml_with(pack_id: &str, kinds: &[&str], full_extra: &str) -> String {
    let datastreams: String = kinds
        .iter()
        .map(|kind| {
            let extra = if *kind == "IMG_FULL" { full_extra } else { "" };
            image_datastream(pack_id, kind, extra)
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<foxml:digitalObject xmlns:foxml="info:fedora/fedora-system:def/foxml#" VERSION="1.1" PID="uuid:{id}" FEDORA_URI="info:fedora/uuid:{id}">
  <foxml:objectProperties>
    <foxml:property NAME="info:fedora/fedora-system:def/model#label" VALUE="[1]"/>
  </foxml:objectProperties>
  <foxml:datastream ID="RELS-EXT" STATE="A" CONTROL_GROUP="X" VERSIONABLE="false">
    <foxml:datastreamVersion ID="RELS-EXT.0" MIMETYPE="application/rdf+xml">
      <foxml:xmlContent>
        <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns:kramerius="http://www.nsdl.org/ontologies/relationships#">
          <rdf:Description rdf:about="info:fedora/uuid:{id}">
            <kramerius:file>{id}.tif</kramerius:file>
          </rdf:Description>
        </rdf:RDF>
      </foxml:xmlContent>
    </foxml:datastreamVersion>
  </foxml:datastream>
{datastreams}</foxml:digitalObject>
"#,
        id = pack_id,
        datastreams = datastreams
    )
}

/// Page document with all three image datastreams
pub fn page_foxml(pack_id: &str) -> String {
    page_foxml_with(pack_id, &IMAGE_KINDS, "")
}

/// Title-level document with a MODS description
pub fn root_foxml(pack_id: &str, signature: Option<&str>, date_issued: &str) -> String {
    let location = signature
        .map(|s| format!("<mods:location><mods:shelfLocator>{}</mods:shelfLocator></mods:location>", s))
        .unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<foxml:digitalObject xmlns:foxml="info:fedora/fedora-system:def/foxml#" VERSION="1.1" PID="uuid:{id}" FEDORA_URI="info:fedora/uuid:{id}">
  <foxml:datastream ID="BIBLIO_MODS" STATE="A" CONTROL_GROUP="X" VERSIONABLE="false">
    <foxml:datastreamVersion ID="BIBLIO_MODS.0" MIMETYPE="text/xml">
      <foxml:xmlContent>
        <mods:modsCollection xmlns:mods="http://www.loc.gov/mods/v3">
          <mods:mods version="3.5">
            <mods:titleInfo><mods:title>Test title</mods:title></mods:titleInfo>
            <mods:originInfo><mods:dateIssued>{date}</mods:dateIssued></mods:originInfo>
            {location}
          </mods:mods>
        </mods:modsCollection>
      </foxml:xmlContent>
    </foxml:datastreamVersion>
  </foxml:datastream>
</foxml:digitalObject>
"#,
        id = pack_id,
        date = date_issued,
        location = location
    )
}

/// Title directory `<parent>/<root_id>` holding a root document and page pairs
pub fn write_title(parent: &Path, root_id: &str, signature: Option<&str>, pages: &[(&str, String)]) -> PathBuf {
    let dir = parent.join(root_id);
    fs::create_dir_all(&dir).unwrap();

    fs::write(dir.join(format!("{}.xml", root_id)), root_foxml(root_id, signature, "1919")).unwrap();
    fs::write(dir.join("proarc_export_status.log"), "exported").unwrap();

    for (page_id, document) in pages {
        fs::write(dir.join(format!("{}.xml", page_id)), document).unwrap();
        fs::write(dir.join(format!("{}.NDK_USER", page_id)), ASSET_BYTES).unwrap();
    }

    dir
}

/// Title with `count` regular pages named `<prefix>-page-<n>`
pub fn write_simple_title(parent: &Path, root_id: &str, signature: Option<&str>, count: usize) -> PathBuf {
    let pages: Vec<(String, String)> = (1..=count)
        .map(|n| {
            let id = format!("{}-page-{}", &root_id[..8], n);
            let doc = page_foxml(&id);
            (id, doc)
        })
        .collect();
    let pages: Vec<(&str, String)> = pages.iter().map(|(id, doc)| (id.as_str(), doc.clone())).collect();

    write_title(parent, root_id, signature, &pages)
}

/// Files of a directory, sorted
pub fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}

// =============================================================================
// Catalog responses
// =============================================================================

pub fn find_response(set_number: &str, no_entries: u32) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<find>\n<set_number>{}</set_number>\n<no_records>{:09}</no_records>\n<no_entries>{:09}</no_entries>\n<session-id>TEST</session-id>\n</find>",
        set_number, no_entries, no_entries
    )
}

pub fn empty_find_response() -> String {
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<find>\n<error>empty set</error>\n<session-id>TEST</session-id>\n</find>".to_string()
}

pub fn present_response(doc_number: &str, year: &str, partition_code: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<present>
<record>
<record_header><set_entry>000000001</set_entry></record_header>
<doc_number>{doc}</doc_number>
<metadata>
<oai_marc>
<fixfield id="LDR">-----nam-a22------a-4500</fixfield>
<fixfield id="008">870303s{year}----xr-a---r-----000-0-cze--</fixfield>
<varfield id="910" i1=" " i2=" "><subfield label="a">BOA001</subfield></varfield>
<varfield id="996" i1=" " i2=" "><subfield label="b">2610151469</subfield><subfield label="l">{code}</subfield></varfield>
</oai_marc>
</metadata>
</record>
<session-id>TEST</session-id>
</present>"#,
        doc = doc_number,
        year = year,
        code = partition_code
    )
}

/// Catalog base URL on the mock server
pub fn catalog_url(server: &MockServer) -> String {
    format!("{}/X", server.uri())
}

/// `find` in `partition` answers with a result set
pub async fn mount_find(server: &MockServer, partition: &str, set_number: &str, no_entries: u32) {
    Mock::given(method("GET"))
        .and(path("/X"))
        .and(query_param("op", "find"))
        .and(query_param("base", partition))
        .respond_with(ResponseTemplate::new(200).set_body_string(find_response(set_number, no_entries)))
        .mount(server)
        .await;
}

/// `find` in `partition` answers without result set markers
pub async fn mount_empty_find(server: &MockServer, partition: &str) {
    Mock::given(method("GET"))
        .and(path("/X"))
        .and(query_param("op", "find"))
        .and(query_param("base", partition))
        .respond_with(ResponseTemplate::new(200).set_body_string(empty_find_response()))
        .mount(server)
        .await;
}

/// `present` of `set_number`/`entry` answers with a record
pub async fn mount_present(
    server: &MockServer,
    set_number: &str,
    entry: u32,
    doc_number: &str,
    year: &str,
    partition_code: &str,
) {
    Mock::given(method("GET"))
        .and(path("/X"))
        .and(query_param("op", "present"))
        .and(query_param("set_no", set_number))
        .and(query_param("set_entry", format!("{:09}", entry).as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(present_response(doc_number, year, partition_code)),
        )
        .mount(server)
        .await;
}

/// Catalog that knows nothing in either default partition
pub async fn mount_empty_catalog(server: &MockServer) {
    mount_empty_find(server, "mzk01").await;
    mount_empty_find(server, "mzk03").await;
}

/// Catalog resolving every signature to `000329646` / `MZK01`, issued 1919
pub async fn mount_matching_catalog(server: &MockServer) {
    mount_find(server, "mzk01", "000123", 1).await;
    mount_empty_find(server, "mzk03").await;
    mount_present(server, "000123", 1, "000329646", "1919", "MZK01").await;
}
