#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

use mou_gen::{Document, Paragraph};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:docDefaults/></w:styles>"#;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// `<w:p>` with one plain run.
pub fn p(text: &str) -> String {
    runs(&[text])
}

/// `<w:p>` with one run per fragment.
pub fn runs(fragments: &[&str]) -> String {
    let body: String = fragments
        .iter()
        .map(|t| format!(r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#, escape(t)))
        .collect();
    format!("<w:p>{body}</w:p>")
}

/// `<w:p>` with one run carrying explicit properties.
pub fn styled(text: &str, rpr: &str) -> String {
    format!(
        r#"<w:p><w:r><w:rPr>{rpr}</w:rPr><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        escape(text)
    )
}

/// A table; each cell holds the given block XML.
pub fn table(rows: &[&[&str]]) -> String {
    let rows: String = rows
        .iter()
        .map(|cells| {
            let cells: String = cells
                .iter()
                .map(|content| format!("<w:tc><w:tcPr/>{content}</w:tc>"))
                .collect();
            format!("<w:tr>{cells}</w:tr>")
        })
        .collect();
    format!("<w:tbl><w:tblPr/>{rows}</w:tbl>")
}

#[derive(Default)]
pub struct DocxBuilder {
    body: String,
    headers: Vec<String>,
    footers: Vec<String>,
}

impl DocxBuilder {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn header(mut self, content: impl Into<String>) -> Self {
        self.headers.push(content.into());
        self
    }

    pub fn footer(mut self, content: impl Into<String>) -> Self {
        self.footers.push(content.into());
        self
    }

    pub fn document_xml(&self) -> String {
        let mut refs = String::new();
        for i in 0..self.headers.len() {
            refs.push_str(&format!(
                r#"<w:headerReference w:type="default" r:id="rIdH{}"/>"#,
                i + 1
            ));
        }
        for i in 0..self.footers.len() {
            refs.push_str(&format!(
                r#"<w:footerReference w:type="default" r:id="rIdF{}"/>"#,
                i + 1
            ));
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{W_NS}" xmlns:r="{R_NS}"><w:body>{}<w:sectPr>{refs}<w:pgSz w:w="11906" w:h="16838"/></w:sectPr></w:body></w:document>"#,
            self.body
        )
    }

    fn rels_xml(&self) -> String {
        let mut rels = format!(
            r#"<Relationship Id="rIdS" Type="{REL_TYPE}/styles" Target="styles.xml"/>"#
        );
        for i in 0..self.headers.len() {
            rels.push_str(&format!(
                r#"<Relationship Id="rIdH{n}" Type="{REL_TYPE}/header" Target="header{n}.xml"/>"#,
                n = i + 1
            ));
        }
        for i in 0..self.footers.len() {
            rels.push_str(&format!(
                r#"<Relationship Id="rIdF{n}" Type="{REL_TYPE}/footer" Target="footer{n}.xml"/>"#,
                n = i + 1
            ));
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
        )
    }

    fn content_types_xml(&self) -> String {
        let mut overrides = String::from(
            r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
        );
        for i in 0..self.headers.len() {
            overrides.push_str(&format!(
                r#"<Override PartName="/word/header{}.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml"/>"#,
                i + 1
            ));
        }
        for i in 0..self.footers.len() {
            overrides.push_str(&format!(
                r#"<Override PartName="/word/footer{}.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml"/>"#,
                i + 1
            ));
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>{overrides}</Types>"#
        )
    }

    pub fn build(&self) -> Vec<u8> {
        let mut entries: Vec<(String, String)> = vec![
            ("[Content_Types].xml".into(), self.content_types_xml()),
            (
                "_rels/.rels".into(),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_TYPE}/officeDocument" Target="word/document.xml"/></Relationships>"#
                ),
            ),
            ("word/document.xml".into(), self.document_xml()),
            ("word/_rels/document.xml.rels".into(), self.rels_xml()),
            ("word/styles.xml".into(), STYLES_XML.into()),
        ];
        for (i, content) in self.headers.iter().enumerate() {
            entries.push((
                format!("word/header{}.xml", i + 1),
                format!(r#"<w:hdr xmlns:w="{W_NS}">{content}</w:hdr>"#),
            ));
        }
        for (i, content) in self.footers.iter().enumerate() {
            entries.push((
                format!("word/footer{}.xml", i + 1),
                format!(r#"<w:ftr xmlns:w="{W_NS}">{content}</w:ftr>"#),
            ));
        }
        zip_entries(&entries)
    }

    pub fn parse(&self) -> Document {
        Document::from_bytes(&self.build()).expect("fixture parses")
    }
}

pub fn zip_entries(entries: &[(String, String)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in entries {
        zip.start_file(name.as_str(), options).unwrap();
        zip.write_all(data.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

pub fn entry_names(archive: &[u8]) -> Vec<String> {
    let zip = zip::ZipArchive::new(Cursor::new(archive)).expect("valid zip");
    zip.file_names().map(str::to_string).collect()
}

pub fn read_entry(archive: &[u8], name: &str) -> Vec<u8> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).expect("valid zip");
    let mut entry = zip.by_name(name).expect("entry exists");
    let mut data = Vec::new();
    entry.read_to_end(&mut data).unwrap();
    data
}

pub fn read_entry_text(archive: &[u8], name: &str) -> String {
    String::from_utf8(read_entry(archive, name)).expect("utf-8 entry")
}

/// Serialize and parse again, so assertions see what a reader of the file sees.
pub fn reparse(doc: &Document) -> Document {
    Document::from_bytes(&doc.to_bytes().expect("serializes")).expect("output parses")
}

pub fn texts(doc: &Document) -> Vec<String> {
    doc.paragraph_texts()
}

/// Every run carries an explicit bold flag.
pub fn all_bold(para: &Paragraph) -> bool {
    para.runs()
        .iter()
        .all(|r| r.properties.bold() == Some(true))
}

pub fn none_bold(para: &Paragraph) -> bool {
    para.runs()
        .iter()
        .all(|r| r.properties.bold() == Some(false))
}

pub fn bold_map(doc: &Document) -> Vec<Vec<Option<bool>>> {
    doc.paragraphs()
        .iter()
        .map(|p| p.runs().iter().map(|r| r.properties.bold()).collect())
        .collect()
}
