mod write;

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use crate::error::Error;
use crate::model::{
    Block, Document, HeaderFooter, PackageEntry, Paragraph, ParagraphSource, ParagraphTail,
    PartSource, PropElement, Run, RunProperties, RunSource, Table, TableCell, TableRow,
};

use write::write_package;

pub(super) const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const HEADER_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
const FOOTER_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer";

const MAIN_PART: &str = "word/document.xml";
const MAIN_RELS: &str = "word/_rels/document.xml.rels";

fn is_wml(node: roxmltree::Node, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(WML_NS)
}

fn wml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children().find(|n| is_wml(*n, name))
}

/// Parse a WML boolean toggle element (e.g., w:b).
/// Present with no val or val != "0"/"false" means true.
fn wml_bool(node: roxmltree::Node) -> bool {
    node.attribute((WML_NS, "val"))
        .is_none_or(|v| v != "0" && v != "false")
}

/// Block-level children with `w:sdt` wrappers flattened away.
fn collect_block_nodes<'a>(parent: roxmltree::Node<'a, 'a>) -> Vec<roxmltree::Node<'a, 'a>> {
    let mut nodes = Vec::new();
    for child in parent.children().filter(|n| n.is_element()) {
        if is_wml(child, "sdt") || is_wml(child, "customXml") {
            if let Some(content) = wml(child, "sdtContent") {
                nodes.extend(collect_block_nodes(content));
            } else if is_wml(child, "customXml") {
                nodes.extend(collect_block_nodes(child));
            }
        } else {
            nodes.push(child);
        }
    }
    nodes
}

/// Run nodes of a paragraph in document order, looking through hyperlinks,
/// content controls and tracked insertions.
fn collect_run_nodes<'a>(parent: roxmltree::Node<'a, 'a>, out: &mut Vec<roxmltree::Node<'a, 'a>>) {
    for child in parent.children().filter(|n| n.is_element()) {
        if is_wml(child, "r") {
            out.push(child);
        } else if is_wml(child, "hyperlink") || is_wml(child, "ins") || is_wml(child, "smartTag") {
            collect_run_nodes(child, out);
        } else if is_wml(child, "sdt") {
            if let Some(content) = wml(child, "sdtContent") {
                collect_run_nodes(content, out);
            }
        }
    }
}

/// Start tag text, and the offset where the closing tag begins (None when self-closing).
fn split_element(node: roxmltree::Node, src: &str) -> (String, Option<usize>) {
    let range = node.range();
    let raw = &src[range.clone()];
    if let Some(first) = node.first_child() {
        let open = src[range.start..first.range().start].to_string();
        let close = raw.rfind("</").map(|i| range.start + i);
        (open, close)
    } else if let Some(stripped) = raw.strip_suffix("/>") {
        (format!("{}>", stripped.trim_end()), None)
    } else {
        let close = raw.rfind("</").unwrap_or(raw.len());
        (raw[..close].to_string(), Some(range.start + close))
    }
}

fn run_text(run_node: roxmltree::Node) -> String {
    let mut text = String::new();
    for child in run_node.children().filter(|n| n.tag_name().namespace() == Some(WML_NS)) {
        match child.tag_name().name() {
            "t" => text.push_str(child.text().unwrap_or("")),
            "tab" | "ptab" => text.push('\t'),
            "br" | "cr" => text.push('\n'),
            "noBreakHyphen" => text.push('-'),
            _ => {}
        }
    }
    text
}

fn parse_run_properties(rpr: Option<roxmltree::Node>, src: &str) -> RunProperties {
    let Some(rpr) = rpr else {
        return RunProperties::default();
    };
    let mut font_name = None;
    let mut font_size = None;
    let mut bold = None;
    let mut elements = Vec::new();
    for child in rpr.children().filter(|n| n.is_element()) {
        if child.tag_name().namespace() == Some(WML_NS) {
            match child.tag_name().name() {
                "rFonts" => {
                    font_name = child
                        .attribute((WML_NS, "ascii"))
                        .or_else(|| child.attribute((WML_NS, "hAnsi")))
                        .map(str::to_string);
                }
                "sz" => {
                    font_size = child
                        .attribute((WML_NS, "val"))
                        .and_then(|v| v.parse::<f32>().ok())
                        .map(|hp| hp / 2.0);
                }
                "b" => bold = Some(wml_bool(child)),
                _ => {}
            }
        }
        elements.push(PropElement::Raw {
            name: child.tag_name().name().to_string(),
            xml: src[child.range()].to_string(),
        });
    }
    RunProperties::from_parsed(font_name, font_size, bold, elements)
}

fn parse_run(run_node: roxmltree::Node, src: &str, slot: usize) -> Run {
    let (open_tag, close_at) = split_element(run_node, src);
    let rpr = wml(run_node, "rPr");
    let content_xml = match close_at {
        Some(close) => {
            let start = rpr
                .map(|n| n.range().end)
                .unwrap_or(run_node.range().start + open_tag.len());
            src[start..close].to_string()
        }
        None => String::new(),
    };
    let source = RunSource {
        slot,
        open_tag,
        content_xml,
        text: run_text(run_node),
    };
    Run::from_source(parse_run_properties(rpr, src), source)
}

fn parse_paragraph(node: roxmltree::Node, src: &str) -> Paragraph {
    let mut run_nodes = Vec::new();
    collect_run_nodes(node, &mut run_nodes);
    let runs: Vec<Run> = run_nodes
        .iter()
        .enumerate()
        .map(|(slot, n)| parse_run(*n, src, slot))
        .collect();
    let tail = match split_element(node, src).1 {
        Some(close) => ParagraphTail::Close(close),
        None => ParagraphTail::SelfClosing(node.range()),
    };
    let source = ParagraphSource {
        run_slots: run_nodes.iter().map(|n| n.range()).collect(),
        tail,
    };
    Paragraph::from_source(runs, source)
}

fn parse_table(node: roxmltree::Node, src: &str) -> Table {
    let rows = collect_block_nodes(node)
        .into_iter()
        .filter(|n| is_wml(*n, "tr"))
        .map(|tr| TableRow {
            cells: collect_block_nodes(tr)
                .into_iter()
                .filter(|n| is_wml(*n, "tc"))
                .map(|tc| TableCell {
                    blocks: parse_blocks(tc, src),
                })
                .collect(),
        })
        .collect();
    Table { rows }
}

fn parse_blocks(container: roxmltree::Node, src: &str) -> Vec<Block> {
    collect_block_nodes(container)
        .into_iter()
        .filter_map(|node| {
            if is_wml(node, "p") {
                Some(Block::Paragraph(parse_paragraph(node, src)))
            } else if is_wml(node, "tbl") {
                Some(Block::Table(parse_table(node, src)))
            } else {
                None
            }
        })
        .collect()
}

fn wml_prefix(xml: &roxmltree::Document, part: &str) -> Result<String, Error> {
    match xml.root_element().lookup_prefix(WML_NS) {
        Some(prefix) if !prefix.is_empty() => Ok(prefix.to_string()),
        _ => Err(Error::InvalidDocx(format!(
            "{part}: WordprocessingML namespace is not bound to a prefix"
        ))),
    }
}

fn part_text(entries: &[PackageEntry], name: &str) -> Result<Option<String>, Error> {
    let Some(entry) = entries.iter().find(|e| e.name == name) else {
        return Ok(None);
    };
    let text = String::from_utf8(entry.data.clone())
        .map_err(|_| Error::InvalidDocx(format!("{name} is not valid UTF-8")))?;
    Ok(Some(text.trim_start_matches('\u{feff}').to_string()))
}

struct Relationship {
    rel_type: String,
    target: String,
}

fn parse_rels_xml(xml_content: &str) -> HashMap<String, Relationship> {
    let mut rels = HashMap::new();
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        return rels;
    };
    for node in xml.root_element().children() {
        if node.tag_name().name() == "Relationship"
            && let (Some(id), Some(target)) = (node.attribute("Id"), node.attribute("Target"))
        {
            if node.attribute("TargetMode") == Some("External") {
                continue;
            }
            rels.insert(
                id.to_string(),
                Relationship {
                    rel_type: node.attribute("Type").unwrap_or("").to_string(),
                    target: target.to_string(),
                },
            );
        }
    }
    rels
}

/// Resolve a relationship target relative to `word/`.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("word/{}", target.trim_start_matches("./")),
    }
}

/// Header and footer parts in the order the section properties reference
/// them, followed by any other header/footer relationships by part name.
fn header_footer_parts(
    body: roxmltree::Node,
    rels: &HashMap<String, Relationship>,
) -> (Vec<String>, Vec<String>) {
    fn push_unique(list: &mut Vec<String>, part: String) {
        if !list.contains(&part) {
            list.push(part);
        }
    }

    let mut headers: Vec<String> = Vec::new();
    let mut footers: Vec<String> = Vec::new();

    for node in body.descendants() {
        let is_header = is_wml(node, "headerReference");
        if !is_header && !is_wml(node, "footerReference") {
            continue;
        }
        let Some(rel) = node.attribute((REL_NS, "id")).and_then(|id| rels.get(id)) else {
            continue;
        };
        let part = resolve_target(&rel.target);
        if is_header {
            push_unique(&mut headers, part);
        } else {
            push_unique(&mut footers, part);
        }
    }

    let mut rest: Vec<(&str, String)> = rels
        .values()
        .map(|r| (r.rel_type.as_str(), resolve_target(&r.target)))
        .collect();
    rest.sort_by(|a, b| a.1.cmp(&b.1));
    for (rel_type, part) in rest {
        match rel_type {
            HEADER_REL => push_unique(&mut headers, part),
            FOOTER_REL => push_unique(&mut footers, part),
            _ => {}
        }
    }
    (headers, footers)
}

fn parse_header_footer(
    entries: &[PackageEntry],
    name: &str,
) -> Result<Option<HeaderFooter>, Error> {
    let Some(xml_content) = part_text(entries, name)? else {
        log::warn!("{name} is referenced but missing from the package");
        return Ok(None);
    };
    let xml = roxmltree::Document::parse(&xml_content)?;
    let prefix = wml_prefix(&xml, name)?;
    let blocks = parse_blocks(xml.root_element(), &xml_content);
    Ok(Some(HeaderFooter {
        blocks,
        part: PartSource {
            name: name.to_string(),
            xml: Arc::from(xml_content.as_str()),
            prefix,
        },
    }))
}

fn read_entries(bytes: &[u8]) -> Result<Vec<PackageEntry>, Error> {
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|_| Error::InvalidDocx("file is not a ZIP archive".into()))?;
    let mut entries = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        entries.push(PackageEntry {
            name: entry.name().to_string(),
            is_dir: entry.is_dir(),
            data,
        });
    }
    Ok(entries)
}

fn parse_bytes(bytes: &[u8]) -> Result<Document, Error> {
    let entries = read_entries(bytes)?;

    let xml_content = part_text(&entries, MAIN_PART)?.ok_or_else(|| {
        Error::InvalidDocx("missing word/document.xml (is this a DOCX file?)".into())
    })?;
    let xml = roxmltree::Document::parse(&xml_content)?;
    let prefix = wml_prefix(&xml, MAIN_PART)?;
    let body = wml(xml.root_element(), "body")
        .ok_or_else(|| Error::InvalidDocx("missing w:body".into()))?;

    let rels = part_text(&entries, MAIN_RELS)?
        .map(|s| parse_rels_xml(&s))
        .unwrap_or_default();
    let (header_parts, footer_parts) = header_footer_parts(body, &rels);

    let blocks = parse_blocks(body, &xml_content);
    let headers = header_parts
        .iter()
        .filter_map(|name| parse_header_footer(&entries, name).transpose())
        .collect::<Result<Vec<_>, _>>()?;
    let footers = footer_parts
        .iter()
        .filter_map(|name| parse_header_footer(&entries, name).transpose())
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!(
        "Parsed {} body blocks, {} headers, {} footers",
        blocks.len(),
        headers.len(),
        footers.len()
    );

    Ok(Document {
        body: blocks,
        headers,
        footers,
        main: PartSource {
            name: MAIN_PART.to_string(),
            xml: Arc::from(xml_content.as_str()),
            prefix,
        },
        package: Arc::new(entries),
    })
}

fn parse(path: &Path) -> Result<Document, Error> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => Error::Io(
            std::io::Error::new(e.kind(), format!("{}: {}", e, path.display())),
        ),
        _ => Error::Io(e),
    })?;
    parse_bytes(&bytes)
}

impl Document {
    /// Read and parse a DOCX file.
    pub fn open(path: &Path) -> Result<Document, Error> {
        parse(path)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Document, Error> {
        parse_bytes(bytes)
    }

    /// Serialize back to a DOCX package.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        write_package(self)
    }
}
