use std::io::{Cursor, Write};
use std::ops::Range;

use crate::error::Error;
use crate::model::{Block, Document, Paragraph, ParagraphTail, PartSource, PropElement, Run};

/// Schema order of `w:rPr` children (CT_RPr). Unknown elements go just before
/// `rPrChange`, which must stay last.
const RPR_ORDER: &[&str] = &[
    "rStyle", "rFonts", "b", "bCs", "i", "iCs", "caps", "smallCaps", "strike", "dstrike",
    "outline", "shadow", "emboss", "imprint", "noProof", "snapToGrid", "vanish", "webHidden",
    "color", "spacing", "w", "kern", "position", "sz", "szCs", "highlight", "u", "effect", "bdr",
    "shd", "fitText", "vertAlign", "rtl", "cs", "em", "lang", "eastAsianLayout", "specVanish",
    "oMath",
];

fn rpr_rank(name: &str) -> usize {
    if name == "rPrChange" {
        return RPR_ORDER.len() + 1;
    }
    RPR_ORDER
        .iter()
        .position(|n| *n == name)
        .unwrap_or(RPR_ORDER.len())
}

fn escape_xml(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn write_prop(element: &PropElement, p: &str, out: &mut String) {
    match element {
        PropElement::Raw { xml, .. } => out.push_str(xml),
        PropElement::Fonts(name) => {
            let mut escaped = String::new();
            escape_xml(name, &mut escaped);
            out.push_str(&format!(
                "<{p}:rFonts {p}:ascii=\"{escaped}\" {p}:hAnsi=\"{escaped}\" {p}:eastAsia=\"{escaped}\" {p}:cs=\"{escaped}\"/>"
            ));
        }
        PropElement::Toggle { name, on: true } => out.push_str(&format!("<{p}:{name}/>")),
        PropElement::Toggle { name, on: false } => {
            out.push_str(&format!("<{p}:{name} {p}:val=\"0\"/>"))
        }
        PropElement::HalfPoints { name, value } => {
            out.push_str(&format!("<{p}:{name} {p}:val=\"{value}\"/>"))
        }
    }
}

/// XML 1.0 `Char` production.
fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}'
    )
}

/// Text as `w:t` segments with tabs and line breaks as their own elements.
/// `\r\n`, `\r`, `\n` and vertical tab are one line break each, form feed is
/// a page break, and other characters XML cannot carry are dropped.
fn write_text(text: &str, p: &str, out: &mut String) {
    let mut segment = String::new();
    let flush = |segment: &mut String, out: &mut String| {
        if !segment.is_empty() {
            out.push_str(&format!("<{p}:t xml:space=\"preserve\">"));
            escape_xml(segment, out);
            out.push_str(&format!("</{p}:t>"));
            segment.clear();
        }
    };
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\t' => {
                flush(&mut segment, out);
                out.push_str(&format!("<{p}:tab/>"));
            }
            '\r' | '\n' | '\u{0B}' => {
                if c == '\r' {
                    chars.next_if_eq(&'\n');
                }
                flush(&mut segment, out);
                out.push_str(&format!("<{p}:br/>"));
            }
            '\u{0C}' => {
                flush(&mut segment, out);
                out.push_str(&format!("<{p}:br {p}:type=\"page\"/>"));
            }
            c if is_xml_char(c) => segment.push(c),
            c => log::debug!("dropping {c:?}, not allowed in XML text"),
        }
    }
    flush(&mut segment, out);
}

fn write_run(run: &Run, p: &str, out: &mut String) {
    match &run.source {
        Some(source) => out.push_str(&source.open_tag),
        None => out.push_str(&format!("<{p}:r>")),
    }
    if !run.properties.is_empty() {
        let mut elements: Vec<&PropElement> = run.properties.elements.iter().collect();
        elements.sort_by_key(|e| rpr_rank(e.name()));
        out.push_str(&format!("<{p}:rPr>"));
        for element in elements {
            write_prop(element, p, out);
        }
        out.push_str(&format!("</{p}:rPr>"));
    }
    match run.source_content() {
        Some(content) => out.push_str(content),
        None => write_text(run.text(), p, out),
    }
    out.push_str(&format!("</{p}:r>"));
}

fn paragraph_edits(para: &Paragraph, part: &PartSource, edits: &mut Vec<(Range<usize>, String)>) {
    let Some(source) = &para.source else {
        return;
    };
    let p = part.prefix.as_str();

    if para.runs_in_place() {
        for (run, slot) in para.runs().iter().zip(&source.run_slots) {
            let mut xml = String::new();
            write_run(run, p, &mut xml);
            edits.push((slot.clone(), xml));
        }
        return;
    }

    let mut runs_xml = String::new();
    for run in para.runs() {
        write_run(run, p, &mut runs_xml);
    }
    if let Some(first) = source.run_slots.first() {
        edits.push((first.clone(), runs_xml));
        for slot in &source.run_slots[1..] {
            edits.push((slot.clone(), String::new()));
        }
        return;
    }
    if runs_xml.is_empty() {
        return;
    }
    match &source.tail {
        ParagraphTail::Close(at) => edits.push((*at..*at, runs_xml)),
        ParagraphTail::SelfClosing(range) => {
            let raw = &part.xml[range.clone()];
            let open = raw.trim_end_matches("/>").trim_end();
            edits.push((range.clone(), format!("{open}>{runs_xml}</{p}:p>")));
        }
    }
}

fn block_edits(blocks: &[Block], part: &PartSource, edits: &mut Vec<(Range<usize>, String)>) {
    for block in blocks {
        match block {
            Block::Paragraph(para) => paragraph_edits(para, part, edits),
            Block::Table(table) => {
                for cell in table.rows.iter().flat_map(|r| &r.cells) {
                    block_edits(&cell.blocks, part, edits);
                }
            }
        }
    }
}

/// Splice the current run state back into the part's original XML; everything
/// outside the runs is copied through unchanged.
fn render_part(part: &PartSource, blocks: &[Block]) -> String {
    let mut edits = Vec::new();
    block_edits(blocks, part, &mut edits);
    edits.sort_by_key(|(range, _)| range.start);

    let xml = &*part.xml;
    let mut out = String::with_capacity(xml.len() + xml.len() / 4);
    let mut cursor = 0;
    for (range, replacement) in edits {
        out.push_str(&xml[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&xml[cursor..]);
    out
}

/// Serialize the document as a DOCX package. Entries keep their original
/// order; only the main, header and footer parts are regenerated.
pub(crate) fn write_package(doc: &Document) -> Result<Vec<u8>, Error> {
    let mut rendered: Vec<(&str, String)> = vec![(
        doc.main.name.as_str(),
        render_part(&doc.main, &doc.body),
    )];
    for region in doc.headers.iter().chain(&doc.footers) {
        rendered.push((
            region.part.name.as_str(),
            render_part(&region.part, &region.blocks),
        ));
    }

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let deflated = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    let stored =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for entry in doc.package.iter() {
        if entry.is_dir {
            zip.add_directory(entry.name.as_str(), deflated)?;
            continue;
        }
        let opts = if entry.name.starts_with("word/media/") {
            stored
        } else {
            deflated
        };
        zip.start_file(entry.name.as_str(), opts)?;
        match rendered.iter().find(|(name, _)| *name == entry.name) {
            Some((_, xml)) => zip.write_all(xml.as_bytes())?,
            None => zip.write_all(&entry.data)?,
        }
    }
    Ok(zip.finish()?.into_inner())
}
