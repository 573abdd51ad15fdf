use std::ops::Range;
use std::sync::Arc;

/// Identity of a paragraph: its position in the walker's traversal order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParagraphId(pub usize);

/// One run property element, kept in the order WordprocessingML requires on write.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum PropElement {
    /// Untouched element copied verbatim from the template.
    Raw { name: String, xml: String },
    Fonts(String),
    Toggle { name: &'static str, on: bool },
    HalfPoints { name: &'static str, value: u32 },
}

impl PropElement {
    pub(crate) fn name(&self) -> &str {
        match self {
            PropElement::Raw { name, .. } => name,
            PropElement::Fonts(_) => "rFonts",
            PropElement::Toggle { name, .. } | PropElement::HalfPoints { name, .. } => name,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunProperties {
    font_name: Option<String>,
    font_size: Option<f32>,
    bold: Option<bool>,
    pub(crate) elements: Vec<PropElement>,
}

impl RunProperties {
    pub(crate) fn from_parsed(
        font_name: Option<String>,
        font_size: Option<f32>,
        bold: Option<bool>,
        elements: Vec<PropElement>,
    ) -> Self {
        Self {
            font_name,
            font_size,
            bold,
            elements,
        }
    }

    pub fn font_name(&self) -> Option<&str> {
        self.font_name.as_deref()
    }

    /// Size in points.
    pub fn font_size(&self) -> Option<f32> {
        self.font_size
    }

    /// `None` means the run inherits boldness from its style.
    pub fn bold(&self) -> Option<bool> {
        self.bold
    }

    pub fn set_font_name(&mut self, name: &str) {
        self.elements.retain(|e| e.name() != "rFonts");
        self.elements.push(PropElement::Fonts(name.to_string()));
        self.font_name = Some(name.to_string());
    }

    pub fn set_font_size(&mut self, points: f32) {
        let half_points = (points * 2.0).round().max(1.0) as u32;
        self.elements.retain(|e| !matches!(e.name(), "sz" | "szCs"));
        self.elements.push(PropElement::HalfPoints {
            name: "sz",
            value: half_points,
        });
        self.elements.push(PropElement::HalfPoints {
            name: "szCs",
            value: half_points,
        });
        self.font_size = Some(half_points as f32 / 2.0);
    }

    pub fn set_bold(&mut self, on: bool) {
        self.elements.retain(|e| !matches!(e.name(), "b" | "bCs"));
        self.elements.push(PropElement::Toggle { name: "b", on });
        self.elements.push(PropElement::Toggle { name: "bCs", on });
        self.bold = Some(on);
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Where a run came from in its part's XML, so untouched content can be copied back.
#[derive(Clone, Debug)]
pub(crate) struct RunSource {
    pub(crate) slot: usize,
    pub(crate) open_tag: String,
    pub(crate) content_xml: String,
    pub(crate) text: String,
}

#[derive(Clone, Debug)]
pub struct Run {
    pub properties: RunProperties,
    text: String,
    pub(crate) source: Option<RunSource>,
}

impl Run {
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_properties(text, RunProperties::default())
    }

    pub fn with_properties(text: impl Into<String>, properties: RunProperties) -> Self {
        Self {
            properties,
            text: text.into(),
            source: None,
        }
    }

    pub(crate) fn from_source(properties: RunProperties, source: RunSource) -> Self {
        Self {
            properties,
            text: source.text.clone(),
            source: Some(source),
        }
    }

    /// Visible text; tabs are `\t` and line breaks `\n`.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn clear_text(&mut self) {
        self.text.clear();
    }

    /// Original content XML, as long as the text has not been edited.
    pub(crate) fn source_content(&self) -> Option<&str> {
        self.source
            .as_ref()
            .filter(|s| s.text == self.text)
            .map(|s| s.content_xml.as_str())
    }
}

/// Byte ranges of a paragraph inside its part's XML.
#[derive(Clone, Debug)]
pub(crate) struct ParagraphSource {
    pub(crate) run_slots: Vec<Range<usize>>,
    pub(crate) tail: ParagraphTail,
}

#[derive(Clone, Debug)]
pub(crate) enum ParagraphTail {
    /// Offset of the closing `</w:p>` tag.
    Close(usize),
    /// `<w:p .../>` with no content; the whole element is rewritten when runs are added.
    SelfClosing(Range<usize>),
}

#[derive(Clone, Debug)]
pub struct Paragraph {
    runs: Vec<Run>,
    pub(crate) source: Option<ParagraphSource>,
}

impl Paragraph {
    pub(crate) fn from_source(runs: Vec<Run>, source: ParagraphSource) -> Self {
        Self {
            runs,
            source: Some(source),
        }
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn runs_mut(&mut self) -> &mut [Run] {
        &mut self.runs
    }

    /// Effective text: the concatenation of every run's text.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text()).collect()
    }

    pub fn push_run(&mut self, run: Run) {
        self.runs.push(run);
    }

    pub fn remove_run(&mut self, index: usize) -> Option<Run> {
        (index < self.runs.len()).then(|| self.runs.remove(index))
    }

    /// Replace all runs with one run carrying `text`. The new run keeps the
    /// first run's properties; fragments split across runs are merged.
    pub fn collapse_runs(&mut self, text: impl Into<String>) {
        let properties = self
            .runs
            .first()
            .map(|r| r.properties.clone())
            .unwrap_or_default();
        self.runs = vec![Run::with_properties(text, properties)];
    }

    /// Whether the runs still sit one-to-one in their original slots.
    pub(crate) fn runs_in_place(&self) -> bool {
        let Some(source) = &self.source else {
            return false;
        };
        self.runs.len() == source.run_slots.len()
            && self
                .runs
                .iter()
                .enumerate()
                .all(|(i, r)| r.source.as_ref().is_some_and(|s| s.slot == i))
    }
}

#[derive(Clone, Debug)]
pub struct TableCell {
    pub blocks: Vec<Block>,
}

#[derive(Clone, Debug)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Clone, Debug)]
pub struct Table {
    pub rows: Vec<TableRow>,
}

#[derive(Clone, Debug)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

/// One XML part of the package that the model was built from.
#[derive(Clone, Debug)]
pub(crate) struct PartSource {
    pub(crate) name: String,
    pub(crate) xml: Arc<str>,
    pub(crate) prefix: String,
}

#[derive(Clone, Debug)]
pub struct HeaderFooter {
    pub blocks: Vec<Block>,
    pub(crate) part: PartSource,
}

impl HeaderFooter {
    pub fn part_name(&self) -> &str {
        &self.part.name
    }
}

#[derive(Clone, Debug)]
pub(crate) struct PackageEntry {
    pub(crate) name: String,
    pub(crate) data: Vec<u8>,
    pub(crate) is_dir: bool,
}

/// A parsed DOCX: body, headers and footers as an editable tree, plus the
/// package entries needed to write it back out. Cloning is cheap on the
/// package side; each job works on its own clone.
#[derive(Clone, Debug)]
pub struct Document {
    pub body: Vec<Block>,
    pub headers: Vec<HeaderFooter>,
    pub footers: Vec<HeaderFooter>,
    pub(crate) main: PartSource,
    pub(crate) package: Arc<Vec<PackageEntry>>,
}

impl Document {
    /// Every paragraph in traversal order: body (table cells included,
    /// recursively), then headers, then footers.
    pub fn paragraphs(&self) -> Vec<&Paragraph> {
        let mut out = Vec::new();
        collect_paragraphs(&self.body, &mut out);
        for region in self.headers.iter().chain(&self.footers) {
            collect_paragraphs(&region.blocks, &mut out);
        }
        out
    }

    /// Same order as [`Document::paragraphs`], borrowed mutably.
    pub fn paragraphs_mut(&mut self) -> Vec<&mut Paragraph> {
        let mut out = Vec::new();
        collect_paragraphs_mut(&mut self.body, &mut out);
        for region in self.headers.iter_mut().chain(self.footers.iter_mut()) {
            collect_paragraphs_mut(&mut region.blocks, &mut out);
        }
        out
    }

    pub fn paragraph_texts(&self) -> Vec<String> {
        self.paragraphs().into_iter().map(Paragraph::text).collect()
    }
}

fn collect_paragraphs<'a>(blocks: &'a [Block], out: &mut Vec<&'a Paragraph>) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => out.push(p),
            Block::Table(table) => {
                for cell in table.rows.iter().flat_map(|r| &r.cells) {
                    collect_paragraphs(&cell.blocks, out);
                }
            }
        }
    }
}

fn collect_paragraphs_mut<'a>(blocks: &'a mut [Block], out: &mut Vec<&'a mut Paragraph>) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => out.push(p),
            Block::Table(table) => {
                for cell in table.rows.iter_mut().flat_map(|r| r.cells.iter_mut()) {
                    collect_paragraphs_mut(&mut cell.blocks, out);
                }
            }
        }
    }
}
