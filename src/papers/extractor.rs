//! Page-level PDF text extraction
//!
//! Text runs are read straight from each page's content stream with their
//! vertical position, then joined: single spaces between runs, a newline
//! whenever the baseline moves by more than `LINE_BREAK_THRESHOLD`. Order is
//! content-stream order, so multi-column layouts may interleave.
//!
//! Form XObjects drawn with `Do` are walked in place, under the form's
//! matrix. Pages whose strings can't be decoded without font tables
//! (composite fonts, custom subset codes) or whose forms can't be read fall
//! back to pdf-extract's text for that page.

use std::cell::OnceCell;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{PaperError, Result};

/// Baseline shift (in user-space units) treated as a new line.
pub const LINE_BREAK_THRESHOLD: f64 = 5.0;

/// TJ adjustments more negative than this (thousandths of an em) are
/// rendered as a word gap.
const TJ_SPACE_ADJUSTMENT: f64 = -200.0;

/// Nesting limit for form XObjects (and page-tree parents), against cycles.
const MAX_NESTING: usize = 8;

/// Inclusive, 1-based page range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    /// Apply defaults and clamping against `total` pages.
    ///
    /// Missing start is 1 (0 is treated as 1), missing end is the last page,
    /// an end past the last page is clamped. Anything still inverted is an
    /// error rather than an empty read.
    pub fn resolve(start: Option<usize>, end: Option<usize>, total: usize) -> Result<Self> {
        let start = start.unwrap_or(1).max(1);
        let end = end.unwrap_or(total).min(total);
        if total == 0 || start > end {
            return Err(PaperError::InvalidRange { start, end, total });
        }
        Ok(Self { start, end })
    }

    pub fn count(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn pages(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// A piece of shown text and the baseline it was drawn at
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub y: f64,
}

/// Join runs with spaces, breaking lines where the baseline jumps.
pub fn join_runs(runs: &[TextRun]) -> String {
    let mut out = String::new();
    let mut last_y: Option<f64> = None;

    for run in runs.iter().filter(|r| !r.text.trim().is_empty()) {
        if let Some(prev) = last_y {
            if (run.y - prev).abs() > LINE_BREAK_THRESHOLD {
                out.push('\n');
            } else {
                out.push(' ');
            }
        }
        out.push_str(&run.text);
        last_y = Some(run.y);
    }
    out
}

pub fn page_header(page: usize) -> String {
    format!("--- Page {} ---", page)
}

// ─── Content stream walking ──────────────────────────────────────────────────

/// Affine matrix `[a b c d e f]` as used by PDF operators
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f64; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translation(tx: f64, ty: f64) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self × other` (apply self first, then other)
    fn then(&self, other: &Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a * a2 + b * c2,
            a * b2 + b * d2,
            c * a2 + d * c2,
            c * b2 + d * d2,
            e * a2 + f * c2 + e2,
            e * b2 + f * d2 + f2,
        ])
    }

    fn y(&self) -> f64 {
        self.0[5]
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn matrix_operands(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = [0.0; 6];
    for (slot, obj) in m.iter_mut().zip(operands) {
        *slot = number(obj)?;
    }
    Some(Matrix(m))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FontKind {
    /// One byte per glyph
    Simple,
    /// Type0: multi-byte codes that only the font's CMap can map
    Composite,
}

/// Decode a string operand. `None` means the bytes need the font's own
/// tables (CMap, ToUnicode) to mean anything.
fn decode_pdf_string(bytes: &[u8], font: FontKind) -> Option<String> {
    if font == FontKind::Composite {
        return None;
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&units));
    }
    // Simple fonts with standard encodings: Latin-1 is close enough for text.
    // Control characters mean custom subset codes, not real text.
    let text: String = bytes.iter().map(|&b| b as char).collect();
    if text.chars().any(|c| c.is_control() && !c.is_whitespace()) {
        return None;
    }
    Some(text)
}

// ─── Resource lookup ─────────────────────────────────────────────────────────

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj)? {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// Entry `name` of a resource category such as `Font` or `XObject`.
fn resource<'a>(
    doc: &'a Document,
    resources: Option<&'a Dictionary>,
    category: &[u8],
    name: &[u8],
) -> Option<&'a Object> {
    let table = resolve_dict(doc, resources?.get(category).ok()?)?;
    resolve(doc, table.get(name).ok()?)
}

/// Page resources, inherited from the nearest ancestor that declares them.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_NESTING {
        if let Ok(obj) = node.get(b"Resources") {
            return resolve_dict(doc, obj);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn font_kind(doc: &Document, resources: Option<&Dictionary>, name: &[u8]) -> FontKind {
    let subtype = resource(doc, resources, b"Font", name)
        .and_then(|obj| resolve_dict(doc, obj))
        .and_then(|font| font.get(b"Subtype").ok());
    match subtype {
        Some(Object::Name(n)) if n.as_slice() == b"Type0" => FontKind::Composite,
        _ => FontKind::Simple,
    }
}

#[derive(Default)]
struct PageRuns {
    runs: Vec<TextRun>,
    undecodable: usize,
    /// Form XObjects that were drawn but couldn't be read
    skipped_forms: usize,
}

struct TextState {
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    leading: f64,
    font: FontKind,
}

impl TextState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            ctm_stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            leading: 0.0,
            font: FontKind::Simple,
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.tlm = Matrix::translation(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    fn baseline(&self) -> f64 {
        self.tm.then(&self.ctm).y()
    }
}

fn show_text(parts: &[&[u8]], gap_after: &[bool], state: &TextState, page: &mut PageRuns) {
    let mut text = String::new();
    for (bytes, gap) in parts.iter().zip(gap_after) {
        match decode_pdf_string(bytes, state.font) {
            Some(s) => text.push_str(&s),
            None => page.undecodable += 1,
        }
        if *gap {
            text.push(' ');
        }
    }
    if !text.is_empty() {
        page.runs.push(TextRun { text, y: state.baseline() });
    }
}

struct Walker<'a> {
    doc: &'a Document,
    page: PageRuns,
}

impl<'a> Walker<'a> {
    fn walk(&mut self, content: &Content, resources: Option<&'a Dictionary>, ctm: Matrix, depth: usize) {
        let doc = self.doc;
        let mut state = TextState::new(ctm);

        for op in &content.operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => state.ctm_stack.push(state.ctm),
                "Q" => {
                    if let Some(ctm) = state.ctm_stack.pop() {
                        state.ctm = ctm;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_operands(operands) {
                        state.ctm = m.then(&state.ctm);
                    }
                }
                "Do" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.draw_xobject(name, resources, state.ctm, depth);
                    }
                }
                "BT" => {
                    state.tm = Matrix::IDENTITY;
                    state.tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        state.font = font_kind(doc, resources, name);
                    }
                }
                "Tm" => {
                    if let Some(m) = matrix_operands(operands) {
                        state.tm = m;
                        state.tlm = m;
                    }
                }
                "TL" => {
                    if let Some(l) = operands.first().and_then(number) {
                        state.leading = l;
                    }
                }
                "Td" | "TD" => {
                    let tx = operands.first().and_then(number).unwrap_or(0.0);
                    let ty = operands.get(1).and_then(number).unwrap_or(0.0);
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    state.move_line(tx, ty);
                }
                "T*" => state.next_line(),
                "Tj" | "'" | "\"" => {
                    if op.operator != "Tj" {
                        state.next_line();
                    }
                    if let Some(Object::String(bytes, _)) = operands.last() {
                        show_text(&[bytes.as_slice()], &[false], &state, &mut self.page);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        let mut parts: Vec<&[u8]> = Vec::new();
                        let mut gaps: Vec<bool> = Vec::new();
                        for item in items {
                            match item {
                                Object::String(bytes, _) => {
                                    parts.push(bytes.as_slice());
                                    gaps.push(false);
                                }
                                other => {
                                    if let (Some(adj), Some(last)) = (number(other), gaps.last_mut()) {
                                        *last = adj < TJ_SPACE_ADJUSTMENT;
                                    }
                                }
                            }
                        }
                        show_text(&parts, &gaps, &state, &mut self.page);
                    }
                }
                _ => {}
            }
        }
    }

    /// Walk a form XObject in place. Images and unknown names draw no text.
    fn draw_xobject(&mut self, name: &[u8], resources: Option<&'a Dictionary>, ctm: Matrix, depth: usize) {
        let doc = self.doc;
        let Some(Object::Stream(stream)) = resource(doc, resources, b"XObject", name) else {
            return;
        };
        let is_form = matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n.as_slice() == b"Form");
        if !is_form {
            return;
        }
        if depth >= MAX_NESTING {
            self.page.skipped_forms += 1;
            return;
        }

        let raw = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        let content = match Content::decode(&raw) {
            Ok(content) => content,
            Err(e) => {
                debug!(error = %e, "Unreadable form XObject");
                self.page.skipped_forms += 1;
                return;
            }
        };

        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_array().ok())
            .and_then(|items| matrix_operands(items))
            .unwrap_or(Matrix::IDENTITY);
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|obj| resolve_dict(doc, obj))
            .or(resources);

        self.walk(&content, form_resources, matrix.then(&ctm), depth + 1);
    }
}

fn collect_runs<'a>(doc: &'a Document, content: &Content, resources: Option<&'a Dictionary>) -> PageRuns {
    let mut walker = Walker {
        doc,
        page: PageRuns::default(),
    };
    walker.walk(content, resources, Matrix::IDENTITY, 0);
    walker.page
}

// ─── Document ────────────────────────────────────────────────────────────────

/// A loaded PDF, ready for page-range reads.
///
/// Parsing is synchronous; async callers go through [`run_blocking`].
pub struct PdfDocument {
    path: PathBuf,
    bytes: Vec<u8>,
    doc: Document,
    page_ids: Vec<ObjectId>,
    fallback_pages: OnceCell<Option<Vec<String>>>,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PaperError::NotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        let doc = Document::load_mem(&bytes).map_err(|e| PaperError::extraction(path, e))?;
        // get_pages is keyed by page number, so values come out in page order
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        debug!(path = %path.display(), pages = page_ids.len(), "Loaded PDF");

        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            doc,
            page_ids,
            fallback_pages: OnceCell::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn resolve_range(&self, start: Option<usize>, end: Option<usize>) -> Result<PageRange> {
        PageRange::resolve(start, end, self.page_count())
    }

    /// Text of one page (1-based), without the page header.
    pub fn page_text(&self, page: usize) -> Result<String> {
        let page_id = *page
            .checked_sub(1)
            .and_then(|i| self.page_ids.get(i))
            .ok_or(PaperError::InvalidRange {
                start: page,
                end: page,
                total: self.page_count(),
            })?;

        let raw = self
            .doc
            .get_page_content(page_id)
            .map_err(|e| PaperError::extraction(&self.path, format!("page {}: {}", page, e)))?;
        let content = Content::decode(&raw)
            .map_err(|e| PaperError::extraction(&self.path, format!("page {}: {}", page, e)))?;

        let runs = collect_runs(&self.doc, &content, page_resources(&self.doc, page_id));
        if runs.undecodable > 0 || runs.skipped_forms > 0 || runs.runs.is_empty() {
            if let Some(text) = self.fallback_page(page) {
                return Ok(text);
            }
        }
        Ok(join_runs(&runs.runs))
    }

    /// Headed page texts for `range`, separated by blank lines.
    pub fn range_text(&self, range: PageRange) -> Result<String> {
        let mut blocks = Vec::with_capacity(range.count());
        for page in range.pages() {
            blocks.push(format!("{}\n{}", page_header(page), self.page_text(page)?));
        }
        Ok(blocks.join("\n\n"))
    }

    fn fallback_page(&self, page: usize) -> Option<String> {
        let pages = self.fallback_pages.get_or_init(|| {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                pdf_extract::extract_text_from_mem_by_pages(&self.bytes)
            }));
            match result {
                Ok(Ok(pages)) => Some(pages),
                Ok(Err(e)) => {
                    warn!(path = %self.path.display(), error = %e, "pdf-extract fallback failed");
                    None
                }
                Err(_) => {
                    warn!(path = %self.path.display(), "pdf-extract fallback panicked");
                    None
                }
            }
        });

        pages
            .as_ref()
            .and_then(|p| p.get(page - 1))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// Result of a ranged read
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedRange {
    pub total_pages: usize,
    pub range: PageRange,
    pub text: String,
}

impl ExtractedRange {
    pub fn has_more(&self) -> bool {
        self.range.end < self.total_pages
    }
}

/// Run PDF parsing off the async workers.
pub async fn run_blocking<T, F>(path: &Path, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PaperError::extraction(path, format!("extraction task failed: {}", e)))?
}

pub async fn page_count(path: &Path) -> Result<usize> {
    let owned = path.to_path_buf();
    run_blocking(path, move || PdfDocument::open(&owned).map(|d| d.page_count())).await
}

pub async fn extract_text(path: &Path, start: Option<usize>, end: Option<usize>) -> Result<ExtractedRange> {
    let owned = path.to_path_buf();
    run_blocking(path, move || {
        let doc = PdfDocument::open(&owned)?;
        let range = doc.resolve_range(start, end)?;
        let text = doc.range_text(range)?;
        Ok(ExtractedRange {
            total_pages: doc.page_count(),
            range,
            text,
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::dictionary;

    fn run(text: &str, y: f64) -> TextRun {
        TextRun { text: text.to_string(), y }
    }

    fn ops(list: Vec<Operation>) -> Content {
        Content { operations: list }
    }

    fn runs_of(content: &Content) -> PageRuns {
        collect_runs(&Document::with_version("1.5"), content, None)
    }

    #[test]
    fn test_join_runs_threshold() {
        let runs = vec![
            run("Deep", 700.0),
            run("Learning", 702.0),
            run("Abstract", 690.0),
            run("   ", 600.0),
            run("text", 689.0),
        ];
        assert_eq!(join_runs(&runs), "Deep Learning\nAbstract text");
    }

    #[test]
    fn test_join_runs_exact_threshold_is_same_line() {
        assert_eq!(join_runs(&[run("a", 10.0), run("b", 5.0)]), "a b");
        assert_eq!(join_runs(&[run("a", 10.0), run("b", 4.9)]), "a\nb");
    }

    #[test]
    fn test_range_resolution() {
        assert_eq!(PageRange::resolve(None, None, 7).unwrap(), PageRange { start: 1, end: 7 });
        assert_eq!(PageRange::resolve(Some(3), Some(99), 7).unwrap(), PageRange { start: 3, end: 7 });
        assert_eq!(PageRange::resolve(Some(0), Some(2), 7).unwrap(), PageRange { start: 1, end: 2 });
    }

    #[test]
    fn test_inverted_range_is_error() {
        let err = PageRange::resolve(Some(5), Some(3), 10).unwrap_err();
        assert!(matches!(err, PaperError::InvalidRange { start: 5, end: 3, total: 10 }));
        assert!(PageRange::resolve(Some(11), None, 10).is_err());
        assert!(PageRange::resolve(None, None, 0).is_err());
    }

    #[test]
    fn test_collect_runs_tracks_lines() {
        let content = ops(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("TL", vec![14.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal("Title")]),
            Operation::new("Tj", vec![Object::string_literal("continued")]),
            Operation::new("T*", vec![]),
            Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("Second"),
                    Object::Integer(-300),
                    Object::string_literal("line"),
                ])],
            ),
            Operation::new("ET", vec![]),
        ]);

        let page = runs_of(&content);
        assert_eq!(page.undecodable, 0);
        assert_eq!(page.runs[0].y, 700.0);
        assert_eq!(page.runs[2].y, 686.0);
        assert_eq!(join_runs(&page.runs), "Title continued\nSecond line");
    }

    #[test]
    fn test_collect_runs_applies_ctm_and_tm() {
        let content = ops(vec![
            Operation::new("q", vec![]),
            Operation::new("cm", vec![1.into(), 0.into(), 0.into(), 1.into(), 0.into(), 100.into()]),
            Operation::new("BT", vec![]),
            Operation::new("Tm", vec![1.into(), 0.into(), 0.into(), 1.into(), 50.into(), 500.into()]),
            Operation::new("Tj", vec![Object::string_literal("shifted")]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Td", vec![50.into(), 600.into()]),
            Operation::new("Tj", vec![Object::string_literal("restored")]),
            Operation::new("ET", vec![]),
        ]);

        let page = runs_of(&content);
        assert_eq!(page.runs[0].y, 600.0);
        assert_eq!(page.runs[1].y, 600.0);
        assert_eq!(join_runs(&page.runs), "shifted restored");
    }

    #[test]
    fn test_cid_strings_marked_undecodable() {
        let content = ops(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tj", vec![Object::String(vec![0x00, 0x24, 0x00, 0x25], lopdf::StringFormat::Hexadecimal)]),
            Operation::new("ET", vec![]),
        ]);
        let page = runs_of(&content);
        assert_eq!(page.undecodable, 1);
        assert!(page.runs.is_empty());
    }

    #[test]
    fn test_decode_utf16() {
        let bytes = [0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(decode_pdf_string(&bytes, FontKind::Simple).as_deref(), Some("Hi"));
    }

    #[test]
    fn test_glyph_ids_without_nul_are_undecodable() {
        // Identity-H glyph ids >= 256 and subset codes land in the C0 range
        let content = ops(vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tj",
                vec![Object::String(vec![0x01, 0x2C, 0x01, 0x2D, 0x01, 0x3A], lopdf::StringFormat::Hexadecimal)],
            ),
            Operation::new("ET", vec![]),
        ]);
        let page = runs_of(&content);
        assert_eq!(page.undecodable, 1);
        assert!(page.runs.is_empty());
    }

    #[test]
    fn test_composite_font_strings_are_undecodable() {
        let resources = dictionary! {
            "Font" => dictionary! {
                "F1" => dictionary! { "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica" },
                "F2" => dictionary! { "Type" => "Font", "Subtype" => "Type0", "BaseFont" => "Sub+Serif", "Encoding" => "Identity-H" },
            },
        };
        let content = ops(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Tj", vec![Object::string_literal("Plain")]),
            Operation::new("Tf", vec!["F2".into(), 12.into()]),
            Operation::new("Tj", vec![Object::string_literal("AB")]),
            Operation::new("ET", vec![]),
        ]);
        let page = collect_runs(&Document::with_version("1.5"), &content, Some(&resources));
        assert_eq!(page.undecodable, 1);
        assert_eq!(join_runs(&page.runs), "Plain");
    }

    fn write_two_page_pdf(path: &Path) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for lines in [["Hello world", "Second line"], ["Page two", "ends here"]] {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(lines[0])]),
                    Operation::new("Td", vec![0.into(), (-20).into()]),
                    Operation::new("Tj", vec![Object::string_literal(lines[1])]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(lopdf::Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => 2,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    /// One page: body text inside form XObject `X1` (shifted up 100 by the
    /// form matrix), plus a footer drawn directly on the page.
    fn write_form_pdf(path: &Path) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let form = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal("Body text of the paper")]),
                Operation::new("ET", vec![]),
            ],
        };
        let form_id = doc.add_object(lopdf::Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 0.into(), 100.into()],
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            },
            form.encode().unwrap(),
        ));
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => dictionary! { "X1" => form_id },
        });

        let page = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new("Do", vec!["X1".into()]),
                Operation::new("Q", vec![]),
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 8.into()]),
                Operation::new("Td", vec![72.into(), 30.into()]),
                Operation::new("Tj", vec![Object::string_literal("Page footer")]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(lopdf::Stream::new(dictionary! {}, page.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let kids: Vec<Object> = vec![page_id.into()];

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_form_xobject_text_is_read() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("stamped.pdf");
        write_form_pdf(&path);

        let doc = PdfDocument::open(&path).unwrap();
        assert_eq!(doc.page_text(1).unwrap(), "Body text of the paper\nPage footer");
    }

    #[test]
    fn test_form_xobject_matrix_moves_baseline() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("stamped.pdf");
        write_form_pdf(&path);

        let doc = Document::load(&path).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        let page = collect_runs(&doc, &content, page_resources(&doc, page_id));

        assert_eq!(page.skipped_forms, 0);
        assert_eq!(page.runs.len(), 2);
        assert_eq!(page.runs[0].y, 700.0);
        assert_eq!(page.runs[1].y, 30.0);
    }

    #[test]
    fn test_self_referencing_form_is_bounded() {
        let mut doc = Document::with_version("1.5");
        let form_id = doc.new_object_id();
        let body = Content {
            operations: vec![Operation::new("Do", vec!["Loop".into()])],
        };
        doc.objects.insert(
            form_id,
            Object::Stream(lopdf::Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "Resources" => dictionary! { "XObject" => dictionary! { "Loop" => form_id } },
                },
                body.encode().unwrap(),
            )),
        );
        let resources = dictionary! { "XObject" => dictionary! { "Loop" => form_id } };
        let content = ops(vec![Operation::new("Do", vec!["Loop".into()])]);

        let page = collect_runs(&doc, &content, Some(&resources));
        assert_eq!(page.skipped_forms, 1);
        assert!(page.runs.is_empty());
    }

    #[tokio::test]
    async fn test_extract_text_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("two.pdf");
        write_two_page_pdf(&path);

        assert_eq!(page_count(&path).await.unwrap(), 2);

        let all = extract_text(&path, None, None).await.unwrap();
        assert_eq!(all.total_pages, 2);
        assert!(!all.has_more());
        assert_eq!(
            all.text,
            "--- Page 1 ---\nHello world\nSecond line\n\n--- Page 2 ---\nPage two\nends here"
        );

        let first = extract_text(&path, Some(1), Some(1)).await.unwrap();
        assert!(first.has_more());
        assert_eq!(first.text, "--- Page 1 ---\nHello world\nSecond line");
    }

    #[tokio::test]
    async fn test_extract_missing_file() {
        let err = extract_text(Path::new("/definitely/not/here.pdf"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PaperError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_extract_corrupt_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.pdf");
        std::fs::write(&path, b"%PDF-1.4\nthis is not a pdf body").unwrap();
        assert!(extract_text(&path, None, None).await.is_err());
    }

    #[tokio::test]
    async fn test_extract_inverted_range_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("two.pdf");
        write_two_page_pdf(&path);
        let err = extract_text(&path, Some(2), Some(1)).await.unwrap_err();
        assert!(matches!(err, PaperError::InvalidRange { .. }));
    }
}
