//! In-memory page model and the cursor-based canvas that fills it.
//!
//! [`Canvas`] follows the classic FPDF flow model: a cursor moves down an A4
//! page, `cell`/`multi_cell` print text at it, and content that would cross
//! the bottom break margin starts a new page. The result is a [`Document`]
//! of positioned operations; [`super::pdf`] serialises it. Keeping the two
//! apart lets tests assert on what was laid out instead of on PDF bytes.
//!
//! All coordinates are millimetres from the top-left corner of the page.

use super::metrics::{self, MM_PER_PT};

pub const PAGE_WIDTH: f64 = 210.0;
pub const PAGE_HEIGHT: f64 = 297.0;
pub const MARGIN: f64 = 10.0;
/// Horizontal padding inside a cell.
pub const CELL_PADDING: f64 = 1.0;
/// Distance from the bottom edge at which content moves to the next page.
pub const BREAK_MARGIN: f64 = 20.0;

/// The Helvetica faces available to the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// One line of text; `y` is the baseline.
    Text {
        x: f64,
        y: f64,
        text: String,
        font: Font,
        size: f64,
        color: Rgb,
    },
    /// Image `index` into [`Document::images`], `(x, y)` is its top-left.
    Image {
        index: usize,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
    },
    /// Stroked rectangle (cell border).
    Rect { x: f64, y: f64, w: f64, h: f64 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<Op>,
}

impl Page {
    /// Text ops on this page, in drawing order.
    pub fn texts(&self) -> impl Iterator<Item = (&str, Font, Rgb)> {
        self.ops.iter().filter_map(|op| match op {
            Op::Text {
                text, font, color, ..
            } => Some((text.as_str(), *font, *color)),
            _ => None,
        })
    }
}

/// JPEG data ready for a DCT-encoded image XObject.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedImage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub grayscale: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub title: String,
    pub pages: Vec<Page>,
    pub images: Vec<EmbeddedImage>,
}

/// Cursor-based writer producing a [`Document`].
pub struct Canvas {
    doc: Document,
    x: f64,
    y: f64,
    font: Font,
    size: f64,
    color: Rgb,
}

impl Canvas {
    /// A canvas with one empty page, cursor at the top-left margin.
    pub fn new(title: &str) -> Self {
        let mut canvas = Self {
            doc: Document {
                title: title.to_string(),
                ..Document::default()
            },
            x: MARGIN,
            y: MARGIN,
            font: Font::Regular,
            size: 12.0,
            color: Rgb::BLACK,
        };
        canvas.add_page();
        canvas
    }

    pub fn add_page(&mut self) {
        self.doc.pages.push(Page::default());
        self.x = MARGIN;
        self.y = MARGIN;
    }

    pub fn set_font(&mut self, font: Font, size: f64) {
        self.font = font;
        self.size = size;
    }

    pub fn set_text_color(&mut self, color: Rgb) {
        self.color = color;
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn set_xy(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    /// Line break: back to the left margin, `h` further down.
    pub fn ln(&mut self, h: f64) {
        self.x = MARGIN;
        self.y += h;
    }

    /// Width from the cursor to the right margin.
    pub fn remaining_width(&self) -> f64 {
        PAGE_WIDTH - MARGIN - self.x
    }

    /// Usable height of a fresh page.
    pub fn page_body_height() -> f64 {
        PAGE_HEIGHT - BREAK_MARGIN - MARGIN
    }

    /// How many `h`-high lines still fit above the break margin.
    pub fn lines_left(&self, h: f64) -> usize {
        let room = PAGE_HEIGHT - BREAK_MARGIN - self.y;
        if room <= 0.0 {
            return 0;
        }
        (room / h + 1e-9).floor() as usize
    }

    /// Start a new page if `h` more millimetres would cross the break margin.
    /// Returns whether a page was added.
    pub fn break_if_needed(&mut self, h: f64) -> bool {
        let at_top = (self.y - MARGIN).abs() < f64::EPSILON;
        if self.y + h > PAGE_HEIGHT - BREAK_MARGIN && !at_top {
            self.add_page();
            return true;
        }
        false
    }

    /// Wrap `text` for a cell of width `w` in the current font.
    pub fn wrap(&self, text: &str, w: f64) -> Vec<String> {
        metrics::wrap(text, self.font, self.size, w - 2.0 * CELL_PADDING)
    }

    /// One-line cell. `w == 0` extends to the right margin.
    pub fn cell(&mut self, w: f64, h: f64, text: &str, border: bool, new_line: bool) {
        let w = if w == 0.0 { self.remaining_width() } else { w };
        self.break_if_needed(h);
        if border {
            self.rect(self.x, self.y, w, h);
        }
        self.text_line(self.x, self.y, h, text);
        if new_line {
            self.ln(h);
        } else {
            self.x += w;
        }
    }

    /// Wrapped text, one `h`-high line per wrapped line, cursor left below.
    pub fn multi_cell(&mut self, w: f64, h: f64, text: &str) {
        let w = if w == 0.0 { self.remaining_width() } else { w };
        let left = self.x;
        for line in self.wrap(text, w) {
            self.x = left;
            self.cell(w, h, &line, false, true);
        }
    }

    /// Print `text` vertically centred in a line of height `h` whose top is `y`.
    pub fn text_line(&mut self, x: f64, y: f64, h: f64, text: &str) {
        if text.is_empty() {
            return;
        }
        let size_mm = self.size * MM_PER_PT;
        let op = Op::Text {
            x: x + CELL_PADDING,
            y: y + 0.5 * h + 0.3 * size_mm,
            text: text.to_string(),
            font: self.font,
            size: self.size,
            color: self.color,
        };
        self.push(op);
    }

    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.push(Op::Rect { x, y, w, h });
    }

    /// Register an image and return its index for [`Canvas::image`].
    pub fn add_image(&mut self, image: EmbeddedImage) -> usize {
        self.doc.images.push(image);
        self.doc.images.len() - 1
    }

    /// Place image `index` at the cursor, `w` wide, height from its aspect
    /// ratio. Images taller than a page body are scaled down to fit.
    pub fn image(&mut self, index: usize, w: f64) {
        let Some(img) = self.doc.images.get(index) else {
            return;
        };
        let ratio = f64::from(img.height) / f64::from(img.width.max(1));
        let (mut w, mut h) = (w, w * ratio);
        let max_h = Self::page_body_height();
        if h > max_h {
            w *= max_h / h;
            h = max_h;
        }
        self.break_if_needed(h);
        let op = Op::Image {
            index,
            x: self.x,
            y: self.y,
            w,
            h,
        };
        self.push(op);
        self.y += h;
    }

    pub fn finish(self) -> Document {
        self.doc
    }

    fn push(&mut self, op: Op) {
        if let Some(page) = self.doc.pages.last_mut() {
            page.ops.push(op);
        }
    }
}
