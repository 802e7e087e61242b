//! Text Module — Content model, wrapping, and measurement.
//!
//! Responsibilities:
//! - Text content as nested override spans, flattened for painting
//! - Line wrapping per wrap mode (word, char, truncate, ellipsis, none)
//! - Intrinsic size measurement consulted by the layout engine
//! - Horizontal alignment offsets

use serde::Deserialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::ansi::strip_ansi;
use crate::style::{TextAlign, WrapMode};
use crate::text_utils::{grapheme_width, str_width};
use crate::types::{CellAttrs, CellStyle, Color};

pub(crate) const ELLIPSIS: char = '…';

// ============================================================================
// Content Model
// ============================================================================

/// Style overrides on one span. Unset fields inherit from the enclosing span
/// (or from the node for top-level spans).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpanStyle {
    pub color: Option<Color>,
    #[serde(alias = "bg")]
    pub background_color: Option<Color>,
    pub bold: Option<bool>,
    pub dim: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub inverse: Option<bool>,
    pub strikethrough: Option<bool>,
}

impl SpanStyle {
    /// Layer `self` over `outer`: fields set here win.
    fn over(self, outer: SpanStyle) -> SpanStyle {
        SpanStyle {
            color: self.color.or(outer.color),
            background_color: self.background_color.or(outer.background_color),
            bold: self.bold.or(outer.bold),
            dim: self.dim.or(outer.dim),
            italic: self.italic.or(outer.italic),
            underline: self.underline.or(outer.underline),
            inverse: self.inverse.or(outer.inverse),
            strikethrough: self.strikethrough.or(outer.strikethrough),
        }
    }

    /// Apply onto a node-level cell style.
    pub fn apply(&self, base: CellStyle) -> CellStyle {
        let mut attrs = base.attrs;
        for (flag, value) in [
            (CellAttrs::BOLD, self.bold),
            (CellAttrs::DIM, self.dim),
            (CellAttrs::ITALIC, self.italic),
            (CellAttrs::UNDERLINE, self.underline),
            (CellAttrs::INVERSE, self.inverse),
            (CellAttrs::STRIKETHROUGH, self.strikethrough),
        ] {
            if let Some(on) = value {
                attrs.set(flag, on);
            }
        }
        CellStyle {
            fg: self.color.filter(|c| !c.is_default()).unwrap_or(base.fg),
            bg: self
                .background_color
                .filter(|c| !c.is_default())
                .unwrap_or(base.bg),
            attrs,
        }
    }
}

/// A run of text with optional nested children. Children follow the span's
/// own text in reading order.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct TextSpan {
    pub text: String,
    pub style: SpanStyle,
    pub children: Vec<TextSpan>,
}

impl TextSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn styled(text: impl Into<String>, style: SpanStyle) -> Self {
        Self {
            text: text.into(),
            style,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<TextSpan>) -> Self {
        self.children = children;
        self
    }
}

/// Payload of a text leaf.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextContent {
    pub spans: Vec<TextSpan>,
}

impl TextContent {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            spans: vec![TextSpan::plain(text)],
        }
    }

    /// Flatten nested spans into (text, effective span style) segments in
    /// reading order. Empty segments are dropped.
    pub fn flatten(&self) -> Vec<(&str, SpanStyle)> {
        let mut out = Vec::new();
        for span in &self.spans {
            flatten_into(span, SpanStyle::default(), &mut out);
        }
        out
    }

    /// The raw concatenated text, escapes included.
    pub fn raw_text(&self) -> String {
        self.flatten().into_iter().map(|(t, _)| t).collect()
    }

    /// Concatenated visible text with escapes and controls removed.
    pub fn plain_text(&self) -> String {
        strip_ansi(&self.raw_text()).into_owned()
    }
}

fn flatten_into<'a>(span: &'a TextSpan, outer: SpanStyle, out: &mut Vec<(&'a str, SpanStyle)>) {
    let style = span.style.over(outer);
    if !span.text.is_empty() {
        out.push((span.text.as_str(), style));
    }
    for child in &span.children {
        flatten_into(child, style, out);
    }
}

/// Editable state of an input leaf.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputState {
    pub value: String,
    pub placeholder: String,
    /// Replacement glyph shown for every grapheme of the value (passwords).
    pub mask: Option<char>,
    pub multiline: bool,
}

impl InputState {
    /// The text shown in place of the value.
    pub fn display_value(&self) -> String {
        let value = strip_ansi(&self.value);
        match self.mask {
            Some(m) => value
                .graphemes(true)
                .map(|g| if g == "\n" { '\n' } else { m })
                .collect(),
            None => value.into_owned(),
        }
    }
}

// ============================================================================
// Wrapping
// ============================================================================

/// One unit of wrappable content: a grapheme's display width and whether it
/// is whitespace.
pub(crate) trait WrapUnit {
    fn width(&self) -> usize;
    fn is_space(&self) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Measured {
    pub width: usize,
    pub space: bool,
}

impl WrapUnit for Measured {
    fn width(&self) -> usize {
        self.width
    }
    fn is_space(&self) -> bool {
        self.space
    }
}

pub(crate) fn measured_units(line: &str) -> Vec<Measured> {
    line.graphemes(true)
        .map(|g| Measured {
            width: grapheme_width(g),
            space: g.chars().all(char::is_whitespace),
        })
        .collect()
}

/// A visual line: a range of units from one logical line, plus whether an
/// ellipsis glyph follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VisualLine {
    pub start: usize,
    pub end: usize,
    pub ellipsis: bool,
}

impl VisualLine {
    fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            ellipsis: false,
        }
    }

    pub fn width<T: WrapUnit>(&self, units: &[T]) -> usize {
        units[self.start..self.end].iter().map(WrapUnit::width).sum::<usize>()
            + usize::from(self.ellipsis)
    }
}

/// Wrap one logical line (no `\n` inside) to `max_width` cells.
///
/// Always returns at least one visual line, possibly empty.
pub(crate) fn wrap_line<T: WrapUnit>(units: &[T], max_width: usize, mode: WrapMode) -> Vec<VisualLine> {
    let max_width = max_width.max(1);
    match mode {
        WrapMode::Wrap => wrap_words(units, max_width),
        WrapMode::Char => wrap_chars(units, max_width),
        WrapMode::Truncate => vec![truncate(units, max_width, false)],
        WrapMode::Ellipsis => vec![truncate(units, max_width, true)],
        WrapMode::None => vec![VisualLine::new(0, units.len())],
    }
}

fn wrap_chars<T: WrapUnit>(units: &[T], max_width: usize) -> Vec<VisualLine> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut width = 0;
    for (i, u) in units.iter().enumerate() {
        if width + u.width() > max_width && i > start {
            lines.push(VisualLine::new(start, i));
            start = i;
            width = 0;
        }
        width += u.width();
    }
    lines.push(VisualLine::new(start, units.len()));
    lines
}

/// Word wrap: break between whitespace runs, trimming trailing whitespace on
/// broken lines and skipping leading whitespace on continuation lines. A word
/// wider than the line is force-broken at grapheme boundaries.
fn wrap_words<T: WrapUnit>(units: &[T], max_width: usize) -> Vec<VisualLine> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut width = 0;
    let mut i = 0;

    while i < units.len() {
        let space = units[i].is_space();
        let mut seg_end = i;
        let mut seg_width = 0;
        while seg_end < units.len() && units[seg_end].is_space() == space {
            seg_width += units[seg_end].width();
            seg_end += 1;
        }

        if width + seg_width > max_width {
            if width > 0 || i > start {
                lines.push(trim_trailing(units, start, i));
                start = i;
                width = 0;
            }
            if space {
                // Whitespace at a break is dropped.
                start = seg_end;
                i = seg_end;
                continue;
            }
            if seg_width > max_width {
                for j in i..seg_end {
                    let w = units[j].width();
                    if width + w > max_width && j > start {
                        lines.push(VisualLine::new(start, j));
                        start = j;
                        width = 0;
                    }
                    width += w;
                }
                i = seg_end;
                continue;
            }
        }

        width += seg_width;
        i = seg_end;
    }

    lines.push(VisualLine::new(start.min(units.len()), units.len()));
    lines
}

fn trim_trailing<T: WrapUnit>(units: &[T], start: usize, mut end: usize) -> VisualLine {
    while end > start && units[end - 1].is_space() {
        end -= 1;
    }
    VisualLine::new(start, end)
}

fn truncate<T: WrapUnit>(units: &[T], max_width: usize, ellipsis: bool) -> VisualLine {
    let total: usize = units.iter().map(WrapUnit::width).sum();
    if total <= max_width {
        return VisualLine::new(0, units.len());
    }
    let budget = if ellipsis { max_width - 1 } else { max_width };
    let mut width = 0;
    let mut end = 0;
    while end < units.len() && width + units[end].width() <= budget {
        width += units[end].width();
        end += 1;
    }
    VisualLine {
        start: 0,
        end,
        ellipsis,
    }
}

/// Column offset of a line of `line_width` cells inside `box_width` cells.
pub(crate) fn align_offset(align: TextAlign, line_width: usize, box_width: usize) -> usize {
    let free = box_width.saturating_sub(line_width);
    match align {
        TextAlign::Left => 0,
        TextAlign::Center => free / 2,
        TextAlign::Right => free,
    }
}

// ============================================================================
// Measurement
// ============================================================================

/// Horizontal space offered by the layout engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AvailableWidth {
    Definite(f32),
    MinContent,
    MaxContent,
}

/// Width of each logical line.
fn line_widths(text: &str) -> impl Iterator<Item = usize> + '_ {
    text.split('\n').map(str_width)
}

/// Wrapped (width, height) of `text` at `max_width`.
fn wrapped_size(text: &str, max_width: usize, mode: WrapMode) -> (usize, usize) {
    let mut width = 0;
    let mut height = 0;
    for line in text.split('\n') {
        let units = measured_units(line);
        for visual in wrap_line(&units, max_width, mode) {
            width = width.max(visual.width(&units));
            height += 1;
        }
    }
    (width, height)
}

/// Intrinsic size of plain text in cells under `mode`.
///
/// Empty text measures (0, 0). A non-positive definite width is treated as
/// one cell rather than failing.
pub fn measure_text(text: &str, mode: WrapMode, available: AvailableWidth) -> (f32, f32) {
    if text.is_empty() {
        return (0.0, 0.0);
    }
    let natural = line_widths(text).max().unwrap_or(0);

    let max_width = match available {
        AvailableWidth::Definite(w) => (w.floor() as i64).max(1) as usize,
        AvailableWidth::MaxContent => natural.max(1),
        AvailableWidth::MinContent => match mode {
            WrapMode::Wrap => longest_word(text).max(1),
            WrapMode::Char => widest_grapheme(text).max(1),
            WrapMode::Truncate | WrapMode::Ellipsis => 1,
            WrapMode::None => natural.max(1),
        },
    };

    let (w, h) = wrapped_size(text, max_width, mode);
    let w = match mode {
        // Unwrapped text keeps its natural width; painting clips it.
        WrapMode::None => w.min(max_width),
        _ => w.min(max_width.max(widest_grapheme(text))),
    };
    (w as f32, h as f32)
}

/// Intrinsic size of an input leaf. Always at least one cell; single-line
/// inputs reserve one column past the text for the cursor.
pub fn measure_input(display: &str, multiline: bool, available: AvailableWidth) -> (f32, f32) {
    if !multiline {
        // Painted on one row with line breaks shown as spaces.
        return ((str_width(&display.replace('\n', " ")) + 1) as f32, 1.0);
    }
    let natural = line_widths(display).max().unwrap_or(0) + 1;
    let max_width = match available {
        AvailableWidth::Definite(w) => (w.floor() as i64).max(1) as usize,
        AvailableWidth::MaxContent => natural,
        AvailableWidth::MinContent => 1,
    };
    let (w, h) = wrapped_size(display, max_width, WrapMode::Char);
    ((w + 1).min(max_width).max(1) as f32, h.max(1) as f32)
}

fn longest_word(text: &str) -> usize {
    text.split(char::is_whitespace).map(str_width).max().unwrap_or(0)
}

fn widest_grapheme(text: &str) -> usize {
    text.graphemes(true).map(grapheme_width).max().unwrap_or(0)
}
