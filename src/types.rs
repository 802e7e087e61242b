//! Shared types, enums, and constants.
//!
//! All types that cross module boundaries (node identity, colors, cells,
//! the framebuffer, layout rectangles) live here.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Deserializer};
use tracing::warn;

// ============================================================================
// Node Identity
// ============================================================================

/// Generational handle into the node arena.
///
/// A slot index is recycled after removal, the generation is not: a handle
/// kept past its node's removal fails every lookup instead of aliasing a
/// newer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

// ============================================================================
// Color
// ============================================================================

/// A terminal color.
///
/// `Default` means "no override": the terminal default for the root, and
/// inherit-from-parent everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    #[default]
    Default,
    /// One of the 16 named colors (0-7 normal, 8-15 bright).
    Ansi(u8),
    /// 256-color palette index.
    Indexed(u8),
    Rgb(u8, u8, u8),
}

const NAMED_COLORS: [(&str, u8); 18] = [
    ("black", 0),
    ("red", 1),
    ("green", 2),
    ("yellow", 3),
    ("blue", 4),
    ("magenta", 5),
    ("cyan", 6),
    ("white", 7),
    ("gray", 8),
    ("grey", 8),
    ("brightblack", 8),
    ("brightred", 9),
    ("brightgreen", 10),
    ("brightyellow", 11),
    ("brightblue", 12),
    ("brightmagenta", 13),
    ("brightcyan", 14),
    ("brightwhite", 15),
];

impl Color {
    /// Parse a color description. Unrecognized input yields `Color::Default`.
    ///
    /// Accepts named colors (`red`, `bright-blue`, `grey`), `#rgb`,
    /// `#rrggbb`, `rgb(r, g, b)` and `ansi256(n)`.
    pub fn parse(input: &str) -> Color {
        Self::try_parse(input).unwrap_or_else(|| {
            warn!(color = input, "unrecognized color, using terminal default");
            Color::Default
        })
    }

    fn try_parse(input: &str) -> Option<Color> {
        let s = input.trim().to_ascii_lowercase();
        if s.is_empty() || s == "default" || s == "inherit" {
            return Some(Color::Default);
        }

        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }

        if let Some(args) = s.strip_prefix("rgb(").and_then(|r| r.strip_suffix(')')) {
            let parts: Vec<u8> = args
                .split(',')
                .map(|p| p.trim().parse::<u8>())
                .collect::<Result<_, _>>()
                .ok()?;
            if let [r, g, b] = parts[..] {
                return Some(Color::Rgb(r, g, b));
            }
            return None;
        }

        if let Some(arg) = s.strip_prefix("ansi256(").and_then(|r| r.strip_suffix(')')) {
            return arg.trim().parse::<u8>().ok().map(Color::Indexed);
        }

        let compact: String = s.chars().filter(|c| *c != '-' && *c != '_').collect();
        NAMED_COLORS
            .iter()
            .find(|(name, _)| *name == compact)
            .map(|(_, idx)| Color::Ansi(*idx))
    }

    pub fn is_default(self) -> bool {
        self == Color::Default
    }

    /// Foreground SGR parameters (without the CSI prefix or final `m`).
    pub(crate) fn fg_sgr(self) -> String {
        match self {
            Color::Default => "39".to_string(),
            Color::Ansi(n) if n < 8 => format!("{}", 30 + n),
            Color::Ansi(n) => format!("{}", 90 + (n & 7)),
            other => crossterm::style::Colored::ForegroundColor(other.to_crossterm()).to_string(),
        }
    }

    /// Background SGR parameters.
    pub(crate) fn bg_sgr(self) -> String {
        match self {
            Color::Default => "49".to_string(),
            Color::Ansi(n) if n < 8 => format!("{}", 40 + n),
            Color::Ansi(n) => format!("{}", 100 + (n & 7)),
            other => crossterm::style::Colored::BackgroundColor(other.to_crossterm()).to_string(),
        }
    }

    pub fn to_crossterm(self) -> crossterm::style::Color {
        use crossterm::style::Color as C;
        match self {
            Color::Default => C::Reset,
            Color::Ansi(n) | Color::Indexed(n) => C::AnsiValue(n),
            Color::Rgb(r, g, b) => C::Rgb { r, g, b },
        }
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    let nibble = |c: char| c.to_digit(16).map(|d| d as u8);
    let chars: Vec<char> = hex.chars().collect();
    match chars.len() {
        3 => {
            let r = nibble(chars[0])?;
            let g = nibble(chars[1])?;
            let b = nibble(chars[2])?;
            Some(Color::Rgb(r * 17, g * 17, b * 17))
        }
        6 => {
            let byte = |i: usize| Some(nibble(chars[i])? * 16 + nibble(chars[i + 1])?);
            Some(Color::Rgb(byte(0)?, byte(2)?, byte(4)?))
        }
        _ => None,
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Name(String),
            Index(u8),
            Other(serde_json::Value),
        }

        // Color faults never surface: anything unrecognized is "unset".
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Name(s) => Color::parse(&s),
            Raw::Index(n) => Color::Indexed(n),
            Raw::Other(_) => Color::Default,
        })
    }
}

// ============================================================================
// Border Style
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BorderStyle {
    #[default]
    None,
    Single,
    Double,
    #[serde(alias = "round")]
    Rounded,
    Bold,
    Classic,
}

impl BorderStyle {
    /// Returns the border characters: (top-left, top-right, bottom-left, bottom-right, horizontal, vertical)
    pub fn chars(self) -> Option<(char, char, char, char, char, char)> {
        match self {
            Self::None => None,
            Self::Single => Some(('┌', '┐', '└', '┘', '─', '│')),
            Self::Double => Some(('╔', '╗', '╚', '╝', '═', '║')),
            Self::Rounded => Some(('╭', '╮', '╰', '╯', '─', '│')),
            Self::Bold => Some(('┏', '┓', '┗', '┛', '━', '┃')),
            Self::Classic => Some(('+', '+', '+', '+', '-', '|')),
        }
    }

    /// Cells consumed per side.
    pub fn width(self) -> i32 {
        if self == Self::None {
            0
        } else {
            1
        }
    }
}

// ============================================================================
// Cell Attributes (bitflags)
// ============================================================================

bitflags! {
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CellAttrs: u8 {
        const BOLD          = 0b0000_0001;
        const DIM           = 0b0000_0010;
        const ITALIC        = 0b0000_0100;
        const UNDERLINE     = 0b0000_1000;
        const INVERSE       = 0b0001_0000;
        const STRIKETHROUGH = 0b0010_0000;
    }
}

impl CellAttrs {
    /// SGR parameter for each attribute, in emission order.
    pub(crate) const SGR: [(CellAttrs, &'static str); 6] = [
        (CellAttrs::BOLD, "1"),
        (CellAttrs::DIM, "2"),
        (CellAttrs::ITALIC, "3"),
        (CellAttrs::UNDERLINE, "4"),
        (CellAttrs::INVERSE, "7"),
        (CellAttrs::STRIKETHROUGH, "9"),
    ];
}

// ============================================================================
// Cell & Buffer
// ============================================================================

/// What a cell displays.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Glyph {
    Char(char),
    /// A grapheme cluster of more than one code point (emoji sequences,
    /// combining marks).
    Cluster(Box<str>),
    /// Slot consumed by the wide glyph to its left. Never written on its own.
    Continuation,
}

impl Default for Glyph {
    fn default() -> Self {
        Glyph::Char(' ')
    }
}

impl Glyph {
    pub fn from_grapheme(g: &str) -> Glyph {
        let mut chars = g.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Glyph::Char(c),
            (None, _) => Glyph::Char(' '),
            _ => Glyph::Cluster(g.into()),
        }
    }
}

/// The visual style carried by a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CellStyle {
    pub fg: Color,
    pub bg: Color,
    pub attrs: CellAttrs,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Cell {
    pub glyph: Glyph,
    pub style: CellStyle,
}

impl Cell {
    pub fn new(glyph: Glyph, style: CellStyle) -> Self {
        Self { glyph, style }
    }

    /// A blank cell carrying only a background.
    pub fn blank(bg: Color) -> Self {
        Self {
            glyph: Glyph::Char(' '),
            style: CellStyle {
                bg,
                ..CellStyle::default()
            },
        }
    }

    pub fn is_continuation(&self) -> bool {
        self.glyph == Glyph::Continuation
    }

    /// True for the cell a cleared screen already shows.
    pub fn is_default_blank(&self) -> bool {
        self.glyph == Glyph::Char(' ') && self.style == CellStyle::default()
    }
}

/// A fixed-size character grid, one cell per terminal column × row.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    pub width: u16,
    pub height: u16,
    pub cells: Vec<Cell>,
}

impl Buffer {
    pub fn new(width: u16, height: u16) -> Self {
        let size = (width as usize) * (height as usize);
        Self {
            width,
            height,
            cells: vec![Cell::default(); size],
        }
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        let size = (width as usize) * (height as usize);
        self.cells.resize(size, Cell::default());
        self.clear();
    }

    pub fn clear(&mut self) {
        self.cells.fill(Cell::blank(Color::Default));
    }

    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if x < self.width && y < self.height {
            Some(&self.cells[(y as usize) * (self.width as usize) + (x as usize)])
        } else {
            None
        }
    }

    pub fn set(&mut self, x: u16, y: u16, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[(y as usize) * (self.width as usize) + (x as usize)] = cell;
        }
    }

    /// Copy another buffer's contents into this one, reusing the allocation.
    pub fn copy_from(&mut self, other: &Buffer) {
        self.width = other.width;
        self.height = other.height;
        self.cells.clone_from(&other.cells);
    }

    /// Row `y` rendered as plain text, continuation cells omitted.
    pub fn row_text(&self, y: u16) -> String {
        let mut out = String::new();
        for x in 0..self.width {
            if let Some(cell) = self.get(x, y) {
                match &cell.glyph {
                    Glyph::Char(c) => out.push(*c),
                    Glyph::Cluster(s) => out.push_str(s),
                    Glyph::Continuation => {}
                }
            }
        }
        out
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Axis-aligned rectangle in absolute screen cells. Width and height are
/// never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width: width.max(0),
            height: height.max(0),
        }
    }

    pub fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn right(self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(self) -> i32 {
        self.y + self.height
    }

    /// Intersect with another rect, producing the tighter bound.
    pub fn intersect(self, other: Rect) -> Rect {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        Rect::new(x1, y1, x2 - x1, y2 - y1)
    }

    pub fn intersects(self, other: Rect) -> bool {
        !self.intersect(other).is_empty()
    }

    pub fn contains(self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// Last-known absolute placement of a node: outer box plus the content box
/// left after border and padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutRect {
    pub outer: Rect,
    pub inner: Rect,
}

// ============================================================================
// Cursor
// ============================================================================

/// Requested hardware cursor state at the end of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorState {
    /// `None` hides the cursor.
    pub position: Option<(u16, u16)>,
    pub color: Option<Color>,
}

impl CursorState {
    pub fn hidden() -> Self {
        Self::default()
    }

    pub fn visible(&self) -> bool {
        self.position.is_some()
    }
}
