//! Diff Module — Framebuffer comparison and escape-sequence encoding.
//!
//! Responsibilities:
//! - Compare the painted buffer against the buffer believed on screen
//! - Emit cursor moves, SGR runs, and glyphs for changed cells only
//! - Track a virtual cursor so adjacent writes need no reposition
//! - Bracket each frame in a synchronized update and manage the hardware
//!   cursor (visibility, position, OSC 12 color)

use std::fmt;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::terminal::{
    BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap, EndSynchronizedUpdate,
};
use crossterm::Command;

use crate::text_utils::grapheme_width;
use crate::types::{Buffer, Cell, CellAttrs, CellStyle, Color, CursorState, Glyph};

// ============================================================================
// OutputBuffer
// ============================================================================

/// Accumulates one frame's bytes for a single backend write. Capacity is
/// kept between frames.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    data: Vec<u8>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::with_capacity(16384)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Reset the length, keeping the allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
    }

    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Append a crossterm command's ANSI encoding.
    fn command(&mut self, command: impl Command) {
        // Writes go to memory and cannot fail.
        command.write_ansi(self).ok();
    }

    fn glyph(&mut self, glyph: &Glyph) {
        match glyph {
            Glyph::Char(c) => {
                let mut buf = [0u8; 4];
                self.write_bytes(c.encode_utf8(&mut buf).as_bytes());
            }
            Glyph::Cluster(s) => self.write_bytes(s.as_bytes()),
            Glyph::Continuation => {}
        }
    }
}

impl fmt::Write for OutputBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.data.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

// ============================================================================
// DiffEngine
// ============================================================================

/// Byte and move counts of the last diffed frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub bytes: usize,
    pub cells: usize,
    pub moves: usize,
}

/// Turns buffer changes into terminal output. Remembers the cursor state it
/// last left the terminal in.
#[derive(Debug)]
pub struct DiffEngine {
    out: OutputBuffer,
    last_cursor: CursorState,
    stats: DiffStats,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffEngine {
    pub fn new() -> Self {
        Self {
            out: OutputBuffer::new(),
            last_cursor: CursorState::hidden(),
            stats: DiffStats::default(),
        }
    }

    pub fn stats(&self) -> DiffStats {
        self.stats
    }

    /// Encode the changes from `previous` to `current`, then make `previous`
    /// a copy of `current`.
    ///
    /// Returns an empty slice when nothing changed and the cursor request
    /// matches what the terminal already shows.
    pub fn diff(&mut self, previous: &mut Buffer, current: &Buffer, full_redraw: bool, cursor: CursorState) -> &[u8] {
        self.out.clear();
        self.stats = DiffStats::default();

        let full = full_redraw || previous.width != current.width || previous.height != current.height;
        // The color only matters while the cursor is shown.
        let cursor_changed = cursor.position != self.last_cursor.position
            || (cursor.visible() && cursor.color != self.last_cursor.color);
        if !full && !cursor_changed && previous.cells == current.cells {
            return self.out.as_bytes();
        }

        self.out.command(BeginSynchronizedUpdate);
        if self.last_cursor.visible() {
            self.out.command(Hide);
        }

        let mut vcur: Option<(u16, u16)> = None;
        if full {
            // Reset any scroll region before clearing.
            self.out.write_bytes(b"\x1b[r");
            self.out.command(Clear(ClearType::All));
            self.out.command(MoveTo(0, 0));
            vcur = Some((0, 0));
        }
        self.out.command(DisableLineWrap);

        let mut last_style: Option<CellStyle> = None;
        for y in 0..current.height {
            for x in 0..current.width {
                let Some(cell) = current.get(x, y) else {
                    continue;
                };
                if cell.is_continuation() {
                    continue;
                }
                let skip = if full {
                    cell.is_default_blank()
                } else {
                    previous.get(x, y) == Some(cell)
                };
                if skip {
                    continue;
                }

                if vcur != Some((x, y)) {
                    self.out.command(MoveTo(x, y));
                    self.stats.moves += 1;
                }
                if last_style != Some(cell.style) {
                    write_sgr(&mut self.out, cell.style);
                    last_style = Some(cell.style);
                }
                self.out.glyph(&cell.glyph);
                self.stats.cells += 1;
                vcur = Some((x.saturating_add(cell_width(cell)), y));
            }
        }

        self.out.command(EnableLineWrap);
        if last_style.is_some() {
            self.out.write_bytes(b"\x1b[0m");
        }

        if let Some((x, y)) = cursor.position {
            self.out.command(MoveTo(x, y));
            if cursor.color != self.last_cursor.color {
                write_cursor_color(&mut self.out, cursor.color);
            }
            self.out.command(Show);
            self.last_cursor = cursor;
        } else {
            self.last_cursor.position = None;
        }
        self.out.command(EndSynchronizedUpdate);

        previous.copy_from(current);
        self.stats.bytes = self.out.len();
        self.out.as_bytes()
    }
}

/// Display width the terminal advances by after writing `cell`.
fn cell_width(cell: &Cell) -> u16 {
    let width = match &cell.glyph {
        Glyph::Char(c) => {
            let mut buf = [0u8; 4];
            grapheme_width(c.encode_utf8(&mut buf))
        }
        Glyph::Cluster(s) => grapheme_width(s),
        Glyph::Continuation => 0,
    };
    width.max(1) as u16
}

/// Full SGR for a style: reset, then attributes and non-default colors.
fn write_sgr(out: &mut OutputBuffer, style: CellStyle) {
    let mut params = String::from("0");
    for (flag, code) in CellAttrs::SGR {
        if style.attrs.contains(flag) {
            params.push(';');
            params.push_str(code);
        }
    }
    if !style.fg.is_default() {
        params.push(';');
        params.push_str(&style.fg.fg_sgr());
    }
    if !style.bg.is_default() {
        params.push(';');
        params.push_str(&style.bg.bg_sgr());
    }
    out.write_bytes(b"\x1b[");
    out.write_bytes(params.as_bytes());
    out.write_bytes(b"m");
}

/// OSC 12 sets the cursor color; OSC 112 restores the terminal default.
fn write_cursor_color(out: &mut OutputBuffer, color: Option<Color>) {
    match color.and_then(osc_color_spec) {
        Some(spec) => {
            out.write_bytes(b"\x1b]12;");
            out.write_bytes(spec.as_bytes());
            out.write_bytes(b"\x07");
        }
        None => out.write_bytes(b"\x1b]112\x07"),
    }
}

/// Standard xterm values for the 16 named colors.
const ANSI_RGB: [(u8, u8, u8); 16] = [
    (0, 0, 0),
    (205, 0, 0),
    (0, 205, 0),
    (205, 205, 0),
    (0, 0, 238),
    (205, 0, 205),
    (0, 205, 205),
    (229, 229, 229),
    (127, 127, 127),
    (255, 0, 0),
    (0, 255, 0),
    (255, 255, 0),
    (92, 92, 255),
    (255, 0, 255),
    (0, 255, 255),
    (255, 255, 255),
];

fn palette_rgb(index: u8) -> (u8, u8, u8) {
    match index {
        0..=15 => ANSI_RGB[index as usize],
        16..=231 => {
            let i = index - 16;
            let level = |v: u8| if v == 0 { 0 } else { 55 + v * 40 };
            (level(i / 36), level((i / 6) % 6), level(i % 6))
        }
        _ => {
            let v = 8 + (index - 232) * 10;
            (v, v, v)
        }
    }
}

fn osc_color_spec(color: Color) -> Option<String> {
    let (r, g, b) = match color {
        Color::Default => return None,
        Color::Ansi(n) | Color::Indexed(n) => palette_rgb(n),
        Color::Rgb(r, g, b) => (r, g, b),
    };
    Some(format!("#{r:02x}{g:02x}{b:02x}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &[u8]) -> String {
        String::from_utf8_lossy(s).into_owned()
    }

    /// Number of absolute cursor moves (`CSI row;col H`) in `s`.
    fn count_moves(s: &str) -> usize {
        let bytes = s.as_bytes();
        let mut count = 0;
        let mut i = 0;
        while i + 1 < bytes.len() {
            if bytes[i] == 0x1b && bytes[i + 1] == b'[' {
                let mut j = i + 2;
                while j < bytes.len() && (bytes[j].is_ascii_digit() || bytes[j] == b';') {
                    j += 1;
                }
                if j < bytes.len() && bytes[j] == b'H' {
                    count += 1;
                }
                i = j;
            } else {
                i += 1;
            }
        }
        count
    }

    fn put(buf: &mut Buffer, x: u16, y: u16, c: char) {
        buf.set(x, y, Cell::new(Glyph::Char(c), CellStyle::default()));
    }

    #[test]
    fn test_unchanged_frame_is_empty() {
        let mut engine = DiffEngine::new();
        let mut previous = Buffer::new(10, 3);
        let mut current = Buffer::new(10, 3);
        put(&mut current, 0, 0, 'a');
        assert!(!engine.diff(&mut previous, &current, false, CursorState::hidden()).is_empty());
        assert!(engine.diff(&mut previous, &current, false, CursorState::hidden()).is_empty());
        assert_eq!(previous, current);
    }

    #[test]
    fn test_adjacent_changes_share_one_move() {
        let mut engine = DiffEngine::new();
        let mut previous = Buffer::new(20, 2);
        let mut current = Buffer::new(20, 2);
        for (i, c) in "abc".chars().enumerate() {
            put(&mut current, 2 + i as u16, 0, c);
        }
        put(&mut current, 10, 0, 'x');
        put(&mut current, 0, 1, 'y');
        let out = text(engine.diff(&mut previous, &current, false, CursorState::hidden()));
        assert_eq!(count_moves(&out), 3);
        assert_eq!(engine.stats().moves, 3);
        assert_eq!(engine.stats().cells, 5);
    }

    #[test]
    fn test_wide_glyph_advances_virtual_cursor() {
        let mut engine = DiffEngine::new();
        let mut previous = Buffer::new(10, 1);
        let mut current = Buffer::new(10, 1);
        current.set(0, 0, Cell::new(Glyph::Char('世'), CellStyle::default()));
        current.set(1, 0, Cell::new(Glyph::Continuation, CellStyle::default()));
        put(&mut current, 2, 0, 'x');
        let out = text(engine.diff(&mut previous, &current, false, CursorState::hidden()));
        assert_eq!(count_moves(&out), 1);
        assert!(out.contains("世x"));
    }

    #[test]
    fn test_full_redraw_clears_then_skips_blanks() {
        let mut engine = DiffEngine::new();
        let mut previous = Buffer::new(4, 2);
        let mut current = Buffer::new(4, 2);
        put(&mut current, 1, 1, 'z');
        let out = text(engine.diff(&mut previous, &current, true, CursorState::hidden()));
        let sync = "\x1b[?2026h";
        assert!(out.starts_with(sync));
        assert!(out[sync.len()..].starts_with("\x1b[r\x1b[2J\x1b[1;1H"));
        assert_eq!(out.matches('z').count(), 1);
        assert_eq!(engine.stats().cells, 1);
    }

    #[test]
    fn test_sgr_emitted_only_on_style_change() {
        let mut engine = DiffEngine::new();
        let mut previous = Buffer::new(6, 1);
        let mut current = Buffer::new(6, 1);
        let red = CellStyle {
            fg: Color::Ansi(1),
            bg: Color::Default,
            attrs: CellAttrs::BOLD,
        };
        for x in 0..3 {
            current.set(x, 0, Cell::new(Glyph::Char('r'), red));
        }
        let out = text(engine.diff(&mut previous, &current, false, CursorState::hidden()));
        assert_eq!(out.matches("\x1b[0;1;31m").count(), 1);
        assert!(out.contains("rrr"));
        assert!(out.contains("\x1b[0m"));
    }

    #[test]
    fn test_cursor_only_change_emits_frame() {
        let mut engine = DiffEngine::new();
        let mut previous = Buffer::new(5, 1);
        let current = Buffer::new(5, 1);
        let shown = CursorState {
            position: Some((2, 0)),
            color: Some(Color::Rgb(255, 0, 0)),
        };
        let out = text(engine.diff(&mut previous, &current, false, shown));
        assert!(out.contains("\x1b[1;3H"));
        assert!(out.contains("\x1b]12;#ff0000\x07"));
        assert!(out.contains("\x1b[?25h"));

        // Same request again: nothing to do.
        assert!(engine.diff(&mut previous, &current, false, shown).is_empty());

        // Moving the cursor hides it first, and the color is not re-sent.
        let moved = CursorState {
            position: Some((3, 0)),
            ..shown
        };
        let out = text(engine.diff(&mut previous, &current, false, moved));
        assert!(out.contains("\x1b[?25l"));
        assert!(!out.contains("\x1b]12;"));
    }

    #[test]
    fn test_palette_rgb() {
        assert_eq!(palette_rgb(1), (205, 0, 0));
        assert_eq!(palette_rgb(16), (0, 0, 0));
        assert_eq!(palette_rgb(231), (255, 255, 255));
        assert_eq!(palette_rgb(232), (8, 8, 8));
    }

    #[test]
    fn test_output_buffer_keeps_capacity() {
        let mut out = OutputBuffer::with_capacity(4);
        out.write_bytes(&[b'x'; 64]);
        let grown = out.capacity();
        out.clear();
        assert!(out.is_empty());
        assert_eq!(out.capacity(), grown);
    }
}
