//! Inline terminal escape handling for literal text content.
//!
//! Text handed to the renderer may carry raw escape sequences. SGR (`ESC [ … m`)
//! sequences become style overrides on the text that follows them; every
//! other sequence is removed so it never reaches the framebuffer. Handles:
//! - CSI sequences: `ESC [` ... final byte (0x40-0x7E)
//! - OSC sequences: `ESC ]` ... BEL (0x07) or ST (ESC \)
//! - DCS/PM/APC sequences: `ESC P`/`ESC ^`/`ESC _` ... ST
//! - Two-character sequences: `ESC` + single char

use std::borrow::Cow;

use crate::types::{CellAttrs, CellStyle, Color};

/// Style overrides accumulated from SGR sequences. Unset fields fall through
/// to the structural style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SgrState {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub set: CellAttrs,
    pub cleared: CellAttrs,
}

impl SgrState {
    /// Merge onto a structural style. The escape wins.
    pub fn apply(&self, base: CellStyle) -> CellStyle {
        CellStyle {
            fg: self.fg.unwrap_or(base.fg),
            bg: self.bg.unwrap_or(base.bg),
            attrs: (base.attrs - self.cleared) | self.set,
        }
    }

    fn turn_on(&mut self, attrs: CellAttrs) {
        self.set |= attrs;
        self.cleared -= attrs;
    }

    fn turn_off(&mut self, attrs: CellAttrs) {
        self.cleared |= attrs;
        self.set -= attrs;
    }

    /// Apply one SGR parameter list (the bytes between `ESC [` and `m`).
    fn apply_params(&mut self, params: &str) {
        if params.is_empty() {
            *self = SgrState::default();
            return;
        }
        let codes: Vec<u16> = params
            .split([';', ':'])
            .map(|p| p.parse::<u16>().unwrap_or(0))
            .collect();

        let mut i = 0;
        while i < codes.len() {
            match codes[i] {
                0 => *self = SgrState::default(),
                1 => self.turn_on(CellAttrs::BOLD),
                2 => self.turn_on(CellAttrs::DIM),
                3 => self.turn_on(CellAttrs::ITALIC),
                4 => self.turn_on(CellAttrs::UNDERLINE),
                7 => self.turn_on(CellAttrs::INVERSE),
                9 => self.turn_on(CellAttrs::STRIKETHROUGH),
                22 => self.turn_off(CellAttrs::BOLD | CellAttrs::DIM),
                23 => self.turn_off(CellAttrs::ITALIC),
                24 => self.turn_off(CellAttrs::UNDERLINE),
                27 => self.turn_off(CellAttrs::INVERSE),
                29 => self.turn_off(CellAttrs::STRIKETHROUGH),
                c @ 30..=37 => self.fg = Some(Color::Ansi((c - 30) as u8)),
                c @ 90..=97 => self.fg = Some(Color::Ansi((c - 90 + 8) as u8)),
                c @ 40..=47 => self.bg = Some(Color::Ansi((c - 40) as u8)),
                c @ 100..=107 => self.bg = Some(Color::Ansi((c - 100 + 8) as u8)),
                39 => self.fg = None,
                49 => self.bg = None,
                38 | 48 => {
                    let (color, used) = extended_color(&codes[i + 1..]);
                    if let Some(color) = color {
                        if codes[i] == 38 {
                            self.fg = Some(color);
                        } else {
                            self.bg = Some(color);
                        }
                    }
                    i += used;
                }
                _ => {}
            }
            i += 1;
        }
    }
}

/// Decode the tail of a `38`/`48` parameter. Returns the color and how many
/// parameters it consumed.
fn extended_color(rest: &[u16]) -> (Option<Color>, usize) {
    match rest {
        [5, n, ..] => (u8::try_from(*n).ok().map(Color::Indexed), 2),
        [2, r, g, b, ..] => {
            let rgb = (u8::try_from(*r), u8::try_from(*g), u8::try_from(*b));
            match rgb {
                (Ok(r), Ok(g), Ok(b)) => (Some(Color::Rgb(r, g, b)), 4),
                _ => (None, 4),
            }
        }
        [5] | [2, ..] => (None, rest.len()),
        _ => (None, 0),
    }
}

/// A run of plain text sharing one set of escape overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledRun {
    pub text: String,
    pub sgr: SgrState,
}

/// Split `s` into runs, interpreting SGR sequences and dropping every other
/// escape and control character. Tabs become a single space; newlines are
/// kept for the line splitter.
///
/// `initial` carries escape state in from a preceding segment.
pub fn parse_styled(s: &str, initial: SgrState) -> (Vec<StyledRun>, SgrState) {
    let mut runs: Vec<StyledRun> = Vec::new();
    let mut state = initial;
    let bytes = s.as_bytes();
    let len = bytes.len();
    let mut i = 0;

    while i < len {
        if bytes[i] == 0x1B {
            let end = skip_escape_sequence(bytes, i);
            if let Some(params) = sgr_params(s, i, end) {
                state.apply_params(params);
            }
            i = end;
        } else {
            // ESC is single-byte ASCII, so slicing at ESC positions never
            // splits a UTF-8 sequence.
            let start = i;
            while i < len && bytes[i] != 0x1B {
                i += 1;
            }
            let text = sanitize_controls(&s[start..i]);
            if text.is_empty() {
                continue;
            }
            match runs.last_mut() {
                Some(last) if last.sgr == state => last.text.push_str(&text),
                _ => runs.push(StyledRun {
                    text: text.into_owned(),
                    sgr: state,
                }),
            }
        }
    }

    (runs, state)
}

/// Strip every escape sequence and control character (newlines kept).
pub fn strip_ansi(s: &str) -> Cow<'_, str> {
    if !s.bytes().any(|b| b == 0x1B || (b < 0x20 && b != b'\n') || b == 0x7F) {
        return Cow::Borrowed(s);
    }
    let (runs, _) = parse_styled(s, SgrState::default());
    Cow::Owned(runs.into_iter().map(|r| r.text).collect())
}

/// Parameter bytes of a complete SGR sequence spanning `start..end`.
fn sgr_params(s: &str, start: usize, end: usize) -> Option<&str> {
    let seq = s.get(start..end)?;
    let body = seq.strip_prefix("\x1b[")?.strip_suffix('m')?;
    body.bytes()
        .all(|b| b.is_ascii_digit() || b == b';' || b == b':')
        .then_some(body)
}

fn sanitize_controls(s: &str) -> Cow<'_, str> {
    if !s.chars().any(|c| c.is_control() && c != '\n') {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.chars()
            .filter_map(|c| match c {
                '\t' => Some(' '),
                '\n' => Some('\n'),
                c if c.is_control() => None,
                c => Some(c),
            })
            .collect(),
    )
}

/// Skip an escape sequence starting at `pos` (which points to ESC byte).
/// Returns the byte index after the complete sequence.
fn skip_escape_sequence(bytes: &[u8], pos: usize) -> usize {
    let next = pos + 1;
    if next >= bytes.len() {
        return bytes.len();
    }

    match bytes[next] {
        b'[' => skip_csi(bytes, next + 1),
        b']' | b'P' | b'^' | b'_' => skip_string_terminated(bytes, next + 1),
        b if b >= 0x80 => next,
        _ => next + 1,
    }
}

fn skip_csi(bytes: &[u8], pos: usize) -> usize {
    let mut i = pos;
    while i < bytes.len() {
        let b = bytes[i];
        if (0x40..=0x7E).contains(&b) {
            return i + 1;
        }
        if !(0x20..=0x7E).contains(&b) {
            return i;
        }
        i += 1;
    }
    bytes.len()
}

fn skip_string_terminated(bytes: &[u8], pos: usize) -> usize {
    let len = bytes.len();
    let mut i = pos;
    while i < len {
        match bytes[i] {
            0x07 => return i + 1,
            0x1B if i + 1 < len && bytes[i + 1] == b'\\' => return i + 2,
            _ => i += 1,
        }
    }
    len
}
