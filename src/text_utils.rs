use unicode_segmentation::UnicodeSegmentation;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Display width of one grapheme cluster in terminal cells: 0, 1 or 2.
///
/// Multi-codepoint emoji-like clusters (ZWJ sequences, VS16 presentation,
/// skin-tone modifiers, keycaps, flag pairs) always take two cells.
pub(crate) fn grapheme_width(g: &str) -> usize {
    let mut chars = g.chars();
    let Some(first) = chars.next() else {
        return 0;
    };
    if chars.next().is_none() {
        return UnicodeWidthChar::width(first).unwrap_or(0).min(2);
    }
    if is_emoji_cluster(g) {
        return 2;
    }
    UnicodeWidthStr::width(g).min(2)
}

fn is_emoji_cluster(g: &str) -> bool {
    let mut regional = 0;
    for c in g.chars() {
        match c as u32 {
            0x200D | 0xFE0F | 0x20E3 => return true,
            0x1F3FB..=0x1F3FF => return true,
            0x1F1E6..=0x1F1FF => regional += 1,
            _ => {}
        }
    }
    regional >= 2
}

/// Display width of a string, summed per grapheme.
pub(crate) fn str_width(s: &str) -> usize {
    s.graphemes(true).map(grapheme_width).sum()
}

/// Count user-visible grapheme clusters.
pub(crate) fn grapheme_count(content: &str) -> usize {
    UnicodeSegmentation::graphemes(content, true).count()
}
