//! Render Module — Paint engine and frame pipeline.
//!
//! Responsibilities:
//! - Build the paint order: pre-order walk with effective clips, stably
//!   sorted by z-index
//! - Rasterize backgrounds, borders, styled text and inputs into the
//!   current framebuffer, honoring clip rectangles and wide glyphs
//! - Repaint incrementally when only paint-level state changed
//! - Drive one frame: layout, paint, diff, backend write

use std::time::Instant;

use tracing::{debug, trace};
use unicode_segmentation::UnicodeSegmentation;

use crate::ansi::{parse_styled, SgrState};
use crate::context::{Focus, RenderContext};
use crate::error::RenderResult;
use crate::layout::{self, can_cull};
use crate::style::{inherit_color, ResolvedStyle, TextAlign, WrapMode};
use crate::text::{align_offset, wrap_line, InputState, TextContent, WrapUnit, ELLIPSIS};
use crate::text_utils::grapheme_width;
use crate::tree::{Node, NodeArena, NodeKind};
use crate::types::{Buffer, Cell, CellAttrs, CellStyle, Color, CursorState, Glyph, NodeId, Rect};

// ============================================================================
// Render Pipeline
// ============================================================================

/// Execute one frame:
/// 1. Poll the terminal size; a change resizes both buffers and forces a
///    full redraw
/// 2. Compute layout (no-op when nothing is dirty)
/// 3. Paint into the current buffer
/// 4. Diff against the previous buffer
/// 5. Write the frame to the backend, if there is anything to write
pub(crate) fn render(ctx: &mut RenderContext) -> RenderResult<()> {
    // 1. Terminal size
    let (w, h) = ctx.backend.size();
    let resized = ctx.front_buffer.width != w || ctx.front_buffer.height != h;
    if resized {
        debug!(width = w, height = h, "terminal resized");
        ctx.front_buffer.resize(w, h);
        ctx.back_buffer.resize(w, h);
        ctx.full_redraw_pending = true;
    }
    let full_redraw = ctx.full_redraw_pending;

    // 2. Layout
    let start = Instant::now();
    let layout_ran = layout::compute_layout(ctx, w, h, resized)?;
    let layout_time = start.elapsed();

    // 3. Paint
    let start = Instant::now();
    let repaint_all = full_redraw || ctx.dirty.repaint_all;
    let (cursor_at, painted) = paint(ctx, repaint_all)?;
    let paint_time = start.elapsed();

    // 4. Diff
    let cursor = CursorState {
        position: cursor_at,
        color: cursor_at.and(ctx.config.cursor_color),
    };
    let bytes = ctx.diff.diff(&mut ctx.back_buffer, &ctx.front_buffer, full_redraw, cursor);

    // 5. Output
    if !bytes.is_empty() {
        ctx.backend.write(bytes)?;
        ctx.backend.flush()?;
    }
    ctx.full_redraw_pending = false;

    let diff = ctx.diff.stats();
    ctx.stats = crate::context::FrameStats {
        frames: ctx.stats.frames + 1,
        layout_ran,
        layout: layout_time,
        paint: paint_time,
        painted,
        diff_bytes: diff.bytes,
        cells_written: diff.cells,
        moves: diff.moves,
    };
    if ctx.config.debug {
        debug!(
            frame = ctx.stats.frames,
            layout_us = layout_time.as_micros() as u64,
            paint_us = paint_time.as_micros() as u64,
            painted,
            bytes = diff.bytes,
            cells = diff.cells,
            full_redraw,
            "frame"
        );
    }
    Ok(())
}

// ============================================================================
// Paint Order
// ============================================================================

/// Effective paint state of one node, computed during the pre-order walk.
#[derive(Debug, Clone, Copy)]
struct PaintItem {
    id: NodeId,
    clip: Rect,
    fg: Color,
    bg: Color,
    attrs: CellAttrs,
    z: i32,
}

fn collect(nodes: &NodeArena, id: NodeId, parent: &PaintItem, viewport: Rect, items: &mut Vec<PaintItem>) {
    let Some(node) = nodes.get(id) else {
        return;
    };
    if node.hidden {
        return;
    }
    let style = &node.resolved;
    let clip = if style.is_absolute() { viewport } else { parent.clip };
    if can_cull(node.layout.outer, Some(clip), node.subtree_absolute, node.content_fits) {
        return;
    }

    let item = PaintItem {
        id,
        clip,
        fg: inherit_color(style.color, parent.fg),
        bg: inherit_color(style.background_color, parent.bg),
        attrs: style.apply_emphasis(parent.attrs),
        z: style.z_index.unwrap_or(parent.z),
    };
    items.push(item);

    let child_clip = if style.clips() {
        clip.intersect(node.layout.inner)
    } else {
        clip
    };
    let inherited = PaintItem { clip: child_clip, ..item };
    for &child in node.children() {
        collect(nodes, child, &inherited, viewport, items);
    }
}

/// Visible nodes in paint order: tree order, stably sorted by z-index.
fn paint_order(ctx: &RenderContext, viewport: Rect) -> Vec<PaintItem> {
    let base = PaintItem {
        id: ctx.root,
        clip: viewport,
        fg: Color::Default,
        bg: Color::Default,
        attrs: CellAttrs::empty(),
        z: 0,
    };
    let mut items = Vec::with_capacity(ctx.nodes.len());
    collect(&ctx.nodes, ctx.root, &base, viewport, &mut items);
    items.sort_by_key(|item| item.z);
    items
}

// ============================================================================
// Paint
// ============================================================================

/// Rasterize the tree into the current buffer.
///
/// With `repaint_all` the buffer is cleared and every node painted.
/// Otherwise damage starts as the footprint of every paint-dirty node and
/// grows until it is closed: any node whose footprint touches damage is
/// repainted and its footprint joins the damage. The damaged cells are
/// blanked first, so the result matches a full repaint.
///
/// Returns the focused input's cursor position and the number of nodes
/// painted.
pub(crate) fn paint(ctx: &mut RenderContext, repaint_all: bool) -> RenderResult<(Option<(u16, u16)>, usize)> {
    let viewport = Rect::new(
        0,
        0,
        i32::from(ctx.front_buffer.width),
        i32::from(ctx.front_buffer.height),
    );
    let items = paint_order(ctx, viewport);

    let mut repaint = vec![repaint_all; items.len()];
    if repaint_all {
        ctx.front_buffer.clear();
    } else {
        let footprints = items
            .iter()
            .map(|item| ctx.nodes.node(item.id).map(|node| footprint(node, item)))
            .collect::<RenderResult<Vec<_>>>()?;
        let mut damage: Vec<Rect> = Vec::new();
        for (i, item) in items.iter().enumerate() {
            if ctx.nodes.node(item.id)?.paint_dirty {
                repaint[i] = true;
                damage.extend_from_slice(&footprints[i]);
            }
        }
        let mut grew = !damage.is_empty();
        while grew {
            grew = false;
            for (i, rects) in footprints.iter().enumerate() {
                if !repaint[i] && rects.iter().any(|r| damage.iter().any(|d| d.intersects(*r))) {
                    repaint[i] = true;
                    damage.extend_from_slice(rects);
                    grew = true;
                }
            }
        }
        for rect in &damage {
            fill(&mut ctx.front_buffer, *rect, viewport, Color::Default);
        }
    }

    let focus = ctx.focus;
    let mut painted = 0;
    let mut cursor = None;
    for (item, &repaint) in items.iter().zip(&repaint) {
        let node = ctx.nodes.node(item.id)?;
        if repaint {
            paint_node(&mut ctx.front_buffer, node, item, focus);
            painted += 1;
        }
        if let Some(f) = focus.filter(|f| f.node == item.id) {
            cursor = input_cursor(node, item, f);
        }
    }

    for item in &items {
        if let Some(node) = ctx.nodes.get_mut(item.id) {
            node.paint_dirty = false;
        }
    }
    ctx.dirty.repaint_all = false;

    trace!(items = items.len(), painted, repaint_all, "paint");
    Ok((cursor, painted))
}

/// Cells a node may write, clipped. Plain containers write nothing.
fn footprint(node: &Node, item: &PaintItem) -> Vec<Rect> {
    let outer = node.layout.outer;
    let style = &node.resolved;
    if outer.is_empty() {
        return Vec::new();
    }
    let mut rects = Vec::new();
    if node.kind.is_leaf() || style.background_color.is_some_and(|c| !c.is_default()) {
        rects.push(outer);
    } else {
        if style.clips() {
            rects.push(node.layout.inner);
        }
        if outer.width >= 2 && outer.height >= 2 && style.border().chars().is_some() {
            rects.extend([
                Rect::new(outer.x, outer.y, outer.width, 1),
                Rect::new(outer.x, outer.bottom() - 1, outer.width, 1),
                Rect::new(outer.x, outer.y, 1, outer.height),
                Rect::new(outer.right() - 1, outer.y, 1, outer.height),
            ]);
        }
    }
    rects
        .into_iter()
        .map(|r| r.intersect(item.clip))
        .filter(|r| !r.is_empty())
        .collect()
}

fn paint_node(buf: &mut Buffer, node: &Node, item: &PaintItem, focus: Option<Focus>) {
    let layout = node.layout;
    let style = &node.resolved;
    if layout.outer.is_empty() {
        return;
    }
    let base = CellStyle {
        fg: item.fg,
        bg: item.bg,
        attrs: item.attrs,
    };

    // (a) own background
    if style.background_color.is_some_and(|c| !c.is_default()) {
        fill(buf, layout.outer, item.clip, item.bg);
    }

    // (b) clip containers reset their content area
    if style.clips() && !node.kind.is_leaf() {
        fill(buf, layout.inner, item.clip, item.bg);
    }

    // (c) border
    if layout.outer.width >= 2 && layout.outer.height >= 2 {
        if let Some(chars) = style.border().chars() {
            let border_style = CellStyle {
                fg: inherit_color(style.border_color, item.fg),
                bg: item.bg,
                attrs: CellAttrs::empty(),
            };
            draw_border(buf, layout.outer, item.clip, chars, border_style);
        }
    }

    // (d) content
    let clip = item.clip.intersect(layout.inner);
    match &node.kind {
        NodeKind::Container(_) => {}
        NodeKind::Text(content) => {
            paint_text(buf, content, layout.inner, clip, base, style);
        }
        NodeKind::Input(state) => {
            let cursor = focus.filter(|f| f.node == item.id).map(|f| f.cursor);
            let view = input_view(state, cursor, layout.inner, base);
            for (y, row) in view.rows.iter().enumerate() {
                for (x, unit) in row {
                    put(
                        buf,
                        clip,
                        layout.inner.x + x,
                        layout.inner.y + y as i32,
                        unit.glyph.clone(),
                        unit.width,
                        unit.style,
                    );
                }
            }
        }
    }
}

// ============================================================================
// Cell Writes
// ============================================================================

/// Write one glyph of `width` cells at (x, y), clipped.
///
/// Wide glyphs fill a continuation cell to their right; one whose right
/// half falls outside the clip is written as a space. Any wide glyph
/// partially overwritten is replaced by spaces.
fn put(buf: &mut Buffer, clip: Rect, x: i32, y: i32, glyph: Glyph, width: usize, style: CellStyle) {
    if width == 0 || !clip.contains(x, y) || x < 0 || y < 0 {
        return;
    }
    let (glyph, wide) = if width >= 2 && !clip.contains(x + 1, y) {
        (Glyph::Char(' '), false)
    } else {
        (glyph, width >= 2)
    };
    let (cx, cy) = (x as u16, y as u16);

    release(buf, cx, cy);
    if wide {
        release(buf, cx + 1, cy);
    }
    buf.set(cx, cy, Cell::new(glyph, style));
    if wide {
        buf.set(cx + 1, cy, Cell::new(Glyph::Continuation, style));
    }
}

/// Break up a wide glyph pair that cell (x, y) belongs to.
fn release(buf: &mut Buffer, x: u16, y: u16) {
    let Some(cell) = buf.get(x, y) else {
        return;
    };
    if cell.is_continuation() {
        if x > 0 {
            if let Some(style) = buf.get(x - 1, y).map(|c| c.style) {
                buf.set(x - 1, y, Cell::new(Glyph::Char(' '), style));
            }
        }
    } else if let Some(style) = buf.get(x + 1, y).filter(|c| c.is_continuation()).map(|c| c.style) {
        buf.set(x + 1, y, Cell::new(Glyph::Char(' '), style));
    }
}

fn fill(buf: &mut Buffer, rect: Rect, clip: Rect, bg: Color) {
    let area = rect.intersect(clip);
    let blank = CellStyle {
        bg,
        ..CellStyle::default()
    };
    for y in area.y..area.bottom() {
        for x in area.x..area.right() {
            put(buf, clip, x, y, Glyph::Char(' '), 1, blank);
        }
    }
}

fn draw_border(
    buf: &mut Buffer,
    r: Rect,
    clip: Rect,
    (tl, tr, bl, br, horiz, vert): (char, char, char, char, char, char),
    style: CellStyle,
) {
    let (right, bottom) = (r.right() - 1, r.bottom() - 1);
    put(buf, clip, r.x, r.y, Glyph::Char(tl), 1, style);
    put(buf, clip, right, r.y, Glyph::Char(tr), 1, style);
    put(buf, clip, r.x, bottom, Glyph::Char(bl), 1, style);
    put(buf, clip, right, bottom, Glyph::Char(br), 1, style);
    for x in r.x + 1..right {
        put(buf, clip, x, r.y, Glyph::Char(horiz), 1, style);
        put(buf, clip, x, bottom, Glyph::Char(horiz), 1, style);
    }
    for y in r.y + 1..bottom {
        put(buf, clip, r.x, y, Glyph::Char(vert), 1, style);
        put(buf, clip, right, y, Glyph::Char(vert), 1, style);
    }
}

// ============================================================================
// Text
// ============================================================================

/// A grapheme ready to place: glyph, display width, and final cell style.
#[derive(Debug, Clone)]
struct StyledUnit {
    glyph: Glyph,
    width: usize,
    space: bool,
    style: CellStyle,
}

impl StyledUnit {
    fn new(g: &str, style: CellStyle) -> Self {
        Self {
            glyph: Glyph::from_grapheme(g),
            width: grapheme_width(g),
            space: g.chars().all(char::is_whitespace),
            style,
        }
    }
}

impl WrapUnit for StyledUnit {
    fn width(&self) -> usize {
        self.width
    }
    fn is_space(&self) -> bool {
        self.space
    }
}

/// Flatten spans, interpret embedded SGR escapes, and split into logical
/// lines of styled graphemes. Escape state carries across spans.
fn styled_lines(content: &TextContent, base: CellStyle) -> Vec<Vec<StyledUnit>> {
    let mut lines = Vec::new();
    let mut line = Vec::new();
    let mut sgr = SgrState::default();
    for (text, span) in content.flatten() {
        let span_base = span.apply(base);
        let (runs, next) = parse_styled(text, sgr);
        sgr = next;
        for run in runs {
            let style = run.sgr.apply(span_base);
            for g in run.text.graphemes(true) {
                if g == "\n" {
                    lines.push(std::mem::take(&mut line));
                } else {
                    line.push(StyledUnit::new(g, style));
                }
            }
        }
    }
    lines.push(line);
    lines
}

fn paint_text(buf: &mut Buffer, content: &TextContent, inner: Rect, clip: Rect, base: CellStyle, style: &ResolvedStyle) {
    if clip.is_empty() {
        return;
    }
    let box_width = inner.width as usize;
    let align: TextAlign = style.align();
    let mut row = 0;
    for line in styled_lines(content, base) {
        for visual in wrap_line(&line, box_width, style.wrap_mode()) {
            if row >= inner.height {
                return;
            }
            let y = inner.y + row;
            let mut x = inner.x + align_offset(align, visual.width(&line), box_width) as i32;
            for unit in &line[visual.start..visual.end] {
                put(buf, clip, x, y, unit.glyph.clone(), unit.width, unit.style);
                x += unit.width as i32;
            }
            if visual.ellipsis {
                let tail = line[..visual.end].last().map_or(base, |u| u.style);
                put(buf, clip, x, y, Glyph::Char(ELLIPSIS), 1, tail);
            }
            row += 1;
        }
    }
}

// ============================================================================
// Input
// ============================================================================

/// What an input shows inside its inner rect: rows of (column, unit) and
/// the cursor relative to the inner origin.
struct InputView {
    rows: Vec<Vec<(i32, StyledUnit)>>,
    cursor: Option<(i32, i32)>,
}

fn units(text: &str, style: CellStyle) -> Vec<StyledUnit> {
    text.graphemes(true).map(|g| StyledUnit::new(g, style)).collect()
}

/// Lay out an input's value (or dimmed placeholder) for its inner rect.
/// `cursor` is the focused grapheme offset, `None` when unfocused.
fn input_view(state: &InputState, cursor: Option<usize>, inner: Rect, base: CellStyle) -> InputView {
    let (text, style, cursor) = if state.value.is_empty() {
        let dim = CellStyle {
            attrs: base.attrs | CellAttrs::DIM,
            ..base
        };
        (state.placeholder.clone(), dim, cursor.map(|_| 0))
    } else {
        (state.display_value(), base, cursor)
    };
    if state.multiline {
        multiline_view(&text, style, cursor, inner)
    } else {
        single_line_view(&text, style, cursor, inner)
    }
}

/// One row, scrolled horizontally so the cursor stays visible.
fn single_line_view(text: &str, style: CellStyle, cursor: Option<usize>, inner: Rect) -> InputView {
    let width = inner.width.max(0) as usize;
    let units = units(&text.replace('\n', " "), style);
    let cursor_col = cursor.map(|c| units[..c.min(units.len())].iter().map(|u| u.width).sum::<usize>());
    let scroll = cursor_col.map_or(0, |col| (col + 1).saturating_sub(width));

    let mut row = Vec::new();
    let mut col = 0;
    for unit in units {
        let start = col;
        col += unit.width;
        if start < scroll {
            // A wide glyph cut by the scroll edge shows as blanks.
            for x in scroll..col {
                row.push(((x - scroll) as i32, StyledUnit::new(" ", style)));
            }
            continue;
        }
        let x = start - scroll;
        if x + unit.width > width {
            if x < width {
                row.push((x as i32, StyledUnit::new(" ", style)));
            }
            break;
        }
        row.push((x as i32, unit));
    }

    InputView {
        rows: vec![row],
        cursor: cursor_col
            .filter(|_| width > 0)
            .map(|col| ((col - scroll) as i32, 0)),
    }
}

/// Grapheme-wrapped rows, scrolled vertically so the cursor row stays
/// within the inner height.
fn multiline_view(text: &str, style: CellStyle, cursor: Option<usize>, inner: Rect) -> InputView {
    let width = inner.width.max(1) as usize;
    let height = inner.height.max(1) as usize;
    let mut rows: Vec<Vec<(i32, StyledUnit)>> = Vec::new();
    let mut cursor_at: Option<(usize, usize)> = None;
    let mut remaining = cursor;

    for line in text.split('\n') {
        let line_units = units(line, style);
        let visual = wrap_line(&line_units, width, WrapMode::Char);
        let target = remaining.filter(|&k| k <= line_units.len());
        let last = visual.len() - 1;
        for (i, vl) in visual.iter().enumerate() {
            if let Some(k) = target {
                if cursor_at.is_none() && vl.start <= k && (k < vl.end || i == last) {
                    let col: usize = line_units[vl.start..k].iter().map(|u| u.width).sum();
                    cursor_at = Some(if col >= width { (rows.len() + 1, 0) } else { (rows.len(), col) });
                }
            }
            let mut x = 0;
            let row = line_units[vl.start..vl.end]
                .iter()
                .map(|u| {
                    let placed = (x, u.clone());
                    x += u.width as i32;
                    placed
                })
                .collect();
            rows.push(row);
        }
        remaining = match remaining {
            Some(k) if k > line_units.len() => Some(k - line_units.len() - 1),
            _ => None,
        };
    }

    let scroll_top = cursor_at.map_or(0, |(row, _)| row.saturating_sub(height - 1));
    let rows = rows.into_iter().skip(scroll_top).take(height).collect();
    InputView {
        rows,
        cursor: cursor_at.map(|(row, col)| (col as i32, (row - scroll_top) as i32)),
    }
}

/// Screen position of the focused input's cursor, if it is on screen.
fn input_cursor(node: &Node, item: &PaintItem, focus: Focus) -> Option<(u16, u16)> {
    let NodeKind::Input(state) = &node.kind else {
        return None;
    };
    let inner = node.layout.inner;
    let base = CellStyle {
        fg: item.fg,
        bg: item.bg,
        attrs: item.attrs,
    };
    let (cx, cy) = input_view(state, Some(focus.cursor), inner, base).cursor?;
    let (x, y) = (inner.x + cx, inner.y + cy);
    if !item.clip.contains(x, y) || !inner.contains(x, y) {
        return None;
    }
    Some((x as u16, y as u16))
}
