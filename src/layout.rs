//! Layout Module — Style resolution, solving, and rectangle extraction.
//!
//! Responsibilities:
//! - Resolve responsive styles against the terminal width, reusing the
//!   previous `Rc<ResolvedStyle>` whenever the result is value-equal
//! - Push changed resolved styles and measure data into the oracle
//! - Run the oracle's solve step only when the layout is dirty
//! - Extract absolute rectangles with parent-move propagation and
//!   clip-rect culling

use std::rc::Rc;

use tracing::{debug, trace};

use crate::context::RenderContext;
use crate::error::{RenderError, RenderResult};
use crate::style::Side;
use crate::types::{LayoutRect, NodeId, Rect};

// ============================================================================
// Style Resolution
// ============================================================================

/// Resolve styles top-down. A node is re-resolved only when its authored
/// style reference changed, or when the column count changed and the style
/// has breakpoint-conditional values.
///
/// Also recomputes each node's `subtree_absolute` flag. Returns the visible
/// nodes in pre-order.
pub(crate) fn resolve_styles(ctx: &mut RenderContext, columns: u16, rows: u16) -> Vec<NodeId> {
    let mut order = Vec::with_capacity(ctx.nodes.len());
    let mut stack = vec![ctx.root];
    let mut resolved_count = 0usize;

    while let Some(id) = stack.pop() {
        let Some(node) = ctx.nodes.get_mut(id) else {
            continue;
        };
        if node.hidden {
            continue;
        }

        let current = match &node.resolved_from {
            Some((source, cols)) => {
                Rc::ptr_eq(source, &node.style) && (*cols == columns || !node.style.is_responsive())
            }
            None => false,
        };
        if !current {
            let fresh = node.style.resolve(&ctx.config.breakpoints, columns);
            if fresh != *node.resolved {
                node.resolved = Rc::new(fresh);
                node.paint_dirty = true;
            }
            node.resolved_from = Some((Rc::clone(&node.style), columns));
            resolved_count += 1;
        }

        order.push(id);
        stack.extend(node.children().iter().rev());
    }

    // Post-order: children appear after their parent in `order`.
    for &id in order.iter().rev() {
        let escapes = ctx.nodes.get(id).is_some_and(|node| {
            node.children().iter().any(|&c| {
                ctx.nodes
                    .get(c)
                    .is_some_and(|child| !child.hidden && (child.resolved.is_absolute() || child.subtree_absolute))
            })
        });
        if let Some(node) = ctx.nodes.get_mut(id) {
            node.subtree_absolute = escapes;
        }
    }

    trace!(columns, rows, visited = order.len(), resolved = resolved_count, "resolve_styles");
    order
}

// ============================================================================
// Compute Layout
// ============================================================================

/// Frame entry point for layout. A no-op unless `force` is set or a
/// mutation has dirtied the layout since the last successful pass.
///
/// Returns whether a pass ran.
pub(crate) fn compute_layout(ctx: &mut RenderContext, columns: u16, rows: u16, force: bool) -> RenderResult<bool> {
    if !force && !ctx.dirty.layout {
        return Ok(false);
    }

    let order = resolve_styles(ctx, columns, rows);
    push_styles(ctx, &order)?;

    let root_oracle = ctx.nodes.node(ctx.root)?.oracle;
    ctx.oracle.solve(root_oracle, columns, rows)?;

    let root = ctx.root;
    extract(ctx, root, (0, 0), force, None)?;

    ctx.dirty.layout = false;
    debug!(columns, rows, nodes = order.len(), "layout pass");
    Ok(true)
}

/// Push resolved styles whose reference changed since they were last
/// applied. Leaves get their measure data refreshed alongside, since the
/// wrap mode lives in the style.
fn push_styles(ctx: &mut RenderContext, order: &[NodeId]) -> RenderResult<()> {
    for &id in order {
        let node = ctx.nodes.node_mut(id)?;
        if node
            .applied
            .as_ref()
            .is_some_and(|applied| Rc::ptr_eq(applied, &node.resolved))
        {
            continue;
        }
        let resolved = Rc::clone(&node.resolved);
        let measure = node.kind.measure(resolved.wrap_mode());
        let oracle = node.oracle;
        node.applied = Some(Rc::clone(&resolved));

        ctx.oracle.apply_style(oracle, &resolved)?;
        if let Some(measure) = measure {
            ctx.oracle.set_measure(oracle, measure)?;
            ctx.oracle.mark_dirty(oracle)?;
        }
    }
    Ok(())
}

// ============================================================================
// Extraction
// ============================================================================

/// Whether a subtree can be skipped because it lies entirely outside the
/// active clip. Nothing is culled when an absolutely positioned descendant
/// could escape, or when the oracle reported child content overflowing the
/// node's box. Shared by extraction and paint so both skip the same nodes.
pub(crate) fn can_cull(outer: Rect, clip: Option<Rect>, subtree_absolute: bool, content_fits: bool) -> bool {
    match clip {
        Some(clip) => !subtree_absolute && content_fits && !outer.intersects(clip),
        None => false,
    }
}

/// Walk the tree converting oracle rects to absolute screen rects.
///
/// A node's rect is recomputed when the oracle has a new result for it,
/// when its parent's origin moved this pass, or when it was left stale by
/// an earlier pass. `clip` is the intersection of clip-opted ancestors'
/// inner rects; absolutely positioned nodes escape it.
fn extract(
    ctx: &mut RenderContext,
    id: NodeId,
    parent_origin: (i32, i32),
    parent_moved: bool,
    clip: Option<Rect>,
) -> RenderResult<()> {
    let node = ctx.nodes.node(id)?;
    if node.hidden {
        return Ok(());
    }
    let oracle = node.oracle;
    let stale = node.stale;
    let absolute = node.resolved.is_absolute();
    let clips = node.resolved.clips();
    let border = node.resolved.border().width();
    let old = node.layout;

    let computed = ctx
        .oracle
        .computed_rect(oracle)
        .map_err(|_| RenderError::MissingOracleNode(id))?;

    let mut layout = old;
    if computed.has_new_result || parent_moved || stale {
        let outer = Rect::new(
            parent_origin.0 + computed.x,
            parent_origin.1 + computed.y,
            computed.width,
            computed.height,
        );
        let pad = |side| -> RenderResult<i32> {
            Ok(ctx.oracle.computed_padding(oracle, side)?.round() as i32)
        };
        let (top, right, bottom, left) = (pad(Side::Top)?, pad(Side::Right)?, pad(Side::Bottom)?, pad(Side::Left)?);
        let inner = Rect::new(
            outer.x + border + left,
            outer.y + border + top,
            outer.width - 2 * border - left - right,
            outer.height - 2 * border - top - bottom,
        );
        layout = LayoutRect { outer, inner };
    }

    let origin_changed = (layout.outer.x, layout.outer.y) != (old.outer.x, old.outer.y);
    let node = ctx.nodes.node_mut(id)?;
    node.content_fits = computed.content_fits;
    if layout != old {
        trace!(node = %id, ?layout, "rect changed");
        node.layout = layout;
        node.paint_dirty = true;
        ctx.dirty.repaint_all = true;
    }

    let node = ctx.nodes.node(id)?;
    let clip = if absolute { None } else { clip };
    if can_cull(layout.outer, clip, node.subtree_absolute, node.content_fits) {
        // Children keep their old rects; revisit the whole subtree once
        // this node comes back into view.
        trace!(node = %id, "culled");
        ctx.nodes.node_mut(id)?.stale = true;
        return Ok(());
    }

    let child_clip = if clips {
        Some(clip.map_or(layout.inner, |c| c.intersect(layout.inner)))
    } else {
        clip
    };
    let children_moved = origin_changed || stale;
    let origin = (layout.outer.x, layout.outer.y);
    let children = node.children().to_vec();
    for child in children {
        extract(ctx, child, origin, children_moved, child_clip)?;
    }

    ctx.nodes.node_mut(id)?.stale = false;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Style;
    use crate::terminal::MockBackend;
    use crate::tree::{self, NodeKind};

    fn test_ctx() -> RenderContext {
        RenderContext::new(Box::new(MockBackend::new(80, 24))).unwrap()
    }

    fn style(json: &str) -> Style {
        Style::from_json(json).unwrap()
    }

    fn add(ctx: &mut RenderContext, parent: NodeId, kind: NodeKind, json: &str) -> NodeId {
        let id = tree::create(ctx, kind, style(json)).unwrap();
        tree::append(ctx, parent, id).unwrap();
        id
    }

    fn outer(ctx: &RenderContext, id: NodeId) -> Rect {
        ctx.nodes.get(id).unwrap().layout.outer
    }

    #[test]
    fn test_compute_layout_noop_when_clean() {
        let mut ctx = test_ctx();
        let root = ctx.root;
        add(&mut ctx, root, NodeKind::text("hi"), "{}");
        assert!(compute_layout(&mut ctx, 80, 24, false).unwrap());
        assert!(!ctx.dirty.layout);
        assert!(!compute_layout(&mut ctx, 80, 24, false).unwrap());
        assert!(compute_layout(&mut ctx, 80, 24, true).unwrap());
    }

    #[test]
    fn test_parent_move_propagation() {
        let mut ctx = test_ctx();
        let root = ctx.root;
        let column = add(&mut ctx, root, NodeKind::container(), r#"{"flexDirection":"column"}"#);
        let first = add(&mut ctx, column, NodeKind::text("Short"), "{}");
        let second = add(&mut ctx, column, NodeKind::text("World"), "{}");
        compute_layout(&mut ctx, 80, 24, false).unwrap();
        assert_eq!(outer(&ctx, first).y, 0);
        assert_eq!(outer(&ctx, second).y, 1);

        tree::set_text(&mut ctx, first, "Hi").unwrap();
        compute_layout(&mut ctx, 80, 24, false).unwrap();
        assert_eq!(outer(&ctx, second).y, 1);
        assert_eq!(outer(&ctx, first).width, 2);
    }

    #[test]
    fn test_translated_container_moves_children() {
        let mut ctx = test_ctx();
        let root = ctx.root;
        let column = add(&mut ctx, root, NodeKind::container(), r#"{"flexDirection":"column"}"#);
        let header = add(&mut ctx, column, NodeKind::text("one"), r#"{"flexShrink":0}"#);
        let body = add(&mut ctx, column, NodeKind::container(), r#"{"paddingLeft":2,"flexShrink":0}"#);
        let leaf = add(&mut ctx, body, NodeKind::text("leaf"), "{}");
        compute_layout(&mut ctx, 80, 24, false).unwrap();
        assert_eq!(outer(&ctx, leaf), Rect::new(2, 1, 4, 1));

        // The body only translates; its child's parent-relative rect is
        // unchanged, so only parent-move propagation can move it.
        tree::set_text(&mut ctx, header, "one\ntwo").unwrap();
        compute_layout(&mut ctx, 80, 24, false).unwrap();
        assert_eq!(outer(&ctx, body).y, 2);
        assert_eq!(outer(&ctx, leaf), Rect::new(2, 2, 4, 1));
    }

    #[test]
    fn test_inner_rect_subtracts_border_and_padding() {
        let mut ctx = test_ctx();
        let root = ctx.root;
        let boxed = add(
            &mut ctx,
            root,
            NodeKind::container(),
            r#"{"width":10,"height":6,"border":"single","padding":1}"#,
        );
        compute_layout(&mut ctx, 80, 24, false).unwrap();
        let layout = ctx.nodes.get(boxed).unwrap().layout;
        assert_eq!(layout.outer, Rect::new(0, 0, 10, 6));
        assert_eq!(layout.inner, Rect::new(2, 2, 6, 2));
    }

    #[test]
    fn test_resolved_reference_stable_across_widths_in_bucket() {
        let mut ctx = test_ctx();
        let root = ctx.root;
        let id = add(&mut ctx, root, NodeKind::text("x"), r#"{"width":{"sm":5,"md":10}}"#);
        compute_layout(&mut ctx, 85, 24, true).unwrap();
        let first = Rc::clone(&ctx.nodes.get(id).unwrap().resolved);
        compute_layout(&mut ctx, 100, 24, true).unwrap();
        assert!(Rc::ptr_eq(&first, &ctx.nodes.get(id).unwrap().resolved));
        assert_eq!(outer(&ctx, id).width, 10);

        compute_layout(&mut ctx, 60, 24, true).unwrap();
        assert!(!Rc::ptr_eq(&first, &ctx.nodes.get(id).unwrap().resolved));
        assert_eq!(outer(&ctx, id).width, 5);
    }

    #[test]
    fn test_culled_subtree_revisited_when_visible() {
        let mut ctx = test_ctx();
        let root = ctx.root;
        let viewport = add(
            &mut ctx,
            root,
            NodeKind::container(),
            r#"{"flexDirection":"column","height":2,"width":20,"overflow":"hidden"}"#,
        );
        let mut rows = Vec::new();
        for i in 0..4 {
            let row = add(
                &mut ctx,
                viewport,
                NodeKind::container(),
                r#"{"height":1,"flexShrink":0}"#,
            );
            add(&mut ctx, row, NodeKind::text(format!("row {i}")), "{}");
            rows.push(row);
        }
        compute_layout(&mut ctx, 80, 24, false).unwrap();
        assert!(ctx.nodes.get(rows[3]).unwrap().stale);
        assert!(!ctx.nodes.get(rows[0]).unwrap().stale);

        // Scroll by removing the first two rows: the culled rows move into view.
        tree::remove(&mut ctx, viewport, rows[0]).unwrap();
        tree::remove(&mut ctx, viewport, rows[1]).unwrap();
        compute_layout(&mut ctx, 80, 24, false).unwrap();
        let leaf = ctx.nodes.get(rows[3]).unwrap().children()[0];
        assert_eq!(outer(&ctx, rows[3]).y, 1);
        assert_eq!(outer(&ctx, leaf).y, 1);
    }

    #[test]
    fn test_absolute_descendant_prevents_cull() {
        let mut ctx = test_ctx();
        let root = ctx.root;
        let clip = add(
            &mut ctx,
            root,
            NodeKind::container(),
            r#"{"flexDirection":"column","height":1,"width":20,"overflow":"hidden"}"#,
        );
        add(&mut ctx, clip, NodeKind::container(), r#"{"height":1,"flexShrink":0}"#);
        let below = add(&mut ctx, clip, NodeKind::container(), r#"{"height":1,"flexShrink":0}"#);
        let overlay = add(
            &mut ctx,
            below,
            NodeKind::text("menu"),
            r#"{"position":"absolute","top":3,"left":0}"#,
        );
        compute_layout(&mut ctx, 80, 24, false).unwrap();
        assert!(ctx.nodes.get(below).unwrap().subtree_absolute);
        assert_eq!(outer(&ctx, overlay).y, 4);
    }

    #[test]
    fn test_hidden_node_leaves_flow() {
        let mut ctx = test_ctx();
        let root = ctx.root;
        let column = add(&mut ctx, root, NodeKind::container(), r#"{"flexDirection":"column"}"#);
        let a = add(&mut ctx, column, NodeKind::text("a"), "{}");
        let b = add(&mut ctx, column, NodeKind::text("b"), "{}");
        compute_layout(&mut ctx, 80, 24, false).unwrap();
        tree::hide(&mut ctx, a).unwrap();
        compute_layout(&mut ctx, 80, 24, false).unwrap();
        assert_eq!(outer(&ctx, b).y, 0);
        tree::show(&mut ctx, a).unwrap();
        compute_layout(&mut ctx, 80, 24, false).unwrap();
        assert_eq!(outer(&ctx, a).y, 0);
        assert_eq!(outer(&ctx, b).y, 1);
    }

    #[test]
    fn test_missing_oracle_node_aborts_extraction() {
        let mut ctx = test_ctx();
        let root = ctx.root;
        let column = add(&mut ctx, root, NodeKind::container(), r#"{"flexDirection":"column"}"#);
        let orphan = add(&mut ctx, column, NodeKind::text("a"), "{}");
        compute_layout(&mut ctx, 80, 24, false).unwrap();

        let handle = ctx.nodes.get(orphan).unwrap().oracle;
        ctx.oracle.destroy_node(handle).unwrap();
        let err = compute_layout(&mut ctx, 80, 24, true).unwrap_err();
        assert!(matches!(err, RenderError::MissingOracleNode(id) if id == orphan));
    }
}
