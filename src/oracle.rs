//! Layout Oracle — the flexbox solver boundary.
//!
//! Responsibilities:
//! - `LayoutOracle`: the operations the pipeline needs from a box-model solver
//! - `TaffyOracle`: the implementation over `taffy::TaffyTree`
//! - Resolved style → taffy style translation
//! - Text/input measurement hook consulted during the solve pass
//! - Per-node "has new result" tracking for incremental extraction

use std::collections::HashMap;

use taffy::prelude::*;
use taffy::style_helpers::{auto, length, percent};
use taffy::{LengthPercentage, LengthPercentageAuto, Overflow as TaffyOverflow, Point, Rect};

use crate::error::RenderResult;
use crate::style::{self, Align, Distribute, ResolvedStyle, Side, WrapMode};
use crate::text::{measure_input, measure_text, AvailableWidth};

/// Opaque handle to a node inside the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OracleNode(pub(crate) u64);

/// A solved rectangle relative to the parent's outer box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComputedRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// No child content extends past this node's box.
    pub content_fits: bool,
    /// The solver produced a rect for this node that differs from the last
    /// one it reported.
    pub has_new_result: bool,
}

/// Measurement input attached to a text or input leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Measure {
    Text { content: String, wrap: WrapMode },
    Input { content: String, multiline: bool },
}

impl Measure {
    pub fn measure(&self, available: AvailableWidth) -> (f32, f32) {
        match self {
            Measure::Text { content, wrap } => measure_text(content, *wrap, available),
            Measure::Input { content, multiline } => measure_input(content, *multiline, available),
        }
    }
}

/// What the pipeline consumes from a box-model solver.
///
/// The pipeline forwards styles and reads back rectangles; it makes no
/// assumption about the algorithm in between.
pub trait LayoutOracle {
    fn create_node(&mut self, leaf: bool) -> RenderResult<OracleNode>;
    /// Destroy one node. Children must already be detached or be destroyed
    /// right after.
    fn destroy_node(&mut self, node: OracleNode) -> RenderResult<()>;
    fn insert_child(&mut self, parent: OracleNode, child: OracleNode, index: usize) -> RenderResult<()>;
    fn remove_child(&mut self, parent: OracleNode, child: OracleNode) -> RenderResult<()>;
    fn child_count(&self, parent: OracleNode) -> usize;
    /// Replace layout-relevant style. Display participation is preserved.
    fn apply_style(&mut self, node: OracleNode, style: &ResolvedStyle) -> RenderResult<()>;
    fn set_display(&mut self, node: OracleNode, visible: bool) -> RenderResult<()>;
    /// Install or refresh measurement data without invalidating cached
    /// layout. Use `mark_dirty` when the intrinsic size may have changed.
    fn set_measure(&mut self, node: OracleNode, measure: Measure) -> RenderResult<()>;
    fn mark_dirty(&mut self, node: OracleNode) -> RenderResult<()>;
    fn solve(&mut self, root: OracleNode, width: u16, height: u16) -> RenderResult<()>;
    /// Read the solved rect and consume its "new result" flag.
    fn computed_rect(&mut self, node: OracleNode) -> RenderResult<ComputedRect>;
    fn computed_padding(&self, node: OracleNode, edge: Side) -> RenderResult<f32>;
}

// ============================================================================
// Taffy Implementation
// ============================================================================

pub struct TaffyOracle {
    tree: TaffyTree<Measure>,
    reported: HashMap<NodeId, ComputedRect>,
}

impl Default for TaffyOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl TaffyOracle {
    pub fn new() -> Self {
        Self {
            tree: TaffyTree::new(),
            reported: HashMap::new(),
        }
    }

    fn id(node: OracleNode) -> NodeId {
        NodeId::from(node.0)
    }
}

impl LayoutOracle for TaffyOracle {
    fn create_node(&mut self, leaf: bool) -> RenderResult<OracleNode> {
        let node = if leaf {
            self.tree.new_leaf(Style::DEFAULT)?
        } else {
            self.tree.new_with_children(Style::DEFAULT, &[])?
        };
        Ok(OracleNode(u64::from(node)))
    }

    fn destroy_node(&mut self, node: OracleNode) -> RenderResult<()> {
        let id = Self::id(node);
        self.tree.remove(id)?;
        self.reported.remove(&id);
        Ok(())
    }

    fn insert_child(&mut self, parent: OracleNode, child: OracleNode, index: usize) -> RenderResult<()> {
        let parent = Self::id(parent);
        let index = index.min(self.tree.child_count(parent));
        self.tree.insert_child_at_index(parent, index, Self::id(child))?;
        Ok(())
    }

    fn remove_child(&mut self, parent: OracleNode, child: OracleNode) -> RenderResult<()> {
        self.tree.remove_child(Self::id(parent), Self::id(child))?;
        Ok(())
    }

    fn child_count(&self, parent: OracleNode) -> usize {
        self.tree.child_count(Self::id(parent))
    }

    // Read-modify-write: display belongs to hide/show, not to the style.
    fn apply_style(&mut self, node: OracleNode, resolved: &ResolvedStyle) -> RenderResult<()> {
        let id = Self::id(node);
        let display = self.tree.style(id)?.display;
        let mut style = to_taffy_style(resolved);
        style.display = display;
        self.tree.set_style(id, style)?;
        Ok(())
    }

    fn set_display(&mut self, node: OracleNode, visible: bool) -> RenderResult<()> {
        let id = Self::id(node);
        let mut style = self.tree.style(id)?.clone();
        style.display = if visible { Display::Flex } else { Display::None };
        self.tree.set_style(id, style)?;
        Ok(())
    }

    fn set_measure(&mut self, node: OracleNode, measure: Measure) -> RenderResult<()> {
        let id = Self::id(node);
        match self.tree.get_node_context_mut(id) {
            Some(existing) => *existing = measure,
            None => self.tree.set_node_context(id, Some(measure))?,
        }
        Ok(())
    }

    fn mark_dirty(&mut self, node: OracleNode) -> RenderResult<()> {
        self.tree.mark_dirty(Self::id(node))?;
        Ok(())
    }

    fn solve(&mut self, root: OracleNode, width: u16, height: u16) -> RenderResult<()> {
        let available = Size {
            width: AvailableSpace::Definite(width as f32),
            height: AvailableSpace::Definite(height as f32),
        };
        self.tree.compute_layout_with_measure(
            Self::id(root),
            available,
            |known: Size<Option<f32>>,
             available: Size<AvailableSpace>,
             _node: NodeId,
             measure: Option<&mut Measure>,
             _style: &Style| {
                if let Size {
                    width: Some(width),
                    height: Some(height),
                } = known
                {
                    return Size { width, height };
                }
                let Some(measure) = measure else {
                    return Size::ZERO;
                };
                let offered = match (known.width, available.width) {
                    (Some(w), _) => AvailableWidth::Definite(w),
                    (None, AvailableSpace::Definite(w)) => AvailableWidth::Definite(w),
                    (None, AvailableSpace::MinContent) => AvailableWidth::MinContent,
                    (None, AvailableSpace::MaxContent) => AvailableWidth::MaxContent,
                };
                let (w, h) = measure.measure(offered);
                Size {
                    width: known.width.unwrap_or(w),
                    height: known.height.unwrap_or(h),
                }
            },
        )?;
        Ok(())
    }

    fn computed_rect(&mut self, node: OracleNode) -> RenderResult<ComputedRect> {
        let id = Self::id(node);
        let layout = self.tree.layout(id)?;
        let mut rect = ComputedRect {
            x: layout.location.x.round() as i32,
            y: layout.location.y.round() as i32,
            width: layout.size.width.round().max(0.0) as i32,
            height: layout.size.height.round().max(0.0) as i32,
            content_fits: layout.content_size.width <= layout.size.width + 0.5
                && layout.content_size.height <= layout.size.height + 0.5,
            has_new_result: false,
        };
        let previous = self.reported.insert(id, rect);
        rect.has_new_result = previous != Some(rect);
        Ok(rect)
    }

    fn computed_padding(&self, node: OracleNode, edge: Side) -> RenderResult<f32> {
        let padding = self.tree.layout(Self::id(node))?.padding;
        Ok(match edge {
            Side::Top => padding.top,
            Side::Right => padding.right,
            Side::Bottom => padding.bottom,
            Side::Left => padding.left,
        })
    }
}

// ============================================================================
// Style Translation
// ============================================================================

fn to_dimension(d: style::Dimension) -> Dimension {
    match d {
        style::Dimension::Auto => auto(),
        style::Dimension::Cells(n) => length(n),
        style::Dimension::Percent(p) => percent(p / 100.0),
    }
}

fn to_inset(d: Option<style::Dimension>) -> LengthPercentageAuto {
    match d {
        None | Some(style::Dimension::Auto) => auto(),
        Some(style::Dimension::Cells(n)) => length(n),
        Some(style::Dimension::Percent(p)) => percent(p / 100.0),
    }
}

fn to_distribute(d: Distribute) -> AlignContent {
    match d {
        Distribute::FlexStart => AlignContent::FlexStart,
        Distribute::FlexEnd => AlignContent::FlexEnd,
        Distribute::Center => AlignContent::Center,
        Distribute::Stretch => AlignContent::Stretch,
        Distribute::SpaceBetween => AlignContent::SpaceBetween,
        Distribute::SpaceAround => AlignContent::SpaceAround,
        Distribute::SpaceEvenly => AlignContent::SpaceEvenly,
    }
}

fn to_align(a: Align) -> AlignItems {
    match a {
        Align::FlexStart => AlignItems::FlexStart,
        Align::FlexEnd => AlignItems::FlexEnd,
        Align::Center => AlignItems::Center,
        Align::Stretch => AlignItems::Stretch,
        Align::Baseline => AlignItems::Baseline,
    }
}

/// Translate a resolved style into the solver's style. Borders take one
/// cell per side; display is left at its default for the caller to set.
pub(crate) fn to_taffy_style(s: &ResolvedStyle) -> Style {
    let border: LengthPercentage = length(s.border().width() as f32);
    let pad = |side| -> LengthPercentage { length(s.padding_side(side)) };
    let margin = |side| -> LengthPercentageAuto { length(s.margin_side(side)) };
    let gap = s.gap.unwrap_or(0.0).max(0.0);
    let overflow = match s.overflow.unwrap_or_default() {
        style::Overflow::Visible => TaffyOverflow::Visible,
        style::Overflow::Hidden => TaffyOverflow::Hidden,
    };

    Style {
        position: match s.position.unwrap_or_default() {
            style::Position::Relative => Position::Relative,
            style::Position::Absolute => Position::Absolute,
        },
        inset: Rect {
            top: to_inset(s.top),
            right: to_inset(s.right),
            bottom: to_inset(s.bottom),
            left: to_inset(s.left),
        },
        flex_direction: match s.flex_direction.unwrap_or_default() {
            style::FlexDirection::Row => FlexDirection::Row,
            style::FlexDirection::Column => FlexDirection::Column,
            style::FlexDirection::RowReverse => FlexDirection::RowReverse,
            style::FlexDirection::ColumnReverse => FlexDirection::ColumnReverse,
        },
        flex_wrap: match s.flex_wrap.unwrap_or_default() {
            style::FlexWrap::Nowrap => FlexWrap::NoWrap,
            style::FlexWrap::Wrap => FlexWrap::Wrap,
            style::FlexWrap::WrapReverse => FlexWrap::WrapReverse,
        },
        justify_content: s.justify_content.map(to_distribute),
        align_content: s.align_content.map(to_distribute),
        align_items: s.align_items.map(to_align),
        align_self: s.align_self.map(to_align),
        flex_grow: s.flex_grow.unwrap_or(0.0),
        flex_shrink: s.flex_shrink.unwrap_or(1.0),
        flex_basis: to_dimension(s.flex_basis.unwrap_or_default()),
        size: Size {
            width: to_dimension(s.width.unwrap_or_default()),
            height: to_dimension(s.height.unwrap_or_default()),
        },
        min_size: Size {
            width: to_dimension(s.min_width.unwrap_or_default()),
            height: to_dimension(s.min_height.unwrap_or_default()),
        },
        max_size: Size {
            width: to_dimension(s.max_width.unwrap_or_default()),
            height: to_dimension(s.max_height.unwrap_or_default()),
        },
        gap: Size {
            width: length(s.column_gap.unwrap_or(gap)),
            height: length(s.row_gap.unwrap_or(gap)),
        },
        padding: Rect {
            top: pad(Side::Top),
            right: pad(Side::Right),
            bottom: pad(Side::Bottom),
            left: pad(Side::Left),
        },
        margin: Rect {
            top: margin(Side::Top),
            right: margin(Side::Right),
            bottom: margin(Side::Bottom),
            left: margin(Side::Left),
        },
        border: Rect {
            top: border,
            right: border,
            bottom: border,
            left: border,
        },
        overflow: Point {
            x: overflow,
            y: overflow,
        },
        ..Style::DEFAULT
    }
}
