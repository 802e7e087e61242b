//! Tree Module — Node arena and host mutation operations.
//!
//! Responsibilities:
//! - Generational arena storage (`NodeArena`); parents are plain ids
//! - Node creation and parent-first subtree teardown
//! - Parent-child relationships, mirrored onto the layout oracle at the
//!   same child index
//! - Dirty marking for layout, measurement, and paint
//! - The `HostTree` mutation boundary used by description layers

use std::rc::Rc;

use tracing::debug;

use crate::context::RenderContext;
use crate::error::{RenderError, RenderResult};
use crate::oracle::{Measure, OracleNode};
use crate::style::{ResolvedStyle, Style, WrapMode};
use crate::text::{InputState, TextContent, TextSpan};
use crate::text_utils::str_width;
use crate::types::{LayoutRect, NodeId};

// ============================================================================
// Node
// ============================================================================

/// Ordered child list of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Children(Vec<NodeId>);

impl Children {
    pub fn as_slice(&self) -> &[NodeId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn position(&self, id: NodeId) -> Option<usize> {
        self.0.iter().position(|&c| c == id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Container(Children),
    Text(TextContent),
    Input(InputState),
}

impl NodeKind {
    pub fn container() -> Self {
        NodeKind::Container(Children::default())
    }

    pub fn text(text: impl Into<String>) -> Self {
        NodeKind::Text(TextContent::plain(text))
    }

    pub fn spans(spans: Vec<TextSpan>) -> Self {
        NodeKind::Text(TextContent { spans })
    }

    pub fn input(state: InputState) -> Self {
        NodeKind::Input(state)
    }

    pub fn is_leaf(&self) -> bool {
        !matches!(self, NodeKind::Container(_))
    }

    pub fn children(&self) -> &[NodeId] {
        match self {
            NodeKind::Container(c) => c.as_slice(),
            _ => &[],
        }
    }

    /// Measurement data for leaves, `None` for containers.
    pub(crate) fn measure(&self, wrap: WrapMode) -> Option<Measure> {
        match self {
            NodeKind::Container(_) => None,
            NodeKind::Text(content) => Some(Measure::Text {
                content: content.plain_text(),
                wrap,
            }),
            NodeKind::Input(state) => {
                let shown = if state.value.is_empty() {
                    state.placeholder.clone()
                } else {
                    state.display_value()
                };
                Some(Measure::Input {
                    content: shown,
                    multiline: state.multiline,
                })
            }
        }
    }
}

#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub style: Rc<Style>,
    pub resolved: Rc<ResolvedStyle>,
    pub layout: LayoutRect,
    pub hidden: bool,
    pub paint_dirty: bool,
    pub oracle: OracleNode,

    /// Style and column count `resolved` was computed from.
    pub(crate) resolved_from: Option<(Rc<Style>, u16)>,
    /// Last resolved style pushed into the oracle.
    pub(crate) applied: Option<Rc<ResolvedStyle>>,
    /// Rect must be recomputed on the next extraction regardless of what
    /// the oracle reports (culled, re-shown, or re-parented).
    pub(crate) stale: bool,
    /// Some descendant is absolutely positioned.
    pub(crate) subtree_absolute: bool,
    /// Last extraction found all child content inside this node's box.
    pub(crate) content_fits: bool,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, style: Style, oracle: OracleNode) -> Self {
        Self {
            kind,
            parent: None,
            style: Rc::new(style),
            resolved: Rc::new(ResolvedStyle::default()),
            layout: LayoutRect::default(),
            hidden: false,
            paint_dirty: true,
            oracle,
            resolved_from: None,
            applied: None,
            stale: true,
            subtree_absolute: false,
            content_fits: false,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        self.kind.children()
    }
}

// ============================================================================
// Arena
// ============================================================================

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Flat node storage. Ids are generational: a removed node's id never
/// resolves again, even after its slot is reused.
#[derive(Debug, Default)]
pub struct NodeArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn insert(&mut self, node: Node) -> NodeId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> Option<Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(node)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn node(&self, id: NodeId) -> RenderResult<&Node> {
        self.get(id).ok_or(RenderError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> RenderResult<&mut Node> {
        self.get_mut(id).ok_or(RenderError::UnknownNode(id))
    }

    /// `id` and all its descendants, parents before children.
    pub(crate) fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.get(current) {
                out.push(current);
                stack.extend(node.children().iter().rev());
            }
        }
        out
    }
}

// ============================================================================
// Mutation Operations
// ============================================================================

/// Create a detached node. Containers always start empty.
pub(crate) fn create(ctx: &mut RenderContext, kind: NodeKind, props: Style) -> RenderResult<NodeId> {
    let kind = match kind {
        NodeKind::Container(_) => NodeKind::container(),
        other => other,
    };
    let oracle = ctx.oracle.create_node(kind.is_leaf())?;
    let id = ctx.nodes.insert(Node::new(kind, props, oracle));
    ctx.dirty.layout = true;
    debug!(node = %id, "create");
    Ok(id)
}

/// Append `child` as the last child of `parent`, moving it if attached elsewhere.
pub(crate) fn append(ctx: &mut RenderContext, parent: NodeId, child: NodeId) -> RenderResult<()> {
    check_attach(ctx, parent, child)?;
    detach(ctx, child)?;
    let index = ctx.nodes.node(parent)?.children().len();
    attach_at(ctx, parent, child, index)?;
    debug!(parent = %parent, child = %child, index, "append");
    Ok(())
}

/// Insert `child` immediately before `reference` under `parent`.
pub(crate) fn insert_before(
    ctx: &mut RenderContext,
    parent: NodeId,
    child: NodeId,
    reference: NodeId,
) -> RenderResult<()> {
    check_attach(ctx, parent, child)?;
    if ctx.nodes.node(reference)?.parent != Some(parent) {
        return Err(RenderError::NotAChild {
            parent,
            child: reference,
        });
    }
    if child == reference {
        return Ok(());
    }
    detach(ctx, child)?;
    let index = match &ctx.nodes.node(parent)?.kind {
        NodeKind::Container(children) => children.position(reference),
        _ => None,
    }
    .ok_or(RenderError::NotAChild {
        parent,
        child: reference,
    })?;
    attach_at(ctx, parent, child, index)?;
    debug!(parent = %parent, child = %child, index, "insert_before");
    Ok(())
}

/// Detach `child` from `parent` and destroy it with its whole subtree.
///
/// Teardown is parent-first: the node leaves both trees before any oracle
/// node below it is destroyed.
pub(crate) fn remove(ctx: &mut RenderContext, parent: NodeId, child: NodeId) -> RenderResult<()> {
    ctx.nodes.node(parent)?;
    if child == ctx.root {
        return Err(RenderError::RootImmutable("removed"));
    }
    if ctx.nodes.node(child)?.parent != Some(parent) {
        return Err(RenderError::NotAChild { parent, child });
    }
    detach(ctx, child)?;

    let doomed = ctx.nodes.subtree(child);
    for &id in &doomed {
        let oracle = ctx.nodes.node(id)?.oracle;
        ctx.oracle.destroy_node(oracle)?;
        ctx.nodes.remove(id);
    }
    if ctx.focus.is_some_and(|f| doomed.contains(&f.node)) {
        ctx.focus = None;
    }
    debug!(parent = %parent, child = %child, destroyed = doomed.len(), "remove");
    Ok(())
}

/// Replace a node's authored style. Returns whether anything changed.
///
/// The comparison is by value: a description layer that rebuilds an equal
/// style every frame keeps the old reference and dirties nothing.
pub(crate) fn update_props(ctx: &mut RenderContext, id: NodeId, props: Style) -> RenderResult<bool> {
    let node = ctx.nodes.node_mut(id)?;
    if *node.style == props {
        return Ok(false);
    }
    node.style = Rc::new(props);
    node.paint_dirty = true;
    let container = !node.kind.is_leaf();
    ctx.dirty.layout = true;
    // Descendants inherit colors and emphasis.
    if container {
        ctx.dirty.repaint_all = true;
    }
    debug!(node = %id, "update_props");
    Ok(true)
}

/// Replace a text leaf's content with plain text.
pub(crate) fn set_text(ctx: &mut RenderContext, id: NodeId, text: &str) -> RenderResult<()> {
    match &ctx.nodes.node(id)?.kind {
        NodeKind::Text(_) => set_content(ctx, id, TextContent::plain(text)),
        NodeKind::Input(state) => {
            let state = InputState {
                value: text.to_string(),
                ..state.clone()
            };
            set_input(ctx, id, state)
        }
        NodeKind::Container(_) => Err(RenderError::WrongKind {
            node: id,
            expected: "text",
        }),
    }
}

/// Replace a text leaf's content with styled spans.
pub(crate) fn set_spans(ctx: &mut RenderContext, id: NodeId, spans: Vec<TextSpan>) -> RenderResult<()> {
    if !matches!(ctx.nodes.node(id)?.kind, NodeKind::Text(_)) {
        return Err(RenderError::WrongKind {
            node: id,
            expected: "text",
        });
    }
    set_content(ctx, id, TextContent { spans })
}

fn set_content(ctx: &mut RenderContext, id: NodeId, content: TextContent) -> RenderResult<()> {
    let node = ctx.nodes.node_mut(id)?;
    let NodeKind::Text(old) = &mut node.kind else {
        return Err(RenderError::WrongKind {
            node: id,
            expected: "text",
        });
    };
    if *old == content {
        return Ok(());
    }
    let before = old.plain_text();
    *old = content;
    let wrap = node.resolved.wrap_mode();
    // Word wrap break positions depend on the text itself, not only its width.
    let remeasure = |after: &str| {
        line_widths(&before) != line_widths(after) || (wrap == WrapMode::Wrap && before != after)
    };
    refresh_measure(ctx, id, remeasure)
}

/// Replace an input leaf's editable state.
pub(crate) fn set_input(ctx: &mut RenderContext, id: NodeId, state: InputState) -> RenderResult<()> {
    let node = ctx.nodes.node_mut(id)?;
    let before = match node.kind.measure(WrapMode::Char) {
        Some(Measure::Input { content, .. }) => content,
        _ => String::new(),
    };
    let NodeKind::Input(old) = &mut node.kind else {
        return Err(RenderError::WrongKind {
            node: id,
            expected: "input",
        });
    };
    if *old == state {
        return Ok(());
    }
    let multiline = state.multiline || old.multiline;
    *old = state;
    refresh_measure(ctx, id, |after| multiline || line_widths(&before) != line_widths(after))
}

/// Push a leaf's current measure data into the oracle. `remeasure` decides,
/// from the new measured text, whether the oracle must recompute its size.
fn refresh_measure(
    ctx: &mut RenderContext,
    id: NodeId,
    remeasure: impl FnOnce(&str) -> bool,
) -> RenderResult<()> {
    let node = ctx.nodes.node_mut(id)?;
    node.paint_dirty = true;
    let oracle = node.oracle;
    if let Some(measure) = node.kind.measure(node.resolved.wrap_mode()) {
        let after = match &measure {
            Measure::Text { content, .. } | Measure::Input { content, .. } => content.clone(),
        };
        ctx.oracle.set_measure(oracle, measure)?;
        if remeasure(&after) {
            ctx.oracle.mark_dirty(oracle)?;
        }
    }
    ctx.dirty.layout = true;
    debug!(node = %id, "content updated");
    Ok(())
}

fn line_widths(text: &str) -> Vec<usize> {
    text.split('\n').map(str_width).collect()
}

/// Remove a node from layout flow without destroying it.
pub(crate) fn hide(ctx: &mut RenderContext, id: NodeId) -> RenderResult<()> {
    set_hidden(ctx, id, true)
}

pub(crate) fn show(ctx: &mut RenderContext, id: NodeId) -> RenderResult<()> {
    set_hidden(ctx, id, false)
}

fn set_hidden(ctx: &mut RenderContext, id: NodeId, hidden: bool) -> RenderResult<()> {
    if id == ctx.root {
        return Err(RenderError::RootImmutable("hidden"));
    }
    let node = ctx.nodes.node_mut(id)?;
    if node.hidden == hidden {
        return Ok(());
    }
    node.hidden = hidden;
    node.stale = true;
    node.paint_dirty = true;
    let (oracle, parent) = (node.oracle, node.parent);
    ctx.oracle.set_display(oracle, !hidden)?;

    // The parent must repaint what the node covered or now covers.
    if let Some(parent) = parent.and_then(|p| ctx.nodes.get_mut(p)) {
        parent.paint_dirty = true;
    }
    ctx.dirty.layout = true;
    ctx.dirty.repaint_all = true;
    debug!(node = %id, hidden, "visibility");
    Ok(())
}

// ============================================================================
// Structural Helpers
// ============================================================================

fn check_attach(ctx: &RenderContext, parent: NodeId, child: NodeId) -> RenderResult<()> {
    let parent_node = ctx.nodes.node(parent)?;
    ctx.nodes.node(child)?;
    if parent_node.kind.is_leaf() {
        return Err(RenderError::NotAContainer(parent));
    }
    if child == ctx.root {
        return Err(RenderError::RootImmutable("re-parented"));
    }
    // `child` may not be `parent` or one of its ancestors.
    let mut cursor = Some(parent);
    while let Some(id) = cursor {
        if id == child {
            return Err(RenderError::WouldCycle { parent, child });
        }
        cursor = ctx.nodes.get(id).and_then(|n| n.parent);
    }
    Ok(())
}

/// Unlink `child` from its current parent in both trees, if it has one.
fn detach(ctx: &mut RenderContext, child: NodeId) -> RenderResult<()> {
    let node = ctx.nodes.node_mut(child)?;
    let Some(parent) = node.parent.take() else {
        return Ok(());
    };
    let child_oracle = node.oracle;

    let parent_node = ctx.nodes.node_mut(parent)?;
    if let NodeKind::Container(children) = &mut parent_node.kind {
        children.0.retain(|&c| c != child);
    }
    parent_node.paint_dirty = true;
    let parent_oracle = parent_node.oracle;

    ctx.oracle.remove_child(parent_oracle, child_oracle)?;
    ctx.dirty.layout = true;
    ctx.dirty.repaint_all = true;
    Ok(())
}

fn attach_at(ctx: &mut RenderContext, parent: NodeId, child: NodeId, index: usize) -> RenderResult<()> {
    let parent_node = ctx.nodes.node_mut(parent)?;
    let NodeKind::Container(children) = &mut parent_node.kind else {
        return Err(RenderError::NotAContainer(parent));
    };
    let index = index.min(children.len());
    children.0.insert(index, child);
    parent_node.paint_dirty = true;
    let parent_oracle = parent_node.oracle;

    let child_node = ctx.nodes.node_mut(child)?;
    child_node.parent = Some(parent);
    child_node.stale = true;
    child_node.paint_dirty = true;
    let child_oracle = child_node.oracle;

    ctx.oracle.insert_child(parent_oracle, child_oracle, index)?;
    ctx.dirty.layout = true;
    ctx.dirty.repaint_all = true;
    Ok(())
}

// ============================================================================
// Host Boundary
// ============================================================================

/// Mutation surface for an external description layer.
pub trait HostTree {
    /// The always-present root container, sized to the viewport.
    fn root(&self) -> NodeId;
    fn create(&mut self, kind: NodeKind, props: Style) -> RenderResult<NodeId>;
    fn append(&mut self, parent: NodeId, child: NodeId) -> RenderResult<()>;
    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) -> RenderResult<()>;
    fn remove(&mut self, parent: NodeId, child: NodeId) -> RenderResult<()>;
    fn update_props(&mut self, node: NodeId, props: Style) -> RenderResult<bool>;
    fn set_text(&mut self, node: NodeId, text: &str) -> RenderResult<()>;
    fn hide(&mut self, node: NodeId) -> RenderResult<()>;
    fn show(&mut self, node: NodeId) -> RenderResult<()>;
}

impl HostTree for RenderContext {
    fn root(&self) -> NodeId {
        self.root
    }

    fn create(&mut self, kind: NodeKind, props: Style) -> RenderResult<NodeId> {
        create(self, kind, props)
    }

    fn append(&mut self, parent: NodeId, child: NodeId) -> RenderResult<()> {
        append(self, parent, child)
    }

    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) -> RenderResult<()> {
        insert_before(self, parent, child, reference)
    }

    fn remove(&mut self, parent: NodeId, child: NodeId) -> RenderResult<()> {
        remove(self, parent, child)
    }

    fn update_props(&mut self, node: NodeId, props: Style) -> RenderResult<bool> {
        update_props(self, node, props)
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> RenderResult<()> {
        set_text(self, node, text)
    }

    fn hide(&mut self, node: NodeId) -> RenderResult<()> {
        hide(self, node)
    }

    fn show(&mut self, node: NodeId) -> RenderResult<()> {
        show(self, node)
    }
}
