//! RenderContext: the single owner of all pipeline state.
//!
//! The context owns the node arena, the layout oracle, both framebuffers,
//! the diff engine and the terminal backend. Description layers mutate it
//! through [`HostTree`](crate::tree::HostTree) and present it with
//! [`RenderContext::render`].

use std::time::Duration;

use crate::config::RenderConfig;
use crate::diff::DiffEngine;
use crate::error::{RenderError, RenderResult};
use crate::oracle::{LayoutOracle, TaffyOracle};
use crate::style::{Dimension, Style};
use crate::terminal::TerminalBackend;
use crate::text::{InputState, TextSpan};
use crate::text_utils::grapheme_count;
use crate::tree::{self, Node, NodeArena, NodeKind};
use crate::types::{Buffer, NodeId};

/// Pending work carried between mutations and the next frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyState {
    /// Geometry may have changed; the next frame must run a layout pass.
    pub layout: bool,
    /// Cleared only after paint: everything must be repainted.
    pub repaint_all: bool,
}

/// The focused input and its cursor, as a grapheme offset into the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Focus {
    pub node: NodeId,
    pub cursor: usize,
}

/// Timings and counts from the last frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames: u64,
    pub layout_ran: bool,
    pub layout: Duration,
    pub paint: Duration,
    /// Nodes repainted this frame.
    pub painted: usize,
    pub diff_bytes: usize,
    pub cells_written: usize,
    pub moves: usize,
}

pub struct RenderContext {
    // Tree
    pub nodes: NodeArena,
    pub oracle: Box<dyn LayoutOracle>,
    pub root: NodeId,
    pub dirty: DirtyState,

    // Inputs
    pub focus: Option<Focus>,
    pub config: RenderConfig,

    // Render
    pub front_buffer: Buffer,
    pub back_buffer: Buffer,
    pub diff: DiffEngine,
    pub backend: Box<dyn TerminalBackend>,
    /// The next frame must clear the screen and repaint everything.
    pub full_redraw_pending: bool,

    // Diagnostics
    pub stats: FrameStats,
}

impl RenderContext {
    pub fn new(backend: Box<dyn TerminalBackend>) -> RenderResult<Self> {
        Self::with_config(backend, RenderConfig::default())
    }

    pub fn with_config(backend: Box<dyn TerminalBackend>, config: RenderConfig) -> RenderResult<Self> {
        Self::with_oracle(backend, Box::new(TaffyOracle::new()), config)
    }

    /// Build a context over any layout oracle.
    pub fn with_oracle(
        backend: Box<dyn TerminalBackend>,
        mut oracle: Box<dyn LayoutOracle>,
        config: RenderConfig,
    ) -> RenderResult<Self> {
        let (w, h) = backend.size();

        let root_style = Style {
            width: Some(Dimension::Percent(100.0).into()),
            height: Some(Dimension::Percent(100.0).into()),
            ..Style::default()
        };
        let mut nodes = NodeArena::new();
        let root_oracle = oracle.create_node(false)?;
        let root = nodes.insert(Node::new(NodeKind::container(), root_style, root_oracle));

        Ok(Self {
            nodes,
            oracle,
            root,
            dirty: DirtyState {
                layout: true,
                repaint_all: true,
            },
            focus: None,
            config,
            front_buffer: Buffer::new(w, h),
            back_buffer: Buffer::new(w, h),
            diff: DiffEngine::new(),
            backend,
            full_redraw_pending: true,
            stats: FrameStats::default(),
        })
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Focus an input leaf with the cursor at a grapheme offset, or clear
    /// focus with `None`. The cursor is clamped to the end of the value.
    pub fn set_focus(&mut self, focus: Option<Focus>) -> RenderResult<()> {
        let focus = match focus {
            Some(f) => match &self.nodes.node(f.node)?.kind {
                NodeKind::Input(state) => Some(Focus {
                    cursor: f.cursor.min(grapheme_count(&state.display_value())),
                    ..f
                }),
                _ => {
                    return Err(RenderError::WrongKind {
                        node: f.node,
                        expected: "input",
                    })
                }
            },
            None => None,
        };
        if self.focus == focus {
            return Ok(());
        }
        for id in [self.focus.map(|f| f.node), focus.map(|f| f.node)].into_iter().flatten() {
            if let Some(node) = self.nodes.get_mut(id) {
                node.paint_dirty = true;
            }
        }
        self.focus = focus;
        Ok(())
    }

    pub fn set_spans(&mut self, id: NodeId, spans: Vec<TextSpan>) -> RenderResult<()> {
        tree::set_spans(self, id, spans)
    }

    pub fn set_input(&mut self, id: NodeId, state: InputState) -> RenderResult<()> {
        tree::set_input(self, id, state)
    }

    /// Force the next frame to clear the screen and repaint from scratch.
    pub fn invalidate(&mut self) {
        self.full_redraw_pending = true;
    }

    /// Run layout without presenting a frame. Returns whether a pass ran.
    pub fn compute_layout(&mut self) -> RenderResult<bool> {
        let (w, h) = self.backend.size();
        crate::layout::compute_layout(self, w, h, false)
    }

    /// Present one frame: layout, paint, diff, write.
    pub fn render(&mut self) -> RenderResult<()> {
        crate::render::render(self)
    }

    pub fn init(&mut self) -> RenderResult<()> {
        self.backend.init()?;
        self.full_redraw_pending = true;
        Ok(())
    }

    pub fn shutdown(&mut self) -> RenderResult<()> {
        self.backend.shutdown()
    }
}
