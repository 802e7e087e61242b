//! Kraken Render — Retained-mode terminal rendering engine.
//!
//! A description layer mutates a persistent node tree through [`HostTree`];
//! each call to [`RenderContext::render`] then runs the frame pipeline:
//!
//! 1. Layout: resolve responsive styles, solve with the flexbox oracle,
//!    extract absolute rectangles (`layout`)
//! 2. Paint: rasterize backgrounds, borders and text into the current
//!    framebuffer in z-order (`render`)
//! 3. Diff: encode the changes against the previous framebuffer as the
//!    fewest escape sequences (`diff`)
//! 4. Write the frame to the [`TerminalBackend`]
//!
//! ```no_run
//! use kraken_render::{CrosstermBackend, HostTree, NodeKind, RenderContext, Style};
//!
//! # fn main() -> kraken_render::RenderResult<()> {
//! let mut ctx = RenderContext::new(Box::new(CrosstermBackend::new()))?;
//! ctx.init()?;
//! let root = ctx.root();
//! let label = ctx.create(NodeKind::text("hello"), Style::from_json(r#"{"bold":true}"#)?)?;
//! ctx.append(root, label)?;
//! ctx.render()?;
//! ctx.shutdown()?;
//! # Ok(())
//! # }
//! ```

mod ansi;
mod config;
mod context;
mod diff;
mod error;
mod layout;
mod oracle;
mod render;
mod style;
mod terminal;
mod text;
mod text_utils;
mod tree;
mod types;

pub use ansi::{parse_styled, strip_ansi, SgrState, StyledRun};
pub use config::{Breakpoints, RenderConfig};
pub use context::{DirtyState, Focus, FrameStats, RenderContext};
pub use diff::{DiffEngine, DiffStats, OutputBuffer};
pub use error::{RenderError, RenderResult};
pub use oracle::{ComputedRect, LayoutOracle, Measure, OracleNode, TaffyOracle};
pub use style::{
    Align, Dimension, Distribute, FlexDirection, FlexWrap, Overflow, Position, ResolvedStyle, Responsive, Side,
    Style, TextAlign, WrapMode,
};
pub use terminal::{CrosstermBackend, HeadlessBackend, MockBackend, TerminalBackend};
pub use text::{measure_input, measure_text, AvailableWidth, InputState, SpanStyle, TextContent, TextSpan};
pub use tree::{Children, HostTree, Node, NodeArena, NodeKind};
pub use types::{
    BorderStyle, Buffer, Cell, CellAttrs, CellStyle, Color, CursorState, Glyph, LayoutRect, NodeId, Rect,
};
