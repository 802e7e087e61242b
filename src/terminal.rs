//! TerminalBackend trait + CrosstermBackend implementation.
//!
//! The pipeline writes finished escape-sequence frames through this trait,
//! never to stdout directly, so frames can be captured by a memory backend
//! in tests.

use std::io::Write;

use crate::error::RenderResult;

// ============================================================================
// TerminalBackend Trait
// ============================================================================

pub trait TerminalBackend {
    fn init(&mut self) -> RenderResult<()>;
    fn shutdown(&mut self) -> RenderResult<()>;
    /// Current size as (columns, rows).
    fn size(&self) -> (u16, u16);
    /// Write one frame's bytes. Called at most once per frame.
    fn write(&mut self, bytes: &[u8]) -> RenderResult<()>;
    fn flush(&mut self) -> RenderResult<()>;
}

// ============================================================================
// CrosstermBackend
// ============================================================================

pub struct CrosstermBackend {
    width: u16,
    height: u16,
    out: std::io::Stdout,
}

impl CrosstermBackend {
    pub fn new() -> Self {
        let (w, h) = crossterm::terminal::size().unwrap_or((80, 24));
        Self {
            width: w,
            height: h,
            out: std::io::stdout(),
        }
    }
}

impl Default for CrosstermBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalBackend for CrosstermBackend {
    fn init(&mut self) -> RenderResult<()> {
        use crossterm::{
            cursor,
            terminal::{enable_raw_mode, EnterAlternateScreen},
            ExecutableCommand,
        };

        enable_raw_mode()?;
        self.out.execute(EnterAlternateScreen)?;
        // Frames show the cursor explicitly when an input is focused.
        self.out.execute(cursor::Hide)?;

        let (w, h) = crossterm::terminal::size().unwrap_or((80, 24));
        self.width = w;
        self.height = h;
        tracing::debug!(width = w, height = h, "terminal initialized");
        Ok(())
    }

    fn shutdown(&mut self) -> RenderResult<()> {
        use crossterm::{
            cursor,
            style::ResetColor,
            terminal::{disable_raw_mode, LeaveAlternateScreen},
            ExecutableCommand,
        };

        self.out.execute(ResetColor)?;
        self.out.execute(cursor::Show)?;
        self.out.execute(LeaveAlternateScreen)?;
        disable_raw_mode()?;
        Ok(())
    }

    fn size(&self) -> (u16, u16) {
        crossterm::terminal::size().unwrap_or((self.width, self.height))
    }

    fn write(&mut self, bytes: &[u8]) -> RenderResult<()> {
        self.out.write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> RenderResult<()> {
        self.out.flush()?;
        Ok(())
    }
}

// ============================================================================
// HeadlessBackend (for CI environments)
// ============================================================================

/// Fixed-size backend that discards output.
pub struct HeadlessBackend {
    pub width: u16,
    pub height: u16,
}

impl HeadlessBackend {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }
}

impl TerminalBackend for HeadlessBackend {
    fn init(&mut self) -> RenderResult<()> {
        Ok(())
    }

    fn shutdown(&mut self) -> RenderResult<()> {
        Ok(())
    }

    fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    fn write(&mut self, _bytes: &[u8]) -> RenderResult<()> {
        Ok(())
    }

    fn flush(&mut self) -> RenderResult<()> {
        Ok(())
    }
}

// ============================================================================
// MockBackend
// ============================================================================

/// Resizable in-memory backend recording every frame written to it.
///
/// The log is shared through an `Rc` so a test can keep a handle after
/// boxing the backend into a context.
#[derive(Clone)]
pub struct MockBackend {
    state: std::rc::Rc<std::cell::RefCell<MockState>>,
}

#[derive(Default)]
struct MockState {
    width: u16,
    height: u16,
    frames: Vec<Vec<u8>>,
    pending: Vec<u8>,
    flushes: usize,
}

impl MockBackend {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            state: std::rc::Rc::new(std::cell::RefCell::new(MockState {
                width,
                height,
                ..MockState::default()
            })),
        }
    }

    pub fn set_size(&self, width: u16, height: u16) {
        let mut state = self.state.borrow_mut();
        state.width = width;
        state.height = height;
    }

    /// Flushed frames, oldest first.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.state.borrow().frames.clone()
    }

    pub fn last_frame(&self) -> Option<Vec<u8>> {
        self.state.borrow().frames.last().cloned()
    }

    pub fn flush_count(&self) -> usize {
        self.state.borrow().flushes
    }

    pub fn clear_frames(&self) {
        self.state.borrow_mut().frames.clear();
    }
}

impl TerminalBackend for MockBackend {
    fn init(&mut self) -> RenderResult<()> {
        Ok(())
    }

    fn shutdown(&mut self) -> RenderResult<()> {
        Ok(())
    }

    fn size(&self) -> (u16, u16) {
        let state = self.state.borrow();
        (state.width, state.height)
    }

    fn write(&mut self, bytes: &[u8]) -> RenderResult<()> {
        self.state.borrow_mut().pending.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> RenderResult<()> {
        let mut state = self.state.borrow_mut();
        let frame = std::mem::take(&mut state.pending);
        state.frames.push(frame);
        state.flushes += 1;
        Ok(())
    }
}
