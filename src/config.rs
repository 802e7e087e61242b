//! Renderer configuration.
//!
//! Configuration is plain data owned by the render context. It can be built
//! programmatically or loaded from environment variables.

use std::env;

use crate::types::Color;

/// Named column thresholds used by responsive styles.
///
/// Evaluation is mobile-first: the highest threshold that does not exceed
/// the current column count wins. `base` (threshold 0) is implicit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Breakpoints {
    /// Sorted ascending by threshold.
    thresholds: Vec<(String, u16)>,
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self::new([("sm", 40), ("md", 80), ("lg", 120), ("xl", 160)])
    }
}

impl Breakpoints {
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, u16)>) -> Self {
        let mut thresholds: Vec<(String, u16)> = vec![("base".to_string(), 0)];
        for (name, cols) in entries {
            if name == "base" {
                continue;
            }
            thresholds.retain(|(n, _)| n != name);
            thresholds.push((name.to_string(), cols));
        }
        thresholds.sort_by_key(|(_, cols)| *cols);
        Self { thresholds }
    }

    pub fn threshold(&self, name: &str) -> Option<u16> {
        self.thresholds
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, cols)| *cols)
    }

    /// Breakpoint names whose thresholds are at or below `columns`, highest
    /// threshold first.
    pub fn active(&self, columns: u16) -> impl Iterator<Item = &str> {
        self.thresholds
            .iter()
            .rev()
            .filter(move |(_, cols)| *cols <= columns)
            .map(|(name, _)| name.as_str())
    }

    /// Index of the bucket `columns` falls in. Two widths with the same
    /// bucket resolve every responsive value identically.
    pub fn bucket(&self, columns: u16) -> usize {
        self.thresholds
            .iter()
            .rposition(|(_, cols)| *cols <= columns)
            .unwrap_or(0)
    }
}

/// Runtime configuration for the render pipeline.
#[derive(Clone, Debug, Default)]
pub struct RenderConfig {
    pub breakpoints: Breakpoints,
    /// Hardware cursor color requested while an input holds focus.
    pub cursor_color: Option<Color>,
    /// Log per-frame stats at debug level.
    pub debug: bool,
}

impl RenderConfig {
    /// Load configuration from environment variables.
    ///
    /// - `KRAKEN_RENDER_DEBUG`: set to "1" to log frame stats
    /// - `KRAKEN_RENDER_CURSOR_COLOR`: any color accepted by [`Color::parse`]
    pub fn from_env() -> Self {
        let debug = env::var("KRAKEN_RENDER_DEBUG").ok().as_deref() == Some("1");
        let cursor_color = env::var("KRAKEN_RENDER_CURSOR_COLOR")
            .ok()
            .map(|v| Color::parse(&v))
            .filter(|c| !c.is_default());
        Self {
            breakpoints: Breakpoints::default(),
            cursor_color,
            debug,
        }
    }
}
