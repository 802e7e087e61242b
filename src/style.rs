//! Style Module — Authored and resolved styles.
//!
//! Responsibilities:
//! - The flat authored `Style` record, deserializable from JSON props
//! - Breakpoint-conditional (`Responsive`) values
//! - Pure resolution of a `Style` against a column count into a `ResolvedStyle`
//! - Emphasis and color inheritance helpers used by the paint engine

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

use crate::config::Breakpoints;
use crate::error::RenderResult;
use crate::types::{BorderStyle, CellAttrs, Color};

// ============================================================================
// Responsive Values
// ============================================================================

/// A concrete value or a map from breakpoint name to value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Responsive<T> {
    // Map first: some value types accept anything and would swallow it.
    Breakpoints(BTreeMap<String, T>),
    Value(T),
}

impl<T: Clone> Responsive<T> {
    pub fn resolve(&self, breakpoints: &Breakpoints, columns: u16) -> Option<T> {
        match self {
            Responsive::Value(v) => Some(v.clone()),
            Responsive::Breakpoints(map) => breakpoints
                .active(columns)
                .find_map(|name| map.get(name).cloned()),
        }
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self, Responsive::Breakpoints(_))
    }
}

impl<T> From<T> for Responsive<T> {
    fn from(v: T) -> Self {
        Responsive::Value(v)
    }
}

// ============================================================================
// Value Types
// ============================================================================

/// A size or offset: absolute cells, a percentage of the parent, or auto.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Dimension {
    #[default]
    Auto,
    Cells(f32),
    Percent(f32),
}

impl Dimension {
    pub fn parse(input: &str) -> Dimension {
        let s = input.trim();
        if let Some(pct) = s.strip_suffix('%') {
            return pct
                .trim()
                .parse::<f32>()
                .map(Dimension::Percent)
                .unwrap_or_default();
        }
        s.parse::<f32>().map(Dimension::Cells).unwrap_or_default()
    }
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f32),
            Text(String),
            Other(serde_json::Value),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Dimension::Cells(n),
            Raw::Text(s) => Dimension::parse(&s),
            Raw::Other(_) => Dimension::Auto,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlexDirection {
    #[default]
    Row,
    Column,
    RowReverse,
    ColumnReverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlexWrap {
    #[default]
    #[serde(alias = "no-wrap")]
    Nowrap,
    Wrap,
    WrapReverse,
}

/// Distribution of free space along an axis (justify-content, align-content).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Distribute {
    #[serde(alias = "start")]
    FlexStart,
    #[serde(alias = "end")]
    FlexEnd,
    Center,
    Stretch,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
}

/// Cross-axis placement of items (align-items, align-self).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Align {
    #[serde(alias = "start")]
    FlexStart,
    #[serde(alias = "end")]
    FlexEnd,
    Center,
    Stretch,
    Baseline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    #[default]
    Relative,
    Absolute,
}

/// `Hidden` is the clip contract: children are bounded to the inner rect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Overflow {
    #[default]
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WrapMode {
    /// Word wrap, breaking inside a word only when it alone overflows.
    #[default]
    Wrap,
    /// Break at any grapheme.
    Char,
    #[serde(alias = "truncate-end")]
    Truncate,
    Ellipsis,
    #[serde(alias = "nowrap")]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

// ============================================================================
// Style Record
// ============================================================================

macro_rules! style_record {
    ($( $(#[$meta:meta])* $field:ident : $ty:ty ),* $(,)?) => {
        /// Authored style. Every property is optional and may be responsive.
        #[derive(Debug, Clone, PartialEq, Default, Deserialize)]
        #[serde(rename_all = "camelCase", default)]
        pub struct Style {
            $( $(#[$meta])* pub $field: Option<Responsive<$ty>>, )*
        }

        /// Style with every breakpoint map collapsed for one column count.
        #[derive(Debug, Clone, PartialEq, Default)]
        pub struct ResolvedStyle {
            $( pub $field: Option<$ty>, )*
        }

        impl Style {
            /// Whether any property depends on the terminal width.
            pub fn is_responsive(&self) -> bool {
                false $( || self.$field.as_ref().is_some_and(Responsive::is_conditional) )*
            }

            /// Resolve against `columns`. Pure: same inputs, equal output.
            pub fn resolve(&self, breakpoints: &Breakpoints, columns: u16) -> ResolvedStyle {
                ResolvedStyle {
                    $( $field: self.$field.as_ref().and_then(|v| v.resolve(breakpoints, columns)), )*
                }
            }
        }
    };
}

style_record! {
    // Flex container
    flex_direction: FlexDirection,
    flex_wrap: FlexWrap,
    justify_content: Distribute,
    align_items: Align,
    align_content: Distribute,
    gap: f32,
    row_gap: f32,
    column_gap: f32,

    // Flex item
    flex_grow: f32,
    flex_shrink: f32,
    flex_basis: Dimension,
    align_self: Align,

    // Size
    width: Dimension,
    height: Dimension,
    min_width: Dimension,
    min_height: Dimension,
    max_width: Dimension,
    max_height: Dimension,

    // Spacing
    padding: f32,
    padding_x: f32,
    padding_y: f32,
    padding_top: f32,
    padding_right: f32,
    padding_bottom: f32,
    padding_left: f32,
    margin: f32,
    margin_x: f32,
    margin_y: f32,
    margin_top: f32,
    margin_right: f32,
    margin_bottom: f32,
    margin_left: f32,

    // Positioning
    position: Position,
    top: Dimension,
    right: Dimension,
    bottom: Dimension,
    left: Dimension,
    overflow: Overflow,
    z_index: i32,

    // Paint
    color: Color,
    #[serde(alias = "bg")]
    background_color: Color,
    #[serde(alias = "border")]
    border_style: BorderStyle,
    border_color: Color,
    bold: bool,
    dim: bool,
    italic: bool,
    underline: bool,
    inverse: bool,
    strikethrough: bool,

    // Text
    wrap: WrapMode,
    text_align: TextAlign,
}

impl Style {
    /// Parse a JSON props object.
    pub fn from_json(json: &str) -> RenderResult<Style> {
        Ok(serde_json::from_str(json)?)
    }
}

impl ResolvedStyle {
    pub fn border(&self) -> BorderStyle {
        self.border_style.unwrap_or_default()
    }

    pub fn clips(&self) -> bool {
        self.overflow == Some(Overflow::Hidden)
    }

    pub fn is_absolute(&self) -> bool {
        self.position == Some(Position::Absolute)
    }

    pub fn wrap_mode(&self) -> WrapMode {
        self.wrap.unwrap_or_default()
    }

    pub fn align(&self) -> TextAlign {
        self.text_align.unwrap_or_default()
    }

    /// Apply this node's emphasis on top of inherited attributes. An unset
    /// flag inherits; `false` explicitly clears.
    pub fn apply_emphasis(&self, inherited: CellAttrs) -> CellAttrs {
        let mut attrs = inherited;
        for (flag, value) in [
            (CellAttrs::BOLD, self.bold),
            (CellAttrs::DIM, self.dim),
            (CellAttrs::ITALIC, self.italic),
            (CellAttrs::UNDERLINE, self.underline),
            (CellAttrs::INVERSE, self.inverse),
            (CellAttrs::STRIKETHROUGH, self.strikethrough),
        ] {
            if let Some(on) = value {
                attrs.set(flag, on);
            }
        }
        attrs
    }

    /// Resolve a per-side padding value, most specific first.
    pub fn padding_side(&self, side: Side) -> f32 {
        let (specific, axis) = match side {
            Side::Top => (self.padding_top, self.padding_y),
            Side::Bottom => (self.padding_bottom, self.padding_y),
            Side::Left => (self.padding_left, self.padding_x),
            Side::Right => (self.padding_right, self.padding_x),
        };
        specific.or(axis).or(self.padding).unwrap_or(0.0).max(0.0)
    }

    pub fn margin_side(&self, side: Side) -> f32 {
        let (specific, axis) = match side {
            Side::Top => (self.margin_top, self.margin_y),
            Side::Bottom => (self.margin_bottom, self.margin_y),
            Side::Left => (self.margin_left, self.margin_x),
            Side::Right => (self.margin_right, self.margin_x),
        };
        specific.or(axis).or(self.margin).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

/// Inherited color: a node's own color if set, otherwise its parent's.
pub(crate) fn inherit_color(own: Option<Color>, inherited: Color) -> Color {
    match own {
        Some(c) if !c.is_default() => c,
        _ => inherited,
    }
}
