//! Property tests for the frame pipeline under arbitrary mutation sequences.

use kraken_render::*;
use proptest::prelude::*;
use serde_json::{json, Value};

const WIDTH: u16 = 24;
const HEIGHT: u16 = 6;

fn setup() -> (RenderContext, MockBackend) {
    let backend = MockBackend::new(WIDTH, HEIGHT);
    let ctx = RenderContext::new(Box::new(backend.clone())).unwrap();
    (ctx, backend)
}

fn style(json: &str) -> Style {
    Style::from_json(json).unwrap()
}

fn add_row(ctx: &mut RenderContext, list: NodeId, label: &str) -> NodeId {
    let row = ctx.create(NodeKind::text(label), style(r#"{"height":1,"flexShrink":0}"#)).unwrap();
    ctx.append(list, row).unwrap();
    row
}

fn visible_cells(buf: &Buffer) -> usize {
    buf.cells
        .iter()
        .filter(|c| !c.is_continuation() && !c.is_default_blank())
        .count()
}

/// One host mutation against the clipped panel built by `Panel::build`.
#[derive(Debug, Clone)]
enum Op {
    Text(usize, String),
    Input(String),
    Hide(usize),
    Show(usize),
    Reorder(usize, usize),
    Color(usize, &'static str),
    Background(Option<usize>, &'static str),
    Focus(Option<usize>),
}

const COLORS: [&str; 4] = ["red", "green", "blue", "default"];

fn op_strategy() -> impl Strategy<Value = Op> {
    let text = "[a-z世 ]{0,12}";
    prop_oneof![
        (0usize..6, text).prop_map(|(i, t)| Op::Text(i, t)),
        text.prop_map(Op::Input),
        (0usize..7).prop_map(Op::Hide),
        (0usize..7).prop_map(Op::Show),
        (0usize..6, 0usize..6).prop_map(|(a, b)| Op::Reorder(a, b)),
        (0usize..7, prop::sample::select(COLORS.to_vec())).prop_map(|(i, c)| Op::Color(i, c)),
        (prop::option::of(0usize..7), prop::sample::select(COLORS.to_vec())).prop_map(|(i, c)| Op::Background(i, c)),
        prop::option::of(0usize..12).prop_map(Op::Focus),
    ]
}

/// A bordered `overflow: hidden` panel whose content overflows it: a row
/// holding t0/t1, texts t2..t4, an input, and an absolute overlay t5.
struct Panel {
    panel: NodeId,
    /// t0..t5 then the input.
    leaves: Vec<NodeId>,
    /// Authored props per leaf, panel last.
    props: Vec<Value>,
}

impl Panel {
    const INPUT: usize = 6;

    fn build(ctx: &mut RenderContext) -> Panel {
        let root = ctx.root();
        let panel_props = json!({
            "flexDirection": "column", "width": 12, "height": 5,
            "overflow": "hidden", "border": "single"
        });
        let panel = ctx.create(NodeKind::container(), props(&panel_props)).unwrap();
        ctx.append(root, panel).unwrap();
        let pair = ctx.create(NodeKind::container(), style(r#"{"flexShrink":0}"#)).unwrap();
        ctx.append(panel, pair).unwrap();

        let item = json!({"flexShrink": 0});
        let overlay = json!({"position": "absolute", "top": 2, "left": 4, "zIndex": 1});
        let mut leaves = Vec::new();
        let mut all = Vec::new();
        for i in 0..6 {
            let leaf_props = if i == 5 { overlay.clone() } else { item.clone() };
            let id = ctx.create(NodeKind::text(format!("t{i}")), props(&leaf_props)).unwrap();
            ctx.append(if i < 2 { pair } else { panel }, id).unwrap();
            leaves.push(id);
            all.push(leaf_props);
        }
        let input = ctx.create(NodeKind::input(InputState::default()), props(&item)).unwrap();
        ctx.append(panel, input).unwrap();
        leaves.push(input);
        all.push(item);
        all.push(panel_props);
        Panel { panel, leaves, props: all }
    }

    fn apply(&mut self, ctx: &mut RenderContext, op: &Op) {
        match op {
            Op::Text(i, t) => ctx.set_text(self.leaves[*i], t).unwrap(),
            Op::Input(v) => {
                let state = InputState {
                    value: v.clone(),
                    ..InputState::default()
                };
                ctx.set_input(self.leaves[Self::INPUT], state).unwrap();
            }
            Op::Hide(i) => ctx.hide(self.leaves[*i]).unwrap(),
            Op::Show(i) => ctx.show(self.leaves[*i]).unwrap(),
            Op::Reorder(a, b) => {
                let children = ctx.node(self.panel).unwrap().children().to_vec();
                let (a, b) = (children[a % children.len()], children[b % children.len()]);
                if a != b {
                    ctx.insert_before(self.panel, a, b).unwrap();
                }
            }
            Op::Color(i, c) => self.restyle(ctx, Some(*i), "color", c),
            Op::Background(i, c) => self.restyle(ctx, *i, "bg", c),
            Op::Focus(cursor) => {
                let focus = (*cursor).map(|cursor| Focus {
                    node: self.leaves[Self::INPUT],
                    cursor,
                });
                ctx.set_focus(focus).unwrap();
            }
        }
    }

    /// Set one paint property on a leaf, or on the panel with `None`.
    fn restyle(&mut self, ctx: &mut RenderContext, leaf: Option<usize>, key: &str, color: &str) {
        let slot = leaf.unwrap_or(self.props.len() - 1);
        self.props[slot][key] = json!(color);
        let target = leaf.map_or(self.panel, |i| self.leaves[i]);
        ctx.update_props(target, props(&self.props[slot])).unwrap();
    }
}

fn props(value: &Value) -> Style {
    Style::from_json(&value.to_string()).unwrap()
}

fn screen(ctx: &RenderContext) -> Vec<Cell> {
    ctx.front_buffer.cells.clone()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Appending at the tail and dropping the head keeps survivors on
    /// contiguous rows and the oracle's structure in step with the tree.
    #[test]
    fn prop_sliding_window_stays_contiguous(ops in prop::collection::vec(any::<bool>(), 1..40)) {
        let (mut ctx, _) = setup();
        let root = ctx.root();
        let list = ctx
            .create(NodeKind::container(), style(r#"{"flexDirection":"column","overflow":"hidden","width":"100%"}"#))
            .unwrap();
        ctx.append(root, list).unwrap();

        let mut live: Vec<(NodeId, String)> = Vec::new();
        let mut next = 0;
        for append in ops {
            if append || live.is_empty() {
                let label = format!("r{next:03}");
                next += 1;
                let id = add_row(&mut ctx, list, &label);
                live.push((id, label));
            } else {
                let (id, _) = live.remove(0);
                ctx.remove(list, id).unwrap();
            }
            ctx.render().unwrap();

            let node = ctx.node(list).unwrap();
            prop_assert_eq!(node.children().len(), live.len());
            prop_assert_eq!(ctx.oracle.child_count(node.oracle), live.len());
            for (i, (id, label)) in live.iter().enumerate() {
                prop_assert_eq!(ctx.node(*id).unwrap().layout.outer.y, i as i32);
                if i < HEIGHT as usize {
                    prop_assert!(ctx.front_buffer.row_text(i as u16).starts_with(label.as_str()));
                }
            }
            for y in live.len()..HEIGHT as usize {
                let row = ctx.front_buffer.row_text(y as u16);
                prop_assert_eq!(row.trim(), "");
            }
        }
    }

    /// Column counts in the same breakpoint bucket resolve identically.
    #[test]
    fn prop_same_bucket_same_resolution(a in 0u16..220, b in 0u16..220) {
        let authored = style(
            r#"{"width":{"base":1,"sm":2,"md":3,"lg":4,"xl":5},
                "color":{"md":"red"},
                "bold":{"sm":true,"lg":false},
                "padding":1}"#,
        );
        let breakpoints = Breakpoints::default();
        let (ra, rb) = (authored.resolve(&breakpoints, a), authored.resolve(&breakpoints, b));
        if breakpoints.bucket(a) == breakpoints.bucket(b) {
            prop_assert_eq!(ra, rb);
        } else {
            prop_assert_ne!(ra.width, rb.width);
        }
    }

    /// Rendering twice without mutations writes nothing the second time.
    #[test]
    fn prop_second_frame_is_empty(texts in prop::collection::vec("[a-zA-Z ]{0,30}", 1..6)) {
        let (mut ctx, backend) = setup();
        let root = ctx.root();
        let list = ctx.create(NodeKind::container(), style(r#"{"flexDirection":"column"}"#)).unwrap();
        ctx.append(root, list).unwrap();
        for text in &texts {
            let leaf = ctx.create(NodeKind::text(text.as_str()), Style::default()).unwrap();
            ctx.append(list, leaf).unwrap();
        }
        ctx.render().unwrap();
        let flushes = backend.flush_count();
        ctx.render().unwrap();
        prop_assert_eq!(backend.flush_count(), flushes);
        prop_assert_eq!(ctx.stats.diff_bytes, 0);
    }

    /// A forced full redraw is deterministic and writes each visible cell
    /// exactly once.
    #[test]
    fn prop_full_redraw_is_deterministic(
        texts in prop::collection::vec("[a-z世界 ]{0,12}", 1..5),
        colored in any::<bool>(),
    ) {
        let (mut ctx, backend) = setup();
        let root = ctx.root();
        let bg = if colored { r#"{"flexDirection":"column","bg":"blue"}"# } else { r#"{"flexDirection":"column"}"# };
        let list = ctx.create(NodeKind::container(), style(bg)).unwrap();
        ctx.append(root, list).unwrap();
        for text in &texts {
            let leaf = ctx.create(NodeKind::text(text.as_str()), style(r#"{"wrap":"char"}"#)).unwrap();
            ctx.append(list, leaf).unwrap();
        }
        ctx.render().unwrap();

        ctx.invalidate();
        ctx.render().unwrap();
        let first = backend.last_frame().unwrap();
        prop_assert_eq!(ctx.stats.cells_written, visible_cells(&ctx.front_buffer));

        ctx.invalidate();
        ctx.render().unwrap();
        let second = backend.last_frame().unwrap();
        prop_assert_eq!(first, second);
    }

    /// Incremental frames leave the screen identical to a fresh render of
    /// the same tree.
    #[test]
    fn prop_incremental_matches_fresh(
        before in prop::collection::vec("[a-z]{0,10}", 3),
        after in prop::collection::vec("[a-z]{0,10}", 3),
    ) {
        let build = |texts: &[String]| {
            let (mut ctx, _) = setup();
            let root = ctx.root();
            let list = ctx.create(NodeKind::container(), style(r#"{"flexDirection":"column"}"#)).unwrap();
            ctx.append(root, list).unwrap();
            let leaves: Vec<NodeId> = texts
                .iter()
                .map(|t| add_row(&mut ctx, list, t))
                .collect();
            ctx.render().unwrap();
            (ctx, leaves)
        };

        let (mut incremental, leaves) = build(&before);
        for (leaf, text) in leaves.iter().zip(&after) {
            incremental.set_text(*leaf, text).unwrap();
        }
        incremental.render().unwrap();
        let (fresh, _) = build(&after);

        for y in 0..HEIGHT {
            prop_assert_eq!(incremental.front_buffer.row_text(y), fresh.front_buffer.row_text(y));
        }
    }

    /// Any mix of content, visibility, order, color and focus changes under
    /// a clipped, overflowing parent leaves the same cells as a full redraw.
    #[test]
    fn prop_mutations_match_full_redraw(ops in prop::collection::vec(op_strategy(), 1..12)) {
        let (mut ctx, _) = setup();
        let mut panel = Panel::build(&mut ctx);
        ctx.render().unwrap();

        for op in &ops {
            panel.apply(&mut ctx, op);
            ctx.render().unwrap();
            let incremental = screen(&ctx);

            ctx.invalidate();
            ctx.render().unwrap();
            prop_assert_eq!(&incremental, &screen(&ctx), "after {:?}", op);
        }
    }
}
