//! End-to-end frame properties: tree mutations in, terminal bytes out.

use kraken_render::*;

fn setup(width: u16, height: u16) -> (RenderContext, MockBackend) {
    let backend = MockBackend::new(width, height);
    let ctx = RenderContext::new(Box::new(backend.clone())).unwrap();
    (ctx, backend)
}

fn add(ctx: &mut RenderContext, parent: NodeId, kind: NodeKind, json: &str) -> NodeId {
    let id = ctx.create(kind, Style::from_json(json).unwrap()).unwrap();
    ctx.append(parent, id).unwrap();
    id
}

fn outer(ctx: &RenderContext, id: NodeId) -> Rect {
    ctx.node(id).unwrap().layout.outer
}

fn last_frame(backend: &MockBackend) -> String {
    String::from_utf8(backend.last_frame().unwrap()).unwrap()
}

#[test]
fn test_idle_frame_writes_zero_bytes() {
    let (mut ctx, backend) = setup(40, 10);
    let root = ctx.root();
    let column = add(&mut ctx, root, NodeKind::container(), r#"{"flexDirection":"column","border":"rounded"}"#);
    add(&mut ctx, column, NodeKind::text("status: ok"), r#"{"color":"green"}"#);
    ctx.render().unwrap();
    assert_eq!(backend.frames().len(), 1);
    backend.clear_frames();

    ctx.render().unwrap();
    ctx.render().unwrap();
    assert!(backend.frames().is_empty());
    assert_eq!(backend.flush_count(), 1);
    assert_eq!(ctx.stats.diff_bytes, 0);
}

#[test]
fn test_equal_props_do_not_dirty() {
    let (mut ctx, backend) = setup(40, 10);
    let root = ctx.root();
    let label = add(&mut ctx, root, NodeKind::text("x"), r#"{"bold":true,"width":5}"#);
    ctx.render().unwrap();
    let frames = backend.frames().len();

    let changed = ctx
        .update_props(label, Style::from_json(r#"{"width":5,"bold":true}"#).unwrap())
        .unwrap();
    assert!(!changed);
    ctx.render().unwrap();
    assert_eq!(backend.frames().len(), frames);
    assert!(!ctx.stats.layout_ran);
}

#[test]
fn test_reposition_count_matches_changed_runs() {
    let (mut ctx, _) = setup(20, 2);
    let root = ctx.root();
    let label = add(&mut ctx, root, NodeKind::text("abcdefghij"), "{}");
    ctx.render().unwrap();

    ctx.set_text(label, "aXcdeYYhij").unwrap();
    ctx.render().unwrap();
    assert_eq!(ctx.stats.cells_written, 3);
    assert_eq!(ctx.stats.moves, 2);
}

#[test]
fn test_wide_glyph_does_not_force_reposition() {
    let (mut ctx, _) = setup(20, 2);
    let root = ctx.root();
    let label = add(&mut ctx, root, NodeKind::text("世a"), "{}");
    ctx.render().unwrap();

    ctx.set_text(label, "界b").unwrap();
    ctx.render().unwrap();
    assert_eq!(ctx.stats.cells_written, 2);
    assert_eq!(ctx.stats.moves, 1);
}

#[test]
fn test_sibling_keeps_row_when_text_shrinks() {
    let (mut ctx, _) = setup(20, 5);
    let root = ctx.root();
    let column = add(&mut ctx, root, NodeKind::container(), r#"{"flexDirection":"column"}"#);
    let short = add(&mut ctx, column, NodeKind::text("Short"), "{}");
    let world = add(&mut ctx, column, NodeKind::text("World"), "{}");
    ctx.render().unwrap();
    assert_eq!(outer(&ctx, world).y, 1);

    ctx.set_text(short, "Hi").unwrap();
    ctx.render().unwrap();
    assert_eq!(outer(&ctx, world).y, 1);
    assert!(ctx.front_buffer.row_text(0).starts_with("Hi "));
    assert!(ctx.front_buffer.row_text(1).starts_with("World"));
}

#[test]
fn test_moved_container_moves_children() {
    let (mut ctx, _) = setup(20, 6);
    let root = ctx.root();
    let column = add(&mut ctx, root, NodeKind::container(), r#"{"flexDirection":"column"}"#);
    let header = add(&mut ctx, column, NodeKind::text("one"), r#"{"flexShrink":0}"#);
    let body = add(&mut ctx, column, NodeKind::container(), r#"{"paddingLeft":2,"flexShrink":0}"#);
    let leaf = add(&mut ctx, body, NodeKind::text("leaf"), "{}");
    ctx.render().unwrap();
    assert_eq!(outer(&ctx, leaf), Rect::new(2, 1, 4, 1));

    ctx.set_text(header, "one\ntwo").unwrap();
    ctx.render().unwrap();
    assert_eq!(outer(&ctx, leaf), Rect::new(2, 2, 4, 1));
    assert!(ctx.front_buffer.row_text(2).starts_with("  leaf"));
    assert!(!ctx.front_buffer.row_text(1).contains("leaf"));
}

#[test]
fn test_clip_and_absolute_escape() {
    let (mut ctx, _) = setup(30, 8);
    let root = ctx.root();
    let panel = add(
        &mut ctx,
        root,
        NodeKind::container(),
        r#"{"flexDirection":"column","width":12,"height":4,"border":"single","overflow":"hidden"}"#,
    );
    for i in 0..5 {
        let item = add(&mut ctx, panel, NodeKind::container(), r#"{"height":1,"flexShrink":0}"#);
        add(&mut ctx, item, NodeKind::text(format!("item{i}")), "{}");
        if i == 4 {
            add(
                &mut ctx,
                item,
                NodeKind::text("tooltip"),
                r#"{"position":"absolute","top":1,"left":0}"#,
            );
        }
    }
    ctx.render().unwrap();

    let rows: Vec<String> = (0..8).map(|y| ctx.front_buffer.row_text(y)).collect();
    assert!(rows[1].contains("item0"));
    assert!(rows[2].contains("item1"));
    assert!(rows.iter().all(|r| !r.contains("item2") && !r.contains("item4")));
    assert!(rows[3].starts_with("└"));
    // item4 sits at row 5; its absolute child lands one row below.
    assert!(rows[6].contains("tooltip"));
}

#[test]
fn test_full_redraw_writes_every_cell_once() {
    let (mut ctx, backend) = setup(16, 4);
    let root = ctx.root();
    let column = add(&mut ctx, root, NodeKind::container(), r#"{"flexDirection":"column","bg":"blue"}"#);
    add(&mut ctx, column, NodeKind::text("abc"), "{}");
    add(&mut ctx, column, NodeKind::text("宽字"), "{}");
    ctx.render().unwrap();

    ctx.invalidate();
    ctx.render().unwrap();
    let frame = last_frame(&backend);
    assert!(frame.starts_with("\x1b[?2026h\x1b[r\x1b[2J\x1b[1;1H"));

    let buf = &ctx.front_buffer;
    let visible = buf
        .cells
        .iter()
        .filter(|c| !c.is_continuation() && !c.is_default_blank())
        .count();
    assert_eq!(ctx.stats.cells_written, visible);
    assert_eq!(frame.matches('宽').count(), 1);
    assert_eq!(frame.matches('字').count(), 1);
}

#[test]
fn test_focused_input_shows_cursor_with_color() {
    let backend = MockBackend::new(20, 3);
    let config = RenderConfig {
        cursor_color: Some(Color::Rgb(0, 255, 0)),
        ..RenderConfig::default()
    };
    let mut ctx = RenderContext::with_config(Box::new(backend.clone()), config).unwrap();
    let root = ctx.root();
    let state = InputState {
        value: "hey".into(),
        ..InputState::default()
    };
    let input = add(&mut ctx, root, NodeKind::input(state), r#"{"width":10}"#);
    ctx.set_focus(Some(Focus { node: input, cursor: 1 })).unwrap();
    ctx.render().unwrap();
    let frame = last_frame(&backend);
    assert!(frame.contains("\x1b[1;2H"));
    assert!(frame.contains("\x1b]12;#00ff00\x07"));

    ctx.set_focus(None).unwrap();
    ctx.render().unwrap();
    let frame = last_frame(&backend);
    assert!(frame.contains("\x1b[?25l"));
    assert!(!frame.contains("\x1b[?25h"));
}

#[test]
fn test_responsive_width_follows_terminal() {
    let (mut ctx, backend) = setup(100, 5);
    let root = ctx.root();
    let side = add(&mut ctx, root, NodeKind::container(), r#"{"width":{"base":10,"lg":30},"height":1}"#);
    ctx.render().unwrap();
    assert_eq!(outer(&ctx, side).width, 10);

    backend.set_size(130, 5);
    ctx.render().unwrap();
    assert_eq!(outer(&ctx, side).width, 30);
}

#[test]
fn test_stale_handles_are_rejected() {
    let (mut ctx, _) = setup(20, 2);
    let root = ctx.root();
    let a = add(&mut ctx, root, NodeKind::text("a"), "{}");
    ctx.remove(root, a).unwrap();
    assert!(matches!(ctx.set_text(a, "b"), Err(RenderError::UnknownNode(_))));
    assert!(matches!(ctx.append(root, a), Err(RenderError::UnknownNode(_))));
    ctx.render().unwrap();
}
