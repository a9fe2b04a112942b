//! Flat-review: zone harvesting, clustering and 2-D navigation.

mod common;

use std::rc::Rc;

use common::session_over;
use lector::{
    Error, Granularity, Rect, ReviewContext, ReviewOptions, Role, Session, SimTree, Wrap,
};

fn screen(build: impl FnOnce(&SimTree) -> lector::NodeHandle) -> (Session, lector::NodeRef) {
    let sim = Rc::new(SimTree::new());
    let root = build(&sim);
    let session = session_over(&sim);
    let root_node = session.resolve(root);
    (session, root_node)
}

fn label(sim: &SimTree, parent: lector::NodeHandle, name: &str, rect: Rect) -> lector::NodeHandle {
    let h = sim.add_child(parent, Role::Label);
    sim.set_name(h, name);
    sim.set_extents(h, rect);
    h
}

#[test]
fn bands_inside_each_other_share_a_line() {
    // Zone A spans y 100..120 (height 20); zone B y 110..118 (height 8,
    // fully inside A's band): the 100% overlap of the shorter easily
    // beats the 25% rule. The third at y 200..220 starts a new line.
    let (session, root) = screen(|sim| {
        let doc = sim.add_root(Role::DocumentFrame);
        label(sim, doc, "A", Rect::new(0, 100, 40, 20));
        label(sim, doc, "B", Rect::new(50, 110, 40, 8));
        label(sim, doc, "C", Rect::new(0, 200, 40, 20));
        doc
    });
    let ctx = session.review(&root).unwrap();
    assert_eq!(ctx.line_count(), 2);
    assert_eq!(ctx.current(Granularity::Line).unwrap().0, "A B");
}

#[test]
fn clustering_is_deterministic_for_a_fixed_screen() {
    let build = |sim: &SimTree| {
        let doc = sim.add_root(Role::DocumentFrame);
        label(sim, doc, "one", Rect::new(120, 10, 40, 14));
        label(sim, doc, "two", Rect::new(0, 12, 40, 14));
        label(sim, doc, "three", Rect::new(60, 8, 40, 14));
        label(sim, doc, "four", Rect::new(0, 40, 40, 14));
        doc
    };
    let lines_of = |(session, root): (Session, lector::NodeRef)| -> Vec<String> {
        let ctx = session.review(&root).unwrap();
        let mut out = Vec::new();
        let mut more = true;
        let mut ctx = ctx;
        while more {
            out.push(ctx.current(Granularity::Line).unwrap().0);
            more = ctx.go_next(Granularity::Line, Wrap::empty());
        }
        out
    };
    let a = lines_of(screen(build));
    let b = lines_of(screen(build));
    assert_eq!(a, b);
    assert_eq!(a, vec!["two three one".to_string(), "four".to_string()]);
}

#[test]
fn empty_screen_reports_nothing_to_review() {
    let (session, root) = screen(|sim| sim.add_root(Role::DocumentFrame));
    match session.review(&root) {
        Err(Error::NothingToReview) => {}
        other => panic!("expected NothingToReview, got {other:?}"),
    }
}

#[test]
fn zero_height_marker_on_the_clip_edge_survives() {
    let sim = Rc::new(SimTree::new());
    let doc = sim.add_root(Role::DocumentFrame);
    label(&sim, doc, "edge", Rect::new(0, 100, 40, 0));
    let session = session_over(&sim);
    let root = session.resolve(doc);
    let opts = ReviewOptions::new().with_clip(Rect::new(0, 0, 200, 100));
    let ctx = ReviewContext::build(&session, &root, &opts).unwrap();
    assert_eq!(ctx.current(Granularity::Zone).unwrap().0, "edge");
}

#[test]
fn zone_navigation_honors_wrap_flags() {
    let (session, root) = screen(|sim| {
        let doc = sim.add_root(Role::DocumentFrame);
        label(sim, doc, "a", Rect::new(0, 0, 20, 16));
        label(sim, doc, "b", Rect::new(30, 0, 20, 16));
        label(sim, doc, "c", Rect::new(0, 40, 20, 16));
        doc
    });
    let mut ctx = session.review(&root).unwrap();

    assert!(ctx.go_next(Granularity::Zone, Wrap::empty()));
    assert_eq!(ctx.current(Granularity::Zone).unwrap().0, "b");
    // End of line without WRAP_LINE: refused.
    assert!(!ctx.go_next(Granularity::Zone, Wrap::empty()));
    assert!(ctx.go_next(Granularity::Zone, Wrap::LINE));
    assert_eq!(ctx.current(Granularity::Zone).unwrap().0, "c");
    // Bottom of screen without WRAP_TOP_BOTTOM: refused.
    assert!(!ctx.go_next(Granularity::Zone, Wrap::LINE));
    assert!(ctx.go_next(Granularity::Zone, Wrap::ALL));
    assert_eq!(ctx.current(Granularity::Zone).unwrap().0, "a");
    // And backward over the top edge.
    assert!(!ctx.go_previous(Granularity::Zone, Wrap::LINE));
    assert!(ctx.go_previous(Granularity::Zone, Wrap::ALL));
    assert_eq!(ctx.current(Granularity::Zone).unwrap().0, "c");
}

#[test]
fn vertical_move_lands_on_overlapping_character() {
    // Line A has a character at x 10..20. Line B has characters at
    // x 0..9 and x 21..30: neither overlaps, so the cursor stays on
    // the nearer one short of overshooting; with an overlapping
    // candidate present it lands there.
    let (session, root) = screen(|sim| {
        let doc = sim.add_root(Role::DocumentFrame);
        label(sim, doc, "A", Rect::new(10, 0, 10, 16));
        label(sim, doc, "x", Rect::new(0, 40, 9, 16));
        label(sim, doc, "y", Rect::new(21, 40, 9, 16));
        doc
    });
    let mut ctx = session.review(&root).unwrap();
    assert!(ctx.go_below(Granularity::Char, Wrap::empty()));
    assert_eq!(ctx.current(Granularity::Char).unwrap().0, "x");

    // Returning up re-aligns on the remembered span.
    assert!(ctx.go_above(Granularity::Char, Wrap::empty()));
    assert_eq!(ctx.current(Granularity::Char).unwrap().0, "A");
}

#[test]
fn vertical_target_tracks_across_narrow_lines() {
    let (session, root) = screen(|sim| {
        let doc = sim.add_root(Role::DocumentFrame);
        let wide = sim.add_child(doc, Role::Paragraph);
        sim.set_text(wide, "0123456789");
        sim.set_extents(wide, Rect::new(0, 0, 80, 16));
        let narrow = sim.add_child(doc, Role::Paragraph);
        sim.set_text(narrow, "ab");
        sim.set_extents(narrow, Rect::new(0, 32, 16, 16));
        let wide2 = sim.add_child(doc, Role::Paragraph);
        sim.set_text(wide2, "9876543210");
        sim.set_extents(wide2, Rect::new(0, 64, 80, 16));
        doc
    });
    let mut ctx = session.review(&root).unwrap();
    // Move to column 6 of the wide line.
    for _ in 0..6 {
        assert!(ctx.go_next(Granularity::Char, Wrap::empty()));
    }
    assert_eq!(ctx.current(Granularity::Char).unwrap().0, "6");
    // The narrow line clamps to its last character...
    assert!(ctx.go_below(Granularity::Char, Wrap::empty()));
    assert_eq!(ctx.current(Granularity::Char).unwrap().0, "b");
    // ...but the remembered target still lands column 6 below it.
    assert!(ctx.go_below(Granularity::Char, Wrap::empty()));
    assert_eq!(ctx.current(Granularity::Char).unwrap().0, "3");
}

#[test]
fn word_navigation_across_zones_skips_whitespace() {
    let (session, root) = screen(|sim| {
        let doc = sim.add_root(Role::DocumentFrame);
        let para = sim.add_child(doc, Role::Paragraph);
        sim.set_text(para, "hello   world");
        doc
    });
    let mut ctx = session.review(&root).unwrap();
    assert_eq!(ctx.current(Granularity::Word).unwrap().0, "hello");
    assert!(ctx.go_next(Granularity::Word, Wrap::empty()));
    assert_eq!(ctx.current(Granularity::Word).unwrap().0, "world");
}

#[test]
fn review_and_caret_engines_agree_on_content() {
    // The same document seen logically and spatially.
    let (session, root) = screen(|sim| {
        let doc = sim.add_root(Role::DocumentFrame);
        let a = sim.add_child(doc, Role::Paragraph);
        sim.set_text(a, "alpha");
        let b = sim.add_child(doc, Role::Paragraph);
        sim.set_text(b, "beta");
        sim.embed_children(doc);
        doc
    });
    let review = session.review(&root).unwrap();
    let review_lines: Vec<String> = {
        let mut ctx = review;
        let mut out = vec![ctx.current(Granularity::Line).unwrap().0];
        while ctx.go_next(Granularity::Line, Wrap::empty()) {
            out.push(ctx.current(Granularity::Line).unwrap().0);
        }
        out
    };
    let say_all_lines: Vec<String> = session
        .say_all(&root)
        .unwrap()
        .map(|chunk| chunk.iter().map(|c| c.text.as_str()).collect())
        .collect();
    assert_eq!(review_lines, say_all_lines);
    assert_eq!(review_lines, vec!["alpha".to_string(), "beta".to_string()]);
}

#[test]
fn point_routing_finds_zone_and_character() {
    let (session, root) = screen(|sim| {
        let doc = sim.add_root(Role::DocumentFrame);
        let para = sim.add_child(doc, Role::Paragraph);
        sim.set_text(para, "abcd");
        sim.set_extents(para, Rect::new(0, 0, 32, 16));
        doc
    });
    let mut ctx = session.review(&root).unwrap();
    assert!(ctx.set_current_from_point(17, 8));
    assert_eq!(ctx.current(Granularity::Char).unwrap().0, "c");
    assert_eq!(ctx.current_offset(), Some(2));
}

#[test]
fn braille_regions_expose_line_layout() {
    let (session, root) = screen(|sim| {
        let doc = sim.add_root(Role::DocumentFrame);
        label(sim, doc, "File", Rect::new(0, 0, 32, 16));
        label(sim, doc, "Edit", Rect::new(40, 0, 32, 16));
        label(sim, doc, "View", Rect::new(80, 0, 32, 16));
        doc
    });
    let ctx = session.review(&root).unwrap();
    let regions = ctx.braille_regions();
    let texts: Vec<&str> = regions.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["File", "Edit", "View"]);
    assert_eq!(regions[0].column, 0);
    assert_eq!(regions[1].column, 5);
    assert_eq!(regions[2].column, 10);
    assert_eq!(regions[0].cursor, Some(0));
    assert_eq!(regions[1].cursor, None);
}
