//! End-to-end caret traversal over embedded-object documents.

mod common;

use std::rc::Rc;

use common::{forward_walk, session_over, web_doc};
use lector::{EMBEDDED_OBJECT_CHAR, Node, NodeHandle, Rect, Role, SimTree, StateSet};

/// Document text node `"Hello" + sentinel + "world"` where the
/// sentinel maps to a push button named "Go".
fn hello_button_world() -> (Rc<SimTree>, NodeHandle, NodeHandle) {
    let sim = Rc::new(SimTree::new());
    let doc = sim.add_root(Role::DocumentFrame);
    let para = sim.add_child(doc, Role::Paragraph);
    let button = sim.add_child(para, Role::PushButton);
    sim.set_name(button, "Go");
    sim.set_text(para, &format!("Hello{EMBEDDED_OBJECT_CHAR}world"));
    sim.embed_children(doc);
    (sim, para, button)
}

#[test]
fn walk_steps_through_text_then_button_then_text() {
    let (sim, para, button) = hello_button_world();
    let session = session_over(&sim);
    let para_node = session.resolve(para);

    // H e l l o
    let mut pos = session.next_caret_in_order(&para_node, -1).unwrap();
    for expected in 0..5 {
        assert_eq!(pos.node.handle(), para);
        assert_eq!(pos.offset, expected);
        if expected < 4 {
            pos = session.next_caret_in_order(&pos.node, pos.offset).unwrap();
        }
    }

    // Sixth step enters the button.
    let on_button = session.next_caret_in_order(&pos.node, pos.offset).unwrap();
    assert_eq!(on_button.node.handle(), button);
    assert_eq!(on_button.offset, 0);

    // Seventh lands on the 'w' of "world".
    let w = session
        .next_caret_in_order(&on_button.node, on_button.offset)
        .unwrap();
    assert_eq!(w.node.handle(), para);
    assert_eq!(w.offset, 6);
    assert_eq!(w.node.char_at(6), Some('w'));
}

#[test]
fn descent_and_ascent_round_trip() {
    let (sim, para, button) = hello_button_world();
    let session = session_over(&sim);
    let para_node = session.resolve(para);

    // previous() undoes next() across the embedded boundary.
    let forward = session.next_caret_in_order(&para_node, 4).unwrap();
    assert_eq!(forward.node.handle(), button);
    let back = session
        .previous_caret_in_order(&forward.node, forward.offset)
        .unwrap();
    assert_eq!((back.node.handle(), back.offset), (para, 4));

    // Entering via normalization anchors inside the button; climbing
    // back out resumes after its sentinel.
    let inside = session.find_first_caret_context(&para_node, 5);
    assert_eq!(inside.node.handle(), button);
    assert_eq!(inside.offset, -1);
    let after = session.next_caret_in_order(&inside.node, 0).unwrap();
    assert_eq!((after.node.handle(), after.offset), (para, 6));
}

#[test]
fn traversal_totality_forward_equals_backward() {
    let doc = web_doc(&["alpha beta", "gamma", "delta epsilon zeta"]);
    let session = session_over(&doc.sim);

    let forward = forward_walk(&session, doc.doc);
    assert!(!forward.is_empty());

    // Walk back from the last position through every predecessor.
    let (mut node, mut offset) = *forward.last().unwrap();
    let mut backward = vec![(node, offset)];
    let mut node_ref = session.resolve(node);
    while let Some(prev) = session.previous_caret_in_order(&node_ref, offset) {
        assert!(backward.len() <= forward.len(), "backward walk overshot");
        backward.push((prev.node.handle(), prev.offset));
        node = prev.node.handle();
        offset = prev.offset;
        node_ref = session.resolve(node);
    }
    backward.reverse();
    assert_eq!(forward, backward);
}

#[test]
fn atomic_controls_are_stops_but_not_entered() {
    let sim = Rc::new(SimTree::new());
    let doc = sim.add_root(Role::DocumentFrame);
    let para = sim.add_child(doc, Role::Paragraph);
    let combo = sim.add_child(para, Role::ComboBox);
    sim.set_name(combo, "Fonts");
    // The combo's internal machinery, which must never be visited.
    let list = sim.add_child(combo, Role::ListBox);
    let item = sim.add_child(list, Role::ListItem);
    sim.set_name(item, "Serif");
    sim.set_text(para, &format!("a{EMBEDDED_OBJECT_CHAR}b"));
    sim.embed_children(doc);

    let session = session_over(&sim);
    let walk = forward_walk(&session, doc);
    let visited: Vec<NodeHandle> = walk.iter().map(|&(h, _)| h).collect();
    assert!(visited.contains(&combo));
    assert!(!visited.contains(&list));
    assert!(!visited.contains(&item));
}

#[test]
fn hidden_children_are_not_descended() {
    let sim = Rc::new(SimTree::new());
    let doc = sim.add_root(Role::DocumentFrame);
    let shown = sim.add_child(doc, Role::Paragraph);
    sim.set_text(shown, "visible");
    let hidden = sim.add_child(doc, Role::Panel);
    sim.remove_state(hidden, StateSet::SHOWING);
    sim.set_extents(hidden, Rect::new(0, 0, 0, 0));
    let inner = sim.add_child(hidden, Role::Paragraph);
    sim.set_text(inner, "secret");

    let session = session_over(&sim);
    let walk = forward_walk(&session, doc);
    assert!(walk.iter().all(|&(h, _)| h != inner));
    assert!(walk.iter().any(|&(h, _)| h == shown));
}

#[test]
fn offsets_clamp_instead_of_panicking() {
    let doc = web_doc(&["short"]);
    let session = session_over(&doc.sim);
    let para = session.resolve(doc.paragraphs[0]);

    // Far past the end: climbs out rather than indexing out of bounds.
    assert!(session.next_caret_in_order(&para, 9_999).is_none());
    // Far before the start behaves as "enter from the start".
    let first = session.next_caret_in_order(&para, -500).unwrap();
    assert_eq!(first.offset, 0);

    let norm = session.find_first_caret_context(&para, 9_999);
    assert_eq!(norm.offset, 5);
    let norm = session.find_first_caret_context(&para, -3);
    assert_eq!(norm.offset, 0);
}

#[test]
fn mismatched_sentinel_degrades_to_a_stop() {
    let sim = Rc::new(SimTree::new());
    let doc = sim.add_root(Role::DocumentFrame);
    let para = sim.add_child(doc, Role::Paragraph);
    // Two sentinels, one child: the toolkit broke the invariant.
    let link = sim.add_child(para, Role::Link);
    sim.set_text(link, "ok");
    sim.set_text(
        para,
        &format!("x{EMBEDDED_OBJECT_CHAR}y{EMBEDDED_OBJECT_CHAR}z"),
    );

    let session = session_over(&sim);
    let para_node = session.resolve(para);
    // First sentinel resolves; the second has no child and becomes an
    // unenterable stop instead of a crash or a loop.
    let walk = forward_walk(&session, doc);
    assert!(walk.contains(&(para, 3)));
    assert!(walk.contains(&(link, 0)));
    let _ = para_node;
}

#[test]
fn nested_inline_links_are_traversed_in_order() {
    let sim = Rc::new(SimTree::new());
    let doc = sim.add_root(Role::DocumentFrame);
    let para = sim.add_child(doc, Role::Paragraph);
    let outer = sim.add_child(para, Role::Section);
    let inner = sim.add_child(outer, Role::Link);
    sim.set_text(inner, "in");
    sim.set_text(outer, &format!("[{EMBEDDED_OBJECT_CHAR}]"));
    sim.set_text(para, &format!("a{EMBEDDED_OBJECT_CHAR}b"));
    sim.embed_children(doc);

    let session = session_over(&sim);
    let walk = forward_walk(&session, doc);
    let expected = vec![
        (para, 0),
        (outer, 0),
        (inner, 0),
        (inner, 1),
        (outer, 2),
        (para, 2),
    ];
    assert_eq!(walk, expected);
}

#[test]
fn empty_document_has_no_positions() {
    let sim = Rc::new(SimTree::new());
    let doc = sim.add_root(Role::DocumentFrame);
    let session = session_over(&sim);
    let doc_node = session.resolve(doc);
    assert!(session.next_caret_in_order(&doc_node, -1).is_none());
}

#[test]
fn wrapper_identity_is_stable_across_walks() {
    let doc = web_doc(&["one", "two"]);
    let session = session_over(&doc.sim);
    let a1 = session.resolve(doc.paragraphs[0]);
    let via_walk = session.next_caret_in_order(&session.resolve(doc.doc), -1).unwrap();
    assert!(Node::same(&a1, &via_walk.node));
}
