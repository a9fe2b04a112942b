//! Property-based tests for the caret traversal engine.
//!
//! Uses proptest to verify the walk invariants across randomly shaped
//! documents: termination, forward/backward symmetry and
//! normalization idempotence.

use std::rc::Rc;

use lector::{
    AccessibleSource, EMBEDDED_OBJECT_CHAR, NodeHandle, Role, Session, SimTree,
};
use proptest::prelude::*;

/// Form of one random document subtree.
#[derive(Clone, Debug)]
enum Shape {
    /// A text paragraph.
    Text(String),
    /// A textless widget (button, image).
    Widget,
    /// A text host with children embedded between text pieces.
    Inline(Vec<Shape>, Vec<String>),
    /// A structural container with no text model.
    Group(Vec<Shape>),
}

fn text_piece() -> impl Strategy<Value = String> {
    "[a-z ]{0,6}"
}

fn shape() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        "[a-z ]{1,8}".prop_map(Shape::Text),
        Just(Shape::Widget),
    ];
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            (
                prop::collection::vec(inner.clone(), 1..3),
                prop::collection::vec(text_piece(), 0..4),
            )
                .prop_map(|(children, texts)| Shape::Inline(children, texts)),
            prop::collection::vec(inner, 1..3).prop_map(Shape::Group),
        ]
    })
}

fn build(sim: &SimTree, parent: NodeHandle, shape: &Shape) {
    match shape {
        Shape::Text(text) => {
            let node = sim.add_child(parent, Role::Paragraph);
            sim.set_text(node, text);
        }
        Shape::Widget => {
            let node = sim.add_child(parent, Role::PushButton);
            sim.set_name(node, "w");
        }
        Shape::Inline(children, texts) => {
            let node = sim.add_child(parent, Role::Section);
            for child in children {
                build(sim, node, child);
            }
            let mut composed = String::new();
            for i in 0..children.len() {
                composed.push_str(texts.get(i).map_or("", String::as_str));
                composed.push(EMBEDDED_OBJECT_CHAR);
            }
            composed.push_str(texts.get(children.len()).map_or("", String::as_str));
            sim.set_text(node, &composed);
        }
        Shape::Group(children) => {
            let node = sim.add_child(parent, Role::Panel);
            for child in children {
                build(sim, node, child);
            }
        }
    }
}

fn document(shapes: &[Shape]) -> (Session, NodeHandle) {
    let sim = Rc::new(SimTree::new());
    let doc = sim.add_root(Role::DocumentFrame);
    for shape in shapes {
        build(&sim, doc, shape);
    }
    sim.embed_children(doc);
    let session = Session::new(Rc::clone(&sim) as Rc<dyn AccessibleSource>);
    (session, doc)
}

fn forward_positions(session: &Session, doc: NodeHandle) -> Vec<(NodeHandle, i32)> {
    let doc_node = session.resolve(doc);
    let mut out = Vec::new();
    let mut pos = session.next_caret_in_order(&doc_node, -1);
    while let Some(ctx) = pos {
        assert!(out.len() < 5_000, "forward walk did not terminate");
        out.push((ctx.node.handle(), ctx.offset));
        pos = session.next_caret_in_order(&ctx.node, ctx.offset);
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The forward walk reaches the end of every finite document.
    #[test]
    fn traversal_terminates(shapes in prop::collection::vec(shape(), 1..4)) {
        let (session, doc) = document(&shapes);
        let _ = forward_positions(&session, doc);
    }

    /// Walking backward from the terminal position visits exactly the
    /// forward positions, reversed.
    #[test]
    fn backward_mirrors_forward(shapes in prop::collection::vec(shape(), 1..4)) {
        let (session, doc) = document(&shapes);
        let forward = forward_positions(&session, doc);
        prop_assume!(!forward.is_empty());

        let (h, off) = *forward.last().unwrap();
        let mut backward = vec![(h, off)];
        let mut node = session.resolve(h);
        let mut offset = off;
        while let Some(prev) = session.previous_caret_in_order(&node, offset) {
            prop_assert!(
                backward.len() <= forward.len(),
                "backward walk found extra positions"
            );
            backward.push((prev.node.handle(), prev.offset));
            node = session.resolve(prev.node.handle());
            offset = prev.offset;
        }
        backward.reverse();
        prop_assert_eq!(forward, backward);
    }

    /// A document-order walk never visits the same position twice.
    #[test]
    fn positions_are_unique(shapes in prop::collection::vec(shape(), 1..4)) {
        let (session, doc) = document(&shapes);
        let forward = forward_positions(&session, doc);
        let mut seen = std::collections::HashSet::new();
        for pos in &forward {
            prop_assert!(seen.insert(*pos), "position visited twice: {:?}", pos);
        }
    }

    /// Normalization is idempotent at every reachable position.
    #[test]
    fn normalize_is_idempotent(shapes in prop::collection::vec(shape(), 1..4)) {
        let (session, doc) = document(&shapes);
        for (h, off) in forward_positions(&session, doc) {
            let node = session.resolve(h);
            let once = session.find_first_caret_context(&node, off);
            let twice = session.find_first_caret_context(&once.node, once.offset);
            prop_assert_eq!(once, twice);
        }
    }

    /// Out-of-range offsets never panic, they clamp or climb.
    #[test]
    fn arbitrary_offsets_are_safe(
        shapes in prop::collection::vec(shape(), 1..3),
        offset in -100i32..500,
    ) {
        let (session, doc) = document(&shapes);
        let doc_node = session.resolve(doc);
        let _ = session.next_caret_in_order(&doc_node, offset);
        let _ = session.previous_caret_in_order(&doc_node, offset);
        let _ = session.find_first_caret_context(&doc_node, offset);
        let _ = session.line_contents_at(&doc_node, offset);
        let _ = session.word_contents_at(&doc_node, offset);
    }
}
