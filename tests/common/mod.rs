//! Shared fixtures for the integration suites.
#![allow(dead_code)]

use std::rc::Rc;

use lector::{NodeHandle, Role, Session, SimTree};

pub struct WebDoc {
    pub sim: Rc<SimTree>,
    pub doc: NodeHandle,
    pub paragraphs: Vec<NodeHandle>,
}

/// A document whose block children each carry one line of text,
/// embedded into the document's own text model.
pub fn web_doc(lines: &[&str]) -> WebDoc {
    let sim = Rc::new(SimTree::new());
    let doc = sim.add_root(Role::DocumentFrame);
    let paragraphs = lines
        .iter()
        .map(|line| {
            let p = sim.add_child(doc, Role::Paragraph);
            sim.set_text(p, line);
            p
        })
        .collect();
    sim.embed_children(doc);
    sim.take_notifications();
    WebDoc {
        sim,
        doc,
        paragraphs,
    }
}

pub fn session_over(sim: &Rc<SimTree>) -> Session {
    Session::new(Rc::clone(sim) as Rc<dyn lector::AccessibleSource>)
}

/// Collect every caret position in document order, bounded against
/// runaway walks.
pub fn forward_walk(session: &Session, doc: NodeHandle) -> Vec<(NodeHandle, i32)> {
    let doc_node = session.resolve(doc);
    let mut out = Vec::new();
    let mut pos = session.next_caret_in_order(&doc_node, -1);
    while let Some(ctx) = pos {
        assert!(out.len() < 10_000, "walk did not terminate");
        out.push((ctx.node.handle(), ctx.offset));
        pos = session.next_caret_in_order(&ctx.node, ctx.offset);
    }
    out
}
