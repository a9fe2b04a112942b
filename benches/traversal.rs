//! Caret traversal and content extraction benchmarks.

#![allow(clippy::semicolon_if_nothing_returned)]

use std::hint::black_box;
use std::rc::Rc;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use lector::{AccessibleSource, EMBEDDED_OBJECT_CHAR, NodeHandle, Role, Session, SimTree};

/// A document with `paragraphs` block children, every fourth one
/// carrying an inline link.
fn build_document(paragraphs: usize) -> (Session, NodeHandle) {
    let sim = Rc::new(SimTree::new());
    let doc = sim.add_root(Role::DocumentFrame);
    for i in 0..paragraphs {
        let p = sim.add_child(doc, Role::Paragraph);
        if i % 4 == 0 {
            let link = sim.add_child(p, Role::Link);
            sim.set_text(link, "details");
            sim.set_text(
                p,
                &format!("paragraph {i} with a {EMBEDDED_OBJECT_CHAR} inline"),
            );
        } else {
            sim.set_text(p, &format!("paragraph number {i} with plain text"));
        }
    }
    sim.embed_children(doc);
    let session = Session::new(Rc::clone(&sim) as Rc<dyn AccessibleSource>);
    (session, doc)
}

fn full_forward_walk(session: &Session, doc: NodeHandle) -> usize {
    let doc_node = session.resolve(doc);
    let mut count = 0usize;
    let mut pos = session.next_caret_in_order(&doc_node, -1);
    while let Some(ctx) = pos {
        count += 1;
        pos = session.next_caret_in_order(&ctx.node, ctx.offset);
    }
    count
}

fn walk_document(c: &mut Criterion) {
    let (small, small_doc) = build_document(20);
    c.bench_function("walk_forward_20_paragraphs", |b| {
        b.iter(|| black_box(full_forward_walk(&small, small_doc)));
    });

    let (large, large_doc) = build_document(200);
    c.bench_function("walk_forward_200_paragraphs", |b| {
        b.iter(|| black_box(full_forward_walk(&large, large_doc)));
    });
}

fn line_extraction(c: &mut Criterion) {
    let (session, doc) = build_document(100);
    let doc_node = session.resolve(doc);
    let middle = session.next_caret_in_order(&doc_node, -1).unwrap();

    c.bench_function("line_contents_cold", |b| {
        b.iter(|| {
            // Invalidate by querying through a fresh session-level call
            // on alternating offsets.
            black_box(session.line_contents_at(&middle.node, black_box(3)));
            black_box(session.line_contents_at(&middle.node, black_box(5)));
        });
    });
}

fn say_all_stream(c: &mut Criterion) {
    c.bench_function("say_all_100_paragraphs", |b| {
        b.iter_batched(
            || build_document(100),
            |(session, doc)| {
                let doc_node = session.resolve(doc);
                let chunks: usize = session.say_all(&doc_node).unwrap().count();
                black_box(chunks)
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, walk_document, line_extraction, say_all_stream);
criterion_main!(benches);
