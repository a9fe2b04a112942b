//! Restartable streaming of document content ("read everything").
//!
//! [`SayAll`] is a lazy sequence of line chunks. Each pulled chunk
//! commits the shared caret context to that chunk's start before it is
//! handed out, so a consumer that stops pulling at any point (the user
//! pressed a key) leaves the reading position at the last fully
//! presented chunk with no partial state to repair.

use crate::session::Session;

use super::content::Content;
use super::CaretContext;

/// Lazy iterator over line-granularity content chunks.
pub struct SayAll<'a> {
    session: &'a Session,
    cursor: Option<CaretContext>,
    presented: Option<LineKey>,
}

/// Identity of an extracted line, used to step over positions (line
/// separators, trailing newlines) that map back onto the chunk just
/// presented.
#[derive(Clone, Debug, PartialEq, Eq)]
struct LineKey {
    first: (crate::source::NodeHandle, usize),
    last: (crate::source::NodeHandle, usize),
}

fn line_key(contents: &[Content]) -> Option<LineKey> {
    let first = contents.first()?;
    let last = contents.last()?;
    Some(LineKey {
        first: (first.node.handle(), first.start),
        last: (last.node.handle(), last.end),
    })
}

impl<'a> SayAll<'a> {
    pub(crate) fn new(session: &'a Session, start: CaretContext) -> Self {
        Self {
            session,
            cursor: Some(start),
            presented: None,
        }
    }
}

impl Iterator for SayAll<'_> {
    type Item = Vec<Content>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let ctx = self.cursor.take()?;
            let contents = self.session.line_contents_at(&ctx.node, ctx.offset);
            let key = line_key(&contents)?;
            if self.presented.as_ref() == Some(&key) {
                // Still on the line just presented (a separator
                // position); step one position and retry.
                self.cursor = self.session.next_caret_in_order(&ctx.node, ctx.offset);
                continue;
            }

            self.session.set_caret_context(&ctx.node, ctx.offset);
            self.presented = Some(key);

            // Resume after the rightmost position of this chunk.
            let last = contents.last()?;
            let resume_offset = if last.end > last.start {
                last.end as i32 - 1
            } else {
                last.start as i32
            };
            self.cursor = self.session.next_caret_in_order(&last.node, resume_offset);
            return Some(contents);
        }
    }
}
