//! The flat-review cursor.

use bitflags::bitflags;

use crate::cache::NodeRef;
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::session::Session;

use super::cluster::{Line, cluster_zones_by_line};
use super::zone::{Zone, ZoneKind, showing_zones};
use super::ReviewOptions;

bitflags! {
    /// Which boundaries navigation may cross.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct Wrap: u32 {
        /// Motion may cross from the end of a line to the next line.
        const LINE       = 0x1;
        /// Motion may wrap from the bottom of the screen to the top
        /// (and back).
        const TOP_BOTTOM = 0x2;
        /// Both.
        const ALL        = 0x3;
    }
}

/// Navigation granularity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Granularity {
    Char,
    Word,
    Zone,
    Line,
}

/// One braille region of the current line: a zone's text with its
/// column position and, for the zone under the cursor, the cursor's
/// character offset within the zone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrailleRegion {
    pub text: String,
    /// Starting column on the display.
    pub column: usize,
    /// Index of the zone within the current line.
    pub zone: usize,
    /// Cursor cell within this region, when the cursor is here.
    pub cursor: Option<usize>,
}

/// 2-D review cursor over a materialized set of lines.
///
/// Built from the screen on demand, one per review session; discard it
/// when review mode exits or the screen changes.
#[derive(Debug)]
pub struct ReviewContext {
    lines: Vec<Line>,
    line: usize,
    zone: usize,
    word: usize,
    ch: usize,
    /// Horizontal extents of the character being tracked across
    /// vertical moves.
    target: Option<Rect>,
}

/// Locate the best-aligned position for a remembered horizontal span:
/// the first character overlapping it, stopping short of overshooting
/// its right edge.
fn target_position_in_line(line: &Line, target: &Rect) -> (usize, usize, usize) {
    let mut prev: Option<(usize, usize, usize)> = None;
    for (zi, zone) in line.zones.iter().enumerate() {
        for (wi, word) in zone.words().iter().enumerate() {
            let chars = word.chars(zone);
            if chars.is_empty() {
                if word.rect.horizontal_overlap(target) {
                    return (zi, wi, 0);
                }
                if word.rect.x > target.right() {
                    return prev.unwrap_or((zi, wi, 0));
                }
                prev = Some((zi, wi, 0));
                continue;
            }
            for (ci, cb) in chars.iter().enumerate() {
                if cb.rect.horizontal_overlap(target) {
                    return (zi, wi, ci);
                }
                if cb.rect.x > target.right() {
                    return prev.unwrap_or((zi, wi, ci));
                }
                prev = Some((zi, wi, ci));
            }
        }
    }
    prev.unwrap_or((0, 0, 0))
}

impl ReviewContext {
    /// Harvest the screen under `root` and build a review context.
    ///
    /// Fails with [`Error::NothingToReview`] when nothing showing
    /// intersects the clip, so the caller can tell the user explicitly.
    pub fn build(session: &Session, root: &NodeRef, opts: &ReviewOptions) -> Result<Self> {
        let zones = showing_zones(session, root, opts);
        let lines = cluster_zones_by_line(zones, opts.same_line_threshold);
        if lines.is_empty() {
            return Err(Error::NothingToReview);
        }
        Ok(Self {
            lines,
            line: 0,
            zone: 0,
            word: 0,
            ch: 0,
            target: None,
        })
    }

    /// Number of clustered lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Cursor indices `(line, zone, word, char)`.
    #[must_use]
    pub fn position(&self) -> (usize, usize, usize, usize) {
        (self.line, self.zone, self.word, self.ch)
    }

    fn current_line(&self) -> Option<&Line> {
        self.lines.get(self.line)
    }

    fn current_zone(&self) -> Option<&Zone> {
        self.current_line()?.zones.get(self.zone)
    }

    /// Node owning the current zone.
    #[must_use]
    pub fn current_node(&self) -> Option<NodeRef> {
        self.current_zone().map(|z| NodeRef::clone(&z.node))
    }

    /// Character offset of the cursor within the owning node's text,
    /// for text zones.
    #[must_use]
    pub fn current_offset(&self) -> Option<usize> {
        let zone = self.current_zone()?;
        if zone.kind != ZoneKind::Text {
            return None;
        }
        let word = zone.words().get(self.word)?;
        Some(word.start + self.ch)
    }

    /// The current unit's text and screen extents.
    #[must_use]
    pub fn current(&self, granularity: Granularity) -> Option<(String, Rect)> {
        let line = self.current_line()?;
        match granularity {
            Granularity::Line => Some((line.text(), line.rect)),
            Granularity::Zone => {
                let zone = line.zones.get(self.zone)?;
                Some((zone.text.clone(), zone.rect))
            }
            Granularity::Word => {
                let zone = line.zones.get(self.zone)?;
                let word = zone.words().get(self.word)?;
                Some((word.text.clone(), word.rect))
            }
            Granularity::Char => {
                let zone = line.zones.get(self.zone)?;
                let word = zone.words().get(self.word)?;
                let chars = word.chars(zone);
                chars.get(self.ch).map_or_else(
                    || Some((String::new(), word.rect)),
                    |cb| Some((cb.ch.to_string(), cb.rect)),
                )
            }
        }
    }

    fn char_count_at(&self, l: usize, z: usize, w: usize) -> usize {
        self.lines
            .get(l)
            .and_then(|line| line.zones.get(z))
            .map_or(0, |zone| {
                zone.words().get(w).map_or(0, |word| word.chars(zone).len())
            })
    }

    fn word_count_at(&self, l: usize, z: usize) -> usize {
        self.lines
            .get(l)
            .and_then(|line| line.zones.get(z))
            .map_or(0, |zone| zone.words().len())
    }

    fn word_is_whitespace(&self, pos: (usize, usize, usize)) -> bool {
        self.lines
            .get(pos.0)
            .and_then(|line| line.zones.get(pos.1))
            .and_then(|zone| zone.words().get(pos.2))
            .is_none_or(|w| w.is_whitespace())
    }

    fn last_word_pos_of_line(&self, l: usize) -> (usize, usize, usize) {
        let zcount = self.lines.get(l).map_or(0, |line| line.zones.len());
        let z = zcount.saturating_sub(1);
        let w = self.word_count_at(l, z).saturating_sub(1);
        (l, z, w)
    }

    fn next_word_pos(
        &self,
        from: (usize, usize, usize),
        wrap: Wrap,
    ) -> Option<(usize, usize, usize)> {
        let (l, z, w) = from;
        if w + 1 < self.word_count_at(l, z) {
            return Some((l, z, w + 1));
        }
        if z + 1 < self.lines.get(l).map_or(0, |line| line.zones.len()) {
            return Some((l, z + 1, 0));
        }
        if l + 1 < self.lines.len() {
            if wrap.contains(Wrap::LINE) {
                return Some((l + 1, 0, 0));
            }
            return None;
        }
        if wrap.contains(Wrap::TOP_BOTTOM) && self.lines.len() > 1 {
            return Some((0, 0, 0));
        }
        None
    }

    fn previous_word_pos(
        &self,
        from: (usize, usize, usize),
        wrap: Wrap,
    ) -> Option<(usize, usize, usize)> {
        let (l, z, w) = from;
        if w > 0 {
            return Some((l, z, w - 1));
        }
        if z > 0 {
            let w = self.word_count_at(l, z - 1).saturating_sub(1);
            return Some((l, z - 1, w));
        }
        if l > 0 {
            if wrap.contains(Wrap::LINE) {
                return Some(self.last_word_pos_of_line(l - 1));
            }
            return None;
        }
        if wrap.contains(Wrap::TOP_BOTTOM) && self.lines.len() > 1 {
            return Some(self.last_word_pos_of_line(self.lines.len() - 1));
        }
        None
    }

    fn commit_word_pos(&mut self, pos: (usize, usize, usize), char_at_end: bool) {
        self.line = pos.0;
        self.zone = pos.1;
        self.word = pos.2;
        self.ch = if char_at_end {
            self.char_count_at(pos.0, pos.1, pos.2).saturating_sub(1)
        } else {
            0
        };
    }

    fn current_char_rect(&self) -> Option<Rect> {
        let zone = self.current_zone()?;
        let word = zone.words().get(self.word)?;
        let chars = word.chars(zone);
        Some(chars.get(self.ch).map_or(word.rect, |cb| cb.rect))
    }

    fn remember_target(&mut self) {
        self.target = self.current_char_rect();
    }

    /// Skip whitespace-only words after `first`, but never beyond the
    /// zone `first` belongs to; a blank kept at a boundary lets the
    /// user be told "blank".
    fn skip_whitespace_words(
        &self,
        first: (usize, usize, usize),
        forward: bool,
    ) -> (usize, usize, usize) {
        if !self.word_is_whitespace(first) {
            return first;
        }
        let mut scan = first;
        loop {
            let next = if forward {
                self.next_word_pos(scan, Wrap::empty())
            } else {
                self.previous_word_pos(scan, Wrap::empty())
            };
            let Some(pos) = next else {
                return first;
            };
            if pos.0 != first.0 || pos.1 != first.1 {
                // Crossing the accessible boundary found nothing
                // speakable: keep the blank.
                return first;
            }
            if !self.word_is_whitespace(pos) {
                return pos;
            }
            scan = pos;
        }
    }

    /// Move forward by one unit. Returns whether the cursor moved.
    pub fn go_next(&mut self, granularity: Granularity, wrap: Wrap) -> bool {
        if self.lines.is_empty() {
            return false;
        }
        let moved = match granularity {
            Granularity::Line => {
                if self.line + 1 < self.lines.len() {
                    self.line += 1;
                    self.commit_word_pos((self.line, 0, 0), false);
                    true
                } else if wrap.contains(Wrap::TOP_BOTTOM) && self.lines.len() > 1 {
                    self.commit_word_pos((0, 0, 0), false);
                    true
                } else {
                    false
                }
            }
            Granularity::Zone => {
                let pos = (self.line, self.zone, self.word);
                match self.next_zone_pos(pos, wrap) {
                    Some(p) => {
                        self.commit_word_pos(p, false);
                        true
                    }
                    None => false,
                }
            }
            Granularity::Word => {
                let cur = (self.line, self.zone, self.word);
                match self.next_word_pos(cur, wrap) {
                    Some(first) => {
                        let pos = self.skip_whitespace_words(first, true);
                        self.commit_word_pos(pos, false);
                        true
                    }
                    None => false,
                }
            }
            Granularity::Char => {
                let cur = (self.line, self.zone, self.word);
                if self.ch + 1 < self.char_count_at(self.line, self.zone, self.word) {
                    self.ch += 1;
                    true
                } else {
                    match self.next_word_pos(cur, wrap) {
                        Some(pos) => {
                            self.commit_word_pos(pos, false);
                            true
                        }
                        None => false,
                    }
                }
            }
        };
        if moved {
            self.remember_target();
        }
        moved
    }

    /// Move backward by one unit. Returns whether the cursor moved.
    pub fn go_previous(&mut self, granularity: Granularity, wrap: Wrap) -> bool {
        if self.lines.is_empty() {
            return false;
        }
        let moved = match granularity {
            Granularity::Line => {
                if self.line > 0 {
                    self.line -= 1;
                    self.commit_word_pos((self.line, 0, 0), false);
                    true
                } else if wrap.contains(Wrap::TOP_BOTTOM) && self.lines.len() > 1 {
                    self.commit_word_pos((self.lines.len() - 1, 0, 0), false);
                    true
                } else {
                    false
                }
            }
            Granularity::Zone => {
                if self.zone > 0 {
                    self.commit_word_pos((self.line, self.zone - 1, 0), false);
                    true
                } else if self.line > 0 && wrap.contains(Wrap::LINE) {
                    let l = self.line - 1;
                    let z = self.lines[l].zones.len().saturating_sub(1);
                    self.commit_word_pos((l, z, 0), false);
                    true
                } else if self.line == 0
                    && wrap.contains(Wrap::TOP_BOTTOM)
                    && self.lines.len() > 1
                {
                    let l = self.lines.len() - 1;
                    let z = self.lines[l].zones.len().saturating_sub(1);
                    self.commit_word_pos((l, z, 0), false);
                    true
                } else {
                    false
                }
            }
            Granularity::Word => {
                let cur = (self.line, self.zone, self.word);
                match self.previous_word_pos(cur, wrap) {
                    Some(first) => {
                        let pos = self.skip_whitespace_words(first, false);
                        self.commit_word_pos(pos, false);
                        true
                    }
                    None => false,
                }
            }
            Granularity::Char => {
                let cur = (self.line, self.zone, self.word);
                if self.ch > 0 {
                    self.ch -= 1;
                    true
                } else {
                    match self.previous_word_pos(cur, wrap) {
                        Some(pos) => {
                            self.commit_word_pos(pos, true);
                            true
                        }
                        None => false,
                    }
                }
            }
        };
        if moved {
            self.remember_target();
        }
        moved
    }

    fn next_zone_pos(
        &self,
        from: (usize, usize, usize),
        wrap: Wrap,
    ) -> Option<(usize, usize, usize)> {
        let (l, z, _) = from;
        if z + 1 < self.lines.get(l).map_or(0, |line| line.zones.len()) {
            return Some((l, z + 1, 0));
        }
        if l + 1 < self.lines.len() {
            if wrap.contains(Wrap::LINE) {
                return Some((l + 1, 0, 0));
            }
            return None;
        }
        if wrap.contains(Wrap::TOP_BOTTOM) && self.lines.len() > 1 {
            return Some((0, 0, 0));
        }
        None
    }

    /// Move one line up, landing on the character closest to the
    /// remembered horizontal position.
    pub fn go_above(&mut self, granularity: Granularity, wrap: Wrap) -> bool {
        self.go_vertical(granularity, wrap, false)
    }

    /// Move one line down, landing on the character closest to the
    /// remembered horizontal position.
    pub fn go_below(&mut self, granularity: Granularity, wrap: Wrap) -> bool {
        self.go_vertical(granularity, wrap, true)
    }

    fn go_vertical(&mut self, granularity: Granularity, wrap: Wrap, down: bool) -> bool {
        if self.lines.is_empty() {
            return false;
        }
        if self.target.is_none() {
            self.target = self.current_char_rect();
        }
        let new_line = if down {
            if self.line + 1 < self.lines.len() {
                self.line + 1
            } else if wrap.contains(Wrap::TOP_BOTTOM) && self.lines.len() > 1 {
                0
            } else {
                return false;
            }
        } else if self.line > 0 {
            self.line - 1
        } else if wrap.contains(Wrap::TOP_BOTTOM) && self.lines.len() > 1 {
            self.lines.len() - 1
        } else {
            return false;
        };
        self.line = new_line;
        if granularity == Granularity::Line {
            self.zone = 0;
            self.word = 0;
            self.ch = 0;
            return true;
        }
        let (z, w, c) = match self.target {
            Some(target) => target_position_in_line(&self.lines[self.line], &target),
            None => (0, 0, 0),
        };
        self.zone = z;
        self.word = w;
        self.ch = c;
        true
    }

    /// Move to the first position of the current line.
    pub fn go_home(&mut self) -> bool {
        if self.lines.is_empty() {
            return false;
        }
        self.zone = 0;
        self.word = 0;
        self.ch = 0;
        self.remember_target();
        true
    }

    /// Move to the last position of the current line.
    pub fn go_end(&mut self) -> bool {
        if self.lines.is_empty() {
            return false;
        }
        let (l, z, w) = self.last_word_pos_of_line(self.line);
        self.commit_word_pos((l, z, w), true);
        self.remember_target();
        true
    }

    /// Move to the top-left position of the screen.
    pub fn go_top(&mut self) -> bool {
        if self.lines.is_empty() {
            return false;
        }
        self.line = 0;
        self.go_home()
    }

    /// Move to the bottom-right position of the screen.
    pub fn go_bottom(&mut self) -> bool {
        if self.lines.is_empty() {
            return false;
        }
        self.line = self.lines.len() - 1;
        self.go_end()
    }

    /// Route the cursor to the zone (and character) under a screen
    /// point. Returns whether anything was found there.
    pub fn set_current_from_point(&mut self, x: i32, y: i32) -> bool {
        let mut found = None;
        'zones: for (li, line) in self.lines.iter().enumerate() {
            for (zi, zone) in line.zones.iter().enumerate() {
                if !zone.rect.contains(x, y) {
                    continue;
                }
                let mut word = 0;
                let mut ch = 0;
                'find: for (wi, w) in zone.words().iter().enumerate() {
                    for (ci, cb) in w.chars(zone).iter().enumerate() {
                        if cb.rect.contains(x, y)
                            || (cb.rect.x <= x && x < cb.rect.right())
                        {
                            word = wi;
                            ch = ci;
                            break 'find;
                        }
                    }
                }
                found = Some((li, zi, word, ch));
                break 'zones;
            }
        }
        let Some((li, zi, wi, ci)) = found else {
            return false;
        };
        self.line = li;
        self.zone = zi;
        self.word = wi;
        self.ch = ci;
        self.remember_target();
        true
    }

    /// Position the cursor on the first zone owned by a node.
    pub fn set_current_to_node(&mut self, node: &NodeRef) -> bool {
        let mut found = None;
        'zones: for (li, line) in self.lines.iter().enumerate() {
            for (zi, zone) in line.zones.iter().enumerate() {
                if zone.node.handle() == node.handle() {
                    found = Some((li, zi));
                    break 'zones;
                }
            }
        }
        let Some((li, zi)) = found else {
            return false;
        };
        self.line = li;
        self.zone = zi;
        self.word = 0;
        self.ch = 0;
        self.remember_target();
        true
    }

    /// Braille regions of the current line, with the cursor cell
    /// marked in its region.
    #[must_use]
    pub fn braille_regions(&self) -> Vec<BrailleRegion> {
        let Some(line) = self.current_line() else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(line.zones.len());
        let mut column = 0usize;
        for (zi, zone) in line.zones.iter().enumerate() {
            let cursor = (zi == self.zone).then(|| {
                let before: usize = zone
                    .words()
                    .iter()
                    .take(self.word)
                    .map(|w| w.text.chars().count())
                    .sum();
                before + self.ch
            });
            out.push(BrailleRegion {
                text: zone.text.clone(),
                column,
                zone: zi,
                cursor,
            });
            column += zone.text.chars().count() + 1;
        }
        out
    }
}
