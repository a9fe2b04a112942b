//! Clustering zones into visual lines.

use crate::geometry::Rect;

use super::zone::Zone;

/// An ordered left-to-right run of zones sharing a horizontal band.
#[derive(Debug)]
pub struct Line {
    pub zones: Vec<Zone>,
    /// Union of the member zones' rectangles.
    pub rect: Rect,
}

impl Line {
    /// Concatenated member texts, space separated.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        for (i, zone) in self.zones.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&zone.text);
        }
        out
    }
}

/// Cluster zones into lines by vertical overlap.
///
/// Zones are swept in ascending-y (then ascending-x) order; each joins
/// the first existing line all of whose members overlap it vertically
/// by more than `threshold` of the shorter height, inserted at its
/// x position. The first-compatible rule deliberately biases an
/// ambiguous zone toward the topmost line, which keeps layouts with
/// overlapping decorative elements stable.
#[must_use]
pub fn cluster_zones_by_line(mut zones: Vec<Zone>, threshold: f32) -> Vec<Line> {
    zones.sort_by_key(|z| (z.rect.y, z.rect.x, z.start_offset));

    let mut lines: Vec<Line> = Vec::new();
    'zones: for zone in zones {
        for line in &mut lines {
            let compatible = line
                .zones
                .iter()
                .all(|m| m.rect.vertical_overlap_ratio(&zone.rect) > threshold);
            if compatible {
                let at = line
                    .zones
                    .iter()
                    .position(|m| m.rect.x > zone.rect.x)
                    .unwrap_or(line.zones.len());
                line.rect = line.rect.union(&zone.rect);
                line.zones.insert(at, zone);
                continue 'zones;
            }
        }
        lines.push(Line {
            rect: zone.rect,
            zones: vec![zone],
        });
    }
    lines
}
