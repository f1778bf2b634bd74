use crate::types::{Item, PlacementResult};

const LABELS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const OVERFLOW_LABEL: char = '#';
const EMPTY: char = '.';

fn label(idx: usize) -> char {
    LABELS.get(idx).map_or(OVERFLOW_LABEL, |&b| b as char)
}

/// Draws the strip one character per cell inside a `+--+` frame, followed by
/// a legend mapping labels to item ids.
pub fn render_strip(items: &[Item], result: &PlacementResult) -> String {
    let w = result.width as usize;
    let h = result.height as usize;
    let mut grid = vec![vec![EMPTY; w]; h];

    for (idx, item) in items.iter().enumerate() {
        let Some(p) = result.get(&item.id) else {
            continue;
        };
        let ch = label(idx);
        for row in grid.iter_mut().skip(p.y as usize).take(item.h as usize) {
            for cell in row.iter_mut().skip(p.x as usize).take(item.w as usize) {
                *cell = ch;
            }
        }
    }

    let border = format!("+{}+\n", "-".repeat(w));
    let mut out = String::with_capacity((w + 3) * (h + 2));
    out.push_str(&border);
    for row in &grid {
        out.push('|');
        out.extend(row.iter());
        out.push_str("|\n");
    }
    out.push_str(&border);

    for (idx, item) in items.iter().enumerate() {
        if let Some(p) = result.get(&item.id) {
            out.push_str(&format!(
                "  {} = {} ({}) @ ({}, {})\n",
                label(idx),
                item.id,
                item.size(),
                p.x,
                p.y
            ));
        }
    }
    out
}
