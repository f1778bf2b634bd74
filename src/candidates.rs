use std::ops::Range;

use crate::types::{Cell, Item, Rect};

/// One (item, origin) pairing. The candidate id is its index in the owning
/// [`CandidateSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Index of the item in the solved slice.
    pub item: usize,
    pub x: u32,
    pub y: u32,
    pub size: Rect,
}

impl Candidate {
    pub fn origin(&self) -> Cell {
        (self.x, self.y)
    }

    /// Cells covered by the rectangle, row by row.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (self.y..self.y + self.size.h)
            .flat_map(move |y| (self.x..self.x + self.size.w).map(move |x| (x, y)))
    }

    pub fn cell_count(&self) -> u64 {
        self.size.area()
    }
}

/// All candidates for one trial height. Owns the candidates by index and
/// knows which index range belongs to which item; dropped when the trial
/// ends.
#[derive(Debug, Clone)]
pub struct CandidateSet<'a> {
    items: &'a [Item],
    width: u32,
    height: u32,
    candidates: Vec<Candidate>,
    ranges: Vec<Range<usize>>,
}

/// Enumerates every position where each item fits inside the `width` x
/// `height` strip. Items larger than the strip get an empty range.
pub fn generate(items: &[Item], width: u32, height: u32) -> CandidateSet<'_> {
    let strip = Rect::new(width, height);
    let capacity: usize = items
        .iter()
        .filter(|i| i.size().fits_in(&strip))
        .map(|i| ((width - i.w + 1) as usize) * ((height - i.h + 1) as usize))
        .sum();

    let mut candidates = Vec::with_capacity(capacity);
    let mut ranges = Vec::with_capacity(items.len());

    for (idx, item) in items.iter().enumerate() {
        let start = candidates.len();
        let size = item.size();
        if size.fits_in(&strip) {
            for x in 0..=width - size.w {
                for y in 0..=height - size.h {
                    candidates.push(Candidate {
                        item: idx,
                        x,
                        y,
                        size,
                    });
                }
            }
        }
        ranges.push(start..candidates.len());
    }

    CandidateSet {
        items,
        width,
        height,
        candidates,
        ranges,
    }
}

impl<'a> CandidateSet<'a> {
    pub fn items(&self) -> &'a [Item] {
        self.items
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Candidate> {
        self.candidates.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Candidate)> {
        self.candidates.iter().enumerate()
    }

    /// Candidate ids belonging to the item at `item_idx`.
    pub fn ids_for(&self, item_idx: usize) -> Range<usize> {
        self.ranges[item_idx].clone()
    }

    /// Items with no position at this height.
    pub fn unplaceable(&self) -> impl Iterator<Item = &'a Item> + '_ {
        self.ranges
            .iter()
            .zip(self.items)
            .filter(|(r, _)| r.is_empty())
            .map(|(_, item)| item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_edge_inclusive_origins() {
        let items = vec![Item::new("a", 2, 1)];
        let set = generate(&items, 4, 3);
        // x in 0..=2, y in 0..=2
        assert_eq!(set.len(), 9);
        assert!(set.iter().any(|(_, c)| c.origin() == (0, 0)));
        assert!(set.iter().any(|(_, c)| c.origin() == (2, 2)));
    }

    #[test]
    fn test_cells_match_rectangle() {
        let c = Candidate {
            item: 0,
            x: 1,
            y: 2,
            size: Rect::new(2, 2),
        };
        let cells: Vec<Cell> = c.cells().collect();
        assert_eq!(cells, vec![(1, 2), (2, 2), (1, 3), (2, 3)]);
        assert_eq!(c.cell_count(), 4);
    }

    #[test]
    fn test_too_tall_item_is_skipped() {
        let items = vec![Item::new("a", 1, 1), Item::new("tall", 1, 5)];
        let set = generate(&items, 2, 3);
        assert_eq!(set.ids_for(0).len(), 6);
        assert!(set.ids_for(1).is_empty());
        let missing: Vec<&str> = set.unplaceable().map(|i| i.id.as_str()).collect();
        assert_eq!(missing, vec!["tall"]);
    }

    #[test]
    fn test_too_wide_item_has_no_candidates_at_any_height() {
        let items = vec![Item::new("wide", 5, 1)];
        for h in 1..10 {
            assert!(generate(&items, 3, h).is_empty());
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let items = vec![Item::new("a", 2, 3), Item::new("b", 1, 1)];
        let first = generate(&items, 5, 4);
        let second = generate(&items, 5, 4);
        let a: Vec<_> = first.iter().map(|(id, c)| (id, *c)).collect();
        let b: Vec<_> = second.iter().map(|(id, c)| (id, *c)).collect();
        assert_eq!(a, b);
        for ((_, ca), (_, cb)) in first.iter().zip(second.iter()) {
            assert!(ca.cells().eq(cb.cells()));
        }
    }

    #[test]
    fn test_ranges_partition_ids() {
        let items = vec![Item::new("a", 1, 1), Item::new("b", 2, 2)];
        let set = generate(&items, 3, 3);
        assert_eq!(set.ids_for(0), 0..9);
        assert_eq!(set.ids_for(1), 9..13);
        for id in set.ids_for(1) {
            assert_eq!(set.get(id).unwrap().item, 1);
        }
    }

    #[test]
    fn test_all_cells_inside_strip() {
        let items = vec![Item::new("a", 2, 3), Item::new("b", 3, 1)];
        let set = generate(&items, 4, 5);
        for (_, c) in set.iter() {
            for (x, y) in c.cells() {
                assert!(x < 4 && y < 5, "cell ({x},{y}) outside strip");
            }
        }
    }
}
