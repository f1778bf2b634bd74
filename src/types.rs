use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// Size of an item in grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub w: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub h: u32,
}

impl Rect {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    pub fn fits_in(&self, other: &Rect) -> bool {
        self.w <= other.w && self.h <= other.h
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

/// Accepts `3` as well as `3.0`, which JavaScript clients tend to send.
pub fn deserialize_u32_from_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Number::deserialize(deserializer)?;
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).map_err(serde::de::Error::custom);
    }
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64 => Ok(f as u32),
        _ => Err(serde::de::Error::custom(format!(
            "expected a non-negative integer, got {value}"
        ))),
    }
}

/// One rectangle to place. Ids must be unique within a solve call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub w: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub h: u32,
}

impl Item {
    pub fn new(id: impl Into<String>, w: u32, h: u32) -> Self {
        Self { id: id.into(), w, h }
    }

    pub fn size(&self) -> Rect {
        Rect::new(self.w, self.h)
    }
}

/// A grid cell, `(x, y)` with `y` growing down the strip.
pub type Cell = (u32, u32);

/// Final position of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
}

/// What the engine said about a single trial height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialOutcome {
    /// Some item had no candidate position; the engine was not called.
    ShortCircuit,
    Infeasible,
    Feasible,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrialReport {
    pub height: u32,
    pub outcome: TrialOutcome,
    pub candidates: usize,
    pub constraints: usize,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_u64(d.as_millis() as u64)
}

/// Minimal-height placement of every item.
#[derive(Debug, Clone, Serialize)]
pub struct PlacementResult {
    pub width: u32,
    pub height: u32,
    pub placements: BTreeMap<String, Placement>,
    pub trials: Vec<TrialReport>,
}

impl PlacementResult {
    pub fn get(&self, id: &str) -> Option<Placement> {
        self.placements.get(id).copied()
    }

    /// Heights in the order they were tried.
    pub fn heights_tried(&self) -> Vec<u32> {
        self.trials.iter().map(|t| t.height).collect()
    }

    /// Pixel offsets for compositing, `cell * resolution`.
    pub fn pixel_offsets(&self, resolution: u32) -> BTreeMap<String, (u64, u64)> {
        self.placements
            .iter()
            .map(|(id, p)| {
                (
                    id.clone(),
                    (p.x as u64 * resolution as u64, p.y as u64 * resolution as u64),
                )
            })
            .collect()
    }

    /// Share of the strip covered by items, in percent.
    pub fn fill_percent(&self, items: &[Item]) -> f64 {
        let strip_area = self.width as u64 * self.height as u64;
        if strip_area == 0 {
            return 0.0;
        }
        let used: u64 = items.iter().map(|i| i.size().area()).sum();
        used as f64 / strip_area as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_deserializes_float_sizes() {
        let item: Item = serde_json::from_str(r#"{"id":"a","w":3.0,"h":2}"#).unwrap();
        assert_eq!(item, Item::new("a", 3, 2));
    }

    #[test]
    fn test_rejects_fractional_size() {
        let res: Result<Item, _> = serde_json::from_str(r#"{"id":"a","w":2.5,"h":2}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_pixel_offsets() {
        let mut placements = BTreeMap::new();
        placements.insert("a".to_string(), Placement { x: 2, y: 3 });
        let result = PlacementResult {
            width: 4,
            height: 4,
            placements,
            trials: vec![],
        };
        assert_eq!(result.pixel_offsets(80)["a"], (160, 240));
    }

    #[test]
    fn test_fill_percent() {
        let result = PlacementResult {
            width: 4,
            height: 2,
            placements: BTreeMap::new(),
            trials: vec![],
        };
        let items = vec![Item::new("a", 2, 2), Item::new("b", 2, 1)];
        assert!((result.fill_percent(&items) - 75.0).abs() < 0.01);
    }
}
