use std::num::NonZeroU32;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::solver::Solver;
use crate::types::{Item, PlacementResult};

/// Items waiting to be packed, sized in cells of `resolution` pixels.
#[derive(Debug, Clone)]
pub struct Catalog {
    resolution: NonZeroU32,
    items: Vec<Item>,
}

impl Catalog {
    pub fn new(resolution: NonZeroU32) -> Self {
        Self {
            resolution,
            items: Vec::new(),
        }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution.get()
    }

    /// Adds an item measured in cells under a fresh id.
    pub fn add(&mut self, w: u32, h: u32) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.add_with_id(id.clone(), w, h)?;
        Ok(id)
    }

    pub fn add_with_id(&mut self, id: impl Into<String>, w: u32, h: u32) -> Result<()> {
        let item = Item::new(id, w, h);
        if w == 0 || h == 0 {
            return Err(Error::invalid_item(
                &item.id,
                format!("size {} has a zero side", item.size()),
            ));
        }
        if self.get(&item.id).is_some() {
            return Err(Error::DuplicateItem(item.id));
        }
        self.items.push(item);
        Ok(())
    }

    /// Adds a grid-aligned image rectangle. Pixel sizes must be exact
    /// multiples of the resolution.
    pub fn add_sized(&mut self, pixel_w: u32, pixel_h: u32) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let r = self.resolution();
        if pixel_w % r != 0 || pixel_h % r != 0 {
            return Err(Error::invalid_item(
                &id,
                format!("{pixel_w}x{pixel_h} px is not aligned to a {r} px grid"),
            ));
        }
        self.add_with_id(id.clone(), pixel_w / r, pixel_h / r)?;
        Ok(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Item> {
        let idx = self.items.iter().position(|i| i.id == id)?;
        Some(self.items.remove(idx))
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn list(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.id.as_str()).collect()
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Copy of the current items, for handing to a solve call.
    pub fn snapshot(&self) -> Vec<Item> {
        self.items.clone()
    }

    /// Strip width in whole cells; any remainder pixels are unusable.
    pub fn strip_cells(&self, strip_px: u32) -> u32 {
        strip_px / self.resolution()
    }

    /// Packs the catalog into a strip `strip_px` pixels wide.
    pub fn fit(&self, solver: &Solver, strip_px: u32) -> Result<PlacementResult> {
        solver.solve_strip(&self.snapshot(), self.strip_cells(strip_px))
    }
}
