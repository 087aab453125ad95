//! Setmap operations
//!
//! The terse alternative to pieces: point, line and square edits of
//! terrain, furniture, traps and radiation, plus a bash effect. Each
//! operation rolls its own chance and repeat count.

use super::doc::Obj;
use super::range::IntRange;
use crate::content::ids::{ContentKind, FurnitureId, TerrainId, TrapId};
use crate::content::ContentCatalog;
use crate::error::{LoadError, MissingRef};
use crate::map::{line_points, MapSurface};
use rand::rngs::StdRng;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetmapShape {
    Point,
    Line,
    Square,
}

/// What the operation writes. Ids are resolved against the content catalog
/// at load time; radiation carries a literal amount instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetmapKind {
    Terrain(TerrainId),
    Furniture(FurnitureId),
    Trap(TrapId),
    Radiation(IntRange),
    /// Smash the cell: furniture and trap go, terrain stays.
    Bash,
}

#[derive(Debug, Clone)]
pub struct SetmapOperation {
    pub kind: SetmapKind,
    pub shape: SetmapShape,
    pub x: IntRange,
    pub y: IntRange,
    pub x2: IntRange,
    pub y2: IntRange,
    /// One-in-N roll per repetition; 0 and 1 always pass.
    pub chance: i32,
    pub repeat: IntRange,
    /// Part of the document syntax alongside `fuel` and `status`; the
    /// point/line/square edits here never consume them.
    pub rotation: IntRange,
    pub fuel: i32,
    pub status: i32,
}

impl SetmapOperation {
    /// Parse one entry of a `"set"` array. Unknown ids are recorded in
    /// `missing` (deferring the whole chunk); structural problems fail.
    pub fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        extent: i32,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let mut shape_key = None;
        for key in ["point", "line", "square"] {
            if obj.has(key) {
                if shape_key.is_some() {
                    return Err(obj.fail("more than one of point/line/square"));
                }
                shape_key = Some(key);
            }
        }
        let shape_key =
            shape_key.ok_or_else(|| obj.fail("expected one of point/line/square"))?;
        let shape = match shape_key {
            "point" => SetmapShape::Point,
            "line" => SetmapShape::Line,
            _ => SetmapShape::Square,
        };

        let op = obj.str_field(shape_key)?;
        let kind = match op {
            "terrain" => {
                let id = TerrainId::from(obj.str_field("id")?);
                if !content.is_valid_terrain(&id) {
                    missing.push(MissingRef::new(ContentKind::Terrain, id.as_str()));
                }
                SetmapKind::Terrain(id)
            }
            "furniture" => {
                let id = FurnitureId::from(obj.str_field("id")?);
                if !content.is_valid_furniture(&id) {
                    missing.push(MissingRef::new(ContentKind::Furniture, id.as_str()));
                }
                SetmapKind::Furniture(id)
            }
            "trap" => {
                let id = TrapId::from(obj.str_field("id")?);
                if !content.is_valid_trap(&id) {
                    missing.push(MissingRef::new(ContentKind::Trap, id.as_str()));
                }
                SetmapKind::Trap(id)
            }
            "radiation" => {
                let amount = obj.range_or("amount", IntRange::fixed(1))?;
                SetmapKind::Radiation(amount)
            }
            "bash" => SetmapKind::Bash,
            other => return Err(obj.fail(format!("unknown setmap op {other:?}"))),
        };

        let x = obj
            .opt_range("x")?
            .ok_or_else(|| obj.fail("missing required field \"x\""))?;
        let y = obj
            .opt_range("y")?
            .ok_or_else(|| obj.fail("missing required field \"y\""))?;
        let needs_second = shape != SetmapShape::Point;
        let x2 = match obj.opt_range("x2")? {
            Some(r) => r,
            None if needs_second => return Err(obj.fail("missing required field \"x2\"")),
            None => x,
        };
        let y2 = match obj.opt_range("y2")? {
            Some(r) => r,
            None if needs_second => return Err(obj.fail("missing required field \"y2\"")),
            None => y,
        };

        for (axis, range) in [('x', x), ('y', y), ('x', x2), ('y', y2)] {
            if !range.within(extent) {
                return Err(LoadError::OutOfBounds {
                    context: obj.context().to_string(),
                    axis,
                    value: if range.min < 0 { range.min } else { range.max },
                    extent,
                });
            }
        }

        let chance = obj.int_or("chance", 1)? as i32;
        let repeat = obj.range_or("repeat", IntRange::fixed(1))?;
        let rotation = obj.range_or("rotation", IntRange::fixed(0))?;
        let fuel = obj.int_or("fuel", -1)? as i32;
        let status = obj.int_or("status", -1)? as i32;

        Ok(Self {
            kind,
            shape,
            x,
            y,
            x2,
            y2,
            chance,
            repeat,
            rotation,
            fuel,
            status,
        })
    }

    /// Apply, translated by `offset` (nested and update chunks).
    pub fn apply(&self, surface: &mut MapSurface, rng: &mut StdRng, offset: (i32, i32)) {
        let reps = self.repeat.get(rng).max(1);
        for _ in 0..reps {
            if !self.roll_chance(rng) {
                continue;
            }
            for (x, y) in self.target_cells(rng, offset) {
                self.apply_cell(surface, rng, x, y);
            }
        }
    }

    /// Like `apply`, but aborts (returning `false`) as soon as a target
    /// cell is covered by a vehicle. Callers stage on a clone for
    /// atomicity.
    pub fn apply_checked(
        &self,
        surface: &mut MapSurface,
        rng: &mut StdRng,
        offset: (i32, i32),
    ) -> bool {
        let reps = self.repeat.get(rng).max(1);
        for _ in 0..reps {
            if !self.roll_chance(rng) {
                continue;
            }
            let cells = self.target_cells(rng, offset);
            if cells.iter().any(|&(x, y)| surface.has_vehicle_at(x, y)) {
                return false;
            }
            for (x, y) in cells {
                self.apply_cell(surface, rng, x, y);
            }
        }
        true
    }

    fn roll_chance(&self, rng: &mut StdRng) -> bool {
        self.chance <= 1 || rng.gen_range(0..self.chance) == 0
    }

    fn target_cells(&self, rng: &mut StdRng, offset: (i32, i32)) -> Vec<(i32, i32)> {
        let x = self.x.get(rng) + offset.0;
        let y = self.y.get(rng) + offset.1;
        match self.shape {
            SetmapShape::Point => vec![(x, y)],
            SetmapShape::Line => {
                let x2 = self.x2.get(rng) + offset.0;
                let y2 = self.y2.get(rng) + offset.1;
                line_points(x, y, x2, y2)
            }
            SetmapShape::Square => {
                let x2 = self.x2.get(rng) + offset.0;
                let y2 = self.y2.get(rng) + offset.1;
                let (x1, x2) = (x.min(x2), x.max(x2));
                let (y1, y2) = (y.min(y2), y.max(y2));
                let mut cells = Vec::new();
                for cy in y1..=y2 {
                    for cx in x1..=x2 {
                        cells.push((cx, cy));
                    }
                }
                cells
            }
        }
    }

    fn apply_cell(&self, surface: &mut MapSurface, rng: &mut StdRng, x: i32, y: i32) {
        match &self.kind {
            SetmapKind::Terrain(id) => surface.set_ter(x, y, id.clone()),
            SetmapKind::Furniture(id) => surface.set_furn(x, y, id.clone()),
            SetmapKind::Trap(id) => surface.set_trap(x, y, id.clone()),
            SetmapKind::Radiation(amount) => surface.add_radiation(x, y, amount.get(rng)),
            SetmapKind::Bash => {
                surface.clear_furn(x, y);
                surface.clear_trap(x, y);
            }
        }
    }
}
