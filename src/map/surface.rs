//! The mutable tile surface
//!
//! A square grid of per-cell layers (terrain, furniture, trap, radiation,
//! field) plus every object placed on it. The generation pipeline owns a
//! surface exclusively for the duration of one tile; out-of-bounds writes
//! are ignored the same way out-of-bounds tile reads return nothing.

use super::objects::*;
use crate::content::ids::*;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct MapSurface {
    size: i32,
    terrain: Vec<TerrainId>,
    furniture: Vec<Option<FurnitureId>>,
    traps: Vec<Option<TrapId>>,
    radiation: Vec<i32>,
    fields: Vec<Option<FieldEntry>>,
    items: HashMap<(i32, i32), Vec<ItemStack>>,
    spawns: Vec<(MonsterSpawn, Option<MissionId>)>,
    npcs: Vec<(NpcSpawn, Option<MissionId>)>,
    vehicles: Vec<PlacedVehicle>,
    computers: HashMap<(i32, i32), (Computer, Option<MissionId>)>,
    signs: HashMap<(i32, i32), String>,
    graffiti: HashMap<(i32, i32), String>,
    zones: Vec<ZoneMarker>,
    claims: Vec<FactionClaim>,
}

impl MapSurface {
    /// Create a surface of `size`x`size` cells, every cell set to `fill`.
    pub fn new(size: i32, fill: TerrainId) -> Self {
        assert!(size > 0, "surface size must be positive");
        let cells = (size * size) as usize;
        Self {
            size,
            terrain: vec![fill; cells],
            furniture: vec![None; cells],
            traps: vec![None; cells],
            radiation: vec![0; cells],
            fields: vec![None; cells],
            items: HashMap::new(),
            spawns: Vec::new(),
            npcs: Vec::new(),
            vehicles: Vec::new(),
            computers: HashMap::new(),
            signs: HashMap::new(),
            graffiti: HashMap::new(),
            zones: Vec::new(),
            claims: Vec::new(),
        }
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.size && y >= 0 && y < self.size
    }

    #[inline]
    fn idx(&self, x: i32, y: i32) -> usize {
        (y * self.size + x) as usize
    }

    pub fn ter(&self, x: i32, y: i32) -> Option<&TerrainId> {
        if self.in_bounds(x, y) {
            Some(&self.terrain[self.idx(x, y)])
        } else {
            None
        }
    }

    pub fn set_ter(&mut self, x: i32, y: i32, id: TerrainId) {
        if self.in_bounds(x, y) {
            let idx = self.idx(x, y);
            self.terrain[idx] = id;
        }
    }

    pub fn fill_terrain(&mut self, id: &TerrainId) {
        for cell in &mut self.terrain {
            *cell = id.clone();
        }
    }

    /// Replace every cell of terrain `from` with `to`.
    pub fn translate_terrain(&mut self, from: &TerrainId, to: &TerrainId) {
        for cell in &mut self.terrain {
            if cell == from {
                *cell = to.clone();
            }
        }
    }

    pub fn furn(&self, x: i32, y: i32) -> Option<&FurnitureId> {
        if self.in_bounds(x, y) {
            self.furniture[self.idx(x, y)].as_ref()
        } else {
            None
        }
    }

    pub fn set_furn(&mut self, x: i32, y: i32, id: FurnitureId) {
        if self.in_bounds(x, y) {
            let idx = self.idx(x, y);
            self.furniture[idx] = Some(id);
        }
    }

    pub fn clear_furn(&mut self, x: i32, y: i32) {
        if self.in_bounds(x, y) {
            let idx = self.idx(x, y);
            self.furniture[idx] = None;
        }
    }

    pub fn trap(&self, x: i32, y: i32) -> Option<&TrapId> {
        if self.in_bounds(x, y) {
            self.traps[self.idx(x, y)].as_ref()
        } else {
            None
        }
    }

    pub fn set_trap(&mut self, x: i32, y: i32, id: TrapId) {
        if self.in_bounds(x, y) {
            let idx = self.idx(x, y);
            self.traps[idx] = Some(id);
        }
    }

    pub fn clear_trap(&mut self, x: i32, y: i32) {
        if self.in_bounds(x, y) {
            let idx = self.idx(x, y);
            self.traps[idx] = None;
        }
    }

    pub fn radiation(&self, x: i32, y: i32) -> i32 {
        if self.in_bounds(x, y) {
            self.radiation[self.idx(x, y)]
        } else {
            0
        }
    }

    pub fn add_radiation(&mut self, x: i32, y: i32, amount: i32) {
        if self.in_bounds(x, y) {
            let idx = self.idx(x, y);
            self.radiation[idx] = (self.radiation[idx] + amount).max(0);
        }
    }

    pub fn field(&self, x: i32, y: i32) -> Option<&FieldEntry> {
        if self.in_bounds(x, y) {
            self.fields[self.idx(x, y)].as_ref()
        } else {
            None
        }
    }

    pub fn set_field(&mut self, x: i32, y: i32, entry: FieldEntry) {
        if self.in_bounds(x, y) {
            let idx = self.idx(x, y);
            self.fields[idx] = Some(entry);
        }
    }

    pub fn add_item(&mut self, x: i32, y: i32, stack: ItemStack) {
        if self.in_bounds(x, y) {
            self.items.entry((x, y)).or_default().push(stack);
        }
    }

    pub fn items_at(&self, x: i32, y: i32) -> &[ItemStack] {
        self.items.get(&(x, y)).map_or(&[], Vec::as_slice)
    }

    pub fn total_items(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }

    pub fn add_spawn(&mut self, spawn: MonsterSpawn, mission: Option<MissionId>) {
        self.spawns.push((spawn, mission));
    }

    pub fn spawns(&self) -> &[(MonsterSpawn, Option<MissionId>)] {
        &self.spawns
    }

    pub fn add_npc(&mut self, npc: NpcSpawn, mission: Option<MissionId>) {
        self.npcs.push((npc, mission));
    }

    pub fn npcs(&self) -> &[(NpcSpawn, Option<MissionId>)] {
        &self.npcs
    }

    pub fn add_vehicle(&mut self, vehicle: PlacedVehicle) {
        self.vehicles.push(vehicle);
    }

    pub fn vehicles(&self) -> &[PlacedVehicle] {
        &self.vehicles
    }

    /// Does any committed vehicle's hull cover this cell?
    pub fn has_vehicle_at(&self, x: i32, y: i32) -> bool {
        self.vehicles.iter().any(|v| v.covers(x, y))
    }

    pub fn set_computer(&mut self, x: i32, y: i32, computer: Computer, mission: Option<MissionId>) {
        if self.in_bounds(x, y) {
            self.computers.insert((x, y), (computer, mission));
        }
    }

    pub fn computer_at(&self, x: i32, y: i32) -> Option<&Computer> {
        self.computers.get(&(x, y)).map(|(c, _)| c)
    }

    pub fn set_sign(&mut self, x: i32, y: i32, text: String) {
        if self.in_bounds(x, y) {
            self.signs.insert((x, y), text);
        }
    }

    pub fn sign_at(&self, x: i32, y: i32) -> Option<&str> {
        self.signs.get(&(x, y)).map(String::as_str)
    }

    pub fn set_graffiti(&mut self, x: i32, y: i32, text: String) {
        if self.in_bounds(x, y) {
            self.graffiti.insert((x, y), text);
        }
    }

    pub fn graffiti_at(&self, x: i32, y: i32) -> Option<&str> {
        self.graffiti.get(&(x, y)).map(String::as_str)
    }

    pub fn add_zone(&mut self, zone: ZoneMarker) {
        self.zones.push(zone);
    }

    pub fn zones(&self) -> &[ZoneMarker] {
        &self.zones
    }

    pub fn add_claim(&mut self, claim: FactionClaim) {
        self.claims.push(claim);
    }

    pub fn claims(&self) -> &[FactionClaim] {
        &self.claims
    }

    /// Does any cell carry this terrain?
    pub fn contains_terrain(&self, id: &TerrainId) -> bool {
        self.terrain.iter().any(|t| t == id)
    }

    /// Rotate the whole surface by quarter turns clockwise, including every
    /// embedded object. `rotate(4)` is the identity.
    pub fn rotate(&mut self, turns: u32) {
        for _ in 0..(turns % 4) {
            self.rotate_once();
        }
    }

    fn rotate_once(&mut self) {
        let n = self.size;
        self.terrain = rotate_layer(&self.terrain, n);
        self.furniture = rotate_layer(&self.furniture, n);
        self.traps = rotate_layer(&self.traps, n);
        self.radiation = rotate_layer(&self.radiation, n);
        self.fields = rotate_layer(&self.fields, n);

        self.items = rotate_keys(std::mem::take(&mut self.items), n);
        self.computers = rotate_keys(std::mem::take(&mut self.computers), n);
        self.signs = rotate_keys(std::mem::take(&mut self.signs), n);
        self.graffiti = rotate_keys(std::mem::take(&mut self.graffiti), n);

        for (spawn, _) in &mut self.spawns {
            let (x, y) = rotate_point(spawn.x, spawn.y, n);
            spawn.x = x;
            spawn.y = y;
        }
        for (npc, _) in &mut self.npcs {
            let (x, y) = rotate_point(npc.x, npc.y, n);
            npc.x = x;
            npc.y = y;
        }
        for vehicle in &mut self.vehicles {
            let (x, y) = rotate_point(vehicle.x, vehicle.y, n);
            vehicle.x = x;
            vehicle.y = y;
            vehicle.facing = (vehicle.facing + 90) % 360;
            for cell in &mut vehicle.cells {
                *cell = rotate_point(cell.0, cell.1, n);
            }
        }
        for zone in &mut self.zones {
            let (x1, y1, x2, y2) = rotate_rect(zone.x1, zone.y1, zone.x2, zone.y2, n);
            zone.x1 = x1;
            zone.y1 = y1;
            zone.x2 = x2;
            zone.y2 = y2;
        }
        for claim in &mut self.claims {
            let (x1, y1, x2, y2) = rotate_rect(claim.x1, claim.y1, claim.x2, claim.y2, n);
            claim.x1 = x1;
            claim.y1 = y1;
            claim.x2 = x2;
            claim.y2 = y2;
        }
    }
}

/// One clockwise quarter turn of a cell coordinate on an `n`x`n` grid.
#[inline]
pub fn rotate_point(x: i32, y: i32, n: i32) -> (i32, i32) {
    (n - 1 - y, x)
}

fn rotate_rect(x1: i32, y1: i32, x2: i32, y2: i32, n: i32) -> (i32, i32, i32, i32) {
    let (ax, ay) = rotate_point(x1, y1, n);
    let (bx, by) = rotate_point(x2, y2, n);
    (ax.min(bx), ay.min(by), ax.max(bx), ay.max(by))
}

fn rotate_layer<T: Clone>(layer: &[T], n: i32) -> Vec<T> {
    let mut out = layer.to_vec();
    for y in 0..n {
        for x in 0..n {
            let (nx, ny) = rotate_point(x, y, n);
            out[(ny * n + nx) as usize] = layer[(y * n + x) as usize].clone();
        }
    }
    out
}

fn rotate_keys<V>(map: HashMap<(i32, i32), V>, n: i32) -> HashMap<(i32, i32), V> {
    map.into_iter()
        .map(|((x, y), v)| (rotate_point(x, y, n), v))
        .collect()
}

/// Cells of a straight or diagonal line, endpoints inclusive (Bresenham).
pub fn line_points(x1: i32, y1: i32, x2: i32, y2: i32) -> Vec<(i32, i32)> {
    let mut points = Vec::new();
    let dx = (x2 - x1).abs();
    let dy = -(y2 - y1).abs();
    let sx = if x1 < x2 { 1 } else { -1 };
    let sy = if y1 < y2 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x1, y1);
    loop {
        points.push((x, y));
        if x == x2 && y == y2 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    points
}
