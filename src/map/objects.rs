//! Placed-object records
//!
//! Everything a generated tile carries besides its per-cell layers:
//! item stacks, spawn registrations, vehicles, computers, zones.

use crate::content::ids::*;
use serde::{Deserialize, Serialize};

/// A stack of one item type resting on a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: ItemId,
    pub count: u32,
    /// Charges for liquids, fuel and tools.
    pub charges: Option<i32>,
    /// Sealed stacks survive inside planted furniture.
    pub sealed: bool,
    /// Day the stack came into existence.
    pub birthday: u64,
}

impl ItemStack {
    pub fn new(item: ItemId, count: u32, birthday: u64) -> Self {
        Self {
            item,
            count,
            charges: None,
            sealed: false,
            birthday,
        }
    }
}

/// What a monster spawn record points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnKind {
    Monster(MonsterId),
    Group(MonsterGroupId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterSpawn {
    pub kind: SpawnKind,
    pub count: i32,
    pub x: i32,
    pub y: i32,
    pub friendly: bool,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcSpawn {
    pub class: NpcClassId,
    pub x: i32,
    pub y: i32,
    pub traits: Vec<String>,
}

/// A vehicle committed to the tile. `cells` are the absolute cells its
/// hull covers after facing is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedVehicle {
    pub vehicle: VehicleTypeId,
    pub x: i32,
    pub y: i32,
    /// Facing in degrees, quarter-turn aligned.
    pub facing: i32,
    /// Fuel percentage, -1 for a random amount at spawn.
    pub fuel: i32,
    /// Damage status, -1 for lightly damaged, 0 for undamaged, 1 for wreck.
    pub status: i32,
    pub cells: Vec<(i32, i32)>,
}

impl PlacedVehicle {
    pub fn covers(&self, x: i32, y: i32) -> bool {
        self.cells.iter().any(|&(cx, cy)| cx == x && cy == y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputerOption {
    pub name: String,
    pub action: String,
    pub security: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputerFailure {
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Computer {
    pub name: String,
    pub security: i32,
    pub access_denied: Option<String>,
    pub options: Vec<ComputerOption>,
    pub failures: Vec<ComputerFailure>,
}

/// A zone registered over an inclusive cell rectangle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneMarker {
    pub zone: ZoneTypeId,
    pub faction: FactionId,
    pub name: Option<String>,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

/// Faction ownership over an inclusive cell rectangle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionClaim {
    pub faction: FactionId,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

/// One field (gas, fire, blood...) on a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub field: FieldId,
    pub intensity: i32,
    pub age: i32,
}
