//! Named-content registries
//!
//! The engine validates every id a document references against a
//! `ContentCatalog` populated by the host before mapgen documents load.
//! Each kind exposes an `is_valid` check and a getter; group kinds also
//! expose a weighted pick.

pub mod ids;
pub mod region;

pub use region::RegionSettings;

use ids::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::mapgen::range::IntRange;

/// A terrain type: an id plus the flag set the engine cares about
/// (`OPEN` for walkability checks, `PLANT` for sealed-item validation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainDef {
    pub id: TerrainId,
    #[serde(default)]
    pub flags: HashSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FurnitureDef {
    pub id: FurnitureId,
    #[serde(default)]
    pub flags: HashSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: ItemId,
    #[serde(default)]
    pub flags: HashSet<String>,
}

/// One weighted member of an item group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemGroupEntry {
    pub item: ItemId,
    pub weight: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemGroupDef {
    pub id: ItemGroupId,
    pub entries: Vec<ItemGroupEntry>,
}

/// One weighted member of a monster group, with its pack size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonsterGroupEntry {
    pub monster: MonsterId,
    pub weight: u32,
    pub pack: IntRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonsterGroupDef {
    pub id: MonsterGroupId,
    pub entries: Vec<MonsterGroupEntry>,
}

/// A vehicle type and the cells its hull covers, relative to its anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleTypeDef {
    pub id: VehicleTypeId,
    pub footprint: Vec<(i32, i32)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleGroupDef {
    pub id: VehicleGroupId,
    pub entries: Vec<(VehicleTypeId, u32)>,
}

/// Every named-content registry the engine consults at load and apply time.
#[derive(Debug, Clone, Default)]
pub struct ContentCatalog {
    terrain: HashMap<TerrainId, TerrainDef>,
    furniture: HashMap<FurnitureId, FurnitureDef>,
    traps: HashSet<TrapId>,
    fields: HashSet<FieldId>,
    items: HashMap<ItemId, ItemDef>,
    item_groups: HashMap<ItemGroupId, ItemGroupDef>,
    monsters: HashSet<MonsterId>,
    monster_groups: HashMap<MonsterGroupId, MonsterGroupDef>,
    vehicle_types: HashMap<VehicleTypeId, VehicleTypeDef>,
    vehicle_groups: HashMap<VehicleGroupId, VehicleGroupDef>,
    npc_classes: HashSet<NpcClassId>,
    factions: HashSet<FactionId>,
    zone_types: HashSet<ZoneTypeId>,
    snippets: HashMap<SnippetId, String>,
}

impl ContentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_terrain(&mut self, id: impl Into<TerrainId>, flags: &[&str]) {
        let id = id.into();
        let flags = flags.iter().map(|f| f.to_string()).collect();
        self.terrain.insert(id.clone(), TerrainDef { id, flags });
    }

    pub fn register_furniture(&mut self, id: impl Into<FurnitureId>, flags: &[&str]) {
        let id = id.into();
        let flags = flags.iter().map(|f| f.to_string()).collect();
        self.furniture.insert(id.clone(), FurnitureDef { id, flags });
    }

    pub fn register_trap(&mut self, id: impl Into<TrapId>) {
        self.traps.insert(id.into());
    }

    pub fn register_field(&mut self, id: impl Into<FieldId>) {
        self.fields.insert(id.into());
    }

    pub fn register_item(&mut self, id: impl Into<ItemId>, flags: &[&str]) {
        let id = id.into();
        let flags = flags.iter().map(|f| f.to_string()).collect();
        self.items.insert(id.clone(), ItemDef { id, flags });
    }

    pub fn register_item_group(
        &mut self,
        id: impl Into<ItemGroupId>,
        entries: Vec<ItemGroupEntry>,
    ) {
        let id = id.into();
        self.item_groups.insert(id.clone(), ItemGroupDef { id, entries });
    }

    pub fn register_monster(&mut self, id: impl Into<MonsterId>) {
        self.monsters.insert(id.into());
    }

    pub fn register_monster_group(
        &mut self,
        id: impl Into<MonsterGroupId>,
        entries: Vec<MonsterGroupEntry>,
    ) {
        let id = id.into();
        self.monster_groups
            .insert(id.clone(), MonsterGroupDef { id, entries });
    }

    pub fn register_vehicle_type(
        &mut self,
        id: impl Into<VehicleTypeId>,
        footprint: Vec<(i32, i32)>,
    ) {
        let id = id.into();
        let footprint = if footprint.is_empty() {
            vec![(0, 0)]
        } else {
            footprint
        };
        self.vehicle_types
            .insert(id.clone(), VehicleTypeDef { id, footprint });
    }

    pub fn register_vehicle_group(
        &mut self,
        id: impl Into<VehicleGroupId>,
        entries: Vec<(VehicleTypeId, u32)>,
    ) {
        let id = id.into();
        self.vehicle_groups
            .insert(id.clone(), VehicleGroupDef { id, entries });
    }

    pub fn register_npc_class(&mut self, id: impl Into<NpcClassId>) {
        self.npc_classes.insert(id.into());
    }

    pub fn register_faction(&mut self, id: impl Into<FactionId>) {
        self.factions.insert(id.into());
    }

    pub fn register_zone_type(&mut self, id: impl Into<ZoneTypeId>) {
        self.zone_types.insert(id.into());
    }

    pub fn register_snippet(&mut self, id: impl Into<SnippetId>, text: impl Into<String>) {
        self.snippets.insert(id.into(), text.into());
    }

    pub fn is_valid_terrain(&self, id: &TerrainId) -> bool {
        self.terrain.contains_key(id)
    }

    pub fn terrain(&self, id: &TerrainId) -> Option<&TerrainDef> {
        self.terrain.get(id)
    }

    pub fn is_valid_furniture(&self, id: &FurnitureId) -> bool {
        self.furniture.contains_key(id)
    }

    pub fn furniture(&self, id: &FurnitureId) -> Option<&FurnitureDef> {
        self.furniture.get(id)
    }

    pub fn is_valid_trap(&self, id: &TrapId) -> bool {
        self.traps.contains(id)
    }

    pub fn is_valid_field(&self, id: &FieldId) -> bool {
        self.fields.contains(id)
    }

    pub fn is_valid_item(&self, id: &ItemId) -> bool {
        self.items.contains_key(id)
    }

    pub fn item(&self, id: &ItemId) -> Option<&ItemDef> {
        self.items.get(id)
    }

    pub fn is_valid_item_group(&self, id: &ItemGroupId) -> bool {
        self.item_groups.contains_key(id)
    }

    pub fn item_group(&self, id: &ItemGroupId) -> Option<&ItemGroupDef> {
        self.item_groups.get(id)
    }

    pub fn is_valid_monster(&self, id: &MonsterId) -> bool {
        self.monsters.contains(id)
    }

    pub fn is_valid_monster_group(&self, id: &MonsterGroupId) -> bool {
        self.monster_groups.contains_key(id)
    }

    pub fn monster_group(&self, id: &MonsterGroupId) -> Option<&MonsterGroupDef> {
        self.monster_groups.get(id)
    }

    pub fn is_valid_vehicle_group(&self, id: &VehicleGroupId) -> bool {
        self.vehicle_groups.contains_key(id)
    }

    pub fn vehicle_type(&self, id: &VehicleTypeId) -> Option<&VehicleTypeDef> {
        self.vehicle_types.get(id)
    }

    pub fn is_valid_npc_class(&self, id: &NpcClassId) -> bool {
        self.npc_classes.contains(id)
    }

    pub fn is_valid_faction(&self, id: &FactionId) -> bool {
        self.factions.contains(id)
    }

    pub fn is_valid_zone_type(&self, id: &ZoneTypeId) -> bool {
        self.zone_types.contains(id)
    }

    pub fn snippet(&self, id: &SnippetId) -> Option<&str> {
        self.snippets.get(id).map(String::as_str)
    }

    /// Weighted pick of one item from a group.
    pub fn pick_from_item_group(
        &self,
        id: &ItemGroupId,
        rng: &mut impl Rng,
    ) -> Option<ItemId> {
        let group = self.item_groups.get(id)?;
        weighted_pick(&group.entries, |e| e.weight, rng).map(|e| e.item.clone())
    }

    /// Weighted pick of one monster (and its pack size range) from a group.
    pub fn pick_from_monster_group(
        &self,
        id: &MonsterGroupId,
        rng: &mut impl Rng,
    ) -> Option<(MonsterId, IntRange)> {
        let group = self.monster_groups.get(id)?;
        weighted_pick(&group.entries, |e| e.weight, rng).map(|e| (e.monster.clone(), e.pack))
    }

    /// Weighted pick of one vehicle type from a group.
    pub fn pick_from_vehicle_group(
        &self,
        id: &VehicleGroupId,
        rng: &mut impl Rng,
    ) -> Option<VehicleTypeId> {
        let group = self.vehicle_groups.get(id)?;
        weighted_pick(&group.entries, |e| e.1, rng).map(|e| e.0.clone())
    }
}

fn weighted_pick<'a, T>(
    entries: &'a [T],
    weight: impl Fn(&T) -> u32,
    rng: &mut impl Rng,
) -> Option<&'a T> {
    let total: u64 = entries.iter().map(|e| u64::from(weight(e))).sum();
    if total == 0 {
        return None;
    }
    let mut roll = rng.gen_range(0..total);
    for entry in entries {
        let w = u64::from(weight(entry));
        if roll < w {
            return Some(entry);
        }
        roll -= w;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn lookups_distinguish_kinds() {
        let mut content = ContentCatalog::new();
        content.register_terrain("t_floor", &["OPEN"]);
        content.register_furniture("f_table", &[]);

        assert!(content.is_valid_terrain(&"t_floor".into()));
        assert!(!content.is_valid_terrain(&"f_table".into()));
        assert!(content.is_valid_furniture(&"f_table".into()));
        assert!(content.terrain(&"t_floor".into()).unwrap().flags.contains("OPEN"));
    }

    #[test]
    fn item_group_pick_respects_zero_weight() {
        let mut content = ContentCatalog::new();
        content.register_item("rock", &[]);
        content.register_item("diamond", &[]);
        content.register_item_group(
            "rocks",
            vec![
                ItemGroupEntry {
                    item: "rock".into(),
                    weight: 10,
                },
                ItemGroupEntry {
                    item: "diamond".into(),
                    weight: 0,
                },
            ],
        );

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let picked = content.pick_from_item_group(&"rocks".into(), &mut rng).unwrap();
            assert_eq!(picked.as_str(), "rock");
        }
    }

    #[test]
    fn empty_group_picks_nothing() {
        let mut content = ContentCatalog::new();
        content.register_item_group("empty", vec![]);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(content.pick_from_item_group(&"empty".into(), &mut rng).is_none());
    }
}
