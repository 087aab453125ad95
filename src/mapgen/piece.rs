//! Placement pieces
//!
//! The polymorphic unit of work inside a chunk: "place a monster group
//! here", "put a sign there", "nest another chunk at this offset". Modeled
//! as a closed enum matched exhaustively at apply time; each variant
//! validates its own syntax and the ids it references at load time.

use super::catalog::MapgenCatalog;
use super::doc::Obj;
use super::pipeline::apply_chunk_at;
use super::range::IntRange;
use super::{Direction8, Lookup, Neighborhood};
use crate::content::ids::*;
use crate::content::{ContentCatalog, RegionSettings};
use crate::error::{LoadError, MissingRef};
use crate::map::{
    Computer, ComputerFailure, ComputerOption, FactionClaim, FieldEntry, ItemStack, MapSurface,
    MonsterSpawn, NpcSpawn, PlacedVehicle, SpawnKind, ZoneMarker,
};
use rand::rngs::StdRng;
use rand::Rng;
use serde_json::Value;

/// Everything a piece needs while applying itself to one cell.
pub struct ApplyCtx<'a> {
    pub surface: &'a mut MapSurface,
    pub content: &'a ContentCatalog,
    pub catalog: &'a MapgenCatalog,
    pub region: &'a RegionSettings,
    pub neighbors: &'a Neighborhood,
    /// Spawn density scalar propagated from the caller, roughly `[0, 4]`.
    pub density: f32,
    /// Day count stamped onto spawned item stacks.
    pub when: u64,
    pub mission: Option<MissionId>,
    pub rng: &'a mut StdRng,
}

#[derive(Debug, Clone)]
pub enum Piece {
    Field(FieldPiece),
    Npc(NpcPiece),
    FactionOwnership(FactionPiece),
    Sign(SignPiece),
    Graffiti(GraffitiPiece),
    VendingMachine(VendingPiece),
    Toilet(ToiletPiece),
    GasPump(GasPumpPiece),
    LiquidItem(LiquidPiece),
    ItemGroup(ItemGroupPiece),
    Loot(LootPiece),
    MonsterGroup(MonsterGroupPiece),
    Monster(MonsterPiece),
    Vehicle(VehiclePiece),
    Item(ItemPiece),
    Trap(TrapPiece),
    Furniture(FurniturePiece),
    Terrain(TerrainPiece),
    Rubble(RubblePiece),
    Computer(ComputerPiece),
    SealedItem(SealedItemPiece),
    TranslateTerrain(TranslatePiece),
    Zone(ZonePiece),
    Nested(NestedPiece),
    /// Uniform pick of one sub-piece at apply time.
    Alternatives(Vec<Piece>),
}

impl Piece {
    /// Parse one payload of the given kind. An array where an object was
    /// expected becomes an `Alternatives` wrapper.
    pub fn parse_payload(
        kind: &str,
        value: &Value,
        context: &str,
        look: &Lookup<'_>,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Piece, LoadError> {
        if let Value::Array(items) = value {
            if items.is_empty() {
                return Err(LoadError::Malformed {
                    context: context.to_string(),
                    message: "empty alternatives array".to_string(),
                });
            }
            let mut alts = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let ctx = format!("{context}[{i}]");
                alts.push(Self::parse_single(kind, item, &ctx, look, missing)?);
            }
            if alts.len() == 1 {
                return Ok(alts.into_iter().next().unwrap());
            }
            return Ok(Piece::Alternatives(alts));
        }
        Self::parse_single(kind, value, context, look, missing)
    }

    fn parse_single(
        kind: &str,
        value: &Value,
        context: &str,
        look: &Lookup<'_>,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Piece, LoadError> {
        // String shorthand: just the id (or text, for graffiti).
        if let Value::String(s) = value {
            return Self::parse_shorthand(kind, s, context, look, missing);
        }
        let obj = Obj::new(value, context)?;
        let content = look.content;
        match kind {
            "fields" => Ok(Piece::Field(FieldPiece::parse(&obj, content, missing)?)),
            "npcs" => Ok(Piece::Npc(NpcPiece::parse(&obj, content, missing)?)),
            "faction_owner" => Ok(Piece::FactionOwnership(FactionPiece::parse(
                &obj, content, missing,
            )?)),
            "signs" => Ok(Piece::Sign(SignPiece::parse(&obj, content, missing)?)),
            "graffiti" => Ok(Piece::Graffiti(GraffitiPiece::parse(&obj, content, missing)?)),
            "vendingmachines" => Ok(Piece::VendingMachine(VendingPiece::parse(
                &obj, content, missing,
            )?)),
            "toilets" => Ok(Piece::Toilet(ToiletPiece::parse(&obj, content, missing)?)),
            "gaspumps" => Ok(Piece::GasPump(GasPumpPiece::parse(&obj, content, missing)?)),
            "liquids" => Ok(Piece::LiquidItem(LiquidPiece::parse(&obj, content, missing)?)),
            "items" => Ok(Piece::ItemGroup(ItemGroupPiece::parse(&obj, content, missing)?)),
            "loot" => Ok(Piece::Loot(LootPiece::parse(&obj, content, missing)?)),
            "monsters" => Ok(Piece::MonsterGroup(MonsterGroupPiece::parse(
                &obj, content, missing,
            )?)),
            "monster" => Ok(Piece::Monster(MonsterPiece::parse(&obj, content, missing)?)),
            "vehicles" => Ok(Piece::Vehicle(VehiclePiece::parse(&obj, content, missing)?)),
            "item" => Ok(Piece::Item(ItemPiece::parse(&obj, content, missing)?)),
            "traps" => Ok(Piece::Trap(TrapPiece::parse(&obj, content, missing)?)),
            "furniture" => Ok(Piece::Furniture(FurniturePiece::parse(&obj, content, missing)?)),
            "terrain" => Ok(Piece::Terrain(TerrainPiece::parse(&obj, content, missing)?)),
            "rubble" => Ok(Piece::Rubble(RubblePiece::parse(&obj, content, missing)?)),
            "computers" => Ok(Piece::Computer(ComputerPiece::parse(&obj, content, missing)?)),
            "sealed_item" => Ok(Piece::SealedItem(SealedItemPiece::parse(
                &obj, content, missing,
            )?)),
            "translate_ter" => Ok(Piece::TranslateTerrain(TranslatePiece::parse(
                &obj, content, missing,
            )?)),
            "zones" => Ok(Piece::Zone(ZonePiece::parse(&obj, content, missing)?)),
            "nested" => Ok(Piece::Nested(NestedPiece::parse(&obj, look, missing)?)),
            other => Err(obj.fail(format!("unknown placement kind {other:?}"))),
        }
    }

    fn parse_shorthand(
        kind: &str,
        s: &str,
        context: &str,
        look: &Lookup<'_>,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Piece, LoadError> {
        let content = look.content;
        match kind {
            "fields" => {
                let field = FieldId::from(s);
                if !content.is_valid_field(&field) {
                    missing.push(MissingRef::new(ContentKind::Field, s));
                }
                Ok(Piece::Field(FieldPiece {
                    field,
                    intensity: IntRange::fixed(1),
                    age: 0,
                }))
            }
            "items" => {
                let group = ItemGroupId::from(s);
                if !content.is_valid_item_group(&group) {
                    missing.push(MissingRef::new(ContentKind::ItemGroup, s));
                }
                Ok(Piece::ItemGroup(ItemGroupPiece {
                    group,
                    chance: IntRange::fixed(100),
                    scale_density: false,
                }))
            }
            "monsters" => {
                let group = MonsterGroupId::from(s);
                if !content.is_valid_monster_group(&group) {
                    missing.push(MissingRef::new(ContentKind::MonsterGroup, s));
                }
                Ok(Piece::MonsterGroup(MonsterGroupPiece {
                    group,
                    chance: IntRange::fixed(1),
                    density: None,
                }))
            }
            "traps" => {
                let trap = TrapId::from(s);
                if !content.is_valid_trap(&trap) {
                    missing.push(MissingRef::new(ContentKind::Trap, s));
                }
                Ok(Piece::Trap(TrapPiece { trap }))
            }
            "terrain" => {
                let ter = TerrainId::from(s);
                if !content.is_valid_terrain(&ter) {
                    missing.push(MissingRef::new(ContentKind::Terrain, s));
                }
                Ok(Piece::Terrain(TerrainPiece { ter }))
            }
            "furniture" => {
                let furn = FurnitureId::from(s);
                if !content.is_valid_furniture(&furn) {
                    missing.push(MissingRef::new(ContentKind::Furniture, s));
                }
                Ok(Piece::Furniture(FurniturePiece { furn }))
            }
            "graffiti" => Ok(Piece::Graffiti(GraffitiPiece {
                text: Some(s.to_string()),
                snippet: None,
            })),
            _ => Err(LoadError::Malformed {
                context: context.to_string(),
                message: format!("kind {kind:?} does not accept a bare string"),
            }),
        }
    }

    /// The piece's own repeat hint; combined with the descriptor's repeat
    /// by taking the maximum.
    pub fn repeat_range(&self) -> IntRange {
        match self {
            Piece::Item(p) => p.repeat,
            Piece::LiquidItem(p) => p.repeat,
            _ => IntRange::fixed(1),
        }
    }

    /// Apply this piece at `(x, y)`. `area` is the full offset-translated
    /// placement range, used by rectangle pieces (zones, ownership).
    ///
    /// Returns `false` only when `cancel_on_collision` is set and the
    /// piece found a vehicle in the way; plain collisions without the flag
    /// skip the placement and return `true`.
    pub fn apply(
        &self,
        ctx: &mut ApplyCtx<'_>,
        x: i32,
        y: i32,
        area: (IntRange, IntRange),
        cancel_on_collision: bool,
    ) -> bool {
        // Vehicle-sensitive placements probe the destination first.
        if self.is_vehicle_sensitive() && ctx.surface.has_vehicle_at(x, y) {
            if cancel_on_collision {
                return false;
            }
            log::debug!("skipping {} at ({x}, {y}): vehicle in the way", self.kind_name());
            return true;
        }
        match self {
            Piece::Field(p) => p.apply(ctx, x, y),
            Piece::Npc(p) => p.apply(ctx, x, y),
            Piece::FactionOwnership(p) => p.apply(ctx, area),
            Piece::Sign(p) => p.apply(ctx, x, y),
            Piece::Graffiti(p) => p.apply(ctx, x, y),
            Piece::VendingMachine(p) => p.apply(ctx, x, y),
            Piece::Toilet(p) => p.apply(ctx, x, y),
            Piece::GasPump(p) => p.apply(ctx, x, y),
            Piece::LiquidItem(p) => p.apply(ctx, x, y),
            Piece::ItemGroup(p) => p.apply(ctx, x, y),
            Piece::Loot(p) => p.apply(ctx, x, y),
            Piece::MonsterGroup(p) => p.apply(ctx, x, y),
            Piece::Monster(p) => p.apply(ctx, x, y),
            Piece::Vehicle(p) => return p.apply(ctx, x, y, cancel_on_collision),
            Piece::Item(p) => p.apply(ctx, x, y),
            Piece::Trap(p) => p.apply(ctx, x, y),
            Piece::Furniture(p) => p.apply(ctx, x, y),
            Piece::Terrain(p) => p.apply(ctx, x, y),
            Piece::Rubble(p) => p.apply(ctx, x, y),
            Piece::Computer(p) => p.apply(ctx, x, y),
            Piece::SealedItem(p) => p.apply(ctx, x, y),
            Piece::TranslateTerrain(p) => p.apply(ctx),
            Piece::Zone(p) => p.apply(ctx, area),
            Piece::Nested(p) => return p.apply(ctx, x, y, cancel_on_collision),
            Piece::Alternatives(alts) => {
                let idx = ctx.rng.gen_range(0..alts.len());
                return alts[idx].apply(ctx, x, y, area, cancel_on_collision);
            }
        }
        true
    }

    /// Must this piece probe for an existing vehicle before committing?
    pub fn is_vehicle_sensitive(&self) -> bool {
        matches!(
            self,
            Piece::Sign(_)
                | Piece::VendingMachine(_)
                | Piece::Toilet(_)
                | Piece::GasPump(_)
                | Piece::Furniture(_)
                | Piece::Terrain(_)
                | Piece::Trap(_)
                | Piece::Computer(_)
                | Piece::Rubble(_)
                | Piece::SealedItem(_)
        )
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Piece::Field(_) => "field",
            Piece::Npc(_) => "npc",
            Piece::FactionOwnership(_) => "faction_owner",
            Piece::Sign(_) => "sign",
            Piece::Graffiti(_) => "graffiti",
            Piece::VendingMachine(_) => "vending machine",
            Piece::Toilet(_) => "toilet",
            Piece::GasPump(_) => "gas pump",
            Piece::LiquidItem(_) => "liquid",
            Piece::ItemGroup(_) => "item group",
            Piece::Loot(_) => "loot",
            Piece::MonsterGroup(_) => "monster group",
            Piece::Monster(_) => "monster",
            Piece::Vehicle(_) => "vehicle",
            Piece::Item(_) => "item",
            Piece::Trap(_) => "trap",
            Piece::Furniture(_) => "furniture",
            Piece::Terrain(_) => "terrain",
            Piece::Rubble(_) => "rubble",
            Piece::Computer(_) => "computer",
            Piece::SealedItem(_) => "sealed item",
            Piece::TranslateTerrain(_) => "terrain translation",
            Piece::Zone(_) => "zone",
            Piece::Nested(_) => "nested chunk",
            Piece::Alternatives(_) => "alternatives",
        }
    }
}

fn percent_roll(pct: i32, rng: &mut StdRng) -> bool {
    pct >= 100 || (pct > 0 && rng.gen_range(0..100) < pct)
}

fn one_in(n: i32, rng: &mut StdRng) -> bool {
    n <= 1 || rng.gen_range(0..n) == 0
}

fn clamp_rect(area: (IntRange, IntRange), size: i32) -> (i32, i32, i32, i32) {
    let x1 = area.0.min.clamp(0, size - 1);
    let x2 = area.0.max.clamp(0, size - 1);
    let y1 = area.1.min.clamp(0, size - 1);
    let y2 = area.1.max.clamp(0, size - 1);
    (x1, y1, x2, y2)
}

/// Weighted id list: `"id"`, `["a", "b"]` or `[["a", 3], "b"]`.
fn parse_weighted_ids(value: &Value, context: &str) -> Result<Vec<(String, u32)>, LoadError> {
    let malformed = |msg: &str| LoadError::Malformed {
        context: context.to_string(),
        message: msg.to_string(),
    };
    match value {
        Value::String(s) => Ok(vec![(s.clone(), 1)]),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => out.push((s.clone(), 1)),
                    Value::Array(pair) => match pair.as_slice() {
                        [Value::String(s), w] => {
                            let w = w
                                .as_u64()
                                .ok_or_else(|| malformed("weight must be an integer"))?;
                            out.push((s.clone(), w as u32));
                        }
                        _ => return Err(malformed("expected [\"id\", weight]")),
                    },
                    _ => return Err(malformed("expected id string or [\"id\", weight]")),
                }
            }
            if out.is_empty() {
                return Err(malformed("empty id list"));
            }
            Ok(out)
        }
        _ => Err(malformed("expected an id string or id list")),
    }
}

fn pick_weighted<'a>(entries: &'a [(String, u32)], rng: &mut StdRng) -> Option<&'a str> {
    let total: u64 = entries.iter().map(|(_, w)| u64::from(*w)).sum();
    if total == 0 {
        return None;
    }
    let mut roll = rng.gen_range(0..total);
    for (id, w) in entries {
        let w = u64::from(*w);
        if roll < w {
            return Some(id);
        }
        roll -= w;
    }
    None
}

#[derive(Debug, Clone)]
pub struct FieldPiece {
    pub field: FieldId,
    pub intensity: IntRange,
    pub age: i32,
}

impl FieldPiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let field = FieldId::from(obj.str_field("field")?);
        if !content.is_valid_field(&field) {
            missing.push(MissingRef::new(ContentKind::Field, field.as_str()));
        }
        Ok(Self {
            field,
            intensity: obj.range_or("intensity", IntRange::fixed(1))?,
            age: obj.int_or("age", 0)? as i32,
        })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32) {
        let intensity = self.intensity.get(ctx.rng).max(1);
        ctx.surface.set_field(
            x,
            y,
            FieldEntry {
                field: self.field.clone(),
                intensity,
                age: self.age,
            },
        );
    }
}

#[derive(Debug, Clone)]
pub struct NpcPiece {
    pub class: NpcClassId,
    pub target: bool,
    pub traits: Vec<String>,
}

impl NpcPiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let class = NpcClassId::from(obj.str_field("class")?);
        if !content.is_valid_npc_class(&class) {
            missing.push(MissingRef::new(ContentKind::NpcClass, class.as_str()));
        }
        let traits = match obj.opt_array("add_trait")? {
            None => Vec::new(),
            Some(items) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| obj.fail("add_trait entries must be strings"))
                })
                .collect::<Result<_, _>>()?,
        };
        Ok(Self {
            class,
            target: obj.bool_or("target", false)?,
            traits,
        })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32) {
        let mission = if self.target { ctx.mission } else { None };
        ctx.surface.add_npc(
            NpcSpawn {
                class: self.class.clone(),
                x,
                y,
                traits: self.traits.clone(),
            },
            mission,
        );
    }
}

#[derive(Debug, Clone)]
pub struct FactionPiece {
    pub faction: FactionId,
}

impl FactionPiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let faction = FactionId::from(obj.str_field("id")?);
        if !content.is_valid_faction(&faction) {
            missing.push(MissingRef::new(ContentKind::Faction, faction.as_str()));
        }
        Ok(Self { faction })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, area: (IntRange, IntRange)) {
        let (x1, y1, x2, y2) = clamp_rect(area, ctx.surface.size());
        ctx.surface.add_claim(FactionClaim {
            faction: self.faction.clone(),
            x1,
            y1,
            x2,
            y2,
        });
    }
}

fn resolve_text(
    text: &Option<String>,
    snippet: &Option<SnippetId>,
    content: &ContentCatalog,
) -> Option<String> {
    if let Some(t) = text {
        return Some(t.clone());
    }
    let id = snippet.as_ref()?;
    match content.snippet(id) {
        Some(t) => Some(t.to_string()),
        None => {
            log::warn!("unknown snippet {id:?}, skipping text");
            None
        }
    }
}

fn parse_text_fields(
    obj: &Obj<'_>,
    text_key: &str,
    content: &ContentCatalog,
    missing: &mut Vec<MissingRef>,
) -> Result<(Option<String>, Option<SnippetId>), LoadError> {
    let text = obj.opt_str(text_key)?.map(str::to_string);
    let snippet = obj.opt_str("snippet")?.map(SnippetId::from);
    if let Some(id) = &snippet {
        if content.snippet(id).is_none() {
            missing.push(MissingRef::new(ContentKind::Snippet, id.as_str()));
        }
    }
    if text.is_none() && snippet.is_none() {
        return Err(obj.fail(format!("requires {text_key:?} or \"snippet\"")));
    }
    Ok((text, snippet))
}

#[derive(Debug, Clone)]
pub struct SignPiece {
    pub signage: Option<String>,
    pub snippet: Option<SnippetId>,
    pub furniture: FurnitureId,
}

impl SignPiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let (signage, snippet) = parse_text_fields(obj, "signage", content, missing)?;
        let furniture = FurnitureId::from(obj.opt_str("furniture")?.unwrap_or("f_sign"));
        if !content.is_valid_furniture(&furniture) {
            missing.push(MissingRef::new(ContentKind::Furniture, furniture.as_str()));
        }
        Ok(Self {
            signage,
            snippet,
            furniture,
        })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32) {
        ctx.surface.set_furn(x, y, self.furniture.clone());
        if let Some(text) = resolve_text(&self.signage, &self.snippet, ctx.content) {
            ctx.surface.set_sign(x, y, text);
        }
    }
}

#[derive(Debug, Clone)]
pub struct GraffitiPiece {
    pub text: Option<String>,
    pub snippet: Option<SnippetId>,
}

impl GraffitiPiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let (text, snippet) = parse_text_fields(obj, "text", content, missing)?;
        Ok(Self { text, snippet })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32) {
        if let Some(text) = resolve_text(&self.text, &self.snippet, ctx.content) {
            ctx.surface.set_graffiti(x, y, text);
        }
    }
}

#[derive(Debug, Clone)]
pub struct VendingPiece {
    pub group: ItemGroupId,
    pub reinforced: bool,
}

impl VendingPiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let group = ItemGroupId::from(obj.opt_str("item_group")?.unwrap_or("default_vending"));
        if !content.is_valid_item_group(&group) {
            missing.push(MissingRef::new(ContentKind::ItemGroup, group.as_str()));
        }
        Ok(Self {
            group,
            reinforced: obj.bool_or("reinforced", false)?,
        })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32) {
        let furn = if self.reinforced {
            "f_vending_reinforced"
        } else {
            "f_vending_c"
        };
        ctx.surface.set_furn(x, y, furn.into());
        if let Some(item) = ctx.content.pick_from_item_group(&self.group, ctx.rng) {
            let mut stack = ItemStack::new(item, 1, ctx.when);
            stack.sealed = true;
            ctx.surface.add_item(x, y, stack);
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToiletPiece {
    pub amount: IntRange,
}

impl ToiletPiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        if !content.is_valid_furniture(&"f_toilet".into()) {
            missing.push(MissingRef::new(ContentKind::Furniture, "f_toilet"));
        }
        Ok(Self {
            amount: obj.range_or("amount", IntRange::fixed(0))?,
        })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32) {
        ctx.surface.set_furn(x, y, "f_toilet".into());
        let amount = self.amount.get(ctx.rng);
        if amount > 0 {
            let water = ItemId::from("water");
            if ctx.content.is_valid_item(&water) {
                let mut stack = ItemStack::new(water, 1, ctx.when);
                stack.charges = Some(amount);
                ctx.surface.add_item(x, y, stack);
            } else {
                log::debug!("toilet water item unavailable, placing dry toilet");
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct GasPumpPiece {
    pub fuel: Option<ItemId>,
    pub amount: IntRange,
}

impl GasPumpPiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        if !content.is_valid_furniture(&"f_gas_pump".into()) {
            missing.push(MissingRef::new(ContentKind::Furniture, "f_gas_pump"));
        }
        let fuel = match obj.opt_str("fuel")? {
            None => None,
            Some(id) => {
                let id = ItemId::from(id);
                if !content.is_valid_item(&id) {
                    missing.push(MissingRef::new(ContentKind::Item, id.as_str()));
                }
                Some(id)
            }
        };
        Ok(Self {
            fuel,
            amount: obj.range_or("amount", IntRange::new(10_000, 50_000))?,
        })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32) {
        ctx.surface.set_furn(x, y, "f_gas_pump".into());
        let fuel = match &self.fuel {
            Some(id) => id.clone(),
            None => ItemId::from("gasoline"),
        };
        if !ctx.content.is_valid_item(&fuel) {
            log::debug!("fuel item {fuel:?} unavailable, placing empty pump");
            return;
        }
        let mut stack = ItemStack::new(fuel, 1, ctx.when);
        stack.charges = Some(self.amount.get(ctx.rng).max(0));
        ctx.surface.add_item(x, y, stack);
    }
}

#[derive(Debug, Clone)]
pub struct LiquidPiece {
    pub liquid: ItemId,
    pub amount: IntRange,
    pub chance: IntRange,
    pub repeat: IntRange,
}

impl LiquidPiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let liquid = ItemId::from(obj.str_field("liquid")?);
        if !content.is_valid_item(&liquid) {
            missing.push(MissingRef::new(ContentKind::Item, liquid.as_str()));
        }
        Ok(Self {
            liquid,
            amount: obj.range_or("amount", IntRange::fixed(1))?,
            chance: obj.range_or("chance", IntRange::fixed(1))?,
            repeat: obj.range_or("repeat", IntRange::fixed(1))?,
        })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32) {
        if !one_in(self.chance.get(ctx.rng), ctx.rng) {
            return;
        }
        let mut stack = ItemStack::new(self.liquid.clone(), 1, ctx.when);
        stack.charges = Some(self.amount.get(ctx.rng).max(1));
        ctx.surface.add_item(x, y, stack);
    }
}

#[derive(Debug, Clone)]
pub struct ItemGroupPiece {
    pub group: ItemGroupId,
    /// Percent chance; values above 100 can spawn multiple picks.
    pub chance: IntRange,
    pub scale_density: bool,
}

impl ItemGroupPiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let key = if obj.has("item") { "item" } else { "group" };
        let group = ItemGroupId::from(obj.str_field(key)?);
        if !content.is_valid_item_group(&group) {
            missing.push(MissingRef::new(ContentKind::ItemGroup, group.as_str()));
        }
        Ok(Self {
            group,
            chance: obj.range_or("chance", IntRange::fixed(100))?,
            scale_density: obj.bool_or("scale_density", false)?,
        })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32) {
        let mut effective = self.chance.get(ctx.rng) as f32;
        if self.scale_density {
            effective *= ctx.density.max(0.0);
        }
        while effective > 0.0 {
            let pct = effective.min(100.0) as i32;
            if percent_roll(pct, ctx.rng) {
                match ctx.content.pick_from_item_group(&self.group, ctx.rng) {
                    Some(item) => {
                        ctx.surface.add_item(x, y, ItemStack::new(item, 1, ctx.when));
                    }
                    None => {
                        log::warn!("item group {:?} produced nothing", self.group);
                        return;
                    }
                }
            }
            effective -= 100.0;
        }
    }
}

#[derive(Debug, Clone)]
pub struct LootPiece {
    pub group: Option<ItemGroupId>,
    pub item: Option<ItemId>,
    pub chance: i32,
}

impl LootPiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let group = obj.opt_str("group")?.map(ItemGroupId::from);
        let item = obj.opt_str("item")?.map(ItemId::from);
        match (&group, &item) {
            (Some(_), Some(_)) => {
                return Err(obj.fail("specify either \"group\" or \"item\", not both"))
            }
            (None, None) => return Err(obj.fail("requires \"group\" or \"item\"")),
            _ => {}
        }
        if let Some(g) = &group {
            if !content.is_valid_item_group(g) {
                missing.push(MissingRef::new(ContentKind::ItemGroup, g.as_str()));
            }
        }
        if let Some(i) = &item {
            if !content.is_valid_item(i) {
                missing.push(MissingRef::new(ContentKind::Item, i.as_str()));
            }
        }
        Ok(Self {
            group,
            item,
            chance: obj.int_or("chance", 100)? as i32,
        })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32) {
        if !percent_roll(self.chance, ctx.rng) {
            return;
        }
        let item = match (&self.group, &self.item) {
            (Some(group), _) => ctx.content.pick_from_item_group(group, ctx.rng),
            (None, Some(item)) => Some(item.clone()),
            (None, None) => None,
        };
        match item {
            Some(item) => ctx.surface.add_item(x, y, ItemStack::new(item, 1, ctx.when)),
            None => log::warn!("loot entry produced nothing at ({x}, {y})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonsterGroupPiece {
    pub group: MonsterGroupId,
    /// One-in-N gate per application.
    pub chance: IntRange,
    /// Multiplier on the caller's density scalar.
    pub density: Option<f32>,
}

impl MonsterGroupPiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let group = MonsterGroupId::from(obj.str_field("monster")?);
        if !content.is_valid_monster_group(&group) {
            missing.push(MissingRef::new(ContentKind::MonsterGroup, group.as_str()));
        }
        Ok(Self {
            group,
            chance: obj.range_or("chance", IntRange::fixed(1))?,
            density: obj.opt_f64("density")?.map(|d| d as f32),
        })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32) {
        if !one_in(self.chance.get(ctx.rng), ctx.rng) {
            return;
        }
        let effective = self.density.unwrap_or(1.0) * ctx.density;
        let count = effective.round().max(1.0) as i32;
        ctx.surface.add_spawn(
            MonsterSpawn {
                kind: SpawnKind::Group(self.group.clone()),
                count,
                x,
                y,
                friendly: false,
                name: None,
            },
            None,
        );
    }
}

#[derive(Debug, Clone)]
pub struct MonsterPiece {
    pub ids: Vec<(String, u32)>,
    /// Percent chance.
    pub chance: IntRange,
    pub pack_size: IntRange,
    /// Clamp to at most one spawn regardless of chance overflow.
    pub one_or_none: bool,
    pub friendly: bool,
    pub name: Option<String>,
    pub target: bool,
}

impl MonsterPiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let value = obj
            .get("monster")
            .ok_or_else(|| obj.fail("missing required field \"monster\""))?;
        let ids = parse_weighted_ids(value, &obj.child_context("monster"))?;
        for (id, _) in &ids {
            if !content.is_valid_monster(&MonsterId::from(id.as_str())) {
                missing.push(MissingRef::new(ContentKind::Monster, id.as_str()));
            }
        }
        let pack_size = obj.range_or("pack_size", IntRange::fixed(1))?;
        // A pack spawner wants its whole pack; a lone spawn defaults to
        // the one-or-none clamp.
        let one_or_none = obj.bool_or("one_or_none", !obj.has("pack_size"))?;
        Ok(Self {
            ids,
            chance: obj.range_or("chance", IntRange::fixed(100))?,
            pack_size,
            one_or_none,
            friendly: obj.bool_or("friendly", false)?,
            name: obj.opt_str("name")?.map(str::to_string),
            target: obj.bool_or("target", false)?,
        })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32) {
        let pct = self.chance.get(ctx.rng);
        if !percent_roll(pct, ctx.rng) {
            return;
        }
        let Some(id) = pick_weighted(&self.ids, ctx.rng) else {
            log::warn!("monster list with zero total weight at ({x}, {y})");
            return;
        };
        let count = if self.one_or_none {
            1
        } else {
            self.pack_size.get(ctx.rng).max(1)
        };
        let mission = if self.target { ctx.mission } else { None };
        ctx.surface.add_spawn(
            MonsterSpawn {
                kind: SpawnKind::Monster(MonsterId::from(id)),
                count,
                x,
                y,
                friendly: self.friendly,
                name: self.name.clone(),
            },
            mission,
        );
    }
}

#[derive(Debug, Clone)]
pub struct VehiclePiece {
    pub group: VehicleGroupId,
    /// Percent chance.
    pub chance: i32,
    /// Allowed facings in degrees; one is picked uniformly.
    pub facings: Vec<i32>,
    pub fuel: i32,
    pub status: i32,
}

impl VehiclePiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let group = VehicleGroupId::from(obj.str_field("vehicle")?);
        if !content.is_valid_vehicle_group(&group) {
            missing.push(MissingRef::new(ContentKind::VehicleGroup, group.as_str()));
        }
        let facings = match obj.get("rotation") {
            None => vec![0],
            Some(Value::Number(n)) => vec![n.as_i64().unwrap_or(0) as i32],
            Some(Value::Array(items)) if items.is_empty() => {
                return Err(obj.fail("rotation array must not be empty"))
            }
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_i64()
                        .map(|n| n as i32)
                        .ok_or_else(|| obj.fail("rotation entries must be integers"))
                })
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(obj.fail("rotation must be an integer or integer array")),
        };
        Ok(Self {
            group,
            chance: obj.int_or("chance", 1)? as i32,
            facings,
            fuel: obj.int_or("fuel", -1)? as i32,
            status: obj.int_or("status", -1)? as i32,
        })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32, cancel_on_collision: bool) -> bool {
        if !percent_roll(self.chance, ctx.rng) {
            return true;
        }
        let Some(vehicle) = ctx.content.pick_from_vehicle_group(&self.group, ctx.rng) else {
            log::warn!("vehicle group {:?} produced nothing", self.group);
            return true;
        };
        let facing = self.facings[ctx.rng.gen_range(0..self.facings.len())];
        let footprint = ctx
            .content
            .vehicle_type(&vehicle)
            .map(|def| def.footprint.clone())
            .unwrap_or_else(|| vec![(0, 0)]);
        let quarter_turns = (facing.rem_euclid(360)) / 90;
        let cells: Vec<(i32, i32)> = footprint
            .iter()
            .map(|&(mut dx, mut dy)| {
                for _ in 0..quarter_turns {
                    let (rx, ry) = (-dy, dx);
                    dx = rx;
                    dy = ry;
                }
                (x + dx, y + dy)
            })
            .collect();
        if cells.iter().any(|&(cx, cy)| ctx.surface.has_vehicle_at(cx, cy)) {
            if cancel_on_collision {
                return false;
            }
            log::debug!("vehicle at ({x}, {y}) overlaps an existing vehicle, skipping");
            return true;
        }
        ctx.surface.add_vehicle(PlacedVehicle {
            vehicle,
            x,
            y,
            facing: facing.rem_euclid(360),
            fuel: self.fuel,
            status: self.status,
            cells,
        });
        true
    }
}

#[derive(Debug, Clone)]
pub struct ItemPiece {
    pub item: ItemId,
    pub amount: IntRange,
    /// One-in-N gate.
    pub chance: IntRange,
    pub repeat: IntRange,
}

impl ItemPiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let item = ItemId::from(obj.str_field("item")?);
        if !content.is_valid_item(&item) {
            missing.push(MissingRef::new(ContentKind::Item, item.as_str()));
        }
        Ok(Self {
            item,
            amount: obj.range_or("amount", IntRange::fixed(1))?,
            chance: obj.range_or("chance", IntRange::fixed(1))?,
            repeat: obj.range_or("repeat", IntRange::fixed(1))?,
        })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32) {
        if !one_in(self.chance.get(ctx.rng), ctx.rng) {
            return;
        }
        let count = self.amount.get(ctx.rng).max(1) as u32;
        ctx.surface
            .add_item(x, y, ItemStack::new(self.item.clone(), count, ctx.when));
    }
}

#[derive(Debug, Clone)]
pub struct TrapPiece {
    pub trap: TrapId,
}

impl TrapPiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let trap = TrapId::from(obj.str_field("trap")?);
        if !content.is_valid_trap(&trap) {
            missing.push(MissingRef::new(ContentKind::Trap, trap.as_str()));
        }
        Ok(Self { trap })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32) {
        ctx.surface.set_trap(x, y, self.trap.clone());
    }
}

#[derive(Debug, Clone)]
pub struct FurniturePiece {
    pub furn: FurnitureId,
}

impl FurniturePiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let furn = FurnitureId::from(obj.str_field("furn")?);
        if !content.is_valid_furniture(&furn) {
            missing.push(MissingRef::new(ContentKind::Furniture, furn.as_str()));
        }
        Ok(Self { furn })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32) {
        ctx.surface.set_furn(x, y, self.furn.clone());
    }
}

#[derive(Debug, Clone)]
pub struct TerrainPiece {
    pub ter: TerrainId,
}

impl TerrainPiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let ter = TerrainId::from(obj.str_field("ter")?);
        if !content.is_valid_terrain(&ter) {
            missing.push(MissingRef::new(ContentKind::Terrain, ter.as_str()));
        }
        Ok(Self { ter })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32) {
        ctx.surface.set_ter(x, y, self.ter.clone());
    }
}

#[derive(Debug, Clone)]
pub struct RubblePiece {
    pub rubble_type: FurnitureId,
    pub items: Option<ItemGroupId>,
    pub floor_type: Option<TerrainId>,
    pub overwrite: bool,
}

impl RubblePiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let rubble_type = FurnitureId::from(obj.opt_str("rubble_type")?.unwrap_or("f_rubble"));
        if !content.is_valid_furniture(&rubble_type) {
            missing.push(MissingRef::new(ContentKind::Furniture, rubble_type.as_str()));
        }
        let items = match obj.opt_str("items")? {
            None => None,
            Some(id) => {
                let id = ItemGroupId::from(id);
                if !content.is_valid_item_group(&id) {
                    missing.push(MissingRef::new(ContentKind::ItemGroup, id.as_str()));
                }
                Some(id)
            }
        };
        let floor_type = match obj.opt_str("floor_type")? {
            None => None,
            Some(id) => {
                let id = TerrainId::from(id);
                if !content.is_valid_terrain(&id) {
                    missing.push(MissingRef::new(ContentKind::Terrain, id.as_str()));
                }
                Some(id)
            }
        };
        Ok(Self {
            rubble_type,
            items,
            floor_type,
            overwrite: obj.bool_or("overwrite", false)?,
        })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32) {
        ctx.surface.set_furn(x, y, self.rubble_type.clone());
        if self.overwrite {
            if let Some(floor) = &self.floor_type {
                ctx.surface.set_ter(x, y, floor.clone());
            }
        }
        if let Some(group) = &self.items {
            if let Some(item) = ctx.content.pick_from_item_group(group, ctx.rng) {
                ctx.surface.add_item(x, y, ItemStack::new(item, 1, ctx.when));
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComputerPiece {
    pub name: String,
    pub security: i32,
    pub access_denied: Option<String>,
    pub options: Vec<ComputerOption>,
    pub failures: Vec<ComputerFailure>,
    pub target: bool,
}

impl ComputerPiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        if !content.is_valid_furniture(&"f_console".into()) {
            missing.push(MissingRef::new(ContentKind::Furniture, "f_console"));
        }
        let options = match obj.opt_array("options")? {
            None => Vec::new(),
            Some(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let opt = Obj::new(v, obj.child_context(&format!("options[{i}]")))?;
                    Ok(ComputerOption {
                        name: opt.str_field("name")?.to_string(),
                        action: opt.str_field("action")?.to_string(),
                        security: opt.int_or("security", 0)? as i32,
                    })
                })
                .collect::<Result<_, LoadError>>()?,
        };
        let failures = match obj.opt_array("failures")? {
            None => Vec::new(),
            Some(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| match v {
                    Value::String(action) => Ok(ComputerFailure {
                        action: action.clone(),
                    }),
                    _ => {
                        let fail = Obj::new(v, obj.child_context(&format!("failures[{i}]")))?;
                        Ok(ComputerFailure {
                            action: fail.str_field("action")?.to_string(),
                        })
                    }
                })
                .collect::<Result<_, LoadError>>()?,
        };
        Ok(Self {
            name: obj.str_field("name")?.to_string(),
            security: obj.int_or("security", 0)? as i32,
            access_denied: obj.opt_str("access_denied")?.map(str::to_string),
            options,
            failures,
            target: obj.bool_or("target", false)?,
        })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32) {
        ctx.surface.set_furn(x, y, "f_console".into());
        let mission = if self.target { ctx.mission } else { None };
        ctx.surface.set_computer(
            x,
            y,
            Computer {
                name: self.name.clone(),
                security: self.security,
                access_denied: self.access_denied.clone(),
                options: self.options.clone(),
                failures: self.failures.clone(),
            },
            mission,
        );
    }
}

#[derive(Debug, Clone)]
pub struct SealedItemPiece {
    pub furniture: FurnitureId,
    pub item: Option<ItemPiece>,
    pub items: Option<ItemGroupPiece>,
}

impl SealedItemPiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let furniture = FurnitureId::from(obj.str_field("furniture")?);
        match content.furniture(&furniture) {
            None => missing.push(MissingRef::new(ContentKind::Furniture, furniture.as_str())),
            Some(def) => {
                if !def.flags.contains("PLANT") {
                    return Err(obj.fail(format!(
                        "sealed item furniture {furniture:?} lacks the PLANT flag"
                    )));
                }
            }
        }
        let item = match obj.opt_child("item")? {
            None => None,
            Some(child) => Some(ItemPiece::parse(&child, content, missing)?),
        };
        let items = match obj.opt_child("items")? {
            None => None,
            Some(child) => Some(ItemGroupPiece::parse(&child, content, missing)?),
        };
        match (&item, &items) {
            (Some(_), Some(_)) => {
                return Err(obj.fail("specify either \"item\" or \"items\", not both"))
            }
            (None, None) => return Err(obj.fail("requires exactly one of \"item\" or \"items\"")),
            _ => {}
        }
        // A plant pot only makes sense around a seed.
        if let Some(piece) = &item {
            if let Some(def) = content.item(&piece.item) {
                if !def.flags.contains("SEED") {
                    return Err(obj.fail(format!(
                        "sealed item {:?} is not a seed",
                        piece.item
                    )));
                }
            }
        }
        Ok(Self {
            furniture,
            item,
            items,
        })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32) {
        if let Some(piece) = &self.item {
            let count = piece.amount.get(ctx.rng).max(1) as u32;
            let mut stack = ItemStack::new(piece.item.clone(), count, ctx.when);
            stack.sealed = true;
            ctx.surface.add_item(x, y, stack);
        }
        if let Some(piece) = &self.items {
            if let Some(item) = ctx.content.pick_from_item_group(&piece.group, ctx.rng) {
                let mut stack = ItemStack::new(item, 1, ctx.when);
                stack.sealed = true;
                ctx.surface.add_item(x, y, stack);
            }
        }
        ctx.surface.set_furn(x, y, self.furniture.clone());
    }
}

#[derive(Debug, Clone)]
pub struct TranslatePiece {
    pub from: TerrainId,
    pub to: TerrainId,
}

impl TranslatePiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let from = TerrainId::from(obj.str_field("from")?);
        let to = TerrainId::from(obj.str_field("to")?);
        if from == to {
            return Err(obj.fail("terrain translation maps a terrain to itself"));
        }
        for id in [&from, &to] {
            if !content.is_valid_terrain(id) {
                missing.push(MissingRef::new(ContentKind::Terrain, id.as_str()));
            }
        }
        Ok(Self { from, to })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>) {
        ctx.surface.translate_terrain(&self.from, &self.to);
    }
}

#[derive(Debug, Clone)]
pub struct ZonePiece {
    pub zone: ZoneTypeId,
    pub faction: FactionId,
    pub name: Option<String>,
}

impl ZonePiece {
    fn parse(
        obj: &Obj<'_>,
        content: &ContentCatalog,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let zone = ZoneTypeId::from(obj.str_field("type")?);
        if !content.is_valid_zone_type(&zone) {
            missing.push(MissingRef::new(ContentKind::ZoneType, zone.as_str()));
        }
        let faction = FactionId::from(obj.str_field("faction")?);
        if !content.is_valid_faction(&faction) {
            missing.push(MissingRef::new(ContentKind::Faction, faction.as_str()));
        }
        Ok(Self {
            zone,
            faction,
            name: obj.opt_str("name")?.map(str::to_string),
        })
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, area: (IntRange, IntRange)) {
        let (x1, y1, x2, y2) = clamp_rect(area, ctx.surface.size());
        ctx.surface.add_zone(ZoneMarker {
            zone: self.zone.clone(),
            faction: self.faction.clone(),
            name: self.name.clone(),
            x1,
            y1,
            x2,
            y2,
        });
    }
}

/// Which neighbor identities a nested chunk demands before it applies.
/// Absent directions always pass; every present direction must match one
/// of its patterns (substring match on the location id).
#[derive(Debug, Clone, Default)]
pub struct NeighborCheck {
    pub directions: Vec<(Direction8, Vec<String>)>,
    pub above: Vec<String>,
}

impl NeighborCheck {
    pub fn parse(obj: &Obj<'_>) -> Result<Self, LoadError> {
        let mut check = NeighborCheck::default();
        for direction in Direction8::ALL {
            if let Some(value) = obj.get(direction.key()) {
                let patterns =
                    parse_patterns(value, &obj.child_context(direction.key()))?;
                check.directions.push((direction, patterns));
            }
        }
        if let Some(value) = obj.get("above") {
            check.above = parse_patterns(value, &obj.child_context("above"))?;
        }
        Ok(check)
    }

    pub fn matches(&self, neighbors: &Neighborhood) -> bool {
        for (direction, patterns) in &self.directions {
            let id = neighbors.get(*direction);
            if !patterns.iter().any(|p| id.as_str().contains(p.as_str())) {
                return false;
            }
        }
        if !self.above.is_empty() {
            match &neighbors.above {
                Some(above) => {
                    if !self.above.iter().any(|p| above.as_str().contains(p.as_str())) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }
}

fn parse_patterns(value: &Value, context: &str) -> Result<Vec<String>, LoadError> {
    let malformed = || LoadError::Malformed {
        context: context.to_string(),
        message: "expected a pattern string or array of pattern strings".to_string(),
    };
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).ok_or_else(malformed))
            .collect(),
        _ => Err(malformed()),
    }
}

#[derive(Debug, Clone)]
pub struct NestedPiece {
    /// Weighted candidates when the neighbor check passes. `None` entries
    /// are explicit no-ops.
    pub entries: Vec<(Option<NestedChunkId>, u32)>,
    pub else_entries: Vec<(Option<NestedChunkId>, u32)>,
    pub neighbors: NeighborCheck,
}

impl NestedPiece {
    fn parse(
        obj: &Obj<'_>,
        look: &Lookup<'_>,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let entries = Self::parse_entries(obj, "chunks", look, missing)?;
        let else_entries = Self::parse_entries(obj, "else_chunks", look, missing)?;
        if entries.is_empty() && else_entries.is_empty() {
            return Err(obj.fail("requires \"chunks\" or \"else_chunks\""));
        }
        let neighbors = match obj.opt_child("neighbors")? {
            None => NeighborCheck::default(),
            Some(child) => NeighborCheck::parse(&child)?,
        };
        Ok(Self {
            entries,
            else_entries,
            neighbors,
        })
    }

    fn parse_entries(
        obj: &Obj<'_>,
        key: &str,
        look: &Lookup<'_>,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Vec<(Option<NestedChunkId>, u32)>, LoadError> {
        let Some(value) = obj.get(key) else {
            return Ok(Vec::new());
        };
        let raw = parse_weighted_ids(value, &obj.child_context(key))?;
        let mut entries = Vec::with_capacity(raw.len());
        for (id, weight) in raw {
            if id == "null" || id.is_empty() {
                entries.push((None, weight));
                continue;
            }
            let id = NestedChunkId::from(id);
            if !look.nested.contains_key(&id) {
                missing.push(MissingRef::new(ContentKind::NestedChunk, id.as_str()));
            }
            entries.push((Some(id), weight));
        }
        Ok(entries)
    }

    fn apply(&self, ctx: &mut ApplyCtx<'_>, x: i32, y: i32, cancel_on_collision: bool) -> bool {
        let entries = if self.neighbors.matches(ctx.neighbors) {
            &self.entries
        } else {
            &self.else_entries
        };
        if entries.is_empty() {
            return true;
        }
        let total: u64 = entries.iter().map(|(_, w)| u64::from(*w)).sum();
        if total == 0 {
            return true;
        }
        let mut roll = ctx.rng.gen_range(0..total);
        let mut picked: &Option<NestedChunkId> = &None;
        for (id, w) in entries {
            let w = u64::from(*w);
            if roll < w {
                picked = id;
                break;
            }
            roll -= w;
        }
        let Some(id) = picked else {
            // Explicit "null" pick: nothing to place.
            return true;
        };
        let Some(chunk) = ctx.catalog.pick_nested(id, ctx.rng) else {
            log::warn!("nested chunk {id:?} not registered, skipping");
            return true;
        };
        apply_chunk_at(&chunk, ctx, (x, y), cancel_on_collision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ids::LocationTypeId;
    use serde_json::json;
    use std::collections::HashMap;

    fn content() -> ContentCatalog {
        let mut c = ContentCatalog::new();
        c.register_terrain("t_floor", &["OPEN"]);
        c.register_furniture("f_sign", &[]);
        c.register_furniture("f_planter", &["PLANT"]);
        c.register_furniture("f_counter", &[]);
        c.register_item("seed_wheat", &["SEED"]);
        c.register_item("rock", &[]);
        c.register_monster("mon_zombie");
        c.register_monster("mon_dog");
        c
    }

    fn parse_kind(kind: &str, value: serde_json::Value) -> Result<(Piece, Vec<MissingRef>), LoadError> {
        let content = content();
        let palettes = HashMap::new();
        let nested = HashMap::new();
        let look = Lookup {
            content: &content,
            palettes: &palettes,
            nested: &nested,
        };
        let mut missing = Vec::new();
        let piece = Piece::parse_payload(kind, &value, "test", &look, &mut missing)?;
        Ok((piece, missing))
    }

    #[test]
    fn sealed_item_demands_plant_furniture() {
        let err = parse_kind(
            "sealed_item",
            json!({"furniture": "f_counter", "item": {"item": "seed_wheat"}}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("PLANT"), "{err}");
    }

    #[test]
    fn sealed_item_demands_a_seed() {
        let err = parse_kind(
            "sealed_item",
            json!({"furniture": "f_planter", "item": {"item": "rock"}}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("seed"), "{err}");
    }

    #[test]
    fn sealed_item_rejects_both_item_and_items() {
        let err = parse_kind(
            "sealed_item",
            json!({
                "furniture": "f_planter",
                "item": {"item": "seed_wheat"},
                "items": {"item": "farm_seeds"}
            }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not both"), "{err}");
    }

    #[test]
    fn monster_accepts_weighted_list_and_defers_unknowns() {
        let (piece, missing) = parse_kind(
            "monster",
            json!({"monster": [["mon_zombie", 3], "mon_bear"], "chance": 50}),
        )
        .unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, "mon_bear");
        match piece {
            Piece::Monster(m) => assert_eq!(m.ids.len(), 2),
            other => panic!("expected monster piece, got {}", other.kind_name()),
        }
    }

    #[test]
    fn alternatives_wrap_arrays() {
        let (piece, _) = parse_kind(
            "traps",
            json!(["tr_pit", "tr_pit"]),
        )
        .unwrap();
        assert!(matches!(piece, Piece::Alternatives(ref alts) if alts.len() == 2));
    }

    #[test]
    fn vehicle_rejects_empty_rotation_array() {
        let err = parse_kind(
            "vehicles",
            json!({"vehicle": "cars", "rotation": []}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("rotation"), "{err}");

        // Listed facings still parse.
        let (piece, _) = parse_kind(
            "vehicles",
            json!({"vehicle": "cars", "rotation": [0, 90, 270]}),
        )
        .unwrap();
        match piece {
            Piece::Vehicle(v) => assert_eq!(v.facings, vec![0, 90, 270]),
            other => panic!("expected vehicle piece, got {}", other.kind_name()),
        }
    }

    #[test]
    fn loot_requires_exactly_one_source() {
        assert!(parse_kind("loot", json!({"chance": 50})).is_err());
        assert!(parse_kind("loot", json!({"item": "rock", "group": "g", "chance": 50})).is_err());
        let (_, missing) = parse_kind("loot", json!({"item": "rock"})).unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn translate_rejects_identity_mapping() {
        let err = parse_kind("translate_ter", json!({"from": "t_floor", "to": "t_floor"}))
            .unwrap_err();
        assert!(err.to_string().contains("itself"), "{err}");
    }

    #[test]
    fn neighbor_check_matches_substrings_in_all_directions() {
        let doc = json!({"north": "street", "east": ["house", "road"]});
        let obj = Obj::new(&doc, "neighbors").unwrap();
        let check = NeighborCheck::parse(&obj).unwrap();

        let mut neighbors = Neighborhood::uniform("field");
        assert!(!check.matches(&neighbors));

        neighbors.north = LocationTypeId::from("street_four_way");
        neighbors.east = LocationTypeId::from("road_end");
        assert!(check.matches(&neighbors));

        neighbors.east = LocationTypeId::from("field");
        assert!(!check.matches(&neighbors));
    }

    #[test]
    fn neighbor_check_above_requires_a_vertical_neighbor() {
        let doc = json!({"above": "lab"});
        let obj = Obj::new(&doc, "neighbors").unwrap();
        let check = NeighborCheck::parse(&obj).unwrap();

        let mut neighbors = Neighborhood::uniform("lab");
        assert!(!check.matches(&neighbors), "no above neighbor present");
        neighbors.above = Some(LocationTypeId::from("lab_stairs"));
        assert!(check.matches(&neighbors));
    }

    #[test]
    fn empty_neighbor_check_always_passes() {
        let check = NeighborCheck::default();
        assert!(check.matches(&Neighborhood::default()));
    }
}
