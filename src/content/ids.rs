//! Typed string ids for named content
//!
//! Every kind of content the engine can reference gets its own newtype, so
//! a furniture id can never be handed to a terrain lookup.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! content_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

content_id!(/// A terrain type.
    TerrainId);
content_id!(/// A furniture type.
    FurnitureId);
content_id!(/// A trap type.
    TrapId);
content_id!(/// A field type (gas, fire, blood...).
    FieldId);
content_id!(/// A concrete item type.
    ItemId);
content_id!(/// A weighted item spawn group.
    ItemGroupId);
content_id!(/// A concrete monster type.
    MonsterId);
content_id!(/// A weighted monster spawn group.
    MonsterGroupId);
content_id!(/// A concrete vehicle type.
    VehicleTypeId);
content_id!(/// A weighted vehicle spawn group.
    VehicleGroupId);
content_id!(/// An NPC class.
    NpcClassId);
content_id!(/// A faction.
    FactionId);
content_id!(/// A zone type.
    ZoneTypeId);
content_id!(/// A text snippet usable on signs and graffiti.
    SnippetId);
content_id!(/// The discrete id identifying a kind of world tile.
    LocationTypeId);
content_id!(/// A nested sub-chunk definition.
    NestedChunkId);
content_id!(/// An update-chunk definition applied onto persisted tiles.
    UpdateChunkId);
content_id!(/// A reusable character-to-content palette.
    PaletteId);

/// Opaque handle marking placed entities as a mission's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MissionId(pub u64);

/// The kind of a named-content reference, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Terrain,
    Furniture,
    Trap,
    Field,
    Item,
    ItemGroup,
    Monster,
    MonsterGroup,
    VehicleGroup,
    NpcClass,
    Faction,
    ZoneType,
    Snippet,
    Palette,
    NestedChunk,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentKind::Terrain => "terrain",
            ContentKind::Furniture => "furniture",
            ContentKind::Trap => "trap",
            ContentKind::Field => "field",
            ContentKind::Item => "item",
            ContentKind::ItemGroup => "item group",
            ContentKind::MonsterGroup => "monster group",
            ContentKind::Monster => "monster",
            ContentKind::VehicleGroup => "vehicle group",
            ContentKind::NpcClass => "npc class",
            ContentKind::Faction => "faction",
            ContentKind::ZoneType => "zone type",
            ContentKind::Snippet => "snippet",
            ContentKind::Palette => "palette",
            ContentKind::NestedChunk => "nested chunk",
        };
        f.write_str(name)
    }
}
