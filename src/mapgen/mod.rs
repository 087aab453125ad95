//! The declarative map-generation engine
//!
//! Documents are parsed into typed placement rules (`Piece`,
//! `SetmapOperation`) aggregated into `ChunkDefinition`s, registered in a
//! `MapgenCatalog`, and executed by the pipeline against a `MapSurface`.

pub mod catalog;
pub mod chunk;
pub mod doc;
pub mod palette;
pub mod piece;
pub mod pipeline;
pub mod range;
pub mod setmap;
pub mod update;

pub use catalog::{BuiltinFn, MapgenCatalog, RegisterOutcome, Selection};
pub use chunk::{ChunkDefinition, ChunkKind, GridFormat};
pub use palette::Palette;
pub use piece::Piece;
pub use pipeline::{generate, rotation_from_suffix, TileContext};
pub use range::{IntRange, PlacementDescriptor};
pub use setmap::SetmapOperation;
pub use update::apply_update;

use crate::content::ids::{LocationTypeId, NestedChunkId, PaletteId};
use crate::content::ContentCatalog;
use std::collections::HashMap;
use std::sync::Arc;

/// The eight compass directions used by nested-chunk neighbor predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction8 {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Direction8 {
    pub const ALL: [Direction8; 8] = [
        Direction8::North,
        Direction8::South,
        Direction8::East,
        Direction8::West,
        Direction8::NorthEast,
        Direction8::NorthWest,
        Direction8::SouthEast,
        Direction8::SouthWest,
    ];

    /// The document key for this direction.
    pub fn key(self) -> &'static str {
        match self {
            Direction8::North => "north",
            Direction8::South => "south",
            Direction8::East => "east",
            Direction8::West => "west",
            Direction8::NorthEast => "north_east",
            Direction8::NorthWest => "north_west",
            Direction8::SouthEast => "south_east",
            Direction8::SouthWest => "south_west",
        }
    }
}

/// The identities of a tile's surroundings: its eight planar neighbors and
/// the tiles directly above and below.
#[derive(Debug, Clone, Default)]
pub struct Neighborhood {
    pub north: LocationTypeId,
    pub south: LocationTypeId,
    pub east: LocationTypeId,
    pub west: LocationTypeId,
    pub north_east: LocationTypeId,
    pub north_west: LocationTypeId,
    pub south_east: LocationTypeId,
    pub south_west: LocationTypeId,
    pub above: Option<LocationTypeId>,
    pub below: Option<LocationTypeId>,
}

impl Neighborhood {
    /// All eight planar neighbors set to the same id, nothing above or
    /// below. Convenient for open terrain and tests.
    pub fn uniform(id: impl Into<LocationTypeId>) -> Self {
        let id = id.into();
        Self {
            north: id.clone(),
            south: id.clone(),
            east: id.clone(),
            west: id.clone(),
            north_east: id.clone(),
            north_west: id.clone(),
            south_east: id.clone(),
            south_west: id,
            above: None,
            below: None,
        }
    }

    pub fn get(&self, direction: Direction8) -> &LocationTypeId {
        match direction {
            Direction8::North => &self.north,
            Direction8::South => &self.south,
            Direction8::East => &self.east,
            Direction8::West => &self.west,
            Direction8::NorthEast => &self.north_east,
            Direction8::NorthWest => &self.north_west,
            Direction8::SouthEast => &self.south_east,
            Direction8::SouthWest => &self.south_west,
        }
    }
}

/// Everything a document parser can resolve references against: the
/// named-content registries plus the palettes and nested chunks loaded so
/// far. References missing here defer the document, they do not fail it.
pub struct Lookup<'a> {
    pub content: &'a ContentCatalog,
    pub palettes: &'a HashMap<PaletteId, Palette>,
    pub nested: &'a HashMap<NestedChunkId, Vec<Arc<ChunkDefinition>>>,
}
