//! Mapforge - declarative, data-driven procedural map generation
//!
//! JSON documents describe what a map tile looks like: character grids
//! interpreted through composable palettes, terse setmap edits, weighted
//! variants per location type, nested sub-chunks and post-generation
//! updates. The engine validates every content reference at load time and
//! turns a location id plus a seed into a finished tile.

pub mod content;
pub mod data;
pub mod error;
pub mod map;
pub mod mapgen;

// Re-export the types a host touches for every tile
pub use content::{ContentCatalog, RegionSettings};
pub use data::{load_dir, LoadStats};
pub use error::{FinalizeError, LoadError, LoadFailure};
pub use map::MapSurface;
pub use mapgen::{apply_update, generate, MapgenCatalog, TileContext};
