//! Regional generation settings
//!
//! The handful of terrain ids the pipeline falls back to when a chunk does
//! not provide them itself: the neutral floor used on a selection miss and
//! the stairs placed by the connectivity fallback.

use super::ids::TerrainId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSettings {
    /// Neutral floor used when no generator exists for a location key.
    pub default_floor: TerrainId,
    /// Outdoor ground used by predecessor-less open tiles.
    pub default_groundcover: TerrainId,
    pub stairs_down: TerrainId,
    pub stairs_up: TerrainId,
}

impl Default for RegionSettings {
    fn default() -> Self {
        Self {
            default_floor: "t_floor".into(),
            default_groundcover: "t_dirt".into(),
            stairs_down: "t_stairs_down".into(),
            stairs_up: "t_stairs_up".into(),
        }
    }
}
