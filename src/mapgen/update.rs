//! Update chunks
//!
//! Updates mutate an already-generated tile (mission scripting, faction
//! camp construction). The update is authored in the tile's unrotated
//! frame, so the surface is counter-rotated around the application and
//! restored afterwards. With `verify` set the whole update stages on a
//! copy and commits only if no placement collided with a vehicle.

use super::catalog::MapgenCatalog;
use super::piece::ApplyCtx;
use super::pipeline::apply_chunk_at;
use super::Neighborhood;
use crate::content::ids::{MissionId, UpdateChunkId};
use crate::content::{ContentCatalog, RegionSettings};
use crate::map::MapSurface;
use rand::rngs::StdRng;

/// Apply one update chunk to `surface`.
///
/// `rotation` is the quarter turns the tile currently sits at in the
/// world; `offset` translates the chunk inside the unrotated frame.
/// Returns whether the update applied. An unknown id is not fatal, the
/// caller's script may simply be ahead of its data.
#[allow(clippy::too_many_arguments)]
pub fn apply_update(
    catalog: &MapgenCatalog,
    content: &ContentCatalog,
    region: &RegionSettings,
    surface: &mut MapSurface,
    update_id: &UpdateChunkId,
    offset: (i32, i32),
    rotation: i32,
    mission: Option<MissionId>,
    when: u64,
    verify: bool,
    rng: &mut StdRng,
) -> bool {
    let Some(chunk) = catalog.update(update_id) else {
        log::warn!("update chunk {update_id:?} is not registered");
        return false;
    };

    let turns = rotation.rem_euclid(4) as u32;
    surface.rotate((4 - turns) % 4);

    let neighbors = Neighborhood::default();
    let applied = if verify {
        let mut staged = surface.clone();
        let mut ctx = ApplyCtx {
            surface: &mut staged,
            content,
            catalog,
            region,
            neighbors: &neighbors,
            density: 1.0,
            when,
            mission,
            rng,
        };
        if apply_chunk_at(&chunk, &mut ctx, offset, true) {
            *surface = staged;
            true
        } else {
            log::debug!("update {update_id:?} cancelled, a vehicle was in the way");
            false
        }
    } else {
        let mut ctx = ApplyCtx {
            surface,
            content,
            catalog,
            region,
            neighbors: &neighbors,
            density: 1.0,
            when,
            mission,
            rng,
        };
        apply_chunk_at(&chunk, &mut ctx, offset, false);
        true
    };

    surface.rotate(turns);
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::PlacedVehicle;
    use rand::SeedableRng;
    use serde_json::json;

    fn content() -> ContentCatalog {
        let mut c = ContentCatalog::new();
        c.register_terrain("t_floor", &["OPEN"]);
        c.register_terrain("t_wall", &[]);
        c.register_furniture("f_table", &[]);
        c.register_item("rock", &[]);
        c
    }

    fn catalog_with(doc: serde_json::Value, content: &ContentCatalog) -> MapgenCatalog {
        let mut catalog = MapgenCatalog::with_tile_size(4);
        catalog.register_document(&doc, content).unwrap();
        catalog.finalize(content).unwrap();
        catalog
    }

    fn wall_update() -> serde_json::Value {
        json!({
            "type": "mapgen",
            "update_mapgen_id": "build_wall",
            "object": {
                "set": [
                    {"square": "terrain", "id": "t_wall", "x": 0, "y": 0, "x2": 1, "y2": 1}
                ],
                "place_item": [{"item": "rock", "x": 0, "y": 0}]
            }
        })
    }

    #[test]
    fn update_mutates_the_surface_in_place() {
        let content = content();
        let catalog = catalog_with(wall_update(), &content);
        let region = RegionSettings::default();
        let mut surface = MapSurface::new(4, "t_floor".into());
        let mut rng = StdRng::seed_from_u64(0);

        let applied = apply_update(
            &catalog,
            &content,
            &region,
            &mut surface,
            &"build_wall".into(),
            (0, 0),
            0,
            None,
            10,
            false,
            &mut rng,
        );
        assert!(applied);
        assert_eq!(surface.ter(0, 0).unwrap().as_str(), "t_wall");
        assert_eq!(surface.ter(1, 1).unwrap().as_str(), "t_wall");
        assert_eq!(surface.ter(2, 2).unwrap().as_str(), "t_floor");
        assert_eq!(surface.items_at(0, 0)[0].birthday, 10);
    }

    #[test]
    fn verified_update_rolls_back_on_vehicle_collision() {
        let content = content();
        let catalog = catalog_with(wall_update(), &content);
        let region = RegionSettings::default();
        let mut surface = MapSurface::new(4, "t_floor".into());
        surface.add_vehicle(PlacedVehicle {
            vehicle: "cart".into(),
            x: 1,
            y: 1,
            facing: 0,
            fuel: -1,
            status: 0,
            cells: vec![(1, 1)],
        });
        let mut rng = StdRng::seed_from_u64(0);

        let applied = apply_update(
            &catalog,
            &content,
            &region,
            &mut surface,
            &"build_wall".into(),
            (0, 0),
            0,
            None,
            0,
            true,
            &mut rng,
        );
        assert!(!applied);
        // Nothing committed, not even the parts that did not collide.
        assert_eq!(surface.ter(0, 0).unwrap().as_str(), "t_floor");
        assert_eq!(surface.total_items(), 0);
    }

    #[test]
    fn update_respects_tile_rotation() {
        let content = content();
        let catalog = catalog_with(
            json!({
                "type": "mapgen",
                "update_mapgen_id": "corner_mark",
                "object": {
                    "set": [{"point": "terrain", "id": "t_wall", "x": 0, "y": 0}]
                }
            }),
            &content,
        );
        let region = RegionSettings::default();
        let mut surface = MapSurface::new(4, "t_floor".into());
        let mut rng = StdRng::seed_from_u64(0);

        // The tile sits one quarter turn clockwise in the world; the
        // update's (0, 0) corner must land where the unrotated corner went.
        let applied = apply_update(
            &catalog,
            &content,
            &region,
            &mut surface,
            &"corner_mark".into(),
            (0, 0),
            1,
            None,
            0,
            false,
            &mut rng,
        );
        assert!(applied);
        assert_eq!(surface.ter(3, 0).unwrap().as_str(), "t_wall");
        assert_eq!(surface.ter(0, 0).unwrap().as_str(), "t_floor");
    }

    #[test]
    fn unknown_update_id_is_reported_not_fatal() {
        let content = content();
        let catalog = MapgenCatalog::with_tile_size(4);
        let region = RegionSettings::default();
        let mut surface = MapSurface::new(4, "t_floor".into());
        let mut rng = StdRng::seed_from_u64(0);
        assert!(!apply_update(
            &catalog,
            &content,
            &region,
            &mut surface,
            &"missing".into(),
            (0, 0),
            0,
            None,
            0,
            false,
            &mut rng,
        ));
    }
}
