//! Chunk definitions
//!
//! One mapgen document becomes one `ChunkDefinition`: an optional
//! character grid with its composed palette, a list of setmap operations
//! and a list of placed pieces. Three flavors share the format: top-level
//! chunks bound to location types, nested chunks stamped inside other
//! chunks, and update chunks applied to already-generated tiles.

use super::doc::Obj;
use super::palette::Palette;
use super::piece::Piece;
use super::range::{IntRange, PlacementDescriptor};
use super::setmap::SetmapOperation;
use super::Lookup;
use crate::content::ids::{
    ContentKind, LocationTypeId, NestedChunkId, TerrainId, UpdateChunkId,
};
use crate::error::{LoadError, LoadFailure, MissingRef};
use serde_json::Value;

/// Document weight when none is given.
pub const DEFAULT_WEIGHT: i64 = 1000;

/// Which flavor of document this chunk came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkKind {
    /// Bound to one or more location type ids (aliases share the chunk).
    Location { ids: Vec<LocationTypeId> },
    Nested { id: NestedChunkId },
    Update { id: UpdateChunkId },
}

/// The character grid of a chunk plus the palette that interprets it.
#[derive(Debug, Clone)]
pub struct GridFormat {
    pub rows: Vec<Vec<char>>,
    pub palette: Palette,
}

#[derive(Debug, Clone)]
pub struct ChunkDefinition {
    pub kind: ChunkKind,
    /// Selection weight among chunks bound to the same location type.
    pub weight: i64,
    /// Grid extent. The canonical tile dimension for top-level and update
    /// chunks, the declared `mapgensize` for nested ones.
    pub size: i32,
    pub fill_ter: Option<TerrainId>,
    /// Location type generated underneath before this chunk applies.
    pub predecessor: Option<LocationTypeId>,
    /// Quarter turns applied to the finished tile, rolled per generation.
    pub rotation: IntRange,
    pub grid: Option<GridFormat>,
    pub setmaps: Vec<SetmapOperation>,
    pub objects: Vec<(PlacementDescriptor, Piece)>,
}

impl ChunkDefinition {
    /// Parse one `"type": "mapgen"` document. `canonical` is the tile
    /// dimension top-level and update chunks must fill.
    ///
    /// Unknown content references defer the document instead of failing
    /// it; structural problems are fatal.
    pub fn parse(
        doc: &Value,
        canonical: i32,
        look: &Lookup<'_>,
    ) -> Result<ChunkDefinition, LoadFailure> {
        let mut missing = Vec::new();
        let chunk = Self::parse_inner(doc, canonical, look, &mut missing)?;
        if !missing.is_empty() {
            missing.dedup();
            return Err(LoadFailure::Deferred(missing));
        }
        // Grid characters are only checkable once every palette include
        // resolved, so this runs after the defer gate.
        chunk.check_grid_coverage()?;
        Ok(chunk)
    }

    fn parse_inner(
        doc: &Value,
        canonical: i32,
        look: &Lookup<'_>,
        missing: &mut Vec<MissingRef>,
    ) -> Result<ChunkDefinition, LoadError> {
        let head = Obj::new(doc, "mapgen")?;
        let kind = Self::parse_kind(&head)?;
        let context = format!("mapgen {}", kind_label(&kind));
        let head = Obj::new(doc, context)?;

        let weight = head.int_or("weight", DEFAULT_WEIGHT)?;
        let obj = head.child("object")?;

        let size = match &kind {
            ChunkKind::Location { .. } => {
                if obj.has("mapgensize") {
                    return Err(LoadError::ContradictoryField {
                        context: obj.context().to_string(),
                        field: "mapgensize".to_string(),
                        message: "top-level chunks always span the whole tile".to_string(),
                    });
                }
                canonical
            }
            ChunkKind::Nested { .. } => Self::parse_mapgensize(&obj)?,
            ChunkKind::Update { .. } => {
                if obj.has("mapgensize") {
                    Self::parse_mapgensize(&obj)?
                } else {
                    canonical
                }
            }
        };

        let predecessor = match obj.opt_str("predecessor_mapgen")? {
            None => None,
            Some(id) => {
                if !matches!(kind, ChunkKind::Location { .. }) {
                    return Err(LoadError::ContradictoryField {
                        context: obj.context().to_string(),
                        field: "predecessor_mapgen".to_string(),
                        message: "only top-level chunks generate a predecessor".to_string(),
                    });
                }
                Some(LocationTypeId::from(id))
            }
        };

        let fill_ter = match obj.opt_str("fill_ter")? {
            None => None,
            Some(id) => {
                let id = TerrainId::from(id);
                if !look.content.is_valid_terrain(&id) {
                    missing.push(MissingRef::new(ContentKind::Terrain, id.as_str()));
                }
                Some(id)
            }
        };

        let rotation = obj.range_or("rotation", IntRange::fixed(0))?;

        let palette = Palette::parse(&obj, look, missing)?;
        let grid = match obj.opt_array("rows")? {
            None => {
                if !palette.is_empty() {
                    // Keep the palette around for nested chunks that only
                    // carry placings.
                    Some(GridFormat {
                        rows: Vec::new(),
                        palette,
                    })
                } else {
                    None
                }
            }
            Some(raw_rows) => Some(GridFormat {
                rows: Self::parse_rows(&obj, raw_rows, size)?,
                palette,
            }),
        };

        let mut setmaps = Vec::new();
        if let Some(entries) = obj.opt_array("set")? {
            for (i, entry) in entries.iter().enumerate() {
                let entry_obj = Obj::new(entry, obj.child_context(&format!("set[{i}]")))?;
                setmaps.push(SetmapOperation::parse(&entry_obj, look.content, size, missing)?);
            }
        }

        let mut objects = Vec::new();
        // Grid placings become fixed-coordinate objects so they run in the
        // same pass (and order) as explicit place lists.
        if let Some(grid) = &grid {
            for (y, row) in grid.rows.iter().enumerate() {
                for (x, &ch) in row.iter().enumerate() {
                    for piece in grid.palette.placings_for(ch) {
                        objects.push((PlacementDescriptor::at(x as i32, y as i32), piece.clone()));
                    }
                }
            }
        }
        for key in obj.keys() {
            let Some(kind_key) = place_kind(key) else {
                continue;
            };
            let Some(Value::Array(entries)) = obj.get(key) else {
                return Err(obj.fail(format!("field {key:?} must be an array")));
            };
            for (i, entry) in entries.iter().enumerate() {
                let ctx = obj.child_context(&format!("{key}[{i}]"));
                let entry_obj = Obj::new(entry, ctx.clone())?;
                let coords_optional = kind_key == "translate_ter";
                let x = match entry_obj.opt_range("x")? {
                    Some(r) => r,
                    None if coords_optional => IntRange::fixed(0),
                    None => return Err(entry_obj.fail("missing required field \"x\"")),
                };
                let y = match entry_obj.opt_range("y")? {
                    Some(r) => r,
                    None if coords_optional => IntRange::fixed(0),
                    None => return Err(entry_obj.fail("missing required field \"y\"")),
                };
                let desc = PlacementDescriptor {
                    x,
                    y,
                    repeat: entry_obj.range_or("repeat", IntRange::fixed(1))?,
                };
                desc.check_bounds(size, &ctx)?;
                let piece = Piece::parse_payload(kind_key, entry, &ctx, look, missing)?;
                objects.push((desc, piece));
            }
        }

        Ok(ChunkDefinition {
            kind,
            weight,
            size,
            fill_ter,
            predecessor,
            rotation,
            grid,
            setmaps,
            objects,
        })
    }

    fn parse_kind(head: &Obj<'_>) -> Result<ChunkKind, LoadError> {
        let flavors = ["om_terrain", "nested_mapgen_id", "update_mapgen_id"];
        let present: Vec<&str> = flavors.iter().copied().filter(|k| head.has(k)).collect();
        match present.as_slice() {
            ["om_terrain"] => {
                let ids = match head.get("om_terrain").unwrap() {
                    Value::String(s) => vec![LocationTypeId::from(s.as_str())],
                    Value::Array(items) => items
                        .iter()
                        .map(|v| {
                            v.as_str().map(LocationTypeId::from).ok_or_else(|| {
                                head.fail("om_terrain entries must be id strings")
                            })
                        })
                        .collect::<Result<_, _>>()?,
                    _ => return Err(head.fail("om_terrain must be an id or id array")),
                };
                if ids.is_empty() {
                    return Err(head.fail("om_terrain array is empty"));
                }
                Ok(ChunkKind::Location { ids })
            }
            ["nested_mapgen_id"] => Ok(ChunkKind::Nested {
                id: NestedChunkId::from(head.str_field("nested_mapgen_id")?),
            }),
            ["update_mapgen_id"] => Ok(ChunkKind::Update {
                id: UpdateChunkId::from(head.str_field("update_mapgen_id")?),
            }),
            [] => Err(head.fail(
                "expected one of om_terrain, nested_mapgen_id, update_mapgen_id",
            )),
            _ => Err(head.fail("more than one of om_terrain/nested_mapgen_id/update_mapgen_id")),
        }
    }

    fn parse_mapgensize(obj: &Obj<'_>) -> Result<i32, LoadError> {
        let value = obj
            .get("mapgensize")
            .ok_or_else(|| obj.fail("missing required field \"mapgensize\""))?;
        let dims: Vec<i64> = match value {
            Value::Array(items) => items
                .iter()
                .map(|v| {
                    v.as_i64()
                        .ok_or_else(|| obj.fail("mapgensize entries must be integers"))
                })
                .collect::<Result<_, _>>()?,
            Value::Number(n) => {
                let v = n
                    .as_i64()
                    .ok_or_else(|| obj.fail("mapgensize must be an integer"))?;
                vec![v, v]
            }
            _ => return Err(obj.fail("mapgensize must be an integer or [w, h]")),
        };
        let (width, height) = match dims.as_slice() {
            [v] => (*v, *v),
            [w, h] => (*w, *h),
            _ => return Err(obj.fail("mapgensize must be [w, h]")),
        };
        if width != height {
            return Err(LoadError::NonSquareNested {
                context: obj.context().to_string(),
                width,
                height,
            });
        }
        if width <= 0 {
            return Err(LoadError::BadSize {
                context: obj.context().to_string(),
                size: width,
            });
        }
        Ok(width as i32)
    }

    fn parse_rows(obj: &Obj<'_>, raw: &[Value], size: i32) -> Result<Vec<Vec<char>>, LoadError> {
        let context = obj.child_context("rows");
        let want = size as usize;
        if raw.len() < want {
            return Err(LoadError::BadRowCount {
                context,
                got: raw.len(),
                want,
            });
        }
        let mut rows = Vec::with_capacity(want);
        for (i, value) in raw.iter().take(want).enumerate() {
            let Some(s) = value.as_str() else {
                return Err(LoadError::Malformed {
                    context: context.clone(),
                    message: format!("row {i} is not a string"),
                });
            };
            let chars: Vec<char> = s.chars().collect();
            if chars.len() < want {
                return Err(LoadError::BadRowWidth {
                    context: context.clone(),
                    row: i,
                    got: chars.len(),
                    want,
                });
            }
            rows.push(chars.into_iter().take(want).collect());
        }
        Ok(rows)
    }

    /// Every grid character needs terrain: a palette mapping or `fill_ter`.
    fn check_grid_coverage(&self) -> Result<(), LoadError> {
        let Some(grid) = &self.grid else {
            return Ok(());
        };
        if self.fill_ter.is_some() {
            return Ok(());
        }
        for row in &grid.rows {
            for &ch in row {
                if grid.palette.terrain_for(ch).is_none() {
                    return Err(LoadError::UnmappedCharacter {
                        context: format!("mapgen {}", kind_label(&self.kind)),
                        ch,
                    });
                }
            }
        }
        Ok(())
    }
}

fn kind_label(kind: &ChunkKind) -> String {
    match kind {
        ChunkKind::Location { ids } => ids[0].as_str().to_string(),
        ChunkKind::Nested { id } => id.as_str().to_string(),
        ChunkKind::Update { id } => id.as_str().to_string(),
    }
}

/// Map a document key to the canonical piece kind it carries, if it is a
/// place list at all.
fn place_kind(key: &str) -> Option<&'static str> {
    Some(match key {
        "place_fields" => "fields",
        "place_npcs" => "npcs",
        "faction_owner" => "faction_owner",
        "place_signs" => "signs",
        "place_graffiti" => "graffiti",
        "place_vendingmachines" => "vendingmachines",
        "place_toilets" => "toilets",
        "place_gaspumps" => "gaspumps",
        "place_liquids" => "liquids",
        "place_items" => "items",
        "place_loot" => "loot",
        "place_monsters" => "monsters",
        "place_monster" => "monster",
        "place_vehicles" => "vehicles",
        "place_item" => "item",
        "place_traps" => "traps",
        "place_furniture" => "furniture",
        "place_terrain" => "terrain",
        "place_rubble" => "rubble",
        "place_computers" => "computers",
        "place_sealed_items" => "sealed_item",
        "translate_ter" => "translate_ter",
        "place_zones" => "zones",
        "place_nested" => "nested",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ids::PaletteId;
    use crate::content::ContentCatalog;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn content() -> ContentCatalog {
        let mut c = ContentCatalog::new();
        c.register_terrain("t_floor", &["OPEN"]);
        c.register_terrain("t_wall", &[]);
        c.register_terrain("t_grass", &["OPEN"]);
        c.register_furniture("f_table", &[]);
        c.register_trap("tr_pit");
        c.register_item("rock", &[]);
        c
    }

    fn parse(doc: serde_json::Value, canonical: i32) -> Result<ChunkDefinition, LoadFailure> {
        let content = content();
        let palettes: HashMap<PaletteId, Palette> = HashMap::new();
        let nested: HashMap<NestedChunkId, Vec<Arc<ChunkDefinition>>> = HashMap::new();
        let look = Lookup {
            content: &content,
            palettes: &palettes,
            nested: &nested,
        };
        ChunkDefinition::parse(&doc, canonical, &look)
    }

    #[test]
    fn grid_chunk_parses_with_inline_palette() {
        let chunk = parse(
            json!({
                "type": "mapgen",
                "om_terrain": "shed",
                "object": {
                    "fill_ter": "t_grass",
                    "rows": ["####", "#..#", "#..#", "####"],
                    "terrain": {"#": "t_wall", ".": "t_floor"},
                    "traps": {".": "tr_pit"}
                }
            }),
            4,
        )
        .unwrap();
        assert_eq!(chunk.size, 4);
        assert!(matches!(chunk.kind, ChunkKind::Location { ref ids } if ids.len() == 1));
        assert_eq!(chunk.weight, DEFAULT_WEIGHT);
        // Four interior floor cells each carry the trap placing.
        assert_eq!(chunk.objects.len(), 4);
    }

    #[test]
    fn short_rows_fail() {
        let err = parse(
            json!({
                "type": "mapgen",
                "om_terrain": "shed",
                "object": {
                    "rows": ["####", "#.#", "#..#", "####"],
                    "terrain": {"#": "t_wall", ".": "t_floor"}
                }
            }),
            4,
        )
        .unwrap_err();
        assert!(
            matches!(err, LoadFailure::Invalid(LoadError::BadRowWidth { row: 1, got: 3, .. })),
            "{err}"
        );
    }

    #[test]
    fn missing_rows_fail() {
        let err = parse(
            json!({
                "type": "mapgen",
                "om_terrain": "shed",
                "object": {
                    "rows": ["####", "####"],
                    "terrain": {"#": "t_wall"}
                }
            }),
            4,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LoadFailure::Invalid(LoadError::BadRowCount { got: 2, want: 4, .. })
        ));
    }

    #[test]
    fn unmapped_character_without_fill_fails() {
        let err = parse(
            json!({
                "type": "mapgen",
                "om_terrain": "shed",
                "object": {
                    "rows": ["##", "#?"],
                    "terrain": {"#": "t_wall"}
                }
            }),
            2,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LoadFailure::Invalid(LoadError::UnmappedCharacter { ch: '?', .. })
        ));
    }

    #[test]
    fn fill_ter_covers_unmapped_characters() {
        let chunk = parse(
            json!({
                "type": "mapgen",
                "om_terrain": "shed",
                "object": {
                    "fill_ter": "t_grass",
                    "rows": ["##", "#?"],
                    "terrain": {"#": "t_wall"}
                }
            }),
            2,
        )
        .unwrap();
        assert_eq!(chunk.fill_ter.as_ref().unwrap().as_str(), "t_grass");
    }

    #[test]
    fn top_level_mapgensize_is_contradictory() {
        let err = parse(
            json!({
                "type": "mapgen",
                "om_terrain": "shed",
                "object": {"fill_ter": "t_grass", "mapgensize": [4, 4]}
            }),
            24,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LoadFailure::Invalid(LoadError::ContradictoryField { .. })
        ));
    }

    #[test]
    fn nested_chunk_requires_square_mapgensize() {
        let err = parse(
            json!({
                "type": "mapgen",
                "nested_mapgen_id": "corner",
                "object": {"fill_ter": "t_grass", "mapgensize": [4, 6]}
            }),
            24,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LoadFailure::Invalid(LoadError::NonSquareNested { width: 4, height: 6, .. })
        ));

        let err = parse(
            json!({
                "type": "mapgen",
                "nested_mapgen_id": "corner",
                "object": {"fill_ter": "t_grass"}
            }),
            24,
        )
        .unwrap_err();
        assert!(matches!(err, LoadFailure::Invalid(LoadError::Malformed { .. })));
    }

    #[test]
    fn unknown_terrain_defers_the_document() {
        let err = parse(
            json!({
                "type": "mapgen",
                "om_terrain": "shed",
                "object": {"fill_ter": "t_lava"}
            }),
            24,
        )
        .unwrap_err();
        match err {
            LoadFailure::Deferred(missing) => {
                assert_eq!(missing.len(), 1);
                assert_eq!(missing[0].id, "t_lava");
            }
            other => panic!("expected deferral, got {other}"),
        }
    }

    #[test]
    fn place_list_bounds_are_validated() {
        let err = parse(
            json!({
                "type": "mapgen",
                "om_terrain": "shed",
                "object": {
                    "fill_ter": "t_grass",
                    "place_item": [{"item": "rock", "x": 30, "y": 1}]
                }
            }),
            24,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LoadFailure::Invalid(LoadError::OutOfBounds { axis: 'x', .. })
        ));
    }

    #[test]
    fn alias_list_registers_every_id() {
        let chunk = parse(
            json!({
                "type": "mapgen",
                "om_terrain": ["house_a", "house_b"],
                "weight": 250,
                "object": {"fill_ter": "t_grass"}
            }),
            24,
        )
        .unwrap();
        assert_eq!(chunk.weight, 250);
        match chunk.kind {
            ChunkKind::Location { ids } => {
                assert_eq!(ids.len(), 2);
                assert_eq!(ids[1].as_str(), "house_b");
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }
}
