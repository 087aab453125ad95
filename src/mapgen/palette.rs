//! Character palettes
//!
//! A palette maps single grid characters to terrain, furniture and
//! arbitrary placement pieces. Palettes compose: a palette (or a chunk's
//! inline maps) can include other palettes by id, included entries first,
//! local entries overriding them per character and per kind.

use super::doc::Obj;
use super::piece::Piece;
use super::Lookup;
use crate::content::ids::{ContentKind, PaletteId};
use crate::error::{LoadError, MissingRef};
use serde_json::Value;
use std::collections::HashMap;

/// The piece-map keys a palette (or inline chunk maps) may carry, besides
/// `terrain` and `furniture`.
pub const PIECE_MAP_KEYS: &[&str] = &[
    "fields",
    "npcs",
    "signs",
    "graffiti",
    "vendingmachines",
    "toilets",
    "gaspumps",
    "liquids",
    "items",
    "loot",
    "monsters",
    "monster",
    "vehicles",
    "item",
    "traps",
    "rubble",
    "computers",
    "sealed_item",
    "zones",
    "nested",
];

#[derive(Debug, Clone, Default)]
pub struct Palette {
    terrain: HashMap<char, Piece>,
    furniture: HashMap<char, Piece>,
    /// Per character, the non-terrain pieces keyed by the map they came
    /// from. Merging overwrites per `(character, kind)` pair.
    placings: HashMap<char, Vec<(String, Piece)>>,
}

impl Palette {
    /// Parse the palette maps out of a document object. `obj` may be a
    /// standalone palette document or a chunk's inline maps; both carry
    /// the same keys. Included palettes must already be registered or the
    /// reference is recorded in `missing`.
    pub fn parse(
        obj: &Obj<'_>,
        look: &Lookup<'_>,
        missing: &mut Vec<MissingRef>,
    ) -> Result<Self, LoadError> {
        let mut palette = Palette::default();

        if let Some(includes) = obj.opt_array("palettes")? {
            for value in includes {
                let Some(id) = value.as_str() else {
                    return Err(obj.fail("palette includes must be id strings"));
                };
                match look.palettes.get(&PaletteId::from(id)) {
                    Some(included) => palette.merge_from(included),
                    None => missing.push(MissingRef::new(ContentKind::Palette, id)),
                }
            }
        }

        if let Some(map) = obj.get("terrain") {
            for (ch, piece) in parse_char_map(map, "terrain", obj, look, missing)? {
                palette.terrain.insert(ch, piece);
            }
        }
        if let Some(map) = obj.get("furniture") {
            for (ch, piece) in parse_char_map(map, "furniture", obj, look, missing)? {
                palette.furniture.insert(ch, piece);
            }
        }
        for &kind in PIECE_MAP_KEYS {
            // terrain/furniture handled above; the rest land in placings.
            let Some(map) = obj.get(kind) else {
                continue;
            };
            // Keys like "items" double as both a piece map (object) and a
            // top-level place list (array); only objects are char maps.
            if !map.is_object() {
                continue;
            }
            for (ch, piece) in parse_char_map(map, kind, obj, look, missing)? {
                palette.set_placing(ch, kind, piece);
            }
        }
        Ok(palette)
    }

    /// Overlay `other` on top of this palette: `other` wins per character
    /// (terrain, furniture) and per character-kind pair (placings).
    pub fn merge_from(&mut self, other: &Palette) {
        for (&ch, piece) in &other.terrain {
            self.terrain.insert(ch, piece.clone());
        }
        for (&ch, piece) in &other.furniture {
            self.furniture.insert(ch, piece.clone());
        }
        for (&ch, entries) in &other.placings {
            for (kind, piece) in entries {
                self.set_placing(ch, kind, piece.clone());
            }
        }
    }

    fn set_placing(&mut self, ch: char, kind: &str, piece: Piece) {
        let entries = self.placings.entry(ch).or_default();
        entries.retain(|(k, _)| k != kind);
        entries.push((kind.to_string(), piece));
    }

    pub fn terrain_for(&self, ch: char) -> Option<&Piece> {
        self.terrain.get(&ch)
    }

    pub fn furniture_for(&self, ch: char) -> Option<&Piece> {
        self.furniture.get(&ch)
    }

    pub fn placings_for(&self, ch: char) -> impl Iterator<Item = &Piece> {
        self.placings
            .get(&ch)
            .into_iter()
            .flat_map(|entries| entries.iter().map(|(_, p)| p))
    }

    /// Has this character any meaning at all in the palette?
    pub fn knows(&self, ch: char) -> bool {
        self.terrain.contains_key(&ch)
            || self.furniture.contains_key(&ch)
            || self.placings.contains_key(&ch)
    }

    pub fn is_empty(&self) -> bool {
        self.terrain.is_empty() && self.furniture.is_empty() && self.placings.is_empty()
    }
}

fn parse_char_map(
    map: &Value,
    kind: &str,
    parent: &Obj<'_>,
    look: &Lookup<'_>,
    missing: &mut Vec<MissingRef>,
) -> Result<Vec<(char, Piece)>, LoadError> {
    let context = parent.child_context(kind);
    let obj = Obj::new(map, context.clone())?;
    let mut out = Vec::new();
    for key in obj.keys() {
        let mut chars = key.chars();
        let (Some(ch), None) = (chars.next(), chars.next()) else {
            return Err(LoadError::BadPaletteKey {
                context: context.clone(),
                key: key.to_string(),
            });
        };
        let value = obj.get(key).unwrap();
        let piece_context = format!("{context} > {key:?}");
        let piece = Piece::parse_payload(kind, value, &piece_context, look, missing)?;
        out.push((ch, piece));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ids::NestedChunkId;
    use crate::content::ContentCatalog;
    use crate::mapgen::chunk::ChunkDefinition;
    use serde_json::json;
    use std::sync::Arc;

    fn content() -> ContentCatalog {
        let mut c = ContentCatalog::new();
        c.register_terrain("t_floor", &["OPEN"]);
        c.register_terrain("t_wall", &[]);
        c.register_terrain("t_grass", &["OPEN"]);
        c.register_furniture("f_table", &[]);
        c.register_furniture("f_chair", &[]);
        c.register_trap("tr_pit");
        c
    }

    fn parse(
        value: serde_json::Value,
        palettes: &HashMap<PaletteId, Palette>,
    ) -> Result<(Palette, Vec<MissingRef>), LoadError> {
        let content = content();
        let nested: HashMap<NestedChunkId, Vec<Arc<ChunkDefinition>>> = HashMap::new();
        let look = Lookup {
            content: &content,
            palettes,
            nested: &nested,
        };
        let mut missing = Vec::new();
        let obj = Obj::new(&value, "palette test").unwrap();
        let palette = Palette::parse(&obj, &look, &mut missing)?;
        Ok((palette, missing))
    }

    #[test]
    fn string_shorthand_maps_terrain_and_furniture() {
        let (palette, missing) = parse(
            json!({
                "terrain": {".": "t_floor", "#": "t_wall"},
                "furniture": {"c": "f_chair"}
            }),
            &HashMap::new(),
        )
        .unwrap();
        assert!(missing.is_empty());
        assert!(palette.terrain_for('.').is_some());
        assert!(palette.terrain_for('#').is_some());
        assert!(palette.furniture_for('c').is_some());
        assert!(palette.terrain_for('x').is_none());
        assert!(palette.knows('c'));
    }

    #[test]
    fn multi_character_keys_are_rejected() {
        let err = parse(json!({"terrain": {"ab": "t_floor"}}), &HashMap::new()).unwrap_err();
        assert!(matches!(err, LoadError::BadPaletteKey { ref key, .. } if key == "ab"));
    }

    #[test]
    fn includes_compose_with_local_override() {
        let (base, _) = parse(
            json!({
                "terrain": {".": "t_grass", "#": "t_wall"},
                "traps": {"^": "tr_pit"}
            }),
            &HashMap::new(),
        )
        .unwrap();
        let mut registered = HashMap::new();
        registered.insert(PaletteId::from("base"), base);

        let (palette, missing) = parse(
            json!({
                "palettes": ["base"],
                "terrain": {".": "t_floor"}
            }),
            &registered,
        )
        .unwrap();
        assert!(missing.is_empty());
        // Local "." wins, inherited "#" and "^" survive.
        match palette.terrain_for('.').unwrap() {
            Piece::Terrain(t) => assert_eq!(t.ter.as_str(), "t_floor"),
            other => panic!("unexpected piece {other:?}"),
        }
        assert!(palette.terrain_for('#').is_some());
        assert_eq!(palette.placings_for('^').count(), 1);
    }

    #[test]
    fn unknown_include_defers() {
        let (palette, missing) =
            parse(json!({"palettes": ["missing_palette"]}), &HashMap::new()).unwrap();
        assert!(palette.is_empty());
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].kind, ContentKind::Palette);
    }

    #[test]
    fn placings_overwrite_per_kind_but_stack_across_kinds() {
        let (base, _) = parse(
            json!({
                "traps": {"x": "tr_pit"},
                "items": {"x": "tools"}
            }),
            &HashMap::new(),
        )
        .unwrap();
        let mut registered = HashMap::new();
        registered.insert(PaletteId::from("base"), base);

        // Overriding the trap map must not drop the inherited item map.
        let (palette, _) = parse(
            json!({
                "palettes": ["base"],
                "traps": {"x": "tr_pit"}
            }),
            &registered,
        )
        .unwrap();
        assert_eq!(palette.placings_for('x').count(), 2);
    }
}
