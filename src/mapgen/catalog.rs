//! The mapgen catalog
//!
//! Owns everything loaded from documents: weighted chunk variants per
//! location type, nested chunks, update chunks, palettes and the builtin
//! generator functions the host registers. Documents referencing content
//! that has not loaded yet are queued and retried in `finalize`, which
//! runs the pending set to a fixpoint before building selection indices.

use super::chunk::{ChunkDefinition, ChunkKind, DEFAULT_WEIGHT};
use super::palette::Palette;
use super::Lookup;
use crate::content::ids::{
    LocationTypeId, NestedChunkId, PaletteId, UpdateChunkId,
};
use crate::content::{ContentCatalog, RegionSettings};
use crate::error::{FinalizeError, LoadError, LoadFailure};
use crate::map::MapSurface;
use rand::rngs::StdRng;
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A hardcoded generator the host registers by name. Documents bind it to
/// location types via `"method": "builtin"`.
pub type BuiltinFn = fn(&mut MapSurface, &RegionSettings, &mut StdRng);

/// What `select` hands the pipeline.
pub enum Selection {
    Chunk(Arc<ChunkDefinition>),
    Builtin(BuiltinFn),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Loaded,
    /// Queued for retry at finalize.
    Deferred,
}

#[derive(Debug)]
enum VariantSource {
    Chunk(Arc<ChunkDefinition>),
    Builtin { name: String, func: BuiltinFn },
}

#[derive(Debug)]
struct MapgenVariant {
    weight: i64,
    source: VariantSource,
}

/// The weighted variants bound to one location type, with the cumulative
/// index `select` binary-searches.
#[derive(Debug, Default)]
struct VariantList {
    variants: Vec<MapgenVariant>,
    cumulative: Vec<(i64, usize)>,
    total: i64,
}

impl VariantList {
    fn rebuild(&mut self) {
        self.cumulative.clear();
        self.total = 0;
        for (i, variant) in self.variants.iter().enumerate() {
            if variant.weight <= 0 {
                continue;
            }
            self.total += variant.weight;
            self.cumulative.push((self.total, i));
        }
    }

    fn pick(&self, rng: &mut StdRng) -> Option<&MapgenVariant> {
        if self.total <= 0 {
            return None;
        }
        let roll = rng.gen_range(1..=self.total);
        let idx = self.cumulative.partition_point(|&(cum, _)| cum < roll);
        let (_, variant_idx) = self.cumulative.get(idx)?;
        Some(&self.variants[*variant_idx])
    }
}

#[derive(Debug)]
struct PendingDoc {
    context: String,
    doc: Value,
}

#[derive(Debug)]
pub struct MapgenCatalog {
    tile_size: i32,
    locations: HashMap<LocationTypeId, VariantList>,
    nested: HashMap<NestedChunkId, Vec<Arc<ChunkDefinition>>>,
    updates: HashMap<UpdateChunkId, Arc<ChunkDefinition>>,
    palettes: HashMap<PaletteId, Palette>,
    builtin_fns: HashMap<String, BuiltinFn>,
    pending: Vec<PendingDoc>,
}

impl Default for MapgenCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MapgenCatalog {
    /// A catalog with the conventional 24-cell tile dimension.
    pub fn new() -> Self {
        Self::with_tile_size(24)
    }

    pub fn with_tile_size(tile_size: i32) -> Self {
        assert!(tile_size > 0, "tile size must be positive");
        Self {
            tile_size,
            locations: HashMap::new(),
            nested: HashMap::new(),
            updates: HashMap::new(),
            palettes: HashMap::new(),
            builtin_fns: HashMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn tile_size(&self) -> i32 {
        self.tile_size
    }

    /// Make a hardcoded generator available to documents under `name`.
    /// Must happen before the documents that bind it are registered.
    pub fn register_builtin_fn(&mut self, name: impl Into<String>, func: BuiltinFn) {
        self.builtin_fns.insert(name.into(), func);
    }

    /// Register one document. A reference to content not loaded yet queues
    /// the document for `finalize` instead of failing it.
    pub fn register_document(
        &mut self,
        doc: &Value,
        content: &ContentCatalog,
    ) -> Result<RegisterOutcome, LoadError> {
        match self.attempt(doc, content) {
            Ok(()) => Ok(RegisterOutcome::Loaded),
            Err(LoadFailure::Invalid(err)) => Err(err),
            Err(LoadFailure::Deferred(refs)) => {
                log::debug!(
                    "deferring {}: {}",
                    doc_context(doc),
                    LoadFailure::Deferred(refs)
                );
                self.pending.push(PendingDoc {
                    context: doc_context(doc),
                    doc: doc.clone(),
                });
                Ok(RegisterOutcome::Deferred)
            }
        }
    }

    /// Retry every queued document until the set stops shrinking, then
    /// build the selection indices. Documents still unresolved are
    /// collectively reported; palette-includes-palette chains of any depth
    /// resolve here regardless of file order.
    pub fn finalize(&mut self, content: &ContentCatalog) -> Result<(), FinalizeError> {
        let mut invalid: Vec<(String, LoadFailure)> = Vec::new();
        loop {
            let pending = std::mem::take(&mut self.pending);
            if pending.is_empty() {
                break;
            }
            let before = pending.len();
            let mut still_pending = Vec::new();
            for entry in pending {
                match self.attempt(&entry.doc, content) {
                    Ok(()) => {}
                    Err(LoadFailure::Deferred(refs)) => {
                        still_pending.push((entry, LoadFailure::Deferred(refs)));
                    }
                    Err(failure) => invalid.push((entry.context, failure)),
                }
            }
            let done = still_pending.len() == before || still_pending.is_empty();
            self.pending = still_pending
                .into_iter()
                .map(|(entry, failure)| {
                    if done {
                        invalid.push((entry.context.clone(), failure));
                    }
                    entry
                })
                .collect();
            if done {
                break;
            }
        }
        if !invalid.is_empty() {
            return Err(FinalizeError { unresolved: invalid });
        }
        self.pending.clear();
        for list in self.locations.values_mut() {
            list.rebuild();
        }
        Ok(())
    }

    /// Drop every registered document, keeping the host's builtin
    /// functions and the tile size.
    pub fn reset(&mut self) {
        self.locations.clear();
        self.nested.clear();
        self.updates.clear();
        self.palettes.clear();
        self.pending.clear();
    }

    /// Weighted pick among the variants bound to a location type.
    pub fn select(&self, location: &LocationTypeId, rng: &mut StdRng) -> Option<Selection> {
        let list = self.locations.get(location)?;
        match &list.pick(rng)?.source {
            VariantSource::Chunk(chunk) => Some(Selection::Chunk(Arc::clone(chunk))),
            VariantSource::Builtin { func, .. } => Some(Selection::Builtin(*func)),
        }
    }

    pub fn has_location(&self, location: &LocationTypeId) -> bool {
        self.locations
            .get(location)
            .is_some_and(|list| list.total > 0)
    }

    /// Uniform pick among the nested chunks registered under one id.
    pub fn pick_nested(&self, id: &NestedChunkId, rng: &mut StdRng) -> Option<Arc<ChunkDefinition>> {
        let defs = self.nested.get(id)?;
        if defs.is_empty() {
            return None;
        }
        Some(Arc::clone(&defs[rng.gen_range(0..defs.len())]))
    }

    pub fn update(&self, id: &UpdateChunkId) -> Option<Arc<ChunkDefinition>> {
        self.updates.get(id).map(Arc::clone)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn lookup<'a>(&'a self, content: &'a ContentCatalog) -> Lookup<'a> {
        Lookup {
            content,
            palettes: &self.palettes,
            nested: &self.nested,
        }
    }

    fn attempt(&mut self, doc: &Value, content: &ContentCatalog) -> Result<(), LoadFailure> {
        let head = Head::new(doc)?;
        match head.doc_type()? {
            "palette" => self.attempt_palette(doc, content),
            "mapgen" => {
                if head.method() == Some("builtin") {
                    self.attempt_builtin(doc).map_err(LoadFailure::from)
                } else {
                    self.attempt_chunk(doc, content)
                }
            }
            other => Err(LoadError::Malformed {
                context: "document".to_string(),
                message: format!("unknown document type {other:?}"),
            }
            .into()),
        }
    }

    fn attempt_palette(&mut self, doc: &Value, content: &ContentCatalog) -> Result<(), LoadFailure> {
        let obj = super::doc::Obj::new(doc, "palette")?;
        let id = PaletteId::from(obj.str_field("id")?);
        let obj = super::doc::Obj::new(doc, format!("palette {}", id.as_str()))?;
        let mut missing = Vec::new();
        let palette = {
            let look = self.lookup(content);
            Palette::parse(&obj, &look, &mut missing)?
        };
        if !missing.is_empty() {
            return Err(LoadFailure::Deferred(missing));
        }
        self.palettes.insert(id, palette);
        Ok(())
    }

    fn attempt_chunk(&mut self, doc: &Value, content: &ContentCatalog) -> Result<(), LoadFailure> {
        let chunk = {
            let look = self.lookup(content);
            ChunkDefinition::parse(doc, self.tile_size, &look)?
        };
        let chunk = Arc::new(chunk);
        match &chunk.kind {
            ChunkKind::Location { ids } => {
                for id in ids {
                    self.locations
                        .entry(id.clone())
                        .or_default()
                        .variants
                        .push(MapgenVariant {
                            weight: chunk.weight,
                            source: VariantSource::Chunk(Arc::clone(&chunk)),
                        });
                }
            }
            ChunkKind::Nested { id } => {
                self.nested.entry(id.clone()).or_default().push(chunk);
            }
            ChunkKind::Update { id } => {
                let id = id.clone();
                if self.updates.insert(id.clone(), chunk).is_some() {
                    log::warn!("update chunk {id:?} registered twice, last one wins");
                }
            }
        }
        Ok(())
    }

    /// `"method": "builtin"` binds a registered function to location
    /// types. A zero weight instead disables the named builtin wherever
    /// it is already bound.
    fn attempt_builtin(&mut self, doc: &Value) -> Result<(), LoadError> {
        let obj = super::doc::Obj::new(doc, "mapgen builtin")?;
        let name = obj.str_field("name")?;
        let weight = obj.int_or("weight", DEFAULT_WEIGHT)?;
        let ids: Vec<LocationTypeId> = match obj.get("om_terrain") {
            Some(Value::String(s)) => vec![LocationTypeId::from(s.as_str())],
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(LocationTypeId::from)
                        .ok_or_else(|| obj.fail("om_terrain entries must be id strings"))
                })
                .collect::<Result<_, _>>()?,
            _ => return Err(obj.fail("builtin mapgen requires om_terrain")),
        };
        if weight <= 0 {
            for id in &ids {
                if let Some(list) = self.locations.get_mut(id) {
                    for variant in &mut list.variants {
                        if let VariantSource::Builtin { name: n, .. } = &variant.source {
                            if n == name {
                                variant.weight = 0;
                            }
                        }
                    }
                }
            }
            return Ok(());
        }
        let func = *self
            .builtin_fns
            .get(name)
            .ok_or_else(|| obj.fail(format!("no builtin generator named {name:?}")))?;
        for id in ids {
            self.locations
                .entry(id)
                .or_default()
                .variants
                .push(MapgenVariant {
                    weight,
                    source: VariantSource::Builtin {
                        name: name.to_string(),
                        func,
                    },
                });
        }
        Ok(())
    }
}

/// Just enough of the document head to dispatch on, before the flavor
/// parsers build their own contexts.
struct Head<'a>(super::doc::Obj<'a>);

impl<'a> Head<'a> {
    fn new(doc: &'a Value) -> Result<Self, LoadError> {
        super::doc::Obj::new(doc, "document").map(Self)
    }

    fn doc_type(&self) -> Result<&'a str, LoadError> {
        self.0.str_field("type")
    }

    fn method(&self) -> Option<&'a str> {
        self.0.opt_str("method").ok().flatten()
    }
}

fn doc_context(doc: &Value) -> String {
    let name = doc
        .get("om_terrain")
        .and_then(|v| match v {
            Value::String(s) => Some(s.as_str()),
            Value::Array(items) => items.first().and_then(Value::as_str),
            _ => None,
        })
        .or_else(|| doc.get("nested_mapgen_id").and_then(Value::as_str))
        .or_else(|| doc.get("update_mapgen_id").and_then(Value::as_str))
        .or_else(|| doc.get("id").and_then(Value::as_str));
    match (doc.get("type").and_then(Value::as_str), name) {
        (Some(t), Some(n)) => format!("{t} {n}"),
        (Some(t), None) => t.to_string(),
        _ => "document".to_string(),
    }
}
