//! Document loading from disk
//!
//! Walks a directory tree of JSON files and feeds every mapgen and palette
//! document into the catalog. A broken document never aborts the load: it
//! is logged, counted, and the rest of the file continues. Only I/O
//! problems propagate.

use crate::content::ContentCatalog;
use crate::mapgen::catalog::RegisterOutcome;
use crate::mapgen::MapgenCatalog;
use anyhow::Context;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// What a `load_dir` pass did, for the caller's log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub files: usize,
    pub documents: usize,
    pub loaded: usize,
    pub deferred: usize,
    pub failed: usize,
    /// Documents of types this engine does not handle.
    pub skipped: usize,
}

/// Load every `.json` file under `path` (recursively, in sorted order)
/// into the catalog. Call `catalog.finalize` afterwards to resolve
/// deferred documents and build the selection indices.
pub fn load_dir(
    path: impl AsRef<Path>,
    catalog: &mut MapgenCatalog,
    content: &ContentCatalog,
) -> anyhow::Result<LoadStats> {
    let path = path.as_ref();
    let mut stats = LoadStats::default();
    let mut files = Vec::new();
    collect_json_files(path, &mut files)
        .with_context(|| format!("walking {}", path.display()))?;
    files.sort();
    for file in files {
        load_file(&file, catalog, content, &mut stats)
            .with_context(|| format!("reading {}", file.display()))?;
    }
    log::info!(
        "loaded {} document(s) from {} file(s): {} ok, {} deferred, {} failed, {} skipped",
        stats.documents,
        stats.files,
        stats.loaded,
        stats.deferred,
        stats.failed,
        stats.skipped
    );
    Ok(stats)
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_json_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            out.push(path);
        }
    }
    Ok(())
}

fn load_file(
    file: &Path,
    catalog: &mut MapgenCatalog,
    content: &ContentCatalog,
    stats: &mut LoadStats,
) -> anyhow::Result<()> {
    let text = fs::read_to_string(file)?;
    stats.files += 1;
    let value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(err) => {
            log::error!("{}: not valid JSON: {err}", file.display());
            stats.failed += 1;
            return Ok(());
        }
    };
    let docs = match value {
        Value::Array(items) => items,
        other => vec![other],
    };
    for doc in &docs {
        stats.documents += 1;
        match doc.get("type").and_then(Value::as_str) {
            Some("mapgen" | "palette") => match catalog.register_document(doc, content) {
                Ok(RegisterOutcome::Loaded) => stats.loaded += 1,
                Ok(RegisterOutcome::Deferred) => stats.deferred += 1,
                Err(err) => {
                    log::error!("{}: {err}", file.display());
                    stats.failed += 1;
                }
            },
            Some(other) => {
                log::debug!("{}: skipping {other:?} document", file.display());
                stats.skipped += 1;
            }
            None => {
                log::error!("{}: document without a \"type\" field", file.display());
                stats.failed += 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static DIR_SEQ: AtomicU32 = AtomicU32::new(0);

    /// A scratch directory removed on drop.
    struct ScratchDir(PathBuf);

    impl ScratchDir {
        fn new() -> Self {
            let seq = DIR_SEQ.fetch_add(1, Ordering::SeqCst);
            let path = std::env::temp_dir().join(format!(
                "mapforge-load-{}-{seq}",
                std::process::id()
            ));
            fs::create_dir_all(&path).unwrap();
            Self(path)
        }

        fn write(&self, name: &str, contents: &str) {
            let path = self.0.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, contents).unwrap();
        }
    }

    impl Drop for ScratchDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn content() -> ContentCatalog {
        let mut c = ContentCatalog::new();
        c.register_terrain("t_floor", &["OPEN"]);
        c.register_terrain("t_grass", &["OPEN"]);
        c
    }

    #[test]
    fn loads_files_in_sorted_order_and_resolves_deferrals() {
        let dir = ScratchDir::new();
        // "a_mapgen" sorts before "b_palette", so the chunk defers until
        // finalize sees the palette.
        dir.write(
            "a_mapgen.json",
            r#"{
                "type": "mapgen",
                "om_terrain": "meadow",
                "object": {"rows": ["..", ".."], "palettes": ["ground"]}
            }"#,
        );
        dir.write(
            "b_palette.json",
            r#"[
                {"type": "palette", "id": "ground", "terrain": {".": "t_grass"}},
                {"type": "monstergroup", "id": "ignored"}
            ]"#,
        );

        let content = content();
        let mut catalog = MapgenCatalog::with_tile_size(2);
        let stats = load_dir(&dir.0, &mut catalog, &content).unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.documents, 3);
        assert_eq!(stats.loaded, 1);
        assert_eq!(stats.deferred, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 0);

        catalog.finalize(&content).unwrap();
        assert!(catalog.has_location(&"meadow".into()));
    }

    #[test]
    fn broken_documents_are_counted_not_fatal() {
        let dir = ScratchDir::new();
        dir.write("bad.json", "{ not json at all");
        dir.write(
            "good.json",
            r#"{
                "type": "mapgen",
                "om_terrain": "lot",
                "object": {"fill_ter": "t_floor"}
            }"#,
        );
        dir.write("untyped.json", r#"{"id": "mystery"}"#);

        let content = content();
        let mut catalog = MapgenCatalog::with_tile_size(4);
        let stats = load_dir(&dir.0, &mut catalog, &content).unwrap();
        assert_eq!(stats.loaded, 1);
        assert_eq!(stats.failed, 2);
        catalog.finalize(&content).unwrap();
        assert!(catalog.has_location(&"lot".into()));
    }

    #[test]
    fn subdirectories_are_walked() {
        let dir = ScratchDir::new();
        dir.write(
            "region/fields.json",
            r#"{
                "type": "mapgen",
                "om_terrain": "field",
                "object": {"fill_ter": "t_grass"}
            }"#,
        );
        let content = content();
        let mut catalog = MapgenCatalog::with_tile_size(4);
        let stats = load_dir(&dir.0, &mut catalog, &content).unwrap();
        assert_eq!(stats.loaded, 1);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let content = content();
        let mut catalog = MapgenCatalog::new();
        let missing = std::env::temp_dir().join("mapforge-definitely-missing");
        assert!(load_dir(&missing, &mut catalog, &content).is_err());
    }
}
