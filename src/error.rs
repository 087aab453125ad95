//! Load and finalize error taxonomy
//!
//! Structural problems in a document are fatal for that document
//! (`LoadError`). References to content that simply has not been loaded yet
//! are not errors at all: they surface as `LoadFailure::Deferred` and the
//! document is retried once the full catalog is available. Only references
//! still unresolved after that retry become a `FinalizeError`.

use crate::content::ids::ContentKind;
use std::fmt;
use thiserror::Error;

/// A fatal problem with one configuration document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{context}: {message}")]
    Malformed { context: String, message: String },

    #[error("{context}: {axis} value {value} out of bounds 0..{extent}")]
    OutOfBounds {
        context: String,
        axis: char,
        value: i32,
        extent: i32,
    },

    #[error("{context}: palette key {key:?} must be a single character")]
    BadPaletteKey { context: String, key: String },

    #[error("{context}: nested chunk size {width}x{height} must be square")]
    NonSquareNested {
        context: String,
        width: i64,
        height: i64,
    },

    #[error("{context}: chunk size {size} must be positive")]
    BadSize { context: String, size: i64 },

    #[error("{context}: field {field:?} contradicts the document flavor: {message}")]
    ContradictoryField {
        context: String,
        field: String,
        message: String,
    },

    #[error("{context}: grid row {row} is {got} characters wide, expected at least {want}")]
    BadRowWidth {
        context: String,
        row: usize,
        got: usize,
        want: usize,
    },

    #[error("{context}: expected at least {want} grid rows, found {got}")]
    BadRowCount {
        context: String,
        got: usize,
        want: usize,
    },

    #[error("{context}: no terrain mapping for character {ch:?} and no fill_ter")]
    UnmappedCharacter { context: String, ch: char },
}

/// One reference to content that was not registered at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingRef {
    pub kind: ContentKind,
    pub id: String,
}

impl MissingRef {
    pub fn new(kind: ContentKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for MissingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.kind, self.id)
    }
}

/// Why a document could not be turned into a chunk definition.
#[derive(Debug, Error)]
pub enum LoadFailure {
    /// Structurally broken. Fatal for this document.
    #[error(transparent)]
    Invalid(#[from] LoadError),

    /// References content not loaded yet. Retried at finalize.
    #[error("unresolved references: {}", format_refs(.0))]
    Deferred(Vec<MissingRef>),
}

/// `finalize()` failed: some documents still reference unknown content
/// after the full catalog was loaded.
#[derive(Debug, Error)]
#[error("{} document(s) failed to resolve:\n{}", .unresolved.len(), format_unresolved(.unresolved))]
pub struct FinalizeError {
    /// `(document context, failure)` for every document left unresolved.
    pub unresolved: Vec<(String, LoadFailure)>,
}

fn format_refs(refs: &[MissingRef]) -> String {
    refs.iter()
        .map(MissingRef::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_unresolved(entries: &[(String, LoadFailure)]) -> String {
    entries
        .iter()
        .map(|(ctx, failure)| format!("  {ctx}: {failure}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deferred_failure_names_every_missing_id() {
        let failure = LoadFailure::Deferred(vec![
            MissingRef::new(ContentKind::Terrain, "t_marble"),
            MissingRef::new(ContentKind::ItemGroup, "rare_loot"),
        ]);
        let text = failure.to_string();
        assert!(text.contains("t_marble"), "{text}");
        assert!(text.contains("rare_loot"), "{text}");
    }

    #[test]
    fn finalize_error_lists_document_context() {
        let err = FinalizeError {
            unresolved: vec![(
                "mapgen house".to_string(),
                LoadFailure::Deferred(vec![MissingRef::new(ContentKind::Trap, "tr_pit")]),
            )],
        };
        let text = err.to_string();
        assert!(text.contains("mapgen house"), "{text}");
        assert!(text.contains("tr_pit"), "{text}");
    }
}
