//! Migration runner.
//!
//! Walks extracted document files, discriminates each document's kind by
//! structural shape, applies every migration's relevant hooks in list order
//! (for actors, item hooks also run over embedded items), and rewrites the
//! file only when the canonical serialization actually changed. Untouched
//! files stay byte-identical; a failed hook aborts the whole run with no
//! partial write of the in-flight file. Files rewritten earlier in the run
//! stay rewritten — migrations are expected to be small, reviewed, and
//! re-runnable from a clean checkout.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{all_migrations, Migration};
use crate::core::json::to_canonical_string;
use crate::error::{PackError, PackResult};
use crate::pack::loader::FOLDERS_FILE;

/// Actor type tags, used for shape-based kind discrimination.
const ACTOR_TYPES: &[&str] = &[
    "character",
    "npc",
    "hazard",
    "familiar",
    "loot",
    "party",
    "vehicle",
];

/// Macro kind tags.
const MACRO_TYPES: &[&str] = &["script", "chat"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentShape {
    Actor,
    Item,
    Journal,
    Macro,
    Table,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub scanned: usize,
    pub rewritten: usize,
}

/// Applies an ordered list of migrations to extracted files in place.
pub struct MigrationRunner {
    migrations: Vec<Box<dyn Migration>>,
}

impl MigrationRunner {
    /// The list is assumed to be pre-sorted by ascending version.
    pub fn new(migrations: Vec<Box<dyn Migration>>) -> Self {
        Self { migrations }
    }

    /// Runner over every known migration.
    pub fn latest() -> Self {
        Self::new(all_migrations())
    }

    /// Migrate every document file under `dir`.
    pub fn run_dir(&self, dir: &Path) -> PackResult<RunSummary> {
        let mut summary = RunSummary::default();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry
                .map_err(|e| PackError::validation(format!("walking {}: {e}", dir.display())))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json")
                || entry.file_name().to_string_lossy() == FOLDERS_FILE
            {
                continue;
            }
            summary.scanned += 1;
            if self.run_file(path)? {
                summary.rewritten += 1;
                debug!("migrated {}", path.display());
            }
        }
        info!(
            "migration pass over {}: {} files scanned, {} rewritten",
            dir.display(),
            summary.scanned,
            summary.rewritten
        );
        Ok(summary)
    }

    /// Migrate one file; returns whether it was rewritten.
    pub fn run_file(&self, path: &Path) -> PackResult<bool> {
        let contents = std::fs::read_to_string(path)?;
        let original: Value = serde_json::from_str(&contents).map_err(|e| {
            PackError::validation(format!("malformed JSON in {}: {e}", path.display()))
        })?;

        let mut updated = original.clone();
        self.apply(&mut updated)
            .map_err(|e| PackError::migration(format!("{}: {e}", path.display())))?;

        // Canonical-serialization equality is the no-op detector: a file no
        // migration changes keeps its on-disk bytes.
        if to_canonical_string(&updated) == to_canonical_string(&original) {
            return Ok(false);
        }
        std::fs::write(path, to_canonical_string(&updated))?;
        Ok(true)
    }

    fn apply(&self, doc: &mut Value) -> PackResult<()> {
        match shape_of(doc) {
            DocumentShape::Actor => {
                for migration in &self.migrations {
                    migration.update_actor(doc)?;
                    if let Some(items) = doc.get_mut("items").and_then(Value::as_array_mut) {
                        for item in items {
                            migration.update_item(item)?;
                        }
                    }
                }
            }
            DocumentShape::Item => {
                for migration in &self.migrations {
                    migration.update_item(doc)?;
                }
            }
            DocumentShape::Journal => {
                for migration in &self.migrations {
                    migration.update_journal(doc)?;
                }
            }
            DocumentShape::Macro => {
                for migration in &self.migrations {
                    migration.update_macro(doc)?;
                }
            }
            DocumentShape::Table => {
                for migration in &self.migrations {
                    migration.update_table(doc)?;
                }
            }
        }
        Ok(())
    }
}

/// Detect a document's kind by structural shape: actor-type tag, macro-type
/// tag, presence of a `pages` array, presence of a `results` array,
/// otherwise an item.
fn shape_of(doc: &Value) -> DocumentShape {
    let type_tag = doc.get("type").and_then(Value::as_str).unwrap_or("");
    if ACTOR_TYPES.contains(&type_tag) {
        return DocumentShape::Actor;
    }
    if MACRO_TYPES.contains(&type_tag) {
        return DocumentShape::Macro;
    }
    if doc.get("pages").and_then(Value::as_array).is_some() {
        return DocumentShape::Journal;
    }
    if doc.get("results").and_then(Value::as_array).is_some() {
        return DocumentShape::Table;
    }
    DocumentShape::Item
}
