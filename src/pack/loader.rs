//! Pack source tree loading.
//!
//! A pack's source of truth is a directory of one JSON file per document
//! (named `<slug-of-name>.json`, possibly nested in folder subdirectories)
//! plus an optional `_folders.json` holding the folder-hierarchy array. The
//! filename rule is a structural self-check: it catches documents renamed in
//! content without their file being renamed to match.

use std::path::Path;

use serde_json::Value;
use walkdir::WalkDir;

use crate::config::{PackContext, PackMeta};
use crate::core::slug::sluggify;
use crate::error::{PackError, PackResult};
use crate::pack::Pack;

/// Reserved filename for the folder-hierarchy record.
pub const FOLDERS_FILE: &str = "_folders.json";

/// Load and validate one pack from its source directory.
pub fn load_pack(meta: &PackMeta, ctx: &PackContext) -> PackResult<Pack> {
    let dir = ctx.paths.pack_source(meta);
    if !dir.is_dir() {
        return Err(PackError::validation(format!(
            "pack '{}': source directory {} does not exist",
            meta.name,
            dir.display()
        )));
    }

    let mut raw_documents = Vec::new();
    for entry in WalkDir::new(&dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            PackError::validation(format!("pack '{}': walking {}: {e}", meta.name, dir.display()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        if file_name == FOLDERS_FILE {
            continue;
        }

        let value = read_json(meta, path)?;
        check_filename(meta, path, &file_name, &value)?;
        raw_documents.push((value, Some(path.to_path_buf())));
    }

    let folders = load_folders(meta, &dir)?;
    Pack::new(meta, ctx, raw_documents, folders)
}

fn read_json(meta: &PackMeta, path: &Path) -> PackResult<Value> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        PackError::validation(format!("pack '{}': cannot read {}: {e}", meta.name, path.display()))
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        PackError::validation(format!("pack '{}': malformed JSON in {}: {e}", meta.name, path.display()))
    })
}

/// The on-disk filename must equal the slug of the document's name.
fn check_filename(meta: &PackMeta, path: &Path, file_name: &str, value: &Value) -> PackResult<()> {
    let Some(name) = value.get("name").and_then(Value::as_str) else {
        // Missing names are reported with full context by Pack construction.
        return Ok(());
    };
    let expected = format!("{}.json", sluggify(name));
    if file_name != expected {
        return Err(PackError::validation(format!(
            "pack '{}': {} holds document '{name}' but should be named {expected}",
            meta.name,
            path.display()
        )));
    }
    Ok(())
}

fn load_folders(meta: &PackMeta, dir: &Path) -> PackResult<Vec<Value>> {
    let path = dir.join(FOLDERS_FILE);
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let value = read_json(meta, &path)?;
    match value {
        Value::Array(folders) => Ok(folders),
        _ => Err(PackError::validation(format!(
            "pack '{}': {} is not a JSON array",
            meta.name,
            path.display()
        ))),
    }
}
