//! Pack extraction.
//!
//! The inverse of the build: reads each built pack's storage engine,
//! reassembles embedded sub-documents, strips runtime bookkeeping, converts
//! id-references back to name-references, optionally presorts NPC/Hazard
//! items, and writes one canonically pretty-printed JSON file per document
//! (named by the slug of its name) plus a folder-hierarchy file.
//!
//! Everything is written to a staging area first and the real pack
//! directory is replaced wholesale at the end, so an interrupted run never
//! leaves a half-written pack. Reference resolution is best-effort here —
//! source trees are allowed to be transiently incomplete mid-edit — but
//! structural problems (missing embedded children, folder nesting beyond
//! three levels, dangling folder parents, duplicate output names, `_id`
//! drift against an existing file) stay fatal.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::{PackContext, PackMeta};
use crate::core::json::to_canonical_string;
use crate::core::links::{scan_links, LinkDialect};
use crate::core::registry::LinkRegistry;
use crate::core::slug::{is_document_id, sluggify};
use crate::database::PackDb;
use crate::document::{DocumentType, CREATURE_ACTOR_TYPES};
use crate::error::{PackError, PackResult};
use crate::pack::loader::FOLDERS_FILE;
use crate::pack::presort::presort_items;
use crate::pack::rules::{convert_rule_uuids, RuleUuidDirection};
use crate::pack::sanitize::{sanitize_document, SanitizeContext};

/// Folder nesting deeper than this cannot be mapped to output paths.
const MAX_FOLDER_DEPTH: usize = 3;

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Reorder NPC/Hazard embedded items into canonical presentation order.
    pub presort: bool,
    /// Emit warnings for unresolved references and unknown categories.
    pub warnings: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            presort: true,
            warnings: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct ExtractSummary {
    pub packs: usize,
    pub documents: usize,
}

/// Extract one named pack, or every pack found in the build output.
pub async fn extract_packs(
    selector: &str,
    opts: &ExtractOptions,
    ctx: &PackContext,
) -> PackResult<ExtractSummary> {
    let staging_root = ctx.paths.extract_staging();
    if staging_root.exists() {
        std::fs::remove_dir_all(&staging_root)?;
    }
    std::fs::create_dir_all(&staging_root)?;

    // The registry must know ids discovered in *other* packs, including ones
    // not visited this run, so the pre-pass walks every extracted pack once
    // before any conversion happens.
    let registry = prepopulate_registry(ctx)?;
    info!("registry pre-pass indexed {} documents", registry.len());

    let targets: Vec<&PackMeta> = if selector == "all" {
        ctx.manifest
            .packs
            .iter()
            .filter(|meta| ctx.paths.pack_db(&meta.name).is_file())
            .collect()
    } else {
        let meta = ctx.manifest.pack(selector)?;
        vec![meta]
    };
    if targets.is_empty() {
        return Err(PackError::validation(format!(
            "no built packs found under {}",
            ctx.paths.build_dir().display()
        )));
    }

    let tasks = targets
        .into_iter()
        .map(|meta| extract_one(meta, ctx, &registry, opts, &staging_root));
    let counts = futures::future::try_join_all(tasks).await?;

    std::fs::remove_dir_all(&staging_root)?;
    Ok(ExtractSummary {
        packs: counts.len(),
        documents: counts.iter().sum(),
    })
}

/// Walk every already-extracted pack and register id↔name pairs.
fn prepopulate_registry(ctx: &PackContext) -> PackResult<LinkRegistry> {
    let mut registry = LinkRegistry::new();
    for meta in &ctx.manifest.packs {
        let dir = ctx.paths.pack_source(meta);
        if !dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                PackError::validation(format!("pack '{}': walking {}: {e}", meta.name, dir.display()))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json")
                || entry.file_name().to_string_lossy() == FOLDERS_FILE
            {
                continue;
            }
            let contents = std::fs::read_to_string(path)?;
            let value: Value = serde_json::from_str(&contents).map_err(|e| {
                PackError::validation(format!(
                    "pack '{}': malformed JSON in {}: {e}",
                    meta.name,
                    path.display()
                ))
            })?;
            if let (Some(id), Some(name)) = (
                value.get("_id").and_then(Value::as_str),
                value.get("name").and_then(Value::as_str),
            ) {
                registry.insert(meta.doc_type.as_str(), &meta.name, name, id);
            }
        }
    }
    Ok(registry)
}

async fn extract_one(
    meta: &PackMeta,
    ctx: &PackContext,
    registry: &LinkRegistry,
    opts: &ExtractOptions,
    staging_root: &Path,
) -> PackResult<usize> {
    let db = PackDb::open(&ctx.paths.pack_db(&meta.name)).await?;
    let raw_documents = db.documents().await?;
    let raw_folders = db.folders().await?;

    let mut folders = Vec::with_capacity(raw_folders.len());
    for (_, data) in &raw_folders {
        folders.push(serde_json::from_str::<Value>(data)?);
    }

    let mut documents = Vec::with_capacity(raw_documents.len());
    for (id, data) in &raw_documents {
        let mut value: Value = serde_json::from_str(data)?;
        reassemble_embedded(meta, &db, id, &mut value).await?;
        documents.push(value);
    }
    db.close().await;

    let folder_paths = folder_output_paths(meta, &folders)?;

    let pack_staging = staging_root.join(&meta.name);
    std::fs::create_dir_all(&pack_staging)?;
    let source_dir = ctx.paths.pack_source(meta);
    let mut written: HashSet<PathBuf> = HashSet::new();

    let mut count = 0;
    for mut value in documents {
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if name.is_empty() {
            return Err(PackError::validation(format!(
                "pack '{}': stored document without a name",
                meta.name
            )));
        }

        let sanitize_ctx = SanitizeContext {
            manifest: &ctx.manifest,
            doc_type: meta.doc_type,
        };
        sanitize_document(&mut value, &sanitize_ctx);
        convert_rules_to_names(meta, &name, &mut value, registry)?;

        let serialized = serde_json::to_string(&value)?;
        let converted = links_to_names(&serialized, &name, meta, registry, opts.warnings);
        let mut value: Value = serde_json::from_str(&converted)?;

        if opts.presort && is_creature(meta, &value) {
            if let Some(items) = value.get_mut("items").and_then(Value::as_array_mut) {
                let taken = std::mem::take(items);
                *items = presort_items(&name, taken, opts.warnings);
            }
        }

        let slug = sluggify(&name);
        if slug.is_empty() {
            return Err(PackError::validation(format!(
                "pack '{}': document '{name}' has no sluggable characters for a filename",
                meta.name
            )));
        }
        let rel_dir = document_folder_path(meta, &value, &folder_paths)?;
        let rel_path = rel_dir.join(format!("{slug}.json"));

        if !written.insert(rel_path.clone()) {
            return Err(PackError::duplicate_name(format!(
                "pack '{}': two documents both extract to {}",
                meta.name,
                rel_path.display()
            )));
        }

        // An already-shipped document's identity must never drift between
        // extractions: external references and migration history depend on
        // id stability.
        check_id_stability(meta, &source_dir.join(&rel_path), &value)?;

        let out_path = pack_staging.join(&rel_path);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&out_path, to_canonical_string(&value))?;
        count += 1;
    }

    if !folders.is_empty() {
        let folders_value = Value::Array(folders);
        std::fs::write(
            pack_staging.join(FOLDERS_FILE),
            to_canonical_string(&folders_value),
        )?;
    }

    if source_dir.exists() {
        std::fs::remove_dir_all(&source_dir)?;
    }
    if let Some(parent) = source_dir.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::rename(&pack_staging, &source_dir)?;

    info!("extracted {count} documents from pack '{}'", meta.name);
    Ok(count)
}

/// Parents are stored with bare child-id arrays; rejoin the children from
/// the embedded sublevel in stored order.
async fn reassemble_embedded(
    meta: &PackMeta,
    db: &PackDb,
    parent_id: &str,
    value: &mut Value,
) -> PackResult<()> {
    let Some(field) = meta.doc_type.embedded_field() else {
        return Ok(());
    };
    let Some(ids) = value.get(field).and_then(Value::as_array) else {
        return Ok(());
    };
    let child_ids: Vec<String> = ids
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();

    let keys: Vec<String> = child_ids.iter().map(|c| format!("{parent_id}.{c}")).collect();
    let rows = db.get_embedded(&keys).await?;

    let mut children = Vec::with_capacity(rows.len());
    for (child_id, row) in child_ids.iter().zip(rows) {
        let Some(data) = row else {
            return Err(PackError::validation(format!(
                "pack '{}': document {parent_id} references missing embedded {child_id}",
                meta.name
            )));
        };
        children.push(serde_json::from_str::<Value>(&data)?);
    }
    value[field] = Value::Array(children);
    Ok(())
}

fn is_creature(meta: &PackMeta, value: &Value) -> bool {
    meta.doc_type == DocumentType::Actor
        && value
            .get("type")
            .and_then(Value::as_str)
            .map(|t| CREATURE_ACTOR_TYPES.contains(&t))
            .unwrap_or(false)
}

fn convert_rules_to_names(
    meta: &PackMeta,
    doc_name: &str,
    value: &mut Value,
    registry: &LinkRegistry,
) -> PackResult<()> {
    match meta.doc_type {
        DocumentType::Item => {
            convert_rule_uuids(value, doc_name, &meta.name, registry, RuleUuidDirection::ToNames)
        }
        DocumentType::Actor => {
            if let Some(items) = value.get_mut("items").and_then(Value::as_array_mut) {
                for item in items {
                    convert_rule_uuids(item, doc_name, &meta.name, registry, RuleUuidDirection::ToNames)?;
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Rewrite id-references in the serialized text back to name form. A label
/// that now exactly matches the resolved name is dropped; journal entry
/// page references are left untouched; unresolved ids are logged and left
/// in place rather than invented or nulled out.
fn links_to_names(
    text: &str,
    doc_name: &str,
    meta: &PackMeta,
    registry: &LinkRegistry,
    warnings: bool,
) -> String {
    let matches = scan_links(text);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for m in &matches {
        if m.dialect == LinkDialect::World {
            if warnings {
                warn!(
                    "pack '{}', document '{doc_name}': world reference {} left unchanged",
                    meta.name, m.raw
                );
            }
            continue;
        }
        if m.is_journal_page() || !is_document_id(&m.target) {
            continue;
        }

        let (Some(system), Some(pack), Some(doc_type)) =
            (m.system.as_deref(), m.pack_name.as_deref(), m.doc_type.as_deref())
        else {
            continue;
        };

        let Some(name) = registry.name_for(doc_type, pack, &m.target) else {
            if warnings {
                warn!(
                    "pack '{}', document '{doc_name}': no name found for {}, leaving id in place",
                    meta.name, m.raw
                );
            }
            continue;
        };

        out.push_str(&text[cursor..m.start]);
        out.push_str(&format!("@UUID[Compendium.{system}.{pack}.{doc_type}.{name}]"));
        match &m.label {
            Some(label) if label.as_str() != name => {
                out.push('{');
                out.push_str(label);
                out.push('}');
            }
            _ => {}
        }
        cursor = m.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Compute each folder's output directory, rejecting nesting beyond three
/// levels and parents that cannot be found.
fn folder_output_paths(meta: &PackMeta, folders: &[Value]) -> PackResult<HashMap<String, PathBuf>> {
    let mut records: HashMap<&str, (&str, Option<&str>)> = HashMap::new();
    for folder in folders {
        let Some(id) = folder.get("_id").and_then(Value::as_str) else {
            continue;
        };
        let name = folder.get("name").and_then(Value::as_str).unwrap_or("folder");
        let parent = folder.get("folder").and_then(Value::as_str);
        records.insert(id, (name, parent));
    }

    let mut paths = HashMap::new();
    for (&id, _) in &records {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(folder_id) = current {
            let Some((name, parent)) = records.get(folder_id) else {
                return Err(PackError::folder(format!(
                    "pack '{}': folder parent {folder_id} cannot be found",
                    meta.name
                )));
            };
            segments.push(sluggify(name));
            if segments.len() > MAX_FOLDER_DEPTH {
                return Err(PackError::folder(format!(
                    "pack '{}': folder nesting beyond {MAX_FOLDER_DEPTH} levels at '{name}'",
                    meta.name
                )));
            }
            current = *parent;
        }
        segments.reverse();
        let mut path = PathBuf::new();
        for segment in segments {
            path.push(segment);
        }
        paths.insert(id.to_string(), path);
    }
    Ok(paths)
}

fn document_folder_path(
    meta: &PackMeta,
    value: &Value,
    folder_paths: &HashMap<String, PathBuf>,
) -> PackResult<PathBuf> {
    match value.get("folder").and_then(Value::as_str) {
        None => Ok(PathBuf::new()),
        Some(folder_id) => folder_paths.get(folder_id).cloned().ok_or_else(|| {
            PackError::folder(format!(
                "pack '{}': document '{}' references unknown folder {folder_id}",
                meta.name,
                value.get("name").and_then(Value::as_str).unwrap_or("?")
            ))
        }),
    }
}

/// Refuse to change the `_id` stored in an already-existing source file.
fn check_id_stability(meta: &PackMeta, existing_path: &Path, value: &Value) -> PackResult<()> {
    if !existing_path.is_file() {
        return Ok(());
    }
    let contents = std::fs::read_to_string(existing_path)?;
    let existing: Value = serde_json::from_str(&contents).map_err(|e| {
        PackError::validation(format!(
            "pack '{}': malformed JSON in {}: {e}",
            meta.name,
            existing_path.display()
        ))
    })?;
    let existing_id = existing.get("_id").and_then(Value::as_str).unwrap_or_default();
    let incoming_id = value.get("_id").and_then(Value::as_str).unwrap_or_default();
    if !existing_id.is_empty() && existing_id != incoming_id {
        return Err(PackError::id_drift(format!(
            "pack '{}': {} already holds _id {existing_id}, refusing to replace it with {incoming_id}",
            meta.name,
            existing_path.display()
        )));
    }
    Ok(())
}
