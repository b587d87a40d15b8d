//! Build orchestration.
//!
//! Loads every pack named by the manifest (the registry is built fresh each
//! run by walking all known packs, so cross-pack references resolve even
//! when only one pack is being rebuilt), then finalizes and saves the
//! selected packs concurrently — per-pack work touches disjoint storage
//! engine instances, and the registry is read-only by the time the
//! concurrent phase starts. Documents within a pack are processed
//! sequentially for a stable, deterministic write order.

use serde_json::Value;
use tracing::info;

use crate::config::PackContext;
use crate::core::json::to_canonical_string;
use crate::core::registry::LinkRegistry;
use crate::error::{PackError, PackResult};
use crate::pack::finalize::{finalize, FinalizeContext};
use crate::pack::loader::load_pack;
use crate::pack::Pack;
use crate::database::PackDb;

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Write a flat JSON bundle per pack instead of the storage engine.
    pub as_json: bool,
}

#[derive(Debug, Default)]
pub struct BuildSummary {
    pub packs: usize,
    pub documents: usize,
}

/// Build one named pack, or every pack in the manifest.
pub async fn build_packs(
    selector: &str,
    opts: &BuildOptions,
    ctx: &PackContext,
) -> PackResult<BuildSummary> {
    // Selector errors surface before the expensive load phase.
    ctx.select_packs(selector)?;

    let mut registry = LinkRegistry::new();
    let mut packs = Vec::with_capacity(ctx.manifest.packs.len());
    for meta in &ctx.manifest.packs {
        let pack = load_pack(meta, ctx)?;
        pack.register_into(&mut registry);
        packs.push(pack);
    }

    let selected: Vec<&Pack> = packs
        .iter()
        .filter(|pack| selector == "all" || pack.name == selector)
        .collect();

    let tasks = selected
        .into_iter()
        .map(|pack| save_pack(pack, &registry, opts, ctx));
    let counts = futures::future::try_join_all(tasks).await?;

    let summary = BuildSummary {
        packs: counts.len(),
        documents: counts.iter().sum(),
    };
    if summary.documents == 0 {
        return Err(PackError::validation(format!(
            "build produced no documents for selector '{selector}'"
        )));
    }
    Ok(summary)
}

/// Finalize a pack's documents and write them to their destination.
/// Finalized copies are produced at save time only; the loaded pack is
/// never mutated.
async fn save_pack(
    pack: &Pack,
    registry: &LinkRegistry,
    opts: &BuildOptions,
    ctx: &PackContext,
) -> PackResult<usize> {
    let fctx = FinalizeContext {
        system: &pack.system,
        pack_name: &pack.name,
        doc_type: pack.doc_type,
        registry,
    };

    let mut finalized = Vec::with_capacity(pack.documents.len());
    for doc in &pack.documents {
        finalized.push(finalize(doc, &fctx)?);
    }

    if opts.as_json {
        let bundle_path = ctx.paths.pack_bundle(&pack.name);
        if let Some(parent) = bundle_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&bundle_path, to_canonical_string(&Value::Array(finalized)))?;
        info!("bundled {} documents into {}", pack.documents.len(), bundle_path.display());
        return Ok(pack.documents.len());
    }

    let mut documents = Vec::with_capacity(finalized.len());
    let mut embedded = Vec::new();
    for (doc, mut value) in pack.documents.iter().zip(finalized) {
        if let Some(field) = pack.doc_type.embedded_field() {
            if let Some(children) = value.get_mut(field).and_then(Value::as_array_mut) {
                let taken = std::mem::take(children);
                let mut child_ids = Vec::with_capacity(taken.len());
                for child in taken {
                    let child_id = child
                        .get("_id")
                        .and_then(Value::as_str)
                        .ok_or_else(|| {
                            PackError::validation(format!(
                                "pack '{}': embedded document of '{}' has no _id",
                                pack.name, doc.name
                            ))
                        })?
                        .to_string();
                    embedded.push((format!("{}.{child_id}", doc.id), serde_json::to_string(&child)?));
                    child_ids.push(Value::String(child_id));
                }
                *children = child_ids;
            }
        }
        documents.push((doc.id.clone(), serde_json::to_string(&value)?));
    }

    let mut folders = Vec::with_capacity(pack.folders.len());
    for folder in &pack.folders {
        let id = folder
            .get("_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        folders.push((id, serde_json::to_string(folder)?));
    }

    let db = PackDb::create(&ctx.paths.pack_db(&pack.name)).await?;
    db.put_batch(&documents, &embedded, &folders).await?;
    db.close().await;

    info!("built {} documents into pack '{}'", documents.len(), pack.name);
    Ok(documents.len())
}
