//! Pack model and build-time validation.
//!
//! A pack is a named collection of documents of one declared type. It is
//! constructed from loaded data (directory tree or storage engine) and
//! validated on construction: folder records must structurally resemble
//! folders, every document needs a non-empty name, documents are sorted by
//! `_id` with collisions rejected, image paths must satisfy the image
//! policy, script macros get an ownership default, and NPC/Hazard attack
//! items must not declare dangling linked weapons. Finalized copies are
//! produced only at save time and are never mutated back into the pack.

pub mod build;
pub mod extract;
pub mod finalize;
pub mod html;
pub mod loader;
pub mod presort;
pub mod rules;
pub mod sanitize;

use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::config::{PackContext, PackMeta};
use crate::core::registry::LinkRegistry;
use crate::document::{Document, DocumentKind, DocumentType, ACTOR_SIZES};
use crate::error::{PackError, PackResult};

/// A loaded, validated pack.
#[derive(Debug)]
pub struct Pack {
    pub name: String,
    pub system: String,
    pub doc_type: DocumentType,
    /// Documents sorted by `_id`.
    pub documents: Vec<Document>,
    /// Folder records from `_folders.json`, if any.
    pub folders: Vec<Value>,
}

impl Pack {
    /// Construct and validate a pack from raw loaded data.
    pub fn new(
        meta: &PackMeta,
        ctx: &PackContext,
        raw_documents: Vec<(Value, Option<PathBuf>)>,
        folders: Vec<Value>,
    ) -> PackResult<Self> {
        let system = ctx.manifest.system.clone();

        for folder in &folders {
            let looks_like_folder = folder
                .as_object()
                .map(|o| o.get("_id").and_then(Value::as_str).is_some() && o.contains_key("folder"))
                .unwrap_or(false);
            if !looks_like_folder {
                return Err(PackError::validation(format!(
                    "pack '{}': _folders.json contains a record that is not a folder: {folder}",
                    meta.name
                )));
            }
        }

        let mut documents = Vec::with_capacity(raw_documents.len());
        for (value, path) in raw_documents {
            documents.push(Document::from_value(meta.doc_type, value, path)?);
        }

        documents.sort_by(|a, b| a.id.cmp(&b.id));
        for pair in documents.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(PackError::duplicate_id(format!(
                    "pack '{}': documents '{}' and '{}' share _id {}",
                    meta.name, pair[0].name, pair[1].name, pair[0].id
                )));
            }
        }

        for doc in &documents {
            check_images(meta, ctx, doc)?;
            check_actor_size(meta, doc)?;
        }

        for doc in &mut documents {
            apply_macro_ownership_default(doc);
        }

        for doc in &documents {
            check_linked_weapons(meta, &system, doc)?;
        }

        Ok(Self {
            name: meta.name.clone(),
            system,
            doc_type: meta.doc_type,
            documents,
            folders,
        })
    }

    /// Register every document of this pack into the registry.
    pub fn register_into(&self, registry: &mut LinkRegistry) {
        for doc in &self.documents {
            registry.insert(self.doc_type.as_str(), &self.name, &doc.name, &doc.id);
        }
    }
}

/// Image policy: no embedded base64 data, only `.svg`/`.webp`, and the path
/// must be a known builtin icon or a file that exists in the repository.
fn check_images(meta: &PackMeta, ctx: &PackContext, doc: &Document) -> PackResult<()> {
    if let Some(img) = doc.data.get("img").and_then(Value::as_str) {
        check_image_path(meta, ctx, &doc.name, img)?;
    }
    if let Some(children) = doc.embedded(meta.doc_type) {
        for child in children {
            if let Some(img) = child.get("img").and_then(Value::as_str) {
                let child_name = child.get("name").and_then(Value::as_str).unwrap_or("?");
                check_image_path(meta, ctx, &format!("{}, item '{child_name}'", doc.name), img)?;
            }
        }
    }
    Ok(())
}

fn check_image_path(meta: &PackMeta, ctx: &PackContext, doc_name: &str, img: &str) -> PackResult<()> {
    if img.is_empty() {
        return Ok(());
    }
    if img.starts_with("data:") {
        return Err(PackError::image(format!(
            "pack '{}', document '{doc_name}': embedded base64 image data",
            meta.name
        )));
    }
    if !img.ends_with(".svg") && !img.ends_with(".webp") {
        return Err(PackError::image(format!(
            "pack '{}', document '{doc_name}': image '{img}' is not .svg or .webp",
            meta.name
        )));
    }
    if ctx.manifest.is_builtin_icon(img) || ctx.paths.asset_exists(img) {
        return Ok(());
    }
    Err(PackError::image(format!(
        "pack '{}', document '{doc_name}': image '{img}' is neither a builtin icon nor a repository file",
        meta.name
    )))
}

/// An actor's declared size must come from the fixed size enumeration.
fn check_actor_size(meta: &PackMeta, doc: &Document) -> PackResult<()> {
    if !matches!(doc.kind, DocumentKind::Actor { .. }) {
        return Ok(());
    }
    if let Some(size) = doc
        .data
        .pointer("/system/traits/size/value")
        .and_then(Value::as_str)
    {
        if !ACTOR_SIZES.contains(&size) {
            return Err(PackError::category(format!(
                "pack '{}', actor '{}': unrecognized size '{size}'",
                meta.name, doc.name
            )));
        }
    }
    Ok(())
}

/// Script macros with no ownership record get an owner-only default.
fn apply_macro_ownership_default(doc: &mut Document) {
    let is_script = matches!(&doc.kind, DocumentKind::Macro { macro_type } if macro_type == "script");
    if !is_script {
        return;
    }
    let Some(obj) = doc.data.as_object_mut() else {
        return;
    };
    if !obj.contains_key("ownership") {
        let mut ownership = Map::new();
        ownership.insert("default".into(), Value::from(0));
        obj.insert("ownership".into(), Value::Object(ownership));
    }
}

/// Every melee attack declaring a linked weapon must find a weapon with that
/// id among the actor's own embedded items.
fn check_linked_weapons(meta: &PackMeta, system: &str, doc: &Document) -> PackResult<()> {
    if !doc.is_creature() {
        return Ok(());
    }
    let Some(items) = doc.embedded(DocumentType::Actor) else {
        return Ok(());
    };

    let weapon_ids: Vec<&str> = items
        .iter()
        .filter(|i| i.get("type").and_then(Value::as_str) == Some("weapon"))
        .filter_map(|i| i.get("_id").and_then(Value::as_str))
        .collect();

    for item in items {
        if item.get("type").and_then(Value::as_str) != Some("melee") {
            continue;
        }
        let linked = item
            .pointer(&format!("/flags/{system}/linkedWeapon"))
            .and_then(Value::as_str);
        if let Some(weapon_id) = linked {
            if !weapon_ids.contains(&weapon_id) {
                let attack = item.get("name").and_then(Value::as_str).unwrap_or("?");
                return Err(PackError::dangling(format!(
                    "pack '{}', actor '{}': melee attack '{attack}' links weapon {weapon_id}, which is not among the actor's weapons",
                    meta.name, doc.name
                )));
            }
        }
    }
    Ok(())
}
