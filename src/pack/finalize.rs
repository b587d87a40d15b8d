//! Build-time finalization.
//!
//! Transforms a loaded document into its shippable form without mutating the
//! loaded copy: world references are fatal, bookkeeping fields are stamped
//! (`core.sourceId`, schema version), items get their slug/equip/feat
//! handling, rule-element UUIDs and general text links are resolved from
//! name-form to id-form. Any resolution failure aborts the whole pack —
//! shipped content must be link-complete, so there is no best-effort mode
//! here.

use serde_json::{Map, Value};

use crate::core::links::{first_world_ref, scan_links, LinkDialect};
use crate::core::registry::LinkRegistry;
use crate::core::slug::{is_document_id, sluggify};
use crate::document::{Document, DocumentKind, DocumentType, FEAT_CATEGORIES, PHYSICAL_ITEM_TYPES};
use crate::error::{PackError, PackResult};
use crate::migrations::LATEST_SCHEMA_VERSION;
use crate::pack::rules::{convert_rule_uuids, RuleUuidDirection};

/// Everything the finalizer needs to know about the invocation.
pub struct FinalizeContext<'a> {
    pub system: &'a str,
    pub pack_name: &'a str,
    pub doc_type: DocumentType,
    pub registry: &'a LinkRegistry,
}

/// Produce the shippable form of one document.
pub fn finalize(doc: &Document, ctx: &FinalizeContext) -> PackResult<Value> {
    let serialized = serde_json::to_string(&doc.data)?;
    if let Some(world) = first_world_ref(&serialized) {
        return Err(PackError::world_link(format!(
            "document '{}' in pack '{}' contains world reference {}",
            doc.name, ctx.pack_name, world.raw
        )));
    }

    let mut data = doc.data.clone();
    stamp_bookkeeping(&mut data, doc, ctx)?;

    match &doc.kind {
        DocumentKind::Item { item_type } => {
            finalize_item(&mut data, &doc.name, item_type, ctx)?;
            convert_rule_uuids(&mut data, &doc.name, ctx.pack_name, ctx.registry, RuleUuidDirection::ToIds)?;
        }
        DocumentKind::Actor { .. } => {
            if let Some(items) = data.get_mut("items").and_then(Value::as_array_mut) {
                for item in items {
                    convert_rule_uuids(item, &doc.name, ctx.pack_name, ctx.registry, RuleUuidDirection::ToIds)?;
                }
            }
        }
        _ => {}
    }

    let serialized = serde_json::to_string(&data)?;
    let rewritten = links_to_ids(&serialized, &doc.name, ctx)?;
    Ok(serde_json::from_str(&rewritten)?)
}

/// Clear runtime effects, stamp `core.sourceId`, and for actors recurse into
/// embedded items and stamp the schema-version marker on both.
fn stamp_bookkeeping(data: &mut Value, doc: &Document, ctx: &FinalizeContext) -> PackResult<()> {
    let Some(obj) = data.as_object_mut() else {
        return Err(PackError::validation(format!(
            "document '{}' in pack '{}' is not a JSON object",
            doc.name, ctx.pack_name
        )));
    };

    clear_effects(obj);

    let source_id = format!(
        "Compendium.{}.{}.{}.{}",
        ctx.system,
        ctx.pack_name,
        ctx.doc_type.as_str(),
        doc.id
    );
    if let Some(flags) = nested_object(obj, "flags") {
        let core = flags.entry("core").or_insert_with(|| Value::Object(Map::new()));
        if let Some(core) = core.as_object_mut() {
            core.insert("sourceId".into(), Value::String(source_id));
        }
    }

    if ctx.doc_type == DocumentType::Actor {
        stamp_schema_version(obj);
        if let Some(items) = obj.get_mut("items").and_then(Value::as_array_mut) {
            for item in items {
                if let Some(item_obj) = item.as_object_mut() {
                    clear_effects(item_obj);
                    stamp_schema_version(item_obj);
                }
            }
        }
    }
    Ok(())
}

fn clear_effects(obj: &mut Map<String, Value>) {
    if obj.contains_key("effects") {
        obj.insert("effects".into(), Value::Array(Vec::new()));
    }
}

/// `system._migration.version` is set to the latest schema version; no
/// last-migration marker is recorded.
fn stamp_schema_version(obj: &mut Map<String, Value>) {
    if let Some(system) = obj.get_mut("system").and_then(Value::as_object_mut) {
        let mut marker = Map::new();
        marker.insert("version".into(), Value::from(LATEST_SCHEMA_VERSION));
        system.insert("_migration".into(), Value::Object(marker));
    }
}

fn nested_object<'a>(obj: &'a mut Map<String, Value>, key: &str) -> Option<&'a mut Map<String, Value>> {
    if !obj.contains_key(key) {
        obj.insert(key.to_string(), Value::Object(Map::new()));
    }
    obj.get_mut(key).and_then(Value::as_object_mut)
}

/// Item-specific finalization: slug, equip default, feat category check.
fn finalize_item(data: &mut Value, name: &str, item_type: &str, ctx: &FinalizeContext) -> PackResult<()> {
    let Some(obj) = data.as_object_mut() else {
        return Ok(());
    };
    if let Some(system) = nested_object(obj, "system") {
        system.insert("slug".into(), Value::String(sluggify(name)));

        if PHYSICAL_ITEM_TYPES.contains(&item_type) && !system.contains_key("equipped") {
            let mut equipped = Map::new();
            equipped.insert("carryType".into(), Value::String("worn".into()));
            system.insert("equipped".into(), Value::Object(equipped));
        }

        if item_type == "feat" {
            let category = system.get("category").and_then(Value::as_str).unwrap_or("");
            if !FEAT_CATEGORIES.contains(&category) {
                return Err(PackError::category(format!(
                    "feat '{name}' in pack '{}' has unrecognized category '{category}'",
                    ctx.pack_name
                )));
            }
        }
    }
    Ok(())
}

/// Rewrite every compendium/UUID reference in the serialized text to its
/// id-resolved, fully qualified UUID form. A label that exactly matches the
/// referenced name is dropped as redundant; journal entry page references
/// are left untouched (page links use a different addressing scheme).
fn links_to_ids(text: &str, doc_name: &str, ctx: &FinalizeContext) -> PackResult<String> {
    let matches = scan_links(text);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for m in &matches {
        if m.dialect == LinkDialect::World {
            return Err(PackError::world_link(format!(
                "document '{doc_name}' in pack '{}' contains world reference {}",
                ctx.pack_name, m.raw
            )));
        }
        if m.is_journal_page() {
            continue;
        }

        // Present for both compendium dialects by construction.
        let (Some(system), Some(pack), Some(doc_type)) =
            (m.system.as_deref(), m.pack_name.as_deref(), m.doc_type.as_deref())
        else {
            continue;
        };

        let id = if is_document_id(&m.target) {
            m.target.clone()
        } else {
            match ctx.registry.id_for(doc_type, pack, &m.target) {
                Ok(id) => id.to_string(),
                Err(_) => {
                    return Err(PackError::unresolved(format!(
                        "document '{doc_name}' in pack '{}' references unknown {doc_type} '{}' in pack '{pack}'",
                        ctx.pack_name, m.target
                    )));
                }
            }
        };

        out.push_str(&text[cursor..m.start]);
        out.push_str(&format!("@UUID[Compendium.{system}.{pack}.{doc_type}.{id}]"));
        match &m.label {
            Some(label) if label != &m.target => {
                out.push('{');
                out.push_str(label);
                out.push('}');
            }
            _ => {}
        }
        cursor = m.end;
    }
    out.push_str(&text[cursor..]);
    Ok(out)
}
