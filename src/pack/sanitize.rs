//! Extract-time document sanitization.
//!
//! Strips everything meaningful only to a live runtime instance: foreign
//! flag namespaces, ownership records, generated `_stats`/`sort` fields,
//! build-stamped bookkeeping, and prototype-token overrides that carry no
//! information. Embedded sub-documents retain their flags (they have no
//! independent existence to re-derive them from) and keep no ownership at
//! all. Asset paths on a legacy external host are rewritten to their
//! in-repository equivalents, and description fields go through the HTML
//! cleanup normalizer.

use serde_json::{Map, Value};

use crate::config::Manifest;
use crate::core::slug::sluggify;
use crate::document::DocumentType;
use crate::pack::html::clean_html;

/// Asset host used before the repository carried its own art; paths under it
/// mirror the in-repo layout.
pub const LEGACY_ASSET_HOST: &str = "https://assets.compendium-legacy.net/";

/// Everything the sanitizer needs to know about the invocation.
pub struct SanitizeContext<'a> {
    pub manifest: &'a Manifest,
    pub doc_type: DocumentType,
}

/// Sanitize a document pulled from the storage engine, in place, including
/// its embedded sub-documents.
pub fn sanitize_document(doc: &mut Value, ctx: &SanitizeContext) {
    sanitize_one(doc, ctx, false);
    if let Some(field) = ctx.doc_type.embedded_field() {
        if let Some(children) = doc.get_mut(field).and_then(Value::as_array_mut) {
            for child in children {
                sanitize_one(child, ctx, true);
            }
        }
    }
}

fn sanitize_one(doc: &mut Value, ctx: &SanitizeContext, embedded: bool) {
    let doc_name = doc
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let Some(obj) = doc.as_object_mut() else {
        return;
    };

    strip_flags(obj, &ctx.manifest.system, embedded);

    if embedded {
        obj.shift_remove("ownership");
    } else {
        let default = obj
            .get("ownership")
            .and_then(|o| o.get("default"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let mut ownership = Map::new();
        ownership.insert("default".into(), Value::from(default));
        obj.insert("ownership".into(), Value::Object(ownership));
    }

    obj.shift_remove("_stats");
    if !embedded {
        obj.shift_remove("sort");
        if matches!(obj.get("folder"), Some(Value::Null)) {
            obj.shift_remove("folder");
        }
    }

    if let Some(img) = obj.get("img").and_then(Value::as_str) {
        if let Some(local) = img.strip_prefix(LEGACY_ASSET_HOST) {
            let local = local.to_string();
            obj.insert("img".into(), Value::String(local));
        }
    }

    if let Some(system) = obj.get_mut("system").and_then(Value::as_object_mut) {
        system.shift_remove("_migration");
    }

    if !embedded && ctx.doc_type == DocumentType::Actor {
        reduce_prototype_token(obj, &doc_name);
        apply_system_whitelist(obj, ctx.manifest);
    }

    strip_type_defaults(obj);
    clean_descriptions(obj, ctx.doc_type, embedded);
}

/// Drop non-core, non-system flag namespaces (top-level documents only),
/// the build-stamped `core.sourceId`, and any namespace left empty.
fn strip_flags(obj: &mut Map<String, Value>, system_id: &str, embedded: bool) {
    let Some(flags) = obj.get_mut("flags").and_then(Value::as_object_mut) else {
        return;
    };

    if !embedded {
        let foreign: Vec<String> = flags
            .keys()
            .filter(|k| *k != "core" && k.as_str() != system_id)
            .cloned()
            .collect();
        for key in foreign {
            flags.shift_remove(&key);
        }
        if let Some(core) = flags.get_mut("core").and_then(Value::as_object_mut) {
            core.shift_remove("sourceId");
        }
    }

    let empty: Vec<String> = flags
        .iter()
        .filter(|(_, v)| v.as_object().map(Map::is_empty).unwrap_or(false))
        .map(|(k, _)| k.clone())
        .collect();
    for key in empty {
        flags.shift_remove(&key);
    }
    if flags.is_empty() {
        obj.shift_remove("flags");
    }
}

/// A token override whose name matches the document loses the whole record;
/// otherwise only the name survives, plus the token image when it follows
/// the iconics convention (a dedicated token render under `iconics/`).
fn reduce_prototype_token(obj: &mut Map<String, Value>, doc_name: &str) {
    let Some(token) = obj.get("prototypeToken") else {
        return;
    };
    let token_name = token.get("name").and_then(Value::as_str).unwrap_or_default();
    let token_src = token
        .pointer("/texture/src")
        .and_then(Value::as_str)
        .map(str::to_string);
    let iconics = token_src
        .as_deref()
        .map(|s| s.contains("/iconics/"))
        .unwrap_or(false);

    let mut kept = Map::new();
    if !token_name.is_empty() && token_name != doc_name {
        kept.insert("name".into(), Value::String(token_name.to_string()));
    }
    if iconics {
        if let Some(src) = token_src {
            let src = src
                .strip_prefix(LEGACY_ASSET_HOST)
                .map(str::to_string)
                .unwrap_or(src);
            let mut texture = Map::new();
            texture.insert("src".into(), Value::String(src));
            kept.insert("texture".into(), Value::Object(texture));
        }
    }

    if kept.is_empty() {
        obj.shift_remove("prototypeToken");
    } else {
        obj.insert("prototypeToken".into(), Value::Object(kept));
    }
}

/// Restrict an actor's `system` data to the keys its type template declares.
fn apply_system_whitelist(obj: &mut Map<String, Value>, manifest: &Manifest) {
    let actor_type = obj
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let Some(fields) = manifest.template_fields(&actor_type) else {
        return;
    };
    let Some(system) = obj.get_mut("system").and_then(Value::as_object_mut) else {
        return;
    };
    let extra: Vec<String> = system
        .keys()
        .filter(|k| !fields.contains(*k))
        .cloned()
        .collect();
    for key in extra {
        system.shift_remove(&key);
    }
}

/// Strip defaults the finalizer re-derives at build time.
fn strip_type_defaults(obj: &mut Map<String, Value>) {
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string);
    let Some(system) = obj.get_mut("system").and_then(Value::as_object_mut) else {
        return;
    };
    let default_equip = system
        .get("equipped")
        .and_then(Value::as_object)
        .map(|e| e.len() == 1 && e.get("carryType").and_then(Value::as_str) == Some("worn"))
        .unwrap_or(false);
    if default_equip {
        system.shift_remove("equipped");
    }
    let default_slug = match (system.get("slug").and_then(Value::as_str), name.as_deref()) {
        (Some(slug), Some(name)) => slug == sluggify(name),
        _ => false,
    };
    if default_slug {
        system.shift_remove("slug");
    }
}

fn clean_descriptions(obj: &mut Map<String, Value>, doc_type: DocumentType, embedded: bool) {
    if doc_type == DocumentType::JournalEntry && embedded {
        if let Some(content) = obj
            .get_mut("text")
            .and_then(Value::as_object_mut)
            .and_then(|t| t.get_mut("content"))
        {
            if let Some(text) = content.as_str() {
                *content = Value::String(clean_html(text));
            }
        }
        return;
    }
    if let Some(value) = obj
        .get_mut("system")
        .and_then(Value::as_object_mut)
        .and_then(|s| s.get_mut("description"))
        .and_then(Value::as_object_mut)
        .and_then(|d| d.get_mut("value"))
    {
        if let Some(text) = value.as_str() {
            *value = Value::String(clean_html(text));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest() -> Manifest {
        serde_json::from_str(
            r#"{
                "system": "demo",
                "packs": [],
                "templates": {"npc": ["attributes", "details", "traits"]}
            }"#,
        )
        .unwrap()
    }

    fn ctx(manifest: &Manifest, doc_type: DocumentType) -> SanitizeContext<'_> {
        SanitizeContext { manifest, doc_type }
    }

    #[test]
    fn test_foreign_flags_stripped_core_kept() {
        let manifest = manifest();
        let mut doc = json!({
            "name": "Dagger",
            "flags": {
                "core": {"sourceId": "Compendium.demo.gear.Item.aaaa000000000000", "keep": true},
                "demo": {"custom": 1},
                "some-module": {"junk": true}
            }
        });
        sanitize_document(&mut doc, &ctx(&manifest, DocumentType::Item));
        assert!(doc.pointer("/flags/some-module").is_none());
        assert!(doc.pointer("/flags/core/sourceId").is_none());
        assert_eq!(doc.pointer("/flags/core/keep"), Some(&json!(true)));
        assert_eq!(doc.pointer("/flags/demo/custom"), Some(&json!(1)));
    }

    #[test]
    fn test_empty_flags_dropped() {
        let manifest = manifest();
        let mut doc = json!({
            "name": "Dagger",
            "flags": {"demo": {}, "some-module": {"junk": true}}
        });
        sanitize_document(&mut doc, &ctx(&manifest, DocumentType::Item));
        assert!(doc.get("flags").is_none());
    }

    #[test]
    fn test_ownership_reset_and_runtime_fields_removed() {
        let manifest = manifest();
        let mut doc = json!({
            "name": "Dagger",
            "sort": 700000,
            "_stats": {"createdTime": 1},
            "folder": null,
            "ownership": {"default": 2, "abcd1234efgh5678": 3}
        });
        sanitize_document(&mut doc, &ctx(&manifest, DocumentType::Item));
        assert_eq!(doc.get("ownership"), Some(&json!({"default": 2})));
        assert!(doc.get("sort").is_none());
        assert!(doc.get("_stats").is_none());
        assert!(doc.get("folder").is_none());
    }

    #[test]
    fn test_embedded_keeps_flags_loses_ownership_and_sort_survives() {
        let manifest = manifest();
        let mut doc = json!({
            "name": "Goblin",
            "type": "npc",
            "system": {"attributes": {}, "details": {}},
            "items": [{
                "name": "Jaws",
                "sort": 100000,
                "ownership": {"default": 3},
                "flags": {"some-module": {"keep": true}},
                "_stats": {"x": 1}
            }]
        });
        sanitize_document(&mut doc, &ctx(&manifest, DocumentType::Actor));
        let item = doc.pointer("/items/0").unwrap();
        assert_eq!(item.pointer("/flags/some-module/keep"), Some(&json!(true)));
        assert!(item.get("ownership").is_none());
        assert!(item.get("_stats").is_none());
        assert_eq!(item.get("sort"), Some(&json!(100000)));
    }

    #[test]
    fn test_legacy_asset_host_rewritten() {
        let manifest = manifest();
        let mut doc = json!({
            "name": "Dagger",
            "img": "https://assets.compendium-legacy.net/equipment/dagger.webp"
        });
        sanitize_document(&mut doc, &ctx(&manifest, DocumentType::Item));
        assert_eq!(doc.get("img"), Some(&json!("equipment/dagger.webp")));
    }

    #[test]
    fn test_prototype_token_dropped_when_name_matches() {
        let manifest = manifest();
        let mut doc = json!({
            "name": "Goblin",
            "type": "npc",
            "system": {},
            "prototypeToken": {"name": "Goblin", "displayName": 20}
        });
        sanitize_document(&mut doc, &ctx(&manifest, DocumentType::Actor));
        assert!(doc.get("prototypeToken").is_none());
    }

    #[test]
    fn test_prototype_token_keeps_divergent_name_and_iconics_image() {
        let manifest = manifest();
        let mut doc = json!({
            "name": "Seelah",
            "type": "character",
            "system": {},
            "prototypeToken": {
                "name": "Paladin",
                "displaySight": true,
                "texture": {"src": "assets/iconics/seelah.webp", "scaleX": 1.5}
            }
        });
        sanitize_document(&mut doc, &ctx(&manifest, DocumentType::Actor));
        assert_eq!(
            doc.get("prototypeToken"),
            Some(&json!({"name": "Paladin", "texture": {"src": "assets/iconics/seelah.webp"}}))
        );
    }

    #[test]
    fn test_npc_system_whitelist() {
        let manifest = manifest();
        let mut doc = json!({
            "name": "Goblin",
            "type": "npc",
            "system": {
                "attributes": {"hp": 6},
                "details": {},
                "runtimeScratch": {"x": 1}
            }
        });
        sanitize_document(&mut doc, &ctx(&manifest, DocumentType::Actor));
        assert!(doc.pointer("/system/runtimeScratch").is_none());
        assert_eq!(doc.pointer("/system/attributes/hp"), Some(&json!(6)));
    }

    #[test]
    fn test_default_equip_state_stripped() {
        let manifest = manifest();
        let mut doc = json!({
            "name": "Dagger",
            "system": {"equipped": {"carryType": "worn"}}
        });
        sanitize_document(&mut doc, &ctx(&manifest, DocumentType::Item));
        assert!(doc.pointer("/system/equipped").is_none());

        let mut held = json!({
            "name": "Buckler",
            "system": {"equipped": {"carryType": "held"}}
        });
        sanitize_document(&mut held, &ctx(&manifest, DocumentType::Item));
        assert_eq!(held.pointer("/system/equipped/carryType"), Some(&json!("held")));
    }

    #[test]
    fn test_migration_marker_stripped() {
        let manifest = manifest();
        let mut doc = json!({
            "name": "Dagger",
            "system": {"_migration": {"version": 3}, "level": {"value": 0}}
        });
        sanitize_document(&mut doc, &ctx(&manifest, DocumentType::Item));
        assert!(doc.pointer("/system/_migration").is_none());
    }

    #[test]
    fn test_description_cleaned() {
        let manifest = manifest();
        let mut doc = json!({
            "name": "Dagger",
            "system": {"description": {"value": "A simple blade."}}
        });
        sanitize_document(&mut doc, &ctx(&manifest, DocumentType::Item));
        assert_eq!(
            doc.pointer("/system/description/value"),
            Some(&json!("<p>A simple blade.</p>"))
        );
    }

    #[test]
    fn test_journal_page_content_cleaned() {
        let manifest = manifest();
        let mut doc = json!({
            "name": "Rules",
            "pages": [{"name": "Intro", "text": {"content": "Bare  text&nbsp;here"}}]
        });
        sanitize_document(&mut doc, &ctx(&manifest, DocumentType::JournalEntry));
        assert_eq!(
            doc.pointer("/pages/0/text/content"),
            Some(&json!("<p>Bare text here</p>"))
        );
    }
}
