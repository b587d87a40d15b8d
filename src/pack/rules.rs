//! Embedded-rule UUID conversion.
//!
//! Rule elements are structured, tagged behavior-configuration payloads on
//! items. Three rule kinds may carry compendium references: an `Aura` rule's
//! list of effect UUIDs, a `GrantItem` rule's single UUID, and a `ChoiceSet`
//! rule's choice values (plus an optional `selection`) when every choice
//! value is a fully qualified compendium reference. Each recognized string
//! goes through the same name↔id conversion as general links.
//!
//! The id direction fails hard on an unresolvable reference; the name
//! direction logs and leaves the original string in place. World-item UUIDs
//! (`Item.*`) are rejected in both directions: rule elements must never
//! reference the live world.

use serde_json::Value;

use crate::core::registry::LinkRegistry;
use crate::core::slug::is_document_id;
use crate::error::{PackError, PackResult};

/// Conversion direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleUuidDirection {
    /// Build: name-form → id-form, unresolved references are fatal.
    ToIds,
    /// Extraction: id-form → name-form, unresolved references are logged
    /// and left unchanged.
    ToNames,
}

/// Convert every reference-bearing rule element of one item in place.
pub fn convert_rule_uuids(
    item: &mut Value,
    doc_name: &str,
    pack_name: &str,
    registry: &LinkRegistry,
    direction: RuleUuidDirection,
) -> PackResult<()> {
    let Some(rules) = item
        .pointer_mut("/system/rules")
        .and_then(Value::as_array_mut)
    else {
        return Ok(());
    };

    for rule in rules {
        let Some(key) = rule.get("key").and_then(Value::as_str) else {
            continue;
        };
        match key {
            "Aura" => {
                let Some(effects) = rule.get_mut("effects").and_then(Value::as_array_mut) else {
                    continue;
                };
                for effect in effects {
                    if let Some(uuid) = effect.get("uuid").and_then(Value::as_str) {
                        if let Some(converted) =
                            convert_uuid(uuid, doc_name, pack_name, registry, direction)?
                        {
                            effect["uuid"] = Value::String(converted);
                        }
                    }
                }
            }
            "GrantItem" => {
                if let Some(uuid) = rule.get("uuid").and_then(Value::as_str) {
                    if let Some(converted) =
                        convert_uuid(uuid, doc_name, pack_name, registry, direction)?
                    {
                        rule["uuid"] = Value::String(converted);
                    }
                }
            }
            "ChoiceSet" => convert_choice_set(rule, doc_name, pack_name, registry, direction)?,
            _ => {}
        }
    }
    Ok(())
}

/// ChoiceSet choices are only converted when every choice value looks like a
/// fully qualified compendium reference; mixed or plain-value choice sets
/// are left untouched.
fn convert_choice_set(
    rule: &mut Value,
    doc_name: &str,
    pack_name: &str,
    registry: &LinkRegistry,
    direction: RuleUuidDirection,
) -> PackResult<()> {
    let all_fully_qualified = match rule.get("choices") {
        Some(Value::Array(choices)) => {
            !choices.is_empty()
                && choices.iter().all(|c| {
                    c.get("value")
                        .and_then(Value::as_str)
                        .map(|v| v.starts_with("Compendium."))
                        .unwrap_or(false)
                })
        }
        Some(Value::Object(choices)) => {
            !choices.is_empty()
                && choices.values().all(|v| {
                    v.as_str().map(|s| s.starts_with("Compendium.")).unwrap_or(false)
                })
        }
        _ => false,
    };
    if !all_fully_qualified {
        return Ok(());
    }

    match rule.get_mut("choices") {
        Some(Value::Array(choices)) => {
            for choice in choices {
                if let Some(value) = choice.get("value").and_then(Value::as_str) {
                    if let Some(converted) =
                        convert_uuid(value, doc_name, pack_name, registry, direction)?
                    {
                        choice["value"] = Value::String(converted);
                    }
                }
            }
        }
        Some(Value::Object(choices)) => {
            for slot in choices.values_mut() {
                if let Some(value) = slot.as_str() {
                    if let Some(converted) =
                        convert_uuid(value, doc_name, pack_name, registry, direction)?
                    {
                        *slot = Value::String(converted);
                    }
                }
            }
        }
        _ => {}
    }

    if let Some(selection) = rule.get("selection").and_then(Value::as_str) {
        if selection.starts_with("Compendium.") {
            if let Some(converted) =
                convert_uuid(selection, doc_name, pack_name, registry, direction)?
            {
                rule["selection"] = Value::String(converted);
            }
        }
    }
    Ok(())
}

/// Convert a single fully qualified UUID string. Returns `None` when the
/// string should be left as it is.
fn convert_uuid(
    uuid: &str,
    doc_name: &str,
    pack_name: &str,
    registry: &LinkRegistry,
    direction: RuleUuidDirection,
) -> PackResult<Option<String>> {
    if uuid.starts_with("Item.") {
        return Err(PackError::world_link(format!(
            "document '{doc_name}' in pack '{pack_name}': rule element references world item {uuid}"
        )));
    }
    let Some(rest) = uuid.strip_prefix("Compendium.") else {
        return Ok(None);
    };
    let mut parts = rest.splitn(4, '.');
    let (Some(system), Some(pack), Some(doc_type), Some(target)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Ok(None);
    };

    match direction {
        RuleUuidDirection::ToIds => {
            if is_document_id(target) {
                return Ok(None);
            }
            match registry.id_for(doc_type, pack, target) {
                Ok(id) => Ok(Some(format!("Compendium.{system}.{pack}.{doc_type}.{id}"))),
                Err(_) => Err(PackError::unresolved(format!(
                    "document '{doc_name}' in pack '{pack_name}': rule element references unknown {doc_type} '{target}' in pack '{pack}'"
                ))),
            }
        }
        RuleUuidDirection::ToNames => {
            if !is_document_id(target) {
                return Ok(None);
            }
            match registry.name_for(doc_type, pack, target) {
                Some(name) => Ok(Some(format!("Compendium.{system}.{pack}.{doc_type}.{name}"))),
                None => {
                    tracing::warn!(
                        "document '{doc_name}' in pack '{pack_name}': no name found for {uuid}, leaving id in place"
                    );
                    Ok(None)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> LinkRegistry {
        let mut registry = LinkRegistry::new();
        registry.insert("Item", "spell-effects", "Effect: Bless", "aaaa000000000000");
        registry.insert("Item", "feats", "Shield Block", "bbbb000000000000");
        registry
    }

    #[test]
    fn test_aura_effects_to_ids() {
        let mut item = json!({"system": {"rules": [
            {"key": "Aura", "effects": [
                {"uuid": "Compendium.demo.spell-effects.Item.Effect: Bless"}
            ]}
        ]}});
        convert_rule_uuids(&mut item, "Bless", "spells", &registry(), RuleUuidDirection::ToIds)
            .unwrap();
        assert_eq!(
            item.pointer("/system/rules/0/effects/0/uuid").unwrap(),
            "Compendium.demo.spell-effects.Item.aaaa000000000000"
        );
    }

    #[test]
    fn test_grant_item_round_trip() {
        let mut item = json!({"system": {"rules": [
            {"key": "GrantItem", "uuid": "Compendium.demo.feats.Item.Shield Block"}
        ]}});
        convert_rule_uuids(&mut item, "Fighter", "classes", &registry(), RuleUuidDirection::ToIds)
            .unwrap();
        assert_eq!(
            item.pointer("/system/rules/0/uuid").unwrap(),
            "Compendium.demo.feats.Item.bbbb000000000000"
        );
        convert_rule_uuids(&mut item, "Fighter", "classes", &registry(), RuleUuidDirection::ToNames)
            .unwrap();
        assert_eq!(
            item.pointer("/system/rules/0/uuid").unwrap(),
            "Compendium.demo.feats.Item.Shield Block"
        );
    }

    #[test]
    fn test_unresolved_id_direction_fails() {
        let mut item = json!({"system": {"rules": [
            {"key": "GrantItem", "uuid": "Compendium.demo.feats.Item.Unknown Feat"}
        ]}});
        let err = convert_rule_uuids(&mut item, "Fighter", "classes", &registry(), RuleUuidDirection::ToIds)
            .unwrap_err();
        assert!(matches!(err, PackError::UnresolvedReference(_)));
        assert!(err.to_string().contains("Unknown Feat"));
    }

    #[test]
    fn test_unresolved_name_direction_leaves_id() {
        let mut item = json!({"system": {"rules": [
            {"key": "GrantItem", "uuid": "Compendium.demo.feats.Item.ffff000000000000"}
        ]}});
        convert_rule_uuids(&mut item, "Fighter", "classes", &registry(), RuleUuidDirection::ToNames)
            .unwrap();
        assert_eq!(
            item.pointer("/system/rules/0/uuid").unwrap(),
            "Compendium.demo.feats.Item.ffff000000000000"
        );
    }

    #[test]
    fn test_world_item_uuid_rejected_both_directions() {
        for direction in [RuleUuidDirection::ToIds, RuleUuidDirection::ToNames] {
            let mut item = json!({"system": {"rules": [
                {"key": "GrantItem", "uuid": "Item.aaaa000000000000"}
            ]}});
            let err = convert_rule_uuids(&mut item, "Fighter", "classes", &registry(), direction)
                .unwrap_err();
            assert!(matches!(err, PackError::WorldLink(_)));
        }
    }

    #[test]
    fn test_choice_set_only_converts_fully_qualified_sets() {
        let mut mixed = json!({"system": {"rules": [
            {"key": "ChoiceSet", "choices": [
                {"value": "Compendium.demo.feats.Item.Shield Block"},
                {"value": "plain-option"}
            ]}
        ]}});
        convert_rule_uuids(&mut mixed, "Doc", "pack", &registry(), RuleUuidDirection::ToIds)
            .unwrap();
        assert_eq!(
            mixed.pointer("/system/rules/0/choices/0/value").unwrap(),
            "Compendium.demo.feats.Item.Shield Block",
            "mixed choice sets are left untouched"
        );

        let mut qualified = json!({"system": {"rules": [
            {"key": "ChoiceSet",
             "choices": [{"value": "Compendium.demo.feats.Item.Shield Block"}],
             "selection": "Compendium.demo.feats.Item.Shield Block"}
        ]}});
        convert_rule_uuids(&mut qualified, "Doc", "pack", &registry(), RuleUuidDirection::ToIds)
            .unwrap();
        assert_eq!(
            qualified.pointer("/system/rules/0/choices/0/value").unwrap(),
            "Compendium.demo.feats.Item.bbbb000000000000"
        );
        assert_eq!(
            qualified.pointer("/system/rules/0/selection").unwrap(),
            "Compendium.demo.feats.Item.bbbb000000000000"
        );
    }

    #[test]
    fn test_items_without_rules_untouched() {
        let mut item = json!({"system": {"description": {"value": "text"}}});
        let before = item.clone();
        convert_rule_uuids(&mut item, "Doc", "pack", &registry(), RuleUuidDirection::ToIds)
            .unwrap();
        assert_eq!(item, before);
    }
}
