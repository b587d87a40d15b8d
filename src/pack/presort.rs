//! Embedded item presorting for NPC and Hazard actors.
//!
//! Imposes a deterministic, total ordering on an actor's embedded items to
//! normalize diffs and match the canonical in-book presentation order:
//! items are bucketed by type into a fixed category order, each bucket gets
//! a type-specific comparator, and every placed item is stamped with an
//! evenly spaced `sort` value so later manual reordering in the host UI has
//! room to interpose. All sorts are stable, so the remainder of each bucket
//! preserves encounter order.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

/// Fixed category order for embedded items.
const CATEGORY_ORDER: &[&str] = &[
    "spellcastingEntry",
    "spell",
    "weapon",
    "armor",
    "equipment",
    "consumable",
    "treasure",
    "backpack",
    "condition",
    "effect",
    "melee",
    "action",
    "lore",
];

/// Spacing between stamped `sort` values.
const SORT_INCREMENT: i64 = 100_000;

/// Action sub-categories, in presentation order.
const ACTION_SUBCATEGORIES: &[&str] = &["interaction", "defensive", "offensive", "other"];

struct OverrideTables {
    interaction_top: Vec<Regex>,
    offensive_bottom: Vec<Regex>,
    spellcasting_top: Vec<Regex>,
}

impl OverrideTables {
    fn new() -> Self {
        let compile = |patterns: &[&str]| {
            patterns
                .iter()
                .map(|p| Regex::new(p).unwrap())
                .collect::<Vec<_>>()
        };
        Self {
            // Vision and sense abilities lead the interaction block
            interaction_top: compile(&[
                r"(?i)\bvision\b",
                r"(?i)^scent",
                r"(?i)\bsense\b",
                r"(?i)^echolocation",
                r"(?i)^tremorsense",
                r"(?i)^telepathy",
            ]),
            // Follow-up attacks close out the offensive block
            offensive_bottom: compile(&[
                r"(?i)^improved grab$",
                r"(?i)^grab$",
                r"(?i)^improved knockdown$",
                r"(?i)^knockdown$",
                r"(?i)^improved push",
                r"(?i)^push \d+",
            ]),
            spellcasting_top: compile(&[
                r"(?i)^prepared spells$",
                r"(?i)^spontaneous spells$",
                r"(?i)^innate spells$",
                r"(?i)^ritual spells$",
            ]),
        }
    }
}

fn tables() -> &'static OverrideTables {
    static TABLES: OnceLock<OverrideTables> = OnceLock::new();
    TABLES.get_or_init(OverrideTables::new)
}

/// Reorder an actor's embedded items and stamp their `sort` values.
pub fn presort_items(actor_name: &str, items: Vec<Value>, emit_warnings: bool) -> Vec<Value> {
    let mut buckets: Vec<Vec<Value>> = (0..CATEGORY_ORDER.len()).map(|_| Vec::new()).collect();
    let mut unknown: Vec<Value> = Vec::new();
    let mut warned_types: HashSet<String> = HashSet::new();

    for item in items {
        let item_type = item.get("type").and_then(Value::as_str).unwrap_or("");
        match CATEGORY_ORDER.iter().position(|t| *t == item_type) {
            Some(index) => buckets[index].push(item),
            None => {
                if emit_warnings && warned_types.insert(item_type.to_string()) {
                    warn!("'{actor_name}': no category order for item type '{item_type}', appending after known categories");
                }
                unknown.push(item);
            }
        }
    }

    for (index, bucket) in buckets.iter_mut().enumerate() {
        match CATEGORY_ORDER[index] {
            "spell" => sort_spells(bucket),
            "melee" => sort_melee(bucket),
            "lore" => sort_lore(bucket),
            "action" => *bucket = reorder_actions(actor_name, std::mem::take(bucket), emit_warnings),
            "spellcastingEntry" => {
                *bucket = apply_overrides(std::mem::take(bucket), &tables().spellcasting_top, &[]);
            }
            _ => {}
        }
    }

    let mut out: Vec<Value> = buckets.into_iter().flatten().collect();
    out.extend(unknown);

    for (index, item) in out.iter_mut().enumerate() {
        if let Some(obj) = item.as_object_mut() {
            obj.insert("sort".into(), Value::from((index as i64 + 1) * SORT_INCREMENT));
        }
    }
    out
}

fn item_name(item: &Value) -> &str {
    item.get("name").and_then(Value::as_str).unwrap_or("")
}

/// Spells sort by descending level, items lacking a level after leveled
/// ones, alphabetical within a level.
fn sort_spells(bucket: &mut [Value]) {
    bucket.sort_by(|a, b| {
        let level_a = a.pointer("/system/level/value").and_then(Value::as_i64);
        let level_b = b.pointer("/system/level/value").and_then(Value::as_i64);
        match (level_a, level_b) {
            (Some(la), Some(lb)) => lb.cmp(&la).then_with(|| item_name(a).cmp(item_name(b))),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => item_name(a).cmp(item_name(b)),
        }
    });
}

/// Melee attacks sort alphabetically by declared weapon-type category;
/// attacks lacking one sort after those with it.
fn sort_melee(bucket: &mut [Value]) {
    bucket.sort_by(|a, b| {
        let cat_a = a.pointer("/system/weaponType/value").and_then(Value::as_str);
        let cat_b = b.pointer("/system/weaponType/value").and_then(Value::as_str);
        match (cat_a, cat_b) {
            (Some(ca), Some(cb)) => ca.cmp(cb),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

fn sort_lore(bucket: &mut [Value]) {
    bucket.sort_by(|a, b| item_name(a).cmp(item_name(b)));
}

/// Actions split into interaction/defensive/offensive/other sub-categories
/// (unknown category → other, with a warning), each independently reordered
/// by its override table, then concatenated.
fn reorder_actions(actor_name: &str, actions: Vec<Value>, emit_warnings: bool) -> Vec<Value> {
    let mut sub_buckets: Vec<Vec<Value>> = (0..ACTION_SUBCATEGORIES.len()).map(|_| Vec::new()).collect();

    for action in actions {
        let category = action
            .pointer("/system/category")
            .and_then(Value::as_str)
            .unwrap_or("");
        let index = match ACTION_SUBCATEGORIES.iter().position(|c| *c == category) {
            Some(index) => index,
            None => {
                if emit_warnings {
                    warn!(
                        "'{actor_name}': action '{}' has unknown category '{category}', treating as other",
                        item_name(&action)
                    );
                }
                ACTION_SUBCATEGORIES.len() - 1
            }
        };
        sub_buckets[index].push(action);
    }

    let t = tables();
    let mut out = Vec::new();
    for (index, bucket) in sub_buckets.into_iter().enumerate() {
        match ACTION_SUBCATEGORIES[index] {
            "interaction" => out.extend(apply_overrides(bucket, &t.interaction_top, &[])),
            "offensive" => out.extend(apply_overrides(bucket, &[], &t.offensive_bottom)),
            _ => out.extend(bucket),
        }
    }
    out
}

/// Pin items matching a top or bottom override to that end of the bucket,
/// ordered by table position; everything else keeps its relative order.
fn apply_overrides(items: Vec<Value>, top: &[Regex], bottom: &[Regex]) -> Vec<Value> {
    let mut pinned_top: Vec<(usize, Value)> = Vec::new();
    let mut pinned_bottom: Vec<(usize, Value)> = Vec::new();
    let mut middle: Vec<Value> = Vec::new();

    for item in items {
        let name = item_name(&item).to_string();
        if let Some(index) = top.iter().position(|re| re.is_match(&name)) {
            pinned_top.push((index, item));
        } else if let Some(index) = bottom.iter().position(|re| re.is_match(&name)) {
            pinned_bottom.push((index, item));
        } else {
            middle.push(item);
        }
    }

    pinned_top.sort_by_key(|(index, _)| *index);
    pinned_bottom.sort_by_key(|(index, _)| *index);

    let mut out: Vec<Value> = pinned_top.into_iter().map(|(_, item)| item).collect();
    out.extend(middle);
    out.extend(pinned_bottom.into_iter().map(|(_, item)| item));
    out
}
