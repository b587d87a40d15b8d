//! v3: the "flat-footed" trait was renamed to "off-guard".

use serde_json::Value;

use super::Migration;
use crate::error::PackResult;

const OLD_TRAIT: &str = "flat-footed";
const NEW_TRAIT: &str = "off-guard";

pub struct OffGuardTrait;

impl OffGuardTrait {
    fn rename_traits(&self, doc: &mut Value) {
        let Some(traits) = doc
            .pointer_mut("/system/traits/value")
            .and_then(Value::as_array_mut)
        else {
            return;
        };
        for entry in traits {
            if entry.as_str() == Some(OLD_TRAIT) {
                *entry = Value::String(NEW_TRAIT.to_string());
            }
        }
    }
}

impl Migration for OffGuardTrait {
    fn version(&self) -> i64 {
        3
    }

    fn name(&self) -> &'static str {
        "off-guard-trait"
    }

    fn update_item(&self, item: &mut Value) -> PackResult<()> {
        self.rename_traits(item);
        Ok(())
    }

    fn update_actor(&self, actor: &mut Value) -> PackResult<()> {
        self.rename_traits(actor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trait_renamed() {
        let mut item = json!({"system": {"traits": {"value": ["agile", "flat-footed"]}}});
        OffGuardTrait.update_item(&mut item).unwrap();
        assert_eq!(
            item.pointer("/system/traits/value").unwrap(),
            &json!(["agile", "off-guard"])
        );
    }

    #[test]
    fn test_already_migrated_is_noop() {
        let mut item = json!({"system": {"traits": {"value": ["agile", "off-guard"]}}});
        let before = item.clone();
        OffGuardTrait.update_item(&mut item).unwrap();
        assert_eq!(item, before);
    }
}
