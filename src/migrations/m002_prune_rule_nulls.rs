//! v2: null entries left behind by hand edits are pruned from rule arrays.

use serde_json::Value;

use super::Migration;
use crate::error::PackResult;

pub struct PruneRuleNulls;

impl Migration for PruneRuleNulls {
    fn version(&self) -> i64 {
        2
    }

    fn name(&self) -> &'static str {
        "prune-rule-nulls"
    }

    fn update_item(&self, item: &mut Value) -> PackResult<()> {
        if let Some(rules) = item.pointer_mut("/system/rules").and_then(Value::as_array_mut) {
            rules.retain(|rule| !rule.is_null());
        }
        Ok(())
    }
}
