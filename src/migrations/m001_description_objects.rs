//! v1: string-form descriptions become `{"value": ...}` objects.

use serde_json::{Map, Value};

use super::Migration;
use crate::error::PackResult;

pub struct DescriptionObjects;

impl DescriptionObjects {
    fn lift(&self, doc: &mut Value) {
        let Some(system) = doc.get_mut("system").and_then(Value::as_object_mut) else {
            return;
        };
        // Pre-condition: only string-form descriptions need lifting.
        if let Some(Value::String(text)) = system.get("description") {
            let text = text.clone();
            let mut description = Map::new();
            description.insert("value".into(), Value::String(text));
            system.insert("description".into(), Value::Object(description));
        }
    }
}

impl Migration for DescriptionObjects {
    fn version(&self) -> i64 {
        1
    }

    fn name(&self) -> &'static str {
        "description-objects"
    }

    fn update_item(&self, item: &mut Value) -> PackResult<()> {
        self.lift(item);
        Ok(())
    }

    fn update_actor(&self, actor: &mut Value) -> PackResult<()> {
        self.lift(actor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_description_lifted() {
        let mut item = json!({"system": {"description": "A blade."}});
        DescriptionObjects.update_item(&mut item).unwrap();
        assert_eq!(item.pointer("/system/description/value").unwrap(), "A blade.");
    }

    #[test]
    fn test_object_description_untouched() {
        let mut item = json!({"system": {"description": {"value": "A blade.", "gm": ""}}});
        let before = item.clone();
        DescriptionObjects.update_item(&mut item).unwrap();
        assert_eq!(item, before);
    }
}
