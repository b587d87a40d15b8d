//! Document model.
//!
//! A document is the unit of content: a JSON object with a stable `_id`, a
//! `name`, a `type` tag, and type-specific data. The payload is kept as an
//! order-preserving `serde_json::Value` because arbitrary type-specific data
//! must round-trip byte-stably; the envelope (id, name, kind) is parsed once
//! at load time and carried through the pipeline as an explicit variant tag
//! instead of being re-derived at every step.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PackError, PackResult};

/// Actor types that own embedded attack items subject to the linked-weapon
/// integrity check and to extraction-time presorting.
pub const CREATURE_ACTOR_TYPES: &[&str] = &["npc", "hazard"];

/// Item types with equipment state.
pub const PHYSICAL_ITEM_TYPES: &[&str] = &[
    "armor",
    "backpack",
    "consumable",
    "equipment",
    "shield",
    "treasure",
    "weapon",
];

/// The fixed feat category enumeration.
pub const FEAT_CATEGORIES: &[&str] = &["ancestry", "archetype", "bonus", "class", "general", "skill"];

/// The fixed actor size enumeration.
pub const ACTOR_SIZES: &[&str] = &["tiny", "sm", "med", "lg", "huge", "grg"];

/// The document type a pack declares for all of its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    Actor,
    Item,
    JournalEntry,
    Macro,
    RollTable,
}

impl DocumentType {
    /// The host application's tag for this type, as used in references.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Actor => "Actor",
            Self::Item => "Item",
            Self::JournalEntry => "JournalEntry",
            Self::Macro => "Macro",
            Self::RollTable => "RollTable",
        }
    }

    /// Field under which this type stores embedded sub-documents, if any.
    pub fn embedded_field(&self) -> Option<&'static str> {
        match self {
            Self::Actor => Some("items"),
            Self::JournalEntry => Some("pages"),
            Self::RollTable => Some("results"),
            Self::Item | Self::Macro => None,
        }
    }
}

/// Per-document variant tag, discriminated once at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentKind {
    /// Actor with its actor-type tag (`npc`, `hazard`, `character`, ...).
    Actor { actor_type: String },
    /// Item with its item-type tag (`weapon`, `feat`, `spell`, ...).
    Item { item_type: String },
    Journal,
    /// Macro with its kind tag (`script` or `chat`).
    Macro { macro_type: String },
    Table,
}

/// One piece of content with a stable id and name.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub kind: DocumentKind,
    /// Full order-preserving JSON payload, including the envelope fields.
    pub data: Value,
    /// Source file the document was loaded from, when loaded from disk.
    pub source_path: Option<PathBuf>,
}

impl Document {
    /// Parse the envelope out of a raw JSON object and discriminate its kind
    /// against the pack's declared document type.
    pub fn from_value(declared: DocumentType, data: Value, source_path: Option<PathBuf>) -> PackResult<Self> {
        let obj = data.as_object().ok_or_else(|| {
            PackError::validation(format!(
                "document is not a JSON object{}",
                source_context(&source_path)
            ))
        })?;

        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if name.is_empty() {
            return Err(PackError::validation(format!(
                "document has no name{}",
                source_context(&source_path)
            )));
        }

        let id = obj
            .get("_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if id.is_empty() {
            return Err(PackError::validation(format!(
                "document '{name}' has no _id{}",
                source_context(&source_path)
            )));
        }

        let type_tag = obj.get("type").and_then(Value::as_str).unwrap_or_default();
        let kind = match declared {
            DocumentType::Actor => DocumentKind::Actor {
                actor_type: type_tag.to_string(),
            },
            DocumentType::Item => DocumentKind::Item {
                item_type: type_tag.to_string(),
            },
            DocumentType::JournalEntry => DocumentKind::Journal,
            DocumentType::Macro => DocumentKind::Macro {
                macro_type: type_tag.to_string(),
            },
            DocumentType::RollTable => DocumentKind::Table,
        };

        Ok(Self {
            id,
            name,
            kind,
            data,
            source_path,
        })
    }

    /// True for NPC and Hazard actors.
    pub fn is_creature(&self) -> bool {
        matches!(&self.kind, DocumentKind::Actor { actor_type } if CREATURE_ACTOR_TYPES.contains(&actor_type.as_str()))
    }

    /// The embedded sub-document array, if this document's type has one.
    pub fn embedded(&self, declared: DocumentType) -> Option<&Vec<Value>> {
        let field = declared.embedded_field()?;
        self.data.get(field)?.as_array()
    }
}

fn source_context(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" ({})", p.display()),
        None => String::new(),
    }
}
