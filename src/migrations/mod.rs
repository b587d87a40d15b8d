//! Versioned data migrations for extracted documents.
//!
//! A migration is an ordered, versioned transformation unit with optional
//! hooks per document kind, applied in ascending version order over the
//! already-extracted source tree. The runner does not enforce idempotence:
//! each migration's own pre-condition check is the source of truth, and
//! every hook here is written to be a no-op when already applied.

mod m001_description_objects;
mod m002_prune_rule_nulls;
mod m003_off_guard_trait;
pub mod runner;

use serde_json::Value;

pub use runner::{MigrationRunner, RunSummary};

use crate::error::PackResult;

/// Schema version stamped by the finalizer; the version of the newest
/// migration in [`all_migrations`].
pub const LATEST_SCHEMA_VERSION: i64 = 3;

/// One versioned transformation unit.
///
/// Hooks mutate the parsed document in place and default to no-ops. Safe to
/// run zero or more times going forward — that is a contract each migration
/// must uphold itself, not something the runner checks.
pub trait Migration: Send + Sync {
    fn version(&self) -> i64;
    fn name(&self) -> &'static str;

    fn update_actor(&self, _actor: &mut Value) -> PackResult<()> {
        Ok(())
    }
    fn update_item(&self, _item: &mut Value) -> PackResult<()> {
        Ok(())
    }
    fn update_journal(&self, _journal: &mut Value) -> PackResult<()> {
        Ok(())
    }
    fn update_macro(&self, _macro_doc: &mut Value) -> PackResult<()> {
        Ok(())
    }
    fn update_table(&self, _table: &mut Value) -> PackResult<()> {
        Ok(())
    }
}

/// Every known migration, in ascending version order.
pub fn all_migrations() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(m001_description_objects::DescriptionObjects),
        Box::new(m002_prune_rule_nulls::PruneRuleNulls),
        Box::new(m003_off_guard_trait::OffGuardTrait),
    ]
}
