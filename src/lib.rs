/// packwright - compendium pack pipeline
///
/// Core library for building, extracting, and migrating compendium packs:
/// a tree of human-edited JSON documents on one side, per-pack embedded
/// databases on the other, with cross-document references rewritten between
/// name-form and id-form in between.

pub mod config;
pub mod core;
pub mod database;
pub mod document;
pub mod error;
pub mod migrations;
pub mod pack;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
