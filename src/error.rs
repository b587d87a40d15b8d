//! Error types for the pack pipeline.
//!
//! Provides a unified error type for all build, extract, and migration
//! operations. Every failure carries enough context (pack name, document
//! name, offending value) to locate the source file; errors bubble to the
//! binary entry point, which prints them and exits non-zero. Core code
//! never terminates the process itself.

use thiserror::Error;

/// Unified error type for pack operations.
#[derive(Debug, Error)]
pub enum PackError {
    /// Manifest problem (missing pack entry, unknown document type).
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Structural validation failure (missing required field, malformed
    /// folder record, filename/name mismatch).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Two documents in one pack share an `_id`.
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    /// Two documents would extract to the same file in one folder.
    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    /// Image policy violation (base64 data, unknown path, bad extension).
    #[error("Image policy violation: {0}")]
    ImagePolicy(String),

    /// A world-item reference in shippable content.
    #[error("World link: {0}")]
    WorldLink(String),

    /// A name or id with no registry entry, during build.
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    /// A value outside a fixed enumeration (feat category, actor size).
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    /// An embedded attack's linked weapon does not exist on the actor.
    #[error("Dangling link: {0}")]
    DanglingLink(String),

    /// Folder nesting too deep or a parent folder that cannot be found.
    #[error("Folder error: {0}")]
    FolderTree(String),

    /// An extracted document's `_id` differs from the one already on disk.
    #[error("Id drift: {0}")]
    IdDrift(String),

    /// A migration hook failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// JSON parse or serialize error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage engine error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error for file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackError {
    /// Create a manifest error with the given message.
    pub fn manifest(msg: impl Into<String>) -> Self {
        Self::Manifest(msg.into())
    }

    /// Create a validation error with the given message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a duplicate-id error with the given message.
    pub fn duplicate_id(msg: impl Into<String>) -> Self {
        Self::DuplicateId(msg.into())
    }

    /// Create a duplicate-name error with the given message.
    pub fn duplicate_name(msg: impl Into<String>) -> Self {
        Self::DuplicateName(msg.into())
    }

    /// Create an image-policy error with the given message.
    pub fn image(msg: impl Into<String>) -> Self {
        Self::ImagePolicy(msg.into())
    }

    /// Create a world-link error with the given message.
    pub fn world_link(msg: impl Into<String>) -> Self {
        Self::WorldLink(msg.into())
    }

    /// Create an unresolved-reference error with the given message.
    pub fn unresolved(msg: impl Into<String>) -> Self {
        Self::UnresolvedReference(msg.into())
    }

    /// Create an unknown-category error with the given message.
    pub fn category(msg: impl Into<String>) -> Self {
        Self::UnknownCategory(msg.into())
    }

    /// Create a dangling-link error with the given message.
    pub fn dangling(msg: impl Into<String>) -> Self {
        Self::DanglingLink(msg.into())
    }

    /// Create a folder-tree error with the given message.
    pub fn folder(msg: impl Into<String>) -> Self {
        Self::FolderTree(msg.into())
    }

    /// Create an id-drift error with the given message.
    pub fn id_drift(msg: impl Into<String>) -> Self {
        Self::IdDrift(msg.into())
    }

    /// Create a migration error with the given message.
    pub fn migration(msg: impl Into<String>) -> Self {
        Self::Migration(msg.into())
    }
}

/// Result type alias for pack operations.
pub type PackResult<T> = Result<T, PackError>;
