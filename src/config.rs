//! Tool configuration: the pack manifest and filesystem layout.
//!
//! The manifest (`packs.json` at the repository root) is the external
//! collaborator that names every pack: its system id, each pack's source
//! directory and declared document type, the per-type system-data field
//! templates used to whitelist NPC data during extraction, and the fixed set
//! of built-in icon paths that bypass the image-existence check.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::document::DocumentType;
use crate::error::{PackError, PackResult};

/// Metadata for one pack, as declared in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackMeta {
    /// Pack name; doubles as the source directory name and the storage key.
    pub name: String,
    /// Source directory, relative to the repository root.
    pub path: PathBuf,
    /// Declared document type for every document in the pack.
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
}

/// The system-wide pack manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// System identifier; the first segment of every compendium reference
    /// and the system flag namespace on documents.
    pub system: String,
    pub packs: Vec<PackMeta>,
    /// Per-actor-type whitelists of `system` data keys kept at extraction.
    #[serde(default)]
    pub templates: HashMap<String, Vec<String>>,
    /// Icon paths shipped by the host application; always valid as `img`.
    #[serde(default)]
    pub builtin_icons: HashSet<String>,
}

impl Manifest {
    /// Load the manifest from `packs.json` under the given repository root.
    pub fn load(repo_root: &Path) -> PackResult<Self> {
        let path = repo_root.join("packs.json");
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            PackError::manifest(format!("cannot read {}: {e}", path.display()))
        })?;
        let manifest: Manifest = serde_json::from_str(&contents).map_err(|e| {
            PackError::manifest(format!("cannot parse {}: {e}", path.display()))
        })?;
        if manifest.system.is_empty() {
            return Err(PackError::manifest("manifest has an empty system id"));
        }
        Ok(manifest)
    }

    /// Look up a pack by name.
    pub fn pack(&self, name: &str) -> PackResult<&PackMeta> {
        self.packs
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| PackError::manifest(format!("no pack named '{name}' in manifest")))
    }

    /// True if the path is one of the host application's built-in icons.
    pub fn is_builtin_icon(&self, path: &str) -> bool {
        self.builtin_icons.contains(path)
    }

    /// The whitelist of `system` keys for an actor type, if one is declared.
    pub fn template_fields(&self, actor_type: &str) -> Option<&[String]> {
        self.templates.get(actor_type).map(|v| v.as_slice())
    }
}

/// Filesystem layout for one invocation.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Repository root; the manifest, pack sources, and assets live under it.
    pub repo_root: PathBuf,
}

impl Paths {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    /// Source directory for one pack.
    pub fn pack_source(&self, meta: &PackMeta) -> PathBuf {
        self.repo_root.join(&meta.path)
    }

    /// Built storage engine file for one pack.
    pub fn pack_db(&self, pack_name: &str) -> PathBuf {
        self.build_dir().join(format!("{pack_name}.db"))
    }

    /// Flat JSON bundle file for one pack.
    pub fn pack_bundle(&self, pack_name: &str) -> PathBuf {
        self.build_dir().join(format!("{pack_name}.json"))
    }

    /// Build output directory.
    pub fn build_dir(&self) -> PathBuf {
        self.repo_root.join("build").join("packs")
    }

    /// Staging area for extraction; replaced wholesale on each run.
    pub fn extract_staging(&self) -> PathBuf {
        self.repo_root.join("build").join("extract-staging")
    }

    /// True if the referenced asset file exists in the repository.
    pub fn asset_exists(&self, img: &str) -> bool {
        self.repo_root.join(img.trim_start_matches('/')).is_file()
    }
}

/// Everything the pipeline components need to know about the invocation.
#[derive(Debug, Clone)]
pub struct PackContext {
    pub manifest: Manifest,
    pub paths: Paths,
}

impl PackContext {
    /// Load the manifest under `repo_root` and bundle it with the layout.
    pub fn load(repo_root: impl Into<PathBuf>) -> PackResult<Self> {
        let paths = Paths::new(repo_root);
        let manifest = Manifest::load(&paths.repo_root)?;
        Ok(Self { manifest, paths })
    }

    /// Resolve a pack-or-"all" selector against the manifest.
    pub fn select_packs(&self, selector: &str) -> PackResult<Vec<&PackMeta>> {
        if selector == "all" {
            Ok(self.manifest.packs.iter().collect())
        } else {
            Ok(vec![self.manifest.pack(selector)?])
        }
    }
}
