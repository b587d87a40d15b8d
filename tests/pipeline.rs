//! End-to-end pipeline tests: build → storage engine → extract over a
//! fixture repository, covering the round-trip and failure properties the
//! pipeline guarantees.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use packwright::config::PackContext;
use packwright::core::json::to_canonical_string;
use packwright::database::PackDb;
use packwright::error::PackError;
use packwright::pack::build::{build_packs, BuildOptions};
use packwright::pack::extract::{extract_packs, ExtractOptions};

fn write_json(path: &Path, value: &Value) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, to_canonical_string(value)).unwrap();
}

/// A small repository with one item pack, one actor pack, and an empty
/// spells pack used by storage-level scenarios.
fn fixture_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write_json(
        &root.join("packs.json"),
        &json!({
            "system": "demo",
            "packs": [
                {"name": "gear", "path": "packs/gear", "type": "Item"},
                {"name": "bestiary", "path": "packs/bestiary", "type": "Actor"},
                {"name": "spells", "path": "packs/spells", "type": "Item"}
            ],
            "templates": {
                "npc": ["abilities", "attributes", "details", "saves", "skills", "traits"]
            },
            "builtinIcons": ["icons/svg/item-bag.svg", "icons/svg/mystery-man.svg"]
        }),
    );

    write_json(
        &root.join("packs/gear/longsword.json"),
        &json!({
            "_id": "eqlongsword00001",
            "img": "icons/svg/item-bag.svg",
            "name": "Longsword",
            "ownership": {"default": 0},
            "system": {
                "description": {"value": "<p>Pairs well with a @UUID[Compendium.demo.gear.Item.Dagger].</p>"},
                "rules": []
            },
            "type": "weapon"
        }),
    );
    write_json(
        &root.join("packs/gear/dagger.json"),
        &json!({
            "_id": "eqdagger00000001",
            "img": "icons/svg/item-bag.svg",
            "name": "Dagger",
            "ownership": {"default": 0},
            "system": {
                "description": {"value": "<p>A short blade.</p>"},
                "rules": []
            },
            "type": "weapon"
        }),
    );
    write_json(
        &root.join("packs/bestiary/goblin.json"),
        &json!({
            "_id": "npcgoblin0000001",
            "img": "icons/svg/mystery-man.svg",
            "items": [
                {
                    "_id": "itmscimitar00001",
                    "img": "icons/svg/item-bag.svg",
                    "name": "Scimitar",
                    "sort": 100000,
                    "system": {"description": {"value": "<p>A curved blade.</p>"}, "rules": []},
                    "type": "weapon"
                },
                {
                    "_id": "itmstrike0000001",
                    "flags": {"demo": {"linkedWeapon": "itmscimitar00001"}},
                    "img": "icons/svg/item-bag.svg",
                    "name": "Scimitar Strike",
                    "sort": 200000,
                    "system": {"description": {"value": "<p>Slash.</p>"}, "rules": []},
                    "type": "melee"
                }
            ],
            "name": "Goblin",
            "ownership": {"default": 0},
            "system": {
                "attributes": {"hp": {"value": 6}},
                "traits": {"value": ["goblin"]}
            },
            "type": "npc"
        }),
    );
    fs::create_dir_all(root.join("packs/spells")).unwrap();

    dir
}

fn snapshot_tree(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut tree = BTreeMap::new();
    for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
        let entry = entry.unwrap();
        if entry.file_type().is_file() {
            let rel = entry.path().strip_prefix(root).unwrap().to_path_buf();
            tree.insert(rel, fs::read(entry.path()).unwrap());
        }
    }
    tree
}

#[tokio::test]
async fn test_extract_build_extract_is_byte_identical() {
    let repo = fixture_repo();
    let ctx = PackContext::load(repo.path()).unwrap();
    let opts = ExtractOptions::default();

    build_packs("all", &BuildOptions::default(), &ctx).await.unwrap();
    extract_packs("all", &opts, &ctx).await.unwrap();
    let first = snapshot_tree(&repo.path().join("packs"));

    build_packs("all", &BuildOptions::default(), &ctx).await.unwrap();
    extract_packs("all", &opts, &ctx).await.unwrap();
    let second = snapshot_tree(&repo.path().join("packs"));

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_reference_round_trip() {
    let repo = fixture_repo();
    let ctx = PackContext::load(repo.path()).unwrap();

    build_packs("all", &BuildOptions::default(), &ctx).await.unwrap();

    // Shipped form stores the reference by id.
    let db = PackDb::open(&ctx.paths.pack_db("gear")).await.unwrap();
    let docs = db.documents().await.unwrap();
    let longsword = docs
        .iter()
        .find(|(id, _)| id == "eqlongsword00001")
        .map(|(_, data)| data.clone())
        .unwrap();
    db.close().await;
    assert!(longsword.contains("@UUID[Compendium.demo.gear.Item.eqdagger00000001]"));

    // Extraction restores the name-based reference text.
    extract_packs("all", &ExtractOptions::default(), &ctx).await.unwrap();
    let extracted = fs::read_to_string(repo.path().join("packs/gear/longsword.json")).unwrap();
    assert!(extracted.contains("@UUID[Compendium.demo.gear.Item.Dagger]"));
}

#[tokio::test]
async fn test_id_drift_is_fatal() {
    let repo = fixture_repo();
    let ctx = PackContext::load(repo.path()).unwrap();

    build_packs("all", &BuildOptions::default(), &ctx).await.unwrap();

    // Simulate a hand-edited id in the already-extracted file.
    let path = repo.path().join("packs/gear/dagger.json");
    let drifted = fs::read_to_string(&path)
        .unwrap()
        .replace("eqdagger00000001", "eqdagger0000dead");
    fs::write(&path, drifted).unwrap();

    let err = extract_packs("gear", &ExtractOptions::default(), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, PackError::IdDrift(_)));
    assert!(err.to_string().contains("dagger.json"));
}

#[tokio::test]
async fn test_duplicate_names_in_storage_fail_extraction() {
    let repo = fixture_repo();
    let ctx = PackContext::load(repo.path()).unwrap();

    let db = PackDb::create(&ctx.paths.pack_db("spells")).await.unwrap();
    db.put_batch(
        &[
            (
                "spfireball000001".into(),
                serde_json::to_string(&json!({
                    "_id": "spfireball000001", "name": "Fireball", "type": "spell", "system": {}
                }))
                .unwrap(),
            ),
            (
                "spfireball000002".into(),
                serde_json::to_string(&json!({
                    "_id": "spfireball000002", "name": "Fireball", "type": "spell", "system": {}
                }))
                .unwrap(),
            ),
        ],
        &[],
        &[],
    )
    .await
    .unwrap();
    db.close().await;

    let err = extract_packs("spells", &ExtractOptions::default(), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, PackError::DuplicateName(_)));
    assert!(err.to_string().contains("spells"));
}

#[tokio::test]
async fn test_world_link_aborts_build_before_storage_write() {
    let repo = fixture_repo();
    let ctx = PackContext::load(repo.path()).unwrap();

    write_json(
        &repo.path().join("packs/gear/cursed-blade.json"),
        &json!({
            "_id": "eqcursed00000001",
            "img": "icons/svg/item-bag.svg",
            "name": "Cursed Blade",
            "system": {
                "description": {"value": "<p>Bound to @UUID[Item.aaaa000000000bad].</p>"},
                "rules": []
            },
            "type": "weapon"
        }),
    );

    let err = build_packs("gear", &BuildOptions::default(), &ctx).await.unwrap_err();
    assert!(matches!(err, PackError::WorldLink(_)));
    assert!(err.to_string().contains("Cursed Blade"));
    assert!(
        !ctx.paths.pack_db("gear").exists(),
        "nothing may reach the storage engine on a world-link failure"
    );
}

#[tokio::test]
async fn test_unresolved_rule_id_survives_extraction_unchanged() {
    let repo = fixture_repo();
    let ctx = PackContext::load(repo.path()).unwrap();

    let orphan_uuid = "Compendium.demo.feats.Item.ffffffffffffffff";
    let db = PackDb::create(&ctx.paths.pack_db("spells")).await.unwrap();
    db.put_batch(
        &[(
            "spblessing000001".into(),
            serde_json::to_string(&json!({
                "_id": "spblessing000001",
                "name": "Blessing",
                "type": "spell",
                "system": {"rules": [{"key": "GrantItem", "uuid": orphan_uuid}]}
            }))
            .unwrap(),
        )],
        &[],
        &[],
    )
    .await
    .unwrap();
    db.close().await;

    extract_packs("spells", &ExtractOptions::default(), &ctx).await.unwrap();

    let extracted: Value = serde_json::from_str(
        &fs::read_to_string(repo.path().join("packs/spells/blessing.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(
        extracted.pointer("/system/rules/0/uuid").unwrap(),
        orphan_uuid,
        "an unresolved id is left in place, not invented or nulled out"
    );
}

#[tokio::test]
async fn test_folder_layout_round_trips() {
    let repo = fixture_repo();
    let root = repo.path();

    write_json(
        &root.join("packs/gear/_folders.json"),
        &json!([{"_id": "fldrblades000001", "folder": null, "name": "Blades"}]),
    );
    for file in ["longsword.json", "dagger.json"] {
        let path = root.join("packs/gear").join(file);
        let mut value: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        value["folder"] = json!("fldrblades000001");
        let nested = root.join("packs/gear/blades").join(file);
        fs::remove_file(&path).unwrap();
        write_json(&nested, &value);
    }

    let ctx = PackContext::load(root).unwrap();
    build_packs("all", &BuildOptions::default(), &ctx).await.unwrap();
    extract_packs("gear", &ExtractOptions::default(), &ctx).await.unwrap();

    assert!(root.join("packs/gear/blades/longsword.json").is_file());
    assert!(root.join("packs/gear/blades/dagger.json").is_file());
    assert!(root.join("packs/gear/_folders.json").is_file());
}
