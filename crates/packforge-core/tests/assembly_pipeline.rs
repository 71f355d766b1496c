//! Assembly and the full build against an in-memory artifact origin.

#![cfg(unix)]

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use packforge_core::artifact_cache::{self, FetchedArtifact};
use packforge_core::{
    ArtifactCache, ArtifactOrigin, AssemblyError, BundleAssembler, CacheError, LaunchConfig,
    ModReference, PackBuilder, PackConfig, PackError, VersionDescriptor,
};
use tempfile::TempDir;

/// Serves one jar per project id; unknown projects answer 404.
struct MapOrigin {
    jars: HashMap<u64, String>,
}

impl MapOrigin {
    fn new(jars: &[(u64, &str)]) -> Arc<Self> {
        Arc::new(Self {
            jars: jars.iter().map(|(p, n)| (*p, n.to_string())).collect(),
        })
    }
}

#[async_trait]
impl ArtifactOrigin for MapOrigin {
    async fn fetch(&self, reference: &ModReference) -> artifact_cache::Result<FetchedArtifact> {
        let url = format!("mem://projects/{}", reference.project_id);
        match self.jars.get(&reference.project_id) {
            Some(name) => Ok(FetchedArtifact {
                file_name: name.clone(),
                source_url: url,
                bytes: name.as_bytes().to_vec(),
            }),
            None => Err(CacheError::FetchStatus { url, status: 404 }),
        }
    }
}

const FAKE_SERVER: &str = r#"#!/bin/sh
failed=""
for jar in mods/*.jar; do
  [ -e "$jar" ] || continue
  name=$(basename "$jar")
  case "$name" in
    bad*)
      printf '\tUE\t%s{1.0} [%s] (%s)\n' "${name%.jar}" "${name%.jar}" "$name"
      failed=1
      ;;
  esac
done
[ -n "$failed" ] && exit 1
echo "Unloading dimension 1"
read cmd
exit 0
"#;

fn manifest_json(files: &[(u64, u64)]) -> String {
    let files: Vec<_> = files
        .iter()
        .map(|(p, f)| serde_json::json!({ "projectID": p, "fileID": f, "required": true }))
        .collect();
    serde_json::json!({
        "manifestType": "minecraftModpack",
        "name": "Infinity",
        "version": "2.6.0",
        "author": "someone",
        "minecraft": {
            "version": "1.7.10",
            "modLoaders": [{ "id": "forge-10.13.4.1558", "primary": true }]
        },
        "files": files,
        "overrides": "overrides"
    })
    .to_string()
}

/// Lay out `dest/modpack` and `dest/server/ftb_server_pack` as bootstrap
/// would leave them.
fn seed_workspace(dest: &Path, files: &[(u64, u64)]) {
    let modpack = dest.join("modpack");
    fs::create_dir_all(modpack.join("overrides/config")).unwrap();
    fs::write(modpack.join("manifest.json"), manifest_json(files)).unwrap();
    fs::write(modpack.join("overrides/config/pack.cfg"), b"fresh").unwrap();

    let base = dest.join("server/ftb_server_pack");
    fs::create_dir_all(base.join("config")).unwrap();
    fs::write(base.join("config/template.cfg"), b"stale").unwrap();
    fs::write(base.join("ServerStart.sh"), FAKE_SERVER).unwrap();
}

fn config() -> PackConfig {
    PackConfig {
        max_attempts: 5,
        launch: LaunchConfig {
            command: vec!["sh".to_string(), "ServerStart.sh".to_string()],
            boot_timeout_secs: 20,
            stop_grace_secs: 5,
            ..LaunchConfig::default()
        },
        ..PackConfig::default()
    }
}

fn sorted_mods(tree: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(tree.join("mods"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn assemble_places_artifacts_and_mirrors_release() {
    let dir = TempDir::new().unwrap();
    seed_workspace(dir.path(), &[(1, 10), (2, 20)]);
    let origin = MapOrigin::new(&[(1, "alpha.jar"), (2, "beta.jar")]);
    let cache = ArtifactCache::new(dir.path().join("cache"), origin).unwrap();
    let manifest = packforge_core::ModManifest::load(&dir.path().join("modpack")).unwrap();
    let base = dir.path().join("server/ftb_server_pack");

    let pair = BundleAssembler::new(&cache, 2)
        .assemble(
            &base,
            &[manifest.overrides_dir(&dir.path().join("modpack"))],
            &manifest,
        )
        .await
        .unwrap();

    assert_eq!(
        pair.release(),
        dir.path().join("server/Infinity-1.7.10-2.6.0")
    );
    assert_eq!(sorted_mods(pair.base()), vec!["alpha.jar", "beta.jar"]);
    assert_eq!(sorted_mods(pair.release()), vec!["alpha.jar", "beta.jar"]);
    assert!(base.join("config/pack.cfg").exists());
    assert!(!base.join("config/template.cfg").exists());
    assert!(pair.release().join("config/pack.cfg").exists());
    assert!(cache.contains(&ModReference::new(1, 10)));
    pair.verify_in_sync().unwrap();
}

#[tokio::test]
async fn unresolvable_artifact_aborts_assembly() {
    let dir = TempDir::new().unwrap();
    seed_workspace(dir.path(), &[(1, 10), (99, 1)]);
    let origin = MapOrigin::new(&[(1, "alpha.jar")]);
    let cache = ArtifactCache::new(dir.path().join("cache"), origin).unwrap();
    let manifest = packforge_core::ModManifest::load(&dir.path().join("modpack")).unwrap();

    let err = BundleAssembler::new(&cache, 4)
        .assemble(&dir.path().join("server/ftb_server_pack"), &[], &manifest)
        .await
        .unwrap_err();

    match err {
        PackError::Assembly(AssemblyError::Unresolvable { reference, source }) => {
            assert_eq!(reference, ModReference::new(99, 1));
            assert!(source.is_fetch());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!dir.path().join("server/Infinity-1.7.10-2.6.0").exists());
}

#[tokio::test]
async fn missing_template_is_reported() {
    let dir = TempDir::new().unwrap();
    seed_workspace(dir.path(), &[]);
    let cache = ArtifactCache::new(dir.path().join("cache"), MapOrigin::new(&[])).unwrap();
    let manifest = packforge_core::ModManifest::load(&dir.path().join("modpack")).unwrap();

    let err = BundleAssembler::new(&cache, 1)
        .assemble(&dir.path().join("server/missing"), &[], &manifest)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PackError::Assembly(AssemblyError::MissingTemplate(_))
    ));
}

#[tokio::test]
async fn build_prunes_failures_and_archives_release() {
    let dir = TempDir::new().unwrap();
    seed_workspace(dir.path(), &[(1, 10), (2, 20), (3, 30)]);
    let origin = MapOrigin::new(&[(1, "bad-a.jar"), (2, "bad-b.jar"), (3, "c.jar")]);

    let builder = PackBuilder::with_origin(config(), dir.path(), origin).unwrap();
    let run = builder.build().await.unwrap();

    assert_eq!(run.report.attempt_count(), 2);
    assert_eq!(run.report.removed_artifacts(), vec!["bad-a.jar", "bad-b.jar"]);
    assert_eq!(sorted_mods(run.pair.release()), vec!["c.jar"]);
    assert!(run.report_path.is_file());
    assert!(!run.report_path.starts_with(run.pair.release()));

    assert_eq!(
        run.release.archive_path,
        dir.path().join("server/Infinity-1.7.10-2.6.0_server.zip")
    );
    assert!(run.release.digest_path.is_file());

    let version: VersionDescriptor = serde_json::from_slice(
        &fs::read(run.pair.release().join("version.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(version.forge_version, "1558");
    assert_eq!(version.mc_version, "1.7.10");
    assert_eq!(version.pack_version, "2.6.0");

    // Entries for pruned artifacts stay cached.
    let cache_root = dir.path().join("cache");
    assert!(cache_root.join("1/10/bad-a.jar").is_file());
}

#[tokio::test]
async fn second_build_uses_cache() {
    let dir = TempDir::new().unwrap();
    seed_workspace(dir.path(), &[(3, 30)]);
    let origin = MapOrigin::new(&[(3, "c.jar")]);
    PackBuilder::with_origin(config(), dir.path(), origin)
        .unwrap()
        .build()
        .await
        .unwrap();

    // An origin that knows nothing can still build from the cache.
    let builder = PackBuilder::with_origin(config(), dir.path(), MapOrigin::new(&[])).unwrap();
    let run = builder.build().await.unwrap();
    assert_eq!(sorted_mods(run.pair.release()), vec!["c.jar"]);
}
