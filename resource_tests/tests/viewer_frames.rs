//! The viewer's frame driver running a manifest from disk.

use std::path::Path;

use resource_engine::{
    config::LoaderConfig,
    id::ResourceId,
    state::{ResolveMode, ResourceState},
};
use resource_tests::init_tracing;
use resource_viewer::{args::parse_args, FrameDriver};

const MANIFEST: &str = r#"{
    "resources": [
        { "id": 1, "name": "basic.vert", "kind": "shader",
          "data": { "stage": "vertex", "path": "basic.vert" } },
        { "id": 2, "name": "basic.frag", "kind": "shader",
          "data": { "stage": "fragment", "path": "basic.frag" } },
        { "id": 3, "name": "basic", "kind": "program",
          "data": { "vertex": 1, "fragment": 2 } },
        { "id": 4, "name": "checker", "kind": "texture",
          "data": { "path": "checker.rgba", "width": 2, "height": 2 } },
        { "id": 5, "name": "stone", "kind": "material",
          "data": { "program": 3, "textures": [4] } },
        { "id": 6, "name": "quad", "kind": "mesh", "data": { "path": "quad.mesh" } },
        { "id": 7, "name": "stone_quad", "kind": "renderable_mesh",
          "data": { "mesh": 6, "material": 5 } },
        { "id": 8, "name": "ui", "kind": "font", "data": { "path": "ui.ttf", "size": 14.0 } }
    ]
}"#;

/// Writes the assets and manifest into `dir` and returns a config for them.
fn stage(dir: &Path) -> anyhow::Result<LoaderConfig> {
    std::fs::write(dir.join("basic.vert"), "void main() {}")?;
    std::fs::write(dir.join("basic.frag"), "void main() {}")?;
    std::fs::write(dir.join("checker.rgba"), [7u8; 16])?;
    std::fs::write(dir.join("quad.mesh"), "0 0 0 1 0 0 0 1 0")?;
    std::fs::write(dir.join("ui.ttf"), b"font")?;
    let manifest = dir.join("manifest.json");
    std::fs::write(&manifest, MANIFEST)?;

    Ok(LoaderConfig {
        asset_root: dir.display().to_string(),
        manifest: manifest.display().to_string(),
        frame_hz: 240,
        max_frames: 10,
        ..LoaderConfig::default()
    })
}

#[tokio::test]
async fn deferred_manifest_settles_after_one_frame() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let cfg = stage(dir.path())?;

    let mut driver = FrameDriver::from_config(&cfg)?;
    driver.request_all(ResolveMode::Deferred);
    assert!(!driver.is_settled());
    assert!(driver
        .requests()
        .iter()
        .all(|r| r.state == ResourceState::InProgress && r.is_alive()));
    assert_eq!(driver.loader().pending(), 8);

    let report = driver.tick();
    assert_eq!(report.frame, 1);
    assert_eq!(report.loads, 8);
    assert_eq!(report.unsettled, 0);
    assert!(driver.is_settled());
    assert_eq!(driver.failed().count(), 0);

    // Settled requests are left alone.
    let report = driver.tick();
    assert_eq!(report.loads, 0);
    assert_eq!(driver.stats().constructed, 8);
    assert_eq!(driver.stats().loaded, 8);
    Ok(())
}

#[tokio::test]
async fn frame_loop_runs_until_settled() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = stage(dir.path())?;

    let mut driver = FrameDriver::from_config(&cfg)?;
    driver.request_all(cfg.mode);
    driver.run_until_settled(cfg.frame_hz, cfg.max_frames).await;

    assert!(driver.is_settled());
    assert!(driver.frame() < cfg.max_frames);
    for id in 1..=8 {
        assert_eq!(driver.loader().state(ResourceId(id)), ResourceState::Ready);
    }
    let lines = driver.status_lines();
    assert_eq!(lines.len(), 8);
    assert!(lines.iter().all(|line| line.ends_with("Ready")));
    assert!(lines[6].contains("stone_quad"));
    Ok(())
}

#[tokio::test]
async fn immediate_requests_need_no_frames() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut cfg = stage(dir.path())?;
    cfg.mode = ResolveMode::Immediate;

    let mut driver = FrameDriver::from_config(&cfg)?;
    driver.request_all(cfg.mode);
    assert!(driver.is_settled());
    assert_eq!(driver.loader().pending(), 0);

    driver.run_until_settled(cfg.frame_hz, cfg.max_frames).await;
    assert_eq!(driver.frame(), 0);
    Ok(())
}

#[tokio::test]
async fn failures_are_reported_with_reasons() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = stage(dir.path())?;
    std::fs::remove_file(dir.path().join("checker.rgba"))?;

    let mut driver = FrameDriver::from_config(&cfg)?;
    driver.request_all(cfg.mode);
    driver.run_until_settled(cfg.frame_hz, cfg.max_frames).await;
    assert!(driver.is_settled());

    let failed: Vec<ResourceId> = driver.failed().map(|r| r.id).collect();
    assert_eq!(failed, vec![ResourceId(4), ResourceId(5), ResourceId(7)]);

    let lines = driver.status_lines();
    assert!(lines[3].contains("checker.rgba"));
    assert!(lines[4].contains("dependency #4 failed"));
    assert!(lines[7].ends_with("Ready"));
    Ok(())
}

#[test]
fn command_line_overlays_config_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("viewer.json");
    std::fs::write(&path, r#"{ "asset_root": "packs/base", "frame_hz": 30 }"#)?;

    let args = vec![
        "--config".to_string(),
        path.display().to_string(),
        "--max-frames".to_string(),
        "5".to_string(),
        "--immediate".to_string(),
    ];
    let cfg = parse_args(args)?;
    assert_eq!(cfg.asset_root, "packs/base");
    assert_eq!(cfg.frame_hz, 30);
    assert_eq!(cfg.max_frames, 5);
    assert_eq!(cfg.mode, ResolveMode::Immediate);
    assert_eq!(cfg.manifest, "manifest.json");
    Ok(())
}
