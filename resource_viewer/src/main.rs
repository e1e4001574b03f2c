//! Standalone viewer binary.
//!
//! Usage:
//!   cargo run -p resource_viewer -- [--config viewer.json] [--asset-root assets]
//!       [--manifest manifest.json] [--frame-hz 60] [--max-frames 600] [--immediate]
//!
//! Registers every resource in the manifest, requests all of them, then drains
//! the loader once per frame until everything is ready or failed and prints
//! a status table. Exits with an error if anything failed.

use anyhow::bail;
use resource_viewer::{args::parse_args, FrameDriver};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args(std::env::args().skip(1))?;
    info!(
        asset_root = %cfg.asset_root,
        manifest = %cfg.manifest,
        frame_hz = cfg.frame_hz,
        mode = ?cfg.mode,
        "Starting viewer"
    );

    let mut driver = FrameDriver::from_config(&cfg)?;
    driver.request_all(cfg.mode);

    driver.run_until_settled(cfg.frame_hz, cfg.max_frames).await;

    for line in driver.status_lines() {
        println!("{line}");
    }

    let stats = driver.stats();
    let failed = driver.failed().count();
    info!(
        frames = driver.frame(),
        constructed = stats.constructed,
        loaded = stats.loaded,
        failed,
        "Viewer finished"
    );

    if !driver.is_settled() {
        bail!("resources still loading after {} frames", driver.frame());
    }
    if failed > 0 {
        bail!("{} resource(s) failed", failed);
    }
    Ok(())
}
