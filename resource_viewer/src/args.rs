//! Command-line parsing.

use anyhow::{bail, Context};
use resource_engine::{config::LoaderConfig, state::ResolveMode};

/// Builds the config from `--config <file>` (if given) and overlays the
/// remaining flags on top. `args` excludes the program name.
pub fn parse_args<I>(args: I) -> anyhow::Result<LoaderConfig>
where
    I: IntoIterator<Item = String>,
{
    let args: Vec<String> = args.into_iter().collect();

    let mut cfg = match args.iter().position(|arg| arg == "--config") {
        Some(i) => {
            let Some(path) = args.get(i + 1) else {
                bail!("--config needs a path");
            };
            LoaderConfig::from_path(path)?
        }
        None => LoaderConfig::default(),
    };

    let mut i = 0;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--config", Some(_)) => i += 2,
            ("--asset-root", Some(value)) => {
                cfg.asset_root = value.clone();
                i += 2;
            }
            ("--manifest", Some(value)) => {
                cfg.manifest = value.clone();
                i += 2;
            }
            ("--frame-hz", Some(value)) => {
                cfg.frame_hz = value.parse().context("--frame-hz")?;
                i += 2;
            }
            ("--max-frames", Some(value)) => {
                cfg.max_frames = value.parse().context("--max-frames")?;
                i += 2;
            }
            ("--immediate", _) => {
                cfg.mode = ResolveMode::Immediate;
                i += 1;
            }
            (other, _) => bail!("unexpected argument '{}'", other),
        }
    }

    if cfg.frame_hz == 0 {
        bail!("frame rate must be positive");
    }
    Ok(cfg)
}
