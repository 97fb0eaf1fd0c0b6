use anyhow::{anyhow, bail, Context, Result};
use exswap::gl::{QuirkTable, TilingQuirk, SHARED_CONTEXT_VERSION};
use tracing_subscriber::EnvFilter;

use crate::cli::{parse_gl_version, ProbeArgs, PumpArgs};
use crate::config::{FileConfig, ProbeSection, PumpSection};
use crate::paths::AppPaths;
use crate::probe::ProbeSettings;
use crate::pump::{frame_interval, PumpSettings};

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 360;
const DEFAULT_FPS: f32 = 120.0;
const DEFAULT_CONSUMER_FPS: f32 = 60.0;
const DEFAULT_FRAMES: u64 = 240;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn load_config(paths: &AppPaths) -> Result<FileConfig> {
    FileConfig::load(paths.config_file(), paths.is_explicit()).with_context(|| {
        format!(
            "failed to load configuration from {}",
            paths.config_file().display()
        )
    })
}

/// Command-line flags over file values over built-in defaults.
pub fn pump_settings(args: &PumpArgs, file: &PumpSection) -> Result<PumpSettings> {
    let mut frames = args.frames.or(file.frames);
    let duration = args.duration.or(file.duration);
    if frames.is_none() && duration.is_none() {
        frames = Some(DEFAULT_FRAMES);
    }

    let settings = PumpSettings {
        width: args.width.or(file.width).unwrap_or(DEFAULT_WIDTH),
        height: args.height.or(file.height).unwrap_or(DEFAULT_HEIGHT),
        fps: args.fps.or(file.fps).unwrap_or(DEFAULT_FPS),
        consumer_fps: args
            .consumer_fps
            .or(file.consumer_fps)
            .unwrap_or(DEFAULT_CONSUMER_FPS),
        frames,
        duration,
    };

    if settings.width == 0 || settings.height == 0 {
        bail!(
            "frame size {}x{} must be non-zero",
            settings.width,
            settings.height
        );
    }
    for (name, fps) in [("fps", settings.fps), ("consumer fps", settings.consumer_fps)] {
        if let Err(err) = frame_interval(fps) {
            bail!("invalid {name}: {err}");
        }
    }
    Ok(settings)
}

/// Quirks from the command line come first, then the file's, then the
/// built-in table; the first match wins.
pub fn probe_settings(args: &ProbeArgs, file: &ProbeSection) -> Result<ProbeSettings> {
    let gl_version = match (args.gl_version, file.gl_version.as_deref()) {
        (Some(version), _) => version,
        (None, Some(raw)) => parse_gl_version(raw)
            .map_err(|err| anyhow!(err))
            .context("invalid probe.gl_version in configuration")?,
        (None, None) => SHARED_CONTEXT_VERSION,
    };

    let mut quirks = QuirkTable::empty();
    for quirk in &args.quirks {
        quirks = quirks.with(quirk.clone());
    }
    for (vendor, tiling) in &file.quirks {
        quirks = quirks.with(TilingQuirk::new(vendor.as_str(), *tiling, "configuration file"));
    }
    for quirk in QuirkTable::builtin().entries() {
        quirks = quirks.with(quirk.clone());
    }

    Ok(ProbeSettings { gl_version, quirks })
}
