use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use exswap::gl::{GlVersion, TilingQuirk};
use exswap::TilingMode;
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(
    name = "wallswap",
    author,
    version,
    about = "Probe and exercise GPU frame exchange for wallpaper renderers"
)]
pub struct Cli {
    /// Configuration file; defaults to `wallswap.toml` in the config directory.
    #[arg(long, global = true, value_name = "PATH", env = "WALLSWAP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Negotiate external memory import on a headless EGL context and report the result.
    Probe(ProbeArgs),
    /// Push frames through a triple-buffered swapchain between two threads.
    Pump(PumpArgs),
    /// Resolve user properties from a wallpaper project description.
    Props(PropsArgs),
    /// Print the resolved configuration directory and file.
    Where,
}

#[derive(Parser, Debug, Default)]
pub struct ProbeArgs {
    /// Context version to request (e.g. `3.3`, `4.6`, `es3.0`).
    #[arg(long, value_name = "VERSION", value_parser = parse_gl_version)]
    pub gl_version: Option<GlVersion>,

    /// Extra tiling quirk, checked before the built-in table (e.g. `Intel=linear`).
    #[arg(long = "quirk", value_name = "VENDOR=TILING", value_parser = parse_quirk)]
    pub quirks: Vec<TilingQuirk>,
}

#[derive(Parser, Debug, Default)]
pub struct PumpArgs {
    /// Number of frames the producer commits before stopping.
    #[arg(long, value_name = "N")]
    pub frames: Option<u64>,

    /// Stop producing after this long (e.g. `5s`, `1m`).
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Frame width in pixels.
    #[arg(long, value_name = "PIXELS")]
    pub width: Option<u32>,

    /// Frame height in pixels.
    #[arg(long, value_name = "PIXELS")]
    pub height: Option<u32>,

    /// Producer frame rate (0=uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Consumer poll rate (0=uncapped).
    #[arg(long, value_name = "FPS")]
    pub consumer_fps: Option<f32>,
}

#[derive(Parser, Debug)]
pub struct PropsArgs {
    /// Path to the project description (`project.json`).
    #[arg(value_name = "PROJECT")]
    pub project: PathBuf,

    /// Property to print; all properties are listed when omitted.
    #[arg(value_name = "NAME")]
    pub name: Option<String>,

    /// Print whether the property equals this value instead of the value itself.
    #[arg(long, value_name = "VALUE", requires = "name")]
    pub condition: Option<String>,

    /// Override a property before resolving (JSON value, e.g. `speed=2` or `style="neon"`).
    #[arg(long = "set", value_name = "NAME=JSON", value_parser = parse_override)]
    pub overrides: Vec<(String, Value)>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub(crate) fn parse_gl_version(value: &str) -> Result<GlVersion, String> {
    let trimmed = value.trim();
    let lowered = trimmed.to_ascii_lowercase();
    let parsed = match lowered.strip_prefix("es") {
        Some(rest) => GlVersion::parse(&format!("OpenGL ES {}", rest.trim())),
        None => GlVersion::parse(trimmed),
    };
    parsed.ok_or_else(|| format!("invalid GL version '{value}'; expected e.g. 4.2 or es3.0"))
}

fn parse_quirk(value: &str) -> Result<TilingQuirk, String> {
    let (vendor, tiling) = value
        .split_once('=')
        .ok_or_else(|| format!("invalid quirk '{value}'; expected VENDOR=TILING"))?;
    let vendor = vendor.trim();
    if vendor.is_empty() {
        return Err(format!("invalid quirk '{value}'; vendor must not be empty"));
    }
    let tiling: TilingMode = tiling.parse()?;
    Ok(TilingQuirk::new(vendor, tiling, "command line"))
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value.trim())
        .map_err(|err| format!("invalid duration '{value}': {err}"))
}

fn parse_override(value: &str) -> Result<(String, Value), String> {
    let (name, raw) = value
        .split_once('=')
        .ok_or_else(|| format!("invalid override '{value}'; expected NAME=JSON"))?;
    // Bare words are taken as strings so `--set style=neon` works unquoted.
    let parsed = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((name.trim().to_string(), parsed))
}
