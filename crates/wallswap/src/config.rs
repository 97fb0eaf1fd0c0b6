use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use exswap::TilingMode;
use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::pump::frame_interval;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Contents of `wallswap.toml`. Every field is optional; command-line flags
/// take precedence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub pump: PumpSection,
    pub probe: ProbeSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PumpSection {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f32>,
    pub consumer_fps: Option<f32>,
    pub frames: Option<u64>,
    #[serde(deserialize_with = "deserialize_duration_opt")]
    pub duration: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeSection {
    pub gl_version: Option<String>,
    /// Vendor substring → tiling mode.
    #[serde(deserialize_with = "deserialize_quirks")]
    pub quirks: BTreeMap<String, TilingMode>,
}

impl FileConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: FileConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, or returns defaults when it does not exist and
    /// `required` is false.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !required => {
                tracing::debug!(path = %path.display(), "no configuration file");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pump.width == Some(0) || self.pump.height == Some(0) {
            return Err(ConfigError::Invalid(
                "pump.width and pump.height must be greater than zero".into(),
            ));
        }
        for (name, fps) in [("pump.fps", self.pump.fps), ("pump.consumer_fps", self.pump.consumer_fps)] {
            if let Some(fps) = fps {
                frame_interval(fps).map_err(|err| ConfigError::Invalid(format!("{name}: {err}")))?;
            }
        }
        if self.probe.quirks.keys().any(|vendor| vendor.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "probe.quirks vendor names must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn deserialize_quirks<'de, D>(deserializer: D) -> Result<BTreeMap<String, TilingMode>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(vendor, tiling)| {
            tiling
                .parse()
                .map(|tiling| (vendor, tiling))
                .map_err(de::Error::custom)
        })
        .collect()
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Duration::try_from_secs_f64(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }
    }

    deserializer.deserialize_any(Visitor)
}
