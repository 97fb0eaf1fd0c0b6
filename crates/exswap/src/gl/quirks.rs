use super::negotiate::TilingMode;

/// Forces a tiling mode on drivers whose vendor string contains `vendor`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TilingQuirk {
    pub vendor: String,
    pub tiling: TilingMode,
    pub note: String,
}

impl TilingQuirk {
    pub fn new(vendor: impl Into<String>, tiling: TilingMode, note: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            tiling,
            note: note.into(),
        }
    }

    fn matches(&self, vendor: &str) -> bool {
        !self.vendor.is_empty() && vendor.contains(&self.vendor)
    }
}

/// Vendor overrides consulted once during negotiation. First match wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuirkTable {
    entries: Vec<TilingQuirk>,
}

impl QuirkTable {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Known driver defects.
    pub fn builtin() -> Self {
        Self {
            entries: vec![TilingQuirk::new(
                "AMD",
                TilingMode::Linear,
                "optimal-tiled imports sample garbage (mesa#2456)",
            )],
        }
    }

    pub fn with(mut self, quirk: TilingQuirk) -> Self {
        self.entries.push(quirk);
        self
    }

    pub fn entries(&self) -> &[TilingQuirk] {
        &self.entries
    }

    pub fn lookup(&self, vendor: &str) -> Option<&TilingQuirk> {
        self.entries.iter().find(|quirk| quirk.matches(vendor))
    }
}

impl Default for QuirkTable {
    fn default() -> Self {
        Self::builtin()
    }
}
