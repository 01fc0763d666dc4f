//! Built-in watsonx.ai region presets.
//!
//! Users name a region in their config (or `WATSONX_REGION`) and the preset
//! supplies the regional API host.

#[derive(Debug, Clone)]
pub struct RegionPreset {
    pub name: &'static str,
    pub base_url: &'static str,
}

const REGIONS: &[RegionPreset] = &[
    RegionPreset {
        name: "us-south",
        base_url: "https://us-south.ml.cloud.ibm.com",
    },
    RegionPreset {
        name: "eu-gb",
        base_url: "https://eu-gb.ml.cloud.ibm.com",
    },
    RegionPreset {
        name: "jp-tok",
        base_url: "https://jp-tok.ml.cloud.ibm.com",
    },
    RegionPreset {
        name: "eu-de",
        base_url: "https://eu-de.ml.cloud.ibm.com",
    },
];

impl RegionPreset {
    #[must_use]
    pub fn from_name(name: &str) -> Option<&'static RegionPreset> {
        let wanted = name.trim().to_lowercase();
        REGIONS.iter().find(|r| r.name == wanted)
    }

    #[must_use]
    pub fn all() -> &'static [RegionPreset] {
        REGIONS
    }

    /// Comma-separated list of region names, for error messages.
    #[must_use]
    pub fn names() -> String {
        REGIONS
            .iter()
            .map(|r| r.name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
