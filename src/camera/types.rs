use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which physical camera is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LensFacing {
    Front,
    #[default]
    Back,
}

impl LensFacing {
    /// The opposite lens
    pub fn flipped(self) -> Self {
        match self {
            LensFacing::Front => LensFacing::Back,
            LensFacing::Back => LensFacing::Front,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LensFacing::Front => "front",
            LensFacing::Back => "back",
        }
    }
}

impl fmt::Display for LensFacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LensFacing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" => Ok(LensFacing::Front),
            "back" | "rear" => Ok(LensFacing::Back),
            other => Err(format!("unknown lens facing '{}'", other)),
        }
    }
}

/// Static description of an opened camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub lens_facing: LensFacing,
    pub name: String,
    pub resolution: (u32, u32),
    pub has_flash_unit: bool,
}
