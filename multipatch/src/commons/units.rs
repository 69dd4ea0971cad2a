use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConvertError;

/// International foot, in meters
pub const FEET_TO_METERS: f64 = 0.3048;

/// Height unit of the input Z coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ZUnit {
    #[default]
    Meters,
    Feet,
}

impl ZUnit {
    /// Starting value of the per-feature minimum height search
    pub fn min_height_seed(&self) -> f64 {
        match self {
            ZUnit::Meters => 9000.0,
            ZUnit::Feet => 30000.0,
        }
    }

    /// Convert a height expressed in this unit into meters
    pub fn to_meters(&self, value: f64) -> f64 {
        match self {
            ZUnit::Meters => value,
            ZUnit::Feet => value * FEET_TO_METERS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ZUnit::Meters => "m",
            ZUnit::Feet => "ft",
        }
    }
}

impl FromStr for ZUnit {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "m" => Ok(ZUnit::Meters),
            "ft" => Ok(ZUnit::Feet),
            other => Err(ConvertError::InvalidUnits(other.to_string())),
        }
    }
}

impl TryFrom<String> for ZUnit {
    type Error = ConvertError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ZUnit> for String {
    fn from(unit: ZUnit) -> Self {
        unit.as_str().to_string()
    }
}

impl fmt::Display for ZUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
