use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::collect::global_variables::{DEFAULT_FILENAME, DEFAULT_OUTPUT_PATH};
use crate::commons::units::ZUnit;
use crate::error::ConvertError;

/// File format used when the converted footprints are saved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    #[default]
    GeoJson,
    Shapefile,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::GeoJson => "geojson",
            OutputFormat::Shapefile => "shp",
        }
    }

    /// File extension, identical to the option value
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl FromStr for OutputFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "geojson" => Ok(OutputFormat::GeoJson),
            "shp" => Ok(OutputFormat::Shapefile),
            other => Err(ConvertError::InvalidFormat(other.to_string())),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = ConvertError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OutputFormat> for String {
    fn from(format: OutputFormat) -> Self {
        format.as_str().to_string()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options of a Multipatch conversion
///
/// Missing keys in a JSON config fall back to the defaults:
/// meters, absolute heights, in-memory result, `./output.geojson`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Height unit of the input Z coordinates
    pub z_unit_in: ZUnit,
    /// Subtract each feature's minimum Z from its heights
    pub relative_h: bool,
    /// Persist the result instead of returning it
    pub save: bool,
    /// Directory prefix, concatenated as-is with `filename`
    pub path: String,
    pub filename: String,
    pub out_format: OutputFormat,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            z_unit_in: ZUnit::Meters,
            relative_h: false,
            save: false,
            path: DEFAULT_OUTPUT_PATH.to_string(),
            filename: DEFAULT_FILENAME.to_string(),
            out_format: OutputFormat::GeoJson,
        }
    }
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Set the height unit from its string form (`m` or `ft`)
    pub fn set_z_unit_in(&mut self, unit: &str) -> Result<(), ConvertError> {
        self.z_unit_in = unit.parse()?;
        Ok(())
    }

    /// Set the output format from its string form (`geojson` or `shp`)
    pub fn set_out_format(&mut self, format: &str) -> Result<(), ConvertError> {
        self.out_format = format.parse()?;
        Ok(())
    }

    pub fn with_relative_h(mut self, relative_h: bool) -> Self {
        self.relative_h = relative_h;
        self
    }

    pub fn with_save(mut self, save: bool) -> Self {
        self.save = save;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Output file path: `{path}{filename}.{ext}`
    pub fn output_file(&self) -> PathBuf {
        PathBuf::from(format!(
            "{}{}.{}",
            self.path,
            self.filename,
            self.out_format.extension()
        ))
    }
}
