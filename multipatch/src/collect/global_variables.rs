/// Default directory prefix for saved output, concatenated with the filename
pub const DEFAULT_OUTPUT_PATH: &str = "./";

/// Default output file stem
pub const DEFAULT_FILENAME: &str = "output";

/// EPSG code of WGS 84, the only CRS GeoJSON output may use (RFC 7946)
pub const WGS84_EPSG: u32 = 4326;

/// Name of the attribute carrying the extracted height
pub const HEIGHT_FIELD: &str = "height";
