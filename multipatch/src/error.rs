use thiserror::Error;

/// Failures raised while converting Multipatch features into footprints
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Height unit other than `m` or `ft`
    #[error("wrongUnits: invalid height unit '{0}', choose either 'm' for meters or 'ft' for feet")]
    InvalidUnits(String),

    /// Output format other than `geojson` or `shp`
    #[error("wrongFormat: invalid output format '{0}', choose either 'geojson' or 'shp'")]
    InvalidFormat(String),

    /// A position without a Z coordinate
    #[error("feature {feature}: position {position:?} has no Z coordinate")]
    MissingZ { feature: usize, position: Vec<f64> },

    #[error("feature {feature}: {reason}")]
    MalformedGeometry { feature: usize, reason: String },

    #[error("feature {feature}: unsupported geometry type '{kind}'")]
    UnsupportedGeometry { feature: usize, kind: String },

    /// Input carries no CRS, so it cannot be reprojected to EPSG:4326
    #[error("input has no coordinate reference system")]
    MissingCrs,

    #[error("failed to reproject from EPSG:{from} to EPSG:{to}: {reason}")]
    Reprojection { from: u32, to: u32, reason: String },

    #[error("reprojection from EPSG:{0} requires the 'proj' feature")]
    ReprojectionUnavailable(u32),

    #[error("Shapefile support requires the 'gdal' feature")]
    ShapefileUnavailable,
}
