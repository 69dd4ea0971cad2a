use geo::{Coord, MapCoords, Polygon};
#[cfg(feature = "proj")]
use proj::Proj;

use crate::collect::global_variables::WGS84_EPSG;
use crate::error::ConvertError;

/// CRS handling shared by readers and writers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoCore {
    /// EPSG code of the coordinates
    pub epsg: u32,
}

impl GeoCore {
    /// CRS identified by an EPSG code
    ///
    /// The code is not checked against a registry; an unknown code only
    /// fails once a reprojection is attempted.
    pub fn new(epsg: u32) -> Self {
        GeoCore { epsg }
    }

    /// WGS 84 (lon/lat degrees)
    pub fn wgs84() -> Self {
        GeoCore::new(WGS84_EPSG)
    }

    /// Get the EPSG code
    ///
    /// Readers fill it from the file or an override; footprints end in 4326.
    pub fn get_epsg(&self) -> u32 {
        self.epsg
    }

    /// Set the EPSG code
    ///
    /// Only relabels the CRS; coordinates are not reprojected.
    pub fn set_epsg(&mut self, epsg: u32) {
        self.epsg = epsg;
    }

    /// True for EPSG:4326, the output CRS of every conversion
    pub fn is_wgs84(&self) -> bool {
        self.epsg == WGS84_EPSG
    }

    /// Parse an EPSG code out of a CRS name
    ///
    /// Accepts `EPSG:2154`, `epsg:2154`, `urn:ogc:def:crs:EPSG::2154`,
    /// `urn:ogc:def:crs:EPSG:9.8:2154` and the CRS84 URN, which maps to 4326.
    pub fn epsg_from_name(name: &str) -> Option<u32> {
        let trimmed = name.trim();
        if trimmed.ends_with("CRS84") {
            return Some(WGS84_EPSG);
        }
        let upper = trimmed.to_uppercase();
        if !upper.contains("EPSG") {
            return None;
        }
        upper.rsplit(':').next()?.parse().ok()
    }

    /// Build a reprojector from this CRS to `to`
    pub fn reprojector(&self, to: GeoCore) -> Result<Reprojector, ConvertError> {
        Reprojector::new(self.epsg, to.epsg)
    }

    /// Transform coordinates from one CRS to another
    pub fn transform_coords(
        from_epsg: u32,
        to_epsg: u32,
        x: f64,
        y: f64,
    ) -> Result<(f64, f64), ConvertError> {
        let reprojector = Reprojector::new(from_epsg, to_epsg)?;
        let c = reprojector.transform_coord(Coord { x, y })?;
        Ok((c.x, c.y))
    }
}

impl Default for GeoCore {
    fn default() -> Self {
        GeoCore::wgs84()
    }
}

/// Coordinate transformation between two EPSG codes
///
/// Output axis order is always easting/longitude first.
pub struct Reprojector {
    from: u32,
    to: u32,
    #[cfg(feature = "proj")]
    proj: Option<Proj>,
}

impl Reprojector {
    /// Transformation from `from` to `to`
    ///
    /// Equal codes give an identity that never calls proj. Other pairs fail
    /// with `Reprojection` when proj rejects them, or with
    /// `ReprojectionUnavailable` when built without the `proj` feature.
    pub fn new(from: u32, to: u32) -> Result<Self, ConvertError> {
        if from == to {
            return Ok(Self::identity(from));
        }

        Self::open(from, to)
    }

    #[cfg(feature = "proj")]
    fn open(from: u32, to: u32) -> Result<Self, ConvertError> {
        let proj = Proj::new_known_crs(&format!("EPSG:{}", from), &format!("EPSG:{}", to), None)
            .map_err(|e| ConvertError::Reprojection {
                from,
                to,
                reason: e.to_string(),
            })?;
        Ok(Reprojector {
            from,
            to,
            proj: Some(proj),
        })
    }

    #[cfg(not(feature = "proj"))]
    fn open(from: u32, _to: u32) -> Result<Self, ConvertError> {
        Err(ConvertError::ReprojectionUnavailable(from))
    }

    fn identity(epsg: u32) -> Self {
        Reprojector {
            from: epsg,
            to: epsg,
            #[cfg(feature = "proj")]
            proj: None,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    /// Transform one (x, y) coordinate
    pub fn transform_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>, ConvertError> {
        #[cfg(feature = "proj")]
        if let Some(proj) = &self.proj {
            let (x, y) = proj
                .convert((coord.x, coord.y))
                .map_err(|e| ConvertError::Reprojection {
                    from: self.from,
                    to: self.to,
                    reason: e.to_string(),
                })?;
            return Ok(Coord { x, y });
        }
        Ok(coord)
    }

    /// Transform every vertex of the exterior and interior rings
    pub fn transform_polygon(&self, polygon: &Polygon<f64>) -> Result<Polygon<f64>, ConvertError> {
        if self.is_identity() {
            return Ok(polygon.clone());
        }
        polygon.try_map_coords(|c| self.transform_coord(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_geo_core_default() {
        let gc = GeoCore::default();
        assert_eq!(gc.get_epsg(), 4326);
        assert!(gc.is_wgs84());
    }

    #[test]
    fn test_set_epsg_relabels() {
        let mut gc = GeoCore::new(2154);
        assert!(!gc.is_wgs84());
        gc.set_epsg(4326);
        assert_eq!(gc.get_epsg(), 4326);
        assert!(gc.is_wgs84());
    }

    #[test]
    fn test_epsg_from_name() {
        assert_eq!(GeoCore::epsg_from_name("EPSG:2154"), Some(2154));
        assert_eq!(GeoCore::epsg_from_name("epsg:3857"), Some(3857));
        assert_eq!(GeoCore::epsg_from_name("urn:ogc:def:crs:EPSG::32631"), Some(32631));
        assert_eq!(GeoCore::epsg_from_name("urn:ogc:def:crs:OGC:1.3:CRS84"), Some(4326));
        assert_eq!(GeoCore::epsg_from_name("LOCAL_CS"), None);
    }

    #[test]
    fn test_identity_reprojection() {
        let poly = polygon![
            (x: 2.0, y: 48.0),
            (x: 2.1, y: 48.0),
            (x: 2.1, y: 48.1),
            (x: 2.0, y: 48.0),
        ];
        let reprojector = GeoCore::wgs84().reprojector(GeoCore::wgs84()).unwrap();
        assert!(reprojector.is_identity());
        assert_eq!(reprojector.transform_polygon(&poly).unwrap(), poly);
    }

    #[cfg(feature = "proj")]
    #[test]
    fn test_transform_coords() {
        // Depends on proj data being installed
        let result = GeoCore::transform_coords(3857, 4326, 0.0, 0.0);
        if let Ok((x, y)) = result {
            assert!(x.abs() < 1e-9);
            assert!(y.abs() < 1e-9);
        }
    }

    #[cfg(not(feature = "proj"))]
    #[test]
    fn test_reprojection_unavailable() {
        let err = GeoCore::transform_coords(2154, 4326, 0.0, 0.0).unwrap_err();
        assert!(matches!(err, ConvertError::ReprojectionUnavailable(2154)));
    }
}
