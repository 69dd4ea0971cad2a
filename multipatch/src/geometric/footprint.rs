use anyhow::{Context, Result};
use geo::Polygon;
use geojson::{feature::Id, Feature, FeatureCollection, GeoJson, Geometry, JsonObject, JsonValue, Value};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::collect::global_variables::HEIGHT_FIELD;
use crate::commons::options::OutputFormat;
use crate::error::ConvertError;
use crate::geo_core::GeoCore;
use crate::geometric::shapefile;

/// Flat building part: 2D polygon plus a height in meters
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    pub polygon: Polygon<f64>,
    pub height: f64,
    /// Attributes copied from the source feature, `height` excluded
    pub properties: JsonObject,
}

impl Footprint {
    pub fn new(polygon: Polygon<f64>, height: f64, mut properties: JsonObject) -> Self {
        properties.remove(HEIGHT_FIELD);
        Footprint {
            polygon,
            height,
            properties,
        }
    }

    /// GeoJSON feature with `height` added to the copied attributes
    pub fn to_geojson_feature(&self, id: usize) -> Feature {
        let mut properties = self.properties.clone();
        properties.insert(HEIGHT_FIELD.to_string(), json!(self.height));

        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::from(&self.polygon))),
            id: Some(Id::Number(id.into())),
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Footprints sharing one CRS
#[derive(Debug, Clone)]
pub struct FootprintCollection {
    pub footprints: Vec<Footprint>,
    pub geo_core: GeoCore,
}

impl FootprintCollection {
    pub fn new(footprints: Vec<Footprint>, geo_core: GeoCore) -> Self {
        FootprintCollection {
            footprints,
            geo_core,
        }
    }

    pub fn len(&self) -> usize {
        self.footprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.footprints.is_empty()
    }

    /// Footprints in output order: feature order, then part order
    pub fn iter(&self) -> impl Iterator<Item = &Footprint> {
        self.footprints.iter()
    }

    /// Tallest footprint height, `None` when empty
    pub fn max_height(&self) -> Option<f64> {
        self.iter().map(|f| f.height).reduce(f64::max)
    }

    pub fn min_height(&self) -> Option<f64> {
        self.iter().map(|f| f.height).reduce(f64::min)
    }

    /// Reproject every polygon into `target`
    pub fn to_crs(&self, target: GeoCore) -> Result<Self, ConvertError> {
        let reprojector = self.geo_core.reprojector(target)?;
        if reprojector.is_identity() {
            return Ok(self.clone());
        }

        let footprints = self
            .footprints
            .iter()
            .map(|f| {
                Ok(Footprint {
                    polygon: reprojector.transform_polygon(&f.polygon)?,
                    height: f.height,
                    properties: f.properties.clone(),
                })
            })
            .collect::<Result<Vec<_>, ConvertError>>()?;

        Ok(FootprintCollection::new(footprints, target))
    }

    /// Name of the CRS written into the legacy GeoJSON `crs` member
    fn crs_name(&self) -> String {
        if self.geo_core.is_wgs84() {
            "urn:ogc:def:crs:OGC:1.3:CRS84".to_string()
        } else {
            format!("urn:ogc:def:crs:EPSG::{}", self.geo_core.get_epsg())
        }
    }

    /// GeoJSON FeatureCollection of the footprints
    ///
    /// Each feature carries its copied attributes plus `height`, and an id
    /// equal to its position. The collection gets a legacy `crs` member
    /// naming its EPSG code, or the CRS84 URN for EPSG:4326.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .footprints
            .iter()
            .enumerate()
            .map(|(i, f)| f.to_geojson_feature(i))
            .collect();

        let mut foreign_members = JsonObject::new();
        foreign_members.insert(
            "crs".to_string(),
            json!({"type": "name", "properties": {"name": self.crs_name()}}),
        );

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(foreign_members),
        }
    }

    /// Same as `to_feature_collection`, wrapped for serialization
    pub fn to_geojson(&self) -> GeoJson {
        GeoJson::FeatureCollection(self.to_feature_collection())
    }

    /// Write a GeoJSON file; the file stem becomes the collection `name`
    pub fn to_geojson_file<P: AsRef<Path>>(&self, filepath: P) -> Result<()> {
        let filepath = filepath.as_ref();
        let mut fc = self.to_feature_collection();
        if let Some(stem) = filepath.file_stem().and_then(|s| s.to_str()) {
            fc.foreign_members
                .get_or_insert_with(JsonObject::new)
                .insert("name".to_string(), JsonValue::from(stem));
        }

        let geojson_str = GeoJson::FeatureCollection(fc).to_string();
        std::fs::write(filepath, geojson_str)
            .with_context(|| format!("Failed to write GeoJSON file: {:?}", filepath))?;
        Ok(())
    }

    /// Write an ESRI Shapefile (needs the `gdal` feature)
    pub fn to_shapefile<P: AsRef<Path>>(&self, filepath: P) -> Result<()> {
        shapefile::write_footprints(self, filepath.as_ref())
    }

    /// Save in `format` at `filepath`, returning the written path
    pub fn save(&self, filepath: &Path, format: OutputFormat) -> Result<PathBuf> {
        match format {
            OutputFormat::GeoJson => self.to_geojson_file(filepath)?,
            OutputFormat::Shapefile => self.to_shapefile(filepath)?,
        }
        info!("{} footprint(s) saved to: {:?}", self.len(), filepath);
        Ok(filepath.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn sample() -> FootprintCollection {
        let mut properties = JsonObject::new();
        properties.insert("name".to_string(), json!("tower"));
        properties.insert("height".to_string(), json!(999));

        let poly1 = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ];
        let poly2 = polygon![
            (x: 2.0, y: 0.0),
            (x: 3.0, y: 0.0),
            (x: 3.0, y: 1.0),
            (x: 2.0, y: 0.0),
        ];
        FootprintCollection::new(
            vec![
                Footprint::new(poly1, 10.0, properties.clone()),
                Footprint::new(poly2, 4.5, properties),
            ],
            GeoCore::wgs84(),
        )
    }

    #[test]
    fn test_height_overrides_property() {
        let collection = sample();
        assert!(!collection.footprints[0].properties.contains_key("height"));

        let feature = collection.footprints[0].to_geojson_feature(0);
        let props = feature.properties.unwrap();
        assert_eq!(props["height"], json!(10.0));
        assert_eq!(props["name"], json!("tower"));
    }

    #[test]
    fn test_min_max_height() {
        let collection = sample();
        assert_eq!(collection.max_height(), Some(10.0));
        assert_eq!(collection.min_height(), Some(4.5));

        let empty = FootprintCollection::new(vec![], GeoCore::wgs84());
        assert!(empty.is_empty());
        assert_eq!(empty.max_height(), None);
    }

    #[test]
    fn test_feature_collection() {
        let fc = sample().to_feature_collection();
        assert_eq!(fc.features.len(), 2);
        assert_eq!(fc.features[1].id, Some(Id::Number(1usize.into())));

        let members = fc.foreign_members.unwrap();
        assert_eq!(members["crs"]["properties"]["name"], json!("urn:ogc:def:crs:OGC:1.3:CRS84"));
    }

    #[test]
    fn test_to_geojson_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buildings.geojson");
        sample().to_geojson_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let geojson: GeoJson = content.parse().unwrap();
        match geojson {
            GeoJson::FeatureCollection(fc) => {
                assert_eq!(fc.features.len(), 2);
                assert_eq!(fc.foreign_members.unwrap()["name"], json!("buildings"));
            }
            _ => panic!("expected a FeatureCollection"),
        }
    }

    #[test]
    fn test_to_crs_identity() {
        let collection = sample();
        let same = collection.to_crs(GeoCore::wgs84()).unwrap();
        assert_eq!(same.footprints, collection.footprints);
    }
}
