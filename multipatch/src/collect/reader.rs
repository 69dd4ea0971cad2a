use anyhow::{Context, Result};
use geojson::{Feature, GeoJson, JsonObject};
use std::path::Path;
use tracing::{info, warn};

use crate::collect::global_variables::WGS84_EPSG;
use crate::geo_core::GeoCore;
use crate::geometric::multipatch::{MultipatchCollection, MultipatchFeature};

/// EPSG code named by a legacy GeoJSON `crs` member, if any
fn crs_member_epsg(foreign_members: Option<&JsonObject>) -> Option<u32> {
    let name = foreign_members?
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;
    GeoCore::epsg_from_name(name)
}

/// Load Multipatch features from GeoJSON text
///
/// CRS precedence: `set_crs`, then the document's `crs` member, then
/// EPSG:4326. Features without geometry are skipped.
pub fn from_geojson_str(geojson_str: &str, set_crs: Option<u32>) -> Result<MultipatchCollection> {
    let geojson: GeoJson = geojson_str.parse().context("Failed to parse GeoJSON")?;

    let (features, members): (Vec<Feature>, Option<JsonObject>) = match geojson {
        GeoJson::FeatureCollection(fc) => (fc.features, fc.foreign_members),
        GeoJson::Feature(f) => {
            let members = f.foreign_members.clone();
            (vec![f], members)
        }
        GeoJson::Geometry(_) => {
            anyhow::bail!("GeoJSON must be a Feature or FeatureCollection");
        }
    };

    let epsg = set_crs
        .or_else(|| crs_member_epsg(members.as_ref()))
        .unwrap_or(WGS84_EPSG);

    let mut collection = MultipatchCollection::new(Vec::with_capacity(features.len()), epsg);
    for (i, feature) in features.iter().enumerate() {
        if feature.geometry.is_none() {
            warn!("Skipping feature {}: no geometry", i);
            continue;
        }
        collection
            .features
            .push(MultipatchFeature::from_geojson_feature(i, feature)?);
    }

    Ok(collection)
}

pub fn from_geojson_file<P: AsRef<Path>>(path: P, set_crs: Option<u32>) -> Result<MultipatchCollection> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read GeoJSON file: {:?}", path))?;
    let collection = from_geojson_str(&content, set_crs)?;
    info!(
        "Loaded {} feature(s) from {:?} (EPSG:{})",
        collection.len(),
        path,
        collection.geo_core.map(|g| g.get_epsg()).unwrap_or(WGS84_EPSG)
    );
    Ok(collection)
}

/// JSON value of one attribute; dates become ISO 8601 strings
#[cfg(feature = "gdal")]
fn field_to_json(value: Option<gdal::vector::FieldValue>) -> geojson::JsonValue {
    use gdal::vector::FieldValue;
    use geojson::JsonValue;

    match value {
        None => JsonValue::Null,
        Some(FieldValue::IntegerValue(v)) => JsonValue::from(v),
        Some(FieldValue::Integer64Value(v)) => JsonValue::from(v),
        Some(FieldValue::RealValue(v)) => JsonValue::from(v),
        Some(FieldValue::StringValue(v)) => JsonValue::from(v),
        Some(FieldValue::IntegerListValue(v)) => JsonValue::from(v),
        Some(FieldValue::Integer64ListValue(v)) => JsonValue::from(v),
        Some(FieldValue::RealListValue(v)) => JsonValue::from(v),
        Some(FieldValue::StringListValue(v)) => JsonValue::from(v),
        Some(FieldValue::DateValue(d)) => JsonValue::from(d.format("%Y-%m-%d").to_string()),
        Some(FieldValue::DateTimeValue(dt)) => JsonValue::from(dt.to_rfc3339()),
        #[allow(unreachable_patterns)]
        Some(other) => other.into_string().map(JsonValue::from).unwrap_or(JsonValue::Null),
    }
}

/// Load a Multipatch Shapefile through GDAL
///
/// The CRS comes from `set_crs`, else the layer's spatial reference.
#[cfg(feature = "gdal")]
pub fn from_shapefile<P: AsRef<Path>>(path: P, set_crs: Option<u32>) -> Result<MultipatchCollection> {
    use gdal::vector::LayerAccess;
    use gdal::Dataset;

    let path = path.as_ref();
    let dataset = Dataset::open(path).with_context(|| format!("Failed to open Shapefile: {:?}", path))?;
    let mut layer = dataset.layer(0).context("Shapefile has no layer")?;

    let layer_epsg = layer
        .spatial_ref()
        .and_then(|srs| srs.auth_code().ok())
        .and_then(|code| u32::try_from(code).ok());

    let mut collection = MultipatchCollection {
        features: Vec::new(),
        geo_core: set_crs.or(layer_epsg).map(GeoCore::new),
    };

    for (i, feature) in layer.features().enumerate() {
        let Some(geometry) = feature.geometry() else {
            warn!("Skipping feature {}: no geometry", i);
            continue;
        };
        let geometry_json = geometry
            .json()
            .with_context(|| format!("Failed to export geometry of feature {}", i))?;
        let geometry: geojson::Geometry = serde_json::from_str(&geometry_json)
            .with_context(|| format!("Failed to parse geometry of feature {}", i))?;

        let properties: JsonObject = feature
            .fields()
            .map(|(name, value)| (name, field_to_json(value)))
            .collect();

        let feature = Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        };
        collection
            .features
            .push(MultipatchFeature::from_geojson_feature(i, &feature)?);
    }

    info!("Loaded {} feature(s) from {:?}", collection.len(), path);
    Ok(collection)
}

#[cfg(not(feature = "gdal"))]
pub fn from_shapefile<P: AsRef<Path>>(_path: P, _set_crs: Option<u32>) -> Result<MultipatchCollection> {
    Err(crate::error::ConvertError::ShapefileUnavailable.into())
}

/// Load a file, picking the reader from its extension (`.shp` or GeoJSON)
pub fn from_file<P: AsRef<Path>>(path: P, set_crs: Option<u32>) -> Result<MultipatchCollection> {
    let path = path.as_ref();
    let is_shapefile = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("shp"))
        .unwrap_or(false);

    if is_shapefile {
        from_shapefile(path, set_crs)
    } else {
        from_geojson_file(path, set_crs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commons::units::ZUnit;

    const BUILDING: &str = r#"{
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::2154"}},
        "features": [
            {
                "type": "Feature",
                "properties": {"OBJECTID": 1, "NAME": "Library"},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[0, 0, 25], [10, 0, 25], [10, 10, 25], [0, 10, 25], [0, 0, 25]]],
                        [[[0, 0, 5], [10, 0, 5], [10, 10, 5], [0, 10, 5], [0, 0, 5]]],
                        [[[0, 0, 5], [10, 0, 5], [10, 0, 25], [0, 0, 25], [0, 0, 5]]]
                    ]
                }
            },
            {"type": "Feature", "properties": {"OBJECTID": 2}, "geometry": null}
        ]
    }"#;

    #[test]
    fn test_crs_from_member() {
        let collection = from_geojson_str(BUILDING, None).unwrap();
        assert_eq!(collection.geo_core, Some(GeoCore::new(2154)));
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.features[0].patches.len(), 3);
    }

    #[test]
    fn test_crs_override_and_default() {
        let collection = from_geojson_str(BUILDING, Some(3857)).unwrap();
        assert_eq!(collection.geo_core, Some(GeoCore::new(3857)));

        let bare = r#"{"type": "FeatureCollection", "features": []}"#;
        let collection = from_geojson_str(bare, None).unwrap();
        assert_eq!(collection.geo_core, Some(GeoCore::wgs84()));
        assert!(collection.is_empty());
    }

    #[test]
    fn test_parts_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.geojson");
        std::fs::write(&path, BUILDING).unwrap();

        let collection = from_file(&path, None).unwrap();
        let footprints = collection.features[0].to_footprints(ZUnit::Meters, true);
        assert_eq!(footprints.len(), 1);
        assert_eq!(footprints[0].height, 20.0);
    }

    #[test]
    fn test_geometry_only_rejected() {
        let geometry = r#"{"type": "Point", "coordinates": [0, 0, 1]}"#;
        assert!(from_geojson_str(geometry, None).is_err());
    }

    #[cfg(feature = "gdal")]
    #[test]
    fn test_field_values_to_json() {
        use gdal::vector::FieldValue;
        use serde_json::json;

        let date = chrono::NaiveDate::from_ymd_opt(2021, 6, 30).unwrap();
        assert_eq!(field_to_json(Some(FieldValue::DateValue(date))), json!("2021-06-30"));

        let built = chrono::DateTime::parse_from_rfc3339("2021-06-30T14:05:00+02:00").unwrap();
        assert_eq!(
            field_to_json(Some(FieldValue::DateTimeValue(built))),
            json!("2021-06-30T14:05:00+02:00")
        );

        assert_eq!(field_to_json(Some(FieldValue::IntegerValue(7))), json!(7));
        assert_eq!(
            field_to_json(Some(FieldValue::StringValue("Library".to_string()))),
            json!("Library")
        );
        assert_eq!(field_to_json(None), serde_json::Value::Null);
    }

    #[test]
    fn test_properties_keep_source_order() {
        let collection = from_geojson_str(BUILDING, None).unwrap();
        let keys: Vec<&str> = collection.features[0].properties.keys().map(String::as_str).collect();
        assert_eq!(keys, ["OBJECTID", "NAME"]);
    }

    #[test]
    fn test_missing_file() {
        assert!(from_file("does/not/exist.geojson", None).is_err());
    }
}
