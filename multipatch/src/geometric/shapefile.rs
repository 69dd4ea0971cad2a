//! ESRI Shapefile output through GDAL's "ESRI Shapefile" driver

use anyhow::Result;
use std::path::Path;

use crate::geometric::footprint::FootprintCollection;

/// Column type derived from the values of one attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Real,
    Text,
}

impl FieldKind {
    /// Widen this kind so that it also holds `value`; nulls leave it unchanged
    fn widen(current: Option<FieldKind>, value: &serde_json::Value) -> Option<FieldKind> {
        use serde_json::Value;

        let kind = match value {
            Value::Null => return current,
            Value::Number(n) if n.is_i64() => FieldKind::Integer,
            Value::Number(_) => FieldKind::Real,
            _ => FieldKind::Text,
        };
        Some(match (current, kind) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(FieldKind::Integer), FieldKind::Real) | (Some(FieldKind::Real), FieldKind::Integer) => {
                FieldKind::Real
            }
            _ => FieldKind::Text,
        })
    }
}

/// Attribute columns in first-seen order, typed from every footprint's values
pub fn field_schema(collection: &FootprintCollection) -> Vec<(String, FieldKind)> {
    let mut schema: Vec<(String, Option<FieldKind>)> = Vec::new();
    for footprint in collection.iter() {
        for (key, value) in &footprint.properties {
            match schema.iter_mut().find(|(name, _)| name == key) {
                Some((_, kind)) => *kind = FieldKind::widen(*kind, value),
                None => schema.push((key.clone(), FieldKind::widen(None, value))),
            }
        }
    }
    schema
        .into_iter()
        .map(|(name, kind)| (name, kind.unwrap_or(FieldKind::Text)))
        .collect()
}

#[cfg(feature = "gdal")]
pub fn write_footprints(collection: &FootprintCollection, filepath: &Path) -> Result<()> {
    use anyhow::Context;
    use gdal::spatial_ref::SpatialRef;
    use gdal::vector::{
        Feature, FieldValue, LayerAccess, LayerOptions, OGRFieldType, OGRwkbGeometryType, ToGdal,
    };
    use gdal::DriverManager;
    use serde_json::Value;

    use crate::collect::global_variables::HEIGHT_FIELD;

    // The driver refuses to overwrite, so drop every sidecar of a previous run
    for ext in ["shp", "shx", "dbf", "prj", "cpg"] {
        let sidecar = filepath.with_extension(ext);
        if sidecar.exists() {
            std::fs::remove_file(&sidecar)
                .with_context(|| format!("Failed to remove existing file: {:?}", sidecar))?;
        }
    }

    if let Some(parent) = filepath.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }

    let driver =
        DriverManager::get_driver_by_name("ESRI Shapefile").context("ESRI Shapefile driver not available")?;
    let mut dataset = driver
        .create_vector_only(filepath)
        .with_context(|| format!("Failed to create Shapefile: {:?}", filepath))?;

    let srs = SpatialRef::from_epsg(collection.geo_core.get_epsg())
        .context("Failed to create spatial reference")?;
    let layer_name = filepath
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("footprints");

    let layer = dataset
        .create_layer(LayerOptions {
            name: layer_name,
            srs: Some(&srs),
            ty: OGRwkbGeometryType::wkbPolygon,
            options: Some(&["ENCODING=UTF-8"]),
        })
        .context("Failed to create layer")?;

    let schema = field_schema(collection);
    let mut field_defs: Vec<(&str, OGRFieldType::Type)> = schema
        .iter()
        .map(|(name, kind)| {
            let ty = match kind {
                FieldKind::Integer => OGRFieldType::OFTInteger64,
                FieldKind::Real => OGRFieldType::OFTReal,
                FieldKind::Text => OGRFieldType::OFTString,
            };
            (name.as_str(), ty)
        })
        .collect();
    field_defs.push((HEIGHT_FIELD, OGRFieldType::OFTReal));
    layer
        .create_defn_fields(&field_defs)
        .context("Failed to create attribute fields")?;

    // Fields are addressed by position: the driver truncates names to 10 characters
    for footprint in collection.iter() {
        let geometry = footprint
            .polygon
            .to_gdal()
            .context("Failed to convert polygon to GDAL geometry")?;

        let mut feature = Feature::new(layer.defn()).context("Failed to create feature")?;
        feature
            .set_geometry(geometry)
            .context("Failed to set geometry")?;

        for (idx, (name, kind)) in schema.iter().enumerate() {
            let value = match footprint.properties.get(name) {
                None | Some(Value::Null) => continue,
                Some(v) => v,
            };
            let field_value = match (kind, value) {
                (FieldKind::Integer, Value::Number(n)) => match n.as_i64() {
                    Some(i) => FieldValue::Integer64Value(i),
                    None => continue,
                },
                (FieldKind::Real, Value::Number(n)) => match n.as_f64() {
                    Some(f) => FieldValue::RealValue(f),
                    None => continue,
                },
                (_, Value::String(s)) => FieldValue::StringValue(s.clone()),
                (_, other) => FieldValue::StringValue(other.to_string()),
            };
            feature
                .set_field(idx, &field_value)
                .with_context(|| format!("Failed to set field {}", name))?;
        }
        feature
            .set_field(schema.len(), &FieldValue::RealValue(footprint.height))
            .context("Failed to set height field")?;

        feature.create(&layer).context("Failed to write feature")?;
    }

    Ok(())
}

#[cfg(not(feature = "gdal"))]
pub fn write_footprints(_collection: &FootprintCollection, _filepath: &Path) -> Result<()> {
    Err(crate::error::ConvertError::ShapefileUnavailable.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_core::GeoCore;
    use crate::geometric::footprint::Footprint;
    use geo::polygon;
    use geojson::JsonObject;
    use serde_json::json;

    fn footprint(properties: serde_json::Value, height: f64) -> Footprint {
        let poly = polygon![
            (x: 2.0, y: 48.0),
            (x: 2.001, y: 48.0),
            (x: 2.001, y: 48.001),
            (x: 2.0, y: 48.0),
        ];
        let properties: JsonObject = serde_json::from_value(properties).unwrap();
        Footprint::new(poly, height, properties)
    }

    #[test]
    fn test_field_schema() {
        let collection = FootprintCollection::new(
            vec![
                footprint(json!({"id": 1, "area": 10, "name": "a", "flag": null}), 3.0),
                footprint(json!({"id": 2, "area": 12.5, "name": 5, "flag": null}), 6.0),
            ],
            GeoCore::wgs84(),
        );

        let schema = field_schema(&collection);
        assert_eq!(
            schema,
            vec![
                ("id".to_string(), FieldKind::Integer),
                ("area".to_string(), FieldKind::Real),
                ("name".to_string(), FieldKind::Text),
                ("flag".to_string(), FieldKind::Text),
            ]
        );
    }

    #[cfg(feature = "gdal")]
    #[test]
    fn test_write_shapefile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buildings.shp");
        let collection = FootprintCollection::new(
            vec![footprint(json!({"id": 1, "name": "a"}), 3.0)],
            GeoCore::wgs84(),
        );

        write_footprints(&collection, &path).unwrap();
        assert!(path.exists());
        assert!(dir.path().join("buildings.dbf").exists());

        // Overwriting an existing Shapefile succeeds
        write_footprints(&collection, &path).unwrap();
        assert!(path.exists());
    }

    #[cfg(feature = "gdal")]
    #[test]
    fn test_shapefile_long_field_names() {
        use gdal::vector::LayerAccess;
        use gdal::Dataset;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parts.shp");
        let collection = FootprintCollection::new(
            vec![footprint(json!({"Shape_Length": 40.5, "BUILDING_NAME": "Hall"}), 7.5)],
            GeoCore::wgs84(),
        );
        write_footprints(&collection, &path).unwrap();

        let dataset = Dataset::open(&path).unwrap();
        let mut layer = dataset.layer(0).unwrap();
        assert_eq!(layer.feature_count(), 1);
        assert_eq!(layer.defn().fields().count(), 3);

        let feature = layer.features().next().unwrap();
        assert_eq!(feature.field_as_double(0).unwrap(), Some(40.5));
        assert_eq!(feature.field_as_string(1).unwrap(), Some("Hall".to_string()));
        assert_eq!(feature.field_as_double(2).unwrap(), Some(7.5));
    }

    #[cfg(not(feature = "gdal"))]
    #[test]
    fn test_shapefile_unavailable() {
        let collection = FootprintCollection::new(vec![], GeoCore::wgs84());
        let err = write_footprints(&collection, Path::new("out.shp")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::error::ConvertError>(),
            Some(crate::error::ConvertError::ShapefileUnavailable)
        ));
    }
}
