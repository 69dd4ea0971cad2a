use anyhow::Result;
use geo::{Coord, LineString, Polygon};
use geojson::{Feature, JsonObject, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::commons::options::ConvertOptions;
use crate::commons::units::ZUnit;
use crate::error::ConvertError;
use crate::geo_core::GeoCore;
use crate::geometric::footprint::{Footprint, FootprintCollection};

/// One (x, y, z) vertex
pub type Position3 = [f64; 3];

/// Closed sequence of 3D vertices forming one face boundary
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    pub points: Vec<Position3>,
}

impl Ring {
    pub fn new(points: Vec<Position3>) -> Self {
        Ring { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Elevation of a horizontal face, or `None` for anything else
    ///
    /// A face qualifies when it has more than 3 vertices (a closed triangle
    /// at least) and every vertex shares the same Z. Faces mixing Z values
    /// are walls.
    pub fn horizontal_z(&self) -> Option<f64> {
        if self.points.len() <= 3 {
            return None;
        }
        let z = self.points[0][2];
        self.points.iter().all(|p| p[2] == z).then_some(z)
    }

    /// Vertex sequence with Z dropped
    pub fn xy(&self) -> Vec<Coord<f64>> {
        self.points.iter().map(|p| Coord { x: p[0], y: p[1] }).collect()
    }
}

/// One Multipatch patch: an outer ring followed by optional inner rings
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub rings: Vec<Ring>,
}

impl Patch {
    pub fn new(rings: Vec<Ring>) -> Self {
        Patch { rings }
    }

    /// Outer ring; only this ring takes part in face classification
    pub fn exterior(&self) -> Option<&Ring> {
        self.rings.first()
    }
}

/// Footprint shared by the top and bottom faces of a building part,
/// with every elevation observed for it
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingPart {
    pub xy: Vec<Coord<f64>>,
    pub heights: Vec<f64>,
}

impl BuildingPart {
    /// Elevation of the top face
    pub fn max_height(&self) -> f64 {
        self.heights
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn polygon(&self) -> Polygon<f64> {
        Polygon::new(LineString::from(self.xy.clone()), vec![])
    }
}

/// Hashable form of an (x, y) sequence
type XyKey = Vec<(u64, u64)>;

fn xy_key(xy: &[Coord<f64>]) -> XyKey {
    // -0.0 and 0.0 compare equal, so they must hash equal
    let bits = |v: f64| if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() };
    xy.iter().map(|c| (bits(c.x), bits(c.y))).collect()
}

/// Building parts of one feature, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct BuildingParts {
    parts: Vec<BuildingPart>,
    index: HashMap<XyKey, usize>,
    /// Lowest elevation over all horizontal faces
    pub min_height: f64,
}

impl BuildingParts {
    fn new(min_height_seed: f64) -> Self {
        BuildingParts {
            parts: Vec::new(),
            index: HashMap::new(),
            min_height: min_height_seed,
        }
    }

    fn insert(&mut self, xy: Vec<Coord<f64>>, z: f64) {
        self.min_height = self.min_height.min(z);
        match self.index.get(&xy_key(&xy)) {
            Some(&i) => self.parts[i].heights.push(z),
            None => {
                self.index.insert(xy_key(&xy), self.parts.len());
                self.parts.push(BuildingPart {
                    xy,
                    heights: vec![z],
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildingPart> {
        self.parts.iter()
    }
}

/// A Multipatch building with its attributes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultipatchFeature {
    pub properties: JsonObject,
    pub patches: Vec<Patch>,
}

impl MultipatchFeature {
    pub fn new(properties: JsonObject, patches: Vec<Patch>) -> Self {
        MultipatchFeature {
            properties,
            patches,
        }
    }

    /// Build a feature from a GeoJSON feature whose positions carry Z
    ///
    /// `Polygon`, `MultiPolygon` and `GeometryCollection` of those are
    /// accepted; the feature must have a geometry.
    pub fn from_geojson_feature(index: usize, feature: &Feature) -> Result<Self, ConvertError> {
        let geometry = feature
            .geometry
            .as_ref()
            .ok_or_else(|| ConvertError::MalformedGeometry {
                feature: index,
                reason: "feature has no geometry".to_string(),
            })?;

        let mut patches = Vec::new();
        collect_patches(index, &geometry.value, &mut patches)?;

        Ok(MultipatchFeature {
            properties: feature.properties.clone().unwrap_or_default(),
            patches,
        })
    }

    /// Group horizontal faces by footprint and track the lowest elevation
    pub fn building_parts(&self, z_unit: ZUnit) -> BuildingParts {
        let mut parts = BuildingParts::new(z_unit.min_height_seed());
        for ring in self.patches.iter().filter_map(Patch::exterior) {
            if let Some(z) = ring.horizontal_z() {
                parts.insert(ring.xy(), z);
            }
        }
        parts
    }

    /// One footprint per building part, heights in meters
    pub fn to_footprints(&self, z_unit: ZUnit, relative_h: bool) -> Vec<Footprint> {
        let parts = self.building_parts(z_unit);
        parts
            .iter()
            .map(|part| {
                let mut height = part.max_height();
                if relative_h {
                    height -= parts.min_height;
                }
                Footprint::new(
                    part.polygon(),
                    z_unit.to_meters(height),
                    self.properties.clone(),
                )
            })
            .collect()
    }
}

fn collect_patches(index: usize, value: &Value, patches: &mut Vec<Patch>) -> Result<(), ConvertError> {
    match value {
        Value::Polygon(rings) => patches.push(to_patch(index, rings)?),
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                patches.push(to_patch(index, rings)?);
            }
        }
        Value::GeometryCollection(geometries) => {
            for geometry in geometries {
                collect_patches(index, &geometry.value, patches)?;
            }
        }
        other => {
            return Err(ConvertError::UnsupportedGeometry {
                feature: index,
                kind: geometry_kind(other).to_string(),
            })
        }
    }
    Ok(())
}

fn geometry_kind(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

fn to_patch(index: usize, rings: &[Vec<Vec<f64>>]) -> Result<Patch, ConvertError> {
    let rings = rings
        .iter()
        .map(|ring| {
            ring.iter()
                .map(|pos| match pos.as_slice() {
                    [x, y, z, ..] => Ok([*x, *y, *z]),
                    _ => Err(ConvertError::MissingZ {
                        feature: index,
                        position: pos.clone(),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Ring::new)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Patch::new(rings))
}

/// Multipatch features sharing one CRS
#[derive(Debug, Clone, Default)]
pub struct MultipatchCollection {
    pub features: Vec<MultipatchFeature>,
    /// CRS of the coordinates; `None` when unknown
    pub geo_core: Option<GeoCore>,
}

/// Result of a conversion: kept in memory or written to disk
#[derive(Debug)]
pub enum ConvertOutput {
    InMemory(FootprintCollection),
    Saved(PathBuf),
}

impl ConvertOutput {
    pub fn into_collection(self) -> Option<FootprintCollection> {
        match self {
            ConvertOutput::InMemory(collection) => Some(collection),
            ConvertOutput::Saved(_) => None,
        }
    }
}

impl MultipatchCollection {
    pub fn new(features: Vec<MultipatchFeature>, epsg: u32) -> Self {
        MultipatchCollection {
            features,
            geo_core: Some(GeoCore::new(epsg)),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn set_crs(&mut self, epsg: u32) {
        self.geo_core = Some(GeoCore::new(epsg));
    }

    /// Flatten every feature into footprints, reprojected to EPSG:4326
    pub fn to_footprints(&self, z_unit: ZUnit, relative_h: bool) -> Result<FootprintCollection, ConvertError> {
        let geo_core = self.geo_core.ok_or(ConvertError::MissingCrs)?;

        let mut footprints = Vec::new();
        for (i, feature) in self.features.iter().enumerate() {
            let split = feature.to_footprints(z_unit, relative_h);
            debug!("Feature {}: {} building part(s)", i, split.len());
            footprints.extend(split);
        }

        let collection = FootprintCollection::new(footprints, geo_core);
        collection.to_crs(GeoCore::wgs84())
    }

    /// Run the full conversion: flatten, reproject, then return or save
    pub fn convert(&self, options: &ConvertOptions) -> Result<ConvertOutput> {
        let collection = self.to_footprints(options.z_unit_in, options.relative_h)?;
        info!(
            "Converted {} Multipatch feature(s) into {} footprint(s)",
            self.len(),
            collection.len()
        );

        if options.save {
            let output_file = collection.save(&options.output_file(), options.out_format)?;
            Ok(ConvertOutput::Saved(output_file))
        } else {
            Ok(ConvertOutput::InMemory(collection))
        }
    }
}

/// Convert Multipatch buildings into polygons with a `height` attribute
///
/// String options take the same values as the config file: `z_unit_in` is
/// `m` or `ft`, `out_format` is `geojson` or `shp`. The unit is checked
/// before any geometry is processed; the format only matters, and is only
/// checked, when `save` is set. The result is then written to
/// `{path}{filename}.{out_format}` and its location returned.
pub fn multipatch_convertor(
    collection: &MultipatchCollection,
    z_unit_in: &str,
    relative_h: bool,
    save: bool,
    path: &str,
    filename: &str,
    out_format: &str,
) -> Result<ConvertOutput> {
    let mut options = ConvertOptions::new()
        .with_relative_h(relative_h)
        .with_save(save)
        .with_path(path)
        .with_filename(filename);
    options.set_z_unit_in(z_unit_in)?;
    if save {
        options.set_out_format(out_format)?;
    }

    collection.convert(&options)
}
