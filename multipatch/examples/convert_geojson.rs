use anyhow::Result;
use multipatch::collect::reader;
use multipatch::{multipatch_convertor, ConvertOutput};

/// Two-storey block: a 12 m tower on a 6 m podium, both standing on Z = 2
const CAMPUS: &str = r#"{
    "type": "FeatureCollection",
    "features": [{
        "type": "Feature",
        "properties": {"name": "Hall"},
        "geometry": {
            "type": "MultiPolygon",
            "coordinates": [
                [[[2.3500, 48.8500, 6], [2.3510, 48.8500, 6], [2.3510, 48.8510, 6], [2.3500, 48.8510, 6], [2.3500, 48.8500, 6]]],
                [[[2.3500, 48.8500, 2], [2.3510, 48.8500, 2], [2.3510, 48.8510, 2], [2.3500, 48.8510, 2], [2.3500, 48.8500, 2]]],
                [[[2.3502, 48.8502, 12], [2.3508, 48.8502, 12], [2.3508, 48.8508, 12], [2.3502, 48.8502, 12]]],
                [[[2.3502, 48.8502, 6], [2.3508, 48.8502, 6], [2.3508, 48.8508, 6], [2.3502, 48.8502, 6]]],
                [[[2.3500, 48.8500, 2], [2.3510, 48.8500, 2], [2.3510, 48.8500, 6], [2.3500, 48.8500, 6], [2.3500, 48.8500, 2]]]
            ]
        }
    }]
}"#;

fn main() -> Result<()> {
    println!("=== Multipatch to footprints ===\n");

    let collection = reader::from_geojson_str(CAMPUS, None)?;
    println!("Loaded {} Multipatch feature(s)", collection.len());

    println!("\n1. Absolute heights:");
    if let ConvertOutput::InMemory(footprints) =
        multipatch_convertor(&collection, "m", false, false, "./", "output", "geojson")?
    {
        for f in footprints.iter() {
            println!("  - {} : {:.1} m", f.properties["name"], f.height);
        }
    }

    println!("\n2. Relative heights:");
    if let ConvertOutput::InMemory(footprints) =
        multipatch_convertor(&collection, "m", true, false, "./", "output", "geojson")?
    {
        for f in footprints.iter() {
            println!("  - {} : {:.1} m", f.properties["name"], f.height);
        }
    }

    println!("\n3. Save to GeoJSON:");
    let out = multipatch_convertor(&collection, "m", true, true, "./", "campus", "geojson")?;
    if let ConvertOutput::Saved(path) = out {
        println!("  - written to {}", path.display());
    }

    Ok(())
}
