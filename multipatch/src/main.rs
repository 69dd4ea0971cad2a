use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use multipatch::collect::reader;
use multipatch::{ConvertOptions, ConvertOutput};

#[derive(Parser, Debug)]
#[command(name = "multipatch-convert")]
#[command(about = "Flatten ESRI Multipatch buildings into polygons with a height attribute")]
struct Args {
    /// Input GeoJSON or Shapefile with 3D Multipatch geometries
    #[arg(short, long)]
    input: PathBuf,

    /// EPSG code of the input, overriding the one found in the file
    #[arg(long)]
    crs: Option<u32>,

    /// JSON file with conversion options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Height unit of the input Z values (m or ft)
    #[arg(long)]
    z_unit: Option<String>,

    /// Measure heights from each building's lowest face
    #[arg(long)]
    relative: bool,

    /// Output directory prefix, concatenated with the filename
    #[arg(long)]
    path: Option<String>,

    /// Output file name, without extension
    #[arg(long)]
    filename: Option<String>,

    /// Output format (geojson or shp)
    #[arg(long)]
    format: Option<String>,

    /// Print the GeoJSON result instead of saving it
    #[arg(long)]
    stdout: bool,
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut options = match &args.config {
        Some(config) => ConvertOptions::from_json_file(config)?,
        None => ConvertOptions::default(),
    };
    if let Some(unit) = &args.z_unit {
        options.set_z_unit_in(unit)?;
    }
    // The format only matters when a file is written
    if let Some(format) = args.format.as_deref().filter(|_| !args.stdout) {
        options.set_out_format(format)?;
    }
    if let Some(path) = args.path {
        options.path = path;
    }
    if let Some(filename) = args.filename {
        options.filename = filename;
    }
    options.relative_h |= args.relative;
    options.save = !args.stdout;

    info!("Input: {}", args.input.display());
    let collection = reader::from_file(&args.input, args.crs)?;

    match collection.convert(&options)? {
        ConvertOutput::Saved(path) => info!("Output written to {}", path.display()),
        ConvertOutput::InMemory(footprints) => {
            if let (Some(min), Some(max)) = (footprints.min_height(), footprints.max_height()) {
                info!("Heights range from {:.2} m to {:.2} m", min, max);
            }
            println!("{}", footprints.to_geojson());
        }
    }

    Ok(())
}
