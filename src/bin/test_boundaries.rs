use anyhow::{Context, Result};
use clap::Parser;
use newsmap::config::AppConfig;
use newsmap::constituency::ConstituencyIndex;
use newsmap::geocode::GeoPoint;
use newsmap::logging;
use std::path::PathBuf;

#[derive(Parser)]
#[clap(
    name = "test-boundaries",
    about = "Load a boundary dataset and report the constituency for coordinates"
)]
struct Cli {
    /// Boundary file (.kml, .geojson or .json); defaults to BOUNDARIES_PATH
    #[clap(short, long)]
    file: Option<PathBuf>,

    /// Feature property holding the constituency name; defaults to CONSTITUENCY_PROPERTY
    #[clap(short, long)]
    name_property: Option<String>,

    /// Latitude to look up
    #[clap(allow_hyphen_values = true)]
    latitude: Option<f64>,

    /// Longitude to look up
    #[clap(allow_hyphen_values = true)]
    longitude: Option<f64>,
}

fn main() -> Result<()> {
    logging::configure_logging();

    let cli = Cli::parse();
    let config = AppConfig::from_env();
    let path = cli.file.unwrap_or(config.boundaries_path);
    let property = cli.name_property.unwrap_or(config.constituency_property);

    let index = ConstituencyIndex::load(&path, &property)
        .with_context(|| format!("Failed to load boundaries from {}", path.display()))?;

    println!("Loaded {} constituencies from {}", index.len(), path.display());
    for name in index.names() {
        println!("  {}", name);
    }

    if let (Some(latitude), Some(longitude)) = (cli.latitude, cli.longitude) {
        let point = GeoPoint::new(latitude, longitude)
            .with_context(|| format!("Invalid coordinate ({}, {})", latitude, longitude))?;
        match index.locate(point) {
            Some(name) => println!("{} is in {}", point, name),
            None => println!("{} is not within any constituency", point),
        }
    }

    Ok(())
}
