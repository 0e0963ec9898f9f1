//! # Photo Locator Application Entry Point
//!
//! Analyses a JPEG and writes a plain-text report about the file (as told by
//! the filesystem) and about the image itself via its EXIF tags. When the
//! photo is geotagged the report also carries a three-scale map mosaic of the
//! spot and a reverse-geocoded place name.
//!
//! Use `--stdout` to print the report instead of writing files.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use photo_locator::annotator::LocationAnnotator;
use photo_locator::config::{Config, DEFAULT_CONFIG_FILE};
use photo_locator::geocode::NominatimGeocoder;
use photo_locator::photo::{self, FileFacts};
use photo_locator::report::ReportBuilder;
use photo_locator::tile_source::HttpTileSource;

const DEFAULT_REPORT_FILE: &str = "report.txt";

#[derive(Parser)]
#[command(name = "photo-locator", version, about)]
struct Cli {
    /// Photo to analyse
    #[clap(short, long, required_unless_present = "init_config")]
    file: Option<PathBuf>,

    /// Report file; map tiles are written next to it
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (defaults to ./photo-locator.toml)
    #[clap(long)]
    config: Option<PathBuf>,

    /// Print the report instead of writing files
    #[clap(long)]
    stdout: bool,

    /// Skip the map and place name (no network access)
    #[clap(long)]
    no_map: bool,

    /// Write the default configuration and exit
    #[clap(long)]
    init_config: bool,

    /// Diagnostic logging level; RUST_LOG takes precedence
    #[clap(long, short = 'L', default_value_t = Level::INFO)]
    log_level: Level,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::from_level(cli.log_level).into())
                .from_env_lossy(),
        )
        .init();

    if cli.init_config {
        let path = cli
            .config
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        return Config::default()
            .save(&path)
            .with_context(|| format!("writing {}", path.display()));
    }

    let Some(file) = cli.file else {
        bail!("an input file is required (-f <photo.jpg>)");
    };
    if !file.is_file() {
        bail!("input file {} does not exist", file.display());
    }

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };

    let metadata =
        photo::read_photo(&file).with_context(|| format!("reading {}", file.display()))?;
    let facts =
        FileFacts::collect(&file).with_context(|| format!("inspecting {}", file.display()))?;

    let mut builder = ReportBuilder::new("Image analysis report");
    builder.file_facts(facts, metadata.image);

    match metadata.gps {
        Some(_) if cli.no_map => info!("map disabled, location section skipped"),
        Some(point) => {
            let tiles = HttpTileSource::new(&config.tiles, &config.network)
                .context("building tile client")?;
            let geocoder = NominatimGeocoder::new(&config.geocoder, &config.network)
                .context("building geocoder client")?;
            let annotator = LocationAnnotator::new(tiles, geocoder, &config);

            match annotator.locate(point) {
                Ok(location) => {
                    builder.location(location, config.tiles.attribution.as_str());
                }
                Err(e) => warn!("location section omitted: {}", e),
            }
        }
        None => info!("no GPS data in {}", file.display()),
    }

    builder
        .exif_tags(metadata.records)
        .maker_notes(metadata.maker_notes);
    let report = builder.build();

    if cli.stdout {
        print!("{}", report.render_text());
        return Ok(());
    }

    let output = cli.output.unwrap_or_else(|| {
        info!("no output file name given, using default: {}", DEFAULT_REPORT_FILE);
        PathBuf::from(DEFAULT_REPORT_FILE)
    });
    report
        .write(&output)
        .with_context(|| format!("writing report to {}", output.display()))?;

    Ok(())
}
