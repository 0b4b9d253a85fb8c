#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for browsing and reporting traffic incidents.
//!
//! Reads incidents from a JSON document file, renders map markers, the
//! vicinity traffic signal and the recent report list, and appends new
//! reports.

mod config;
mod format;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use trafficpulse_dashboard::{Coordinates, Dashboard};
use trafficpulse_feed::FeedError;
use trafficpulse_feed::blob::LocalBlobStore;
use trafficpulse_feed::file::JsonFileStore;
use trafficpulse_feed::report::{ImageAttachment, report_incident};
use trafficpulse_feed::snapshot::encode_snapshot;
use trafficpulse_incident_models::{Incident, IncidentType, Location, NewIncident};
use trafficpulse_markers::MapMarker;
use trafficpulse_signal::SignalEvaluator;
use trafficpulse_signal_models::SignalReading;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "trafficpulse", about = "Crowd-sourced traffic incident client")]
struct Cli {
    /// Path to the TOML config file (overrides `TRAFFICPULSE_CONFIG`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Incident document file (overrides `snapshot_path` from the config)
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show aggregated map markers
    Markers {
        /// Only show these incident types (repeatable, e.g. `--type accident`)
        #[arg(long = "type", value_parser = parse_incident_type)]
        types: Vec<IncidentType>,
    },
    /// Show the traffic signal around a point
    Signal {
        /// Center latitude (defaults to the configured location)
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        /// Center longitude (defaults to the configured location)
        #[arg(long, allow_hyphen_values = true)]
        lng: Option<f64>,
        /// Radius in kilometres (defaults to the configured radius)
        #[arg(long)]
        radius: Option<f64>,
    },
    /// List the most recent reports
    List {
        /// Maximum number of reports to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Report a new incident
    Report {
        /// Incident type: roadfree, construction, accident or roadblock
        #[arg(long = "type", value_parser = parse_incident_type)]
        incident_type: IncidentType,
        /// Latitude of the incident
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude of the incident
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Reporting user ID
        #[arg(long)]
        user: String,
        /// Free-text description
        #[arg(long, default_value = "")]
        details: String,
        /// Street address
        #[arg(long)]
        address: Option<String>,
        /// Local image file to upload with the report
        #[arg(long, conflicts_with = "image_url")]
        image: Option<PathBuf>,
        /// Already-hosted image URL to attach
        #[arg(long)]
        image_url: Option<String>,
    },
}

fn parse_incident_type(value: &str) -> Result<IncidentType, String> {
    value.parse().map_err(|_| {
        let known: Vec<String> = IncidentType::all().iter().map(ToString::to_string).collect();
        format!("unknown incident type {value:?} (expected one of: {})", known.join(", "))
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(snapshot) = cli.snapshot {
        config.snapshot_path = snapshot;
    }

    let store = JsonFileStore::open(&config.snapshot_path);

    match cli.command {
        Commands::Markers { types } => {
            let mut dashboard = load_dashboard(&store, &config)?;
            dashboard.set_selected_types(types);
            print_markers(&dashboard.markers(), cli.json)?;
        }
        Commands::Signal { lat, lng, radius } => {
            let dashboard = load_dashboard(&store, &config)?;
            let center = match (lat, lng) {
                (Some(lat), Some(lng)) => Coordinates { lat, lng },
                (None, None) => config.default_location,
                _ => return Err("--lat and --lng must be given together".into()),
            };
            let radius = radius.unwrap_or_else(|| dashboard.radius_km());
            if !radius.is_finite() || radius < 0.0 {
                return Err(format!("invalid radius {radius}").into());
            }

            let reading = SignalEvaluator::new(dashboard.incidents()).read(center.into(), radius);
            print_reading(&reading, cli.json)?;
        }
        Commands::List { limit } => {
            let dashboard = load_dashboard(&store, &config)?;
            print_recent(dashboard.recent(limit), cli.json)?;
        }
        Commands::Report {
            incident_type,
            lat,
            lng,
            user,
            details,
            address,
            image,
            image_url,
        } => {
            let mut location = Location::new(lat, lng);
            location.address = address;
            let mut incident = NewIncident::new(incident_type, location, user);
            incident.details = details;

            let attachment = match (image, image_url) {
                (Some(path), _) => Some(ImageAttachment::Local(tokio::fs::read(&path).await?)),
                (None, Some(url)) => Some(ImageAttachment::Remote(url)),
                (None, None) => None,
            };

            let blobs = LocalBlobStore::new(&config.blob_dir);
            let id = report_incident(&store, &blobs, incident, attachment).await?;
            log::info!("Reported {incident_type} incident {id}");
            println!("{id}");
        }
    }

    Ok(())
}

/// Loads the document file into a fresh dashboard.
fn load_dashboard(store: &JsonFileStore, config: &Config) -> Result<Dashboard, FeedError> {
    let snapshot = store.load()?;
    if !snapshot.rejected.is_empty() {
        log::warn!(
            "{} document(s) in {} were skipped",
            snapshot.rejected.len(),
            store.path().display()
        );
    }

    let mut dashboard = Dashboard::new(config.dashboard());
    dashboard.apply_snapshot(Arc::from(snapshot.incidents));
    Ok(dashboard)
}

fn print_markers(markers: &[MapMarker], json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(markers)?);
        return Ok(());
    }

    println!(
        "{:<28} {:<13} {:>10} {:>10} {:>6}",
        "ID", "TYPE", "LAT", "LNG", "COUNT"
    );
    println!("{}", "-".repeat(71));
    for marker in markers {
        println!(
            "{:<28} {:<13} {:>10.5} {:>10.5} {:>6}",
            marker.id,
            marker.incident_type.label(),
            marker.position.lat,
            marker.position.lng,
            marker.count
        );
    }
    Ok(())
}

fn print_reading(reading: &SignalReading, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(reading)?);
        return Ok(());
    }

    println!(
        "Signal within {:.1} km of ({:.4}, {:.4})",
        reading.radius_km, reading.lat, reading.lng
    );
    println!("  red:    {}", reading.state.red);
    println!("  yellow: {}", reading.state.yellow);
    println!("  green:  {}", reading.state.green);
    println!("{} ({})", reading.label, reading.light);
    println!("Based on {} reports", reading.state.total());
    Ok(())
}

fn print_recent(incidents: &[Incident], json: bool) -> Result<(), FeedError> {
    if json {
        println!("{}", encode_snapshot(incidents)?);
        return Ok(());
    }

    let now = chrono::Utc::now();
    for incident in incidents {
        println!(
            "{} [{}] {}",
            incident.incident_type.label(),
            format::age(incident.timestamp, now),
            incident.user_id
        );
        if !incident.details.is_empty() {
            println!("  {}", incident.details);
        }
        if let Some(address) = &incident.location.address {
            println!("  {address}");
        }
        if let Some(url) = &incident.image_url {
            println!("  image: {url}");
        }
    }
    Ok(())
}
