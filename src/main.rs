use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use nalgebra::Vector3;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gravity_align::config::{EstimatorConfig, StoreLayout};
use gravity_align::estimation::EstimationPoller;
use gravity_align::inference::ConstantGravityModel;
use gravity_align::io::{FilePoseStore, YamlFileSink};
use gravity_align::system::EstimatorSystem;

/// Continuously align the SLAM world frame with gravity.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Exchange directory shared with the pose producer.
    #[arg(long, default_value = "GE_information")]
    info_dir: PathBuf,

    /// Optional YAML file with estimator settings. Defaults are used if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Camera-frame gravity reported for every image (x y z).
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true,
          default_values_t = [0.0, 0.0, 1.0])]
    camera_gravity: Vec<f64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EstimatorConfig::from_yaml_file(path)?,
        None => EstimatorConfig::default(),
    };

    let layout = StoreLayout::new(&args.info_dir);
    layout.ensure_dir()?;

    let gravity = Vector3::from_column_slice(&args.camera_gravity);
    info!(
        info_dir = %layout.info_dir.display(),
        estimate_interval_s = config.estimate_interval_s,
        pose_jump_threshold = config.pose_jump_threshold,
        down_axis = ?config.down_axis,
        "gravity estimate starting"
    );

    let poller = EstimationPoller::new(
        config,
        Box::new(FilePoseStore::new(layout.pose_path())),
        Box::new(ConstantGravityModel::new(gravity)),
        Box::new(YamlFileSink::new(layout.record_path())),
    )?;

    let system = EstimatorSystem::spawn(poller)?;
    let handle = system.shutdown_handle();
    ctrlc::set_handler(move || handle.request()).context("Failed to install Ctrl-C handler")?;

    let stats = system.join()?;
    info!(
        estimates = stats.estimates,
        failures = stats.failures,
        pose_jumps = stats.pose_jumps,
        "gravity estimate stopped"
    );

    Ok(())
}
