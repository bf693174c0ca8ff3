/// Tooth fracture simulation entry point
use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use constants::label::{BACKGROUND_LABEL, DARK_LABEL, TOOTH_LABEL, get_label_name};
use constants::simulation::DEFAULT_CORRECTION_FACTOR;
use fracture_simulation::{FractureConfig, FracturePipeline, PlaneEquation, ResampleOrder};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fracture-simulation")]
#[command(about = "Cut a tooth volume along a plane and synthesise a fracture", long_about = None)]
#[command(allow_negative_numbers = true)]
struct Cli {
    /// Intensity volume to fracture
    input: PathBuf,
    /// Image whose grid the outputs are resampled onto
    reference: PathBuf,
    /// Label map of the input
    label: PathBuf,
    /// Fractured intensity volume
    output_image: PathBuf,
    /// Updated label map
    output_label: PathBuf,
    /// Plane coefficient a of ax + by + cz = d (RAS)
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    /// Crack half-width and probe distance in mm
    displacement: f64,

    /// Resample onto the reference grid before or after the simulation
    #[arg(long, default_value = "before")]
    resample_order: ResampleOrder,

    /// Divisor applied to the dark-region sigma for the boundary noise
    #[arg(long, default_value_t = DEFAULT_CORRECTION_FACTOR)]
    correction_factor: f64,

    /// Seed for reproducible noise
    #[arg(long)]
    seed: Option<u64>,

    /// Gaussian smoothing of the output intensity, in mm
    #[arg(long)]
    smooth_sigma: Option<f64>,

    /// Write a JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {program} <input> <reference> <label> <outputImage> <outputLabel> <a> <b> <c> <d> <displacement> \
[--resample-order before|after] [--correction-factor F] [--seed N] [--smooth-sigma MM] [--report PATH]\n\
\n\
Labels: {BACKGROUND_LABEL} = {}, {TOOTH_LABEL} = {}, {DARK_LABEL} = {}\n\
The reference image only supplies the output grid (size, spacing, origin, direction).",
        get_label_name(BACKGROUND_LABEL),
        get_label_name(TOOTH_LABEL),
        get_label_name(DARK_LABEL),
    )
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let program = std::env::args()
                .next()
                .unwrap_or_else(|| "fracture-simulation".to_string());
            eprintln!("{e}");
            eprintln!("{}", usage(&program));
            std::process::exit(1);
        }
    };

    let mut config = FractureConfig::new(
        cli.input,
        cli.reference,
        cli.label,
        cli.output_image,
        cli.output_label,
        PlaneEquation::new(cli.a, cli.b, cli.c, cli.d),
        cli.displacement,
    );
    config.correction_factor = cli.correction_factor;
    config.seed = cli.seed;
    config.resample_order = cli.resample_order;
    config.smooth_sigma = cli.smooth_sigma;
    config.report = cli.report;

    let pipeline = FracturePipeline::new(config).context("Invalid simulation parameters")?;
    let report = pipeline.run().with_context(|| {
        format!(
            "Fracture simulation of {} failed",
            pipeline.config().input.display()
        )
    })?;

    log::info!(
        "Wrote {} and {}",
        report.outputs.intensity,
        report.outputs.labels
    );
    Ok(())
}
