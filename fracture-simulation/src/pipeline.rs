/// End-to-end fracture simulation: read, resample, simulate, write.
use crate::error::{FractureError, Result};
use crate::io::{FormatRegistry, read_volume, write_volume};
use crate::noise::BoundaryNoiseSynthesizer;
use crate::plane::{PlaneClassifier, PlaneEquation};
use crate::report::{GridInfo, InputFiles, OutputFiles, RunReport, StageTimings};
use crate::resample::{Interpolation, ResampleOrder, resample};
use crate::simulator::FractureSimulator;
use crate::smoothing::gaussian_smooth;
use crate::statistics::region_statistics;
use crate::volume::VolumeGrid;
use constants::label::{DARK_LABEL, get_label_name};
use constants::simulation::DEFAULT_CORRECTION_FACTOR;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Intensity sample type of the working volumes.
pub type Intensity = i16;

/// Everything a single run needs, as given on the command line.
#[derive(Debug, Clone)]
pub struct FractureConfig {
    /// Intensity volume to fracture.
    pub input: PathBuf,
    /// Volume whose grid the outputs are resampled onto.
    pub reference: PathBuf,
    /// Label map (0 background, 1 tooth, 2 dark region).
    pub labels: PathBuf,
    pub output_image: PathBuf,
    pub output_labels: PathBuf,
    pub plane: PlaneEquation,
    /// Crack half-width and probe distance, in millimetres.
    pub displacement: f64,
    pub correction_factor: f64,
    pub seed: Option<u64>,
    pub resample_order: ResampleOrder,
    /// Gaussian smoothing of the final intensity, in millimetres.
    pub smooth_sigma: Option<f64>,
    pub report: Option<PathBuf>,
}

impl FractureConfig {
    /// Configuration with default options for the given positional inputs.
    pub fn new(
        input: impl Into<PathBuf>,
        reference: impl Into<PathBuf>,
        labels: impl Into<PathBuf>,
        output_image: impl Into<PathBuf>,
        output_labels: impl Into<PathBuf>,
        plane: PlaneEquation,
        displacement: f64,
    ) -> Self {
        Self {
            input: input.into(),
            reference: reference.into(),
            labels: labels.into(),
            output_image: output_image.into(),
            output_labels: output_labels.into(),
            plane,
            displacement,
            correction_factor: DEFAULT_CORRECTION_FACTOR,
            seed: None,
            resample_order: ResampleOrder::default(),
            smooth_sigma: None,
            report: None,
        }
    }
}

/// Validated pipeline; construction fails before any file is touched.
pub struct FracturePipeline {
    config: FractureConfig,
    simulator: FractureSimulator,
    synthesizer: BoundaryNoiseSynthesizer,
}

impl FracturePipeline {
    pub fn new(config: FractureConfig) -> Result<Self> {
        let classifier = PlaneClassifier::new(config.plane)?;
        let simulator = FractureSimulator::new(classifier, config.displacement)?;
        let synthesizer =
            BoundaryNoiseSynthesizer::new(config.correction_factor)?.with_seed(config.seed);
        let registry = FormatRegistry::new();
        registry.find_format_for_file(&config.output_image)?;
        registry.find_format_for_file(&config.output_labels)?;
        if let Some(sigma) = config.smooth_sigma {
            if !sigma.is_finite() || sigma < 0.0 {
                return Err(FractureError::Configuration(format!(
                    "smoothing sigma must be finite and non-negative, got {sigma}"
                )));
            }
        }

        Ok(Self {
            config,
            simulator,
            synthesizer,
        })
    }

    pub fn config(&self) -> &FractureConfig {
        &self.config
    }

    /// Run every stage. Output files are written only once all
    /// computation has succeeded, and the report only once both outputs exist.
    pub fn run(&self) -> Result<RunReport> {
        let config = &self.config;
        let mut timings = StageTimings::default();

        let stage = Instant::now();
        let mut intensity: VolumeGrid<Intensity> = read_volume(&config.input)?;
        let mut labels: VolumeGrid<u8> = read_volume(&config.labels)?;
        let reference = read_volume::<Intensity>(&config.reference)?
            .geometry()
            .clone();
        timings.read_ms = stage.elapsed().as_millis();

        if config.resample_order == ResampleOrder::BeforeSimulation {
            let stage = Instant::now();
            intensity = resample(&intensity, &reference, Interpolation::Linear);
            labels = resample(&labels, &reference, Interpolation::NearestNeighbor);
            timings.resample_ms += stage.elapsed().as_millis();
            log::info!("Resampled inputs onto reference grid {:?}", reference.size());
        }

        let stage = Instant::now();
        let dark = region_statistics(&intensity, &labels, DARK_LABEL)?;
        let (mean, sigma) = dark.quantized::<Intensity>();
        timings.statistics_ms = stage.elapsed().as_millis();
        log::info!(
            "{} region: {} voxels, mean {mean}, sigma {sigma}",
            get_label_name(DARK_LABEL),
            dark.count
        );

        let stage = Instant::now();
        let noise: VolumeGrid<Intensity> =
            self.synthesizer.synthesize(intensity.geometry(), mean, sigma)?;
        timings.noise_ms = stage.elapsed().as_millis();
        log::info!(
            "Boundary noise: mean {mean}, sigma {:.3}",
            self.synthesizer.effective_sigma(sigma)
        );

        let stage = Instant::now();
        let output = self.simulator.simulate(&intensity, &labels, &noise)?;
        drop(noise);
        timings.simulation_ms = stage.elapsed().as_millis();
        log::info!(
            "Simulation: {} noise-blended, {} promoted ({} newly tooth), {} probes out of bounds",
            output.counts.noise_blended,
            output.counts.promoted,
            output.counts.newly_tooth,
            output.counts.probes_out_of_bounds
        );

        let working_grid = GridInfo {
            size: intensity.geometry().size(),
            spacing: (*intensity.geometry().spacing()).into(),
        };
        let counts = output.counts;
        let mut final_intensity = output.intensity;
        let final_labels = output.labels;

        if config.resample_order == ResampleOrder::AfterSimulation {
            let stage = Instant::now();
            final_intensity = resample(&final_intensity, &reference, Interpolation::Linear);
            timings.resample_ms += stage.elapsed().as_millis();
            log::info!("Resampled output onto reference grid {:?}", reference.size());
        }

        if let Some(sigma_mm) = config.smooth_sigma {
            let stage = Instant::now();
            final_intensity = gaussian_smooth(&final_intensity, sigma_mm)?;
            timings.smoothing_ms = stage.elapsed().as_millis();
            log::info!("Smoothed output with sigma {sigma_mm} mm");
        }

        let stage = Instant::now();
        write_outputs(&final_intensity, &final_labels, config)?;
        timings.write_ms = stage.elapsed().as_millis();

        let report = RunReport {
            inputs: InputFiles {
                intensity: config.input.display().to_string(),
                reference: config.reference.display().to_string(),
                labels: config.labels.display().to_string(),
            },
            outputs: OutputFiles {
                intensity: config.output_image.display().to_string(),
                labels: config.output_labels.display().to_string(),
            },
            plane: config.plane,
            normal: (*self.simulator.classifier().normal()).into(),
            displacement: config.displacement,
            correction_factor: self.synthesizer.correction_factor(),
            seed: config.seed,
            resample_order: config.resample_order,
            smoothing_sigma: config.smooth_sigma,
            dark_region: dark,
            noise_mean: mean,
            noise_sigma: sigma,
            working_grid,
            counts,
            timings,
        };

        if let Some(path) = &config.report {
            report.write(path)?;
        }
        log::info!("Finished in {:.2?}", report.timings.total());
        Ok(report)
    }
}

/// Sibling of `path` named `<stem>.partial.<ext>`, so the format is still
/// chosen by extension.
fn staging_path(path: &Path) -> PathBuf {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let extension = path.extension().unwrap_or_default().to_string_lossy();
    path.with_file_name(format!("{stem}.partial.{extension}"))
}

/// Write both outputs to staging files and move them into place together.
/// A failed write leaves neither output behind.
fn write_outputs(
    intensity: &VolumeGrid<Intensity>,
    labels: &VolumeGrid<u8>,
    config: &FractureConfig,
) -> Result<()> {
    let staged_image = staging_path(&config.output_image);
    let staged_labels = staging_path(&config.output_labels);

    let result = write_volume(intensity, &staged_image)
        .and_then(|()| write_volume(labels, &staged_labels))
        .and_then(|()| {
            fs::rename(&staged_image, &config.output_image)?;
            fs::rename(&staged_labels, &config.output_labels)?;
            Ok(())
        });

    if let Err(e) = &result {
        log::warn!("Discarding partial outputs: {e}");
        fs::remove_file(&staged_image).ok();
        fs::remove_file(&staged_labels).ok();
    }
    result
}
