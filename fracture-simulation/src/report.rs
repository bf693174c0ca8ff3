/// JSON run report summarising one fracture simulation.
use crate::plane::PlaneEquation;
use crate::resample::ResampleOrder;
use crate::simulator::SimulationCounts;
use crate::statistics::RegionStatistics;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Everything needed to reproduce and audit a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub inputs: InputFiles,
    pub outputs: OutputFiles,
    pub plane: PlaneEquation,
    /// Unit normal used for the displacement probe.
    pub normal: [f64; 3],
    pub displacement: f64,
    pub correction_factor: f64,
    pub seed: Option<u64>,
    pub resample_order: ResampleOrder,
    pub smoothing_sigma: Option<f64>,
    /// Statistics of the dark region that drove the noise.
    pub dark_region: RegionStatistics,
    /// Mean and sigma after truncation into the intensity type.
    pub noise_mean: f64,
    pub noise_sigma: f64,
    pub working_grid: GridInfo,
    pub counts: SimulationCounts,
    pub timings: StageTimings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputFiles {
    pub intensity: String,
    pub reference: String,
    pub labels: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputFiles {
    pub intensity: String,
    pub labels: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridInfo {
    pub size: [usize; 3],
    pub spacing: [f64; 3],
}

/// Wall time per stage in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageTimings {
    pub read_ms: u128,
    pub resample_ms: u128,
    pub statistics_ms: u128,
    pub noise_ms: u128,
    pub simulation_ms: u128,
    pub smoothing_ms: u128,
    pub write_ms: u128,
}

impl StageTimings {
    pub fn total(&self) -> Duration {
        let ms = self.read_ms
            + self.resample_ms
            + self.statistics_ms
            + self.noise_ms
            + self.simulation_ms
            + self.smoothing_ms
            + self.write_ms;
        Duration::from_millis(ms as u64)
    }
}

impl RunReport {
    pub fn write(&self, path: &Path) -> crate::error::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        log::info!("Run report written to {}", path.display());
        Ok(())
    }
}
