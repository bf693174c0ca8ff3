/// Synthetic boundary noise matching the dark-region statistics
use crate::error::{FractureError, Result};
use crate::progress::voxel_progress;
use crate::sample::Sample;
use crate::volume::{Geometry, VolumeGrid};
use constants::simulation::{DEFAULT_CORRECTION_FACTOR, NOISE_CHUNK_SIZE};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rand_pcg::Pcg64Mcg;
use rayon::prelude::*;

/// Generates a volume of independent Gaussian samples.
///
/// The standard deviation is divided by the correction factor so the
/// synthetic crack does not look noisier than real fracture cavities.
/// Samples are produced in fixed-size chunks, each with its own generator
/// derived from the base seed, so a seeded run gives the same volume on any
/// number of threads.
#[derive(Debug, Clone)]
pub struct BoundaryNoiseSynthesizer {
    correction_factor: f64,
    seed: Option<u64>,
}

impl Default for BoundaryNoiseSynthesizer {
    fn default() -> Self {
        Self {
            correction_factor: DEFAULT_CORRECTION_FACTOR,
            seed: None,
        }
    }
}

impl BoundaryNoiseSynthesizer {
    pub fn new(correction_factor: f64) -> Result<Self> {
        if !correction_factor.is_finite() || correction_factor <= 0.0 {
            return Err(FractureError::Configuration(format!(
                "correction factor must be positive and finite, got {correction_factor}"
            )));
        }
        Ok(Self {
            correction_factor,
            seed: None,
        })
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn correction_factor(&self) -> f64 {
        self.correction_factor
    }

    pub fn effective_sigma(&self, stddev: f64) -> f64 {
        stddev / self.correction_factor
    }

    /// Fill a volume shaped like `geometry` with Normal(mean, stddev / factor)
    /// samples clamped into `T`.
    pub fn synthesize<T: Sample>(
        &self,
        geometry: &Geometry,
        mean: f64,
        stddev: f64,
    ) -> Result<VolumeGrid<T>> {
        let sigma = self.effective_sigma(stddev);
        if !mean.is_finite() || !sigma.is_finite() || sigma < 0.0 {
            return Err(FractureError::Configuration(format!(
                "noise mean and sigma must be finite with sigma >= 0, got {mean} and {sigma}"
            )));
        }
        let normal = Normal::new(mean, sigma).map_err(|e| {
            FractureError::Configuration(format!(
                "invalid noise distribution (mean {mean}, sigma {sigma}): {e}"
            ))
        })?;

        let base_seed = self.seed.unwrap_or_else(|| rand::rng().random());
        let mut noise = VolumeGrid::filled(geometry.clone(), T::default());

        let chunk_count = geometry.voxel_count().div_ceil(NOISE_CHUNK_SIZE);
        let pb = voxel_progress(chunk_count as u64, "noise chunks");

        noise
            .data_mut()
            .par_chunks_mut(NOISE_CHUNK_SIZE)
            .enumerate()
            .for_each(|(chunk_index, chunk)| {
                let mut rng = Pcg64Mcg::seed_from_u64(chunk_seed(base_seed, chunk_index));
                for value in chunk.iter_mut() {
                    *value = T::from_f64_clamped(normal.sample(&mut rng));
                }
                pb.inc(1);
            });

        pb.finish_with_message("noise synthesized");
        Ok(noise)
    }
}

fn chunk_seed(base_seed: u64, chunk_index: usize) -> u64 {
    base_seed ^ (chunk_index as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}
