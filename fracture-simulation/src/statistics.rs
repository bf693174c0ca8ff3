/// Intensity statistics restricted to one label of a label map
use crate::error::{FractureError, Result};
use crate::sample::Sample;
use crate::volume::VolumeGrid;
use constants::simulation::{GEOMETRY_TOLERANCE, STATISTICS_CHUNK_SIZE};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionStatistics {
    pub label: u8,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator).
    pub sigma: f64,
    pub minimum: f64,
    pub maximum: f64,
}

impl RegionStatistics {
    /// Mean and sigma truncated into the intensity sample type, the way
    /// the dark-region statistics are handed to the noise generator.
    pub fn quantized<T: Sample>(&self) -> (f64, f64) {
        (
            T::from_f64_clamped(self.mean).to_f64(),
            T::from_f64_clamped(self.sigma).to_f64(),
        )
    }
}

/// Running sums for one chunk of voxels.
#[derive(Debug, Clone, Copy)]
struct Accumulator {
    count: usize,
    sum: f64,
    sum_of_squares: f64,
    minimum: f64,
    maximum: f64,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            sum_of_squares: 0.0,
            minimum: f64::INFINITY,
            maximum: f64::NEG_INFINITY,
        }
    }

    fn update(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_of_squares += value * value;
        self.minimum = self.minimum.min(value);
        self.maximum = self.maximum.max(value);
    }

    fn merge(mut self, other: Self) -> Self {
        self.count += other.count;
        self.sum += other.sum;
        self.sum_of_squares += other.sum_of_squares;
        self.minimum = self.minimum.min(other.minimum);
        self.maximum = self.maximum.max(other.maximum);
        self
    }
}

/// Compute mean/sigma/min/max of `intensity` over voxels where `labels == label`.
pub fn region_statistics<T: Sample>(
    intensity: &VolumeGrid<T>,
    labels: &VolumeGrid<u8>,
    label: u8,
) -> Result<RegionStatistics> {
    intensity.geometry().ensure_consistent_with(
        labels.geometry(),
        GEOMETRY_TOLERANCE,
        "intensity and label volumes differ",
    )?;

    let totals = intensity
        .data()
        .par_chunks(STATISTICS_CHUNK_SIZE)
        .zip(labels.data().par_chunks(STATISTICS_CHUNK_SIZE))
        .map(|(values, mask)| {
            let mut local = Accumulator::new();
            for (value, &l) in values.iter().zip(mask) {
                if l == label {
                    local.update(value.to_f64());
                }
            }
            local
        })
        .reduce(Accumulator::new, Accumulator::merge);

    if totals.count == 0 {
        return Err(FractureError::EmptyRegion(label));
    }

    let n = totals.count as f64;
    let mean = totals.sum / n;
    let sigma = if totals.count > 1 {
        ((totals.sum_of_squares - n * mean * mean) / (n - 1.0))
            .max(0.0)
            .sqrt()
    } else {
        0.0
    };

    Ok(RegionStatistics {
        label,
        count: totals.count,
        mean,
        sigma,
        minimum: totals.minimum,
        maximum: totals.maximum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::Geometry;
    use approx::assert_relative_eq;

    fn volumes() -> (VolumeGrid<i16>, VolumeGrid<u8>) {
        let geometry = Geometry::axis_aligned([4, 1, 1], [1.0; 3], [0.0; 3]).unwrap();
        let intensity = VolumeGrid::new(geometry.clone(), vec![10, 20, 31, 100]).unwrap();
        let labels = VolumeGrid::new(geometry, vec![2, 2, 2, 1]).unwrap();
        (intensity, labels)
    }

    #[test]
    fn matches_hand_computed_values() {
        let (intensity, labels) = volumes();
        let stats = region_statistics(&intensity, &labels, 2).unwrap();
        assert_eq!(stats.count, 3);
        assert_relative_eq!(stats.mean, 61.0 / 3.0);
        // Deviations: -31/3, -1/3, 32/3 -> squares sum 1986/9, over n - 1.
        assert_relative_eq!(stats.sigma, (1986.0f64 / 9.0 / 2.0).sqrt(), epsilon = 1e-9);
        assert_eq!(stats.minimum, 10.0);
        assert_eq!(stats.maximum, 31.0);
    }

    #[test]
    fn quantized_truncates_into_sample_type() {
        let (intensity, labels) = volumes();
        let stats = region_statistics(&intensity, &labels, 2).unwrap();
        let (mean, sigma) = stats.quantized::<i16>();
        assert_eq!(mean, 20.0);
        assert_eq!(sigma, 10.0);
    }

    #[test]
    fn single_voxel_has_zero_sigma() {
        let (intensity, labels) = volumes();
        let stats = region_statistics(&intensity, &labels, 1).unwrap();
        assert_eq!(stats.mean, 100.0);
        assert_eq!(stats.sigma, 0.0);
    }

    #[test]
    fn missing_label_is_an_error() {
        let (intensity, labels) = volumes();
        assert!(matches!(
            region_statistics(&intensity, &labels, 7),
            Err(FractureError::EmptyRegion(7))
        ));
    }

    #[test]
    fn large_volume_spanning_many_chunks() {
        let n = STATISTICS_CHUNK_SIZE * 3 + 17;
        let geometry = Geometry::axis_aligned([n, 1, 1], [1.0; 3], [0.0; 3]).unwrap();
        let values: Vec<i16> = (0..n).map(|i| (i % 2) as i16 * 10).collect();
        let intensity = VolumeGrid::new(geometry.clone(), values).unwrap();
        let labels = VolumeGrid::filled(geometry, 2u8);
        let stats = region_statistics(&intensity, &labels, 2).unwrap();
        assert_eq!(stats.count, n);
        assert_relative_eq!(stats.mean, 5.0, epsilon = 1e-3);
        assert_relative_eq!(stats.sigma, 5.0, epsilon = 1e-3);
    }
}
