/// Per-voxel fracture simulation: boundary noise, displacement probe, relabeling
use crate::error::{FractureError, Result};
use crate::plane::{PlaneClassifier, PlaneSide};
use crate::progress::voxel_progress;
use crate::sample::Sample;
use crate::volume::{Geometry, VolumeGrid};
use constants::label::TOOTH_LABEL;
use constants::simulation::GEOMETRY_TOLERANCE;
use nalgebra::Vector3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// What the simulation decided for one voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoxelOutcome {
    /// Tooth voxel inside the crack band, replaced by the noise sample.
    NoiseBlended,
    /// Probe across the plane landed in tooth; voxel relabeled as tooth.
    Promoted,
    /// Probe stayed inside the grid but found no tooth.
    Unchanged,
    /// Probe left the grid; treated as no tooth.
    ProbeOutOfBounds,
}

/// Voxel tallies for one simulation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationCounts {
    pub noise_blended: usize,
    pub promoted: usize,
    /// Promoted voxels whose input label was not already tooth.
    pub newly_tooth: usize,
    pub unchanged: usize,
    pub probes_out_of_bounds: usize,
}

impl SimulationCounts {
    fn record(&mut self, outcome: VoxelOutcome, was_tooth: bool) {
        match outcome {
            VoxelOutcome::NoiseBlended => self.noise_blended += 1,
            VoxelOutcome::Promoted => {
                self.promoted += 1;
                if !was_tooth {
                    self.newly_tooth += 1;
                }
            }
            VoxelOutcome::Unchanged => self.unchanged += 1,
            VoxelOutcome::ProbeOutOfBounds => self.probes_out_of_bounds += 1,
        }
    }

    fn merge(mut self, other: Self) -> Self {
        self.noise_blended += other.noise_blended;
        self.promoted += other.promoted;
        self.newly_tooth += other.newly_tooth;
        self.unchanged += other.unchanged;
        self.probes_out_of_bounds += other.probes_out_of_bounds;
        self
    }

    pub fn total(&self) -> usize {
        self.noise_blended + self.promoted + self.unchanged + self.probes_out_of_bounds
    }
}

pub struct SimulationOutput<T> {
    pub intensity: VolumeGrid<T>,
    pub labels: VolumeGrid<u8>,
    pub counts: SimulationCounts,
}

/// Cuts a tooth volume along a plane and displaces material across it.
#[derive(Debug, Clone)]
pub struct FractureSimulator {
    classifier: PlaneClassifier,
    displacement: f64,
    forward: Vector3<f64>,
}

impl FractureSimulator {
    pub fn new(classifier: PlaneClassifier, displacement: f64) -> Result<Self> {
        if !displacement.is_finite() || displacement < 0.0 {
            return Err(FractureError::Configuration(format!(
                "displacement must be finite and non-negative, got {displacement}"
            )));
        }
        let forward = classifier.normal() * displacement;
        Ok(Self {
            classifier,
            displacement,
            forward,
        })
    }

    pub fn classifier(&self) -> &PlaneClassifier {
        &self.classifier
    }

    /// Decide the fate of the voxel at `index`.
    ///
    /// Depends only on the voxel's position, its own label and the label at
    /// the probed position, so every voxel can be decided independently.
    #[inline]
    pub fn decide(
        &self,
        geometry: &Geometry,
        labels: &VolumeGrid<u8>,
        index: [usize; 3],
    ) -> VoxelOutcome {
        let point = geometry.index_to_physical(index);
        let (value, side) = self.classifier.classify(&point);

        if value.abs() < self.displacement && labels.get(index) == TOOTH_LABEL {
            return VoxelOutcome::NoiseBlended;
        }

        // Probe toward the plane from whichever side the voxel is on.
        let forward = match side {
            PlaneSide::Negative => -self.forward,
            PlaneSide::Positive | PlaneSide::OnPlane => self.forward,
        };
        match geometry.physical_to_index(&(point + forward)) {
            None => VoxelOutcome::ProbeOutOfBounds,
            Some(displaced) if labels.get(displaced) == TOOTH_LABEL => VoxelOutcome::Promoted,
            Some(_) => VoxelOutcome::Unchanged,
        }
    }

    /// Run the simulation over every voxel of the working grid.
    ///
    /// `intensity`, `labels` and `noise` must share one geometry. The inputs
    /// are only read; the returned volumes are fresh copies.
    pub fn simulate<T: Sample>(
        &self,
        intensity: &VolumeGrid<T>,
        labels: &VolumeGrid<u8>,
        noise: &VolumeGrid<T>,
    ) -> Result<SimulationOutput<T>> {
        let geometry = intensity.geometry();
        geometry.ensure_consistent_with(
            labels.geometry(),
            GEOMETRY_TOLERANCE,
            "intensity and label volumes differ",
        )?;
        geometry.ensure_consistent_with(
            noise.geometry(),
            GEOMETRY_TOLERANCE,
            "intensity and noise volumes differ",
        )?;

        let mut out_intensity = intensity.clone();
        let mut out_labels = labels.clone();

        if geometry.voxel_count() == 0 {
            return Ok(SimulationOutput {
                intensity: out_intensity,
                labels: out_labels,
                counts: SimulationCounts::default(),
            });
        }

        let [nx, ny, nz] = geometry.size();
        let slice_len = geometry.slice_len();
        let pb = voxel_progress(nz as u64, "slices simulated");

        let counts = out_intensity
            .data_mut()
            .par_chunks_mut(slice_len)
            .zip(out_labels.data_mut().par_chunks_mut(slice_len))
            .enumerate()
            .map(|(z, (intensity_slice, label_slice))| {
                let mut local = SimulationCounts::default();
                for y in 0..ny {
                    for x in 0..nx {
                        let index = [x, y, z];
                        let offset = y * nx + x;
                        let outcome = self.decide(geometry, labels, index);
                        match outcome {
                            VoxelOutcome::NoiseBlended => {
                                intensity_slice[offset] = noise.get(index);
                            }
                            VoxelOutcome::Promoted => {
                                // Keep the local, undisplaced intensity.
                                intensity_slice[offset] = intensity.get(index);
                                label_slice[offset] = TOOTH_LABEL;
                            }
                            VoxelOutcome::Unchanged | VoxelOutcome::ProbeOutOfBounds => {}
                        }
                        local.record(outcome, labels.get(index) == TOOTH_LABEL);
                    }
                }
                pb.inc(1);
                local
            })
            .reduce(SimulationCounts::default, SimulationCounts::merge);

        pb.finish_with_message("simulation complete");

        Ok(SimulationOutput {
            intensity: out_intensity,
            labels: out_labels,
            counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plane::PlaneEquation;
    use constants::label::{BACKGROUND_LABEL, DARK_LABEL};

    const NOISE_VALUE: i16 = -999;

    /// 13 x 3 x 3 grid with 1 mm spacing; x runs 0..=12.
    fn slab_volumes() -> (VolumeGrid<i16>, VolumeGrid<u8>, VolumeGrid<i16>) {
        let geometry = Geometry::axis_aligned([13, 3, 3], [1.0; 3], [0.0; 3]).unwrap();
        let mut intensity = VolumeGrid::filled(geometry.clone(), 0i16);
        let mut labels = VolumeGrid::filled(geometry.clone(), BACKGROUND_LABEL);
        for z in 0..3 {
            for y in 0..3 {
                for x in 0..13 {
                    intensity.set([x, y, z], (100 + x) as i16);
                    if (3..=8).contains(&x) {
                        labels.set([x, y, z], TOOTH_LABEL);
                    }
                }
            }
        }
        let noise = VolumeGrid::filled(geometry, NOISE_VALUE);
        (intensity, labels, noise)
    }

    fn simulator(plane: PlaneEquation, displacement: f64) -> FractureSimulator {
        FractureSimulator::new(PlaneClassifier::new(plane).unwrap(), displacement).unwrap()
    }

    #[test]
    fn plane_through_tooth_slab() {
        // -x - (-5) = 5 - x: plane at x = 5 in LPS.
        let sim = simulator(PlaneEquation::new(1.0, 0.0, 0.0, -5.0), 2.0);
        let (intensity, labels, noise) = slab_volumes();
        let out = sim.simulate(&intensity, &labels, &noise).unwrap();

        for x in 0..13usize {
            let index = [x, 1, 1];
            let original = (100 + x) as i16;
            match x {
                // |5 - x| < 2 inside the tooth: crack gap.
                4..=6 => {
                    assert_eq!(out.intensity.get(index), NOISE_VALUE, "x = {x}");
                    assert_eq!(out.labels.get(index), TOOTH_LABEL);
                }
                // Probe by +/-2 along x lands inside [3, 8].
                1 | 2 | 3 | 7 | 8 | 9 | 10 => {
                    assert_eq!(out.intensity.get(index), original, "x = {x}");
                    assert_eq!(out.labels.get(index), TOOTH_LABEL, "x = {x}");
                }
                _ => {
                    assert_eq!(out.intensity.get(index), original, "x = {x}");
                    assert_eq!(out.labels.get(index), BACKGROUND_LABEL, "x = {x}");
                }
            }
        }

        assert_eq!(out.counts.total(), 13 * 9);
        assert_eq!(out.counts.noise_blended, 3 * 9);
        assert_eq!(out.counts.newly_tooth, 4 * 9);
    }

    #[test]
    fn mirror_voxels_are_both_promoted() {
        let sim = simulator(PlaneEquation::new(1.0, 0.0, 0.0, -5.0), 2.0);
        let (intensity, labels, noise) = slab_volumes();
        let out = sim.simulate(&intensity, &labels, &noise).unwrap();
        // x = 1 and x = 9 are both 4 mm from the plane on opposite sides.
        assert_eq!(out.labels.get([1, 0, 0]), TOOTH_LABEL);
        assert_eq!(out.labels.get([9, 0, 0]), TOOTH_LABEL);
        // x = 0 and x = 10 are 5 mm away; only x = 10 probes back into tooth (x = 8).
        assert_eq!(out.labels.get([0, 0, 0]), BACKGROUND_LABEL);
        assert_eq!(out.labels.get([10, 0, 0]), TOOTH_LABEL);
    }

    #[test]
    fn labels_are_only_ever_promoted() {
        let sim = simulator(PlaneEquation::new(0.3, -0.7, 0.2, -2.0), 1.5);
        let (intensity, mut labels, noise) = slab_volumes();
        labels.set([0, 0, 0], DARK_LABEL);
        labels.set([12, 2, 2], DARK_LABEL);
        let out = sim.simulate(&intensity, &labels, &noise).unwrap();
        for (before, after) in labels.data().iter().zip(out.labels.data()) {
            assert!(after == before || *after == TOOTH_LABEL);
        }
    }

    #[test]
    fn zero_displacement_is_identity() {
        let sim = simulator(PlaneEquation::new(0.5, 0.2, 1.0, 1.0), 0.0);
        let (intensity, labels, noise) = slab_volumes();
        let out = sim.simulate(&intensity, &labels, &noise).unwrap();
        assert_eq!(out.intensity, intensity);
        assert_eq!(out.labels, labels);
        assert_eq!(out.counts.noise_blended, 0);
        assert_eq!(out.counts.newly_tooth, 0);
    }

    #[test]
    fn out_of_bounds_probe_never_promotes() {
        // Large displacement pushes every probe off the grid.
        let sim = simulator(PlaneEquation::new(1.0, 0.0, 0.0, -5.0), 50.0);
        let (intensity, labels, noise) = slab_volumes();
        let out = sim.simulate(&intensity, &labels, &noise).unwrap();
        // Every tooth voxel is within the 50 mm band.
        assert_eq!(out.counts.noise_blended, 6 * 9);
        assert_eq!(out.counts.probes_out_of_bounds, 7 * 9);
        assert_eq!(out.counts.promoted, 0);
    }

    #[test]
    fn rejects_mismatched_inputs_and_bad_displacement() {
        let classifier = PlaneClassifier::new(PlaneEquation::new(1.0, 0.0, 0.0, 0.0)).unwrap();
        assert!(FractureSimulator::new(classifier.clone(), -1.0).is_err());
        assert!(FractureSimulator::new(classifier.clone(), f64::NAN).is_err());

        let sim = FractureSimulator::new(classifier, 1.0).unwrap();
        let (intensity, _, noise) = slab_volumes();
        let other = Geometry::axis_aligned([13, 3, 3], [0.5, 1.0, 1.0], [0.0; 3]).unwrap();
        let labels = VolumeGrid::filled(other, TOOTH_LABEL);
        assert!(matches!(
            sim.simulate(&intensity, &labels, &noise),
            Err(FractureError::GeometryMismatch(_))
        ));
    }
}
