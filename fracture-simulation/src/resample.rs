/// Resampling volumes onto a reference grid
use crate::error::FractureError;
use crate::progress::voxel_progress;
use crate::sample::Sample;
use crate::volume::{Geometry, VolumeGrid};
use nalgebra::Vector3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Continuous indices this close to an integer are treated as that integer,
/// so grids that share sample positions reproduce values exactly.
const INDEX_SNAP_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Keeps discrete label identity.
    NearestNeighbor,
    /// Trilinear, for intensities.
    Linear,
}

/// When the reference-grid resampling happens relative to the simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResampleOrder {
    /// Intensity and labels are resampled first; simulation runs on the reference grid.
    #[default]
    BeforeSimulation,
    /// Simulation runs natively; only the final intensity is resampled.
    AfterSimulation,
}

impl FromStr for ResampleOrder {
    type Err = FractureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "before" | "before-simulation" => Ok(Self::BeforeSimulation),
            "after" | "after-simulation" => Ok(Self::AfterSimulation),
            other => Err(FractureError::Configuration(format!(
                "unknown resample order '{other}', expected 'before' or 'after'"
            ))),
        }
    }
}

/// Resample `source` onto `reference`.
///
/// Output points whose continuous index falls outside the source buffer
/// (half a voxel beyond the first/last sample) get the default value 0.
pub fn resample<T: Sample>(
    source: &VolumeGrid<T>,
    reference: &Geometry,
    interpolation: Interpolation,
) -> VolumeGrid<T> {
    let mut output = VolumeGrid::filled(reference.clone(), T::default());
    if reference.voxel_count() == 0 || source.geometry().voxel_count() == 0 {
        return output;
    }

    let [nx, ny, nz] = reference.size();
    let pb = voxel_progress(nz as u64, "slices resampled");

    output
        .data_mut()
        .par_chunks_mut(reference.slice_len())
        .enumerate()
        .for_each(|(z, slice)| {
            for y in 0..ny {
                for x in 0..nx {
                    let point = reference.index_to_physical([x, y, z]);
                    let continuous = snap(source.geometry().physical_to_continuous_index(&point));
                    slice[y * nx + x] = match interpolation {
                        Interpolation::NearestNeighbor => nearest(source, &continuous),
                        Interpolation::Linear => trilinear(source, &continuous),
                    }
                    .unwrap_or_default();
                }
            }
            pb.inc(1);
        });

    pb.finish_with_message("resampling complete");
    output
}

fn snap(mut continuous: Vector3<f64>) -> Vector3<f64> {
    for c in continuous.iter_mut() {
        let rounded = c.round();
        if (*c - rounded).abs() < INDEX_SNAP_TOLERANCE {
            *c = rounded;
        }
    }
    continuous
}

fn inside_buffer(size: [usize; 3], continuous: &Vector3<f64>) -> bool {
    (0..3).all(|a| continuous[a] >= -0.5 && continuous[a] < size[a] as f64 - 0.5)
}

fn nearest<T: Sample>(source: &VolumeGrid<T>, continuous: &Vector3<f64>) -> Option<T> {
    let size = source.geometry().size();
    if !inside_buffer(size, continuous) {
        return None;
    }
    let mut index = [0usize; 3];
    for axis in 0..3 {
        index[axis] = ((continuous[axis] + 0.5).floor() as usize).min(size[axis] - 1);
    }
    Some(source.get(index))
}

fn trilinear<T: Sample>(source: &VolumeGrid<T>, continuous: &Vector3<f64>) -> Option<T> {
    let size = source.geometry().size();
    if !inside_buffer(size, continuous) {
        return None;
    }

    let mut base = [0i64; 3];
    let mut fraction = [0.0f64; 3];
    for axis in 0..3 {
        let floor = continuous[axis].floor();
        base[axis] = floor as i64;
        fraction[axis] = continuous[axis] - floor;
    }

    let mut value = 0.0;
    for corner in 0..8usize {
        let mut weight = 1.0;
        let mut index = [0usize; 3];
        for axis in 0..3 {
            let upper = (corner >> axis) & 1 == 1;
            weight *= if upper {
                fraction[axis]
            } else {
                1.0 - fraction[axis]
            };
            // Neighbours past either edge reuse the edge sample.
            let i = base[axis] + upper as i64;
            index[axis] = i.clamp(0, size[axis] as i64 - 1) as usize;
        }
        if weight > 0.0 {
            value += weight * source.get(index).to_f64();
        }
    }

    Some(T::from_f64_clamped(value))
}
