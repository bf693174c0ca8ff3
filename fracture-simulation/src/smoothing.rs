/// Gaussian smoothing approximated by repeated box filters
use crate::error::{FractureError, Result};
use crate::sample::Sample;
use crate::volume::VolumeGrid;
use rayon::prelude::*;

/// Box filter passes per axis; three passes are close to a true Gaussian.
const BOX_PASSES: usize = 3;

/// Box widths whose repeated application approximates a Gaussian of `sigma`
/// (in voxels). Widths are odd; widths below 3 are no-ops.
fn box_sizes(sigma: f64, passes: usize) -> Vec<usize> {
    if sigma <= 0.0 || passes == 0 {
        return vec![0; passes];
    }

    let n = passes as f64;
    let ideal = (12.0 * sigma * sigma / n + 1.0).sqrt();
    let mut lower = ideal.floor() as usize;
    if lower % 2 == 0 {
        lower = lower.saturating_sub(1);
    }
    let upper = lower + 2;

    let wl = lower as f64;
    let m_ideal = (12.0 * sigma * sigma - n * wl * wl - 4.0 * n * wl - 3.0 * n) / (-4.0 * wl - 4.0);
    let m = m_ideal.round().clamp(0.0, n) as usize;

    (0..passes).map(|i| if i < m { lower } else { upper }).collect()
}

/// Moving average of width `width` with a window that shrinks at the edges.
fn box_filter_line(line: &mut [f64], width: usize) {
    let n = line.len();
    if width < 3 || n < 2 {
        return;
    }
    let radius = (width / 2).min(n - 1);

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    let mut running = 0.0;
    for &v in line.iter() {
        running += v;
        prefix.push(running);
    }

    for (i, value) in line.iter_mut().enumerate() {
        let lo = i.saturating_sub(radius);
        let hi = (i + radius).min(n - 1);
        *value = (prefix[hi + 1] - prefix[lo]) / (hi - lo + 1) as f64;
    }
}

/// Apply every box pass along one axis of a flat x-fastest buffer.
fn filter_axis(data: &mut [f64], size: [usize; 3], axis: usize, widths: &[usize]) {
    if widths.iter().all(|&w| w < 3) || size[axis] < 2 {
        return;
    }

    let stride = match axis {
        0 => 1,
        1 => size[0],
        _ => size[0] * size[1],
    };
    let (outer_a, outer_b) = match axis {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };
    let line_count = size[outer_a] * size[outer_b];
    let len = size[axis];

    let line_start = |line: usize| {
        let mut index = [0usize; 3];
        index[outer_a] = line % size[outer_a];
        index[outer_b] = line / size[outer_a];
        (index[2] * size[1] + index[1]) * size[0] + index[0]
    };

    let source: &[f64] = data;
    let filtered: Vec<Vec<f64>> = (0..line_count)
        .into_par_iter()
        .map(|line| {
            let start = line_start(line);
            let mut values: Vec<f64> = (0..len).map(|k| source[start + k * stride]).collect();
            for &width in widths {
                box_filter_line(&mut values, width);
            }
            values
        })
        .collect();

    for (line, values) in filtered.into_iter().enumerate() {
        let start = line_start(line);
        for (k, v) in values.into_iter().enumerate() {
            data[start + k * stride] = v;
        }
    }
}

/// Smooth a volume with an isotropic Gaussian of `sigma_mm` millimetres.
pub fn gaussian_smooth<T: Sample>(volume: &VolumeGrid<T>, sigma_mm: f64) -> Result<VolumeGrid<T>> {
    if !sigma_mm.is_finite() || sigma_mm < 0.0 {
        return Err(FractureError::Configuration(format!(
            "smoothing sigma must be finite and non-negative, got {sigma_mm}"
        )));
    }
    if sigma_mm == 0.0 {
        return Ok(volume.clone());
    }

    let geometry = volume.geometry();
    let size = geometry.size();
    let mut data: Vec<f64> = volume.data().iter().map(|v| v.to_f64()).collect();

    for axis in 0..3 {
        let sigma_voxels = sigma_mm / geometry.spacing()[axis];
        let widths = box_sizes(sigma_voxels, BOX_PASSES);
        log::debug!("axis {axis}: sigma {sigma_voxels:.3} voxels, box widths {widths:?}");
        filter_axis(&mut data, size, axis, &widths);
    }

    let samples = data.into_iter().map(T::from_f64_rounded).collect();
    VolumeGrid::new(geometry.clone(), samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::Geometry;

    #[test]
    fn box_sizes_are_odd_and_grow_with_sigma() {
        let small = box_sizes(1.0, 3);
        let large = box_sizes(5.0, 3);
        assert_eq!(small.len(), 3);
        for &w in small.iter().chain(&large) {
            assert_eq!(w % 2, 1, "width {w} should be odd");
        }
        assert!(large.iter().sum::<usize>() > small.iter().sum::<usize>());
        assert_eq!(box_sizes(0.0, 3), vec![0, 0, 0]);
    }

    #[test]
    fn box_filter_shrinks_window_at_edges() {
        let mut line = vec![0.0, 0.0, 9.0, 0.0, 0.0];
        box_filter_line(&mut line, 3);
        assert_eq!(line, vec![0.0, 3.0, 3.0, 3.0, 0.0]);

        let mut edge = vec![6.0, 0.0, 0.0];
        box_filter_line(&mut edge, 3);
        assert_eq!(edge, vec![3.0, 2.0, 0.0]);
    }

    #[test]
    fn uniform_volume_stays_uniform() {
        let geometry = Geometry::axis_aligned([9, 7, 5], [0.5, 0.5, 1.0], [0.0; 3]).unwrap();
        let volume = VolumeGrid::filled(geometry, 1234i16);
        let smoothed = gaussian_smooth(&volume, 1.5).unwrap();
        assert_eq!(smoothed, volume);
    }

    #[test]
    fn smoothing_spreads_a_spike_and_preserves_mass() {
        let geometry = Geometry::axis_aligned([15, 15, 15], [1.0; 3], [0.0; 3]).unwrap();
        let mut volume = VolumeGrid::filled(geometry, 0.0f32);
        volume.set([7, 7, 7], 1000.0);
        let smoothed = gaussian_smooth(&volume, 1.0).unwrap();
        assert!(smoothed.get([7, 7, 7]) < 1000.0);
        assert!(smoothed.get([8, 7, 7]) > 0.0);
        let total: f32 = smoothed.data().iter().sum();
        assert!((total - 1000.0).abs() < 0.5, "mass {total}");
    }

    #[test]
    fn rejects_negative_sigma() {
        let geometry = Geometry::axis_aligned([2, 2, 2], [1.0; 3], [0.0; 3]).unwrap();
        let volume = VolumeGrid::filled(geometry, 0i16);
        assert!(gaussian_smooth(&volume, -1.0).is_err());
        assert_eq!(gaussian_smooth(&volume, 0.0).unwrap(), volume);
    }
}
