/// Regular 3-D sample grids with physical geometry
use crate::error::{FractureError, Result};
use crate::sample::Sample;
use nalgebra::{Matrix3, Point3, Vector3};

/// Placement of a voxel grid in physical (LPS millimetre) space.
///
/// `point = origin + direction * diag(spacing) * index`, with the index
/// running x fastest, then y, then z.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    size: [usize; 3],
    spacing: Vector3<f64>,
    origin: Point3<f64>,
    direction: Matrix3<f64>,
    index_to_physical: Matrix3<f64>,
    physical_to_index: Matrix3<f64>,
}

impl Geometry {
    /// Create a geometry, rejecting non-positive spacing, singular directions
    /// and sizes whose voxel count overflows.
    pub fn new(
        size: [usize; 3],
        spacing: Vector3<f64>,
        origin: Point3<f64>,
        direction: Matrix3<f64>,
    ) -> Result<Self> {
        if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(FractureError::InvalidVolume(format!(
                "spacing must be positive and finite, got {:?}",
                spacing.as_slice()
            )));
        }
        if origin.iter().any(|o| !o.is_finite()) {
            return Err(FractureError::InvalidVolume(format!(
                "origin must be finite, got {:?}",
                origin.coords.as_slice()
            )));
        }

        if size.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n)).is_none() {
            return Err(FractureError::InvalidVolume(format!(
                "size {size:?} has more voxels than can be addressed"
            )));
        }

        let index_to_physical = direction * Matrix3::from_diagonal(&spacing);
        let physical_to_index = index_to_physical.try_inverse().ok_or_else(|| {
            FractureError::InvalidVolume("direction matrix is singular".to_string())
        })?;

        Ok(Self {
            size,
            spacing,
            origin,
            direction,
            index_to_physical,
            physical_to_index,
        })
    }

    /// Axis-aligned geometry with identity direction cosines.
    pub fn axis_aligned(size: [usize; 3], spacing: [f64; 3], origin: [f64; 3]) -> Result<Self> {
        Self::new(
            size,
            Vector3::from(spacing),
            Point3::from(origin),
            Matrix3::identity(),
        )
    }

    pub fn size(&self) -> [usize; 3] {
        self.size
    }

    pub fn spacing(&self) -> &Vector3<f64> {
        &self.spacing
    }

    pub fn origin(&self) -> &Point3<f64> {
        &self.origin
    }

    pub fn direction(&self) -> &Matrix3<f64> {
        &self.direction
    }

    pub fn voxel_count(&self) -> usize {
        self.size[0] * self.size[1] * self.size[2]
    }

    /// Voxels in one z slice.
    pub fn slice_len(&self) -> usize {
        self.size[0] * self.size[1]
    }

    #[inline]
    pub fn linear_index(&self, index: [usize; 3]) -> usize {
        (index[2] * self.size[1] + index[1]) * self.size[0] + index[0]
    }

    #[inline]
    pub fn index_to_physical(&self, index: [usize; 3]) -> Point3<f64> {
        self.continuous_index_to_physical(&Vector3::new(
            index[0] as f64,
            index[1] as f64,
            index[2] as f64,
        ))
    }

    #[inline]
    pub fn continuous_index_to_physical(&self, index: &Vector3<f64>) -> Point3<f64> {
        self.origin + self.index_to_physical * index
    }

    #[inline]
    pub fn physical_to_continuous_index(&self, point: &Point3<f64>) -> Vector3<f64> {
        self.physical_to_index * (point - self.origin)
    }

    /// Nearest grid index for a physical point, rounding half up on each axis.
    /// Returns `None` when the point falls outside the grid.
    #[inline]
    pub fn physical_to_index(&self, point: &Point3<f64>) -> Option<[usize; 3]> {
        let continuous = self.physical_to_continuous_index(point);
        let mut index = [0usize; 3];
        for axis in 0..3 {
            let rounded = (continuous[axis] + 0.5).floor();
            if !(rounded >= 0.0 && rounded < self.size[axis] as f64) {
                return None;
            }
            index[axis] = rounded as usize;
        }
        Some(index)
    }

    /// True when both geometries describe the same grid within `tolerance`.
    pub fn is_consistent_with(&self, other: &Geometry, tolerance: f64) -> bool {
        self.size == other.size
            && (self.spacing - other.spacing).amax() <= tolerance
            && (self.origin - other.origin).amax() <= tolerance
            && (self.direction - other.direction).amax() <= tolerance
    }

    pub fn ensure_consistent_with(
        &self,
        other: &Geometry,
        tolerance: f64,
        what: &str,
    ) -> Result<()> {
        if self.is_consistent_with(other, tolerance) {
            return Ok(());
        }
        Err(FractureError::GeometryMismatch(format!(
            "{what}: size {:?} vs {:?}, spacing {:?} vs {:?}, origin {:?} vs {:?}",
            self.size,
            other.size,
            self.spacing.as_slice(),
            other.spacing.as_slice(),
            self.origin.coords.as_slice(),
            other.origin.coords.as_slice(),
        )))
    }
}

/// Scalar field sampled on a [`Geometry`].
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeGrid<T> {
    geometry: Geometry,
    data: Vec<T>,
}

impl<T: Sample> VolumeGrid<T> {
    pub fn new(geometry: Geometry, data: Vec<T>) -> Result<Self> {
        let expected = geometry.voxel_count();
        if data.len() != expected {
            return Err(FractureError::InvalidVolume(format!(
                "size {:?} needs {} samples but {} were provided",
                geometry.size(),
                expected,
                data.len()
            )));
        }
        Ok(Self { geometry, data })
    }

    pub fn filled(geometry: Geometry, value: T) -> Self {
        let data = vec![value; geometry.voxel_count()];
        Self { geometry, data }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    #[inline]
    pub fn get(&self, index: [usize; 3]) -> T {
        self.data[self.geometry.linear_index(index)]
    }

    #[inline]
    pub fn set(&mut self, index: [usize; 3], value: T) {
        let linear = self.geometry.linear_index(index);
        self.data[linear] = value;
    }
}
