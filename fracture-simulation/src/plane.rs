/// Cutting plane evaluation in physical space
use crate::error::{FractureError, Result};
use constants::coordinate_system::RAS_TO_LPS;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Plane `ax + by + cz = d` as exported by the viewer's clipping tool (RAS).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneEquation {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl PlaneEquation {
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self { a, b, c, d }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneSide {
    Positive,
    Negative,
    OnPlane,
}

/// Classifies LPS points against a RAS-authored plane.
#[derive(Debug, Clone)]
pub struct PlaneClassifier {
    plane: PlaneEquation,
    lps_coefficients: Vector3<f64>,
    normal: Vector3<f64>,
}

impl PlaneClassifier {
    pub fn new(plane: PlaneEquation) -> Result<Self> {
        let raw = Vector3::new(plane.a, plane.b, plane.c);
        if raw.iter().chain(std::iter::once(&plane.d)).any(|v| !v.is_finite()) {
            return Err(FractureError::Configuration(format!(
                "plane coefficients must be finite, got {:?}",
                plane
            )));
        }

        let length = raw.norm();
        if length == 0.0 {
            return Err(FractureError::Configuration(
                "plane normal (a, b, c) has zero length".to_string(),
            ));
        }

        Ok(Self {
            plane,
            lps_coefficients: raw.component_mul(&Vector3::from(RAS_TO_LPS)),
            // The probe direction uses the raw coefficients, unflipped.
            normal: raw / length,
        })
    }

    /// Unit normal built from (a, b, c).
    pub fn normal(&self) -> &Vector3<f64> {
        &self.normal
    }

    /// Evaluate `-a·x - b·y + c·z - d`.
    #[inline]
    pub fn evaluate(&self, point: &Point3<f64>) -> f64 {
        self.lps_coefficients.dot(&point.coords) - self.plane.d
    }

    pub fn classify(&self, point: &Point3<f64>) -> (f64, PlaneSide) {
        let value = self.evaluate(point);
        let side = if value > 0.0 {
            PlaneSide::Positive
        } else if value < 0.0 {
            PlaneSide::Negative
        } else {
            PlaneSide::OnPlane
        };
        (value, side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn negates_x_and_y_terms() {
        let classifier = PlaneClassifier::new(PlaneEquation::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        let value = classifier.evaluate(&Point3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(value, -1.0 - 2.0 + 3.0 - 4.0);
    }

    #[test]
    fn classifies_sides() {
        let classifier = PlaneClassifier::new(PlaneEquation::new(1.0, 0.0, 0.0, -5.0)).unwrap();
        assert_eq!(classifier.classify(&Point3::new(2.0, 0.0, 0.0)).1, PlaneSide::Positive);
        assert_eq!(classifier.classify(&Point3::new(9.0, 0.0, 0.0)).1, PlaneSide::Negative);
        assert_eq!(classifier.classify(&Point3::new(5.0, 7.0, 7.0)).1, PlaneSide::OnPlane);
    }

    #[test]
    fn normal_is_normalised_raw_coefficients() {
        let classifier = PlaneClassifier::new(PlaneEquation::new(3.0, 0.0, -4.0, 1.0)).unwrap();
        assert_relative_eq!(classifier.normal().x, 0.6);
        assert_relative_eq!(classifier.normal().y, 0.0);
        assert_relative_eq!(classifier.normal().z, -0.8);
    }

    #[test]
    fn rejects_degenerate_planes() {
        assert!(matches!(
            PlaneClassifier::new(PlaneEquation::new(0.0, 0.0, 0.0, 1.0)),
            Err(FractureError::Configuration(_))
        ));
        assert!(PlaneClassifier::new(PlaneEquation::new(f64::NAN, 1.0, 0.0, 0.0)).is_err());
        assert!(PlaneClassifier::new(PlaneEquation::new(1.0, 0.0, 0.0, f64::INFINITY)).is_err());
    }
}
