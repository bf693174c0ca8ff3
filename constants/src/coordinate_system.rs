/// Axis flip between the plane-authoring space (RAS) and volume space (LPS).
/// Plane equations come from the viewer in RAS while voxel positions are LPS,
/// so the X and Y terms of the equation change sign.
pub const RAS_TO_LPS: [f64; 3] = [-1.0, -1.0, 1.0];

/// Space names that describe RAS-oriented volume files.
pub const RAS_SPACE_NAMES: &[&str] = &["right-anterior-superior", "ras"];

/// Space names that describe LPS-oriented volume files.
pub const LPS_SPACE_NAMES: &[&str] = &["left-posterior-superior", "lps"];
