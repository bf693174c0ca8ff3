/// Synthetic tooth fractures for training-data generation
// A tooth scan is cut along a plane: tooth voxels near the plane become noise
// drawn from the dark-region statistics, and voxels whose probe across the
// plane lands in tooth are relabelled. `FracturePipeline` runs it from files.
pub use error::{FractureError, Result};
pub use pipeline::{FractureConfig, FracturePipeline};
pub use plane::{PlaneClassifier, PlaneEquation, PlaneSide};
pub use resample::{Interpolation, ResampleOrder};
pub use simulator::{FractureSimulator, SimulationCounts, VoxelOutcome};
pub use volume::{Geometry, VolumeGrid};

pub mod error;
pub mod io;
pub mod noise;
pub mod pipeline;
pub mod plane;
mod progress;
pub mod report;
pub mod resample;
pub mod sample;
pub mod simulator;
pub mod smoothing;
pub mod statistics;
pub mod volume;
