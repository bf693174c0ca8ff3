/// Shared configuration for the fracture simulation passes

/// Divisor applied to the dark-region standard deviation before noise synthesis
pub const DEFAULT_CORRECTION_FACTOR: f64 = 5.0;

/// Voxels per independently seeded noise chunk
pub const NOISE_CHUNK_SIZE: usize = 1 << 16;

/// Voxels per chunk for the parallel region statistics reduction
pub const STATISTICS_CHUNK_SIZE: usize = 25_000;

/// Tolerance used when comparing geometry of volumes derived from one source
pub const GEOMETRY_TOLERANCE: f64 = 1e-6;

/// Progress bar layout shared by every long-running pass
pub const PROGRESS_TEMPLATE: &str = "[{bar:40.cyan/blue}] {pos}/{len} {msg} ({percent}%)";

/// Progress bar fill characters
pub const PROGRESS_CHARS: &str = "▉▊▋▌▍▎▏ ";
