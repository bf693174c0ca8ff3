/// Shared constants for the fracture simulation workspace
pub mod coordinate_system;
pub mod label;
pub mod simulation;
