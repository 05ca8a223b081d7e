//! # Core Models Module
//!
//! Data structures describing the molecular input of the pipeline.
//!
//! - [`topology`] - Per-atom identity (atom name, residue name and number) shared by all frames
//! - [`trajectory`] - Frames of coordinates with optional periodic box, and their ordered sequence
//!
//! A [`topology::Topology`] is read once from the reference structure; every trajectory
//! loaded afterwards must have the same number of atoms per frame.

pub mod topology;
pub mod trajectory;
