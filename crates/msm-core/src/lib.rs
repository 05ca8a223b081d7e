//! # msmpipe Core Library
//!
//! A reproducible pipeline for building Markov state models (MSMs) from molecular dynamics
//! trajectories: pairwise distance featurization, TICA dimensionality reduction, k-means
//! discretization, and reversible transition-matrix estimation with VAMP-2 scoring.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same three-layer split throughout:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Topology`, `Trajectory`), file I/O
//!   for structures, trajectories and artifacts, and the numerical estimators (`features`,
//!   `decomposition`, `clustering`, `msm`). Nothing in this layer knows about run flags or
//!   the order of pipeline stages.
//!
//! - **[`engine`]: The Control Layer.** Pipeline configuration, the trajectory selection rules
//!   (bootstrap and quick runs), the artifact store that honours the save flag, progress
//!   reporting and the aggregate error type.
//!
//! - **[`workflows`]: The Public API.** The `build_model` workflow ties the two layers together
//!   and runs the stages in their fixed order.

pub mod core;
pub mod engine;
pub mod workflows;
