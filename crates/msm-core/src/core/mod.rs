//! # Core Module
//!
//! This module provides the building blocks of the MSM pipeline: molecular data models,
//! file formats, linear algebra helpers and the numerical estimators for every stage.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Topologies, frames and trajectories
//! - **File I/O** ([`io`]) - GRO/PDB trajectory readers and `.npy`/`.npz` artifact persistence
//! - **Featurization** ([`features`]) - Pairwise C-alpha distance features
//! - **Dimensionality Reduction** ([`decomposition`]) - Time-lagged covariances, TICA and VAMP
//! - **Discretization** ([`clustering`]) - k-means with k-means++ seeding
//! - **Kinetic Models** ([`msm`]) - Count matrices, reversible MLE and VAMP-2 cross-validation
//!
//! ## Conventions
//!
//! - Coordinates are stored in nanometres; PDB input is converted from angstrom on read.
//! - Feature and reduced trajectories are `ndarray::Array2<f64>` with one row per frame.
//! - Dense linear algebra (eigen-decompositions, SVD) goes through `nalgebra`.

pub mod clustering;
pub mod decomposition;
pub mod features;
pub mod io;
pub mod models;
pub mod msm;
pub mod utils;
