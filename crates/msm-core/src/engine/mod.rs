//! # Engine Module
//!
//! The control layer between the numerical core and the workflows.
//!
//! ## Overview
//!
//! The core estimators know nothing about run flags, file names or the order in
//! which stages run. This module supplies that context: it validates the run
//! configuration, decides which trajectories take part, routes artifacts to disk
//! (or nowhere, when saving is off) and carries progress events to the caller.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Stage parameters, run flags and the builder that validates them
//! - **Trajectory Selection** ([`selection`]) - Path resolution, bootstrap subsampling and quick runs
//! - **Artifact Store** ([`store`]) - Fixed artifact names, gated by the save flag
//! - **Progress Monitoring** ([`progress`]) - Phase and task events for user interfaces
//! - **Error Handling** ([`error`]) - The aggregate error of a pipeline run

pub mod config;
pub mod error;
pub mod progress;
pub mod selection;
pub mod store;
