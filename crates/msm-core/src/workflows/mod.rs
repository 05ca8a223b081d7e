//! # Workflows Module
//!
//! Top-level entry points that run complete analyses.
//!
//! ## Overview
//!
//! A workflow owns the order of the stages. It loads inputs, calls the core
//! estimators with parameters from a validated [`crate::engine::config::PipelineConfig`],
//! hands each result to the next stage in memory and reports progress as it goes.
//!
//! - **Model Building** ([`build_model`]) - Featurize, reduce, discretize, estimate and score
//!   an MSM from a set of trajectories.

pub mod build_model;
