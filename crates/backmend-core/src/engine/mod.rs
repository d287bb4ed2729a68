//! # Engine Module
//!
//! The stateful components of the correction pipeline.
//!
//! ## Overview
//!
//! Data flows through the engine in a fixed order: the padded length is
//! planned ([`padding`]), angle features are aligned to it ([`features`]), the
//! missing-residue mask is derived ([`mask`]) and handed with the features to
//! a generative model ([`sampler`]). Rebuilt candidates are refined by batched
//! gradient descent ([`refinement`], [`batch`]) and the best is picked by a
//! quality score ([`selection`]).
//!
//! Cross-cutting pieces live beside them: builder-style configuration
//! ([`config`]), progress events ([`progress`]) and the aggregated
//! [`error::EngineError`].

pub mod batch;
pub mod config;
pub mod error;
pub mod features;
pub mod mask;
pub mod padding;
pub mod progress;
pub mod refinement;
pub mod sampler;
pub mod selection;
