#![deny(missing_docs)]

//! Seeded rerandomization designs for balanced RCTs.
//!
//! A [`Design`] draws candidate assignments from a generator seeded by the
//! dataset content hash, scores them with a balance objective, and keeps
//! either the best draw or a uniform pick among the top quantile.

/// YAML configuration schema and defaults.
pub mod config;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Design layer and public `assign` entry point.
pub mod design;
/// Run manifest serialization helpers.
pub mod manifest;
/// Bounded top-K selector.
pub mod quantile;

pub use config::{DesignConfig, ObjectiveSpec};
pub use determinism::PICK_SUBSTREAM;
pub use design::{Design, DesignOutcome, SearchPolicy, SearchSummary};
pub use manifest::DesignManifest;
pub use quantile::{capacity_for, TopK};
