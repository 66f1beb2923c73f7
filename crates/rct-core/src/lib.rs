#![deny(missing_docs)]
//! Core data model for balanced randomized controlled trial design.
//!
//! This crate holds everything the balance objectives and the rerandomization
//! search share: the error surface, the dataset table, arm weights, the
//! assignment resolver, deterministic seeding and the raw label draws.

pub mod assignment;
pub mod dataset;
pub mod draw;
pub mod errors;
pub mod provenance;
pub mod rng;
pub mod weights;

pub use assignment::{labels_to_positions, resolve, ArmMembers, Assignment, ResolvedArms};
pub use dataset::{Column, Covariate, Dataset};
pub use draw::{draw_iid, draw_shuffled, DrawMethod};
pub use errors::{ErrorInfo, RctError};
pub use provenance::{DesignProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, working_seed, RngHandle};
pub use weights::{WeightSpec, WeightVector, WEIGHT_TOLERANCE};
