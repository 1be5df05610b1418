//! Supplier sustainability scoring.
//!
//! Raw supplier attributes and a text embedding flow through a fixed pipeline: feature
//! preparation, sub-score and overall eco score prediction, and recommendation derivation.
//! The [`suppliers::SupplierPipeline`] drives each supplier through those stages against
//! injected store, embedding, and image-storage handles.

pub mod assistant;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod import;
pub mod suppliers;
pub mod telemetry;
