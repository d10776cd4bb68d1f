//! # Client-Side Prediction
//!
//! Local intents apply immediately; the authority confirms, rejects or
//! silently corrects later. Three collaborators:
//!
//! - [`CommandBuffer`] tracks in-flight commands by id
//! - [`PredictionEngine`] applies speculative mutations and rolls back
//!   rejections
//! - [`StateReconciler`] turns authoritative deviations into corrections

pub mod command;
pub mod prediction;
pub mod reconcile;

pub use command::CommandBuffer;
pub use prediction::PredictionEngine;
pub use reconcile::{Correction, Severity, StateReconciler};
