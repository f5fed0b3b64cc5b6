//! Feature synchronization.
//!
//! Every feature follows the same flow: wait for a session, subscribe to its
//! documents, apply local edits to a buffer, write them back (immediately or
//! after a debounce delay) and let realtime snapshots replace the buffer.
//! [`Reconciler`] holds that logic, [`SyncController`] runs it on a tokio task,
//! and each [`Feature`] supplies the document shapes and mutations.

mod controller;
mod feature;
mod forum;
mod meal_planner;
mod medicines;
mod reconciler;
mod sugar_tracker;

pub use controller::SyncController;
pub use feature::{Feature, OpContext, WriteMode};
pub use forum::{Forum, ForumOp};
pub use meal_planner::{MealPlanOp, MealPlanner, DEFAULT_DEBOUNCE};
pub use medicines::{MedicineList, MedicineOp, Medicines};
pub use reconciler::{Effect, FeatureView, Phase, Reconciler};
pub use sugar_tracker::{SugarOp, SugarTracker};
