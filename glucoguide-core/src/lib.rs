//! GlucoGuide Core Library
//!
//! Models, the document store contract, identity, feature synchronization and
//! the AI endpoint contracts shared by the GlucoGuide CLI and proxy server.

pub mod ai;
pub mod error;
pub mod identity;
pub mod models;
pub mod services;
pub mod state;
pub mod store;
pub mod sync;

pub use ai::{AiClient, BlogContent, BlogContentRequest, GiEstimate, GiRequest, GiResponse, NewsItem};
pub use error::AppError;
pub use identity::{Identity, IdentityProvider, Session};
pub use models::{
    BlogDraft, BlogPost, FoodItem, ForumBoard, ForumPost, ItemRef, MealPlan, MealSlot, Medicine,
    MedicineDraft, ProfileUpdate, Reply, SugarCategory, SugarLevel, SugarLog, SugarReading, Totals,
    UserProfile,
};
pub use services::{BlogService, ImageUpload, ProfileService};
pub use state::{AppState, StateError};
pub use store::{
    BlobStore, DocPath, LocalBlobStore, MemoryStore, RemoteStore, Snapshot, StoreError,
    UploadProgress,
};
pub use sync::{
    FeatureView, Forum, ForumOp, MealPlanOp, MealPlanner, MedicineList, MedicineOp, Medicines,
    Phase, SugarOp, SugarTracker, SyncController,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
