//! Request/response features that read once and write on submit, without a
//! realtime subscription.

mod blog;
mod profile;

pub use blog::{BlogService, ImageUpload, COLLECTION as BLOG_COLLECTION};
pub use profile::ProfileService;
