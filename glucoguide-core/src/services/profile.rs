//! Profile page: attributes on `users/<uid>` mirrored onto the session.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;

use super::blog::ImageUpload;
use crate::error::AppError;
use crate::identity::{IdentityProvider, Session};
use crate::models::{ProfileUpdate, UserProfile};
use crate::store::{BlobStore, DocPath, Document, DocumentSchema, RemoteStore, UploadProgress, Write};

const PHOTO_PREFIX: &str = "profile_pictures";

pub struct ProfileService {
    store: Arc<dyn RemoteStore>,
    blobs: Arc<dyn BlobStore>,
    identity: IdentityProvider,
}

impl ProfileService {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        blobs: Arc<dyn BlobStore>,
        identity: IdentityProvider,
    ) -> Self {
        Self {
            store,
            blobs,
            identity,
        }
    }

    /// `users/<owner>`
    pub fn profile_path(owner: &str) -> Result<DocPath, AppError> {
        Ok(DocPath::new("users", owner)?)
    }

    fn session(&self) -> Result<Session, AppError> {
        self.identity.current().ok_or(AppError::AuthRequired)
    }

    /// The signed-in user's profile. A missing document reads as an empty
    /// profile named after the session.
    pub async fn load(&self) -> Result<UserProfile, AppError> {
        let session = self.session()?;
        let path = Self::profile_path(session.owner_id())?;
        let mut profile = match self.store.get(&path).await? {
            Some(doc) => UserProfile::decode(&doc.path, &doc.data)?,
            None => UserProfile::default(),
        };
        if profile.display_name.is_none() {
            profile.display_name = session.display_name.clone();
        }
        if profile.photo_url.is_none() {
            profile.photo_url = session.photo_url.clone();
        }
        Ok(profile)
    }

    /// Merges the form into the profile document and updates the session's
    /// display name.
    pub async fn update(&self, update: ProfileUpdate) -> Result<UserProfile, AppError> {
        let session = self.session()?;
        if update.is_empty() {
            return Err(AppError::validation("Nothing to update"));
        }
        if matches!(&update.display_name, Some(name) if name.trim().is_empty()) {
            return Err(AppError::validation("Display name cannot be empty"));
        }

        self.store
            .commit(vec![Write::Merge {
                path: Self::profile_path(session.owner_id())?,
                fields: update.fields(),
            }])
            .await?;
        if let Some(name) = &update.display_name {
            self.identity
                .update_profile(Some(name.trim().to_string()), None)?;
        }
        tracing::info!(owner = session.owner_id(), "profile updated");
        self.load().await
    }

    /// Uploads a new profile photo and records its URL on the document and
    /// the session.
    pub async fn upload_photo(
        &self,
        photo: ImageUpload,
        progress: &watch::Sender<UploadProgress>,
    ) -> Result<String, AppError> {
        let session = self.session()?;
        let name = photo
            .base_name()
            .ok_or_else(|| AppError::validation("Photo file name is invalid"))?;
        if photo.bytes.is_empty() {
            return Err(AppError::validation("Photo is empty"));
        }
        let object = format!("{}/{}/{}", PHOTO_PREFIX, session.owner_id(), name);
        let url = self.blobs.upload(&object, &photo.bytes, progress).await?;

        let mut fields = Document::new();
        fields.insert("photoURL".to_string(), Value::String(url.clone()));
        self.store
            .commit(vec![Write::Merge {
                path: Self::profile_path(session.owner_id())?,
                fields,
            }])
            .await?;
        self.identity.update_profile(None, Some(url.clone()))?;
        Ok(url)
    }
}
