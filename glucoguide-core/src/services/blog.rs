//! Blog posts: one-shot reads and the create-post form. Posts are public to
//! read; publishing needs a session.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::AppError;
use crate::identity::IdentityProvider;
use crate::models::{BlogDraft, BlogPost};
use crate::store::{BlobStore, DocPath, DocumentSchema, Query, RemoteStore, UploadProgress, Write};

pub const COLLECTION: &str = "blogPosts";
const IMAGE_PREFIX: &str = "blog_images";

/// An image attached to a form, as picked from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Final path component of the picked file, or `None` if there is none.
    pub(crate) fn base_name(&self) -> Option<&str> {
        Path::new(&self.file_name)
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.trim().is_empty())
    }
}

pub struct BlogService {
    store: Arc<dyn RemoteStore>,
    blobs: Arc<dyn BlobStore>,
    identity: IdentityProvider,
}

impl BlogService {
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

    /// Every post, newest first. Malformed documents are skipped.
    pub async fn list(&self) -> Result<Vec<BlogPost>, AppError> {
        let snapshot = self.store.query(&Query::collection(COLLECTION)).await?;
        let mut posts: Vec<BlogPost> = snapshot
            .documents
            .iter()
            .filter_map(|doc| match BlogPost::decode(&doc.path, &doc.data) {
                Ok(post) => Some(post),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping invalid blog post");
                    None
                }
            })
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(posts)
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<BlogPost>, AppError> {
        let query = Query::where_eq(COLLECTION, "slug", slug.trim());
        let snapshot = self.store.query(&query).await?;
        match snapshot.documents.first() {
            Some(doc) => Ok(Some(BlogPost::decode(&doc.path, &doc.data)?)),
            None => Ok(None),
        }
    }

    /// Publishes a post, uploading `image` first when given.
    ///
    /// Upload progress is reported on `progress`. A slug already in use is
    /// rejected.
    pub async fn create(
        &self,
        draft: BlogDraft,
        image: Option<ImageUpload>,
        progress: &watch::Sender<UploadProgress>,
    ) -> Result<BlogPost, AppError> {
        if self.identity.current().is_none() {
            return Err(AppError::AuthRequired);
        }
        let slug = draft.validate()?;
        if self.find_by_slug(&slug).await?.is_some() {
            return Err(AppError::validation(format!(
                "A post with slug '{}' already exists",
                slug
            )));
        }

        let id = Uuid::new_v4().to_string();
        let image = match image {
            Some(upload) => {
                let name = upload
                    .base_name()
                    .ok_or_else(|| AppError::validation("Image file name is invalid"))?;
                let object = format!("{}/{}_{}", IMAGE_PREFIX, id, name);
                Some(self.blobs.upload(&object, &upload.bytes, progress).await?)
            }
            None => None,
        };

        let post = BlogPost {
            id: id.clone(),
            title: draft.title.trim().to_string(),
            slug,
            summary: draft.summary.trim().to_string(),
            image,
            content: draft.content,
            created_at: Some(Utc::now()),
        };
        self.store
            .commit(vec![Write::Set {
                path: DocPath::new(COLLECTION, &id)?,
                data: post.encode(),
            }])
            .await?;
        tracing::info!(id = %post.id, slug = %post.slug, "blog post created");
        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Session;
    use crate::store::{LocalBlobStore, MemoryStore};
    use tempfile::TempDir;

    fn service(dir: &TempDir, signed_in: bool) -> (BlogService, MemoryStore) {
        let store = MemoryStore::new();
        let session = signed_in.then(|| Session::authenticated("u1", "a@example.com"));
        let service = BlogService::new(
            Arc::new(store.clone()),
            Arc::new(LocalBlobStore::new(dir.path())),
            IdentityProvider::new(session),
        );
        (service, store)
    }

    #[tokio::test]
    async fn test_create_with_image_and_lookup() {
        let dir = TempDir::new().unwrap();
        let (service, _store) = service(&dir, true);
        let (tx, rx) = watch::channel(UploadProgress::default());

        let post = service
            .create(
                BlogDraft::new("Low GI Breakfasts", "Ideas", "Oatmeal and eggs"),
                Some(ImageUpload::new("/home/ann/oats.png", vec![1u8; 1000])),
                &tx,
            )
            .await
            .unwrap();

        assert_eq!(post.slug, "low-gi-breakfasts");
        let image = post.image.clone().unwrap();
        assert!(image.starts_with("file://"));
        assert!(image.ends_with("_oats.png"));
        assert!(rx.borrow().is_complete());

        let found = service.find_by_slug("low-gi-breakfasts").await.unwrap().unwrap();
        assert_eq!(found, post);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let dir = TempDir::new().unwrap();
        let (service, _store) = service(&dir, true);
        let (tx, _rx) = watch::channel(UploadProgress::default());
        for title in ["First", "Second"] {
            service
                .create(BlogDraft::new(title, "s", "c"), None, &tx)
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        let titles: Vec<String> = service.list().await.unwrap().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["Second", "First"]);
    }

    #[tokio::test]
    async fn test_create_requires_session_and_unique_slug() {
        let dir = TempDir::new().unwrap();
        let (tx, _rx) = watch::channel(UploadProgress::default());

        let (anonymous, _) = service(&dir, false);
        let err = anonymous
            .create(BlogDraft::new("T", "s", "c"), None, &tx)
            .await
            .unwrap_err();
        assert_eq!(err, AppError::AuthRequired);

        let (service, store) = service(&dir, true);
        service.create(BlogDraft::new("T", "s", "c"), None, &tx).await.unwrap();
        let err = service
            .create(BlogDraft::new("T", "s2", "c2"), None, &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationFailed(_)));
        assert_eq!(store.commit_count(), 1);
    }
}
