use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;
use crate::store::{decode_fields, encode_fields, DocPath, Document, DocumentSchema, SchemaError};

/// A published blog article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    #[serde(skip)]
    pub id: String,
    pub title: String,
    pub slug: String,
    pub summary: String,
    #[serde(default)]
    pub image: Option<String>,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl DocumentSchema for BlogPost {
    const KIND: &'static str = "blog post";

    fn decode(path: &DocPath, data: &Document) -> Result<Self, SchemaError> {
        let mut post: BlogPost = decode_fields(Self::KIND, path, data)?;
        post.id = path.id().to_string();
        Ok(post)
    }

    fn encode(&self) -> Document {
        encode_fields(self)
    }
}

impl fmt::Display for BlogPost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{}", "=".repeat(self.title.chars().count()))?;
        if let Some(at) = self.created_at {
            writeln!(f, "Published: {}", at.format("%Y-%m-%d"))?;
        }
        writeln!(f, "Slug: {}", self.slug)?;
        if let Some(image) = &self.image {
            writeln!(f, "Image: {}", image)?;
        }
        writeln!(f, "\n{}\n", self.summary)?;
        write!(f, "{}", self.content)
    }
}

/// The create-post form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlogDraft {
    pub title: String,
    pub slug: Option<String>,
    pub summary: String,
    pub content: String,
}

impl BlogDraft {
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            slug: None,
            summary: summary.into(),
            content: content.into(),
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Checks required fields and returns the slug to publish under.
    pub fn validate(&self) -> Result<String, AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::validation("Title is required"));
        }
        if self.summary.trim().is_empty() {
            return Err(AppError::validation("Summary is required"));
        }
        if self.content.trim().is_empty() {
            return Err(AppError::validation("Content is required"));
        }
        let slug = match &self.slug {
            Some(slug) if !slug.trim().is_empty() => slugify(slug),
            _ => slugify(&self.title),
        };
        if slug.is_empty() {
            return Err(AppError::validation("Title must contain letters or digits"));
        }
        Ok(slug)
    }
}

/// Lowercase ASCII words joined by single hyphens.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Managing Type 2 Diabetes!"), "managing-type-2-diabetes");
        assert_eq!(slugify("  --Low GI  foods-- "), "low-gi-foods");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_draft_validation_and_slug() {
        let draft = BlogDraft::new("Low GI Breakfasts", "Ideas", "Oatmeal...");
        assert_eq!(draft.validate().unwrap(), "low-gi-breakfasts");
        assert_eq!(
            draft.clone().with_slug("Custom Slug").validate().unwrap(),
            "custom-slug"
        );
        assert!(BlogDraft::new("", "s", "c").validate().is_err());
        assert!(BlogDraft::new("t", "s", " ").validate().is_err());
    }

    #[test]
    fn test_decode() {
        let path = DocPath::parse("blogPosts/b1").unwrap();
        let data = json!({
            "title": "T",
            "slug": "t",
            "summary": "S",
            "content": "C",
            "image": null,
            "createdAt": "2024-01-05T08:00:00Z"
        });
        let post = BlogPost::decode(&path, data.as_object().unwrap()).unwrap();
        assert_eq!(post.id, "b1");
        assert!(post.image.is_none());
        assert!(BlogPost::decode(&path, json!({"title": "T"}).as_object().unwrap()).is_err());
    }
}
