use serde::{Deserialize, Serialize};
use std::fmt;

use super::StoreError;

/// Slash-separated document path, e.g. `users/u1/mealPlans/2024-01-05`.
///
/// Paths alternate collection and document segments, so a valid path always
/// has an even number of non-empty segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocPath(String);

impl DocPath {
    /// Builds a path from a collection path and a document id.
    pub fn new(collection: &str, id: &str) -> Result<Self, StoreError> {
        Self::parse(&format!("{}/{}", collection.trim_end_matches('/'), id))
    }

    /// Parses and validates a full document path.
    pub fn parse(path: &str) -> Result<Self, StoreError> {
        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() < 2 || segments.len() % 2 != 0 {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        for segment in &segments {
            if segment.is_empty() || *segment == "." || *segment == ".." {
                return Err(StoreError::InvalidPath(path.to_string()));
            }
        }
        Ok(Self(path.to_string()))
    }

    /// The collection this document lives in (everything before the last segment).
    pub fn collection(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    /// The document id (last segment).
    pub fn id(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocPath {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocPath> for String {
    fn from(path: DocPath) -> Self {
        path.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_paths() {
        let path = DocPath::parse("users/u1/mealPlans/2024-01-05").unwrap();
        assert_eq!(path.collection(), "users/u1/mealPlans");
        assert_eq!(path.id(), "2024-01-05");

        let path = DocPath::parse("medicines/abc").unwrap();
        assert_eq!(path.collection(), "medicines");
        assert_eq!(path.id(), "abc");
    }

    #[test]
    fn test_parse_rejects_invalid_paths() {
        assert!(DocPath::parse("").is_err());
        assert!(DocPath::parse("medicines").is_err());
        assert!(DocPath::parse("users/u1/mealPlans").is_err());
        assert!(DocPath::parse("users//mealPlans/x").is_err());
        assert!(DocPath::parse("users/../x/y").is_err());
    }

    #[test]
    fn test_new_joins_segments() {
        let path = DocPath::new("users/u1/mealPlans", "2024-01-05").unwrap();
        assert_eq!(path.as_str(), "users/u1/mealPlans/2024-01-05");
    }

    #[test]
    fn test_serde_validates() {
        let json = "\"forumPosts/p1\"";
        let path: DocPath = serde_json::from_str(json).unwrap();
        assert_eq!(path.id(), "p1");
        assert!(serde_json::from_str::<DocPath>("\"forumPosts\"").is_err());
    }
}
