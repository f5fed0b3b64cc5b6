use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::store::{decode_fields, encode_fields, DocPath, Document, DocumentSchema, SchemaError};

/// A reply embedded in a forum post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    #[serde(default)]
    pub id: String,
    pub author: String,
    pub content: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl Reply {
    pub fn new(
        author: impl Into<String>,
        content: impl Into<String>,
        owner: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author: author.into(),
            content: content.into(),
            user_id: owner.into(),
            created_at: now,
        }
    }
}

/// A question on the community board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumPost {
    #[serde(skip)]
    pub id: String,
    pub question: String,
    pub author: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Ordered by `created_at`.
    #[serde(default)]
    pub replies: Vec<Reply>,
}

impl ForumPost {
    pub fn new(
        id: impl Into<String>,
        question: impl Into<String>,
        author: impl Into<String>,
        owner: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            author: author.into(),
            user_id: owner.into(),
            created_at: Some(now),
            replies: Vec::new(),
        }
    }
}

impl DocumentSchema for ForumPost {
    const KIND: &'static str = "forum post";

    fn decode(path: &DocPath, data: &Document) -> Result<Self, SchemaError> {
        let mut post: ForumPost = decode_fields(Self::KIND, path, data)?;
        post.id = path.id().to_string();
        for (index, reply) in post.replies.iter_mut().enumerate() {
            if reply.id.is_empty() {
                reply.id = format!("{}-r{}", post.id, index);
            }
        }
        post.replies.sort_by_key(|r| r.created_at);
        Ok(post)
    }

    fn encode(&self) -> Document {
        encode_fields(self)
    }
}

impl fmt::Display for ForumPost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.question)?;
        match self.created_at {
            Some(at) => writeln!(f, "  asked by {} on {} [{}]", self.author, at.format("%Y-%m-%d %H:%M"), self.id)?,
            None => writeln!(f, "  asked by {} [{}]", self.author, self.id)?,
        }
        for reply in &self.replies {
            writeln!(f, "    > {}: {}", reply.author, reply.content)?;
        }
        Ok(())
    }
}

/// The whole board, newest post first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ForumBoard {
    posts: Vec<ForumPost>,
}

impl ForumBoard {
    pub fn new(mut posts: Vec<ForumPost>) -> Self {
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Self { posts }
    }

    pub fn posts(&self) -> &[ForumPost] {
        &self.posts
    }

    pub fn find(&self, id: &str) -> Option<&ForumPost> {
        self.posts.iter().find(|p| p.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut ForumPost> {
        self.posts.iter_mut().find(|p| p.id == id)
    }

    /// Adds a freshly created post at the top.
    pub fn insert(&mut self, post: ForumPost) {
        self.posts.insert(0, post);
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 5, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_decode_sorts_replies_and_assigns_ids() {
        let path = DocPath::parse("forumPosts/p1").unwrap();
        let data = json!({
            "question": "Is oatmeal ok?",
            "author": "Ann",
            "userId": "u1",
            "createdAt": "2024-01-05T08:00:00Z",
            "replies": [
                {"author": "Bo", "content": "later", "userId": "u2", "createdAt": "2024-01-05T10:00:00Z"},
                {"author": "Cy", "content": "earlier", "userId": "u3", "createdAt": "2024-01-05T09:00:00Z"}
            ]
        });
        let post = ForumPost::decode(&path, data.as_object().unwrap()).unwrap();
        assert_eq!(post.id, "p1");
        assert_eq!(post.replies[0].content, "earlier");
        assert_eq!(post.replies[0].id, "p1-r1");
        assert_eq!(post.replies[1].id, "p1-r0");
    }

    #[test]
    fn test_decode_rejects_missing_question() {
        let path = DocPath::parse("forumPosts/p1").unwrap();
        let data = json!({"author": "Ann", "userId": "u1"});
        assert!(ForumPost::decode(&path, data.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_board_orders_newest_first() {
        let board = ForumBoard::new(vec![
            ForumPost::new("a", "first", "Ann", "u1", at(8)),
            ForumPost::new("b", "second", "Ann", "u1", at(9)),
        ]);
        assert_eq!(board.posts()[0].id, "b");
        assert_eq!(board.find("a").unwrap().question, "first");
    }

    #[test]
    fn test_reply_serializes_camel_case() {
        let reply = Reply::new("Ann", "Yes", "u1", at(8));
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["userId"], "u1");
        assert!(value.get("createdAt").is_some());
    }
}
